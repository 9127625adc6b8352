//! One user's client session: current mode, the card being decorated,
//! friend and card lists, and at most one live chat thread.
//!
//! All mutation happens through `&mut self`, so there is a single writer.
//! The live chat feed runs as a background task that publishes full
//! snapshots into a watch channel the session reads from.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use thiep_types::models::{Card, ChatMessage, UserProfile};

use crate::draft::CardDraft;
use crate::error::{AppError, Notice, Result};
use crate::links::{EntryParams, card_link, strip_card_param};
use crate::listing::{received_cards, sent_cards};
use crate::mode::{Mode, ModeEvent, transition};
use crate::ports::{Credentials, Directory, Identity, IdentityProvider};
use crate::send::{Addressing, Author, CardContent, CardSender, EMPTY_MESSAGE_NOTICE, SendOutcome};
use crate::thread::{derive_thread_key, send_chat_message};

/// Live feed of one chat thread. Dropping it stops the feed.
struct ChatFeed {
    thread_key: String,
    messages: watch::Receiver<Vec<ChatMessage>>,
    task: JoinHandle<()>,
}

impl Drop for ChatFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct Session {
    directory: Arc<dyn Directory>,
    identity: Arc<dyn IdentityProvider>,
    sender: CardSender,
    identity_rx: watch::Receiver<Option<Identity>>,
    current: Option<Identity>,

    mode: Mode,
    location: String,

    pub draft: CardDraft,
    pub manual_recipient: String,
    pub selected_friend_id: String,

    friends: Vec<UserProfile>,
    sent: Vec<Card>,
    received: Vec<Card>,
    viewed_card: Option<Card>,

    chat_target: Option<UserProfile>,
    chat: Option<ChatFeed>,

    notice: Option<Notice>,
}

impl Session {
    /// Start a session at `location`. A `card` parameter opens that card
    /// directly; a `connect` parameter pre-fills the recipient.
    pub async fn start(
        directory: Arc<dyn Directory>,
        identity: Arc<dyn IdentityProvider>,
        sender: CardSender,
        location: &str,
    ) -> Self {
        let (params, shown) = EntryParams::parse(location);
        let identity_rx = identity.subscribe();

        let mut session = Self {
            directory,
            identity,
            sender,
            identity_rx,
            current: None,
            mode: Mode::Initial,
            location: shown,
            draft: CardDraft::default(),
            manual_recipient: params.connect.unwrap_or_default(),
            selected_friend_id: String::new(),
            friends: Vec::new(),
            sent: Vec::new(),
            received: Vec::new(),
            viewed_card: None,
            chat_target: None,
            chat: None,
            notice: None,
        };

        // The listener reports the current identity right away.
        let initial = session.identity_rx.borrow_and_update().clone();
        session.apply_identity(initial).await;

        if let Some(card_id) = params.card {
            session.mode = Mode::ViewCard;
            match session.directory.get_card(&card_id).await {
                Ok(Some(card)) => session.viewed_card = Some(card),
                Ok(None) => session.notice = Some(AppError::NotFound("thiệp".into()).notice()),
                Err(e) => {
                    warn!("Shared card {} unavailable: {}", card_id, e);
                    session.notice = Some(AppError::Lookup(e).notice());
                }
            }
        }

        session
    }

    // -- Accessors --

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    pub fn friends(&self) -> &[UserProfile] {
        &self.friends
    }

    pub fn sent_cards(&self) -> &[Card] {
        &self.sent
    }

    pub fn received_cards(&self) -> &[Card] {
        &self.received
    }

    pub fn viewed_card(&self) -> Option<&Card> {
        self.viewed_card.as_ref()
    }

    pub fn chat_target(&self) -> Option<&UserProfile> {
        self.chat_target.as_ref()
    }

    pub fn chat_thread_key(&self) -> Option<&str> {
        self.chat.as_ref().map(|feed| feed.thread_key.as_str())
    }

    /// Latest snapshot of the active thread, oldest message first.
    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.chat
            .as_ref()
            .map(|feed| feed.messages.borrow().clone())
            .unwrap_or_default()
    }

    /// Wait for the next chat snapshot. Returns false when there is no
    /// active thread or its feed has ended.
    pub async fn chat_changed(&mut self) -> bool {
        match self.chat.as_mut() {
            Some(feed) => feed.messages.changed().await.is_ok(),
            None => false,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn share_link(&self, card_id: &str) -> String {
        card_link(self.sender.origin(), card_id)
    }

    // -- Navigation --

    pub fn start_decorating(&mut self) -> Result<()> {
        self.apply(ModeEvent::Start)
    }

    pub fn back(&mut self) -> Result<()> {
        self.apply(ModeEvent::Back)
    }

    /// Leave the sent screen with a fresh card.
    pub fn reset(&mut self) -> Result<()> {
        self.apply(ModeEvent::Reset)?;
        self.draft.reset();
        Ok(())
    }

    pub fn open_list(&mut self) -> Result<()> {
        self.apply(ModeEvent::OpenList)
    }

    pub fn close_list(&mut self) -> Result<()> {
        self.apply(ModeEvent::CloseList)
    }

    pub fn open_chat(&mut self) -> Result<()> {
        self.apply(ModeEvent::OpenChat)
    }

    pub fn close_chat(&mut self) -> Result<()> {
        self.apply(ModeEvent::CloseChat)
    }

    /// Dismiss a shared card and forget the link that opened it.
    pub fn close_card(&mut self) -> Result<()> {
        self.apply(ModeEvent::CloseCard)?;
        self.viewed_card = None;
        self.location = strip_card_param(&self.location);
        Ok(())
    }

    fn apply(&mut self, event: ModeEvent) -> Result<()> {
        match transition(self.mode, event) {
            Ok(next) => {
                debug!("Mode {} -> {}", self.mode, next);
                self.mode = next;
                Ok(())
            }
            Err(e) => Err(self.surface(e)),
        }
    }

    fn surface(&mut self, err: AppError) -> AppError {
        self.notice = Some(err.notice());
        err
    }

    // -- Identity --

    pub async fn sign_in(&mut self, credentials: &Credentials) -> Result<()> {
        if let Err(e) = self.identity.sign_in(credentials).await {
            warn!("Sign-in for {} failed: {}", credentials.username, e);
            return Err(self.surface(AppError::Identity(e)));
        }
        self.sync_identity().await;
        Ok(())
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        if let Err(e) = self.identity.sign_out().await {
            return Err(self.surface(AppError::Identity(e)));
        }
        self.sync_identity().await;
        Ok(())
    }

    /// Pick up an identity change reported by the provider, if any.
    pub async fn sync_identity(&mut self) {
        if self.identity_rx.has_changed().unwrap_or(false) {
            let identity = self.identity_rx.borrow_and_update().clone();
            self.apply_identity(identity).await;
        }
    }

    async fn apply_identity(&mut self, identity: Option<Identity>) {
        // A new identity never inherits the previous one's thread.
        self.chat = None;
        self.chat_target = None;
        self.current = identity;

        let Some(identity) = self.current.clone() else {
            self.friends.clear();
            self.sent.clear();
            self.received.clear();
            return;
        };

        if !identity.anonymous {
            let profile = UserProfile {
                id: identity.account_id.clone(),
                display_name: identity.display_name.clone(),
                email: identity.email.clone(),
                photo_url: identity.photo_url.clone(),
                last_seen: Utc::now(),
            };
            if let Err(e) = self.directory.upsert_profile(&profile).await {
                warn!("Profile upsert for {} failed: {}", identity.account_id, e);
                self.notice = Some(AppError::Persistence(e).notice());
            }
        }
        info!("Session identity is now {}", identity.account_id);

        self.refresh_friends().await;
        self.refresh_sent().await;
        self.refresh_received().await;
    }

    // -- Lists --

    pub async fn refresh_friends(&mut self) {
        let Some(me) = self.current.as_ref().map(|i| i.account_id.clone()) else {
            return;
        };
        match self.directory.list_profiles().await {
            Ok(profiles) => {
                self.friends = profiles.into_iter().filter(|p| p.id != me).collect();
            }
            Err(e) => warn!("Friend list unavailable: {}", e),
        }
    }

    pub async fn refresh_sent(&mut self) {
        let Some(me) = self.current.as_ref().map(|i| i.account_id.clone()) else {
            return;
        };
        match sent_cards(self.directory.as_ref(), &me).await {
            Ok(cards) => self.sent = cards,
            Err(e) => warn!("Sent cards unavailable: {}", e),
        }
    }

    pub async fn refresh_received(&mut self) {
        let Some(me) = self.current.as_ref().map(|i| i.account_id.clone()) else {
            return;
        };
        match received_cards(self.directory.as_ref(), &me).await {
            Ok((cards, notice)) => {
                self.received = cards;
                if notice.is_some() {
                    self.notice = notice;
                }
            }
            Err(e) => warn!("Received cards unavailable: {}", e),
        }
    }

    // -- Sending --

    /// Pick a friend as the card recipient.
    pub fn select_recipient(&mut self, friend_id: &str) {
        self.selected_friend_id = friend_id.to_string();
    }

    /// Send the current draft. Only possible while decorating; on failure
    /// the mode stays where it was.
    pub async fn send(&mut self) -> Result<SendOutcome> {
        if self.mode != Mode::Decorating {
            return Err(self.surface(AppError::InvalidTransition {
                action: "send",
                mode: self.mode.as_str(),
            }));
        }
        if self.draft.message.trim().is_empty() {
            return Err(self.surface(AppError::Validation(EMPTY_MESSAGE_NOTICE.into())));
        }

        if self.current.is_none() {
            match self.identity.sign_in_anonymously().await {
                Ok(_) => self.sync_identity().await,
                Err(e) => warn!("Anonymous sign-in failed, sending without identity: {}", e),
            }
        }

        let author = Author::from_identity(self.current.as_ref());
        let addressing = Addressing {
            manual_token: &self.manual_recipient,
            selected_friend_id: &self.selected_friend_id,
            known_users: &self.friends,
        };
        let result = self
            .sender
            .send(&author, CardContent::from(&self.draft), addressing)
            .await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.surface(e)),
        };

        self.refresh_sent().await;
        self.apply(ModeEvent::SendSucceeded)?;
        Ok(outcome)
    }

    /// Email someone a link that connects them to this account.
    pub fn invite(&mut self, to_email: &str) -> Result<JoinHandle<()>> {
        let author = match self.current.as_ref() {
            Some(identity) if !identity.anonymous => Author::from_identity(Some(identity)),
            _ => {
                return Err(self.surface(AppError::Validation(
                    "Hãy đăng nhập để mời bạn bè.".into(),
                )));
            }
        };
        let result = self.sender.invite(&author, to_email);
        result.map_err(|e| self.surface(e))
    }

    // -- Chat --

    /// Make `friend_id` the chat partner and follow that thread, replacing
    /// any previous feed.
    pub async fn select_chat_target(&mut self, friend_id: &str) -> Result<()> {
        if self.mode != Mode::Chat {
            return Err(self.surface(AppError::InvalidTransition {
                action: "pick a chat partner",
                mode: self.mode.as_str(),
            }));
        }
        let Some(me) = self.current.as_ref().map(|i| i.account_id.clone()) else {
            return Err(self.surface(AppError::Validation("Hãy đăng nhập để trò chuyện.".into())));
        };
        let Some(friend) = self.friends.iter().find(|f| f.id == friend_id).cloned() else {
            return Err(self.surface(AppError::NotFound("bạn bè".into())));
        };

        let key = derive_thread_key(&me, &friend.id);
        if self.chat_thread_key() == Some(key.as_str()) {
            self.chat_target = Some(friend);
            return Ok(());
        }

        self.chat = None;
        let mut subscription = match self.directory.watch_thread(&key).await {
            Ok(subscription) => subscription,
            Err(e) => return Err(self.surface(AppError::Lookup(e))),
        };

        let (tx, rx) = watch::channel(Vec::new());
        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                if tx.send(snapshot).is_err() {
                    break;
                }
            }
        });

        debug!("Following thread {}", key);
        self.chat = Some(ChatFeed { thread_key: key, messages: rx, task });
        self.chat_target = Some(friend);
        Ok(())
    }

    pub async fn send_chat(&mut self, text: &str) -> Result<ChatMessage> {
        let (Some(me), Some(target)) = (self.current.clone(), self.chat_target.clone()) else {
            return Err(self.surface(AppError::Validation("Hãy chọn người để trò chuyện.".into())));
        };
        let author = Author::from_identity(Some(&me));
        let result =
            send_chat_message(self.directory.as_ref(), &author.id, &author.name, &target.id, text)
                .await;
        result.map_err(|e| self.surface(e))
    }
}
