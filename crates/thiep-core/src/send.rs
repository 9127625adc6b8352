//! Card send orchestration: validate, resolve the recipient, persist, then
//! fire the email notification without waiting on it.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use thiep_types::models::{
    ANONYMOUS_AUTHOR_ID, BackgroundStyle, Card, FontFamily, NewCard, StickerPlacement, UserProfile,
};

use crate::draft::{CardDraft, sanitize_stickers};
use crate::error::{AppError, Result};
use crate::links::{card_link, connect_link};
use crate::ports::{Directory, Identity, Notification, Notifier};
use crate::resolver::resolve_recipient;

/// Author name used when nobody is signed in.
pub const ANONYMOUS_AUTHOR_NAME: &str = "Người bí ẩn";

pub const EMPTY_MESSAGE_NOTICE: &str = "Hãy viết lời chúc nhé!";

/// Who a card is from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub photo: Option<String>,
}

impl Author {
    pub fn from_identity(identity: Option<&Identity>) -> Self {
        match identity {
            Some(identity) => Self {
                id: identity.account_id.clone(),
                name: identity
                    .display_name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .or_else(|| identity.email.clone())
                    .unwrap_or_else(|| ANONYMOUS_AUTHOR_NAME.to_string()),
                photo: identity.photo_url.clone(),
            },
            None => Self {
                id: ANONYMOUS_AUTHOR_ID.to_string(),
                name: ANONYMOUS_AUTHOR_NAME.to_string(),
                photo: None,
            },
        }
    }
}

/// The visual content of a card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardContent {
    pub message: String,
    pub background: BackgroundStyle,
    pub font_family: FontFamily,
    pub stickers: Vec<StickerPlacement>,
}

impl From<&CardDraft> for CardContent {
    fn from(draft: &CardDraft) -> Self {
        Self {
            message: draft.message.clone(),
            background: draft.background.clone(),
            font_family: draft.font_family,
            stickers: draft.stickers().to_vec(),
        }
    }
}

/// Raw addressing inputs of a send request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Addressing<'a> {
    pub manual_token: &'a str,
    pub selected_friend_id: &'a str,
    pub known_users: &'a [UserProfile],
}

pub struct SendOutcome {
    pub card: Card,
    /// The in-flight notification, if one was started. Awaiting it is
    /// optional; its result never changes the outcome of the send.
    pub notification: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct CardSender {
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    origin: String,
}

impl CardSender {
    pub fn new(directory: Arc<dyn Directory>, notifier: Arc<dyn Notifier>, origin: String) -> Self {
        Self { directory, notifier, origin }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub async fn send(
        &self,
        author: &Author,
        content: CardContent,
        addressing: Addressing<'_>,
    ) -> Result<SendOutcome> {
        if content.message.trim().is_empty() {
            return Err(AppError::Validation(EMPTY_MESSAGE_NOTICE.into()));
        }
        let stickers = sanitize_stickers(content.stickers)?;

        let recipient = resolve_recipient(
            self.directory.as_ref(),
            addressing.manual_token,
            addressing.selected_friend_id,
            addressing.known_users,
        )
        .await;

        let new_card = NewCard {
            message: content.message,
            background: content.background,
            font_family: content.font_family,
            stickers,
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            author_photo: author.photo.clone(),
            recipient,
            created_at: Utc::now(),
        };

        let card = self.directory.create_card(new_card).await.map_err(|e| {
            error!("Failed to store card from {}: {}", author.id, e);
            AppError::Persistence(e)
        })?;
        info!("Card {} sent by {}", card.id, author.id);

        let notification = card
            .recipient
            .as_ref()
            .and_then(|r| r.email.clone())
            .map(|to_email| {
                self.notify(Notification {
                    to_email,
                    from_name: author.name.clone(),
                    message: card.message.clone(),
                    link: card_link(&self.origin, &card.id),
                    sender_id: author.id.clone(),
                })
            });

        Ok(SendOutcome { card, notification })
    }

    /// Email `to_email` a link that pre-fills the sender as recipient.
    pub fn invite(&self, author: &Author, to_email: &str) -> Result<JoinHandle<()>> {
        let to_email = to_email.trim();
        if !to_email.contains('@') {
            return Err(AppError::Validation("Địa chỉ email không hợp lệ.".into()));
        }
        Ok(self.notify(Notification {
            to_email: to_email.to_string(),
            from_name: author.name.clone(),
            message: format!("{} muốn kết nối với bạn.", author.name),
            link: connect_link(&self.origin, &author.id),
            sender_id: author.id.clone(),
        }))
    }

    fn notify(&self, notification: Notification) -> JoinHandle<()> {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&notification).await {
                warn!("Notification to {} failed: {}", notification.to_email, e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use thiep_db::Database;
    use thiep_types::models::Glyph;

    use crate::store::SqliteDirectory;
    use crate::testing::RecordingNotifier;

    fn setup(fail: bool) -> (Arc<Database>, Arc<RecordingNotifier>, CardSender) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier { fail, ..Default::default() });
        let sender = CardSender::new(
            Arc::new(SqliteDirectory::new(db.clone())),
            notifier.clone(),
            "https://thiep.example".into(),
        );
        (db, notifier, sender)
    }

    fn content(message: &str) -> CardContent {
        CardContent {
            message: message.into(),
            background: BackgroundStyle::default(),
            font_family: FontFamily::default(),
            stickers: vec![],
        }
    }

    fn minh() -> Author {
        Author { id: "U1".into(), name: "Minh".into(), photo: None }
    }

    #[tokio::test]
    async fn blank_message_writes_nothing() {
        let (db, notifier, sender) = setup(false);
        for message in ["", "   \n\t"] {
            let err = sender
                .send(&minh(), content(message), Addressing::default())
                .await
                .err()
                .unwrap();
            assert!(matches!(err, AppError::Validation(ref m) if m == EMPTY_MESSAGE_NOTICE));
        }
        assert!(db.cards_by_author("U1").unwrap().is_empty());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn guest_recipient_gets_card_link() {
        let (db, notifier, sender) = setup(false);
        let outcome = sender
            .send(
                &minh(),
                content("Merry Christmas"),
                Addressing { manual_token: "alice@example.com", ..Default::default() },
            )
            .await
            .unwrap();
        outcome.notification.unwrap().await.unwrap();

        assert!(outcome.card.recipient.as_ref().unwrap().is_guest());
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_email, "alice@example.com");
        assert_eq!(sent[0].link, format!("https://thiep.example/?card={}", outcome.card.id));
        assert_eq!(db.cards_by_author("U1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn relay_failure_does_not_fail_the_send() {
        let (db, _notifier, sender) = setup(true);
        let outcome = sender
            .send(
                &minh(),
                content("Merry Christmas"),
                Addressing { manual_token: "bob@example.com", ..Default::default() },
            )
            .await
            .unwrap();
        outcome.notification.unwrap().await.unwrap();
        assert!(db.get_card(&outcome.card.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn placeholder_recipient_is_not_notified() {
        let (_db, notifier, sender) = setup(false);
        let outcome = sender
            .send(
                &minh(),
                content("Merry Christmas"),
                Addressing { manual_token: "U404abc", ..Default::default() },
            )
            .await
            .unwrap();
        assert!(outcome.notification.is_none());
        assert_eq!(outcome.card.recipient.unwrap().name, "ID: U404...");
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unaddressed_card_is_public() {
        let (_db, _notifier, sender) = setup(false);
        let mut body = content("Chúc mừng năm mới");
        body.stickers = vec![StickerPlacement { id: "s".into(), glyph: Glyph::Star, x: 150.0, y: -3.0 }];

        let outcome = sender.send(&minh(), body, Addressing::default()).await.unwrap();
        assert!(outcome.card.recipient.is_none());
        assert_eq!((outcome.card.stickers[0].x, outcome.card.stickers[0].y), (100.0, 0.0));
    }

    #[tokio::test]
    async fn stored_sticker_ids_are_unique() {
        let (db, _notifier, sender) = setup(false);
        let mut body = content("Chúc mừng");
        body.stickers = (0..3)
            .map(|_| StickerPlacement { id: "dup".into(), glyph: Glyph::Tree, x: 20.0, y: 20.0 })
            .collect();

        let outcome = sender.send(&minh(), body, Addressing::default()).await.unwrap();
        let stored = SqliteDirectory::new(db).get_card(&outcome.card.id).await.unwrap().unwrap();
        let mut ids: Vec<&str> = stored.stickers.iter().map(|s| s.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn invite_carries_connect_link() {
        let (_db, notifier, sender) = setup(false);
        sender.invite(&minh(), "lan@example.com").unwrap().await.unwrap();
        assert_eq!(
            notifier.sent.lock().unwrap()[0].link,
            "https://thiep.example/?connect=U1"
        );
        assert!(sender.invite(&minh(), "not-an-email").is_err());
    }

    #[test]
    fn anonymous_author_falls_back_to_literal_id() {
        let author = Author::from_identity(None);
        assert_eq!(author.id, "anonymous");
        assert_eq!(author.name, ANONYMOUS_AUTHOR_NAME);
    }
}
