//! Collaborator contracts. The orchestration code only talks to these
//! traits; `store`, `identity` and `relay` hold the concrete adapters.

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use thiep_types::models::{Card, ChatMessage, ChatThread, NewCard, UserProfile};

use crate::error::{IdentityError, NotifyError, StoreError};

/// Document store: profiles, cards and chat.
#[async_trait]
pub trait Directory: Send + Sync {
    // Profiles
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError>;
    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, StoreError>;
    async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError>;
    async fn list_profiles(&self) -> Result<Vec<UserProfile>, StoreError>;

    // Cards
    async fn create_card(&self, card: NewCard) -> Result<Card, StoreError>;
    async fn get_card(&self, id: &str) -> Result<Option<Card>, StoreError>;
    async fn cards_by_author(&self, author_id: &str) -> Result<Vec<Card>, StoreError>;
    /// Newest first. Fails with `StoreError::IndexMissing` when the store
    /// cannot serve the ordered query.
    async fn cards_by_recipient(&self, recipient_id: &str) -> Result<Vec<Card>, StoreError>;
    async fn cards_by_recipient_unordered(&self, recipient_id: &str)
    -> Result<Vec<Card>, StoreError>;

    // Chat
    async fn upsert_thread(&self, thread: &ChatThread) -> Result<(), StoreError>;
    async fn append_message(
        &self,
        thread_key: &str,
        text: &str,
        sender_id: &str,
        sender_name: &str,
    ) -> Result<ChatMessage, StoreError>;
    /// Current messages of one thread, oldest first.
    async fn thread_messages(&self, thread_key: &str) -> Result<Vec<ChatMessage>, StoreError>;
    /// Live, ordered snapshots of one thread. The first snapshot is sent
    /// right away.
    async fn watch_thread(&self, thread_key: &str) -> Result<Subscription, StoreError>;
}

/// A signed-in account as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub anonymous: bool,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, IdentityError>;
    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;
    /// The receiver observes the current identity immediately and every
    /// change after that.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

/// One templated email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to_email: String,
    pub from_name: String,
    pub message: String,
    pub link: String,
    pub sender_id: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// A live thread feed. Dropping it stops the producer.
pub struct Subscription {
    rx: mpsc::Receiver<Vec<ChatMessage>>,
    task: JoinHandle<()>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<Vec<ChatMessage>>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next full snapshot, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Vec<ChatMessage>> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
