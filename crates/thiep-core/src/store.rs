//! `Directory` backed by the embedded SQLite store. Thread changes are
//! fanned out over a broadcast channel so live subscriptions can re-query.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use thiep_db::Database;
use thiep_db::migrations::RECIPIENT_INDEX;
use thiep_db::models::{CardRow, ChatMessageRow, ProfileRow, ThreadRow};
use thiep_db::queries::format_timestamp;
use thiep_types::models::{
    BackgroundStyle, Card, ChatMessage, ChatThread, FontFamily, NewCard, RecipientDescriptor,
    StickerPlacement, UserProfile,
};

use crate::error::StoreError;
use crate::ports::{Directory, Subscription};

const SNAPSHOT_BUFFER: usize = 16;

#[derive(Clone)]
pub struct SqliteDirectory {
    db: Arc<Database>,
    /// Keys of threads that just received a message.
    changes: broadcast::Sender<String>,
}

impl SqliteDirectory {
    pub fn new(db: Arc<Database>) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self { db, changes }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(self.db.clone(), f).await
    }
}

async fn run_blocking<T, F>(db: Arc<Database>, f: F) -> Result<T, StoreError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StoreError::Backend(anyhow::anyhow!("blocking task failed: {}", e))
        })?
        .map_err(StoreError::Backend)
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), StoreError> {
        let row = ProfileRow {
            id: profile.id.clone(),
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
            photo_url: profile.photo_url.clone(),
            last_seen: format_timestamp(&profile.last_seen),
        };
        self.blocking(move |db| db.upsert_profile(&row)).await
    }

    async fn get_profile(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        let id = id.to_string();
        let row = self.blocking(move |db| db.get_profile(&id)).await?;
        Ok(row.map(profile_from_row))
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let email = email.to_string();
        let row = self
            .blocking(move |db| db.find_profile_by_email(&email))
            .await?;
        Ok(row.map(profile_from_row))
    }

    async fn list_profiles(&self) -> Result<Vec<UserProfile>, StoreError> {
        let rows = self.blocking(|db| db.list_profiles()).await?;
        Ok(rows.into_iter().map(profile_from_row).collect())
    }

    async fn create_card(&self, card: NewCard) -> Result<Card, StoreError> {
        let id = Uuid::new_v4().to_string();
        let row = card_to_row(&id, &card)?;
        self.blocking(move |db| db.insert_card(&row)).await?;
        Ok(card.into_card(id))
    }

    async fn get_card(&self, id: &str) -> Result<Option<Card>, StoreError> {
        let id = id.to_string();
        match self.blocking(move |db| db.get_card(&id)).await? {
            Some(row) => Ok(Some(card_from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn cards_by_author(&self, author_id: &str) -> Result<Vec<Card>, StoreError> {
        let author_id = author_id.to_string();
        let rows = self
            .blocking(move |db| db.cards_by_author(&author_id))
            .await?;
        Ok(cards_from_rows(rows))
    }

    async fn cards_by_recipient(&self, recipient_id: &str) -> Result<Vec<Card>, StoreError> {
        let recipient_id = recipient_id.to_string();
        let rows = self
            .blocking(move |db| {
                if !db.has_index(RECIPIENT_INDEX)? {
                    return Ok(None);
                }
                db.cards_by_recipient(&recipient_id, true).map(Some)
            })
            .await?
            .ok_or_else(|| StoreError::IndexMissing(RECIPIENT_INDEX.to_string()))?;
        Ok(cards_from_rows(rows))
    }

    async fn cards_by_recipient_unordered(
        &self,
        recipient_id: &str,
    ) -> Result<Vec<Card>, StoreError> {
        let recipient_id = recipient_id.to_string();
        let rows = self
            .blocking(move |db| db.cards_by_recipient(&recipient_id, false))
            .await?;
        Ok(cards_from_rows(rows))
    }

    async fn upsert_thread(&self, thread: &ChatThread) -> Result<(), StoreError> {
        let [a, b] = thread.participant_ids.clone();
        let row = ThreadRow {
            key: thread.key.clone(),
            participant_a: a,
            participant_b: b,
            last_message_text: thread.last_message_text.clone(),
            updated_at: format_timestamp(&thread.updated_at),
        };
        self.blocking(move |db| db.upsert_thread(&row)).await
    }

    async fn append_message(
        &self,
        thread_key: &str,
        text: &str,
        sender_id: &str,
        sender_name: &str,
    ) -> Result<ChatMessage, StoreError> {
        let id = Uuid::new_v4().to_string();
        let (key, text, sender_id, sender_name) = (
            thread_key.to_string(),
            text.to_string(),
            sender_id.to_string(),
            sender_name.to_string(),
        );
        let row = self
            .blocking(move |db| db.insert_message(&id, &key, &text, &sender_id, &sender_name))
            .await?;

        // No receivers just means nobody is watching.
        let _ = self.changes.send(row.thread_key.clone());
        Ok(message_from_row(row))
    }

    async fn thread_messages(&self, thread_key: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let key = thread_key.to_string();
        let rows = self.blocking(move |db| db.get_messages(&key)).await?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    async fn watch_thread(&self, thread_key: &str) -> Result<Subscription, StoreError> {
        // Subscribe before the first read so no append slips between them.
        let mut changes = self.changes.subscribe();
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let db = self.db.clone();
        let key = thread_key.to_string();

        let task = tokio::spawn(async move {
            loop {
                let key_for_query = key.clone();
                match run_blocking(db.clone(), move |db| db.get_messages(&key_for_query)).await {
                    Ok(rows) => {
                        let snapshot = rows.into_iter().map(message_from_row).collect();
                        if tx.send(snapshot).await.is_err() {
                            debug!("Thread {} watcher dropped", key);
                            return;
                        }
                    }
                    Err(e) => warn!("Thread {} snapshot failed: {}", key, e),
                }

                loop {
                    match changes.recv().await {
                        Ok(changed) if changed == key => break,
                        Ok(_) => continue,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!("Thread {} watcher lagged by {}", key, skipped);
                            break;
                        }
                        Err(RecvError::Closed) => return,
                    }
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}

fn parse_timestamp(raw: &str, what: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' on {}: {}", raw, what, e);
        DateTime::default()
    })
}

fn profile_from_row(row: ProfileRow) -> UserProfile {
    let last_seen = parse_timestamp(&row.last_seen, &format!("user '{}'", row.id));
    UserProfile {
        id: row.id,
        display_name: row.display_name,
        email: row.email,
        photo_url: row.photo_url,
        last_seen,
    }
}

fn message_from_row(row: ChatMessageRow) -> ChatMessage {
    let created_at = parse_timestamp(&row.created_at, &format!("message '{}'", row.id));
    ChatMessage {
        id: row.id,
        thread_key: row.thread_key,
        text: row.text,
        sender_id: row.sender_id,
        sender_name: row.sender_name,
        created_at,
    }
}

fn card_to_row(id: &str, card: &NewCard) -> Result<CardRow, StoreError> {
    let stickers = serde_json::to_string(&card.stickers)
        .map_err(|e| StoreError::Corrupt(format!("stickers: {e}")))?;
    let recipient = card
        .recipient
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("recipient: {e}")))?;

    Ok(CardRow {
        id: id.to_string(),
        message: card.message.clone(),
        background_kind: card.background.kind().to_string(),
        background_value: card.background.value().to_string(),
        font_family: card.font_family.css_name().to_string(),
        stickers,
        author_id: card.author_id.clone(),
        author_name: card.author_name.clone(),
        author_photo: card.author_photo.clone(),
        recipient,
        recipient_id: card.recipient.as_ref().map(|r| r.id.clone()),
        created_at: format_timestamp(&card.created_at),
    })
}

fn card_from_row(row: CardRow) -> Result<Card, StoreError> {
    let stickers: Vec<StickerPlacement> = serde_json::from_str(&row.stickers)
        .map_err(|e| StoreError::Corrupt(format!("stickers of card '{}': {}", row.id, e)))?;
    let recipient: Option<RecipientDescriptor> = row
        .recipient
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| StoreError::Corrupt(format!("recipient of card '{}': {}", row.id, e)))?;

    let background = BackgroundStyle::from_parts(&row.background_kind, row.background_value)
        .unwrap_or_else(|| {
            warn!("Unknown background kind '{}' on card '{}'", row.background_kind, row.id);
            BackgroundStyle::default()
        });
    let font_family = FontFamily::from_css_name(&row.font_family).unwrap_or_else(|| {
        warn!("Unknown font '{}' on card '{}'", row.font_family, row.id);
        FontFamily::default()
    });
    let created_at = parse_timestamp(&row.created_at, &format!("card '{}'", row.id));

    Ok(Card {
        id: row.id,
        message: row.message,
        background,
        font_family,
        stickers,
        author_id: row.author_id,
        author_name: row.author_name,
        author_photo: row.author_photo,
        recipient,
        created_at,
    })
}

/// Corrupt cards are logged and left out of lists.
fn cards_from_rows(rows: Vec<CardRow>) -> Vec<Card> {
    rows.into_iter()
        .filter_map(|row| match card_from_row(row) {
            Ok(card) => Some(card),
            Err(e) => {
                warn!("Skipping card: {}", e);
                None
            }
        })
        .collect()
}
