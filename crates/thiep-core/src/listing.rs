//! Sent and received card lists.

use tracing::{info, warn};

use thiep_types::models::Card;

use crate::error::{AppError, Notice, Result, StoreError};
use crate::ports::Directory;

pub async fn sent_cards(directory: &dyn Directory, author_id: &str) -> Result<Vec<Card>> {
    directory
        .cards_by_author(author_id)
        .await
        .map_err(AppError::Lookup)
}

/// Cards addressed to `recipient_id`, newest first. Without the recipient
/// index the unordered result is sorted here and an informational notice
/// comes back with it.
pub async fn received_cards(
    directory: &dyn Directory,
    recipient_id: &str,
) -> Result<(Vec<Card>, Option<Notice>)> {
    match directory.cards_by_recipient(recipient_id).await {
        Ok(cards) => Ok((cards, None)),
        Err(StoreError::IndexMissing(index)) => {
            info!("Index {} missing, sorting received cards locally", index);
            let mut cards = directory
                .cards_by_recipient_unordered(recipient_id)
                .await
                .map_err(AppError::Lookup)?;
            cards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok((cards, Some(AppError::IndexMissing.notice())))
        }
        Err(e) => {
            warn!("Received cards for {} unavailable: {}", recipient_id, e);
            Err(AppError::Lookup(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use thiep_db::Database;
    use thiep_db::migrations::RECIPIENT_INDEX;
    use thiep_types::models::{BackgroundStyle, FontFamily, NewCard, RecipientDescriptor};

    use crate::NoticeLevel;
    use crate::store::SqliteDirectory;

    async fn seed(dir: &SqliteDirectory, minutes_ago: &[i64]) {
        for (i, m) in minutes_ago.iter().enumerate() {
            dir.create_card(NewCard {
                message: format!("card {i}"),
                background: BackgroundStyle::default(),
                font_family: FontFamily::default(),
                stickers: vec![],
                author_id: "U1".into(),
                author_name: "Minh".into(),
                author_photo: None,
                recipient: Some(RecipientDescriptor {
                    id: "U2".into(),
                    name: "Lan".into(),
                    email: None,
                    photo: None,
                }),
                created_at: Utc::now() - Duration::minutes(*m),
            })
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn indexed_query_has_no_notice() {
        let dir = SqliteDirectory::new(Arc::new(Database::open_in_memory().unwrap()));
        seed(&dir, &[5, 1, 9]).await;

        let (cards, notice) = received_cards(&dir, "U2").await.unwrap();
        assert!(notice.is_none());
        let messages: Vec<&str> = cards.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, ["card 1", "card 0", "card 2"]);
    }

    #[tokio::test]
    async fn missing_index_sorts_locally_with_notice() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dir = SqliteDirectory::new(db.clone());
        seed(&dir, &[5, 1, 9]).await;
        db.drop_index(RECIPIENT_INDEX).unwrap();

        let (cards, notice) = received_cards(&dir, "U2").await.unwrap();
        assert_eq!(notice.unwrap().level, NoticeLevel::Info);
        let messages: Vec<&str> = cards.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, ["card 1", "card 0", "card 2"]);
    }

    #[tokio::test]
    async fn sent_cards_are_newest_first() {
        let dir = SqliteDirectory::new(Arc::new(Database::open_in_memory().unwrap()));
        seed(&dir, &[3, 30, 1]).await;

        let cards = sent_cards(&dir, "U1").await.unwrap();
        let messages: Vec<&str> = cards.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, ["card 2", "card 0", "card 1"]);
    }
}
