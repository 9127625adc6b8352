use chrono::Utc;
use tracing::{debug, error};

use thiep_types::models::{ChatMessage, ChatThread};

use crate::error::{AppError, Result};
use crate::ports::Directory;

pub const THREAD_KEY_SEPARATOR: char = '_';

/// Canonical key of the conversation between `a` and `b`, independent of
/// argument order.
pub fn derive_thread_key(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{first}{THREAD_KEY_SEPARATOR}{second}")
}

/// Append `text` to the thread between `sender_id` and `peer_id` and merge
/// the thread metadata.
pub async fn send_chat_message(
    directory: &dyn Directory,
    sender_id: &str,
    sender_name: &str,
    peer_id: &str,
    text: &str,
) -> Result<ChatMessage> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Tin nhắn trống.".into()));
    }

    let key = derive_thread_key(sender_id, peer_id);
    let message = directory
        .append_message(&key, text, sender_id, sender_name)
        .await
        .map_err(|e| {
            error!("Failed to append message to {}: {}", key, e);
            AppError::Persistence(e)
        })?;

    let (first, second) = if sender_id <= peer_id {
        (sender_id, peer_id)
    } else {
        (peer_id, sender_id)
    };
    let thread = ChatThread {
        key: key.clone(),
        participant_ids: [first.to_string(), second.to_string()],
        last_message_text: message.text.clone(),
        updated_at: Utc::now(),
    };
    directory.upsert_thread(&thread).await.map_err(|e| {
        error!("Failed to update thread {}: {}", key, e);
        AppError::Persistence(e)
    })?;

    debug!("{} -> {} in {}", sender_id, peer_id, key);
    Ok(message)
}
