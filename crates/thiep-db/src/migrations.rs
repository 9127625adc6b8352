use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Name of the index the received-cards query depends on.
pub const RECIPIENT_INDEX: &str = "idx_cards_recipient";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS accounts (
            id          TEXT PRIMARY KEY,
            username    TEXT UNIQUE,
            password    TEXT,
            anonymous   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            display_name  TEXT,
            email         TEXT,
            photo_url     TEXT,
            last_seen     TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_email
            ON users(email);

        CREATE TABLE IF NOT EXISTS cards (
            id                TEXT PRIMARY KEY,
            message           TEXT NOT NULL,
            background_kind   TEXT NOT NULL,
            background_value  TEXT NOT NULL,
            font_family       TEXT NOT NULL,
            stickers          TEXT NOT NULL,
            author_id         TEXT NOT NULL,
            author_name       TEXT NOT NULL,
            author_photo      TEXT,
            recipient         TEXT,
            recipient_id      TEXT,
            created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_cards_author
            ON cards(author_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_cards_recipient
            ON cards(recipient_id, created_at);

        CREATE TABLE IF NOT EXISTS chat_threads (
            key                TEXT PRIMARY KEY,
            participant_a      TEXT NOT NULL,
            participant_b      TEXT NOT NULL,
            last_message_text  TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chat_messages (
            id           TEXT PRIMARY KEY,
            thread_key   TEXT NOT NULL,
            text         TEXT NOT NULL,
            sender_id    TEXT NOT NULL,
            sender_name  TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_thread
            ON chat_messages(thread_key, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
