use crate::Database;
use crate::models::{AccountRow, CardRow, ChatMessageRow, ProfileRow, ThreadRow};
use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row};

/// Timestamps are stored as fixed-width RFC 3339 strings so that text
/// ordering matches time ordering.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

const CARD_COLUMNS: &str = "id, message, background_kind, background_value, font_family, stickers, \
     author_id, author_name, author_photo, recipient, recipient_id, created_at";

const PROFILE_COLUMNS: &str = "id, display_name, email, photo_url, last_seen";

impl Database {
    // -- Accounts --

    /// Returns false when the username is already taken.
    pub fn create_account(
        &self,
        id: &str,
        username: Option<&str>,
        password_hash: Option<&str>,
        anonymous: bool,
    ) -> Result<bool> {
        let created_at = format_timestamp(&Utc::now());
        self.with_conn_mut(|conn| {
            match conn.execute(
                "INSERT INTO accounts (id, username, password, anonymous, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, username, password_hash, anonymous, created_at],
            ) {
                Ok(_) => Ok(true),
                // The username index is the only UNIQUE one on this table.
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_account_by_username(&self, username: &str) -> Result<Option<AccountRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, username, password, anonymous, created_at FROM accounts WHERE username = ?1",
                [username],
                |row| {
                    Ok(AccountRow {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        password: row.get(2)?,
                        anonymous: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    // -- Profiles --

    /// Create-or-merge. Absent optional fields keep their stored values;
    /// `last_seen` is always overwritten.
    pub fn upsert_profile(&self, profile: &ProfileRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, display_name, email, photo_url, last_seen)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     display_name = COALESCE(excluded.display_name, users.display_name),
                     email        = COALESCE(excluded.email, users.email),
                     photo_url    = COALESCE(excluded.photo_url, users.photo_url),
                     last_seen    = excluded.last_seen",
                rusqlite::params![
                    profile.id,
                    profile.display_name,
                    profile.email,
                    profile.photo_url,
                    profile.last_seen,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = ?1");
            conn.query_row(&sql, [id], profile_from_row).optional()
        })
    }

    /// Exact, case-sensitive email match.
    pub fn find_profile_by_email(&self, email: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE email = ?1 LIMIT 1");
            conn.query_row(&sql, [email], profile_from_row).optional()
        })
    }

    /// All profiles, most recently seen first.
    pub fn list_profiles(&self) -> Result<Vec<ProfileRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {PROFILE_COLUMNS} FROM users ORDER BY last_seen DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], profile_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Cards --

    pub fn insert_card(&self, card: &CardRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            let sql = format!(
                "INSERT INTO cards ({CARD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            );
            conn.execute(
                &sql,
                rusqlite::params![
                    card.id,
                    card.message,
                    card.background_kind,
                    card.background_value,
                    card.font_family,
                    card.stickers,
                    card.author_id,
                    card.author_name,
                    card.author_photo,
                    card.recipient,
                    card.recipient_id,
                    card.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_card(&self, id: &str) -> Result<Option<CardRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {CARD_COLUMNS} FROM cards WHERE id = ?1");
            conn.query_row(&sql, [id], card_from_row).optional()
        })
    }

    /// Cards written by `author_id`, newest first.
    pub fn cards_by_author(&self, author_id: &str) -> Result<Vec<CardRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {CARD_COLUMNS} FROM cards WHERE author_id = ?1 ORDER BY created_at DESC, rowid DESC"
            );
            query_cards(conn, &sql, author_id)
        })
    }

    /// Cards addressed to `recipient_id`. When `ordered` is false the rows
    /// come back in storage order and the caller sorts.
    pub fn cards_by_recipient(&self, recipient_id: &str, ordered: bool) -> Result<Vec<CardRow>> {
        self.with_conn(|conn| {
            let sql = if ordered {
                format!(
                    "SELECT {CARD_COLUMNS} FROM cards INDEXED BY idx_cards_recipient
                     WHERE recipient_id = ?1 ORDER BY created_at DESC"
                )
            } else {
                format!("SELECT {CARD_COLUMNS} FROM cards WHERE recipient_id = ?1")
            };
            query_cards(conn, &sql, recipient_id)
        })
    }

    pub fn has_index(&self, name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [name],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    pub fn drop_index(&self, name: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute_batch(&format!("DROP INDEX IF EXISTS {name}"))?;
            Ok(())
        })
    }

    // -- Chat --

    pub fn upsert_thread(&self, thread: &ThreadRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_threads (key, participant_a, participant_b, last_message_text, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                     last_message_text = excluded.last_message_text,
                     updated_at        = excluded.updated_at",
                rusqlite::params![
                    thread.key,
                    thread.participant_a,
                    thread.participant_b,
                    thread.last_message_text,
                    thread.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_thread(&self, key: &str) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT key, participant_a, participant_b, last_message_text, updated_at
                 FROM chat_threads WHERE key = ?1",
                [key],
                |row| {
                    Ok(ThreadRow {
                        key: row.get(0)?,
                        participant_a: row.get(1)?,
                        participant_b: row.get(2)?,
                        last_message_text: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Append a message. The store stamps `created_at`.
    pub fn insert_message(
        &self,
        id: &str,
        thread_key: &str,
        text: &str,
        sender_id: &str,
        sender_name: &str,
    ) -> Result<ChatMessageRow> {
        let created_at = format_timestamp(&Utc::now());
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, thread_key, text, sender_id, sender_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, thread_key, text, sender_id, sender_name, created_at],
            )?;
            Ok(ChatMessageRow {
                id: id.to_string(),
                thread_key: thread_key.to_string(),
                text: text.to_string(),
                sender_id: sender_id.to_string(),
                sender_name: sender_name.to_string(),
                created_at,
            })
        })
    }

    /// Messages of one thread, oldest first.
    pub fn get_messages(&self, thread_key: &str) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, thread_key, text, sender_id, sender_name, created_at
                 FROM chat_messages
                 WHERE thread_key = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;

            let rows = stmt
                .query_map([thread_key], |row| {
                    Ok(ChatMessageRow {
                        id: row.get(0)?,
                        thread_key: row.get(1)?,
                        text: row.get(2)?,
                        sender_id: row.get(3)?,
                        sender_name: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        display_name: row.get(1)?,
        email: row.get(2)?,
        photo_url: row.get(3)?,
        last_seen: row.get(4)?,
    })
}

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<CardRow> {
    Ok(CardRow {
        id: row.get(0)?,
        message: row.get(1)?,
        background_kind: row.get(2)?,
        background_value: row.get(3)?,
        font_family: row.get(4)?,
        stickers: row.get(5)?,
        author_id: row.get(6)?,
        author_name: row.get(7)?,
        author_photo: row.get(8)?,
        recipient: row.get(9)?,
        recipient_id: row.get(10)?,
        created_at: row.get(11)?,
    })
}

fn query_cards(conn: &Connection, sql: &str, key: &str) -> Result<Vec<CardRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([key], card_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
