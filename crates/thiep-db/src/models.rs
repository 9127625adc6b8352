//! Row types as stored in SQLite. JSON columns stay as strings here;
//! decoding them is the caller's job.

pub struct AccountRow {
    pub id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub anonymous: bool,
    pub created_at: String,
}

pub struct ProfileRow {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub last_seen: String,
}

pub struct CardRow {
    pub id: String,
    pub message: String,
    pub background_kind: String,
    pub background_value: String,
    pub font_family: String,
    /// JSON array of sticker placements.
    pub stickers: String,
    pub author_id: String,
    pub author_name: String,
    pub author_photo: Option<String>,
    /// JSON recipient descriptor, absent for public cards.
    pub recipient: Option<String>,
    pub recipient_id: Option<String>,
    pub created_at: String,
}

pub struct ThreadRow {
    pub key: String,
    pub participant_a: String,
    pub participant_b: String,
    pub last_message_text: String,
    pub updated_at: String,
}

pub struct ChatMessageRow {
    pub id: String,
    pub thread_key: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub created_at: String,
}
