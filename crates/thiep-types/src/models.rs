use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recipient id used for an email address with no matching account.
pub const GUEST_ID: &str = "guest";

/// Author id stamped on cards sent without any identity.
pub const ANONYMOUS_AUTHOR_ID: &str = "anonymous";

/// Maximum number of stickers a single card may carry.
pub const MAX_STICKERS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub last_seen: DateTime<Utc>,
}

/// Resolved addressing result, embedded verbatim into a card at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientDescriptor {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub photo: Option<String>,
}

impl RecipientDescriptor {
    pub fn is_guest(&self) -> bool {
        self.id == GUEST_ID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Glyph {
    #[serde(rename = "🎄")]
    Tree,
    #[serde(rename = "🎅")]
    Santa,
    #[serde(rename = "⛄")]
    Snowman,
    #[serde(rename = "🎁")]
    Gift,
    #[serde(rename = "⭐")]
    Star,
    #[serde(rename = "❄️")]
    Snowflake,
    #[serde(rename = "🔔")]
    Bell,
    #[serde(rename = "🦌")]
    Reindeer,
}

impl Glyph {
    pub const ALL: [Glyph; 8] = [
        Glyph::Tree,
        Glyph::Santa,
        Glyph::Snowman,
        Glyph::Gift,
        Glyph::Star,
        Glyph::Snowflake,
        Glyph::Bell,
        Glyph::Reindeer,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Tree => "🎄",
            Self::Santa => "🎅",
            Self::Snowman => "⛄",
            Self::Gift => "🎁",
            Self::Star => "⭐",
            Self::Snowflake => "❄️",
            Self::Bell => "🔔",
            Self::Reindeer => "🦌",
        }
    }
}

/// A sticker dropped onto a card. `x` and `y` are percentages of the card
/// width and height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerPlacement {
    pub id: String,
    pub glyph: Glyph,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum BackgroundStyle {
    Color(String),
    Gradient(String),
}

impl BackgroundStyle {
    pub const PRESET_COLORS: [&'static str; 4] = ["#fff", "#ffcccc", "#ccffcc", "#fff5cc"];

    pub const PRESET_GRADIENTS: [&'static str; 3] = [
        "linear-gradient(135deg, #c31432 0%, #240b36 100%)",
        "linear-gradient(135deg, #134e5e 0%, #71b280 100%)",
        "linear-gradient(135deg, #fceabb 0%, #f8b500 100%)",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Color(_) => "color",
            Self::Gradient(_) => "gradient",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Color(v) | Self::Gradient(v) => v,
        }
    }

    /// Rebuild a style from its stored `(kind, value)` pair.
    pub fn from_parts(kind: &str, value: String) -> Option<Self> {
        match kind {
            "color" => Some(Self::Color(value)),
            "gradient" => Some(Self::Gradient(value)),
            _ => None,
        }
    }
}

impl Default for BackgroundStyle {
    fn default() -> Self {
        Self::Color(Self::PRESET_COLORS[0].to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FontFamily {
    #[default]
    #[serde(rename = "Press Start 2P")]
    PressStart,
    #[serde(rename = "Dancing Script")]
    DancingScript,
    #[serde(rename = "Mountains of Christmas")]
    MountainsOfChristmas,
    #[serde(rename = "Roboto Mono")]
    RobotoMono,
}

impl FontFamily {
    pub fn css_name(self) -> &'static str {
        match self {
            Self::PressStart => "Press Start 2P",
            Self::DancingScript => "Dancing Script",
            Self::MountainsOfChristmas => "Mountains of Christmas",
            Self::RobotoMono => "Roboto Mono",
        }
    }

    pub fn from_css_name(name: &str) -> Option<Self> {
        [
            Self::PressStart,
            Self::DancingScript,
            Self::MountainsOfChristmas,
            Self::RobotoMono,
        ]
        .into_iter()
        .find(|f| f.css_name() == name)
    }
}

/// A card as persisted. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub message: String,
    pub background: BackgroundStyle,
    pub font_family: FontFamily,
    pub stickers: Vec<StickerPlacement>,
    pub author_id: String,
    pub author_name: String,
    pub author_photo: Option<String>,
    /// `None` means an unaddressed, public card.
    pub recipient: Option<RecipientDescriptor>,
    pub created_at: DateTime<Utc>,
}

/// Everything about a card except the store-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCard {
    pub message: String,
    pub background: BackgroundStyle,
    pub font_family: FontFamily,
    pub stickers: Vec<StickerPlacement>,
    pub author_id: String,
    pub author_name: String,
    pub author_photo: Option<String>,
    pub recipient: Option<RecipientDescriptor>,
    pub created_at: DateTime<Utc>,
}

impl NewCard {
    pub fn into_card(self, id: String) -> Card {
        Card {
            id,
            message: self.message,
            background: self.background,
            font_family: self.font_family,
            stickers: self.stickers,
            author_id: self.author_id,
            author_name: self.author_name,
            author_photo: self.author_photo,
            recipient: self.recipient,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatThread {
    pub key: String,
    pub participant_ids: [String; 2],
    pub last_message_text: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub thread_key: String,
    pub text: String,
    pub sender_id: String,
    pub sender_name: String,
    pub created_at: DateTime<Utc>,
}
