use serde::{Deserialize, Serialize};

use crate::models::{BackgroundStyle, Card, FontFamily, StickerPlacement, UserProfile};

// -- JWT Claims --

/// Bearer token claims. `sub` is the account id issued by the identity
/// provider; anonymous accounts get tokens too.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    pub anonymous: bool,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user_id: String,
    pub display_name: Option<String>,
    pub anonymous: bool,
    pub token: String,
}

// -- Users --

#[derive(Debug, Serialize)]
pub struct FriendsResponse {
    pub friends: Vec<UserProfile>,
}

// -- Cards --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendCardRequest {
    pub message: String,
    #[serde(default)]
    pub background: BackgroundStyle,
    #[serde(default)]
    pub font_family: FontFamily,
    #[serde(default)]
    pub stickers: Vec<StickerPlacement>,
    /// Free-text recipient: an account id or an email address.
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub selected_friend_id: String,
}

#[derive(Debug, Serialize)]
pub struct SendCardResponse {
    pub card: Card,
    pub share_link: String,
}

#[derive(Debug, Serialize)]
pub struct CardListResponse {
    pub cards: Vec<Card>,
    /// Informational notice, set when the list came from a degraded query.
    pub notice: Option<String>,
}

// -- Chat --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendChatMessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
