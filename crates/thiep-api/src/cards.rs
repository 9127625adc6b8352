use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

use thiep_core::AppError;
use thiep_core::links::card_link;
use thiep_core::listing::{received_cards, sent_cards};
use thiep_core::send::{Addressing, Author, CardContent};
use thiep_types::api::{CardListResponse, Claims, SendCardRequest, SendCardResponse};

use crate::auth::AppStateInner;
use crate::error::ApiError;
use crate::middleware::identity_from_claims;

/// Public: anyone holding a shared link can open the card.
pub async fn get_card(
    State(state): State<Arc<AppStateInner>>,
    Path(card_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let card = state
        .directory
        .get_card(&card_id)
        .await
        .map_err(AppError::Lookup)?
        .ok_or_else(|| AppError::NotFound("thiệp".into()))?;

    Ok(Json(card))
}

pub async fn send_card(
    State(state): State<Arc<AppStateInner>>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author = Author::from_identity(Some(&identity_from_claims(&claims)));

    // The friend list only speeds up resolution; the resolver falls back to
    // the directory without it.
    let known_users: Vec<_> = match state.directory.list_profiles().await {
        Ok(profiles) => profiles.into_iter().filter(|p| p.id != claims.sub).collect(),
        Err(e) => {
            warn!("Friend list unavailable while sending: {}", e);
            Vec::new()
        }
    };

    let content = CardContent {
        message: req.message,
        background: req.background,
        font_family: req.font_family,
        stickers: req.stickers,
    };
    let addressing = Addressing {
        manual_token: &req.recipient,
        selected_friend_id: &req.selected_friend_id,
        known_users: &known_users,
    };

    // The notification runs on its own; the response does not wait for it.
    let outcome = state.sender.send(&author, content, addressing).await?;
    let share_link = card_link(state.sender.origin(), &outcome.card.id);

    Ok((
        StatusCode::CREATED,
        Json(SendCardResponse { card: outcome.card, share_link }),
    ))
}

pub async fn sent(
    State(state): State<Arc<AppStateInner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let cards = sent_cards(state.directory.as_ref(), &claims.sub).await?;
    Ok(Json(CardListResponse { cards, notice: None }))
}

pub async fn received(
    State(state): State<Arc<AppStateInner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let (cards, notice) = received_cards(state.directory.as_ref(), &claims.sub).await?;
    Ok(Json(CardListResponse { cards, notice: notice.map(|n| n.text) }))
}
