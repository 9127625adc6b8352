use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::{error, info, warn};

use thiep_core::AppError;
use thiep_core::error::IdentityError;
use thiep_core::identity::{LocalIdentity, Registration};
use thiep_core::ports::{Credentials, Directory, Identity};
use thiep_core::send::CardSender;
use thiep_types::api::{AuthResponse, LoginRequest, RegisterRequest};
use thiep_types::models::UserProfile;

use crate::error::ApiError;
use crate::middleware::create_token;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub directory: Arc<dyn Directory>,
    pub identity: LocalIdentity,
    pub sender: CardSender,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = state
        .identity
        .register(Registration {
            username: req.username,
            password: req.password,
            display_name: req.display_name,
            email: req.email,
            photo_url: req.photo_url,
        })
        .await
        .map_err(AppError::Identity)?;

    Ok((StatusCode::CREATED, Json(respond(&state, identity)?)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let identity = state
        .identity
        .authenticate(&Credentials { username: req.username, password: req.password })
        .await
        .map_err(AppError::Identity)?;

    let profile = UserProfile {
        id: identity.account_id.clone(),
        display_name: identity.display_name.clone(),
        email: identity.email.clone(),
        photo_url: identity.photo_url.clone(),
        last_seen: Utc::now(),
    };
    // No token without a stored profile; the client sees a blocking notice.
    if let Err(e) = state.directory.upsert_profile(&profile).await {
        warn!("Profile upsert for {} failed: {}", identity.account_id, e);
        return Err(AppError::Persistence(e).into());
    }

    info!("{} signed in", identity.account_id);
    Ok(Json(respond(&state, identity)?))
}

/// Mint a throwaway account so a card can be sent without registering.
pub async fn anonymous(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let identity = state
        .identity
        .create_anonymous()
        .await
        .map_err(AppError::Identity)?;

    Ok((StatusCode::CREATED, Json(respond(&state, identity)?)))
}

fn respond(state: &AppStateInner, identity: Identity) -> Result<AuthResponse, ApiError> {
    let token = create_token(&state.jwt_secret, &identity).map_err(|e| {
        error!("Token signing failed: {}", e);
        AppError::Identity(IdentityError::Backend(e.to_string()))
    })?;

    Ok(AuthResponse {
        user_id: identity.account_id,
        display_name: identity.display_name,
        anonymous: identity.anonymous,
        token,
    })
}
