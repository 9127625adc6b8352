use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};

use thiep_core::AppError;
use thiep_types::api::{Claims, FriendsResponse};

use crate::auth::AppStateInner;
use crate::error::ApiError;

/// Everyone but the caller, most recently seen first.
pub async fn list_friends(
    State(state): State<Arc<AppStateInner>>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let friends = state
        .directory
        .list_profiles()
        .await
        .map_err(AppError::Lookup)?
        .into_iter()
        .filter(|p| p.id != claims.sub)
        .collect();

    Ok(Json(FriendsResponse { friends }))
}
