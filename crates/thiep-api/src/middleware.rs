use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use thiep_core::ports::Identity;
use thiep_types::api::Claims;

use crate::auth::AppState;

const TOKEN_TTL_DAYS: i64 = 30;

pub fn create_token(secret: &str, identity: &Identity) -> anyhow::Result<String> {
    let claims = Claims {
        sub: identity.account_id.clone(),
        name: identity.display_name.clone().unwrap_or_default(),
        email: identity.email.clone(),
        photo: identity.photo_url.clone(),
        anonymous: identity.anonymous,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// The identity a token was issued for.
pub fn identity_from_claims(claims: &Claims) -> Identity {
    Identity {
        account_id: claims.sub.clone(),
        display_name: Some(claims.name.clone()).filter(|n| !n.is_empty()),
        email: claims.email.clone(),
        photo_url: claims.photo.clone(),
        anonymous: claims.anonymous,
    }
}

pub fn decode_token(secret: &str, token: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// Extract and validate the JWT from the Authorization header. Browsers
/// cannot set headers on a WebSocket upgrade, so a `token` query parameter
/// is accepted as well.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let from_query = req
        .uri()
        .query()
        .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("token=")));

    let token = from_header.or(from_query).ok_or(StatusCode::UNAUTHORIZED)?;
    let claims = decode_token(&state.jwt_secret, token).ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_identity_fields() {
        let identity = Identity {
            account_id: "U1".into(),
            display_name: Some("Minh".into()),
            email: None,
            photo_url: None,
            anonymous: false,
        };
        let token = create_token("s3cret", &identity).unwrap();
        let claims = decode_token("s3cret", &token).unwrap();
        assert_eq!(claims.sub, "U1");
        assert_eq!(claims.name, "Minh");
        assert_eq!(identity_from_claims(&claims), identity);
        assert!(decode_token("other", &token).is_none());
    }
}
