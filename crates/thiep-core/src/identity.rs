//! Identity provider backed by the local accounts table. Interactive
//! accounts carry an Argon2id password hash; anonymous accounts carry none.

use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info};
use uuid::Uuid;

use thiep_db::Database;
use thiep_db::models::ProfileRow;
use thiep_db::queries::format_timestamp;

use crate::error::IdentityError;
use crate::ports::{Credentials, Identity, IdentityProvider};

#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

pub struct LocalIdentity {
    db: Arc<Database>,
    current: watch::Sender<Option<Identity>>,
}

impl LocalIdentity {
    pub fn new(db: Arc<Database>) -> Self {
        let (current, _) = watch::channel(None);
        Self { db, current }
    }

    /// Create an interactive account and its initial profile.
    pub async fn register(&self, reg: Registration) -> Result<Identity, IdentityError> {
        if reg.username.len() < 3 || reg.username.len() > 32 {
            return Err(IdentityError::InvalidRegistration("username must be 3-32 characters"));
        }
        if reg.password.len() < 8 {
            return Err(IdentityError::InvalidRegistration("password must be at least 8 characters"));
        }

        let db = self.db.clone();
        blocking(move || {
            if db.get_account_by_username(&reg.username)?.is_some() {
                return Ok(Err(IdentityError::UsernameTaken));
            }

            let salt = SaltString::generate(&mut OsRng);
            let password_hash = Argon2::default()
                .hash_password(reg.password.as_bytes(), &salt)
                .map_err(|e| anyhow::anyhow!("hashing failed: {}", e))?
                .to_string();

            let account_id = Uuid::new_v4().to_string();
            // A concurrent registration can win between the check and here.
            if !db.create_account(&account_id, Some(&reg.username), Some(&password_hash), false)? {
                return Ok(Err(IdentityError::UsernameTaken));
            }
            db.upsert_profile(&ProfileRow {
                id: account_id.clone(),
                display_name: reg.display_name.clone(),
                email: reg.email.clone(),
                photo_url: reg.photo_url.clone(),
                last_seen: format_timestamp(&Utc::now()),
            })?;

            info!("Registered account {} ({})", reg.username, account_id);
            Ok(Ok(Identity {
                account_id,
                display_name: reg.display_name,
                email: reg.email,
                photo_url: reg.photo_url,
                anonymous: false,
            }))
        })
        .await?
    }

    /// Check credentials without changing the current identity.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Identity, IdentityError> {
        let db = self.db.clone();
        let credentials = credentials.clone();
        blocking(move || {
            let Some(account) = db.get_account_by_username(&credentials.username)? else {
                return Ok(Err(IdentityError::InvalidCredentials));
            };
            let Some(stored) = account.password.as_deref() else {
                return Ok(Err(IdentityError::InvalidCredentials));
            };

            let parsed = PasswordHash::new(stored)
                .map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
            if Argon2::default()
                .verify_password(credentials.password.as_bytes(), &parsed)
                .is_err()
            {
                return Ok(Err(IdentityError::InvalidCredentials));
            }

            let profile = db.get_profile(&account.id)?;
            Ok(Ok(Identity {
                account_id: account.id,
                display_name: profile.as_ref().and_then(|p| p.display_name.clone()),
                email: profile.as_ref().and_then(|p| p.email.clone()),
                photo_url: profile.and_then(|p| p.photo_url),
                anonymous: false,
            }))
        })
        .await?
    }

    /// Mint a fresh anonymous account without changing the current identity.
    pub async fn create_anonymous(&self) -> Result<Identity, IdentityError> {
        let db = self.db.clone();
        blocking(move || {
            let account_id = Uuid::new_v4().to_string();
            if !db.create_account(&account_id, None, None, true)? {
                anyhow::bail!("anonymous account {} collided", account_id);
            }
            Ok(Ok(Identity {
                account_id,
                display_name: None,
                email: None,
                photo_url: None,
                anonymous: true,
            }))
        })
        .await?
    }
}

/// Run account work off the async runtime. The outer error is an
/// infrastructure failure, the inner one a verdict on the request.
async fn blocking<T, F>(f: F) -> Result<Result<T, IdentityError>, IdentityError>
where
    F: FnOnce() -> anyhow::Result<Result<T, IdentityError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            IdentityError::Backend(e.to_string())
        })?
        .map_err(|e| {
            error!("Account store failure: {}", e);
            IdentityError::Backend(e.to_string())
        })
}

#[async_trait]
impl IdentityProvider for LocalIdentity {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Identity, IdentityError> {
        let identity = self.authenticate(credentials).await?;
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError> {
        let identity = self.create_anonymous().await?;
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.current.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalIdentity {
        LocalIdentity::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn registration(username: &str) -> Registration {
        Registration {
            username: username.into(),
            password: "correct horse".into(),
            display_name: Some("Minh".into()),
            email: Some("minh@example.com".into()),
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn register_then_sign_in() {
        let identity = provider();
        let registered = identity.register(registration("minh")).await.unwrap();

        let mut rx = identity.subscribe();
        assert!(rx.borrow_and_update().is_none());

        let signed_in = identity
            .sign_in(&Credentials { username: "minh".into(), password: "correct horse".into() })
            .await
            .unwrap();
        assert_eq!(signed_in.account_id, registered.account_id);
        assert_eq!(signed_in.email.as_deref(), Some("minh@example.com"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow().as_ref().map(|i| i.account_id.clone()), Some(registered.account_id));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let identity = provider();
        identity.register(registration("minh")).await.unwrap();

        let err = identity
            .sign_in(&Credentials { username: "minh".into(), password: "wrong password".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::InvalidCredentials));
        assert!(identity.subscribe().borrow().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let identity = provider();
        identity.register(registration("minh")).await.unwrap();
        let err = identity.register(registration("minh")).await.unwrap_err();
        assert!(matches!(err, IdentityError::UsernameTaken));
    }

    #[tokio::test]
    async fn racing_registrations_yield_one_account() {
        let identity = provider();
        let (a, b) = tokio::join!(
            identity.register(registration("minh")),
            identity.register(registration("minh")),
        );

        let taken = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(IdentityError::UsernameTaken)))
            .count();
        assert_eq!(taken, 1);
        assert!(a.is_ok() || b.is_ok());
    }

    #[tokio::test]
    async fn anonymous_accounts_are_distinct_and_cannot_log_in() {
        let identity = provider();
        let a = identity.sign_in_anonymously().await.unwrap();
        let b = identity.sign_in_anonymously().await.unwrap();
        assert!(a.anonymous);
        assert_ne!(a.account_id, b.account_id);

        identity.sign_out().await.unwrap();
        assert!(identity.subscribe().borrow().is_none());
    }
}
