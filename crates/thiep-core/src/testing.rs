//! Collaborator doubles shared by the unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::{IdentityError, NotifyError};
use crate::ports::{Credentials, Identity, IdentityProvider, Notification, Notifier};

/// Records every notification; fails each one when `fail` is set.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(notification.clone());
        if self.fail { Err(NotifyError::Rejected(503)) } else { Ok(()) }
    }
}

/// Identity provider whose sign-ins always fail.
pub struct UnavailableIdentity {
    current: watch::Sender<Option<Identity>>,
}

impl Default for UnavailableIdentity {
    fn default() -> Self {
        Self { current: watch::channel(None).0 }
    }
}

#[async_trait]
impl IdentityProvider for UnavailableIdentity {
    async fn sign_in(&self, _: &Credentials) -> Result<Identity, IdentityError> {
        Err(IdentityError::Backend("offline".into()))
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, IdentityError> {
        Err(IdentityError::Backend("offline".into()))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.current.send_replace(None);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}
