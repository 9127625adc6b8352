use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::NotifyError;
use crate::ports::{Notification, Notifier};

/// Sends templated emails through an EmailJS-compatible HTTP relay.
#[derive(Clone)]
pub struct EmailRelay {
    client: reqwest::Client,
    config: RelayConfig,
}

#[derive(Debug, Serialize)]
struct RelayRequest<'a> {
    service_id: &'a str,
    template_id: &'a str,
    user_id: &'a str,
    template_params: TemplateParams<'a>,
}

#[derive(Debug, Serialize)]
struct TemplateParams<'a> {
    to_email: &'a str,
    from_name: &'a str,
    message: &'a str,
    link: &'a str,
    sender_id: &'a str,
}

impl EmailRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

fn request_body<'a>(config: &'a RelayConfig, n: &'a Notification) -> RelayRequest<'a> {
    RelayRequest {
        service_id: &config.service_id,
        template_id: &config.template_id,
        user_id: &config.public_key,
        template_params: TemplateParams {
            to_email: &n.to_email,
            from_name: &n.from_name,
            message: &n.message,
            link: &n.link,
            sender_id: &n.sender_id,
        },
    }
}

#[async_trait]
impl Notifier for EmailRelay {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request_body(&self.config, notification))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        debug!("Relay accepted email to {}", notification.to_email);
        Ok(())
    }
}

/// Used when no relay is configured: every notification is dropped.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!("Email relay disabled, not notifying {}", notification.to_email);
        Ok(())
    }
}
