//! Notification emitter for subscription lifecycle events.
//!
//! The core guarantees one event per successful state transition; this
//! module persists the event row and then attempts delivery. Three modes:
//!
//! 1. POST to a webhook URL (for DIY delivery pipelines)
//! 2. Send via Resend API
//! 3. Disabled (persist + log only)
//!
//! Delivery runs after the state transaction has committed and is
//! best-effort: a delivery failure is logged, never propagated into the
//! lifecycle operation (at-least-once from the consumer's point of view).

use reqwest::Client;
use serde::Serialize;

use crate::config::Config;
use crate::models::{Account, Notification};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// What happened to a delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Email was sent via Resend
    Sent,
    /// Event was POSTed to the configured webhook URL
    WebhookCalled,
    /// Delivery is disabled; the persisted row is the only output
    Disabled,
    /// Mode requires credentials that are not configured
    NotConfigured,
    /// The outbound call failed; the event row still exists
    Failed,
}

#[derive(Clone)]
enum Mode {
    Disabled,
    Webhook,
    Resend,
}

#[derive(Clone)]
pub struct Notifier {
    mode: Mode,
    webhook_url: Option<String>,
    resend_api_key: Option<String>,
    from_email: Option<String>,
    client: Client,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    account_id: &'a str,
    email: &'a str,
    kind: &'a str,
    heading: &'a str,
    content: &'a str,
    category: &'a str,
    created_at: i64,
}

#[derive(Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl Notifier {
    pub fn from_config(config: &Config) -> Self {
        let mode = match config.notify_mode.as_str() {
            "webhook" => Mode::Webhook,
            "resend" => Mode::Resend,
            _ => Mode::Disabled,
        };
        Self {
            mode,
            webhook_url: config.notify_webhook_url.clone(),
            resend_api_key: config.resend_api_key.clone(),
            from_email: config.notify_from_email.clone(),
            client: Client::new(),
        }
    }

    /// A notifier that only persists rows. Used by tests and as the
    /// default when no delivery mode is configured.
    pub fn disabled() -> Self {
        Self {
            mode: Mode::Disabled,
            webhook_url: None,
            resend_api_key: None,
            from_email: None,
            client: Client::new(),
        }
    }

    /// Attempt outbound delivery of an already-persisted notification.
    pub async fn deliver(&self, account: &Account, notification: &Notification) -> DeliveryResult {
        let result = match self.mode {
            Mode::Disabled => DeliveryResult::Disabled,
            Mode::Webhook => self.deliver_webhook(account, notification).await,
            Mode::Resend => self.deliver_resend(account, notification).await,
        };

        match result {
            DeliveryResult::Failed => tracing::warn!(
                kind = notification.kind.as_ref(),
                account_id = %notification.account_id,
                "Notification delivery failed"
            ),
            outcome => tracing::debug!(
                kind = notification.kind.as_ref(),
                account_id = %notification.account_id,
                ?outcome,
                "Notification emitted"
            ),
        }

        result
    }

    async fn deliver_webhook(&self, account: &Account, n: &Notification) -> DeliveryResult {
        let Some(url) = &self.webhook_url else {
            return DeliveryResult::NotConfigured;
        };

        let payload = WebhookPayload {
            account_id: &n.account_id,
            email: &account.email,
            kind: n.kind.as_ref(),
            heading: &n.heading,
            content: &n.content,
            category: &n.category,
            created_at: n.created_at,
        };

        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => DeliveryResult::WebhookCalled,
            _ => DeliveryResult::Failed,
        }
    }

    async fn deliver_resend(&self, account: &Account, n: &Notification) -> DeliveryResult {
        let (Some(api_key), Some(from)) = (&self.resend_api_key, &self.from_email) else {
            return DeliveryResult::NotConfigured;
        };

        let payload = ResendPayload {
            from,
            to: &account.email,
            subject: &n.heading,
            text: &n.content,
        };

        match self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => DeliveryResult::Sent,
            _ => DeliveryResult::Failed,
        }
    }
}
