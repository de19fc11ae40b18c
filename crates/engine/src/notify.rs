//! Outbound delivery of engagement events. Delivery is fire-and-forget: the
//! state change that produced an event is already committed, so every
//! failure here ends in a log line.

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use gigbook_core::config::NotificationConfig;
use gigbook_core::errors::ApplicationError;
use gigbook_core::events::{EngagementEvent, EventSink, TracingEventSink};

pub const SIGNATURE_HEADER: &str = "x-gigbook-signature";

type HmacSha256 = Hmac<Sha256>;

/// Posts each event as `{"event_type": ..., "payload": {...}}` to one
/// endpoint, signed with HMAC-SHA256 when a secret is configured.
#[derive(Clone)]
pub struct WebhookEventSink {
    client: Client,
    endpoint: String,
    signing_secret: Option<SecretString>,
}

impl WebhookEventSink {
    pub fn new(
        endpoint: impl Into<String>,
        signing_secret: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint: endpoint.into(), signing_secret })
    }

    /// `None` when notifications are disabled or have nowhere to go.
    pub fn from_config(config: &NotificationConfig) -> Result<Option<Self>, ApplicationError> {
        let Some(endpoint) = config.webhook_url.as_deref().filter(|_| config.enabled) else {
            return Ok(None);
        };
        Self::new(endpoint, config.signing_secret.clone(), Duration::from_secs(config.timeout_secs))
            .map(Some)
            .map_err(|error| {
                ApplicationError::Configuration(format!("notification client could not start: {error}"))
            })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn sign(&self, body: &[u8]) -> Option<String> {
        let secret = self.signing_secret.as_ref()?;
        hmac_hex(secret.expose_secret().as_bytes(), body)
    }
}

impl EventSink for WebhookEventSink {
    fn emit(&self, event: EngagementEvent) {
        let body = match serde_json::to_vec(&event) {
            Ok(body) => body,
            Err(error) => {
                warn!(
                    event_name = "notification.event.encode_failed",
                    event_type = event.event_type(),
                    error = %error,
                    "dropping event that could not be encoded"
                );
                return;
            }
        };

        let Ok(handle) = Handle::try_current() else {
            warn!(
                event_name = "notification.event.no_runtime",
                event_type = event.event_type(),
                subject_id = event.subject_id(),
                "dropping event emitted outside an async runtime"
            );
            return;
        };

        let signature = self.sign(&body);
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let event_type = event.event_type();
        let subject_id = event.subject_id().to_owned();

        handle.spawn(async move {
            let mut request =
                client.post(&endpoint).header("content-type", "application/json").body(body);
            if let Some(signature) = signature {
                request = request.header(SIGNATURE_HEADER, signature);
            }

            match request.send().await.and_then(|response| response.error_for_status()) {
                Ok(response) => debug!(
                    event_name = "notification.event.delivered",
                    event_type,
                    subject_id = %subject_id,
                    status = response.status().as_u16(),
                    "event delivered"
                ),
                Err(error) => warn!(
                    event_name = "notification.event.delivery_failed",
                    event_type,
                    subject_id = %subject_id,
                    error = %error,
                    "event delivery failed"
                ),
            }
        });
    }
}

/// The webhook sink when notifications are enabled, otherwise log-only.
pub fn build_event_sink(config: &NotificationConfig) -> Result<Arc<dyn EventSink>, ApplicationError> {
    Ok(match WebhookEventSink::from_config(config)? {
        Some(webhook) => Arc::new(webhook),
        None => Arc::new(TracingEventSink),
    })
}

fn hmac_hex(secret: &[u8], payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(encode_hex(mac.finalize().into_bytes().as_slice()))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push_str(&format!("{byte:02x}"));
    }
    output
}
