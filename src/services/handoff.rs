//! Staff notification sent after a request is stored.
//!
//! The queue write is already committed when this runs; nothing here can fail
//! the submission.

use futures::future::BoxFuture;
use thiserror::Error;
use tracing::{info, warn};
use url::form_urlencoded;

use crate::state::queue::SongRequest;

const DEEP_LINK_BASE: &str = "https://wa.me/";

/// Whether the opener actually reached staff or left it to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The client is expected to open the link itself.
    Deferred,
}

#[derive(Debug, Error)]
pub enum HandoffError {
    #[cfg(feature = "webhook-handoff")]
    #[error("failed to reach handoff webhook")]
    Send {
        #[source]
        source: reqwest::Error,
    },
    #[error("handoff webhook answered with status {status}")]
    Rejected { status: u16 },
}

/// Message and link handed to the staff contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffLink {
    pub message: String,
    pub url: String,
}

/// What happened to the hand-off; returned to the patron with the stored request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffReport {
    pub url: String,
    pub message: String,
    pub delivered: bool,
}

/// Something able to open a messaging deep link on behalf of the patron.
pub trait DeepLinkOpener: Send + Sync {
    fn open(&self, link: HandoffLink) -> BoxFuture<'static, Result<Delivery, HandoffError>>;
}

/// Logs the link and leaves opening it to the client.
pub struct LoggingOpener;

impl DeepLinkOpener for LoggingOpener {
    fn open(&self, link: HandoffLink) -> BoxFuture<'static, Result<Delivery, HandoffError>> {
        Box::pin(async move {
            info!(url = %link.url, "handoff link ready for client");
            Ok(Delivery::Deferred)
        })
    }
}

/// Posts the hand-off to an HTTP endpoint (a messaging gateway, a bot, ...).
#[cfg(feature = "webhook-handoff")]
pub struct WebhookOpener {
    client: reqwest::Client,
    endpoint: String,
}

#[cfg(feature = "webhook-handoff")]
impl WebhookOpener {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[cfg(feature = "webhook-handoff")]
#[derive(serde::Serialize)]
struct WebhookPayload {
    message: String,
    url: String,
}

#[cfg(feature = "webhook-handoff")]
impl DeepLinkOpener for WebhookOpener {
    fn open(&self, link: HandoffLink) -> BoxFuture<'static, Result<Delivery, HandoffError>> {
        let request = self.client.post(&self.endpoint).json(&WebhookPayload {
            message: link.message,
            url: link.url,
        });
        Box::pin(async move {
            let response = request
                .send()
                .await
                .map_err(|source| HandoffError::Send { source })?;
            if response.status().is_success() {
                Ok(Delivery::Delivered)
            } else {
                Err(HandoffError::Rejected {
                    status: response.status().as_u16(),
                })
            }
        })
    }
}

/// Staff-facing text for a stored request.
pub fn compose_message(request: &SongRequest) -> String {
    let mut message = format!(
        "🎤 Novo Pedido de Karaokê! 🎤\n\n*Nome:* {}\n*Mesa:* {}\n\n*Música:* {}\n*Artista:* {}",
        request.requester.name, request.requester.table, request.song.title, request.song.artist
    );
    if let Some(dedication) = request.dedication.as_deref() {
        message.push_str("\n\n*Dedicatória:* ");
        message.push_str(dedication);
    }
    message
}

/// `https://wa.me/<contact>?text=<message>` with the message percent-encoded.
pub fn deep_link(contact: &str, message: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(message.as_bytes()).collect();
    // form encoding writes spaces as '+'; literal '+' is already %2B.
    format!(
        "{DEEP_LINK_BASE}{contact}?text={}",
        encoded.replace('+', "%20")
    )
}

pub fn build_link(contact: &str, request: &SongRequest) -> HandoffLink {
    let message = compose_message(request);
    let url = deep_link(contact, &message);
    HandoffLink { message, url }
}

/// Best-effort hand-off. Failures are logged and reported as undelivered.
pub async fn dispatch(
    opener: &dyn DeepLinkOpener,
    contact: &str,
    request: &SongRequest,
) -> HandoffReport {
    let link = build_link(contact, request);
    let delivered = match opener.open(link.clone()).await {
        Ok(delivery) => delivery == Delivery::Delivered,
        Err(err) => {
            warn!(request_id = %request.id, error = %err, "staff handoff failed");
            false
        }
    };

    HandoffReport {
        url: link.url,
        message: link.message,
        delivered,
    }
}
