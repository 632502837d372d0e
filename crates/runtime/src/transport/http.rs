//! HTTP transport implementations.
//!
//! Uses `ureq` (sync) wrapped in `tokio::task::spawn_blocking` to avoid
//! blocking the async runtime. An optional bearer token is attached to
//! every request. HTTP 400 classifies as permanent; every other failure
//! (including transport-level errors) as transient.

use std::time::Duration;

use async_trait::async_trait;
use waymark_core::{FunnelEvent, ReplayChunk};

use super::{BeaconTransport, DefinitionSource, EventTransport, ReplayTransport, TransportError};

/// How long the unload beacon is allowed to spend before being abandoned.
const BEACON_TIMEOUT_MS: u64 = 500;

fn classify(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::StatusCode(code) => TransportError::from_status(code),
        other => TransportError::Transient {
            message: other.to_string(),
        },
    }
}

fn post_json(
    url: &str,
    auth_token: Option<&str>,
    body: &serde_json::Value,
) -> Result<(), TransportError> {
    let agent = ureq::Agent::new_with_defaults();
    let mut request = agent.post(url);
    if let Some(token) = auth_token {
        request = request.header("Authorization", &format!("Bearer {}", token));
    }
    request.send_json(body).map_err(classify)?;
    Ok(())
}

/// POSTs one funnel event per request to the ingestion endpoint.
pub struct HttpEventTransport {
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpEventTransport {
    pub fn new(endpoint: impl Into<String>, auth_token: Option<String>) -> Self {
        HttpEventTransport {
            endpoint: endpoint.into(),
            auth_token,
        }
    }
}

#[async_trait]
impl EventTransport for HttpEventTransport {
    async fn send_event(&self, event: &FunnelEvent) -> Result<(), TransportError> {
        let url = self.endpoint.clone();
        let token = self.auth_token.clone();
        let body = serde_json::to_value(event).map_err(|e| TransportError::Transient {
            message: format!("serialize event: {}", e),
        })?;

        tokio::task::spawn_blocking(move || post_json(&url, token.as_deref(), &body))
            .await
            .map_err(|e| TransportError::Transient {
                message: format!("task join error: {}", e),
            })?
    }
}

/// POSTs replay chunks to the replay endpoint.
pub struct HttpReplayTransport {
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpReplayTransport {
    pub fn new(endpoint: impl Into<String>, auth_token: Option<String>) -> Self {
        HttpReplayTransport {
            endpoint: endpoint.into(),
            auth_token,
        }
    }
}

#[async_trait]
impl ReplayTransport for HttpReplayTransport {
    async fn send_chunk(&self, chunk: &ReplayChunk) -> Result<(), TransportError> {
        let url = self.endpoint.clone();
        let token = self.auth_token.clone();
        let body = serde_json::to_value(chunk).map_err(|e| TransportError::Transient {
            message: format!("serialize chunk: {}", e),
        })?;

        tokio::task::spawn_blocking(move || post_json(&url, token.as_deref(), &body))
            .await
            .map_err(|e| TransportError::Transient {
                message: format!("task join error: {}", e),
            })?
    }
}

/// Fire-and-forget unload transport.
///
/// Dispatches the request from a detached thread with a short global
/// timeout and never reports the outcome -- the page is being torn down,
/// so there is nobody left to react to it. The returned `bool` only says
/// the payload was handed off.
pub struct HttpBeaconTransport {
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpBeaconTransport {
    pub fn new(endpoint: impl Into<String>, auth_token: Option<String>) -> Self {
        HttpBeaconTransport {
            endpoint: endpoint.into(),
            auth_token,
        }
    }
}

impl BeaconTransport for HttpBeaconTransport {
    fn send_beacon(&self, chunk: &ReplayChunk) -> bool {
        let url = self.endpoint.clone();
        let token = self.auth_token.clone();
        let body = match serde_json::to_value(chunk) {
            Ok(body) => body,
            Err(_) => return false,
        };

        std::thread::spawn(move || {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(Duration::from_millis(BEACON_TIMEOUT_MS)))
                .build()
                .into();
            let mut request = agent.post(&url);
            if let Some(ref token) = token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }
            if let Err(e) = request.send_json(&body) {
                tracing::debug!(error = %e, "beacon send failed");
            }
        });
        true
    }
}

/// GETs `{endpoint}?website_id=...` and returns the raw JSON payload.
pub struct HttpDefinitionSource {
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpDefinitionSource {
    pub fn new(endpoint: impl Into<String>, auth_token: Option<String>) -> Self {
        HttpDefinitionSource {
            endpoint: endpoint.into(),
            auth_token,
        }
    }
}

#[async_trait]
impl DefinitionSource for HttpDefinitionSource {
    async fn fetch_definitions(
        &self,
        website_id: &str,
    ) -> Result<serde_json::Value, TransportError> {
        let url = format!(
            "{}?website_id={}",
            self.endpoint.trim_end_matches('/'),
            website_id
        );
        let token = self.auth_token.clone();

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let mut request = agent.get(&url);
            if let Some(ref token) = token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }
            let response = request.call().map_err(classify)?;
            response
                .into_body()
                .read_json()
                .map_err(|e| TransportError::Transient {
                    message: format!("failed to parse definitions as JSON: {}", e),
                })
        })
        .await
        .map_err(|e| TransportError::Transient {
            message: format!("task join error: {}", e),
        })?
    }
}
