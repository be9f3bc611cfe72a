//! Forwarding of error notifications to an external monitoring collector.
//!
//! Forwarding is best-effort: `send` never returns an error and never blocks
//! the caller. The HTTP forwarder posts on a background task and only logs
//! when the collector cannot be reached.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::TelemetryConfig;

/// Context `type` for events raised by error toasts
pub const TOAST_ERROR: &str = "toast_error";

/// Fields that must never leave the client. Dotted names address nested
/// objects (`user.email` is `{"user": {"email": ...}}`) as well as the
/// literal flat key.
const REDACTED_FIELDS: &[&str] = &["user.email"];

/// Error-like value handed to the collector.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ReportedError {
    pub message: String,
}

impl ReportedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type EventContext = Map<String, Value>;

/// Wire form of a forwarded event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    pub error_message: String,
    pub context: EventContext,
}

impl TelemetryEvent {
    pub fn new(error: &ReportedError, mut context: EventContext) -> Self {
        redact(&mut context);
        Self {
            error_message: error.message.clone(),
            context,
        }
    }
}

/// Strip personally identifying fields from an event context
pub fn redact(context: &mut EventContext) {
    for field in REDACTED_FIELDS {
        context.remove(*field);
        remove_path(context, field);
    }
}

fn remove_path(object: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            object.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = object.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

/// Receiver of error events. Implementations must not block and must
/// swallow their own failures.
pub trait TelemetryForwarder: Send + Sync {
    fn send(&self, error: ReportedError, context: EventContext);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopForwarder;

impl TelemetryForwarder for NoopForwarder {
    fn send(&self, _error: ReportedError, _context: EventContext) {}
}

/// Records events in the log only; used when no collector is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogForwarder;

impl TelemetryForwarder for LogForwarder {
    fn send(&self, error: ReportedError, context: EventContext) {
        let event = TelemetryEvent::new(&error, context);
        error!(message = %event.error_message, context = ?event.context, "Telemetry event");
    }
}

#[derive(Debug, Serialize)]
struct CollectorPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
    #[serde(flatten)]
    event: &'a TelemetryEvent,
}

/// Posts events as JSON to a collector endpoint.
/// Clone is cheap - reqwest::Client shares its connection pool.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpForwarder {
    pub fn new(endpoint: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build telemetry HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            token,
        })
    }

    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        Self::new(
            &config.endpoint,
            config.token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn payload(&self, event: &TelemetryEvent) -> Result<Value> {
        let payload = CollectorPayload {
            token: self.token.as_deref(),
            event,
        };
        serde_json::to_value(&payload).context("Failed to serialize telemetry event")
    }
}

impl TelemetryForwarder for HttpForwarder {
    fn send(&self, error: ReportedError, context: EventContext) {
        let event = TelemetryEvent::new(&error, context);
        let body = match self.payload(&event) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Dropping telemetry event");
                return;
            }
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime available, dropping telemetry event");
            return;
        };

        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        runtime.spawn(async move {
            match client.post(&endpoint).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(status = %response.status(), "Telemetry event delivered");
                }
                Ok(response) => {
                    warn!(status = %response.status(), "Telemetry collector rejected event");
                }
                Err(e) => {
                    warn!(error = %e, "Failed to deliver telemetry event");
                }
            }
        });
    }
}

/// Pick a forwarder for the configuration: HTTP when a collector is
/// configured, log-only otherwise.
pub fn forwarder_from_config(config: Option<&TelemetryConfig>) -> Arc<dyn TelemetryForwarder> {
    let Some(config) = config else {
        return Arc::new(LogForwarder);
    };
    match HttpForwarder::from_config(config) {
        Ok(forwarder) => Arc::new(forwarder),
        Err(e) => {
            warn!(error = %e, "Telemetry collector unavailable, logging events instead");
            Arc::new(LogForwarder)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
