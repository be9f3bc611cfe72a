//! Transient user notifications and their telemetry side channel.
//!
//! - `NotificationQueue`: FIFO toast queue with per-entry expiry timers
//! - `TelemetryForwarder`: best-effort sink for error toasts (HTTP, log, no-op)

pub mod queue;
pub mod telemetry;

pub use queue::{NotificationQueue, Severity, ToastEntry, ToastEvent, ToastId, DEFAULT_TTL};
pub use telemetry::{
    forwarder_from_config, redact, EventContext, HttpForwarder, LogForwarder, NoopForwarder,
    ReportedError, TelemetryEvent, TelemetryForwarder, TOAST_ERROR,
};
