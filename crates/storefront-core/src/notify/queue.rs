//! Toast notification queue.
//!
//! Entries are shown in insertion order and removed either by the user or
//! by their own expiry timer. Each entry owns an independent timer task, so
//! dismissing one never disturbs the others. Error toasts are forwarded to
//! telemetry exactly once, when they are created.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::telemetry::{redact, EventContext, ReportedError, TelemetryForwarder, TOAST_ERROR};

/// How long a toast stays visible unless a TTL is given explicitly
pub const DEFAULT_TTL: Duration = Duration::from_millis(3000);

/// Buffered toast events per subscriber. A display that lags further
/// behind than this only misses events, the queue itself is unaffected.
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToastId(pub u64);

impl fmt::Display for ToastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Severity {
    #[default]
    Info,
    Success,
    Error,
}

impl Severity {
    /// Parse a severity name. Names are matched exactly; anything else,
    /// including a different case, falls back to `Info`.
    pub fn parse(s: &str) -> Self {
        Self::from_name(s).unwrap_or_default()
    }

    /// Exact severity name, or `None` if `s` is not one
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "success" => Some(Severity::Success),
            "error" => Some(Severity::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ToastEntry {
    #[cfg_attr(feature = "ts", ts(type = "number"))]
    pub id: ToastId,
    pub message: String,
    pub severity: Severity,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
    pub ttl_ms: u64,
}

/// Change notifications for displays rendering the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastEvent {
    Shown(ToastEntry),
    Dismissed(ToastId),
    Expired(ToastId),
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    entries: Vec<ToastEntry>,
    timers: HashMap<ToastId, JoinHandle<()>>,
}

impl QueueState {
    fn remove_entry(&mut self, id: ToastId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }
}

impl Drop for QueueState {
    fn drop(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }
}

fn lock(state: &Mutex<QueueState>) -> MutexGuard<'_, QueueState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared handle to the toast queue. Clones refer to the same queue.
#[derive(Clone)]
pub struct NotificationQueue {
    state: Arc<Mutex<QueueState>>,
    forwarder: Arc<dyn TelemetryForwarder>,
    default_ttl: Duration,
    base_context: EventContext,
    events: broadcast::Sender<ToastEvent>,
}

impl NotificationQueue {
    pub fn new(forwarder: Arc<dyn TelemetryForwarder>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            forwarder,
            default_ttl: DEFAULT_TTL,
            base_context: EventContext::new(),
            events,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Extra context sent with every telemetry event (release, route, ...).
    /// The `type` field is always overwritten with `toast_error`.
    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.base_context.insert(key.to_string(), value.into());
        self
    }

    /// Application-facing entry point. `severity` is a raw name; anything
    /// unrecognised, or none at all, is shown as info.
    pub fn show_toast(&self, message: &str, severity: Option<&str>) -> ToastId {
        let severity = severity.map(Severity::parse).unwrap_or_default();
        self.enqueue(message, severity)
    }

    pub fn enqueue(&self, message: impl Into<String>, severity: Severity) -> ToastId {
        self.enqueue_with_ttl(message, severity, self.default_ttl)
    }

    pub fn enqueue_with_ttl(&self, message: impl Into<String>, severity: Severity, ttl: Duration) -> ToastId {
        let entry = {
            let mut state = lock(&self.state);
            state.next_id += 1;
            let entry = ToastEntry {
                id: ToastId(state.next_id),
                message: message.into(),
                severity,
                created_at: Utc::now(),
                ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
            };
            state.entries.push(entry.clone());

            // Both happen under the lock: the expiry task takes the same lock
            // before removing the entry, so `Shown` always precedes `Expired`
            // and the timer can never fire before its handle is known.
            let _ = self.events.send(ToastEvent::Shown(entry.clone()));
            if let Some(timer) = self.schedule_expiry(entry.id, ttl) {
                state.timers.insert(entry.id, timer);
            }
            entry
        };

        debug!(id = %entry.id, severity = %entry.severity, "Toast shown");
        if entry.severity == Severity::Error {
            self.forward(&entry);
        }
        entry.id
    }

    /// Remove a toast before it expires. Returns false if it was already gone.
    pub fn dismiss(&self, id: ToastId) -> bool {
        let removed = {
            let mut state = lock(&self.state);
            if let Some(timer) = state.timers.remove(&id) {
                timer.abort();
            }
            state.remove_entry(id)
        };

        if removed {
            debug!(id = %id, "Toast dismissed");
            let _ = self.events.send(ToastEvent::Dismissed(id));
        }
        removed
    }

    /// Live entries, oldest first
    pub fn visible(&self) -> Vec<ToastEntry> {
        lock(&self.state).entries.clone()
    }

    pub fn get(&self, id: ToastId) -> Option<ToastEntry> {
        lock(&self.state).entries.iter().find(|e| e.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.state).entries.is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToastEvent> {
        self.events.subscribe()
    }

    fn schedule_expiry(&self, id: ToastId, ttl: Duration) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(id = %id, "No async runtime available, toast will not expire");
            return None;
        };

        let state: Weak<Mutex<QueueState>> = Arc::downgrade(&self.state);
        let events = self.events.clone();
        Some(runtime.spawn(async move {
            tokio::time::sleep(ttl).await;
            let Some(state) = state.upgrade() else {
                return;
            };
            let removed = {
                let mut state = lock(&state);
                state.timers.remove(&id);
                state.remove_entry(id)
            };
            if removed {
                debug!(id = %id, "Toast expired");
                let _ = events.send(ToastEvent::Expired(id));
            }
        }))
    }

    fn forward(&self, entry: &ToastEntry) {
        let mut context = self.base_context.clone();
        context.insert("type".to_string(), Value::from(TOAST_ERROR));
        context.insert("toastId".to_string(), Value::from(entry.id.0));
        redact(&mut context);

        let error = ReportedError::new(entry.message.clone());
        let forwarder = Arc::clone(&self.forwarder);
        let sent = panic::catch_unwind(AssertUnwindSafe(move || forwarder.send(error, context)));
        if sent.is_err() {
            warn!(id = %entry.id, "Telemetry forwarder panicked, event dropped");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::telemetry::NoopForwarder;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingForwarder {
        calls: Mutex<Vec<(ReportedError, EventContext)>>,
    }

    impl RecordingForwarder {
        fn calls(&self) -> Vec<(ReportedError, EventContext)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TelemetryForwarder for RecordingForwarder {
        fn send(&self, error: ReportedError, context: EventContext) {
            self.calls.lock().unwrap().push((error, context));
        }
    }

    struct PanickingForwarder;

    impl TelemetryForwarder for PanickingForwarder {
        fn send(&self, _error: ReportedError, _context: EventContext) {
            panic!("collector exploded");
        }
    }

    fn queue() -> (NotificationQueue, Arc<RecordingForwarder>) {
        let forwarder = Arc::new(RecordingForwarder::default());
        (NotificationQueue::new(forwarder.clone()), forwarder)
    }

    fn messages(queue: &NotificationQueue) -> Vec<String> {
        queue.visible().into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("success"), Severity::Success);
        assert_eq!(Severity::parse("error"), Severity::Error);
        assert_eq!(Severity::parse("info"), Severity::Info);
        assert_eq!(Severity::parse("warning"), Severity::Info);
        assert_eq!(Severity::parse(""), Severity::Info);
        // Names are case and whitespace sensitive
        assert_eq!(Severity::parse("ERROR"), Severity::Info);
        assert_eq!(Severity::parse(" error "), Severity::Info);
        assert_eq!(Severity::from_name("Success"), None);
    }

    #[tokio::test]
    async fn test_show_toast_severity_is_case_sensitive() {
        let (queue, forwarder) = queue();
        let id = queue.show_toast("x", Some("ERROR"));
        assert_eq!(queue.get(id).unwrap().severity, Severity::Info);
        assert!(forwarder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_success_toast_is_visible_without_telemetry() {
        let (queue, forwarder) = queue();
        let id = queue.enqueue("hello", Severity::Success);

        let visible = queue.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, id);
        assert_eq!(visible[0].message, "hello");
        assert_eq!(visible[0].severity, Severity::Success);
        assert_eq!(visible[0].ttl_ms, 3000);
        assert!(forwarder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_error_toast_forwards_once() {
        let (queue, forwarder) = queue();
        queue.enqueue("boom", Severity::Error);

        let calls = forwarder.calls();
        assert_eq!(calls.len(), 1);
        let (error, context) = &calls[0];
        assert!(error.to_string().contains("boom"));
        assert_eq!(context.get("type"), Some(&json!("toast_error")));

        // Reading the queue again must not re-send
        let _ = queue.visible();
        let _ = queue.visible();
        assert_eq!(forwarder.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_info_and_success_not_forwarded() {
        let (queue, forwarder) = queue();
        queue.enqueue("info", Severity::Info);
        queue.enqueue("ok", Severity::Success);
        assert!(forwarder.calls().is_empty());
    }

    #[tokio::test]
    async fn test_show_toast_unknown_severity_is_info() {
        let (queue, forwarder) = queue();
        let id = queue.show_toast("careful", Some("warning"));
        let default_id = queue.show_toast("plain", None);

        assert_eq!(queue.get(id).unwrap().severity, Severity::Info);
        assert_eq!(queue.get(default_id).unwrap().severity, Severity::Info);
        assert!(forwarder.calls().is_empty());

        queue.show_toast("Login failed", Some("error"));
        assert_eq!(forwarder.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_context_strips_user_email() {
        let forwarder = Arc::new(RecordingForwarder::default());
        let queue = NotificationQueue::new(forwarder.clone())
            .with_context("release", "1.2.0")
            .with_context("user", json!({ "username": "alice", "email": "alice@example.com" }))
            .with_context("type", "overridden");

        queue.enqueue("boom", Severity::Error);

        let (_, context) = &forwarder.calls()[0];
        assert_eq!(
            Value::Object(context.clone()),
            json!({
                "release": "1.2.0",
                "user": { "username": "alice" },
                "type": "toast_error",
                "toastId": 1
            })
        );
    }

    #[tokio::test]
    async fn test_forwarder_panic_is_contained() {
        let queue = NotificationQueue::new(Arc::new(PanickingForwarder));
        let id = queue.enqueue("boom", Severity::Error);
        assert_eq!(queue.get(id).map(|e| e.message), Some("boom".to_string()));
    }

    #[tokio::test]
    async fn test_ids_are_monotonic_and_order_is_fifo() {
        let (queue, _) = queue();
        let a = queue.enqueue("A", Severity::Info);
        let b = queue.enqueue("B", Severity::Success);
        let c = queue.enqueue("C", Severity::Error);

        assert!(a < b && b < c);
        assert_eq!(messages(&queue), vec!["A", "B", "C"]);

        queue.dismiss(b);
        let d = queue.enqueue("D", Severity::Info);
        assert!(d > c, "ids are never reused");
        assert_eq!(messages(&queue), vec!["A", "C", "D"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_default_ttl() {
        let (queue, _) = queue();
        queue.enqueue("A", Severity::Info);
        queue.enqueue("B", Severity::Success);
        queue.enqueue("C", Severity::Error);
        assert_eq!(queue.len(), 3);

        tokio::time::sleep(DEFAULT_TTL - Duration::from_millis(1)).await;
        assert_eq!(queue.len(), 3);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(queue.is_empty());

        tokio::time::sleep(DEFAULT_TTL * 2).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_leaves_siblings_on_schedule() {
        let (queue, _) = queue();
        let _a = queue.enqueue("A", Severity::Info);
        let b = queue.enqueue("B", Severity::Info);
        let _c = queue.enqueue("C", Severity::Info);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(queue.dismiss(b));
        assert_eq!(messages(&queue), vec!["A", "C"]);

        // A and C keep their original deadline at 3000ms
        tokio::time::sleep(Duration::from_millis(1998)).await;
        assert_eq!(messages(&queue), vec!["A", "C"]);

        tokio::time::sleep(Duration::from_millis(3)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_twice_is_noop() {
        let (queue, _) = queue();
        let id = queue.enqueue("A", Severity::Info);
        assert!(queue.dismiss(id));
        assert!(!queue.dismiss(id));

        tokio::time::sleep(DEFAULT_TTL * 2).await;
        assert!(!queue.dismiss(id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_follows_elapsed_time_not_insertion() {
        let (queue, _) = queue();
        queue.enqueue_with_ttl("long", Severity::Info, Duration::from_millis(5000));
        queue.enqueue_with_ttl("short", Severity::Info, Duration::from_millis(1000));
        queue.enqueue("default", Severity::Info);

        tokio::time::sleep(Duration::from_millis(1001)).await;
        assert_eq!(messages(&queue), vec!["long", "default"]);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(messages(&queue), vec!["long"]);

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_default_ttl() {
        let queue = NotificationQueue::new(Arc::new(NoopForwarder))
            .with_default_ttl(Duration::from_millis(500));
        let id = queue.enqueue("quick", Severity::Info);
        assert_eq!(queue.get(id).unwrap().ttl_ms, 500);

        tokio::time::sleep(Duration::from_millis(501)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_broadcast() {
        let (queue, _) = queue();
        let mut events = queue.subscribe();

        let a = queue.enqueue("A", Severity::Info);
        let b = queue.enqueue("B", Severity::Info);
        queue.dismiss(a);

        match events.recv().await.unwrap() {
            ToastEvent::Shown(entry) => assert_eq!(entry.id, a),
            other => panic!("unexpected event: {other:?}"),
        }
        match events.recv().await.unwrap() {
            ToastEvent::Shown(entry) => assert_eq!(entry.id, b),
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(events.recv().await.unwrap(), ToastEvent::Dismissed(a));
        assert_eq!(events.recv().await.unwrap(), ToastEvent::Expired(b));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shown_precedes_expired_with_zero_ttl() {
        let (queue, _) = queue();
        let mut events = queue.subscribe();

        for _ in 0..50 {
            let id = queue.enqueue_with_ttl("flash", Severity::Info, Duration::ZERO);
            match events.recv().await.unwrap() {
                ToastEvent::Shown(entry) => assert_eq!(entry.id, id),
                other => panic!("expected Shown({id}), got {other:?}"),
            }
            assert_eq!(events.recv().await.unwrap(), ToastEvent::Expired(id));
        }
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let (queue, _) = queue();
        let other = queue.clone();
        let id = other.enqueue("shared", Severity::Info);
        assert!(queue.get(id).is_some());
        assert!(queue.dismiss(id));
        assert!(other.is_empty());
    }

    #[test]
    fn test_enqueue_without_runtime_keeps_entry() {
        let (queue, forwarder) = queue();
        let id = queue.enqueue("no timer", Severity::Error);
        assert_eq!(queue.len(), 1);
        assert_eq!(forwarder.calls().len(), 1);
        assert!(queue.dismiss(id));
    }
}
