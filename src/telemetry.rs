//! Structured telemetry and audit events emitted at queue lifecycle points.
//!
//! Grounded on `silas/queue/telemetry.py`'s `QueueTelemetryEvent`/
//! `RuntimeAuditEvent` schemas, re-expressed as closed Rust enums instead of
//! `Literal` string unions, and wired into `tracing` the way the teacher's
//! `database.rs`/`observability.rs` emit structured spans/events rather than
//! collecting into an unused model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain_types::{MessageId, QueueName, TraceId};

/// The closed set of queue lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventKind {
    /// A message was persisted.
    Enqueue,
    /// A message was leased by a consumer.
    Dequeue,
    /// A message completed successfully.
    Ack,
    /// A message was released for retry.
    Nack,
    /// A message exceeded its attempt budget.
    DeadLetter,
    /// A lease was extended.
    Heartbeat,
    /// A lease was found expired and cleared on startup.
    Expired,
}

/// A single observable moment in the queue lifecycle (spec component 10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueTelemetryEvent {
    /// Which queue this concerns.
    pub queue_name: QueueName,
    /// Which lifecycle moment.
    pub event: QueueEventKind,
    /// The message this concerns.
    pub message_id: MessageId,
    /// The originating turn's trace id.
    pub trace_id: TraceId,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Queue depth at the time of the event, if known.
    #[serde(default)]
    pub queue_depth: Option<u64>,
    /// Milliseconds the message waited before being leased, if known.
    #[serde(default)]
    pub wait_ms: Option<f64>,
    /// The lease duration granted, if this event is a dequeue/heartbeat.
    #[serde(default)]
    pub lease_duration_s: Option<f64>,
}

/// The closed set of audit-relevant actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// A message was persisted.
    Enqueue,
    /// A message was leased.
    Dequeue,
    /// An approval was requested or resolved.
    Approval,
    /// A verification step ran.
    Verify,
    /// A policy check ran.
    Check,
    /// A policy gate blocked an action.
    GateBlock,
}

/// Audit trail event for security-relevant runtime actions — who did what,
/// distinct from [`QueueTelemetryEvent`]'s performance focus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeAuditEvent {
    /// The audited action.
    pub event: AuditEventKind,
    /// The originating turn's trace id.
    pub trace_id: TraceId,
    /// Which role/component performed the action.
    pub agent: String,
    /// The message this concerns.
    pub message_id: MessageId,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
    /// Optional free-form detail.
    #[serde(default)]
    pub detail: Option<String>,
}

/// Receives telemetry/audit events as they're emitted. The default
/// implementation logs via `tracing`; tests use [`CollectingAuditSink`] to
/// assert on emitted events without parsing log output.
pub trait AuditSink: Send + Sync {
    /// Records a queue telemetry event.
    fn record_queue_event(&self, event: QueueTelemetryEvent);

    /// Records a runtime audit event.
    fn record_audit_event(&self, event: RuntimeAuditEvent);
}

/// Logs every event via `tracing` at info level. The production default.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAuditSink;

impl AuditSink for LoggingAuditSink {
    fn record_queue_event(&self, event: QueueTelemetryEvent) {
        info!(
            queue = %event.queue_name,
            event = ?event.event,
            message_id = %event.message_id,
            trace_id = %event.trace_id,
            queue_depth = event.queue_depth,
            wait_ms = event.wait_ms,
            "queue telemetry"
        );
    }

    fn record_audit_event(&self, event: RuntimeAuditEvent) {
        info!(
            event = ?event.event,
            trace_id = %event.trace_id,
            agent = %event.agent,
            message_id = %event.message_id,
            detail = event.detail.as_deref(),
            "runtime audit"
        );
    }
}

/// Collects events into memory for test assertions.
#[derive(Default)]
pub struct CollectingAuditSink {
    queue_events: std::sync::Mutex<Vec<QueueTelemetryEvent>>,
    audit_events: std::sync::Mutex<Vec<RuntimeAuditEvent>>,
}

impl CollectingAuditSink {
    /// Builds an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of queue events recorded so far.
    #[must_use]
    pub fn queue_events(&self) -> Vec<QueueTelemetryEvent> {
        self.queue_events.lock().expect("mutex poisoned").clone()
    }

    /// Snapshot of audit events recorded so far.
    #[must_use]
    pub fn audit_events(&self) -> Vec<RuntimeAuditEvent> {
        self.audit_events.lock().expect("mutex poisoned").clone()
    }
}

impl AuditSink for CollectingAuditSink {
    fn record_queue_event(&self, event: QueueTelemetryEvent) {
        self.queue_events
            .lock()
            .expect("mutex poisoned")
            .push(event);
    }

    fn record_audit_event(&self, event: RuntimeAuditEvent) {
        self.audit_events
            .lock()
            .expect("mutex poisoned")
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_queue_event() -> QueueTelemetryEvent {
        QueueTelemetryEvent {
            queue_name: QueueName::try_new("router").unwrap(),
            event: QueueEventKind::Enqueue,
            message_id: MessageId::generate(),
            trace_id: TraceId::generate(),
            timestamp: Utc::now(),
            queue_depth: Some(3),
            wait_ms: None,
            lease_duration_s: None,
        }
    }

    #[test]
    fn collecting_sink_records_queue_events() {
        let sink = CollectingAuditSink::new();
        sink.record_queue_event(sample_queue_event());
        assert_eq!(sink.queue_events().len(), 1);
        assert!(sink.audit_events().is_empty());
    }

    #[test]
    fn logging_sink_does_not_panic() {
        LoggingAuditSink.record_queue_event(sample_queue_event());
    }
}
