//! Executor→planner consult suspend/resume flow (spec §4.6).
//!
//! Grounded on `silas/queue/consult.py`'s `ConsultPlannerManager`, with one
//! deliberate deviation from the source: the source polls the runtime queue
//! with a plain `lease` + nack-on-mismatch, which the specification calls
//! out as an anti-pattern (spec §9: "Filtered lease is a first-class store
//! operation... resist the temptation"). This implementation uses
//! [`Store::lease_filtered`] instead, so a consult() call for trace A never
//! touches an in-flight `planner_guidance` for trace B.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::domain_types::{MessageKind, Sender, TraceId};
use crate::error::BusError;
use crate::message::Message;
use crate::router::Router;
use crate::router::queues;
use crate::store::{LeaseFilter, Store};
use crate::telemetry::{AuditEventKind, AuditSink, LoggingAuditSink, RuntimeAuditEvent};

/// Manages the executor→planner consult flow.
pub struct ConsultPlannerManager {
    store: Arc<dyn Store>,
    router: Router,
    poll_interval: Duration,
    audit: Arc<dyn AuditSink>,
}

impl ConsultPlannerManager {
    /// Builds a manager over a shared store/router, logging lifecycle events
    /// via [`LoggingAuditSink`].
    #[must_use]
    pub fn new(store: Arc<dyn Store>, router: Router, poll_interval: Duration) -> Self {
        Self::with_audit_sink(store, router, poll_interval, Arc::new(LoggingAuditSink))
    }

    /// Builds a manager emitting lifecycle events to `audit` instead of the
    /// default logging sink.
    #[must_use]
    pub fn with_audit_sink(
        store: Arc<dyn Store>,
        router: Router,
        poll_interval: Duration,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            router,
            poll_interval,
            audit,
        }
    }

    /// Suspends the executor, asks the planner for guidance on a stuck work
    /// item, and waits for the response.
    ///
    /// Returns `Some(guidance)` if the planner responds within `timeout`, or
    /// `None` on timeout — the caller (the executor consumer) decides what
    /// to do next.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if routing the consult request or polling the
    /// runtime queue fails at the store layer.
    pub async fn consult(
        &self,
        work_item_id: &str,
        failure_context: &str,
        trace_id: TraceId,
        timeout: Duration,
    ) -> Result<Option<String>, BusError> {
        let request = Message::new(
            MessageKind::PlanRequest,
            Sender::Executor,
            json!({
                "user_request": format!(
                    "CONSULT REQUEST — executor needs guidance.\n\nWork item: {work_item_id}\nFailure context:\n{failure_context}\n\nProvide specific, actionable guidance for retrying this work item."
                ),
                "consult": true,
                "work_item_id": work_item_id,
            }),
        )
        .with_trace_id(trace_id);

        let request_id = request.id;
        self.router.route(request).await?;
        info!(work_item_id, %trace_id, "consult request sent");
        self.audit.record_audit_event(RuntimeAuditEvent {
            event: AuditEventKind::Check,
            trace_id,
            agent: "executor".to_string(),
            message_id: request_id,
            timestamp: Utc::now(),
            detail: Some(format!("consult requested for work item {work_item_id}")),
        });

        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if tokio::time::Instant::now() >= deadline {
                warn!(work_item_id, %trace_id, "consult timed out");
                self.audit.record_audit_event(RuntimeAuditEvent {
                    event: AuditEventKind::GateBlock,
                    trace_id,
                    agent: "executor".to_string(),
                    message_id: request_id,
                    timestamp: Utc::now(),
                    detail: Some(format!("consult timed out for work item {work_item_id}")),
                });
                return Ok(None);
            }

            let filter = LeaseFilter::new(trace_id, MessageKind::PlannerGuidance);
            let leased = self
                .store
                .lease_filtered(&queues::runtime(), filter, Duration::from_secs(30))
                .await?;

            let Some(msg) = leased else {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };

            let guidance = msg.payload_str("guidance");
            self.store.ack(msg.id).await?;
            info!(work_item_id, %trace_id, "consult guidance received");
            self.audit.record_audit_event(RuntimeAuditEvent {
                event: AuditEventKind::Approval,
                trace_id,
                agent: "planner".to_string(),
                message_id: msg.id,
                timestamp: Utc::now(),
                detail: Some(format!("guidance received for work item {work_item_id}")),
            });
            return Ok(Some(guidance));
        }
    }
}
