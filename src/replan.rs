//! Bounded-depth replan dispatch (spec §4.7).
//!
//! No `replan.py` module exists in the retrieved original source —
//! `PlannerConsumer._handle_replan_request` (`silas/queue/consumers.py`)
//! shows how a replan prompt is built once it arrives on the planner queue,
//! but the bounded-depth dispatch gate itself is authored directly from the
//! specification, in the teacher's small-manager style (mirrors
//! [`crate::consult::ConsultPlannerManager`]'s shape: holds a store/router
//! pair, exposes one operation).

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use crate::domain_types::{MessageId, MessageKind, Sender, TraceId};
use crate::error::BusError;
use crate::message::Message;
use crate::router::Router;
use crate::telemetry::{AuditEventKind, AuditSink, LoggingAuditSink, RuntimeAuditEvent};

/// Outcome of a [`ReplanManager::trigger_replan`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplanOutcome {
    /// A `replan_request` was enqueued.
    Dispatched,
    /// `current_depth >= max_depth`; the caller must escalate to the user.
    Exhausted,
}

/// Offers a bounded, structured way to ask the planner for an alternative
/// plan after a failure.
pub struct ReplanManager {
    router: Router,
    max_depth: u32,
    audit: Arc<dyn AuditSink>,
}

impl ReplanManager {
    /// Builds a manager bounded at `max_depth` replan cycles, logging
    /// lifecycle events via [`LoggingAuditSink`].
    #[must_use]
    pub fn new(router: Router, max_depth: u32) -> Self {
        Self::with_audit_sink(router, max_depth, Arc::new(LoggingAuditSink))
    }

    /// Builds a manager emitting lifecycle events to `audit` instead of the
    /// default logging sink.
    #[must_use]
    pub fn with_audit_sink(router: Router, max_depth: u32, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            router,
            max_depth,
            audit,
        }
    }

    /// Requests a revised plan if `current_depth` hasn't exhausted the
    /// bound; otherwise reports exhaustion without enqueuing anything.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if routing the `replan_request` fails.
    pub async fn trigger_replan(
        &self,
        work_item_id: &str,
        original_goal: &str,
        failure_history: &[String],
        trace_id: TraceId,
        current_depth: u32,
    ) -> Result<ReplanOutcome, BusError> {
        if current_depth >= self.max_depth {
            warn!(work_item_id, current_depth, max_depth = self.max_depth, "replan exhausted");
            self.audit.record_audit_event(RuntimeAuditEvent {
                event: AuditEventKind::GateBlock,
                trace_id,
                agent: "replan_manager".to_string(),
                message_id: MessageId::generate(),
                timestamp: Utc::now(),
                detail: Some(format!(
                    "replan exhausted for work item {work_item_id} at depth {current_depth}"
                )),
            });
            return Ok(ReplanOutcome::Exhausted);
        }

        let replan_depth = current_depth + 1;
        let request = Message::new(
            MessageKind::ReplanRequest,
            Sender::Runtime,
            json!({
                "work_item_id": work_item_id,
                "original_goal": original_goal,
                "failure_history": failure_history,
                "replan_depth": replan_depth,
            }),
        )
        .with_trace_id(trace_id);

        let request_id = request.id;
        self.router.route(request).await?;
        info!(work_item_id, replan_depth, %trace_id, "replan dispatched");
        self.audit.record_audit_event(RuntimeAuditEvent {
            event: AuditEventKind::Check,
            trace_id,
            agent: "replan_manager".to_string(),
            message_id: request_id,
            timestamp: Utc::now(),
            detail: Some(format!("replan dispatched for work item {work_item_id} at depth {replan_depth}")),
        });
        Ok(ReplanOutcome::Dispatched)
    }
}
