//! Static message-kind → queue routing table.
//!
//! Grounded on spec §3.3/§4.2/§6.2. The teacher's `message_router::router`
//! wires a dynamic agent registry; this bus needs no registry at all — the
//! topology is a compile-time closed-set match, which is the shape
//! `silas/queue/bridge.py`'s callers assume when they enqueue through a
//! router rather than setting `queue_name` themselves.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain_types::{MessageKind, QueueName, TraceId};
use crate::error::RouterError;
use crate::message::Message;
use crate::store::Store;

/// Names of the four fixed queues (spec §6.2).
pub mod queues {
    use crate::domain_types::QueueName;

    /// Consumes user turns, plan/execution status, approvals, responses.
    #[must_use]
    pub fn router() -> QueueName {
        QueueName::try_new("router").expect("literal queue name is valid")
    }

    /// Consumes plan requests, replans, and research results.
    #[must_use]
    pub fn planner() -> QueueName {
        QueueName::try_new("planner").expect("literal queue name is valid")
    }

    /// Consumes execution and research requests.
    #[must_use]
    pub fn executor() -> QueueName {
        QueueName::try_new("executor").expect("literal queue name is valid")
    }

    /// Consumes planner guidance and approval resolutions, addressed to the
    /// runtime rather than a role consumer.
    #[must_use]
    pub fn runtime() -> QueueName {
        QueueName::try_new("runtime").expect("literal queue name is valid")
    }
}

/// Looks up the destination queue for `kind` per the closed routing table
/// (spec §6.2). Returns `None` for a kind outside the table — callers must
/// treat that as fail-loud per spec §9's Open Questions resolution.
#[must_use]
pub fn destination_queue(kind: MessageKind) -> Option<QueueName> {
    use MessageKind::{
        AgentResponse, ApprovalRequest, ApprovalResult, ExecutionRequest, ExecutionStatus,
        PlanRequest, PlanResult, PlannerGuidance, ReplanRequest, ResearchRequest, ResearchResult,
        SystemEvent, UserMessage,
    };

    Some(match kind {
        UserMessage | PlanResult | ExecutionStatus | ApprovalRequest | AgentResponse
        | SystemEvent => queues::router(),
        PlanRequest | ReplanRequest | ResearchResult => queues::planner(),
        ExecutionRequest | ResearchRequest => queues::executor(),
        PlannerGuidance | ApprovalResult => queues::runtime(),
    })
}

/// Assigns every message a `queue_name` before persisting it, and never
/// mutates the payload (spec §4.2).
#[derive(Clone)]
pub struct Router {
    store: Arc<dyn Store>,
}

impl Router {
    /// Wraps a shared store handle.
    #[must_use]
    pub const fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Looks up `msg.message_kind`, assigns `msg.queue_name`, and persists
    /// it. Fails with [`RouterError::UnknownKind`] if the kind isn't in the
    /// routing table (spec §9: fail loud, never silently drop).
    #[instrument(skip(self, msg), fields(message_id = %msg.id, kind = %msg.message_kind))]
    pub async fn route(&self, mut msg: Message) -> Result<(), RouterError> {
        let queue = destination_queue(msg.message_kind)
            .ok_or(RouterError::UnknownKind(msg.message_kind))?;
        msg.queue_name = Some(queue.clone());
        self.store.enqueue(&msg).await?;
        debug!(%queue, "routed message");
        Ok(())
    }

    /// Like [`Router::route`], but overrides `msg.trace_id` first — used by
    /// producers that mint a new trace at the point of routing rather than
    /// at message construction.
    pub async fn route_with_trace(
        &self,
        mut msg: Message,
        trace_id: TraceId,
    ) -> Result<(), RouterError> {
        msg.trace_id = trace_id;
        self.route(msg).await
    }
}
