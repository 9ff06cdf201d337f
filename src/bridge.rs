//! Facade over router + store for turn/goal dispatch and response
//! collection (spec §4.8).
//!
//! Grounded on `silas/queue/bridge.py`'s `QueueBridge`: the same three
//! operations (`dispatch_turn`, `dispatch_goal`, `collect_response`), ported
//! one for one. `collect_response` already used `lease_filtered` in the
//! source over a lease+nack predecessor it replaced — kept verbatim here.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::domain_types::{MessageKind, ScopeId, Sender, Taint, TraceId};
use crate::error::BusError;
use crate::message::Message;
use crate::router::Router;
use crate::router::queues;
use crate::store::{LeaseFilter, Store};

/// Integration seam between a caller (a CLI, a scheduler, a future
/// transport) and the queue-based agent system. Owns no consumers — those
/// are run by [`crate::orchestrator::Orchestrator`]; the bridge only
/// enqueues and polls.
pub struct QueueBridge {
    store: Arc<dyn Store>,
    router: Router,
    collect_poll_interval: Duration,
}

impl QueueBridge {
    /// Builds a bridge over a shared store/router pair.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, router: Router, collect_poll_interval: Duration) -> Self {
        Self {
            store,
            router,
            collect_poll_interval,
        }
    }

    /// Enqueues a `user_message` onto the router queue. The primary entry
    /// point for turn dispatch. `scope_id` and `taint` are enriched directly
    /// onto the envelope's first-class fields; `tool_allowlist` has no
    /// dedicated column and is carried in the payload instead.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if routing fails.
    #[allow(clippy::too_many_arguments)]
    pub async fn dispatch_turn(
        &self,
        user_message: &str,
        trace_id: TraceId,
        metadata: Option<Value>,
        scope_id: Option<ScopeId>,
        taint: Option<Taint>,
        tool_allowlist: Option<Vec<String>>,
    ) -> Result<(), BusError> {
        let mut payload = json!({"text": user_message});
        if let Some(metadata) = metadata {
            payload["metadata"] = metadata;
        }
        if let Some(tool_allowlist) = tool_allowlist {
            payload["tool_allowlist"] = json!(tool_allowlist);
        }

        let mut msg = Message::new(MessageKind::UserMessage, Sender::User, payload)
            .with_trace_id(trace_id);
        msg.scope_id = scope_id;
        msg.taint = taint;
        self.router.route(msg).await?;
        debug!(%trace_id, "dispatched user_message to queue");
        Ok(())
    }

    /// Enqueues a `plan_request` directly onto the planner queue, bypassing
    /// the router — used for scheduler-driven autonomous goals that don't
    /// originate from a user message.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if routing fails.
    pub async fn dispatch_goal(
        &self,
        goal_id: &str,
        goal_description: &str,
        trace_id: TraceId,
    ) -> Result<(), BusError> {
        let msg = Message::new(
            MessageKind::PlanRequest,
            Sender::Runtime,
            json!({
                "user_request": goal_description,
                "goal_id": goal_id,
                "autonomous": true,
            }),
        )
        .with_trace_id(trace_id);
        self.router.route(msg).await?;
        debug!(goal_id, %trace_id, "dispatched goal plan_request");
        Ok(())
    }

    /// Polls the router queue for an `agent_response` matching `trace_id`,
    /// returning `None` if none arrives within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] if a store operation fails.
    pub async fn collect_response(
        &self,
        trace_id: TraceId,
        timeout: Duration,
    ) -> Result<Option<Message>, BusError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if tokio::time::Instant::now() >= deadline {
                warn!(%trace_id, "collect_response timed out");
                return Ok(None);
            }

            let filter = LeaseFilter::new(trace_id, MessageKind::AgentResponse);
            let leased = self
                .store
                .lease_filtered(&queues::router(), filter, Duration::from_secs(5))
                .await?;

            let Some(msg) = leased else {
                tokio::time::sleep(self.collect_poll_interval).await;
                continue;
            };

            self.store.ack(msg.id).await?;
            return Ok(Some(msg));
        }
    }
}
