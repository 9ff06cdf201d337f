//! Router consumer — consumes the *router* queue (spec §4.3).
//!
//! Grounded on `silas/queue/consumers.py`'s `ProxyConsumer` (the router
//! role was called "proxy" in the source); dispatch logic ported kind for
//! kind onto the spec's closed `message_kind` set.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::domain_types::{ExecutionStatus, MessageKind, QueueName, Sender};
use crate::error::RoleError;
use crate::message::Message;
use crate::roles::{RoleAdapter, RouteDecision};
use crate::router::queues;
use crate::status::{surfaces_for, unknown_status_surfaces};

/// Consumes `user_message`, `execution_status`, `plan_result`, and other
/// informational kinds on the router queue.
pub struct RouterConsumer<R> {
    role: R,
}

impl<R> RouterConsumer<R> {
    /// Wraps a router role adapter.
    #[must_use]
    pub const fn new(role: R) -> Self {
        Self { role }
    }
}

#[async_trait]
impl<R> super::Consumer for RouterConsumer<R>
where
    R: RoleAdapter<Output = crate::roles::RouterRoleOutput> + Send + Sync,
{
    fn queue_name(&self) -> QueueName {
        queues::router()
    }

    async fn process(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        match msg.message_kind {
            MessageKind::UserMessage => self.handle_user_message(msg).await,
            MessageKind::ExecutionStatus => Ok(Self::handle_execution_status(msg)),
            // Terminal, externally-consumed kinds: leaving the queue is the
            // whole point, so acking is all `poll_once` should do with them.
            MessageKind::PlanResult | MessageKind::AgentResponse | MessageKind::ApprovalRequest => {
                Ok(None)
            }
            _ => self.handle_generic(msg).await,
        }
    }
}

impl<R> RouterConsumer<R>
where
    R: RoleAdapter<Output = crate::roles::RouterRoleOutput> + Send + Sync,
{
    async fn handle_user_message(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        let prompt = msg.payload_str("text");
        let output = self.role.run(&prompt).await?;

        Ok(match output.route {
            RouteDecision::Planner => Some(msg.derive(
                MessageKind::PlanRequest,
                Sender::Router,
                json!({"user_request": prompt, "reason": output.reason}),
            )),
            RouteDecision::Direct => output.direct_response.map(|text| {
                msg.derive(
                    MessageKind::AgentResponse,
                    Sender::Router,
                    json!({"text": text}),
                )
            }),
        })
    }

    fn handle_execution_status(msg: &Message) -> Option<Message> {
        let status_str = msg.payload_str("status");
        let surfaces = ExecutionStatus::from_str_opt(&status_str)
            .map_or_else(unknown_status_surfaces, surfaces_for);
        debug!(status = %status_str, ?surfaces, "routed execution status to surfaces");
        None
    }

    async fn handle_generic(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        let prompt = {
            let text = msg.payload_str("text");
            if text.is_empty() {
                msg.payload_str("message")
            } else {
                text
            }
        };
        self.role.run(&prompt).await?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Consumer;
    use crate::roles::DemoRouterRole;

    #[tokio::test]
    async fn direct_route_produces_agent_response() {
        let consumer = RouterConsumer::new(DemoRouterRole);
        let msg = Message::new(MessageKind::UserMessage, Sender::User, json!({"text": "2+2?"}));
        let follow_on = consumer.process(&msg).await.unwrap().unwrap();
        assert_eq!(follow_on.message_kind, MessageKind::AgentResponse);
        assert_eq!(follow_on.trace_id, msg.trace_id);
    }

    #[tokio::test]
    async fn planner_route_produces_plan_request() {
        let consumer = RouterConsumer::new(DemoRouterRole);
        let msg = Message::new(
            MessageKind::UserMessage,
            Sender::User,
            json!({"text": "Please refactor the entire authentication module thoroughly"}),
        );
        let follow_on = consumer.process(&msg).await.unwrap().unwrap();
        assert_eq!(follow_on.message_kind, MessageKind::PlanRequest);
        assert_eq!(follow_on.trace_id, msg.trace_id);
    }

    #[tokio::test]
    async fn execution_status_has_no_follow_on() {
        let consumer = RouterConsumer::new(DemoRouterRole);
        let msg = Message::new(
            MessageKind::ExecutionStatus,
            Sender::Executor,
            json!({"status": "done"}),
        );
        assert!(consumer.process(&msg).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn plan_result_has_no_follow_on() {
        let consumer = RouterConsumer::new(DemoRouterRole);
        let msg = Message::new(MessageKind::PlanResult, Sender::Planner, json!({}));
        assert!(consumer.process(&msg).await.unwrap().is_none());
    }
}
