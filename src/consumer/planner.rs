//! Planner consumer — consumes the *planner* queue (spec §4.3).
//!
//! Grounded on `silas/queue/consumers.py`'s `PlannerConsumer`: the three
//! handled kinds (`plan_request`, `replan_request`, `research_result`) and
//! their prompt-construction strategy are ported directly; unknown kinds
//! are logged and dropped per spec.

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::domain_types::{MessageKind, QueueName, Sender};
use crate::error::RoleError;
use crate::message::Message;
use crate::roles::RoleAdapter;
use crate::router::queues;

/// Consumes `plan_request`, `replan_request`, and `research_result` on the
/// planner queue.
pub struct PlannerConsumer<R> {
    role: R,
}

impl<R> PlannerConsumer<R> {
    /// Wraps a planner role adapter.
    #[must_use]
    pub const fn new(role: R) -> Self {
        Self { role }
    }
}

#[async_trait]
impl<R> super::Consumer for PlannerConsumer<R>
where
    R: RoleAdapter<Output = crate::roles::PlannerRoleOutput> + Send + Sync,
{
    fn queue_name(&self) -> QueueName {
        queues::planner()
    }

    async fn process(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        match msg.message_kind {
            MessageKind::PlanRequest => self.handle_plan_request(msg).await,
            MessageKind::ReplanRequest => self.handle_replan_request(msg).await,
            MessageKind::ResearchResult => self.handle_research_result(msg).await,
            other => {
                warn!(kind = %other, "planner consumer received unexpected kind");
                Ok(None)
            }
        }
    }
}

impl<R> PlannerConsumer<R>
where
    R: RoleAdapter<Output = crate::roles::PlannerRoleOutput> + Send + Sync,
{
    async fn handle_plan_request(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        let user_request = msg.payload_str("user_request");
        let output = self.role.run(&user_request).await?;

        Ok(Some(msg.derive(
            MessageKind::PlanResult,
            Sender::Planner,
            json!({
                "plan_markdown": output.plan_action.plan_markdown,
                "message": output.message,
                "user_request": user_request,
            }),
        )))
    }

    async fn handle_replan_request(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        let original_goal = msg.payload_str("original_goal");
        let failure_history = msg
            .payload
            .get("failure_history")
            .cloned()
            .unwrap_or_else(|| json!([]));

        let prompt = format!(
            "REPLAN REQUEST — previous approach failed.\n\nOriginal goal: {original_goal}\n\nFailure history:\n{failure_history}\n\nGenerate an alternative strategy. Do NOT retry the same approach."
        );
        let output = self.role.run(&prompt).await?;

        Ok(Some(msg.derive(
            MessageKind::PlanResult,
            Sender::Planner,
            json!({
                "plan_markdown": output.plan_action.plan_markdown,
                "message": output.message,
                "is_replan": true,
                "original_goal": original_goal,
            }),
        )))
    }

    async fn handle_research_result(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        let research_data = msg.payload_str("result");
        let original_request = msg.payload_str("original_request");

        let prompt = format!(
            "Research result received for request: {original_request}\n\nResult:\n{research_data}\n\nIntegrate this into the current plan."
        );
        let output = self.role.run(&prompt).await?;

        if output.plan_action.plan_markdown.is_empty() {
            return Ok(None);
        }

        Ok(Some(msg.derive(
            MessageKind::PlanResult,
            Sender::Planner,
            json!({
                "plan_markdown": output.plan_action.plan_markdown,
                "message": output.message,
            }),
        )))
    }
}
