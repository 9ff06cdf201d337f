//! Executor consumer — consumes the *executor* queue (spec §4.3, §4.6).
//!
//! Grounded on `silas/queue/consumers.py`'s `ExecutorConsumer`: dispatch on
//! `execution_request` / `research_request`, plus the stuck→consult→retry-once
//! policy gated on `payload.on_stuck == "consult_planner"` (spec §4.6 /
//! E2E scenario 3). The consult-and-retry happens *inside* this single
//! `process` call — it does not touch `attempt_count`, since that field is
//! owned exclusively by the [`super::ConsumerRuntime`] lease/nack lifecycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::consult::ConsultPlannerManager;
use crate::domain_types::{MessageKind, QueueName, Sender};
use crate::error::RoleError;
use crate::message::{Message, OnStuckPolicy};
use crate::roles::RoleAdapter;
use crate::router::queues;

/// Consumes `execution_request` and `research_request` on the executor
/// queue.
pub struct ExecutorConsumer<R> {
    role: R,
    consult: Arc<ConsultPlannerManager>,
    consult_timeout: Duration,
}

impl<R> ExecutorConsumer<R> {
    /// Wraps an executor role adapter with a consult manager used for the
    /// stuck→consult→retry-once policy.
    #[must_use]
    pub fn new(role: R, consult: Arc<ConsultPlannerManager>, consult_timeout: Duration) -> Self {
        Self {
            role,
            consult,
            consult_timeout,
        }
    }
}

#[async_trait]
impl<R> super::Consumer for ExecutorConsumer<R>
where
    R: RoleAdapter<Output = crate::roles::ExecutorRoleOutput> + Send + Sync,
{
    fn queue_name(&self) -> QueueName {
        queues::executor()
    }

    async fn process(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        match msg.message_kind {
            MessageKind::ExecutionRequest => self.handle_execution_request(msg).await,
            MessageKind::ResearchRequest => self.handle_research_request(msg).await,
            other => {
                warn!(kind = %other, "executor consumer received unexpected kind");
                Ok(None)
            }
        }
    }
}

impl<R> ExecutorConsumer<R>
where
    R: RoleAdapter<Output = crate::roles::ExecutorRoleOutput> + Send + Sync,
{
    async fn handle_execution_request(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        let work_item_id = msg.payload_str("work_item_id");
        let task_description = {
            let desc = msg.payload_str("task_description");
            if desc.is_empty() {
                msg.payload_str("body")
            } else {
                desc
            }
        };
        let on_stuck: Option<OnStuckPolicy> = msg
            .payload
            .get("on_stuck")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let output = self.role.run(&task_description).await?;

        let output = if output.last_error.is_some() && on_stuck == Some(OnStuckPolicy::ConsultPlanner) {
            self.consult_and_retry(&work_item_id, &task_description, msg, output)
                .await?
        } else {
            output
        };

        let status = if output.last_error.is_some() {
            "failed"
        } else {
            "done"
        };

        Ok(Some(msg.derive(
            MessageKind::ExecutionStatus,
            Sender::Executor,
            json!({
                "status": status,
                "work_item_id": work_item_id,
                "detail": output.summary,
                "last_error": output.last_error,
            }),
        )))
    }

    async fn consult_and_retry(
        &self,
        work_item_id: &str,
        task_description: &str,
        msg: &Message,
        failed_output: crate::roles::ExecutorRoleOutput,
    ) -> Result<crate::roles::ExecutorRoleOutput, RoleError> {
        let failure_context = failed_output
            .last_error
            .clone()
            .unwrap_or_else(|| "unknown failure".to_string());

        info!(work_item_id, %msg.trace_id, "executor stuck, consulting planner");
        let guidance = self
            .consult
            .consult(work_item_id, &failure_context, msg.trace_id, self.consult_timeout)
            .await
            .map_err(|err| RoleError::Failed {
                role: "executor",
                message: format!("consult failed: {err}"),
            })?;

        let Some(guidance) = guidance else {
            warn!(work_item_id, "consult timed out, keeping original failure");
            return Ok(failed_output);
        };

        let retry_prompt = format!("{task_description}\n\nPlanner guidance: {guidance}");
        self.role.run(&retry_prompt).await
    }

    async fn handle_research_request(&self, msg: &Message) -> Result<Option<Message>, RoleError> {
        let work_item_id = msg.payload_str("work_item_id");
        let task_description = {
            let desc = msg.payload_str("task_description");
            if desc.is_empty() {
                msg.payload_str("body")
            } else {
                desc
            }
        };

        let output = self.role.run(&task_description).await?;

        Ok(Some(msg.derive(
            MessageKind::ResearchResult,
            Sender::Executor,
            json!({
                "work_item_id": work_item_id,
                "original_request": task_description,
                "result": output.summary,
            }),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Consumer;
    use crate::database::{DatabaseConfig, DatabaseConnection, DatabasePath};
    use crate::roles::DemoExecutorRole;
    use crate::router::Router;
    use crate::store::SqliteStore;
    use tempfile::tempdir;

    async fn test_consult() -> Arc<ConsultPlannerManager> {
        let dir = tempdir().unwrap();
        let path = DatabasePath::new(dir.path().join("test.db")).unwrap();
        std::mem::forget(dir);
        let conn = DatabaseConnection::initialize(DatabaseConfig::for_testing(path))
            .await
            .unwrap();
        let store = Arc::new(SqliteStore::new(conn));
        let router = Router::new(store.clone());
        Arc::new(ConsultPlannerManager::new(
            store,
            router,
            Duration::from_millis(5),
        ))
    }

    #[tokio::test]
    async fn execution_request_succeeds_without_consult() {
        let consult = test_consult().await;
        let consumer = ExecutorConsumer::new(DemoExecutorRole, consult, Duration::from_millis(20));
        let msg = Message::new(
            MessageKind::ExecutionRequest,
            Sender::Planner,
            json!({"work_item_id": "wi-1", "task_description": "do thing"}),
        );
        let follow_on = consumer.process(&msg).await.unwrap().unwrap();
        assert_eq!(follow_on.message_kind, MessageKind::ExecutionStatus);
        assert_eq!(follow_on.payload_str("status"), "done");
    }

    #[tokio::test]
    async fn execution_request_without_on_stuck_fails_immediately() {
        let consult = test_consult().await;
        let consumer = ExecutorConsumer::new(DemoExecutorRole, consult, Duration::from_millis(20));
        let msg = Message::new(
            MessageKind::ExecutionRequest,
            Sender::Planner,
            json!({"work_item_id": "wi-1", "task_description": "do thing FAIL_ONCE"}),
        );
        let follow_on = consumer.process(&msg).await.unwrap().unwrap();
        assert_eq!(follow_on.payload_str("status"), "failed");
    }

    #[tokio::test]
    async fn execution_request_consults_and_keeps_failure_on_timeout() {
        let consult = test_consult().await;
        let consumer = ExecutorConsumer::new(DemoExecutorRole, consult, Duration::from_millis(20));
        let msg = Message::new(
            MessageKind::ExecutionRequest,
            Sender::Planner,
            json!({
                "work_item_id": "wi-1",
                "task_description": "do thing FAIL_ONCE",
                "on_stuck": "consult_planner",
            }),
        );
        let follow_on = consumer.process(&msg).await.unwrap().unwrap();
        assert_eq!(follow_on.payload_str("status"), "failed");
    }

    #[tokio::test]
    async fn research_request_produces_research_result() {
        let consult = test_consult().await;
        let consumer = ExecutorConsumer::new(DemoExecutorRole, consult, Duration::from_millis(20));
        let msg = Message::new(
            MessageKind::ResearchRequest,
            Sender::Planner,
            json!({"work_item_id": "wi-2", "task_description": "find docs"}),
        );
        let follow_on = consumer.process(&msg).await.unwrap().unwrap();
        assert_eq!(follow_on.message_kind, MessageKind::ResearchResult);
    }
}
