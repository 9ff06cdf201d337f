//! Role adapter interface and deterministic demo implementations (spec §6.3).
//!
//! Grounded on `silas/queue/consumers.py`'s `ProxyAgentProtocol`/
//! `PlannerAgentProtocol`/`ExecutorAgentProtocol`: each is a minimal
//! `run(prompt) -> output` callable, decoupled from any concrete LLM client
//! so consumers can be tested without one. The three distinct Python
//! protocols collapse into one generic trait here, since Rust's associated
//! types express "same shape, different output" without duplicating the
//! method signature three times.

use async_trait::async_trait;

use crate::error::RoleError;

/// Generalizes the three role callables spec §6.3 requires external
/// collaborators to provide. A role that cannot be constructed must fail
/// loudly at construction time (not modeled here — that's the caller's
/// constructor); a role that fails at runtime returns `Err`, and the
/// invoking consumer nacks the triggering message.
#[async_trait]
pub trait RoleAdapter: Send + Sync {
    /// This role's structured output type.
    type Output: Send;

    /// Runs the role on `prompt`, returning its structured output.
    ///
    /// # Errors
    ///
    /// Returns [`RoleError::Failed`] if the role fails at runtime.
    async fn run(&self, prompt: &str) -> Result<Self::Output, RoleError>;
}

/// Where the router role decided a turn should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Answer directly; the role itself emits the `agent_response`.
    Direct,
    /// Hand off to the planner.
    Planner,
}

/// Structured output of the router role.
#[derive(Debug, Clone)]
pub struct RouterRoleOutput {
    /// Where to route this turn.
    pub route: RouteDecision,
    /// Why the router made that decision.
    pub reason: String,
    /// Set when `route == Direct`: the text to emit as `agent_response`.
    pub direct_response: Option<String>,
}

/// A planner's proposed course of action.
#[derive(Debug, Clone)]
pub struct PlanAction {
    /// The plan, in markdown.
    pub plan_markdown: String,
}

/// Structured output of the planner role.
#[derive(Debug, Clone)]
pub struct PlannerRoleOutput {
    /// The proposed plan.
    pub plan_action: PlanAction,
    /// A user-visible summary message.
    pub message: String,
}

/// Structured output of the executor role.
#[derive(Debug, Clone)]
pub struct ExecutorRoleOutput {
    /// Human-readable summary of what happened.
    pub summary: String,
    /// Set when the attempt failed.
    pub last_error: Option<String>,
}

/// Deterministic router role for the CLI/demo and integration tests: routes
/// to the planner whenever the prompt looks like it needs multi-step work
/// (longer than a short arithmetic/fact lookup), otherwise answers directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoRouterRole;

#[async_trait]
impl RoleAdapter for DemoRouterRole {
    type Output = RouterRoleOutput;

    async fn run(&self, prompt: &str) -> Result<Self::Output, RoleError> {
        let word_count = prompt.split_whitespace().count();
        if word_count <= 4 {
            Ok(RouterRoleOutput {
                route: RouteDecision::Direct,
                reason: "short request answered directly".to_string(),
                direct_response: Some(format!("Direct answer to: {prompt}")),
            })
        } else {
            Ok(RouterRoleOutput {
                route: RouteDecision::Planner,
                reason: "multi-step request needs planning".to_string(),
                direct_response: None,
            })
        }
    }
}

/// Deterministic planner role: echoes the request back as a trivial
/// single-step plan. Good enough to drive the pipeline end to end without an
/// LLM.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoPlannerRole;

#[async_trait]
impl RoleAdapter for DemoPlannerRole {
    type Output = PlannerRoleOutput;

    async fn run(&self, prompt: &str) -> Result<Self::Output, RoleError> {
        Ok(PlannerRoleOutput {
            plan_action: PlanAction {
                plan_markdown: format!("1. {prompt}"),
            },
            message: "Plan ready.".to_string(),
        })
    }
}

/// Deterministic executor role: succeeds unless the prompt contains the
/// literal marker `"FAIL_ONCE"` with no planner guidance attached, in which
/// case it fails with a fixed error — used by integration tests to drive
/// the consult-and-retry flow (spec §8.4 scenario 3) without needing a
/// flaky real executor. A retry prompt carrying guidance (see
/// `ExecutorConsumer::consult_and_retry`'s `"Planner guidance:"` prefix)
/// always succeeds, modeling the guidance having unstuck the attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoExecutorRole;

#[async_trait]
impl RoleAdapter for DemoExecutorRole {
    type Output = ExecutorRoleOutput;

    async fn run(&self, prompt: &str) -> Result<Self::Output, RoleError> {
        if prompt.contains("FAIL_ONCE") && !prompt.contains("Planner guidance:") {
            Ok(ExecutorRoleOutput {
                summary: "Execution failed.".to_string(),
                last_error: Some("connection_timeout".to_string()),
            })
        } else {
            Ok(ExecutorRoleOutput {
                summary: "Done".to_string(),
                last_error: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_router_answers_short_prompts_directly() {
        let out = DemoRouterRole.run("What is 2+2?").await.unwrap();
        assert_eq!(out.route, RouteDecision::Direct);
        assert!(out.direct_response.is_some());
    }

    #[tokio::test]
    async fn demo_router_routes_long_prompts_to_planner() {
        let out = DemoRouterRole
            .run("Please refactor the entire authentication module end to end")
            .await
            .unwrap();
        assert_eq!(out.route, RouteDecision::Planner);
    }

    #[tokio::test]
    async fn demo_executor_fails_on_marker() {
        let out = DemoExecutorRole.run("do thing FAIL_ONCE").await.unwrap();
        assert_eq!(out.last_error.as_deref(), Some("connection_timeout"));
    }

    #[tokio::test]
    async fn demo_executor_succeeds_otherwise() {
        let out = DemoExecutorRole.run("do thing").await.unwrap();
        assert!(out.last_error.is_none());
    }
}
