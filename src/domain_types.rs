//! Strongly-typed identifiers and closed-set enums for the message bus.
//!
//! Grounded on the teacher's `domain_types.rs`: newtype wrappers built with
//! `nutype` instead of raw `String`/`Uuid` primitives, so a trace id can
//! never be passed where a message id is expected.

use nutype::nutype;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a message; doubles as the idempotency key.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, TryFrom, Into
))]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generates a fresh random message id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Identifier shared by every message produced in service of one logical
/// turn. Propagated unchanged across all hops (spec invariant).
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, TryFrom, Into
))]
pub struct TraceId(Uuid);

impl TraceId {
    /// Generates a fresh random trace id, used when an origin has none.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Opaque lease token assigned by the store on `lease()`.
#[nutype(derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, TryFrom, Into
))]
pub struct LeaseId(Uuid);

impl LeaseId {
    /// Generates a fresh random lease id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4())
    }
}

/// Non-empty queue name, assigned only by the router.
#[nutype(
    validate(len_char_min = 1, len_char_max = 64),
    derive(
        Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, TryFrom, Into
    )
)]
pub struct QueueName(String);

/// Scope isolating per-connection worktrees/artifacts for the executor.
#[nutype(
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, TryFrom, Into)
)]
pub struct ScopeId(String);

/// Links related messages across the plan -> execute -> status chain.
#[nutype(
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, TryFrom, Into)
)]
pub struct TaskId(String);

/// Reference to the work item being executed.
#[nutype(
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, TryFrom, Into)
)]
pub struct WorkItemId(String);

/// Authorization token consumed by the approval engine at execution entry.
#[nutype(
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, TryFrom, Into)
)]
pub struct ApprovalToken(String);

/// Identifier for a consumer in the processed-messages ledger
/// (`"consumer:{queue_name}"`).
#[nutype(
    validate(len_char_min = 1),
    derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, TryFrom, Into)
)]
pub struct ConsumerName(String);

/// `SQLite` connection pool size.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 1000),
    derive(
        Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display,
        Default, TryFrom, Into
    ),
    default = 10
)]
pub struct ConnectionPoolSize(usize);

impl ConnectionPoolSize {
    /// Gets the value as `usize`.
    #[must_use]
    pub fn as_usize(&self) -> usize {
        self.into_inner()
    }
}

/// The closed set of message kinds flowing over the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Ask the planner to produce a plan for a user request or goal.
    PlanRequest,
    /// The planner's response to a `PlanRequest`/`ReplanRequest`.
    PlanResult,
    /// Ask the executor to carry out a work item.
    ExecutionRequest,
    /// The executor's status update for a work item.
    ExecutionStatus,
    /// Ask the executor to perform read-only research.
    ResearchRequest,
    /// The executor's research findings.
    ResearchResult,
    /// The planner's guidance in response to a consult request.
    PlannerGuidance,
    /// A bounded-depth request to revise a failing plan.
    ReplanRequest,
    /// A request for human/approval-engine sign-off.
    ApprovalRequest,
    /// The resolution of an `ApprovalRequest`.
    ApprovalResult,
    /// A turn originating from the user.
    UserMessage,
    /// A direct response surfaced back to the user.
    AgentResponse,
    /// An informational, non-routable runtime event.
    SystemEvent,
}

impl MessageKind {
    /// All message kinds, in the order the spec's closed set lists them.
    #[must_use]
    pub const fn all() -> &'static [MessageKind] {
        &[
            MessageKind::PlanRequest,
            MessageKind::PlanResult,
            MessageKind::ExecutionRequest,
            MessageKind::ExecutionStatus,
            MessageKind::ResearchRequest,
            MessageKind::ResearchResult,
            MessageKind::PlannerGuidance,
            MessageKind::ReplanRequest,
            MessageKind::ApprovalRequest,
            MessageKind::ApprovalResult,
            MessageKind::UserMessage,
            MessageKind::AgentResponse,
            MessageKind::SystemEvent,
        ]
    }

    /// The wire/SQLite string form, e.g. `"plan_request"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageKind::PlanRequest => "plan_request",
            MessageKind::PlanResult => "plan_result",
            MessageKind::ExecutionRequest => "execution_request",
            MessageKind::ExecutionStatus => "execution_status",
            MessageKind::ResearchRequest => "research_request",
            MessageKind::ResearchResult => "research_result",
            MessageKind::PlannerGuidance => "planner_guidance",
            MessageKind::ReplanRequest => "replan_request",
            MessageKind::ApprovalRequest => "approval_request",
            MessageKind::ApprovalResult => "approval_result",
            MessageKind::UserMessage => "user_message",
            MessageKind::AgentResponse => "agent_response",
            MessageKind::SystemEvent => "system_event",
        }
    }

    /// Parses the wire string form back into a `MessageKind`.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// The human user.
    User,
    /// The router role/consumer.
    Router,
    /// The planner role/consumer.
    Planner,
    /// The executor role/consumer.
    Executor,
    /// The runtime itself (e.g. the scheduler dispatching a goal).
    Runtime,
}

impl Sender {
    /// The wire string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Router => "router",
            Sender::Planner => "planner",
            Sender::Executor => "executor",
            Sender::Runtime => "runtime",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Security trust level propagated from a message's inbound source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Taint {
    /// Produced by the owning operator; fully trusted.
    Owner,
    /// Produced by a trusted integration.
    Trusted,
    /// Produced by an untrusted external source.
    Untrusted,
}

impl Taint {
    /// The wire string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Taint::Owner => "owner",
            Taint::Trusted => "trusted",
            Taint::Untrusted => "untrusted",
        }
    }
}

/// Priority hint for consumer scheduling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Low priority, can be delayed arbitrarily.
    Background,
    /// Default priority.
    #[default]
    Informational,
    /// Needs a human's attention soon.
    NeedsAttention,
}

impl Urgency {
    /// The wire string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Urgency::Background => "background",
            Urgency::Informational => "informational",
            Urgency::NeedsAttention => "needs_attention",
        }
    }
}

/// Possible states for a work item execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Still in progress.
    Running,
    /// Completed successfully.
    Done,
    /// Failed outright.
    Failed,
    /// Stuck; may be eligible for consult-planner.
    Stuck,
    /// Blocked on an external dependency (e.g. approval).
    Blocked,
    /// Completed but failed post-hoc verification.
    VerificationFailed,
}

impl ExecutionStatus {
    /// The wire string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Done => "done",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Stuck => "stuck",
            ExecutionStatus::Blocked => "blocked",
            ExecutionStatus::VerificationFailed => "verification_failed",
        }
    }

    /// Parses the wire string form. Unknown strings are not representable
    /// as `ExecutionStatus`; callers handling raw payload strings should
    /// fall back to the status router's fail-loud default instead.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "running" => Some(ExecutionStatus::Running),
            "done" => Some(ExecutionStatus::Done),
            "failed" => Some(ExecutionStatus::Failed),
            "stuck" => Some(ExecutionStatus::Stuck),
            "blocked" => Some(ExecutionStatus::Blocked),
            "verification_failed" => Some(ExecutionStatus::VerificationFailed),
            _ => None,
        }
    }
}

/// UI surface an execution status is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// The live conversation stream.
    Stream,
    /// The background activity log.
    Activity,
}

impl Surface {
    /// The wire string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Surface::Stream => "stream",
            Surface::Activity => "activity",
        }
    }
}

/// The closed set of error kinds carried on `ErrorPayload` (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A tool invocation failed.
    ToolFailure,
    /// A resource/token/time budget was exceeded.
    BudgetExceeded,
    /// A policy gate blocked the action.
    GateBlocked,
    /// A human denied the required approval.
    ApprovalDenied,
    /// Post-hoc verification of the result failed.
    VerificationFailed,
    /// The operation timed out.
    Timeout,
}

impl ErrorKind {
    /// Whether this error kind should be retried (nack) rather than
    /// dead-lettered immediately.
    #[must_use]
    pub const fn default_retryable(self) -> bool {
        matches!(self, ErrorKind::ToolFailure | ErrorKind::Timeout)
    }
}
