//! Canonical message envelope and typed payload models.
//!
//! Grounded on `silas/queue/types.py`: the envelope is a sum over
//! `message_kind`, with cross-cutting fields promoted to first-class
//! envelope attributes rather than buried in the payload map (spec §3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain_types::{
    ApprovalToken, ErrorKind, ExecutionStatus, LeaseId, MessageId, MessageKind, QueueName,
    ScopeId, Sender, TaskId, Taint, TraceId, Urgency, WorkItemId,
};

/// Canonical in-memory and on-disk representation of a bus message.
///
/// Invariants (spec §3.1): `id` is unique and immutable; `trace_id`
/// propagates unchanged across derived messages; `created_at` is set once
/// at construction; `lease_id`/`lease_expires_at` are either both set or
/// both `None` and are only ever written by [`crate::store::Store`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier; the idempotency key.
    pub id: MessageId,
    /// Destination queue. Assigned by the router, never by producers.
    pub queue_name: Option<QueueName>,
    /// One of the closed set of message kinds.
    pub message_kind: MessageKind,
    /// Who produced this message.
    pub sender: Sender,
    /// Propagates unchanged across all hops for one logical turn.
    pub trace_id: TraceId,
    /// Semi-structured payload; typed sub-models recognized per `message_kind`.
    pub payload: Value,
    /// Timezone-aware creation timestamp. Never mutated after construction.
    pub created_at: DateTime<Utc>,
    /// Infrastructure field, mutated only by the store.
    pub lease_id: Option<LeaseId>,
    /// Infrastructure field, mutated only by the store.
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Monotonically increasing delivery attempts.
    pub attempt_count: u32,

    /// Executor scope tracking — isolates worktrees/artifacts per connection.
    pub scope_id: Option<ScopeId>,
    /// Security taint propagated from the inbound message source.
    pub taint: Option<Taint>,
    /// Links related messages across the plan -> execute -> status chain.
    pub task_id: Option<TaskId>,
    /// Enables sub-task hierarchy (research sub-tasks under a parent).
    pub parent_task_id: Option<TaskId>,
    /// Reference to the work item being executed.
    pub work_item_id: Option<WorkItemId>,
    /// Authorization token consumed by the approval engine at execution entry.
    pub approval_token: Option<ApprovalToken>,
    /// Priority hint for consumer scheduling decisions.
    pub urgency: Urgency,
}

impl Message {
    /// Builds a new message with a fresh id and `created_at`, and a fresh
    /// `trace_id` if the caller doesn't supply one via [`Message::with_trace_id`].
    #[must_use]
    pub fn new(message_kind: MessageKind, sender: Sender, payload: Value) -> Self {
        Self {
            id: MessageId::generate(),
            queue_name: None,
            message_kind,
            sender,
            trace_id: TraceId::generate(),
            payload,
            created_at: Utc::now(),
            lease_id: None,
            lease_expires_at: None,
            attempt_count: 0,
            scope_id: None,
            taint: None,
            task_id: None,
            parent_task_id: None,
            work_item_id: None,
            approval_token: None,
            urgency: Urgency::default(),
        }
    }

    /// Overrides the trace id, propagating the originating turn's identity
    /// onto a message that would otherwise mint its own.
    #[must_use]
    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = trace_id;
        self
    }

    /// Builds a follow-on message that propagates this message's `trace_id`
    /// (spec invariant P7: a consumer's derived message's trace id always
    /// equals the triggering message's trace id).
    #[must_use]
    pub fn derive(&self, message_kind: MessageKind, sender: Sender, payload: Value) -> Self {
        Self::new(message_kind, sender, payload).with_trace_id(self.trace_id)
    }

    /// Parses `payload` into the typed model registered for this
    /// `message_kind`. Returns `None` if no typed model is registered or
    /// the payload doesn't validate — callers fall back to raw field access
    /// instead of treating this as fatal (mirrors `parse_payload` in
    /// `silas/queue/types.py`, which swallows validation errors for
    /// backward compatibility with partially-populated messages).
    #[must_use]
    pub fn typed_payload(&self) -> Option<TypedPayload> {
        match self.message_kind {
            MessageKind::UserMessage => serde_json::from_value(self.payload.clone())
                .ok()
                .map(TypedPayload::UserMessage),
            MessageKind::PlanRequest => serde_json::from_value(self.payload.clone())
                .ok()
                .map(TypedPayload::PlanRequest),
            MessageKind::ExecutionRequest => serde_json::from_value(self.payload.clone())
                .ok()
                .map(TypedPayload::ExecutionRequest),
            MessageKind::AgentResponse => serde_json::from_value(self.payload.clone())
                .ok()
                .map(TypedPayload::AgentResponse),
            MessageKind::ExecutionStatus => serde_json::from_value(self.payload.clone())
                .ok()
                .map(TypedPayload::Status),
            _ => None,
        }
    }

    /// Reads a string field out of the payload object, or `""` if absent.
    /// Convenience used by consumers that only need a couple of fields and
    /// don't want to construct a typed payload for it.
    #[must_use]
    pub fn payload_str(&self, key: &str) -> String {
        self.payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Reads a bool field out of the payload object, defaulting to `false`.
    #[must_use]
    pub fn payload_bool(&self, key: &str) -> bool {
        self.payload
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// The union of typed payload models a consumer can narrow on without
/// inspecting `message_kind` separately.
#[derive(Clone)]
pub enum TypedPayload {
    /// Payload for `message_kind = user_message`.
    UserMessage(UserMessagePayload),
    /// Payload for `message_kind = plan_request`.
    PlanRequest(PlanRequestPayload),
    /// Payload for `message_kind = execution_request`.
    ExecutionRequest(ExecutionRequestPayload),
    /// Payload for `message_kind = agent_response`.
    AgentResponse(AgentResponsePayload),
    /// Payload for `message_kind = execution_status`.
    Status(StatusPayload),
}

/// Structured error information attached to failure messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// The closed-set error kind.
    pub error_code: ErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Which role produced the error.
    pub origin_agent: Sender,
    /// Whether the caller should retry (nack) or dead-letter.
    pub retryable: bool,
    /// Optional extra detail.
    #[serde(default)]
    pub detail: Option<String>,
}

/// Execution status update for a work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusPayload {
    /// The reported status.
    pub status: ExecutionStatus,
    /// The work item this status pertains to.
    pub work_item_id: String,
    /// The attempt number this status reflects.
    #[serde(default)]
    pub attempt: u32,
    /// Optional human-readable detail.
    #[serde(default)]
    pub detail: Option<String>,
}

/// Payload for `message_kind = user_message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessagePayload {
    /// The raw user text.
    pub text: String,
    /// Optional free-form metadata attached by the transport layer.
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

/// Payload for `message_kind = plan_request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequestPayload {
    /// The user's (or consult/replan-synthesized) request text.
    pub user_request: String,
    /// Why this plan request was raised (router's reasoning, if any).
    #[serde(default)]
    pub reason: String,
    /// Set for autonomous goals dispatched directly by the scheduler.
    #[serde(default)]
    pub goal_id: Option<String>,
    /// True when this plan request bypassed the router (autonomous goal).
    #[serde(default)]
    pub autonomous: bool,
    /// True when this is a consult-planner guidance request, not a plan.
    #[serde(default)]
    pub consult: bool,
    /// The work item a consult request is asking guidance for.
    #[serde(default)]
    pub work_item_id: Option<String>,
}

/// Payload for `message_kind = execution_request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequestPayload {
    /// The work item to execute.
    pub work_item_id: String,
    /// Human-readable task description passed to the executor role.
    #[serde(default)]
    pub task_description: String,
    /// Alternate free-form body, used when no structured description exists.
    #[serde(default)]
    pub body: String,
    /// What the executor should do if it gets stuck.
    #[serde(default)]
    pub on_stuck: Option<OnStuckPolicy>,
}

/// Policy for how the executor should react to a stuck/failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnStuckPolicy {
    /// Suspend, ask the planner for guidance, retry once.
    ConsultPlanner,
}

/// Payload for `message_kind = agent_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponsePayload {
    /// The response text shown to the user.
    pub text: String,
    /// Optional additional message.
    #[serde(default)]
    pub message: String,
}

/// Planner-imposed constraints on a research sub-request (tool allowlist,
/// format, token budget). Not yet wired to payload parsing by `message_kind`
/// since research requests reuse `ExecutionRequestPayload`'s shape, but kept
/// as a first-class type so callers can attach it under a dedicated key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConstraints {
    /// The format the executor must return the research in.
    pub return_format: String,
    /// Maximum tokens the research summary may use.
    #[serde(default = "default_research_max_tokens")]
    pub max_tokens: u32,
    /// Tool names the executor may use in research mode.
    #[serde(default = "default_research_tools")]
    pub tools_allowed: Vec<String>,
}

fn default_research_max_tokens() -> u32 {
    500
}

fn default_research_tools() -> Vec<String> {
    vec![
        "web_search".to_string(),
        "read_file".to_string(),
        "memory_search".to_string(),
    ]
}

impl std::fmt::Debug for TypedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypedPayload::UserMessage(p) => f.debug_tuple("UserMessage").field(p).finish(),
            TypedPayload::PlanRequest(p) => f.debug_tuple("PlanRequest").field(p).finish(),
            TypedPayload::ExecutionRequest(p) => {
                f.debug_tuple("ExecutionRequest").field(p).finish()
            }
            TypedPayload::AgentResponse(p) => f.debug_tuple("AgentResponse").field(p).finish(),
            TypedPayload::Status(p) => f.debug_tuple("Status").field(p).finish(),
        }
    }
}
