//! `SQLite`-backed durable queue store with lease semantics.
//!
//! Grounded on `silas/queue/store.py`'s `DurableQueueStore` and the
//! teacher's `database.rs`/`storage/message_storage.rs` (functional
//! core/imperative shell split, manual row reconstruction, `DatabaseConnection`
//! wrapping a `SqlitePool`). Implements spec §4.1 verbatim, plus the
//! `lease_filtered` operation spec §9's design notes mandate for
//! trace-isolated polling.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use tracing::{debug, instrument, warn};

use crate::database::DatabaseConnection;
use crate::domain_types::{
    ApprovalToken, ConsumerName, LeaseId, MessageId, MessageKind, QueueName, ScopeId, Sender,
    TaskId, Taint, TraceId, Urgency, WorkItemId,
};
use crate::error::StoreError;
use crate::message::Message;
use crate::telemetry::{AuditSink, LoggingAuditSink, QueueEventKind, QueueTelemetryEvent};

/// Best-effort telemetry snapshot for one queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueDepth {
    /// Messages currently unleased and ready to be picked up.
    pub pending: u64,
}

/// A predicate used by [`Store::lease_filtered`] to atomically lease only
/// a message matching a trace and kind, without disturbing other in-flight
/// messages of other traces (spec §4.5, §9).
#[derive(Debug, Clone, Copy)]
pub struct LeaseFilter<'a> {
    /// Only lease a message whose `trace_id` equals this.
    pub trace_id: TraceId,
    /// Only lease a message whose `message_kind` equals this.
    pub message_kind: MessageKind,
    /// Unused placeholder to keep the lifetime parameter meaningful if the
    /// filter grows additional borrowed fields.
    _marker: std::marker::PhantomData<&'a ()>,
}

impl<'a> LeaseFilter<'a> {
    /// Builds a filter matching both trace id and message kind.
    #[must_use]
    pub fn new(trace_id: TraceId, message_kind: MessageKind) -> Self {
        Self {
            trace_id,
            message_kind,
            _marker: std::marker::PhantomData,
        }
    }
}

/// The durable queue store contract (spec §4.1).
#[async_trait]
pub trait Store: Send + Sync {
    /// Creates the schema if absent. Idempotent.
    async fn initialize(&self) -> Result<(), StoreError>;

    /// Inserts one message. `msg.queue_name` must already be set.
    async fn enqueue(&self, msg: &Message) -> Result<(), StoreError>;

    /// Atomically leases the oldest available message in `queue_name`,
    /// tie-broken by ascending `created_at`. Returns `None` if empty.
    async fn lease(
        &self,
        queue_name: &QueueName,
        lease_duration: std::time::Duration,
    ) -> Result<Option<Message>, StoreError>;

    /// Like [`Store::lease`] but only leases a message matching `filter`.
    /// Non-matching messages are left untouched — never leased, inspected,
    /// and nacked, which would reorder other traces' messages.
    async fn lease_filtered(
        &self,
        queue_name: &QueueName,
        filter: LeaseFilter<'_>,
        lease_duration: std::time::Duration,
    ) -> Result<Option<Message>, StoreError>;

    /// Deletes the row. Must only be called after side effects and the
    /// processed-ledger entry have succeeded.
    async fn ack(&self, id: MessageId) -> Result<(), StoreError>;

    /// Clears lease fields and increments `attempt_count`.
    async fn nack(&self, id: MessageId) -> Result<(), StoreError>;

    /// Moves the row to `dead_letters` with `reason` and `dead_lettered_at`.
    async fn dead_letter(&self, id: MessageId, reason: &str) -> Result<(), StoreError>;

    /// Extends `lease_expires_at` to `now + extend_by`.
    async fn heartbeat(
        &self,
        id: MessageId,
        extend_by: std::time::Duration,
    ) -> Result<(), StoreError>;

    /// Whether `consumer` has already processed `id`.
    async fn has_processed(
        &self,
        consumer: &ConsumerName,
        id: MessageId,
    ) -> Result<bool, StoreError>;

    /// Idempotently records that `consumer` has processed `id`.
    async fn mark_processed(
        &self,
        consumer: &ConsumerName,
        id: MessageId,
    ) -> Result<(), StoreError>;

    /// Count of unleased rows in `queue_name`.
    async fn pending_count(&self, queue_name: &QueueName) -> Result<QueueDepth, StoreError>;

    /// Clears lease fields on every row whose lease has expired. Returns
    /// the number of rows requeued. Called once on startup.
    async fn requeue_expired(&self) -> Result<u64, StoreError>;
}

/// `SQLite` implementation of [`Store`].
pub struct SqliteStore {
    connection: DatabaseConnection,
    audit: Arc<dyn AuditSink>,
}

impl SqliteStore {
    /// Wraps an already-initialized database connection, logging lifecycle
    /// events via [`LoggingAuditSink`].
    #[must_use]
    pub fn new(connection: DatabaseConnection) -> Self {
        Self::with_audit_sink(connection, Arc::new(LoggingAuditSink))
    }

    /// Wraps an already-initialized database connection, emitting lifecycle
    /// events to `audit` instead of the default logging sink — used by
    /// callers (and tests) that want to assert on or redirect emitted
    /// events.
    #[must_use]
    pub fn with_audit_sink(connection: DatabaseConnection, audit: Arc<dyn AuditSink>) -> Self {
        Self { connection, audit }
    }

    fn record_event(
        &self,
        queue_name: &QueueName,
        event: QueueEventKind,
        message_id: MessageId,
        trace_id: TraceId,
    ) {
        self.audit.record_queue_event(QueueTelemetryEvent {
            queue_name: queue_name.clone(),
            event,
            message_id,
            trace_id,
            timestamp: Utc::now(),
            queue_depth: None,
            wait_ms: None,
            lease_duration_s: None,
        });
    }

    fn row_to_message(row: &SqliteRow) -> Result<Message, StoreError> {
        let message_kind_str: String = row.try_get("message_kind")?;
        let message_kind = MessageKind::from_str_opt(&message_kind_str).ok_or_else(|| {
            StoreError::CorruptRow {
                column: "message_kind",
                value: message_kind_str.clone(),
            }
        })?;

        let sender_str: String = row.try_get("sender")?;
        let sender = parse_sender(&sender_str)?;

        let payload_str: String = row.try_get("payload")?;
        let payload: Value = serde_json::from_str(&payload_str).unwrap_or(Value::Null);

        let taint_str: Option<String> = row.try_get("taint")?;
        let taint = taint_str.as_deref().map(parse_taint).transpose()?;

        let urgency_str: String = row.try_get("urgency")?;
        let urgency = parse_urgency(&urgency_str)?;

        let id: String = row.try_get("id")?;
        let trace_id: String = row.try_get("trace_id")?;
        let queue_name: Option<String> = row.try_get("queue_name")?;
        let lease_id: Option<String> = row.try_get("lease_id")?;
        let scope_id: Option<String> = row.try_get("scope_id")?;
        let task_id: Option<String> = row.try_get("task_id")?;
        let parent_task_id: Option<String> = row.try_get("parent_task_id")?;
        let work_item_id: Option<String> = row.try_get("work_item_id")?;
        let approval_token: Option<String> = row.try_get("approval_token")?;

        Ok(Message {
            id: parse_uuid_field(&id, "id")?,
            queue_name: queue_name
                .map(|q| QueueName::try_new(q))
                .transpose()
                .map_err(|e| StoreError::CorruptRow {
                    column: "queue_name",
                    value: e.to_string(),
                })?,
            message_kind,
            sender,
            trace_id: parse_uuid_field(&trace_id, "trace_id")?,
            payload,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            lease_id: lease_id.map(|l| parse_uuid_field(&l, "lease_id")).transpose()?,
            lease_expires_at: row.try_get::<Option<DateTime<Utc>>, _>("lease_expires_at")?,
            attempt_count: u32::try_from(row.try_get::<i64, _>("attempt_count")?).unwrap_or(0),
            scope_id: scope_id
                .map(ScopeId::try_new)
                .transpose()
                .map_err(|e| StoreError::CorruptRow {
                    column: "scope_id",
                    value: e.to_string(),
                })?,
            taint,
            task_id: task_id
                .map(TaskId::try_new)
                .transpose()
                .map_err(|e| StoreError::CorruptRow {
                    column: "task_id",
                    value: e.to_string(),
                })?,
            parent_task_id: parent_task_id
                .map(TaskId::try_new)
                .transpose()
                .map_err(|e| StoreError::CorruptRow {
                    column: "parent_task_id",
                    value: e.to_string(),
                })?,
            work_item_id: work_item_id
                .map(WorkItemId::try_new)
                .transpose()
                .map_err(|e| StoreError::CorruptRow {
                    column: "work_item_id",
                    value: e.to_string(),
                })?,
            approval_token: approval_token
                .map(ApprovalToken::try_new)
                .transpose()
                .map_err(|e| StoreError::CorruptRow {
                    column: "approval_token",
                    value: e.to_string(),
                })?,
            urgency,
        })
    }
}

fn parse_uuid_field<T>(raw: &str, column: &'static str) -> Result<T, StoreError>
where
    T: TryFrom<uuid::Uuid>,
{
    let uuid = uuid::Uuid::parse_str(raw).map_err(|_| StoreError::CorruptRow {
        column,
        value: raw.to_string(),
    })?;
    T::try_from(uuid).map_err(|_| StoreError::CorruptRow {
        column,
        value: raw.to_string(),
    })
}

fn parse_sender(s: &str) -> Result<Sender, StoreError> {
    match s {
        "user" => Ok(Sender::User),
        "router" => Ok(Sender::Router),
        "planner" => Ok(Sender::Planner),
        "executor" => Ok(Sender::Executor),
        "runtime" => Ok(Sender::Runtime),
        other => Err(StoreError::CorruptRow {
            column: "sender",
            value: other.to_string(),
        }),
    }
}

fn parse_taint(s: &str) -> Result<Taint, StoreError> {
    match s {
        "owner" => Ok(Taint::Owner),
        "trusted" => Ok(Taint::Trusted),
        "untrusted" => Ok(Taint::Untrusted),
        other => Err(StoreError::CorruptRow {
            column: "taint",
            value: other.to_string(),
        }),
    }
}

fn parse_urgency(s: &str) -> Result<Urgency, StoreError> {
    match s {
        "background" => Ok(Urgency::Background),
        "informational" => Ok(Urgency::Informational),
        "needs_attention" => Ok(Urgency::NeedsAttention),
        other => Err(StoreError::CorruptRow {
            column: "urgency",
            value: other.to_string(),
        }),
    }
}

#[async_trait]
impl Store for SqliteStore {
    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<(), StoreError> {
        // Schema creation is handled by `DatabaseConnection::initialize`'s
        // embedded sqlx migrations; this is a no-op kept for trait parity
        // with spec §4.1, which calls for an idempotent initialize() step
        // independent from connection construction.
        Ok(())
    }

    #[instrument(skip(self, msg), fields(message_id = %msg.id, queue = ?msg.queue_name))]
    async fn enqueue(&self, msg: &Message) -> Result<(), StoreError> {
        let queue_name = msg
            .queue_name
            .as_ref()
            .expect("enqueue called with no queue_name set; router must assign it first");

        sqlx::query(
            r"INSERT INTO queue_messages
               (id, queue_name, message_kind, sender, trace_id, payload, created_at,
                lease_id, lease_expires_at, attempt_count, max_attempts,
                scope_id, taint, task_id, parent_task_id, work_item_id, approval_token, urgency)
               VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(msg.id.to_string())
        .bind(queue_name.to_string())
        .bind(msg.message_kind.as_str())
        .bind(msg.sender.as_str())
        .bind(msg.trace_id.to_string())
        .bind(msg.payload.to_string())
        .bind(msg.created_at)
        .bind(i64::from(msg.attempt_count))
        .bind(5_i64)
        .bind(msg.scope_id.as_ref().map(ToString::to_string))
        .bind(msg.taint.map(|t| t.as_str()))
        .bind(msg.task_id.as_ref().map(ToString::to_string))
        .bind(msg.parent_task_id.as_ref().map(ToString::to_string))
        .bind(msg.work_item_id.as_ref().map(ToString::to_string))
        .bind(msg.approval_token.as_ref().map(ToString::to_string))
        .bind(msg.urgency.as_str())
        .execute(self.connection.pool())
        .await?;

        self.record_event(queue_name, QueueEventKind::Enqueue, msg.id, msg.trace_id);
        debug!("enqueued message");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn lease(
        &self,
        queue_name: &QueueName,
        lease_duration: std::time::Duration,
    ) -> Result<Option<Message>, StoreError> {
        let now = Utc::now();
        let lease_id = LeaseId::generate();
        let expires_at = now + chrono::Duration::from_std(lease_duration).unwrap_or_default();

        let row = sqlx::query(
            r"UPDATE queue_messages
               SET lease_id = ?, lease_expires_at = ?
               WHERE id = (
                   SELECT id FROM queue_messages
                   WHERE queue_name = ?
                     AND (lease_id IS NULL OR lease_expires_at < ?)
                   ORDER BY created_at
                   LIMIT 1
               )
               RETURNING *",
        )
        .bind(lease_id.to_string())
        .bind(expires_at)
        .bind(queue_name.to_string())
        .bind(now)
        .fetch_optional(self.connection.pool())
        .await?;

        let message = row.as_ref().map(Self::row_to_message).transpose()?;
        if let Some(msg) = &message {
            self.record_event(queue_name, QueueEventKind::Dequeue, msg.id, msg.trace_id);
        }
        Ok(message)
    }

    #[instrument(skip(self, filter))]
    async fn lease_filtered(
        &self,
        queue_name: &QueueName,
        filter: LeaseFilter<'_>,
        lease_duration: std::time::Duration,
    ) -> Result<Option<Message>, StoreError> {
        let now = Utc::now();
        let lease_id = LeaseId::generate();
        let expires_at = now + chrono::Duration::from_std(lease_duration).unwrap_or_default();

        let row = sqlx::query(
            r"UPDATE queue_messages
               SET lease_id = ?, lease_expires_at = ?
               WHERE id = (
                   SELECT id FROM queue_messages
                   WHERE queue_name = ?
                     AND trace_id = ?
                     AND message_kind = ?
                     AND (lease_id IS NULL OR lease_expires_at < ?)
                   ORDER BY created_at
                   LIMIT 1
               )
               RETURNING *",
        )
        .bind(lease_id.to_string())
        .bind(expires_at)
        .bind(queue_name.to_string())
        .bind(filter.trace_id.to_string())
        .bind(filter.message_kind.as_str())
        .bind(now)
        .fetch_optional(self.connection.pool())
        .await?;

        let message = row.as_ref().map(Self::row_to_message).transpose()?;
        if let Some(msg) = &message {
            self.record_event(queue_name, QueueEventKind::Dequeue, msg.id, msg.trace_id);
        }
        Ok(message)
    }

    #[instrument(skip(self))]
    async fn ack(&self, id: MessageId) -> Result<(), StoreError> {
        let row = sqlx::query("DELETE FROM queue_messages WHERE id = ? RETURNING queue_name, trace_id")
            .bind(id.to_string())
            .fetch_optional(self.connection.pool())
            .await?;
        if let Some(row) = row {
            let queue_name_str: String = row.try_get("queue_name")?;
            let queue_name = QueueName::try_new(queue_name_str).map_err(|e| StoreError::CorruptRow {
                column: "queue_name",
                value: e.to_string(),
            })?;
            let trace_id_str: String = row.try_get("trace_id")?;
            let trace_id = parse_uuid_field(&trace_id_str, "trace_id")?;
            self.record_event(&queue_name, QueueEventKind::Ack, id, trace_id);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn nack(&self, id: MessageId) -> Result<(), StoreError> {
        let row = sqlx::query(
            r"UPDATE queue_messages
               SET lease_id = NULL, lease_expires_at = NULL, attempt_count = attempt_count + 1
               WHERE id = ?
               RETURNING queue_name, trace_id",
        )
        .bind(id.to_string())
        .fetch_optional(self.connection.pool())
        .await?;
        if let Some(row) = row {
            let queue_name_str: String = row.try_get("queue_name")?;
            let queue_name = QueueName::try_new(queue_name_str).map_err(|e| StoreError::CorruptRow {
                column: "queue_name",
                value: e.to_string(),
            })?;
            let trace_id_str: String = row.try_get("trace_id")?;
            let trace_id = parse_uuid_field(&trace_id_str, "trace_id")?;
            self.record_event(&queue_name, QueueEventKind::Nack, id, trace_id);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn dead_letter(&self, id: MessageId, reason: &str) -> Result<(), StoreError> {
        let mut tx = self.connection.pool().begin().await?;

        let row = sqlx::query("SELECT * FROM queue_messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(());
        };

        let now = Utc::now();
        sqlx::query(
            r"INSERT INTO dead_letters
               (id, queue_name, message_kind, sender, trace_id, payload, created_at,
                lease_id, lease_expires_at, attempt_count, max_attempts,
                scope_id, taint, task_id, parent_task_id, work_item_id, approval_token, urgency,
                dead_letter_reason, dead_lettered_at)
               SELECT id, queue_name, message_kind, sender, trace_id, payload, created_at,
                      lease_id, lease_expires_at, attempt_count, max_attempts,
                      scope_id, taint, task_id, parent_task_id, work_item_id, approval_token, urgency,
                      ?, ?
               FROM queue_messages WHERE id = ?",
        )
        .bind(reason)
        .bind(now)
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM queue_messages WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let queue_name_str: String = row.try_get("queue_name")?;
        let queue_name = QueueName::try_new(queue_name_str).map_err(|e| StoreError::CorruptRow {
            column: "queue_name",
            value: e.to_string(),
        })?;
        let trace_id_str: String = row.try_get("trace_id")?;
        let trace_id = parse_uuid_field(&trace_id_str, "trace_id")?;
        self.record_event(&queue_name, QueueEventKind::DeadLetter, id, trace_id);

        warn!(message_id = %id, %reason, "dead-lettered message");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn heartbeat(
        &self,
        id: MessageId,
        extend_by: std::time::Duration,
    ) -> Result<(), StoreError> {
        let new_expiry =
            Utc::now() + chrono::Duration::from_std(extend_by).unwrap_or_default();
        let row = sqlx::query(
            "UPDATE queue_messages SET lease_expires_at = ? WHERE id = ? RETURNING queue_name, trace_id",
        )
        .bind(new_expiry)
        .bind(id.to_string())
        .fetch_optional(self.connection.pool())
        .await?;
        if let Some(row) = row {
            let queue_name_str: String = row.try_get("queue_name")?;
            let queue_name = QueueName::try_new(queue_name_str).map_err(|e| StoreError::CorruptRow {
                column: "queue_name",
                value: e.to_string(),
            })?;
            let trace_id_str: String = row.try_get("trace_id")?;
            let trace_id = parse_uuid_field(&trace_id_str, "trace_id")?;
            self.record_event(&queue_name, QueueEventKind::Heartbeat, id, trace_id);
        }
        Ok(())
    }

    async fn has_processed(
        &self,
        consumer: &ConsumerName,
        id: MessageId,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM processed_messages WHERE consumer = ? AND message_id = ?")
            .bind(consumer.to_string())
            .bind(id.to_string())
            .fetch_optional(self.connection.pool())
            .await?;
        Ok(row.is_some())
    }

    async fn mark_processed(
        &self,
        consumer: &ConsumerName,
        id: MessageId,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO processed_messages (consumer, message_id, processed_at) VALUES (?, ?, ?)",
        )
        .bind(consumer.to_string())
        .bind(id.to_string())
        .bind(Utc::now())
        .execute(self.connection.pool())
        .await?;
        Ok(())
    }

    async fn pending_count(&self, queue_name: &QueueName) -> Result<QueueDepth, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_messages WHERE queue_name = ? AND lease_id IS NULL")
                .bind(queue_name.to_string())
                .fetch_one(self.connection.pool())
                .await?;
        Ok(QueueDepth {
            pending: u64::try_from(count).unwrap_or(0),
        })
    }

    #[instrument(skip(self))]
    async fn requeue_expired(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let rows = sqlx::query(
            r"UPDATE queue_messages
               SET lease_id = NULL, lease_expires_at = NULL
               WHERE lease_id IS NOT NULL AND lease_expires_at < ?
               RETURNING id, queue_name, trace_id",
        )
        .bind(now)
        .fetch_all(self.connection.pool())
        .await?;

        let requeued = u64::try_from(rows.len()).unwrap_or(0);
        for row in &rows {
            let id_str: String = row.try_get("id")?;
            let id = parse_uuid_field(&id_str, "id")?;
            let queue_name_str: String = row.try_get("queue_name")?;
            let queue_name = QueueName::try_new(queue_name_str).map_err(|e| StoreError::CorruptRow {
                column: "queue_name",
                value: e.to_string(),
            })?;
            let trace_id_str: String = row.try_get("trace_id")?;
            let trace_id = parse_uuid_field(&trace_id_str, "trace_id")?;
            self.record_event(&queue_name, QueueEventKind::Expired, id, trace_id);
        }
        if requeued > 0 {
            warn!(requeued, "requeued messages with expired leases on startup");
        }
        Ok(requeued)
    }
}

#[cfg(test)]
mod audit_tests {
    use super::*;
    use crate::database::{DatabaseConfig, DatabaseConnection, DatabasePath};
    use crate::domain_types::{MessageKind, Sender};
    use crate::telemetry::CollectingAuditSink;
    use tempfile::tempdir;

    async fn test_store_with_sink() -> (SqliteStore, Arc<CollectingAuditSink>) {
        let dir = tempdir().unwrap();
        let path = DatabasePath::new(dir.path().join("test.db")).unwrap();
        std::mem::forget(dir);
        let conn = DatabaseConnection::initialize(DatabaseConfig::for_testing(path))
            .await
            .unwrap();
        let sink = Arc::new(CollectingAuditSink::new());
        (SqliteStore::with_audit_sink(conn, Arc::clone(&sink) as Arc<dyn AuditSink>), sink)
    }

    #[tokio::test]
    async fn enqueue_lease_and_ack_each_emit_one_queue_event() {
        let (store, sink) = test_store_with_sink().await;
        let queue_name = QueueName::try_new("router").unwrap();

        let mut msg = Message::new(MessageKind::UserMessage, Sender::User, serde_json::json!({}));
        msg.queue_name = Some(queue_name.clone());
        store.enqueue(&msg).await.unwrap();

        let leased = store
            .lease(&queue_name, std::time::Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();
        store.ack(leased.id).await.unwrap();

        let events = sink.queue_events();
        let kinds: Vec<QueueEventKind> = events.iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![QueueEventKind::Enqueue, QueueEventKind::Dequeue, QueueEventKind::Ack]);
        assert!(events.iter().all(|e| e.message_id == msg.id && e.trace_id == msg.trace_id));
    }

    #[tokio::test]
    async fn nack_emits_a_nack_event() {
        let (store, sink) = test_store_with_sink().await;
        let queue_name = QueueName::try_new("router").unwrap();

        let mut msg = Message::new(MessageKind::UserMessage, Sender::User, serde_json::json!({}));
        msg.queue_name = Some(queue_name.clone());
        store.enqueue(&msg).await.unwrap();
        let leased = store
            .lease(&queue_name, std::time::Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();

        store.nack(leased.id).await.unwrap();

        let events = sink.queue_events();
        assert_eq!(events.last().unwrap().event, QueueEventKind::Nack);
    }

    #[tokio::test]
    async fn dead_letter_emits_a_dead_letter_event() {
        let (store, sink) = test_store_with_sink().await;
        let queue_name = QueueName::try_new("router").unwrap();

        let mut msg = Message::new(MessageKind::UserMessage, Sender::User, serde_json::json!({}));
        msg.queue_name = Some(queue_name);
        store.enqueue(&msg).await.unwrap();

        store.dead_letter(msg.id, "exceeded max attempts").await.unwrap();

        let events = sink.queue_events();
        assert_eq!(events.last().unwrap().event, QueueEventKind::DeadLetter);
    }
}
