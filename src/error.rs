//! Error taxonomy for the message bus.
//!
//! Grounded on the teacher's `database.rs` (`StorageError`/`DatabaseError`
//! split) and `message_router/traits.rs` (`RouterError`): typed variants
//! with `#[source]`/`#[from]` instead of a single string-bag error.

use thiserror::Error;

use crate::domain_types::{MessageKind, QueueName};

/// Storage-layer errors, distinguishing transient I/O failures (the caller
/// nacks and retries) from configuration/logic errors that should surface.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying `SQLx`/SQLite failure. Transient per spec §4.1 — callers
    /// treat this as a processing failure and nack.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed during `initialize()`.
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A row's `message_kind`/`sender`/`taint`/`urgency` column held a
    /// string outside the closed set. Indicates on-disk corruption or a
    /// schema mismatch between writer and reader versions.
    #[error("corrupt row: column {column} had unrecognized value {value:?}")]
    CorruptRow {
        /// The column name.
        column: &'static str,
        /// The unrecognized value.
        value: String,
    },

    /// The ledger insert failed after side effects already ran. Per spec
    /// §4.1 this is logical corruption, not a transient condition, and must
    /// surface rather than be silently retried.
    #[error("processed-ledger write failed after side effects completed for {message_id}: {source}")]
    LedgerWriteAfterSideEffects {
        /// The message whose side effects already ran.
        message_id: String,
        /// The underlying database error.
        #[source]
        source: sqlx::Error,
    },
}

/// Errors raised by the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// `route()` was called with a `message_kind` outside the routing
    /// table. Spec §4.2/§9: this fails loud rather than silently dropping.
    #[error("no route registered for message kind {0}")]
    UnknownKind(MessageKind),

    /// The underlying store operation failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by a role adapter invocation (spec §6.3).
#[derive(Debug, Error)]
pub enum RoleError {
    /// The role failed at runtime; the consumer will nack the triggering
    /// message.
    #[error("role {role} failed: {message}")]
    Failed {
        /// Which role failed (router/planner/executor).
        role: &'static str,
        /// The failure description.
        message: String,
    },
}

/// Top-level error type covering consumer dispatch and orchestration.
#[derive(Debug, Error)]
pub enum BusError {
    /// A store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A routing operation failed.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// A role invocation failed.
    #[error(transparent)]
    Role(#[from] RoleError),

    /// A consumer received a message on a queue it doesn't own.
    #[error("queue {queue} is not served by this consumer")]
    WrongQueue {
        /// The unexpected queue.
        queue: QueueName,
    },

    /// A required configuration value was invalid.
    #[error("invalid configuration: {field} - {reason}")]
    Configuration {
        /// The offending field.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}
