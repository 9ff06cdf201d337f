//! Base consumer template: lease → idempotency guard → dead-letter guard →
//! process → ack/nack (spec §4.3).
//!
//! Grounded on `silas/queue/consumers.py`'s `BaseConsumer.poll_once`: the
//! lifecycle is identical token-for-token, reimplemented here as a free
//! function operating over an injected [`Consumer`] rather than a base
//! class, per the teacher's composition-over-inheritance idiom (injected
//! `Arc<dyn Trait>` collaborators in `message_router::router::MessageRouterImpl`).

pub mod executor;
pub mod planner;
pub mod router_consumer;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{instrument, warn};

use crate::domain_types::{ConsumerName, QueueName};
use crate::error::{BusError, RoleError};
use crate::message::Message;
use crate::router::Router;
use crate::store::Store;

/// Whether a `poll_once` call found and handled a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    /// The queue was empty.
    Idle,
    /// A message was leased and handled (processed, dead-lettered, or
    /// recognized as already processed).
    WorkDone,
}

/// Role-specific dispatch logic injected into [`ConsumerRuntime`]. Each of
/// the three role consumers implements this; the lease/ack/nack lifecycle
/// around it is identical and lives in `ConsumerRuntime::poll_once`.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// The queue this consumer reads from.
    fn queue_name(&self) -> QueueName;

    /// Dispatches on `msg.message_kind`, invoking the role and producing an
    /// optional follow-on message to route onward.
    ///
    /// # Errors
    ///
    /// Returns [`RoleError`] if the underlying role invocation fails; the
    /// runtime nacks the triggering message in response.
    async fn process(&self, msg: &Message) -> Result<Option<Message>, RoleError>;
}

/// Wraps a [`Consumer`] with the shared lease/ack/nack/dead-letter template
/// (spec §4.3).
pub struct ConsumerRuntime<C> {
    store: Arc<dyn Store>,
    router: Router,
    consumer: C,
    consumer_name: ConsumerName,
    max_attempts: u32,
    lease_duration: std::time::Duration,
}

impl<C: Consumer> ConsumerRuntime<C> {
    /// Builds a runtime for `consumer`. `consumer_name` follows the
    /// `"consumer:{queue_name}"` convention used as the idempotency ledger
    /// key (spec §4.3).
    pub fn new(
        store: Arc<dyn Store>,
        router: Router,
        consumer: C,
        max_attempts: u32,
        lease_duration: std::time::Duration,
    ) -> Self {
        let consumer_name = ConsumerName::try_new(format!("consumer:{}", consumer.queue_name()))
            .expect("queue name is non-empty, so the derived consumer name is too");
        Self {
            store,
            router,
            consumer,
            consumer_name,
            max_attempts,
            lease_duration,
        }
    }

    /// The queue this runtime's consumer reads from.
    #[must_use]
    pub fn queue_name(&self) -> QueueName {
        self.consumer.queue_name()
    }

    /// Performs exactly one unit of work: lease, idempotency check,
    /// dead-letter check, process, ack/nack (spec §4.3 step sequence).
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] only for store-layer failures on the lease call
    /// itself or the bookkeeping calls around `process`; a failure *within*
    /// `process` is caught and turned into a nack, not propagated.
    #[instrument(skip(self), fields(queue = %self.queue_name(), consumer = %self.consumer_name))]
    pub async fn poll_once(&self) -> Result<PollResult, BusError> {
        let Some(msg) = self
            .store
            .lease(&self.queue_name(), self.lease_duration)
            .await?
        else {
            return Ok(PollResult::Idle);
        };

        if self.store.has_processed(&self.consumer_name, msg.id).await? {
            self.store.ack(msg.id).await?;
            return Ok(PollResult::WorkDone);
        }

        if msg.attempt_count >= self.max_attempts {
            self.store
                .dead_letter(
                    msg.id,
                    &format!("max_attempts_exceeded ({})", self.max_attempts),
                )
                .await?;
            warn!(message_id = %msg.id, attempts = msg.attempt_count, "dead-lettered message");
            return Ok(PollResult::WorkDone);
        }

        match self.consumer.process(&msg).await {
            Ok(follow_on) => {
                self.store.mark_processed(&self.consumer_name, msg.id).await?;
                self.store.ack(msg.id).await?;
                if let Some(follow_on) = follow_on {
                    self.router.route(follow_on).await?;
                }
                Ok(PollResult::WorkDone)
            }
            Err(err) => {
                warn!(message_id = %msg.id, error = %err, "consumer failed processing message, nacking");
                self.store.nack(msg.id).await?;
                Ok(PollResult::WorkDone)
            }
        }
    }
}
