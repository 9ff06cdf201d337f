//! A durable, lease-based, multi-queue message bus for local agentic
//! runtimes.
//!
//! The bus moves messages between four fixed queues — router, planner,
//! executor, and runtime — each backed by [`store::SqliteStore`] and
//! consumed by a [`consumer::ConsumerRuntime`] wrapping a role-specific
//! [`consumer::Consumer`] implementation. See `SPEC_FULL.md` at the crate
//! root for the full contract.

pub mod bridge;
pub mod config;
pub mod consult;
pub mod consumer;
pub mod database;
pub mod domain_types;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod replan;
pub mod roles;
pub mod router;
pub mod status;
pub mod store;
pub mod telemetry;
pub mod time_provider;

pub use bridge::QueueBridge;
pub use config::BusConfig;
pub use error::BusError;
pub use message::Message;
pub use orchestrator::Orchestrator;
pub use router::Router;
pub use store::{SqliteStore, Store};
