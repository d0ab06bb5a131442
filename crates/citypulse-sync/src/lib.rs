//! Real-time synchronization core for the CityPulse client.
//!
//! Keeps a client consistent with a remote traffic simulation: a resilient
//! WebSocket connection feeds typed events into reactive state slices, and
//! a request/response gateway issues commands with deterministic success
//! or failure feedback through a single-slot notification queue.
//!
//! # Architecture
//!
//! ```text
//! ConnectionManager --frames--> Dispatcher --replace--> StateStore --> renderer
//!        |                                                  ^
//!        +--------------> NotificationCenter <------ CommandGateway
//! ```
//!
//! # Modules
//!
//! - [`config`] -- YAML configuration with environment overrides.
//! - [`connection`] -- Pure connection lifecycle state machine.
//! - [`dispatcher`] -- Envelope decoding and the `type -> handler` table.
//! - [`error`] -- Error types for dispatch, commands, and sessions.
//! - [`gateway`] -- HTTP command channel and confirmed state updates.
//! - [`manager`] -- The tokio task that drives the socket and heartbeat.
//! - [`notification`] -- Single-slot notification queue with auto-hide.
//! - [`retry`] -- Reconnect attempt budget and delay schedule.
//! - [`session`] -- Explicit `init`/`teardown` lifecycle.
//! - [`store`] -- Watch-channel state slices.

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod manager;
pub mod notification;
pub mod retry;
pub mod session;
pub mod store;

pub use config::SyncConfig;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{CommandError, DispatchError, SyncError};
pub use gateway::CommandGateway;
pub use manager::ConnectionManager;
pub use notification::NotificationCenter;
pub use session::SyncSession;
pub use store::{Slice, StateStore, StoreSnapshot};
