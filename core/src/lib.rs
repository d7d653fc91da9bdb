#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity, clippy::too_many_arguments)]

//! # Core - Settings, State, Exit Manager & Event Orchestrator
//!
//! The crate that wires every other component in the workspace into a running
//! system: [`settings`] loads typed configuration once at startup, [`state`]
//! holds the persisted [`state::SystemState`] aggregate, [`exit`] is the
//! per-position exit state machine, [`state_store`] persists that aggregate to
//! Redis, [`notify`] is the external notification interface, and [`engine`]
//! is the [`engine::EventOrchestrator`] that drives the whole pipeline from
//! market-data event to order to exit.

pub mod engine;
pub mod error;
pub mod exit;
pub mod logging;
pub mod notify;
pub mod settings;
pub mod state;
pub mod state_store;

pub use engine::EventOrchestrator;
pub use error::{CoreError, CoreResult};
pub use settings::Settings;
pub use state::{Position, SystemState};
pub use state_store::{InMemoryStateStore, RedisStateStore, StateStore};
