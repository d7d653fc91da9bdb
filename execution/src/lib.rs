#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms
)]
#![allow(clippy::type_complexity)]

//! # Execution - Exchange Client & Order Manager
//!
//! [`client::ExchangeClient`] is the signed REST surface to the perpetual-futures
//! venue (C3); [`order_manager::OrderManager`] builds the entry/stop/close
//! workflow on top of it (C10); [`user_stream`] maintains the separate user-data
//! WebSocket for fills and account updates. Every network-facing call passes
//! through the shared rate limiter before it leaves the process.

pub mod client;
pub mod error;
pub mod model;
pub mod order_manager;
pub mod signing;
pub mod user_stream;

pub use client::{ExchangeClient, ExchangeClientConfig};
pub use error::{ExecutionError, ExecutionResult};
pub use order_manager::OrderManager;
pub use user_stream::{run_user_stream, UserStreamHandler};
