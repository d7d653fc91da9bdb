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

//! # Analytics - Trading Summary Metrics
//!
//! Win rate, profit factor and Sharpe ratio over the closed-trade history,
//! computed at `Decimal` precision. [`summary::TradingSummaryGenerator`]
//! accumulates [`summary::ClosedTrade`]s as positions close and produces a
//! [`summary::TradingSummary`] for the notifier and for diagnostics.

pub mod metric;
pub mod summary;

pub use metric::{ProfitFactor, SharpeRatio, WinRate};
pub use summary::{ClosedTrade, TradingSummary, TradingSummaryGenerator};
