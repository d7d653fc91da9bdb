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

//! # Markets - Shared Domain Types
//!
//! Small, dependency-light crate holding the vocabulary every other crate in the
//! workspace shares: instrument symbols, trade side, and market/volatility regime.
//! Kept deliberately free of I/O so it can be depended on by both the real-time
//! pipeline and future offline tooling.

pub mod regime;
pub mod side;
pub mod symbol;

pub use regime::{Regime, VolatilityRegime};
pub use side::Side;
pub use symbol::Symbol;
