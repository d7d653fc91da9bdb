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

//! # Risk - Pre-Trade Vetoes & Position Sizing
//!
//! The gate every proposed signal must clear before an order is submitted:
//! [`adx_gate::AdxEntryGate`] filters choppy or weakening markets, [`sizer::PositionSizer`]
//! turns `(equity, price, atr)` into a Turtle N-unit candidate quantity, and
//! [`veto::PreTradeVetoChain`] validates that candidate against portfolio-level
//! limits, first rejection wins.

pub mod adx_gate;
pub mod sizer;
pub mod veto;

pub use adx_gate::{AdxEntryGate, AdxGateConfig, AdxGateRejection};
pub use sizer::{PositionSizer, Sizing, SizerConfig, SizingRejection};
pub use veto::{PreTradeVetoChain, RiskApproved, RiskContext, RiskRefused, VetoConfig, VetoStage};
