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

//! # Strategy - Regime Detection & Rule Engine
//!
//! Turns a [`perpbot_data::FeatureSnapshot`] into a [`signal::TradeSignal`] in two
//! stages: [`regime::RegimeDetector`] classifies the symbol's market regime from a
//! sticky, multi-observation state machine, then [`engine::RuleEngine`] evaluates
//! the registered [`rule::Rule`] catalog under that regime and folds the result
//! into a single weighted bias score.

pub mod catalog;
pub mod engine;
pub mod regime;
pub mod rule;
pub mod signal;

pub use engine::RuleEngine;
pub use regime::{AdxTrend, RegimeDetector};
pub use rule::{Rule, RuleType};
pub use signal::{TradeAction, TradeSignal};
