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

//! # Data - Streaming Ingest & Feature Engine
//!
//! Owns everything between the exchange wire format and a typed, incrementally
//! maintained view of each symbol:
//!
//! - [`event`]: the normalized [`event::MarketDataEvent`] and the bounded
//!   [`event::OhlcvBar`] ring buffer it is folded into.
//! - [`ingest`]: shards symbols across multiple WebSocket connections, handles
//!   reconnection/keepalive/health, and validates every event before it reaches
//!   a handler.
//! - [`feature`]: the stateful per-symbol indicator set (EMA, ADX, RSI, ATR,
//!   Donchian, Bollinger, Stochastic) and the [`feature::FeatureSnapshot`] it
//!   produces.

pub mod event;
pub mod feature;
pub mod ingest;

pub use event::{Kline, MarketDataEvent, MarketDataKind, OhlcvBar};
pub use feature::{FeatureEngine, FeatureSnapshot};
