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

//! # Integration - Low-Level Glue
//!
//! Small, dependency-light primitives shared by every component that talks to the
//! outside world: a token-bucket [`rate_limit::RateLimiter`] gating exchange REST
//! calls, and [`collection::FnvIndexMap`] used wherever a fast, insertion-ordered
//! map keyed by symbol is needed.

pub mod collection;
pub mod rate_limit;

pub use rate_limit::RateLimiter;
