//! # Exit Manager (C11)
//!
//! Per-position exit state machine evaluated on every price update. Guards
//! first, then a priority-ordered chain of checks where the first to fire wins.

use crate::state::Position;
use chrono::{DateTime, Utc};
use perpbot_markets::{Regime, Side};
use perpbot_strategy::AdxTrend;

const AGE_GUARD: chrono::Duration = chrono::Duration::seconds(60);
const MOMENTUM_LOSS_ADX_THRESHOLD: f64 = 20.0;
const MOMENTUM_LOSS_MIN_R_MULTIPLE: f64 = 1.0;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExitReason {
    StopLoss,
    RegimeChange,
    MomentumLoss,
    DonchianBreak,
    /// The rule engine proposed the opposite side while this position was open.
    OppositeSignal,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExitUrgency {
    Immediate,
    NextBar,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ExitDecision {
    Hold,
    Exit { reason: ExitReason, urgency: ExitUrgency },
}

/// Inputs the exit checks need beyond the position itself; gathered by the
/// orchestrator from the feature engine and regime detector on each tick.
#[derive(Debug, Clone, Copy)]
pub struct ExitContext {
    pub close: f64,
    pub regime: Regime,
    pub adx: f64,
    pub adx_trend: AdxTrend,
    pub high_20: f64,
    pub low_20: f64,
    pub bar_timestamp: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

fn realised_r_multiple(position: &Position, close: f64) -> f64 {
    let risk_per_unit = (position.entry_price - position.initial_stop_loss).abs();
    if risk_per_unit <= 0.0 {
        return 0.0;
    }
    let favourable_move = match position.side {
        Side::Long => close - position.entry_price,
        Side::Short => position.entry_price - close,
    };
    favourable_move / risk_per_unit
}

fn stop_loss_hit(position: &Position, close: f64) -> bool {
    match position.side {
        Side::Long => close <= position.stop_loss_price,
        Side::Short => close >= position.stop_loss_price,
    }
}

fn regime_changed(position: &Position, regime: Regime) -> bool {
    regime != Regime::expected_for(position.side)
}

fn still_inside_donchian(position: &Position, ctx: &ExitContext) -> bool {
    match position.side {
        Side::Long => ctx.close < ctx.high_20,
        Side::Short => ctx.close > ctx.low_20,
    }
}

fn donchian_broken(position: &Position, ctx: &ExitContext) -> bool {
    match position.side {
        Side::Long => ctx.close < ctx.low_20,
        Side::Short => ctx.close > ctx.high_20,
    }
}

/// Evaluates the exit state machine for one position. Returns `Hold` unless a
/// check fires; the caller is responsible for per-bar idempotence (tracked on
/// `position.exit_metadata.last_exit_check_ts`, updated by the orchestrator once
/// the decision has been acted on) so this function stays a pure query.
pub fn evaluate(position: &Position, ctx: &ExitContext) -> ExitDecision {
    if ctx.now - position.entry_time < AGE_GUARD {
        return ExitDecision::Hold;
    }

    if let Some(last_checked) = position.exit_metadata.last_exit_check_ts {
        if last_checked == ctx.bar_timestamp {
            return ExitDecision::Hold;
        }
    }

    if stop_loss_hit(position, ctx.close) {
        return ExitDecision::Exit { reason: ExitReason::StopLoss, urgency: ExitUrgency::Immediate };
    }

    if regime_changed(position, ctx.regime) {
        return ExitDecision::Exit { reason: ExitReason::RegimeChange, urgency: ExitUrgency::Immediate };
    }

    let r_multiple = realised_r_multiple(position, ctx.close);
    if ctx.adx_trend == AdxTrend::Falling
        && ctx.adx < MOMENTUM_LOSS_ADX_THRESHOLD
        && r_multiple >= MOMENTUM_LOSS_MIN_R_MULTIPLE
        && still_inside_donchian(position, ctx)
    {
        return ExitDecision::Exit { reason: ExitReason::MomentumLoss, urgency: ExitUrgency::NextBar };
    }

    if donchian_broken(position, ctx) {
        return ExitDecision::Exit { reason: ExitReason::DonchianBreak, urgency: ExitUrgency::NextBar };
    }

    ExitDecision::Hold
}

/// Out-of-band trailing-stop advance, run by the orchestrator on every tick
/// regardless of the priority-ordered checks above. Returns the new stop price
/// if it should move, `None` otherwise.
pub fn advance_trailing_stop(
    position: &Position,
    current_price: f64,
    break_even_pct: f64,
    trailing_stop_rate: f64,
) -> Option<f64> {
    let profit_pct = position.profit_pct(current_price) * 100.0;
    if profit_pct < break_even_pct {
        return None;
    }

    let advance_units = trailing_stop_rate * (profit_pct - break_even_pct) / 100.0;
    let candidate = match position.side {
        Side::Long => position.entry_price * (1.0 + advance_units),
        Side::Short => position.entry_price * (1.0 - advance_units),
    };

    let improves = match position.side {
        Side::Long => candidate > position.stop_loss_price,
        Side::Short => candidate < position.stop_loss_price,
    };

    improves.then_some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpbot_markets::Symbol;

    fn long_position(entry_time: DateTime<Utc>) -> Position {
        Position::open(Symbol::from("BTCUSDT"), Side::Long, 1.0, 50_000.0, 49_000.0, 2.0, entry_time, Regime::BullTrend, 30.0)
    }

    fn base_ctx(now: DateTime<Utc>) -> ExitContext {
        ExitContext {
            close: 50_500.0,
            regime: Regime::BullTrend,
            adx: 30.0,
            adx_trend: AdxTrend::Stable,
            high_20: 51_000.0,
            low_20: 49_500.0,
            bar_timestamp: now,
            now,
        }
    }

    #[test]
    fn age_guard_holds_within_first_minute() {
        let now = Utc::now();
        let position = long_position(now);
        let ctx = base_ctx(now);
        assert_eq!(evaluate(&position, &ctx), ExitDecision::Hold);
    }

    #[test]
    fn stop_loss_wins_over_regime_and_momentum() {
        let entry_time = Utc::now() - chrono::Duration::seconds(120);
        let position = long_position(entry_time);
        let mut ctx = base_ctx(Utc::now());
        ctx.close = 48_900.0;
        ctx.adx = 18.0;
        ctx.adx_trend = AdxTrend::Falling;
        assert_eq!(
            evaluate(&position, &ctx),
            ExitDecision::Exit { reason: ExitReason::StopLoss, urgency: ExitUrgency::Immediate }
        );
    }

    #[test]
    fn regime_change_fires_when_not_in_expected_regime() {
        let entry_time = Utc::now() - chrono::Duration::seconds(120);
        let position = long_position(entry_time);
        let mut ctx = base_ctx(Utc::now());
        ctx.regime = Regime::Range;
        assert_eq!(
            evaluate(&position, &ctx),
            ExitDecision::Exit { reason: ExitReason::RegimeChange, urgency: ExitUrgency::Immediate }
        );
    }

    #[test]
    fn momentum_loss_requires_falling_adx_low_value_and_profit() {
        let entry_time = Utc::now() - chrono::Duration::seconds(120);
        let mut position = long_position(entry_time);
        position.entry_price = 50_000.0;
        position.initial_stop_loss = 49_000.0;
        let mut ctx = base_ctx(Utc::now());
        ctx.close = 51_500.0; // r_multiple = 1500/1000 = 1.5, still below high_20
        ctx.high_20 = 52_000.0;
        ctx.adx = 18.0;
        ctx.adx_trend = AdxTrend::Falling;
        assert_eq!(
            evaluate(&position, &ctx),
            ExitDecision::Exit { reason: ExitReason::MomentumLoss, urgency: ExitUrgency::NextBar }
        );
    }

    #[test]
    fn is_idempotent_within_the_same_bar() {
        let entry_time = Utc::now() - chrono::Duration::seconds(120);
        let mut position = long_position(entry_time);
        let ctx = base_ctx(Utc::now());
        position.exit_metadata.last_exit_check_ts = Some(ctx.bar_timestamp);
        assert_eq!(evaluate(&position, &ctx), ExitDecision::Hold);
    }

    #[test]
    fn trailing_stop_holds_before_break_even() {
        let entry_time = Utc::now();
        let position = long_position(entry_time);
        assert!(advance_trailing_stop(&position, 50_100.0, 2.0, 0.5).is_none());
    }

    #[test]
    fn trailing_stop_advances_past_break_even() {
        let entry_time = Utc::now();
        let position = long_position(entry_time);
        let new_stop = advance_trailing_stop(&position, 51_500.0, 2.0, 0.5).unwrap();
        assert!(new_stop > position.stop_loss_price);
    }
}
