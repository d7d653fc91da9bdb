//! # Event Orchestrator (C12)
//!
//! Wires every other component into the three callbacks registered against the
//! stream ingest layer, plus the exit-manager tick run on every price update.
//! Owns [`SystemState`] exclusively; every other component is handed read-only
//! views or returns values for the orchestrator to fold in.

use crate::error::{CoreError, CoreResult};
use crate::exit::{self, ExitContext, ExitDecision, ExitReason, ExitUrgency};
use crate::notify::{Notification, Notifier, Priority};
use crate::settings::Settings;
use crate::state::{Position, SystemState};
use crate::state_store::StateStore;
use chrono::{DateTime, Utc};
use parking_lot::Mutex as SyncMutex;
use perpbot_analytics::{ClosedTrade, TradingSummaryGenerator};
use perpbot_data::event::{BookTicker, Kline, MarketDataEvent, MarketDataKind, OhlcvBar};
use perpbot_data::ingest::error::IngestError;
use perpbot_data::ingest::handler::IngestHandler;
use perpbot_data::ingest::{IngestConfig, StreamIngest};
use perpbot_data::{FeatureEngine, FeatureSnapshot};
use perpbot_execution::{ExchangeClient, ExchangeClientConfig, OrderManager};
use perpbot_integration::collection::FnvIndexMap;
use perpbot_integration::RateLimiter;
use perpbot_markets::{Regime, Side, Symbol};
use perpbot_risk::{AdxEntryGate, AdxGateConfig, PositionSizer, PreTradeVetoChain, RiskContext, SizerConfig, VetoConfig};
use perpbot_strategy::{catalog::default_catalog, regime::RegimeThresholds, AdxTrend, RegimeDetector, RuleEngine, TradeAction};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::{watch, Mutex as AsyncMutex, RwLock};
use tracing::{info, warn};

/// Trigger that caused an evaluate-path invocation; distinguishes sub-bar ticks
/// from bar-boundary closes so `NEXT_BAR`-urgency exits only act at a close.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum EventTrigger {
    BookTicker,
    KlineClose,
}

const MIN_DECISION_INTERVAL_BOOK: chrono::Duration = chrono::Duration::seconds(30);
const MIN_DECISION_INTERVAL_KLINE: chrono::Duration = chrono::Duration::seconds(1);
const HISTORY_SEED_BARS: u32 = 600;
const SHUTDOWN_GRACE: StdDuration = StdDuration::from_secs(10);

struct Inner {
    settings: Settings,
    state: RwLock<SystemState>,
    feature_engine: SyncMutex<FeatureEngine>,
    regime_detector: SyncMutex<RegimeDetector>,
    rule_engine: RuleEngine,
    adx_gate: AdxEntryGate,
    position_sizer: PositionSizer,
    veto_chain: PreTradeVetoChain,
    order_manager: Arc<OrderManager>,
    exchange_client: Arc<ExchangeClient>,
    state_store: Arc<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    filters: RwLock<FnvIndexMap<Symbol, perpbot_execution::model::SymbolFilter>>,
    realtime_prices: RwLock<FnvIndexMap<Symbol, f64>>,
    symbol_locks: FnvIndexMap<Symbol, AsyncMutex<()>>,
    last_book_decision: SyncMutex<FnvIndexMap<Symbol, DateTime<Utc>>>,
    last_kline_decision: SyncMutex<FnvIndexMap<Symbol, DateTime<Utc>>>,
    trading_summary: SyncMutex<TradingSummaryGenerator>,
}

/// Cheaply clonable handle to the orchestrator; every clone shares the same
/// state via the inner `Arc`. Cloned once per spawned task so `IngestHandler`'s
/// synchronous callbacks can dispatch async work.
#[derive(Clone)]
pub struct EventOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventOrchestrator").finish_non_exhaustive()
    }
}

impl EventOrchestrator {
    pub async fn bootstrap(settings: Settings, state_store: Arc<dyn StateStore>, notifier: Arc<dyn Notifier>) -> CoreResult<Self> {
        let weight_per_minute = 2_400;
        let limiter = Arc::new(RateLimiter::new(weight_per_minute));
        let exchange_client = Arc::new(ExchangeClient::new(
            ExchangeClientConfig::new(
                settings.exchange.api_key.clone(),
                settings.exchange.api_secret.clone(),
                settings.exchange.base_url.clone(),
            ),
            Arc::clone(&limiter),
        ));
        let order_manager = Arc::new(OrderManager::new(Arc::clone(&exchange_client), settings.environment.is_dry_run()));

        let symbol_locks = settings
            .trading
            .symbols
            .iter()
            .cloned()
            .map(|symbol| (symbol, AsyncMutex::new(())))
            .collect();

        let starting_equity = settings.trading.max_position_size_usdt.max(1.0) * settings.trading.max_positions as f64;
        let state = match state_store.load().await.map_err(|error| CoreError::StateStore(error.to_string()))? {
            Some(loaded) => loaded,
            None => SystemState::starting(starting_equity, Utc::now()),
        };

        let inner = Arc::new(Inner {
            adx_gate: AdxEntryGate::new(AdxGateConfig { min_adx: 25.0 }),
            position_sizer: PositionSizer::new(SizerConfig {
                atr_multiplier: settings.trading.stop_loss_atr_multiplier,
                max_position_usdt: settings.trading.max_position_size_usdt,
                ..SizerConfig::default()
            }),
            veto_chain: PreTradeVetoChain::new(VetoConfig {
                max_position_size_usdt: settings.trading.max_position_size_usdt,
                max_positions: settings.trading.max_positions,
                max_drawdown_pct: settings.trading.max_drawdown_pct,
                daily_loss_limit_pct: settings.trading.daily_loss_limit_pct,
                ..VetoConfig::default()
            }),
            rule_engine: RuleEngine::new(default_catalog()).with_activation_threshold(settings.trading.activation_threshold),
            regime_detector: SyncMutex::new(RegimeDetector::new(RegimeThresholds::default())),
            feature_engine: SyncMutex::new(FeatureEngine::new()),
            order_manager,
            exchange_client,
            state_store,
            notifier,
            filters: RwLock::new(FnvIndexMap::default()),
            realtime_prices: RwLock::new(FnvIndexMap::default()),
            symbol_locks,
            last_book_decision: SyncMutex::new(FnvIndexMap::default()),
            last_kline_decision: SyncMutex::new(FnvIndexMap::default()),
            trading_summary: SyncMutex::new(TradingSummaryGenerator::new(Decimal::ZERO)),
            state: RwLock::new(state),
            settings,
        });

        let orchestrator = Self { inner };
        tracing::debug!(
            required_features = ?orchestrator.inner.rule_engine.required_features(),
            "rule catalog registered"
        );
        orchestrator.reconcile_on_startup().await?;
        Ok(orchestrator)
    }

    /// Startup: load state (already done in [`Self::bootstrap`]), reconcile
    /// exchange positions against local ones, seed C5 with historical klines.
    async fn reconcile_on_startup(&self) -> CoreResult<()> {
        let symbol_strs: Vec<&str> = self.inner.settings.trading.symbols.iter().map(Symbol::as_str).collect();
        let exchange_positions = self.inner.order_manager.get_open_positions(&symbol_strs).await;

        {
            let mut state = self.inner.state.write().await;
            for exchange_position in &exchange_positions {
                let symbol = Symbol::from(exchange_position.symbol.as_str());
                if !state.open_positions.contains_key(&symbol) {
                    let side = match exchange_position.position_side {
                        perpbot_execution::model::PositionSide::Long => Side::Long,
                        perpbot_execution::model::PositionSide::Short => Side::Short,
                    };
                    warn!(%symbol, "exchange reports a position absent from local state; adopting it");
                    let position = Position::open(
                        symbol.clone(),
                        side,
                        exchange_position.quantity,
                        exchange_position.entry_price,
                        exchange_position.entry_price,
                        self.inner.settings.trading.trailing_stop_activation_pct,
                        Utc::now(),
                        Regime::Unknown,
                        0.0,
                    );
                    state.open_positions.insert(symbol, position);
                    self.inner.notifier.notify(Notification::new(
                        Priority::Warning,
                        "adopted unreconciled position",
                        format!("{exchange_position:?}"),
                    ));
                }
            }

            let reported: std::collections::HashSet<&str> =
                exchange_positions.iter().map(|p| p.symbol.as_str()).collect();
            let stale: Vec<Symbol> = state
                .open_positions
                .keys()
                .filter(|symbol| !reported.contains(symbol.as_str()))
                .cloned()
                .collect();
            for symbol in stale {
                warn!(%symbol, "local position absent from exchange; dropping");
                state.open_positions.shift_remove(&symbol);
            }
        }

        if let Ok(symbol_filters) = self.inner.exchange_client.exchange_info().await {
            let mut filters = self.inner.filters.write().await;
            for (symbol, filter) in symbol_filters {
                filters.insert(Symbol::from(symbol), filter);
            }
        }

        for symbol in self.inner.settings.trading.symbols.clone() {
            let interval = self.inner.settings.trading.kline_interval.as_str();
            match self.inner.exchange_client.historical_klines(symbol.as_str(), interval, HISTORY_SEED_BARS).await {
                Ok(klines) => {
                    let mut feature_engine = self.inner.feature_engine.lock();
                    feature_engine.seed(symbol, klines.into_iter().map(historical_kline_to_bar));
                }
                Err(error) => warn!(%symbol, %error, "failed to fetch history for seeding, starting cold"),
            }
        }

        self.persist().await;
        Ok(())
    }

    /// Subscribes market-data and user-data streams, running until `shutdown` fires.
    pub async fn run(&self, ingest_base_url: url::Url, ws_base_url: url::Url, mut shutdown: watch::Receiver<bool>) {
        let ingest_config = IngestConfig {
            base_url: ingest_base_url,
            kline_interval: self.inner.settings.trading.kline_interval.clone(),
            max_reconnect_attempts: 10,
            data_loss_timeout: StdDuration::from_secs(90),
            timestamp_tolerance_ms: 5_000,
        };
        let ingest = StreamIngest::new(ingest_config, self.inner.settings.trading.symbols.clone());
        let ingest_handler: Arc<dyn IngestHandler> = Arc::new(self.clone());
        let mut handles = ingest.spawn(ingest_handler, shutdown.clone());

        let user_stream_handler: Arc<dyn perpbot_execution::UserStreamHandler> = Arc::new(self.clone());
        handles.push(tokio::spawn(perpbot_execution::run_user_stream(
            Arc::clone(&self.inner.exchange_client),
            ws_base_url,
            user_stream_handler,
            shutdown.clone(),
        )));

        let _ = shutdown.changed().await;
        info!("shutdown signal received, waiting for streams to settle");
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, futures_util::future::join_all(handles)).await;

        self.persist().await;
        self.inner
            .notifier
            .notify(Notification::new(Priority::Info, "orchestrator stopped", "graceful shutdown complete"));
    }

    async fn persist(&self) {
        let state = self.inner.state.read().await;
        let ttl = StdDuration::from_secs(self.inner.settings.state_store.state_ttl_secs);
        if let Err(error) = self.inner.state_store.save(&state, ttl).await {
            warn!(%error, "failed to persist system state");
        }
    }

    fn throttle_allows(&self, lock: &SyncMutex<FnvIndexMap<Symbol, DateTime<Utc>>>, symbol: &Symbol, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
        let mut last = lock.lock();
        match last.get(symbol) {
            Some(previous) if now - *previous < interval => false,
            _ => {
                last.insert(symbol.clone(), now);
                true
            }
        }
    }

    async fn filter_for(&self, symbol: &Symbol) -> perpbot_execution::model::SymbolFilter {
        if let Some(filter) = self.inner.filters.read().await.get(symbol).copied() {
            return filter;
        }
        warn!(%symbol, "symbol filter cache miss, using identity rounding");
        perpbot_execution::model::SymbolFilter { step_size: 0.0, tick_size: 0.0 }
    }

    async fn handle_kline(&self, symbol: Symbol, exchange_ts: DateTime<Utc>, received_ts: DateTime<Utc>, kline: Kline) {
        let Some(lock) = self.inner.symbol_locks.get(&symbol) else { return };
        let _guard = lock.lock().await;

        let event = MarketDataEvent { symbol: symbol.clone(), exchange_ts, received_ts, kind: MarketDataKind::Kline(kline) };
        let snapshot = { self.inner.feature_engine.lock().on_event(&event) };

        if !kline.is_closed {
            return;
        }
        if !self.throttle_allows(&self.inner.last_kline_decision, &symbol, received_ts, MIN_DECISION_INTERVAL_KLINE) {
            return;
        }
        let Some(snapshot) = snapshot else { return };
        self.evaluate(&symbol, exchange_ts, received_ts, snapshot, EventTrigger::KlineClose).await;
    }

    async fn handle_book_ticker(&self, symbol: Symbol, exchange_ts: DateTime<Utc>, received_ts: DateTime<Utc>, ticker: BookTicker) {
        let Some(lock) = self.inner.symbol_locks.get(&symbol) else { return };
        let _guard = lock.lock().await;

        self.inner.realtime_prices.write().await.insert(symbol.clone(), ticker.mid_price());

        let event = MarketDataEvent { symbol: symbol.clone(), exchange_ts, received_ts, kind: MarketDataKind::BookTicker(ticker) };
        let snapshot = { self.inner.feature_engine.lock().on_event(&event) };

        if !self.throttle_allows(&self.inner.last_book_decision, &symbol, received_ts, MIN_DECISION_INTERVAL_BOOK) {
            return;
        }
        let Some(snapshot) = snapshot else { return };
        self.evaluate(&symbol, exchange_ts, received_ts, snapshot, EventTrigger::BookTicker).await;
    }

    async fn evaluate(&self, symbol: &Symbol, bar_timestamp: DateTime<Utc>, now: DateTime<Utc>, snapshot: FeatureSnapshot, trigger: EventTrigger) {
        let (regime, adx_trend) = {
            let mut regime_detector = self.inner.regime_detector.lock();
            let (regime, _volatility) = regime_detector.observe(symbol, &snapshot);
            let adx_trend = regime_detector.adx_trend(symbol);
            (regime, adx_trend)
        };

        let has_position = {
            let mut state = self.inner.state.write().await;
            state.symbol_regimes.insert(symbol.clone(), regime);
            state.open_positions.contains_key(symbol)
        };

        if has_position {
            self.manage_position(symbol, &snapshot, regime, adx_trend, bar_timestamp, now, trigger).await;
        } else {
            self.consider_entry(symbol, &snapshot, regime, adx_trend, now).await;
        }
    }

    fn correlated_exposure_pct(state: &SystemState, symbol: &Symbol, candidate_notional: f64) -> f64 {
        if state.equity <= 0.0 {
            return 0.0;
        }
        let open_notional: f64 = state
            .open_positions
            .values()
            .filter(|position| &position.symbol != symbol)
            .map(|position| position.quantity * position.entry_price)
            .sum();
        (open_notional + candidate_notional) / state.equity * 100.0
    }

    fn veto_notify(&self, symbol: &Symbol, stage: &str, reason: String) {
        warn!(%symbol, stage, reason, "pre-trade veto rejected signal");
        self.inner.notifier.notify(
            Notification::new(Priority::Warning, "risk veto", reason)
                .with_metadata("veto_stage", stage.to_string())
                .with_metadata("symbol", symbol.as_str().to_string()),
        );
    }

    /// Runs the rule engine for `symbol` under `regime` and returns the side it
    /// proposes, if any (`Neutral`/`Close` both yield `None`).
    async fn propose_side(&self, symbol: &Symbol, regime: Regime, snapshot: &FeatureSnapshot) -> Option<Side> {
        let weights = { self.inner.state.read().await.strategy_weights.clone() };
        let (signal, _vetoed) = self.inner.rule_engine.evaluate(symbol, regime, snapshot, &weights);
        match signal.action {
            TradeAction::ProposeLong => Some(Side::Long),
            TradeAction::ProposeShort => Some(Side::Short),
            TradeAction::Neutral | TradeAction::Close => None,
        }
    }

    async fn consider_entry(&self, symbol: &Symbol, snapshot: &FeatureSnapshot, regime: Regime, adx_trend: AdxTrend, now: DateTime<Utc>) {
        let Some(side) = self.propose_side(symbol, regime, snapshot).await else { return };
        self.open_position(symbol, snapshot, regime, adx_trend, now, side).await;
    }

    #[allow(clippy::too_many_arguments)]
    async fn open_position(
        &self,
        symbol: &Symbol,
        snapshot: &FeatureSnapshot,
        regime: Regime,
        adx_trend: AdxTrend,
        now: DateTime<Utc>,
        side: Side,
    ) {
        if let Err(rejection) = self.inner.adx_gate.check(snapshot.adx, adx_trend) {
            self.veto_notify(symbol, "adx_gate", format!("{rejection:?}"));
            return;
        }

        let equity = { self.inner.state.read().await.equity };
        let sizing = match self.inner.position_sizer.size(equity, snapshot.close, snapshot.atr) {
            Ok(sizing) => sizing,
            Err(rejection) => {
                self.veto_notify(symbol, "position_sizer", format!("{rejection:?}"));
                return;
            }
        };

        let (quantity, price) = {
            let state = self.inner.state.read().await;
            let context = RiskContext::new(
                state.open_positions.len(),
                !state.open_positions.contains_key(symbol),
                Self::correlated_exposure_pct(&state, symbol, sizing.position_value_usdt),
                state.current_drawdown_pct,
                state.daily_pnl_pct,
            );
            match self.inner.veto_chain.evaluate(&context, sizing.quantity, snapshot.close) {
                Ok(approved) => approved.0,
                Err(refused) => {
                    self.veto_notify(symbol, &format!("{:?}", refused.stage), refused.reason);
                    return;
                }
            }
        };

        let filter = self.filter_for(symbol).await;
        let leverage = self.inner.settings.trading.leverage;
        let available_margin = match self.inner.exchange_client.account_balance().await {
            Ok(balance) => (balance.available_balance - balance.used_margin).max(0.0),
            Err(error) => {
                warn!(%symbol, %error, "failed to fetch account balance, skipping entry");
                return;
            }
        };

        let result = self
            .inner
            .order_manager
            .submit_order(symbol.as_str(), side, quantity, price, snapshot.atr, leverage, available_margin, filter)
            .await;
        if !result.success {
            let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(%symbol, reason, "order submission failed");
            self.inner.notifier.notify(
                Notification::new(Priority::Error, "order rejected", reason).with_metadata("symbol", symbol.as_str().to_string()),
            );
            return;
        }

        let stop_distance = self.inner.settings.trading.stop_loss_atr_multiplier * snapshot.atr.max(price * 0.005);
        let stop_loss_price = match side {
            Side::Long => price - stop_distance,
            Side::Short => price + stop_distance,
        };
        let mut position = Position::open(
            symbol.clone(),
            side,
            quantity,
            price,
            stop_loss_price,
            self.inner.settings.trading.trailing_stop_activation_pct,
            now,
            regime,
            snapshot.adx,
        );
        position.stop_order_id = result.order_id;

        {
            let mut state = self.inner.state.write().await;
            state.open_positions.insert(symbol.clone(), position);
            state.last_update = now;
        }
        self.persist().await;

        info!(%symbol, ?side, quantity, price, "position opened");
        self.inner.notifier.notify(Notification::new(
            Priority::Info,
            "position opened",
            format!("{side:?} {quantity:.6} {symbol} @ {price:.2}"),
        ));
    }

    #[allow(clippy::too_many_arguments)]
    async fn manage_position(
        &self,
        symbol: &Symbol,
        snapshot: &FeatureSnapshot,
        regime: Regime,
        adx_trend: AdxTrend,
        bar_timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
        trigger: EventTrigger,
    ) {
        let break_even_pct = self.inner.settings.trading.break_even_pct;
        let trailing_stop_rate = self.inner.settings.trading.trailing_stop_rate;

        let (side, new_stop, exit_decision) = {
            let mut state = self.inner.state.write().await;
            let Some(position) = state.open_positions.get_mut(symbol) else { return };
            position.mark_to_market(snapshot.close);

            let new_stop = exit::advance_trailing_stop(position, snapshot.close, break_even_pct, trailing_stop_rate);
            if let Some(stop) = new_stop {
                position.stop_loss_price = stop;
                position.break_even_triggered = true;
            }

            let ctx = ExitContext {
                close: snapshot.close,
                regime,
                adx: snapshot.adx,
                adx_trend,
                high_20: snapshot.high_20,
                low_20: snapshot.low_20,
                bar_timestamp,
                now,
            };
            let decision = exit::evaluate(position, &ctx);
            position.exit_metadata.last_exit_check_ts = Some(bar_timestamp);

            (position.side, new_stop, decision)
        };

        if let Some(new_stop) = new_stop {
            let previous_order_id = {
                self.inner.state.read().await.open_positions.get(symbol).and_then(|p| p.stop_order_id.clone()).unwrap_or_default()
            };
            let result = self.inner.order_manager.update_stop_loss(symbol.as_str(), side, &previous_order_id, new_stop).await;
            if result.success {
                let mut state = self.inner.state.write().await;
                if let Some(position) = state.open_positions.get_mut(symbol) {
                    position.stop_order_id = result.order_id;
                }
            } else {
                warn!(%symbol, "failed to update trailing stop on exchange");
            }
        }

        self.persist().await;

        let should_act = match exit_decision {
            ExitDecision::Hold => false,
            ExitDecision::Exit { urgency: ExitUrgency::Immediate, .. } => true,
            ExitDecision::Exit { urgency: ExitUrgency::NextBar, .. } => trigger == EventTrigger::KlineClose,
        };
        if should_act {
            if let ExitDecision::Exit { reason, .. } = exit_decision {
                self.close_position(symbol, side, reason).await;
            }
            return;
        }

        // No exit check fired; a fresh opposite-side proposal still takes
        // priority over holding the current position.
        if let Some(proposed_side) = self.propose_side(symbol, regime, snapshot).await {
            if proposed_side != side {
                self.close_position(symbol, side, ExitReason::OppositeSignal).await;
                self.open_position(symbol, snapshot, regime, adx_trend, now, proposed_side).await;
            }
        }
    }

    async fn close_position(&self, symbol: &Symbol, side: Side, reason: ExitReason) {
        let quantity = { self.inner.state.read().await.open_positions.get(symbol).map(|p| p.quantity) };
        let Some(quantity) = quantity else { return };

        let result = self.inner.order_manager.close_position(symbol.as_str(), side, quantity).await;
        if !result.success {
            let error = result.error.unwrap_or_else(|| "unknown error".to_string());
            warn!(%symbol, ?reason, error, "exit order failed");
            self.inner.notifier.notify(
                Notification::new(Priority::Error, "exit order failed", error).with_metadata("symbol", symbol.as_str().to_string()),
            );
            return;
        }

        let mut closed_trade = None;
        {
            let mut state = self.inner.state.write().await;
            if let Some(position) = state.open_positions.shift_remove(symbol) {
                let pnl = position.unrealized_pnl;
                state.daily_pnl += pnl;
                state.record_closed_trade(pnl);
                let new_equity = state.equity + pnl;
                state.recompute_equity(new_equity, Utc::now());
                state.daily_pnl_pct = if state.peak_equity > 0.0 { state.daily_pnl / state.peak_equity * 100.0 } else { 0.0 };
                closed_trade = Some(ClosedTrade::new(
                    position.symbol.clone(),
                    Decimal::try_from(pnl).unwrap_or_default(),
                    position.entry_time,
                    Utc::now(),
                ));
            }
        }
        self.persist().await;

        if let Some(trade) = closed_trade {
            let summary = {
                let mut generator = self.inner.trading_summary.lock();
                generator.record(trade);
                generator.generate()
            };
            info!(
                %symbol, ?reason,
                total_trades = summary.total_trades,
                win_rate = ?summary.win_rate,
                net_pnl = %summary.net_pnl,
                "position closed"
            );
        }
        self.inner
            .notifier
            .notify(Notification::new(Priority::Warning, "position closed", format!("{symbol} closed: {reason:?}")));
    }
}

fn historical_kline_to_bar(kline: perpbot_execution::model::HistoricalKline) -> OhlcvBar {
    OhlcvBar {
        open_time: kline.open_time,
        open: kline.open,
        high: kline.high,
        low: kline.low,
        close: kline.close,
        volume: kline.volume,
        is_closed: true,
    }
}

impl IngestHandler for EventOrchestrator {
    fn on_kline(&self, symbol: &Symbol, exchange_ts: DateTime<Utc>, received_ts: DateTime<Utc>, kline: &Kline) {
        let orchestrator = self.clone();
        let symbol = symbol.clone();
        let kline = *kline;
        tokio::spawn(async move { orchestrator.handle_kline(symbol, exchange_ts, received_ts, kline).await });
    }

    fn on_book_ticker(&self, symbol: &Symbol, exchange_ts: DateTime<Utc>, received_ts: DateTime<Utc>, ticker: &BookTicker) {
        let orchestrator = self.clone();
        let symbol = symbol.clone();
        let ticker = *ticker;
        tokio::spawn(async move { orchestrator.handle_book_ticker(symbol, exchange_ts, received_ts, ticker).await });
    }

    fn on_error(&self, error: &IngestError) {
        warn!(%error, "stream ingest error");
        self.inner
            .notifier
            .notify(Notification::new(Priority::Error, "stream ingest error", error.to_string()));
    }
}

impl perpbot_execution::UserStreamHandler for EventOrchestrator {
    fn on_event(&self, event: perpbot_execution::model::UserDataEvent) {
        use perpbot_execution::model::UserDataEvent;
        match event {
            UserDataEvent::OrderTradeUpdate { symbol, order_id, status, .. } => {
                info!(symbol, order_id, status, "order update received");
            }
            UserDataEvent::AccountUpdate { .. } => {}
            UserDataEvent::ListenKeyExpired => {
                warn!("user-data listen key expired, stream will reopen");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlated_exposure_excludes_the_candidate_symbol_itself() {
        let mut state = SystemState::starting(10_000.0, Utc::now());
        let symbol = Symbol::from("BTCUSDT");
        state.open_positions.insert(
            symbol.clone(),
            Position::open(symbol.clone(), Side::Long, 1.0, 100.0, 95.0, 2.0, Utc::now(), Regime::BullTrend, 30.0),
        );
        let exposure = EventOrchestrator::correlated_exposure_pct(&state, &symbol, 500.0);
        assert!((exposure - 5.0).abs() < 1e-9);
    }

    #[test]
    fn correlated_exposure_is_zero_when_equity_is_zero() {
        let state = SystemState::starting(0.0, Utc::now());
        let exposure = EventOrchestrator::correlated_exposure_pct(&state, &Symbol::from("BTCUSDT"), 500.0);
        assert_eq!(exposure, 0.0);
    }
}
