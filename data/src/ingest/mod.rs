//! Stream ingest: shards the tracked symbol universe across WS connections,
//! normalizes exchange payloads into [`crate::event::MarketDataEvent`]s, and
//! tracks per-connection liveness and latency.

pub mod backoff;
pub mod connection;
pub mod error;
pub mod handler;
pub mod health;
pub mod latency;
pub mod validator;

use self::{
    backoff::ReconnectBackoff,
    connection::{run_connection, ConnectionBatch},
    error::IngestError,
    handler::IngestHandler,
    health::HealthMonitor,
    latency::LatencyRing,
    validator::EventValidator,
};
use crate::event::MarketDataKind;
use parking_lot::Mutex;
use perpbot_markets::Symbol;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn};
use url::Url;

/// Maximum symbols multiplexed onto a single physical WS connection.
pub const MAX_SYMBOLS_PER_CONNECTION: usize = 100;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub base_url: Url,
    pub kline_interval: String,
    pub max_reconnect_attempts: u32,
    pub data_loss_timeout: Duration,
    pub timestamp_tolerance_ms: i64,
}

/// Owns the WS connection supervisors for the tracked symbol universe.
pub struct StreamIngest {
    config: IngestConfig,
    batches: Vec<ConnectionBatch>,
    health: Arc<Mutex<HealthMonitor>>,
    latency: Arc<Mutex<LatencyRing>>,
}

impl StreamIngest {
    pub fn new(config: IngestConfig, symbols: Vec<Symbol>) -> Self {
        let batches = symbols
            .chunks(MAX_SYMBOLS_PER_CONNECTION)
            .map(|chunk| ConnectionBatch {
                symbols: chunk.to_vec(),
                kline_interval: config.kline_interval.clone(),
            })
            .collect();
        let health = Arc::new(Mutex::new(HealthMonitor::new(config.data_loss_timeout)));
        Self {
            config,
            batches,
            health,
            latency: Arc::new(Mutex::new(LatencyRing::new())),
        }
    }

    pub fn latency_stats(&self) -> Option<latency::LatencyStats> {
        self.latency.lock().stats()
    }

    /// Spawn one supervisor task per connection batch plus a health-check timer.
    /// Returns the join handles so the caller can await clean shutdown.
    pub fn spawn(
        &self,
        handler: Arc<dyn IngestHandler>,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.batches.len() + 1);

        for batch in &self.batches {
            let batch = batch.clone();
            let base_url = self.config.base_url.clone();
            let max_attempts = self.config.max_reconnect_attempts;
            let tolerance_ms = self.config.timestamp_tolerance_ms;
            let health = Arc::clone(&self.health);
            let latency = Arc::clone(&self.latency);
            let handler = Arc::clone(&handler);
            let mut shutdown_rx = shutdown.clone();

            handles.push(tokio::spawn(async move {
                supervise_connection(batch, base_url, max_attempts, tolerance_ms, health, latency, handler, &mut shutdown_rx)
                    .await;
            }));
        }

        let symbols: Vec<Symbol> = self.batches.iter().flat_map(|b| b.symbols.clone()).collect();
        let health = Arc::clone(&self.health);
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(30));
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        for event in health.lock().check(&symbols) {
                            match event {
                                health::HealthEvent::AggregateSilence(d) => {
                                    warn!(silence_secs = d.as_secs(), "no market data received from aggregate stream");
                                }
                                health::HealthEvent::SymbolSilence(symbol, d) => {
                                    error!(%symbol, silence_secs = d.as_secs(), "symbol has gone silent past data-loss timeout");
                                }
                            }
                        }
                    }
                }
            }
        }));

        handles
    }
}

#[allow(clippy::too_many_arguments)]
async fn supervise_connection(
    batch: ConnectionBatch,
    base_url: Url,
    max_attempts: u32,
    tolerance_ms: i64,
    health: Arc<Mutex<HealthMonitor>>,
    latency: Arc<Mutex<LatencyRing>>,
    handler: Arc<dyn IngestHandler>,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) {
    let mut backoff = ReconnectBackoff::default_policy();
    let mut validator = EventValidator::new(tolerance_ms);

    loop {
        if *shutdown.borrow() {
            return;
        }

        let health = Arc::clone(&health);
        let latency = Arc::clone(&latency);
        let handler_ref = Arc::clone(&handler);
        let on_event = |event: crate::event::MarketDataEvent| {
            let now = chrono::Utc::now();
            if let Some(reason) = validator.validate(&event, now) {
                warn!(symbol = %event.symbol, reason = reason.as_str(), "rejected market data event");
                return;
            }
            health.lock().record(&event.symbol);
            latency.lock().record(event.latency_ms());
            match &event.kind {
                MarketDataKind::Kline(kline) => {
                    handler_ref.on_kline(&event.symbol, event.exchange_ts, event.received_ts, kline);
                }
                MarketDataKind::BookTicker(ticker) => {
                    handler_ref.on_book_ticker(&event.symbol, event.exchange_ts, event.received_ts, ticker);
                }
                MarketDataKind::AggTrade(_) => {}
            }
        };

        info!(symbols = batch.symbols.len(), "connecting stream batch");
        match run_connection(&batch, &base_url, on_event, shutdown).await {
            Ok(()) => return,
            Err(err) => {
                handler.on_error(&err);
                if backoff.attempt() >= max_attempts {
                    handler.on_error(&IngestError::ReconnectAttemptsExhausted(max_attempts));
                    return;
                }
                let delay = backoff.next_delay();
                warn!(?err, attempt = backoff.attempt(), delay_ms = delay.as_millis() as u64, "stream connection failed, reconnecting");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
