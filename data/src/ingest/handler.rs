use super::error::IngestError;
use crate::event::{BookTicker, Kline};
use perpbot_markets::Symbol;
use chrono::{DateTime, Utc};

/// Registered against [`super::StreamIngest`] to receive normalized events.
///
/// Implementations must be non-blocking beyond event-local work: a slow handler
/// stalls every symbol sharing its connection.
pub trait IngestHandler: Send + Sync {
    fn on_kline(&self, symbol: &Symbol, exchange_ts: DateTime<Utc>, received_ts: DateTime<Utc>, kline: &Kline);

    fn on_book_ticker(
        &self,
        symbol: &Symbol,
        exchange_ts: DateTime<Utc>,
        received_ts: DateTime<Utc>,
        ticker: &BookTicker,
    );

    fn on_error(&self, error: &IngestError);
}
