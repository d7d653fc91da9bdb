//! One physical WS connection, subscribed to a disjoint batch of symbols'
//! `kline_<interval>` and `bookTicker` combined streams.

use super::error::IngestError;
use crate::event::{BookTicker, Kline, MarketDataEvent, MarketDataKind};
use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use perpbot_markets::Symbol;
use serde::Deserialize;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};
use url::Url;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const PONG_TIMEOUT: Duration = Duration::from_secs(20);

/// A disjoint set of symbols assigned to one WS connection, carrying both streams
/// per symbol.
#[derive(Debug, Clone)]
pub struct ConnectionBatch {
    pub symbols: Vec<Symbol>,
    pub kline_interval: String,
}

impl ConnectionBatch {
    pub fn stream_url(&self, base: &Url) -> Url {
        let streams: Vec<String> = self
            .symbols
            .iter()
            .flat_map(|s| {
                let lower = s.as_str().to_lowercase();
                [
                    format!("{lower}@kline_{}", self.kline_interval),
                    format!("{lower}@bookTicker"),
                ]
            })
            .collect();
        let mut url = base.clone();
        url.set_path("/stream");
        url.query_pairs_mut().append_pair("streams", &streams.join("/"));
        url
    }
}

/// Runs one connection to completion (until an error or the exchange closes it),
/// dispatching normalized events to `on_event`. Returns on any fault so the caller
/// can apply backoff and reconnect.
pub async fn run_connection(
    batch: &ConnectionBatch,
    base_url: &Url,
    mut on_event: impl FnMut(MarketDataEvent),
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) -> Result<(), IngestError> {
    let url = batch.stream_url(base_url);
    let (mut ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;

    let mut ping_timer = tokio::time::interval(PING_INTERVAL);
    let mut awaiting_pong: Option<tokio::time::Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    let _ = ws.close(None).await;
                    return Ok(());
                }
            }

            _ = ping_timer.tick() => {
                if let Some(sent_at) = awaiting_pong {
                    if sent_at.elapsed() > PONG_TIMEOUT {
                        return Err(IngestError::PongTimeout(PONG_TIMEOUT));
                    }
                } else {
                    ws.send(Message::Ping(Vec::new())).await?;
                    awaiting_pong = Some(tokio::time::Instant::now());
                }
            }

            message = ws.next() => {
                let Some(message) = message else {
                    return Err(IngestError::ClosedByExchange);
                };
                match message? {
                    Message::Pong(_) => awaiting_pong = None,
                    Message::Ping(payload) => ws.send(Message::Pong(payload)).await?,
                    Message::Close(frame) => {
                        debug!(?frame, "exchange closed connection");
                        return Err(IngestError::ClosedByExchange);
                    }
                    Message::Text(text) => {
                        if let Some(event) = parse_envelope(&text) {
                            let received_ts = Utc::now();
                            on_event(MarketDataEvent { received_ts, ..event });
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    stream: String,
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawKlinePayload {
    #[serde(rename = "E")]
    event_time: i64,
    s: String,
    k: RawKline,
}

#[derive(Debug, Deserialize)]
struct RawKline {
    t: i64,
    o: String,
    h: String,
    l: String,
    c: String,
    v: String,
    x: bool,
}

#[derive(Debug, Deserialize)]
struct RawBookTicker {
    #[serde(rename = "E")]
    event_time: Option<i64>,
    s: String,
    b: String,
    #[serde(rename = "B")]
    bid_qty: String,
    a: String,
    #[serde(rename = "A")]
    ask_qty: String,
}

fn parse_envelope(text: &str) -> Option<MarketDataEvent> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|err| warn!(%err, "failed to parse exchange payload"))
        .ok()?;

    if envelope.stream.contains("@kline_") {
        parse_kline(envelope.data)
    } else if envelope.stream.contains("@bookTicker") {
        parse_book_ticker(envelope.data)
    } else {
        None
    }
}

fn parse_kline(value: serde_json::Value) -> Option<MarketDataEvent> {
    let raw: RawKlinePayload = serde_json::from_value(value).ok()?;
    let exchange_ts = Utc.timestamp_millis_opt(raw.event_time).single()?;
    let kline = Kline {
        open: raw.k.o.parse().ok()?,
        high: raw.k.h.parse().ok()?,
        low: raw.k.l.parse().ok()?,
        close: raw.k.c.parse().ok()?,
        volume: raw.k.v.parse().ok()?,
        is_closed: raw.k.x,
    };
    Some(MarketDataEvent {
        symbol: Symbol::new(raw.s),
        exchange_ts: Utc.timestamp_millis_opt(raw.k.t).single().unwrap_or(exchange_ts),
        received_ts: exchange_ts,
        kind: MarketDataKind::Kline(kline),
    })
}

fn parse_book_ticker(value: serde_json::Value) -> Option<MarketDataEvent> {
    let raw: RawBookTicker = serde_json::from_value(value).ok()?;
    let exchange_ts = raw
        .event_time
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    let ticker = BookTicker {
        best_bid: raw.b.parse().ok()?,
        best_ask: raw.a.parse().ok()?,
        bid_qty: raw.bid_qty.parse().ok()?,
        ask_qty: raw.ask_qty.parse().ok()?,
    };
    Some(MarketDataEvent {
        symbol: Symbol::new(raw.s),
        exchange_ts,
        received_ts: exchange_ts,
        kind: MarketDataKind::BookTicker(ticker),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_url_includes_both_streams_per_symbol() {
        let batch = ConnectionBatch {
            symbols: vec![Symbol::new("BTCUSDT")],
            kline_interval: "1m".to_string(),
        };
        let base = Url::parse("wss://fstream.example.com").unwrap();
        let url = batch.stream_url(&base).to_string();
        assert!(url.contains("btcusdt@kline_1m"));
        assert!(url.contains("btcusdt@bookTicker"));
    }

    #[test]
    fn parses_kline_envelope() {
        let text = r#"{"stream":"btcusdt@kline_1m","data":{"E":1690000000000,"s":"BTCUSDT","k":{"t":1690000000000,"o":"100.0","h":"101.0","l":"99.0","c":"100.5","v":"10.0","x":true}}}"#;
        let event = parse_envelope(text).expect("valid kline envelope parses");
        assert!(matches!(event.kind, MarketDataKind::Kline(_)));
        assert_eq!(event.symbol.as_str(), "BTCUSDT");
    }

    #[test]
    fn parses_book_ticker_envelope() {
        let text = r#"{"stream":"btcusdt@bookTicker","data":{"E":1690000000000,"s":"BTCUSDT","b":"100.0","B":"1.0","a":"100.2","A":"1.0"}}"#;
        let event = parse_envelope(text).expect("valid book ticker envelope parses");
        assert!(matches!(event.kind, MarketDataKind::BookTicker(_)));
    }

    #[test]
    fn ignores_unknown_stream_suffix() {
        let text = r#"{"stream":"btcusdt@aggTrade","data":{}}"#;
        assert!(parse_envelope(text).is_none());
    }
}
