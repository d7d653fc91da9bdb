//! User-data WebSocket stream: order fills and account updates, maintained
//! independently of the market-data streams with its own listen-key lifecycle.
//! The listen key is refreshed every 30 minutes and the stream is reopened from
//! scratch whenever the exchange reports `listenKeyExpired`.

use crate::client::ExchangeClient;
use crate::error::{ExecutionError, ExecutionResult};
use crate::model::UserDataEvent;
use chrono::{TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};
use url::Url;

const LISTEN_KEY_REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

pub trait UserStreamHandler: Send + Sync {
    fn on_event(&self, event: UserDataEvent);
}

#[derive(Debug, Deserialize)]
struct RawUserDataEnvelope {
    #[serde(rename = "e")]
    event_type: String,
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(flatten)]
    rest: Value,
}

fn parse_event(text: &str) -> Option<UserDataEvent> {
    let envelope: RawUserDataEnvelope = serde_json::from_str(text).ok()?;
    let event_time = Utc.timestamp_millis_opt(envelope.event_time).single().unwrap_or_else(Utc::now);
    match envelope.event_type.as_str() {
        "ORDER_TRADE_UPDATE" => {
            let order = envelope.rest.get("o")?;
            Some(UserDataEvent::OrderTradeUpdate {
                symbol: order.get("s")?.as_str()?.to_string(),
                order_id: order.get("i").map(|v| v.to_string()).unwrap_or_default(),
                status: order.get("X")?.as_str()?.to_string(),
                event_time,
            })
        }
        "ACCOUNT_UPDATE" => Some(UserDataEvent::AccountUpdate { event_time }),
        "listenKeyExpired" => Some(UserDataEvent::ListenKeyExpired),
        _ => None,
    }
}

fn stream_url(base_ws_url: &Url, listen_key: &str) -> Url {
    base_ws_url.join(&format!("/ws/{listen_key}")).expect("listen key is a valid URL path segment")
}

/// Drives the user-data stream until `shutdown` fires. Reconnects on transport
/// error or a fresh listen key after expiry; never surfaces a transport error
/// past this loop.
pub async fn run_user_stream(
    client: Arc<ExchangeClient>,
    base_ws_url: Url,
    handler: Arc<dyn UserStreamHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        match run_once(&client, &base_ws_url, handler.as_ref(), &mut shutdown).await {
            Ok(()) => return,
            Err(error) => {
                error!(%error, "user-data stream terminated, reconnecting");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

async fn run_once(
    client: &ExchangeClient,
    base_ws_url: &Url,
    handler: &dyn UserStreamHandler,
    shutdown: &mut watch::Receiver<bool>,
) -> ExecutionResult<()> {
    let mut listen_key = client.create_listen_key().await?;
    let url = stream_url(base_ws_url, &listen_key);
    info!(%url, "opening user-data stream");
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await?;

    let mut refresh_timer = tokio::time::interval(LISTEN_KEY_REFRESH_INTERVAL);
    refresh_timer.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    let _ = socket.close(None).await;
                    return Ok(());
                }
            }
            _ = refresh_timer.tick() => {
                if let Err(error) = client.keepalive_listen_key(&listen_key).await {
                    warn!(%error, "failed to refresh listen key");
                }
            }
            message = socket.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = parse_event(&text) {
                            if matches!(event, UserDataEvent::ListenKeyExpired) {
                                listen_key = client.create_listen_key().await?;
                                return Err(ExecutionError::NoListenKey);
                            }
                            handler.on_event(event);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Err(ExecutionError::NoListenKey),
                    Some(Ok(_)) => {}
                    Some(Err(error)) => return Err(ExecutionError::from(error)),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_order_trade_update() {
        let text = r#"{"e":"ORDER_TRADE_UPDATE","E":1690000000000,"o":{"s":"BTCUSDT","i":123,"X":"FILLED"}}"#;
        let event = parse_event(text).unwrap();
        match event {
            UserDataEvent::OrderTradeUpdate { symbol, status, .. } => {
                assert_eq!(symbol, "BTCUSDT");
                assert_eq!(status, "FILLED");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn parses_listen_key_expired() {
        let text = r#"{"e":"listenKeyExpired","E":1690000000000}"#;
        assert!(matches!(parse_event(text), Some(UserDataEvent::ListenKeyExpired)));
    }

    #[test]
    fn ignores_unknown_event_type() {
        let text = r#"{"e":"SOMETHING_ELSE","E":1690000000000}"#;
        assert!(parse_event(text).is_none());
    }

    #[test]
    fn stream_url_joins_listen_key_as_path_segment() {
        let base = Url::parse("wss://fstream.binance.com").unwrap();
        let url = stream_url(&base, "abc123");
        assert_eq!(url.as_str(), "wss://fstream.binance.com/ws/abc123");
    }
}
