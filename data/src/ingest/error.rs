use thiserror::Error;

/// Errors surfaced by a single WS connection task. All of these are transient by
/// nature and handled by reconnecting; none of them propagate past the ingest
/// layer.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to parse exchange payload: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("pong timeout: no pong received within {0:?}")]
    PongTimeout(std::time::Duration),

    #[error("connection closed by exchange")]
    ClosedByExchange,

    #[error("exhausted {0} reconnect attempts")]
    ReconnectAttemptsExhausted(u32),
}
