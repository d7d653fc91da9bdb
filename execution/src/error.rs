use thiserror::Error;

/// Surfaced to the order manager's caller as a structured result; never panics,
/// never leaves partial exchange-side state.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("transport error calling exchange: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to (de)serialize exchange payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("exchange rejected request: code={code} message={message}")]
    ExchangeReject { code: i64, message: String },

    #[error("websocket transport error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("no active listen key")]
    NoListenKey,
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;
