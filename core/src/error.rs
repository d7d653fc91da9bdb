//! Error taxonomy for the orchestrator boundary. Per-component errors
//! (ingest, execution) are handled and recovered locally; only the outcomes
//! that change orchestrator-level behavior are aggregated here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("settings error: {0}")]
    Settings(#[from] crate::settings::SettingsError),

    #[error("state store error: {0}")]
    StateStore(String),

    #[error("critical invariant breach: {0}")]
    CriticalInvariantBreach(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
