use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A perpetual-futures trading pair as quoted by the exchange, eg/ `BTCUSDT`.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize, Display)]
pub struct Symbol(pub SmolStr);

impl Symbol {
    pub fn new(value: impl Into<SmolStr>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self(SmolStr::new(value))
    }
}
