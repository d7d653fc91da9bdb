use perpbot_markets::{Regime, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output of one rule-engine evaluation for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: Symbol,
    pub action: TradeAction,
    pub bias_score: f64,
    pub confidence: f64,
    pub strategy_name: String,
    pub regime: Regime,
    pub atr: f64,
    pub suggested_price: f64,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum TradeAction {
    #[serde(rename = "PROPOSE_LONG")]
    ProposeLong,
    #[serde(rename = "PROPOSE_SHORT")]
    ProposeShort,
    #[serde(rename = "NEUTRAL")]
    Neutral,
    #[serde(rename = "CLOSE")]
    Close,
}

impl TradeAction {
    pub fn is_proposal(&self) -> bool {
        matches!(self, Self::ProposeLong | Self::ProposeShort)
    }
}
