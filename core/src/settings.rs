//! # Settings (C1)
//!
//! Typed configuration loaded once at startup from environment variables; no
//! config file format, no live reload - restart to pick up a change.

use perpbot_markets::Symbol;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Environment {
    DryRun,
    Testnet,
    Live,
}

impl Environment {
    pub fn is_live(self) -> bool {
        matches!(self, Environment::Live)
    }

    pub fn is_dry_run(self) -> bool {
        matches!(self, Environment::DryRun)
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_uppercase().as_str() {
            "DRY_RUN" => Ok(Environment::DryRun),
            "TESTNET" => Ok(Environment::Testnet),
            "LIVE" => Ok(Environment::Live),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct StateStoreSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
    pub state_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct TradingSettings {
    pub symbols: Vec<Symbol>,
    pub leverage: u32,
    pub max_positions: usize,
    pub max_position_size_usdt: f64,
    pub max_drawdown_pct: f64,
    pub daily_loss_limit_pct: f64,
    pub stop_loss_atr_multiplier: f64,
    pub activation_threshold: f64,
    pub trailing_stop_activation_pct: f64,
    pub break_even_pct: f64,
    pub trailing_stop_rate: f64,
    pub kline_interval: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub log_level: String,
    pub log_format: String,
    pub exchange: ExchangeSettings,
    pub state_store: StateStoreSettings,
    pub notifier: NotifierSettings,
    pub trading: TradingSettings,
}

fn required(name: &'static str) -> Result<String, SettingsError> {
    env::var(name).map_err(|_| SettingsError::Missing(name))
}

fn optional(name: &'static str, default: impl Into<String>) -> String {
    env::var(name).unwrap_or_else(|_| default.into())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, SettingsError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| SettingsError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}

impl Settings {
    /// Loads and validates configuration from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        let environment = match env::var("ENVIRONMENT") {
            Ok(raw) => {
                Environment::from_str(&raw).map_err(|_| SettingsError::Invalid { name: "ENVIRONMENT", value: raw })?
            }
            Err(_) => Environment::Testnet,
        };

        let exchange = ExchangeSettings {
            api_key: required("EXCHANGE_API_KEY")?,
            api_secret: required("EXCHANGE_API_SECRET")?,
            base_url: optional("EXCHANGE_BASE_URL", "https://testnet.binancefuture.com"),
        };

        let state_store = StateStoreSettings {
            host: optional("REDIS_HOST", "localhost"),
            port: parse_or("REDIS_PORT", 6379u16)?,
            password: env::var("REDIS_PASSWORD").ok(),
            db: parse_or("REDIS_DB", 0u32)?,
            state_ttl_secs: parse_or("REDIS_STATE_TTL", 86_400u64)?,
        };

        let notifier = NotifierSettings {
            bot_token: required("TELEGRAM_BOT_TOKEN")?,
            chat_id: required("TELEGRAM_CHAT_ID")?,
        };

        let symbols = env::var("TRADING_SYMBOLS")
            .unwrap_or_else(|_| "BTCUSDT".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Symbol::from)
            .collect::<Vec<_>>();
        if symbols.is_empty() {
            return Err(SettingsError::Invalid { name: "TRADING_SYMBOLS", value: String::new() });
        }

        let trading = TradingSettings {
            symbols,
            leverage: parse_or("LEVERAGE", 10u32)?,
            max_positions: parse_or("MAX_POSITIONS", 5usize)?,
            max_position_size_usdt: parse_or("MAX_POSITION_SIZE_USDT", 10_000.0)?,
            max_drawdown_pct: parse_or("MAX_DRAWDOWN_PCT", 15.0)?,
            daily_loss_limit_pct: parse_or("DAILY_LOSS_LIMIT_PCT", 5.0)?,
            stop_loss_atr_multiplier: parse_or("STOP_LOSS_ATR_MULTIPLIER", 2.0)?,
            activation_threshold: parse_or("ACTIVATION_THRESHOLD", 0.7)?,
            trailing_stop_activation_pct: parse_or("TRAILING_STOP_ACTIVATION_PCT", 2.0)?,
            break_even_pct: parse_or("BREAK_EVEN_PCT", 2.0)?,
            trailing_stop_rate: parse_or("TRAILING_STOP_RATE", 0.5)?,
            kline_interval: optional("KLINE_INTERVAL", "1m"),
        };

        if trading.max_positions == 0 {
            return Err(SettingsError::Invalid { name: "MAX_POSITIONS", value: "0".to_string() });
        }
        if !(0.0..=100.0).contains(&trading.max_drawdown_pct) {
            return Err(SettingsError::Invalid {
                name: "MAX_DRAWDOWN_PCT",
                value: trading.max_drawdown_pct.to_string(),
            });
        }

        Ok(Self {
            environment,
            log_level: optional("LOG_LEVEL", "info"),
            log_format: optional("LOG_FORMAT", "text"),
            exchange,
            state_store,
            notifier,
            trading,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_base_env<F: FnOnce()>(f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("EXCHANGE_API_KEY", "key");
        env::set_var("EXCHANGE_API_SECRET", "secret");
        env::set_var("TELEGRAM_BOT_TOKEN", "token");
        env::set_var("TELEGRAM_CHAT_ID", "chat");
        f();
        for key in [
            "EXCHANGE_API_KEY",
            "EXCHANGE_API_SECRET",
            "TELEGRAM_BOT_TOKEN",
            "TELEGRAM_CHAT_ID",
            "ENVIRONMENT",
            "TRADING_SYMBOLS",
            "MAX_DRAWDOWN_PCT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_optional_vars_absent() {
        with_base_env(|| {
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings.environment, Environment::Testnet);
            assert_eq!(settings.trading.leverage, 10);
            assert_eq!(settings.trading.symbols, vec![Symbol::from("BTCUSDT")]);
        });
    }

    #[test]
    fn missing_required_var_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("EXCHANGE_API_KEY");
        env::remove_var("EXCHANGE_API_SECRET");
        env::remove_var("TELEGRAM_BOT_TOKEN");
        env::remove_var("TELEGRAM_CHAT_ID");
        assert!(matches!(Settings::from_env(), Err(SettingsError::Missing("EXCHANGE_API_KEY"))));
    }

    #[test]
    fn rejects_out_of_range_drawdown() {
        with_base_env(|| {
            env::set_var("MAX_DRAWDOWN_PCT", "150");
            assert!(Settings::from_env().is_err());
        });
    }

    #[test]
    fn parses_multiple_trading_symbols() {
        with_base_env(|| {
            env::set_var("TRADING_SYMBOLS", "BTCUSDT, ETHUSDT,SOLUSDT");
            let settings = Settings::from_env().unwrap();
            assert_eq!(settings.trading.symbols.len(), 3);
        });
    }
}
