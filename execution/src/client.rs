//! Signed REST client to the perpetual-futures exchange. Every private endpoint
//! is routed through the shared [`RateLimiter`] before the request leaves the
//! process, sized to 80% of the exchange's advertised per-minute weight.

use crate::error::{ExecutionError, ExecutionResult};
use crate::model::{
    AccountBalance, ExchangeInfo, ExchangePosition, HistoricalKline, ListenKeyResponse, NewOrderRequest,
    OrderResponse, RawFilter, SymbolFilter,
};
use crate::signing::signed_query_string;
use chrono::Utc;
use derive_more::Constructor;
use perpbot_integration::RateLimiter;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-endpoint request weight, as advertised by the exchange's REST docs.
mod weight {
    pub const EXCHANGE_INFO: u32 = 1;
    pub const ACCOUNT_BALANCE: u32 = 5;
    pub const POSITION_INFORMATION: u32 = 5;
    pub const NEW_ORDER: u32 = 1;
    pub const CANCEL_ORDER: u32 = 1;
    pub const CHANGE_LEVERAGE: u32 = 1;
    pub const ALGO_ORDER: u32 = 1;
    pub const LISTEN_KEY: u32 = 1;
    pub const KLINES: u32 = 5;
}

#[derive(Debug, Clone, Constructor)]
pub struct ExchangeClientConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
}

/// Typed REST client to the exchange; internally thread-safe and cheap to clone
/// (the underlying `reqwest::Client` is pooled and reference-counted).
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    config: Arc<ExchangeClientConfig>,
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
}

impl ExchangeClient {
    pub fn new(config: ExchangeClientConfig, limiter: Arc<RateLimiter>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("static reqwest client configuration is always valid");
        Self { config: Arc::new(config), http, limiter }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn signed_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        weight: u32,
    ) -> ExecutionResult<T> {
        self.limiter.acquire(weight).await;
        let query = signed_query_string(params, &self.config.secret_key, Utc::now().timestamp_millis());
        let url = format!("{}?{}", self.url(path), query);
        debug!(%method, path, "sending signed exchange request");

        let response =
            self.http.request(method, &url).header("X-MBX-APIKEY", &self.config.api_key).send().await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> ExecutionResult<T> {
        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            let (code, message) = extract_error(&body);
            warn!(%status, code, %message, "exchange rejected request");
            return Err(ExecutionError::ExchangeReject { code, message });
        }
        serde_json::from_str(&body).map_err(ExecutionError::from)
    }

    pub async fn exchange_info(&self) -> ExecutionResult<Vec<(String, SymbolFilter)>> {
        self.limiter.acquire(weight::EXCHANGE_INFO).await;
        let response = self.http.get(self.url("/fapi/v1/exchangeInfo")).send().await?;
        let info: ExchangeInfo = Self::parse_response(response).await?;
        Ok(info
            .symbols
            .into_iter()
            .map(|symbol| {
                let mut step_size = 0.0;
                let mut tick_size = 0.0;
                for filter in symbol.filters {
                    match filter {
                        RawFilter::LotSize { step_size: s } => step_size = s.parse().unwrap_or(0.0),
                        RawFilter::PriceFilter { tick_size: t } => tick_size = t.parse().unwrap_or(0.0),
                        RawFilter::Other => {}
                    }
                }
                (symbol.symbol, SymbolFilter { step_size, tick_size })
            })
            .collect())
    }

    pub async fn account_balance(&self) -> ExecutionResult<AccountBalance> {
        self.signed_request(Method::GET, "/fapi/v2/balance", &[], weight::ACCOUNT_BALANCE).await
    }

    pub async fn position_information(&self, symbol: &str) -> ExecutionResult<Vec<ExchangePosition>> {
        self.signed_request(
            Method::GET,
            "/fapi/v2/positionRisk",
            &[("symbol", symbol.to_string())],
            weight::POSITION_INFORMATION,
        )
        .await
    }

    pub async fn create_order(&self, request: &NewOrderRequest) -> ExecutionResult<OrderResponse> {
        let params = order_params(request);
        self.signed_request(Method::POST, "/fapi/v1/order", &params, weight::NEW_ORDER).await
    }

    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExecutionResult<OrderResponse> {
        self.signed_request(
            Method::DELETE,
            "/fapi/v1/order",
            &[("symbol", symbol.to_string()), ("orderId", order_id.to_string())],
            weight::CANCEL_ORDER,
        )
        .await
    }

    pub async fn change_leverage(&self, symbol: &str, leverage: u32) -> ExecutionResult<()> {
        let _: Value = self
            .signed_request(
                Method::POST,
                "/fapi/v1/leverage",
                &[("symbol", symbol.to_string()), ("leverage", leverage.to_string())],
                weight::CHANGE_LEVERAGE,
            )
            .await?;
        Ok(())
    }

    pub async fn create_algo_order(&self, request: &NewOrderRequest) -> ExecutionResult<OrderResponse> {
        let params = order_params(request);
        self.signed_request(Method::POST, "/fapi/v1/order", &params, weight::ALGO_ORDER).await
    }

    pub async fn cancel_algo_order(&self, symbol: &str, order_id: &str) -> ExecutionResult<OrderResponse> {
        self.cancel_order(symbol, order_id).await
    }

    pub async fn list_algo_orders(&self, symbol: &str) -> ExecutionResult<Vec<OrderResponse>> {
        self.signed_request(
            Method::GET,
            "/fapi/v1/openOrders",
            &[("symbol", symbol.to_string())],
            weight::ALGO_ORDER,
        )
        .await
    }

    /// Closed historical bars, oldest first, used to seed the feature engine at
    /// startup. Binance-style klines are returned as heterogeneous JSON arrays
    /// (`[open_time, open, high, low, close, volume, ...]`), parsed by position.
    pub async fn historical_klines(&self, symbol: &str, interval: &str, limit: u32) -> ExecutionResult<Vec<HistoricalKline>> {
        self.limiter.acquire(weight::KLINES).await;
        let response = self
            .http
            .get(self.url("/fapi/v1/klines"))
            .query(&[("symbol", symbol), ("interval", interval), ("limit", &limit.to_string())])
            .send()
            .await?;
        let rows: Vec<Vec<Value>> = Self::parse_response(response).await?;
        Ok(rows.iter().filter_map(parse_kline_row).collect())
    }

    pub async fn create_listen_key(&self) -> ExecutionResult<String> {
        self.limiter.acquire(weight::LISTEN_KEY).await;
        let response = self
            .http
            .post(self.url("/fapi/v1/listenKey"))
            .header("X-MBX-APIKEY", &self.config.api_key)
            .send()
            .await?;
        let parsed: ListenKeyResponse = Self::parse_response(response).await?;
        Ok(parsed.listen_key)
    }

    pub async fn keepalive_listen_key(&self, listen_key: &str) -> ExecutionResult<()> {
        self.limiter.acquire(weight::LISTEN_KEY).await;
        let response = self
            .http
            .put(self.url("/fapi/v1/listenKey"))
            .header("X-MBX-APIKEY", &self.config.api_key)
            .query(&[("listenKey", listen_key)])
            .send()
            .await?;
        let _: Value = Self::parse_response(response).await?;
        Ok(())
    }

    pub async fn close_listen_key(&self, listen_key: &str) -> ExecutionResult<()> {
        self.limiter.acquire(weight::LISTEN_KEY).await;
        let response = self
            .http
            .delete(self.url("/fapi/v1/listenKey"))
            .header("X-MBX-APIKEY", &self.config.api_key)
            .query(&[("listenKey", listen_key)])
            .send()
            .await?;
        let _: Value = Self::parse_response(response).await?;
        Ok(())
    }
}

fn order_params(request: &NewOrderRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("symbol", request.symbol.clone()),
        ("side", serde_json::to_value(request.side).unwrap().as_str().unwrap().to_string()),
        ("positionSide", serde_json::to_value(request.position_side).unwrap().as_str().unwrap().to_string()),
        ("type", serde_json::to_value(request.order_type).unwrap().as_str().unwrap().to_string()),
    ];
    if let Some(quantity) = request.quantity {
        params.push(("quantity", quantity.to_string()));
    }
    if let Some(stop_price) = request.stop_price {
        params.push(("stopPrice", stop_price.to_string()));
    }
    if let Some(working_type) = request.working_type {
        params.push(("workingType", serde_json::to_value(working_type).unwrap().as_str().unwrap().to_string()));
    }
    if request.close_position {
        params.push(("closePosition", "true".to_string()));
    }
    if request.reduce_only {
        params.push(("reduceOnly", "true".to_string()));
    }
    params
}

fn parse_kline_row(row: &Vec<Value>) -> Option<HistoricalKline> {
    let open_time_ms = row.first()?.as_i64()?;
    let parse_field = |index: usize| row.get(index)?.as_str()?.parse::<f64>().ok();
    Some(HistoricalKline {
        open_time: chrono::DateTime::from_timestamp_millis(open_time_ms)?,
        open: parse_field(1)?,
        high: parse_field(2)?,
        low: parse_field(3)?,
        close: parse_field(4)?,
        volume: parse_field(5)?,
    })
}

fn extract_error(body: &str) -> (i64, String) {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let code = value.get("code").and_then(Value::as_i64).unwrap_or(-1);
            let message = value.get("msg").and_then(Value::as_str).unwrap_or(body).to_string();
            (code, message)
        }
        Err(_) => (-1, body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderSide, OrderType, PositionSide};

    #[test]
    fn order_params_include_required_fields_and_skip_absent_optionals() {
        let request = NewOrderRequest {
            symbol: "BTCUSDT".to_string(),
            side: OrderSide::Buy,
            position_side: PositionSide::Long,
            order_type: OrderType::Market,
            quantity: Some(0.01),
            stop_price: None,
            working_type: None,
            close_position: false,
            reduce_only: false,
        };
        let params = order_params(&request);
        assert!(params.iter().any(|(k, v)| *k == "symbol" && v == "BTCUSDT"));
        assert!(params.iter().any(|(k, v)| *k == "quantity" && v == "0.01"));
        assert!(!params.iter().any(|(k, _)| *k == "stopPrice"));
    }

    #[test]
    fn extract_error_falls_back_to_raw_body_on_non_json() {
        let (code, message) = extract_error("not json");
        assert_eq!(code, -1);
        assert_eq!(message, "not json");
    }

    #[test]
    fn extract_error_reads_exchange_error_envelope() {
        let (code, message) = extract_error(r#"{"code":-2019,"msg":"Margin is insufficient"}"#);
        assert_eq!(code, -2019);
        assert_eq!(message, "Margin is insufficient");
    }

    #[test]
    fn parses_kline_row_from_heterogeneous_json_array() {
        let row: Vec<Value> = serde_json::from_str(
            r#"[1609459200000,"50000.00","50500.00","49800.00","50200.00","12.5",1609459259999,"0",0,"0","0","0"]"#,
        )
        .unwrap();
        let kline = parse_kline_row(&row).expect("well-formed row parses");
        assert_eq!(kline.open, 50_000.0);
        assert_eq!(kline.close, 50_200.0);
        assert_eq!(kline.volume, 12.5);
    }

    #[test]
    fn rejects_kline_row_missing_fields() {
        let row: Vec<Value> = serde_json::from_str("[1609459200000]").unwrap();
        assert!(parse_kline_row(&row).is_none());
    }
}
