//! Venue adapter contract
//!
//! The engine never talks to an exchange directly; it talks to a small
//! adapter API. The adapter contract is deliberately narrow: per-instrument
//! precision filters at startup, leverage, one market entry order, and
//! reduce-only protective orders that close the entire position.
//!
//! ## Adapter endpoints (REST implementation)
//!
//! | Method | Path                | Body / Response                            |
//! |--------|---------------------|--------------------------------------------|
//! | GET    | `/filters`          | `{ "SYMBOL": {quantity_step, price_tick, minimum_quantity}, ... }` |
//! | POST   | `/leverage`         | `{instrument, leverage}`                   |
//! | POST   | `/order/market`     | `{instrument, side, quantity}` → `{average_price}` |
//! | POST   | `/order/protective` | `{instrument, side, kind, trigger_price, close_position: true}` |

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::common::errors::{EngineError, Result};
use crate::common::types::Side;

/// Per-instrument precision and minimum-size rules, fetched once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentFilters {
    /// Quantity granularity (`stepSize`)
    pub quantity_step: Decimal,
    /// Price granularity (`tickSize`)
    pub price_tick: Decimal,
    /// Smallest tradeable quantity (`minQty`)
    pub minimum_quantity: Decimal,
}

/// Fill report for a market entry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    /// Average fill price; zero means the venue did not report one
    #[serde(default)]
    pub average_price: Decimal,
}

/// Which protective leg an order is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectiveKind {
    StopLoss,
    TakeProfit,
}

/// Seam to the order-execution venue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Fetch precision filters for every tradeable instrument.
    async fn exchange_filters(&self) -> Result<HashMap<String, InstrumentFilters>>;

    /// Set leverage for an instrument before entering.
    async fn set_leverage(&self, instrument: &str, leverage: u32) -> Result<()>;

    /// Submit a market entry order; returns the fill report.
    async fn submit_market_order(
        &self,
        instrument: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<FillReport>;

    /// Submit a reduce-only protective order that closes the entire position
    /// when the trigger price trades.
    async fn submit_protective_order(
        &self,
        instrument: &str,
        side: Side,
        kind: ProtectiveKind,
        trigger_price: Decimal,
    ) -> Result<()>;
}

/// REST implementation of the venue adapter contract.
#[derive(Debug, Clone)]
pub struct RestVenueClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestVenueClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| EngineError::Venue(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("X-API-KEY", key);
        }
        builder
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(EngineError::Venue(format!("venue HTTP {status}: {body}")))
        }
    }
}

#[derive(Serialize)]
struct LeverageRequest<'a> {
    instrument: &'a str,
    leverage: u32,
}

#[derive(Serialize)]
struct MarketOrderRequest<'a> {
    instrument: &'a str,
    side: Side,
    quantity: Decimal,
}

#[derive(Serialize)]
struct ProtectiveOrderRequest<'a> {
    instrument: &'a str,
    side: Side,
    kind: ProtectiveKind,
    trigger_price: Decimal,
    /// Always true: protective orders close the whole position
    close_position: bool,
}

#[async_trait]
impl VenueClient for RestVenueClient {
    #[instrument(skip(self))]
    async fn exchange_filters(&self) -> Result<HashMap<String, InstrumentFilters>> {
        let response = self.request(reqwest::Method::GET, "/filters").send().await?;
        let filters: HashMap<String, InstrumentFilters> =
            Self::check(response).await?.json().await?;
        debug!(count = filters.len(), "Loaded venue instrument filters");
        Ok(filters)
    }

    #[instrument(skip(self))]
    async fn set_leverage(&self, instrument: &str, leverage: u32) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/leverage")
            .json(&LeverageRequest { instrument, leverage })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn submit_market_order(
        &self,
        instrument: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<FillReport> {
        let response = self
            .request(reqwest::Method::POST, "/order/market")
            .json(&MarketOrderRequest {
                instrument,
                side,
                quantity,
            })
            .send()
            .await?;
        let fill: FillReport = Self::check(response).await?.json().await?;
        Ok(fill)
    }

    #[instrument(skip(self))]
    async fn submit_protective_order(
        &self,
        instrument: &str,
        side: Side,
        kind: ProtectiveKind,
        trigger_price: Decimal,
    ) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "/order/protective")
            .json(&ProtectiveOrderRequest {
                instrument,
                side,
                kind,
                trigger_price,
                close_position: true,
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
