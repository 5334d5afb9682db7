//! Execution bridge: mirrors accepted decisions to the real venue
//!
//! The ledger is authoritative; the bridge only mirrors. Whatever happens on
//! the real-order path — refusals, rejections, partial failures — the
//! simulated position is unaffected.
//!
//! Entry, stop and take-profit submissions are not atomic. An entry that
//! fills followed by a protective order that fails leaves a real,
//! unprotected position. That is escalated as CRITICAL and left for the
//! operator: an automatic compensating close would compound risk under
//! uncertain market state.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::common::errors::{EngineError, Refusal, Result};
use crate::common::types::Side;
use crate::execution::precision::{floor_to_step, round_to_tick};
use crate::execution::venue::{InstrumentFilters, ProtectiveKind, VenueClient};
use crate::ledger::bracket_prices;

/// Parameters for mirroring one accepted decision.
#[derive(Debug, Clone)]
pub struct EntryOrder {
    pub instrument: String,
    pub side: Side,
    /// Notional margin committed, pre-leverage
    pub margin: Decimal,
    pub leverage: u32,
    /// Latest known price, used for sizing and as a fill-price fallback
    pub price_hint: Decimal,
    pub take_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
}

/// Outcome of a successfully mirrored entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MirroredEntry {
    pub instrument: String,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub stop_price: Decimal,
    pub take_profit_price: Decimal,
}

/// Bridges accepted decisions to the venue, with exchange-legal sizing.
pub struct ExecutionBridge {
    venue: Arc<dyn VenueClient>,
    filters: HashMap<String, InstrumentFilters>,
}

impl ExecutionBridge {
    /// Fetch instrument filters from the venue and build the bridge.
    pub async fn connect(venue: Arc<dyn VenueClient>) -> Result<Self> {
        let filters = venue.exchange_filters().await?;
        info!(instruments = filters.len(), "Execution bridge connected");
        Ok(Self { venue, filters })
    }

    /// Build a bridge from already-known filters. Used in tests and by
    /// embedders that cache venue metadata themselves.
    pub fn with_filters(
        venue: Arc<dyn VenueClient>,
        filters: HashMap<String, InstrumentFilters>,
    ) -> Self {
        Self { venue, filters }
    }

    /// Filters for an instrument, if the venue trades it.
    pub fn filters(&self, instrument: &str) -> Option<&InstrumentFilters> {
        self.filters.get(instrument)
    }

    /// Mirror an accepted decision: set leverage, submit the entry order,
    /// then bracket it with reduce-only stop and take-profit orders.
    ///
    /// Returns a refusal without touching the venue when the sized quantity
    /// is below the instrument's minimum. Returns
    /// [`EngineError::UnprotectedPosition`] when the entry filled but a
    /// protective order failed.
    pub async fn mirror_entry(&self, order: &EntryOrder) -> Result<MirroredEntry> {
        let filters = self.filters.get(&order.instrument).ok_or_else(|| {
            EngineError::Venue(format!("no venue filters for {}", order.instrument))
        })?;

        let raw_quantity = order.margin * Decimal::from(order.leverage) / order.price_hint;
        let quantity = floor_to_step(raw_quantity, filters.quantity_step);
        if quantity < filters.minimum_quantity {
            return Err(EngineError::OrderRefused(Refusal::BelowMinimumQuantity {
                quantity,
                minimum: filters.minimum_quantity,
            }));
        }

        self.venue
            .set_leverage(&order.instrument, order.leverage)
            .await?;

        info!(
            instrument = %order.instrument,
            side = %order.side,
            quantity = %quantity,
            leverage = order.leverage,
            "Submitting real entry order"
        );

        let fill = self
            .venue
            .submit_market_order(&order.instrument, order.side, quantity)
            .await?;

        let entry_price = if fill.average_price.is_zero() {
            warn!(instrument = %order.instrument, "Venue reported no fill price; using price hint");
            order.price_hint
        } else {
            fill.average_price
        };

        // From here on a real position exists at the venue.
        let (tp_raw, sl_raw) = bracket_prices(
            order.side,
            entry_price,
            order.take_profit_pct,
            order.stop_loss_pct,
        );
        let take_profit_price = round_to_tick(tp_raw, filters.price_tick);
        let stop_price = round_to_tick(sl_raw, filters.price_tick);
        let closing_side = order.side.closing();

        let protect = async {
            self.venue
                .submit_protective_order(
                    &order.instrument,
                    closing_side,
                    ProtectiveKind::StopLoss,
                    stop_price,
                )
                .await?;
            self.venue
                .submit_protective_order(
                    &order.instrument,
                    closing_side,
                    ProtectiveKind::TakeProfit,
                    take_profit_price,
                )
                .await?;
            Ok::<(), EngineError>(())
        };

        if let Err(e) = protect.await {
            error!(
                instrument = %order.instrument,
                entry_price = %entry_price,
                quantity = %quantity,
                error = %e,
                critical = true,
                "UNPROTECTED POSITION: entry filled but protective orders failed; operator action required"
            );
            return Err(EngineError::UnprotectedPosition {
                instrument: order.instrument.clone(),
                detail: e.to_string(),
            });
        }

        info!(
            instrument = %order.instrument,
            entry = %entry_price,
            sl = %stop_price,
            tp = %take_profit_price,
            "Entry mirrored with protective bracket"
        );

        Ok(MirroredEntry {
            instrument: order.instrument.clone(),
            quantity,
            entry_price,
            stop_price,
            take_profit_price,
        })
    }
}
