//! Position and closure types owned by the ledger

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::Side;

/// Lifecycle status of a position slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// The terminating reason of a close. Exactly one fires per closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseReason {
    TakeProfit,
    StopLoss,
    /// The position outlived its validity window
    TimeLimit,
    /// Operator-requested close
    Manual,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::TakeProfit => write!(f, "TAKE_PROFIT"),
            CloseReason::StopLoss => write!(f, "STOP_LOSS"),
            CloseReason::TimeLimit => write!(f, "TIME_LIMIT"),
            CloseReason::Manual => write!(f, "MANUAL"),
        }
    }
}

/// A simulated leveraged position.
///
/// Owned exclusively by the [`PositionLedger`](super::PositionLedger); other
/// components only ever see clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub instrument: String,
    pub side: Side,
    pub entry_price: Decimal,
    /// `margin * leverage / entry_price`
    pub quantity: Decimal,
    pub leverage: u32,
    /// Capital debited from the balance at open
    pub margin: Decimal,
    pub take_profit_price: Decimal,
    pub stop_loss_price: Decimal,
    /// After this instant any mark closes the position with `TimeLimit`
    pub expiry_time: DateTime<Utc>,
    /// Last marked price
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Margin-relative return of the current unrealized pnl, in percent.
    pub fn return_on_margin_pct(&self) -> Decimal {
        if self.margin.is_zero() {
            Decimal::ZERO
        } else {
            self.unrealized_pnl / self.margin * Decimal::from(100)
        }
    }
}

/// Record produced when a position closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureRecord {
    pub instrument: String,
    pub side: Side,
    pub reason: CloseReason,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Realized profit or loss, credited to the balance together with the
    /// returned margin
    pub pnl: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::TakeProfit.to_string(), "TAKE_PROFIT");
        assert_eq!(CloseReason::TimeLimit.to_string(), "TIME_LIMIT");
    }

    #[test]
    fn test_return_on_margin() {
        let position = Position {
            instrument: "BTCUSDT".to_string(),
            side: Side::Long,
            entry_price: dec!(100),
            quantity: dec!(10),
            leverage: 10,
            margin: dec!(100),
            take_profit_price: dec!(102),
            stop_loss_price: dec!(99),
            expiry_time: Utc::now(),
            current_price: dec!(101),
            unrealized_pnl: dec!(10),
            status: PositionStatus::Open,
            opened_at: Utc::now(),
        };
        assert_eq!(position.return_on_margin_pct(), dec!(10));
    }
}
