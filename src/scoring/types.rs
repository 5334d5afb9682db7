//! Typed request/response contract for the scoring collaborator

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};

use crate::common::types::Side;
use crate::market::PercentChanges;

/// The collaborator's verdict on a signal for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Long,
    Short,
    Hold,
}

impl Action {
    /// Tradeable direction, if any. `Hold` has none.
    pub fn side(self) -> Option<Side> {
        match self {
            Action::Long => Some(Side::Long),
            Action::Short => Some(Side::Short),
            Action::Hold => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Long => write!(f, "LONG"),
            Action::Short => write!(f, "SHORT"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// Everything the collaborator is given to score one signal against one
/// instrument.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRequest {
    pub instrument: String,
    pub current_price: Decimal,
    pub changes: PercentChanges,
    pub signal_text: String,
    /// Optional extra context (research notes, category profile)
    pub context_text: Option<String>,
}

fn default_take_profit_pct() -> Decimal {
    dec!(2.0)
}

fn default_stop_loss_pct() -> Decimal {
    dec!(1.0)
}

fn default_validity_minutes() -> i64 {
    15
}

/// Confidence outside 0..=100 is a malformed payload, not a strong opinion.
fn validated_confidence<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = u8::deserialize(deserializer)?;
    if raw > 100 {
        return Err(serde::de::Error::custom(format!(
            "confidence {raw} out of range 0-100"
        )));
    }
    Ok(raw)
}

/// A validated decision from the scoring collaborator.
///
/// Optional fields carry explicit defaults; a response that fails to parse
/// into this shape is a collaborator failure, not a tradeable decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    /// 0..=100
    #[serde(default, deserialize_with = "validated_confidence")]
    pub confidence: u8,
    #[serde(default = "default_take_profit_pct", rename = "tp_pct")]
    pub take_profit_pct: Decimal,
    #[serde(default = "default_stop_loss_pct", rename = "sl_pct")]
    pub stop_loss_pct: Decimal,
    #[serde(default = "default_validity_minutes")]
    pub validity_minutes: i64,
    #[serde(default)]
    pub reason: String,
}

impl Decision {
    /// The decision a collaborator failure degrades to: do nothing.
    pub fn hold(reason: impl Into<String>) -> Self {
        Self {
            action: Action::Hold,
            confidence: 0,
            take_profit_pct: default_take_profit_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            validity_minutes: default_validity_minutes(),
            reason: reason.into(),
        }
    }
}
