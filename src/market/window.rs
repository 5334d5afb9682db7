//! Per-instrument rolling price windows
//!
//! Each instrument keeps a timestamp-ordered deque of recent samples,
//! trimmed to a fixed retention horizon. The buffer answers two questions:
//! "what is the current price" and "how much has the price moved over the
//! last N seconds".

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Retention horizon for price samples, in seconds.
pub const RETENTION_SECONDS: i64 = 600;

/// Percent changes over the standard lookback intervals, as supplied to the
/// scoring collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PercentChanges {
    /// 1 minute
    pub m1: Decimal,
    /// 10 minutes
    pub m10: Decimal,
    /// 1 hour
    pub h1: Decimal,
    /// 24 hours
    pub h24: Decimal,
}

impl PercentChanges {
    pub fn zero() -> Self {
        Self {
            m1: Decimal::ZERO,
            m10: Decimal::ZERO,
            h1: Decimal::ZERO,
            h24: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct Window {
    /// Timestamp-ordered samples, oldest first
    samples: VecDeque<(DateTime<Utc>, Decimal)>,
}

impl Window {
    fn add(&mut self, price: Decimal, timestamp: DateTime<Utc>) {
        self.samples.push_back((timestamp, price));
        let horizon = timestamp - Duration::seconds(RETENTION_SECONDS);
        while let Some(&(ts, _)) = self.samples.front() {
            if ts < horizon {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn latest(&self) -> Option<(DateTime<Utc>, Decimal)> {
        self.samples.back().copied()
    }

    /// Percent change between the latest price and the oldest retained sample
    /// whose timestamp is within `seconds` of the latest. Falls back to the
    /// oldest available sample when nothing qualifies.
    fn change(&self, seconds: i64) -> Decimal {
        let Some((latest_ts, latest_price)) = self.latest() else {
            return Decimal::ZERO;
        };

        let cutoff = latest_ts - Duration::seconds(seconds);
        // The latest sample trivially satisfies the cutoff; it must not be
        // its own reference, so search the earlier samples only.
        let reference = self
            .samples
            .iter()
            .take(self.samples.len() - 1)
            .find(|(ts, _)| *ts >= cutoff)
            .or_else(|| self.samples.front())
            .copied();

        match reference {
            Some((ref_ts, ref_price)) if ref_ts < latest_ts && !ref_price.is_zero() => {
                (latest_price - ref_price) / ref_price * dec!(100)
            }
            _ => Decimal::ZERO,
        }
    }
}

/// Rolling price windows keyed by instrument.
///
/// Unknown instruments implicitly start empty; there are no error
/// conditions here.
#[derive(Debug, Default)]
pub struct RollingWindows {
    windows: HashMap<String, Window>,
}

impl RollingWindows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample and trim anything older than the retention horizon.
    pub fn add(&mut self, instrument: &str, price: Decimal, timestamp: DateTime<Utc>) {
        self.windows
            .entry(instrument.to_string())
            .or_default()
            .add(price, timestamp);
    }

    /// Latest ingested price for the instrument, or 0 if none recorded.
    pub fn current_price(&self, instrument: &str) -> Decimal {
        self.windows
            .get(instrument)
            .and_then(|w| w.latest())
            .map(|(_, price)| price)
            .unwrap_or(Decimal::ZERO)
    }

    /// Percent change over the last `seconds` seconds, or 0 when the buffer
    /// is empty or holds a single sample.
    pub fn change(&self, instrument: &str, seconds: i64) -> Decimal {
        self.windows
            .get(instrument)
            .map(|w| w.change(seconds))
            .unwrap_or(Decimal::ZERO)
    }

    /// Percent changes over the standard 1m/10m/1h/24h lookbacks.
    ///
    /// Lookbacks beyond the retention horizon fall back to the oldest
    /// retained sample.
    pub fn changes(&self, instrument: &str) -> PercentChanges {
        PercentChanges {
            m1: self.change(instrument, 60),
            m10: self.change(instrument, 600),
            h1: self.change(instrument, 3_600),
            h24: self.change(instrument, 86_400),
        }
    }

    /// Number of retained samples for an instrument. Mainly for diagnostics.
    pub fn sample_count(&self, instrument: &str) -> usize {
        self.windows
            .get(instrument)
            .map(|w| w.samples.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap()
    }

    #[test]
    fn test_current_price_tracks_latest_sample() {
        let mut windows = RollingWindows::new();
        assert_eq!(windows.current_price("BTCUSDT"), Decimal::ZERO);

        windows.add("BTCUSDT", dec!(50000), ts(0));
        assert_eq!(windows.current_price("BTCUSDT"), dec!(50000));

        windows.add("BTCUSDT", dec!(50100), ts(5));
        assert_eq!(windows.current_price("BTCUSDT"), dec!(50100));

        // Other instruments are unaffected
        assert_eq!(windows.current_price("ETHUSDT"), Decimal::ZERO);
    }

    #[test]
    fn test_change_single_sample_is_zero() {
        let mut windows = RollingWindows::new();
        windows.add("BTCUSDT", dec!(50000), ts(0));
        assert_eq!(windows.change("BTCUSDT", 60), Decimal::ZERO);
    }

    #[test]
    fn test_change_empty_is_zero() {
        let windows = RollingWindows::new();
        assert_eq!(windows.change("BTCUSDT", 60), Decimal::ZERO);
    }

    #[test]
    fn test_change_over_interval() {
        let mut windows = RollingWindows::new();
        windows.add("BTCUSDT", dec!(50000), ts(0));
        windows.add("BTCUSDT", dec!(50500), ts(30));
        windows.add("BTCUSDT", dec!(51000), ts(60));

        // Oldest sample within 60s of the latest is the one at ts(0):
        // (51000 - 50000) / 50000 * 100 = 2%
        assert_eq!(windows.change("BTCUSDT", 60), dec!(2));
    }

    #[test]
    fn test_change_falls_back_to_oldest_sample() {
        let mut windows = RollingWindows::new();
        windows.add("BTCUSDT", dec!(50000), ts(0));
        windows.add("BTCUSDT", dec!(51000), ts(500));

        // 60s lookback has no qualifying sample besides the latest, so the
        // oldest retained sample is used instead.
        assert_eq!(windows.change("BTCUSDT", 60), dec!(2));
    }

    #[test]
    fn test_retention_trims_old_samples() {
        let mut windows = RollingWindows::new();
        windows.add("BTCUSDT", dec!(40000), ts(0));
        windows.add("BTCUSDT", dec!(41000), ts(100));
        windows.add("BTCUSDT", dec!(42000), ts(RETENTION_SECONDS + 101));

        // Both earlier samples are older than 600s relative to the latest
        assert_eq!(windows.sample_count("BTCUSDT"), 1);
        assert_eq!(windows.change("BTCUSDT", 86_400), Decimal::ZERO);
    }

    #[test]
    fn test_changes_snapshot() {
        let mut windows = RollingWindows::new();
        windows.add("BTCUSDT", dec!(50000), ts(0));
        windows.add("BTCUSDT", dec!(50250), ts(120));

        let changes = windows.changes("BTCUSDT");
        // No earlier sample within 60s, so the oldest retained one is used
        assert_eq!(changes.m1, dec!(0.5));
        assert_eq!(changes.m10, dec!(0.5));
        assert_eq!(changes.h1, dec!(0.5));
        assert_eq!(changes.h24, dec!(0.5));
    }

    #[test]
    fn test_change_prefers_oldest_qualifying_earlier_sample() {
        let mut windows = RollingWindows::new();
        windows.add("BTCUSDT", dec!(50000), ts(0));
        windows.add("BTCUSDT", dec!(50500), ts(470));
        windows.add("BTCUSDT", dec!(51005), ts(500));

        // cutoff = 440s: ts(470) qualifies, ts(0) does not
        // (51005 - 50500) / 50500 * 100 = 1%
        assert_eq!(windows.change("BTCUSDT", 60), dec!(1));
    }
}
