//! Near-duplicate signal suppression
//!
//! Keeps a trailing window of recently seen signal texts and scores new
//! arrivals against it with term-frequency cosine similarity. The window is
//! bounded both in time (24h) and in size (100 entries), whichever bites
//! first.
//!
//! Dedup tracks *signal* novelty, not trade outcome: accepted texts are
//! recorded whether or not they later produce a position.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};

/// Default similarity threshold above which a text counts as a duplicate.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.75;

/// Maximum number of retained texts.
pub const MAX_HISTORY_ENTRIES: usize = 100;

/// Time bound on retained texts.
pub const HISTORY_HORIZON_HOURS: i64 = 24;

/// Trailing-window duplicate detector over signal texts.
#[derive(Debug)]
pub struct SignalDeduplicator {
    /// Normalized retained texts, oldest first
    history: VecDeque<(DateTime<Utc>, String)>,
    threshold: f64,
}

impl SignalDeduplicator {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_SIMILARITY_THRESHOLD)
    }

    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            history: VecDeque::new(),
            threshold,
        }
    }

    /// Check a text against the trailing window.
    ///
    /// Returns `(duplicate, max_similarity)`. A text is a duplicate when its
    /// best similarity against the retained texts reaches the threshold, or
    /// when it normalizes to nothing at all. An empty history never produces
    /// a duplicate.
    pub fn is_duplicate(&mut self, text: &str, now: DateTime<Utc>) -> (bool, f64) {
        let clean = normalize(text);
        if clean.is_empty() {
            return (true, 1.0);
        }

        self.trim(now);
        if self.history.is_empty() {
            return (false, 0.0);
        }

        let new_tf = term_frequencies(&clean);
        let mut max_similarity: f64 = 0.0;
        for (_, past) in &self.history {
            let sim = if *past == clean {
                1.0
            } else {
                cosine_similarity(&new_tf, &term_frequencies(past))
            };
            if sim > max_similarity {
                max_similarity = sim;
            }
        }

        (max_similarity >= self.threshold, max_similarity)
    }

    /// Record an accepted text in the trailing window.
    pub fn record(&mut self, text: &str, now: DateTime<Utc>) {
        let clean = normalize(text);
        if clean.is_empty() {
            return;
        }
        self.history.push_back((now, clean));
        self.trim(now);
    }

    /// Number of retained texts
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn trim(&mut self, now: DateTime<Utc>) {
        let horizon = now - Duration::hours(HISTORY_HORIZON_HOURS);
        while let Some((ts, _)) = self.history.front() {
            if *ts < horizon {
                self.history.pop_front();
            } else {
                break;
            }
        }
        while self.history.len() > MAX_HISTORY_ENTRIES {
            self.history.pop_front();
        }
    }
}

impl Default for SignalDeduplicator {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase, strip URLs, strip punctuation.
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .filter(|token| {
            !token.starts_with("http://") && !token.starts_with("https://")
                && !token.starts_with("www.")
        })
        .map(|token| {
            token
                .chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn term_frequencies(text: &str) -> HashMap<String, f64> {
    let mut tf: HashMap<String, f64> = HashMap::new();
    for term in text.split_whitespace() {
        *tf.entry(term.to_string()).or_insert(0.0) += 1.0;
    }
    tf
}

fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, weight)| b.get(term).map(|other| weight * other))
        .sum();
    if dot == 0.0 {
        return 0.0;
    }
    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    dot / (norm_a * norm_b)
}
