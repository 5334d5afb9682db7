//! Scoring collaborator contract and client

mod client;
mod types;

pub use client::{instrument_base, LlmScoringClient, ScoringClient};
pub use types::{Action, Decision, ScoreRequest};

#[cfg(test)]
pub use client::MockScoringClient;
