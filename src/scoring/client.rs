//! HTTP client for the scoring collaborator
//!
//! The collaborator is an OpenAI-compatible chat-completions endpoint asked
//! to answer in strict JSON. Its internal reasoning is none of our business:
//! this module only assembles the request, enforces a minimum spacing
//! between calls, and parses the response into the typed [`Decision`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::common::errors::{EngineError, Result};
use crate::scoring::types::{Decision, ScoreRequest};

/// Narrow seam to the scoring collaborator.
///
/// `score` maps a signal + market snapshot to a decision; `resolve_symbol`
/// is the collaborator's symbol-detection capability, constrained to the
/// allowed set.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScoringClient: Send + Sync {
    async fn score(&self, request: &ScoreRequest) -> Result<Decision>;

    /// Which allowed instrument, if any, does this text concern?
    async fn resolve_symbol(&self, text: &str, allowed: &[String]) -> Result<Option<String>>;
}

/// Chat-completions backed scoring client.
pub struct LlmScoringClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    /// Minimum spacing between requests (rate-limit cooldown)
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl LlmScoringClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            min_interval: Duration::ZERO,
            last_request: Mutex::new(None),
        }
    }

    /// Enforce a minimum spacing between collaborator calls.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Sleep out the remainder of the cooldown, if any. Holding the lock
    /// across the sleep serializes concurrent callers.
    async fn wait_for_cooldown(&self) {
        if self.min_interval.is_zero() {
            return;
        }
        let mut last = self.last_request.lock().await;
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!(?remaining, "Scoring cooldown");
                tokio::time::sleep(remaining).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        self.wait_for_cooldown().await;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            temperature: 0.1,
            max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(30))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Scoring(format!(
                "collaborator returned HTTP {status}: {text}"
            )));
        }

        let completion: ChatResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| EngineError::Scoring("collaborator returned empty content".into()))?;

        Ok(strip_thinking(&content))
    }
}

#[async_trait]
impl ScoringClient for LlmScoringClient {
    #[instrument(skip(self, request), fields(instrument = %request.instrument))]
    async fn score(&self, request: &ScoreRequest) -> Result<Decision> {
        let prompt = score_prompt(request);
        let content = self.complete(&prompt, 1024).await?;

        serde_json::from_str::<Decision>(&content).map_err(|e| {
            warn!(error = %e, content = %content, "Unparseable scoring response");
            EngineError::Scoring(format!("malformed decision payload: {e}"))
        })
    }

    #[instrument(skip(self, text, allowed))]
    async fn resolve_symbol(&self, text: &str, allowed: &[String]) -> Result<Option<String>> {
        let prompt = resolve_prompt(text, allowed);
        let content = self.complete(&prompt, 32).await?;

        let parsed: SymbolResponse = serde_json::from_str(&content)
            .map_err(|e| EngineError::Scoring(format!("malformed symbol payload: {e}")))?;

        // Constrain to the allowed set; anything else counts as "none"
        let resolved = parsed.symbol.and_then(|symbol| {
            let upper = symbol.to_uppercase();
            allowed
                .iter()
                .find(|a| a.to_uppercase() == upper || instrument_base(a) == upper)
                .cloned()
        });

        Ok(resolved)
    }
}

/// Base asset of an instrument name, e.g. `BTCUSDT` -> `BTC`.
pub fn instrument_base(instrument: &str) -> String {
    let upper = instrument.to_uppercase();
    for quote in ["USDT", "USDC", "USD"] {
        if let Some(base) = upper.strip_suffix(quote) {
            if !base.is_empty() {
                return base.to_string();
            }
        }
    }
    upper
}

/// Remove `<think>...</think>` blocks some models emit before the JSON.
fn strip_thinking(text: &str) -> String {
    let mut out = text.to_string();
    while let (Some(start), Some(end)) = (out.find("<think>"), out.find("</think>")) {
        if end < start {
            break;
        }
        out.replace_range(start..end + "</think>".len(), "");
    }
    out.trim().to_string()
}

fn score_prompt(request: &ScoreRequest) -> String {
    let context = request.context_text.as_deref().unwrap_or("");
    format!(
        r#"TARGET INSTRUMENT: {instrument}

MARKET MOMENTUM:
- Price: {price}
- 1m Change: {m1}%
- 10m Change: {m10}%
- 1h Change: {h1}%
- 24h Change: {h24}%

NEWS SNIPPET: "{signal}"
RESEARCH CONTEXT: "{context}"

ROLE: You are an aggressive short-horizon trader. Decide whether this news,
combined with the momentum above, justifies a trade on {instrument} right now.
Stale news (events that already played out) means HOLD. Prices already
running more than 2% in the last minutes mean HOLD.

JSON OUTPUT ONLY:
{{
    "action": "LONG" | "SHORT" | "HOLD",
    "confidence": <int 0-100>,
    "tp_pct": <float>,
    "sl_pct": <float>,
    "validity_minutes": <int 5-30>,
    "reason": "<one sentence>"
}}"#,
        instrument = request.instrument,
        price = request.current_price,
        m1 = request.changes.m1,
        m10 = request.changes.m10,
        h1 = request.changes.h1,
        h24 = request.changes.h24,
        signal = request.signal_text,
        context = context,
    )
}

fn resolve_prompt(text: &str, allowed: &[String]) -> String {
    let symbols: Vec<String> = allowed.iter().map(|a| instrument_base(a)).collect();
    format!(
        r#"TASK: Identify which instrument is most impacted by this news.
NEWS: "{text}"
ALLOWED SYMBOLS: [{symbols}]

Only return a symbol from the allowed list. If no listed instrument is
specifically impacted, return null.

JSON OUTPUT ONLY:
{{ "symbol": "<SYMBOL>" | null }}"#,
        text = text,
        symbols = symbols.join(", "),
    )
}

// Wire types for the chat-completions API

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct SymbolResponse {
    symbol: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::PercentChanges;
    use crate::scoring::types::Action;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    fn sample_request() -> ScoreRequest {
        ScoreRequest {
            instrument: "BTCUSDT".to_string(),
            current_price: dec!(50000),
            changes: PercentChanges::zero(),
            signal_text: "Bitcoin ETF approved".to_string(),
            context_text: None,
        }
    }

    #[test]
    fn test_instrument_base() {
        assert_eq!(instrument_base("BTCUSDT"), "BTC");
        assert_eq!(instrument_base("ethusdt"), "ETH");
        assert_eq!(instrument_base("SOLUSD"), "SOL");
        assert_eq!(instrument_base("NAS100"), "NAS100");
    }

    #[test]
    fn test_strip_thinking() {
        let raw = "<think>hmm, ETF news is\nbullish</think>{\"action\": \"LONG\"}";
        assert_eq!(strip_thinking(raw), "{\"action\": \"LONG\"}");
        assert_eq!(strip_thinking("{\"a\": 1}"), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn test_score_parses_decision() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                r#"{"action": "LONG", "confidence": 85, "tp_pct": 2.5, "sl_pct": 1.0, "validity_minutes": 15, "reason": "ETF approval"}"#,
            )))
            .mount(&server)
            .await;

        let client = LlmScoringClient::new(&server.uri(), "test-key", "test-model");
        let decision = client.score(&sample_request()).await.unwrap();

        assert_eq!(decision.action, Action::Long);
        assert_eq!(decision.confidence, 85);
        assert_eq!(decision.take_profit_pct, dec!(2.5));
    }

    #[tokio::test]
    async fn test_score_strips_thinking_block() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                "<think>strong bullish catalyst</think>{\"action\": \"LONG\", \"confidence\": 90}",
            )))
            .mount(&server)
            .await;

        let client = LlmScoringClient::new(&server.uri(), "test-key", "test-model");
        let decision = client.score(&sample_request()).await.unwrap();
        assert_eq!(decision.confidence, 90);
    }

    #[tokio::test]
    async fn test_score_malformed_payload_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("the market looks bullish to me")),
            )
            .mount(&server)
            .await;

        let client = LlmScoringClient::new(&server.uri(), "test-key", "test-model");
        let result = client.score(&sample_request()).await;
        assert!(matches!(result, Err(EngineError::Scoring(_))));
    }

    #[tokio::test]
    async fn test_score_http_error_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = LlmScoringClient::new(&server.uri(), "test-key", "test-model");
        let result = client.score(&sample_request()).await;
        assert!(matches!(result, Err(EngineError::Scoring(_))));
    }

    #[tokio::test]
    async fn test_resolve_symbol_constrained_to_allowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body(r#"{"symbol": "BTC"}"#)),
            )
            .mount(&server)
            .await;

        let client = LlmScoringClient::new(&server.uri(), "test-key", "test-model");
        let allowed = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];

        let resolved = client
            .resolve_symbol("Satoshi-era wallet moves coins", &allowed)
            .await
            .unwrap();
        assert_eq!(resolved, Some("BTCUSDT".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_symbol_outside_allowed_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body(r#"{"symbol": "DOGE"}"#)),
            )
            .mount(&server)
            .await;

        let client = LlmScoringClient::new(&server.uri(), "test-key", "test-model");
        let allowed = vec!["BTCUSDT".to_string()];

        let resolved = client.resolve_symbol("Doge news", &allowed).await.unwrap();
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn test_resolve_symbol_null_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body(r#"{"symbol": null}"#)),
            )
            .mount(&server)
            .await;

        let client = LlmScoringClient::new(&server.uri(), "test-key", "test-model");
        let allowed = vec!["BTCUSDT".to_string()];

        let resolved = client
            .resolve_symbol("Weather forecast", &allowed)
            .await
            .unwrap();
        assert_eq!(resolved, None);
    }
}
