//! Budget-tracked chat-completions client
//!
//! Every query passes through three gates before a request leaves the
//! process: the budget check, the optional pacing limiter and the backoff
//! policy. Only a 2xx response counts against the budget.

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Serialize;
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::budget::{BudgetTracker, UsageStats};
use super::citations::extract_citations;
use super::error::SearchError;
use crate::clock::SharedClock;
use crate::config::{ApiConfig, BudgetConfig};
use crate::utils::retry::{with_backoff, BackoffPolicy, RetryDecision};
use crate::utils::truncate_text;

/// System message used when a request does not supply one
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a research assistant. Provide comprehensive answers with citations to reliable sources. Be factual, objective, and thorough.";

const TEMPERATURE: f32 = 0.5;
const TOP_P: f32 = 0.9;

/// One search query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub text: String,
    pub model: Option<String>,
    pub system_message: Option<String>,
    pub max_tokens: u32,
}

impl SearchRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            system_message: None,
            max_tokens: 1000,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Parsed search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub content: String,
    pub citations: Vec<String>,
    pub request_id: Option<String>,
    pub model: Option<String>,
    pub raw: serde_json::Value,
}

impl SearchResponse {
    /// Parse a chat-completions body
    pub fn from_json(raw: serde_json::Value) -> Result<Self, SearchError> {
        let content = raw
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| SearchError::shape("missing choices[0].message.content"))?
            .to_string();

        let citations = extract_citations(&content);
        let request_id = raw.get("id").and_then(|v| v.as_str()).map(String::from);
        let model = raw.get("model").and_then(|v| v.as_str()).map(String::from);

        Ok(Self {
            content,
            citations,
            request_id,
            model,
            raw,
        })
    }
}

/// Anything that can answer a [`SearchRequest`]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run one query
    async fn query(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError>;

    /// Current usage counters
    fn usage_stats(&self) -> UsageStats;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

/// Failure of a single attempt, before retry classification
#[derive(Debug)]
enum AttemptError {
    RateLimited,
    Transport(String),
    Rejected { status: u16, body: String },
    Malformed(String),
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited (429)"),
            Self::Transport(reason) => write!(f, "request error: {}", reason),
            Self::Rejected { status, body } => write!(f, "status {}: {}", status, body),
            Self::Malformed(reason) => write!(f, "malformed body: {}", reason),
        }
    }
}

impl AttemptError {
    fn decision(&self) -> RetryDecision {
        match self {
            Self::RateLimited | Self::Transport(_) => RetryDecision::Retry,
            Self::Rejected { .. } | Self::Malformed(_) => RetryDecision::Fail,
        }
    }
}

impl From<AttemptError> for SearchError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::RateLimited => SearchError::RetriesExhausted,
            AttemptError::Transport(reason) => SearchError::MaxRetriesExceeded { reason },
            AttemptError::Rejected { status, body } => SearchError::Api { status, body },
            AttemptError::Malformed(reason) => SearchError::ResponseShape { reason },
        }
    }
}

/// Chat-completions client with budget, pacing and retry
pub struct SearchClient {
    /// HTTP client with per-attempt timeout
    http: Client,

    /// Endpoint URL
    endpoint: String,

    /// Bearer token
    api_key: String,

    /// Model used when the request names none
    default_model: String,

    /// Attempt budget and delay curve
    policy: BackoffPolicy,

    /// Optional client-side pacing
    pacing: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,

    /// Usage counters
    budget: BudgetTracker,
}

impl SearchClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Client` if the HTTP client cannot be created
    pub fn new(
        api: &ApiConfig,
        budget: &BudgetConfig,
        clock: SharedClock,
    ) -> Result<Self, SearchError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;

        let pacing = NonZeroU32::new(api.requests_per_minute)
            .map(|rate| RateLimiter::direct(Quota::per_minute(rate)));

        let tracker = BudgetTracker::new(budget.daily_budget, budget.cost_per_call, clock)
            .with_window(budget.window());

        Ok(Self {
            http,
            endpoint: api.endpoint.clone(),
            api_key: api.api_key.clone(),
            default_model: api.model.clone(),
            policy: api.backoff_policy(),
            pacing,
            budget: tracker,
        })
    }

    /// Point the client at another endpoint (mock servers in tests)
    pub fn with_base_url(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Replace the backoff policy
    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Whether another call fits in the current budget window
    pub fn check_budget(&self) -> bool {
        self.budget.check_budget()
    }

    /// Read-only usage snapshot
    pub fn usage_stats(&self) -> UsageStats {
        self.budget.stats()
    }

    /// Run a query through budget check, pacing and retry
    ///
    /// # Errors
    ///
    /// - `BudgetExceeded` without any network call when the cap is reached
    /// - `RetriesExhausted` when every attempt was rate limited
    /// - `MaxRetriesExceeded` when connection failures outlast the attempts
    /// - `Api` for any other non-success status (not retried)
    /// - `ResponseShape` when a 2xx body lacks the expected fields
    pub async fn query(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        if !self.budget.check_budget() {
            warn!("Budget limit reached");
            return Err(SearchError::BudgetExceeded);
        }

        let model = request.model.as_deref().unwrap_or(&self.default_model);
        let system = request
            .system_message
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_MESSAGE);

        let body = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.text,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: TEMPERATURE,
            top_p: TOP_P,
        };

        info!(
            query = %truncate_text(&request.text, 50),
            model = model,
            "Making search API call"
        );

        let raw = with_backoff(
            &self.policy,
            |attempt| self.send_once(&body, attempt),
            AttemptError::decision,
        )
        .await
        .map_err(|e| {
            let err = SearchError::from(e);
            error!(error = %err, "Search API call failed");
            err
        })?;

        let calls = self.budget.record_call();
        info!(request_count = calls, "Search API call successful");

        SearchResponse::from_json(raw).inspect_err(|e| {
            error!(error = %e, "Error processing search response");
        })
    }

    /// One HTTP attempt
    async fn send_once(
        &self,
        body: &ChatRequest<'_>,
        attempt: u32,
    ) -> Result<serde_json::Value, AttemptError> {
        if let Some(limiter) = &self.pacing {
            limiter.until_ready().await;
        }

        debug!(attempt = attempt, endpoint = %self.endpoint, "Sending search request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(attempt = attempt, "Rate limit exceeded, backing off");
            return Err(AttemptError::RateLimited);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| AttemptError::Transport(e.to_string()))?;

        serde_json::from_str(&text).map_err(|e| AttemptError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl SearchBackend for SearchClient {
    async fn query(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        SearchClient::query(self, request).await
    }

    fn usage_stats(&self) -> UsageStats {
        SearchClient::usage_stats(self)
    }
}

impl fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchClient")
            .field("endpoint", &self.endpoint)
            .field("default_model", &self.default_model)
            .field("policy", &self.policy)
            .field("pacing", &self.pacing.is_some())
            .field("budget", &self.budget)
            .finish_non_exhaustive()
    }
}
