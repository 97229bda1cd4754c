//! Metadata suggestions from the Anthropic Messages API.
//!
//! [`SuggestionClient`] renders a prompt with the content and the existing
//! collection names, sends it through a [`Transport`], and validates the reply
//! into a [`Suggestion`].
//!
//! # Retry Strategy
//!
//! At most `max_attempts` requests are made, with exponential backoff between
//! them (1s, 2s, 4s, ... from `base_delay`):
//! - Network errors, HTTP 408/429/5xx and unreadable replies → retry
//! - Any other non-2xx status (e.g. 401) → fail immediately
//! - A well-formed reply that breaks the naming conventions → fail immediately
//!
//! Failures are returned as [`SuggestionFailure`] values so the caller can
//! fall back to manual input.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::snippet::{self, Confidence, SnippetDraft};
use crate::template::PromptTemplate;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Metadata proposed by the suggestion service, already validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Collection folder name (Title Case)
    pub collection: String,
    /// Display name (Title Case)
    pub name: String,
    /// Trigger keyword (`topic_function`)
    pub keyword: String,
    /// Short description
    pub description: String,
    /// Confidence of the categorization
    pub confidence: Confidence,
}

impl Suggestion {
    /// Turns the suggestion into a draft for the given content.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the content is empty.
    pub fn into_draft(self, content: impl Into<String>) -> Result<SnippetDraft> {
        SnippetDraft::new(
            content,
            &self.collection,
            self.name,
            self.keyword,
            self.description,
        )
    }
}

/// Why no suggestion could be obtained.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SuggestionFailure {
    /// AI is turned off or no API key is configured.
    #[error("AI suggestions are disabled (no API key or --no-ai)")]
    Disabled,

    /// The service refused the request with a non-retryable status.
    #[error("request rejected with HTTP {status}: {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Error message from the service
        message: String,
    },

    /// The reply parsed but does not describe a valid snippet.
    #[error("invalid suggestion: {reason}")]
    Invalid {
        /// What failed validation
        reason: String,
    },

    /// Every attempt hit a transient error.
    #[error("gave up after {attempts} attempt(s): {last_error}")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        last_error: String,
    },

    /// The request prompt could not be rendered.
    #[error("could not build request: {message}")]
    Prompt {
        /// Error message
        message: String,
    },
}

impl SuggestionFailure {
    pub(crate) fn prompt(e: &impl fmt::Display) -> Self {
        Self::Prompt {
            message: e.to_string(),
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// Anything that can propose metadata for a snippet.
pub trait Suggest {
    /// Proposes collection, name, keyword and description for `content`.
    ///
    /// # Errors
    ///
    /// Returns a [`SuggestionFailure`] when no valid suggestion is available.
    fn suggest(
        &self,
        content: &str,
        existing_collections: &[String],
    ) -> std::result::Result<Suggestion, SuggestionFailure>;
}

/// Stand-in used when AI is turned off or no API key is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSuggestions;

impl Suggest for NoSuggestions {
    fn suggest(
        &self,
        _content: &str,
        _existing_collections: &[String],
    ) -> std::result::Result<Suggestion, SuggestionFailure> {
        Err(SuggestionFailure::Disabled)
    }
}

/// A single HTTP request to the messages endpoint.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Full endpoint URL
    pub url: String,
    /// Value for the `x-api-key` header
    pub api_key: String,
    /// JSON request body
    pub body: Value,
}

/// Raw HTTP reply.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body text
    pub body: String,
    /// Parsed `retry-after` header, if any
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    /// Creates a response without a `retry-after` header.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }
}

/// A network-level failure (connect, timeout, broken body).
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends requests to the suggestion service.
pub trait Transport {
    /// Performs one request.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if no HTTP response was received.
    fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}

/// Blocking `reqwest` transport with a fixed per-attempt timeout.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Builds the HTTP client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let response = self
            .client
            .post(&request.url)
            .header("x-api-key", &request.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request.body)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().map_err(|e| TransportError(e.to_string()))?;

        Ok(ApiResponse {
            status,
            body,
            retry_after,
        })
    }
}

enum AttemptError {
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },
    Fatal(SuggestionFailure),
}

impl AttemptError {
    fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }
}

/// Suggestion client with bounded retries.
pub struct SuggestionClient {
    transport: Box<dyn Transport>,
    sleep: Box<dyn Fn(Duration)>,
    template: PromptTemplate,
    url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl SuggestionClient {
    /// Creates a client that talks HTTP to the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no API key is set or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Self::with_transport(config, Box::new(transport))
    }

    /// Creates a client with a custom transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no API key is set.
    pub fn with_transport(config: &Config, transport: Box<dyn Transport>) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::config("ANTHROPIC_API_KEY is required for AI suggestions"))?;

        Ok(Self {
            transport,
            sleep: Box::new(std::thread::sleep),
            template: PromptTemplate::new()?,
            url: format!("{}/messages", config.api_base_url),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
        })
    }

    /// Replaces the function used to wait between attempts.
    #[must_use]
    pub fn with_sleep(mut self, sleep: impl Fn(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    fn build_request(
        &self,
        content: &str,
        existing_collections: &[String],
    ) -> std::result::Result<ApiRequest, SuggestionFailure> {
        let prompt = self.template.render(content, existing_collections)?;

        Ok(ApiRequest {
            url: self.url.clone(),
            api_key: self.api_key.clone(),
            body: serde_json::json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "messages": [
                    { "role": "user", "content": prompt }
                ],
            }),
        })
    }

    /// Sends one minimal request to check the key and the endpoint.
    ///
    /// Makes a single attempt without retries. Any 2xx status counts as
    /// reachable; the reply body is not validated.
    ///
    /// # Errors
    ///
    /// Returns [`SuggestionFailure::Rejected`] for a non-2xx status and
    /// [`SuggestionFailure::Exhausted`] when the request cannot be sent.
    pub fn check_connection(&self) -> std::result::Result<(), SuggestionFailure> {
        let request = ApiRequest {
            url: self.url.clone(),
            api_key: self.api_key.clone(),
            body: serde_json::json!({
                "model": self.model,
                "max_tokens": 1,
                "messages": [
                    { "role": "user", "content": "ping" }
                ],
            }),
        };

        let response = self
            .transport
            .send(&request)
            .map_err(|e| SuggestionFailure::Exhausted {
                attempts: 1,
                last_error: format!("network error: {e}"),
            })?;

        match response.status {
            200..=299 => {
                debug!("Connection check succeeded (HTTP {})", response.status);
                Ok(())
            }
            status => Err(SuggestionFailure::Rejected {
                status,
                message: api_error_message(&response.body),
            }),
        }
    }

    /// Delay before retry number `retry` (1-based).
    fn backoff(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let delay = self
            .base_delay
            .saturating_mul(1_u32 << retry.saturating_sub(1).min(6));

        match retry_after {
            Some(hint) => delay.max(hint.min(MAX_RETRY_AFTER)),
            None => delay,
        }
    }

    fn attempt(&self, request: &ApiRequest) -> std::result::Result<Suggestion, AttemptError> {
        let response = self
            .transport
            .send(request)
            .map_err(|e| AttemptError::transient(format!("network error: {e}")))?;

        match response.status {
            200..=299 => {}
            408 | 429 | 500..=599 => {
                return Err(AttemptError::Transient {
                    reason: format!(
                        "HTTP {}: {}",
                        response.status,
                        api_error_message(&response.body)
                    ),
                    retry_after: response.retry_after,
                });
            }
            status => {
                return Err(AttemptError::Fatal(SuggestionFailure::Rejected {
                    status,
                    message: api_error_message(&response.body),
                }));
            }
        }

        let text = reply_text(&response.body).map_err(AttemptError::transient)?;
        let object = extract_json_object(&text)
            .ok_or_else(|| AttemptError::transient("reply contains no JSON object"))?;

        parse_suggestion(object).map_err(AttemptError::Fatal)
    }
}

impl Suggest for SuggestionClient {
    #[instrument(skip_all, fields(collections = existing_collections.len()))]
    fn suggest(
        &self,
        content: &str,
        existing_collections: &[String],
    ) -> std::result::Result<Suggestion, SuggestionFailure> {
        let request = self.build_request(content, existing_collections)?;
        let mut last_error = String::from("no attempt made");
        let mut retry_after = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = self.backoff(attempt - 1, retry_after.take());
                debug!("Waiting {:?} before attempt {}", delay, attempt);
                (self.sleep)(delay);
            }

            debug!("Requesting suggestion (attempt {}/{})", attempt, self.max_attempts);

            match self.attempt(&request) {
                Ok(suggestion) => {
                    info!(
                        "Suggestion received: {} / {} (confidence: {})",
                        suggestion.collection, suggestion.keyword, suggestion.confidence
                    );
                    return Ok(suggestion);
                }
                Err(AttemptError::Transient {
                    reason,
                    retry_after: hint,
                }) => {
                    warn!("Attempt {}/{} failed: {}", attempt, self.max_attempts, reason);
                    last_error = reason;
                    retry_after = hint;
                }
                Err(AttemptError::Fatal(failure)) => {
                    warn!("Suggestion failed: {}", failure);
                    return Err(failure);
                }
            }
        }

        Err(SuggestionFailure::Exhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }
}

#[derive(Deserialize)]
struct RawSuggestion {
    collection: String,
    name: String,
    keyword: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    confidence: Option<String>,
}

/// Extracts the first text block from a messages API reply.
fn reply_text(body: &str) -> std::result::Result<String, String> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("malformed response body: {e}"))?;

    value
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        })
        .and_then(|b| b.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "response has no text content".to_string())
}

/// Finds the first JSON object in free text (bare, fenced, or inside prose).
///
/// Braces that do not open a valid object, such as `{topic}` placeholders in
/// prose, are skipped.
fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let mut stream =
            serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();

        match stream.next()? {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}

fn parse_suggestion(object: Map<String, Value>) -> std::result::Result<Suggestion, SuggestionFailure> {
    let raw: RawSuggestion = serde_json::from_value(Value::Object(object))
        .map_err(|e| SuggestionFailure::invalid(e.to_string()))?;

    let collection = raw.collection.trim().to_string();
    let name = raw.name.trim().to_string();
    let keyword = raw.keyword.trim().to_string();

    if !snippet::is_title_case(&collection) {
        return Err(SuggestionFailure::invalid(format!(
            "collection '{collection}' is not Title Case"
        )));
    }
    if !snippet::is_title_case(&name) {
        return Err(SuggestionFailure::invalid(format!(
            "name '{name}' is not Title Case"
        )));
    }
    if !snippet::is_conventional_keyword(&keyword) {
        return Err(SuggestionFailure::invalid(format!(
            "keyword '{keyword}' does not match the lowercase topic_function convention"
        )));
    }

    let confidence = match raw.confidence.as_deref() {
        None => Confidence::Low,
        Some(value) => Confidence::parse(value).ok_or_else(|| {
            SuggestionFailure::invalid(format!("unknown confidence level '{value}'"))
        })?,
    };

    Ok(Suggestion {
        collection,
        name,
        keyword,
        description: raw.description.unwrap_or_default().trim().to_string(),
        confidence,
    })
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| snippet::preview(body, 200))
}
