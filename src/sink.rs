//! Message delivery to the chat, with exponential backoff retry logic.
//!
//! This module provides the outgoing side of the pipeline. It includes
//! automatic retry logic with exponential backoff and jitter so that a rate
//! limit or a flaky connection does not cost an item its one delivery attempt.
//!
//! # Architecture
//!
//! The module uses a trait-based design for flexibility:
//! - [`MessageSink`]: Core trait defining async message delivery
//! - [`TelegramSink`]: Posts to the Telegram Bot API `sendMessage` method
//! - [`RetrySink`]: Decorator that adds retry logic to any `MessageSink` implementation
//!
//! # Retry Strategy
//!
//! - Maximum 3 retry attempts
//! - Exponential backoff starting at 1 second, or the server's `retry_after`
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//! - Client errors other than HTTP 429 are final

use crate::models::ParseMode;
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Identifier the chat assigned to a delivered message.
pub type MessageId = i64;

/// One message to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: ParseMode,
    /// Let the chat render a preview card for the first link.
    pub link_preview: bool,
}

/// Why a send did not happen.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat API error {code}: {description}")]
    Api {
        code: u16,
        description: String,
        /// Seconds the server asked us to wait before retrying.
        retry_after: Option<u64>,
    },
}

impl SendError {
    /// Whether trying the same message again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SendError::Transport(_) => true,
            SendError::Api { code, .. } => *code == 429 || *code >= 500,
        }
    }

    /// Server-requested wait, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SendError::Api {
                retry_after: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Trait for async message delivery.
///
/// Implementors deliver one message and return the chat's message id.
pub trait MessageSink {
    /// Deliver `message`.
    async fn send(&self, message: &OutgoingMessage) -> Result<MessageId, SendError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`MessageSink`] implementation.
///
/// # Backoff Strategy
///
/// The delay between retries follows this formula, unless the server sent
/// `retry_after`, which is used instead:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetrySink<T> {
    /// The underlying sink to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: Duration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: Duration,
}

impl<T> RetrySink<T>
where
    T: MessageSink,
{
    /// Create a new retry wrapper around an existing [`MessageSink`] implementation.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let sink = RetrySink::new(TelegramSink::new(client, base, &token), 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize, e: &SendError) -> Duration {
        if let Some(wait) = e.retry_after() {
            return wait.min(self.max_delay);
        }
        let shift = (attempt - 1).min(16) as u32;
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetrySink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetrySink")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> MessageSink for RetrySink<T>
where
    T: MessageSink,
{
    #[instrument(level = "debug", skip_all, fields(chat_id = %message.chat_id))]
    async fn send(&self, message: &OutgoingMessage) -> Result<MessageId, SendError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.send(message).await {
                Ok(id) => return Ok(id),
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;

                    if !e.is_retryable() || attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            retryable = e.is_retryable(),
                            elapsed_ms_total,
                            error = %e,
                            "send() giving up"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt, &e);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "send() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Telegram Bot API client implementing [`MessageSink`].
#[derive(Clone)]
pub struct TelegramSink {
    client: reqwest::Client,
    endpoint: String,
}

impl TelegramSink {
    /// Sink posting to `{api_base}/bot{token}/sendMessage`.
    pub fn new(client: reqwest::Client, api_base: &str, token: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", api_base.trim_end_matches('/'), token),
        }
    }
}

// The endpoint embeds the bot token, keep it out of logs.
impl fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSink").finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    link_preview_options: LinkPreviewOptions,
}

#[derive(Debug, Serialize)]
struct LinkPreviewOptions {
    is_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<SentMessage>,
    description: Option<String>,
    error_code: Option<u16>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: MessageId,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl<'a> SendMessageRequest<'a> {
    fn from_message(message: &'a OutgoingMessage) -> Self {
        Self {
            chat_id: &message.chat_id,
            text: &message.text,
            parse_mode: message.parse_mode.as_api_str(),
            link_preview_options: LinkPreviewOptions {
                is_disabled: !message.link_preview,
            },
        }
    }
}

/// Turn a `sendMessage` reply into a message id or a [`SendError`].
fn interpret_response(status: u16, body: &str) -> Result<MessageId, SendError> {
    match serde_json::from_str::<ApiResponse>(body) {
        Ok(ApiResponse {
            ok: true,
            result: Some(sent),
            ..
        }) => Ok(sent.message_id),
        Ok(reply) => Err(SendError::Api {
            code: reply.error_code.unwrap_or(status),
            description: reply
                .description
                .unwrap_or_else(|| "no description".to_string()),
            retry_after: reply.parameters.and_then(|p| p.retry_after),
        }),
        Err(_) => Err(SendError::Api {
            code: status,
            description: truncate_for_log(body, 200),
            retry_after: None,
        }),
    }
}

impl MessageSink for TelegramSink {
    #[instrument(level = "debug", skip_all, fields(chat_id = %message.chat_id, chars = message.text.chars().count()))]
    async fn send(&self, message: &OutgoingMessage) -> Result<MessageId, SendError> {
        let t0 = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessageRequest::from_message(message))
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        let res = interpret_response(status, &body);
        match &res {
            Ok(id) => debug!(message_id = *id, elapsed_ms = t0.elapsed().as_millis() as u64, "Delivered message"),
            Err(e) => warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "sendMessage failed"),
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;

    fn message() -> OutgoingMessage {
        OutgoingMessage {
            chat_id: "@news".into(),
            text: "<b>hi</b>".into(),
            parse_mode: ParseMode::Html,
            link_preview: false,
        }
    }

    #[test]
    fn test_request_serialization() {
        let msg = message();
        let json = serde_json::to_value(SendMessageRequest::from_message(&msg)).unwrap();
        assert_eq!(json["chat_id"], "@news");
        assert_eq!(json["parse_mode"], "HTML");
        assert_eq!(json["link_preview_options"]["is_disabled"], true);
    }

    #[test]
    fn test_plain_mode_omits_parse_mode() {
        let mut msg = message();
        msg.parse_mode = ParseMode::Plain;
        let json = serde_json::to_value(SendMessageRequest::from_message(&msg)).unwrap();
        assert!(json.get("parse_mode").is_none());
    }

    #[test]
    fn test_interpret_success() {
        let body = r#"{"ok":true,"result":{"message_id":42,"date":0}}"#;
        assert_eq!(interpret_response(200, body).unwrap(), 42);
    }

    #[test]
    fn test_interpret_rate_limit() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 5","parameters":{"retry_after":5}}"#;
        let err = interpret_response(429, body).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_interpret_bad_request_is_final() {
        let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: can't parse entities"}"#;
        let err = interpret_response(400, body).unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("can't parse entities"));
    }

    #[test]
    fn test_interpret_non_json_body() {
        let err = interpret_response(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_debug_hides_token() {
        let sink = TelegramSink::new(reqwest::Client::new(), "https://api.telegram.org/", "123:SECRET");
        assert!(sink.endpoint.ends_with("/bot123:SECRET/sendMessage"));
        assert!(!format!("{sink:?}").contains("SECRET"));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let inner = RecordingSink::default();
        inner.fail_next(SendError::Api {
            code: 500,
            description: "flaky".into(),
            retry_after: None,
        });
        let sink = RetrySink::new(inner, 3, Duration::ZERO);
        assert!(sink.send(&message()).await.is_ok());
        assert_eq!(sink.inner.attempts(), 2);
        assert_eq!(sink.inner.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_stops_on_client_error() {
        let inner = RecordingSink::default();
        inner.fail_next(SendError::Api {
            code: 400,
            description: "bad".into(),
            retry_after: None,
        });
        let sink = RetrySink::new(inner, 3, Duration::ZERO);
        assert!(sink.send(&message()).await.is_err());
        assert_eq!(sink.inner.attempts(), 1);
        assert!(sink.inner.sent().is_empty());
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let inner = RecordingSink::default();
        for _ in 0..5 {
            inner.fail_next(SendError::Api {
                code: 503,
                description: "down".into(),
                retry_after: None,
            });
        }
        let sink = RetrySink::new(inner, 2, Duration::ZERO);
        assert!(sink.send(&message()).await.is_err());
        assert_eq!(sink.inner.attempts(), 3);
    }
}
