use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tracing::{info, warn};

use quill_core::config::{ModelConfig, RetryConfig};
use quill_core::error::{QuillError, Result};
use quill_core::traits::LlmClient;
use quill_core::types::*;

/// An LLM client that retries failed requests and falls back to alternative models.
///
/// Only the request phase is retried; once a stream is handed out, mid-stream
/// failures surface to the caller.
pub struct RetryingClient {
    primary: Box<dyn LlmClient>,
    fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(
        primary: Box<dyn LlmClient>,
        fallbacks: Vec<(ModelConfig, Box<dyn LlmClient>)>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            retry_config,
        }
    }
}

fn is_retryable(e: &QuillError) -> bool {
    match e {
        QuillError::LlmRequest(msg) => {
            ["429", "500", "502", "503", "529", "timeout", "connection"]
                .iter()
                .any(|needle| msg.contains(needle))
        }
        QuillError::LlmStream(_) => true,
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let ms = config
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt))
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl LlmClient for RetryingClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;

            let mut last_err = None;
            for attempt in 0..=max_retries {
                match self
                    .primary
                    .chat_stream(&config, messages.clone(), &tools)
                    .await
                {
                    Ok(stream) => return Ok(stream),
                    Err(e) if is_retryable(&e) && attempt < max_retries => {
                        let backoff = calculate_backoff(attempt, &self.retry_config);
                        warn!(
                            attempt = attempt + 1,
                            max_retries,
                            backoff_ms = backoff.as_millis() as u64,
                            error = %e,
                            "Retrying LLM request"
                        );
                        tokio::time::sleep(backoff).await;
                        last_err = Some(e);
                    }
                    Err(e) => {
                        last_err = Some(e);
                        break;
                    }
                }
            }

            if !self.fallbacks.is_empty() {
                info!("Primary LLM exhausted, trying fallback models");
            }
            for (fb_config, fb_client) in &self.fallbacks {
                match fb_client
                    .chat_stream(fb_config, messages.clone(), &tools)
                    .await
                {
                    Ok(stream) => {
                        info!(
                            model = %fb_config.model_id,
                            provider = %fb_config.provider,
                            "Fell back to alternative model"
                        );
                        return Ok(stream);
                    }
                    Err(e) => {
                        warn!(model = %fb_config.model_id, error = %e, "Fallback model also failed");
                    }
                }
            }

            Err(last_err.unwrap_or_else(|| QuillError::LlmRequest("All providers failed".into())))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::StreamExt;

    /// Fails with the given error `failures` times, then yields one text delta.
    struct Flaky {
        calls: Arc<AtomicUsize>,
        failures: usize,
        error: fn() -> QuillError,
    }

    impl LlmClient for Flaky {
        fn chat_stream(
            &self,
            _config: &ModelConfig,
            _messages: Vec<ChatMessage>,
            _tools: &[ToolDefinition],
        ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst);
                if n < self.failures {
                    return Err((self.error)());
                }
                let items = vec![Ok(StreamDelta::TextDelta("hi".into()))];
                Ok(futures::stream::iter(items).boxed())
            })
        }
    }

    fn model() -> ModelConfig {
        ModelConfig {
            provider: "anthropic".into(),
            model_id: "m".into(),
            api_key: None,
            base_url: None,
            max_tokens: 16,
            temperature: 0.0,
            retry: None,
        }
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
        }
    }

    #[test]
    fn retryable_classification() {
        assert!(is_retryable(&QuillError::LlmRequest("HTTP 529: overloaded".into())));
        assert!(is_retryable(&QuillError::LlmStream("reset".into())));
        assert!(!is_retryable(&QuillError::LlmRequest("HTTP 400: bad".into())));
        assert!(!is_retryable(&QuillError::Config("no key".into())));
    }

    #[test]
    fn backoff_is_capped() {
        let cfg = RetryConfig {
            max_retries: 10,
            initial_backoff_ms: 1000,
            max_backoff_ms: 4000,
        };
        let d = calculate_backoff(8, &cfg);
        assert!(d <= Duration::from_millis(4800));
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = RetryingClient::new(
            Box::new(Flaky {
                calls: calls.clone(),
                failures: 2,
                error: || QuillError::LlmRequest("HTTP 503".into()),
            }),
            vec![],
            fast_retry(3),
        );
        let mut stream = client.chat_stream(&model(), vec![], &[]).await.unwrap();
        assert!(matches!(stream.next().await, Some(Ok(StreamDelta::TextDelta(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_goes_to_fallback() {
        let primary_calls = Arc::new(AtomicUsize::new(0));
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let client = RetryingClient::new(
            Box::new(Flaky {
                calls: primary_calls.clone(),
                failures: usize::MAX,
                error: || QuillError::LlmRequest("HTTP 401".into()),
            }),
            vec![(
                model(),
                Box::new(Flaky {
                    calls: fallback_calls.clone(),
                    failures: 0,
                    error: || QuillError::LlmRequest("unused".into()),
                }) as Box<dyn LlmClient>,
            )],
            fast_retry(3),
        );
        assert!(client.chat_stream(&model(), vec![], &[]).await.is_ok());
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_returns_last_error() {
        let client = RetryingClient::new(
            Box::new(Flaky {
                calls: Arc::new(AtomicUsize::new(0)),
                failures: usize::MAX,
                error: || QuillError::LlmRequest("HTTP 500".into()),
            }),
            vec![],
            fast_retry(1),
        );
        match client.chat_stream(&model(), vec![], &[]).await {
            Err(QuillError::LlmRequest(msg)) => assert_eq!(msg, "HTTP 500"),
            _ => panic!("expected the primary's error"),
        };
    }
}
