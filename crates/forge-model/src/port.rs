//! The generation port
//!
//! [`GenerationBackend`] is the seam to the external service. [`GenerationPort`]
//! wraps a backend with a cancelling deadline and bounded retry of transient
//! failures. A timed-out call is dropped (which aborts the in-flight request)
//! and reported as [`GenerationError::Timeout`] without retry, so the caller
//! can charge it against its own attempt budget.

use crate::error::GenerationError;
use crate::request::{GenerationParams, GenerationRequest, GenerationResponse, InvokeOptions, RawResponse};
use crate::retry::RetryPolicy;
use std::sync::Arc;

/// A generative text service
#[async_trait::async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Issue one request; no retries, no deadline
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError>;
}

#[derive(Clone)]
pub struct GenerationPort {
    backend: Arc<dyn GenerationBackend>,
    params: GenerationParams,
    retry: RetryPolicy,
}

impl std::fmt::Debug for GenerationPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPort")
            .field("backend", &self.backend.name())
            .field("params", &self.params)
            .field("retry", &self.retry)
            .finish()
    }
}

impl GenerationPort {
    #[must_use]
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            params: GenerationParams::default(),
            retry: RetryPolicy::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[inline]
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Send `prompt` and return the raw text
    ///
    /// # Errors
    /// - [`GenerationError::Timeout`] if one attempt exceeds `options.timeout`
    /// - [`GenerationError::Unavailable`] once `options.max_attempts` transient failures occurred
    /// - [`GenerationError::Rejected`] immediately, never retried
    pub async fn invoke(
        &self,
        prompt: &str,
        options: InvokeOptions,
    ) -> Result<RawResponse, GenerationError> {
        let request = GenerationRequest::new(prompt).with_params(self.params);
        let max_attempts = options.max_attempts.max(1);
        let mut delay = self.retry.initial_delay();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                backend = self.backend.name(),
                attempt,
                prompt_len = prompt.len(),
                "invoking generation backend"
            );

            let outcome =
                match tokio::time::timeout(options.timeout, self.backend.generate(request.clone()))
                    .await
                {
                    Ok(result) => result,
                    Err(_elapsed) => Err(GenerationError::Timeout(options.timeout)),
                };

            match outcome {
                Ok(response) => return Ok(response.into()),
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        backend = self.backend.name(),
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "generation failed with transient error; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = self.retry.next_delay(delay);
                }
                Err(error) => {
                    tracing::warn!(backend = self.backend.name(), attempt, error = %error, "generation failed");
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with the given error for the first `failures` calls
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        error: GenerationError,
    }

    impl Flaky {
        fn new(failures: u32, error: GenerationError) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                failures,
                error,
            })
        }
    }

    #[async_trait::async_trait]
    impl GenerationBackend for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(self.error.clone());
            }
            Ok(GenerationResponse {
                text: format!("echo: {}", request.prompt),
            })
        }
    }

    struct Hanging;

    #[async_trait::async_trait]
    impl GenerationBackend for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, GenerationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(GenerationResponse { text: String::new() })
        }
    }

    fn port(backend: Arc<dyn GenerationBackend>) -> GenerationPort {
        GenerationPort::new(backend).with_retry_policy(RetryPolicy::immediate())
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let backend = Flaky::new(2, GenerationError::Unavailable("503".into()));
        let raw = port(backend.clone())
            .invoke("hello", InvokeOptions::default().with_max_attempts(3))
            .await
            .unwrap();
        assert_eq!(raw.as_str(), "echo: hello");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_stop_at_max_attempts() {
        let backend = Flaky::new(10, GenerationError::Unavailable("429".into()));
        let err = port(backend.clone())
            .invoke("hello", InvokeOptions::default().with_max_attempts(2))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable(_)));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejection_is_never_retried() {
        let backend = Flaky::new(10, GenerationError::Rejected("content policy".into()));
        let err = port(backend.clone())
            .invoke("hello", InvokeOptions::default().with_max_attempts(5))
            .await
            .unwrap_err();
        assert!(err.requires_reformulation());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_calls_once() {
        let backend = Flaky::new(0, GenerationError::Unavailable(String::new()));
        let result = port(backend.clone())
            .invoke("x", InvokeOptions::default().with_max_attempts(0))
            .await;
        assert!(result.is_ok());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out() {
        let err = port(Arc::new(Hanging))
            .invoke("x", InvokeOptions::default().with_timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Timeout(Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_waits_between_attempts() {
        let backend = Flaky::new(2, GenerationError::Unavailable("503".into()));
        let port = GenerationPort::new(backend).with_retry_policy(
            RetryPolicy::default()
                .with_initial_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_secs(1)),
        );
        let started = tokio::time::Instant::now();
        port.invoke("x", InvokeOptions::default()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
    }
}
