//! `RetryHandlerMiddleware` resends requests that were answered with a transient status.

use std::time::Duration;

use http::header::HeaderName;
use http::{Extensions, HeaderValue};
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::backoff::compute_delay_ms;
use crate::decision::should_retry;
use crate::error::WaitInterrupted;
use crate::options::{InterruptPolicy, RetryOptions};

/// Added to every resent request, carrying the number of sends that preceded it.
pub const RETRY_ATTEMPT: HeaderName = HeaderName::from_static("retry-attempt");
pub use http::header::RETRY_AFTER;

/// `RetryHandlerMiddleware` resends requests answered with `429`, `503` or `504`,
/// waiting between sends for as long as the server asks through `Retry-After`, or
/// following an exponential backoff with jitter when it does not.
///
/// Sends within one exchange are strictly sequential. The response that triggered a
/// retry is dropped before the next send; only the last response reaches the caller.
///
/// Two request extensions change the behaviour for a single request:
/// * a [`RetryOptions`] replaces the middleware's options
/// * a [`CancellationToken`] cuts backoff waits short, see [`InterruptPolicy`]
///
///```rust
///     use reqwest_middleware::ClientBuilder;
///     use reqwest_retry_handler::{RetryHandlerMiddleware, RetryOptions};
///     use reqwest::Client;
///     use std::time::Duration;
///
///     let options = RetryOptions::builder()
///         .max_retries(5)
///         .base_delay(Duration::from_secs(1))
///         .max_delay(Duration::from_secs(30))
///         .build()
///         .unwrap();
///
///     let retry_middleware = RetryHandlerMiddleware::new(options);
///     let client = ClientBuilder::new(Client::new()).with(retry_middleware).build();
///```
#[derive(Debug, Clone, Default)]
pub struct RetryHandlerMiddleware {
    options: RetryOptions,
}

impl RetryHandlerMiddleware {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// The options used when a request carries no override.
    pub fn options(&self) -> &RetryOptions {
        &self.options
    }
}

#[async_trait::async_trait]
impl Middleware for RetryHandlerMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let options = extensions
            .get::<RetryOptions>()
            .cloned()
            .unwrap_or_else(|| self.options.clone());
        let cancellation = extensions.get::<CancellationToken>().cloned();
        self.execute_with_retry(req, next, extensions, &options, cancellation.as_ref())
            .await
    }
}

impl RetryHandlerMiddleware {
    async fn execute_with_retry<'a>(
        &'a self,
        mut req: Request,
        next: Next<'a>,
        ext: &'a mut Extensions,
        options: &RetryOptions,
        cancellation: Option<&CancellationToken>,
    ) -> Result<Response> {
        let mut attempt: u32 = 1;
        loop {
            // Cloning up front is cheap for buffered bodies, which share their bytes.
            let duplicate_request = req.try_clone();

            let response = next.clone().run(req, ext).await?;

            let Some(mut duplicate_request) = duplicate_request else {
                tracing::debug!("Request is not clonable, returning the response without retrying");
                return Ok(response);
            };

            if !should_retry(&response, attempt, &duplicate_request, options) {
                return Ok(response);
            }

            let duration = Duration::from_millis(compute_delay_ms(&response, options, attempt));
            tracing::warn!(
                status = response.status().as_u16(),
                "Retry attempt #{}. Sleeping {:?} before the next attempt",
                attempt,
                duration
            );
            if let Err(cause) = wait(duration, cancellation).await {
                tracing::error!(
                    attempt,
                    policy = ?options.on_interrupt(),
                    error = &cause as &(dyn std::error::Error + 'static),
                    "Error retrying the request"
                );
                if options.on_interrupt() == InterruptPolicy::Abort {
                    return Ok(response);
                }
            }

            // Release the superseded response before the next send.
            drop(response);

            duplicate_request
                .headers_mut()
                .insert(RETRY_ATTEMPT, HeaderValue::from(attempt));
            attempt += 1;
            req = duplicate_request;
        }
    }
}

/// Sleeps for `duration` unless `cancellation` fires first.
async fn wait(
    duration: Duration,
    cancellation: Option<&CancellationToken>,
) -> std::result::Result<(), WaitInterrupted> {
    match cancellation {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(WaitInterrupted { requested: duration }),
            _ = sleep(duration) => Ok(()),
        },
        None => {
            sleep(duration).await;
            Ok(())
        }
    }
}
