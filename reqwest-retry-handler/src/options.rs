//! Configuration for [`RetryHandlerMiddleware`](crate::RetryHandlerMiddleware).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Request, Response};

use crate::error::RetryOptionsError;

/// Number of retries performed when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Base delay used by the exponential backoff when none is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);
/// Upper bound for a single wait when none is configured.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(180);

/// We refuse to retry a single exchange more than `10` times.
pub const MAXIMUM_NUMBER_OF_RETRIES: u32 = 10;
/// Neither the base delay nor the cap may exceed three minutes.
pub const MAXIMUM_DELAY: Duration = Duration::from_secs(180);

/// Caller supplied veto over an otherwise eligible retry.
///
/// The predicate is consulted last, after the status code, attempt budget and body
/// replayability have all been accepted. It receives the configured base delay, the
/// 1-based attempt number, the request that would be resent and the response that
/// triggered the retry.
///
/// Any closure with the same signature implements this trait:
///
/// ```
/// use reqwest::{Method, Request, Response};
/// use reqwest_retry_handler::RetryOptions;
/// use std::time::Duration;
///
/// // Never resend a POST.
/// let options = RetryOptions::builder()
///     .should_retry(|_: Duration, _: u32, request: &Request, _: &Response| {
///         request.method() != Method::POST
///     })
///     .build()
///     .unwrap();
/// ```
pub trait ShouldRetry: Send + Sync + 'static {
    fn should_retry(
        &self,
        delay: Duration,
        attempt: u32,
        request: &Request,
        response: &Response,
    ) -> bool;
}

impl<F> ShouldRetry for F
where
    F: Fn(Duration, u32, &Request, &Response) -> bool + Send + Sync + 'static,
{
    fn should_retry(
        &self,
        delay: Duration,
        attempt: u32,
        request: &Request,
        response: &Response,
    ) -> bool {
        (self)(delay, attempt, request, response)
    }
}

/// Source of the random term added to the exponential backoff.
///
/// Samples should lie in `[0, 1)`. Values outside that range are clamped into it and
/// `NaN` counts as zero.
pub trait Jitter: Send + Sync + 'static {
    fn sample(&self) -> f64;
}

impl<F> Jitter for F
where
    F: Fn() -> f64 + Send + Sync + 'static,
{
    fn sample(&self) -> f64 {
        (self)()
    }
}

/// The default [`Jitter`]: a uniform sample from the thread-local generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformJitter;

impl Jitter for UniformJitter {
    fn sample(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// What to do when the backoff wait is cut short by a cancelled
/// [`CancellationToken`](tokio_util::sync::CancellationToken).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterruptPolicy {
    /// Log the interruption and resend immediately. Later waits in the same exchange
    /// are skipped as well since the token stays cancelled.
    #[default]
    Resend,
    /// Log the interruption and hand the last response back to the caller.
    Abort,
}

/// Immutable retry configuration.
///
/// Build one with [`RetryOptions::builder`], or use [`RetryOptions::default`] for
/// three retries, a three second base delay and a three minute cap.
///
/// A `RetryOptions` inserted into the request extensions overrides the middleware's own
/// options for that single request:
///
/// ```no_run
/// use reqwest_middleware::ClientBuilder;
/// use reqwest_retry_handler::{RetryHandlerMiddleware, RetryOptions};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ClientBuilder::new(reqwest::Client::new())
///     .with(RetryHandlerMiddleware::default())
///     .build();
///
/// let no_retries = RetryOptions::builder().max_retries(0).build()?;
/// client
///     .get("https://example.com")
///     .with_extension(no_retries)
///     .send()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RetryOptions {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    should_retry: Arc<dyn ShouldRetry>,
    jitter: Arc<dyn Jitter>,
    on_interrupt: InterruptPolicy,
}

impl RetryOptions {
    pub fn builder() -> RetryOptionsBuilder {
        RetryOptionsBuilder::default()
    }

    /// How many times a request may be resent after the first send.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Cap applied to every computed wait, including server supplied hints.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn on_interrupt(&self) -> InterruptPolicy {
        self.on_interrupt
    }

    pub(crate) fn predicate(&self) -> &dyn ShouldRetry {
        self.should_retry.as_ref()
    }

    /// A jitter sample forced into `[0, 1)`, with `NaN` read as zero.
    pub(crate) fn jitter(&self) -> f64 {
        let sample = self.jitter.sample();
        if sample.is_nan() {
            0.0
        } else {
            sample.clamp(0.0, 1.0 - f64::EPSILON)
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        RetryOptions {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            should_retry: Arc::new(always_retry),
            jitter: Arc::new(UniformJitter),
            on_interrupt: InterruptPolicy::default(),
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // skipping the predicate and jitter source
        f.debug_struct("RetryOptions")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("on_interrupt", &self.on_interrupt)
            .finish_non_exhaustive()
    }
}

fn always_retry(_: Duration, _: u32, _: &Request, _: &Response) -> bool {
    true
}

/// Builds a validated [`RetryOptions`].
#[must_use = "RetryOptionsBuilder does nothing until you call `build`"]
pub struct RetryOptionsBuilder {
    options: RetryOptions,
}

impl Default for RetryOptionsBuilder {
    fn default() -> Self {
        RetryOptionsBuilder {
            options: RetryOptions::default(),
        }
    }
}

impl RetryOptionsBuilder {
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.options.max_retries = max_retries;
        self
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.options.base_delay = base_delay;
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.options.max_delay = max_delay;
        self
    }

    /// Replace the default always-true predicate.
    pub fn should_retry<S: ShouldRetry>(mut self, should_retry: S) -> Self {
        self.options.should_retry = Arc::new(should_retry);
        self
    }

    /// Replace the random source of the backoff jitter, e.g. with a constant in tests.
    pub fn jitter<J: Jitter>(mut self, jitter: J) -> Self {
        self.options.jitter = Arc::new(jitter);
        self
    }

    pub fn on_interrupt(mut self, on_interrupt: InterruptPolicy) -> Self {
        self.options.on_interrupt = on_interrupt;
        self
    }

    pub fn build(self) -> Result<RetryOptions, RetryOptionsError> {
        let options = self.options;
        if options.max_retries > MAXIMUM_NUMBER_OF_RETRIES {
            return Err(RetryOptionsError::TooManyRetries {
                requested: options.max_retries,
                limit: MAXIMUM_NUMBER_OF_RETRIES,
            });
        }
        if options.base_delay.is_zero() || options.max_delay.is_zero() {
            return Err(RetryOptionsError::ZeroDelay);
        }
        for delay in [options.base_delay, options.max_delay] {
            if delay > MAXIMUM_DELAY {
                return Err(RetryOptionsError::DelayTooLong {
                    requested: delay,
                    limit: MAXIMUM_DELAY,
                });
            }
        }
        if options.base_delay > options.max_delay {
            return Err(RetryOptionsError::BaseAboveMaximum {
                base: options.base_delay,
                max: options.max_delay,
            });
        }
        Ok(options)
    }
}
