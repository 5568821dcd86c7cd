use std::time::Duration;
use thiserror::Error;

/// Reasons a [`RetryOptionsBuilder`](crate::RetryOptionsBuilder) refuses to build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryOptionsError {
    /// More retries were requested than the middleware is willing to perform.
    #[error("max_retries must be at most {limit}, got {requested}")]
    TooManyRetries { requested: u32, limit: u32 },
    /// Either the base delay or the maximum delay was zero.
    #[error("retry delays must be greater than zero")]
    ZeroDelay,
    /// A delay exceeds the hard upper bound for a single wait.
    #[error("retry delay must be at most {limit:?}, got {requested:?}")]
    DelayTooLong { requested: Duration, limit: Duration },
    /// The base delay is larger than the configured cap.
    #[error("base delay {base:?} exceeds the maximum delay {max:?}")]
    BaseAboveMaximum { base: Duration, max: Duration },
}

/// A backoff wait cut short by a cancelled
/// [`CancellationToken`](tokio_util::sync::CancellationToken).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("backoff wait of {requested:?} interrupted by cancellation")]
pub struct WaitInterrupted {
    pub requested: Duration,
}
