//! Retry middleware for [`reqwest_middleware`] that resends requests answered with a transient
//! status: `429 Too Many Requests`, `503 Service Unavailable` or `504 Gateway Timeout`.
//!
//! The wait before each resend honours the server's `Retry-After` header, in seconds or as
//! an HTTP-date. Without one, the wait follows an exponential backoff with random jitter,
//! capped by [`RetryOptions::max_delay`]. Requests whose `POST`, `PUT` or `PATCH` body is a
//! stream are never resent.
//!
//! ```
//! use reqwest_middleware::ClientBuilder;
//! use reqwest_retry_handler::RetryHandlerMiddleware;
//!
//! let client = ClientBuilder::new(reqwest::Client::new())
//!     .with(RetryHandlerMiddleware::default())
//!     .build();
//! ```
mod backoff;
mod decision;
mod error;
mod middleware;
mod options;
mod replay;

pub use backoff::{compute_delay_ms, RetryAfter};
pub use decision::{
    is_transient_status, should_retry, GATEWAY_TIMEOUT, SERVICE_UNAVAILABLE, TOO_MANY_REQUESTS,
    TRANSIENT_STATUS_CODES,
};
pub use error::{RetryOptionsError, WaitInterrupted};
pub use middleware::{RetryHandlerMiddleware, RETRY_AFTER, RETRY_ATTEMPT};
pub use options::{
    InterruptPolicy, Jitter, RetryOptions, RetryOptionsBuilder, ShouldRetry, UniformJitter,
    DEFAULT_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES, MAXIMUM_DELAY,
    MAXIMUM_NUMBER_OF_RETRIES,
};
pub use replay::{body_length, is_replayable};
pub use tokio_util::sync::CancellationToken;
