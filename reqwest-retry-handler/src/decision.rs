use http::StatusCode;
use reqwest::{Request, Response};

use crate::options::RetryOptions;
use crate::replay::is_replayable;

/// 429, the server is throttling us.
pub const TOO_MANY_REQUESTS: StatusCode = StatusCode::TOO_MANY_REQUESTS;
/// 503, the server is temporarily overloaded or down for maintenance.
pub const SERVICE_UNAVAILABLE: StatusCode = StatusCode::SERVICE_UNAVAILABLE;
/// 504, an upstream of the server did not answer in time.
pub const GATEWAY_TIMEOUT: StatusCode = StatusCode::GATEWAY_TIMEOUT;

/// Every status the middleware considers worth retrying.
pub const TRANSIENT_STATUS_CODES: [StatusCode; 3] =
    [TOO_MANY_REQUESTS, SERVICE_UNAVAILABLE, GATEWAY_TIMEOUT];

pub fn is_transient_status(status: StatusCode) -> bool {
    TRANSIENT_STATUS_CODES.contains(&status)
}

/// Decide whether `request` should be sent again after receiving `response` on the
/// `attempt`-th send.
///
/// A retry is granted only when all of these hold:
/// * `attempt` is at most [`RetryOptions::max_retries`]
/// * the status is one of [`TRANSIENT_STATUS_CODES`]
/// * the request body can be replayed, see [`is_replayable`]
/// * the configured [`ShouldRetry`](crate::ShouldRetry) predicate agrees
///
/// This function never sleeps; waiting is left to the middleware.
pub fn should_retry(
    response: &Response,
    attempt: u32,
    request: &Request,
    options: &RetryOptions,
) -> bool {
    attempt <= options.max_retries()
        && is_transient_status(response.status())
        && is_replayable(request)
        && options
            .predicate()
            .should_retry(options.base_delay(), attempt, request, response)
}
