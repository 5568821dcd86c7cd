//! Wait computation between two sends of the same request.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use http::header::RETRY_AFTER;
use http::HeaderMap;
use reqwest::Response;

use crate::options::RetryOptions;

const MILLIS_PER_SECOND: f64 = 1000.0;

/// A parsed `Retry-After` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAfter {
    /// `Retry-After: 120`
    Delay(Duration),
    /// `Retry-After: Wed, 21 Oct 2015 07:28:00 GMT`
    At(DateTime<Utc>),
}

impl RetryAfter {
    /// Parse a header value, returning `None` for anything that is neither a non-negative
    /// number of seconds nor an HTTP-date.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Ok(seconds) = value.parse::<u64>() {
            return Some(RetryAfter::Delay(Duration::from_secs(seconds)));
        }
        parse_http_date(value).map(RetryAfter::At)
    }

    /// Read the hint from response headers. Malformed values are ignored.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::parse)
    }

    /// How long to wait, as seen from `now`. Dates in the past mean no wait at all.
    pub fn delay_from(&self, now: DateTime<Utc>) -> Duration {
        match self {
            RetryAfter::Delay(delay) => *delay,
            RetryAfter::At(at) => (*at - now).to_std().unwrap_or(Duration::ZERO),
        }
    }
}

// IMF-fixdate first, then the obsolete RFC 850 and asctime forms, then RFC 2822.
fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDateTime::parse_from_str(value, "%a, %d %b %Y %H:%M:%S GMT") {
        return Some(date.and_utc());
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(value, "%A, %d-%b-%y %H:%M:%S GMT") {
        return Some(date.and_utc());
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(value, "%a %b %e %H:%M:%S %Y") {
        return Some(date.and_utc());
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Milliseconds to wait before sending attempt `attempt + 1`.
///
/// A `Retry-After` hint on the response wins and is used without jitter. Otherwise the
/// wait is `base + jitter` seconds for the first attempt and
/// `(2^attempt - 1) / 2 + base + jitter` seconds afterwards. Either way the result never
/// exceeds [`RetryOptions::max_delay`].
pub fn compute_delay_ms(response: &Response, options: &RetryOptions, attempt: u32) -> u64 {
    compute_delay_ms_at(response.headers(), options, attempt, Utc::now())
}

pub(crate) fn compute_delay_ms_at(
    headers: &HeaderMap,
    options: &RetryOptions,
    attempt: u32,
    now: DateTime<Utc>,
) -> u64 {
    let delay = match RetryAfter::from_headers(headers) {
        Some(hint) => hint.delay_from(now),
        None => Duration::from_millis(exponential_delay_ms(
            options.base_delay(),
            attempt,
            options.jitter(),
        )),
    };
    // Capped before narrowing, the cap is at most three minutes.
    delay.min(options.max_delay()).as_millis() as u64
}

fn exponential_delay_ms(base_delay: Duration, attempt: u32, jitter: f64) -> u64 {
    let base = base_delay.as_secs_f64();
    let exponential = (2f64.powi(attempt as i32) - 1.0) * 0.5;
    let seconds = if attempt < 2 {
        base + jitter
    } else {
        exponential + base + jitter
    };
    (seconds * MILLIS_PER_SECOND) as u64
}
