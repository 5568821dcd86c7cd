use paste::paste;
use reqwest::{Body, StatusCode};
use reqwest_retry_handler::{CancellationToken, InterruptPolicy, RetryOptions};
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::helpers::{client, fast_options, never_retry, slow_options, RetryResponder};

macro_rules! assert_retry_succeeds_inner {
    ($x:tt, $name:ident, $status:expr, $retry:tt, $exact:tt, $responder:expr) => {
        #[tokio::test]
        async fn $name() {
            let server = MockServer::start().await;
            let retry_amount: u32 = $retry;
            Mock::given(method("GET"))
                .and(path("/foo"))
                .respond_with($responder)
                .expect($exact)
                .mount(&server)
                .await;

            let client = client(fast_options(retry_amount));

            let resp = client
                .get(&format!("{}/foo", server.uri()))
                .send()
                .await
                .expect("call failed");

            assert_eq!(resp.status(), $status);
        }
    };
}

macro_rules! assert_retry_succeeds {
    ($x:tt, $status:expr) => {
        paste! {
            assert_retry_succeeds_inner!($x, [<assert_retry_succeeds_on_ $x>], $status, 3, 3, RetryResponder::new(2_u32, $x));
        }
    };
}

macro_rules! assert_no_retry {
    ($x:tt, $status:expr) => {
        paste! {
            assert_retry_succeeds_inner!($x, [<assert_no_retry_on_ $x>], $status, 3, 1, ResponseTemplate::new($x));
        }
    };
}

// Transient.
assert_retry_succeeds!(429, StatusCode::OK);
assert_retry_succeeds!(503, StatusCode::OK);
assert_retry_succeeds!(504, StatusCode::OK);

// 2xx.
assert_no_retry!(200, StatusCode::OK);
assert_no_retry!(201, StatusCode::CREATED);
assert_no_retry!(204, StatusCode::NO_CONTENT);

// 4xx.
assert_no_retry!(400, StatusCode::BAD_REQUEST);
assert_no_retry!(401, StatusCode::UNAUTHORIZED);
assert_no_retry!(404, StatusCode::NOT_FOUND);
assert_no_retry!(408, StatusCode::REQUEST_TIMEOUT);
assert_no_retry!(409, StatusCode::CONFLICT);

// 5xx other than 503 and 504.
assert_no_retry!(500, StatusCode::INTERNAL_SERVER_ERROR);
assert_no_retry!(501, StatusCode::NOT_IMPLEMENTED);
assert_no_retry!(502, StatusCode::BAD_GATEWAY);
assert_no_retry!(505, StatusCode::HTTP_VERSION_NOT_SUPPORTED);

// With a budget of 3 retries we expect 4 sends and the last failure handed back.
assert_retry_succeeds_inner!(
    429,
    assert_maximum_retries_is_not_exceeded,
    StatusCode::TOO_MANY_REQUESTS,
    3,
    4,
    ResponseTemplate::new(429)
);

// No retries configured means a single send whatever the status.
assert_retry_succeeds_inner!(
    503,
    assert_zero_retries_sends_once,
    StatusCode::SERVICE_UNAVAILABLE,
    0,
    1,
    ResponseTemplate::new(503)
);

#[tokio::test]
async fn assert_retry_attempt_header_is_added_on_resend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foo"))
        .respond_with(RetryResponder::new(2, 503))
        .expect(3)
        .mount(&server)
        .await;

    let resp = client(fast_options(3))
        .get(&format!("{}/foo", server.uri()))
        .send()
        .await
        .expect("call failed");
    assert_eq!(resp.status(), 200);

    let requests = server.received_requests().await.unwrap();
    let attempts: Vec<Option<String>> = requests
        .iter()
        .map(|req| {
            let values: Vec<&str> = req
                .headers
                .get_all("retry-attempt")
                .iter()
                .map(|value| value.to_str().unwrap())
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(values.join(","))
            }
        })
        .collect();
    assert_eq!(
        attempts,
        vec![None, Some("1".to_string()), Some("2".to_string())]
    );
}

#[tokio::test]
async fn assert_retry_after_header_overrides_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foo"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/foo"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    // A minute of backoff would time the test out, the header asks for none.
    let resp = tokio::time::timeout(
        Duration::from_secs(10),
        client(slow_options(3))
            .get(&format!("{}/foo", server.uri()))
            .send(),
    )
    .await
    .expect("Retry-After was not honoured")
    .expect("call failed");

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn assert_buffered_post_body_is_resent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/foo"))
        .respond_with(RetryResponder::new(1, 504))
        .expect(2)
        .mount(&server)
        .await;

    let resp = client(fast_options(3))
        .post(&format!("{}/foo", server.uri()))
        .body("payload")
        .send()
        .await
        .expect("call failed");
    assert_eq!(resp.status(), 200);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    for request in requests {
        assert_eq!(request.body, b"payload");
    }
}

#[tokio::test]
async fn assert_streaming_post_body_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/foo"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let chunks: Vec<Result<&'static str, std::io::Error>> = vec![Ok("pay"), Ok("load")];
    let resp = client(fast_options(3))
        .post(&format!("{}/foo", server.uri()))
        .body(Body::wrap_stream(futures::stream::iter(chunks)))
        .send()
        .await
        .expect("call failed");

    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn assert_predicate_can_veto_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foo"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let options = RetryOptions::builder()
        .base_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(20))
        .should_retry(never_retry)
        .build()
        .unwrap();

    let resp = client(options)
        .get(&format!("{}/foo", server.uri()))
        .send()
        .await
        .expect("call failed");

    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn assert_request_options_override_middleware_options() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foo"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client(fast_options(3))
        .get(&format!("{}/foo", server.uri()))
        .with_extension(fast_options(0))
        .send()
        .await
        .expect("call failed");

    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn assert_interrupted_wait_still_resends() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foo"))
        .respond_with(RetryResponder::new(2, 503))
        .expect(3)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    // Every wait is skipped since the token stays cancelled for the whole exchange.
    let resp = tokio::time::timeout(
        Duration::from_secs(10),
        client(slow_options(3))
            .get(&format!("{}/foo", server.uri()))
            .with_extension(token)
            .send(),
    )
    .await
    .expect("wait was not interrupted")
    .expect("call failed");

    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn assert_interrupted_wait_aborts_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/foo"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let options = RetryOptions::builder()
        .base_delay(Duration::from_secs(60))
        .max_delay(Duration::from_secs(120))
        .on_interrupt(InterruptPolicy::Abort)
        .build()
        .unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let resp = tokio::time::timeout(
        Duration::from_secs(10),
        client(options)
            .get(&format!("{}/foo", server.uri()))
            .with_extension(token)
            .send(),
    )
    .await
    .expect("wait was not interrupted")
    .expect("call failed");

    assert_eq!(resp.status(), 503);
}

#[tokio::test]
async fn assert_transport_errors_are_not_retried() {
    // Grab a free port and release it so nothing is listening there.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = client(fast_options(3))
        .get(&format!("http://127.0.0.1:{}/foo", port))
        .send()
        .await;

    assert!(result.is_err());
}
