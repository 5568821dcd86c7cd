use reqwest::{Body, Method, Request};

/// Whether `request` can be sent again without losing part of its payload.
///
/// Only `POST`, `PUT` and `PATCH` bodies are inspected. Those are replayable when they have
/// no body or when the body length is known up front, i.e. the payload is buffered in
/// memory. A forward-only stream yields `false`, and the response is handed back without
/// a retry.
pub fn is_replayable(request: &Request) -> bool {
    let carries_payload = matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH
    );
    match request.body() {
        Some(body) if carries_payload => body_length(body).is_some(),
        _ => true,
    }
}

/// Length of a buffered body, `None` when the length cannot be known without
/// consuming the body.
pub fn body_length(body: &Body) -> Option<u64> {
    body.as_bytes().map(|bytes| bytes.len() as u64)
}
