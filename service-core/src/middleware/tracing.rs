use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ensure every request carries an `x-request-id` and echo it on the response
/// so callers can correlate log lines across the gateway.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = match req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
        let mut response = next.run(req).await;
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
        response
    } else {
        next.run(req).await
    }
}
