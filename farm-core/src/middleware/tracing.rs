//! Request correlation. Every response carries an `x-request-id`; a
//! well-formed caller-supplied id is propagated, anything else is replaced.

use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = incoming_request_id(&req).unwrap_or_else(Uuid::new_v4);

    // A hyphenated UUID is always a valid header value.
    let value = HeaderValue::from_str(&request_id.to_string()).ok();

    if let Some(value) = &value {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    let mut response = next.run(req).await;

    if let Some(value) = value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

/// Only a well-formed UUID from the caller is trusted; junk or oversized
/// values are discarded so log correlation ids stay uniform.
fn incoming_request_id(req: &Request) -> Option<Uuid> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|header| header.to_str().ok())
        .and_then(|raw| Uuid::parse_str(raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with_id(value: &str) -> Request {
        Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, value)
            .body(Body::empty())
            .expect("request")
    }

    #[test]
    fn well_formed_caller_id_is_kept() {
        let id = Uuid::new_v4();
        let req = request_with_id(&id.to_string());
        assert_eq!(incoming_request_id(&req), Some(id));
    }

    #[test]
    fn junk_caller_id_is_discarded() {
        let req = request_with_id("not-a-uuid; drop table users");
        assert_eq!(incoming_request_id(&req), None);
    }

    #[test]
    fn missing_header_yields_none() {
        let req = Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("request");
        assert_eq!(incoming_request_id(&req), None);
    }
}
