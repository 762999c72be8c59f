//! Application-wide middleware: request tracing, panic recovery, secure headers, body limit.

use crate::response::fail;
use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Router,
};
use std::any::Any;
use std::time::Duration;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::Span;

/// Request bodies above this size are rejected with 413. Also raises axum's
/// own extractor limit, which would otherwise stop at 2 MiB.
pub const BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Wrap every route registered so far. The trace layer is outermost so it
/// also sees responses produced by the other layers.
pub fn apply(router: Router) -> Router {
    router
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    tracing::info_span!(
                        "http",
                        method = %req.method(),
                        uri = %req.uri(),
                        bytes_in = content_length(req.headers()),
                    )
                })
                .on_request(())
                .on_response(|res: &Response, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = res.status().as_u16(),
                        latency_ms = latency.as_millis() as u64,
                        bytes_out = content_length(res.headers()),
                        "request"
                    );
                }),
        )
}

fn content_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic"
    };
    tracing::error!(panic = detail, "handler panicked");
    fail("internal server error").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_defaults_to_zero() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), 0);
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
        assert_eq!(content_length(&headers), 12);
    }

    #[test]
    fn panic_becomes_failure_envelope() {
        let res = handle_panic(Box::new("boom"));
        assert_eq!(res.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn body_status(len: usize) -> axum::http::StatusCode {
        use axum::{body::Bytes, routing::post};
        use tower::ServiceExt;

        let app = apply(Router::new().route("/", post(|body: Bytes| async move { body.len().to_string() })));
        let req = Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_LENGTH, len)
            .body(axum::body::Body::from(vec![b'a'; len]))
            .unwrap();
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn bodies_up_to_the_limit_are_accepted() {
        assert_eq!(body_status(3 * 1024 * 1024).await, axum::http::StatusCode::OK);
        assert_eq!(body_status(BODY_LIMIT).await, axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn bodies_over_the_limit_are_rejected() {
        assert_eq!(body_status(BODY_LIMIT + 1).await, axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    }
}
