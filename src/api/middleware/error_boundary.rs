//! Error boundary.
//!
//! Wraps every pipeline stage after the security headers and every handler. It
//!
//! - converts panics into the generic `500` body ([`CatchPanicLayer`]), and
//! - logs each failed request with its method, path, status and cause.
//!
//! The cause comes from the [`ErrorReport`] extension that [`AppError`] attaches to its
//! responses; it is never part of the body sent to the client.

use std::any::Any;

use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use crate::error::{AppError, ErrorReport};

/// Logs failures produced further down the stack.
pub async fn layer(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = next.run(req).await;
    let status = response.status();

    match response.extensions().get::<ErrorReport>() {
        Some(report) if status.is_server_error() => {
            metrics::counter!("gateway_unhandled_errors_total").increment(1);
            tracing::error!(
                %method,
                %path,
                status = status.as_u16(),
                cause = %report.cause,
                "Request failed"
            );
        }
        Some(report) => {
            tracing::debug!(
                %method,
                %path,
                status = status.as_u16(),
                cause = %report.cause,
                "Request rejected"
            );
        }
        None if status.is_server_error() => {
            tracing::warn!(
                %method,
                %path,
                status = status.as_u16(),
                "Handler returned a server error"
            );
        }
        None => {}
    }

    response
}

/// Turns a panic payload into the generic internal error response.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic payload".to_string()
    };

    AppError::internal(format!("handler panicked: {detail}")).into_response()
}

/// Wraps `router` with panic recovery and failure logging.
pub fn wrap(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn(layer))
            .layer(CatchPanicLayer::custom(panic_response)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    async fn boom() -> &'static str {
        panic!("connection string postgres://admin:secret@db leaked")
    }

    #[tokio::test]
    async fn test_panic_becomes_generic_500() {
        let app = wrap(Router::new().route("/boom", get(boom)));

        let response = app
            .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"Internal server error"}"#);
    }

    #[tokio::test]
    async fn test_handler_error_passes_through() {
        let app = wrap(Router::new().route(
            "/fail",
            get(|| async { Err::<(), _>(AppError::internal("db down")) }),
        ));

        let response = app
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
