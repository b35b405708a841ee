//! Body decoding stage.
//!
//! Buffers `application/json` and `application/x-www-form-urlencoded` bodies (up to the
//! configured limit), decodes them into a [`ParsedBody`] request extension, and puts the
//! raw bytes back so handlers can still use their own extractors. Bodies of other content
//! types stream through untouched.
//!
//! A body that cannot be decoded does not short-circuit here. The failure is parked as a
//! [`PendingRejection`] and surfaced by [`surface_rejection`] at the router boundary, after
//! the rate limiter has counted the request like any other.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};

use crate::error::{AppError, ParseError};

/// Decoded request body, available to downstream stages and handlers.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    /// No body, or a decodable content type with an empty payload.
    Empty,
    Json(Value),
    Form(Map<String, Value>),
    /// A content type this stage does not decode; the raw body is left in the request.
    Undecoded,
}

impl<S: Send + Sync> FromRequestParts<S> for ParsedBody {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ParsedBody>()
            .cloned()
            .unwrap_or(ParsedBody::Empty))
    }
}

/// A decoding failure waiting to be reported.
#[derive(Debug, Clone)]
pub struct PendingRejection(Arc<AppError>);

impl PendingRejection {
    pub fn new(error: AppError) -> Self {
        Self(Arc::new(error))
    }

    pub fn error(&self) -> &AppError {
        &self.0
    }
}

impl IntoResponse for PendingRejection {
    fn into_response(self) -> Response {
        match Arc::try_unwrap(self.0) {
            Ok(error) => error.into_response(),
            Err(shared) => shared.render(),
        }
    }
}

/// Maximum number of body bytes buffered for decoding.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Other,
    Absent,
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let Some(content_type) = headers.get(header::CONTENT_TYPE) else {
        return BodyKind::Absent;
    };
    let Ok(content_type) = content_type.to_str() else {
        return BodyKind::Other;
    };

    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/json" => BodyKind::Json,
        "application/x-www-form-urlencoded" => BodyKind::Form,
        _ => BodyKind::Other,
    }
}

/// Decodes a JSON body. Only objects and arrays are accepted at the top level.
pub fn decode_json(bytes: &[u8]) -> Result<ParsedBody, ParseError> {
    let Some(first) = bytes.iter().find(|b| !b.is_ascii_whitespace()) else {
        return Ok(ParsedBody::Empty);
    };

    if *first != b'{' && *first != b'[' {
        return Err(ParseError::NonContainerJson);
    }

    Ok(ParsedBody::Json(serde_json::from_slice(bytes)?))
}

/// Decodes a URL-encoded form. Repeated keys collect into an array.
pub fn decode_form(bytes: &[u8]) -> Result<ParsedBody, ParseError> {
    if std::str::from_utf8(bytes).is_err() {
        return Err(ParseError::InvalidUtf8);
    }
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(ParsedBody::Empty);
    }

    let mut fields = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match fields.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                fields.insert(key.into_owned(), value);
            }
        }
    }

    Ok(ParsedBody::Form(fields))
}

fn is_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes, AppError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if is_length_limit(inner.as_ref()) {
            AppError::PayloadTooLarge { limit }
        } else {
            ParseError::Read(inner.to_string()).into()
        }
    })
}

/// Body decoding middleware.
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new()
///     .route("/track", post(track_handler))
///     .layer(middleware::from_fn_with_state(BodyLimit(100 * 1024), body::layer));
/// ```
pub async fn layer(State(BodyLimit(limit)): State<BodyLimit>, req: Request, next: Next) -> Response {
    let (mut parts, body) = req.into_parts();

    let kind = body_kind(&parts.headers);
    let decode: fn(&[u8]) -> Result<ParsedBody, ParseError> = match kind {
        BodyKind::Json => decode_json,
        BodyKind::Form => decode_form,
        BodyKind::Absent | BodyKind::Other => {
            let parsed = if kind == BodyKind::Absent {
                ParsedBody::Empty
            } else {
                ParsedBody::Undecoded
            };
            parts.extensions.insert(parsed);
            return next.run(Request::from_parts(parts, body)).await;
        }
    };

    let bytes = match read_body(body, limit).await {
        Ok(bytes) => bytes,
        Err(error) => {
            parts.extensions.insert(PendingRejection::new(error));
            return next.run(Request::from_parts(parts, Body::empty())).await;
        }
    };

    match decode(&bytes) {
        Ok(parsed) => {
            parts.extensions.insert(parsed);
        }
        Err(error) => {
            parts.extensions.insert(PendingRejection::new(error.into()));
        }
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Answers with a parked decoding failure instead of dispatching to a route.
pub async fn surface_rejection(req: Request, next: Next) -> Response {
    if let Some(rejection) = req.extensions().get::<PendingRejection>().cloned() {
        return rejection.into_response();
    }
    next.run(req).await
}
