//! Handler for requests no route claims.

use crate::error::AppError;

/// Answers any request no route matched, including a known path with the wrong method.
///
/// Always `404` with `{"error": "Not found"}`.
pub async fn not_found_handler() -> AppError {
    AppError::NotFound
}
