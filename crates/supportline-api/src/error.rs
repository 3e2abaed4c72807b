use axum::http::StatusCode;
use tracing::{debug, error};

use supportline_db::StoreError;

/// Status for a failed store call. Bodies stay empty so callers cannot tell
/// which check rejected them.
pub fn store_status(e: StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(what) => {
            debug!("Not found: {}", what);
            StatusCode::NOT_FOUND
        }
        StoreError::Forbidden(why) => {
            debug!("Forbidden: {}", why);
            StatusCode::FORBIDDEN
        }
        StoreError::Validation(why) => {
            debug!("Rejected: {}", why);
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StoreError::Internal(e) => {
            error!("Store error: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
