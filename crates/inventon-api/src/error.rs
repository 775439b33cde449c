use axum::http::StatusCode;
use tracing::{debug, error};

use inventon_types::Error;

pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) | Error::InvalidStatus(_) => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::DuplicateKey(_) => StatusCode::CONFLICT,
        Error::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Runs a core operation off the async runtime and maps its error to a status.
pub async fn blocking<T, F>(f: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> inventon_types::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            match e {
                Error::StoreUnavailable(_) => error!("{}", e),
                _ => debug!("{}", e),
            }
            status_for(&e)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_statuses() {
        assert_eq!(status_for(&Error::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::InvalidStatus("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::not_found("ticket", 1)), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&Error::DuplicateKey("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&Error::unavailable("down")),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
