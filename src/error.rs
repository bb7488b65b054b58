use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::store::StoreError;

/// Expected markup or content was not found.
///
/// Raised at listing level it aborts the whole batch; raised while enriching a
/// single cinema or movie it only drops that entity.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("nothing returned from {url}")]
    Unreachable { url: String },
    #[error("no {what} found on listing page")]
    NoListings { what: &'static str },
    #[error("could not find {what}")]
    MissingElement { what: &'static str },
    #[error("unexpected {what}: <{value}>")]
    InvalidValue { what: &'static str, value: String },
    #[error("no showtimes found")]
    NoShowtimes,
    #[error("no venues matched the cinema roster")]
    NoVenues,
}

pub type ExtractResult<T> = Result<T, ExtractError>;

/// Failure at the request boundary. Every variant renders as a status code plus
/// a short plain-text diagnostic.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    ScrapeFailed(String),
    /// Scraping worked but the write did not.
    #[error("{context} successful but encountered storage error: {source}")]
    Storage {
        context: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("{context}: {source}")]
    StorageRead {
        context: &'static str,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ScrapeFailed(_)
            | AppError::Storage { .. }
            | AppError::StorageRead { .. }
            | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<jiff::Error> for AppError {
    fn from(err: jiff::Error) -> Self {
        Self::Unexpected(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "rejected request");
        }
        (status, self.to_string()).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn storage_errors_say_the_scrape_itself_worked() {
        let err = AppError::Storage {
            context: "scrape cinemas",
            source: StoreError::Corrupt { what: "showtimes", detail: "eof".to_string() },
        };

        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.to_string(),
            "scrape cinemas successful but encountered storage error: corrupt showtimes column: eof"
        );
    }

    #[test]
    fn bad_requests_map_to_400() {
        let err = AppError::BadRequest("missing region info".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
