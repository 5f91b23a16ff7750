use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Price provider error: {0}")]
    Provider(String),

    #[error("Unsorted input: row {row} dated {current} follows {previous}")]
    UnsortedInput {
        row: usize,
        previous: NaiveDate,
        current: NaiveDate,
    },

    #[error("Duplicate date: row {row} repeats {date}")]
    DuplicateDate { row: usize, date: NaiveDate },

    #[error("Ragged column: {symbol} has {actual} observations for {expected} rows")]
    RaggedColumn {
        symbol: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate symbol column: {0}")]
    DuplicateSymbol(String),

    #[error("Invalid look-back window: {0} (must be a positive row count)")]
    InvalidWindow(usize),

    #[error(
        "Verification mismatch for {symbol} over {window} rows: calculator={calculated:?}, direct={direct:?}"
    )]
    VerificationMismatch {
        symbol: String,
        window: usize,
        calculated: Option<f64>,
        direct: Option<f64>,
    },
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::UnsortedInput { .. }
            | AppError::DuplicateDate { .. }
            | AppError::RaggedColumn { .. }
            | AppError::DuplicateSymbol(_)
            | AppError::InvalidWindow(_)
            | AppError::Config(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Http(_) | AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
