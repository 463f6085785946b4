use thiserror::Error;

/// An uploaded ticket file could not be turned into records.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read ticket file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("expected a JSON array of tickets")]
    NotAnArray,
    #[error("ticket {index} is not an object")]
    NotARecord { index: usize },
}

/// One failed completion attempt.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("API response error")]
    MissingText,
    #[error("could not parse API response: {0}")]
    InvalidResponse(#[source] serde_json::Error),
    #[error("model output is not a JSON array: {0}")]
    NotJsonArray(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("invalid Google Sheets URL: {0}")]
    InvalidUrl(String),
    #[error("sheets request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API Error: {status} {message}")]
    Api { status: u16, message: String },
    #[error("input must be a JSON array")]
    InvalidGrid,
    #[error("unreadable sheets response: {0}")]
    InvalidResponse(#[source] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("aggregation worker is not running")]
    Closed,
    #[error("aggregation worker dropped the request")]
    Dropped,
}
