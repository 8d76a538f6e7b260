#[derive(Debug, thiserror::Error)]
pub enum CardGenError {
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("API key missing")]
    MissingApiKey,

    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse AI response: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, CardGenError>;
