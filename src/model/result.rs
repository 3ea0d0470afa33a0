use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not a valid date: {0}")]
    InvalidDate(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl Error {
    pub fn missing_field(entity: &str, field: &str) -> Self {
        Self::Config(format!("Not found '{field}' field for `{entity}`"))
    }
}
