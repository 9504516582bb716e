use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Timed out after {secs}s fetching {url}")]
    Timeout { url: String, secs: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl ScanError {
    /// True for failures of the transport (timeouts, refused connections,
    /// non-success statuses) as opposed to malformed content.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            ScanError::HttpError(_)
                | ScanError::Status { .. }
                | ScanError::Timeout { .. }
                | ScanError::BrowserError(_)
        )
    }
}

impl From<quick_xml::Error> for ScanError {
    fn from(e: quick_xml::Error) -> Self {
        ScanError::ParseError(format!("XML: {}", e))
    }
}

impl From<chromiumoxide::error::CdpError> for ScanError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        ScanError::BrowserError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
