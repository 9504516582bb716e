use thiserror::Error;
use tpa_audit_scanner::ScanError;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<ScanError> for AuditError {
    fn from(e: ScanError) -> Self {
        if e.is_network() {
            AuditError::Network(e.to_string())
        } else {
            AuditError::Parse(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, AuditError>;
