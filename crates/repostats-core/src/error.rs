//! Error types for repostats.

/// Every failure a report run can hit. All of them are fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed with status {status}")]
    Auth { status: u16 },

    #[error("AQL request failed: {status} - {message}")]
    Request { status: u16, message: String },

    #[error("AQL request could not be sent: {0}")]
    Transport(String),

    #[error("Malformed result at index {index}: {reason}")]
    Transform { index: usize, reason: String },

    #[error("Failed to build workbook: {0}")]
    Write(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rust_xlsxwriter::XlsxError> for StatsError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        StatsError::Write(err.to_string())
    }
}

impl From<ureq::Error> for StatsError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, _) if status == 401 || status == 403 => {
                StatsError::Auth { status }
            }
            ureq::Error::Status(status, response) => {
                let message = response
                    .into_string()
                    .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
                StatsError::Request {
                    status,
                    message: message.trim().to_string(),
                }
            }
            ureq::Error::Transport(transport) => StatsError::Transport(transport.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StatsError>;
