//! Errors raised by collaborator ports.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Spreadsheet request failed: {0}")]
    Sheets(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Window operation failed: {0}")]
    Window(String),

    #[error("Prompt driver failed: {0}")]
    Driver(String),

    #[error("Report generation failed: {0}")]
    Report(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_display() {
        let err = PortError::InvalidRange("E".to_string());
        assert!(err.to_string().contains("Invalid range"));

        let err = PortError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));
    }

    #[test]
    fn test_all_port_errors_display() {
        let errors = vec![
            PortError::Sheets("quota".to_string()),
            PortError::Auth("expired".to_string()),
            PortError::Window("denied".to_string()),
            PortError::Driver("no textarea".to_string()),
            PortError::Report("docs".to_string()),
        ];
        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }
}
