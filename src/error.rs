//! Custom error types for iosup.

use thiserror::Error;

/// Errors that can occur while talking to a device or preparing an upgrade.
#[derive(Error, Debug)]
pub enum IosupError {
    #[error("[{0}] connection failed: {1}")]
    Connection(String, String),

    #[error("[{0}] authentication failed: {1}")]
    Authentication(String, String),

    #[error("[{0}] host key verification failed: {1}")]
    HostKey(String, String),

    #[error("Unable to enter enable mode: {0}")]
    Elevation(String),

    #[error("Session closed by device")]
    SessionClosed,

    #[error("Timeout waiting for {operation}: {details}")]
    Timeout { operation: String, details: String },

    #[error("No .bin image files found on {0}")]
    NoImagesFound(String),

    #[error("Could not find a filesystem in directory listing")]
    InvalidListing,

    #[error("Image not found on device: {0}")]
    ImageNotFound(String),

    #[error("{0} upgrade not implemented yet")]
    UnsupportedUpgrade(String),
}

impl IosupError {
    /// Create a connection error from OpenSSH client output.
    /// Analyzes the message to pick a more specific error type.
    pub fn ssh(host: &str, stderr: &str) -> Self {
        let host = host.to_string();
        let lower = stderr.to_lowercase();
        let details = Self::extract_error_details(stderr);

        if lower.contains("permission denied")
            || lower.contains("authentication failed")
            || lower.contains("too many authentication failures")
        {
            return IosupError::Authentication(host, details);
        }

        if lower.contains("host key verification failed")
            || lower.contains("remote host identification has changed")
        {
            return IosupError::HostKey(host, details);
        }

        IosupError::Connection(host, details)
    }

    /// Pick the last meaningful line of OpenSSH output as a one-line message.
    fn extract_error_details(stderr: &str) -> String {
        stderr
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with("Warning: Permanently added"))
            .last()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "ssh exited without output".to_string())
    }
}
