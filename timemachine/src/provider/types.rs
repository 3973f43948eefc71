//! Provider error types

use std::fmt;

/// Errors that can occur while talking to the tile service.
///
/// Failures are not retried at this layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Request could not be sent or the body could not be read
    HttpError(String),
    /// Server answered with a non-success status
    HttpStatus { url: String, status: u16 },
    /// Unknown database name
    UnknownDatabase(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            ProviderError::HttpStatus { url, status } => {
                write!(f, "HTTP {} from {}", status, url)
            }
            ProviderError::UnknownDatabase(name) => {
                write!(
                    f,
                    "Unknown database '{}' (expected default, tm, sky, moon or mars)",
                    name
                )
            }
        }
    }
}

impl std::error::Error for ProviderError {}
