//! # Scan Error Types Module
//!
//! This module defines custom error types used throughout the scan pipeline.
//! It provides structured error handling for remote API calls, the status
//! stream, and scan tracking.

/// Custom error types for scan operations
#[derive(Debug, Clone)]
pub enum ScanError {
    /// Transport failure or non-success HTTP response from the scan API
    Remote(String),
    /// The service reports no scan for the requested id
    NotFound(String),
    /// The API response is missing required fields (e.g. the scan id)
    Validation(String),
    /// The status-updates connection failed or produced an undecodable frame
    Stream(String),
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::Remote(msg) => write!(f, "Remote API error: {msg}"),
            ScanError::NotFound(id) => write!(f, "Scan not found: {id}"),
            ScanError::Validation(msg) => write!(f, "Validation error: {msg}"),
            ScanError::Stream(msg) => write!(f, "Status stream error: {msg}"),
        }
    }
}

impl std::error::Error for ScanError {}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        ScanError::Remote(err.to_string())
    }
}
