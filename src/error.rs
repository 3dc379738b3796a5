//! # Error Types Module
//!
//! Centralized error handling for ventscope. The decoding and charting
//! algorithms are total and never fail; these types cover the collaborators
//! around them.
//!
//! ## Error Types
//! - `ConfigError`: Configuration file I/O, parsing and validation errors
//! - `StoreError`: Measurement store access failures
//! - `LinkError`: Ingest worker channel and thread failures

use std::fmt;

/// Errors that can occur during configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read config file
    ReadFailed(std::io::Error),
    /// Failed to write config file
    WriteFailed(std::io::Error),
    /// Failed to parse config file
    ParseFailed(toml::de::Error),
    /// Failed to serialize config
    SerializeFailed(toml::ser::Error),
    /// A setting is out of range
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ReadFailed(e) => {
                write!(f, "Failed to read config file: {}", e)
            }
            ConfigError::WriteFailed(e) => {
                write!(f, "Failed to write config file: {}", e)
            }
            ConfigError::ParseFailed(e) => {
                write!(f, "Failed to parse config file: {}", e)
            }
            ConfigError::SerializeFailed(e) => {
                write!(f, "Failed to serialize config: {}", e)
            }
            ConfigError::Invalid(msg) => {
                write!(f, "Invalid configuration: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFailed(e) => Some(e),
            ConfigError::WriteFailed(e) => Some(e),
            ConfigError::ParseFailed(e) => Some(e),
            ConfigError::SerializeFailed(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Errors raised by the measurement store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A thread panicked while holding the store lock
    Poisoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Poisoned => {
                write!(f, "Measurement store lock poisoned")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Errors that can occur while feeding the ingest worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The worker has shut down and no longer accepts chunks
    Closed,
    /// The worker thread panicked
    WorkerPanicked,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::Closed => {
                write!(f, "Link worker is closed")
            }
            LinkError::WorkerPanicked => {
                write!(f, "Link worker thread panicked")
            }
        }
    }
}

impl std::error::Error for LinkError {}
