// src/error.rs
//! Error types for the GPS byte stream and sentence decoder

use std::fmt;

pub type Result<T> = std::result::Result<T, GpsError>;

/// Failure to decode a single NMEA sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Empty sentence
    InvalidInput,
    /// A field at `index` could not be interpreted
    MalformedField { index: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::InvalidInput => write!(f, "empty or missing sentence"),
            DecodeError::MalformedField { index } => write!(f, "malformed field #{}", index),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Failure on the application side of the byte transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The transmit buffer did not drain within the write timeout
    Timeout,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "timed out waiting for the transmitter"),
        }
    }
}

impl std::error::Error for TransportError {}

#[derive(Debug)]
pub enum GpsError {
    Io(std::io::Error),
    Serial(tokio_serial::Error),
    Json(serde_json::Error),
    Connection(String),
    Decode(DecodeError),
    Transport(TransportError),
    Other(String),
}

impl fmt::Display for GpsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpsError::Io(e) => write!(f, "IO error: {}", e),
            GpsError::Serial(e) => write!(f, "Serial error: {}", e),
            GpsError::Json(e) => write!(f, "JSON error: {}", e),
            GpsError::Connection(msg) => write!(f, "Connection error: {}", msg),
            GpsError::Decode(e) => write!(f, "Decode error: {}", e),
            GpsError::Transport(e) => write!(f, "Transport error: {}", e),
            GpsError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for GpsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpsError::Io(e) => Some(e),
            GpsError::Serial(e) => Some(e),
            GpsError::Json(e) => Some(e),
            GpsError::Decode(e) => Some(e),
            GpsError::Transport(e) => Some(e),
            GpsError::Connection(_) | GpsError::Other(_) => None,
        }
    }
}

impl From<std::io::Error> for GpsError {
    fn from(error: std::io::Error) -> Self {
        GpsError::Io(error)
    }
}

impl From<tokio_serial::Error> for GpsError {
    fn from(error: tokio_serial::Error) -> Self {
        GpsError::Serial(error)
    }
}

impl From<serde_json::Error> for GpsError {
    fn from(error: serde_json::Error) -> Self {
        GpsError::Json(error)
    }
}

impl From<DecodeError> for GpsError {
    fn from(error: DecodeError) -> Self {
        GpsError::Decode(error)
    }
}

impl From<TransportError> for GpsError {
    fn from(error: TransportError) -> Self {
        GpsError::Transport(error)
    }
}

impl From<anyhow::Error> for GpsError {
    fn from(error: anyhow::Error) -> Self {
        GpsError::Other(error.to_string())
    }
}
