// src/lib.rs
//! GPS Stream Library
//!
//! A fixed-capacity, interrupt-safe serial byte transport feeding a
//! fixed-point NMEA GGA/RMC decoder.

pub mod config;
pub mod display;
pub mod error;
pub mod gps;
pub mod monitor;
pub mod uart;

// Re-export main types for convenience
pub use error::{DecodeError, GpsError, Result, TransportError};
pub use gps::{
    decode_gga, decode_rmc, init_gps_record, parse_fixed_point, populate_gps_data, DecodeOptions,
    GpsRecord, RmcLayout,
};
pub use monitor::{GpsMonitor, GpsSource, MonitorState};
pub use uart::{RingBuffer, Transport, UartDriver, UartTransport};
