// src/gps/mod.rs
//! GPS sentence handling and fixed-point records

pub mod data;
pub mod fields;
pub mod fixed;
pub mod line;
pub mod nmea;

pub use data::{Altitude, Date, GgaFix, GpsRecord, Location, RmcFix, TimeOfDay};
pub use fixed::parse_fixed_point;
pub use line::LineAssembler;
pub use nmea::{
    decode_gga, decode_rmc, init_gps_record, populate_gps_data, update_record, DecodeOptions,
    RmcLayout, SentenceKind,
};
