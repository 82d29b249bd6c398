// src/gps/data.rs
//! Fixed-point GPS fix records

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Degrees are stored multiplied by this factor
pub const COORD_SCALE: i64 = 10_000_000;
/// Altitude is stored in millimetres
pub const ALTITUDE_SCALE: i64 = 1_000;
/// Speed over ground is stored in knots multiplied by this factor
pub const SPEED_SCALE: i64 = 1_000;
/// Course over ground is stored in degrees multiplied by this factor
pub const COURSE_SCALE: i64 = 100;

const KNOTS_TO_KMH: f64 = 1.852;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub latitude: i32,  // degrees * 1e7, negative south
    pub longitude: i32, // degrees * 1e7, negative west
    pub ns: char,       // 'N', 'S' or '\0' when unset
    pub ew: char,       // 'E', 'W' or '\0' when unset
}

impl Location {
    pub fn latitude_degrees(&self) -> f64 {
        self.latitude as f64 / COORD_SCALE as f64
    }

    pub fn longitude_degrees(&self) -> f64 {
        self.longitude as f64 / COORD_SCALE as f64
    }

    pub fn is_set(&self) -> bool {
        self.ns != '\0' && self.ew != '\0'
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    /// Compact `0x00HHMMSS` form, one byte per component
    pub fn pack(&self) -> u32 {
        (self.hour as u32) << 16 | (self.minute as u32) << 8 | self.second as u32
    }

    pub fn unpack(packed: u32) -> Self {
        Self {
            hour: (packed >> 16) as u8,
            minute: (packed >> 8) as u8,
            second: packed as u8,
        }
    }

    pub fn to_naive_time(&self) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), self.second.into())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Altitude {
    pub altitude: i32, // mm
    pub unit: char,
}

impl Altitude {
    pub fn metres(&self) -> f64 {
        self.altitude as f64 / ALTITUDE_SCALE as f64
    }
}

/// Calendar date. The year is always `2000 + YY`, so dates outside
/// 2000-2099 come out wrong.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Date {
    pub day: u8,
    pub month: u8,
    pub year: u16,
}

impl Date {
    pub fn to_naive_date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year.into(), self.month.into(), self.day.into())
    }
}

/// Data carried by a GGA sentence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GgaFix {
    pub location: Location,
    pub time: TimeOfDay,
    pub altitude: Altitude,
    pub fix_quality: u8,
    pub satellites: u8,
}

impl GgaFix {
    pub fn has_fix(&self) -> bool {
        self.fix_quality > 0
    }

    /// Get fix type description
    pub fn fix_description(&self) -> String {
        match self.fix_quality {
            0 => "No fix".to_string(),
            1 => "GPS".to_string(),
            2 => "DGPS".to_string(),
            3 => "PPS".to_string(),
            4 => "RTK".to_string(),
            5 => "Float RTK".to_string(),
            6 => "Estimated".to_string(),
            7 => "Manual".to_string(),
            8 => "Simulation".to_string(),
            q => format!("Unknown ({})", q),
        }
    }
}

/// Data carried by an RMC sentence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RmcFix {
    pub date: Date,
    pub speed_knots: i32, // knots * 1000
    pub course: i32,      // degrees * 100
    pub data_valid: bool,
}

impl RmcFix {
    pub fn speed_knots_f64(&self) -> f64 {
        self.speed_knots as f64 / SPEED_SCALE as f64
    }

    pub fn speed_kmh(&self) -> f64 {
        self.speed_knots_f64() * KNOTS_TO_KMH
    }

    pub fn course_degrees(&self) -> f64 {
        self.course as f64 / COURSE_SCALE as f64
    }
}

/// Latest GGA and RMC data. The halves are updated independently and may
/// come from different fixes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GpsRecord {
    pub gga: GgaFix,
    pub rmc: RmcFix,
}

impl GpsRecord {
    /// RMC date combined with GGA time, when both form a valid instant
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        let date = self.rmc.date.to_naive_date()?;
        let time = self.gga.time.to_naive_time()?;
        Some(date.and_time(time))
    }
}
