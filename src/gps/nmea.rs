// src/gps/nmea.rs
//! NMEA sentence parsing
//!
//! GGA and RMC sentences are decoded field by field into the fixed-point
//! records of [`super::data`]. Empty fields leave the target untouched, and a
//! trailing `*hh` checksum is cut off without being verified.

use super::{
    data::{
        Date, GgaFix, GpsRecord, RmcFix, TimeOfDay, ALTITUDE_SCALE, COORD_SCALE, COURSE_SCALE,
        SPEED_SCALE,
    },
    fields::Fields,
    fixed::{parse_fixed_point, try_parse_fixed_point},
};
use crate::error::DecodeError;
use serde::{Deserialize, Serialize};

/// NMEA coordinates carry minutes with four decimals
const MINUTE_SCALE: i64 = 10_000;

/// Field positions used for RMC sentences
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RmcLayout {
    /// 1 date `DDMMYY`, 2 status, 3 speed, 4 course
    #[default]
    Compact,
    /// NMEA-0183 wire order: 2 status, 7 speed, 8 course, 9 date
    Standard,
}

struct RmcFieldMap {
    date: usize,
    status: usize,
    speed: usize,
    course: usize,
}

impl RmcLayout {
    fn fields(self) -> RmcFieldMap {
        match self {
            RmcLayout::Compact => RmcFieldMap {
                date: 1,
                status: 2,
                speed: 3,
                course: 4,
            },
            RmcLayout::Standard => RmcFieldMap {
                date: 9,
                status: 2,
                speed: 7,
                course: 8,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject numeric fields without digits and out-of-alphabet indicator
    /// characters instead of reading them as zero / ignoring them
    pub strict: bool,
    pub rmc_layout: RmcLayout,
}

/// Sentence types this decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SentenceKind {
    Gga,
    Rmc,
}

impl SentenceKind {
    /// Classify a line by its `$ttSSS` address field, for any talker
    pub fn identify(line: &str) -> Option<Self> {
        let address = line.trim_start().strip_prefix('$')?.split(',').next()?;
        if address.len() != 5 {
            return None;
        }
        match address.get(2..)? {
            "GGA" => Some(SentenceKind::Gga),
            "RMC" => Some(SentenceKind::Rmc),
            _ => None,
        }
    }
}

/// A record with every field zeroed
pub fn init_gps_record() -> GpsRecord {
    GpsRecord::default()
}

/// Decode a GGA sentence into a fresh record
pub fn decode_gga(sentence: &str) -> Result<GgaFix, DecodeError> {
    let mut gga = GgaFix::default();
    decode_gga_into(sentence, &mut gga, &DecodeOptions::default())?;
    Ok(gga)
}

/// Decode a GGA sentence over an existing record; fields absent from the
/// sentence keep their previous value.
pub fn decode_gga_into(
    sentence: &str,
    gga: &mut GgaFix,
    options: &DecodeOptions,
) -> Result<(), DecodeError> {
    let body = payload(sentence)?;

    // Magnitudes come before their hemisphere, so the sign is applied last
    let mut latitude = None;
    let mut longitude = None;

    for (index, field) in Fields::new(body, b',') {
        if field.is_empty() {
            continue;
        }

        match index {
            1 => {
                let [hour, minute, second] = six_digits(field, index)?;
                gga.time = TimeOfDay { hour, minute, second };
            }
            2 => latitude = Some(coordinate(field, index, options)?),
            3 => {
                if let Some(c) = indicator(field, index, &['N', 'S'], options)? {
                    gga.location.ns = c;
                }
            }
            4 => longitude = Some(coordinate(field, index, options)?),
            5 => {
                if let Some(c) = indicator(field, index, &['E', 'W'], options)? {
                    gga.location.ew = c;
                }
            }
            6 => gga.fix_quality = saturate_u8(number(field, index, 1, options)?),
            7 => gga.satellites = saturate_u8(number(field, index, 1, options)?),
            9 => {
                gga.altitude.altitude = saturate_i32(number(field, index, ALTITUDE_SCALE, options)?)
            }
            10 => {
                if let Some(c) = unit(field, index, options)? {
                    gga.altitude.unit = c;
                }
            }
            _ => {}
        }
    }

    if let Some(lat) = latitude {
        gga.location.latitude = signed(lat, gga.location.ns == 'S');
    }
    if let Some(lon) = longitude {
        gga.location.longitude = signed(lon, gga.location.ew == 'W');
    }
    Ok(())
}

/// Decode an RMC sentence into a fresh record using the compact layout
pub fn decode_rmc(sentence: &str) -> Result<RmcFix, DecodeError> {
    let mut rmc = RmcFix::default();
    decode_rmc_into(sentence, &mut rmc, &DecodeOptions::default())?;
    Ok(rmc)
}

pub fn decode_rmc_into(
    sentence: &str,
    rmc: &mut RmcFix,
    options: &DecodeOptions,
) -> Result<(), DecodeError> {
    let body = payload(sentence)?;
    let map = options.rmc_layout.fields();

    for (index, field) in Fields::new(body, b',') {
        if field.is_empty() {
            continue;
        }

        if index == map.date {
            let [day, month, yy] = six_digits(field, index)?;
            rmc.date = Date {
                day,
                month,
                year: 2000 + yy as u16,
            };
        } else if index == map.status {
            rmc.data_valid = match indicator(field, index, &['A', 'V'], options)? {
                Some(c) => c == 'A',
                None => false,
            };
        } else if index == map.speed {
            rmc.speed_knots = saturate_i32(number(field, index, SPEED_SCALE, options)?);
        } else if index == map.course {
            rmc.course = saturate_i32(number(field, index, COURSE_SCALE, options)?);
        }
    }
    Ok(())
}

/// Decode both sentences into `record`, GGA first. The first failure is
/// returned and whatever was decoded before it stays in place.
pub fn populate_gps_data(
    gga_sentence: &str,
    rmc_sentence: &str,
    record: &mut GpsRecord,
) -> Result<(), DecodeError> {
    populate_gps_data_with(gga_sentence, rmc_sentence, record, &DecodeOptions::default())
}

pub fn populate_gps_data_with(
    gga_sentence: &str,
    rmc_sentence: &str,
    record: &mut GpsRecord,
    options: &DecodeOptions,
) -> Result<(), DecodeError> {
    decode_gga_into(gga_sentence, &mut record.gga, options)?;
    decode_rmc_into(rmc_sentence, &mut record.rmc, options)?;
    Ok(())
}

/// Route one line to the matching decoder. Lines of other sentence types
/// are skipped with `Ok(None)`.
pub fn update_record(
    record: &mut GpsRecord,
    line: &str,
    options: &DecodeOptions,
) -> Result<Option<SentenceKind>, DecodeError> {
    let kind = match SentenceKind::identify(line) {
        Some(kind) => kind,
        None => return Ok(None),
    };

    match kind {
        SentenceKind::Gga => decode_gga_into(line, &mut record.gga, options)?,
        SentenceKind::Rmc => decode_rmc_into(line, &mut record.rmc, options)?,
    }
    Ok(Some(kind))
}

// Sentence without line ending and checksum
fn payload(sentence: &str) -> Result<&str, DecodeError> {
    let line = sentence.trim_end_matches(&['\r', '\n'][..]);
    let body = match line.split_once('*') {
        Some((body, _checksum)) => body,
        None => line,
    };

    if body.trim().is_empty() {
        Err(DecodeError::InvalidInput)
    } else {
        Ok(body)
    }
}

fn number(
    field: &str,
    index: usize,
    scale: i64,
    options: &DecodeOptions,
) -> Result<i64, DecodeError> {
    if options.strict {
        try_parse_fixed_point(field, scale, index)
    } else {
        Ok(parse_fixed_point(field, scale))
    }
}

// `HHMMSS` / `DDMMYY`, anything after the sixth character is ignored
fn six_digits(field: &str, index: usize) -> Result<[u8; 3], DecodeError> {
    let b = field.as_bytes();
    if b.len() < 6 || !b[..6].iter().all(u8::is_ascii_digit) {
        return Err(DecodeError::MalformedField { index });
    }

    let pair = |i: usize| (b[i] - b'0') * 10 + (b[i + 1] - b'0');
    Ok([pair(0), pair(2), pair(4)])
}

/// `DDMM.MMMM` / `DDDMM.MMMM` to unsigned degrees * 1e7
fn coordinate(field: &str, index: usize, options: &DecodeOptions) -> Result<i32, DecodeError> {
    let raw = number(field, index, MINUTE_SCALE, options)?;
    let degrees = raw / (100 * MINUTE_SCALE);
    let minutes = raw % (100 * MINUTE_SCALE);

    // raw saturates at i64::MAX on absurd input, so the scaling must too
    Ok(saturate_i32(
        degrees
            .saturating_mul(COORD_SCALE)
            .saturating_add(minutes * (COORD_SCALE / MINUTE_SCALE) / 60),
    ))
}

fn indicator(
    field: &str,
    index: usize,
    allowed: &[char],
    options: &DecodeOptions,
) -> Result<Option<char>, DecodeError> {
    match field.chars().next() {
        Some(c) if allowed.contains(&c) => Ok(Some(c)),
        _ if options.strict => Err(DecodeError::MalformedField { index }),
        _ => Ok(None),
    }
}

fn unit(field: &str, index: usize, options: &DecodeOptions) -> Result<Option<char>, DecodeError> {
    match field.chars().next() {
        Some(c) if options.strict && !c.is_ascii_alphabetic() => {
            Err(DecodeError::MalformedField { index })
        }
        c => Ok(c),
    }
}

fn signed(magnitude: i32, negative: bool) -> i32 {
    if negative {
        magnitude.saturating_neg()
    } else {
        magnitude
    }
}

fn saturate_i32(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

fn saturate_u8(value: i64) -> u8 {
    value.clamp(0, u8::MAX as i64) as u8
}
