//! Decoder for fio terse-v3 status lines.
//!
//! With `--status-interval`, fio emits one semicolon-delimited line per
//! interval. A full line has 130 fields: 4 header fields, the 117 named
//! value fields, and 9 trailing disk-utilization fields. Some fio builds
//! omit the disk block, leaving 121 fields. Everything else is a decode
//! failure counted against the supervisor's fault tolerance.
//!
//! Field parsing is lenient on purpose: a single field fio formats in an
//! unexpected way must not take the whole benchmark feed down, so it decays
//! to `0.0` with a debug log instead of failing the line.

use fiox_common::schema::{self, MetricMap};
use thiserror::Error;
use tracing::debug;

/// Header fields preceding the value region: terse version, fio version,
/// job name, group id.
const HEADER_FIELDS: usize = 4;

/// Field count of a full line including the trailing disk-utilization block.
const FULL_LINE_FIELDS: usize = 130;

/// Errors from decoding one status line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected field count: {count}")]
    FieldCount { count: usize },
}

/// Decode one terse-v3 line into the named metric map.
///
/// A successful decode always yields all 117 schema keys.
pub fn decode_line(line: &str) -> Result<MetricMap, DecodeError> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let raw: Vec<&str> = line.split(';').collect();

    let values = match raw.len() {
        FULL_LINE_FIELDS => &raw[HEADER_FIELDS..HEADER_FIELDS + schema::FIELD_COUNT],
        count if count <= HEADER_FIELDS => return Err(DecodeError::FieldCount { count }),
        _ => &raw[HEADER_FIELDS..],
    };

    if values.len() != schema::FIELD_COUNT {
        return Err(DecodeError::FieldCount { count: raw.len() });
    }

    let mut metrics = MetricMap::with_capacity(schema::FIELD_COUNT);
    for (&name, &raw_value) in schema::FIELDS.iter().zip(values.iter()) {
        metrics.insert(name, parse_field(name, raw_value));
    }
    Ok(metrics)
}

/// Parse one raw field.
///
/// Percentile fields arrive as `p%=value`; the value part wins. A remaining
/// `%` marks a percentage, scaled to a fraction.
fn parse_field(name: &'static str, raw: &str) -> f64 {
    let mut value = raw;
    if value.contains('=') {
        value = value.split('=').nth(1).unwrap_or("");
    }

    if value.contains('%') {
        let trimmed = value.strip_suffix('%').unwrap_or(value);
        parse_value(name, trimmed) / 100.0
    } else {
        parse_value(name, value)
    }
}

fn parse_value(name: &'static str, value: &str) -> f64 {
    match value.parse::<f64>() {
        Ok(parsed) => parsed,
        Err(_) => {
            debug!(field = name, value, "unparsable field, substituting 0");
            0.0
        }
    }
}
