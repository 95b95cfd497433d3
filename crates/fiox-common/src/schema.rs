//! Metric field schema for fio terse output, version 3.
//!
//! A terse-v3 status line carries 130 semicolon-separated fields: 4 header
//! fields (terse version, fio version, job name, group id), 117 value fields,
//! and 9 trailing disk-utilization fields. Only the value region is decoded;
//! `FIELDS` names its positions in order.
//!
//! Refer to <https://fio.readthedocs.io/en/latest/fio_doc.html#terse-output>
//! for the upstream format description.

use std::collections::HashMap;
use std::collections::HashSet;

use crate::error::{Error, Result};

/// The only terse output version fiox understands.
pub const TERSE_VERSION: u32 = 3;

/// Number of named value fields in a terse-v3 line.
pub const FIELD_COUNT: usize = 117;

/// A decoded status line: schema field name to value.
pub type MetricMap = HashMap<&'static str, f64>;

/// Ordered names for the value region of a terse-v3 line.
///
/// Position 0 corresponds to raw field 4 of the full line. Latency values are
/// in the unit fio reports for the terse format (microseconds); percentage
/// fields are scaled to fractions by the decoder.
pub const FIELDS: [&str; FIELD_COUNT] = [
    "error",
    // Read status
    "read_kb", "read_bandwidth", "read_iops", "read_runtime_ms",
    "read_slat_min", "read_slat_max", "read_slat_mean", "read_slat_dev",
    "read_clat_min", "read_clat_max", "read_clat_mean", "read_clat_dev",
    "read_clat_pct01", "read_clat_pct02", "read_clat_pct03", "read_clat_pct04", "read_clat_pct05",
    "read_clat_pct06", "read_clat_pct07", "read_clat_pct08", "read_clat_pct09", "read_clat_pct10",
    "read_clat_pct11", "read_clat_pct12", "read_clat_pct13", "read_clat_pct14", "read_clat_pct15",
    "read_clat_pct16", "read_clat_pct17", "read_clat_pct18", "read_clat_pct19", "read_clat_pct20",
    "read_tlat_min", "read_lat_max", "read_lat_mean", "read_lat_dev",
    "read_bw_min", "read_bw_max", "read_bw_agg_pct", "read_bw_mean", "read_bw_dev",
    // Write status, same shape as read
    "write_kb", "write_bandwidth", "write_iops", "write_runtime_ms",
    "write_slat_min", "write_slat_max", "write_slat_mean", "write_slat_dev",
    "write_clat_min", "write_clat_max", "write_clat_mean", "write_clat_dev",
    "write_clat_pct01", "write_clat_pct02", "write_clat_pct03", "write_clat_pct04", "write_clat_pct05",
    "write_clat_pct06", "write_clat_pct07", "write_clat_pct08", "write_clat_pct09", "write_clat_pct10",
    "write_clat_pct11", "write_clat_pct12", "write_clat_pct13", "write_clat_pct14", "write_clat_pct15",
    "write_clat_pct16", "write_clat_pct17", "write_clat_pct18", "write_clat_pct19", "write_clat_pct20",
    "write_tlat_min", "write_lat_max", "write_lat_mean", "write_lat_dev",
    "write_bw_min", "write_bw_max", "write_bw_agg_pct", "write_bw_mean", "write_bw_dev",
    // CPU usage
    "cpu_user", "cpu_sys", "cpu_csw", "cpu_mjf", "cpu_minf",
    // IO depth distribution
    "iodepth_1", "iodepth_2", "iodepth_4", "iodepth_8", "iodepth_16", "iodepth_32", "iodepth_64",
    // IO latency distribution, microsecond buckets
    "lat_2us", "lat_4us", "lat_10us", "lat_20us", "lat_50us", "lat_100us", "lat_250us",
    "lat_500us", "lat_750us", "lat_1000us",
    // IO latency distribution, millisecond buckets
    "lat_2ms", "lat_4ms", "lat_10ms", "lat_20ms", "lat_50ms", "lat_100ms", "lat_250ms",
    "lat_500ms", "lat_750ms", "lat_1000ms", "lat_2000ms", "lat_over_2000ms",
];

/// Validate the compiled-in schema.
///
/// Called once at startup before any subprocess or server work. The field
/// names double as exposition metric names, so duplicates would silently
/// shadow each other in every scrape.
pub fn validate() -> Result<()> {
    validate_names(&FIELDS)
}

fn validate_names(names: &[&str]) -> Result<()> {
    if names.len() != FIELD_COUNT {
        return Err(Error::Schema(format!(
            "expected {} field names, found {}",
            FIELD_COUNT,
            names.len()
        )));
    }

    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if name.is_empty() {
            return Err(Error::Schema("empty field name".to_string()));
        }
        if !seen.insert(*name) {
            return Err(Error::Schema(format!("duplicate field name: {}", name)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_valid() {
        validate().unwrap();
    }

    #[test]
    fn test_field_count() {
        assert_eq!(FIELDS.len(), FIELD_COUNT);
        assert_eq!(FIELD_COUNT, 117);
    }

    #[test]
    fn test_field_order_anchors() {
        // Positions the decoder contract depends on
        assert_eq!(FIELDS[0], "error");
        assert_eq!(FIELDS[1], "read_kb");
        assert_eq!(FIELDS[2], "read_bandwidth");
        assert_eq!(FIELDS[3], "read_iops");
        assert_eq!(FIELDS[41], "read_bw_dev");
        assert_eq!(FIELDS[42], "write_kb");
        assert_eq!(FIELDS[83], "cpu_user");
        assert_eq!(FIELDS[88], "iodepth_1");
        assert_eq!(FIELDS[116], "lat_over_2000ms");
    }

    #[test]
    fn test_read_write_blocks_mirror() {
        let reads: Vec<&str> = FIELDS
            .iter()
            .filter(|f| f.starts_with("read_"))
            .copied()
            .collect();
        let writes: Vec<&str> = FIELDS
            .iter()
            .filter(|f| f.starts_with("write_"))
            .copied()
            .collect();
        assert_eq!(reads.len(), 41);
        assert_eq!(writes.len(), 41);
        for (r, w) in reads.iter().zip(&writes) {
            assert_eq!(r.trim_start_matches("read_"), w.trim_start_matches("write_"));
        }
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let mut names = FIELDS.to_vec();
        names[10] = names[0];
        let err = validate_names(&names).unwrap_err();
        assert!(err.to_string().contains("duplicate field name"));
    }

    #[test]
    fn test_validate_rejects_wrong_count() {
        let names = &FIELDS[..FIELD_COUNT - 1];
        let err = validate_names(names).unwrap_err();
        assert!(err.to_string().contains("116"));
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut names = FIELDS.to_vec();
        names[50] = "";
        let err = validate_names(&names).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
