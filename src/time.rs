//! ISO-8601 parsing/formatting and fixed-size chunking (spec §4.1).
//!
//! The canonical formatted form, `YYYY-MM-DDThh:mm:ss.ffffff+0000`, is sent
//! verbatim as `dispatch.earliest_time`/`dispatch.latest_time` and must be
//! byte-stable — tests in `original_source/tests/checks/mock/test_splunk_event.py`
//! pin this exact shape.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

/// Parse an ISO-8601 timestamp (with timezone offset) to UTC epoch seconds.
pub fn parse_epoch_seconds(s: &str) -> Result<f64> {
    let dt = DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .with_context(|| format!("failed to parse ISO-8601 timestamp '{s}'"))?;
    Ok(dt.with_timezone(&Utc).timestamp_micros() as f64 / 1_000_000.0)
}

/// Format UTC epoch seconds as `YYYY-MM-DDThh:mm:ss.ffffff+0000`.
///
/// This exact format (six fractional digits, `+0000` rather than `Z`) is
/// what Splunk's `dispatch.earliest_time`/`dispatch.latest_time` parameters
/// expect.
pub fn format_canonical(epoch_seconds: f64) -> String {
    let micros = (epoch_seconds * 1_000_000.0).round() as i64;
    let secs = micros.div_euclid(1_000_000);
    let frac_micros = micros.rem_euclid(1_000_000) as u32;
    let naive = NaiveDateTime::from_timestamp_opt(secs, frac_micros * 1_000)
        .unwrap_or_else(|| DateTime::<Utc>::from(std::time::UNIX_EPOCH).naive_utc());
    let dt: DateTime<Utc> = Utc.from_utc_datetime(&naive);
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+0000").to_string()
}

/// Split a slice into fixed-size windows of size `n` (last window possibly short).
///
/// `n == 0` returns no chunks rather than looping forever.
pub fn chunks<T: Clone>(items: &[T], n: usize) -> Vec<Vec<T>> {
    if n == 0 {
        return Vec::new();
    }
    items.chunks(n).map(|c| c.to_vec()).collect()
}
