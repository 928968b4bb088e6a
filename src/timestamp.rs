//! ISO-8601 UTC timestamps with microsecond precision.
//!
//! Both the query window bounds and the outbound record timestamps use the
//! same `YYYY-MM-DDTHH:MM:SS.ffffffZ` layout.

use chrono::{DateTime, Utc};

const ISO_MICROS: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Format a UTC instant as `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
pub fn format_utc(at: &DateTime<Utc>) -> String {
    at.format(ISO_MICROS).to_string()
}

/// Convert fractional seconds since the Unix epoch into an ISO-8601 string.
///
/// The value is rounded to the nearest microsecond. Returns `None` for
/// non-finite input or instants chrono cannot represent.
pub fn convert_unix_timestamp(unix_secs: f64) -> Option<String> {
    if !unix_secs.is_finite() {
        return None;
    }
    let micros = (unix_secs * 1_000_000.0).round();
    if micros.abs() >= i64::MAX as f64 {
        return None;
    }
    let micros = micros as i64;
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, nanos).map(|dt| format_utc(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn has_iso_micros_shape(s: &str) -> bool {
        let b = s.as_bytes();
        if b.len() != 27 {
            return false;
        }
        b.iter().enumerate().all(|(i, c)| match i {
            4 | 7 => *c == b'-',
            10 => *c == b'T',
            13 | 16 => *c == b':',
            19 => *c == b'.',
            26 => *c == b'Z',
            _ => c.is_ascii_digit(),
        })
    }

    #[test]
    fn reference_timestamp() {
        assert_eq!(
            convert_unix_timestamp(1527165350.0).as_deref(),
            Some("2018-05-24T12:35:50.000000Z")
        );
    }

    #[test]
    fn fractional_seconds_keep_microseconds() {
        assert_eq!(
            convert_unix_timestamp(1556092594.158).as_deref(),
            Some("2019-04-24T07:56:34.158000Z")
        );
    }

    #[test]
    fn epoch_is_formatted() {
        assert_eq!(
            convert_unix_timestamp(0.0).as_deref(),
            Some("1970-01-01T00:00:00.000000Z")
        );
    }

    #[test]
    fn non_finite_input_is_rejected() {
        assert!(convert_unix_timestamp(f64::NAN).is_none());
        assert!(convert_unix_timestamp(f64::INFINITY).is_none());
    }

    #[test]
    fn format_utc_matches_layout() {
        let dt = DateTime::<Utc>::from_timestamp(1600000000, 123_456_000).unwrap();
        assert_eq!(format_utc(&dt), "2020-09-13T12:26:40.123456Z");
    }

    proptest! {
        #[test]
        fn converted_timestamps_have_iso_micros_shape(ts in 0.0f64..4_000_000_000.0) {
            let s = convert_unix_timestamp(ts).unwrap();
            prop_assert!(has_iso_micros_shape(&s), "bad shape: {}", s);
        }
    }
}
