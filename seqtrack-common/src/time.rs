//! Timestamp utilities

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Fractional hours between two instants; negative spans clamp to zero
pub fn elapsed_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds().max(0);
    millis as f64 / 3_600_000.0
}

/// Parse an RFC 3339 timestamp as stored in TEXT columns
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_elapsed_hours() {
        let start = now();
        assert_eq!(elapsed_hours(start, start + Duration::minutes(90)), 1.5);
        assert_eq!(elapsed_hours(start, start), 0.0);
        assert_eq!(elapsed_hours(start + Duration::hours(1), start), 0.0);
    }

    #[test]
    fn test_parse_timestamp_round_trip() {
        let ts = now();
        let parsed = parse_timestamp(&ts.to_rfc3339()).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
    }
}
