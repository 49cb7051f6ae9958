//! Timestamp conversions shared across the pipeline.
//!
//! Three wire formats coexist by design (see `DESIGN.md`): client-submitted
//! events carry epoch milliseconds, the raw-event RPC (F) carries epoch
//! seconds, and the aggregate RPC (H) carries `google.protobuf.Timestamp`.

use chrono::{DateTime, TimeZone, Utc};

pub fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

pub fn datetime_to_millis(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

pub fn seconds_to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

pub fn datetime_to_seconds(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}

pub fn prost_timestamp_to_datetime(ts: &prost_types::Timestamp) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts.seconds, ts.nanos.max(0) as u32).single()
}

pub fn datetime_to_prost_timestamp(dt: DateTime<Utc>) -> prost_types::Timestamp {
    prost_types::Timestamp {
        seconds: dt.timestamp(),
        nanos: dt.timestamp_subsec_nanos() as i32,
    }
}

/// Floors `dt` to the start of its `bucket_minutes`-wide window, UTC.
/// `bucket_minutes` must be a positive divisor of 1440 for buckets to align
/// across day boundaries; callers validate this at config load time.
pub fn truncate_to_bucket(dt: DateTime<Utc>, bucket_minutes: i64) -> DateTime<Utc> {
    let total_minutes = dt.timestamp() / 60;
    let bucket_start_minutes = (total_minutes / bucket_minutes) * bucket_minutes;
    Utc.timestamp_opt(bucket_start_minutes * 60, 0).single().unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn truncates_down_to_bucket_start() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 1, 12, 37, 42).unwrap();
        let bucketed = truncate_to_bucket(dt, 5);
        assert_eq!(bucketed, Utc.with_ymd_and_hms(2026, 1, 1, 12, 35, 0).unwrap());
    }

    #[test]
    fn bucket_boundary_is_inclusive_to_its_own_bucket() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 1, 12, 35, 0).unwrap();
        assert_eq!(truncate_to_bucket(dt, 5), dt);
    }

    #[test]
    fn handles_hour_boundary() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 1, 13, 2, 0).unwrap();
        assert_eq!(truncate_to_bucket(dt, 60), Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap());
    }

    #[test]
    fn millis_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap() + Duration::milliseconds(123);
        let ms = datetime_to_millis(dt);
        assert_eq!(millis_to_datetime(ms).unwrap(), dt);
    }

    #[test]
    fn prost_timestamp_roundtrip() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        let ts = datetime_to_prost_timestamp(dt);
        assert_eq!(prost_timestamp_to_datetime(&ts).unwrap(), dt);
    }
}
