//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for run stamps, schedule instants and event times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Milliseconds elapsed between two timestamps, clamped at zero.
#[must_use]
pub fn elapsed_ms(start: Timestamp, end: Timestamp) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        assert!(ts >= before);
        assert!(ts <= Utc::now());
    }

    #[test]
    fn should_measure_elapsed_milliseconds() {
        let start = now();
        assert_eq!(elapsed_ms(start, start + Duration::milliseconds(1500)), 1500);
    }

    #[test]
    fn should_clamp_negative_elapsed_to_zero() {
        let start = now();
        assert_eq!(elapsed_ms(start, start - Duration::seconds(1)), 0);
    }
}
