//! Freshness Evaluator
//!
//! Decides whether a cached connection pair may still serve a request. A pair
//! is valid for `period` after it was (re)established, and a request is only
//! served from cache when what remains of that window covers the caller's
//! whole timeout:
//!
//! ```text
//! last_active
//!     |------ period ------|
//!             now
//!              |------ requested ------|
//!
//! fresh <=> last_active + period >= now + requested
//! ```
//!
//! This never looks at the transport; it only tells the registry when to
//! redial eagerly.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Whether a pair last activated at `last_active` can serve a request with
/// `requested` timeout arriving at `now`
pub fn is_fresh(
    period: Duration,
    requested: Duration,
    last_active: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    // A deadline beyond the representable range never expires
    let Some(deadline) = chrono::Duration::from_std(period)
        .ok()
        .and_then(|period| last_active.checked_add_signed(period))
    else {
        return true;
    };

    let Some(horizon) = chrono::Duration::from_std(requested)
        .ok()
        .and_then(|requested| now.checked_add_signed(requested))
    else {
        return false;
    };

    deadline >= horizon
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_exact_boundary_is_fresh() {
        // 0 + 10 == 4 + 6
        assert!(is_fresh(
            Duration::from_secs(10),
            Duration::from_secs(6),
            at(0),
            at(4)
        ));
    }

    #[test]
    fn test_one_past_boundary_is_stale() {
        assert!(!is_fresh(
            Duration::from_secs(10),
            Duration::from_secs(6),
            at(0),
            at(5)
        ));
        assert!(!is_fresh(
            Duration::from_secs(10),
            Duration::from_millis(6_001),
            at(0),
            at(4)
        ));
    }

    #[test]
    fn test_matches_difference_law() {
        for period in [0u64, 1, 5, 10, 120] {
            for requested in [0u64, 1, 5, 10, 120] {
                for elapsed in [0i64, 1, 5, 10, 119, 121] {
                    let expected = period as i64 - elapsed - requested as i64 >= 0;
                    assert_eq!(
                        is_fresh(
                            Duration::from_secs(period),
                            Duration::from_secs(requested),
                            at(0),
                            at(elapsed)
                        ),
                        expected,
                        "period={period} requested={requested} elapsed={elapsed}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_request_longer_than_period_never_fresh() {
        assert!(!is_fresh(
            Duration::from_secs(10),
            Duration::from_secs(11),
            at(0),
            at(0)
        ));
    }

    #[test]
    fn test_overflowing_values() {
        assert!(is_fresh(Duration::MAX, Duration::from_secs(60), at(0), at(3600)));
        assert!(!is_fresh(Duration::from_secs(60), Duration::MAX, at(0), at(0)));
    }
}
