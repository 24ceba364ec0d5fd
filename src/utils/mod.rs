//! Small helpers shared by the service modules.

use anyhow::Context;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;
use uuid::Uuid;

/// RFC 3339 in UTC with nanoseconds always present, so stored timestamps
/// have one width and sort lexically in time order.
const TIMESTAMP: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:9]Z"
);

/// Fresh, time-ordered entity id.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Current instant as a fixed-width RFC 3339 UTC string.
pub fn timestamp_now() -> anyhow::Result<String> {
    format_timestamp(OffsetDateTime::now_utc())
}

fn format_timestamp(at: OffsetDateTime) -> anyhow::Result<String> {
    at.format(TIMESTAMP).context("failed to format timestamp")
}

pub fn current_year() -> i32 {
    OffsetDateTime::now_utc().year()
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;
    use time::macros::datetime;

    #[test]
    fn timestamps_parse_back() {
        let stamp = timestamp_now().unwrap();
        assert!(OffsetDateTime::parse(&stamp, &Rfc3339).is_ok());
    }

    #[test]
    fn whole_seconds_keep_the_fraction() {
        let stamp = format_timestamp(datetime!(2025-01-02 10:00:00 UTC)).unwrap();
        assert_eq!(stamp, "2025-01-02T10:00:00.000000000Z");
    }

    #[test]
    fn lexical_order_matches_time_order() {
        let instants = [
            datetime!(2025-01-02 10:00:00 UTC),
            datetime!(2025-01-02 10:00:00.000000001 UTC),
            datetime!(2025-01-02 10:00:00.5 UTC),
            datetime!(2025-01-02 10:00:01 UTC),
        ];
        let stamps: Vec<String> = instants
            .iter()
            .map(|at| format_timestamp(*at).unwrap())
            .collect();

        assert!(stamps.iter().all(|stamp| stamp.len() == 30));
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(sorted, stamps);
        for (stamp, at) in stamps.iter().zip(instants) {
            assert_eq!(OffsetDateTime::parse(stamp, &Rfc3339).unwrap(), at);
        }
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round2(200.0 / 3.0), 66.67);
        assert_eq!(round2(100.0 / 3.0), 33.33);
        assert_eq!(round2(4.0), 4.0);
    }

    #[test]
    fn ids_are_uuids() {
        assert!(Uuid::parse_str(&new_id()).is_ok());
    }
}
