use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};

/// Wall-clock instant in UTC, used to stamp sync runs and envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UtcDateTime(OffsetDateTime);

impl UtcDateTime {
    pub fn now() -> Self {
        Self(OffsetDateTime::now_utc())
    }

    /// Calendar date in UTC.
    pub fn date(self) -> Date {
        self.0.date()
    }

    /// Milliseconds elapsed from `earlier` to `self`, clamped at zero.
    pub fn millis_since(self, earlier: Self) -> u64 {
        let millis = (self.0 - earlier.0).whole_milliseconds();
        u64::try_from(millis.max(0)).unwrap_or(u64::MAX)
    }
}

impl From<OffsetDateTime> for UtcDateTime {
    fn from(value: OffsetDateTime) -> Self {
        Self(value.to_offset(time::UtcOffset::UTC))
    }
}

impl Display for UtcDateTime {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0.format(&Rfc3339) {
            Ok(text) => f.write_str(&text),
            Err(_) => write!(f, "{}", self.0.unix_timestamp()),
        }
    }
}

impl Serialize for UtcDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn offsets_are_normalized_to_utc() {
        let stamp = UtcDateTime::from(datetime!(2024-01-01 23:30 -02:00));
        assert_eq!(stamp.date(), time::macros::date!(2024 - 01 - 02));
        assert_eq!(stamp.to_string(), "2024-01-02T01:30:00Z");
    }

    #[test]
    fn millis_since_is_clamped() {
        let earlier = UtcDateTime::from(datetime!(2024-01-01 00:00 UTC));
        let later = UtcDateTime::from(datetime!(2024-01-01 00:00:01.5 UTC));
        assert_eq!(later.millis_since(earlier), 1_500);
        assert_eq!(earlier.millis_since(later), 0);
    }

    #[test]
    fn serializes_as_rfc3339_string() {
        let stamp = UtcDateTime::from(datetime!(2024-03-05 14:00 UTC));
        let json = serde_json::to_value(stamp).expect("json");
        assert_eq!(json, "2024-03-05T14:00:00Z");
    }
}
