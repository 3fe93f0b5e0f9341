//! Timestamp parsing and formatting shared by the request and response types.
//!
//! Ads are scheduled with wall-clock timestamps in the `YYYY-MM-DD HH:MM:SS`
//! layout (interpreted as UTC). RFC 3339 is accepted on input as well, and
//! filter queries may pass a bare `YYYY-MM-DD` date.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};

/// Layout used for every timestamp rendered in JSON responses.
pub const AD_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Current time truncated to whole seconds, the precision every backend stores.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Parse an ad schedule timestamp (`YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or RFC 3339).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc).trunc_subsecs(0));
    }

    [AD_DATE_FORMAT, "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Parse a filter date: anything `parse_timestamp` accepts, or a bare day at midnight UTC.
pub fn parse_filter_date(value: &str) -> Option<DateTime<Utc>> {
    parse_timestamp(value).or_else(|| {
        NaiveDate::parse_from_str(value.trim(), DAY_FORMAT)
            .ok()
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

/// Serde adapter rendering `DateTime<Utc>` as `YYYY-MM-DD HH:MM:SS`.
pub mod ad_date {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(super::AD_DATE_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
    }
}
