//! HTTP handlers grouped by resource

pub mod appointments;
pub mod auth;
pub mod catalog;
pub mod clinical;
pub mod consents;
pub mod health;
pub mod payments;
pub mod treatments;
pub mod users;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use database_layer::DatabaseResult;

use crate::error::{ApiError, ApiResult};
use crate::services::scheduling::local_instant;

/// Turn a missing row into a 404 for `resource`
pub(crate) fn found<T>(row: DatabaseResult<Option<T>>, resource: &str) -> ApiResult<T> {
    row?.ok_or_else(|| ApiError::not_found(resource))
}

/// Parse an appointment timestamp.
///
/// RFC 3339 values keep their offset; values without one are read as clinic
/// local time.
pub(crate) fn parse_datetime(raw: &str, offset: FixedOffset, field: &str) -> ApiResult<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| local_instant(naive.date(), naive.time(), offset))
        .ok_or_else(|| ApiError::bad_request(format!("Invalid '{}' format, expected ISO 8601", field)))
}

/// Parse a `YYYY-MM-DD` query value
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Required string field that may be absent or blank in the payload
pub(crate) fn required<'a>(value: &'a Option<String>, field: &str) -> ApiResult<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation(format!("'{}' is required", field)))
}

/// Blank optional text is stored as absent
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(-6 * 3600).unwrap()
    }

    #[test]
    fn test_parse_datetime_with_offset() {
        let at = parse_datetime("2025-03-03T10:00:00-06:00", offset(), "scheduled_at").unwrap();
        assert_eq!(at.to_rfc3339(), "2025-03-03T16:00:00+00:00");
    }

    #[test]
    fn test_parse_naive_datetime_is_clinic_local() {
        let at = parse_datetime("2025-03-03T10:00", offset(), "scheduled_at").unwrap();
        assert_eq!(at.to_rfc3339(), "2025-03-03T16:00:00+00:00");
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("tomorrow", offset(), "scheduled_at").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert!(parse_date("2025-02-30").is_none());
        assert_eq!(parse_date("2025-03-03"), NaiveDate::from_ymd_opt(2025, 3, 3));
    }

    #[test]
    fn test_required_and_non_blank() {
        assert!(required(&Some("  ".to_string()), "summary").is_err());
        assert_eq!(required(&Some(" ok ".to_string()), "summary").unwrap(), "ok");
        assert_eq!(non_blank(Some("  ".to_string())), None);
    }
}
