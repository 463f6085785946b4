use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::models::Record;

pub const DATE: &str = "First message date";
pub const DATE_FALLBACK: &str = "first_message_date";
pub const COUNTRY: &str = "Country";
pub const SENTIMENT: &str = "Sentiment";
pub const CSAT: &str = "C-sat";
pub const REQUESTED_AGENT: &str = "Requested Agent";
pub const MESSAGE_COUNT: &str = "alhena_msgs";
pub const PRIMARY_CATEGORY: &str = "Primary Category";
pub const INTENT: &str = "Intent";
pub const RECOMMENDATION: &str = "Recommendation";

/// Issue category fields in landscape chart order.
pub const ISSUE_FIELDS: [&str; 6] = [
    "Bot category",
    "website issue category",
    "reason_not_buying_category",
    "anger_category",
    "device_quality_category",
    "pricing_category",
];

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Text of a field. Missing, null and empty values all read as `None`.
pub fn text<'a>(record: &'a Record, field: &str) -> Option<Cow<'a, str>> {
    match record.get(field)? {
        Value::String(value) if value.is_empty() => None,
        Value::String(value) => Some(Cow::Borrowed(value.as_str())),
        Value::Number(value) => Some(Cow::Owned(value.to_string())),
        Value::Bool(value) => Some(Cow::Owned(value.to_string())),
        _ => None,
    }
}

/// Leading-integer parse: `" 4 stars"` is 4, `"4.5"` is 4, `"n/a"` is nothing.
pub fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|value| sign * value)
}

pub fn int(record: &Record, field: &str) -> Option<i64> {
    match record.get(field)? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|v| v.is_finite()).map(|v| v.trunc() as i64)),
        Value::String(raw) => parse_int_prefix(raw),
        _ => None,
    }
}

/// Satisfaction score, only when it lands in 1..=5.
pub fn csat_score(record: &Record) -> Option<i64> {
    int(record, CSAT).filter(|score| (1..=5).contains(score))
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    if let Some(parsed) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return Some(parsed);
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// Raw date text: the primary field, or the snake_case fallback when the
/// primary one is empty.
pub fn date_text(record: &Record) -> Option<Cow<'_, str>> {
    text(record, DATE).or_else(|| text(record, DATE_FALLBACK))
}

/// Calendar date of a record. Unparseable dates are `None`.
pub fn record_date(record: &Record) -> Option<NaiveDate> {
    if let Some(Value::Number(millis)) = record.get(DATE) {
        return millis
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|stamp| stamp.date_naive());
    }
    parse_timestamp(&date_text(record)?).map(|stamp| stamp.date())
}

/// Date portion of the raw date text, time dropped. Epoch-millisecond
/// values are labelled by their calendar date.
pub fn date_label(record: &Record) -> Option<String> {
    if let Some(Value::Number(_)) = record.get(DATE) {
        return record_date(record).map(|date| date.to_string());
    }
    let raw = date_text(record)?;
    let token = raw.split_whitespace().next()?;
    let label = match token.split_once('T') {
        Some((date, _)) if !date.is_empty() => date,
        _ => token,
    };
    Some(label.to_string())
}

/// Present, non-blank, and not one of the placeholder values `na`, `null`, `false`.
pub fn is_meaningful(record: &Record, field: &str) -> bool {
    let Some(value) = text(record, field) else {
        return false;
    };
    let value = value.trim();
    !value.is_empty()
        && !["na", "null", "false"]
            .iter()
            .any(|placeholder| value.eq_ignore_ascii_case(placeholder))
}

pub fn equals_ignore_case(record: &Record, field: &str, expected: &str) -> bool {
    text(record, field).is_some_and(|value| value.eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn integer_prefix_follows_leading_digits() {
        assert_eq!(parse_int_prefix("4"), Some(4));
        assert_eq!(parse_int_prefix(" 3 stars"), Some(3));
        assert_eq!(parse_int_prefix("4.9"), Some(4));
        assert_eq!(parse_int_prefix("-2"), Some(-2));
        assert_eq!(parse_int_prefix("n/a"), None);
        assert_eq!(parse_int_prefix(""), None);
    }

    #[test]
    fn numbers_and_strings_both_count_as_scores() {
        let row = record(json!({ "C-sat": 5, "alhena_msgs": "12" }));
        assert_eq!(csat_score(&row), Some(5));
        assert_eq!(int(&row, MESSAGE_COUNT), Some(12));

        let out_of_range = record(json!({ "C-sat": "7" }));
        assert_eq!(csat_score(&out_of_range), None);
    }

    #[test]
    fn dates_parse_from_common_sheet_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        for raw in [
            "2024-01-02 10:15:00",
            "2024-01-02T10:15:00Z",
            "2024-01-02",
            "01/02/2024 10:15",
        ] {
            let row = record(json!({ "First message date": raw }));
            assert_eq!(record_date(&row), Some(expected), "{raw}");
        }
    }

    #[test]
    fn fallback_date_field_is_used_only_when_primary_is_empty() {
        let fallback = record(json!({ "First message date": "", "first_message_date": "2024-01-03" }));
        assert_eq!(
            record_date(&fallback),
            NaiveDate::from_ymd_opt(2024, 1, 3)
        );

        let garbage = record(json!({ "First message date": "soon", "first_message_date": "2024-01-03" }));
        assert_eq!(record_date(&garbage), None);
    }

    #[test]
    fn date_label_drops_time() {
        let spaced = record(json!({ "First message date": "2024-01-02 10:15:00" }));
        let iso = record(json!({ "First message date": "2024-01-02T10:15:00Z" }));
        assert_eq!(date_label(&spaced).as_deref(), Some("2024-01-02"));
        assert_eq!(date_label(&iso).as_deref(), Some("2024-01-02"));
    }

    #[test]
    fn placeholder_issue_values_are_not_meaningful() {
        let row = record(json!({
            "a": "NA",
            "b": " null ",
            "c": "False",
            "d": "   ",
            "e": "Checkout error",
            "f": false
        }));
        for field in ["a", "b", "c", "d", "f", "missing"] {
            assert!(!is_meaningful(&row, field), "{field}");
        }
        assert!(is_meaningful(&row, "e"));
    }
}
