//! Validation, identifier and time helpers shared by every backend.
//!
//! Nothing in here touches the filesystem or the database.

use std::collections::BTreeMap;

use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc,
};
use rand::Rng;

use crate::{DaybookError, Result};

/// Length of every generated entry, template, context and block id.
pub const ID_LEN: usize = 8;

/// Maximum width of a day preview line, in characters.
pub const PREVIEW_WIDTH: usize = 80;

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generates an 8-character lowercase alphanumeric identifier.
///
/// 36^8 (~2.8e12) possible values. Backends still treat a collision as a
/// conflict instead of overwriting.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_id(id: &str) -> bool {
    id.len() == ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

/// Rejects ids that are not 8 lowercase alphanumeric characters.
pub fn validate_id(id: &str, what: &str) -> Result<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(DaybookError::validation(format!(
            "{} id '{}' must be {} lowercase alphanumeric characters",
            what, id, ID_LEN
        )))
    }
}

/// Rejects content that is empty after trimming.
pub fn validate_content(content: &str, what: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(DaybookError::validation(format!(
            "{} content cannot be empty",
            what
        )));
    }
    Ok(())
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'
}

/// Template names: lowercase letters, digits, `-` and `_`.
pub fn validate_template_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(is_name_char) {
        return Err(DaybookError::validation(format!(
            "template name '{}' may only contain lowercase letters, digits, '-' and '_'",
            name
        )));
    }
    Ok(())
}

/// Context names follow the template rules but may be split into segments
/// with `/` (e.g. `work/project-x`). Empty segments are rejected.
pub fn validate_context_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .split('/')
            .all(|segment| !segment.is_empty() && segment.chars().all(is_name_char));
    if !valid {
        return Err(DaybookError::validation(format!(
            "context name '{}' may only contain lowercase letters, digits, '-', '_' and '/' between segments",
            name
        )));
    }
    Ok(())
}

/// Local calendar date of a UTC instant.
pub fn local_date(at: &DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

/// The UTC instant at which the given local calendar date begins.
pub fn local_day_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(start) => start.with_timezone(&Utc),
        // midnight skipped by a DST transition
        None => Local
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map(|start| start.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
    }
}

/// The UTC instant at which the local day after `date` begins.
pub fn local_day_end(date: NaiveDate) -> DateTime<Utc> {
    match date.succ_opt() {
        Some(next) => local_day_start(next),
        None => DateTime::<Utc>::MAX_UTC,
    }
}

/// A timestamp strictly later than `previous`, normally the current time.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::nanoseconds(1)
    }
}

/// Years a stored timestamp may fall in. Outside them the rendered form
/// gains a sign and lexical order stops matching chronological order.
pub const TIMESTAMP_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// First instant of year 0.
pub fn earliest_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(-62_167_219_200, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Last nanosecond of year 9999.
pub fn latest_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(253_402_300_799, 999_999_999).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Rejects timestamps outside [`TIMESTAMP_YEARS`].
pub fn validate_timestamp(at: &DateTime<Utc>, what: &str) -> Result<()> {
    if TIMESTAMP_YEARS.contains(&at.year()) {
        return Ok(());
    }
    Err(DaybookError::validation(format!(
        "{} timestamp {} is outside years 0000-9999",
        what, at
    )))
}

/// Fixed-width RFC 3339 rendering (nanoseconds, `Z` suffix).
///
/// Within [`TIMESTAMP_YEARS`] every value has the same width, so lexical
/// order matches chronological order.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|source| DaybookError::Timestamp {
            value: value.to_string(),
            source,
        })
}

/// First non-blank line of `content`, cut to `width` characters.
pub fn preview(content: &str, width: usize) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");

    if line.chars().count() <= width {
        return line.to_string();
    }

    let cut: String = line.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

// Helper method for parsing comma separated names
pub fn parse_names(names: Option<String>) -> Vec<String> {
    names
        .map(|n| {
            n.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Parses `key=value` pairs separated by commas.
pub fn parse_attributes(pairs: Option<String>) -> Result<BTreeMap<String, String>> {
    let mut attributes = BTreeMap::new();
    for pair in parse_names(pairs) {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            DaybookError::validation(format!("attribute '{}' is not in key=value form", pair))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(DaybookError::validation(format!(
                "attribute '{}' has an empty key",
                pair
            )));
        }
        attributes.insert(key.to_string(), value.trim().to_string());
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn generated_ids_are_valid_and_distinct() {
        let ids: HashSet<String> = (0..10_000).map(|_| generate_id()).collect();
        assert_eq!(ids.len(), 10_000);
        assert!(ids.iter().all(|id| is_valid_id(id)));
    }

    #[test]
    fn id_validation() {
        assert!(validate_id("abc12345", "entry").is_ok());
        assert!(validate_id("ABC12345", "entry").is_err());
        assert!(validate_id("abc1234", "entry").is_err());
        assert!(validate_id("abc-1234", "entry").is_err());
        assert!(validate_id("", "entry").is_err());
    }

    #[test]
    fn content_must_not_be_blank() {
        assert!(validate_content("hello", "entry").is_ok());
        assert!(validate_content("   \n\t", "entry").is_err());
        assert!(validate_content("", "entry").is_err());
    }

    #[test]
    fn name_patterns() {
        assert!(validate_template_name("daily-standup_2").is_ok());
        assert!(validate_template_name("Daily").is_err());
        assert!(validate_template_name("has space").is_err());
        assert!(validate_template_name("a/b").is_err());

        assert!(validate_context_name("work/project-x").is_ok());
        assert!(validate_context_name("git").is_ok());
        assert!(validate_context_name("/work").is_err());
        assert!(validate_context_name("work//x").is_err());
        assert!(validate_context_name("../etc").is_err());
    }

    #[test]
    fn preview_takes_first_line_and_truncates() {
        assert_eq!(preview("\n  first line \nsecond", PREVIEW_WIDTH), "first line");

        let long = "x".repeat(200);
        let shown = preview(&long, PREVIEW_WIDTH);
        assert_eq!(shown.chars().count(), PREVIEW_WIDTH);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn timestamps_keep_lexical_order() {
        let early = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
        let late = early + Duration::nanoseconds(1);
        let (a, b) = (format_timestamp(&early), format_timestamp(&late));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_timestamp(&a).unwrap(), early);
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn timestamp_range_is_four_digit_years() {
        assert_eq!(format_timestamp(&earliest_timestamp()), "0000-01-01T00:00:00.000000000Z");
        assert_eq!(format_timestamp(&latest_timestamp()), "9999-12-31T23:59:59.999999999Z");

        assert!(validate_timestamp(&latest_timestamp(), "entry").is_ok());
        assert!(validate_timestamp(&earliest_timestamp(), "entry").is_ok());
        let beyond = latest_timestamp() + Duration::nanoseconds(1);
        assert!(format_timestamp(&beyond).starts_with('+'));
        assert!(validate_timestamp(&beyond, "entry").is_err());
        let before = earliest_timestamp() - Duration::nanoseconds(1);
        assert!(validate_timestamp(&before, "entry").is_err());
    }

    #[test]
    fn next_timestamp_is_strictly_later() {
        let future = Utc::now() + Duration::hours(1);
        assert!(next_timestamp(future) > future);
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(next_timestamp(past) > past);
    }

    #[test]
    fn local_day_bounds_cover_the_date() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let noon = Local
            .with_ymd_and_hms(2026, 1, 15, 12, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert!(local_day_start(date) <= noon);
        assert!(noon < local_day_end(date));
        assert_eq!(local_date(&noon), date);
    }

    #[test]
    fn attribute_pairs() {
        let attrs = parse_attributes(Some("type=note, mood = good".to_string())).unwrap();
        assert_eq!(attrs.get("type").map(String::as_str), Some("note"));
        assert_eq!(attrs.get("mood").map(String::as_str), Some("good"));
        assert!(parse_attributes(Some("novalue".to_string())).is_err());
        assert!(parse_attributes(None).unwrap().is_empty());
    }
}
