//! Normalization of OCR output before matching.

use chrono::format::{parse, Parsed, StrftimeItems};
use chrono::NaiveDateTime;
use regex::Regex;
use std::sync::OnceLock;

/// Characters kept by `clean_line` besides ASCII letters and digits.
pub const KEPT_PUNCTUATION: &str = ":";

/// Leading weekday of the video overlay timestamp, English locale.
pub const WEEKDAY_FORMAT: &str = "%A";

/// Timestamp layout of the video overlay after the weekday.
pub const DATETIME_FORMAT: &str = "%B %d %Y %I:%M:%S %p";

/// Replaces every run of characters other than ASCII letters, digits and
/// `exception` with one space, then trims and lowercases.
///
/// OCR output is unreliable on punctuation; `exception` keeps the signs a
/// format depends on, like `:` in times.
pub fn remove_punctuation(text: &str, exception: &str) -> String {
    match punctuation_regex(exception) {
        Ok(re) => collapse(&re, text),
        Err(_) => text.trim().to_lowercase(),
    }
}

/// `remove_punctuation` keeping `:`.
pub fn clean_line(text: &str) -> String {
    static DEFAULT: OnceLock<Option<Regex>> = OnceLock::new();
    match DEFAULT.get_or_init(|| punctuation_regex(KEPT_PUNCTUATION).ok()) {
        Some(re) => collapse(re, text),
        None => text.trim().to_lowercase(),
    }
}

fn punctuation_regex(exception: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("[^{}0-9a-zA-Z]+", regex::escape(exception)))
}

fn collapse(re: &Regex, text: &str) -> String {
    re.replace_all(text, " ").trim().to_lowercase()
}

/// Parses a cleaned overlay line such as `monday january 02 2023 10:15:30 am`.
///
/// Names are matched case-insensitively. The weekday must be a valid name
/// but is not checked against the date.
pub fn parse_datetime(line: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    let (weekday, rest) = line.split_once(' ').unwrap_or((line, ""));
    parse(&mut Parsed::new(), weekday, StrftimeItems::new(WEEKDAY_FORMAT))?;
    NaiveDateTime::parse_from_str(rest, DATETIME_FORMAT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_remove_punctuation() {
        assert_eq!(clean_line("  Hello,   World!! "), "hello world");
        assert_eq!(clean_line("10:15:30 -- PM"), "10:15:30 pm");
        assert_eq!(clean_line("..."), "");
    }

    #[test]
    fn test_remove_punctuation_custom_exception() {
        assert_eq!(remove_punctuation("a-b:c", "-"), "a-b c");
        assert_eq!(remove_punctuation("1.5 ]x[", "]["), "1 5 ]x[");
    }

    #[test]
    fn test_parse_datetime() {
        let line = clean_line("Monday, January 02, 2023 10:15:30 PM");
        assert_eq!(line, "monday january 02 2023 10:15:30 pm");
        let parsed = parse_datetime(&line).unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2023, 1, 2));
        assert_eq!((parsed.hour(), parsed.minute(), parsed.second()), (22, 15, 30));
    }

    #[test]
    fn test_parse_datetime_ignores_weekday_mismatch() {
        // January 2nd 2023 was a Monday
        let parsed = parse_datetime("tuesday january 02 2023 10:15:30 pm").unwrap();
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2023, 1, 2));
        assert_eq!((parsed.hour(), parsed.minute(), parsed.second()), (22, 15, 30));
    }

    #[test]
    fn test_parse_datetime_rejects_garbage() {
        assert!(parse_datetime("camera 1").is_err());
        assert!(parse_datetime("monday january 02 2023").is_err());
        assert!(parse_datetime("someday january 02 2023 10:15:30 pm").is_err());
        assert!(parse_datetime("monday").is_err());
    }
}
