//! Normalisation of the free-text values found on book pages.
//!
//! Every helper returns `None` for input it cannot make sense of; callers
//! omit the key rather than store a placeholder.

use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());
static DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static FULL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})\s*[-./年]\s*(\d{1,2})\s*[-./月]\s*(\d{1,2})").unwrap()
});
static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\s*[-./年]\s*(\d{1,2})").unwrap());
static YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})").unwrap());

/// First integer in the text, e.g. `"384页"` -> 384.
pub fn parse_pages(text: &str) -> Option<i64> {
    INTEGER.find(text)?.as_str().parse().ok()
}

/// First decimal number in the text, e.g. `"CNY 59.00"` -> 59.0.
pub fn parse_price(text: &str) -> Option<f64> {
    DECIMAL.find(text)?.as_str().parse().ok()
}

/// A rating such as `"8.6"`. Blank or non-numeric ratings yield `None`.
pub fn parse_score(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|s| s.is_finite())
}

/// Publish date in any of the forms `YYYY-M-D`, `YYYY.M`, `YYYY年M月`
/// or `YYYY`. A missing month or day defaults to 1.
pub fn parse_publish_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    if let Some(caps) = FULL_DATE.captures(text) {
        let (y, m, d) = (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            return Some(date);
        }
    }
    if let Some(caps) = YEAR_MONTH.captures(text) {
        let (y, m) = (caps[1].parse().ok()?, caps[2].parse().ok()?);
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, 1) {
            return Some(date);
        }
    }
    let caps = YEAR.captures(text)?;
    NaiveDate::from_ymd_opt(caps[1].parse().ok()?, 1, 1)
}
