//! Date classification: the single source of truth for deciding whether an
//! x-value is date-like, and for the comparable instant behind it.
//!
//! Chronological sorting, tick labeling, and brush-domain synthesis all
//! consume this one classifier, so ordering and labels cannot disagree the
//! way per-call-site regex sniffing lets them.

use crate::models::Scalar;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// Recognized textual date encodings, plus `Ordinal` for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    /// `2024-01-05`, with optional time suffix.
    Iso,
    /// `1/5/2024` (month first).
    UsSlash,
    /// `5-1-2024`, `5.1.2024`, or `5 Jan 2024` (day first).
    DayMonthYear,
    /// `Jan 2024` / `January 2024`.
    MonthYear,
    /// `Q1 2024`.
    QuarterYear,
    /// `2024`.
    Year,
    /// `2024-01`, the server-side monthly rollup form.
    AggregatedMonth,
    /// `2024-Q1`, the server-side quarterly rollup form.
    AggregatedQuarter,
    /// Not a date; original relative order is preserved.
    Ordinal,
}

impl DateKind {
    pub fn is_datelike(self) -> bool {
        !matches!(self, DateKind::Ordinal)
    }
}

/// Classification result: the matched encoding and, for date-like values,
/// the comparable instant (first day of the period for aggregated forms).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateClass {
    pub kind: DateKind,
    pub instant: Option<NaiveDate>,
}

impl DateClass {
    const ORDINAL: DateClass = DateClass {
        kind: DateKind::Ordinal,
        instant: None,
    };

    fn new(kind: DateKind, instant: NaiveDate) -> Self {
        Self {
            kind,
            instant: Some(instant),
        }
    }
}

static ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})([T ].*)?$").unwrap());
static AGG_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static AGG_QUARTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-[Qq]([1-4])$").unwrap());
static US_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})$").unwrap());
static DMY_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})[-.](\d{1,2})[-.](\d{4})$").unwrap());
static DMY_NAMED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2}) ([A-Za-z]{3,}) (\d{4})$").unwrap());
static MONTH_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]{3,}) (\d{4})$").unwrap());
static QUARTER_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Qq]([1-4])[ -]?(\d{4})$").unwrap());
static BARE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());

/// Classify a scalar against the recognized date encodings.
///
/// Numbers are treated as bare years when they are plausible calendar years;
/// anything else is `Ordinal`. A value that matches a pattern but names an
/// impossible date (month 13, day 32) also falls back to `Ordinal`.
pub fn classify(value: &Scalar) -> DateClass {
    match value {
        Scalar::Text(s) => classify_text(s.trim()),
        Scalar::Number(n) => {
            let year = *n as i32;
            if n.fract() == 0.0 && (1000..=3000).contains(&year) {
                match NaiveDate::from_ymd_opt(year, 1, 1) {
                    Some(d) => DateClass::new(DateKind::Year, d),
                    None => DateClass::ORDINAL,
                }
            } else {
                DateClass::ORDINAL
            }
        }
        Scalar::Null => DateClass::ORDINAL,
    }
}

fn classify_text(s: &str) -> DateClass {
    if let Some(c) = ISO.captures(s) {
        return ymd(DateKind::Iso, &c[1], &c[2], &c[3]);
    }
    if let Some(c) = AGG_MONTH.captures(s) {
        return ymd(DateKind::AggregatedMonth, &c[1], &c[2], "1");
    }
    if let Some(c) = AGG_QUARTER.captures(s) {
        return quarter(DateKind::AggregatedQuarter, &c[1], &c[2]);
    }
    if let Some(c) = US_SLASH.captures(s) {
        return ymd(DateKind::UsSlash, &c[3], &c[1], &c[2]);
    }
    if let Some(c) = DMY_NUMERIC.captures(s) {
        return ymd(DateKind::DayMonthYear, &c[3], &c[2], &c[1]);
    }
    if let Some(c) = DMY_NAMED.captures(s) {
        if let Some(month) = month_number(&c[2]) {
            return ymd(DateKind::DayMonthYear, &c[3], &month.to_string(), &c[1]);
        }
        return DateClass::ORDINAL;
    }
    if let Some(c) = MONTH_YEAR.captures(s) {
        if let Some(month) = month_number(&c[1]) {
            return ymd(DateKind::MonthYear, &c[2], &month.to_string(), "1");
        }
        return DateClass::ORDINAL;
    }
    if let Some(c) = QUARTER_YEAR.captures(s) {
        return quarter(DateKind::QuarterYear, &c[2], &c[1]);
    }
    if BARE_YEAR.is_match(s) {
        return ymd(DateKind::Year, s, "1", "1");
    }
    DateClass::ORDINAL
}

fn ymd(kind: DateKind, year: &str, month: &str, day: &str) -> DateClass {
    let parsed = (
        year.parse::<i32>().ok(),
        month.parse::<u32>().ok(),
        day.parse::<u32>().ok(),
    );
    match parsed {
        (Some(y), Some(m), Some(d)) => match NaiveDate::from_ymd_opt(y, m, d) {
            Some(date) => DateClass::new(kind, date),
            None => DateClass::ORDINAL,
        },
        _ => DateClass::ORDINAL,
    }
}

fn quarter(kind: DateKind, year: &str, q: &str) -> DateClass {
    let month = match q {
        "1" => 1,
        "2" => 4,
        "3" => 7,
        _ => 10,
    };
    ymd(kind, year, &month.to_string(), "1")
}

fn month_number(name: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let prefix = name.get(..3)?.to_lowercase();
    MONTHS.iter().position(|m| *m == prefix).map(|i| i as u32 + 1)
}

/// Short tick label for an x-value, derived from the same classification
/// that drives ordering.
pub fn short_label(value: &Scalar) -> String {
    let class = classify(value);
    let Some(date) = class.instant else {
        return value.canonical();
    };
    match class.kind {
        DateKind::Iso | DateKind::UsSlash | DateKind::DayMonthYear => {
            date.format("%b %-d").to_string()
        }
        DateKind::MonthYear | DateKind::AggregatedMonth => date.format("%b '%y").to_string(),
        DateKind::QuarterYear | DateKind::AggregatedQuarter => {
            format!("Q{} '{}", (date.month0() / 3) + 1, date.format("%y"))
        }
        DateKind::Year => date.format("%Y").to_string(),
        DateKind::Ordinal => value.canonical(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Scalar {
        Scalar::Text(s.to_string())
    }

    #[test]
    fn iso_and_aggregated_forms() {
        let c = classify(&text("2024-01-05"));
        assert_eq!(c.kind, DateKind::Iso);
        assert_eq!(c.instant, NaiveDate::from_ymd_opt(2024, 1, 5));

        let c = classify(&text("2024-03"));
        assert_eq!(c.kind, DateKind::AggregatedMonth);
        assert_eq!(c.instant, NaiveDate::from_ymd_opt(2024, 3, 1));

        let c = classify(&text("2024-Q3"));
        assert_eq!(c.kind, DateKind::AggregatedQuarter);
        assert_eq!(c.instant, NaiveDate::from_ymd_opt(2024, 7, 1));
    }

    #[test]
    fn slash_date_is_month_first() {
        let c = classify(&text("1/5/2024"));
        assert_eq!(c.kind, DateKind::UsSlash);
        assert_eq!(c.instant, NaiveDate::from_ymd_opt(2024, 1, 5));
    }

    #[test]
    fn named_forms() {
        assert_eq!(classify(&text("Jan 2024")).kind, DateKind::MonthYear);
        assert_eq!(classify(&text("5 Jan 2024")).kind, DateKind::DayMonthYear);
        assert_eq!(classify(&text("Q1 2024")).kind, DateKind::QuarterYear);
    }

    #[test]
    fn impossible_dates_are_ordinal() {
        assert_eq!(classify(&text("2024-13-05")).kind, DateKind::Ordinal);
        assert_eq!(classify(&text("2024-13")).kind, DateKind::Ordinal);
    }

    #[test]
    fn non_dates_are_ordinal() {
        assert_eq!(classify(&text("DEX")).kind, DateKind::Ordinal);
        assert_eq!(classify(&Scalar::Number(3.7)).kind, DateKind::Ordinal);
        assert_eq!(classify(&Scalar::Null).kind, DateKind::Ordinal);
    }

    #[test]
    fn numeric_year() {
        let c = classify(&Scalar::Number(2020.0));
        assert_eq!(c.kind, DateKind::Year);
        assert_eq!(c.instant, NaiveDate::from_ymd_opt(2020, 1, 1));
    }

    #[test]
    fn labels_follow_classification() {
        assert_eq!(short_label(&text("2024-01-05")), "Jan 5");
        assert_eq!(short_label(&text("2024-03")), "Mar '24");
        assert_eq!(short_label(&text("2024-Q3")), "Q3 '24");
        assert_eq!(short_label(&text("DEX")), "DEX");
    }
}
