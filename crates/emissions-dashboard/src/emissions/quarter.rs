//! Calendar features derived from the `Quarter` column.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum QuarterLabel {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl QuarterLabel {
    pub fn from_month(month: u32) -> Option<Self> {
        match month {
            1..=3 => Some(Self::Q1),
            4..=6 => Some(Self::Q2),
            7..=9 => Some(Self::Q3),
            10..=12 => Some(Self::Q4),
            _ => None,
        }
    }

    pub fn from_number(n: u32) -> Option<Self> {
        match n {
            1 => Some(Self::Q1),
            2 => Some(Self::Q2),
            3 => Some(Self::Q3),
            4 => Some(Self::Q4),
            _ => None,
        }
    }

    /// First month of the quarter.
    pub fn start_month(self) -> u32 {
        match self {
            Self::Q1 => 1,
            Self::Q2 => 4,
            Self::Q3 => 7,
            Self::Q4 => 10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

impl fmt::Display for QuarterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed quarter value: the date itself plus its year and quarter label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarQuarter {
    pub date: NaiveDate,
    pub year: i32,
    pub label: QuarterLabel,
}

impl CalendarQuarter {
    pub fn from_date(date: NaiveDate) -> Self {
        // month() is always 1..=12
        let label = QuarterLabel::from_month(date.month()).unwrap_or(QuarterLabel::Q1);
        Self {
            date,
            year: date.year(),
            label,
        }
    }

    /// Accepts ISO dates (`2024-04-01`, optionally with a time) and period
    /// strings (`2024Q2`, `2024-Q2`, `2024 q2`).
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(Self::from_date(date));
        }
        for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(Self::from_date(datetime.date()));
            }
        }

        Self::parse_period(raw)
    }

    fn parse_period(raw: &str) -> Option<Self> {
        let upper = raw.to_ascii_uppercase();
        let (year_part, quarter_part) = upper.split_once('Q')?;
        let year: i32 = year_part.trim().trim_end_matches('-').trim().parse().ok()?;
        let label = QuarterLabel::from_number(quarter_part.trim().parse().ok()?)?;
        let date = NaiveDate::from_ymd_opt(year, label.start_month(), 1)?;
        Some(Self::from_date(date))
    }
}
