// Date windows: the candidate calendar dates a search is willing to consider

use crate::error::SearchError;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

// Longest explicit range we expand into individual days
pub const MAX_WINDOW_DAYS: i64 = 366;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSpec {
    Fixed(NaiveDate),
    Month { year: i32, month: u32 },
    Range { start: NaiveDate, end: NaiveDate },
    // The date itself plus `days` on either side
    Around { date: NaiveDate, days: u32 },
}

impl DateSpec {
    // Parses a "YYYY-MM" month specifier
    pub fn parse_month(value: &str) -> Result<DateSpec, SearchError> {
        let (year, month) = value
            .trim()
            .split_once('-')
            .ok_or_else(|| SearchError::Configuration(format!("Invalid month: {}", value)))?;
        let year: i32 = year
            .parse()
            .map_err(|_| SearchError::Configuration(format!("Invalid month: {}", value)))?;
        let month: u32 = month
            .parse()
            .map_err(|_| SearchError::Configuration(format!("Invalid month: {}", value)))?;
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(SearchError::Configuration(format!("Invalid month: {}", value)));
        }
        Ok(DateSpec::Month { year, month })
    }

    pub fn parse_date(value: &str) -> Result<NaiveDate, SearchError> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map_err(|e| SearchError::Configuration(format!("Invalid date '{}': {}", value, e)))
    }

    pub fn window(&self) -> Result<DateWindow, SearchError> {
        DateWindow::from_spec(self)
    }
}

// A closed set of dates plus the date the user literally asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateWindow {
    dates: Vec<NaiveDate>,
    primary: NaiveDate,
}

impl DateWindow {
    pub fn single(date: NaiveDate) -> Self {
        Self {
            dates: vec![date],
            primary: date,
        }
    }

    pub fn from_spec(spec: &DateSpec) -> Result<Self, SearchError> {
        match *spec {
            DateSpec::Fixed(date) => Ok(Self::single(date)),
            DateSpec::Month { year, month } => {
                let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
                    SearchError::Configuration(format!("Invalid month: {}-{:02}", year, month))
                })?;
                let next = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)
                }
                .ok_or_else(|| {
                    SearchError::Configuration(format!("Month out of range: {}-{:02}", year, month))
                })?;
                Self::range(start, next - Duration::days(1), start)
            }
            DateSpec::Range { start, end } => Self::range(start, end, start),
            DateSpec::Around { date, days } => {
                let span = 2 * days as i64 + 1;
                if span > MAX_WINDOW_DAYS {
                    return Err(SearchError::Configuration(format!(
                        "Flexible window of +/- {} days exceeds {} days",
                        days, MAX_WINDOW_DAYS
                    )));
                }
                let days = Duration::days(days as i64);
                let (start, end) = date
                    .checked_sub_signed(days)
                    .zip(date.checked_add_signed(days))
                    .ok_or_else(|| {
                        SearchError::Configuration(format!("Date window around {} out of range", date))
                    })?;
                Self::range(start, end, date)
            }
        }
    }

    fn range(start: NaiveDate, end: NaiveDate, primary: NaiveDate) -> Result<Self, SearchError> {
        if end < start {
            return Err(SearchError::Configuration(format!(
                "Date range ends ({}) before it starts ({})",
                end, start
            )));
        }
        let span = (end - start).num_days() + 1;
        if span > MAX_WINDOW_DAYS {
            return Err(SearchError::Configuration(format!(
                "Date range of {} days exceeds {} days",
                span, MAX_WINDOW_DAYS
            )));
        }

        let dates = start.iter_days().take(span as usize).collect();
        Ok(Self { dates, primary })
    }

    pub fn primary(&self) -> NaiveDate {
        self.primary
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    // Primary date first, then by distance to it (earlier wins ties)
    pub fn by_proximity(&self) -> Vec<NaiveDate> {
        let mut dates = self.dates.clone();
        dates.sort_by_key(|d| ((*d - self.primary).num_days().abs(), *d));
        dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use test_case::test_case;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test_case(2025, 6, 30; "#1 thirty day month")]
    #[test_case(2024, 2, 29; "#2 leap february")]
    #[test_case(2025, 2, 28; "#3 regular february")]
    #[test_case(2025, 12, 31; "#4 december rolls over the year")]
    fn test_month_window_covers_every_day(year: i32, month: u32, expected_days: usize) {
        let window = DateWindow::from_spec(&DateSpec::Month { year, month }).unwrap();
        assert_eq!(window.len(), expected_days);
        assert_eq!(window.primary(), NaiveDate::from_ymd_opt(year, month, 1).unwrap());
        assert_eq!(window.dates().first().unwrap().day(), 1);
        assert_eq!(window.dates().last().unwrap().day() as usize, expected_days);
    }

    #[test]
    fn test_around_window_orders_by_proximity() {
        let window = DateSpec::Around {
            date: date("2025-06-10"),
            days: 2,
        }
        .window()
        .unwrap();

        assert_eq!(window.len(), 5);
        assert_eq!(
            window.by_proximity(),
            vec![
                date("2025-06-10"),
                date("2025-06-09"),
                date("2025-06-11"),
                date("2025-06-08"),
                date("2025-06-12"),
            ]
        );
    }

    #[test]
    fn test_invalid_windows_are_configuration_errors() {
        let backwards = DateSpec::Range {
            start: date("2025-06-10"),
            end: date("2025-06-01"),
        };
        assert!(matches!(
            backwards.window(),
            Err(SearchError::Configuration(_))
        ));

        let too_long = DateSpec::Range {
            start: date("2025-01-01"),
            end: date("2027-01-01"),
        };
        assert!(too_long.window().is_err());

        assert!(DateSpec::parse_month("2025-13").is_err());
        assert!(DateSpec::parse_month("June").is_err());
        assert_eq!(
            DateSpec::parse_month("2025-06").unwrap(),
            DateSpec::Month {
                year: 2025,
                month: 6
            }
        );
    }

    #[test_case(182, true; "#1 widest window that fits")]
    #[test_case(183, false; "#2 one day too wide")]
    #[test_case(u32::MAX, false; "#3 huge flex does not overflow")]
    fn test_around_window_bounds(days: u32, ok: bool) {
        let window = DateSpec::Around {
            date: date("2025-06-10"),
            days,
        }
        .window();
        match window {
            Ok(window) => {
                assert!(ok);
                assert_eq!(window.len(), 2 * days as usize + 1);
                assert!(window.contains(date("2025-06-10")));
                assert!(window.contains(date("2024-12-10")));
            }
            Err(e) => {
                assert!(!ok);
                assert!(matches!(e, SearchError::Configuration(_)));
            }
        }
    }

    #[test]
    fn test_around_window_at_calendar_edge_is_an_error() {
        let edge = DateSpec::Around {
            date: NaiveDate::MAX,
            days: 1,
        };
        assert!(matches!(edge.window(), Err(SearchError::Configuration(_))));
    }
}
