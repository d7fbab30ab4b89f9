//! Weekly and monthly spending summaries.
//!
//! Everything here is a pure function of the records and a reference instant.
//! Calendar boundaries and weekday names are taken in the time zone of that
//! instant. Weeks start on Sunday at 00:00.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::Expense;

/// Short weekday labels, indexed by days from Sunday.
const WEEKDAY_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Summary {
    pub weekly_total: Decimal,
    pub monthly_total: Decimal,
    pub weekly_count: usize,
    pub monthly_count: usize,
    pub weekly_by_category: BTreeMap<String, Decimal>,
    pub monthly_by_category: BTreeMap<String, Decimal>,
    /// Sunday first; days without spending are left out.
    pub weekly_by_weekday: Vec<(&'static str, Decimal)>,
}

impl Summary {
    /// No expense falls in either window.
    pub fn is_empty(&self) -> bool {
        self.weekly_count == 0 && self.monthly_count == 0
    }
}

pub fn summarize<Tz: TimeZone>(records: &[Expense], now: &DateTime<Tz>) -> Summary {
    let weekly = filter_since(records, &week_window_start(now));
    let monthly = filter_since(records, &month_window_start(now));
    let tz = now.timezone();

    Summary {
        weekly_total: sum_amounts(weekly.iter().copied()),
        monthly_total: sum_amounts(monthly.iter().copied()),
        weekly_count: weekly.len(),
        monthly_count: monthly.len(),
        weekly_by_category: group_by_category(weekly.iter().copied()),
        monthly_by_category: group_by_category(monthly.iter().copied()),
        weekly_by_weekday: group_by_weekday(weekly.iter().copied(), &tz),
    }
}

/// Sunday 00:00 of the week containing `now`.
pub fn week_window_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let today = now.date_naive();
    let since_sunday = now.weekday().num_days_from_sunday();
    start_of_day(&now.timezone(), today - Duration::days(i64::from(since_sunday)))
}

/// The 1st of the month containing `now`, at 00:00.
pub fn month_window_start<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let today = now.date_naive();
    start_of_day(&now.timezone(), today - Duration::days(i64::from(today.day0())))
}

/// Records dated at or after `start`, in their original order.
pub fn filter_since<'a, Tz: TimeZone>(
    records: &'a [Expense],
    start: &DateTime<Tz>,
) -> Vec<&'a Expense> {
    let start = start.with_timezone(&Utc);
    records.iter().filter(|e| e.date >= start).collect()
}

/// Exact sum of amounts. Not rounded. Saturates at the limits of `Decimal`.
pub fn sum_amounts<'a>(records: impl IntoIterator<Item = &'a Expense>) -> Decimal {
    records
        .into_iter()
        .fold(Decimal::ZERO, |total, e| total.saturating_add(e.amount))
}

pub fn group_by_category<'a>(
    records: impl IntoIterator<Item = &'a Expense>,
) -> BTreeMap<String, Decimal> {
    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();
    for e in records {
        let total = totals.entry(e.category.clone()).or_default();
        *total = total.saturating_add(e.amount);
    }
    totals
        .into_iter()
        .map(|(category, total)| (category, round_display(total)))
        .collect()
}

/// Totals per short weekday name of each record's date in `tz`.
pub fn group_by_weekday<'a, Tz: TimeZone>(
    records: impl IntoIterator<Item = &'a Expense>,
    tz: &Tz,
) -> Vec<(&'static str, Decimal)> {
    let mut totals: [Option<Decimal>; 7] = [None; 7];
    for e in records {
        let day = e.date.with_timezone(tz).weekday().num_days_from_sunday() as usize;
        let total = totals[day].get_or_insert(Decimal::ZERO);
        *total = total.saturating_add(e.amount);
    }
    std::iter::successors(Some(Weekday::Sun), |day| Some(day.succ()))
        .zip(totals)
        .filter_map(|(day, total)| total.map(|t| (weekday_label(day), round_display(t))))
        .collect()
}

fn weekday_label(day: Weekday) -> &'static str {
    WEEKDAY_LABELS[day.num_days_from_sunday() as usize]
}

/// Round half away from zero to cents, keeping two decimal places so `0.3`
/// displays as `0.30`.
pub fn round_display(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let midnight = date.and_time(NaiveTime::MIN);
    // Midnight skipped by a clock change: the day begins at the first
    // quarter hour after the gap. A day skipped entirely falls back to UTC.
    (0..96)
        .find_map(|quarter| {
            tz.from_local_datetime(&(midnight + Duration::minutes(15 * quarter)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}
