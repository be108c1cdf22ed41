// src/domain/dates.rs

use chrono::{Datelike, Duration, NaiveDate};

const MONTHS: [&str; 12] = [
    "январь", "февраль", "март", "апрель", "май", "июнь",
    "июль", "август", "сентябрь", "октябрь", "ноябрь", "декабрь",
];

const YESTERDAY: &str = "вчера";
const TODAY: &str = "сегодня";

pub fn month_name(date: NaiveDate) -> &'static str {
    MONTHS[date.month0() as usize]
}

fn day_month(date: NaiveDate) -> String {
    format!("{}, {}", date.day(), month_name(date))
}

/// Replaces "вчера"/"сегодня" with "<day>, <month>" relative to `today`.
/// Anything else (already absolute dates) is returned unchanged.
pub fn resolve_relative_date(raw: &str, today: NaiveDate) -> String {
    if raw.contains(YESTERDAY) {
        let yesterday = today - Duration::days(1);
        raw.replace(YESTERDAY, &day_month(yesterday))
    } else if raw.contains(TODAY) {
        raw.replace(TODAY, &day_month(today))
    } else {
        raw.to_string()
    }
}
