/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn parse_month(s: &str) -> Option<u32> {
    let s = s.to_ascii_lowercase();
    MONTHS.iter().position(|m| *m == s).map(|i| i as u32 + 1)
}

/// Parse `Mon DD HH:MM` or `Mon DD YYYY`.
///
/// Without a year, the entry is taken from the last twelve months.
pub(super) fn parse_list_time(
    month: &str,
    day: &str,
    time_or_year: &str,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let month = parse_month(month)?;
    let day = day.parse::<u32>().ok()?;

    match time_or_year.split_once(':') {
        Some((h, m)) => {
            let time = NaiveTime::from_hms_opt(h.parse().ok()?, m.parse().ok()?, 0)?;
            let year = now.year();
            let this_year = NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_time(time));
            match this_year {
                Some(dt) if dt <= now + TimeDelta::days(1) => Some(dt),
                _ => NaiveDate::from_ymd_opt(year - 1, month, day).map(|d| d.and_time(time)),
            }
        }
        None => {
            let year = time_or_year.parse::<i32>().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)
        }
    }
}
