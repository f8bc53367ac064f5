// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::{Date, Month};

/// Readings taken on or before this day of the month bill the previous month.
pub const CARRY_BACK_LAST_DAY: u8 = 7;

/// Label used for a period that cannot be computed yet.
pub const EMPTY_PERIOD_LABEL: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub from_date: Option<Date>,
    pub to_date: Option<Date>,
    pub label: String,
}

impl BillingPeriod {
    pub fn empty() -> Self {
        Self {
            from_date: None,
            to_date: None,
            label: EMPTY_PERIOD_LABEL.to_owned(),
        }
    }

    pub fn is_computable(&self) -> bool {
        self.from_date.is_some() && self.to_date.is_some()
    }

    /// Whether `date` falls inside the period. Always false for an empty one.
    pub fn contains(&self, date: Date) -> bool {
        match (self.from_date, self.to_date) {
            (Some(from), Some(to)) => from <= date && date <= to,
            _ => false,
        }
    }
}

pub fn billing_period(reading_date: Date) -> BillingPeriod {
    let (mut year, mut month) = (reading_date.year(), reading_date.month());
    if reading_date.day() <= CARRY_BACK_LAST_DAY {
        if month == Month::January {
            year -= 1;
        }
        month = month.previous();
    }

    let last_day = month.length(year);
    let (Ok(from_date), Ok(to_date)) = (
        Date::from_calendar_date(year, month, 1),
        Date::from_calendar_date(year, month, last_day),
    ) else {
        return BillingPeriod::empty();
    };

    BillingPeriod {
        from_date: Some(from_date),
        to_date: Some(to_date),
        label: format!("{month}-{year}"),
    }
}

/// Like [`billing_period`] for raw input. Unparsable text yields the empty
/// period instead of an error.
pub fn billing_period_for(raw: &str) -> BillingPeriod {
    parse_reading_date(raw).map_or_else(BillingPeriod::empty, billing_period)
}

/// Accepts `YYYY-MM-DD` and ISO datetimes, using their date part.
pub fn parse_reading_date(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    let date_part = trimmed
        .split_once(['T', ' '])
        .map_or(trimmed, |(date, _)| date);
    Date::parse(
        date_part,
        &time::macros::format_description!("[year]-[month]-[day]"),
    )
    .ok()
}
