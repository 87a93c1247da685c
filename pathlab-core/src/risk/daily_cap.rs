//! Daily entry cap — limits how many positions may be opened per calendar day.

use chrono::NaiveDate;
use serde::Serialize;

/// Entries counted against the calendar date of the bar timestamps.
///
/// The count resets on the first bar of a new date. With no cap every entry
/// is allowed and nothing is counted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyEntryCounter {
    cap: Option<usize>,
    day: Option<NaiveDate>,
    entries_today: usize,
}

impl DailyEntryCounter {
    pub fn new(cap: Option<usize>) -> Self {
        Self {
            cap,
            ..Self::default()
        }
    }

    fn count_on(&self, date: NaiveDate) -> usize {
        if self.day == Some(date) {
            self.entries_today
        } else {
            0
        }
    }

    /// May another position be opened on `date`?
    pub fn allows(&self, date: NaiveDate) -> bool {
        self.cap.map_or(true, |cap| self.count_on(date) < cap)
    }

    /// Count an entry made on `date`.
    pub fn record(&mut self, date: NaiveDate) {
        if self.cap.is_none() {
            return;
        }
        self.entries_today = self.count_on(date) + 1;
        self.day = Some(date);
    }

    pub fn entries_on(&self, date: NaiveDate) -> usize {
        self.count_on(date)
    }
}
