//! Recurring bill schedules.
//!
//! A paid recurring bill spawns a successor due one interval after the paid
//! bill's own due date. Month steps clamp to the end of the target month
//! (Jan 31 + 1 month = Feb 29 in a leap year).

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePeriod {
    Days,
    Weeks,
    Months,
}

/// "Every `frequency` `period`s".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Recurrence {
    pub frequency: u32,
    pub period: RecurrencePeriod,
}

impl Recurrence {
    pub const fn monthly() -> Self {
        Recurrence {
            frequency: 1,
            period: RecurrencePeriod::Months,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.frequency == 0 {
            return Err(ValidationError::must_be_positive("recurrence frequency"));
        }
        Ok(())
    }

    /// Due date one interval after `due`.
    ///
    /// ## Example
    /// ```rust
    /// use chrono::NaiveDate;
    /// use shopkeep_core::Recurrence;
    ///
    /// let due = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    /// let next = Recurrence::monthly().next_due_date(due).unwrap();
    /// assert_eq!(next, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    /// ```
    pub fn next_due_date(&self, due: NaiveDate) -> CoreResult<NaiveDate> {
        let n = self.frequency;
        let next = match self.period {
            RecurrencePeriod::Days => due.checked_add_days(Days::new(n as u64)),
            RecurrencePeriod::Weeks => due.checked_add_days(Days::new(n as u64 * 7)),
            RecurrencePeriod::Months => due.checked_add_months(Months::new(n)),
        };
        next.ok_or(CoreError::DateOutOfRange { from: due })
    }

    /// Human label for the dashboard ("Monthly", "Every 2 weeks").
    pub fn label(&self) -> String {
        match (self.frequency, self.period) {
            (1, RecurrencePeriod::Days) => "Daily".into(),
            (1, RecurrencePeriod::Weeks) => "Weekly".into(),
            (1, RecurrencePeriod::Months) => "Monthly".into(),
            (n, RecurrencePeriod::Days) => format!("Every {n} days"),
            (n, RecurrencePeriod::Weeks) => format!("Every {n} weeks"),
            (n, RecurrencePeriod::Months) => format!("Every {n} months"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_from_first_of_month() {
        let next = Recurrence::monthly().next_due_date(day(2024, 1, 1)).unwrap();
        assert_eq!(next, day(2024, 2, 1));
    }

    #[test]
    fn month_end_clamps() {
        let r = Recurrence::monthly();
        assert_eq!(r.next_due_date(day(2024, 1, 31)).unwrap(), day(2024, 2, 29));
        assert_eq!(r.next_due_date(day(2023, 1, 31)).unwrap(), day(2023, 2, 28));
    }

    #[test]
    fn quarterly_crosses_year() {
        let r = Recurrence {
            frequency: 3,
            period: RecurrencePeriod::Months,
        };
        assert_eq!(r.next_due_date(day(2024, 11, 15)).unwrap(), day(2025, 2, 15));
    }

    #[test]
    fn days_and_weeks() {
        let every_10_days = Recurrence {
            frequency: 10,
            period: RecurrencePeriod::Days,
        };
        assert_eq!(
            every_10_days.next_due_date(day(2024, 2, 25)).unwrap(),
            day(2024, 3, 6)
        );

        let fortnightly = Recurrence {
            frequency: 2,
            period: RecurrencePeriod::Weeks,
        };
        assert_eq!(
            fortnightly.next_due_date(day(2024, 12, 25)).unwrap(),
            day(2025, 1, 8)
        );
        assert_eq!(fortnightly.label(), "Every 2 weeks");
    }

    #[test]
    fn zero_frequency_is_invalid() {
        let r = Recurrence {
            frequency: 0,
            period: RecurrencePeriod::Days,
        };
        assert!(r.validate().is_err());
        assert!(Recurrence::monthly().validate().is_ok());
    }
}
