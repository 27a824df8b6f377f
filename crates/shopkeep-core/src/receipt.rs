//! # Receipt Numbering
//!
//! Receipt numbers are human-readable and scoped to a business day:
//!
//! ```text
//!   R-240315-0007
//!   │ │      └──── sequence within the day, zero-padded to 4 digits
//!   │ └─────────── business date (YYMMDD) in the shop's UTC offset
//!   └───────────── prefix
//! ```
//!
//! The sequence itself is kept in a per-day counter document
//! (`receipts-YYMMDD`) that the ledger advances in the same atomic batch as
//! the sale. This module only does the naming and the calendar math.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Utc};

use crate::error::ValidationError;

/// Default receipt prefix.
pub const RECEIPT_PREFIX: &str = "R";

/// Largest UTC offset chrono accepts, in minutes (exclusive).
const MAX_OFFSET_MINUTES: i32 = 24 * 60;

// =============================================================================
// Business Clock
// =============================================================================

/// Resolves instants to the shop's calendar day.
///
/// ## Example
/// ```rust
/// use chrono::{NaiveDate, TimeZone, Utc};
/// use shopkeep_core::receipt::BusinessClock;
///
/// // UTC-5: 03:00 UTC on the 16th is still the 15th locally
/// let clock = BusinessClock::from_offset_minutes(-300).unwrap();
/// let instant = Utc.with_ymd_and_hms(2024, 3, 16, 3, 0, 0).unwrap();
/// assert_eq!(clock.date_of(instant), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessClock {
    offset: FixedOffset,
}

impl BusinessClock {
    /// Clock for a fixed UTC offset in minutes (east positive).
    pub fn from_offset_minutes(minutes: i32) -> Result<Self, ValidationError> {
        if minutes.abs() >= MAX_OFFSET_MINUTES {
            return Err(ValidationError::OutOfRange {
                field: "utc_offset_minutes".to_string(),
                min: -(MAX_OFFSET_MINUTES as i64) + 1,
                max: MAX_OFFSET_MINUTES as i64 - 1,
            });
        }

        let offset = FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
            ValidationError::InvalidFormat {
                field: "utc_offset_minutes".to_string(),
                reason: format!("{minutes} is not a valid offset"),
            }
        })?;

        Ok(BusinessClock { offset })
    }

    pub fn utc() -> Self {
        BusinessClock { offset: Utc.fix() }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Business date of an instant.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// The half-open UTC range `[start, end)` covering a business date.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_midnight = date.and_time(NaiveTime::default());
        let start = (local_midnight - Duration::seconds(self.offset.local_minus_utc() as i64))
            .and_utc();
        (start, start + Duration::days(1))
    }
}

impl Default for BusinessClock {
    fn default() -> Self {
        BusinessClock::utc()
    }
}

// =============================================================================
// Receipt Numbers
// =============================================================================

/// Next receipt number for a day that already has `existing_today` receipts.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use shopkeep_core::receipt::next_receipt_number;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
/// assert_eq!(next_receipt_number(0, day), "R-240315-0001");
/// assert_eq!(next_receipt_number(41, day), "R-240315-0042");
/// ```
pub fn next_receipt_number(existing_today: u64, date: NaiveDate) -> String {
    format_receipt_number(RECEIPT_PREFIX, date, existing_today + 1)
}

/// Formats a receipt number. Sequences past 9999 grow wider.
pub fn format_receipt_number(prefix: &str, date: NaiveDate, sequence: u64) -> String {
    format!("{}-{}-{:04}", prefix, date.format("%y%m%d"), sequence)
}

/// Id of the counter document holding a day's last issued sequence.
pub fn counter_id(date: NaiveDate) -> String {
    format!("receipts-{}", date.format("%y%m%d"))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_first_receipt_of_day() {
        assert_eq!(next_receipt_number(0, day(2024, 1, 5)), "R-240105-0001");
    }

    #[test]
    fn test_sequence_grows_past_padding() {
        assert_eq!(next_receipt_number(9999, day(2024, 1, 5)), "R-240105-10000");
    }

    #[test]
    fn test_custom_prefix() {
        assert_eq!(
            format_receipt_number("SHOP2", day(2025, 12, 31), 3),
            "SHOP2-251231-0003"
        );
    }

    #[test]
    fn test_counter_id() {
        assert_eq!(counter_id(day(2024, 3, 15)), "receipts-240315");
    }

    #[test]
    fn test_business_date_east_of_utc() {
        let clock = BusinessClock::from_offset_minutes(330).unwrap();
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 20, 0, 0).unwrap();
        assert_eq!(clock.date_of(instant), day(2024, 3, 16));
    }

    #[test]
    fn test_day_bounds() {
        let clock = BusinessClock::from_offset_minutes(-300).unwrap();
        let (start, end) = clock.day_bounds(day(2024, 3, 15));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 15, 5, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 16, 5, 0, 0).unwrap());
        assert_eq!(clock.date_of(start), day(2024, 3, 15));
        assert_eq!(clock.date_of(end - Duration::seconds(1)), day(2024, 3, 15));
    }

    #[test]
    fn test_rejects_absurd_offset() {
        assert!(BusinessClock::from_offset_minutes(24 * 60).is_err());
        assert!(BusinessClock::from_offset_minutes(-24 * 60).is_err());
    }
}
