//! Parser support utilities: integer square root, fixed-point
//! scaling tables, and GPS-week/UTC time arithmetic.

use chrono::{Datelike, NaiveDate, TimeDelta};

use crate::types::UtcTime;

/// Powers of ten up to the widest fixed-point scale the NMEA field parsers
/// need (a 7-fractional-digit latitude/longitude minute).
pub const POW10: [u32; 8] = [1, 10, 100, 1_000, 10_000, 100_000, 1_000_000, 10_000_000];

/// Integer square root via Newton's method, used by the GST combined
/// standard-deviation computation where no floating point is
/// available/wanted on the decode hot path.
pub const fn isqrt_u64(value: u64) -> u32 {
    if value == 0 {
        return 0;
    }
    let mut x = value;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x as u32
}

/// The GPS epoch, 1980-01-06, as a [`chrono::NaiveDate`].
fn gps_epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1980, 1, 6).expect("1980-01-06 is a valid date")
}

/// Converts a GPS week number + time-of-week (milliseconds) into a
/// [`UtcTime`], ignoring leap seconds.
pub fn utc_from_gps_week_tow(week: u16, tow_ms: u32) -> Option<UtcTime> {
    let days = i64::from(tow_ms / 86_400_000);
    let rem_ms = tow_ms % 86_400_000;
    let date = gps_epoch_date()
        .checked_add_signed(TimeDelta::try_weeks(i64::from(week))?)?
        .checked_add_signed(TimeDelta::try_days(days)?)?;

    let hour = rem_ms / 3_600_000;
    let minute = (rem_ms % 3_600_000) / 60_000;
    let second = (rem_ms % 60_000) / 1000;
    let millis = rem_ms % 1000;

    let year_since_1980 = date.year().checked_sub(1980)?;
    if !(0..=127).contains(&year_since_1980) {
        return None;
    }

    Some(UtcTime {
        year: year_since_1980 as u8,
        month: date.month() as u8,
        day: date.day() as u8,
        hour: hour as u8,
        minute: minute as u8,
        second: second as u8,
        millis: millis as u16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isqrt_matches_known_squares() {
        assert_eq!(isqrt_u64(0), 0);
        assert_eq!(isqrt_u64(1), 1);
        assert_eq!(isqrt_u64(81), 9);
        assert_eq!(isqrt_u64(80), 8);
        assert_eq!(isqrt_u64(1_000_000), 1000);
    }

    #[test]
    fn gps_week_zero_is_epoch() {
        let t = utc_from_gps_week_tow(0, 0).unwrap();
        assert_eq!(t, UtcTime::GPS_EPOCH);
    }

    #[test]
    fn gps_week_tow_rolls_into_next_day() {
        // One week and one day after the epoch, at noon.
        let tow = 86_400_000 + 12 * 3_600_000;
        let t = utc_from_gps_week_tow(1, tow).unwrap();
        assert_eq!(t.day, 8);
        assert_eq!(t.hour, 12);
    }
}
