//! Typed NMEA field parsers. Every parser takes the raw ASCII bytes
//! of a single already-tokenised field and returns `None` on any
//! non-conforming digit, which the caller turns into a sink-state transition
//! for the whole sentence.

use crate::types::UtcTime;
use crate::util::POW10;

fn digit(byte: u8) -> Option<u32> {
    if byte.is_ascii_digit() {
        Some(u32::from(byte - b'0'))
    } else {
        None
    }
}

fn parse_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() {
        return None;
    }
    let mut value: u32 = 0;
    for &b in bytes {
        value = value.checked_mul(10)?.checked_add(digit(b)?)?;
    }
    Some(value)
}

/// `HHMMSS(.sss)`, right-padded to milliseconds. Only the time-of-day
/// fields of [`UtcTime`] are set; the caller fills in the date separately.
pub fn parse_time(bytes: &[u8]) -> Option<UtcTime> {
    if bytes.len() < 6 {
        return None;
    }
    let hour = parse_digits(&bytes[0..2])?;
    let minute = parse_digits(&bytes[2..4])?;
    let second = parse_digits(&bytes[4..6])?;
    if hour > 23 || minute > 59 || second > 60 {
        return None;
    }
    let mut millis = 0u32;
    if bytes.len() > 6 {
        if bytes[6] != b'.' {
            return None;
        }
        let frac = &bytes[7..];
        if frac.len() > 3 {
            return None;
        }
        let mut scaled = 0u32;
        for &b in frac {
            scaled = scaled * 10 + digit(b)?;
        }
        let pad = 3 - frac.len();
        millis = scaled * POW10[pad];
    }
    Some(UtcTime {
        year: 0,
        month: 1,
        day: 1,
        hour: hour as u8,
        minute: minute as u8,
        second: second as u8,
        millis: millis as u16,
    })
}

/// `DDMM.mmmmmmm` plus hemisphere character, giving a signed 1e-7 degree value.
pub fn parse_lat_lon(bytes: &[u8], deg_digits: usize, hemi: u8, pos: u8, neg: u8) -> Option<i32> {
    if bytes.len() < deg_digits + 1 {
        return None;
    }
    let deg = parse_digits(&bytes[..deg_digits])?;
    let rest = &bytes[deg_digits..];
    let dot = rest.iter().position(|&b| b == b'.')?;
    let min_int = parse_digits(&rest[..dot])?;
    let frac = &rest[dot + 1..];
    if frac.len() > 7 || frac.is_empty() {
        return None;
    }
    if min_int >= 60 {
        return None;
    }
    let mut min_frac = 0u64;
    for &b in frac {
        min_frac = min_frac * 10 + u64::from(digit(b)?);
    }
    let pad = 7 - frac.len();
    let min_frac_e7 = min_frac * u64::from(POW10[pad]);
    let minutes_e7 = u64::from(min_int) * 10_000_000 + min_frac_e7;
    // round(min / 60 * 1e7)
    let rounded = (minutes_e7 + 30) / 60;
    let magnitude = u64::from(deg) * 10_000_000 + rounded;
    let magnitude = i32::try_from(magnitude).ok()?;
    if hemi == pos {
        Some(magnitude)
    } else if hemi == neg {
        Some(-magnitude)
    } else {
        None
    }
}

pub fn parse_latitude(bytes: &[u8], hemi: u8) -> Option<i32> {
    let value = parse_lat_lon(bytes, 2, hemi, b'N', b'S')?;
    if value.unsigned_abs() > 89 * 10_000_000 + 9_999_999 {
        return None;
    }
    Some(value)
}

pub fn parse_longitude(bytes: &[u8], hemi: u8) -> Option<i32> {
    let value = parse_lat_lon(bytes, 3, hemi, b'E', b'W')?;
    if value.unsigned_abs() > 179 * 10_000_000 + 9_999_999 {
        return None;
    }
    Some(value)
}

/// Fixed-point decimal with scale `s`: `integer * 10^s + fractional`,
/// truncating digits beyond `s` and left-shifting short fractions.
pub fn parse_fixed_point(bytes: &[u8], scale: u32) -> Option<i64> {
    if bytes.is_empty() {
        return None;
    }
    let (neg, bytes) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        _ => (false, bytes),
    };
    if bytes.is_empty() {
        return None;
    }
    let dot = bytes.iter().position(|&b| b == b'.');
    let (int_part, frac_part) = match dot {
        Some(idx) => (&bytes[..idx], &bytes[idx + 1..]),
        None => (bytes, &bytes[0..0]),
    };
    let int_val = if int_part.is_empty() {
        0
    } else {
        i64::from(parse_digits(int_part)?)
    };
    let mut frac_val: i64 = 0;
    let take = frac_part.len().min(scale as usize);
    for &b in &frac_part[..take] {
        frac_val = frac_val * 10 + i64::from(digit(b)?);
    }
    // Validate any truncated trailing digits are still digits.
    for &b in &frac_part[take..] {
        digit(b)?;
    }
    let pad = scale as usize - take;
    let frac_val = frac_val * i64::from(POW10[pad]);
    let magnitude = int_val * i64::from(POW10[scale as usize]) + frac_val;
    Some(if neg { -magnitude } else { magnitude })
}

pub fn parse_unsigned(bytes: &[u8]) -> Option<u32> {
    parse_digits(bytes)
}

/// `DDMMYY`: two-digit year below 80 is 2000+YY, else 1900+YY; stored as
/// `year - 1980` to match [`UtcTime`].
pub fn parse_date(bytes: &[u8], time: &mut UtcTime) -> Option<()> {
    if bytes.len() != 6 {
        return None;
    }
    let day = parse_digits(&bytes[0..2])?;
    let month = parse_digits(&bytes[2..4])?;
    let yy = parse_digits(&bytes[4..6])?;
    if day == 0 || day > 31 || month == 0 || month > 12 {
        return None;
    }
    let full_year = if yy < 80 { 2000 + yy } else { 1900 + yy };
    let since_1980 = full_year.checked_sub(1980)?;
    if since_1980 > 127 {
        return None;
    }
    time.year = since_1980 as u8;
    time.month = month as u8;
    time.day = day as u8;
    Some(())
}

/// Converts knots*1e-3 fixed point (scale 3) to millimetres/second.
pub fn knots_e3_to_mm_per_s(knots_e3: i64) -> Option<u32> {
    let v = u64::try_from(knots_e3).ok()?;
    let mm_s = (v * 1852 + 1800) / 3600;
    u32::try_from(mm_s).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_time_with_fraction() {
        let t = parse_time(b"074155.799").unwrap();
        assert_eq!((t.hour, t.minute, t.second, t.millis), (7, 41, 55, 799));
    }

    #[test]
    fn parses_time_without_fraction() {
        let t = parse_time(b"235960").unwrap();
        assert_eq!((t.hour, t.minute, t.second, t.millis), (23, 59, 60, 0));
    }

    #[test]
    fn rejects_bad_time() {
        assert!(parse_time(b"249900").is_none());
        assert!(parse_time(b"07415X").is_none());
    }

    #[test]
    fn parses_latitude_matches_known_value() {
        // 3723.2475,N => 37 + 23.2475/60 degrees north.
        let v = parse_latitude(b"3723.2475", b'N').unwrap();
        assert_eq!(v, 373_874_583);
    }

    #[test]
    fn parses_longitude_matches_known_value() {
        let v = parse_longitude(b"12158.3416", b'W').unwrap();
        assert_eq!(v, -1_219_723_600);
    }

    #[test]
    fn parses_fixed_point_truncates_extra_digits() {
        assert_eq!(parse_fixed_point(b"1.8", 2), Some(180));
        assert_eq!(parse_fixed_point(b"1.8956", 2), Some(189));
        assert_eq!(parse_fixed_point(b"-30.0", 3), Some(-30_000));
    }

    #[test]
    fn parses_date_before_and_after_y2k() {
        let mut t = UtcTime::default();
        parse_date(b"010118", &mut t).unwrap();
        assert_eq!((t.year, t.month, t.day), (38, 1, 1));

        let mut t2 = UtcTime::default();
        parse_date(b"150199", &mut t2).unwrap();
        assert_eq!((t2.year, t2.month, t2.day), (19, 1, 15));
    }

    #[test]
    fn knots_conversion_matches_expected_speed() {
        // 0.5 knots*1e-3 scale means field "0.5" parsed with scale 3 => 500.
        let knots_e3 = parse_fixed_point(b"0.5", 3).unwrap();
        let mm_s = knots_e3_to_mm_per_s(knots_e3).unwrap();
        assert_eq!(mm_s, 257);
    }
}
