//! Typed views over UBX message payloads. Every accessor copies the
//! relevant bytes out of the wire buffer and assembles integers with
//! `from_le_bytes` rather than casting a pointer, so the parse is defined
//! behaviour regardless of the payload's alignment in memory.

use crate::types::{FixQuality, SatelliteFlags, TrackingState, UtcTime};

fn le_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn le_i32(b: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

/// `NAV-DOP` (class 0x01, id 0x04, 18 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavDop {
    pub itow: u32,
    /// Hundredths, wire-native (already matches [`crate::types::Location`]'s scale).
    pub pdop: u16,
    pub hdop: u16,
    pub vdop: u16,
}

impl NavDop {
    pub fn from_payload(b: &[u8]) -> Option<Self> {
        if b.len() < crate::constants::NAV_DOP_LEN {
            return None;
        }
        Some(Self {
            itow: le_u32(b, 0),
            pdop: le_u16(b, 6),
            hdop: le_u16(b, 12),
            vdop: le_u16(b, 10),
        })
    }
}

/// `NAV-PVT` (class 0x01, id 0x07, 84 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavPvt {
    pub itow: u32,
    pub time: UtcTime,
    pub fix_type: u8,
    pub flags: u8,
    pub numsv: u8,
    /// 1e-7 degrees.
    pub lon: i32,
    /// 1e-7 degrees.
    pub lat: i32,
    /// Ellipsoidal height, millimetres.
    pub height: i32,
    /// Height above mean sea level, millimetres.
    pub height_msl: i32,
    pub h_acc_mm: u32,
    pub v_acc_mm: u32,
    pub vel_n_mm_s: i32,
    pub vel_e_mm_s: i32,
    pub vel_d_mm_s: i32,
    pub g_speed_mm_s: u32,
    /// 1e-5 degrees.
    pub heading: i32,
}

impl NavPvt {
    pub fn from_payload(b: &[u8]) -> Option<Self> {
        if b.len() < crate::constants::NAV_PVT_LEN {
            return None;
        }
        let year = le_u16(b, 4);
        let year_since_1980 = year.checked_sub(1980)?;
        if year_since_1980 > 127 {
            return None;
        }
        Some(Self {
            itow: le_u32(b, 0),
            time: UtcTime {
                year: year_since_1980 as u8,
                month: b[6],
                day: b[7],
                hour: b[8],
                minute: b[9],
                second: b[10],
                millis: 0,
            },
            fix_type: b[20],
            flags: b[21],
            numsv: b[23],
            lon: le_i32(b, 24),
            lat: le_i32(b, 28),
            height: le_i32(b, 32),
            height_msl: le_i32(b, 36),
            h_acc_mm: le_u32(b, 40),
            v_acc_mm: le_u32(b, 44),
            vel_n_mm_s: le_i32(b, 48),
            vel_e_mm_s: le_i32(b, 52),
            vel_d_mm_s: le_i32(b, 56),
            g_speed_mm_s: le_u32(b, 60),
            heading: le_i32(b, 64),
        })
    }

    /// Geoid separation, `hMSL - hAE`.
    pub fn separation_mm(&self) -> i32 {
        self.height_msl - self.height
    }

    /// Climb rate, positive up (`-vD`).
    pub fn climb_mm_s(&self) -> i32 {
        -self.vel_d_mm_s
    }

    /// Derived from the flags byte: bit7/6 indicate RTK fixed/float; short of
    /// that, bit0 (fix ok) with bit1 (diff used) distinguishes differential
    /// from plain autonomous.
    pub fn quality(&self) -> FixQuality {
        if self.flags & 0x80 != 0 {
            FixQuality::RtkFixed
        } else if self.flags & 0x40 != 0 {
            FixQuality::RtkFloat
        } else if self.flags & 0x01 != 0 {
            if self.flags & 0x02 != 0 {
                FixQuality::Differential
            } else {
                FixQuality::Autonomous
            }
        } else {
            FixQuality::None
        }
    }
}

/// `NAV-TIMEGPS` (class 0x01, id 0x20, 16 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavTimeGps {
    pub itow: u32,
    pub week: u16,
    pub leap_seconds: i8,
    pub valid: u8,
}

impl NavTimeGps {
    pub fn from_payload(b: &[u8]) -> Option<Self> {
        if b.len() < crate::constants::NAV_TIMEGPS_LEN {
            return None;
        }
        Some(Self {
            itow: le_u32(b, 0),
            week: le_u16(b, 8),
            leap_seconds: b[10] as i8,
            valid: b[11],
        })
    }

    /// `(valid & 0x03) == 0x03`: both the week number and leap-second count
    /// are known.
    pub fn is_valid(&self) -> bool {
        self.valid & 0x03 == 0x03
    }
}

/// One decoded record from a `NAV-SVINFO` payload, already mapped to
/// a canonical PRN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvInfoRecord {
    pub prn: u16,
    pub state: TrackingState,
    pub flags: SatelliteFlags,
    pub snr: u8,
    pub elevation: i16,
    pub azimuth: u16,
}

impl SvInfoRecord {
    /// Decodes one 12-byte record; `None` if the `svid` maps to no canonical
    /// PRN.
    pub fn from_record(b: &[u8; crate::constants::NAV_SVINFO_RECORD_LEN]) -> Option<Self> {
        let svid = b[1];
        let raw_flags = b[2];
        let quality = b[3];
        let snr = b[4];
        let elevation = b[5] as i8;
        let azimuth = le_u16(b, 6) as i16;

        let prn = super::prn::canonical_prn(svid)?;
        let mut flags = SatelliteFlags::empty();
        if raw_flags & 0x01 != 0 {
            flags |= SatelliteFlags::NAVIGATING;
        }
        if raw_flags & 0x02 != 0 {
            flags |= SatelliteFlags::CORRECTION;
        }
        let state = if (0x02..=0x07).contains(&quality) {
            TrackingState::Tracking
        } else {
            TrackingState::Searching
        };
        Some(Self {
            prn,
            state,
            flags,
            snr,
            elevation: i16::from(elevation),
            azimuth: azimuth as u16,
        })
    }
}

/// Two-byte `ACK-ACK`/`ACK-NACK` body: the class+id of the acknowledged
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckBody {
    pub class: u8,
    pub id: u8,
}

impl AckBody {
    pub fn from_payload(b: &[u8]) -> Option<Self> {
        if b.len() < crate::constants::ACK_PAYLOAD_LEN {
            return None;
        }
        Some(Self {
            class: b[0],
            id: b[1],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav_pvt_fixture() -> [u8; crate::constants::NAV_PVT_LEN] {
        let mut b = [0u8; crate::constants::NAV_PVT_LEN];
        b[0..4].copy_from_slice(&123_456_000u32.to_le_bytes());
        b[4..6].copy_from_slice(&2018u16.to_le_bytes());
        b[6] = 1; // month
        b[7] = 1; // day
        b[8] = 7; // hour
        b[9] = 41; // minute
        b[10] = 55; // second
        b[20] = 3; // fix type: 3D
        b[21] = 0x03; // flags: fixOK | diffSoln
        b[23] = 8; // numsv
        b[24..28].copy_from_slice(&(-1_219_723_600i32).to_le_bytes());
        b[28..32].copy_from_slice(&372_374_583i32.to_le_bytes());
        b[32..36].copy_from_slice(&80_000i32.to_le_bytes());
        b[36..40].copy_from_slice(&50_000i32.to_le_bytes());
        b[60..64].copy_from_slice(&257u32.to_le_bytes());
        b[64..68].copy_from_slice(&18_000_000i32.to_le_bytes());
        b
    }

    #[test]
    fn parses_nav_pvt_fixture() {
        let pvt = NavPvt::from_payload(&nav_pvt_fixture()).unwrap();
        assert_eq!(pvt.itow, 123_456_000);
        assert_eq!((pvt.time.year, pvt.time.month, pvt.time.day), (38, 1, 1));
        assert_eq!((pvt.time.hour, pvt.time.minute, pvt.time.second), (7, 41, 55));
        assert_eq!(pvt.lat, 372_374_583);
        assert_eq!(pvt.lon, -1_219_723_600);
        assert_eq!(pvt.separation_mm(), -30_000);
        assert_eq!(pvt.g_speed_mm_s, 257);
        assert_eq!(pvt.heading, 18_000_000);
        assert_eq!(pvt.quality(), FixQuality::Differential);
    }

    #[test]
    fn nav_pvt_rejects_short_payload() {
        assert!(NavPvt::from_payload(&[0u8; 10]).is_none());
    }

    #[test]
    fn nav_timegps_validity_requires_both_bits() {
        let mut b = [0u8; crate::constants::NAV_TIMEGPS_LEN];
        b[11] = 0x03;
        assert!(NavTimeGps::from_payload(&b).unwrap().is_valid());
        b[11] = 0x01;
        assert!(!NavTimeGps::from_payload(&b).unwrap().is_valid());
    }

    #[test]
    fn svinfo_record_maps_prn_and_flags() {
        let mut rec = [0u8; crate::constants::NAV_SVINFO_RECORD_LEN];
        rec[1] = 5; // svid => gps prn 5
        rec[2] = 0x01; // navigating
        rec[3] = 0x04; // quality => tracking
        rec[4] = 42; // snr
        let parsed = SvInfoRecord::from_record(&rec).unwrap();
        assert_eq!(parsed.prn, 5);
        assert_eq!(parsed.snr, 42);
        assert_eq!(parsed.state, TrackingState::Tracking);
        assert!(parsed.flags.contains(SatelliteFlags::NAVIGATING));
    }

    #[test]
    fn svinfo_record_unmapped_svid_is_none() {
        let mut rec = [0u8; crate::constants::NAV_SVINFO_RECORD_LEN];
        rec[1] = 0;
        assert!(SvInfoRecord::from_record(&rec).is_none());
    }
}
