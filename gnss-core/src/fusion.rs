//! Location/Satellite fusion: tracks which sentences/messages have
//! contributed to the epoch in progress and decides when a complete
//! [`Location`] or [`SatelliteSet`] snapshot is ready to hand to the caller.

use bitflags::bitflags;

use crate::constants::DOP_UNKNOWN;
use crate::types::{Location, LocationMask, LocationType, SatelliteFlags, SatelliteSet, UtcTime};

bitflags! {
    /// One bit per sentence/message kind that can contribute to an epoch,
    /// plus a `SOLUTION` bit that gates satellite emission on a prior
    /// Location emission for the same epoch.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SeenMask: u32 {
        const NMEA_GGA     = 1 << 0;
        const NMEA_RMC     = 1 << 1;
        const NMEA_GSA_GPS = 1 << 2;
        const NMEA_GSA_GLO = 1 << 3;
        const NMEA_GSV_GPS = 1 << 4;
        const NMEA_GSV_GLO = 1 << 5;
        const NMEA_GST     = 1 << 6;
        const UBX_NAV_PVT     = 1 << 8;
        const UBX_NAV_DOP     = 1 << 9;
        const UBX_NAV_TIMEGPS = 1 << 10;
        const UBX_NAV_SVINFO  = 1 << 11;
        const SOLUTION = 1 << 16;
    }
}

/// Which constellation(s) a GSA talker has committed the session to tracking
/// for the remainder of this NMEA stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TalkerMode {
    #[default]
    Unknown,
    SingleGps,
    SingleGlonass,
    Composite,
}

impl TalkerMode {
    /// The bits that must all be set before a Location can be finalised.
    pub fn position_expected(self) -> SeenMask {
        use SeenMask as M;
        let base = M::NMEA_GGA | M::NMEA_RMC;
        match self {
            TalkerMode::Unknown | TalkerMode::SingleGps => base | M::NMEA_GSA_GPS,
            TalkerMode::SingleGlonass => base | M::NMEA_GSA_GLO,
            TalkerMode::Composite => base | M::NMEA_GSA_GPS | M::NMEA_GSA_GLO,
        }
    }

    /// The bits that must all be set before satellites can be emitted.
    pub fn constellation_expected(self) -> SeenMask {
        use SeenMask as M;
        match self {
            TalkerMode::Unknown | TalkerMode::SingleGps => M::NMEA_GSV_GPS,
            TalkerMode::SingleGlonass => M::NMEA_GSV_GLO,
            TalkerMode::Composite => M::NMEA_GSV_GPS | M::NMEA_GSV_GLO,
        }
    }
}

/// UBX position-set and constellation-set bits.
pub const UBX_POSITION_EXPECTED: SeenMask = SeenMask::UBX_NAV_PVT
    .union(SeenMask::UBX_NAV_DOP)
    .union(SeenMask::UBX_NAV_TIMEGPS);
pub const UBX_CONSTELLATION_EXPECTED: SeenMask = SeenMask::UBX_NAV_SVINFO;

/// Applies the sentinel default fill for any mask bit that never got set
/// this epoch, then clears the position/GST bits and sets `SOLUTION`.
pub fn finalize_location(seen: &mut SeenMask, location: &mut Location) {
    if !location.mask.contains(LocationMask::DOP) {
        location.pdop = DOP_UNKNOWN;
        location.hdop = DOP_UNKNOWN;
        location.vdop = DOP_UNKNOWN;
    }
    if !location.mask.contains(LocationMask::ALTITUDE) {
        location.altitude = 0;
        location.separation = 0;
    }
    if !location.mask.contains(LocationMask::TIME) {
        location.time = UtcTime::GPS_EPOCH;
    }
    if location.mask.contains(LocationMask::POSITION) {
        location.location_type = if location.mask.contains(LocationMask::ALTITUDE) {
            LocationType::ThreeD
        } else {
            LocationType::TwoD
        };
    } else if location.mask.contains(LocationMask::TIME) {
        location.location_type = LocationType::TimeOnly;
    }

    *seen &= !(SeenMask::NMEA_GGA
        | SeenMask::NMEA_RMC
        | SeenMask::NMEA_GSA_GPS
        | SeenMask::NMEA_GSA_GLO
        | SeenMask::NMEA_GST
        | SeenMask::UBX_NAV_PVT
        | SeenMask::UBX_NAV_DOP
        | SeenMask::UBX_NAV_TIMEGPS);
    *seen |= SeenMask::SOLUTION;
}

/// Applies the "Navigating" flag to every satellite whose PRN is set in the
/// used-SV bitset, then clears the constellation bits and the solution bit
/// that gated this emission.
pub fn finalize_satellites(seen: &mut SeenMask, sats: &mut SatelliteSet, used_mask: &[u32; 3]) {
    for sat in sats.iter_mut() {
        if sat.prn >= 1 && sat.prn <= 96 {
            let idx = (sat.prn - 1) / 32;
            let bit = (sat.prn - 1) % 32;
            if used_mask[idx as usize] & (1 << bit) != 0 {
                sat.flags |= SatelliteFlags::NAVIGATING;
            }
        }
    }
    *seen &= !(SeenMask::NMEA_GSV_GPS
        | SeenMask::NMEA_GSV_GLO
        | SeenMask::UBX_NAV_SVINFO
        | SeenMask::SOLUTION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_gps_mode_excludes_glonass_gsa() {
        let expected = TalkerMode::SingleGps.position_expected();
        assert!(expected.contains(SeenMask::NMEA_GSA_GPS));
        assert!(!expected.contains(SeenMask::NMEA_GSA_GLO));
    }

    #[test]
    fn composite_mode_requires_both_gsa() {
        let expected = TalkerMode::Composite.position_expected();
        assert!(expected.contains(SeenMask::NMEA_GSA_GPS));
        assert!(expected.contains(SeenMask::NMEA_GSA_GLO));
    }

    #[test]
    fn finalize_location_fills_defaults() {
        let mut seen = SeenMask::NMEA_GGA | SeenMask::NMEA_RMC | SeenMask::NMEA_GSA_GPS;
        let mut loc = Location {
            mask: LocationMask::POSITION | LocationMask::TIME,
            ..Default::default()
        };
        finalize_location(&mut seen, &mut loc);
        assert_eq!(loc.pdop, DOP_UNKNOWN);
        assert_eq!(loc.altitude, 0);
        assert!(seen.contains(SeenMask::SOLUTION));
        assert!(!seen.contains(SeenMask::NMEA_GGA));
    }

    #[test]
    fn finalize_satellites_marks_used_prns() {
        let mut seen = SeenMask::SOLUTION | SeenMask::NMEA_GSV_GPS;
        let mut sats: SatelliteSet = SatelliteSet::new();
        sats.push(crate::types::Satellite {
            prn: 1,
            ..Default::default()
        });
        sats.push(crate::types::Satellite {
            prn: 5,
            ..Default::default()
        });
        let mut used = [0u32; 3];
        used[0] = 1 << 0; // PRN 1
        finalize_satellites(&mut seen, &mut sats, &used);
        assert!(sats.as_slice()[0].flags.contains(SatelliteFlags::NAVIGATING));
        assert!(!sats.as_slice()[1].flags.contains(SatelliteFlags::NAVIGATING));
        assert!(!seen.contains(SeenMask::SOLUTION));
    }
}
