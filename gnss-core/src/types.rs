//! The fixed-point, no-alloc data model a fused fix and its satellites are
//! expressed in.
//!
//! Every numeric field keeps the wire-accurate fixed-point representation
//! rather than converting to floating point: `latitude`/`longitude` are
//! signed 1e-7 degree integers, `altitude`/`separation` are signed
//! millimetres, `pdop`/`hdop`/`vdop` are unsigned hundredths. Consumers that
//! want floating point convert at the edge; the core never does, so a fused
//! fix is bit-reproducible from its inputs.

use bitflags::bitflags;
use core::fmt;

use crate::constants::{DEFAULT_MAX_SATELLITES, DOP_UNKNOWN};

/// A UTC timestamp as carried on the wire: no timezone, an explicit leap
/// second (`second == 60`), and years counted from 1980 so the whole struct
/// fits in a handful of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UtcTime {
    /// Years since 1980, 0..=127.
    pub year: u8,
    /// 1..=12.
    pub month: u8,
    /// 1..=31.
    pub day: u8,
    /// 0..=23.
    pub hour: u8,
    /// 0..=59.
    pub minute: u8,
    /// 0..=60 (60 marks a leap second).
    pub second: u8,
    /// 0..=999.
    pub millis: u16,
}

impl UtcTime {
    /// GPS epoch, also the fill value used when no sentence/message in an
    /// epoch carried a valid time.
    pub const GPS_EPOCH: UtcTime = UtcTime {
        year: 0, // 1980
        month: 1,
        day: 6,
        hour: 0,
        minute: 0,
        second: 0,
        millis: 0,
    };
}

impl Default for UtcTime {
    fn default() -> Self {
        Self::GPS_EPOCH
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            1980 + u16::from(self.year),
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.millis
        )
    }
}

/// Dimensionality of a fused fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LocationType {
    #[default]
    None,
    TimeOnly,
    TwoD,
    ThreeD,
}

/// Fix quality, unified across the NMEA `GGA` quality indicator and the
/// UBX `NAV-PVT` flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FixQuality {
    #[default]
    None,
    Estimated,
    Autonomous,
    Differential,
    RtkFloat,
    RtkFixed,
}

bitflags! {
    /// Which optional fields of a [`Location`] were actually populated by
    /// the sentences/messages fused into it, before the default fill
    /// overwrote the absent ones with their wire sentinels.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct LocationMask: u16 {
        const TIME          = 1 << 0;
        const POSITION      = 1 << 1;
        const ALTITUDE      = 1 << 2;
        const SPEED_COURSE  = 1 << 3;
        const DOP           = 1 << 4;
        const NUMSV         = 1 << 5;
        const ACCURACY      = 1 << 6;
        const CORRECTION    = 1 << 7;
    }
}

/// One fused position/velocity/time snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Location {
    pub location_type: LocationType,
    pub quality: FixQuality,
    pub mask: LocationMask,
    pub numsv: u8,
    /// 1e-7 degrees, signed, positive north.
    pub latitude: i32,
    /// 1e-7 degrees, signed, positive east.
    pub longitude: i32,
    /// Millimetres above the reference ellipsoid, signed.
    pub altitude: i32,
    /// Geoid separation in millimetres, signed (`height_msl - height_ellipsoid`).
    pub separation: i32,
    /// Ground speed in millimetres/second.
    pub speed: u32,
    /// Course over ground, 1e-5 degrees.
    pub course: u32,
    /// Climb rate, millimetres/second, positive up.
    pub climb: i32,
    /// Estimated horizontal position error, millimetres.
    pub ehpe: u32,
    /// Estimated vertical position error, millimetres.
    pub evpe: u32,
    /// Hundredths (e.g. 1.8 => 180). [`crate::constants::DOP_UNKNOWN`] when absent.
    pub pdop: u16,
    pub hdop: u16,
    pub vdop: u16,
    /// GPS-UTC leap second correction.
    pub correction: i16,
    pub time: UtcTime,
}

impl Default for Location {
    fn default() -> Self {
        Self {
            location_type: LocationType::None,
            quality: FixQuality::None,
            mask: LocationMask::empty(),
            numsv: 0,
            latitude: 0,
            longitude: 0,
            altitude: 0,
            separation: 0,
            speed: 0,
            course: 0,
            climb: 0,
            ehpe: 0,
            evpe: 0,
            pdop: DOP_UNKNOWN,
            hdop: DOP_UNKNOWN,
            vdop: DOP_UNKNOWN,
            correction: 0,
            time: UtcTime::GPS_EPOCH,
        }
    }
}

/// A satellite's tracking state, independent of the `Navigating`/`Correction`
/// flags layered on top once a Location for the same epoch has been emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackingState {
    #[default]
    Searching,
    Tracking,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SatelliteFlags: u8 {
        /// Set on satellites whose PRN is present in the "used SV" bitset
        /// once the fix they contributed to has been emitted.
        const NAVIGATING = 1 << 0;
        /// Differential/SBAS correction data is being used for this satellite.
        const CORRECTION = 1 << 1;
    }
}

/// One satellite entry of a fused [`SatelliteSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Satellite {
    /// Canonical PRN, 1..=255.
    pub prn: u16,
    pub state: TrackingState,
    pub flags: SatelliteFlags,
    pub snr: u8,
    /// Degrees above the horizon.
    pub elevation: i16,
    /// Degrees from true north.
    pub azimuth: u16,
}

/// A bounded, stack-allocated set of [`Satellite`] entries. `MAX` mirrors
/// [`crate::constants::DEFAULT_MAX_SATELLITES`] by default, overridable by
/// embedders that track fewer or more constellations at once.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SatelliteSet<const MAX: usize = DEFAULT_MAX_SATELLITES> {
    sats: [Satellite; MAX],
    len: usize,
}

impl<const MAX: usize> SatelliteSet<MAX> {
    pub const fn new() -> Self {
        Self {
            sats: [Satellite {
                prn: 0,
                state: TrackingState::Searching,
                flags: SatelliteFlags::empty(),
                snr: 0,
                elevation: 0,
                azimuth: 0,
            }; MAX],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        MAX
    }

    pub fn as_slice(&self) -> &[Satellite] {
        &self.sats[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [Satellite] {
        &mut self.sats[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Shortens the set to `len` entries, dropping the tail. A no-op if
    /// `len >= self.len()`.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// Appends a satellite entry; silently drops it past `MAX` (the wire
    /// protocols never carry more than a few dozen entries per epoch, so
    /// this is a defensive bound, not a normal-path truncation).
    pub fn push(&mut self, sat: Satellite) {
        if self.len < MAX {
            self.sats[self.len] = sat;
            self.len += 1;
        }
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Satellite> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> core::slice::IterMut<'_, Satellite> {
        self.as_mut_slice().iter_mut()
    }
}

impl<const MAX: usize> Default for SatelliteSet<MAX> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const MAX: usize> IntoIterator for &'a SatelliteSet<MAX> {
    type Item = &'a Satellite;
    type IntoIter = core::slice::Iter<'a, Satellite>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
