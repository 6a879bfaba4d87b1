//! Wire-level constants shared by the [`crate::framer`], [`crate::nmea`], and
//! [`crate::ubx`] modules.

/// `$` — marks the start of an NMEA sentence, and unconditionally resyncs the
/// outer framer back to NMEA-payload start.
pub const NMEA_SYNC_CHAR: u8 = 0x24;
/// `*` — terminates the NMEA payload and introduces the two checksum digits.
pub const NMEA_CHECKSUM_CHAR: u8 = 0x2a;
/// `,` — terminates an NMEA field.
pub const NMEA_FIELD_SEP: u8 = 0x2c;
pub const NMEA_CR: u8 = 0x0d;
pub const NMEA_LF: u8 = 0x0a;
/// Per-field accumulation buffer size; exceeding this resyncs the framer.
pub const NMEA_MAX_FIELD_LEN: usize = 96;

pub const UBX_SYNC_CHAR_1: u8 = 0xb5;
pub const UBX_SYNC_CHAR_2: u8 = 0x62;
pub const UBX_CLASS_NAV: u8 = 0x01;
pub const UBX_CLASS_ACK: u8 = 0x05;

pub const UBX_ID_NAV_DOP: u8 = 0x04;
pub const UBX_ID_NAV_PVT: u8 = 0x07;
pub const UBX_ID_NAV_TIMEGPS: u8 = 0x20;
pub const UBX_ID_NAV_SVINFO: u8 = 0x30;
pub const UBX_ID_ACK_NACK: u8 = 0x00;
pub const UBX_ID_ACK_ACK: u8 = 0x01;

pub const NAV_DOP_LEN: usize = 18;
pub const NAV_PVT_LEN: usize = 84;
pub const NAV_TIMEGPS_LEN: usize = 16;
pub const NAV_SVINFO_HEADER_LEN: usize = 8;
pub const NAV_SVINFO_RECORD_LEN: usize = 12;
pub const ACK_PAYLOAD_LEN: usize = 2;

/// Highest PRN indexed by the "used SV" bitset.
pub const MAX_USED_PRN: u16 = 96;

/// Default bound on a fused satellite snapshot; generous enough for a
/// composite GPS+GLONASS view with margin.
pub const DEFAULT_MAX_SATELLITES: usize = 32;

/// Sentinel for an absent DOP value on the wire and in a finalised [`crate::types::Location`].
pub const DOP_UNKNOWN: u16 = 9999;

/// ACK timeout for the UBX configuration table replay.
pub const DEFAULT_ACK_TIMEOUT_MS: u32 = 250;
