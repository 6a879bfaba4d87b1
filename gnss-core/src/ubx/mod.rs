//! UBX message dispatcher: reads the class+id+length header the
//! framer already validated against the sync bytes, buffers small
//! single-shot payloads whole, and streams `NAV-SVINFO` one 12-byte record
//! at a time so the scratch buffer never grows with the satellite count.

pub mod messages;
pub mod prn;

use crate::constants::{
    ACK_PAYLOAD_LEN, NAV_DOP_LEN, NAV_PVT_LEN, NAV_SVINFO_HEADER_LEN, NAV_SVINFO_RECORD_LEN,
    NAV_TIMEGPS_LEN, UBX_CLASS_ACK, UBX_CLASS_NAV, UBX_ID_ACK_ACK, UBX_ID_ACK_NACK, UBX_ID_NAV_DOP,
    UBX_ID_NAV_PVT, UBX_ID_NAV_SVINFO, UBX_ID_NAV_TIMEGPS,
};
use crate::fusion::SeenMask;
use crate::types::{Location, LocationMask, SatelliteSet};
use crate::util::utc_from_gps_week_tow;
use messages::{AckBody, NavDop, NavPvt, NavTimeGps, SvInfoRecord};

/// Which recognised message the header identified; `Unknown` messages still
/// stream through (so the framer's length accounting stays correct) but are
/// dropped on frame completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum MessageKind {
    #[default]
    Unknown,
    NavDop,
    NavPvt,
    NavTimeGps,
    NavSvInfo,
    AckAck,
    AckNack,
}

fn classify(class: u8, id: u8) -> MessageKind {
    match (class, id) {
        (UBX_CLASS_NAV, UBX_ID_NAV_DOP) => MessageKind::NavDop,
        (UBX_CLASS_NAV, UBX_ID_NAV_PVT) => MessageKind::NavPvt,
        (UBX_CLASS_NAV, UBX_ID_NAV_TIMEGPS) => MessageKind::NavTimeGps,
        (UBX_CLASS_NAV, UBX_ID_NAV_SVINFO) => MessageKind::NavSvInfo,
        (UBX_CLASS_ACK, UBX_ID_ACK_ACK) => MessageKind::AckAck,
        (UBX_CLASS_ACK, UBX_ID_ACK_NACK) => MessageKind::AckNack,
        _ => MessageKind::Unknown,
    }
}

/// The acknowledged class+id, and whether it was a positive ACK, surfaced
/// from a completed `ACK-ACK`/`ACK-NACK` frame for the configuration
/// orchestrator to match against its pending-command slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UbxAck {
    pub ack: bool,
    pub class: u8,
    pub id: u8,
}

/// Largest single-shot payload any recognised non-chunked message carries;
/// sizes the generic scratch buffer so it never has to grow.
const SCRATCH_LEN: usize = NAV_PVT_LEN;

/// Per-frame and cross-frame UBX dispatcher state.
#[derive(Debug)]
pub struct UbxContext {
    kind: MessageKind,
    len: u16,
    offset: u16,
    scratch: [u8; SCRATCH_LEN],
    svinfo_header: [u8; NAV_SVINFO_HEADER_LEN],
    svinfo_header_len: usize,
    svinfo_record: [u8; NAV_SVINFO_RECORD_LEN],
    svinfo_record_len: usize,
    /// Satellites decoded from the frame in progress; committed to the
    /// working [`SatelliteSet`] only once the frame's checksum validates.
    svinfo_ready: SatelliteSet,
    /// itow shared across position-set messages this epoch; a mismatch
    /// clears the accumulator.
    itow: Option<u32>,
}

impl Default for UbxContext {
    fn default() -> Self {
        Self::new()
    }
}

impl UbxContext {
    pub const fn new() -> Self {
        Self {
            kind: MessageKind::Unknown,
            len: 0,
            offset: 0,
            scratch: [0; SCRATCH_LEN],
            svinfo_header: [0; NAV_SVINFO_HEADER_LEN],
            svinfo_header_len: 0,
            svinfo_record: [0; NAV_SVINFO_RECORD_LEN],
            svinfo_record_len: 0,
            svinfo_ready: SatelliteSet::new(),
            itow: None,
        }
    }
}

/// Called when the framer reports a validated header. Resets per-frame state.
pub fn header(ctx: &mut UbxContext, class: u8, id: u8, len: u16) {
    ctx.kind = classify(class, id);
    ctx.len = len;
    ctx.offset = 0;
    ctx.svinfo_header_len = 0;
    ctx.svinfo_record_len = 0;
    ctx.svinfo_ready.clear();
}

/// Called for every payload byte the framer streams. `NAV-SVINFO` is
/// processed in 12-byte chunks as they fill; every other recognised message
/// is buffered whole in `scratch` up to its known fixed length.
pub fn payload_byte(ctx: &mut UbxContext, byte: u8) {
    match ctx.kind {
        MessageKind::NavSvInfo => {
            if ctx.svinfo_header_len < NAV_SVINFO_HEADER_LEN {
                ctx.svinfo_header[ctx.svinfo_header_len] = byte;
                ctx.svinfo_header_len += 1;
            } else {
                ctx.svinfo_record[ctx.svinfo_record_len] = byte;
                ctx.svinfo_record_len += 1;
                if ctx.svinfo_record_len == NAV_SVINFO_RECORD_LEN {
                    if let Some(sat) = SvInfoRecord::from_record(&ctx.svinfo_record) {
                        ctx.svinfo_ready.push(crate::types::Satellite {
                            prn: sat.prn,
                            state: sat.state,
                            flags: sat.flags,
                            snr: sat.snr,
                            elevation: sat.elevation,
                            azimuth: sat.azimuth,
                        });
                    }
                    ctx.svinfo_record_len = 0;
                }
            }
        },
        _ => {
            if (ctx.offset as usize) < ctx.scratch.len() {
                ctx.scratch[ctx.offset as usize] = byte;
            }
        },
    }
    ctx.offset += 1;
}

/// Checks the shared UBX itow epoch key. On mismatch, clears the
/// working accumulator and starts a fresh epoch keyed on `itow`.
fn epoch_matches(ctx: &mut UbxContext, seen: &mut SeenMask, location: &mut Location, itow: u32) {
    match ctx.itow {
        Some(prev) if prev == itow => {},
        _ => {
            if ctx.itow.is_some() {
                *location = Location::default();
                seen.remove(SeenMask::UBX_NAV_PVT | SeenMask::UBX_NAV_DOP | SeenMask::UBX_NAV_TIMEGPS);
            }
            ctx.itow = Some(itow);
        },
    }
}

/// Called when the framer reports a completed, checksum-valid frame.
/// Returns an ack tuple for `ACK-ACK`/`ACK-NACK` frames.
pub fn frame_complete(
    ctx: &mut UbxContext,
    seen: &mut SeenMask,
    location: &mut Location,
    sats: &mut SatelliteSet,
) -> Option<UbxAck> {
    let result = apply_message(ctx, seen, location, sats);
    ctx.kind = MessageKind::Unknown;
    result
}

fn apply_message(
    ctx: &mut UbxContext,
    seen: &mut SeenMask,
    location: &mut Location,
    sats: &mut SatelliteSet,
) -> Option<UbxAck> {
    match ctx.kind {
        MessageKind::NavDop => {
            let dop = NavDop::from_payload(&ctx.scratch[..ctx.len as usize])?;
            epoch_matches(ctx, seen, location, dop.itow);
            location.pdop = dop.pdop;
            location.hdop = dop.hdop;
            location.vdop = dop.vdop;
            location.mask |= LocationMask::DOP;
            *seen |= SeenMask::UBX_NAV_DOP;
            None
        },
        MessageKind::NavPvt => {
            let pvt = NavPvt::from_payload(&ctx.scratch[..ctx.len as usize])?;
            epoch_matches(ctx, seen, location, pvt.itow);
            location.time = pvt.time;
            location.mask |= LocationMask::TIME;
            location.latitude = pvt.lat;
            location.longitude = pvt.lon;
            location.mask |= LocationMask::POSITION;
            location.altitude = pvt.height_msl;
            location.separation = pvt.separation_mm();
            location.mask |= LocationMask::ALTITUDE;
            location.numsv = pvt.numsv;
            location.mask |= LocationMask::NUMSV;
            location.speed = pvt.g_speed_mm_s;
            location.course = pvt.heading.max(0) as u32;
            location.climb = pvt.climb_mm_s();
            location.mask |= LocationMask::SPEED_COURSE;
            location.ehpe = pvt.h_acc_mm;
            location.evpe = pvt.v_acc_mm;
            location.mask |= LocationMask::ACCURACY;
            location.quality = pvt.quality();
            *seen |= SeenMask::UBX_NAV_PVT;
            None
        },
        MessageKind::NavTimeGps => {
            let tg = NavTimeGps::from_payload(&ctx.scratch[..ctx.len as usize])?;
            if !tg.is_valid() {
                return None;
            }
            epoch_matches(ctx, seen, location, tg.itow);
            if let Some(time) = utc_from_gps_week_tow(tg.week, tg.itow) {
                location.time = time;
                location.mask |= LocationMask::TIME;
            }
            location.correction = i16::from(tg.leap_seconds);
            location.mask |= LocationMask::CORRECTION;
            *seen |= SeenMask::UBX_NAV_TIMEGPS;
            None
        },
        MessageKind::NavSvInfo => {
            for sat in ctx.svinfo_ready.iter() {
                sats.push(*sat);
            }
            ctx.svinfo_ready.clear();
            *seen |= SeenMask::UBX_NAV_SVINFO;
            None
        },
        MessageKind::AckAck | MessageKind::AckNack => {
            let body = AckBody::from_payload(&ctx.scratch[..ACK_PAYLOAD_LEN])?;
            Some(UbxAck {
                ack: ctx.kind == MessageKind::AckAck,
                class: body.class,
                id: body.id,
            })
        },
        MessageKind::Unknown => None,
    }
}
