//! Per-sentence field dispatch: one local accumulator per
//! in-progress sentence, merged into the session's working [`Location`] /
//! [`SatelliteSet`] only once the sentence's checksum has validated and
//! every field parsed cleanly.

use crate::fusion::{SeenMask, TalkerMode};
use crate::nmea::fields;
use crate::types::{
    FixQuality, Location, LocationMask, Satellite, SatelliteFlags, SatelliteSet, TrackingState,
    UtcTime,
};
use crate::util::isqrt_u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SentenceKind {
    #[default]
    Unknown,
    Pmtk001,
    Gga,
    Gsa,
    Gsv,
    Gst,
    Rmc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Talker {
    #[default]
    Gp,
    Gl,
    Gn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Constellation {
    Gps,
    Glonass,
}

/// Per-sentence scratch, reset at the start of every sentence (field index 0).
#[derive(Debug, Default)]
struct Scratch {
    time: Option<UtcTime>,
    lat: Option<i32>,
    lon: Option<i32>,
    lat_pending: Option<([u8; 16], u8)>,
    lon_pending: Option<([u8; 16], u8)>,
    quality: Option<u32>,
    numsv: Option<u32>,
    alt_mm: Option<i32>,
    sep_mm: Option<i32>,
    rmc_valid: Option<bool>,
    speed_mm_s: Option<u32>,
    course_e5: Option<u32>,
    pdop: Option<u16>,
    hdop: Option<u16>,
    vdop: Option<u16>,
    gsa_prns: [u16; 12],
    gsa_prn_count: usize,
    gst_sigma_lat_mm: Option<i64>,
    gst_sigma_lon_mm: Option<i64>,
    gst_sigma_alt_mm: Option<i64>,
    gsv_total: Option<u32>,
    gsv_current: Option<u32>,
    gsv_in_view: Option<u32>,
    gsv_quad_prn: Option<u16>,
    gsv_quad_elev: Option<i16>,
    gsv_quad_azim: Option<u16>,
    /// Satellites completed by quads within the *current* sentence (at most
    /// four), merged into the working set at sentence-complete time.
    gsv_ready: [Option<Satellite>; 4],
    gsv_ready_count: usize,
    pmtk_cmd: Option<u16>,
    pmtk_flag: Option<u8>,
}

/// State that must survive across the several sentences of one NMEA
/// tokenizer lifetime: talker-driven mode, used-SV bitset, and the GSV
/// multi-sentence accumulation progress.
#[derive(Debug)]
pub struct NmeaContext {
    field_buf: [u8; crate::constants::NMEA_MAX_FIELD_LEN],
    field_len: usize,
    field_index: u16,
    kind: SentenceKind,
    talker: Talker,
    sink: bool,
    scratch: Scratch,
    /// PRN usage bitset accumulated from GSA sentence(s), consumed on
    /// satellite emission.
    pub used_mask: [u32; 3],
    gsv_seen: u32,
    /// Alternates which constellation a composite (`GN`) GSA sentence is
    /// assigned to: first one seen this cycle is GPS, the next GLONASS
    ///.
    gn_gsa_toggle: bool,
    /// `(hour, minute, second, millis)` of the epoch currently being
    /// accumulated; a mismatching GGA/GST/RMC timestamp clears the epoch.
    epoch_time: Option<(u8, u8, u8, u16)>,
}

impl Default for NmeaContext {
    fn default() -> Self {
        Self::new()
    }
}

impl NmeaContext {
    pub const fn new() -> Self {
        Self {
            field_buf: [0; crate::constants::NMEA_MAX_FIELD_LEN],
            field_len: 0,
            field_index: 0,
            kind: SentenceKind::Unknown,
            talker: Talker::Gp,
            sink: false,
            scratch: Scratch {
                time: None,
                lat: None,
                lon: None,
                lat_pending: None,
                lon_pending: None,
                quality: None,
                numsv: None,
                alt_mm: None,
                sep_mm: None,
                rmc_valid: None,
                speed_mm_s: None,
                course_e5: None,
                pdop: None,
                hdop: None,
                vdop: None,
                gsa_prns: [0; 12],
                gsa_prn_count: 0,
                gst_sigma_lat_mm: None,
                gst_sigma_lon_mm: None,
                gst_sigma_alt_mm: None,
                gsv_total: None,
                gsv_current: None,
                gsv_in_view: None,
                gsv_quad_prn: None,
                gsv_quad_elev: None,
                gsv_quad_azim: None,
                gsv_ready: [None, None, None, None],
                gsv_ready_count: 0,
                pmtk_cmd: None,
                pmtk_flag: None,
            },
            used_mask: [0; 3],
            gsv_seen: 0,
            gn_gsa_toggle: false,
            epoch_time: None,
        }
    }

    pub fn reset_sentence(&mut self) {
        self.field_len = 0;
        self.field_index = 0;
        self.kind = SentenceKind::Unknown;
        self.sink = false;
        self.scratch = Scratch::default();
    }

    pub fn push_field_byte(&mut self, byte: u8) -> Result<(), crate::error::ParserError> {
        if self.field_len >= self.field_buf.len() {
            return Err(crate::error::ParserError::BufferOverflow);
        }
        self.field_buf[self.field_len] = byte;
        self.field_len += 1;
        Ok(())
    }

    fn field(&self) -> &[u8] {
        &self.field_buf[..self.field_len]
    }

    fn reject(&mut self) {
        self.sink = true;
    }
}

fn parse_address(addr: &[u8]) -> (SentenceKind, Talker) {
    if addr.starts_with(b"PMTK001") {
        return (SentenceKind::Pmtk001, Talker::Gp);
    }
    if addr.len() < 5 {
        return (SentenceKind::Unknown, Talker::Gp);
    }
    let talker = match &addr[0..2] {
        b"GL" => Talker::Gl,
        b"GN" => Talker::Gn,
        _ => Talker::Gp,
    };
    let code = &addr[2..5];
    let kind = match code {
        b"GGA" => SentenceKind::Gga,
        b"GSA" => SentenceKind::Gsa,
        b"GSV" => SentenceKind::Gsv,
        b"GST" => SentenceKind::Gst,
        b"RMC" => SentenceKind::Rmc,
        _ => SentenceKind::Unknown,
    };
    (kind, talker)
}

/// Dispatches one completed field to the handler for the current sentence
/// kind. Called once per comma (or the terminating `*`).
///
/// `sats` is only touched by a GSV out-of-order rejection, which rolls back
/// the entries this aborted cycle already pushed.
pub fn on_field(ctx: &mut NmeaContext, sats: &mut SatelliteSet) {
    if ctx.field_index == 0 {
        let (kind, talker) = parse_address(ctx.field());
        ctx.kind = kind;
        ctx.talker = talker;
        ctx.field_index += 1;
        return;
    }
    if ctx.sink {
        ctx.field_index += 1;
        return;
    }

    let idx = ctx.field_index;
    // `ctx.field()` borrows `ctx` immutably; copy it out before the `match`
    // needs `&mut ctx` for rejection/stashing.
    let mut local = [0u8; crate::constants::NMEA_MAX_FIELD_LEN];
    let len = ctx.field_len;
    local[..len].copy_from_slice(ctx.field());
    let field = &local[..len];

    match ctx.kind {
        SentenceKind::Pmtk001 => match idx {
            1 => match fields::parse_unsigned(field) {
                Some(v) => ctx.scratch.pmtk_cmd = Some(v as u16),
                None => ctx.reject(),
            },
            2 => match fields::parse_unsigned(field) {
                Some(v) => ctx.scratch.pmtk_flag = Some(v as u8),
                None => ctx.reject(),
            },
            _ => {},
        },
        SentenceKind::Gga => match idx {
            1 => match fields::parse_time(field) {
                Some(t) => ctx.scratch.time = Some(t),
                None => ctx.reject(),
            },
            2 => stash_partial(ctx, field, true),
            3 => finish_lat(ctx, field),
            4 => stash_partial(ctx, field, false),
            5 => finish_lon(ctx, field),
            6 => match fields::parse_unsigned(field) {
                Some(v) => ctx.scratch.quality = Some(v),
                None => ctx.reject(),
            },
            7 => {
                if !field.is_empty() {
                    match fields::parse_unsigned(field) {
                        Some(v) => ctx.scratch.numsv = Some(v),
                        None => ctx.reject(),
                    }
                }
            },
            9 => {
                if !field.is_empty() {
                    match fields::parse_fixed_point(field, 3).and_then(|v| i32::try_from(v).ok()) {
                        Some(v) => ctx.scratch.alt_mm = Some(v),
                        None => ctx.reject(),
                    }
                }
            },
            11 => {
                if !field.is_empty() {
                    match fields::parse_fixed_point(field, 3).and_then(|v| i32::try_from(v).ok()) {
                        Some(v) => ctx.scratch.sep_mm = Some(v),
                        None => ctx.reject(),
                    }
                }
            },
            _ => {},
        },
        SentenceKind::Rmc => match idx {
            1 => match fields::parse_time(field) {
                Some(t) => ctx.scratch.time = Some(t),
                None => ctx.reject(),
            },
            2 => match field {
                b"A" => ctx.scratch.rmc_valid = Some(true),
                b"V" => ctx.scratch.rmc_valid = Some(false),
                _ => ctx.reject(),
            },
            3 => stash_partial(ctx, field, true),
            4 => finish_lat(ctx, field),
            5 => stash_partial(ctx, field, false),
            6 => finish_lon(ctx, field),
            7 => {
                if !field.is_empty() {
                    match fields::parse_fixed_point(field, 3).and_then(fields::knots_e3_to_mm_per_s) {
                        Some(v) => ctx.scratch.speed_mm_s = Some(v),
                        None => ctx.reject(),
                    }
                }
            },
            8 => {
                if !field.is_empty() {
                    match fields::parse_fixed_point(field, 5) {
                        Some(v) if v >= 0 => ctx.scratch.course_e5 = Some(v as u32),
                        _ => ctx.reject(),
                    }
                }
            },
            9 => {
                let mut t = ctx.scratch.time.unwrap_or_default();
                if fields::parse_date(field, &mut t).is_some() {
                    ctx.scratch.time = Some(t);
                } else {
                    ctx.reject();
                }
            },
            _ => {},
        },
        SentenceKind::Gsa => match idx {
            3..=14 => {
                if !field.is_empty() {
                    match fields::parse_unsigned(field) {
                        Some(prn) => {
                            if ctx.scratch.gsa_prn_count < 12 {
                                ctx.scratch.gsa_prns[ctx.scratch.gsa_prn_count] = prn as u16;
                                ctx.scratch.gsa_prn_count += 1;
                            }
                        },
                        None => ctx.reject(),
                    }
                }
            },
            15 => match fields::parse_fixed_point(field, 2) {
                Some(v) => ctx.scratch.pdop = Some(v as u16),
                None => ctx.reject(),
            },
            16 => match fields::parse_fixed_point(field, 2) {
                Some(v) => ctx.scratch.hdop = Some(v as u16),
                None => ctx.reject(),
            },
            17 => match fields::parse_fixed_point(field, 2) {
                Some(v) => ctx.scratch.vdop = Some(v as u16),
                None => ctx.reject(),
            },
            _ => {},
        },
        SentenceKind::Gst => match idx {
            1 => match fields::parse_time(field) {
                Some(t) => ctx.scratch.time = Some(t),
                None => ctx.reject(),
            },
            6 => match fields::parse_fixed_point(field, 3) {
                Some(v) => ctx.scratch.gst_sigma_lat_mm = Some(v.abs()),
                None => ctx.reject(),
            },
            7 => match fields::parse_fixed_point(field, 3) {
                Some(v) => ctx.scratch.gst_sigma_lon_mm = Some(v.abs()),
                None => ctx.reject(),
            },
            8 => match fields::parse_fixed_point(field, 3) {
                Some(v) => ctx.scratch.gst_sigma_alt_mm = Some(v.abs()),
                None => ctx.reject(),
            },
            _ => {},
        },
        SentenceKind::Gsv => match idx {
            1 => match fields::parse_unsigned(field) {
                Some(v) => ctx.scratch.gsv_total = Some(v),
                None => ctx.reject(),
            },
            2 => match fields::parse_unsigned(field) {
                Some(v) => {
                    if ctx.gsv_seen != v.saturating_sub(1) * 4 {
                        // Out-of-order continuation: the partial sats this
                        // aborted cycle already committed don't belong to
                        // any completed constellation set, so roll them back.
                        sats.truncate(sats.len().saturating_sub(ctx.gsv_seen as usize));
                        ctx.gsv_seen = 0;
                        ctx.reject();
                    } else {
                        ctx.scratch.gsv_current = Some(v);
                    }
                },
                None => ctx.reject(),
            },
            3 => match fields::parse_unsigned(field) {
                Some(v) => ctx.scratch.gsv_in_view = Some(v),
                None => ctx.reject(),
            },
            _ => gsv_quad_field(ctx, idx, field),
        },
        SentenceKind::Unknown => {},
    }
    ctx.field_index += 1;
}

fn stash_partial(ctx: &mut NmeaContext, field: &[u8], is_lat: bool) {
    if field.len() > 16 {
        ctx.reject();
        return;
    }
    let mut buf = [0u8; 16];
    buf[..field.len()].copy_from_slice(field);
    if is_lat {
        ctx.scratch.lat_pending = Some((buf, field.len() as u8));
    } else {
        ctx.scratch.lon_pending = Some((buf, field.len() as u8));
    }
}

fn finish_lat(ctx: &mut NmeaContext, hemi_field: &[u8]) {
    let Some((buf, len)) = ctx.scratch.lat_pending.take() else {
        ctx.reject();
        return;
    };
    if len == 0 {
        // Empty lat/lon pair is allowed (e.g. RMC with no fix yet); skip.
        return;
    }
    let Some(&hemi) = hemi_field.first() else {
        ctx.reject();
        return;
    };
    match fields::parse_latitude(&buf[..len as usize], hemi) {
        Some(v) => ctx.scratch.lat = Some(v),
        None => ctx.reject(),
    }
}

fn finish_lon(ctx: &mut NmeaContext, hemi_field: &[u8]) {
    let Some((buf, len)) = ctx.scratch.lon_pending.take() else {
        ctx.reject();
        return;
    };
    if len == 0 {
        return;
    }
    let Some(&hemi) = hemi_field.first() else {
        ctx.reject();
        return;
    };
    match fields::parse_longitude(&buf[..len as usize], hemi) {
        Some(v) => ctx.scratch.lon = Some(v),
        None => ctx.reject(),
    }
}

fn gsv_quad_field(ctx: &mut NmeaContext, idx: u16, field: &[u8]) {
    let Some(base) = idx.checked_sub(4) else {
        return;
    };
    let slot = (base / 4) as usize;
    let role = base % 4;
    let Some(in_view) = ctx.scratch.gsv_in_view else {
        return;
    };
    if ctx.gsv_seen as usize + slot + 1 > in_view as usize {
        return;
    }
    match role {
        0 => {
            ctx.scratch.gsv_quad_prn = if field.is_empty() {
                None
            } else {
                fields::parse_unsigned(field).map(|v| v as u16)
            };
        },
        1 => {
            ctx.scratch.gsv_quad_elev = if field.is_empty() {
                Some(0)
            } else {
                fields::parse_unsigned(field).map(|v| v as i16)
            };
        },
        2 => {
            ctx.scratch.gsv_quad_azim = if field.is_empty() {
                Some(0)
            } else {
                fields::parse_unsigned(field).map(|v| v as u16)
            };
        },
        3 => {
            let snr = if field.is_empty() {
                None
            } else {
                fields::parse_unsigned(field).map(|v| v as u8)
            };
            if let Some(prn) = ctx.scratch.gsv_quad_prn.take() {
                let elev = ctx.scratch.gsv_quad_elev.take().unwrap_or(0);
                let azim = ctx.scratch.gsv_quad_azim.take().unwrap_or(0);
                if ctx.scratch.gsv_ready_count < ctx.scratch.gsv_ready.len() {
                    ctx.scratch.gsv_ready[ctx.scratch.gsv_ready_count] = Some(Satellite {
                        prn,
                        state: if snr.is_some() {
                            TrackingState::Tracking
                        } else {
                            TrackingState::Searching
                        },
                        flags: SatelliteFlags::empty(),
                        snr: snr.unwrap_or(0),
                        elevation: elev,
                        azimuth: azim,
                    });
                    ctx.scratch.gsv_ready_count += 1;
                }
            } else {
                ctx.scratch.gsv_quad_elev = None;
                ctx.scratch.gsv_quad_azim = None;
            }
        },
        _ => unreachable!(),
    }
}

/// Finalises the sentence that just terminated (checksum + CR/LF already
/// validated by the framer). Returns an MTK ack tuple `(command, status)`
/// when the sentence was a `PMTK001`, for the orchestrator to consume.
pub fn on_sentence_complete(
    ctx: &mut NmeaContext,
    mode: &mut TalkerMode,
    seen: &mut SeenMask,
    location: &mut Location,
    sats: &mut SatelliteSet,
) -> Option<(u16, u8)> {
    // The last field (terminated by '*' rather than a comma) was already
    // flushed via `on_field` when the framer emitted `NmeaPayloadEnd`.
    let result = if ctx.sink {
        None
    } else {
        apply_sentence(ctx, mode, seen, location, sats)
    };
    ctx.reset_sentence();
    result
}

/// Checks the shared NMEA epoch key. On mismatch, clears the
/// working accumulator and starts a fresh epoch keyed on `time`.
fn epoch_matches(ctx: &mut NmeaContext, seen: &mut SeenMask, location: &mut Location, time: UtcTime) {
    let key = (time.hour, time.minute, time.second, time.millis);
    match ctx.epoch_time {
        Some(prev) if prev == key => {},
        _ => {
            if ctx.epoch_time.is_some() {
                *location = Location::default();
                seen.remove(
                    SeenMask::NMEA_GGA
                        | SeenMask::NMEA_RMC
                        | SeenMask::NMEA_GSA_GPS
                        | SeenMask::NMEA_GSA_GLO
                        | SeenMask::NMEA_GST,
                );
                ctx.used_mask = [0; 3];
            }
            ctx.epoch_time = Some(key);
        },
    }
}

fn apply_sentence(
    ctx: &mut NmeaContext,
    mode: &mut TalkerMode,
    seen: &mut SeenMask,
    location: &mut Location,
    sats: &mut SatelliteSet,
) -> Option<(u16, u8)> {
    match ctx.kind {
        SentenceKind::Pmtk001 => {
            let cmd = ctx.scratch.pmtk_cmd?;
            let flag = ctx.scratch.pmtk_flag?;
            return Some((cmd, flag));
        },
        SentenceKind::Gga => {
            let time = ctx.scratch.time?;
            epoch_matches(ctx, seen, location, time);
            location.time = time;
            location.mask |= LocationMask::TIME;
            if let (Some(lat), Some(lon)) = (ctx.scratch.lat, ctx.scratch.lon) {
                location.latitude = lat;
                location.longitude = lon;
                location.mask |= LocationMask::POSITION;
            }
            if let Some(numsv) = ctx.scratch.numsv {
                location.numsv = numsv as u8;
                location.mask |= LocationMask::NUMSV;
            }
            if let Some(alt) = ctx.scratch.alt_mm {
                location.altitude = alt;
                location.separation = ctx.scratch.sep_mm.unwrap_or(0);
                location.mask |= LocationMask::ALTITUDE;
            }
            if let Some(q) = ctx.scratch.quality {
                location.quality = match q {
                    0 => FixQuality::None,
                    2 => FixQuality::Differential,
                    4 => FixQuality::RtkFixed,
                    5 => FixQuality::RtkFloat,
                    6 => FixQuality::Estimated,
                    _ => FixQuality::Autonomous,
                };
            }
            *seen |= SeenMask::NMEA_GGA;
        },
        SentenceKind::Rmc => {
            if ctx.scratch.rmc_valid != Some(true) {
                return None;
            }
            let time = ctx.scratch.time?;
            epoch_matches(ctx, seen, location, time);
            location.time = time;
            location.mask |= LocationMask::TIME;
            if let (Some(lat), Some(lon)) = (ctx.scratch.lat, ctx.scratch.lon) {
                location.latitude = lat;
                location.longitude = lon;
                location.mask |= LocationMask::POSITION;
            }
            if let Some(speed) = ctx.scratch.speed_mm_s {
                location.speed = speed;
                location.mask |= LocationMask::SPEED_COURSE;
            }
            if let Some(course) = ctx.scratch.course_e5 {
                location.course = course;
            }
            *seen |= SeenMask::NMEA_RMC;
        },
        SentenceKind::Gsa => {
            let (pdop, hdop, vdop) = (ctx.scratch.pdop?, ctx.scratch.hdop?, ctx.scratch.vdop?);
            location.pdop = pdop;
            location.hdop = hdop;
            location.vdop = vdop;
            location.mask |= LocationMask::DOP;
            for &prn in &ctx.scratch.gsa_prns[..ctx.scratch.gsa_prn_count] {
                if (1..=96).contains(&prn) {
                    let idx = ((prn - 1) / 32) as usize;
                    let bit = (prn - 1) % 32;
                    ctx.used_mask[idx] |= 1 << bit;
                }
            }
            let constellation = match ctx.talker {
                Talker::Gl => Constellation::Glonass,
                Talker::Gp => Constellation::Gps,
                Talker::Gn => {
                    let c = if ctx.gn_gsa_toggle {
                        Constellation::Glonass
                    } else {
                        Constellation::Gps
                    };
                    ctx.gn_gsa_toggle = !ctx.gn_gsa_toggle;
                    *mode = TalkerMode::Composite;
                    c
                },
            };
            if ctx.talker != Talker::Gn {
                *mode = match (*mode, constellation) {
                    (TalkerMode::Composite, _) => TalkerMode::Composite,
                    (_, Constellation::Gps) => TalkerMode::SingleGps,
                    (_, Constellation::Glonass) => TalkerMode::SingleGlonass,
                };
            }
            let bit = match constellation {
                Constellation::Gps => SeenMask::NMEA_GSA_GPS,
                Constellation::Glonass => SeenMask::NMEA_GSA_GLO,
            };
            *seen |= bit;
        },
        SentenceKind::Gst => {
            let time = ctx.scratch.time?;
            epoch_matches(ctx, seen, location, time);
            if let (Some(slat), Some(slon)) = (ctx.scratch.gst_sigma_lat_mm, ctx.scratch.gst_sigma_lon_mm) {
                let sum_sq =
                    (slat as u64).saturating_mul(slat as u64) + (slon as u64).saturating_mul(slon as u64);
                location.ehpe = isqrt_u64(sum_sq);
                location.mask |= LocationMask::ACCURACY;
            }
            if let Some(salt) = ctx.scratch.gst_sigma_alt_mm {
                location.evpe = salt as u32;
            }
            *seen |= SeenMask::NMEA_GST;
        },
        SentenceKind::Gsv => {
            for slot in ctx.scratch.gsv_ready.iter_mut() {
                if let Some(sat) = slot.take() {
                    sats.push(sat);
                    ctx.gsv_seen += 1;
                }
            }
            ctx.scratch.gsv_ready_count = 0;
            if let (Some(total), Some(current)) = (ctx.scratch.gsv_total, ctx.scratch.gsv_current) {
                if current == total {
                    let bit = match ctx.talker {
                        Talker::Gl => SeenMask::NMEA_GSV_GLO,
                        _ => SeenMask::NMEA_GSV_GPS,
                    };
                    *seen |= bit;
                    ctx.gsv_seen = 0;
                }
            }
        },
        SentenceKind::Unknown => {},
    }
    None
}
