//! The configuration orchestrator and capability traits:
//! drives a receiver's init/config tables over ACK/NACK/timeout and exposes
//! the runtime setters an application calls once the session is up.
//!
//! [`Session`] owns every sub-context the decoder needs
//! ([`crate::nmea::NmeaContext`], [`crate::ubx::UbxContext`],
//! [`crate::framer::OuterFramer`]) plus the table-replay bookkeeping; it is
//! the single entry point an embedder drives from its UART receive path,
//! send-complete callback, and one-shot timer callback.

use core::cell::Cell;
use core::marker::PhantomData;

use crate::error::ConfigError;
use crate::framer::{FramerEvent, OuterFramer};
use crate::fusion::{self, SeenMask, TalkerMode, UBX_CONSTELLATION_EXPECTED, UBX_POSITION_EXPECTED};
use crate::nmea::{self, NmeaContext};
use crate::tables;
use crate::types::{Location, SatelliteSet};
use crate::ubx::{self, UbxAck, UbxContext};

/// Non-blocking byte-send capability. `send`
/// returns `false` when the transport is still busy transmitting a previous
/// frame; the embedder calls [`Session::notify_send_complete`] from the
/// real driver's completion callback once the buffer may be reused.
pub trait Transport {
    fn send(&mut self, frame: &[u8]) -> bool;
}

/// A one-shot, millisecond-granularity monotonic timer. The embedder calls [`Session::notify_timer_fired`] from the
/// real timer's one-shot ISR or callback.
pub trait MonotonicTimer {
    fn start_ms(&mut self, ms: u32);
    fn stop(&mut self);
}

/// Receiver protocol a [`Session`] was initialised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    NmeaPassive,
    Mediatek,
    Ublox,
}

/// Fix output rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    Hz1,
    Hz5,
    Hz10,
}

/// Bounds on the ambient resources a [`Session`] allocates. `Copy` and fully
/// defaulted, so existing call sites compile unchanged when the struct is
/// defaulted, reproducing the original wire-accurate defaults exactly (12
/// satellites, 250 ms ACK timeout, unbounded resends).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub max_satellites: usize,
    pub ack_timeout_ms: u32,
    pub max_resends: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_satellites: 12,
            ack_timeout_ms: crate::constants::DEFAULT_ACK_TIMEOUT_MS,
            max_resends: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitPhase {
    BaudHandshake,
    TableReplay,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingCommand {
    Ubx { class: u8, id: u8 },
    Mediatek { cmd: u16 },
}

/// Drives a receiver's configuration workflow and fuses its decoded output
/// into [`Location`]/[`SatelliteSet`] snapshots.
///
/// Generic over the transport, timer, and the two callback closures,
/// following the same generic-over-collaborators convention the decoder
/// uses elsewhere. `Session` is `Send` but intentionally not `Sync`: it
/// carries no internal synchronisation, so the single-threaded cooperative
/// model is enforced by the compiler rather than a runtime check. A caller
/// wanting a shared static wraps it in its own mutex primitive; this crate
/// does not provide one.
pub struct Session<TX, TM, LCB, SCB> {
    config: SessionConfig,
    mode: Mode,
    rate: Rate,
    transport: TX,
    timer: TM,
    location_cb: LCB,
    satellite_cb: SCB,

    framer: OuterFramer,
    nmea_ctx: NmeaContext,
    ubx_ctx: UbxContext,
    talker_mode: TalkerMode,
    seen: SeenMask,
    expected: SeenMask,
    location: Location,
    sats: SatelliteSet,

    phase: InitPhase,
    pending: Option<PendingCommand>,
    resend_count: u32,
    send_busy: bool,

    table_buf: [[u8; tables::MAX_FRAME_LEN]; tables::MAX_TABLE_ENTRIES],
    table_len: [usize; tables::MAX_TABLE_ENTRIES],
    table_count: usize,
    table_index: usize,

    _not_sync: PhantomData<Cell<()>>,
}

impl<TX, TM, LCB, SCB> Session<TX, TM, LCB, SCB>
where
    TX: Transport,
    TM: MonotonicTimer,
    LCB: FnMut(&Location),
    SCB: FnMut(&SatelliteSet),
{
    pub fn new(config: SessionConfig, transport: TX, timer: TM, location_cb: LCB, satellite_cb: SCB) -> Self {
        Self {
            config,
            mode: Mode::NmeaPassive,
            rate: Rate::Hz1,
            transport,
            timer,
            location_cb,
            satellite_cb,
            framer: OuterFramer::new(),
            nmea_ctx: NmeaContext::new(),
            ubx_ctx: UbxContext::new(),
            talker_mode: TalkerMode::default(),
            seen: SeenMask::empty(),
            expected: SeenMask::empty(),
            location: Location::default(),
            sats: SatelliteSet::new(),
            phase: InitPhase::Done,
            pending: None,
            resend_count: 0,
            send_busy: false,
            table_buf: [[0u8; tables::MAX_FRAME_LEN]; tables::MAX_TABLE_ENTRIES],
            table_len: [0; tables::MAX_TABLE_ENTRIES],
            table_count: 0,
            table_index: 0,
            _not_sync: PhantomData,
        }
    }

    /// Starts the init sequence: baud handshake, then (for `Mediatek`/`Ublox`)
    /// table replay. `NmeaPassive` has no table to replay
    /// and moves straight to the protocol-minimum expected set.
    pub fn initialize(&mut self, mode: Mode, rate: Rate, baud: u32) {
        self.mode = mode;
        self.rate = rate;
        self.seen = SeenMask::empty();
        self.talker_mode = TalkerMode::default();
        self.location = Location::default();
        self.sats.clear();
        self.pending = None;
        self.resend_count = 0;
        self.phase = InitPhase::BaudHandshake;

        if mode == Mode::NmeaPassive {
            self.finish_init();
            return;
        }

        let mut buf = [0u8; tables::MAX_FRAME_LEN];
        let len = match mode {
            Mode::Ublox => tables::build_ubx_baud_sentence(&mut buf, baud),
            Mode::Mediatek => tables::build_mtk_baud_sentence(&mut buf, baud),
            Mode::NmeaPassive => unreachable!(),
        };
        if len == 0 {
            log::warn!("session: baud sentence did not fit the scratch buffer, skipping handshake");
            self.begin_table_replay();
            return;
        }
        log::debug!("session: sending baud handshake, mode={mode:?} baud={baud}");
        self.send_frame(&buf[..len]);
    }

    fn begin_table_replay(&mut self) {
        self.phase = InitPhase::TableReplay;
        match self.mode {
            Mode::Ublox => {
                let rate_frame = tables::cfg_rate_frame(self.rate);
                self.load_table(&[
                    tables::CFG_MSG_NAV_PVT,
                    tables::CFG_MSG_NAV_DOP,
                    tables::CFG_MSG_NAV_SVINFO,
                    tables::CFG_MSG_NAV_TIMEGPS,
                    rate_frame,
                    tables::CFG_CFG_SAVE,
                ])
                .expect("built-in init table always fits the scratch buffers");
            },
            Mode::Mediatek => {
                let rate_frame = tables::pmtk_rate_frame(self.rate);
                self.load_table(&[tables::PMTK314_DEFAULT, rate_frame])
                    .expect("built-in init table always fits the scratch buffers");
            },
            Mode::NmeaPassive => self.finish_init(),
        }
    }

    fn finish_init(&mut self) {
        self.phase = InitPhase::Done;
        self.seen = SeenMask::empty();
        self.expected = match self.mode {
            Mode::Ublox => UBX_POSITION_EXPECTED | UBX_CONSTELLATION_EXPECTED,
            Mode::Mediatek | Mode::NmeaPassive => {
                SeenMask::NMEA_GGA | SeenMask::NMEA_RMC | SeenMask::NMEA_GSA_GPS | SeenMask::NMEA_GSV_GPS
            },
        };
        log::debug!("session: init done, expected={:?}", self.expected);
    }

    fn load_table(&mut self, frames: &[&[u8]]) -> Result<(), ConfigError> {
        if frames.len() > tables::MAX_TABLE_ENTRIES {
            return Err(ConfigError::TableTooLarge {
                required: frames.len(),
                capacity: tables::MAX_TABLE_ENTRIES,
            });
        }
        for frame in frames {
            if frame.len() > tables::MAX_FRAME_LEN {
                return Err(ConfigError::TableTooLarge {
                    required: frame.len(),
                    capacity: tables::MAX_FRAME_LEN,
                });
            }
        }
        self.table_count = frames.len();
        for (i, frame) in frames.iter().enumerate() {
            self.table_buf[i][..frame.len()].copy_from_slice(frame);
            self.table_len[i] = frame.len();
        }
        self.table_index = 0;
        self.resend_count = 0;
        self.phase = InitPhase::TableReplay;
        self.send_table_entry(0);
        Ok(())
    }

    fn derive_pending(&self, frame: &[u8]) -> Option<PendingCommand> {
        match self.mode {
            Mode::Ublox => tables::ubx_pending_id(frame).map(|(class, id)| PendingCommand::Ubx { class, id }),
            Mode::Mediatek => tables::mtk_pending_cmd(frame).map(|cmd| PendingCommand::Mediatek { cmd }),
            Mode::NmeaPassive => None,
        }
    }

    fn send_table_entry(&mut self, index: usize) {
        let len = self.table_len[index];
        let pending = self.derive_pending(&self.table_buf[index][..len]);
        self.send_frame_copy(index, len);
        self.pending = pending;
        if self.pending.is_some() {
            self.timer.start_ms(self.config.ack_timeout_ms);
        }
    }

    /// Sends table entry `index` by re-borrowing `table_buf` separately from
    /// the rest of `self`, since [`Session::send_frame`] needs `&mut self`.
    fn send_frame_copy(&mut self, index: usize, len: usize) {
        let mut frame = [0u8; tables::MAX_FRAME_LEN];
        frame[..len].copy_from_slice(&self.table_buf[index][..len]);
        self.send_frame(&frame[..len]);
    }

    fn send_frame(&mut self, frame: &[u8]) {
        if self.transport.send(frame) {
            self.send_busy = false;
        } else {
            self.send_busy = true;
            log::warn!("session: transport reported busy for an outgoing frame");
        }
    }

    fn advance_table(&mut self) {
        self.table_index += 1;
        if self.table_index >= self.table_count {
            self.finish_init();
        } else {
            self.send_table_entry(self.table_index);
        }
    }

    fn try_start_setter_table(&mut self, frames: &[&[u8]]) -> Result<(), ConfigError> {
        if self.phase != InitPhase::Done || self.send_busy {
            return Err(ConfigError::Busy);
        }
        self.load_table(frames)
    }

    /// Sets whether GLONASS is tracked alongside GPS.
    pub fn set_constellation(&mut self, glonass: bool) -> Result<(), ConfigError> {
        let frame = if glonass {
            tables::CFG_GNSS_ENABLE_GLONASS
        } else {
            tables::CFG_GNSS_DISABLE_GLONASS
        };
        self.try_start_setter_table(&[frame])
    }

    pub fn set_sbas(&mut self, enable: bool) -> Result<(), ConfigError> {
        let frame = if enable {
            tables::CFG_GNSS_ENABLE_SBAS
        } else {
            tables::CFG_GNSS_DISABLE_SBAS
        };
        self.try_start_setter_table(&[frame])
    }

    pub fn set_qzss(&mut self, enable: bool) -> Result<(), ConfigError> {
        let frame = if enable {
            tables::CFG_GNSS_ENABLE_QZSS
        } else {
            tables::CFG_GNSS_DISABLE_QZSS
        };
        self.try_start_setter_table(&[frame])
    }

    pub fn set_external(&mut self, enable: bool) -> Result<(), ConfigError> {
        let frame = if enable {
            tables::CFG_EXTERNAL_ENABLE
        } else {
            tables::CFG_EXTERNAL_DISABLE
        };
        self.try_start_setter_table(&[frame])
    }

    /// Builds a `CFG-PM2` frame dynamically and enqueues the periodic-mode
    /// table.
    pub fn set_periodic(&mut self, on_time_s: u32, period_s: u32, force: bool) -> Result<(), ConfigError> {
        let mut pm2 = [0u8; tables::MAX_FRAME_LEN];
        let pm2_len = tables::build_cfg_pm2_frame(&mut pm2, on_time_s, period_s, force);
        self.try_start_setter_table(&[
            tables::CFG_RXM_CONTINUOUS,
            &pm2[..pm2_len],
            tables::CFG_RXM_POWERSAVE,
            tables::CFG_CFG_SAVE,
        ])
    }

    pub fn sleep(&mut self) -> Result<(), ConfigError> {
        self.try_start_setter_table(&[tables::CFG_RXM_POWERSAVE])
    }

    pub fn wakeup(&mut self) -> Result<(), ConfigError> {
        self.try_start_setter_table(&[tables::CFG_RXM_CONTINUOUS])
    }

    /// True iff no table is in progress and no send is outstanding.
    pub fn done(&self) -> bool {
        self.phase == InitPhase::Done && self.pending.is_none() && !self.send_busy
    }

    /// Called from the UART driver's send-complete callback.
    pub fn notify_send_complete(&mut self) {
        self.send_busy = false;
    }

    /// Called from the one-shot timer's callback on expiry. Resends the
    /// current table entry unless [`SessionConfig::max_resends`] has been
    /// exhausted, in which case the entry is abandoned and the table
    /// advances.
    pub fn notify_timer_fired(&mut self) {
        if self.phase != InitPhase::TableReplay || self.pending.is_none() {
            return;
        }
        if let Some(max) = self.config.max_resends {
            if self.resend_count >= max {
                log::warn!(
                    "session: resend cap ({max}) reached for table entry {}, abandoning",
                    self.table_index
                );
                self.pending = None;
                self.resend_count = 0;
                self.advance_table();
                return;
            }
        }
        self.resend_count += 1;
        log::warn!(
            "session: ACK timeout on table entry {}, resend attempt {}",
            self.table_index,
            self.resend_count
        );
        self.send_table_entry(self.table_index);
    }

    fn on_ubx_ack(&mut self, ack: UbxAck) {
        if self.phase != InitPhase::TableReplay {
            return;
        }
        let matches = matches!(self.pending, Some(PendingCommand::Ubx { class, id }) if class == ack.class && id == ack.id);
        if !matches {
            return;
        }
        self.timer.stop();
        self.pending = None;
        self.resend_count = 0;
        if ack.ack {
            log::debug!("session: ACK-ACK class=0x{:02x} id=0x{:02x}", ack.class, ack.id);
        } else {
            log::warn!(
                "session: ACK-NACK class=0x{:02x} id=0x{:02x}, advancing anyway",
                ack.class,
                ack.id
            );
        }
        self.advance_table();
    }

    fn on_mtk_ack(&mut self, cmd: u16, status: u8) {
        if self.phase != InitPhase::TableReplay {
            return;
        }
        let matches = matches!(self.pending, Some(PendingCommand::Mediatek { cmd: pending_cmd }) if pending_cmd == cmd);
        if !matches {
            return;
        }
        self.timer.stop();
        self.pending = None;
        self.resend_count = 0;
        if status == 3 {
            log::debug!("session: PMTK001 ack cmd={cmd} status=3");
        } else {
            log::warn!("session: PMTK001 nack cmd={cmd} status={status}, advancing anyway");
        }
        self.advance_table();
    }

    fn on_protocol_event_observed(&mut self) {
        if self.phase == InitPhase::BaudHandshake {
            log::debug!("session: receiver responded on new baud, starting table replay");
            self.begin_table_replay();
        }
    }

    fn fire_location(&mut self) {
        log::debug!(
            "session: location callback, type={:?} quality={:?}",
            self.location.location_type,
            self.location.quality
        );
        (self.location_cb)(&self.location);
    }

    fn fire_satellites(&mut self) {
        self.sats.truncate(self.config.max_satellites);
        (self.satellite_cb)(&self.sats);
        self.sats.clear();
    }

    fn drain_fusion(&mut self) {
        let position_expected = match self.mode {
            Mode::Ublox => UBX_POSITION_EXPECTED,
            Mode::Mediatek | Mode::NmeaPassive => self.talker_mode.position_expected(),
        };
        if self.seen.contains(position_expected) {
            fusion::finalize_location(&mut self.seen, &mut self.location);
            self.fire_location();
        }

        let constellation_expected = match self.mode {
            Mode::Ublox => UBX_CONSTELLATION_EXPECTED,
            Mode::Mediatek | Mode::NmeaPassive => self.talker_mode.constellation_expected(),
        };
        if self.seen.contains(SeenMask::SOLUTION | constellation_expected) {
            match self.mode {
                // NAV-SVINFO already carries its own per-satellite Navigating
                // bit off the wire; there is no separate used-SV
                // bitset to re-apply for UBX.
                Mode::Ublox => fusion::finalize_satellites(&mut self.seen, &mut self.sats, &[0u32; 3]),
                Mode::Mediatek | Mode::NmeaPassive => {
                    fusion::finalize_satellites(&mut self.seen, &mut self.sats, &self.nmea_ctx.used_mask)
                },
            }
            self.fire_satellites();
        }
    }

    /// Feeds incoming bytes from the UART receive path. Never blocks,
    /// never suspends, and is infallible by design: every recoverable
    /// condition is handled locally.
    pub fn receive(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            match self.framer.feed(byte) {
                FramerEvent::None => {},
                FramerEvent::Resync => log::trace!("session: framer resync on byte 0x{byte:02x}"),
                FramerEvent::NmeaPayloadByte(b) => {
                    if nmea::push_payload_byte(&mut self.nmea_ctx, b, &mut self.sats).is_err() {
                        log::warn!("session: NMEA field buffer overflow, forcing resync");
                        self.framer.force_resync();
                        self.nmea_ctx.reset_sentence();
                    }
                },
                FramerEvent::NmeaPayloadEnd => nmea::end_payload(&mut self.nmea_ctx, &mut self.sats),
                FramerEvent::NmeaSentenceComplete => {
                    let ack = nmea::sentence_complete(
                        &mut self.nmea_ctx,
                        &mut self.talker_mode,
                        &mut self.seen,
                        &mut self.location,
                        &mut self.sats,
                    );
                    self.on_protocol_event_observed();
                    if let Some((cmd, status)) = ack {
                        self.on_mtk_ack(cmd, status);
                    }
                    self.drain_fusion();
                },
                FramerEvent::UbxHeader { class, id, len } => ubx::header(&mut self.ubx_ctx, class, id, len),
                FramerEvent::UbxPayloadByte(b) => ubx::payload_byte(&mut self.ubx_ctx, b),
                FramerEvent::UbxFrameComplete => {
                    let ack = ubx::frame_complete(&mut self.ubx_ctx, &mut self.seen, &mut self.location, &mut self.sats);
                    self.on_protocol_event_observed();
                    if let Some(ack) = ack {
                        self.on_ubx_ack(ack);
                    }
                    self.drain_fusion();
                },
            }
        }
    }
}
