//! End-to-end scenario tests driven entirely through the public `Session`
//! API: feed raw bytes in, observe what comes out of the location/satellite
//! callbacks. No internal field of `Session` is touched from here.

use std::cell::RefCell;
use std::rc::Rc;

use gnss_core::session::{Mode, MonotonicTimer, Rate, Session, SessionConfig, Transport};
use gnss_core::types::{Location, LocationType, SatelliteSet};

#[derive(Default)]
struct FakeTransport {
    sent: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl Transport for FakeTransport {
    fn send(&mut self, frame: &[u8]) -> bool {
        self.sent.borrow_mut().push(frame.to_vec());
        true
    }
}

#[derive(Default)]
struct FakeTimer;

impl MonotonicTimer for FakeTimer {
    fn start_ms(&mut self, _ms: u32) {}
    fn stop(&mut self) {}
}

fn nmea(body: &str) -> Vec<u8> {
    let checksum = body.bytes().fold(0u8, |acc, b| acc ^ b);
    format!("${body}*{checksum:02X}\r\n").into_bytes()
}

fn fletcher8(body: &[u8]) -> (u8, u8) {
    let mut ck_a = 0u8;
    let mut ck_b = 0u8;
    for &b in body {
        ck_a = ck_a.wrapping_add(b);
        ck_b = ck_b.wrapping_add(ck_a);
    }
    (ck_a, ck_b)
}

fn ubx_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![class, id];
    body.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    body.extend_from_slice(payload);
    let (ck_a, ck_b) = fletcher8(&body);
    let mut frame = vec![0xb5, 0x62];
    frame.extend_from_slice(&body);
    frame.push(ck_a);
    frame.push(ck_b);
    frame
}

fn new_session() -> (
    Session<FakeTransport, FakeTimer, impl FnMut(&Location), impl FnMut(&SatelliteSet)>,
    Rc<RefCell<Vec<Vec<u8>>>>,
    Rc<RefCell<Vec<Location>>>,
    Rc<RefCell<Vec<SatelliteSet>>>,
) {
    let sent = Rc::new(RefCell::new(Vec::new()));
    let locations = Rc::new(RefCell::new(Vec::new()));
    let satellites = Rc::new(RefCell::new(Vec::new()));
    let loc_cb = locations.clone();
    let sat_cb = satellites.clone();
    let session = Session::new(
        SessionConfig::default(),
        FakeTransport { sent: sent.clone() },
        FakeTimer,
        move |loc: &Location| loc_cb.borrow_mut().push(*loc),
        move |sats: &SatelliteSet| sat_cb.borrow_mut().push(*sats),
    );
    (session, sent, locations, satellites)
}

/// S1: a minimal NMEA fix (GGA+RMC+GSA+GSV at one epoch) produces exactly
/// one Location and one Satellite callback.
#[test]
fn s1_minimal_nmea_fix() {
    let (mut session, _sent, locations, satellites) = new_session();
    session.initialize(Mode::NmeaPassive, Rate::Hz1, 9600);
    assert!(session.done());

    let bytes: &[u8] = b"$GPRMC,074155.799,A,3723.2475,N,12158.3416,W,0.5,180.0,010118,,*1F\r\n\
$GPGGA,074155.799,3723.2475,N,12158.3416,W,1,08,0.9,50.0,M,-30.0,M,,*5F\r\n\
$GPGSA,A,3,01,02,03,,,,,,,,,,1.8,0.9,1.5*36\r\n\
$GPGSV,1,1,03,01,40,050,30,02,30,100,25,03,20,150,*4B\r\n";
    session.receive(bytes);

    let locs = locations.borrow();
    let sats = satellites.borrow();
    assert_eq!(locs.len(), 1);
    assert_eq!(locs[0].location_type, LocationType::ThreeD);
    assert_eq!(sats.len(), 1);
    assert_eq!(sats[0].len(), 3);
}

/// S2: a GGA timestamp shifted by one millisecond starts a new epoch and
/// discards RMC's earlier contribution; no Location is emitted.
#[test]
fn s2_cross_epoch_mismatch_drops_location() {
    let (mut session, _sent, locations, _satellites) = new_session();
    session.initialize(Mode::NmeaPassive, Rate::Hz1, 9600);

    let bytes: &[u8] = b"$GPRMC,074155.799,A,3723.2475,N,12158.3416,W,0.5,180.0,010118,,*1F\r\n\
$GPGGA,074155.800,3723.2475,N,12158.3416,W,1,08,0.9,50.0,M,-30.0,M,,*50\r\n\
$GPGSA,A,3,01,02,03,,,,,,,,,,1.8,0.9,1.5*36\r\n";
    session.receive(bytes);

    assert!(locations.borrow().is_empty());
}

fn nav_pvt_payload(itow: u32) -> Vec<u8> {
    let mut b = vec![0u8; gnss_core::constants::NAV_PVT_LEN];
    b[0..4].copy_from_slice(&itow.to_le_bytes());
    b[4..6].copy_from_slice(&2018u16.to_le_bytes());
    b[6] = 1;
    b[7] = 1;
    b[8] = 7;
    b[9] = 41;
    b[10] = 55;
    b[21] = 0x01;
    b[23] = 8;
    b[24..28].copy_from_slice(&(-1_219_723_600i32).to_le_bytes());
    b[28..32].copy_from_slice(&372_374_583i32.to_le_bytes());
    b[32..36].copy_from_slice(&80_000i32.to_le_bytes());
    b[36..40].copy_from_slice(&50_000i32.to_le_bytes());
    b
}

fn nav_dop_payload(itow: u32) -> Vec<u8> {
    let mut b = vec![0u8; gnss_core::constants::NAV_DOP_LEN];
    b[0..4].copy_from_slice(&itow.to_le_bytes());
    b[6..8].copy_from_slice(&180u16.to_le_bytes());
    b[12..14].copy_from_slice(&90u16.to_le_bytes());
    b[10..12].copy_from_slice(&150u16.to_le_bytes());
    b
}

fn nav_timegps_payload(itow: u32, week: u16) -> Vec<u8> {
    let mut b = vec![0u8; gnss_core::constants::NAV_TIMEGPS_LEN];
    b[0..4].copy_from_slice(&itow.to_le_bytes());
    b[8..10].copy_from_slice(&week.to_le_bytes());
    b[10] = 18;
    b[11] = 0x03;
    b
}

fn nav_svinfo_payload() -> Vec<u8> {
    let mut b = vec![0u8; gnss_core::constants::NAV_SVINFO_HEADER_LEN];
    b[4] = 1;
    let mut rec = vec![0u8; gnss_core::constants::NAV_SVINFO_RECORD_LEN];
    rec[1] = 3; // svid => gps prn 3
    rec[2] = 0x01; // navigating
    rec[3] = 0x04; // tracking quality
    rec[4] = 33;
    b.extend_from_slice(&rec);
    b
}

/// S3: UBX NAV-PVT/NAV-DOP/NAV-TIMEGPS sharing one itow, plus a NAV-SVINFO
/// record, fuse into exactly one Location and one Satellite callback.
#[test]
fn s3_ubx_pvt_fuses_with_dop_and_svinfo() {
    let (mut session, _sent, locations, satellites) = new_session();
    session.initialize(Mode::Ublox, Rate::Hz1, 115_200);

    let itow = 123_456_000;
    let mut bytes = Vec::new();
    bytes.extend(ubx_frame(0x01, 0x07, &nav_pvt_payload(itow)));
    bytes.extend(ubx_frame(0x01, 0x04, &nav_dop_payload(itow)));
    bytes.extend(ubx_frame(0x01, 0x20, &nav_timegps_payload(itow, 1990)));
    bytes.extend(ubx_frame(0x01, 0x30, &nav_svinfo_payload()));
    session.receive(&bytes);

    let locs = locations.borrow();
    let sats = satellites.borrow();
    assert_eq!(locs.len(), 1);
    assert_eq!(locs[0].location_type, LocationType::ThreeD);
    assert_eq!(locs[0].pdop, 180);
    assert_eq!(sats.len(), 1);
    assert_eq!(sats[0].len(), 1);
    assert_eq!(sats[0].as_slice()[0].prn, 3);
}

/// S4: with no ACK ever arriving, each table entry is abandoned after its
/// resend cap and replay still reaches completion deterministically.
#[test]
fn s4_ack_timeout_abandons_and_completes_replay() {
    let config = SessionConfig {
        max_resends: Some(0),
        ..SessionConfig::default()
    };
    let sent = Rc::new(RefCell::new(Vec::new()));
    let mut session = Session::new(
        config,
        FakeTransport { sent: sent.clone() },
        FakeTimer,
        |_: &Location| {},
        |_: &SatelliteSet| {},
    );

    session.initialize(Mode::Ublox, Rate::Hz1, 115_200);
    assert_eq!(sent.borrow().len(), 1); // the baud handshake sentence

    // Any valid frame on the new baud starts table replay.
    session.receive(&ubx_frame(0x01, 0x04, &nav_dop_payload(1)));
    assert!(!session.done());
    assert_eq!(sent.borrow().len(), 2); // + first table entry

    for _ in 0..gnss_core::tables::MAX_TABLE_ENTRIES {
        session.notify_timer_fired();
    }

    assert!(session.done());
    assert_eq!(sent.borrow().len(), 1 + gnss_core::tables::MAX_TABLE_ENTRIES);
}

/// S5: a composite (`GN`) talker alternates GSA between GPS and GLONASS;
/// once both constellations and both GSV lists are seen, exactly one
/// Location and one Satellite callback fire for the shared epoch.
#[test]
fn s5_composite_talker_gsa_fuses_once() {
    let (mut session, _sent, locations, satellites) = new_session();
    session.initialize(Mode::NmeaPassive, Rate::Hz1, 9600);

    let mut bytes = Vec::new();
    bytes.extend(nmea("GNRMC,074155.799,A,3723.2475,N,12158.3416,W,0.5,180.0,010118,,"));
    bytes.extend(nmea("GNGGA,074155.799,3723.2475,N,12158.3416,W,1,08,0.9,50.0,M,-30.0,M,,"));
    bytes.extend(nmea("GNGSA,A,3,01,02,03,,,,,,,,,,1.8,0.9,1.5"));
    bytes.extend(nmea("GNGSA,A,3,65,66,,,,,,,,,,,1.8,0.9,1.5"));
    bytes.extend(nmea("GPGSV,1,1,03,01,40,050,30,02,30,100,25,03,20,150,"));
    bytes.extend(nmea("GLGSV,1,1,02,65,40,050,30,66,30,100,25"));
    session.receive(&bytes);

    let locs = locations.borrow();
    let sats = satellites.borrow();
    assert_eq!(locs.len(), 1);
    assert_eq!(locs[0].location_type, LocationType::ThreeD);
    assert_eq!(sats.len(), 1);
    assert_eq!(sats[0].len(), 5);
}

/// S6: a GSV continuation that jumps out of order rolls back the satellites
/// its aborted cycle already queued; no Satellite callback fires.
#[test]
fn s6_out_of_order_gsv_is_rejected() {
    let (mut session, _sent, _locations, satellites) = new_session();
    session.initialize(Mode::NmeaPassive, Rate::Hz1, 9600);

    let first = nmea("GPGSV,3,1,09,01,40,050,30,02,30,100,25,03,20,150,28");
    let second = nmea("GPGSV,3,3,09,07,10,200,15,08,05,210,,09,01,220,");
    session.receive(&first);
    session.receive(&second);

    assert!(satellites.borrow().is_empty());
}
