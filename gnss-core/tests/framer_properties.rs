//! Property-based coverage of the outer framer's invariants (Testable
//! Properties 1-3): bounded state under arbitrary input, and checksum
//! rejection that never leaks a corrupted frame's fields to a callback.

use gnss_core::framer::{FramerEvent, OuterFramer};
use proptest::prelude::*;

/// Property 1: for any byte sequence the framer neither panics nor grows
/// unboundedly; feeding it never does anything but return events.
proptest! {
    #[test]
    fn framer_never_panics_on_arbitrary_bytes(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let mut framer = OuterFramer::new();
        for &b in &bytes {
            let _ = framer.feed(b);
        }
    }
}

fn nmea_checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, &b| acc ^ b)
}

fn valid_nmea_sentence(body: &[u8]) -> Vec<u8> {
    let cksum = nmea_checksum(body);
    let mut out = vec![b'$'];
    out.extend_from_slice(body);
    out.push(b'*');
    out.extend_from_slice(format!("{cksum:02X}").as_bytes());
    out.push(b'\r');
    out.push(b'\n');
    out
}

/// Property 2: an NMEA sentence whose checksum byte is flipped never
/// produces a `NmeaSentenceComplete` event.
proptest! {
    #[test]
    fn corrupted_nmea_checksum_never_completes(
        body in "[A-Z]{5}(,[0-9]{1,4}){0,6}",
        flip_bit in 0u8..8,
    ) {
        let mut frame = valid_nmea_sentence(body.as_bytes());
        // The checksum's ASCII hex digits sit two bytes before the CR.
        let checksum_byte_index = frame.len() - 4;
        frame[checksum_byte_index] ^= 1 << flip_bit;

        let mut framer = OuterFramer::new();
        let saw_complete = frame
            .iter()
            .map(|&b| framer.feed(b))
            .any(|ev| ev == FramerEvent::NmeaSentenceComplete);
        prop_assert!(!saw_complete);
    }
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

fn valid_ubx_frame(class: u8, id: u8, payload: &[u8]) -> Vec<u8> {
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

/// Property 3: a UBX frame with a corrupted Fletcher-8 byte never produces
/// a `UbxFrameComplete` event.
proptest! {
    #[test]
    fn corrupted_ubx_checksum_never_completes(
        class in any::<u8>(),
        id in any::<u8>(),
        payload in prop::collection::vec(any::<u8>(), 0..32),
        flip_ck_a in any::<bool>(),
        flip_bit in 0u8..8,
    ) {
        let mut frame = valid_ubx_frame(class, id, &payload);
        let len = frame.len();
        let target = if flip_ck_a { len - 2 } else { len - 1 };
        frame[target] ^= 1 << flip_bit;

        let mut framer = OuterFramer::new();
        let saw_complete = frame
            .iter()
            .map(|&b| framer.feed(b))
            .any(|ev| ev == FramerEvent::UbxFrameComplete);
        prop_assert!(!saw_complete);
    }
}
