//! NMEA 0183 field tokenizer and sentence state machine.
//!
//! [`crate::framer::OuterFramer`] already validated checksum/CR/LF framing
//! by the time any of these functions run; this module only ever sees the
//! bytes strictly between `$` and `*` of an already-trustworthy sentence.

pub mod fields;
mod sentence;

pub use sentence::{NmeaContext, SentenceKind};

use crate::constants::NMEA_FIELD_SEP;
use crate::error::ParserError;
use crate::fusion::{SeenMask, TalkerMode};
use crate::types::{Location, SatelliteSet};

/// Routes one payload byte (as forwarded by the framer) into the field
/// buffer, splitting on commas. Returns an error if the field overflows its
/// accumulation buffer, in which case the caller must force the framer back
/// to idle.
pub fn push_payload_byte(
    ctx: &mut NmeaContext,
    byte: u8,
    sats: &mut SatelliteSet,
) -> Result<(), ParserError> {
    if byte == NMEA_FIELD_SEP {
        sentence::on_field(ctx, sats);
        Ok(())
    } else {
        ctx.push_field_byte(byte)
    }
}

/// Called when the framer reports the terminating `*`: flushes the final
/// field of the sentence (it has no trailing comma).
pub fn end_payload(ctx: &mut NmeaContext, sats: &mut SatelliteSet) {
    sentence::on_field(ctx, sats);
}

/// Called when the framer reports a validated, complete sentence.
/// Returns an MTK ack tuple for `PMTK001` sentences.
pub fn sentence_complete(
    ctx: &mut NmeaContext,
    mode: &mut TalkerMode,
    seen: &mut SeenMask,
    location: &mut Location,
    sats: &mut SatelliteSet,
) -> Option<(u16, u8)> {
    sentence::on_sentence_complete(ctx, mode, seen, location, sats)
}
