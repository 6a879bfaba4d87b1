//! # gnss-core
//!
//! A byte-streaming protocol engine for embedded GNSS receiver drivers: a
//! dual-protocol decoder for NMEA 0183 and u-blox UBX, a fusion layer that
//! turns the parsed fragments into [`Location`]/[`Satellite`] snapshots, and
//! a [`Session`] that drives a receiver's configuration tables.
//!
//! Bytes arrive one at a time through [`OuterFramer`], which recognises
//! sentence/frame boundaries and checksums before handing payload bytes to
//! [`nmea`] or [`ubx`]; [`fusion`] decides when enough fields have
//! accumulated to emit a complete snapshot.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;
extern crate core;
#[cfg(feature = "serde")]
extern crate serde;

pub use crate::{
    error::{ConfigError, DateTimeError, Error, ParserError},
    framer::{FramerEvent, OuterFramer},
    fusion::{SeenMask, TalkerMode},
    session::{MonotonicTimer, Session, SessionConfig, Transport},
    types::{
        FixQuality, Location, LocationMask, LocationType, Satellite, SatelliteFlags,
        SatelliteSet, TrackingState, UtcTime,
    },
};

mod error;
mod fusion;

pub mod constants;
pub mod framer;
pub mod nmea;
pub mod session;
pub mod tables;
pub mod types;
pub mod ubx;
pub mod util;
