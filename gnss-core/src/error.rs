use core::fmt;

/// Diagnostic reasons a frame or field was rejected.
///
/// None of these ever reach the location/satellite callbacks: a framing or
/// field error is always a silent resync or sink-state transition. They
/// exist so callers who want observability beyond the `log` crate trace
/// lines can inspect *why* the last byte sequence was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserError {
    InvalidNmeaChecksum { expect: u8, got: u8 },
    InvalidUbxChecksum { expect: (u8, u8), got: (u8, u8) },
    InvalidNmeaField {
        sentence: &'static str,
        field_index: u8,
    },
    InvalidPacketLen {
        packet: &'static str,
        expect: usize,
        got: usize,
    },
    BufferOverflow,
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserError::InvalidNmeaChecksum { expect, got } => write!(
                f,
                "invalid NMEA checksum, expect 0x{expect:02X}, got 0x{got:02X}"
            ),
            ParserError::InvalidUbxChecksum { expect, got } => write!(
                f,
                "invalid UBX checksum, expect {expect:?}, got {got:?}"
            ),
            ParserError::InvalidNmeaField {
                sentence,
                field_index,
            } => write!(f, "invalid field {field_index} of sentence {sentence}"),
            ParserError::InvalidPacketLen {
                packet,
                expect,
                got,
            } => write!(f, "invalid packet({packet}) length, expect {expect}, got {got}"),
            ParserError::BufferOverflow => f.write_str("field accumulation buffer overflow"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParserError {}

/// Errors surfaced by the configuration orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A setter was called while a table was already in progress, or the
    /// transport reported itself busy.
    Busy,
    /// A setter's pre-built table did not fit the transmit scratch buffer.
    TableTooLarge { required: usize, capacity: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Busy => f.write_str("configuration orchestrator is busy"),
            ConfigError::TableTooLarge { required, capacity } => write!(
                f,
                "config table entry needs {required} bytes, scratch buffer holds {capacity}"
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeError {
    InvalidDate,
    InvalidTime,
}

impl fmt::Display for DateTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateTimeError::InvalidDate => f.write_str("invalid date"),
            DateTimeError::InvalidTime => f.write_str("invalid time"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DateTimeError {}

/// Crate-level union of the error taxonomies above, for callers who want a
/// single `Result` type at the library boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Parser(ParserError),
    Config(ConfigError),
    DateTime(DateTimeError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parser(e) => e.fmt(f),
            Error::Config(e) => e.fmt(f),
            Error::DateTime(e) => e.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<ParserError> for Error {
    fn from(e: ParserError) -> Self {
        Error::Parser(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DateTimeError> for Error {
    fn from(e: DateTimeError) -> Self {
        Error::DateTime(e)
    }
}
