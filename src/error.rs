//! Status model shared by every codec operation
//!
//! Fallible operations return [`Result`]; [`Status`] is the two-state view of
//! any such result and owns the diagnostic printing and the fixed-width
//! record serialization.

use std::fmt;
use std::io::{self, Write};
use thiserror::Error as ThisError;

/// Width of the origin field in a status record, terminating NUL included.
pub const ORIGIN_LEN: usize = 32;
/// Width of the message field in a status record, terminating NUL included.
pub const MESSAGE_LEN: usize = 224;
/// Total size of a serialized status record: code, origin, message.
pub const RECORD_LEN: usize = 4 + ORIGIN_LEN + MESSAGE_LEN;

/// Canonical failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unknown,
    Filesystem,
    Io,
    TruncatedData,
    UnexpectedData,
    UnknownFileFormat,
    UnknownDataFormat,
    UnsupportedFeature,
    ObsoleteFeature,
    InvalidArgument,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::Unknown,
        ErrorKind::Filesystem,
        ErrorKind::Io,
        ErrorKind::TruncatedData,
        ErrorKind::UnexpectedData,
        ErrorKind::UnknownFileFormat,
        ErrorKind::UnknownDataFormat,
        ErrorKind::UnsupportedFeature,
        ErrorKind::ObsoleteFeature,
        ErrorKind::InvalidArgument,
    ];

    /// Numeric code used in status records. `0` is reserved for success.
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::Unknown => 1,
            ErrorKind::Filesystem => 2,
            ErrorKind::Io => 3,
            ErrorKind::TruncatedData => 4,
            ErrorKind::UnexpectedData => 5,
            ErrorKind::UnknownFileFormat => 6,
            ErrorKind::UnsupportedFeature => 7,
            ErrorKind::ObsoleteFeature => 8,
            ErrorKind::UnknownDataFormat => 9,
            ErrorKind::InvalidArgument => 10,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Unknown => "unknown",
            ErrorKind::Filesystem => "filesystem",
            ErrorKind::Io => "io",
            ErrorKind::TruncatedData => "truncated-data",
            ErrorKind::UnexpectedData => "unexpected-data",
            ErrorKind::UnknownFileFormat => "unknown-file-format",
            ErrorKind::UnknownDataFormat => "unknown-data-format",
            ErrorKind::UnsupportedFeature => "unsupported-feature",
            ErrorKind::ObsoleteFeature => "obsolete-feature",
            ErrorKind::InvalidArgument => "invalid-argument",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::Unknown => "Unknown error",
            ErrorKind::Filesystem => "Filesystem error",
            ErrorKind::Io => "File Input/Output error",
            ErrorKind::TruncatedData => "End of file prematurely reached",
            ErrorKind::UnexpectedData => "Unexpected data",
            ErrorKind::UnknownFileFormat => "Unknown file format",
            ErrorKind::UnknownDataFormat => "Unknown data format",
            ErrorKind::UnsupportedFeature => "Unsupported feature",
            ErrorKind::ObsoleteFeature => "Obsolete feature",
            ErrorKind::InvalidArgument => "Invalid argument",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

fn explanation_suffix(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(", {}", message)
    }
}

/// A failed operation: what went wrong, where, and why
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{origin} : {kind}{}", explanation_suffix(.message))]
pub struct Error {
    kind: ErrorKind,
    origin: String,
    message: String,
}

impl Error {
    pub fn new<O: Into<String>, M: Into<String>>(kind: ErrorKind, origin: O, message: M) -> Self {
        Self { kind, origin: origin.into(), message: message.into() }
    }

    pub fn filesystem<O: Into<String>, M: Into<String>>(origin: O, msg: M) -> Self {
        Self::new(ErrorKind::Filesystem, origin, msg)
    }

    pub fn io<O: Into<String>, M: Into<String>>(origin: O, msg: M) -> Self {
        Self::new(ErrorKind::Io, origin, msg)
    }

    pub fn truncated<O: Into<String>, M: Into<String>>(origin: O, msg: M) -> Self {
        Self::new(ErrorKind::TruncatedData, origin, msg)
    }

    pub fn unexpected<O: Into<String>, M: Into<String>>(origin: O, msg: M) -> Self {
        Self::new(ErrorKind::UnexpectedData, origin, msg)
    }

    pub fn unknown_file_format<O: Into<String>, M: Into<String>>(origin: O, msg: M) -> Self {
        Self::new(ErrorKind::UnknownFileFormat, origin, msg)
    }

    pub fn unknown_data_format<O: Into<String>, M: Into<String>>(origin: O, msg: M) -> Self {
        Self::new(ErrorKind::UnknownDataFormat, origin, msg)
    }

    pub fn unsupported<O: Into<String>, M: Into<String>>(origin: O, msg: M) -> Self {
        Self::new(ErrorKind::UnsupportedFeature, origin, msg)
    }

    pub fn obsolete<O: Into<String>, M: Into<String>>(origin: O, msg: M) -> Self {
        Self::new(ErrorKind::ObsoleteFeature, origin, msg)
    }

    pub fn invalid_argument<O: Into<String>, M: Into<String>>(origin: O, msg: M) -> Self {
        Self::new(ErrorKind::InvalidArgument, origin, msg)
    }


    /// Map a stream error: a short read is a data-completeness failure, anything
    /// else is an I/O failure.
    pub fn from_io<O: Into<String>>(origin: O, context: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Self::truncated(origin, context)
        } else {
            Self::io(origin, format!("{}: {}", context, err))
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of an operation, detached from its value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Ok,
    Failed(Error),
}

impl Status {
    pub fn of<T>(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => Status::Failed(e.clone()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Status::Ok => None,
            Status::Failed(e) => Some(e.kind()),
        }
    }

    pub fn origin(&self) -> Option<&str> {
        match self {
            Status::Ok => None,
            Status::Failed(e) => Some(e.origin()),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Status::Ok => None,
            Status::Failed(e) => Some(e.message()),
        }
    }

    /// Write one diagnostic line to `sink`.
    ///
    /// Returns the number of bytes written, or `-1` when the sink refuses the
    /// write.
    pub fn print<W: Write>(&self, sink: &mut W) -> isize {
        let line = match self {
            Status::Ok => "Success.\n".to_string(),
            Status::Failed(e) => format!("{}.\n", e),
        };

        match sink.write_all(line.as_bytes()).and_then(|_| sink.flush()) {
            Ok(()) => line.len() as isize,
            Err(_) => -1,
        }
    }

    /// Serialize into the fixed-width record: little-endian code, then origin
    /// and message as NUL-padded fields truncated on a UTF-8 boundary.
    pub fn to_record(&self) -> [u8; RECORD_LEN] {
        let mut record = [0u8; RECORD_LEN];

        if let Status::Failed(e) = self {
            record[..4].copy_from_slice(&e.kind().code().to_le_bytes());
            put_field(&mut record[4..4 + ORIGIN_LEN], e.origin());
            put_field(&mut record[4 + ORIGIN_LEN..], e.message());
        }

        record
    }

    pub fn from_record(record: &[u8; RECORD_LEN]) -> Result<Self> {
        let code = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        if code == 0 {
            return Ok(Status::Ok);
        }

        let kind = ErrorKind::from_code(code).ok_or_else(|| {
            Error::unknown_data_format("Status::from_record", format!("status code {}", code))
        })?;

        Ok(Status::Failed(Error::new(
            kind,
            get_field(&record[4..4 + ORIGIN_LEN]),
            get_field(&record[4 + ORIGIN_LEN..]),
        )))
    }
}

impl<T> From<Result<T>> for Status {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(e) => Status::Failed(e),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        Status::Failed(err)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => f.write_str("Success"),
            Status::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn put_field(dest: &mut [u8], value: &str) {
    let value = truncate_utf8(value, dest.len() - 1);
    dest[..value.len()].copy_from_slice(value.as_bytes());
}

fn get_field(src: &[u8]) -> String {
    let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
    String::from_utf8_lossy(&src[..end]).into_owned()
}

/// The earlier eight-variant error taxonomy.
///
/// `Broken` splits into truncated/unexpected data and `UnknownFormat` into
/// file/data format in the canonical taxonomy; converting back merges them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyErrorCode {
    NoError = 0,
    Unknown,
    Fs,
    Io,
    Broken,
    Unsupported,
    UnknownFormat,
    Obsolete,
    Argument,
}

impl LegacyErrorCode {
    /// `None` for `NoError`.
    pub fn to_kind(self) -> Option<ErrorKind> {
        match self {
            LegacyErrorCode::NoError => None,
            LegacyErrorCode::Unknown => Some(ErrorKind::Unknown),
            LegacyErrorCode::Fs => Some(ErrorKind::Filesystem),
            LegacyErrorCode::Io => Some(ErrorKind::Io),
            LegacyErrorCode::Broken => Some(ErrorKind::UnexpectedData),
            LegacyErrorCode::Unsupported => Some(ErrorKind::UnsupportedFeature),
            LegacyErrorCode::UnknownFormat => Some(ErrorKind::UnknownFileFormat),
            LegacyErrorCode::Obsolete => Some(ErrorKind::ObsoleteFeature),
            LegacyErrorCode::Argument => Some(ErrorKind::InvalidArgument),
        }
    }
}

impl From<ErrorKind> for LegacyErrorCode {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Unknown => LegacyErrorCode::Unknown,
            ErrorKind::Filesystem => LegacyErrorCode::Fs,
            ErrorKind::Io => LegacyErrorCode::Io,
            ErrorKind::TruncatedData | ErrorKind::UnexpectedData => LegacyErrorCode::Broken,
            ErrorKind::UnknownFileFormat | ErrorKind::UnknownDataFormat => {
                LegacyErrorCode::UnknownFormat
            }
            ErrorKind::UnsupportedFeature => LegacyErrorCode::Unsupported,
            ErrorKind::ObsoleteFeature => LegacyErrorCode::Obsolete,
            ErrorKind::InvalidArgument => LegacyErrorCode::Argument,
        }
    }
}

impl From<&Status> for LegacyErrorCode {
    fn from(status: &Status) -> Self {
        status.kind().map_or(LegacyErrorCode::NoError, LegacyErrorCode::from)
    }
}
