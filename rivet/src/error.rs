//! `rivet` error types.
use std::{backtrace::Backtrace, borrow::Cow, fmt, io, str::Utf8Error};

use crate::wire::{ErrorResponse, ProtocolError, WireType};

/// A specialized [`Result`] type for `rivet` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `rivet` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Prefix the error message with `context`.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub(crate) fn mismatch(from: WireType, to: &'static str) -> Self {
        ErrorKind::DataTypeMismatch { from, to }.into()
    }

    pub(crate) fn value_illegal(reason: impl Into<Cow<'static, str>>) -> Self {
        ErrorKind::ValueIllegal(reason.into()).into()
    }

    pub(crate) fn operation_illegal(reason: impl Into<Cow<'static, str>>) -> Self {
        ErrorKind::OperationIllegal(reason.into()).into()
    }

    pub(crate) fn illegal_argument(reason: impl Into<Cow<'static, str>>) -> Self {
        ErrorKind::IllegalArgument(reason.into()).into()
    }

    pub(crate) fn missing_mapping(name: impl Into<Cow<'static, str>>) -> Self {
        ErrorKind::MissingMapping(name.into()).into()
    }

    pub(crate) fn threading(reason: impl Into<Cow<'static, str>>) -> Self {
        ErrorKind::DriverThreadingError(reason.into()).into()
    }

    pub(crate) fn stream(err: io::Error) -> Self {
        ErrorKind::StreamError(err).into()
    }

    pub(crate) fn result_type(expected: &'static str, found: &'static str) -> Self {
        ErrorKind::ResultTypeInvalid { expected, found }.into()
    }
}

/// All possible error kind from `rivet` library.
pub enum ErrorKind {
    /// Conversion from the stored wire type to the requested target is impossible.
    DataTypeMismatch { from: WireType, to: &'static str },
    /// Out of range index, length or argument value.
    ValueIllegal(Cow<'static, str>),
    /// API misuse, such as repositioning a forward-only stream backwards.
    OperationIllegal(Cow<'static, str>),
    /// A wire message that does not agree with its declared type.
    IllegalArgument(Cow<'static, str>),
    /// No registered mapping for a type name or client type.
    MissingMapping(Cow<'static, str>),
    /// A registered prototype constructor failed.
    ConstructionFailed { type_name: String, reason: String },
    /// Server returned an unexpected frame or result shape.
    ResultTypeInvalid { expected: &'static str, found: &'static str },
    /// Underlying byte or character source failed.
    StreamError(io::Error),
    /// Timed out or abandoned wait on an internal queue or task.
    DriverThreadingError(Cow<'static, str>),
    /// Prototype field reader advanced past the last field.
    UdtStreamExhausted { type_name: String, len: usize },
    Protocol(ProtocolError),
    Io(io::Error),
    Database(ErrorResponse),
    Utf8(Utf8Error),
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<io::Error>e => ErrorKind::Io(e));
from!(<ErrorResponse>e => ErrorKind::Database(e));
from!(<Utf8Error>e => ErrorKind::Utf8(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DataTypeMismatch { from, to } => {
                write!(f, "data type mismatch, cannot convert `{from}` into `{to}`")
            }
            Self::ValueIllegal(e) => write!(f, "illegal value: {e}"),
            Self::OperationIllegal(e) => write!(f, "illegal operation: {e}"),
            Self::IllegalArgument(e) => write!(f, "illegal argument: {e}"),
            Self::MissingMapping(e) => write!(f, "missing mapping for `{e}`"),
            Self::ConstructionFailed { type_name, reason } => {
                write!(f, "failed to construct `{type_name}`: {reason}")
            }
            Self::ResultTypeInvalid { expected, found } => {
                write!(f, "invalid result type, expected {expected} found {found}")
            }
            Self::StreamError(e) => write!(f, "stream error: {e}"),
            Self::DriverThreadingError(e) => write!(f, "driver threading error: {e}"),
            Self::UdtStreamExhausted { type_name, len } => {
                write!(f, "all {len} fields of `{type_name}` already read")
            }
            Self::Protocol(e) => e.fmt(f),
            Self::Io(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
