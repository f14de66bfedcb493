//! Protocol error
use std::{fmt, str::Utf8Error};

use super::backend::BackendMessage;

/// An error when translating buffer from the server.
pub enum ProtocolError {
    /// Message ended before all declared fields were read.
    Truncated,
    /// A frame declared zero length.
    EmptyFrame,
    /// A frame declared length larger than allowed.
    FrameTooLarge { len: u64, max: u64 },
    /// Unknown tag for the given discriminated field.
    UnknownTag { field: &'static str, tag: u8 },
    Unexpected {
        expect: Option<u8>,
        found: u8,
        phase: Option<&'static str>,
    },
    /// Composite values nested deeper than allowed.
    NestingTooDeep { max: usize },
    Utf8(Utf8Error),
}

impl std::error::Error for ProtocolError { }

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ProtocolError::Truncated => f.write_str("message truncated"),
            ProtocolError::EmptyFrame => f.write_str("zero length frame"),
            ProtocolError::FrameTooLarge { len, max } => {
                write!(f, "frame length {len} exceeds maximum {max}")
            }
            ProtocolError::UnknownTag { field, tag } => write!(f, "unknown {field} tag `{tag}`"),
            ProtocolError::Unexpected { expect, found, phase } => {
                let found = BackendMessage::message_name(found);
                match expect {
                    Some(m) => {
                        write!(
                            f,
                            "Expected message `{}` found `{found}`",
                            BackendMessage::message_name(m),
                        )?
                    },
                    None => write!(f, "Unexpected message `{found}`")?,
                }
                if let Some(phase) = phase {
                    write!(f, " in `{phase}`")?
                }
                Ok(())
            },
            ProtocolError::NestingTooDeep { max } => {
                write!(f, "value nesting exceeds maximum depth {max}")
            }
            ProtocolError::Utf8(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<bytes::TryGetError> for ProtocolError {
    fn from(_: bytes::TryGetError) -> Self {
        Self::Truncated
    }
}

impl ProtocolError {
    pub(crate) fn unknown(field: &'static str, tag: u8) -> ProtocolError {
        Self::UnknownTag { field, tag }
    }

    pub(crate) fn unexpected(expect: u8, found: u8) -> ProtocolError {
        Self::Unexpected {
            expect: Some(expect),
            found,
            phase: None,
        }
    }

    pub(crate) fn unexpected_phase(found: u8, phase: &'static str) -> ProtocolError {
        Self::Unexpected {
            expect: None,
            found,
            phase: Some(phase),
        }
    }
}
