//! Protocol definition.
//!
//! A connection exchanges frames of `[u64 little endian length][payload]`,
//! each payload holds one [`frontend`] or [`backend`] message.
mod wire_type;
mod value;
mod error;

pub mod frontend;
pub mod backend;

pub use wire_type::{Family, WireType};
pub use value::{GraphValue, MAX_NESTING, ValueCase, WireValue};
pub use error::ProtocolError;

pub use frontend::FrontendProtocol;
pub use backend::{BackendMessage, BackendProtocol, ChunkPayload, ErrorResponse, Frame, FrameKind};
