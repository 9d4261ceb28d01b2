//! Fieldbus message encoding and decoding in pure Rust.
//!
//! `fieldwire-core` provides bit-precise encoding and decoding of Modbus
//! PDUs and ADUs and of KNXnet/IP tunnelling messages. It forms the
//! foundation of the fieldwire crate family and can be used standalone
//! wherever an allocator is available.
//!
//! # Feature flags
//!
//! - **`std`** (default) - enables `std::error::Error` implementations.
//! - **`serde`** - derives `Serialize`/`Deserialize` on value types.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

/// Bit-level reader/writer and the typed value codec.
pub mod encoding;
/// Error types for encoding and decoding operations.
pub mod error;
/// KNXnet/IP header and tunnelling message codec.
pub mod knxnetip;
/// Modbus PDU variants and the TCP / point-addressed envelopes.
pub mod modbus;
/// Primitive types and tagged values.
pub mod types;

pub use error::{DecodeError, EncodeError};

/// Which side of an exchange a message travels on.
///
/// Modbus request and response shapes for the same function code are not
/// distinguishable from the bytes alone, so decoders take this from the
/// caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub const fn is_response(self) -> bool {
        matches!(self, Self::Response)
    }
}
