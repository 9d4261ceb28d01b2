//! Byte-stream transports underneath the fieldwire correlation engine.
//!
//! A [`Transport`] is a connected stream with a receive buffer the engine can
//! peek into before consuming a whole frame.

mod buffer;
pub mod capture;
pub mod memory;
pub mod tcp;
pub mod traits;

pub use capture::CapturingTransport;
pub use memory::MemoryTransport;
pub use tcp::TcpTransport;
pub use traits::{Transport, TransportError};
