/// TCP and point-addressed envelopes.
pub mod adu;
/// LSB-first coil packing.
pub mod coils;
/// Exception codes of error-flagged responses.
pub mod exception;
/// Function-code variants and their dispatch table.
pub mod pdu;

pub use adu::{PointAdu, TcpAdu};
pub use coils::{pack_coils, unpack_coils};
pub use exception::ExceptionCode;
pub use pdu::ModbusPdu;
