/// cEMI link-layer frames carried inside tunnelling requests.
pub mod cemi;
/// Fixed 6-byte frame header.
pub mod header;
/// Service-type dispatched message bodies.
pub mod message;

pub use cemi::{GroupAddress, IndividualAddress, LData};
pub use header::{frame_len, KnxHeader, HEADER_LEN};
pub use message::{Hpai, KnxNetIpMessage};
