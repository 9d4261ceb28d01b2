//! Async correlation engine and fieldbus clients for fieldwire.
//!
//! The [`Engine`] matches inbound frames to outstanding requests over any
//! [`Transport`](fieldwire_transport::Transport). [`ModbusClient`] and
//! [`KnxTunnelClient`] are thin typed layers over it, and
//! [`ModbusSimulator`] serves an in-memory device for tests and tools.

pub mod engine;
pub mod error;
pub mod knx;
pub mod modbus;
pub mod protocol;
pub mod simulator;

pub use engine::{Engine, EngineConfig, EngineState, OverflowPolicy};
pub use error::{ClientError, EngineError};
pub use knx::{tunnelled_frame, Heartbeat, KnxTunnelClient, TunnelInfo};
pub use modbus::ModbusClient;
pub use protocol::{Inbound, KnxNetIp, ModbusPoint, ModbusTcp, Protocol};
pub use simulator::{DataStore, ModbusSimulator};
