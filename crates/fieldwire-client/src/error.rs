use fieldwire_core::modbus::ExceptionCode;
use fieldwire_transport::TransportError;
use thiserror::Error;

/// Why an expectation registered with the [`Engine`](crate::Engine) failed.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("encode error: {0}")]
    Encode(#[from] fieldwire_core::EncodeError),
    #[error("request timed out")]
    Timeout,
    #[error("connection closed")]
    ConnectionClosed,
    #[error("engine is not running")]
    NotRunning,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("encode error: {0}")]
    Encode(#[from] fieldwire_core::EncodeError),
    #[error("decode error: {0}")]
    Decode(#[from] fieldwire_core::DecodeError),
    #[error("function 0x{function_code:02x} failed with exception {exception}")]
    ProtocolException {
        function_code: u8,
        exception: ExceptionCode,
    },
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("no tunnel is open")]
    TunnelNotOpen,
    #[error("remote returned status 0x{status:02x}")]
    RemoteStatus { status: u8 },
}

impl ClientError {
    /// True when the failure was a request timing out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Engine(EngineError::Timeout))
    }
}
