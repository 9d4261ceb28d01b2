use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    /// A field value does not fit in its wire width.
    ValueOutOfRange,
    /// A payload is too long for the implicit length field that describes it.
    InvalidLength,
    /// The value shape does not match the requested primitive type and count.
    UnsupportedType,
    Message(&'static str),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValueOutOfRange => f.write_str("value out of range"),
            Self::InvalidLength => f.write_str("payload too long for its length field"),
            Self::UnsupportedType => f.write_str("unsupported type/count combination"),
            Self::Message(msg) => f.write_str(msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EncodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Not enough bytes yet. Stream readers treat this as "wait for more".
    Truncated,
    /// No message variant is registered for this discriminator.
    UnknownDiscriminator { code: u16, response: bool },
    /// A protocol-constant or reserved field held an unexpected value.
    ConstantMismatch { expected: u16, actual: u16 },
    InvalidLength,
    InvalidValue,
    UnsupportedType,
    Message(&'static str),
}

impl DecodeError {
    /// Whether the error only means the input ended early.
    pub const fn is_truncated(&self) -> bool {
        matches!(self, Self::Truncated)
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => f.write_str("truncated input"),
            Self::UnknownDiscriminator { code, response } => write!(
                f,
                "no {} variant for discriminator 0x{code:02x}",
                if *response { "response" } else { "request" }
            ),
            Self::ConstantMismatch { expected, actual } => write!(
                f,
                "constant field mismatch: expected 0x{expected:04x}, got 0x{actual:04x}"
            ),
            Self::InvalidLength => f.write_str("invalid length"),
            Self::InvalidValue => f.write_str("invalid value"),
            Self::UnsupportedType => f.write_str("unsupported type/count combination"),
            Self::Message(msg) => f.write_str(msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::DecodeError;
    use alloc::string::ToString;

    #[test]
    fn unknown_discriminator_names_direction() {
        let err = DecodeError::UnknownDiscriminator {
            code: 0x42,
            response: true,
        };
        assert_eq!(
            err.to_string(),
            "no response variant for discriminator 0x42"
        );
    }

    #[test]
    fn only_truncated_is_truncated() {
        assert!(DecodeError::Truncated.is_truncated());
        assert!(!DecodeError::InvalidLength.is_truncated());
    }
}
