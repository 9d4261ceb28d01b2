use clap::ValueEnum;
use fieldwire_client::{KnxNetIp, ModbusPoint, ModbusTcp, Protocol};
use fieldwire_core::types::{PrimitiveType, Scalar};
use fieldwire_core::{DecodeError, Direction};

/// CLI-friendly names for the value codec's primitive types.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DataTypeArg {
    Bool,
    Sint8,
    Sint16,
    Sint32,
    Sint64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Char,
    Wchar,
}

impl DataTypeArg {
    pub const fn into_primitive_type(self) -> PrimitiveType {
        match self {
            Self::Bool => PrimitiveType::Bool,
            Self::Sint8 => PrimitiveType::SInt8,
            Self::Sint16 => PrimitiveType::SInt16,
            Self::Sint32 => PrimitiveType::SInt32,
            Self::Sint64 => PrimitiveType::SInt64,
            Self::Uint8 => PrimitiveType::UInt8,
            Self::Uint16 => PrimitiveType::UInt16,
            Self::Uint32 => PrimitiveType::UInt32,
            Self::Uint64 => PrimitiveType::UInt64,
            Self::Float32 => PrimitiveType::Float32,
            Self::Float64 => PrimitiveType::Float64,
            Self::Char => PrimitiveType::Char,
            Self::Wchar => PrimitiveType::WChar,
        }
    }
}

/// Which Modbus data table a read targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableArg {
    Coils,
    DiscreteInputs,
    Holding,
    Input,
}

/// Protocol adapters selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolArg {
    ModbusTcp,
    ModbusPoint,
    Knx,
}

impl ProtocolArg {
    /// Decodes one complete frame and renders it as JSON.
    pub fn decode_to_json(self, bytes: &[u8], direction: Direction) -> Result<String, String> {
        fn render<P: Protocol>(protocol: P, bytes: &[u8]) -> Result<String, String>
        where
            P::Frame: serde::Serialize,
        {
            let frame = protocol.decode(bytes).map_err(describe)?;
            serde_json::to_string_pretty(&frame).map_err(|e| e.to_string())
        }

        match self {
            Self::ModbusTcp => render(
                ModbusTcp {
                    direction,
                    strict: true,
                },
                bytes,
            ),
            Self::ModbusPoint => render(
                ModbusPoint {
                    direction,
                    strict: true,
                },
                bytes,
            ),
            Self::Knx => render(KnxNetIp { strict: true }, bytes),
        }
    }
}

fn describe(err: DecodeError) -> String {
    format!("decode failed: {err}")
}

/// Parses hex with optional whitespace, colons or `0x` prefixes.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits: String = text
        .split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .map(|chunk| chunk.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits ({})", digits.len()));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("invalid hex byte {:?}", &digits[i..i + 2]))
        })
        .collect()
}

/// Converts a CLI number to a scalar of `ty`, rejecting values that do not
/// fit.
pub fn scalar_from_f64(ty: PrimitiveType, value: f64) -> Result<Scalar, String> {
    fn int<T: TryFrom<i128>>(value: f64) -> Result<T, String> {
        if value.fract() != 0.0 || !value.is_finite() {
            return Err(format!("{value} is not an integer"));
        }
        T::try_from(value as i128).map_err(|_| format!("{value} is out of range"))
    }

    Ok(match ty {
        PrimitiveType::Bool => Scalar::Bool(value != 0.0),
        PrimitiveType::SInt8 => Scalar::SInt8(int(value)?),
        PrimitiveType::SInt16 => Scalar::SInt16(int(value)?),
        PrimitiveType::SInt32 => Scalar::SInt32(int(value)?),
        PrimitiveType::SInt64 => Scalar::SInt64(int(value)?),
        PrimitiveType::UInt8 => Scalar::UInt8(int(value)?),
        PrimitiveType::UInt16 => Scalar::UInt16(int(value)?),
        PrimitiveType::UInt32 => Scalar::UInt32(int(value)?),
        PrimitiveType::UInt64 => Scalar::UInt64(int(value)?),
        PrimitiveType::Float32 => Scalar::Float32(value as f32),
        PrimitiveType::Float64 => Scalar::Float64(value),
        PrimitiveType::Char => Scalar::Char(int(value)?),
        PrimitiveType::WChar => Scalar::WChar(int(value)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing_accepts_common_spellings() {
        assert_eq!(parse_hex("06 00 0A 01 F4").unwrap(), vec![0x06, 0x00, 0x0A, 0x01, 0xF4]);
        assert_eq!(parse_hex("0x83:0x02").unwrap(), vec![0x83, 0x02]);
        assert!(parse_hex("123").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn scalars_are_range_checked() {
        assert_eq!(
            scalar_from_f64(PrimitiveType::UInt16, 500.0).unwrap(),
            Scalar::UInt16(500)
        );
        assert!(scalar_from_f64(PrimitiveType::UInt8, 256.0).is_err());
        assert!(scalar_from_f64(PrimitiveType::SInt16, 1.5).is_err());
        assert_eq!(
            scalar_from_f64(PrimitiveType::Float32, 21.5).unwrap(),
            Scalar::Float32(21.5)
        );
    }

    #[test]
    fn decodes_frames_by_protocol_name() {
        let bytes = parse_hex("00 01 00 00 00 06 01 06 00 0A 01 F4").unwrap();
        let json = ProtocolArg::ModbusTcp
            .decode_to_json(&bytes, Direction::Request)
            .unwrap();
        assert!(json.contains("WriteSingleRegisterRequest"));
        assert!(ProtocolArg::Knx
            .decode_to_json(&bytes, Direction::Request)
            .is_err());
    }
}
