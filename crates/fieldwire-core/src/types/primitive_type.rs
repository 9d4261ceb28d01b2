/// Fixed-width scalar kinds understood by the typed value codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveType {
    Bool,
    SInt8,
    SInt16,
    SInt32,
    SInt64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Single-byte character.
    Char,
    /// UTF-16 code unit.
    WChar,
}

impl PrimitiveType {
    pub const ALL: [PrimitiveType; 13] = [
        Self::Bool,
        Self::SInt8,
        Self::SInt16,
        Self::SInt32,
        Self::SInt64,
        Self::UInt8,
        Self::UInt16,
        Self::UInt32,
        Self::UInt64,
        Self::Float32,
        Self::Float64,
        Self::Char,
        Self::WChar,
    ];

    /// Wire width of one element in bits.
    pub const fn bit_width(self) -> u8 {
        match self {
            Self::Bool => 1,
            Self::SInt8 | Self::UInt8 | Self::Char => 8,
            Self::SInt16 | Self::UInt16 | Self::WChar => 16,
            Self::SInt32 | Self::UInt32 | Self::Float32 => 32,
            Self::SInt64 | Self::UInt64 | Self::Float64 => 64,
        }
    }

    /// Number of 16-bit registers needed to hold `count` elements, or `None`
    /// when that exceeds a 16-bit quantity.
    pub const fn register_count(self, count: u16) -> Option<u16> {
        let registers = (self.bit_width() as u32 * count as u32).div_ceil(16);
        if registers > u16::MAX as u32 {
            None
        } else {
            Some(registers as u16)
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "BOOL",
            Self::SInt8 => "SINT",
            Self::SInt16 => "INT",
            Self::SInt32 => "DINT",
            Self::SInt64 => "LINT",
            Self::UInt8 => "USINT",
            Self::UInt16 => "UINT",
            Self::UInt32 => "UDINT",
            Self::UInt64 => "ULINT",
            Self::Float32 => "REAL",
            Self::Float64 => "LREAL",
            Self::Char => "CHAR",
            Self::WChar => "WCHAR",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::PrimitiveType;

    #[test]
    fn widths() {
        assert_eq!(PrimitiveType::Bool.bit_width(), 1);
        assert_eq!(PrimitiveType::WChar.bit_width(), 16);
        assert_eq!(PrimitiveType::Float64.bit_width(), 64);
    }

    #[test]
    fn register_counts_round_up() {
        assert_eq!(PrimitiveType::UInt16.register_count(2), Some(2));
        assert_eq!(PrimitiveType::Float32.register_count(3), Some(6));
        assert_eq!(PrimitiveType::UInt8.register_count(3), Some(2));
        assert_eq!(PrimitiveType::Bool.register_count(17), Some(2));
    }

    #[test]
    fn register_count_overflow_is_reported() {
        assert_eq!(PrimitiveType::Float64.register_count(20000), None);
        assert_eq!(PrimitiveType::UInt16.register_count(u16::MAX), Some(u16::MAX));
        assert_eq!(PrimitiveType::UInt32.register_count(32768), None);
    }

    #[test]
    fn names_roundtrip() {
        for ty in PrimitiveType::ALL {
            assert_eq!(PrimitiveType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(PrimitiveType::from_name("real"), Some(PrimitiveType::Float32));
        assert_eq!(PrimitiveType::from_name("STRING"), None);
    }
}
