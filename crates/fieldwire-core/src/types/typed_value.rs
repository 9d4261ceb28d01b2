use crate::types::PrimitiveType;
use alloc::vec::Vec;

/// One decoded element of a [`PrimitiveType`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scalar {
    Bool(bool),
    SInt8(i8),
    SInt16(i16),
    SInt32(i32),
    SInt64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Char(u8),
    WChar(u16),
}

impl Scalar {
    pub const fn primitive_type(&self) -> PrimitiveType {
        match self {
            Self::Bool(_) => PrimitiveType::Bool,
            Self::SInt8(_) => PrimitiveType::SInt8,
            Self::SInt16(_) => PrimitiveType::SInt16,
            Self::SInt32(_) => PrimitiveType::SInt32,
            Self::SInt64(_) => PrimitiveType::SInt64,
            Self::UInt8(_) => PrimitiveType::UInt8,
            Self::UInt16(_) => PrimitiveType::UInt16,
            Self::UInt32(_) => PrimitiveType::UInt32,
            Self::UInt64(_) => PrimitiveType::UInt64,
            Self::Float32(_) => PrimitiveType::Float32,
            Self::Float64(_) => PrimitiveType::Float64,
            Self::Char(_) => PrimitiveType::Char,
            Self::WChar(_) => PrimitiveType::WChar,
        }
    }

    /// Lossy numeric view, handy for display and scaling.
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Bool(v) => f64::from(u8::from(v)),
            Self::SInt8(v) => f64::from(v),
            Self::SInt16(v) => f64::from(v),
            Self::SInt32(v) => f64::from(v),
            Self::SInt64(v) => v as f64,
            Self::UInt8(v) | Self::Char(v) => f64::from(v),
            Self::UInt16(v) | Self::WChar(v) => f64::from(v),
            Self::UInt32(v) => f64::from(v),
            Self::UInt64(v) => v as f64,
            Self::Float32(v) => f64::from(v),
            Self::Float64(v) => v,
        }
    }
}

/// A decoded value: one scalar, or a list of same-typed scalars.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypedValue {
    Scalar(Scalar),
    List(Vec<Scalar>),
}

impl TypedValue {
    /// Element count: 1 for a scalar.
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(v) => Some(v),
            Self::List(_) => None,
        }
    }

    /// All elements in order, whether scalar or list.
    pub fn elements(&self) -> &[Scalar] {
        match self {
            Self::Scalar(v) => core::slice::from_ref(v),
            Self::List(items) => items,
        }
    }
}

impl From<Scalar> for TypedValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<Scalar>> for TypedValue {
    fn from(value: Vec<Scalar>) -> Self {
        Self::List(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{Scalar, TypedValue};
    use crate::types::PrimitiveType;

    #[test]
    fn scalar_reports_type() {
        assert_eq!(Scalar::WChar(0x41).primitive_type(), PrimitiveType::WChar);
        assert_eq!(Scalar::SInt64(-1).primitive_type(), PrimitiveType::SInt64);
    }

    #[test]
    fn elements_view() {
        let scalar = TypedValue::Scalar(Scalar::UInt16(7));
        assert_eq!(scalar.elements(), &[Scalar::UInt16(7)]);
        let list = TypedValue::List(vec![Scalar::Bool(true), Scalar::Bool(false)]);
        assert_eq!(list.len(), 2);
        assert!(list.as_scalar().is_none());
        assert!(TypedValue::List(vec![]).is_empty());
    }
}
