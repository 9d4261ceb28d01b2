use crate::encoding::{reader::BitReader, writer::BitWriter};
use crate::types::{PrimitiveType, Scalar, TypedValue};
use crate::{DecodeError, EncodeError};
use alloc::vec::Vec;

/// Decodes `count` elements of `ty`.
///
/// A count of one yields [`TypedValue::Scalar`], any other count a
/// [`TypedValue::List`] of exactly `count` elements. A single boolean occupies
/// a whole byte (seven reserved bits, then the data bit); boolean lists are
/// packed one bit per element. On error the cursor is left where it was.
pub fn decode_value(
    r: &mut BitReader<'_>,
    ty: PrimitiveType,
    count: usize,
) -> Result<TypedValue, DecodeError> {
    let mut cursor = *r;
    let value = if count == 1 {
        TypedValue::Scalar(decode_scalar(&mut cursor, ty, true)?)
    } else {
        let items = (0..count)
            .map(|_| decode_scalar(&mut cursor, ty, false))
            .collect::<Result<Vec<_>, _>>()?;
        TypedValue::List(items)
    };
    *r = cursor;
    Ok(value)
}

/// Decodes from the start of `bytes`, ignoring any trailing bytes.
pub fn decode_value_from_bytes(
    bytes: &[u8],
    ty: PrimitiveType,
    count: usize,
) -> Result<TypedValue, DecodeError> {
    decode_value(&mut BitReader::new(bytes), ty, count)
}

fn decode_scalar(
    r: &mut BitReader<'_>,
    ty: PrimitiveType,
    pad_bool: bool,
) -> Result<Scalar, DecodeError> {
    Ok(match ty {
        PrimitiveType::Bool => {
            if pad_bool {
                r.skip_bits(7)?;
            }
            Scalar::Bool(r.read_bit()?)
        }
        PrimitiveType::SInt8 => Scalar::SInt8(r.read_int(8)? as i8),
        PrimitiveType::SInt16 => Scalar::SInt16(r.read_int(16)? as i16),
        PrimitiveType::SInt32 => Scalar::SInt32(r.read_int(32)? as i32),
        PrimitiveType::SInt64 => Scalar::SInt64(r.read_int(64)?),
        PrimitiveType::UInt8 => Scalar::UInt8(r.read_uint(8)? as u8),
        PrimitiveType::UInt16 => Scalar::UInt16(r.read_uint(16)? as u16),
        PrimitiveType::UInt32 => Scalar::UInt32(r.read_uint(32)? as u32),
        PrimitiveType::UInt64 => Scalar::UInt64(r.read_uint(64)?),
        PrimitiveType::Float32 => Scalar::Float32(r.read_f32()?),
        PrimitiveType::Float64 => Scalar::Float64(r.read_f64()?),
        PrimitiveType::Char => Scalar::Char(r.read_uint(8)? as u8),
        PrimitiveType::WChar => Scalar::WChar(r.read_uint(16)? as u16),
    })
}

/// Encodes `value` as `count` elements of `ty`, the inverse of
/// [`decode_value`].
///
/// The value shape must agree with `(ty, count)`: a scalar for a count of
/// one, otherwise a list of exactly `count` elements, every element of type
/// `ty`. Anything else fails with [`EncodeError::UnsupportedType`] before a
/// single bit is written.
pub fn encode_value(
    w: &mut BitWriter,
    value: &TypedValue,
    ty: PrimitiveType,
    count: usize,
) -> Result<(), EncodeError> {
    let shape_ok = match value {
        TypedValue::Scalar(v) => count == 1 && v.primitive_type() == ty,
        TypedValue::List(items) => {
            count != 1 && items.len() == count && items.iter().all(|v| v.primitive_type() == ty)
        }
    };
    if !shape_ok {
        return Err(EncodeError::UnsupportedType);
    }

    match value {
        TypedValue::Scalar(v) => encode_scalar(w, v, true),
        TypedValue::List(items) => items.iter().try_for_each(|v| encode_scalar(w, v, false)),
    }
}

pub fn encode_value_to_vec(
    value: &TypedValue,
    ty: PrimitiveType,
    count: usize,
) -> Result<Vec<u8>, EncodeError> {
    let mut w = BitWriter::new();
    encode_value(&mut w, value, ty, count)?;
    Ok(w.into_bytes())
}

fn encode_scalar(w: &mut BitWriter, value: &Scalar, pad_bool: bool) -> Result<(), EncodeError> {
    match *value {
        Scalar::Bool(v) => {
            if pad_bool {
                w.write_zeros(7)?;
            }
            w.write_bit(v)
        }
        Scalar::SInt8(v) => w.write_int(8, i64::from(v)),
        Scalar::SInt16(v) => w.write_int(16, i64::from(v)),
        Scalar::SInt32(v) => w.write_int(32, i64::from(v)),
        Scalar::SInt64(v) => w.write_int(64, v),
        Scalar::UInt8(v) | Scalar::Char(v) => w.write_u8(v),
        Scalar::UInt16(v) | Scalar::WChar(v) => w.write_be_u16(v),
        Scalar::UInt32(v) => w.write_be_u32(v),
        Scalar::UInt64(v) => w.write_uint(64, v),
        Scalar::Float32(v) => w.write_f32(v),
        Scalar::Float64(v) => w.write_f64(v),
    }
}
