//! Conversion between `f64` and narrower or wider IEEE-754 style layouts.
//!
//! Binary32 and binary64 are bit-cast. Other layouts (for example 5/10 half
//! precision) are converted field by field; narrowing truncates toward zero.

const F64_MANTISSA_BITS: u32 = 52;
const F64_BIAS: i64 = 1023;

/// Total bit width of a sign/exponent/mantissa layout, if it is supported.
///
/// Exponents up to 11 bits and mantissas up to 52 bits are supported, which
/// keeps every value exactly representable as `f64`.
pub(crate) fn total_width(exponent_bits: u8, mantissa_bits: u8) -> Option<u8> {
    if !(2..=11).contains(&exponent_bits) || !(1..=52).contains(&mantissa_bits) {
        return None;
    }
    Some(1 + exponent_bits + mantissa_bits)
}

pub(crate) fn widen(raw: u64, exponent_bits: u8, mantissa_bits: u8) -> Option<f64> {
    let e = u32::from(exponent_bits);
    let m = u32::from(mantissa_bits);
    total_width(exponent_bits, mantissa_bits)?;
    if e == 8 && m == 23 {
        return Some(f64::from(f32::from_bits(raw as u32)));
    }
    if e == 11 && m == 52 {
        return Some(f64::from_bits(raw));
    }

    let sign = (raw >> (e + m)) & 1;
    let exp = (raw >> m) & ((1 << e) - 1);
    let mant = raw & ((1 << m) - 1);
    let max_exp = (1u64 << e) - 1;
    let shift = F64_MANTISSA_BITS - m;

    let bits = if e == 11 {
        (exp << F64_MANTISSA_BITS) | (mant << shift)
    } else if exp == max_exp {
        (0x7FF << F64_MANTISSA_BITS) | (mant << shift)
    } else if exp == 0 && mant == 0 {
        0
    } else {
        let bias = (1i64 << (e - 1)) - 1;
        if exp == 0 {
            // Subnormal in the source layout; normalize into f64.
            let top = 63 - mant.leading_zeros();
            let unbiased = i64::from(top) + 1 - bias - i64::from(m);
            let frac = (mant ^ (1 << top)) << (F64_MANTISSA_BITS - top);
            (((unbiased + F64_BIAS) as u64) << F64_MANTISSA_BITS) | frac
        } else {
            let unbiased = exp as i64 - bias;
            (((unbiased + F64_BIAS) as u64) << F64_MANTISSA_BITS) | (mant << shift)
        }
    };
    Some(f64::from_bits((sign << 63) | bits))
}

/// Converts `value` into the given layout. Returns `None` when the layout is
/// unsupported or the magnitude overflows it.
pub(crate) fn narrow(value: f64, exponent_bits: u8, mantissa_bits: u8) -> Option<u64> {
    let e = u32::from(exponent_bits);
    let m = u32::from(mantissa_bits);
    total_width(exponent_bits, mantissa_bits)?;
    if e == 8 && m == 23 {
        let narrowed = value as f32;
        if narrowed.is_infinite() && value.is_finite() {
            return None;
        }
        return Some(u64::from(narrowed.to_bits()));
    }
    if e == 11 && m == 52 {
        return Some(value.to_bits());
    }

    let bits = value.to_bits();
    let sign = bits >> 63;
    let exp = ((bits >> F64_MANTISSA_BITS) & 0x7FF) as i64;
    let frac = bits & ((1 << F64_MANTISSA_BITS) - 1);
    let shift = F64_MANTISSA_BITS - m;
    let max_exp = (1i64 << e) - 1;

    let body = if e == 11 {
        ((exp as u64) << m) | (frac >> shift)
    } else if exp == 0x7FF {
        let nan_payload = if frac != 0 { 1 << (m - 1) } else { 0 };
        ((max_exp as u64) << m) | nan_payload
    } else if exp == 0 {
        // f64 subnormals are far below any narrower layout's range.
        0
    } else {
        let bias = (1i64 << (e - 1)) - 1;
        let target = exp - F64_BIAS + bias;
        if target >= max_exp {
            return None;
        }
        if target <= 0 {
            let full = (1u64 << F64_MANTISSA_BITS) | frac;
            let sub_shift = u64::from(shift) + (1 - target) as u64;
            if sub_shift >= 64 {
                0
            } else {
                full >> sub_shift
            }
        } else {
            ((target as u64) << m) | (frac >> shift)
        }
    };
    Some((sign << (e + m)) | body)
}
