//! NaN-boxed scalar values.
//!
//! Every value is a single 64-bit word. Doubles are stored as their IEEE 754
//! bits; integers live in a slice of the negative quiet-NaN space that no
//! arithmetic operation produces.
//!
//! # Value Encoding (64 bits)
//!
//! - **Integer**: top 16 bits `0xFFFA`, low 32 bits hold the two's complement
//! - **Unknown**: top 16 bits `0xFFFB..=0xFFFF` (spare tags)
//! - **Double**: every other pattern

use std::fmt;

const TAG_SHIFT: u32 = 48;
/// First 16-bit prefix reserved for tagged values.
const TAG_REGION_START: u64 = 0xFFFA;
const INT_TAG: u64 = 0xFFFA_0000_0000_0000;
const PAYLOAD_MASK: u64 = 0x0000_0000_FFFF_FFFF;
/// Quiet NaN used for doubles whose bits would otherwise collide with a tag.
const CANONICAL_NAN: u64 = 0xFFF8_0000_0000_0000;

/// Classification of a value's bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Double,
    Integer,
    Unknown,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Double => write!(f, "double"),
            ValueKind::Integer => write!(f, "integer"),
            ValueKind::Unknown => write!(f, "unknown"),
        }
    }
}

#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Value(u64);

impl Value {
    #[inline]
    pub fn from_double(val: f64) -> Self {
        let bits = val.to_bits();
        if bits >> TAG_SHIFT >= TAG_REGION_START {
            Self(CANONICAL_NAN)
        } else {
            Self(bits)
        }
    }

    #[inline]
    pub fn from_int(val: i32) -> Self {
        Self(INT_TAG | (val as u32 as u64))
    }

    /// Wrap raw bits without canonicalising them.
    #[inline]
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn to_bits(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn kind(self) -> ValueKind {
        match self.0 >> TAG_SHIFT {
            0xFFFA => ValueKind::Integer,
            tag if tag > TAG_REGION_START => ValueKind::Unknown,
            _ => ValueKind::Double,
        }
    }

    #[inline]
    pub fn is_int(self) -> bool {
        self.kind() == ValueKind::Integer
    }

    #[inline]
    pub fn is_double(self) -> bool {
        self.kind() == ValueKind::Double
    }

    /// # Panics
    ///
    /// Panics if the value is not a double.
    #[inline]
    pub fn as_double(self) -> f64 {
        assert!(self.is_double(), "as_double on {} value", self.kind());
        f64::from_bits(self.0)
    }

    /// # Panics
    ///
    /// Panics if the value is not an integer.
    #[inline]
    pub fn as_int(self) -> i32 {
        assert!(self.is_int(), "as_int on {} value", self.kind());
        (self.0 & PAYLOAD_MASK) as u32 as i32
    }

    #[inline]
    pub fn try_as_double(self) -> Option<f64> {
        self.is_double().then(|| f64::from_bits(self.0))
    }

    #[inline]
    pub fn try_as_int(self) -> Option<i32> {
        self.is_int().then(|| (self.0 & PAYLOAD_MASK) as u32 as i32)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ValueKind::Integer => write!(f, "Int({})", self.as_int()),
            ValueKind::Double => write!(f, "Double({:?})", self.as_double()),
            ValueKind::Unknown => write!(f, "Unknown({:#018x})", self.0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ValueKind::Integer => {
                let mut buf = itoa::Buffer::new();
                f.write_str(buf.format(self.as_int()))
            }
            ValueKind::Double => {
                let d = self.as_double();
                // C's `%lf` spelling; Rust would print `NaN` without a sign.
                if d.is_nan() {
                    f.write_str(if d.is_sign_negative() { "-nan" } else { "nan" })
                } else {
                    write!(f, "{:.6}", d)
                }
            }
            ValueKind::Unknown => write!(f, "<unknown {:#018x}>", self.0),
        }
    }
}

impl From<i32> for Value {
    fn from(val: i32) -> Self {
        Self::from_int(val)
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Self::from_double(val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_round_trip() {
        for i in [0, 1, -1, 42, i32::MIN, i32::MAX] {
            let v = Value::from_int(i);
            assert_eq!(v.kind(), ValueKind::Integer);
            assert_eq!(v.as_int(), i);
        }
    }

    #[test]
    fn test_double_round_trip_is_bit_exact() {
        let samples = [
            0.0,
            -0.0,
            1.5,
            -1.5,
            f64::MAX,
            f64::MIN,
            f64::MIN_POSITIVE,
            f64::from_bits(1),
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NAN,
            f64::from_bits(0xFFF9_FFFF_FFFF_FFFF),
        ];
        for d in samples {
            let v = Value::from_double(d);
            assert_eq!(v.kind(), ValueKind::Double, "{:#x}", d.to_bits());
            assert_eq!(v.as_double().to_bits(), d.to_bits());
        }
    }

    #[test]
    fn test_tag_region_nan_is_canonicalised() {
        let v = Value::from_double(f64::from_bits(0xFFFA_0000_0000_0007));
        assert_eq!(v.kind(), ValueKind::Double);
        assert!(v.as_double().is_nan());
        assert_eq!(v.to_bits(), CANONICAL_NAN);
    }

    #[test]
    fn test_spare_tags_are_unknown() {
        assert_eq!(
            Value::from_bits(0xFFFB_0000_0000_0000).kind(),
            ValueKind::Unknown
        );
        assert_eq!(
            Value::from_bits(0xFFFF_FFFF_FFFF_FFFF).kind(),
            ValueKind::Unknown
        );
        assert_eq!(Value::from_bits(0xFFFB_0000_0000_0000).try_as_int(), None);
    }

    #[test]
    fn test_checked_accessors() {
        assert_eq!(Value::from_int(3).try_as_double(), None);
        assert_eq!(Value::from_int(3).try_as_int(), Some(3));
        assert_eq!(Value::from_double(2.5).try_as_int(), None);
        assert_eq!(Value::from_double(2.5).try_as_double(), Some(2.5));
    }

    #[test]
    #[should_panic(expected = "as_int on double value")]
    fn test_as_int_on_double_panics() {
        Value::from_double(1.0).as_int();
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from_int(-7).to_string(), "-7");
        assert_eq!(Value::from_double(7.0).to_string(), "7.000000");
        assert_eq!(Value::from_double(0.125).to_string(), "0.125000");
        assert_eq!(Value::from_double(f64::NEG_INFINITY).to_string(), "-inf");
    }

    #[test]
    fn test_nan_display_keeps_sign() {
        assert_eq!(Value::from_double(f64::NAN).to_string(), "nan");
        assert_eq!(Value::from_double(-f64::NAN).to_string(), "-nan");
        assert_eq!(Value::from_bits(CANONICAL_NAN).to_string(), "-nan");
    }
}
