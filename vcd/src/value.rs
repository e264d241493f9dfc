//! Decoded value-change payloads.
//!
//! VCD signals use four-valued logic: each bit is 0, 1, X (unknown) or
//! Z (high impedance). Scalars are a single such bit, vectors are a string of
//! them, and real signals are plain `f64`s.

use std::fmt;

use derive_more::{From, Into};
use thiserror::Error;
use tinyvec::TinyVec;

use crate::{bitview::BitView, varbit::VarBit};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("invalid scalar value {0:?}; expected one of 0, 1, x, X, z, Z")]
    InvalidScalar(char),
    #[error("conflicting scalar flags (b={b}, x={x}, z={z}); at most one may be set")]
    ConflictingFlags { b: bool, x: bool, z: bool },
    #[error("invalid binary digit {0:?}; expected one of 0, 1, x, X, z, Z")]
    InvalidBinaryDigit(char),
    #[error("binary value has no digits")]
    EmptyBinary,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarValue {
    Zero,
    One,
    X,
    Z,
}

impl ScalarValue {
    pub fn from_char(c: u8) -> Result<Self, ValueError> {
        Ok(match c {
            b'0' => ScalarValue::Zero,
            b'1' => ScalarValue::One,
            b'x' | b'X' => ScalarValue::X,
            b'z' | b'Z' => ScalarValue::Z,
            _ => return Err(ValueError::InvalidScalar(c as char)),
        })
    }

    /// Build from a bit value and X/Z flags. `b` is the logic level and is
    /// only meaningful if neither flag is set, so at most one of the three
    /// may be true.
    pub fn from_flags(b: bool, x: bool, z: bool) -> Result<Self, ValueError> {
        match (b, x, z) {
            (false, false, false) => Ok(ScalarValue::Zero),
            (true, false, false) => Ok(ScalarValue::One),
            (false, true, false) => Ok(ScalarValue::X),
            (false, false, true) => Ok(ScalarValue::Z),
            _ => Err(ValueError::ConflictingFlags { b, x, z }),
        }
    }

    pub fn to_char(self) -> char {
        match self {
            ScalarValue::Zero => '0',
            ScalarValue::One => '1',
            ScalarValue::X => 'x',
            ScalarValue::Z => 'z',
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, ScalarValue::Zero | ScalarValue::One)
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// A vector value, stored as two bit planes:
///
/// | `value` | `unknown` | Digit |
/// |---------|-----------|-------|
/// | 0       | 0         | 0     |
/// | 1       | 0         | 1     |
/// | 0       | 1         | Z     |
/// | 1       | 1         | X     |
///
/// The unknown plane is only stored if there are any X or Z digits, which is
/// rare, so a plain binary number is just one `VarBit`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BinaryNum {
    value: VarBit,
    unknown: Option<VarBit>,
}

impl BinaryNum {
    /// Parse digits as written in a VCD file, most significant first (e.g.
    /// `10xz`). The width is the number of digits.
    pub fn from_digits(digits: &[u8]) -> Result<Self, ValueError> {
        if digits.is_empty() {
            return Err(ValueError::EmptyBinary);
        }
        let bits = digits.len();
        let bytes = (bits + 7) / 8;

        // Most vectors are small enough that these don't allocate.
        let mut value: TinyVec<[u8; 16]> = TinyVec::with_capacity(bytes);
        value.resize(bytes, 0);
        let mut unknown: TinyVec<[u8; 16]> = TinyVec::with_capacity(bytes);
        unknown.resize(bytes, 0);
        let mut any_unknown = false;

        for (i, &c) in digits.iter().rev().enumerate() {
            let (v, u) = match c {
                b'0' => (false, false),
                b'1' => (true, false),
                b'z' | b'Z' => (false, true),
                b'x' | b'X' => (true, true),
                _ => return Err(ValueError::InvalidBinaryDigit(c as char)),
            };
            if v {
                value[i / 8] |= 1 << (i % 8);
            }
            if u {
                unknown[i / 8] |= 1 << (i % 8);
                any_unknown = true;
            }
        }

        Ok(Self {
            value: VarBit::new(BitView::new(&value, bits)),
            unknown: any_unknown.then(|| VarBit::new(BitView::new(&unknown, bits))),
        })
    }

    /// A two-state number of width `bits` from the bottom bits of `value`.
    pub fn from_u64(value: u64, bits: usize) -> Self {
        Self {
            value: VarBit::from_u64(value, bits),
            unknown: None,
        }
    }

    pub fn bit_length(&self) -> usize {
        self.value.bit_length()
    }

    /// The 0/1 plane. For X digits this is 1, for Z digits 0.
    pub fn value_bits(&self) -> &VarBit {
        &self.value
    }

    /// The plane that marks X and Z digits, if there are any.
    pub fn unknown_bits(&self) -> Option<&VarBit> {
        self.unknown.as_ref()
    }

    /// True if every digit is 0 or 1.
    pub fn is_two_state(&self) -> bool {
        self.unknown.is_none()
    }

    /// Get digit `index` (0 = least significant).
    pub fn bit(&self, index: usize) -> ScalarValue {
        let v = self.value.bit(index);
        let u = self.unknown.as_ref().map_or(false, |u| u.bit(index));
        match (v, u) {
            (false, false) => ScalarValue::Zero,
            (true, false) => ScalarValue::One,
            (false, true) => ScalarValue::Z,
            (true, true) => ScalarValue::X,
        }
    }

    /// The number as an integer, if it is two-state and fits in 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.is_two_state() {
            self.value.to_u64()
        } else {
            None
        }
    }

    /// Digits most significant first, as they would be written in a VCD file.
    pub fn to_digit_string(&self) -> String {
        match &self.unknown {
            None => self.value.to_bit_string(),
            Some(_) => (0..self.bit_length())
                .rev()
                .map(|i| self.bit(i).to_char())
                .collect(),
        }
    }
}

impl fmt::Display for BinaryNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_digit_string())
    }
}

#[derive(From, Into, Copy, Clone, Debug, PartialEq, PartialOrd, Default)]
pub struct RealNum(pub f64);

impl fmt::Display for RealNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The payload of one value change.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(ScalarValue),
    Binary(BinaryNum),
    Real(RealNum),
}

impl fmt::Display for Value {
    /// Formats the value the way it is written in a VCD body, without the
    /// identifier.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(s) => write!(f, "{s}"),
            Value::Binary(b) => write!(f, "b{b}"),
            Value::Real(r) => write!(f, "r{r}"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_scalar_from_char() {
        assert_eq!(ScalarValue::from_char(b'0'), Ok(ScalarValue::Zero));
        assert_eq!(ScalarValue::from_char(b'1'), Ok(ScalarValue::One));
        assert_eq!(ScalarValue::from_char(b'x'), Ok(ScalarValue::X));
        assert_eq!(ScalarValue::from_char(b'X'), Ok(ScalarValue::X));
        assert_eq!(ScalarValue::from_char(b'z'), Ok(ScalarValue::Z));
        assert_eq!(ScalarValue::from_char(b'Z'), Ok(ScalarValue::Z));
        for c in [b'2', b'b', b'u', b' ', b'#', b'h'] {
            assert_eq!(
                ScalarValue::from_char(c),
                Err(ValueError::InvalidScalar(c as char))
            );
        }
    }

    #[test]
    fn test_scalar_is_known() {
        assert!(ScalarValue::Zero.is_known());
        assert!(ScalarValue::One.is_known());
        assert!(!ScalarValue::X.is_known());
        assert!(!ScalarValue::Z.is_known());
    }

    #[test]
    fn test_scalar_from_flags() {
        assert_eq!(ScalarValue::from_flags(false, false, false), Ok(ScalarValue::Zero));
        assert_eq!(ScalarValue::from_flags(true, false, false), Ok(ScalarValue::One));
        assert_eq!(ScalarValue::from_flags(false, true, false), Ok(ScalarValue::X));
        assert_eq!(ScalarValue::from_flags(false, false, true), Ok(ScalarValue::Z));

        for (b, x, z) in [
            (true, true, false),
            (true, false, true),
            (false, true, true),
            (true, true, true),
        ] {
            assert_eq!(
                ScalarValue::from_flags(b, x, z),
                Err(ValueError::ConflictingFlags { b, x, z })
            );
        }
    }

    #[test]
    fn test_binary_two_state() {
        let n = BinaryNum::from_digits(b"101").unwrap();
        assert_eq!(n.bit_length(), 3);
        assert!(n.is_two_state());
        assert_eq!(n.to_u64(), Some(0b101));
        assert_eq!(n, BinaryNum::from_u64(0b101, 3));
        assert_eq!(n.to_string(), "101");

        // Leading zeros are part of the width.
        let n = BinaryNum::from_digits(b"0000").unwrap();
        assert_eq!(n.bit_length(), 4);
        assert_eq!(n.to_u64(), Some(0));
    }

    #[test]
    fn test_binary_four_state() {
        let n = BinaryNum::from_digits(b"1xZ0").unwrap();
        assert!(!n.is_two_state());
        assert_eq!(n.to_u64(), None);
        assert_eq!(n.bit(0), ScalarValue::Zero);
        assert_eq!(n.bit(1), ScalarValue::Z);
        assert_eq!(n.bit(2), ScalarValue::X);
        assert_eq!(n.bit(3), ScalarValue::One);
        assert_eq!(n.to_string(), "1xz0");
    }

    #[test]
    fn test_binary_wide() {
        let digits: Vec<u8> = (0..130)
            .map(|i| if i % 3 == 0 { b'1' } else { b'0' })
            .collect();
        let n = BinaryNum::from_digits(&digits).unwrap();
        assert_eq!(n.bit_length(), 130);
        assert!(n.value_bits().is_heap());
        assert_eq!(n.to_string().as_bytes(), &digits[..]);
    }

    #[test]
    fn test_binary_errors() {
        assert_eq!(BinaryNum::from_digits(b""), Err(ValueError::EmptyBinary));
        assert_eq!(
            BinaryNum::from_digits(b"10u"),
            Err(ValueError::InvalidBinaryDigit('u'))
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::Scalar(ScalarValue::X).to_string(), "x");
        assert_eq!(
            Value::Binary(BinaryNum::from_u64(5, 4)).to_string(),
            "b0101"
        );
        assert_eq!(Value::Real(RealNum(3.14)).to_string(), "r3.14");
    }
}
