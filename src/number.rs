// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![allow(clippy::float_cmp, clippy::as_conversions)]

use core::fmt::{self, Debug, Display, Formatter};
use core::str::FromStr;

use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};
use serde::ser::Serializer;
use serde::Serialize;

use crate::Rc;

/// A message number.
///
/// Integers are kept exact. Values that do not fit in 64 bits are stored as
/// big integers so that fields such as `uint64` timestamps or identifiers
/// compare without going through `f64`.
#[derive(Clone)]
pub enum Number {
    UInt(u64),
    Int(i64),
    Float(f64),
    BigInt(Rc<BigInt>),
}

impl Number {
    fn from_bigint_owned(value: BigInt) -> Self {
        if value.is_zero() {
            return Number::UInt(0);
        }

        if value.is_negative() {
            if let Some(i) = value.to_i64() {
                return Number::Int(i);
            }
        } else if let Some(u) = value.to_u64() {
            return Number::UInt(u);
        }

        Number::BigInt(Rc::new(value))
    }

    fn to_bigint_owned(&self) -> Option<BigInt> {
        match self {
            Number::UInt(v) => Some(BigInt::from(*v)),
            Number::Int(v) => Some(BigInt::from(*v)),
            Number::BigInt(v) => Some((**v).clone()),
            Number::Float(f) => Self::float_to_bigint(*f),
        }
    }

    // A finite integral float is an exact integer of any magnitude.
    fn float_to_bigint(value: f64) -> Option<BigInt> {
        if !value.is_finite() || value.fract() != 0.0 {
            return None;
        }
        BigInt::from_f64(value)
    }

    fn to_f64_lossy(&self) -> f64 {
        match self {
            Number::UInt(v) => *v as f64,
            Number::Int(v) => *v as f64,
            Number::Float(v) => *v,
            Number::BigInt(v) => match v.to_f64() {
                Some(f) => f,
                None if v.is_negative() => f64::NEG_INFINITY,
                None => f64::INFINITY,
            },
        }
    }

    pub fn is_integer(&self) -> bool {
        match self {
            Number::Float(f) => f.is_finite() && f.fract() == 0.0,
            _ => true,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Number::UInt(v) => Some(*v),
            Number::Int(v) if *v >= 0 => Some(*v as u64),
            Number::BigInt(v) => v.to_u64(),
            Number::Float(f) if *f >= 0.0 => Self::float_to_bigint(*f)?.to_u64(),
            _ => None,
        }
    }

    /// Integer value as an array offset. Integers beyond the `i64` range
    /// saturate, so they still address past either end of an array.
    pub fn as_offset(&self) -> Option<i64> {
        let value = self.to_bigint_owned()?;
        Some(match value.to_i64() {
            Some(offset) => offset,
            None if value.is_negative() => i64::MIN,
            None => i64::MAX,
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Number::Float(f) if f.is_finite() => Some(*f),
            Number::Float(_) => None,
            _ => Some(self.to_f64_lossy()),
        }
    }

    pub fn format_decimal(&self) -> String {
        match self {
            Number::UInt(v) => v.to_string(),
            Number::Int(v) => v.to_string(),
            Number::BigInt(v) => v.to_string(),
            Number::Float(f) if f.is_nan() => "NaN".to_string(),
            Number::Float(f) => f.to_string(),
        }
    }
}

impl Debug for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_decimal())
    }
}

impl Display for Number {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_decimal())
    }
}

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Number::UInt(v) => serializer.serialize_u64(*v),
            Number::Int(v) => serializer.serialize_i64(*v),
            Number::Float(v) => serializer.serialize_f64(*v),
            Number::BigInt(_) => {
                let v = serde_json::Number::from_str(&self.format_decimal())
                    .map_err(|_| serde::ser::Error::custom("could not serialize number"))?;
                v.serialize(serializer)
            }
        }
    }
}

impl From<BigInt> for Number {
    fn from(value: BigInt) -> Self {
        Number::from_bigint_owned(value)
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Number::UInt(value)
    }
}

impl From<usize> for Number {
    fn from(value: usize) -> Self {
        Number::UInt(value as u64)
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        if value >= 0 {
            Number::UInt(value as u64)
        } else {
            Number::Int(value)
        }
    }
}

impl From<u128> for Number {
    fn from(value: u128) -> Self {
        match u64::try_from(value) {
            Ok(n) => Number::UInt(n),
            Err(_) => Number::from_bigint_owned(BigInt::from(value)),
        }
    }
}

impl From<i128> for Number {
    fn from(value: i128) -> Self {
        Number::from_bigint_owned(BigInt::from(value))
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseNumberError;

impl FromStr for Number {
    type Err = ParseNumberError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        if !digits.is_empty() && digits.bytes().all(|c| c.is_ascii_digit()) {
            let mut value = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or(ParseNumberError)?;
            if negative {
                value = -value;
            }
            return Ok(Number::from_bigint_owned(value));
        }

        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Number::Float(f)),
            _ => Err(ParseNumberError),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.to_bigint_owned(), other.to_bigint_owned()) {
            return a == b;
        }

        // A fractional float never equals an integer.
        match (self, other) {
            (Number::Float(a), Number::Float(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Number {}
