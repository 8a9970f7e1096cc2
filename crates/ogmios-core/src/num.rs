//! Arbitrary-precision integers for on-chain amounts.
//!
//! Coin quantities, fees and execution units are decoded into [`Num`] rather
//! than fixed-width integers. Individual values fit comfortably in 64 bits,
//! but sums over mints and withdrawals do not have to.
//!
//! On the wire a `Num` is a plain number whenever it fits in 64 or 128 bits
//! and a decimal string otherwise. Decoding accepts any integer width, decimal
//! strings, and serde_json arbitrary-precision numbers.

use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// Map key serde_json uses to smuggle out-of-range numbers through `visit_map`.
const JSON_NUMBER_TOKEN: &str = "$serde_json::private::Number";

/// Largest integer an f64 represents exactly.
const MAX_SAFE_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// An arbitrary-precision signed integer.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Num(BigInt);

impl Num {
    /// Zero.
    pub fn zero() -> Self {
        Self(BigInt::default())
    }

    pub fn is_zero(&self) -> bool {
        self.0.sign() == Sign::NoSign
    }

    pub fn is_negative(&self) -> bool {
        self.0.sign() == Sign::Minus
    }

    /// The value as a `u64`, if it fits.
    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(&self.0).ok()
    }

    /// The value as an `i64`, if it fits.
    pub fn to_i64(&self) -> Option<i64> {
        i64::try_from(&self.0).ok()
    }

    pub fn as_bigint(&self) -> &BigInt {
        &self.0
    }

    pub fn into_bigint(self) -> BigInt {
        self.0
    }
}

impl fmt::Debug for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Num({})", self.0)
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Num {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<BigInt>()
            .map(Self)
            .map_err(|e| CoreError::InvalidNumber(format!("{s:?}: {e}")))
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Num {
                fn from(n: $t) -> Self {
                    Self(BigInt::from(n))
                }
            }
        )*
    };
}

impl_from_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl From<BigInt> for Num {
    fn from(n: BigInt) -> Self {
        Self(n)
    }
}

impl Add for Num {
    type Output = Num;

    fn add(self, rhs: Num) -> Num {
        Num(self.0 + rhs.0)
    }
}

impl<'a> Add<&'a Num> for &'a Num {
    type Output = Num;

    fn add(self, rhs: &'a Num) -> Num {
        Num(&self.0 + &rhs.0)
    }
}

impl Sub for Num {
    type Output = Num;

    fn sub(self, rhs: Num) -> Num {
        Num(self.0 - rhs.0)
    }
}

impl<'a> Sub<&'a Num> for &'a Num {
    type Output = Num;

    fn sub(self, rhs: &'a Num) -> Num {
        Num(&self.0 - &rhs.0)
    }
}

impl Neg for Num {
    type Output = Num;

    fn neg(self) -> Num {
        Num(-self.0)
    }
}

impl std::iter::Sum for Num {
    fn sum<I: Iterator<Item = Num>>(iter: I) -> Num {
        iter.fold(Num::zero(), |acc, n| acc + n)
    }
}

impl Serialize for Num {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Ok(n) = i64::try_from(&self.0) {
            return serializer.serialize_i64(n);
        }
        if let Ok(n) = u64::try_from(&self.0) {
            return serializer.serialize_u64(n);
        }
        if let Ok(n) = i128::try_from(&self.0) {
            return serializer.serialize_i128(n);
        }
        if let Ok(n) = u128::try_from(&self.0) {
            return serializer.serialize_u128(n);
        }
        serializer.serialize_str(&self.0.to_string())
    }
}

struct NumVisitor;

impl<'de> Visitor<'de> for NumVisitor {
    type Value = Num;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or a decimal string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Num, E> {
        Ok(Num::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Num, E> {
        Ok(Num::from(v))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<Num, E> {
        Ok(Num::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Num, E> {
        Ok(Num::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Num, E> {
        if v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_SAFE_FLOAT_INT {
            Ok(Num::from(v as i64))
        } else {
            Err(E::custom(format!("{v} is not an exact integer")))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Num, E> {
        v.parse::<Num>().map_err(E::custom)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Num, A::Error> {
        match map.next_key::<String>()? {
            Some(key) if key == JSON_NUMBER_TOKEN => {
                let digits: String = map.next_value()?;
                digits.parse::<Num>().map_err(de::Error::custom)
            }
            _ => Err(de::Error::custom("expected a number")),
        }
    }
}

impl<'de> Deserialize<'de> for Num {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(NumVisitor)
    }
}
