use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use sqlx::{
    encode::IsNull,
    error::BoxDynError,
    sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef},
    Decode,
    Encode,
    Sqlite,
    Type,
};
use thiserror::Error;

use crate::op;

pub const DEFAULT_CURRENCY_CODE: &str = "USD";

/// Number of decimal places in a minor currency unit (cents).
const MINOR_UNIT_SCALE: u32 = 2;

//--------------------------------------       Money        ---------------------------------------------------------
/// A fixed-point monetary amount in major units (e.g. dollars).
///
/// Equality is by value, so `50.0` and `50.00` are the same amount. Amounts are persisted as decimal text and
/// survive a round trip through the database without loss of precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MoneyConversionError {
    #[error("Not a valid monetary amount: {0}")]
    InvalidAmount(String),
    #[error("{0} has sub-cent precision and cannot be expressed in minor units")]
    SubMinorUnit(Money),
    #[error("{0} is too large to be expressed in minor units")]
    Overflow(Money),
}

impl Money {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Converts the amount into an integer count of minor units (cents), as expected by processors that do not
    /// accept decimal amounts. Fails if the amount carries more precision than a cent.
    pub fn to_minor_units(&self) -> Result<i64, MoneyConversionError> {
        let scaled = self.0 * Decimal::from(10i64.pow(MINOR_UNIT_SCALE));
        if !scaled.fract().is_zero() {
            return Err(MoneyConversionError::SubMinorUnit(*self));
        }
        scaled.to_i64().ok_or(MoneyConversionError::Overflow(*self))
    }

    pub fn from_minor_units(units: i64) -> Self {
        Self(Decimal::new(units, MINOR_UNIT_SCALE))
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(Decimal::from(value))
    }
}

impl FromStr for Money {
    type Err = MoneyConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Self).map_err(|_| MoneyConversionError::InvalidAmount(s.to_string()))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Type<Sqlite> for Money {
    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Sqlite> for Money {
    fn encode_by_ref(&self, buf: &mut Vec<SqliteArgumentValue<'q>>) -> IsNull {
        <String as Encode<'q, Sqlite>>::encode(self.0.to_string(), buf)
    }
}

impl<'r> Decode<'r, Sqlite> for Money {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        let text = <&str as Decode<'r, Sqlite>>::decode(value)?;
        let amount = Decimal::from_str(text)?;
        Ok(Self(amount))
    }
}
