use crate::error::BookingError;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Smallest points purchase accepted, in currency units.
pub const MIN_POINTS_PURCHASE: Decimal = Decimal::ONE_HUNDRED;

/// Represents a positive monetary amount charged through a gateway.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, BookingError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(BookingError::InvalidAmount(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = BookingError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// A caller-supplied booking service fee. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ServiceFee(Decimal);

impl ServiceFee {
    pub fn new(value: Decimal) -> Result<Self, BookingError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(BookingError::InvalidServiceFee)
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

/// Points granted for a purchase: one point per hundred currency units.
pub fn points_for_purchase(amount: Amount) -> Result<u64, BookingError> {
    if amount.value() < MIN_POINTS_PURCHASE {
        return Err(BookingError::InvalidAmount(format!(
            "Minimum purchase amount is {MIN_POINTS_PURCHASE}"
        )));
    }
    let points = (amount.value() / Decimal::ONE_HUNDRED).floor();
    points
        .to_u64()
        .ok_or_else(|| BookingError::InvalidAmount(amount.value().to_string()))
}
