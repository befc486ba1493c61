use crate::domain::availability::{DateRange, PriceBreakdown};
use crate::error::BookingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Durable booking states.
///
/// A booking attempt passes through `REQUESTED` and `HELD` inside a single
/// `create_booking` call; only the states below are ever persisted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            _ => Err(BookingError::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub check_in: DateTime<Utc>,
    pub check_out: DateTime<Utc>,
    pub base_price: Decimal,
    pub service_fee: Decimal,
    pub total_price: Decimal,
    pub status: BookingStatus,
    pub payment_ref: Option<String>,
    pub hold_id: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new_pending(
        user_id: Uuid,
        listing_id: Uuid,
        range: DateRange,
        price: PriceBreakdown,
        hold_id: Uuid,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            listing_id,
            check_in: range.start,
            check_out: range.end,
            base_price: price.base_price,
            service_fee: price.service_fee,
            total_price: price.total_price,
            status: BookingStatus::Pending,
            payment_ref: None,
            hold_id: Some(hold_id),
            deleted_at: None,
            created_at: now,
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.check_in,
            end: self.check_out,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Pending or confirmed, and not soft-deleted.
    pub fn is_live(&self) -> bool {
        !self.is_deleted() && self.status != BookingStatus::Cancelled
    }

    pub fn is_confirmed(&self) -> bool {
        !self.is_deleted() && self.status == BookingStatus::Confirmed
    }

    /// Guests may withdraw while payment is pending, or after confirmation
    /// as long as the stay has not started.
    pub fn can_be_cancelled_by_guest(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            BookingStatus::Pending => true,
            BookingStatus::Confirmed => now < self.check_in,
            BookingStatus::Cancelled => false,
        }
    }
}

/// Soft lock on a date range while the guest pays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApartmentHold {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
}

impl ApartmentHold {
    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expiry_time > now
    }

    /// Minutes until the hold lapses, rounded up.
    pub fn remaining_minutes(&self, now: DateTime<Utc>) -> i64 {
        let secs = (self.expiry_time - now).num_seconds().max(0);
        (secs + 59) / 60
    }
}

/// Durable timer row: reverse `booking_id` at `fire_at` unless it was paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledExpiry {
    pub booking_id: Uuid,
    pub hold_id: Uuid,
    pub listing_id: Uuid,
    pub fire_at: DateTime<Utc>,
}
