use rust_decimal::Decimal;
use uuid::Uuid;

/// Side-effect messages emitted after a transition commits.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    BookingConfirmed {
        booking_id: Uuid,
        user_id: Uuid,
        reference: String,
    },
    BookingCancelled {
        booking_id: Uuid,
        user_id: Uuid,
        reason: CancelReason,
    },
    PaymentFailed {
        reference: String,
        user_id: Uuid,
    },
    /// Money arrived for a booking that had already been released.
    LatePayment {
        booking_id: Uuid,
        reference: String,
        amount: Decimal,
    },
    PointsCredited {
        user_id: Uuid,
        points: u64,
    },
    PayoutSettled {
        vendor_id: Uuid,
        reference: String,
        succeeded: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    HoldExpired,
    PaymentFailed,
    GuestCancelled,
    AdminCancelled,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HoldExpired => "hold_expired",
            Self::PaymentFailed => "payment_failed",
            Self::GuestCancelled => "guest_cancelled",
            Self::AdminCancelled => "admin_cancelled",
        }
    }
}
