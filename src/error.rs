use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, BookingError>;

/// Coarse classification used by the HTTP layer and by callers that retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Authorization,
    Unauthenticated,
    Gateway,
    Internal,
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Invalid date range: check-out must be after check-in")]
    InvalidDateRange,
    #[error("Invalid service fee: must be greater than zero")]
    InvalidServiceFee,
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("User {0} not found")]
    UserNotFound(Uuid),
    #[error("Listing {0} not found")]
    ListingNotFound(Uuid),
    #[error("Booking {0} not found")]
    BookingNotFound(Uuid),
    #[error("Payment {0} not found")]
    PaymentNotFound(String),
    #[error("Unknown payment provider: {0}")]
    UnknownProvider(String),

    #[error("Dates not available")]
    DatesUnavailable,
    #[error("{}", dates_held_message(*remaining_minutes))]
    DatesHeld { remaining_minutes: Option<i64> },
    #[error("You already have a pending booking for these dates")]
    DuplicatePendingBooking,
    #[error("No availability window covers the requested dates")]
    NoAvailability,
    #[error("Listing {0} cannot be booked by date")]
    ListingNotBookable(Uuid),
    #[error("Cannot move booking from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    #[error("Not allowed to act on this booking")]
    Forbidden,
    #[error("Missing or invalid caller identity")]
    Unauthenticated,
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}

fn dates_held_message(remaining_minutes: Option<i64>) -> String {
    match remaining_minutes {
        Some(minutes) => format!(
            "These dates are currently held by another guest. Try again in {minutes} minute(s)"
        ),
        None => "These dates are already booked".to_string(),
    }
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDateRange
            | Self::InvalidServiceFee
            | Self::InvalidStatus(_)
            | Self::InvalidAmount(_)
            | Self::MalformedPayload(_) => ErrorKind::Validation,
            Self::UserNotFound(_)
            | Self::ListingNotFound(_)
            | Self::BookingNotFound(_)
            | Self::PaymentNotFound(_)
            | Self::UnknownProvider(_) => ErrorKind::NotFound,
            Self::DatesUnavailable
            | Self::DatesHeld { .. }
            | Self::DuplicatePendingBooking
            | Self::NoAvailability
            | Self::ListingNotBookable(_)
            | Self::InvalidTransition { .. }
            | Self::WriteConflict(_) => ErrorKind::Conflict,
            Self::Forbidden => ErrorKind::Authorization,
            Self::Unauthenticated | Self::InvalidSignature => ErrorKind::Unauthenticated,
            Self::Gateway(_) => ErrorKind::Gateway,
            Self::Storage(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Csv(_)
            | Self::Serialization(_) => ErrorKind::Internal,
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDb(_) => ErrorKind::Internal,
        }
    }
}

/// Failures talking to an external payment provider.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} rejected the request: {message}")]
    Rejected { provider: String, message: String },
    #[error("{provider} returned an unexpected response: {message}")]
    UnexpectedResponse { provider: String, message: String },
    #[error("{0} credentials are not configured")]
    NotConfigured(String),
}
