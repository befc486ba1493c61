use crate::error::BookingError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Failed,
}

/// What a payment is buying; decides the side effects of confirmation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPurpose {
    Booking,
    Points,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::Points => "points",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Flutterwave,
    Paystack,
    Remita,
    Mock,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flutterwave => "flutterwave",
            Self::Paystack => "paystack",
            Self::Remita => "remita",
            Self::Mock => "mock",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flutterwave" => Ok(Self::Flutterwave),
            "paystack" => Ok(Self::Paystack),
            "remita" => Ok(Self::Remita),
            "mock" => Ok(Self::Mock),
            other => Err(BookingError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub booking_id: Option<Uuid>,
    pub amount: Decimal,
    pub reference: String,
    pub status: PaymentStatus,
    pub provider: Provider,
    pub purpose: PaymentPurpose,
    /// Opaque provider details: authorization URL, transaction ids, timestamps.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn pending(
        user_id: Uuid,
        booking_id: Option<Uuid>,
        amount: Decimal,
        reference: String,
        provider: Provider,
        purpose: PaymentPurpose,
        now: DateTime<Utc>,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("type".to_string(), Value::from(purpose.as_str()));
        Self {
            id: Uuid::new_v4(),
            user_id,
            booking_id,
            amount,
            reference,
            status: PaymentStatus::Pending,
            provider,
            purpose,
            metadata: Value::Object(metadata),
            created_at: now,
        }
    }

    pub fn authorization_url(&self) -> Option<&str> {
        self.metadata.get("authorizationUrl").and_then(Value::as_str)
    }

    /// Points to credit on confirmation; zero for non-points payments.
    pub fn purchased_points(&self) -> u64 {
        self.metadata
            .get("points")
            .and_then(Value::as_u64)
            .unwrap_or_default()
    }
}

pub fn booking_reference(booking_id: Uuid) -> String {
    format!("BOOK-{booking_id}")
}

/// Reference for a replacement intent on an existing booking.
pub fn retry_reference(booking_id: Uuid, now: DateTime<Utc>) -> String {
    format!("BOOK-{booking_id}-{}", now.timestamp_millis())
}

pub fn points_reference(user_id: Uuid, now: DateTime<Utc>) -> String {
    format!("POINTS-{user_id}-{}", now.timestamp_millis())
}

/// Shallow-merges `patch` into `target`; non-object targets are replaced.
pub fn merge_metadata(target: &mut Value, patch: Value) {
    match patch {
        Value::Object(extra) => match target.as_object_mut() {
            Some(existing) => existing.extend(extra),
            None => *target = Value::Object(extra),
        },
        Value::Null => {}
        other => *target = other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_references_embed_ids() {
        let id = Uuid::new_v4();
        let now = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
        assert_eq!(booking_reference(id), format!("BOOK-{id}"));
        assert_eq!(
            retry_reference(id, now),
            format!("BOOK-{id}-{}", now.timestamp_millis())
        );
        assert!(points_reference(id, now).starts_with("POINTS-"));
    }

    #[test]
    fn test_merge_metadata_keeps_existing_keys() {
        let mut payment = Payment::pending(
            Uuid::new_v4(),
            None,
            dec!(500),
            "POINTS-1".to_string(),
            Provider::Mock,
            PaymentPurpose::Points,
            Utc::now(),
        );
        merge_metadata(
            &mut payment.metadata,
            json!({"authorizationUrl": "https://pay.example/abc", "points": 5}),
        );
        assert_eq!(payment.metadata["type"], "points");
        assert_eq!(payment.authorization_url(), Some("https://pay.example/abc"));
        assert_eq!(payment.purchased_points(), 5);
    }

    #[test]
    fn test_provider_round_trips_through_str() {
        for provider in [
            Provider::Flutterwave,
            Provider::Paystack,
            Provider::Remita,
            Provider::Mock,
        ] {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
        assert!(matches!(
            "stripe".parse::<Provider>(),
            Err(BookingError::UnknownProvider(_))
        ));
    }
}
