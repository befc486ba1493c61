use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::payment::Provider;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankAccount {
    pub account_number: String,
    pub bank_code: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum PayoutStatus {
    Pending,
    Completed,
    Failed,
}

/// Money leaving the platform towards a vendor's bank account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub destination: BankAccount,
    pub reference: String,
    pub status: PayoutStatus,
    pub provider: Provider,
    pub provider_transfer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn payout_reference(payout_id: Uuid) -> String {
    format!("PAYOUT-{payout_id}")
}
