use crate::domain::payment::Provider;
use crate::domain::payout::BankAccount;
use crate::domain::ports::PaymentGateway;
use crate::error::{BookingError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionRequest {
    pub email: String,
    pub name: String,
    pub amount: Decimal,
    pub currency: String,
    pub reference: String,
    pub redirect_url: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub authorization_url: String,
    pub provider_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferRequest {
    pub destination: BankAccount,
    pub amount: Decimal,
    pub currency: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub status: String,
    pub provider_transfer_id: Option<String>,
}

/// Provider adapters keyed by provider, plus the one new intents go to.
#[derive(Clone)]
pub struct GatewayRegistry {
    default: Provider,
    gateways: BTreeMap<Provider, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistry {
    pub fn new(default_gateway: Arc<dyn PaymentGateway>) -> Self {
        let default = default_gateway.provider();
        let mut gateways = BTreeMap::new();
        gateways.insert(default, default_gateway);
        Self { default, gateways }
    }

    /// Registers an adapter that still receives webhooks and verifications
    /// for payments it opened, without becoming the default.
    pub fn with(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.provider(), gateway);
        self
    }

    pub fn default_provider(&self) -> Provider {
        self.default
    }

    pub fn default_gateway(&self) -> Result<Arc<dyn PaymentGateway>> {
        self.get(self.default)
    }

    pub fn get(&self, provider: Provider) -> Result<Arc<dyn PaymentGateway>> {
        self.gateways
            .get(&provider)
            .cloned()
            .ok_or_else(|| BookingError::UnknownProvider(provider.to_string()))
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.gateways.keys().copied()
    }
}
