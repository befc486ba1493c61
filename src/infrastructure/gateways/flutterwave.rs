use super::{provider_json, signature, unexpected};
use crate::config::FlutterwaveConfig;
use crate::domain::gateway::{PaymentIntent, TransactionRequest, TransferReceipt, TransferRequest};
use crate::domain::payment::Provider;
use crate::domain::ports::PaymentGateway;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};

const BASE_URL: &str = "https://api.flutterwave.com/v3";

pub struct FlutterwaveGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
    webhook_secret: String,
}

impl FlutterwaveGateway {
    pub fn new(client: reqwest::Client, config: &FlutterwaveConfig) -> Result<Self> {
        let secret_key = config
            .secret_key
            .clone()
            .ok_or_else(|| GatewayError::NotConfigured(Provider::Flutterwave.to_string()))?;
        let webhook_secret = config
            .secret_hash
            .clone()
            .unwrap_or_else(|| secret_key.clone());
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            secret_key,
            webhook_secret,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PaymentGateway for FlutterwaveGateway {
    fn provider(&self) -> Provider {
        Provider::Flutterwave
    }

    fn signature_header(&self) -> &'static str {
        "verif-hash"
    }

    async fn initialize_transaction(&self, request: TransactionRequest) -> Result<PaymentIntent> {
        let mut meta = request.metadata.clone();
        if let Some(map) = meta.as_object_mut() {
            map.insert("platform".to_string(), Value::from("mobile"));
        }
        let payload = json!({
            "tx_ref": request.reference,
            "amount": request.amount.to_f64(),
            "currency": request.currency,
            "redirect_url": request.redirect_url,
            "customer": { "email": request.email, "name": request.name },
            "meta": meta,
        });

        let response = self
            .client
            .post(format!("{}/payments", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(GatewayError::from)?;
        let body = provider_json(Provider::Flutterwave, response).await?;

        let link = body
            .pointer("/data/link")
            .and_then(Value::as_str)
            .ok_or_else(|| unexpected(Provider::Flutterwave, "missing data.link"))?;
        tracing::debug!(reference = %request.reference, "Flutterwave payment link created");
        Ok(PaymentIntent {
            authorization_url: link.to_string(),
            provider_ref: Some(request.reference),
        })
    }

    async fn verify_payment_status(&self, reference: &str) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/transactions/verify_by_reference", self.base_url))
            .query(&[("tx_ref", reference)])
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(GatewayError::from)?;
        let body = provider_json(Provider::Flutterwave, response).await?;

        let envelope_ok = body.get("status").and_then(Value::as_str) == Some("success");
        let charge_ok = body
            .pointer("/data/status")
            .and_then(Value::as_str)
            .map(|s| s.eq_ignore_ascii_case("successful"))
            .unwrap_or(true);
        Ok(envelope_ok && charge_ok)
    }

    fn verify_webhook_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        signature::verify_sha256(&self.webhook_secret, signature, raw_body)
    }

    async fn initiate_transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        let payload = json!({
            "account_bank": request.destination.bank_code,
            "account_number": request.destination.account_number,
            "amount": request.amount.to_f64(),
            "currency": request.currency,
            "reference": request.reference,
            "narration": format!("Payout {}", request.reference),
        });
        let response = self
            .client
            .post(format!("{}/transfers", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(GatewayError::from)?;
        let body = provider_json(Provider::Flutterwave, response).await?;

        let status = body
            .pointer("/data/status")
            .and_then(Value::as_str)
            .unwrap_or("NEW")
            .to_string();
        let provider_transfer_id = body.pointer("/data/id").map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        Ok(TransferReceipt {
            status,
            provider_transfer_id,
        })
    }
}
