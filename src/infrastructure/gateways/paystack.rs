use super::{minor_units, provider_json, signature, unexpected};
use crate::config::PaystackConfig;
use crate::domain::gateway::{PaymentIntent, TransactionRequest, TransferReceipt, TransferRequest};
use crate::domain::payment::Provider;
use crate::domain::ports::PaymentGateway;
use crate::error::{BookingError, GatewayError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

const BASE_URL: &str = "https://api.paystack.co";

/// Paystack works in kobo; amounts are converted on the way out.
pub struct PaystackGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl PaystackGateway {
    pub fn new(client: reqwest::Client, config: &PaystackConfig) -> Result<Self> {
        let secret_key = config
            .secret_key
            .clone()
            .ok_or_else(|| GatewayError::NotConfigured(Provider::Paystack.to_string()))?;
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            secret_key,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<Value> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(payload)
            .send()
            .await
            .map_err(GatewayError::from)?;
        provider_json(Provider::Paystack, response).await
    }

    async fn create_recipient(&self, request: &TransferRequest) -> Result<String> {
        let body = self
            .post(
                "/transferrecipient",
                &json!({
                    "type": "nuban",
                    "name": request.reference,
                    "account_number": request.destination.account_number,
                    "bank_code": request.destination.bank_code,
                    "currency": request.currency,
                }),
            )
            .await?;
        body.pointer("/data/recipient_code")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| unexpected(Provider::Paystack, "missing data.recipient_code").into())
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn provider(&self) -> Provider {
        Provider::Paystack
    }

    fn signature_header(&self) -> &'static str {
        "x-paystack-signature"
    }

    async fn initialize_transaction(&self, request: TransactionRequest) -> Result<PaymentIntent> {
        let amount = minor_units(request.amount)
            .ok_or_else(|| BookingError::InvalidAmount(request.amount.to_string()))?;
        let mut metadata = request.metadata.clone();
        if let Some(map) = metadata.as_object_mut() {
            map.insert("platform".to_string(), Value::from("mobile"));
        }
        let body = self
            .post(
                "/transaction/initialize",
                &json!({
                    "email": request.email,
                    "amount": amount,
                    "currency": request.currency,
                    "reference": request.reference,
                    "callback_url": request.redirect_url,
                    "channels": ["card", "bank", "ussd", "qr", "mobile_money"],
                    "metadata": metadata,
                }),
            )
            .await?;

        let authorization_url = body
            .pointer("/data/authorization_url")
            .and_then(Value::as_str)
            .ok_or_else(|| unexpected(Provider::Paystack, "missing data.authorization_url"))?;
        let provider_ref = body
            .pointer("/data/access_code")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(PaymentIntent {
            authorization_url: authorization_url.to_string(),
            provider_ref,
        })
    }

    async fn verify_payment_status(&self, reference: &str) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/transaction/verify/{reference}", self.base_url))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(GatewayError::from)?;
        let body = provider_json(Provider::Paystack, response).await?;
        let status = body.pointer("/data/status").and_then(Value::as_str);
        let gateway_response = body.pointer("/data/gateway_response").and_then(Value::as_str);
        Ok(status == Some("success") || gateway_response == Some("Successful"))
    }

    fn verify_webhook_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        signature::verify_sha512(&self.secret_key, signature, raw_body)
    }

    async fn initiate_transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        let amount = minor_units(request.amount)
            .ok_or_else(|| BookingError::InvalidAmount(request.amount.to_string()))?;
        let recipient = self.create_recipient(&request).await?;
        let body = self
            .post(
                "/transfer",
                &json!({
                    "source": "balance",
                    "amount": amount,
                    "recipient": recipient,
                    "reference": request.reference,
                    "reason": format!("Payout {}", request.reference),
                }),
            )
            .await?;

        Ok(TransferReceipt {
            status: body
                .pointer("/data/status")
                .and_then(Value::as_str)
                .unwrap_or("pending")
                .to_string(),
            provider_transfer_id: body
                .pointer("/data/transfer_code")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }
}
