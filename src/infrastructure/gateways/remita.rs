use super::{provider_json, signature, unexpected, whole_units};
use crate::config::RemitaConfig;
use crate::domain::gateway::{PaymentIntent, TransactionRequest, TransferReceipt, TransferRequest};
use crate::domain::payment::Provider;
use crate::domain::ports::PaymentGateway;
use crate::error::{BookingError, GatewayError, Result};
use async_trait::async_trait;
use serde_json::{Value, json};

const BASE_URL: &str = "https://api.remita.net/api/v1";

pub struct RemitaGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    merchant_id: String,
    service_type_id: String,
}

impl RemitaGateway {
    pub fn new(client: reqwest::Client, config: &RemitaConfig) -> Result<Self> {
        let not_configured = || GatewayError::NotConfigured(Provider::Remita.to_string());
        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key: config.api_key.clone().ok_or_else(not_configured)?,
            merchant_id: config.merchant_id.clone().ok_or_else(not_configured)?,
            service_type_id: config.service_type_id.clone().ok_or_else(not_configured)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PaymentGateway for RemitaGateway {
    fn provider(&self) -> Provider {
        Provider::Remita
    }

    fn signature_header(&self) -> &'static str {
        "x-remita-signature"
    }

    async fn initialize_transaction(&self, request: TransactionRequest) -> Result<PaymentIntent> {
        let amount = whole_units(request.amount)
            .ok_or_else(|| BookingError::InvalidAmount(request.amount.to_string()))?;
        let payload = json!({
            "serviceTypeId": self.service_type_id,
            "amount": amount,
            "orderId": request.reference,
            "payerName": request.name,
            "payerEmail": request.email,
            "description": format!("Payment {}", request.reference),
            "customFields": [
                { "name": "metadata", "value": request.metadata.to_string() }
            ],
        });
        let response = self
            .client
            .post(format!("{}/merchant/init", self.base_url))
            .bearer_auth(&self.api_key)
            .header("MerchantId", &self.merchant_id)
            .json(&payload)
            .send()
            .await
            .map_err(GatewayError::from)?;
        let body = provider_json(Provider::Remita, response).await?;

        let authorization_url = body
            .get("authorizationUrl")
            .or_else(|| body.pointer("/data/authorizationUrl"))
            .and_then(Value::as_str)
            .ok_or_else(|| unexpected(Provider::Remita, "missing authorizationUrl"))?;
        let provider_ref = body
            .get("RRR")
            .or_else(|| body.pointer("/data/RRR"))
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
            .get(format!(
                "{}/merchant/{}/order/{reference}/status",
                self.base_url, self.merchant_id
            ))
            .bearer_auth(&self.api_key)
            .header("MerchantId", &self.merchant_id)
            .send()
            .await
            .map_err(GatewayError::from)?;
        let body = provider_json(Provider::Remita, response).await?;
        let status = body.get("status").and_then(Value::as_str);
        Ok(matches!(status, Some("00") | Some("SUCCESS")))
    }

    fn verify_webhook_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        signature::verify_sha512(&self.api_key, signature, raw_body)
    }

    async fn initiate_transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        tracing::warn!(reference = %request.reference, "Remita payouts are not supported");
        Err(GatewayError::Rejected {
            provider: Provider::Remita.to_string(),
            message: "payouts are not supported".to_string(),
        }
        .into())
    }
}
