//! Deterministic in-process gateway for development and tests.

use super::signature;
use crate::domain::gateway::{PaymentIntent, TransactionRequest, TransferReceipt, TransferRequest};
use crate::domain::payment::Provider;
use crate::domain::ports::PaymentGateway;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MOCK_WEBHOOK_SECRET: &str = "mock-webhook-secret";

/// Succeeds by default. Failure switches can be flipped at any time through
/// a shared handle, so tests can break the gateway mid-scenario.
#[derive(Debug)]
pub struct MockGateway {
    secret: String,
    fail_initialize: AtomicBool,
    fail_transfer: AtomicBool,
    payments_succeed: AtomicBool,
    initialized: AtomicUsize,
    verified: AtomicUsize,
    last_redirect: Mutex<Option<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::with_secret(MOCK_WEBHOOK_SECRET)
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            fail_initialize: AtomicBool::new(false),
            fail_transfer: AtomicBool::new(false),
            payments_succeed: AtomicBool::new(true),
            initialized: AtomicUsize::new(0),
            verified: AtomicUsize::new(0),
            last_redirect: Mutex::new(None),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn fail_initialize(&self, fail: bool) {
        self.fail_initialize.store(fail, Ordering::SeqCst);
    }

    pub fn fail_transfer(&self, fail: bool) {
        self.fail_transfer.store(fail, Ordering::SeqCst);
    }

    /// What `verify_payment_status` reports.
    pub fn set_payments_succeed(&self, succeed: bool) {
        self.payments_succeed.store(succeed, Ordering::SeqCst);
    }

    pub fn initialized_count(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn verified_count(&self) -> usize {
        self.verified.load(Ordering::SeqCst)
    }

    /// Redirect URL of the most recent intent.
    pub fn last_redirect_url(&self) -> Option<String> {
        self.last_redirect
            .lock()
            .map(|url| url.clone())
            .unwrap_or_default()
    }

    /// Signature a real provider would send for `body`.
    pub fn sign(&self, body: &[u8]) -> String {
        signature::sign_sha256(&self.secret, body)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn provider(&self) -> Provider {
        Provider::Mock
    }

    fn signature_header(&self) -> &'static str {
        "x-mock-signature"
    }

    async fn initialize_transaction(&self, request: TransactionRequest) -> Result<PaymentIntent> {
        if self.fail_initialize.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                provider: Provider::Mock.to_string(),
                message: "simulated outage".to_string(),
            }
            .into());
        }
        self.initialized.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_redirect.lock() {
            *last = Some(request.redirect_url.clone());
        }
        let provider_ref = format!("mock_txn_{}", uuid::Uuid::new_v4());
        tracing::info!(
            reference = %request.reference,
            amount = %request.amount,
            provider_ref = %provider_ref,
            "Mock payment intent created"
        );
        Ok(PaymentIntent {
            authorization_url: format!("https://checkout.mock.local/pay/{}", request.reference),
            provider_ref: Some(provider_ref),
        })
    }

    async fn verify_payment_status(&self, reference: &str) -> Result<bool> {
        self.verified.fetch_add(1, Ordering::SeqCst);
        let paid = self.payments_succeed.load(Ordering::SeqCst);
        tracing::info!(reference = %reference, paid, "Mock payment verified");
        Ok(paid)
    }

    fn verify_webhook_signature(&self, signature: &str, raw_body: &[u8]) -> bool {
        signature::verify_sha256(&self.secret, signature, raw_body)
    }

    async fn initiate_transfer(&self, request: TransferRequest) -> Result<TransferReceipt> {
        if self.fail_transfer.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                provider: Provider::Mock.to_string(),
                message: "transfer declined".to_string(),
            }
            .into());
        }
        let transfer_id = format!("mock_transfer_{}", uuid::Uuid::new_v4());
        tracing::info!(
            reference = %request.reference,
            amount = %request.amount,
            transfer_id = %transfer_id,
            "Mock transfer queued"
        );
        Ok(TransferReceipt {
            status: "pending".to_string(),
            provider_transfer_id: Some(transfer_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request() -> TransactionRequest {
        TransactionRequest {
            email: "guest@example.com".to_string(),
            name: "Ada Obi".to_string(),
            amount: dec!(320),
            currency: "NGN".to_string(),
            reference: "BOOK-1".to_string(),
            redirect_url: "http://localhost:3000/booking/verify".to_string(),
            metadata: json!({"type": "booking"}),
        }
    }

    #[tokio::test]
    async fn test_mock_intent_success() {
        let gateway = MockGateway::new();
        let intent = gateway.initialize_transaction(request()).await.unwrap();
        assert!(intent.authorization_url.ends_with("/BOOK-1"));
        assert!(intent.provider_ref.unwrap().starts_with("mock_txn_"));
        assert_eq!(gateway.initialized_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_failure_switches() {
        let gateway = MockGateway::new();
        gateway.fail_initialize(true);
        gateway.set_payments_succeed(false);
        assert!(gateway.initialize_transaction(request()).await.is_err());
        assert!(!gateway.verify_payment_status("BOOK-1").await.unwrap());
        assert_eq!(gateway.initialized_count(), 0);
    }

    #[test]
    fn test_mock_signs_like_a_provider() {
        let gateway = MockGateway::new();
        let body = br#"{"event":"charge.success"}"#;
        assert!(gateway.verify_webhook_signature(&gateway.sign(body), body));
        assert!(!gateway.verify_webhook_signature("deadbeef", body));
    }
}
