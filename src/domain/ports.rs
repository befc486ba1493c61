use super::availability::AvailabilityWindow;
use super::booking::{ApartmentHold, Booking, ScheduledExpiry};
use super::gateway::{PaymentIntent, TransactionRequest, TransferReceipt, TransferRequest};
use super::listing::Listing;
use super::notification::Notification;
use super::payment::{Payment, Provider};
use super::payout::Payout;
use super::transaction::Mutation;
use super::user::User;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

/// Unit of mutual exclusion for check-then-act sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockScope {
    Listing(Uuid),
    User(Uuid),
}

/// Held for the lifetime of a transaction; dropping it releases the scope.
pub type ScopeGuard = OwnedMutexGuard<()>;

/// Relational persistence for the booking domain.
///
/// Reads observe committed state only. Writes go through [`Store::apply`],
/// which validates every conditional mutation in the batch and then applies
/// all of them or none.
#[async_trait]
pub trait Store: Send + Sync {
    async fn lock(&self, scope: LockScope) -> Result<ScopeGuard>;
    async fn apply(&self, mutations: Vec<Mutation>) -> Result<()>;

    async fn user(&self, id: Uuid) -> Result<Option<User>>;
    async fn listing(&self, id: Uuid) -> Result<Option<Listing>>;
    async fn windows(&self, listing_id: Uuid) -> Result<Vec<AvailabilityWindow>>;
    async fn holds(&self, listing_id: Uuid) -> Result<Vec<ApartmentHold>>;
    async fn booking(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn bookings_for_listing(&self, listing_id: Uuid) -> Result<Vec<Booking>>;
    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>>;
    async fn payment(&self, reference: &str) -> Result<Option<Payment>>;
    async fn payments_for_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>>;
    async fn payout(&self, reference: &str) -> Result<Option<Payout>>;
    async fn due_expiries(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledExpiry>>;

    /// Records `(provider, event_id)`; returns `false` if it was already claimed.
    async fn claim_webhook_event(&self, provider: Provider, event_id: &str) -> Result<bool>;
    async fn release_webhook_event(&self, provider: Provider, event_id: &str) -> Result<()>;
}

pub type StoreRef = Arc<dyn Store>;

/// Uniform contract over card/bank payment processors.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn provider(&self) -> Provider;

    /// HTTP header carrying the webhook signature.
    fn signature_header(&self) -> &'static str;

    async fn initialize_transaction(&self, request: TransactionRequest) -> Result<PaymentIntent>;
    async fn verify_payment_status(&self, reference: &str) -> Result<bool>;
    fn verify_webhook_signature(&self, signature: &str, raw_body: &[u8]) -> bool;
    async fn initiate_transfer(&self, request: TransferRequest) -> Result<TransferReceipt>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
