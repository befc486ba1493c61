use super::Context;
use super::transitions::{self, Release};
use crate::domain::booking::BookingStatus;
use crate::domain::notification::{CancelReason, Notification};
use crate::domain::payment::{Payment, PaymentPurpose, PaymentStatus, Provider};
use crate::domain::payout::PayoutStatus;
use crate::domain::ports::LockScope;
use crate::domain::transaction::{Mutation, PaymentTransition, PayoutTransition, Transaction};
use crate::domain::webhook::{WebhookEvent, WebhookPayload};
use crate::error::{BookingError, Result};
use serde::Serialize;
use serde_json::json;
use tracing::instrument;

/// Result of applying an external completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconciled {
    Applied,
    /// The payment was recorded but its booking had already been released.
    LatePayment,
    /// Nothing was pending under this reference; nothing changed.
    AlreadyProcessed,
}

/// What the webhook endpoint acknowledges back to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "outcome", rename_all = "snake_case")]
pub enum WebhookAck {
    Processed(Reconciled),
    Duplicate,
    Ignored,
}

/// Converges payment, booking, points and payout state from the three
/// unordered completion paths. Every entry point is idempotent: the
/// PENDING precondition is re-checked under the scope lock and again by
/// the store at commit.
#[derive(Clone)]
pub struct ReconciliationHandler {
    ctx: Context,
}

impl ReconciliationHandler {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    async fn scope_for(&self, payment: &Payment) -> Result<LockScope> {
        if payment.purpose == PaymentPurpose::Booking
            && let Some(booking_id) = payment.booking_id
            && let Some(booking) = self.ctx.store.booking(booking_id).await?
        {
            return Ok(LockScope::Listing(booking.listing_id));
        }
        Ok(LockScope::User(payment.user_id))
    }

    /// Locks the payment's scope and re-reads it; `None` unless still PENDING.
    async fn begin_pending(&self, reference: &str) -> Result<Option<(Transaction, Payment)>> {
        let Some(payment) = self.ctx.store.payment(reference).await? else {
            tracing::warn!(%reference, "Completion for unknown payment reference");
            return Ok(None);
        };
        if payment.status != PaymentStatus::Pending {
            return Ok(None);
        }
        let scope = self.scope_for(&payment).await?;
        let tx = Transaction::begin(&self.ctx.store, scope).await?;
        match tx.payment(reference).await? {
            Some(payment) if payment.status == PaymentStatus::Pending => Ok(Some((tx, payment))),
            _ => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn confirm_payment(
        &self,
        reference: &str,
        provider_tx_id: Option<String>,
    ) -> Result<Reconciled> {
        let Some((mut tx, payment)) = self.begin_pending(reference).await? else {
            tracing::info!(%reference, "Payment already processed");
            return Ok(Reconciled::AlreadyProcessed);
        };
        let now = self.ctx.clock.now();

        tx.stage(Mutation::TransitionPayment(PaymentTransition {
            reference: payment.reference.clone(),
            expected: PaymentStatus::Pending,
            status: PaymentStatus::Confirmed,
            metadata: json!({ "providerTxId": provider_tx_id, "verifiedAt": now }),
        }));

        let mut notifications = Vec::new();
        let mut outcome = Reconciled::Applied;
        match payment.purpose {
            PaymentPurpose::Booking => {
                let booking = match payment.booking_id {
                    Some(id) => tx.booking(id).await?,
                    None => None,
                };
                match booking {
                    Some(booking)
                        if booking.status == BookingStatus::Pending && !booking.is_deleted() =>
                    {
                        notifications.push(
                            transitions::stage_confirmation(&mut tx, &booking, reference).await?,
                        );
                    }
                    other => {
                        outcome = Reconciled::LatePayment;
                        let booking_id = other.as_ref().map(|b| b.id).or(payment.booking_id);
                        tracing::warn!(
                            %reference,
                            booking_id = ?booking_id,
                            status = ?other.as_ref().map(|b| b.status),
                            amount = %payment.amount,
                            "Payment confirmed for a booking that is no longer pending; manual refund required"
                        );
                        if let Some(booking_id) = booking_id {
                            notifications.push(Notification::LatePayment {
                                booking_id,
                                reference: reference.to_string(),
                                amount: payment.amount,
                            });
                        }
                    }
                }
            }
            PaymentPurpose::Points => {
                let points = payment.purchased_points();
                tx.stage(Mutation::CreditPoints {
                    user_id: payment.user_id,
                    points,
                });
                notifications.push(Notification::PointsCredited {
                    user_id: payment.user_id,
                    points,
                });
            }
        }

        tx.commit().await?;
        tracing::info!(%reference, purpose = payment.purpose.as_str(), ?outcome, "Payment confirmed");
        self.ctx.dispatch(notifications).await;
        Ok(outcome)
    }

    #[instrument(skip(self))]
    pub async fn fail_payment(&self, reference: &str) -> Result<Reconciled> {
        let Some((mut tx, payment)) = self.begin_pending(reference).await? else {
            tracing::info!(%reference, "Payment already processed");
            return Ok(Reconciled::AlreadyProcessed);
        };
        let now = self.ctx.clock.now();

        tx.stage(Mutation::TransitionPayment(PaymentTransition {
            reference: payment.reference.clone(),
            expected: PaymentStatus::Pending,
            status: PaymentStatus::Failed,
            metadata: json!({ "failedAt": now }),
        }));
        let mut notifications = vec![Notification::PaymentFailed {
            reference: reference.to_string(),
            user_id: payment.user_id,
        }];

        let booking = match (payment.purpose, payment.booking_id) {
            (PaymentPurpose::Booking, Some(booking_id)) => tx.booking(booking_id).await?,
            _ => None,
        };
        if let Some(booking) = booking
            && booking.status == BookingStatus::Pending
            && !booking.is_deleted()
        {
            let release = Release {
                reason: CancelReason::PaymentFailed,
                deleted_at: None,
                fail_pending_payments: false,
            };
            notifications.extend(
                transitions::stage_release(&mut tx, &booking, release, self.ctx.policy.boundary, now)
                    .await?,
            );
        }

        tx.commit().await?;
        tracing::info!(%reference, "Payment failed");
        self.ctx.dispatch(notifications).await;
        Ok(Reconciled::Applied)
    }

    #[instrument(skip(self))]
    pub async fn complete_payout(
        &self,
        reference: &str,
        transfer_id: Option<String>,
    ) -> Result<Reconciled> {
        self.settle_payout(reference, PayoutStatus::Completed, transfer_id)
            .await
    }

    #[instrument(skip(self))]
    pub async fn fail_payout(&self, reference: &str) -> Result<Reconciled> {
        self.settle_payout(reference, PayoutStatus::Failed, None).await
    }

    async fn settle_payout(
        &self,
        reference: &str,
        status: PayoutStatus,
        transfer_id: Option<String>,
    ) -> Result<Reconciled> {
        let Some(payout) = self.ctx.store.payout(reference).await? else {
            tracing::warn!(%reference, "Transfer event for unknown payout");
            return Ok(Reconciled::AlreadyProcessed);
        };
        let mut tx = Transaction::begin(&self.ctx.store, LockScope::User(payout.vendor_id)).await?;
        match tx.payout(reference).await? {
            Some(current) if current.status == PayoutStatus::Pending => {}
            _ => return Ok(Reconciled::AlreadyProcessed),
        }

        tx.stage(Mutation::TransitionPayout(PayoutTransition {
            reference: reference.to_string(),
            expected: PayoutStatus::Pending,
            status,
            provider_transfer_id: transfer_id,
        }));
        tx.commit().await?;

        let succeeded = status == PayoutStatus::Completed;
        tracing::info!(%reference, vendor_id = %payout.vendor_id, succeeded, "Payout settled");
        self.ctx
            .dispatch(vec![Notification::PayoutSettled {
                vendor_id: payout.vendor_id,
                reference: reference.to_string(),
                succeeded,
            }])
            .await;
        Ok(Reconciled::Applied)
    }

    /// Header the named provider signs its callbacks with.
    pub fn signature_header(&self, provider: &str) -> Result<&'static str> {
        let provider: Provider = provider.parse()?;
        Ok(self.ctx.gateways.get(provider)?.signature_header())
    }

    /// Provider callback entry point. The signature is checked over the raw
    /// bytes before anything is parsed; each provider event id is processed
    /// at most once, and a failed attempt frees it for redelivery.
    #[instrument(skip(self, signature, raw_body))]
    pub async fn handle_webhook(
        &self,
        provider: &str,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<WebhookAck> {
        let provider: Provider = provider.parse()?;
        let gateway = self.ctx.gateways.get(provider)?;

        let verified = signature
            .map(|sig| gateway.verify_webhook_signature(sig, raw_body))
            .unwrap_or(false);
        if !verified {
            tracing::warn!(%provider, "Webhook signature mismatch");
            return Err(BookingError::InvalidSignature);
        }

        let payload = WebhookPayload::parse(raw_body)?;
        let event = payload.classify()?;
        let event_id = match payload.event_id() {
            Some(id) => id,
            None => match &event {
                WebhookEvent::ChargeSucceeded { reference, .. }
                | WebhookEvent::ChargeFailed { reference }
                | WebhookEvent::TransferSucceeded { reference, .. }
                | WebhookEvent::TransferFailed { reference } => {
                    format!("{}:{reference}", payload.event)
                }
                WebhookEvent::Ignored { .. } => String::new(),
            },
        };

        if let WebhookEvent::Ignored { event } = &event {
            tracing::info!(%provider, %event, "Webhook event ignored");
            return Ok(WebhookAck::Ignored);
        }

        if !self
            .ctx
            .store
            .claim_webhook_event(provider, &event_id)
            .await?
        {
            tracing::info!(%provider, %event_id, "Duplicate webhook delivery");
            return Ok(WebhookAck::Duplicate);
        }

        match self.dispatch_event(event).await {
            Ok(outcome) => Ok(WebhookAck::Processed(outcome)),
            Err(e) => {
                tracing::error!(%provider, %event_id, error = %e, "Webhook processing failed");
                if let Err(release_err) = self
                    .ctx
                    .store
                    .release_webhook_event(provider, &event_id)
                    .await
                {
                    tracing::warn!(error = %release_err, "Could not release webhook claim");
                }
                Err(e)
            }
        }
    }

    async fn dispatch_event(&self, event: WebhookEvent) -> Result<Reconciled> {
        match event {
            WebhookEvent::ChargeSucceeded {
                reference,
                provider_tx_id,
            } => self.confirm_payment(&reference, provider_tx_id).await,
            WebhookEvent::ChargeFailed { reference } => self.fail_payment(&reference).await,
            WebhookEvent::TransferSucceeded {
                reference,
                transfer_id,
            } => self.complete_payout(&reference, transfer_id).await,
            WebhookEvent::TransferFailed { reference } => self.fail_payout(&reference).await,
            WebhookEvent::Ignored { .. } => Ok(Reconciled::AlreadyProcessed),
        }
    }
}
