use super::Context;
use crate::domain::gateway::TransferRequest;
use crate::domain::money::Amount;
use crate::domain::payout::{BankAccount, Payout, PayoutStatus, payout_reference};
use crate::domain::ports::LockScope;
use crate::domain::transaction::{Mutation, Transaction};
use crate::error::{BookingError, Result};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

/// Vendor payouts. The transfer is requested from the default provider; its
/// outcome arrives later as a `transfer.*` webhook.
#[derive(Clone)]
pub struct PayoutService {
    ctx: Context,
}

impl PayoutService {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, destination))]
    pub async fn initiate_payout(
        &self,
        vendor_id: Uuid,
        amount: Decimal,
        destination: BankAccount,
    ) -> Result<Payout> {
        let amount = Amount::new(amount)?;
        if destination.account_number.trim().is_empty() || destination.bank_code.trim().is_empty() {
            return Err(BookingError::MalformedPayload(
                "destination account number and bank code are required".to_string(),
            ));
        }
        if self.ctx.store.user(vendor_id).await?.is_none() {
            return Err(BookingError::UserNotFound(vendor_id));
        }

        let now = self.ctx.clock.now();
        let mut tx = Transaction::begin(&self.ctx.store, LockScope::User(vendor_id)).await?;
        let id = Uuid::new_v4();
        let reference = payout_reference(id);
        let gateway = self.ctx.gateways.default_gateway()?;
        let receipt = gateway
            .initiate_transfer(TransferRequest {
                destination: destination.clone(),
                amount: amount.value(),
                currency: self.ctx.policy.currency.clone(),
                reference: reference.clone(),
            })
            .await?;

        let payout = Payout {
            id,
            vendor_id,
            amount: amount.value(),
            currency: self.ctx.policy.currency.clone(),
            destination,
            reference: reference.clone(),
            status: PayoutStatus::Pending,
            provider: gateway.provider(),
            provider_transfer_id: receipt.provider_transfer_id,
            created_at: now,
        };
        tx.stage(Mutation::InsertPayout(payout.clone()));
        tx.commit().await?;

        tracing::info!(%vendor_id, %reference, provider_status = %receipt.status, "Payout initiated");
        Ok(payout)
    }
}
