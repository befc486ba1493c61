use super::Context;
use super::transitions;
use crate::domain::money::{Amount, points_for_purchase};
use crate::domain::notification::Notification;
use crate::domain::payment::{Payment, PaymentPurpose, merge_metadata, points_reference};
use crate::domain::ports::LockScope;
use crate::domain::transaction::{Mutation, Transaction};
use crate::error::{BookingError, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsPurchase {
    pub reference: String,
    pub amount: Decimal,
    pub points: u64,
    pub authorization_url: Option<String>,
}

/// Loyalty points bought through the payment gateway. Crediting happens in
/// reconciliation once the payment is confirmed.
#[derive(Clone)]
pub struct PointsService {
    ctx: Context,
}

impl PointsService {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self))]
    pub async fn initialize_points_purchase(
        &self,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<PointsPurchase> {
        let amount = Amount::new(amount)?;
        let points = points_for_purchase(amount)?;
        let user = self
            .ctx
            .store
            .user(user_id)
            .await?
            .ok_or(BookingError::UserNotFound(user_id))?;

        let now = self.ctx.clock.now();
        let mut tx = Transaction::begin(&self.ctx.store, LockScope::User(user_id)).await?;
        let reference = points_reference(user_id, now);
        let mut payment = Payment::pending(
            user_id,
            None,
            amount.value(),
            reference.clone(),
            self.ctx.gateways.default_provider(),
            PaymentPurpose::Points,
            now,
        );
        merge_metadata(&mut payment.metadata, json!({ "points": points }));
        let payment = transitions::open_payment_intent(
            &self.ctx,
            &user,
            payment,
            json!({ "userId": user_id, "type": "points", "points": points }),
        )
        .await?;
        let authorization_url = payment.authorization_url().map(str::to_string);

        tx.stage(Mutation::InsertPayment(payment));
        tx.commit().await?;

        tracing::info!(%user_id, %reference, points, "Points purchase initialized");
        Ok(PointsPurchase {
            reference,
            amount: amount.value(),
            points,
            authorization_url,
        })
    }

    /// Administrative credit outside the payment flow. Returns the new
    /// balance.
    #[instrument(skip(self))]
    pub async fn add_points(
        &self,
        user_id: Uuid,
        points: u64,
        reason: Option<String>,
    ) -> Result<u64> {
        if points == 0 {
            return Err(BookingError::InvalidAmount(
                "points must be greater than zero".to_string(),
            ));
        }

        let mut tx = Transaction::begin(&self.ctx.store, LockScope::User(user_id)).await?;
        if tx.user(user_id).await?.is_none() {
            return Err(BookingError::UserNotFound(user_id));
        }
        tx.stage(Mutation::CreditPoints { user_id, points });
        tx.commit().await?;

        tracing::info!(
            %user_id,
            points,
            reason = reason.as_deref().unwrap_or("-"),
            "Points credited manually"
        );
        self.ctx
            .dispatch(vec![Notification::PointsCredited { user_id, points }])
            .await;
        self.user_points(user_id).await
    }

    pub async fn user_points(&self, user_id: Uuid) -> Result<u64> {
        self.ctx
            .store
            .user(user_id)
            .await?
            .map(|u| u.points)
            .ok_or(BookingError::UserNotFound(user_id))
    }
}
