use super::availability::AvailabilityWindow;
use super::booking::{ApartmentHold, Booking, BookingStatus, ScheduledExpiry};
use super::listing::Listing;
use super::payment::{Payment, PaymentStatus, merge_metadata};
use super::payout::{Payout, PayoutStatus};
use super::ports::{LockScope, ScopeGuard, Store, StoreRef};
use super::user::User;
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::ops::Deref;
use uuid::Uuid;

/// A single write staged inside a [`Transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    PutUser(User),
    PutListing(Listing),
    PutWindow(AvailabilityWindow),
    InsertHold(ApartmentHold),
    DeleteHold { listing_id: Uuid, hold_id: Uuid },
    InsertBooking(Booking),
    TransitionBooking(BookingTransition),
    InsertPayment(Payment),
    TransitionPayment(PaymentTransition),
    SetWindowBlocked {
        listing_id: Uuid,
        window_id: Uuid,
        blocked: bool,
    },
    CreditPoints { user_id: Uuid, points: u64 },
    InsertPayout(Payout),
    TransitionPayout(PayoutTransition),
    ScheduleExpiry(ScheduledExpiry),
    ClearExpiry { booking_id: Uuid },
}

/// Conditional booking update: only applies while the row is `expected`.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingTransition {
    pub booking_id: Uuid,
    pub expected: BookingStatus,
    pub status: BookingStatus,
    pub payment_ref: Option<String>,
    pub clear_hold: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl BookingTransition {
    pub fn new(booking_id: Uuid, expected: BookingStatus, status: BookingStatus) -> Self {
        Self {
            booking_id,
            expected,
            status,
            payment_ref: None,
            clear_hold: false,
            deleted_at: None,
        }
    }

    pub fn apply_to(&self, booking: &mut Booking) -> Result<()> {
        if booking.status != self.expected {
            return Err(BookingError::WriteConflict(format!(
                "booking {} is {}, expected {}",
                booking.id, booking.status, self.expected
            )));
        }
        booking.status = self.status;
        if let Some(reference) = &self.payment_ref {
            booking.payment_ref = Some(reference.clone());
        }
        if self.clear_hold {
            booking.hold_id = None;
        }
        if self.deleted_at.is_some() {
            booking.deleted_at = self.deleted_at;
        }
        Ok(())
    }
}

/// Conditional payment update with a metadata patch.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentTransition {
    pub reference: String,
    pub expected: PaymentStatus,
    pub status: PaymentStatus,
    pub metadata: Value,
}

impl PaymentTransition {
    pub fn apply_to(&self, payment: &mut Payment) -> Result<()> {
        if payment.status != self.expected {
            return Err(BookingError::WriteConflict(format!(
                "payment {} is {:?}, expected {:?}",
                payment.reference, payment.status, self.expected
            )));
        }
        payment.status = self.status;
        merge_metadata(&mut payment.metadata, self.metadata.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PayoutTransition {
    pub reference: String,
    pub expected: PayoutStatus,
    pub status: PayoutStatus,
    pub provider_transfer_id: Option<String>,
}

impl PayoutTransition {
    pub fn apply_to(&self, payout: &mut Payout) -> Result<()> {
        if payout.status != self.expected {
            return Err(BookingError::WriteConflict(format!(
                "payout {} is {:?}, expected {:?}",
                payout.reference, payout.status, self.expected
            )));
        }
        payout.status = self.status;
        if self.provider_transfer_id.is_some() {
            payout.provider_transfer_id = self.provider_transfer_id.clone();
        }
        Ok(())
    }
}

/// Scope-locked unit of work.
///
/// Holds the [`LockScope`] from `begin` until `commit` or drop, reads through
/// to the store, and buffers writes so that nothing becomes visible unless
/// `commit` succeeds. Dropping without committing is a rollback.
pub struct Transaction {
    store: StoreRef,
    scope: LockScope,
    mutations: Vec<Mutation>,
    _guard: ScopeGuard,
}

impl Transaction {
    pub async fn begin(store: &StoreRef, scope: LockScope) -> Result<Self> {
        let guard = store.lock(scope).await?;
        Ok(Self {
            store: store.clone(),
            scope,
            mutations: Vec::new(),
            _guard: guard,
        })
    }

    pub fn scope(&self) -> LockScope {
        self.scope
    }

    pub fn stage(&mut self, mutation: Mutation) {
        self.mutations.push(mutation);
    }

    pub fn staged(&self) -> &[Mutation] {
        &self.mutations
    }

    pub async fn commit(mut self) -> Result<()> {
        let mutations = std::mem::take(&mut self.mutations);
        if mutations.is_empty() {
            return Ok(());
        }
        self.store.apply(mutations).await
    }
}

impl Deref for Transaction {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.mutations.is_empty() {
            tracing::debug!(
                scope = ?self.scope,
                discarded = self.mutations.len(),
                "Transaction rolled back"
            );
        }
    }
}
