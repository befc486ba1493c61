use crate::domain::availability::AvailabilityWindow;
use crate::domain::booking::{ApartmentHold, Booking, ScheduledExpiry};
use crate::domain::listing::Listing;
use crate::domain::payment::{Payment, Provider};
use crate::domain::payout::Payout;
use crate::domain::ports::{LockScope, ScopeGuard, Store};
use crate::domain::transaction::Mutation;
use crate::domain::user::User;
use crate::error::{BookingError, Result};
use crate::infrastructure::locks::ScopeLocks;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    listings: HashMap<Uuid, Listing>,
    windows: HashMap<Uuid, AvailabilityWindow>,
    holds: HashMap<Uuid, ApartmentHold>,
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<String, Payment>,
    payouts: HashMap<String, Payout>,
    expiries: HashMap<Uuid, ScheduledExpiry>,
    webhook_events: HashSet<(Provider, String)>,
}

impl Tables {
    /// Rejects a mutation whose precondition does not hold right now.
    fn check(&self, mutation: &Mutation) -> Result<()> {
        match mutation {
            Mutation::InsertBooking(booking) if self.bookings.contains_key(&booking.id) => Err(
                BookingError::WriteConflict(format!("booking {} already exists", booking.id)),
            ),
            Mutation::InsertPayment(payment) if self.payments.contains_key(&payment.reference) => {
                Err(BookingError::WriteConflict(format!(
                    "payment reference {} already exists",
                    payment.reference
                )))
            }
            Mutation::InsertPayout(payout) if self.payouts.contains_key(&payout.reference) => Err(
                BookingError::WriteConflict(format!("payout {} already exists", payout.reference)),
            ),
            Mutation::TransitionBooking(transition) => {
                let mut booking = self
                    .bookings
                    .get(&transition.booking_id)
                    .cloned()
                    .ok_or(BookingError::BookingNotFound(transition.booking_id))?;
                transition.apply_to(&mut booking)
            }
            Mutation::TransitionPayment(transition) => {
                let mut payment = self
                    .payments
                    .get(&transition.reference)
                    .cloned()
                    .ok_or_else(|| BookingError::PaymentNotFound(transition.reference.clone()))?;
                transition.apply_to(&mut payment)
            }
            Mutation::TransitionPayout(transition) => {
                let mut payout = self
                    .payouts
                    .get(&transition.reference)
                    .cloned()
                    .ok_or_else(|| BookingError::PaymentNotFound(transition.reference.clone()))?;
                transition.apply_to(&mut payout)
            }
            Mutation::CreditPoints { user_id, .. } if !self.users.contains_key(user_id) => {
                Err(BookingError::UserNotFound(*user_id))
            }
            Mutation::SetWindowBlocked { window_id, .. } if !self.windows.contains_key(window_id) => {
                Err(BookingError::Storage(format!(
                    "availability window {window_id} not found"
                )))
            }
            _ => Ok(()),
        }
    }

    fn write(&mut self, mutation: Mutation) -> Result<()> {
        match mutation {
            Mutation::PutUser(user) => {
                self.users.insert(user.id, user);
            }
            Mutation::PutListing(listing) => {
                self.listings.insert(listing.id, listing);
            }
            Mutation::PutWindow(window) => {
                self.windows.insert(window.id, window);
            }
            Mutation::InsertHold(hold) => {
                self.holds.insert(hold.id, hold);
            }
            Mutation::DeleteHold { hold_id, .. } => {
                self.holds.remove(&hold_id);
            }
            Mutation::InsertBooking(booking) => {
                self.bookings.insert(booking.id, booking);
            }
            Mutation::TransitionBooking(transition) => {
                if let Some(booking) = self.bookings.get_mut(&transition.booking_id) {
                    transition.apply_to(booking)?;
                }
            }
            Mutation::InsertPayment(payment) => {
                self.payments.insert(payment.reference.clone(), payment);
            }
            Mutation::TransitionPayment(transition) => {
                if let Some(payment) = self.payments.get_mut(&transition.reference) {
                    transition.apply_to(payment)?;
                }
            }
            Mutation::SetWindowBlocked {
                window_id, blocked, ..
            } => {
                if let Some(window) = self.windows.get_mut(&window_id) {
                    window.is_blocked = blocked;
                }
            }
            Mutation::CreditPoints { user_id, points } => {
                if let Some(user) = self.users.get_mut(&user_id) {
                    user.points = user.points.saturating_add(points);
                }
            }
            Mutation::InsertPayout(payout) => {
                self.payouts.insert(payout.reference.clone(), payout);
            }
            Mutation::TransitionPayout(transition) => {
                if let Some(payout) = self.payouts.get_mut(&transition.reference) {
                    transition.apply_to(payout)?;
                }
            }
            Mutation::ScheduleExpiry(expiry) => {
                self.expiries.insert(expiry.booking_id, expiry);
            }
            Mutation::ClearExpiry { booking_id } => {
                self.expiries.remove(&booking_id);
            }
        }
        Ok(())
    }
}

/// A thread-safe in-memory store for the whole booking domain.
///
/// Uses `Arc<RwLock<..>>` tables so clones share state. A commit validates
/// every mutation under the write lock before applying any of them.
/// Ideal for tests and single-process deployments where restarts may drop
/// pending holds.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    locks: ScopeLocks,
}

impl InMemoryStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn lock(&self, scope: LockScope) -> Result<ScopeGuard> {
        Ok(self.locks.acquire(scope).await)
    }

    async fn apply(&self, mutations: Vec<Mutation>) -> Result<()> {
        let mut tables = self.tables.write().await;
        for mutation in &mutations {
            tables.check(mutation)?;
        }
        for mutation in mutations {
            tables.write(mutation)?;
        }
        Ok(())
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn listing(&self, id: Uuid) -> Result<Option<Listing>> {
        Ok(self.tables.read().await.listings.get(&id).cloned())
    }

    async fn windows(&self, listing_id: Uuid) -> Result<Vec<AvailabilityWindow>> {
        let tables = self.tables.read().await;
        let mut windows: Vec<_> = tables
            .windows
            .values()
            .filter(|w| w.listing_id == listing_id)
            .cloned()
            .collect();
        windows.sort_by_key(|w| w.start_date);
        Ok(windows)
    }

    async fn holds(&self, listing_id: Uuid) -> Result<Vec<ApartmentHold>> {
        let tables = self.tables.read().await;
        Ok(tables
            .holds
            .values()
            .filter(|h| h.listing_id == listing_id)
            .cloned()
            .collect())
    }

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn bookings_for_listing(&self, listing_id: Uuid) -> Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.listing_id == listing_id)
            .cloned()
            .collect())
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn payment(&self, reference: &str) -> Result<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(reference).cloned())
    }

    async fn payments_for_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .filter(|p| p.booking_id == Some(booking_id))
            .cloned()
            .collect())
    }

    async fn payout(&self, reference: &str) -> Result<Option<Payout>> {
        Ok(self.tables.read().await.payouts.get(reference).cloned())
    }

    async fn due_expiries(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledExpiry>> {
        let tables = self.tables.read().await;
        let mut due: Vec<_> = tables
            .expiries
            .values()
            .filter(|e| e.fire_at <= now)
            .cloned()
            .collect();
        due.sort_by_key(|e| e.fire_at);
        Ok(due)
    }

    async fn claim_webhook_event(&self, provider: Provider, event_id: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .webhook_events
            .insert((provider, event_id.to_string())))
    }

    async fn release_webhook_event(&self, provider: Provider, event_id: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .webhook_events
            .remove(&(provider, event_id.to_string()));
        Ok(())
    }
}
