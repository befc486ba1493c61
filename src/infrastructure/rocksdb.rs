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
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const CF_USERS: &str = "users";
pub const CF_LISTINGS: &str = "listings";
/// Keyed `{listing_id}/{window_id}`.
pub const CF_WINDOWS: &str = "windows";
/// Keyed `{listing_id}/{hold_id}`.
pub const CF_HOLDS: &str = "holds";
pub const CF_BOOKINGS: &str = "bookings";
/// Keys `listing/{listing_id}/{booking_id}` and `user/{user_id}/{booking_id}`.
pub const CF_BOOKING_INDEX: &str = "booking_index";
pub const CF_PAYMENTS: &str = "payments";
/// Keyed `{booking_id}/{reference}`.
pub const CF_PAYMENT_INDEX: &str = "payment_index";
pub const CF_PAYOUTS: &str = "payouts";
pub const CF_EXPIRIES: &str = "expiries";
/// Keyed `{provider}/{event_id}`.
pub const CF_WEBHOOK_EVENTS: &str = "webhook_events";

const COLUMN_FAMILIES: &[&str] = &[
    CF_USERS,
    CF_LISTINGS,
    CF_WINDOWS,
    CF_HOLDS,
    CF_BOOKINGS,
    CF_BOOKING_INDEX,
    CF_PAYMENTS,
    CF_PAYMENT_INDEX,
    CF_PAYOUTS,
    CF_EXPIRIES,
    CF_WEBHOOK_EVENTS,
];

/// A persistent store implementation using RocksDB.
///
/// Each entity lives in its own column family as JSON. Commits are built
/// into a single `WriteBatch`, so a transaction is applied atomically and
/// survives restarts, including the scheduled hold expiries.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    locks: ScopeLocks,
    commit: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect::<Vec<_>>();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            locks: ScopeLocks::new(),
            commit: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| BookingError::Storage(format!("{name} column family not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf: &str, key: &str) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_json<T: Serialize>(
        &self,
        batch: &mut WriteBatch,
        cf: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        batch.put_cf(self.cf(cf)?, key.as_bytes(), serde_json::to_vec(value)?);
        Ok(())
    }

    fn scan_prefix(&self, cf: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let handle = self.cf(cf)?;
        let mode = IteratorMode::From(prefix.as_bytes(), Direction::Forward);
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(handle, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            rows.push((String::from_utf8_lossy(&key).into_owned(), value.to_vec()));
        }
        Ok(rows)
    }

    fn scan_json<T: DeserializeOwned>(&self, cf: &str, prefix: &str) -> Result<Vec<T>> {
        self.scan_prefix(cf, prefix)?
            .into_iter()
            .map(|(_, value)| serde_json::from_slice(&value).map_err(BookingError::from))
            .collect()
    }

    /// Booking ids stored under an index prefix such as `listing/{id}/`.
    fn indexed_bookings(&self, prefix: &str) -> Result<Vec<Booking>> {
        let mut bookings = Vec::new();
        for (key, _) in self.scan_prefix(CF_BOOKING_INDEX, prefix)? {
            let id = key.trim_start_matches(prefix);
            if let Some(booking) = self.get_json::<Booking>(CF_BOOKINGS, id)? {
                bookings.push(booking);
            }
        }
        Ok(bookings)
    }

    fn find_window(&self, listing_id: Uuid, window_id: Uuid) -> Result<AvailabilityWindow> {
        self.get_json(CF_WINDOWS, &format!("{listing_id}/{window_id}"))?
            .ok_or_else(|| BookingError::Storage(format!("availability window {window_id} not found")))
    }

    fn stage(&self, batch: &mut WriteBatch, mutation: Mutation) -> Result<()> {
        match mutation {
            Mutation::PutUser(user) => {
                self.put_json(batch, CF_USERS, &user.id.to_string(), &user)?;
            }
            Mutation::PutListing(listing) => {
                self.put_json(batch, CF_LISTINGS, &listing.id.to_string(), &listing)?;
            }
            Mutation::PutWindow(window) => {
                let key = format!("{}/{}", window.listing_id, window.id);
                self.put_json(batch, CF_WINDOWS, &key, &window)?;
            }
            Mutation::InsertHold(hold) => {
                let key = format!("{}/{}", hold.listing_id, hold.id);
                self.put_json(batch, CF_HOLDS, &key, &hold)?;
            }
            Mutation::DeleteHold {
                listing_id,
                hold_id,
            } => {
                batch.delete_cf(self.cf(CF_HOLDS)?, format!("{listing_id}/{hold_id}").as_bytes());
            }
            Mutation::InsertBooking(booking) => {
                let id = booking.id.to_string();
                if self.get_json::<Booking>(CF_BOOKINGS, &id)?.is_some() {
                    return Err(BookingError::WriteConflict(format!(
                        "booking {id} already exists"
                    )));
                }
                let index = self.cf(CF_BOOKING_INDEX)?;
                batch.put_cf(index, format!("listing/{}/{id}", booking.listing_id).as_bytes(), b"");
                batch.put_cf(index, format!("user/{}/{id}", booking.user_id).as_bytes(), b"");
                self.put_json(batch, CF_BOOKINGS, &id, &booking)?;
            }
            Mutation::TransitionBooking(transition) => {
                let id = transition.booking_id.to_string();
                let mut booking: Booking = self
                    .get_json(CF_BOOKINGS, &id)?
                    .ok_or(BookingError::BookingNotFound(transition.booking_id))?;
                transition.apply_to(&mut booking)?;
                self.put_json(batch, CF_BOOKINGS, &id, &booking)?;
            }
            Mutation::InsertPayment(payment) => {
                if self.get_json::<Payment>(CF_PAYMENTS, &payment.reference)?.is_some() {
                    return Err(BookingError::WriteConflict(format!(
                        "payment reference {} already exists",
                        payment.reference
                    )));
                }
                if let Some(booking_id) = payment.booking_id {
                    let key = format!("{booking_id}/{}", payment.reference);
                    batch.put_cf(self.cf(CF_PAYMENT_INDEX)?, key.as_bytes(), b"");
                }
                self.put_json(batch, CF_PAYMENTS, &payment.reference, &payment)?;
            }
            Mutation::TransitionPayment(transition) => {
                let mut payment: Payment = self
                    .get_json(CF_PAYMENTS, &transition.reference)?
                    .ok_or_else(|| BookingError::PaymentNotFound(transition.reference.clone()))?;
                transition.apply_to(&mut payment)?;
                self.put_json(batch, CF_PAYMENTS, &transition.reference, &payment)?;
            }
            Mutation::SetWindowBlocked {
                listing_id,
                window_id,
                blocked,
            } => {
                let mut window = self.find_window(listing_id, window_id)?;
                window.is_blocked = blocked;
                self.put_json(batch, CF_WINDOWS, &format!("{listing_id}/{window_id}"), &window)?;
            }
            Mutation::CreditPoints { user_id, points } => {
                let mut user: User = self
                    .get_json(CF_USERS, &user_id.to_string())?
                    .ok_or(BookingError::UserNotFound(user_id))?;
                user.points = user.points.saturating_add(points);
                self.put_json(batch, CF_USERS, &user_id.to_string(), &user)?;
            }
            Mutation::InsertPayout(payout) => {
                if self.get_json::<Payout>(CF_PAYOUTS, &payout.reference)?.is_some() {
                    return Err(BookingError::WriteConflict(format!(
                        "payout {} already exists",
                        payout.reference
                    )));
                }
                self.put_json(batch, CF_PAYOUTS, &payout.reference, &payout)?;
            }
            Mutation::TransitionPayout(transition) => {
                let mut payout: Payout = self
                    .get_json(CF_PAYOUTS, &transition.reference)?
                    .ok_or_else(|| BookingError::PaymentNotFound(transition.reference.clone()))?;
                transition.apply_to(&mut payout)?;
                self.put_json(batch, CF_PAYOUTS, &transition.reference, &payout)?;
            }
            Mutation::ScheduleExpiry(expiry) => {
                self.put_json(batch, CF_EXPIRIES, &expiry.booking_id.to_string(), &expiry)?;
            }
            Mutation::ClearExpiry { booking_id } => {
                batch.delete_cf(self.cf(CF_EXPIRIES)?, booking_id.to_string().as_bytes());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Store for RocksDBStore {
    async fn lock(&self, scope: LockScope) -> Result<ScopeGuard> {
        Ok(self.locks.acquire(scope).await)
    }

    async fn apply(&self, mutations: Vec<Mutation>) -> Result<()> {
        // Preconditions are read from committed state, so batches from
        // different scopes must not interleave between read and write.
        let _commit = self.commit.lock().await;
        let mut batch = WriteBatch::default();
        for mutation in mutations {
            self.stage(&mut batch, mutation)?;
        }
        self.db.write(batch)?;
        Ok(())
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        self.get_json(CF_USERS, &id.to_string())
    }

    async fn listing(&self, id: Uuid) -> Result<Option<Listing>> {
        self.get_json(CF_LISTINGS, &id.to_string())
    }

    async fn windows(&self, listing_id: Uuid) -> Result<Vec<AvailabilityWindow>> {
        let mut windows: Vec<AvailabilityWindow> =
            self.scan_json(CF_WINDOWS, &format!("{listing_id}/"))?;
        windows.sort_by_key(|w| w.start_date);
        Ok(windows)
    }

    async fn holds(&self, listing_id: Uuid) -> Result<Vec<ApartmentHold>> {
        self.scan_json(CF_HOLDS, &format!("{listing_id}/"))
    }

    async fn booking(&self, id: Uuid) -> Result<Option<Booking>> {
        self.get_json(CF_BOOKINGS, &id.to_string())
    }

    async fn bookings_for_listing(&self, listing_id: Uuid) -> Result<Vec<Booking>> {
        self.indexed_bookings(&format!("listing/{listing_id}/"))
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        self.indexed_bookings(&format!("user/{user_id}/"))
    }

    async fn payment(&self, reference: &str) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, reference)
    }

    async fn payments_for_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>> {
        let prefix = format!("{booking_id}/");
        let mut payments = Vec::new();
        for (key, _) in self.scan_prefix(CF_PAYMENT_INDEX, &prefix)? {
            let reference = key.trim_start_matches(prefix.as_str());
            if let Some(payment) = self.get_json::<Payment>(CF_PAYMENTS, reference)? {
                payments.push(payment);
            }
        }
        Ok(payments)
    }

    async fn payout(&self, reference: &str) -> Result<Option<Payout>> {
        self.get_json(CF_PAYOUTS, reference)
    }

    async fn due_expiries(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledExpiry>> {
        let handle = self.cf(CF_EXPIRIES)?;
        let mut due = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            let expiry: ScheduledExpiry = serde_json::from_slice(&value)?;
            if expiry.fire_at <= now {
                due.push(expiry);
            }
        }
        due.sort_by_key(|e| e.fire_at);
        Ok(due)
    }

    async fn claim_webhook_event(&self, provider: Provider, event_id: &str) -> Result<bool> {
        let _commit = self.commit.lock().await;
        let handle = self.cf(CF_WEBHOOK_EVENTS)?;
        let key = format!("{provider}/{event_id}");
        if self.db.get_pinned_cf(handle, key.as_bytes())?.is_some() {
            return Ok(false);
        }
        self.db
            .put_cf(handle, key.as_bytes(), Utc::now().to_rfc3339().as_bytes())?;
        Ok(true)
    }

    async fn release_webhook_event(&self, provider: Provider, event_id: &str) -> Result<()> {
        let _commit = self.commit.lock().await;
        let handle = self.cf(CF_WEBHOOK_EVENTS)?;
        self.db
            .delete_cf(handle, format!("{provider}/{event_id}").as_bytes())?;
        Ok(())
    }
}
