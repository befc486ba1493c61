use super::reconciliation::ReconciliationHandler;
use super::transitions::{self, Release};
use super::{Caller, Context};
use crate::domain::availability::{self, AvailabilityWindow, DateRange};
use crate::domain::booking::{ApartmentHold, Booking, BookingStatus, ScheduledExpiry};
use crate::domain::money::ServiceFee;
use crate::domain::notification::{CancelReason, Notification};
use crate::domain::payment::{
    Payment, PaymentPurpose, PaymentStatus, booking_reference, retry_reference,
};
use crate::domain::ports::LockScope;
use crate::domain::transaction::{Mutation, Transaction};
use crate::error::{BookingError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use tracing::instrument;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBooking {
    pub booking: Booking,
    pub reference: String,
    pub authorization_url: Option<String>,
    pub hold_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "status",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum VerifyOutcome {
    Confirmed {
        booking: Booking,
    },
    /// The guest still has to pay; `reused` tells whether the intent is the
    /// one handed out earlier.
    AwaitingPayment {
        reference: String,
        authorization_url: Option<String>,
        reused: bool,
    },
}

/// Holds lapsed inside a listing transaction before its conflict check.
#[derive(Default)]
struct Swept {
    holds: HashSet<Uuid>,
    bookings: HashSet<Uuid>,
    notifications: Vec<Notification>,
}

/// Owns the booking state machine.
///
/// `create_booking` performs the overlap check, hold, booking, payment and
/// provider intent as one listing-scoped transaction, so two guests racing
/// for the same dates serialize on the listing and only one wins.
#[derive(Clone)]
pub struct BookingService {
    ctx: Context,
}

impl BookingService {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self))]
    pub async fn create_booking(
        &self,
        user_id: Uuid,
        listing_id: Uuid,
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
        service_fee: Decimal,
    ) -> Result<CreatedBooking> {
        let service_fee = ServiceFee::new(service_fee)?;
        let range = DateRange::new(check_in, check_out)?;
        let boundary = self.ctx.policy.boundary;

        let user = self
            .ctx
            .store
            .user(user_id)
            .await?
            .ok_or(BookingError::UserNotFound(user_id))?;
        let listing = self
            .ctx
            .store
            .listing(listing_id)
            .await?
            .ok_or(BookingError::ListingNotFound(listing_id))?;
        if !listing.is_bookable() {
            return Err(BookingError::ListingNotBookable(listing_id));
        }

        let now = self.ctx.clock.now();
        let mut tx = Transaction::begin(&self.ctx.store, LockScope::Listing(listing_id)).await?;
        let swept = self.sweep_lapsed_holds(&mut tx, listing_id, &range, now).await?;

        let bookings = tx.bookings_for_listing(listing_id).await?;
        let duplicate = bookings.iter().any(|b| {
            b.user_id == user_id
                && b.status == BookingStatus::Pending
                && !b.is_deleted()
                && !swept.bookings.contains(&b.id)
                && b.range().overlaps(&range, boundary)
        });
        if duplicate {
            return Err(BookingError::DuplicatePendingBooking);
        }

        let holds = tx.holds(listing_id).await?;
        let held_for = holds
            .iter()
            .filter(|h| {
                !swept.holds.contains(&h.id) && h.is_live(now) && h.range().overlaps(&range, boundary)
            })
            .map(|h| h.remaining_minutes(now))
            .max();
        if let Some(minutes) = held_for {
            return Err(BookingError::DatesHeld {
                remaining_minutes: Some(minutes),
            });
        }

        let windows = tx.windows(listing_id).await?;
        let blocked = windows
            .iter()
            .any(|w| w.is_blocked && w.range().overlaps(&range, boundary));
        let confirmed = bookings
            .iter()
            .any(|b| b.is_confirmed() && b.range().overlaps(&range, boundary));
        if blocked || confirmed {
            return Err(BookingError::DatesHeld {
                remaining_minutes: None,
            });
        }

        let window = availability::find_availability(&windows, &range)
            .map_err(|_| BookingError::NoAvailability)?;
        let price = availability::compute_price(window, range.nights(), service_fee.value())?;

        let hold_id = Uuid::new_v4();
        let expiry_time = now + self.ctx.policy.hold_duration;
        let booking = Booking::new_pending(user_id, listing_id, range, price, hold_id, now);
        let hold = ApartmentHold {
            id: hold_id,
            listing_id,
            user_id,
            booking_id: booking.id,
            start_date: range.start,
            end_date: range.end,
            expiry_time,
        };

        let reference = booking_reference(booking.id);
        let payment = Payment::pending(
            user_id,
            Some(booking.id),
            price.total_price,
            reference.clone(),
            self.ctx.gateways.default_provider(),
            PaymentPurpose::Booking,
            now,
        );
        let payment = transitions::open_payment_intent(
            &self.ctx,
            &user,
            payment,
            json!({ "bookingId": booking.id, "type": "booking", "userId": user_id }),
        )
        .await?;
        let authorization_url = payment.authorization_url().map(str::to_string);

        tx.stage(Mutation::InsertHold(hold));
        tx.stage(Mutation::InsertBooking(booking.clone()));
        tx.stage(Mutation::InsertPayment(payment));
        tx.stage(Mutation::ScheduleExpiry(ScheduledExpiry {
            booking_id: booking.id,
            hold_id,
            listing_id,
            fire_at: expiry_time,
        }));
        tx.commit().await?;

        tracing::info!(
            booking_id = %booking.id,
            %reference,
            total = %booking.total_price,
            "Booking held pending payment"
        );
        self.ctx.dispatch(swept.notifications).await;

        Ok(CreatedBooking {
            booking,
            reference,
            authorization_url,
            hold_expires_at: expiry_time,
        })
    }

    /// Reverses lapsed holds overlapping `range` inside the caller's listing
    /// transaction, exactly as the background sweeper would.
    async fn sweep_lapsed_holds(
        &self,
        tx: &mut Transaction,
        listing_id: Uuid,
        range: &DateRange,
        now: DateTime<Utc>,
    ) -> Result<Swept> {
        let mut swept = Swept::default();
        let holds = tx.holds(listing_id).await?;
        for hold in holds {
            if hold.is_live(now) || !hold.range().overlaps(range, self.ctx.policy.boundary) {
                continue;
            }
            let expiry = ScheduledExpiry {
                booking_id: hold.booking_id,
                hold_id: hold.id,
                listing_id,
                fire_at: hold.expiry_time,
            };
            let notifications =
                transitions::stage_expiry(tx, &expiry, self.ctx.policy.boundary, now).await?;
            tracing::debug!(hold_id = %hold.id, booking_id = %hold.booking_id, "Lapsed hold swept");
            swept.holds.insert(hold.id);
            swept.bookings.insert(hold.booking_id);
            swept.notifications.extend(notifications);
        }
        Ok(swept)
    }

    /// Client-side completion path: confirm a paid reference, or hand the
    /// guest a payment link again.
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        booking_id: Uuid,
        user_id: Uuid,
        reference: Option<String>,
    ) -> Result<VerifyOutcome> {
        let booking = self.pending_booking_of(booking_id, user_id).await?;

        if let Some(reference) = reference.filter(|r| !r.is_empty()) {
            let payment = self
                .ctx
                .store
                .payment(&reference)
                .await?
                .filter(|p| p.booking_id == Some(booking.id))
                .ok_or_else(|| BookingError::PaymentNotFound(reference.clone()))?;
            let gateway = self.ctx.gateways.get(payment.provider)?;
            if gateway.verify_payment_status(&reference).await? {
                ReconciliationHandler::new(self.ctx.clone())
                    .confirm_payment(&reference, None)
                    .await?;
                let booking = self
                    .ctx
                    .store
                    .booking(booking_id)
                    .await?
                    .ok_or(BookingError::BookingNotFound(booking_id))?;
                if booking.status != BookingStatus::Confirmed {
                    return Err(BookingError::InvalidTransition {
                        from: booking.status.to_string(),
                        to: BookingStatus::Confirmed.to_string(),
                    });
                }
                return Ok(VerifyOutcome::Confirmed { booking });
            }
            tracing::info!(%reference, "Provider reports payment not completed");
        }

        let now = self.ctx.clock.now();
        let payments = self.ctx.store.payments_for_booking(booking.id).await?;
        let recent = payments
            .iter()
            .filter(|p| p.status == PaymentStatus::Pending)
            .max_by_key(|p| p.created_at)
            .filter(|p| now - p.created_at < self.ctx.policy.payment_reuse);
        if let Some(payment) = recent {
            return Ok(VerifyOutcome::AwaitingPayment {
                reference: payment.reference.clone(),
                authorization_url: payment.authorization_url().map(str::to_string),
                reused: true,
            });
        }

        self.reissue_payment(booking_id, user_id, now).await
    }

    async fn reissue_payment(
        &self,
        booking_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<VerifyOutcome> {
        let user = self
            .ctx
            .store
            .user(user_id)
            .await?
            .ok_or(BookingError::UserNotFound(user_id))?;
        let booking = self.pending_booking_of(booking_id, user_id).await?;
        let mut tx =
            Transaction::begin(&self.ctx.store, LockScope::Listing(booking.listing_id)).await?;
        let booking = tx
            .booking(booking_id)
            .await?
            .filter(|b| b.status == BookingStatus::Pending && !b.is_deleted())
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        let reference = retry_reference(booking.id, now);
        let payment = Payment::pending(
            user_id,
            Some(booking.id),
            booking.total_price,
            reference.clone(),
            self.ctx.gateways.default_provider(),
            PaymentPurpose::Booking,
            now,
        );
        let payment = transitions::open_payment_intent(
            &self.ctx,
            &user,
            payment,
            json!({ "bookingId": booking.id, "type": "booking", "userId": user_id }),
        )
        .await?;
        let authorization_url = payment.authorization_url().map(str::to_string);
        tx.stage(Mutation::InsertPayment(payment));
        tx.commit().await?;

        tracing::info!(%booking_id, %reference, "Payment intent reissued");
        Ok(VerifyOutcome::AwaitingPayment {
            reference,
            authorization_url,
            reused: false,
        })
    }

    /// Guest cancellation. Allowed while PENDING, or CONFIRMED before
    /// check-in; the row is soft-deleted.
    #[instrument(skip(self))]
    pub async fn delete_booking(&self, booking_id: Uuid, user_id: Uuid) -> Result<Booking> {
        let booking = self.visible_booking(booking_id).await?;
        if booking.user_id != user_id {
            return Err(BookingError::Forbidden);
        }

        let now = self.ctx.clock.now();
        let mut tx =
            Transaction::begin(&self.ctx.store, LockScope::Listing(booking.listing_id)).await?;
        let booking = tx
            .booking(booking_id)
            .await?
            .filter(|b| !b.is_deleted())
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        if !booking.can_be_cancelled_by_guest(now) {
            return Err(BookingError::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Cancelled.to_string(),
            });
        }

        let release = Release {
            reason: CancelReason::GuestCancelled,
            deleted_at: Some(now),
            fail_pending_payments: false,
        };
        let notifications =
            transitions::stage_release(&mut tx, &booking, release, self.ctx.policy.boundary, now)
                .await?;
        tx.commit().await?;

        tracing::info!(%booking_id, previous = %booking.status, "Booking cancelled by guest");
        self.ctx.dispatch(notifications).await;
        self.visible_or_deleted(booking_id).await
    }

    /// Administrative status change. Only PENDING bookings move, and only to
    /// CONFIRMED or CANCELLED; repeating the current status is a no-op.
    #[instrument(skip(self))]
    pub async fn update_booking_status(
        &self,
        booking_id: Uuid,
        status: &str,
        caller: Caller,
    ) -> Result<Booking> {
        let target: BookingStatus = status.parse()?;
        let booking = self.visible_booking(booking_id).await?;
        if let Caller::User(user_id) = caller
            && booking.user_id != user_id
        {
            return Err(BookingError::Forbidden);
        }

        let now = self.ctx.clock.now();
        let mut tx =
            Transaction::begin(&self.ctx.store, LockScope::Listing(booking.listing_id)).await?;
        let booking = tx
            .booking(booking_id)
            .await?
            .filter(|b| !b.is_deleted())
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        if booking.status == target {
            return Ok(booking);
        }

        let notifications = match (booking.status, target) {
            (BookingStatus::Pending, BookingStatus::Confirmed) => {
                let reference = booking
                    .payment_ref
                    .clone()
                    .unwrap_or_else(|| booking_reference(booking.id));
                vec![transitions::stage_confirmation(&mut tx, &booking, &reference).await?]
            }
            (BookingStatus::Pending, BookingStatus::Cancelled) => {
                let release = Release {
                    reason: CancelReason::AdminCancelled,
                    deleted_at: None,
                    fail_pending_payments: true,
                };
                transitions::stage_release(&mut tx, &booking, release, self.ctx.policy.boundary, now)
                    .await?
            }
            (from, to) => {
                return Err(BookingError::InvalidTransition {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            }
        };
        tx.commit().await?;

        tracing::info!(%booking_id, from = %booking.status, to = %target, ?caller, "Booking status updated");
        self.ctx.dispatch(notifications).await;
        self.visible_or_deleted(booking_id).await
    }

    /// Non-deleted bookings of `user_id`, newest first.
    pub async fn user_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .ctx
            .store
            .bookings_for_user(user_id)
            .await?
            .into_iter()
            .filter(|b| !b.is_deleted())
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    /// The unblocked window able to host `[check_in, check_out]`.
    pub async fn find_availability(
        &self,
        listing_id: Uuid,
        check_in: DateTime<Utc>,
        check_out: DateTime<Utc>,
    ) -> Result<AvailabilityWindow> {
        let range = DateRange::new(check_in, check_out)?;
        if self.ctx.store.listing(listing_id).await?.is_none() {
            return Err(BookingError::ListingNotFound(listing_id));
        }
        let windows = self.ctx.store.windows(listing_id).await?;
        availability::find_availability(&windows, &range).cloned()
    }

    async fn visible_booking(&self, booking_id: Uuid) -> Result<Booking> {
        self.ctx
            .store
            .booking(booking_id)
            .await?
            .filter(|b| !b.is_deleted())
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    async fn visible_or_deleted(&self, booking_id: Uuid) -> Result<Booking> {
        self.ctx
            .store
            .booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))
    }

    async fn pending_booking_of(&self, booking_id: Uuid, user_id: Uuid) -> Result<Booking> {
        self.ctx
            .store
            .booking(booking_id)
            .await?
            .filter(|b| {
                b.user_id == user_id && b.status == BookingStatus::Pending && !b.is_deleted()
            })
            .ok_or(BookingError::BookingNotFound(booking_id))
    }
}
