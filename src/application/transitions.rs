//! Staged side effects shared by every path that confirms or releases a
//! booking: client verification, webhooks, expiry sweeps and cancellations.

use super::{BookingPolicy, Context};
use crate::domain::availability::BoundaryPolicy;
use crate::domain::booking::{Booking, BookingStatus, ScheduledExpiry};
use crate::domain::gateway::TransactionRequest;
use crate::domain::notification::{CancelReason, Notification};
use crate::domain::payment::{Payment, PaymentPurpose, PaymentStatus, merge_metadata};
use crate::domain::transaction::{BookingTransition, Mutation, PaymentTransition, Transaction};
use crate::domain::user::User;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde_json::json;

/// PENDING -> CONFIRMED: record the paying reference, drop the hold and its
/// timer, block the covering window.
pub(super) async fn stage_confirmation(
    tx: &mut Transaction,
    booking: &Booking,
    reference: &str,
) -> Result<Notification> {
    let mut transition =
        BookingTransition::new(booking.id, BookingStatus::Pending, BookingStatus::Confirmed);
    transition.payment_ref = Some(reference.to_string());
    transition.clear_hold = true;
    tx.stage(Mutation::TransitionBooking(transition));
    stage_hold_cleanup(tx, booking);

    let windows = tx.windows(booking.listing_id).await?;
    match windows.iter().find(|w| w.covers(&booking.range())) {
        Some(window) if !window.is_blocked => tx.stage(Mutation::SetWindowBlocked {
            listing_id: booking.listing_id,
            window_id: window.id,
            blocked: true,
        }),
        Some(_) => {}
        None => tracing::warn!(
            booking_id = %booking.id,
            listing_id = %booking.listing_id,
            "No availability window covers the confirmed booking"
        ),
    }

    Ok(Notification::BookingConfirmed {
        booking_id: booking.id,
        user_id: booking.user_id,
        reference: reference.to_string(),
    })
}

/// What a release should do besides cancelling the booking.
pub(super) struct Release {
    pub reason: CancelReason,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Mark every still-PENDING payment on the booking FAILED.
    pub fail_pending_payments: bool,
}

/// `booking.status` -> CANCELLED with hold, timer and (guarded) window
/// release.
pub(super) async fn stage_release(
    tx: &mut Transaction,
    booking: &Booking,
    release: Release,
    boundary: BoundaryPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<Notification>> {
    let mut transition =
        BookingTransition::new(booking.id, booking.status, BookingStatus::Cancelled);
    transition.clear_hold = true;
    transition.deleted_at = release.deleted_at;
    tx.stage(Mutation::TransitionBooking(transition));
    stage_hold_cleanup(tx, booking);
    stage_window_unblock(tx, booking, boundary).await?;

    let mut notifications = vec![Notification::BookingCancelled {
        booking_id: booking.id,
        user_id: booking.user_id,
        reason: release.reason,
    }];

    if release.fail_pending_payments {
        let payments = tx.payments_for_booking(booking.id).await?;
        for payment in payments {
            if payment.status != PaymentStatus::Pending {
                continue;
            }
            tx.stage(Mutation::TransitionPayment(PaymentTransition {
                reference: payment.reference.clone(),
                expected: PaymentStatus::Pending,
                status: PaymentStatus::Failed,
                metadata: json!({ "failedAt": now, "reason": release.reason.as_str() }),
            }));
            notifications.push(Notification::PaymentFailed {
                reference: payment.reference,
                user_id: payment.user_id,
            });
        }
    }

    Ok(notifications)
}

/// Reverses a lapsed hold. A booking still PENDING is released with its
/// payments failed; anything else only loses the hold and its timer.
pub(super) async fn stage_expiry(
    tx: &mut Transaction,
    expiry: &ScheduledExpiry,
    boundary: BoundaryPolicy,
    now: DateTime<Utc>,
) -> Result<Vec<Notification>> {
    let booking = tx.booking(expiry.booking_id).await?;
    match booking {
        Some(booking) if booking.status == BookingStatus::Pending && !booking.is_deleted() => {
            if booking.hold_id != Some(expiry.hold_id) {
                tx.stage(Mutation::DeleteHold {
                    listing_id: expiry.listing_id,
                    hold_id: expiry.hold_id,
                });
            }
            let release = Release {
                reason: CancelReason::HoldExpired,
                deleted_at: None,
                fail_pending_payments: true,
            };
            stage_release(tx, &booking, release, boundary, now).await
        }
        _ => {
            tx.stage(Mutation::DeleteHold {
                listing_id: expiry.listing_id,
                hold_id: expiry.hold_id,
            });
            tx.stage(Mutation::ClearExpiry {
                booking_id: expiry.booking_id,
            });
            Ok(Vec::new())
        }
    }
}

fn stage_hold_cleanup(tx: &mut Transaction, booking: &Booking) {
    if let Some(hold_id) = booking.hold_id {
        tx.stage(Mutation::DeleteHold {
            listing_id: booking.listing_id,
            hold_id,
        });
    }
    tx.stage(Mutation::ClearExpiry {
        booking_id: booking.id,
    });
}

/// Unblocks the window covering `booking` unless another confirmed stay
/// still sits inside it.
async fn stage_window_unblock(
    tx: &mut Transaction,
    booking: &Booking,
    boundary: BoundaryPolicy,
) -> Result<()> {
    let windows = tx.windows(booking.listing_id).await?;
    let Some(window) = windows
        .into_iter()
        .find(|w| w.is_blocked && w.covers(&booking.range()))
    else {
        return Ok(());
    };

    let still_occupied = tx
        .bookings_for_listing(booking.listing_id)
        .await?
        .iter()
        .any(|other| {
            other.id != booking.id
                && other.is_confirmed()
                && other.range().overlaps(&window.range(), boundary)
        });
    if still_occupied {
        tracing::debug!(
            window_id = %window.id,
            "Window stays blocked by another confirmed booking"
        );
        return Ok(());
    }

    tx.stage(Mutation::SetWindowBlocked {
        listing_id: booking.listing_id,
        window_id: window.id,
        blocked: false,
    });
    Ok(())
}

/// Opens a provider intent for `payment` and folds the response into its
/// metadata. The caller stages the returned row.
/// Where the payer lands after checkout, by what they are paying for.
fn redirect_for(policy: &BookingPolicy, purpose: PaymentPurpose) -> &str {
    match purpose {
        PaymentPurpose::Booking => &policy.booking_redirect_url,
        PaymentPurpose::Points => &policy.points_redirect_url,
    }
}

pub(super) async fn open_payment_intent(
    ctx: &Context,
    payer: &User,
    mut payment: Payment,
    request_metadata: serde_json::Value,
) -> Result<Payment> {
    let gateway = ctx.gateways.get(payment.provider)?;
    let intent = gateway
        .initialize_transaction(TransactionRequest {
            email: payer.email.clone(),
            name: payer.full_name(),
            amount: payment.amount,
            currency: ctx.policy.currency.clone(),
            reference: payment.reference.clone(),
            redirect_url: redirect_for(&ctx.policy, payment.purpose).to_string(),
            metadata: request_metadata,
        })
        .await?;

    merge_metadata(
        &mut payment.metadata,
        json!({
            "authorizationUrl": intent.authorization_url,
            "providerRef": intent.provider_ref,
        }),
    );
    Ok(payment)
}
