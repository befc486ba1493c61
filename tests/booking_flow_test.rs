mod common;

use common::{Harness, april};
use rust_decimal_macros::dec;
use shortlet::application::{Caller, Reconciled, VerifyOutcome};
use shortlet::domain::booking::BookingStatus;
use shortlet::domain::notification::{CancelReason, Notification};
use shortlet::domain::payment::PaymentStatus;
use shortlet::error::BookingError;

#[tokio::test]
async fn test_create_booking_holds_dates_and_opens_payment() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;

    let created = h
        .bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();

    assert_eq!(created.booking.status, BookingStatus::Pending);
    assert_eq!(created.booking.base_price, dec!(300));
    assert_eq!(created.booking.total_price, dec!(320));
    assert_eq!(created.reference, format!("BOOK-{}", created.booking.id));
    assert_eq!(
        created.authorization_url.as_deref(),
        Some(format!("https://checkout.mock.local/pay/{}", created.reference).as_str())
    );
    assert_eq!(
        h.gateway.last_redirect_url().as_deref(),
        Some("http://localhost:3000/booking/verify")
    );

    let holds = h.store.holds(h.listing_id).await.unwrap();
    assert_eq!(holds.len(), 1);
    assert_eq!(holds[0].booking_id, created.booking.id);
    assert_eq!(holds[0].expiry_time, created.hold_expires_at);

    let payment = h.store.payment(&created.reference).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(payment.amount, dec!(320));
    assert!(!h.window_blocked().await);
}

#[tokio::test]
async fn test_create_booking_validation() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    let bookings = h.bookings();

    let reversed = bookings
        .create_booking(guest, h.listing_id, april(13), april(10), dec!(20))
        .await;
    assert!(matches!(reversed, Err(BookingError::InvalidDateRange)));

    let free = bookings
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(0))
        .await;
    assert!(matches!(free, Err(BookingError::InvalidServiceFee)));

    let enormous = bookings
        .create_booking(
            guest,
            h.listing_id,
            april(10),
            april(13),
            rust_decimal::Decimal::MAX,
        )
        .await;
    assert!(matches!(enormous, Err(BookingError::InvalidServiceFee)));

    let outside = bookings
        .create_booking(
            guest,
            h.listing_id,
            april(28),
            april(30) + chrono::Duration::days(3),
            dec!(20),
        )
        .await;
    assert!(matches!(outside, Err(BookingError::NoAvailability)));

    let unknown_guest = bookings
        .create_booking(uuid::Uuid::new_v4(), h.listing_id, april(10), april(13), dec!(20))
        .await;
    assert!(matches!(unknown_guest, Err(BookingError::UserNotFound(_))));

    assert!(h.store.holds(h.listing_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_overlapping_requests_are_refused() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    let rival = h.add_guest().await;
    let bookings = h.bookings();

    bookings
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();

    let again = bookings
        .create_booking(guest, h.listing_id, april(11), april(14), dec!(20))
        .await;
    assert!(matches!(again, Err(BookingError::DuplicatePendingBooking)));

    let contested = bookings
        .create_booking(rival, h.listing_id, april(12), april(15), dec!(20))
        .await;
    assert!(matches!(
        contested,
        Err(BookingError::DatesHeld {
            remaining_minutes: Some(15)
        })
    ));

    // Inclusive boundaries: checking in on the previous check-out day conflicts.
    let touching = bookings
        .create_booking(rival, h.listing_id, april(13), april(15), dec!(20))
        .await;
    assert!(matches!(touching, Err(BookingError::DatesHeld { .. })));

    bookings
        .create_booking(rival, h.listing_id, april(20), april(22), dec!(20))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_verify_payment_confirms_booking() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    let created = h
        .bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();

    let outcome = h
        .bookings()
        .verify_payment(created.booking.id, guest, Some(created.reference.clone()))
        .await
        .unwrap();

    let VerifyOutcome::Confirmed { booking } = outcome else {
        panic!("expected confirmation, got {outcome:?}");
    };
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_ref.as_deref(), Some(created.reference.as_str()));
    assert_eq!(booking.hold_id, None);
    assert!(h.store.holds(h.listing_id).await.unwrap().is_empty());
    assert!(h.window_blocked().await);

    let payment = h.store.payment(&created.reference).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Confirmed);
    assert!(h.notifier.sent().contains(&Notification::BookingConfirmed {
        booking_id: booking.id,
        user_id: guest,
        reference: created.reference.clone(),
    }));

    // The whole window is now blocked for anyone else.
    let rival = h.add_guest().await;
    let later = h
        .bookings()
        .create_booking(rival, h.listing_id, april(20), april(22), dec!(20))
        .await;
    assert!(matches!(
        later,
        Err(BookingError::DatesHeld {
            remaining_minutes: None
        })
    ));
}

#[tokio::test]
async fn test_confirmation_is_idempotent() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    let created = h
        .bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();
    let reconciliation = h.reconciliation();

    let first = reconciliation
        .confirm_payment(&created.reference, Some("txn-1".to_string()))
        .await
        .unwrap();
    let second = reconciliation
        .confirm_payment(&created.reference, Some("txn-1".to_string()))
        .await
        .unwrap();

    assert_eq!(first, Reconciled::Applied);
    assert_eq!(second, Reconciled::AlreadyProcessed);
    let confirmations = h
        .notifier
        .sent()
        .into_iter()
        .filter(|n| matches!(n, Notification::BookingConfirmed { .. }))
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn test_verify_reuses_recent_intent_then_reissues() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    let created = h
        .bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();
    h.gateway.set_payments_succeed(false);

    let outcome = h
        .bookings()
        .verify_payment(created.booking.id, guest, Some(created.reference.clone()))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        VerifyOutcome::AwaitingPayment {
            reference: created.reference.clone(),
            authorization_url: created.authorization_url.clone(),
            reused: true,
        }
    );

    h.clock.advance(chrono::Duration::minutes(31));
    let outcome = h
        .bookings()
        .verify_payment(created.booking.id, guest, None)
        .await
        .unwrap();
    let VerifyOutcome::AwaitingPayment {
        reference, reused, ..
    } = outcome
    else {
        panic!("expected a new payment link");
    };
    assert!(!reused);
    assert_ne!(reference, created.reference);
    assert!(reference.starts_with(&created.reference));
    assert_eq!(h.gateway.initialized_count(), 2);
}

#[tokio::test]
async fn test_gateway_failure_leaves_no_rows() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    h.gateway.fail_initialize(true);

    let result = h
        .bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await;

    assert!(matches!(result, Err(BookingError::Gateway(_))));
    assert!(h.store.holds(h.listing_id).await.unwrap().is_empty());
    assert!(h.store.bookings_for_user(guest).await.unwrap().is_empty());
    assert!(
        h.store
            .due_expiries(april(30))
            .await
            .unwrap()
            .is_empty()
    );

    h.gateway.fail_initialize(false);
    h.bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_guest_cancels_confirmed_booking_and_window_reopens() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    let created = h
        .bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();
    h.reconciliation()
        .confirm_payment(&created.reference, None)
        .await
        .unwrap();
    assert!(h.window_blocked().await);

    let deleted = h
        .bookings()
        .delete_booking(created.booking.id, guest)
        .await
        .unwrap();
    assert_eq!(deleted.status, BookingStatus::Cancelled);
    assert!(deleted.deleted_at.is_some());
    assert!(!h.window_blocked().await);
    assert!(h.bookings().user_bookings(guest).await.unwrap().is_empty());

    let rival = h.add_guest().await;
    h.bookings()
        .create_booking(rival, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_window_stays_blocked_while_another_stay_is_confirmed() {
    let h = Harness::new().await;
    let first = h.add_guest().await;
    let second = h.add_guest().await;

    let a = h
        .bookings()
        .create_booking(first, h.listing_id, april(2), april(4), dec!(10))
        .await
        .unwrap();
    let b = h
        .bookings()
        .create_booking(second, h.listing_id, april(20), april(22), dec!(10))
        .await
        .unwrap();
    let reconciliation = h.reconciliation();
    reconciliation.confirm_payment(&a.reference, None).await.unwrap();
    // The window is already blocked; the second stay still settles.
    reconciliation.confirm_payment(&b.reference, None).await.unwrap();

    h.bookings().delete_booking(a.booking.id, first).await.unwrap();
    assert!(h.window_blocked().await);

    h.bookings().delete_booking(b.booking.id, second).await.unwrap();
    assert!(!h.window_blocked().await);
}

#[tokio::test]
async fn test_cancelling_pending_booking_frees_dates_for_others() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    let rival = h.add_guest().await;
    let created = h
        .bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();
    assert_eq!(created.booking.status, BookingStatus::Pending);

    let cancelled = h
        .bookings()
        .delete_booking(created.booking.id, guest)
        .await
        .unwrap();

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.hold_id, None);
    assert!(h.store.holds(h.listing_id).await.unwrap().is_empty());
    assert!(
        h.store
            .due_expiries(april(30))
            .await
            .unwrap()
            .is_empty()
    );
    assert!(!h.window_blocked().await);

    let rebooked = h
        .bookings()
        .create_booking(rival, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();
    assert_eq!(rebooked.booking.status, BookingStatus::Pending);
    let holds = h.store.holds(h.listing_id).await.unwrap();
    assert_eq!(holds.len(), 1);
    assert_eq!(holds[0].booking_id, rebooked.booking.id);
}

#[tokio::test]
async fn test_late_payment_after_guest_cancellation() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    let created = h
        .bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();
    h.bookings()
        .delete_booking(created.booking.id, guest)
        .await
        .unwrap();

    let outcome = h
        .reconciliation()
        .confirm_payment(&created.reference, None)
        .await
        .unwrap();

    assert_eq!(outcome, Reconciled::LatePayment);
    let booking = h.store.booking(created.booking.id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Cancelled);
    assert!(!h.window_blocked().await);
    assert!(h.notifier.sent().contains(&Notification::LatePayment {
        booking_id: created.booking.id,
        reference: created.reference.clone(),
        amount: dec!(320),
    }));
}

#[tokio::test]
async fn test_update_booking_status_rules() {
    let h = Harness::new().await;
    let guest = h.add_guest().await;
    let stranger = h.add_guest().await;
    let created = h
        .bookings()
        .create_booking(guest, h.listing_id, april(10), april(13), dec!(20))
        .await
        .unwrap();
    let id = created.booking.id;
    let bookings = h.bookings();

    let forbidden = bookings
        .update_booking_status(id, "CANCELLED", Caller::User(stranger))
        .await;
    assert!(matches!(forbidden, Err(BookingError::Forbidden)));

    let bogus = bookings
        .update_booking_status(id, "ARCHIVED", Caller::System)
        .await;
    assert!(matches!(bogus, Err(BookingError::InvalidStatus(_))));

    let unchanged = bookings
        .update_booking_status(id, "PENDING", Caller::System)
        .await
        .unwrap();
    assert_eq!(unchanged.status, BookingStatus::Pending);

    let cancelled = bookings
        .update_booking_status(id, "CANCELLED", Caller::System)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    let payment = h.store.payment(&created.reference).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert!(h.notifier.sent().contains(&Notification::BookingCancelled {
        booking_id: id,
        user_id: guest,
        reason: CancelReason::AdminCancelled,
    }));

    let revived = bookings
        .update_booking_status(id, "CONFIRMED", Caller::System)
        .await;
    assert!(matches!(revived, Err(BookingError::InvalidTransition { .. })));
}
