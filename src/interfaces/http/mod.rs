//! JSON-over-HTTP surface for guests, internal tooling and payment
//! provider callbacks.

pub mod error;
pub mod extractors;
pub mod handlers;

use crate::application::{
    BookingService, Context, PayoutService, PointsService, ReconciliationHandler,
};
use axum::Router;
use axum::routing::{delete, get, patch, post};

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub bookings: BookingService,
    pub reconciliation: ReconciliationHandler,
    pub points: PointsService,
    pub payouts: PayoutService,
    /// Shared secret for `x-internal-token`; system calls are refused when unset.
    pub internal_token: Option<String>,
}

impl AppState {
    pub fn new(ctx: Context, internal_token: Option<String>) -> Self {
        Self {
            bookings: BookingService::new(ctx.clone()),
            reconciliation: ReconciliationHandler::new(ctx.clone()),
            points: PointsService::new(ctx.clone()),
            payouts: PayoutService::new(ctx),
            internal_token,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/bookings",
            post(handlers::create_booking).get(handlers::list_bookings),
        )
        .route("/bookings/:id", delete(handlers::delete_booking))
        .route("/bookings/:id/verify", get(handlers::verify_booking))
        .route("/bookings/:id/status", patch(handlers::update_booking_status))
        .route("/points", get(handlers::points_balance))
        .route("/points/purchase", post(handlers::purchase_points))
        .route("/points/add", post(handlers::add_points))
        .route("/payouts", post(handlers::initiate_payout))
        .route("/webhook/:provider", post(handlers::webhook))
        .with_state(state)
}
