//! Application layer: the booking orchestrator, payment reconciliation,
//! hold expiry and the supplementary points and payout flows.
//!
//! Every service works through a shared [`Context`] and mutates state only
//! inside a scope-locked [`Transaction`](crate::domain::transaction::Transaction).
//! Notifications are sent after commit and never affect committed state.

pub mod booking;
pub mod payouts;
pub mod points;
pub mod reconciliation;
pub mod sweeper;
mod transitions;

use crate::config::Config;
use crate::domain::availability::BoundaryPolicy;
use crate::domain::gateway::GatewayRegistry;
use crate::domain::notification::Notification;
use crate::domain::ports::{Clock, Notifier, StoreRef};
use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

pub use booking::{BookingService, CreatedBooking, VerifyOutcome};
pub use payouts::PayoutService;
pub use points::{PointsPurchase, PointsService};
pub use reconciliation::{ReconciliationHandler, Reconciled, WebhookAck};
pub use sweeper::{HoldSweeper, SweepReport};

/// Who is asking. Users act on their own rows; the system caller (admin
/// tooling, internal jobs) bypasses ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    User(Uuid),
    System,
}

#[derive(Debug, Clone)]
pub struct BookingPolicy {
    pub hold_duration: Duration,
    pub payment_reuse: Duration,
    pub boundary: BoundaryPolicy,
    pub currency: String,
    pub booking_redirect_url: String,
    pub points_redirect_url: String,
    pub sweep_interval: std::time::Duration,
}

impl BookingPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            hold_duration: Duration::minutes(config.booking.hold_minutes),
            payment_reuse: Duration::minutes(config.booking.payment_reuse_minutes),
            boundary: config.booking.boundary,
            currency: config.booking.currency.clone(),
            booking_redirect_url: config.booking_redirect_url(),
            points_redirect_url: config.points_redirect_url(),
            sweep_interval: config.booking.sweep_interval,
        }
    }
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Collaborators shared by every service. Cheap to clone.
#[derive(Clone)]
pub struct Context {
    pub store: StoreRef,
    pub gateways: GatewayRegistry,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub policy: BookingPolicy,
}

impl Context {
    pub fn new(
        store: StoreRef,
        gateways: GatewayRegistry,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            store,
            gateways,
            notifier,
            clock,
            policy,
        }
    }

    /// Best-effort delivery; failures are logged and swallowed.
    pub(crate) async fn dispatch(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            if let Err(e) = self.notifier.notify(notification).await {
                tracing::warn!(error = %e, "Notification delivery failed");
            }
        }
    }
}
