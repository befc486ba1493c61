use super::Context;
use super::transitions;
use crate::domain::booking::ScheduledExpiry;
use crate::domain::ports::LockScope;
use crate::domain::transaction::Transaction;
use crate::error::Result;
use serde::Serialize;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Bookings moved PENDING -> CANCELLED.
    pub released: usize,
    /// Timer rows cleared for bookings that had already settled.
    pub cleared: usize,
    pub failed: usize,
}

/// Reverses holds whose scheduled expiry has passed.
///
/// Timers are durable rows written with the hold, so nothing is lost across
/// restarts: whatever is due is picked up on the next tick.
#[derive(Clone)]
pub struct HoldSweeper {
    ctx: Context,
}

impl HoldSweeper {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Processes every due expiry once. A failing row is logged and retried
    /// on the next pass; it does not stop the others.
    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let now = self.ctx.clock.now();
        let due = self.ctx.store.due_expiries(now).await?;
        let mut report = SweepReport::default();

        for expiry in due {
            match self.expire(&expiry).await {
                Ok(true) => report.released += 1,
                Ok(false) => report.cleared += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        booking_id = %expiry.booking_id,
                        error = %e,
                        "Hold expiry failed"
                    );
                }
            }
        }

        if report != SweepReport::default() {
            tracing::info!(
                released = report.released,
                cleared = report.cleared,
                failed = report.failed,
                "Hold sweep finished"
            );
        }
        Ok(report)
    }

    /// Returns whether a booking was released.
    async fn expire(&self, expiry: &ScheduledExpiry) -> Result<bool> {
        let now = self.ctx.clock.now();
        let mut tx =
            Transaction::begin(&self.ctx.store, LockScope::Listing(expiry.listing_id)).await?;
        let notifications =
            transitions::stage_expiry(&mut tx, expiry, self.ctx.policy.boundary, now).await?;
        tx.commit().await?;

        let released = !notifications.is_empty();
        if released {
            tracing::info!(booking_id = %expiry.booking_id, "Hold expired; booking released");
        }
        self.ctx.dispatch(notifications).await;
        Ok(released)
    }

    /// Runs `sweep_once` on the configured interval until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        let period = self.ctx.policy.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_once().await {
                    tracing::error!(error = %e, "Hold sweep pass failed");
                }
            }
        })
    }
}
