use crate::domain::notification::Notification;
use crate::domain::ports::Notifier;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Mutex;

/// Emits every notification as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        match &notification {
            Notification::BookingConfirmed {
                booking_id,
                user_id,
                reference,
            } => tracing::info!(%booking_id, %user_id, %reference, "Booking confirmed"),
            Notification::BookingCancelled {
                booking_id,
                user_id,
                reason,
            } => tracing::info!(%booking_id, %user_id, reason = reason.as_str(), "Booking cancelled"),
            Notification::PaymentFailed { reference, user_id } => {
                tracing::info!(%reference, %user_id, "Payment failed")
            }
            Notification::LatePayment {
                booking_id,
                reference,
                amount,
            } => tracing::warn!(
                %booking_id,
                %reference,
                %amount,
                "Payment confirmed for a cancelled booking; refund required"
            ),
            Notification::PointsCredited { user_id, points } => {
                tracing::info!(%user_id, points, "Points credited")
            }
            Notification::PayoutSettled {
                vendor_id,
                reference,
                succeeded,
            } => tracing::info!(%vendor_id, %reference, succeeded, "Payout settled"),
        }
        Ok(())
    }
}

/// Keeps notifications in memory; handy for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) -> Result<()> {
        match self.sent.lock() {
            Ok(mut sent) => sent.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        let user_id = Uuid::new_v4();
        notifier
            .notify(Notification::PointsCredited { user_id, points: 3 })
            .await
            .unwrap();
        notifier
            .notify(Notification::PaymentFailed {
                reference: "POINTS-1".to_string(),
                user_id,
            })
            .await
            .unwrap();
        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[0], Notification::PointsCredited { points: 3, .. }));
        assert!(LogNotifier.notify(sent[1].clone()).await.is_ok());
    }
}
