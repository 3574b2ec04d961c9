//! Fire-and-forget delay notification contracts.
//!
//! Both senders run after the delay state change has committed; the caller
//! logs failures and never rolls the state change back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;

/// In-app vendor notification.
#[async_trait]
pub trait DelayNotifier: Send + Sync {
    async fn notify_delay(
        &self,
        vendor_id: Uuid,
        order_number: &str,
        revised_eta: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), ServiceError>;
}

/// Outbound delay email.
#[async_trait]
pub trait DelayEmailSender: Send + Sync {
    async fn send_delay_email(
        &self,
        order_number: &str,
        eta_text: &str,
        reason: &str,
    ) -> Result<(), ServiceError>;
}

/// Default sender that records the notification in the structured log.
/// Stands in wherever a real delivery channel is not wired up.
#[derive(Clone, Debug, Default)]
pub struct LoggingDelaySender;

#[async_trait]
impl DelayNotifier for LoggingDelaySender {
    async fn notify_delay(
        &self,
        vendor_id: Uuid,
        order_number: &str,
        revised_eta: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), ServiceError> {
        info!(
            vendor_id = %vendor_id,
            order_number = %order_number,
            revised_eta = %revised_eta,
            reason = %reason,
            "Delay notification"
        );
        Ok(())
    }
}

#[async_trait]
impl DelayEmailSender for LoggingDelaySender {
    async fn send_delay_email(
        &self,
        order_number: &str,
        eta_text: &str,
        reason: &str,
    ) -> Result<(), ServiceError> {
        info!(
            order_number = %order_number,
            eta = %eta_text,
            reason = %reason,
            "Delay email"
        );
        Ok(())
    }
}
