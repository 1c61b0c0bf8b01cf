// src/services/notification.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
pub enum Notification {
    BillPaid {
        bill_id: i64,
        user_id: i64,
        amount: Decimal,
    },
    SubscriptionActivated {
        society_id: i64,
        email: String,
        valid_until: DateTime<Utc>,
    },
}

/// Outbound notification sink (email, push...). Failures never reach the request.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: Notification) -> anyhow::Result<()> {
        match notification {
            Notification::BillPaid {
                bill_id,
                user_id,
                amount,
            } => tracing::info!(bill_id, user_id, %amount, "notify: bill paid"),
            Notification::SubscriptionActivated {
                society_id,
                email,
                valid_until,
            } => tracing::info!(society_id, %email, %valid_until, "notify: subscription active"),
        }
        Ok(())
    }
}

/// Fire and forget.
pub fn dispatch(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(notification).await {
            tracing::warn!(error = %e, "notification delivery failed");
        }
    });
}
