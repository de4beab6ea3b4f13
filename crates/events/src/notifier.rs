//! Completion notification dispatcher.
//!
//! [`NotificationDispatcher`] subscribes to the event bus and, for each
//! scan/batch completion event, emails the stored recipient and then
//! nullifies the address (privacy: recipient addresses are only kept until
//! the report is delivered). Delivery runs with bounded exponential-backoff
//! retry and is strictly fire-and-forget from the state machines'
//! perspective: a delivery failure is logged and swallowed, it never
//! touches the already-committed status transition.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use accesspulse_core::types::DbId;
use accesspulse_db::repositories::{BatchRepo, ScanRepo};
use accesspulse_db::DbPool;

use crate::bus::{
    PlatformEvent, EVENT_BATCH_COMPLETED, EVENT_BATCH_FAILED, EVENT_SCAN_COMPLETED,
    EVENT_SCAN_FAILED,
};
use crate::delivery::email::EmailDelivery;

/// Retry delays between delivery attempts (5 attempts total).
const RETRY_DELAYS_SECS: [u64; 4] = [1, 2, 4, 8];

/// Background service that turns completion events into report emails.
pub struct NotificationDispatcher {
    pool: DbPool,
    email: Option<EmailDelivery>,
}

impl NotificationDispatcher {
    /// Create a dispatcher. `email` is `None` when SMTP is unconfigured,
    /// in which case events are consumed and dropped with a debug log.
    pub fn new(pool: DbPool, email: Option<EmailDelivery>) -> Self {
        Self { pool, email }
    }

    /// Run the dispatch loop until the bus closes or `cancel` fires.
    pub async fn run(
        self,
        mut receiver: broadcast::Receiver<PlatformEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Notification dispatcher shutting down");
                    break;
                }
                received = receiver.recv() => match received {
                    Ok(event) => self.handle(&event).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Notification dispatcher lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("Event bus closed, dispatcher shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Route one event. Only completion events carry notifications.
    async fn handle(&self, event: &PlatformEvent) {
        let result = match event.event_type.as_str() {
            EVENT_BATCH_COMPLETED | EVENT_BATCH_FAILED => match event.source_entity_id {
                Some(batch_id) => self.notify_batch(batch_id, event).await,
                None => Ok(()),
            },
            EVENT_SCAN_COMPLETED | EVENT_SCAN_FAILED => match event.source_entity_id {
                Some(scan_id) => self.notify_scan(scan_id, event).await,
                None => Ok(()),
            },
            _ => Ok(()),
        };

        // Downstream delivery failures never propagate anywhere: the state
        // transition that raised this event has already committed.
        if let Err(e) = result {
            tracing::error!(
                error = %e,
                event_type = %event.event_type,
                entity_id = event.source_entity_id,
                "Notification delivery failed"
            );
        }
    }

    async fn notify_batch(&self, batch_id: DbId, event: &PlatformEvent) -> Result<(), String> {
        let batch = BatchRepo::find_by_id(&self.pool, batch_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("batch {batch_id} not found"))?;

        let Some(recipient) = batch.email.clone() else {
            tracing::debug!(batch_id, "Batch has no recipient, skipping notification");
            return Ok(());
        };

        let outcome = if event.event_type == EVENT_BATCH_COMPLETED {
            "completed"
        } else {
            "finished with failures"
        };
        let subject = format!("[AccessPulse] Accessibility scan of {} {outcome}", batch.root_url);
        let body = format!(
            "Your accessibility scan of {} has {outcome}.\n\n\
             Pages scanned: {} of {}\n\
             Failed pages: {}\n\
             Total issues: {} (critical {}, serious {}, moderate {}, minor {})\n\
             Passed checks: {}\n",
            batch.root_url,
            batch.urls_scanned,
            batch.total_urls,
            batch.failed_count,
            batch.total_issues,
            batch.critical_count,
            batch.serious_count,
            batch.moderate_count,
            batch.minor_count,
            batch.passed_checks,
        );

        self.deliver_with_retry(&recipient, &subject, &body).await?;

        // Address served its purpose; forget it. A failure here is logged
        // by the caller and the address simply survives until the next
        // delivery attempt for this batch.
        BatchRepo::clear_email(&self.pool, batch_id)
            .await
            .map_err(|e| format!("failed to clear batch email: {e}"))
    }

    async fn notify_scan(&self, scan_id: DbId, event: &PlatformEvent) -> Result<(), String> {
        let scan = ScanRepo::find_by_id(&self.pool, scan_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("scan {scan_id} not found"))?;

        // Batch members are reported through their batch's notification.
        if scan.batch_id.is_some() {
            return Ok(());
        }
        let Some(recipient) = scan.email.clone() else {
            return Ok(());
        };

        let (subject, body) = if event.event_type == EVENT_SCAN_COMPLETED {
            (
                format!("[AccessPulse] Scan of {} completed", scan.url),
                format!("Your accessibility scan of {} completed.\n", scan.url),
            )
        } else {
            (
                format!("[AccessPulse] Scan of {} failed", scan.url),
                format!(
                    "Your accessibility scan of {} failed: {}\n",
                    scan.url,
                    scan.error_message.as_deref().unwrap_or("unknown error"),
                ),
            )
        };

        self.deliver_with_retry(&recipient, &subject, &body).await?;

        ScanRepo::clear_email(&self.pool, scan_id)
            .await
            .map_err(|e| format!("failed to clear scan email: {e}"))
    }

    /// Deliver with exponential backoff: 5 attempts over 1+2+4+8 seconds.
    async fn deliver_with_retry(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), String> {
        let Some(email) = &self.email else {
            tracing::debug!(to, subject, "SMTP not configured, dropping notification");
            return Ok(());
        };

        let mut last_err = String::new();
        for (attempt, delay_secs) in std::iter::once(&0u64)
            .chain(RETRY_DELAYS_SECS.iter())
            .enumerate()
        {
            if *delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }
            match email.deliver(to, subject, body).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_err = e.to_string();
                    tracing::warn!(
                        attempt = attempt + 1,
                        error = %last_err,
                        "Email delivery attempt failed"
                    );
                }
            }
        }
        Err(format!(
            "delivery failed after {} attempts: {last_err}",
            RETRY_DELAYS_SECS.len() + 1
        ))
    }
}
