//! Scheduled settlement of Pending gifts

use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use super::model::{GiftStatus, SettlementOutcome};
use super::service::GiftService;
use crate::error::GiftError;

const SWEEP_BATCH: i64 = 100;

#[derive(Debug, Serialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Settle Pending gifts one at a time, oldest first.
pub async fn settle_pending_gifts(
    service: &GiftService,
    batch: i64,
) -> Result<SweepSummary, GiftError> {
    let pending = service
        .store
        .gifts_with_status(GiftStatus::Pending, batch)
        .await?;
    let mut summary = SweepSummary::default();

    for gift in pending {
        summary.processed += 1;
        match service.process_gift(gift.id).await {
            Ok(SettlementOutcome::Sent { .. }) => summary.sent += 1,
            Ok(SettlementOutcome::Failed { .. }) => summary.failed += 1,
            Ok(SettlementOutcome::Skipped { .. }) => summary.skipped += 1,
            Err(e) => {
                tracing::warn!(gift_id = %gift.id, error = %e, "Settlement attempt errored");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

/// Run [`settle_pending_gifts`] on a cron schedule.
pub async fn start_pending_sweep(
    service: GiftService,
    cron_expr: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron_expr, move |_id, _lock| {
        let service = service.clone();
        Box::pin(async move {
            match settle_pending_gifts(&service, SWEEP_BATCH).await {
                Ok(summary) if summary.processed > 0 => tracing::info!(
                    processed = summary.processed,
                    sent = summary.sent,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    "Pending gift sweep finished"
                ),
                Ok(_) => tracing::debug!("Pending gift sweep found nothing to do"),
                Err(e) => tracing::error!(error = %e, "Pending gift sweep failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(cron = %cron_expr, "Pending gift sweep scheduled");
    Ok(scheduler)
}
