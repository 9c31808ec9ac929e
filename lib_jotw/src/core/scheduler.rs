//! # Weekly Scheduler
//!
//! Fires [`PollCycleController::run_cycle`] on a cron expression (six fields,
//! seconds first) in a fixed timezone. A fire missed while the process was
//! down is not caught up: that week is simply skipped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio_cron_scheduler::{JobBuilder, JobScheduler, JobSchedulerError};
use tracing::{info, warn};
use uuid::Uuid;

use super::poll_cycle::PollCycleController;

/// Friday at 15:00.
pub const DEFAULT_CRON: &str = "0 0 15 * * Fri";

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid cron expression {expression:?}: {source}")]
    InvalidSchedule {
        expression: String,
        #[source]
        source: JobSchedulerError,
    },

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

pub struct PollScheduler {
    scheduler: JobScheduler,
    job_id: Uuid,
    expression: String,
    timezone: Tz,
}

impl PollScheduler {
    /// Registers the weekly job and starts the scheduler.
    pub async fn start(
        controller: Arc<PollCycleController>,
        expression: &str,
        timezone: Tz,
    ) -> Result<Self, SchedulerError> {
        let invalid = |source| SchedulerError::InvalidSchedule {
            expression: expression.to_string(),
            source,
        };

        let scheduler = JobScheduler::new().await?;
        let job = JobBuilder::new()
            .with_timezone(timezone)
            .with_cron_job_type()
            .with_schedule(expression)
            .map_err(invalid)?
            .with_run_async(Box::new(move |uuid, mut l| {
                let controller = Arc::clone(&controller);
                Box::pin(async move {
                    info!(job = %uuid, "Weekly poll trigger fired");
                    let report = controller.run_cycle().await;
                    info!(
                        communities = report.outcomes.len(),
                        announced = report.announced(),
                        failed = report.failed(),
                        "Scheduled cycle complete"
                    );
                    match l.next_tick_for_job(uuid).await {
                        Ok(Some(ts)) => info!(next = %ts, "Next poll cycle scheduled"),
                        _ => warn!("Could not get next tick for the poll job"),
                    }
                })
            }))
            .build()
            .map_err(invalid)?;

        let job_id = scheduler.add(job).await?;
        scheduler.start().await?;
        info!(cron = %expression, timezone = %timezone.name(), "Poll scheduler started");

        Ok(Self {
            scheduler,
            job_id,
            expression: expression.to_string(),
            timezone,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// When the next cycle will fire, in UTC.
    pub async fn next_fire(&mut self) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        Ok(self.scheduler.next_tick_for_job(self.job_id).await?)
    }

    /// Stops future fires. A cycle already running is abandoned with its task.
    pub async fn shutdown(mut self) -> Result<(), SchedulerError> {
        self.scheduler.shutdown().await?;
        info!("Poll scheduler stopped");
        Ok(())
    }
}
