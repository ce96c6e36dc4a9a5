//! Background job scheduling

pub mod sweep;

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

pub use sweep::SweepService;

/// Initialize and start the job scheduler
pub async fn start_scheduler(
    sweep_service: Arc<SweepService>,
    interval_minutes: u64,
) -> anyhow::Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let sweep = sweep_service.clone();
    let sweep_job = Job::new_repeated_async(
        Duration::from_secs(interval_minutes * 60),
        move |_uuid, _l| {
            let sweep = sweep.clone();
            Box::pin(async move {
                info!("Running reconciliation sweep");
                sweep.run().await;
            })
        },
    )?;
    scheduler.add(sweep_job).await?;

    scheduler.start().await?;

    info!(interval_minutes, "Job scheduler started");
    Ok(scheduler)
}
