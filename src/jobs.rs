use std::sync::Arc;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

use crate::errors::GateError;
use crate::session::SessionStore;

/// Every 15 minutes, on the minute.
const PURGE_SESSIONS_SCHEDULE: &str = "0 */15 * * * *";

/// Initialize and start the job scheduler with all background tasks
pub async fn init_scheduler(sessions: Arc<SessionStore>) -> Result<JobScheduler, GateError> {
    let sched = JobScheduler::new()
        .await
        .map_err(|e| GateError::Other(format!("Failed to create job scheduler: {}", e)))?;

    let purge_sessions_job = Job::new(PURGE_SESSIONS_SCHEDULE, move |_uuid, _l| {
        let purged = sessions.purge_expired();
        if purged > 0 {
            info!("Purged {} expired sessions", purged);
        } else {
            debug!("No expired sessions to purge");
        }
    })
    .map_err(|e| GateError::Other(format!("Failed to create purge sessions job: {}", e)))?;

    sched
        .add(purge_sessions_job)
        .await
        .map_err(|e| GateError::Other(format!("Failed to add purge sessions job: {}", e)))?;

    sched
        .start()
        .await
        .map_err(|e| GateError::Other(format!("Failed to start job scheduler: {}", e)))?;

    info!("Job scheduler started");

    Ok(sched)
}
