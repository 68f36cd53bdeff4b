//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! Currently a single maintenance job: deleting one-time codes that are
//! expired, consumed or superseded so the table stays small.

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::kernel::ServerDeps;

/// Default schedule for the code purge (every 15 minutes).
pub const DEFAULT_OTP_PURGE_CRON: &str = "0 */15 * * * *";

/// Start all scheduled tasks
pub async fn start_scheduler(deps: ServerDeps, otp_purge_cron: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let purge_deps = deps.clone();
    let purge_job = Job::new_async(otp_purge_cron, move |_uuid, _lock| {
        let deps = purge_deps.clone();
        Box::pin(async move {
            run_otp_purge(&deps).await;
        })
    })?;

    scheduler.add(purge_job).await?;
    scheduler.start().await?;

    tracing::info!(schedule = otp_purge_cron, "Scheduled tasks started (one-time code purge)");
    Ok(scheduler)
}

/// Delete unusable one-time codes.
pub async fn run_otp_purge(deps: &ServerDeps) {
    match deps.gateway.otp().purge_expired().await {
        Ok(0) => tracing::debug!("No one-time codes to purge"),
        Ok(purged) => tracing::info!(purged, "Purged unusable one-time codes"),
        Err(e) => tracing::error!(error = %e, "One-time code purge failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::identity::{Identity, IdentityStore, NewIdentity};
    use crate::domains::otp::OtpPurpose;
    use crate::kernel::{BaseClock, TestDependencies};
    use chrono::Duration;

    #[tokio::test]
    async fn test_purge_removes_expired_codes() {
        let test_deps = TestDependencies::new();
        let store = test_deps.store.clone();
        let clock = test_deps.clock.clone();
        let deps = test_deps.into_server_deps();

        let identity = Identity::new(
            NewIdentity {
                phone_number: "+15550001111".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Obi".to_string(),
                email: None,
            },
            clock.now(),
        );
        store.insert_identity(&identity).await.unwrap();
        deps.gateway
            .otp()
            .issue(&identity, OtpPurpose::Login)
            .await
            .unwrap();

        clock.advance(Duration::seconds(601));
        run_otp_purge(&deps).await;

        assert!(store.codes_for(identity.id).unwrap().is_empty());
    }
}
