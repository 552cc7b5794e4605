//! Cron job plumbing for the resident reconciliation worker.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::*;
use apalis_cron::Schedule;

use crate::application::reconcile::Reconciler;

/// Marker struct for the cron-triggered reconciliation job.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct ReconcileJob;

impl From<chrono::DateTime<chrono::Utc>> for ReconcileJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Context for the reconciliation job worker.
#[derive(Clone)]
pub struct ReconcileJobContext {
    pub reconciler: Arc<Reconciler>,
}

/// Process one scheduled reconciliation tick.
///
/// Failures are logged, never returned: the pass is idempotent and the next
/// tick retries everything that did not land.
pub async fn process_reconcile_job(
    _job: ReconcileJob,
    ctx: Data<ReconcileJobContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.reconciler.run_pass().await {
        Ok(outcome) if !outcome.fully_succeeded() => {
            tracing::warn!(
                failed = outcome.failed,
                ratcheted = outcome.ratcheted,
                "reconciliation tick finished with failures"
            );
        }
        Ok(_) => {}
        Err(err) => {
            tracing::warn!(error = %err, "reconciliation tick could not run");
        }
    }
    Ok(())
}

/// Parse the configured cron expression for the reconciliation cadence.
pub fn reconcile_schedule(expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(expression)
        .map_err(|err| format!("invalid cron expression `{expression}`: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_parses() {
        let schedule = reconcile_schedule("0 */5 * * * *").expect("valid cron expression");
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(3).collect();
        assert_eq!(upcoming.len(), 3);
    }

    #[test]
    fn garbage_schedule_is_rejected() {
        assert!(reconcile_schedule("every now and then").is_err());
    }
}
