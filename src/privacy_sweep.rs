//! Hourly privacy sweep using apalis
//!
//! Runs as a scheduled cron job that flips every video whose view limit has
//! been reached or whose `auto_private_after` has passed to private. This is
//! the batch form of `ViewLimitPolicy`; per-view checks happen in the
//! counter service.

use anyhow::{Context, anyhow};
use apalis::prelude::*;
use apalis_cron::{CronStream, Schedule};
use apalis_sql::postgres::PostgresStorage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::str::FromStr;

use crate::domain::videos;

/// Job input - marker carrying the tick time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacySweepJob {
    pub scheduled_at: DateTime<Utc>,
}

impl From<DateTime<Utc>> for PrivacySweepJob {
    fn from(dt: DateTime<Utc>) -> Self {
        PrivacySweepJob { scheduled_at: dt }
    }
}

/// Shared context for the sweep
#[derive(Clone)]
pub struct PrivacySweepContext {
    pub pool: PgPool,
    pub default_view_limit: Option<i64>,
}

/// Job handler. Always returns Ok; a failed batch is logged and the next
/// tick picks up the same rows.
async fn process_privacy_sweep(
    job: PrivacySweepJob,
    ctx: Data<PrivacySweepContext>,
) -> Result<(), Error> {
    match videos::make_due_videos_private(&ctx.pool, ctx.default_view_limit, Utc::now()).await {
        Ok(ids) if ids.is_empty() => {
            tracing::debug!(scheduled_at = %job.scheduled_at, "privacy sweep: nothing due");
        }
        Ok(ids) => {
            tracing::info!(count = ids.len(), video_ids = ?ids, "privacy sweep made videos private");
        }
        Err(e) => {
            tracing::error!(error = %e, "privacy sweep failed (will retry next tick)");
        }
    }
    Ok(())
}

/// Start the privacy sweep worker
pub async fn run_privacy_sweep_worker(
    pool: PgPool,
    default_view_limit: Option<i64>,
    schedule_expr: String,
) -> anyhow::Result<()> {
    let ctx = PrivacySweepContext {
        pool: pool.clone(),
        default_view_limit,
    };

    // Run apalis migrations
    PostgresStorage::setup(&pool)
        .await
        .context("Failed to set up apalis storage")?;

    let storage: PostgresStorage<PrivacySweepJob> = PostgresStorage::new(pool);
    let schedule = Schedule::from_str(&schedule_expr)
        .map_err(|e| anyhow!("Invalid privacy sweep schedule {:?}: {}", schedule_expr, e))?;
    let backend = CronStream::new(schedule).pipe_to_storage(storage);

    tracing::info!(schedule = %schedule_expr, "privacy sweep worker starting");

    let worker = WorkerBuilder::new("privacy-sweep")
        .data(ctx)
        .backend(backend)
        .build_fn(process_privacy_sweep);

    Monitor::new()
        .register(worker)
        .run()
        .await
        .map_err(|e| anyhow!("Privacy sweep monitor failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_is_hourly() {
        let schedule = Schedule::from_str("0 0 * * * *").unwrap();
        let mut upcoming = schedule.upcoming(Utc);
        let first = upcoming.next().unwrap();
        let second = upcoming.next().unwrap();
        assert_eq!((second - first).num_minutes(), 60);
    }

    #[test]
    fn job_carries_tick_time() {
        let now = Utc::now();
        assert_eq!(PrivacySweepJob::from(now).scheduled_at, now);
    }
}
