//! Batch entry points invoked by the external scheduler.
//!
//! Each run re-derives from durable state: duplicate deliveries no-op,
//! payouts refuse re-execution, so aborting between builders is safe.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{BuilderId, Season, WeekString};
use tracing::{error, info, instrument};

use crate::{
    config::ScoringConfig,
    events::{Activity, Context, RecordOutcome},
    notify::Notifier,
    payout::{DistributionEngine, RewardCurve},
    source::ActivitySource,
    storage::Ledger,
};

/// Counters for one builder's batch, for the logs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ActivityReport {
    pub scored: usize,
    pub unscored: usize,
    pub strikes: usize,
    pub duplicates: usize,
    pub ignored: usize,
    pub failed: usize,
}

pub struct Pipeline {
    context: Context,
    distribution: DistributionEngine,
}

impl Pipeline {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        source: Arc<dyn ActivitySource>,
        notifier: Arc<dyn Notifier>,
        curve: Arc<dyn RewardCurve>,
        config: ScoringConfig,
    ) -> Self {
        let context = Context {
            ledger: ledger.clone(),
            source,
            notifier,
            config: config.clone(),
        };
        let distribution = DistributionEngine::new(ledger, curve, config);
        Self {
            context,
            distribution,
        }
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Pulls one builder's activity since `since` and runs every event
    /// through record → score → aggregate, oldest first. A failure on one
    /// event is logged and the rest of the batch continues; a source
    /// failure aborts this builder only, to be retried next run.
    #[instrument(skip(self, season))]
    pub async fn process_builder_activity(
        &self,
        builder_id: BuilderId,
        since: DateTime<Utc>,
        season: &Season,
    ) -> anyhow::Result<ActivityReport> {
        let builder = self
            .context
            .ledger
            .get_builder(builder_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("unknown builder {builder_id}"))?;

        let batch = self
            .context
            .source
            .fetch_activity(&builder.login, since)
            .await?;
        info!(builder = %builder.login, items = batch.len(), "fetched activity");

        let mut report = ActivityReport::default();
        for activity in Activity::from_batch(batch) {
            match self.context.record(&activity, season).await {
                Ok(RecordOutcome::Scored(_)) => report.scored += 1,
                Ok(RecordOutcome::Unscored(_)) => report.unscored += 1,
                Ok(RecordOutcome::Struck { .. }) => report.strikes += 1,
                Ok(RecordOutcome::Duplicate) => report.duplicates += 1,
                Ok(RecordOutcome::Ignored(_)) => report.ignored += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        builder = %builder.login,
                        kind = %activity.kind(),
                        "failed to record event: {e:#}"
                    );
                }
            }
        }
        info!(builder = %builder.login, ?report, "builder batch finished");
        Ok(report)
    }

    /// Runs one builder batch per approved builder. Builders are
    /// independent; one builder's failure never aborts the others.
    #[instrument(skip(self, season))]
    pub async fn process_all_builders(
        &self,
        since: DateTime<Utc>,
        season: &Season,
    ) -> anyhow::Result<usize> {
        let builders = self.context.ledger.list_approved_builders().await?;
        let mut processed = 0;
        for builder in builders {
            match self
                .process_builder_activity(builder.id, since, season)
                .await
            {
                Ok(_) => processed += 1,
                Err(e) => {
                    error!(builder = %builder.login, "builder batch failed: {e:#}");
                }
            }
        }
        Ok(processed)
    }

    /// Week-boundary entry point. Returns the number of builders paid.
    pub async fn process_weekly_payout(
        &self,
        week: &WeekString,
        season: &Season,
    ) -> anyhow::Result<usize> {
        self.distribution.process_weekly_payout(week, season).await
    }

    // Direct per-event entry points for callers that already hold raw
    // activity (e.g. a webhook bridge).

    pub async fn record_commit(
        &self,
        commit: shared::RawCommit,
        season: &Season,
    ) -> anyhow::Result<RecordOutcome> {
        self.context.record(&Activity::Commit(commit), season).await
    }

    pub async fn record_merged_pull_request(
        &self,
        pr: shared::RawPullRequest,
        season: &Season,
    ) -> anyhow::Result<RecordOutcome> {
        self.context
            .record(&Activity::MergedPullRequest(pr), season)
            .await
    }

    pub async fn record_closed_pull_request(
        &self,
        pr: shared::RawPullRequest,
        season: &Season,
    ) -> anyhow::Result<RecordOutcome> {
        self.context
            .record(&Activity::ClosedPullRequest(pr), season)
            .await
    }
}
