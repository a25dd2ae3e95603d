//! Shared test fixtures: an in-memory ledger pre-seeded with one approved
//! builder and one tracked repository, plus a scripted activity source.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    ActivityBatch, ActivityKind, BuilderStatus, GemType, PullRequestState, RawActor, RawCommit,
    RawPullRequest, RawRepo, Season,
};
use tokio::sync::Mutex;

use crate::{
    config::ScoringConfig,
    error::SourceError,
    events::{Activity, Context, RecordOutcome},
    notify::LogNotifier,
    payout::DecayCurve,
    pipeline::Pipeline,
    source::ActivitySource,
    storage::{
        ActivityKey, BuilderRecord, GemReceiptRecord, InMemoryLedger, Inserted, Ledger,
        NewPayoutEvent, NewPointsReceipt, NewScoredEvent, NftPosition, PayoutEventRecord,
        PointsReceiptRecord, RepoRecord, WeeklyStatRecord,
    },
};

#[derive(Default)]
struct Faults {
    next_scored_event: bool,
    payout_for: Option<i64>,
}

/// Ledger decorator that can be told to fail specific writes. Exercises the
/// error-isolation paths that the in-memory ledger alone never reaches.
pub struct FlakyLedger {
    inner: InMemoryLedger,
    faults: Mutex<Faults>,
}

impl FlakyLedger {
    fn new() -> Self {
        Self {
            inner: InMemoryLedger::new(),
            faults: Mutex::default(),
        }
    }

    async fn fail_next_scored_event(&self) {
        self.faults.lock().await.next_scored_event = true;
    }

    async fn fail_payout_for(&self, builder_id: i64) {
        self.faults.lock().await.payout_for = Some(builder_id);
    }
}

#[async_trait]
impl Ledger for FlakyLedger {
    async fn register_builder(&self, github_id: i64, login: &str) -> anyhow::Result<BuilderRecord> {
        self.inner.register_builder(github_id, login).await
    }

    async fn approve_builder(&self, builder_id: i64, season: &str) -> anyhow::Result<()> {
        self.inner.approve_builder(builder_id, season).await
    }

    async fn ban_builder(&self, builder_id: i64) -> anyhow::Result<()> {
        self.inner.ban_builder(builder_id).await
    }

    async fn get_builder(&self, builder_id: i64) -> anyhow::Result<Option<BuilderRecord>> {
        self.inner.get_builder(builder_id).await
    }

    async fn get_builder_by_github_id(
        &self,
        github_id: i64,
    ) -> anyhow::Result<Option<BuilderRecord>> {
        self.inner.get_builder_by_github_id(github_id).await
    }

    async fn list_approved_builders(&self) -> anyhow::Result<Vec<BuilderRecord>> {
        self.inner.list_approved_builders().await
    }

    async fn register_repo(
        &self,
        external_id: i64,
        owner: &str,
        name: &str,
    ) -> anyhow::Result<RepoRecord> {
        self.inner.register_repo(external_id, owner, name).await
    }

    async fn get_repo(&self, owner: &str, name: &str) -> anyhow::Result<Option<RepoRecord>> {
        self.inner.get_repo(owner, name).await
    }

    async fn insert_activity_event(
        &self,
        key: ActivityKey,
        created_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> anyhow::Result<Inserted> {
        self.inner
            .insert_activity_event(key, created_at, completed_at)
            .await
    }

    async fn merged_pr_event_count(
        &self,
        author_github_id: i64,
        repo_id: i64,
    ) -> anyhow::Result<u64> {
        self.inner
            .merged_pr_event_count(author_github_id, repo_id)
            .await
    }

    async fn scored_merges_in_window(
        &self,
        builder_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        self.inner
            .scored_merges_in_window(builder_id, from, to)
            .await
    }

    async fn has_scored_commit_on(
        &self,
        builder_id: i64,
        repo_id: i64,
        day: &str,
    ) -> anyhow::Result<bool> {
        self.inner
            .has_scored_commit_on(builder_id, repo_id, day)
            .await
    }

    async fn save_scored_event(&self, scored: NewScoredEvent) -> anyhow::Result<GemReceiptRecord> {
        {
            let mut faults = self.faults.lock().await;
            if faults.next_scored_event {
                faults.next_scored_event = false;
                anyhow::bail!("injected write failure");
            }
        }
        self.inner.save_scored_event(scored).await
    }

    async fn get_weekly_stat(
        &self,
        builder_id: i64,
        week: &str,
    ) -> anyhow::Result<Option<WeeklyStatRecord>> {
        self.inner.get_weekly_stat(builder_id, week).await
    }

    async fn weekly_stats_for_week(&self, week: &str) -> anyhow::Result<Vec<WeeklyStatRecord>> {
        self.inner.weekly_stats_for_week(week).await
    }

    async fn recompute_weekly_stat(&self, builder_id: i64, week: &str) -> anyhow::Result<u64> {
        self.inner.recompute_weekly_stat(builder_id, week).await
    }

    async fn add_strike(&self, builder_id: i64, created_at: DateTime<Utc>) -> anyhow::Result<u32> {
        self.inner.add_strike(builder_id, created_at).await
    }

    async fn active_strike_count(&self, builder_id: i64) -> anyhow::Result<u32> {
        self.inner.active_strike_count(builder_id).await
    }

    async fn soft_delete_strike(&self, strike_id: i64) -> anyhow::Result<()> {
        self.inner.soft_delete_strike(strike_id).await
    }

    async fn payout_exists(&self, builder_id: i64, week: &str) -> anyhow::Result<bool> {
        self.inner.payout_exists(builder_id, week).await
    }

    async fn save_payout(
        &self,
        payout: NewPayoutEvent,
        receipts: Vec<NewPointsReceipt>,
    ) -> anyhow::Result<Option<PayoutEventRecord>> {
        if self.faults.lock().await.payout_for == Some(payout.builder_id) {
            anyhow::bail!("injected write failure");
        }
        self.inner.save_payout(payout, receipts).await
    }

    async fn nft_positions(&self, builder_id: i64, season: &str) -> anyhow::Result<Vec<NftPosition>> {
        self.inner.nft_positions(builder_id, season).await
    }

    async fn set_nft_position(
        &self,
        scout_id: i64,
        builder_id: i64,
        season: &str,
        count: u64,
    ) -> anyhow::Result<()> {
        self.inner
            .set_nft_position(scout_id, builder_id, season, count)
            .await
    }

    async fn gem_receipts_for_builder(
        &self,
        builder_id: i64,
    ) -> anyhow::Result<Vec<GemReceiptRecord>> {
        self.inner.gem_receipts_for_builder(builder_id).await
    }

    async fn points_receipts_for_payout(
        &self,
        payout_event_id: i64,
    ) -> anyhow::Result<Vec<PointsReceiptRecord>> {
        self.inner.points_receipts_for_payout(payout_event_id).await
    }

    async fn payout_for_builder(
        &self,
        builder_id: i64,
        week: &str,
    ) -> anyhow::Result<Option<PayoutEventRecord>> {
        self.inner.payout_for_builder(builder_id, week).await
    }
}

#[derive(Default)]
struct MockState {
    merged: Vec<RawPullRequest>,
    batch: ActivityBatch,
    fail: bool,
}

/// Scripted stand-in for the GitHub adapter.
#[derive(Default)]
pub struct MockSource {
    state: Mutex<MockState>,
}

#[async_trait]
impl ActivitySource for MockSource {
    async fn fetch_activity(
        &self,
        _login: &str,
        _after: DateTime<Utc>,
    ) -> Result<ActivityBatch, SourceError> {
        let state = self.state.lock().await;
        if state.fail {
            return Err(SourceError::RateLimited);
        }
        Ok(state.batch.clone())
    }

    async fn recent_merged_prs(
        &self,
        _login: &str,
        owner: &str,
        name: &str,
    ) -> Result<Vec<RawPullRequest>, SourceError> {
        let state = self.state.lock().await;
        if state.fail {
            return Err(SourceError::RateLimited);
        }
        Ok(state
            .merged
            .iter()
            .filter(|pr| pr.repo.owner == owner && pr.repo.name == name)
            .cloned()
            .collect())
    }
}

pub struct Harness {
    ledger: Arc<FlakyLedger>,
    source: Arc<MockSource>,
    pub context: Context,
    pub builder: BuilderRecord,
    pub repo: RepoRecord,
    pub season: Season,
}

impl Harness {
    pub async fn new() -> Self {
        let ledger = Arc::new(FlakyLedger::new());
        let source: Arc<MockSource> = Arc::default();
        let season: Season = "2026W30".to_string();

        let registered = ledger.register_builder(42, "alice").await.unwrap();
        ledger.approve_builder(registered.id, &season).await.unwrap();
        let builder = ledger.get_builder(registered.id).await.unwrap().unwrap();
        let repo = ledger.register_repo(100, "acme", "widgets").await.unwrap();

        let context = Context {
            ledger: ledger.clone(),
            source: source.clone(),
            notifier: Arc::new(LogNotifier),
            config: ScoringConfig::default(),
        };

        Self {
            ledger,
            source,
            context,
            builder,
            repo,
            season,
        }
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    pub fn ledger_arc(&self) -> Arc<dyn Ledger> {
        self.ledger.clone()
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.ledger.clone(),
            self.source.clone(),
            Arc::new(LogNotifier),
            Arc::new(DecayCurve::default()),
            ScoringConfig::default(),
        )
    }

    pub async fn record(&self, activity: Activity) -> RecordOutcome {
        self.context.record(&activity, &self.season).await.unwrap()
    }

    pub async fn register_repo(&self, external_id: i64, owner: &str, name: &str) -> RepoRecord {
        self.ledger
            .register_repo(external_id, owner, name)
            .await
            .unwrap()
    }

    pub async fn register_approved_builder(&self, github_id: i64, login: &str) -> BuilderRecord {
        let builder = self.ledger.register_builder(github_id, login).await.unwrap();
        self.ledger
            .approve_builder(builder.id, &self.season)
            .await
            .unwrap();
        self.ledger.get_builder(builder.id).await.unwrap().unwrap()
    }

    pub async fn ban_builder(&self) {
        self.ledger.ban_builder(self.builder.id).await.unwrap();
    }

    pub async fn builder_status(&self) -> BuilderStatus {
        self.ledger
            .get_builder(self.builder.id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    pub async fn strike_count(&self) -> u32 {
        self.ledger.active_strike_count(self.builder.id).await.unwrap()
    }

    pub async fn weekly_stat(&self, week: &str) -> u64 {
        self.ledger
            .get_weekly_stat(self.builder.id, week)
            .await
            .unwrap()
            .map(|stat| stat.gems_collected)
            .unwrap_or_default()
    }

    pub async fn gem_receipts(&self) -> Vec<GemReceiptRecord> {
        self.ledger
            .gem_receipts_for_builder(self.builder.id)
            .await
            .unwrap()
    }

    pub async fn gem_receipt_count(&self) -> usize {
        self.gem_receipts().await.len()
    }

    pub async fn payout(&self, week: &str) -> Option<PayoutEventRecord> {
        self.payout_for(self.builder.id, week).await
    }

    pub async fn payout_for(&self, builder_id: i64, week: &str) -> Option<PayoutEventRecord> {
        self.ledger
            .payout_for_builder(builder_id, week)
            .await
            .unwrap()
    }

    pub async fn points_receipts(&self, payout_event_id: i64) -> Vec<PointsReceiptRecord> {
        self.ledger
            .points_receipts_for_payout(payout_event_id)
            .await
            .unwrap()
    }

    pub async fn set_nft_position(&self, scout_id: i64, count: u64) {
        self.set_nft_position_for(self.builder.id, scout_id, count)
            .await;
    }

    pub async fn set_nft_position_for(&self, builder_id: i64, scout_id: i64, count: u64) {
        self.ledger
            .set_nft_position(scout_id, builder_id, &self.season, count)
            .await
            .unwrap();
    }

    /// Writes a scored event directly, bypassing classification. Used by
    /// leaderboard and payout tests that only care about the totals.
    pub async fn seed_weekly_stat(&self, builder_id: i64, week: &str, gems: u64) {
        let key = crate::storage::ActivityKey {
            author_github_id: builder_id,
            repo_id: self.repo.id,
            external_id: format!("seed-{builder_id}-{week}-{gems}"),
            kind: ActivityKind::MergedPullRequest,
        };
        let now = Utc::now();
        let inserted = self
            .ledger
            .insert_activity_event(key, now, now)
            .await
            .unwrap();
        self.ledger
            .save_scored_event(NewScoredEvent {
                activity_event_id: inserted.record().id,
                builder_id,
                repo_id: self.repo.id,
                kind: ActivityKind::MergedPullRequest,
                gem: GemType::RegularPr,
                value: gems as u32,
                week: week.to_string(),
                day: "20260819".to_string(),
                season: self.season.clone(),
                completed_at: now,
            })
            .await
            .unwrap();
    }

    /// Makes the scripted source remember an older merged PR by the default
    /// builder in the default repo.
    pub async fn seed_external_merge(&self, number: u64) {
        let mut state = self.source.state.lock().await;
        state
            .merged
            .push(merged_pr_raw(&self.builder, &self.repo, number, Utc::now()));
    }

    pub async fn set_fetch_batch(&self, batch: ActivityBatch) {
        self.source.state.lock().await.batch = batch;
    }

    pub async fn fail_source_lookups(&self) {
        self.source.state.lock().await.fail = true;
    }

    pub async fn fail_next_scored_event(&self) {
        self.ledger.fail_next_scored_event().await;
    }

    pub async fn fail_payout_for(&self, builder_id: i64) {
        self.ledger.fail_payout_for(builder_id).await;
    }
}

fn raw_repo(repo: &RepoRecord) -> RawRepo {
    RawRepo {
        id: repo.external_id,
        owner: repo.owner.clone(),
        name: repo.name.clone(),
    }
}

fn raw_author(builder: &BuilderRecord) -> RawActor {
    RawActor {
        id: builder.github_id,
        login: builder.login.clone(),
    }
}

pub fn merged_pr_raw(
    builder: &BuilderRecord,
    repo: &RepoRecord,
    number: u64,
    merged_at: DateTime<Utc>,
) -> RawPullRequest {
    RawPullRequest {
        number,
        author: raw_author(builder),
        repo: raw_repo(repo),
        state: PullRequestState::Merged,
        created_at: merged_at - chrono::Duration::hours(2),
        merged_at: Some(merged_at),
        closed_at: Some(merged_at),
        closed_by: None,
        base_ref: "main".to_string(),
    }
}

pub fn commit_raw(
    builder: &BuilderRecord,
    repo: &RepoRecord,
    sha: &str,
    committed_at: DateTime<Utc>,
) -> RawCommit {
    RawCommit {
        sha: sha.to_string(),
        author: raw_author(builder),
        repo: raw_repo(repo),
        committed_at,
    }
}

pub fn merged_pr(
    builder: &BuilderRecord,
    repo: &RepoRecord,
    number: u64,
    merged_at: DateTime<Utc>,
) -> Activity {
    Activity::MergedPullRequest(merged_pr_raw(builder, repo, number, merged_at))
}

pub fn commit(
    builder: &BuilderRecord,
    repo: &RepoRecord,
    sha: &str,
    committed_at: DateTime<Utc>,
) -> Activity {
    Activity::Commit(commit_raw(builder, repo, sha, committed_at))
}

pub fn closed_pr(
    builder: &BuilderRecord,
    repo: &RepoRecord,
    number: u64,
    closed_by: Option<RawActor>,
    closed_at: DateTime<Utc>,
) -> Activity {
    let mut pr = merged_pr_raw(builder, repo, number, closed_at);
    pr.state = PullRequestState::Closed;
    pr.merged_at = None;
    pr.closed_at = Some(closed_at);
    pr.closed_by = closed_by;
    Activity::ClosedPullRequest(pr)
}
