//! The ledger port.
//!
//! Persistence technology sits behind this trait. Every method that the
//! pipeline needs to be atomic *is one method call*: find-by-natural-key
//! insert-if-absent, scored-event + gem receipt + weekly-stat increment,
//! payout event + its points receipts. An implementation provides the
//! atomicity however it likes (one mutex here, one SQL transaction in a
//! database adapter); callers never see a half-applied write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{
    ActivityKind, BuilderId, BuilderStatus, DayString, GemType, GithubHandle, RepoId, ScoutId,
    Season, WeekString,
};

pub mod memory;

pub use memory::InMemoryLedger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderRecord {
    pub id: BuilderId,
    pub github_id: i64,
    pub login: GithubHandle,
    pub status: BuilderStatus,
    pub approved_season: Option<Season>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRecord {
    pub id: RepoId,
    pub external_id: i64,
    pub owner: String,
    pub name: String,
}

/// Natural key of one externally observed unit of work. At most one
/// activity event ever exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivityKey {
    pub author_github_id: i64,
    pub repo_id: RepoId,
    pub external_id: String,
    pub kind: ActivityKind,
}

#[derive(Debug, Clone)]
pub struct ActivityEventRecord {
    pub id: i64,
    pub key: ActivityKey,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of the find-or-insert primitive.
#[derive(Debug, Clone)]
pub enum Inserted {
    Fresh(ActivityEventRecord),
    Existing(ActivityEventRecord),
}

impl Inserted {
    pub fn record(&self) -> &ActivityEventRecord {
        match self {
            Inserted::Fresh(record) | Inserted::Existing(record) => record,
        }
    }

    pub fn is_fresh(&self) -> bool {
        matches!(self, Inserted::Fresh(_))
    }
}

#[derive(Debug, Clone)]
pub struct NewScoredEvent {
    pub activity_event_id: i64,
    pub builder_id: BuilderId,
    pub repo_id: RepoId,
    pub kind: ActivityKind,
    pub gem: GemType,
    pub value: u32,
    pub week: WeekString,
    pub day: DayString,
    pub season: Season,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ScoredEventRecord {
    pub id: i64,
    pub activity_event_id: i64,
    pub builder_id: BuilderId,
    pub repo_id: RepoId,
    pub kind: ActivityKind,
    pub week: WeekString,
    pub day: DayString,
    pub season: Season,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GemReceiptRecord {
    pub id: i64,
    pub scored_event_id: i64,
    pub gem: GemType,
    pub value: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyStatRecord {
    pub builder_id: BuilderId,
    pub week: WeekString,
    pub gems_collected: u64,
}

#[derive(Debug, Clone)]
pub struct StrikeRecord {
    pub id: i64,
    pub builder_id: BuilderId,
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct NewPayoutEvent {
    pub builder_id: BuilderId,
    pub week: WeekString,
    pub season: Season,
    pub gems_collected: u64,
    pub earnable_points: u64,
}

#[derive(Debug, Clone)]
pub struct PayoutEventRecord {
    pub id: i64,
    pub builder_id: BuilderId,
    pub week: WeekString,
    pub season: Season,
    pub gems_collected: u64,
    pub earnable_points: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recipient {
    Builder(BuilderId),
    Scout(ScoutId),
}

#[derive(Debug, Clone)]
pub struct NewPointsReceipt {
    pub recipient: Recipient,
    pub value: u64,
}

#[derive(Debug, Clone)]
pub struct PointsReceiptRecord {
    pub id: i64,
    pub payout_event_id: i64,
    pub recipient: Recipient,
    pub value: u64,
}

/// Ownership tokens a scout holds in a builder for a season. Maintained by
/// the external minting subsystem; read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftPosition {
    pub scout_id: ScoutId,
    pub builder_id: BuilderId,
    pub season: Season,
    pub count: u64,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    // Builders and repositories.
    async fn register_builder(
        &self,
        github_id: i64,
        login: &str,
    ) -> anyhow::Result<BuilderRecord>;
    async fn approve_builder(&self, builder_id: BuilderId, season: &str) -> anyhow::Result<()>;
    async fn ban_builder(&self, builder_id: BuilderId) -> anyhow::Result<()>;
    async fn get_builder(&self, builder_id: BuilderId) -> anyhow::Result<Option<BuilderRecord>>;
    async fn get_builder_by_github_id(
        &self,
        github_id: i64,
    ) -> anyhow::Result<Option<BuilderRecord>>;
    async fn list_approved_builders(&self) -> anyhow::Result<Vec<BuilderRecord>>;
    async fn register_repo(
        &self,
        external_id: i64,
        owner: &str,
        name: &str,
    ) -> anyhow::Result<RepoRecord>;
    async fn get_repo(&self, owner: &str, name: &str) -> anyhow::Result<Option<RepoRecord>>;

    // Event recording. Insert-if-absent on the natural key; a duplicate
    // delivery returns the existing row untouched.
    async fn insert_activity_event(
        &self,
        key: ActivityKey,
        created_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> anyhow::Result<Inserted>;

    /// Count of merged-PR activity events by this author in this repo,
    /// including any just-inserted one.
    async fn merged_pr_event_count(
        &self,
        author_github_id: i64,
        repo_id: RepoId,
    ) -> anyhow::Result<u64>;

    /// Scored merge events for a builder with completion time in
    /// `(from, to]`. Drives the streak tally.
    async fn scored_merges_in_window(
        &self,
        builder_id: BuilderId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<u64>;

    async fn has_scored_commit_on(
        &self,
        builder_id: BuilderId,
        repo_id: RepoId,
        day: &str,
    ) -> anyhow::Result<bool>;

    /// Insert the scored event, its gem receipt and the weekly-stat
    /// increment as one atomic write.
    async fn save_scored_event(
        &self,
        scored: NewScoredEvent,
    ) -> anyhow::Result<GemReceiptRecord>;

    async fn get_weekly_stat(
        &self,
        builder_id: BuilderId,
        week: &str,
    ) -> anyhow::Result<Option<WeeklyStatRecord>>;
    async fn weekly_stats_for_week(&self, week: &str) -> anyhow::Result<Vec<WeeklyStatRecord>>;

    /// Repair operation: re-derive a weekly stat from the gem receipts in
    /// that week and overwrite the incremental counter. Returns the
    /// reconciled value. Not part of the write path.
    async fn recompute_weekly_stat(
        &self,
        builder_id: BuilderId,
        week: &str,
    ) -> anyhow::Result<u64>;

    // Moderation.
    async fn add_strike(
        &self,
        builder_id: BuilderId,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<u32>;
    async fn active_strike_count(&self, builder_id: BuilderId) -> anyhow::Result<u32>;
    async fn soft_delete_strike(&self, strike_id: i64) -> anyhow::Result<()>;

    // Distribution.
    async fn payout_exists(&self, builder_id: BuilderId, week: &str) -> anyhow::Result<bool>;

    /// Insert the payout event and all of its points receipts atomically.
    /// Returns `None` without writing anything when a payout for
    /// `(builder, week)` already exists, so concurrent duplicate runs
    /// self-resolve.
    async fn save_payout(
        &self,
        payout: NewPayoutEvent,
        receipts: Vec<NewPointsReceipt>,
    ) -> anyhow::Result<Option<PayoutEventRecord>>;

    async fn nft_positions(
        &self,
        builder_id: BuilderId,
        season: &str,
    ) -> anyhow::Result<Vec<NftPosition>>;

    /// Mirror of the external minting subsystem's state; the pipeline only
    /// ever reads positions back.
    async fn set_nft_position(
        &self,
        scout_id: ScoutId,
        builder_id: BuilderId,
        season: &str,
        count: u64,
    ) -> anyhow::Result<()>;

    // Introspection used by reconciliation and tests.
    async fn gem_receipts_for_builder(
        &self,
        builder_id: BuilderId,
    ) -> anyhow::Result<Vec<GemReceiptRecord>>;
    async fn points_receipts_for_payout(
        &self,
        payout_event_id: i64,
    ) -> anyhow::Result<Vec<PointsReceiptRecord>>;
    async fn payout_for_builder(
        &self,
        builder_id: BuilderId,
        week: &str,
    ) -> anyhow::Result<Option<PayoutEventRecord>>;
}
