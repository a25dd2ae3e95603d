//! In-memory ledger adapter.
//!
//! One mutex over the whole state stands in for the transaction boundary a
//! database adapter would use: every trait method takes the lock exactly
//! once, so each call is atomic with respect to every other call.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::{ActivityKind, BuilderId, BuilderStatus, ScoutId, WeekString};
use tokio::sync::Mutex;

use super::{
    ActivityEventRecord, ActivityKey, BuilderRecord, GemReceiptRecord, Inserted, Ledger,
    NewPayoutEvent, NewPointsReceipt, NewScoredEvent, NftPosition, PayoutEventRecord,
    PointsReceiptRecord, RepoRecord, ScoredEventRecord, StrikeRecord, WeeklyStatRecord,
};

#[derive(Default)]
struct State {
    next_id: i64,
    builders: Vec<BuilderRecord>,
    repos: Vec<RepoRecord>,
    events: Vec<ActivityEventRecord>,
    event_index: HashMap<ActivityKey, usize>,
    scored: Vec<ScoredEventRecord>,
    receipts: Vec<GemReceiptRecord>,
    weekly: HashMap<(BuilderId, WeekString), u64>,
    strikes: Vec<StrikeRecord>,
    payouts: Vec<PayoutEventRecord>,
    points: Vec<PointsReceiptRecord>,
    positions: Vec<NftPosition>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<State>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn register_builder(&self, github_id: i64, login: &str) -> anyhow::Result<BuilderRecord> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.builders.iter().find(|b| b.github_id == github_id) {
            return Ok(existing.clone());
        }
        let record = BuilderRecord {
            id: state.next_id(),
            github_id,
            login: login.to_string(),
            status: BuilderStatus::Applied,
            approved_season: None,
        };
        state.builders.push(record.clone());
        Ok(record)
    }

    async fn approve_builder(&self, builder_id: BuilderId, season: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let builder = state
            .builders
            .iter_mut()
            .find(|b| b.id == builder_id)
            .ok_or_else(|| anyhow::anyhow!("unknown builder {builder_id}"))?;
        // A ban is terminal; approval never resurrects a banned builder.
        if builder.status == BuilderStatus::Banned {
            anyhow::bail!("builder {builder_id} is banned");
        }
        builder.status = BuilderStatus::Approved;
        builder.approved_season = Some(season.to_string());
        Ok(())
    }

    async fn ban_builder(&self, builder_id: BuilderId) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        let builder = state
            .builders
            .iter_mut()
            .find(|b| b.id == builder_id)
            .ok_or_else(|| anyhow::anyhow!("unknown builder {builder_id}"))?;
        builder.status = BuilderStatus::Banned;
        Ok(())
    }

    async fn get_builder(&self, builder_id: BuilderId) -> anyhow::Result<Option<BuilderRecord>> {
        let state = self.state.lock().await;
        Ok(state.builders.iter().find(|b| b.id == builder_id).cloned())
    }

    async fn get_builder_by_github_id(
        &self,
        github_id: i64,
    ) -> anyhow::Result<Option<BuilderRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .builders
            .iter()
            .find(|b| b.github_id == github_id)
            .cloned())
    }

    async fn list_approved_builders(&self) -> anyhow::Result<Vec<BuilderRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .builders
            .iter()
            .filter(|b| b.status == BuilderStatus::Approved)
            .cloned()
            .collect())
    }

    async fn register_repo(
        &self,
        external_id: i64,
        owner: &str,
        name: &str,
    ) -> anyhow::Result<RepoRecord> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state
            .repos
            .iter()
            .find(|r| r.owner == owner && r.name == name)
        {
            return Ok(existing.clone());
        }
        let record = RepoRecord {
            id: state.next_id(),
            external_id,
            owner: owner.to_string(),
            name: name.to_string(),
        };
        state.repos.push(record.clone());
        Ok(record)
    }

    async fn get_repo(&self, owner: &str, name: &str) -> anyhow::Result<Option<RepoRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .repos
            .iter()
            .find(|r| r.owner == owner && r.name == name)
            .cloned())
    }

    async fn insert_activity_event(
        &self,
        key: ActivityKey,
        created_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> anyhow::Result<Inserted> {
        let mut state = self.state.lock().await;
        if let Some(&index) = state.event_index.get(&key) {
            return Ok(Inserted::Existing(state.events[index].clone()));
        }
        let record = ActivityEventRecord {
            id: state.next_id(),
            key: key.clone(),
            created_at,
            completed_at,
        };
        state.events.push(record.clone());
        let index = state.events.len() - 1;
        state.event_index.insert(key, index);
        Ok(Inserted::Fresh(record))
    }

    async fn merged_pr_event_count(
        &self,
        author_github_id: i64,
        repo_id: i64,
    ) -> anyhow::Result<u64> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| {
                e.key.author_github_id == author_github_id
                    && e.key.repo_id == repo_id
                    && e.key.kind == ActivityKind::MergedPullRequest
            })
            .count() as u64)
    }

    async fn scored_merges_in_window(
        &self,
        builder_id: BuilderId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let state = self.state.lock().await;
        Ok(state
            .scored
            .iter()
            .filter(|s| {
                s.builder_id == builder_id
                    && s.kind == ActivityKind::MergedPullRequest
                    && s.completed_at > from
                    && s.completed_at <= to
            })
            .count() as u64)
    }

    async fn has_scored_commit_on(
        &self,
        builder_id: BuilderId,
        repo_id: i64,
        day: &str,
    ) -> anyhow::Result<bool> {
        let state = self.state.lock().await;
        Ok(state.scored.iter().any(|s| {
            s.builder_id == builder_id
                && s.repo_id == repo_id
                && s.kind == ActivityKind::Commit
                && s.day == day
        }))
    }

    async fn save_scored_event(&self, scored: NewScoredEvent) -> anyhow::Result<GemReceiptRecord> {
        let mut state = self.state.lock().await;
        let scored_event_id = state.next_id();
        state.scored.push(ScoredEventRecord {
            id: scored_event_id,
            activity_event_id: scored.activity_event_id,
            builder_id: scored.builder_id,
            repo_id: scored.repo_id,
            kind: scored.kind,
            week: scored.week.clone(),
            day: scored.day,
            season: scored.season,
            completed_at: scored.completed_at,
        });
        let receipt = GemReceiptRecord {
            id: state.next_id(),
            scored_event_id,
            gem: scored.gem,
            value: scored.value,
        };
        state.receipts.push(receipt.clone());
        *state
            .weekly
            .entry((scored.builder_id, scored.week))
            .or_insert(0) += scored.value as u64;
        Ok(receipt)
    }

    async fn get_weekly_stat(
        &self,
        builder_id: BuilderId,
        week: &str,
    ) -> anyhow::Result<Option<WeeklyStatRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .weekly
            .get(&(builder_id, week.to_string()))
            .map(|&gems_collected| WeeklyStatRecord {
                builder_id,
                week: week.to_string(),
                gems_collected,
            }))
    }

    async fn weekly_stats_for_week(&self, week: &str) -> anyhow::Result<Vec<WeeklyStatRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .weekly
            .iter()
            .filter(|((_, w), _)| w == week)
            .map(|(&(builder_id, _), &gems_collected)| WeeklyStatRecord {
                builder_id,
                week: week.to_string(),
                gems_collected,
            })
            .collect())
    }

    async fn recompute_weekly_stat(
        &self,
        builder_id: BuilderId,
        week: &str,
    ) -> anyhow::Result<u64> {
        let mut state = self.state.lock().await;
        let total: u64 = state
            .scored
            .iter()
            .filter(|s| s.builder_id == builder_id && s.week == week)
            .map(|s| {
                state
                    .receipts
                    .iter()
                    .filter(|r| r.scored_event_id == s.id)
                    .map(|r| r.value as u64)
                    .sum::<u64>()
            })
            .sum();
        state.weekly.insert((builder_id, week.to_string()), total);
        Ok(total)
    }

    async fn add_strike(
        &self,
        builder_id: BuilderId,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<u32> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.strikes.push(StrikeRecord {
            id,
            builder_id,
            created_at,
            deleted: false,
        });
        Ok(state
            .strikes
            .iter()
            .filter(|s| s.builder_id == builder_id && !s.deleted)
            .count() as u32)
    }

    async fn active_strike_count(&self, builder_id: BuilderId) -> anyhow::Result<u32> {
        let state = self.state.lock().await;
        Ok(state
            .strikes
            .iter()
            .filter(|s| s.builder_id == builder_id && !s.deleted)
            .count() as u32)
    }

    async fn soft_delete_strike(&self, strike_id: i64) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if let Some(strike) = state.strikes.iter_mut().find(|s| s.id == strike_id) {
            strike.deleted = true;
        }
        Ok(())
    }

    async fn payout_exists(&self, builder_id: BuilderId, week: &str) -> anyhow::Result<bool> {
        let state = self.state.lock().await;
        Ok(state
            .payouts
            .iter()
            .any(|p| p.builder_id == builder_id && p.week == week))
    }

    async fn save_payout(
        &self,
        payout: NewPayoutEvent,
        receipts: Vec<NewPointsReceipt>,
    ) -> anyhow::Result<Option<PayoutEventRecord>> {
        let mut state = self.state.lock().await;
        if state
            .payouts
            .iter()
            .any(|p| p.builder_id == payout.builder_id && p.week == payout.week)
        {
            return Ok(None);
        }
        let record = PayoutEventRecord {
            id: state.next_id(),
            builder_id: payout.builder_id,
            week: payout.week,
            season: payout.season,
            gems_collected: payout.gems_collected,
            earnable_points: payout.earnable_points,
        };
        state.payouts.push(record.clone());
        for receipt in receipts {
            let id = state.next_id();
            state.points.push(PointsReceiptRecord {
                id,
                payout_event_id: record.id,
                recipient: receipt.recipient,
                value: receipt.value,
            });
        }
        Ok(Some(record))
    }

    async fn nft_positions(
        &self,
        builder_id: BuilderId,
        season: &str,
    ) -> anyhow::Result<Vec<NftPosition>> {
        let state = self.state.lock().await;
        Ok(state
            .positions
            .iter()
            .filter(|p| p.builder_id == builder_id && p.season == season && p.count > 0)
            .cloned()
            .collect())
    }

    async fn set_nft_position(
        &self,
        scout_id: ScoutId,
        builder_id: BuilderId,
        season: &str,
        count: u64,
    ) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if let Some(position) = state
            .positions
            .iter_mut()
            .find(|p| p.scout_id == scout_id && p.builder_id == builder_id && p.season == season)
        {
            position.count = count;
        } else {
            state.positions.push(NftPosition {
                scout_id,
                builder_id,
                season: season.to_string(),
                count,
            });
        }
        Ok(())
    }

    async fn gem_receipts_for_builder(
        &self,
        builder_id: BuilderId,
    ) -> anyhow::Result<Vec<GemReceiptRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .receipts
            .iter()
            .filter(|r| {
                state
                    .scored
                    .iter()
                    .any(|s| s.id == r.scored_event_id && s.builder_id == builder_id)
            })
            .cloned()
            .collect())
    }

    async fn points_receipts_for_payout(
        &self,
        payout_event_id: i64,
    ) -> anyhow::Result<Vec<PointsReceiptRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .points
            .iter()
            .filter(|p| p.payout_event_id == payout_event_id)
            .cloned()
            .collect())
    }

    async fn payout_for_builder(
        &self,
        builder_id: BuilderId,
        week: &str,
    ) -> anyhow::Result<Option<PayoutEventRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .payouts
            .iter()
            .find(|p| p.builder_id == builder_id && p.week == week)
            .cloned())
    }
}
