//! Weekly reward distribution.
//!
//! Converts the ranked leaderboard plus a fixed points pool into one payout
//! event and a set of points receipts per builder: 80% of the earnable
//! amount pro-rata across the scouts holding positions in the builder, 20%
//! to the builder. Guarded against re-execution per (builder, week).

use std::sync::Arc;

use shared::{Season, WeekString};
use tracing::{debug, error, info, instrument};

use crate::{
    config::ScoringConfig,
    leaderboard::{weekly_leaderboard, LeaderboardEntry},
    storage::{Ledger, NewPayoutEvent, NewPointsReceipt, Recipient},
};

/// Maps a leaderboard rank to a share of the weekly pool. Implementations
/// must be deterministic, monotonically non-increasing in rank, and never
/// exceed the pool.
pub trait RewardCurve: Send + Sync {
    fn share(&self, rank: u32, pool: u64) -> u64;
}

/// Geometric decay: rank 1 takes `(1 - decay)` of the pool, every following
/// rank `decay` times the previous one. The shares of all ranks sum to at
/// most the pool.
pub struct DecayCurve {
    decay_permille: u32,
}

impl DecayCurve {
    pub fn new(decay_permille: u32) -> Self {
        assert!(decay_permille < 1000, "decay must stay below 1");
        Self { decay_permille }
    }
}

impl Default for DecayCurve {
    fn default() -> Self {
        Self::new(850)
    }
}

impl RewardCurve for DecayCurve {
    fn share(&self, rank: u32, pool: u64) -> u64 {
        let decay = f64::from(self.decay_permille) / 1000.0;
        let fraction = (1.0 - decay) * decay.powi(rank.saturating_sub(1) as i32);
        (pool as f64 * fraction).floor() as u64
    }
}

/// Per-builder outcome of one distribution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutOutcome {
    Paid,
    AlreadyPaid,
    NoOwnership,
}

pub struct DistributionEngine {
    ledger: Arc<dyn Ledger>,
    curve: Arc<dyn RewardCurve>,
    config: ScoringConfig,
}

impl DistributionEngine {
    pub fn new(ledger: Arc<dyn Ledger>, curve: Arc<dyn RewardCurve>, config: ScoringConfig) -> Self {
        Self {
            ledger,
            curve,
            config,
        }
    }

    /// Runs the full weekly distribution. A failure on one builder is
    /// logged and the batch continues; returns the number of builders paid.
    #[instrument(skip(self))]
    pub async fn process_weekly_payout(
        &self,
        week: &WeekString,
        season: &Season,
    ) -> anyhow::Result<usize> {
        let board = weekly_leaderboard(
            self.ledger.as_ref(),
            week,
            self.config.max_rewarded_builders,
        )
        .await?;
        let mut paid = 0;
        for entry in &board {
            match self.payout_builder(entry, week, season).await {
                Ok(PayoutOutcome::Paid) => paid += 1,
                Ok(PayoutOutcome::AlreadyPaid) => {
                    info!(builder = %entry.login, %week, "payout already recorded, skipping");
                }
                Ok(PayoutOutcome::NoOwnership) => {
                    debug!(builder = %entry.login, %week, "no scout positions, skipping payout");
                }
                Err(e) => {
                    error!(builder = %entry.login, %week, "payout failed: {e:#}");
                }
            }
        }
        info!(%week, paid, of = board.len(), "weekly payout finished");
        Ok(paid)
    }

    async fn payout_builder(
        &self,
        entry: &LeaderboardEntry,
        week: &WeekString,
        season: &Season,
    ) -> anyhow::Result<PayoutOutcome> {
        if self.ledger.payout_exists(entry.builder_id, week).await? {
            return Ok(PayoutOutcome::AlreadyPaid);
        }

        let positions = self.ledger.nft_positions(entry.builder_id, season).await?;
        let total_nfts: u64 = positions.iter().map(|p| p.count).sum();
        if total_nfts == 0 {
            // Nobody to pay, including the builder. Deliberate no-op.
            return Ok(PayoutOutcome::NoOwnership);
        }

        let share = self
            .curve
            .share(entry.rank, self.config.weekly_allocated_points);
        let earnable = (share as f64 * self.config.normalisation_factor).floor() as u64;

        // Integer arithmetic with consistent flooring: remainders are lost,
        // never double-counted.
        let builder_points = earnable * 2 / 10;
        let mut receipts = Vec::with_capacity(positions.len() + 1);
        for position in &positions {
            receipts.push(NewPointsReceipt {
                recipient: Recipient::Scout(position.scout_id),
                value: earnable * 8 * position.count / (10 * total_nfts),
            });
        }
        receipts.push(NewPointsReceipt {
            recipient: Recipient::Builder(entry.builder_id),
            value: builder_points,
        });

        let saved = self
            .ledger
            .save_payout(
                NewPayoutEvent {
                    builder_id: entry.builder_id,
                    week: week.clone(),
                    season: season.clone(),
                    gems_collected: entry.gems_collected,
                    earnable_points: earnable,
                },
                receipts,
            )
            .await?;

        // A concurrent run can win the race between the existence check and
        // the insert; the atomic save resolves it.
        Ok(match saved {
            Some(payout) => {
                info!(
                    builder = %entry.login,
                    rank = entry.rank,
                    earnable,
                    payout = payout.id,
                    "payout recorded"
                );
                PayoutOutcome::Paid
            }
            None => PayoutOutcome::AlreadyPaid,
        })
    }
}
