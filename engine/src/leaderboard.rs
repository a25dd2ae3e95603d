//! Weekly leaderboard: a pure read over the aggregated stats.

use itertools::Itertools;
use shared::{BuilderId, GithubHandle, WeekString};

use crate::storage::Ledger;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub builder_id: BuilderId,
    pub login: GithubHandle,
    pub gems_collected: u64,
    /// 1-based; ties broken by builder id, so ranks are stable across calls.
    pub rank: u32,
}

pub async fn weekly_leaderboard(
    ledger: &dyn Ledger,
    week: &WeekString,
    size: usize,
) -> anyhow::Result<Vec<LeaderboardEntry>> {
    let stats = ledger.weekly_stats_for_week(week).await?;
    let mut entries = Vec::with_capacity(stats.len().min(size));
    for (index, stat) in stats
        .into_iter()
        .sorted_by_key(|stat| (std::cmp::Reverse(stat.gems_collected), stat.builder_id))
        .take(size)
        .enumerate()
    {
        let login = ledger
            .get_builder(stat.builder_id)
            .await?
            .map(|builder| builder.login)
            .unwrap_or_default();
        entries.push(LeaderboardEntry {
            builder_id: stat.builder_id,
            login,
            gems_collected: stat.gems_collected,
            rank: index as u32 + 1,
        });
    }
    Ok(entries)
}
