use serde::Deserialize;
use shared::GemType;

/// All scoring and distribution parameters for one batch run. Constructed
/// once and passed by reference; never mutated at runtime.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub first_pr_gems: u32,
    pub third_pr_in_streak_gems: u32,
    pub regular_pr_gems: u32,
    pub daily_commit_gems: u32,
    /// Rolling window, in days, that the streak counter looks back over.
    pub streak_window_days: u32,
    /// Every Nth qualifying merge inside the window is a streak event.
    pub streak_length: u32,
    /// Active strikes at or above this count ban the builder.
    pub ban_threshold: u32,
    /// Total points allocated to one week of rewards.
    pub weekly_allocated_points: u64,
    /// Optional scaling applied to every rank-based share.
    pub normalisation_factor: f64,
    /// Leaderboard truncation for the payout run.
    pub max_rewarded_builders: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            first_pr_gems: 100,
            third_pr_in_streak_gems: 30,
            regular_pr_gems: 10,
            daily_commit_gems: 1,
            streak_window_days: 7,
            streak_length: 3,
            ban_threshold: 3,
            weekly_allocated_points: 100_000,
            normalisation_factor: 1.0,
            max_rewarded_builders: 100,
        }
    }
}

impl ScoringConfig {
    /// Total function from gem classification to value.
    pub fn gem_value(&self, gem: GemType) -> u32 {
        match gem {
            GemType::FirstPr => self.first_pr_gems,
            GemType::ThirdPrInStreak => self.third_pr_in_streak_gems,
            GemType::RegularPr => self.regular_pr_gems,
            GemType::DailyCommit => self.daily_commit_gems,
        }
    }
}

fn default_poll_interval() -> u64 {
    3600
}

/// Environment of the scheduler harness binary.
#[derive(Debug, Deserialize)]
pub struct Env {
    pub github_token: String,
    pub season: String,
    /// Comma-separated `owner/name` pairs of tracked repositories.
    pub repos: String,
    /// Comma-separated `github_id:login` pairs of registered builders.
    #[serde(default)]
    pub builders: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Env {
    pub fn tracked_repos(&self) -> Vec<(String, String)> {
        self.repos
            .split(',')
            .filter_map(|pair| {
                let (owner, name) = pair.trim().split_once('/')?;
                Some((owner.to_string(), name.to_string()))
            })
            .collect()
    }

    pub fn registered_builders(&self) -> Vec<(i64, String)> {
        self.builders
            .split(',')
            .filter_map(|pair| {
                let (id, login) = pair.trim().split_once(':')?;
                Some((id.parse().ok()?, login.to_string()))
            })
            .collect()
    }
}
