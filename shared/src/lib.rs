use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

mod event;
mod timeperiod;

pub use event::*;
pub use timeperiod::*;

pub type GithubHandle = String;
pub type BuilderId = i64;
pub type ScoutId = i64;
pub type RepoId = i64;
pub type Season = String;

/// Moderation state of a builder. `Banned` is terminal: nothing in the
/// pipeline ever clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BuilderStatus {
    Applied,
    Approved,
    Banned,
}

/// The three kinds of externally observed work. Adding a variant is a
/// compile-time-checked change: every dispatch over this enum is exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActivityKind {
    Commit,
    MergedPullRequest,
    ClosedPullRequest,
}

/// Gem classification of a scored event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GemType {
    FirstPr,
    ThirdPrInStreak,
    RegularPr,
    DailyCommit,
}
