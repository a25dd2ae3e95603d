use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A GitHub user as reported by the activity source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawActor {
    pub id: i64,
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRepo {
    pub id: i64,
    pub owner: String,
    pub name: String,
}

impl RawRepo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    pub author: RawActor,
    pub repo: RawRepo,
    pub committed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    Merged,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPullRequest {
    pub number: u64,
    pub author: RawActor,
    pub repo: RawRepo,
    pub state: PullRequestState,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Who closed the PR, when the source could resolve it. Needed to tell a
    /// maintainer rejection apart from an author cancelling their own PR.
    pub closed_by: Option<RawActor>,
    pub base_ref: String,
}

impl RawPullRequest {
    /// The moment the unit of work completed: merge time for merged PRs,
    /// close time otherwise.
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.merged_at
            .or(self.closed_at)
            .unwrap_or(self.created_at)
    }
}

/// One `fetch_activity` response: everything the source saw for a login
/// since a given timestamp. Windows overlap between runs; deduplication
/// downstream absorbs the re-delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityBatch {
    pub commits: Vec<RawCommit>,
    pub pull_requests: Vec<RawPullRequest>,
}

impl ActivityBatch {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty() && self.pull_requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commits.len() + self.pull_requests.len()
    }
}
