//! The activity source port and its GitHub adapter.
//!
//! The adapter tolerates overlapping time windows between runs; the ledger's
//! deduplication absorbs re-delivered items, so the listing here only has to
//! be complete, not exact.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use shared::{ActivityBatch, PullRequestState, RawActor, RawCommit, RawPullRequest, RawRepo};
use tracing::{instrument, warn};

use crate::error::SourceError;

#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Everything the source saw for `login` since `after`, across all
    /// repositories this source tracks.
    async fn fetch_activity(
        &self,
        login: &str,
        after: DateTime<Utc>,
    ) -> Result<ActivityBatch, SourceError>;

    /// Recent merged PRs by `login` in one repository. Fallback check for
    /// the ever-first-merge classification when the local ledger is
    /// inconclusive.
    async fn recent_merged_prs(
        &self,
        login: &str,
        owner: &str,
        name: &str,
    ) -> Result<Vec<RawPullRequest>, SourceError>;
}

pub struct GithubActivitySource {
    octocrab: Octocrab,
    tracked: Vec<(String, String)>,
}

impl GithubActivitySource {
    pub fn new(github_token: String, tracked: Vec<(String, String)>) -> anyhow::Result<Self> {
        let octocrab = Octocrab::builder().personal_token(github_token).build()?;
        Ok(Self { octocrab, tracked })
    }

    #[instrument(skip(self))]
    async fn pull_requests_since(
        &self,
        owner: &str,
        name: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<octocrab::models::pulls::PullRequest>, SourceError> {
        let mut page = self
            .octocrab
            .pulls(owner, name)
            .list()
            .state(octocrab::params::State::All)
            .sort(octocrab::params::pulls::Sort::Updated)
            .direction(octocrab::params::Direction::Descending)
            .per_page(100)
            .send()
            .await?;
        let mut ret = page.take_items();
        while ret
            .last()
            .is_some_and(|pr| pr.updated_at.or(pr.created_at).unwrap_or_default() >= since)
        {
            let next_page = self.octocrab.get_page(&page.next).await?;
            if let Some(mut next_page) = next_page {
                ret.append(&mut next_page.take_items());
                page = next_page;
            } else {
                break;
            }
        }

        Ok(ret
            .into_iter()
            .filter(|pr| pr.updated_at.or(pr.created_at).unwrap_or_default() >= since)
            .collect())
    }

    /// Commit listing goes through the raw endpoint; only a handful of
    /// fields are needed and the response is parsed defensively. The raw
    /// body is a bare JSON array with no embedded page cursor, so the page
    /// parameter is walked until a short page.
    #[instrument(skip(self))]
    async fn commits_since(
        &self,
        owner: &str,
        name: &str,
        login: &str,
        since: DateTime<Utc>,
        repo: &RawRepo,
    ) -> Result<Vec<RawCommit>, SourceError> {
        let mut commits = Vec::new();
        let mut page = 1u32;
        loop {
            let route = format!(
                "/repos/{owner}/{name}/commits?author={login}&since={}&per_page={COMMIT_PAGE_SIZE}&page={page}",
                since.to_rfc3339()
            );
            let items: Vec<serde_json::Value> = self.octocrab.get(&route, None::<&()>).await?;
            let exhausted = last_page(items.len());
            for item in &items {
                match parse_commit(item, repo) {
                    Some(commit) => commits.push(commit),
                    None => warn!(
                        repo = %repo.full_name(),
                        "skipping commit with missing fields"
                    ),
                }
            }
            if exhausted {
                break;
            }
            page += 1;
        }
        Ok(commits)
    }

    /// Resolves who closed a PR. Not part of the list payload, so this is a
    /// separate lookup; an unresolvable closer degrades to `None`.
    async fn closed_by(&self, owner: &str, name: &str, number: u64) -> Option<RawActor> {
        let route = format!("/repos/{owner}/{name}/issues/{number}");
        let issue: serde_json::Value = self.octocrab.get(route, None::<&()>).await.ok()?;
        let closer = issue.get("closed_by")?;
        Some(RawActor {
            id: closer.get("id")?.as_i64()?,
            login: closer.get("login")?.as_str()?.to_string(),
        })
    }

    async fn convert_pull_request(
        &self,
        pr: octocrab::models::pulls::PullRequest,
        owner: &str,
        name: &str,
        login: &str,
    ) -> Option<RawPullRequest> {
        let author = pr.user.as_ref()?;
        if author.login != login {
            return None;
        }
        let state = match (pr.merged_at, pr.closed_at) {
            (Some(_), _) => PullRequestState::Merged,
            (None, Some(_)) => PullRequestState::Closed,
            // Still open: not a completed unit of work yet.
            (None, None) => return None,
        };
        let repo_external_id = pr
            .base
            .repo
            .as_ref()
            .map(|repo| repo.id.0 as i64)
            .unwrap_or_default();
        let closed_by = match state {
            PullRequestState::Closed => self.closed_by(owner, name, pr.number).await,
            PullRequestState::Merged => None,
        };
        Some(RawPullRequest {
            number: pr.number,
            author: RawActor {
                id: author.id.0 as i64,
                login: author.login.clone(),
            },
            repo: RawRepo {
                id: repo_external_id,
                owner: owner.to_string(),
                name: name.to_string(),
            },
            state,
            created_at: pr.created_at.unwrap_or_default(),
            merged_at: pr.merged_at,
            closed_at: pr.closed_at,
            closed_by,
            base_ref: pr.base.ref_field.clone(),
        })
    }
}

const COMMIT_PAGE_SIZE: usize = 100;

/// A page shorter than the requested size is the last one.
fn last_page(returned: usize) -> bool {
    returned < COMMIT_PAGE_SIZE
}

fn parse_commit(item: &serde_json::Value, repo: &RawRepo) -> Option<RawCommit> {
    let sha = item.get("sha")?.as_str()?.to_string();
    let author = item.get("author")?;
    let committed_at = item
        .get("commit")?
        .get("author")?
        .get("date")?
        .as_str()?
        .parse::<DateTime<Utc>>()
        .ok()?;
    Some(RawCommit {
        sha,
        author: RawActor {
            id: author.get("id")?.as_i64()?,
            login: author.get("login")?.as_str()?.to_string(),
        },
        repo: repo.clone(),
        committed_at,
    })
}

#[async_trait]
impl ActivitySource for GithubActivitySource {
    #[instrument(skip(self))]
    async fn fetch_activity(
        &self,
        login: &str,
        after: DateTime<Utc>,
    ) -> Result<ActivityBatch, SourceError> {
        let mut batch = ActivityBatch::default();
        for (owner, name) in &self.tracked {
            let prs = self.pull_requests_since(owner, name, after).await?;
            for pr in prs {
                if let Some(raw) = self.convert_pull_request(pr, owner, name, login).await {
                    batch.pull_requests.push(raw);
                }
            }

            let repo = RawRepo {
                // The PR listing above carries the repository id; the commit
                // endpoint does not, so resolve it from what we already saw.
                id: batch
                    .pull_requests
                    .iter()
                    .find(|pr| &pr.repo.owner == owner && &pr.repo.name == name)
                    .map(|pr| pr.repo.id)
                    .unwrap_or_default(),
                owner: owner.clone(),
                name: name.clone(),
            };
            let mut commits = self.commits_since(owner, name, login, after, &repo).await?;
            batch.commits.append(&mut commits);
        }
        Ok(batch)
    }

    #[instrument(skip(self))]
    async fn recent_merged_prs(
        &self,
        login: &str,
        owner: &str,
        name: &str,
    ) -> Result<Vec<RawPullRequest>, SourceError> {
        let since = Utc::now() - chrono::Duration::days(90);
        let prs = self.pull_requests_since(owner, name, since).await?;
        let mut merged = Vec::new();
        for pr in prs {
            if pr.merged_at.is_none() {
                continue;
            }
            if let Some(raw) = self.convert_pull_request(pr, owner, name, login).await {
                merged.push(raw);
            }
        }
        Ok(merged)
    }
}
