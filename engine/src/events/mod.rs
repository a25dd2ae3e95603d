//! Event recording: one handler per activity kind, selected by exhaustive
//! dispatch over a closed tagged union.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{ActivityKind, RawCommit, RawPullRequest, Season};
use tracing::{debug, instrument, warn};

use crate::{
    config::ScoringConfig,
    notify::Notifier,
    source::ActivitySource,
    storage::{BuilderRecord, Ledger, RepoRecord},
};

mod closed;
mod commit;
mod merged;

/// A completed unit of work, as delivered by the activity source.
#[derive(Debug, Clone)]
pub enum Activity {
    Commit(RawCommit),
    MergedPullRequest(RawPullRequest),
    ClosedPullRequest(RawPullRequest),
}

impl Activity {
    /// Flattens a source batch into a single stream ordered oldest first,
    /// so "first PR" and streak classification are deterministic.
    pub fn from_batch(batch: shared::ActivityBatch) -> Vec<Activity> {
        let mut activities: Vec<Activity> = batch
            .commits
            .into_iter()
            .map(Activity::Commit)
            .chain(batch.pull_requests.into_iter().map(|pr| match pr.state {
                shared::PullRequestState::Merged => Activity::MergedPullRequest(pr),
                shared::PullRequestState::Closed => Activity::ClosedPullRequest(pr),
            }))
            .collect();
        activities.sort_by_key(Activity::completed_at);
        activities
    }

    pub fn kind(&self) -> ActivityKind {
        match self {
            Activity::Commit(_) => ActivityKind::Commit,
            Activity::MergedPullRequest(_) => ActivityKind::MergedPullRequest,
            Activity::ClosedPullRequest(_) => ActivityKind::ClosedPullRequest,
        }
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        match self {
            Activity::Commit(commit) => commit.committed_at,
            Activity::MergedPullRequest(pr) | Activity::ClosedPullRequest(pr) => pr.completed_at(),
        }
    }

    fn repo(&self) -> &shared::RawRepo {
        match self {
            Activity::Commit(commit) => &commit.repo,
            Activity::MergedPullRequest(pr) | Activity::ClosedPullRequest(pr) => &pr.repo,
        }
    }

    fn author(&self) -> &shared::RawActor {
        match self {
            Activity::Commit(commit) => &commit.author,
            Activity::MergedPullRequest(pr) | Activity::ClosedPullRequest(pr) => &pr.author,
        }
    }
}

/// Why a recorded event produced no gem receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingRepository,
    UnknownAuthor,
    BuilderNotApproved,
    DailyCapReached,
    SelfClosed,
    UnknownCloser,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Fresh event, scored.
    Scored(shared::GemType),
    /// Fresh event, recorded but not scored.
    Unscored(SkipReason),
    /// Fresh closed-PR event that produced a strike.
    Struck { strikes: u32, banned: bool },
    /// Re-delivery of an already-recorded event. Silent no-op.
    Duplicate,
    /// The event was not recorded at all (untracked repo, unknown author).
    Ignored(SkipReason),
}

#[derive(Clone)]
pub struct Context {
    pub ledger: Arc<dyn Ledger>,
    pub source: Arc<dyn ActivitySource>,
    pub notifier: Arc<dyn Notifier>,
    pub config: ScoringConfig,
}

impl Context {
    /// Records one activity through its kind handler. Recording and any
    /// derived scoring happen against the ledger's atomic operations, so a
    /// crash between "event recorded" and "gem awarded" re-converges on the
    /// next run.
    #[instrument(skip(self, activity, season), fields(kind = %activity.kind()))]
    pub async fn record(&self, activity: &Activity, season: &Season) -> anyhow::Result<RecordOutcome> {
        let Some((repo, builder)) = self.resolve(activity).await? else {
            return match self.ledger.get_repo(&activity.repo().owner, &activity.repo().name).await? {
                None => {
                    warn!(
                        repo = %activity.repo().full_name(),
                        "activity references untracked repository"
                    );
                    Ok(RecordOutcome::Ignored(SkipReason::MissingRepository))
                }
                Some(_) => {
                    debug!(
                        author = %activity.author().login,
                        "activity author is not a registered builder"
                    );
                    Ok(RecordOutcome::Ignored(SkipReason::UnknownAuthor))
                }
            };
        };

        match activity {
            Activity::Commit(commit) => {
                commit::record_commit(self, &repo, &builder, commit, season).await
            }
            Activity::MergedPullRequest(pr) => {
                merged::record_merged_pull_request(self, &repo, &builder, pr, season).await
            }
            Activity::ClosedPullRequest(pr) => {
                closed::record_closed_pull_request(self, &repo, &builder, pr, season).await
            }
        }
    }

    async fn resolve(
        &self,
        activity: &Activity,
    ) -> anyhow::Result<Option<(RepoRecord, BuilderRecord)>> {
        let raw_repo = activity.repo();
        let Some(repo) = self.ledger.get_repo(&raw_repo.owner, &raw_repo.name).await? else {
            return Ok(None);
        };
        let Some(builder) = self
            .ledger
            .get_builder_by_github_id(activity.author().id)
            .await?
        else {
            return Ok(None);
        };
        Ok(Some((repo, builder)))
    }
}
