use shared::{day_string, week_string, ActivityKind, BuilderStatus, GemType, RawCommit, Season};
use tracing::debug;

use crate::{
    scoring,
    storage::{ActivityKey, BuilderRecord, RepoRecord},
};

use super::{Context, RecordOutcome, SkipReason};

/// Commits award one `daily_commit` gem for the first commit of the day in
/// a repository; later commits that day are recorded but never scored.
pub(super) async fn record_commit(
    context: &Context,
    repo: &RepoRecord,
    builder: &BuilderRecord,
    commit: &RawCommit,
    season: &Season,
) -> anyhow::Result<RecordOutcome> {
    let inserted = context
        .ledger
        .insert_activity_event(
            ActivityKey {
                author_github_id: commit.author.id,
                repo_id: repo.id,
                external_id: commit.sha.clone(),
                kind: ActivityKind::Commit,
            },
            commit.committed_at,
            commit.committed_at,
        )
        .await?;
    if !inserted.is_fresh() {
        return Ok(RecordOutcome::Duplicate);
    }

    if builder.status != BuilderStatus::Approved {
        return Ok(RecordOutcome::Unscored(SkipReason::BuilderNotApproved));
    }

    let day = day_string(commit.committed_at);
    if context
        .ledger
        .has_scored_commit_on(builder.id, repo.id, &day)
        .await?
    {
        debug!(
            builder = %builder.login,
            repo = %repo.name,
            %day,
            "daily commit already scored"
        );
        return Ok(RecordOutcome::Unscored(SkipReason::DailyCapReached));
    }

    scoring::score(
        context,
        builder,
        repo,
        inserted.record(),
        ActivityKind::Commit,
        GemType::DailyCommit,
        week_string(commit.committed_at),
        day,
        season,
    )
    .await?;
    Ok(RecordOutcome::Scored(GemType::DailyCommit))
}
