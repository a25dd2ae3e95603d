use shared::{ActivityKind, RawPullRequest, Season};

use crate::{
    moderation,
    storage::{ActivityKey, BuilderRecord, RepoRecord},
};

use super::{Context, RecordOutcome};

/// A PR closed without being merged never scores; it feeds moderation.
/// The uniqueness check runs first, so a re-delivered closure can never
/// double-strike.
pub(super) async fn record_closed_pull_request(
    context: &Context,
    repo: &RepoRecord,
    builder: &BuilderRecord,
    pr: &RawPullRequest,
    _season: &Season,
) -> anyhow::Result<RecordOutcome> {
    let inserted = context
        .ledger
        .insert_activity_event(
            ActivityKey {
                author_github_id: pr.author.id,
                repo_id: repo.id,
                external_id: pr.number.to_string(),
                kind: ActivityKind::ClosedPullRequest,
            },
            pr.created_at,
            pr.completed_at(),
        )
        .await?;
    if !inserted.is_fresh() {
        return Ok(RecordOutcome::Duplicate);
    }

    moderation::apply_closed_pr(context, repo, builder, pr).await
}
