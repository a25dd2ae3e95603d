use shared::{day_string, week_string, ActivityKind, BuilderStatus, RawPullRequest, Season};

use crate::{
    scoring,
    storage::{ActivityKey, BuilderRecord, RepoRecord},
};

use super::{Context, RecordOutcome, SkipReason};

pub(super) async fn record_merged_pull_request(
    context: &Context,
    repo: &RepoRecord,
    builder: &BuilderRecord,
    pr: &RawPullRequest,
    season: &Season,
) -> anyhow::Result<RecordOutcome> {
    let completed_at = pr.completed_at();
    let inserted = context
        .ledger
        .insert_activity_event(
            ActivityKey {
                author_github_id: pr.author.id,
                repo_id: repo.id,
                external_id: pr.number.to_string(),
                kind: ActivityKind::MergedPullRequest,
            },
            pr.created_at,
            completed_at,
        )
        .await?;
    if !inserted.is_fresh() {
        return Ok(RecordOutcome::Duplicate);
    }

    if builder.status != BuilderStatus::Approved {
        return Ok(RecordOutcome::Unscored(SkipReason::BuilderNotApproved));
    }

    let gem = scoring::classify_merged_pr(context, builder, repo, pr, completed_at).await?;
    scoring::score(
        context,
        builder,
        repo,
        inserted.record(),
        ActivityKind::MergedPullRequest,
        gem,
        week_string(completed_at),
        day_string(completed_at),
        season,
    )
    .await?;
    Ok(RecordOutcome::Scored(gem))
}
