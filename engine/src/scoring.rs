//! Gem classification for merged pull requests, and the single write path
//! that turns a classification into a scored event, its receipt and the
//! weekly-stat increment.

use chrono::{DateTime, Duration, Utc};
use shared::{ActivityKind, DayString, GemType, RawPullRequest, Season, WeekString};
use tracing::{instrument, warn};

use crate::{
    events::Context,
    storage::{ActivityEventRecord, BuilderRecord, NewScoredEvent, RepoRecord},
};

/// Classifies a freshly recorded merged PR.
///
/// Order matters: the ever-first merge in a repository outranks the streak
/// bonus, and the streak bonus outranks the regular award.
#[instrument(skip_all, fields(builder = %builder.login, pr = pr.number))]
pub(crate) async fn classify_merged_pr(
    context: &Context,
    builder: &BuilderRecord,
    repo: &RepoRecord,
    pr: &RawPullRequest,
    completed_at: DateTime<Utc>,
) -> anyhow::Result<GemType> {
    if is_first_merged_pr(context, builder, repo, pr).await? {
        return Ok(GemType::FirstPr);
    }

    // Tally of scored merges inside the rolling window ending at this
    // event, this one included. Events older than the window never count,
    // which bounds the history scan.
    let window_start = completed_at - Duration::days(context.config.streak_window_days as i64);
    let prior = context
        .ledger
        .scored_merges_in_window(builder.id, window_start, completed_at)
        .await?;
    let nth = prior + 1;
    if nth % context.config.streak_length as u64 == 0 {
        return Ok(GemType::ThirdPrInStreak);
    }

    Ok(GemType::RegularPr)
}

/// The local ledger is checked first; when it shows no prior merge, the
/// external source is consulted as a fallback before awarding `first_pr`.
/// A flaky fallback degrades to trusting the ledger rather than blocking
/// the event.
async fn is_first_merged_pr(
    context: &Context,
    builder: &BuilderRecord,
    repo: &RepoRecord,
    pr: &RawPullRequest,
) -> anyhow::Result<bool> {
    // The current event is already recorded, so "no prior merge" means a
    // count of exactly one.
    let recorded = context
        .ledger
        .merged_pr_event_count(pr.author.id, repo.id)
        .await?;
    if recorded > 1 {
        return Ok(false);
    }

    match context
        .source
        .recent_merged_prs(&builder.login, &repo.owner, &repo.name)
        .await
    {
        Ok(merged) => Ok(merged.iter().all(|earlier| earlier.number == pr.number)),
        Err(e) => {
            warn!(
                builder = %builder.login,
                repo = %repo.name,
                "first-merge fallback verification failed, trusting ledger: {e:#}"
            );
            Ok(true)
        }
    }
}

/// Persists the scored event, gem receipt and weekly-stat increment as one
/// atomic ledger write.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn score(
    context: &Context,
    builder: &BuilderRecord,
    repo: &RepoRecord,
    event: &ActivityEventRecord,
    kind: ActivityKind,
    gem: GemType,
    week: WeekString,
    day: DayString,
    season: &Season,
) -> anyhow::Result<()> {
    let value = context.config.gem_value(gem);
    context
        .ledger
        .save_scored_event(NewScoredEvent {
            activity_event_id: event.id,
            builder_id: builder.id,
            repo_id: repo.id,
            kind,
            gem,
            value,
            week,
            day,
            season: season.clone(),
            completed_at: event.completed_at,
        })
        .await?;
    Ok(())
}
