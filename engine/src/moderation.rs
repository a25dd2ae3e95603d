//! Strike accumulation and the ban transition.
//!
//! `applied -> approved -> banned`; the ban is terminal here. Strikes come
//! from PRs closed by someone other than their author; an author closing
//! their own PR cancelled it, which is not an infraction.

use shared::{BuilderStatus, RawPullRequest};
use tracing::{info, instrument, warn};

use crate::{
    events::{Context, RecordOutcome, SkipReason},
    storage::{BuilderRecord, RepoRecord},
};

#[instrument(skip_all, fields(builder = %builder.login, pr = pr.number))]
pub(crate) async fn apply_closed_pr(
    context: &Context,
    repo: &RepoRecord,
    builder: &BuilderRecord,
    pr: &RawPullRequest,
) -> anyhow::Result<RecordOutcome> {
    let Some(closer) = &pr.closed_by else {
        // Without a resolved closer we cannot rule out a self-close, so no
        // strike is recorded.
        return Ok(RecordOutcome::Unscored(SkipReason::UnknownCloser));
    };
    if closer.id == pr.author.id {
        return Ok(RecordOutcome::Unscored(SkipReason::SelfClosed));
    }

    let strikes = context
        .ledger
        .add_strike(builder.id, pr.completed_at())
        .await?;
    info!(builder = %builder.login, strikes, "strike recorded");

    let mut banned = false;
    if strikes >= context.config.ban_threshold && builder.status == BuilderStatus::Approved {
        context.ledger.ban_builder(builder.id).await?;
        banned = true;
        if let Err(e) = context.notifier.builder_banned(&builder.login).await {
            warn!(builder = %builder.login, "ban notification failed: {e:#}");
        }
    }

    // Advisory only; a failure here never rolls back the strike.
    if let Err(e) = context
        .notifier
        .strike_recorded(&builder.login, &repo.owner, &repo.name, pr.number, strikes)
        .await
    {
        warn!(builder = %builder.login, "strike notification failed: {e:#}");
    }

    Ok(RecordOutcome::Struck { strikes, banned })
}
