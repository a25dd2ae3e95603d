use std::sync::Arc;

use chrono::Utc;
use shared::{week_string, TimePeriod};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use gitgems_engine::{
    config::{Env, ScoringConfig},
    notify::GithubNotifier,
    payout::DecayCurve,
    pipeline::Pipeline,
    source::GithubActivitySource,
    storage::{InMemoryLedger, Ledger},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let env = envy::from_env::<Env>()?;

    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber)?;

    let ledger: Arc<InMemoryLedger> = Arc::new(InMemoryLedger::new());
    seed_registry(ledger.as_ref(), &env).await?;

    let source = GithubActivitySource::new(env.github_token.clone(), env.tracked_repos())?;
    let notifier = GithubNotifier::new(env.github_token.clone())?;
    let pipeline = Pipeline::new(
        ledger,
        Arc::new(source),
        Arc::new(notifier),
        Arc::new(DecayCurve::default()),
        ScoringConfig::default(),
    );

    tokio::select! {
        _ = run(pipeline, env) => {}
        _ = signal::ctrl_c() => {
            warn!("Received SIGINT. Exiting.");
        }
    }

    Ok(())
}

async fn seed_registry(ledger: &dyn Ledger, env: &Env) -> anyhow::Result<()> {
    for (owner, name) in env.tracked_repos() {
        let repo = ledger.register_repo(0, &owner, &name).await?;
        info!(repo = %format_args!("{}/{}", repo.owner, repo.name), "tracking repository");
    }
    for (github_id, login) in env.registered_builders() {
        let builder = ledger.register_builder(github_id, &login).await?;
        ledger.approve_builder(builder.id, &env.season).await?;
        info!(builder = %login, "registered builder");
    }
    Ok(())
}

async fn run(pipeline: Pipeline, env: Env) {
    warn!("Starting activity poller...");

    let poll = tokio::time::Duration::from_secs(env.poll_interval_secs);
    let mut interval = tokio::time::interval(poll);
    let mut current_week = week_string(Utc::now());

    loop {
        interval.tick().await;
        let now = Utc::now();

        // Overlap the windows; the ledger absorbs re-deliveries.
        let since = now - chrono::Duration::seconds(2 * env.poll_interval_secs as i64);
        match pipeline.process_all_builders(since, &env.season).await {
            Ok(processed) => info!(processed, "poll finished"),
            Err(e) => error!("poll failed: {e:#}"),
        }

        // Crossing into a new ISO week closes out the previous one.
        let week = week_string(now);
        if week != current_week {
            let closed = TimePeriod::Week
                .previous_period(now)
                .map(week_string)
                .unwrap_or_else(|| current_week.clone());
            match pipeline.process_weekly_payout(&closed, &env.season).await {
                Ok(paid) => info!(week = %closed, paid, "weekly payout finished"),
                Err(e) => error!(week = %closed, "weekly payout failed: {e:#}"),
            }
            current_week = week;
        }
    }
}
