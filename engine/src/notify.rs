//! Best-effort advisory notifications back to the source system.
//!
//! Nothing here is required for correctness: a failed notification is
//! logged and dropped, and never rolls back the strike or ban it reports.

use async_trait::async_trait;
use octocrab::Octocrab;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn strike_recorded(
        &self,
        login: &str,
        owner: &str,
        repo: &str,
        pr_number: u64,
        strikes: u32,
    ) -> anyhow::Result<()>;

    async fn builder_banned(&self, login: &str) -> anyhow::Result<()>;
}

/// Default notifier: the advisory lands in the logs only.
#[derive(Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn strike_recorded(
        &self,
        login: &str,
        owner: &str,
        repo: &str,
        pr_number: u64,
        strikes: u32,
    ) -> anyhow::Result<()> {
        info!(login, pr = %format_args!("{owner}/{repo}#{pr_number}"), strikes, "strike recorded");
        Ok(())
    }

    async fn builder_banned(&self, login: &str) -> anyhow::Result<()> {
        info!(login, "builder banned");
        Ok(())
    }
}

/// Posts an advisory comment on the closed PR.
pub struct GithubNotifier {
    octocrab: Octocrab,
}

impl GithubNotifier {
    pub fn new(github_token: String) -> anyhow::Result<Self> {
        let octocrab = Octocrab::builder().personal_token(github_token).build()?;
        Ok(Self { octocrab })
    }
}

#[async_trait]
impl Notifier for GithubNotifier {
    async fn strike_recorded(
        &self,
        login: &str,
        owner: &str,
        repo: &str,
        pr_number: u64,
        strikes: u32,
    ) -> anyhow::Result<()> {
        let body = format!(
            "@{login} this pull request was closed without being merged, which \
             counts as a strike (you now have {strikes}). Repeated closures lead \
             to a ban."
        );
        self.octocrab
            .issues(owner, repo)
            .create_comment(pr_number, body)
            .await?;
        Ok(())
    }

    async fn builder_banned(&self, login: &str) -> anyhow::Result<()> {
        // There is no PR to comment on for the ban itself; the per-strike
        // comment above already warned on the triggering closure.
        info!(login, "builder banned after repeated closed pull requests");
        Ok(())
    }
}
