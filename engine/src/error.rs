use thiserror::Error;

/// Failures of the external activity source. Transient errors abort the
/// current builder's fetch only; the next scheduled run retries.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("activity source rate limit exhausted")]
    RateLimited,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<octocrab::Error> for SourceError {
    fn from(err: octocrab::Error) -> Self {
        if let octocrab::Error::GitHub { source, .. } = &err {
            if is_rate_limit(source.status_code.as_u16(), &source.message) {
                return SourceError::RateLimited;
            }
        }
        SourceError::Other(err.into())
    }
}

/// Primary rate limits answer 403 or 429 with an `API rate limit exceeded`
/// message; secondary limits answer 403 with `secondary rate limit`.
fn is_rate_limit(status: u16, message: &str) -> bool {
    status == 429 || (status == 403 && message.contains("rate limit"))
}
