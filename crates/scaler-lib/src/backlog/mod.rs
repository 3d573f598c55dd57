//! Pending-job backlog source
//!
//! Queries the job platform for the count of queued-but-unstarted jobs in
//! each configured instance group, one authenticated request per group
//! through the retrying fetcher.

mod fetch;

pub use fetch::{RetryPolicy, RetryingFetcher};

use url::Url;

use crate::error::BacklogError;
use crate::models::JobBacklogEntry;
use crate::poller::{async_trait, Source};

/// Pending-job backlog source for a fixed set of instance groups
pub struct BacklogSource {
    fetcher: RetryingFetcher,
    base_url: Url,
    token: String,
    groups: Vec<String>,
}

impl BacklogSource {
    pub fn new(
        base_url: Url,
        token: impl Into<String>,
        groups: Vec<String>,
        policy: RetryPolicy,
    ) -> Result<Self, BacklogError> {
        let fetcher = RetryingFetcher::new(policy).map_err(BacklogError::Client)?;
        Ok(Self {
            fetcher,
            base_url,
            token: token.into(),
            groups,
        })
    }

    /// Fetch the pending-job count for every configured group
    ///
    /// Entries come back in configuration order; the first failing group
    /// fails the whole fetch.
    pub async fn fetch_pending(&self) -> Result<Vec<JobBacklogEntry>, BacklogError> {
        let mut entries = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let count = self.pending_for_group(group).await?;
            entries.push(JobBacklogEntry {
                group: group.clone(),
                count,
            });
        }
        Ok(entries)
    }

    async fn pending_for_group(&self, group: &str) -> Result<u64, BacklogError> {
        let url = self.base_url.join(&format!(
            "/api/v2/jobs/?instance_group__name__icontains={}&or__status=pending",
            group
        ))?;

        let body = self
            .fetcher
            .get(url, &self.token)
            .await
            .map_err(|source| BacklogError::Fetch {
                group: group.to_string(),
                source,
            })?;

        let payload: serde_json::Value =
            serde_json::from_str(&body).map_err(|source| BacklogError::Decode {
                group: group.to_string(),
                source,
            })?;

        // A payload without a numeric count is a hard error for the group,
        // never a silent zero
        payload
            .get("count")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| BacklogError::MissingCount {
                group: group.to_string(),
            })
    }
}

#[async_trait]
impl Source for BacklogSource {
    type Item = Vec<JobBacklogEntry>;

    async fn fetch(&self) -> anyhow::Result<Self::Item> {
        Ok(self.fetch_pending().await?)
    }
}
