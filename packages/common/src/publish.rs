//! Getting content into the tracked history, directly or through review.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::RepoTarget;
use crate::placement::{self, normalize_segment};
use crate::storage::{BlobId, PullRequest, PullRequestDraft, RepoError, RepositoryClient, WriteFile};

/// How a change reaches the target branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// Commit straight onto the target branch.
    Direct,
    /// Commit onto a fresh review branch and open a pull request.
    Review,
}

impl PublishMode {
    /// Review when the caller asks for it or the server forces it.
    pub fn resolve(requested_review: bool, always_review: bool) -> Self {
        if requested_review || always_review {
            Self::Review
        } else {
            Self::Direct
        }
    }
}

/// Which reference the public URL resolves through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UrlPin {
    /// Follows the branch, including later merges.
    #[default]
    Branch,
    /// Fixed to the publishing commit. Only honoured on the direct path.
    Commit,
}

impl FromStr for UrlPin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "branch" => Ok(Self::Branch),
            "commit" => Ok(Self::Commit),
            other => Err(format!("Unknown pin '{other}' (expected 'branch' or 'commit')")),
        }
    }
}

/// One path/content/message tuple to publish.
#[derive(Clone)]
pub struct PublishRequest {
    pub path: String,
    pub content: Vec<u8>,
    pub message: String,
    pub mode: PublishMode,
    pub pin: UrlPin,
    /// Name for the review branch; only used in [`PublishMode::Review`].
    pub review_branch: String,
    pub pull_request_body: String,
}

impl fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishRequest")
            .field("path", &self.path)
            .field("size", &self.content.len())
            .field("mode", &self.mode)
            .field("pin", &self.pin)
            .finish_non_exhaustive()
    }
}

/// Terminal state of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    PendingReview {
        review_branch: String,
        pull_request: PullRequest,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub storage_path: String,
    pub public_url: String,
    /// Branch the content is (or will be, once merged) served from.
    pub branch: String,
    pub commit_sha: String,
    pub blob_id: BlobId,
    pub outcome: PublishOutcome,
}

impl PublishResult {
    pub fn pull_request(&self) -> Option<&PullRequest> {
        match &self.outcome {
            PublishOutcome::Published => None,
            PublishOutcome::PendingReview { pull_request, .. } => Some(pull_request),
        }
    }
}

/// Name for a review branch: `{kind}/{login}-{timestamp}-{6 hex}`.
pub fn review_branch_name(kind: &str, login: &str, timestamp: i64) -> String {
    let suffix: u32 = rand::rng().random_range(0..0x100_0000);
    format!(
        "{kind}/{}-{timestamp}-{suffix:06x}",
        normalize_segment(login)
    )
}

/// A short-lived branch created from the target tip, holding one change.
pub(crate) struct ReviewBranch<'a> {
    client: &'a dyn RepositoryClient,
    base: &'a str,
    pub name: String,
}

impl<'a> ReviewBranch<'a> {
    /// Read the tip of `base` and branch `name` off it.
    pub(crate) async fn create(
        client: &'a dyn RepositoryClient,
        base: &'a str,
        name: String,
    ) -> Result<Self, RepoError> {
        let head = client.branch_head(base).await?;
        client.create_branch(&head, &name).await?;
        info!(branch = %name, from = %head, "review branch created");
        Ok(Self { client, base, name })
    }

    pub(crate) async fn open_pull_request(
        &self,
        title: &str,
        body: &str,
    ) -> Result<PullRequest, RepoError> {
        self.client
            .open_pull_request(PullRequestDraft {
                head: &self.name,
                base: self.base,
                title,
                body,
            })
            .await
            .inspect_err(|e| self.orphaned("open pull request", e))
    }

    /// The branch stays behind for an operator to clean up.
    pub(crate) fn orphaned(&self, step: &str, error: &RepoError) {
        warn!(branch = %self.name, step, %error, "review branch left without a pull request");
    }
}

/// Publishes content to the configured repository.
#[derive(Clone)]
pub struct Publisher {
    client: Arc<dyn RepositoryClient>,
    target: RepoTarget,
}

impl Publisher {
    pub fn new(client: Arc<dyn RepositoryClient>, target: RepoTarget) -> Self {
        Self { client, target }
    }

    pub fn target(&self) -> &RepoTarget {
        &self.target
    }

    pub fn public_url(&self, reference: &str, path: &str) -> String {
        placement::public_url(
            &self.target.cdn_host,
            &self.target.owner,
            &self.target.name,
            reference,
            path,
        )
    }

    #[instrument(skip(self, request), fields(path = %request.path, mode = ?request.mode))]
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishResult, RepoError> {
        match request.mode {
            PublishMode::Direct => self.publish_direct(request).await,
            PublishMode::Review => self.publish_review(request).await,
        }
    }

    async fn publish_direct(&self, request: PublishRequest) -> Result<PublishResult, RepoError> {
        let written = self
            .client
            .write_file(WriteFile {
                path: &request.path,
                content: &request.content,
                message: &request.message,
                branch: &self.target.branch,
                previous: None,
            })
            .await?;

        let reference = match request.pin {
            UrlPin::Branch => self.target.branch.as_str(),
            UrlPin::Commit => written.commit_sha.as_str(),
        };
        let public_url = self.public_url(reference, &request.path);
        info!(commit = %written.commit_sha, blob = written.blob_id.short(), "published");

        Ok(PublishResult {
            storage_path: request.path,
            public_url,
            branch: self.target.branch.clone(),
            commit_sha: written.commit_sha,
            blob_id: written.blob_id,
            outcome: PublishOutcome::Published,
        })
    }

    async fn publish_review(&self, request: PublishRequest) -> Result<PublishResult, RepoError> {
        let review = ReviewBranch::create(
            self.client.as_ref(),
            &self.target.branch,
            request.review_branch.clone(),
        )
        .await?;

        let written = self
            .client
            .write_file(WriteFile {
                path: &request.path,
                content: &request.content,
                message: &request.message,
                branch: &review.name,
                previous: None,
            })
            .await
            .inspect_err(|e| review.orphaned("write file", e))?;

        let pull_request = review
            .open_pull_request(&request.message, &request.pull_request_body)
            .await?;
        info!(pull_request = pull_request.number, "publish pending review");

        // The CDN resolves by branch name, so the URL is valid once merged.
        let public_url = self.public_url(&self.target.branch, &request.path);

        Ok(PublishResult {
            storage_path: request.path,
            public_url,
            branch: self.target.branch.clone(),
            commit_sha: written.commit_sha,
            blob_id: written.blob_id,
            outcome: PublishOutcome::PendingReview {
                review_branch: review.name,
                pull_request,
            },
        })
    }
}
