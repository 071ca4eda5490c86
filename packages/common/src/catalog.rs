//! Listing published assets and removing them.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::RepoTarget;
use crate::error::{Error, Result};
use crate::placement::{self, Category};
use crate::policy::Principal;
use crate::publish::{PublishMode, ReviewBranch, review_branch_name};
use crate::storage::{PullRequest, RepositoryClient};

/// Default number of entries returned by [`Catalog::list`].
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// One published file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct ListedAsset {
    #[schema(example = "models/kia/carnival/1700000000-body.glb")]
    pub path: String,
    pub size: u64,
    pub url: String,
    #[schema(example = "model/gltf-binary")]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub items: Vec<ListedAsset>,
    /// `owner/name` of the listed repository.
    pub repo_ref: String,
    pub branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub path: String,
    pub commit_sha: String,
    pub review_branch: Option<String>,
    pub pull_request: Option<PullRequest>,
}

/// Read and delete side of the published catalog.
#[derive(Clone)]
pub struct Catalog {
    client: Arc<dyn RepositoryClient>,
    target: RepoTarget,
    page_size: usize,
}

impl Catalog {
    pub fn new(client: Arc<dyn RepositoryClient>, target: RepoTarget, page_size: usize) -> Self {
        Self {
            client,
            target,
            page_size: page_size.max(1),
        }
    }

    /// Newest-first files under `category`, optionally narrowed by `prefix`.
    #[instrument(skip(self))]
    pub async fn list(&self, category: Category, prefix: Option<&str>) -> Result<Listing> {
        let root = placement::listing_prefix(category, prefix);
        let tree = self.client.list_tree(&self.target.branch, true).await?;
        if tree.truncated {
            warn!(branch = %self.target.branch, "tree listing truncated by remote");
        }

        let mut items: Vec<ListedAsset> = tree
            .blobs()
            .filter(|entry| entry.path.starts_with(&root))
            .map(|entry| ListedAsset {
                url: placement::public_url(
                    &self.target.cdn_host,
                    &self.target.owner,
                    &self.target.name,
                    &self.target.branch,
                    &entry.path,
                ),
                content_type: content_type(&entry.path),
                size: entry.size.unwrap_or_default(),
                path: entry.path.clone(),
            })
            .collect();
        items.sort_unstable_by(|a, b| b.path.cmp(&a.path));
        items.truncate(self.page_size);

        Ok(Listing {
            items,
            repo_ref: self.target.repo_ref(),
            branch: self.target.branch.clone(),
        })
    }

    /// Delete one managed file directly or through a review branch.
    #[instrument(skip(self, principal), fields(login = %principal.login))]
    pub async fn remove(
        &self,
        path: &str,
        mode: PublishMode,
        principal: &Principal,
        timestamp: i64,
    ) -> Result<Removal> {
        let category = placement::validate_managed_path(path)
            .map_err(|reason| Error::Forbidden(format!("Cannot delete '{path}': {reason}")))?;

        let metadata = self.client.file_metadata(path, &self.target.branch).await?;
        let message = format!("Remove {category} {path}");

        match mode {
            PublishMode::Direct => {
                let commit_sha = self
                    .client
                    .delete_file(path, &message, &self.target.branch, &metadata.blob_id)
                    .await?;
                info!(commit = %commit_sha, "asset removed");
                Ok(Removal {
                    path: path.to_string(),
                    commit_sha,
                    review_branch: None,
                    pull_request: None,
                })
            }
            PublishMode::Review => {
                let review = ReviewBranch::create(
                    self.client.as_ref(),
                    &self.target.branch,
                    review_branch_name("delete", &principal.login, timestamp),
                )
                .await?;
                let commit_sha = self
                    .client
                    .delete_file(path, &message, &review.name, &metadata.blob_id)
                    .await
                    .inspect_err(|e| review.orphaned("delete file", e))?;

                let body = format!(
                    "Removal requested by @{}\n\n- Category: {category}\n- Path: `{path}`\n",
                    principal.login
                );
                let pull_request = review.open_pull_request(&message, &body).await?;
                info!(pull_request = pull_request.number, "removal pending review");

                Ok(Removal {
                    path: path.to_string(),
                    commit_sha,
                    review_branch: Some(review.name),
                    pull_request: Some(pull_request),
                })
            }
        }
    }
}

fn content_type(path: &str) -> String {
    match placement::extension(path).as_deref() {
        Some("glb") => "model/gltf-binary".to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}
