use common::catalog::{ListedAsset, Listing, Removal};
use common::publish::{PublishOutcome, PublishResult};
use serde::{Deserialize, Serialize};

/// Whether an upload is live or waiting on a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    Published,
    PendingReview,
}

/// Successful upload response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    /// Storage path inside the repository.
    #[schema(example = "images/kia/carnival/1700000000-preview.JPG")]
    pub path: String,
    /// CDN URL serving the file.
    #[schema(
        example = "https://cdn.jsdelivr.net/gh/acme/auto3d-assets@main/images/kia/carnival/1700000000-preview.JPG"
    )]
    pub public_url: String,
    /// Branch the public URL resolves through once published.
    #[schema(example = "main")]
    pub branch: String,
    /// Commit that added the file (on the review branch for pending reviews).
    pub commit_sha: String,
    pub status: PublishStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_branch: Option<String>,
}

impl From<PublishResult> for UploadResponse {
    fn from(result: PublishResult) -> Self {
        let (status, pull_request, review_branch) = match result.outcome {
            PublishOutcome::Published => (PublishStatus::Published, None, None),
            PublishOutcome::PendingReview {
                review_branch,
                pull_request,
            } => (
                PublishStatus::PendingReview,
                Some(pull_request),
                Some(review_branch),
            ),
        };
        Self {
            path: result.storage_path,
            public_url: result.public_url,
            branch: result.branch,
            commit_sha: result.commit_sha,
            status,
            pull_request_url: pull_request.as_ref().map(|pr| pr.url.clone()),
            pull_request_number: pull_request.map(|pr| pr.number),
            review_branch,
        }
    }
}

/// Query parameters for listing assets.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAssetsQuery {
    /// `model` or `image`.
    #[param(example = "model")]
    pub category: String,
    /// Namespace prefix such as `kia` or `kia/carnival`.
    pub prefix: Option<String>,
}

/// Listing of one category, newest first.
#[derive(Serialize, utoipa::ToSchema)]
pub struct AssetListResponse {
    pub items: Vec<ListedAsset>,
    /// Repository as `owner/name`.
    #[schema(example = "acme/auto3d-assets")]
    pub repo_ref: String,
    #[schema(example = "main")]
    pub branch: String,
}

impl From<Listing> for AssetListResponse {
    fn from(listing: Listing) -> Self {
        Self {
            items: listing.items,
            repo_ref: listing.repo_ref,
            branch: listing.branch,
        }
    }
}

/// Query parameters for deleting an asset.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteAssetQuery {
    /// Storage path under `models/` or `images/`.
    #[param(example = "models/kia/carnival/1700000000-body.glb")]
    pub path: String,
    /// Stage the deletion as a pull request.
    #[serde(default)]
    pub review: bool,
}

/// Successful deletion response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct DeleteAssetResponse {
    /// Path that was (or will be, once merged) deleted.
    pub deleted: String,
    pub commit_sha: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_url: Option<String>,
}

impl From<Removal> for DeleteAssetResponse {
    fn from(removal: Removal) -> Self {
        Self {
            deleted: removal.path,
            commit_sha: removal.commit_sha,
            pull_request_url: removal.pull_request.map(|pr| pr.url),
        }
    }
}
