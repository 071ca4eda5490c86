use async_trait::async_trait;
use serde::Serialize;

use super::error::RepoError;
use super::hash::BlobId;

/// One file write, creating `path` or replacing it when `previous` is set.
#[derive(Debug, Clone)]
pub struct WriteFile<'a> {
    pub path: &'a str,
    pub content: &'a [u8],
    pub message: &'a str,
    pub branch: &'a str,
    /// Blob id of the version being replaced. `None` means the path must not exist.
    pub previous: Option<&'a BlobId>,
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub blob_id: BlobId,
    pub commit_sha: String,
}

/// Metadata of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub blob_id: BlobId,
    pub size: u64,
}

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
    pub size: Option<u64>,
    pub blob_id: BlobId,
}

/// Snapshot of a branch tree. Iterating it is finite and can be repeated.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
    /// The remote cut the listing short.
    pub truncated: bool,
}

impl Tree {
    /// File entries only, in remote order.
    pub fn blobs(&self) -> impl Iterator<Item = &TreeEntry> + '_ {
        self.entries.iter().filter(|e| e.kind == EntryKind::Blob)
    }
}

/// Pull request to open.
#[derive(Debug, Clone)]
pub struct PullRequestDraft<'a> {
    pub head: &'a str,
    pub base: &'a str,
    pub title: &'a str,
    pub body: &'a str,
}

/// An opened pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct PullRequest {
    #[schema(example = 42)]
    pub number: u64,
    #[schema(example = "https://github.com/acme/auto3d-assets/pull/42")]
    pub url: String,
}

/// What the configured credential can do with the target repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccessProbe {
    pub credentials_valid: bool,
    pub repository_reachable: bool,
    pub can_write: bool,
}

/// Authenticated access to one remote Git repository.
///
/// Every call is a single request/response. Implementations never retry.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Commit id at the tip of `branch`.
    async fn branch_head(&self, branch: &str) -> Result<String, RepoError>;

    /// Create `name` pointing at `from_commit`.
    async fn create_branch(&self, from_commit: &str, name: &str) -> Result<(), RepoError>;

    /// Create or replace one file in a single commit.
    async fn write_file(&self, request: WriteFile<'_>) -> Result<WriteOutcome, RepoError>;

    /// Blob id and size of `path` on `branch`.
    async fn file_metadata(&self, path: &str, branch: &str) -> Result<FileMetadata, RepoError>;

    /// Delete `path` in one commit, returning the commit id.
    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        branch: &str,
        blob_id: &BlobId,
    ) -> Result<String, RepoError>;

    /// Tree of `branch`, recursively when `recursive` is set.
    async fn list_tree(&self, branch: &str, recursive: bool) -> Result<Tree, RepoError>;

    async fn open_pull_request(
        &self,
        draft: PullRequestDraft<'_>,
    ) -> Result<PullRequest, RepoError>;

    /// Check what the credential can reach. Never fails on credential rejection;
    /// that is reported as `credentials_valid == false`.
    async fn probe_access(&self) -> Result<AccessProbe, RepoError>;
}
