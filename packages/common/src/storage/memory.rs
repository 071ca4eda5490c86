use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::error::RepoError;
use super::hash::BlobId;
use super::traits::{
    AccessProbe, EntryKind, FileMetadata, PullRequest, PullRequestDraft, RepositoryClient, Tree,
    TreeEntry, WriteFile, WriteOutcome,
};

/// One outbound call received by [`InMemoryRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoCall {
    BranchHead { branch: String },
    CreateBranch { from: String, name: String },
    WriteFile { path: String, branch: String },
    FileMetadata { path: String, branch: String },
    DeleteFile { path: String, branch: String },
    ListTree { branch: String },
    OpenPullRequest { head: String, base: String },
    ProbeAccess,
}

/// Operation selector for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoOp {
    BranchHead,
    CreateBranch,
    WriteFile,
    FileMetadata,
    DeleteFile,
    ListTree,
    OpenPullRequest,
    ProbeAccess,
}

impl RepoCall {
    fn op(&self) -> RepoOp {
        match self {
            Self::BranchHead { .. } => RepoOp::BranchHead,
            Self::CreateBranch { .. } => RepoOp::CreateBranch,
            Self::WriteFile { .. } => RepoOp::WriteFile,
            Self::FileMetadata { .. } => RepoOp::FileMetadata,
            Self::DeleteFile { .. } => RepoOp::DeleteFile,
            Self::ListTree { .. } => RepoOp::ListTree,
            Self::OpenPullRequest { .. } => RepoOp::OpenPullRequest,
            Self::ProbeAccess => RepoOp::ProbeAccess,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredFile {
    blob_id: BlobId,
    content: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
struct Branch {
    head: String,
    files: BTreeMap<String, StoredFile>,
}

/// A pull request opened against the in-memory repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPullRequest {
    pub number: u64,
    pub head: String,
    pub base: String,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct Inner {
    branches: HashMap<String, Branch>,
    pulls: Vec<OpenedPullRequest>,
    calls: Vec<RepoCall>,
    failures: HashMap<RepoOp, RepoError>,
    commits: u64,
}

impl Inner {
    fn next_commit(&mut self, seed: &str) -> String {
        self.commits += 1;
        let digest = Sha256::digest(format!("{}:{seed}", self.commits).as_bytes());
        hex::encode(&digest[..20])
    }

    fn branch(&self, name: &str) -> Result<&Branch, RepoError> {
        self.branches
            .get(name)
            .ok_or_else(|| RepoError::RefNotFound(name.to_string()))
    }

    fn branch_mut(&mut self, name: &str) -> Result<&mut Branch, RepoError> {
        self.branches
            .get_mut(name)
            .ok_or_else(|| RepoError::RefNotFound(name.to_string()))
    }

    /// Record `call` and return an injected failure for it, if any.
    fn record(&mut self, call: RepoCall) -> Result<(), RepoError> {
        let op = call.op();
        self.calls.push(call);
        match self.failures.remove(&op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// In-process [`RepositoryClient`] with Git-like branch snapshots.
///
/// Every call is recorded, so tests can assert exactly which remote operations
/// happened (or that none did). Writes without a previous blob id to an
/// existing path fail with [`RepoError::WriteConflict`], like the GitHub API.
#[derive(Debug)]
pub struct InMemoryRepository {
    inner: Mutex<Inner>,
    max_file_size: Option<u64>,
    credentials_valid: bool,
    can_write: bool,
}

impl InMemoryRepository {
    /// A repository with one empty branch.
    pub fn new(default_branch: &str) -> Self {
        let mut inner = Inner::default();
        let head = inner.next_commit("initial");
        inner.branches.insert(
            default_branch.to_string(),
            Branch {
                head,
                files: BTreeMap::new(),
            },
        );
        Self {
            inner: Mutex::new(inner),
            max_file_size: None,
            credentials_valid: true,
            can_write: true,
        }
    }

    /// Reject writes larger than `limit` bytes with `SizeLimitExceeded`.
    pub fn with_max_file_size(mut self, limit: u64) -> Self {
        self.max_file_size = Some(limit);
        self
    }

    /// Simulate a token that the remote rejects.
    pub fn with_rejected_credentials(mut self) -> Self {
        self.credentials_valid = false;
        self
    }

    /// Simulate a read-only token.
    pub fn read_only(mut self) -> Self {
        self.can_write = false;
        self
    }

    /// Make the next call of `op` fail with `error`.
    pub async fn fail_next(&self, op: RepoOp, error: RepoError) {
        self.inner.lock().await.failures.insert(op, error);
    }

    /// Place a file directly on `branch` without recording a call.
    pub async fn seed_file(&self, branch: &str, path: &str, content: &[u8]) -> BlobId {
        let mut inner = self.inner.lock().await;
        let head = inner.next_commit(path);
        let blob_id = BlobId::for_content(content);
        let entry = inner.branches.entry(branch.to_string()).or_default();
        entry.head = head;
        entry.files.insert(
            path.to_string(),
            StoredFile {
                blob_id: blob_id.clone(),
                content: content.to_vec(),
            },
        );
        blob_id
    }

    pub async fn calls(&self) -> Vec<RepoCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.inner.lock().await.calls.clear();
    }

    pub async fn pull_requests(&self) -> Vec<OpenedPullRequest> {
        self.inner.lock().await.pulls.clone()
    }

    pub async fn branch_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.inner.lock().await.branches.keys().cloned().collect();
        names.sort();
        names
    }

    /// Content of `path` on `branch`, if present.
    pub async fn file(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().await;
        inner
            .branches
            .get(branch)
            .and_then(|b| b.files.get(path))
            .map(|f| f.content.clone())
    }
}

#[async_trait]
impl RepositoryClient for InMemoryRepository {
    async fn branch_head(&self, branch: &str) -> Result<String, RepoError> {
        let mut inner = self.inner.lock().await;
        inner.record(RepoCall::BranchHead {
            branch: branch.to_string(),
        })?;
        Ok(inner.branch(branch)?.head.clone())
    }

    async fn create_branch(&self, from_commit: &str, name: &str) -> Result<(), RepoError> {
        let mut inner = self.inner.lock().await;
        inner.record(RepoCall::CreateBranch {
            from: from_commit.to_string(),
            name: name.to_string(),
        })?;
        if inner.branches.contains_key(name) {
            return Err(RepoError::BranchConflict(name.to_string()));
        }
        let source = inner
            .branches
            .values()
            .find(|b| b.head == from_commit)
            .cloned()
            .ok_or_else(|| RepoError::Remote {
                status: 422,
                message: "Object does not exist".into(),
            })?;
        inner.branches.insert(name.to_string(), source);
        Ok(())
    }

    async fn write_file(&self, request: WriteFile<'_>) -> Result<WriteOutcome, RepoError> {
        let mut inner = self.inner.lock().await;
        inner.record(RepoCall::WriteFile {
            path: request.path.to_string(),
            branch: request.branch.to_string(),
        })?;

        if let Some(limit) = self.max_file_size
            && request.content.len() as u64 > limit
        {
            return Err(RepoError::SizeLimitExceeded(format!(
                "{} bytes exceeds {limit}",
                request.content.len()
            )));
        }

        let existing = inner
            .branch(request.branch)?
            .files
            .get(request.path)
            .map(|f| f.blob_id.clone());
        match (existing, request.previous) {
            (Some(current), Some(previous)) if &current == previous => {}
            (None, None) => {}
            _ => return Err(RepoError::WriteConflict(request.path.to_string())),
        }

        let commit_sha = inner.next_commit(request.message);
        let blob_id = BlobId::for_content(request.content);
        let branch = inner.branch_mut(request.branch)?;
        branch.head = commit_sha.clone();
        branch.files.insert(
            request.path.to_string(),
            StoredFile {
                blob_id: blob_id.clone(),
                content: request.content.to_vec(),
            },
        );
        Ok(WriteOutcome {
            blob_id,
            commit_sha,
        })
    }

    async fn file_metadata(&self, path: &str, branch: &str) -> Result<FileMetadata, RepoError> {
        let mut inner = self.inner.lock().await;
        inner.record(RepoCall::FileMetadata {
            path: path.to_string(),
            branch: branch.to_string(),
        })?;
        let file = inner
            .branch(branch)?
            .files
            .get(path)
            .ok_or_else(|| RepoError::NotFound(path.to_string()))?;
        Ok(FileMetadata {
            blob_id: file.blob_id.clone(),
            size: file.content.len() as u64,
        })
    }

    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        branch: &str,
        blob_id: &BlobId,
    ) -> Result<String, RepoError> {
        let mut inner = self.inner.lock().await;
        inner.record(RepoCall::DeleteFile {
            path: path.to_string(),
            branch: branch.to_string(),
        })?;
        let current = inner
            .branch(branch)?
            .files
            .get(path)
            .map(|f| f.blob_id.clone())
            .ok_or_else(|| RepoError::NotFound(path.to_string()))?;
        if &current != blob_id {
            return Err(RepoError::WriteConflict(path.to_string()));
        }

        let commit_sha = inner.next_commit(message);
        let target = inner.branch_mut(branch)?;
        target.files.remove(path);
        target.head = commit_sha.clone();
        Ok(commit_sha)
    }

    async fn list_tree(&self, branch: &str, _recursive: bool) -> Result<Tree, RepoError> {
        let mut inner = self.inner.lock().await;
        inner.record(RepoCall::ListTree {
            branch: branch.to_string(),
        })?;
        let entries = inner
            .branch(branch)?
            .files
            .iter()
            .map(|(path, file)| TreeEntry {
                path: path.clone(),
                kind: EntryKind::Blob,
                size: Some(file.content.len() as u64),
                blob_id: file.blob_id.clone(),
            })
            .collect();
        Ok(Tree {
            entries,
            truncated: false,
        })
    }

    async fn open_pull_request(
        &self,
        draft: PullRequestDraft<'_>,
    ) -> Result<PullRequest, RepoError> {
        let mut inner = self.inner.lock().await;
        inner.record(RepoCall::OpenPullRequest {
            head: draft.head.to_string(),
            base: draft.base.to_string(),
        })?;
        inner.branch(draft.head)?;
        inner.branch(draft.base)?;

        let number = inner.pulls.len() as u64 + 1;
        inner.pulls.push(OpenedPullRequest {
            number,
            head: draft.head.to_string(),
            base: draft.base.to_string(),
            title: draft.title.to_string(),
            body: draft.body.to_string(),
        });
        Ok(PullRequest {
            number,
            url: format!("https://github.invalid/pull/{number}"),
        })
    }

    async fn probe_access(&self) -> Result<AccessProbe, RepoError> {
        self.inner.lock().await.record(RepoCall::ProbeAccess)?;
        if !self.credentials_valid {
            return Ok(AccessProbe::default());
        }
        Ok(AccessProbe {
            credentials_valid: true,
            repository_reachable: true,
            can_write: self.can_write,
        })
    }
}
