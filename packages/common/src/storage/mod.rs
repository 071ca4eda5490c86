mod error;
mod hash;
mod traits;

pub mod github;
pub mod memory;

pub use error::{MAX_REMOTE_MESSAGE_CHARS, RepoError, truncate_message};
pub use github::GitHubClient;
pub use hash::BlobId;
pub use memory::InMemoryRepository;
pub use traits::{
    AccessProbe, EntryKind, FileMetadata, PullRequest, PullRequestDraft, RepositoryClient, Tree,
    TreeEntry, WriteFile, WriteOutcome,
};
