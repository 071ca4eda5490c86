use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use super::error::{RepoError, truncate_message};
use super::hash::BlobId;
use super::traits::{
    AccessProbe, EntryKind, FileMetadata, PullRequest, PullRequestDraft, RepositoryClient, Tree,
    TreeEntry, WriteFile, WriteOutcome,
};

const API_VERSION: &str = "2022-11-28";
const CLIENT_AGENT: &str = concat!("auto3d-publisher/", env!("CARGO_PKG_VERSION"));

/// [`RepositoryClient`] backed by the GitHub REST API.
pub struct GitHubClient {
    http: Client,
    api_base: String,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Build a client for `owner/repo`, authenticating every call with `token`.
    pub fn new(
        api_base: &str,
        owner: &str,
        repo: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, RepoError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| RepoError::Transport(format!("invalid auth header: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_AGENT));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RepoError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.api_base, self.owner, self.repo, tail
        )
    }

    /// Contents endpoint for `path`, each segment percent-encoded.
    fn contents_url(&self, path: &str) -> Result<Url, RepoError> {
        let mut url = Url::parse(&self.repo_url("/contents"))
            .map_err(|e| RepoError::Transport(format!("invalid API base: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| RepoError::Transport("API base cannot take a path".into()))?
            .extend(path.trim_start_matches('/').split('/'));
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, RepoError> {
        request
            .send()
            .await
            .map_err(|e| RepoError::Transport(e.to_string()))
    }
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// A non-2xx response, read once.
struct Failure {
    status: StatusCode,
    message: String,
    rate_limited: bool,
    reset: Option<u64>,
}

impl Failure {
    async fn read(response: Response) -> Self {
        let status = response.status();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let remaining = header("x-ratelimit-remaining");
        let reset = header("x-ratelimit-reset").and_then(|v| v.parse().ok());

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or(text);
        let message = truncate_message(&message);

        let rate_limited = status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN
                && (remaining.as_deref() == Some("0")
                    || message.to_ascii_lowercase().contains("rate limit")));

        Self {
            status,
            message,
            rate_limited,
            reset,
        }
    }

    fn mentions(&self, needle: &str) -> bool {
        self.message.to_ascii_lowercase().contains(needle)
    }

    /// Status-based mapping shared by every operation.
    fn into_error(self, subject: &str) -> RepoError {
        if self.rate_limited {
            return RepoError::RateLimited { reset: self.reset };
        }
        match self.status {
            StatusCode::UNAUTHORIZED => RepoError::Auth(self.message),
            StatusCode::NOT_FOUND => RepoError::NotFound(subject.to_string()),
            StatusCode::CONFLICT => RepoError::WriteConflict(subject.to_string()),
            StatusCode::PAYLOAD_TOO_LARGE => RepoError::SizeLimitExceeded(self.message),
            status => RepoError::Remote {
                status: status.as_u16(),
                message: self.message,
            },
        }
    }
}

async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, RepoError> {
    response
        .json::<T>()
        .await
        .map_err(|e| RepoError::Decode(e.to_string()))
}

#[derive(Deserialize)]
struct GitRef {
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Deserialize)]
struct ContentWrite {
    content: Option<ContentInfo>,
    commit: GitObject,
}

#[derive(Deserialize)]
struct ContentInfo {
    sha: String,
}

#[derive(Deserialize)]
struct ContentDelete {
    commit: GitObject,
}

#[derive(Deserialize)]
struct ContentMeta {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    size: u64,
}

#[derive(Deserialize)]
struct GitTree {
    #[serde(default)]
    tree: Vec<GitTreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct GitTreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    size: Option<u64>,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}

#[derive(Deserialize)]
struct RepoInfo {
    #[serde(default)]
    permissions: Option<RepoPermissions>,
}

#[derive(Deserialize, Default)]
struct RepoPermissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    maintain: bool,
    #[serde(default)]
    push: bool,
}

#[async_trait]
impl RepositoryClient for GitHubClient {
    #[instrument(skip(self))]
    async fn branch_head(&self, branch: &str) -> Result<String, RepoError> {
        let response = self
            .send(self.http.get(self.repo_url(&format!("/git/ref/heads/{branch}"))))
            .await?;
        if !response.status().is_success() {
            let failure = Failure::read(response).await;
            if failure.status == StatusCode::NOT_FOUND {
                return Err(RepoError::RefNotFound(branch.to_string()));
            }
            return Err(failure.into_error(branch));
        }
        let git_ref: GitRef = decode(response).await?;
        Ok(git_ref.object.sha)
    }

    #[instrument(skip(self))]
    async fn create_branch(&self, from_commit: &str, name: &str) -> Result<(), RepoError> {
        let body = json!({ "ref": format!("refs/heads/{name}"), "sha": from_commit });
        let response = self
            .send(self.http.post(self.repo_url("/git/refs")).json(&body))
            .await?;
        if response.status().is_success() {
            return Ok(());
        }
        let failure = Failure::read(response).await;
        if failure.status == StatusCode::UNPROCESSABLE_ENTITY && failure.mentions("already exists")
        {
            return Err(RepoError::BranchConflict(name.to_string()));
        }
        Err(failure.into_error(name))
    }

    #[instrument(skip(self, request), fields(path = %request.path, branch = %request.branch, size = request.content.len()))]
    async fn write_file(&self, request: WriteFile<'_>) -> Result<WriteOutcome, RepoError> {
        let mut body = json!({
            "message": request.message,
            "content": BASE64.encode(request.content),
            "branch": request.branch,
        });
        if let Some(previous) = request.previous {
            body["sha"] = Value::String(previous.to_string());
        }

        let response = self
            .send(self.http.put(self.contents_url(request.path)?).json(&body))
            .await?;
        if !response.status().is_success() {
            let failure = Failure::read(response).await;
            if failure.status == StatusCode::UNPROCESSABLE_ENTITY {
                if failure.mentions("sha") {
                    return Err(RepoError::WriteConflict(request.path.to_string()));
                }
                if failure.mentions("too large") {
                    return Err(RepoError::SizeLimitExceeded(failure.message));
                }
            }
            return Err(failure.into_error(request.path));
        }

        let written: ContentWrite = decode(response).await?;
        let content = written
            .content
            .ok_or_else(|| RepoError::Decode("write response has no content".into()))?;
        Ok(WriteOutcome {
            blob_id: BlobId::parse(&content.sha)?,
            commit_sha: written.commit.sha,
        })
    }

    #[instrument(skip(self))]
    async fn file_metadata(&self, path: &str, branch: &str) -> Result<FileMetadata, RepoError> {
        let response = self
            .send(
                self.http
                    .get(self.contents_url(path)?)
                    .query(&[("ref", branch)]),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Failure::read(response).await.into_error(path));
        }

        let value: Value = decode(response).await?;
        if value.is_array() {
            return Err(RepoError::NotFound(format!("{path} is a directory")));
        }
        let meta: ContentMeta =
            serde_json::from_value(value).map_err(|e| RepoError::Decode(e.to_string()))?;
        if meta.kind != "file" {
            return Err(RepoError::NotFound(format!("{path} is not a file")));
        }
        Ok(FileMetadata {
            blob_id: BlobId::parse(&meta.sha)?,
            size: meta.size,
        })
    }

    #[instrument(skip(self, message))]
    async fn delete_file(
        &self,
        path: &str,
        message: &str,
        branch: &str,
        blob_id: &BlobId,
    ) -> Result<String, RepoError> {
        let body = json!({ "message": message, "sha": blob_id.as_str(), "branch": branch });
        let response = self
            .send(self.http.delete(self.contents_url(path)?).json(&body))
            .await?;
        if !response.status().is_success() {
            let failure = Failure::read(response).await;
            if failure.status == StatusCode::UNPROCESSABLE_ENTITY && failure.mentions("sha") {
                return Err(RepoError::WriteConflict(path.to_string()));
            }
            return Err(failure.into_error(path));
        }
        let deleted: ContentDelete = decode(response).await?;
        Ok(deleted.commit.sha)
    }

    #[instrument(skip(self))]
    async fn list_tree(&self, branch: &str, recursive: bool) -> Result<Tree, RepoError> {
        let mut request = self
            .http
            .get(self.repo_url(&format!("/git/trees/{branch}")));
        if recursive {
            request = request.query(&[("recursive", "1")]);
        }
        let response = self.send(request).await?;
        if !response.status().is_success() {
            let failure = Failure::read(response).await;
            return match failure.status {
                StatusCode::NOT_FOUND => Err(RepoError::RefNotFound(branch.to_string())),
                // Empty repositories have no tree yet.
                StatusCode::CONFLICT if failure.mentions("empty") => Ok(Tree::default()),
                _ => Err(failure.into_error(branch)),
            };
        }

        let raw: GitTree = decode(response).await?;
        let mut entries = Vec::with_capacity(raw.tree.len());
        for entry in raw.tree {
            let kind = match entry.kind.as_str() {
                "blob" => EntryKind::Blob,
                "tree" => EntryKind::Tree,
                "commit" => EntryKind::Commit,
                other => {
                    return Err(RepoError::Decode(format!("unknown tree entry type {other}")));
                }
            };
            entries.push(TreeEntry {
                path: entry.path,
                kind,
                size: entry.size,
                blob_id: BlobId::parse(&entry.sha)?,
            });
        }
        Ok(Tree {
            entries,
            truncated: raw.truncated,
        })
    }

    #[instrument(skip(self, draft), fields(head = %draft.head, base = %draft.base))]
    async fn open_pull_request(
        &self,
        draft: PullRequestDraft<'_>,
    ) -> Result<PullRequest, RepoError> {
        let body = json!({
            "title": draft.title,
            "head": draft.head,
            "base": draft.base,
            "body": draft.body,
        });
        let response = self
            .send(self.http.post(self.repo_url("/pulls")).json(&body))
            .await?;
        if !response.status().is_success() {
            return Err(Failure::read(response).await.into_error(draft.head));
        }
        let pull: PullResponse = decode(response).await?;
        Ok(PullRequest {
            number: pull.number,
            url: pull.html_url,
        })
    }

    #[instrument(skip(self))]
    async fn probe_access(&self) -> Result<AccessProbe, RepoError> {
        let response = self.send(self.http.get(self.repo_url(""))).await?;
        match response.status() {
            status if status.is_success() => {
                let info: RepoInfo = decode(response).await?;
                let perms = info.permissions.unwrap_or_default();
                Ok(AccessProbe {
                    credentials_valid: true,
                    repository_reachable: true,
                    can_write: perms.push || perms.maintain || perms.admin,
                })
            }
            StatusCode::UNAUTHORIZED => Ok(AccessProbe::default()),
            // GitHub answers 404 for private repositories the token cannot see.
            StatusCode::NOT_FOUND => Ok(AccessProbe {
                credentials_valid: true,
                ..AccessProbe::default()
            }),
            _ => {
                let subject = format!("{}/{}", self.owner, self.repo);
                Err(Failure::read(response).await.into_error(&subject))
            }
        }
    }
}
