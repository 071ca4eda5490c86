use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument};

use crate::catalog::{Catalog, Listing, Removal};
use crate::config::{PolicyConfig, RepoTarget, RepositoryConfig, UploadConfig};
use crate::error::{Error, Result};
use crate::placement::{self, Category, Classification, SizeLimits};
use crate::policy::{AccessPolicy, Principal};
use crate::publish::{
    PublishMode, PublishRequest, PublishResult, Publisher, UrlPin, review_branch_name,
};
use crate::storage::{GitHubClient, RepositoryClient};

/// Source of upload timestamps (unix seconds).
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// One upload as received from a caller.
#[derive(Clone)]
pub struct Upload {
    pub category: Category,
    pub classification: Classification,
    pub filename: Option<String>,
    pub content: Vec<u8>,
    /// Caller asked for a pull request instead of a direct commit.
    pub review: bool,
    pub pin: UrlPin,
}

/// Reachability of the configured repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct HealthReport {
    pub configured: bool,
    pub credentials_valid: bool,
    pub repository_reachable: bool,
    pub can_write: bool,
}

/// The signed-in caller and whether the policy admits them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct Session {
    #[schema(example = "octocat")]
    pub login: String,
    pub allowed: bool,
}

#[derive(Clone)]
struct Backend {
    client: Arc<dyn RepositoryClient>,
    publisher: Publisher,
    catalog: Catalog,
}

/// Entry point for every catalog operation.
///
/// Each call runs the access policy first, then the configuration check, then
/// local validation, and only then talks to the repository.
#[derive(Clone)]
pub struct AssetService {
    policy: AccessPolicy,
    limits: SizeLimits,
    always_review: bool,
    clock: Arc<dyn Clock>,
    backend: std::result::Result<Backend, String>,
}

impl AssetService {
    /// Build against GitHub. Missing repository settings do not fail here;
    /// they surface as a configuration error on every call.
    pub fn from_config(
        repository: &RepositoryConfig,
        policy: &PolicyConfig,
        upload: &UploadConfig,
    ) -> Self {
        let backend = repository
            .resolve()
            .and_then(|resolved| {
                let client = GitHubClient::new(
                    &resolved.api_base,
                    &resolved.target.owner,
                    &resolved.target.name,
                    &resolved.token,
                    resolved.timeout,
                )
                .map_err(|e| Error::Configuration(format!("github client: {e}")))?;
                Ok(Backend::new(
                    Arc::new(client),
                    resolved.target,
                    upload.list_page_size,
                ))
            })
            .map_err(|e| match e {
                Error::Configuration(message) => message,
                other => other.to_string(),
            });
        Self::assemble(backend, policy, upload)
    }

    /// Build against an already constructed client.
    pub fn with_client(
        target: RepoTarget,
        client: Arc<dyn RepositoryClient>,
        policy: &PolicyConfig,
        upload: &UploadConfig,
    ) -> Self {
        let backend = Backend::new(client, target, upload.list_page_size);
        Self::assemble(Ok(backend), policy, upload)
    }

    fn assemble(
        backend: std::result::Result<Backend, String>,
        policy: &PolicyConfig,
        upload: &UploadConfig,
    ) -> Self {
        Self {
            policy: AccessPolicy::new(&policy.allow_list),
            limits: upload.size_limits(),
            always_review: policy.always_review,
            clock: Arc::new(SystemClock),
            backend,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn limits(&self) -> SizeLimits {
        self.limits
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_ok()
    }

    fn backend(&self) -> Result<&Backend> {
        self.backend
            .as_ref()
            .map_err(|message| Error::Configuration(message.clone()))
    }

    /// Validate, place and publish one upload.
    #[instrument(skip(self, upload), fields(category = %upload.category, size = upload.content.len()))]
    pub async fn upload(&self, login: Option<&str>, upload: Upload) -> Result<PublishResult> {
        let principal = self.policy.authorize(login)?;
        let backend = self.backend()?;

        let timestamp = self.clock.now();
        let placed = placement::place(
            upload.category,
            &upload.classification,
            upload.filename.as_deref(),
            upload.content.len() as u64,
            &self.limits,
            timestamp,
        )?;
        debug!(path = %placed.path, "upload placed");

        let mode = PublishMode::resolve(upload.review, self.always_review);
        let request = PublishRequest {
            message: format!("Add {} {}", placed.category, placed.path),
            pull_request_body: format!(
                "Uploaded by @{}\n\n- Category: {}\n- Namespace: `{}`\n- Path: `{}`\n",
                principal.login, placed.category, placed.namespace, placed.path
            ),
            review_branch: review_branch_name("upload", &principal.login, timestamp),
            path: placed.path,
            content: upload.content,
            mode,
            pin: upload.pin,
        };
        Ok(backend.publisher.publish(request).await?)
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        login: Option<&str>,
        category: Category,
        prefix: Option<&str>,
    ) -> Result<Listing> {
        self.policy.authorize(login)?;
        self.backend()?.catalog.list(category, prefix).await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, login: Option<&str>, path: &str, review: bool) -> Result<Removal> {
        let principal = self.policy.authorize(login)?;
        let backend = self.backend()?;
        let mode = PublishMode::resolve(review, self.always_review);
        backend
            .catalog
            .remove(path, mode, &principal, self.clock.now())
            .await
    }

    /// Probe the repository with the configured credential.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<HealthReport> {
        let probe = self.backend()?.client.probe_access().await?;
        Ok(HealthReport {
            configured: true,
            credentials_valid: probe.credentials_valid,
            repository_reachable: probe.repository_reachable,
            can_write: probe.can_write,
        })
    }

    /// Describe the signed-in caller without touching the repository.
    pub fn session(&self, login: Option<&str>) -> Result<Session> {
        let login = login
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or(Error::Unauthenticated)?;
        Ok(Session {
            login: login.to_string(),
            allowed: self.policy.is_allowed(login),
        })
    }

    /// Admit `login` under the configured policy.
    pub fn authorize(&self, login: Option<&str>) -> Result<Principal> {
        self.policy.authorize(login)
    }
}

impl Backend {
    fn new(client: Arc<dyn RepositoryClient>, target: RepoTarget, page_size: usize) -> Self {
        Self {
            publisher: Publisher::new(client.clone(), target.clone()),
            catalog: Catalog::new(client.clone(), target, page_size),
            client,
        }
    }
}
