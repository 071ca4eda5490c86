use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;
use crate::placement::SizeLimits;

/// Remote repository settings.
#[derive(Deserialize, Clone)]
pub struct RepositoryConfig {
    /// Access token with contents and pull-request write scope. Required.
    #[serde(default)]
    pub token: Option<String>,
    /// Target repository as `owner/name`. Required.
    #[serde(default)]
    pub repository: Option<String>,
    /// Branch receiving published content. Default: "main".
    #[serde(default = "default_branch")]
    pub branch: String,
    /// REST API root. Default: "https://api.github.com".
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// CDN host serving repository files. Default: "cdn.jsdelivr.net".
    #[serde(default = "default_cdn_host")]
    pub cdn_host: String,
    /// Per-request timeout in seconds. Default: 20.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_branch() -> String {
    "main".into()
}
fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_cdn_host() -> String {
    "cdn.jsdelivr.net".into()
}
fn default_timeout_secs() -> u64 {
    20
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            token: None,
            repository: None,
            branch: default_branch(),
            api_base: default_api_base(),
            cdn_host: default_cdn_host(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl fmt::Debug for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("repository", &self.repository)
            .field("branch", &self.branch)
            .field("api_base", &self.api_base)
            .field("cdn_host", &self.cdn_host)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Where content is published and how its public URLs are formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub owner: String,
    pub name: String,
    pub branch: String,
    pub cdn_host: String,
}

impl RepoTarget {
    /// `owner/name`.
    pub fn repo_ref(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Repository settings that passed validation.
#[derive(Clone)]
pub struct ResolvedRepository {
    pub target: RepoTarget,
    pub token: String,
    pub api_base: String,
    pub timeout: Duration,
}

impl fmt::Debug for ResolvedRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedRepository")
            .field("target", &self.target)
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RepositoryConfig {
    /// Validate the required settings, naming the first one that is missing.
    pub fn resolve(&self) -> Result<ResolvedRepository, Error> {
        let token = self
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Configuration("github.token is not set".into()))?;

        let repository = self
            .repository
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| Error::Configuration("github.repository is not set".into()))?;
        let (owner, name) = repository
            .split_once('/')
            .filter(|(o, n)| !o.is_empty() && !n.is_empty() && !n.contains('/'))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "github.repository must be 'owner/name', got '{repository}'"
                ))
            })?;

        let branch = self.branch.trim();
        if branch.is_empty() {
            return Err(Error::Configuration("github.branch is empty".into()));
        }

        Ok(ResolvedRepository {
            target: RepoTarget {
                owner: owner.to_string(),
                name: name.to_string(),
                branch: branch.to_string(),
                cdn_host: self.cdn_host.trim().to_string(),
            },
            token: token.to_string(),
            api_base: self.api_base.trim().to_string(),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
        })
    }
}

/// Who may publish and how.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PolicyConfig {
    /// Logins allowed to publish, list and remove. Empty allows any signed-in user.
    #[serde(default)]
    pub allow_list: Vec<String>,
    /// Route every publish and removal through a pull request. Default: false.
    #[serde(default)]
    pub always_review: bool,
}

/// Upload ceilings and listing size.
#[derive(Debug, Deserialize, Clone)]
pub struct UploadConfig {
    /// Largest accepted model, in bytes. Default: 50 MiB.
    #[serde(default = "default_max_model_bytes")]
    pub max_model_bytes: u64,
    /// Largest accepted image, in bytes. Default: 10 MiB.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    /// Most entries returned by one listing. Default: 200.
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

fn default_max_model_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_list_page_size() -> usize {
    200
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_model_bytes: default_max_model_bytes(),
            max_image_bytes: default_max_image_bytes(),
            list_page_size: default_list_page_size(),
        }
    }
}

impl UploadConfig {
    pub fn size_limits(&self) -> SizeLimits {
        SizeLimits {
            model: self.max_model_bytes,
            image: self.max_image_bytes,
        }
    }
}
