//! Deterministic placement of uploaded content.
//!
//! Everything here is pure: the same category, classification, filename and
//! timestamp always yield the same storage path, and nothing touches the
//! network.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Segment used when normalization leaves nothing behind.
pub const PLACEHOLDER_SEGMENT: &str = "x";

const SEPARATOR: char = '-';
const MAX_PATH_LEN: usize = 512;

/// Kind of uploaded content. Decides the storage root and accepted formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Model,
    Image,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Model, Category::Image];

    /// Top-level directory holding this category.
    pub fn root(self) -> &'static str {
        match self {
            Self::Model => "models",
            Self::Image => "images",
        }
    }

    /// Lowercase extensions accepted for this category.
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Model => &["glb"],
            Self::Image => &["jpg", "jpeg", "png", "webp"],
        }
    }

    /// Filename used when the upload carries none.
    pub fn default_filename(self) -> &'static str {
        match self {
            Self::Model => "model.glb",
            Self::Image => "image.jpg",
        }
    }

    /// Category whose root `path` lives under.
    pub fn from_path(path: &str) -> Option<Self> {
        let root = path.split('/').next()?;
        Self::ALL.into_iter().find(|c| c.root() == root)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Model => "model",
            Self::Image => "image",
        })
    }
}

impl FromStr for Category {
    type Err = PlacementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" | "models" => Ok(Self::Model),
            "image" | "images" => Ok(Self::Image),
            other => Err(PlacementError::UnknownCategory(other.to_string())),
        }
    }
}

/// Byte ceilings per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub model: u64,
    pub image: u64,
}

impl SizeLimits {
    pub fn for_category(&self, category: Category) -> u64 {
        match category {
            Category::Model => self.model,
            Category::Image => self.image,
        }
    }

    /// Largest ceiling across categories.
    pub fn max(&self) -> u64 {
        self.model.max(self.image)
    }
}

/// Input rejected before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("Missing 'file' field or empty upload")]
    MissingFile,

    #[error("Unknown category '{0}' (expected 'model' or 'image')")]
    UnknownCategory(String),

    #[error("Only {allowed} allowed")]
    UnsupportedFormat { category: Category, allowed: String },

    #[error("File is {actual} bytes; the {category} limit is {limit} bytes")]
    PayloadTooLarge {
        category: Category,
        actual: u64,
        limit: u64,
    },
}

/// The two free-text fields an asset is filed under (e.g. brand and product).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub primary: String,
    pub secondary: String,
}

impl Classification {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// `{primary}/{secondary}`, each normalized.
    pub fn namespace_key(&self) -> String {
        format!(
            "{}/{}",
            normalize_segment(&self.primary),
            normalize_segment(&self.secondary)
        )
    }
}

/// Fully derived location of one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub category: Category,
    pub namespace: String,
    pub filename: String,
    pub path: String,
}

/// Normalize one free-text field into a path segment.
///
/// Strips diacritics, collapses runs of anything outside `[A-Za-z0-9]` to a
/// single `-`, trims separators and lowercases. Never returns an empty string.
pub fn normalize_segment(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.nfkd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push(SEPARATOR);
            }
            pending_separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if out.is_empty() {
        PLACEHOLDER_SEGMENT.to_string()
    } else {
        out
    }
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Replace every character outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_filename(filename: Option<&str>, category: Category) -> String {
    let name = filename.map(str::trim).filter(|n| !n.is_empty());
    match name {
        Some(name) => name
            .chars()
            .map(|c| if is_path_char(c) { c } else { '_' })
            .collect(),
        None => category.default_filename().to_string(),
    }
}

/// Lowercased extension of `filename`, if it has a non-empty one.
pub fn extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Reject filenames whose extension is not accepted for `category`.
pub fn check_format(category: Category, filename: &str) -> Result<(), PlacementError> {
    let allowed = category.allowed_extensions();
    match extension(filename) {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        _ => Err(PlacementError::UnsupportedFormat {
            category,
            allowed: allowed
                .iter()
                .map(|e| format!(".{e}"))
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Reject empty payloads and payloads above the category ceiling.
pub fn check_size(category: Category, size: u64, limits: &SizeLimits) -> Result<(), PlacementError> {
    if size == 0 {
        return Err(PlacementError::MissingFile);
    }
    let limit = limits.for_category(category);
    if size > limit {
        return Err(PlacementError::PayloadTooLarge {
            category,
            actual: size,
            limit,
        });
    }
    Ok(())
}

/// `{root}/{namespace}/{timestamp}-{filename}` for already-sanitized parts.
pub fn storage_path(category: Category, namespace: &str, filename: &str, timestamp: i64) -> String {
    format!("{}/{namespace}/{timestamp}-{filename}", category.root())
}

/// Validate an upload and derive where it goes.
pub fn place(
    category: Category,
    classification: &Classification,
    filename: Option<&str>,
    size: u64,
    limits: &SizeLimits,
    timestamp: i64,
) -> Result<Placement, PlacementError> {
    let filename = sanitize_filename(filename, category);
    check_format(category, &filename)?;
    check_size(category, size, limits)?;

    let namespace = classification.namespace_key();
    let path = storage_path(category, &namespace, &filename, timestamp);
    Ok(Placement {
        category,
        namespace,
        filename,
        path,
    })
}

/// Directory prefix (with trailing `/`) for listing `category`, optionally
/// narrowed to a namespace such as `"kia"` or `"Kia/Carnival"`.
pub fn listing_prefix(category: Category, namespace: Option<&str>) -> String {
    let segments: Vec<String> = namespace
        .unwrap_or_default()
        .split('/')
        .filter(|s| !s.trim().is_empty())
        .map(normalize_segment)
        .collect();
    if segments.is_empty() {
        format!("{}/", category.root())
    } else {
        format!("{}/{}/", category.root(), segments.join("/"))
    }
}

/// Checks if a path string contains path traversal patterns.
pub fn contains_path_traversal(path: &str) -> bool {
    path == ".."
        || path.starts_with("../")
        || path.contains("/../")
        || path.ends_with("/..")
        || path.starts_with("..\\")
        || path.contains("\\..\\")
        || path.ends_with("\\..")
}

/// Check that `path` names a file inside one of the category roots.
///
/// Returns the category it belongs to, or a reason it is refused.
pub fn validate_managed_path(path: &str) -> Result<Category, &'static str> {
    if path.is_empty() {
        return Err("Path cannot be empty");
    }
    if path.len() > MAX_PATH_LEN {
        return Err("Path exceeds maximum length of 512 characters");
    }
    if path.contains('\0') || path.contains('\\') {
        return Err("Path contains invalid characters");
    }
    if contains_path_traversal(path) {
        return Err("Path must not contain '..' traversal");
    }
    if path.split('/').any(|segment| segment.is_empty() || segment == ".") {
        return Err("Path must not contain empty segments");
    }
    // Same charset placement writes.
    if !path.chars().all(|c| c == '/' || is_path_char(c)) {
        return Err("Path contains invalid characters");
    }

    let category = Category::from_path(path).ok_or("Path is outside the models/ and images/ roots")?;
    if path.split('/').count() < 2 {
        return Err("Path must name a file inside a category root");
    }
    Ok(category)
}

/// Public CDN URL for `path` at `reference` (a branch name or commit id).
pub fn public_url(cdn_host: &str, owner: &str, repo: &str, reference: &str, path: &str) -> String {
    format!(
        "https://{}/gh/{owner}/{repo}@{reference}/{}",
        cdn_host.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
