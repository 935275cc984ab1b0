//! GitHub push ingestion.
//!
//! A push notification becomes a deduplicated, filtered set of file paths;
//! each surviving file is fetched from the raw-content host and forwarded
//! straight to the tenant's assistant. Push content bypasses the document
//! registry — it is delivered on every push that touches a file, with no
//! change-hash tracking. Deletions are not propagated.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GithubConfig;
use crate::memory::MemoryBackend;
use crate::sync::{resolve_tenant, SyncError};

/// Directory names that never contain onboarding-relevant text. A path is
/// skipped when any segment before the filename matches.
const SKIP_DIRECTORIES: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".next",
    "vendor",
    ".idea",
    ".vscode",
];

/// Filename suffixes to skip: binary image formats, lockfiles, env files,
/// and YAML config noise.
const SKIP_SUFFIXES: &[&str] = &[
    ".png",
    ".jpg",
    ".jpeg",
    ".gif",
    ".bmp",
    ".tiff",
    ".ico",
    ".webp",
    ".yaml",
    ".yml",
    ".lock",
    ".env",
    ".gitignore",
];

/// A GitHub push webhook payload, reduced to the fields the adapter reads.
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    pub repository: Repository,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: Owner,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Webhook payloads carry the owner as `name` (push events) or `login`
/// (other event families); accept either.
#[derive(Debug, Clone, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
}

impl PushEvent {
    /// Branch the push landed on, from the symbolic ref when present.
    pub fn branch(&self) -> &str {
        if let Some(branch) = self.git_ref.strip_prefix("refs/heads/") {
            if !branch.is_empty() {
                return branch;
            }
        }
        self.repository.default_branch.as_deref().unwrap_or("main")
    }

    pub fn owner_name(&self) -> Option<&str> {
        self.repository
            .owner
            .name
            .as_deref()
            .or(self.repository.owner.login.as_deref())
    }
}

/// Union of every commit's added and modified paths, set-deduplicated. A
/// path touched by several commits in one push is ingested once. Removed
/// paths are ignored entirely.
pub fn changed_paths(event: &PushEvent) -> BTreeSet<String> {
    let mut paths = BTreeSet::new();
    for commit in &event.commits {
        paths.extend(commit.added.iter().cloned());
        paths.extend(commit.modified.iter().cloned());
    }
    paths
}

/// Whether a repository path survives the skip-rules. The filename itself
/// is exempt from the directory check, so a file literally named `vendor`
/// at the repo root would pass.
pub fn should_ingest_path(path: &str) -> bool {
    let segments: Vec<&str> = path.split('/').collect();
    let (filename, directories) = match segments.split_last() {
        Some(split) => split,
        None => return false,
    };

    if directories.iter().any(|d| SKIP_DIRECTORIES.contains(d)) {
        return false;
    }
    !SKIP_SUFFIXES.iter().any(|suffix| filename.ends_with(suffix))
}

/// What happened to each path in one push.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PushIngest {
    pub ingested: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl PushIngest {
    /// True when nothing was forwarded — the push is reported as ignored,
    /// not as an error.
    pub fn is_ignored(&self) -> bool {
        self.ingested.is_empty()
    }
}

pub struct GithubIngestor {
    http: reqwest::Client,
    raw_base: String,
}

impl GithubIngestor {
    pub fn new(raw_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(Self {
            http,
            raw_base: raw_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GithubConfig) -> Result<Self> {
        Self::new(config.raw_base.clone())
    }

    fn raw_url(&self, owner: &str, repo: &str, branch: &str, path: &str) -> String {
        format!("{}/{}/{}/{}/{}", self.raw_base, owner, repo, branch, path)
    }

    async fn fetch_raw(&self, owner: &str, repo: &str, branch: &str, path: &str) -> Result<String> {
        let url = self.raw_url(owner, repo, branch, path);
        let body = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("raw fetch of {} failed", path))?
            .error_for_status()
            .with_context(|| format!("raw fetch of {} was rejected", path))?
            .text()
            .await
            .with_context(|| format!("raw body of {} was not readable", path))?;
        Ok(body)
    }

    /// Forward a push's surviving files to the tenant's assistant.
    /// Individual fetch or upload failures are logged and skipped — they
    /// never fail the batch.
    pub async fn ingest_push(
        &self,
        pool: &SqlitePool,
        backend: &dyn MemoryBackend,
        tenant_id: &str,
        event: &PushEvent,
    ) -> Result<PushIngest, SyncError> {
        let (api_key, assistant_id) = resolve_tenant(pool, tenant_id).await?;

        let owner = event.owner_name().unwrap_or_default();
        let repo = &event.repository.name;
        let branch = event.branch();

        let mut result = PushIngest::default();

        for path in changed_paths(event) {
            if !should_ingest_path(&path) {
                result.skipped.push(path);
                continue;
            }

            let content = match self.fetch_raw(owner, repo, branch, &path).await {
                Ok(content) => content,
                Err(err) => {
                    warn!(path = %path, error = %err, "skipping file after fetch failure");
                    result.failed.push(path);
                    continue;
                }
            };

            let body = compose_push_body(owner, repo, branch, &path, &content);
            match backend
                .upload_document(&api_key, &assistant_id, &path, &body)
                .await
            {
                Ok(_) => result.ingested.push(path),
                Err(err) => {
                    warn!(path = %path, error = %err, "skipping file after upload failure");
                    result.failed.push(path);
                }
            }
        }

        if result.is_ignored() {
            info!(repo = %repo, "push contained no ingestible files");
        } else {
            info!(repo = %repo, files = result.ingested.len(), "push ingested");
        }
        Ok(result)
    }
}

fn compose_push_body(owner: &str, repo: &str, branch: &str, path: &str, content: &str) -> String {
    let link = format!("https://github.com/{}/{}/blob/{}/{}", owner, repo, branch, path);
    format!(
        "Document: {}\nRepository: {}/{}@{}\nSource: GitHub\nLink: {}\n\n{}\n\n{}",
        path,
        owner,
        repo,
        branch,
        link,
        "=".repeat(60),
        content
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_event(commits: Vec<PushCommit>) -> PushEvent {
        PushEvent {
            git_ref: "refs/heads/main".to_string(),
            repository: Repository {
                name: "widget".to_string(),
                owner: Owner {
                    name: Some("acme".to_string()),
                    login: None,
                },
                default_branch: None,
            },
            commits,
        }
    }

    #[test]
    fn paths_touched_by_multiple_commits_dedup_to_one() {
        let event = push_event(vec![
            PushCommit {
                added: vec!["src/app.py".to_string()],
                ..Default::default()
            },
            PushCommit {
                modified: vec!["src/app.py".to_string(), "README.md".to_string()],
                ..Default::default()
            },
        ]);

        let paths = changed_paths(&event);
        assert_eq!(paths.len(), 2);
        assert!(paths.contains("src/app.py"));
        assert!(paths.contains("README.md"));
    }

    #[test]
    fn removed_paths_are_ignored() {
        let event = push_event(vec![PushCommit {
            removed: vec!["src/old.py".to_string()],
            ..Default::default()
        }]);
        assert!(changed_paths(&event).is_empty());
    }

    #[test]
    fn skip_rules_filter_binaries_lockfiles_and_vendored_dirs() {
        assert!(!should_ingest_path("vendor/lib/x.lock"));
        assert!(!should_ingest_path("src/app.png"));
        assert!(!should_ingest_path("node_modules/pkg/index.js"));
        assert!(!should_ingest_path("deploy/config.yaml"));
        assert!(!should_ingest_path(".env"));
        assert!(should_ingest_path("src/app.py"));
        assert!(should_ingest_path("docs/setup.md"));
    }

    #[test]
    fn directory_check_exempts_the_filename() {
        // Only path segments before the filename count as directories.
        assert!(should_ingest_path("vendor"));
        assert!(!should_ingest_path("vendor/readme.txt"));
    }

    #[test]
    fn branch_comes_from_the_symbolic_ref() {
        let mut event = push_event(vec![]);
        assert_eq!(event.branch(), "main");

        event.git_ref = "refs/heads/release/v2".to_string();
        assert_eq!(event.branch(), "release/v2");

        event.git_ref = String::new();
        event.repository.default_branch = Some("trunk".to_string());
        assert_eq!(event.branch(), "trunk");
    }

    #[test]
    fn webhook_payload_deserializes() {
        let payload = r#"{
            "ref": "refs/heads/main",
            "repository": {
                "name": "widget",
                "owner": { "name": "acme" },
                "default_branch": "main"
            },
            "commits": [
                { "added": ["src/app.py"], "modified": [], "removed": [] }
            ]
        }"#;
        let event: PushEvent = serde_json::from_str(payload).unwrap();
        assert_eq!(event.owner_name(), Some("acme"));
        assert_eq!(event.branch(), "main");
        assert_eq!(changed_paths(&event).len(), 1);
    }

    #[test]
    fn raw_url_is_owner_repo_branch_path() {
        let ingestor = GithubIngestor::new("https://raw.githubusercontent.com").unwrap();
        assert_eq!(
            ingestor.raw_url("acme", "widget", "main", "src/app.py"),
            "https://raw.githubusercontent.com/acme/widget/main/src/app.py"
        );
    }
}
