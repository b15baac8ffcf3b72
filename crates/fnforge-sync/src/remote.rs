//! Remote repository collaborator
//!
//! The engine talks to the remote through `RemoteRepo`; any auth, network or
//! missing-branch failure surfaces as `Error::RemoteAccess` and aborts the
//! whole preview/selective call. `MemoryRemote` backs tests, `GithubRemote`
//! speaks the GitHub contents API.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use dashmap::DashMap;
use fnforge_core::{Error, GitConfig, Result};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct RemoteFile {
    pub path: String,
    pub content: String,
}

#[async_trait::async_trait]
pub trait RemoteRepo: Send + Sync {
    /// List files (with content) under `dir` on the configured branch.
    async fn list_files(&self, dir: &str) -> Result<Vec<RemoteFile>>;

    /// Commit the given writes and deletions with one message.
    async fn commit(
        &self,
        message: &str,
        writes: Vec<RemoteFile>,
        deletes: Vec<String>,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// In-memory remote for tests
// ---------------------------------------------------------------------------

pub struct MemoryRemote {
    files: DashMap<String, String>,
    failing: AtomicBool,
    commits: DashMap<u64, String>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
            failing: AtomicBool::new(false),
            commits: DashMap::new(),
        }
    }

    pub fn seed(&self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn get(&self, path: &str) -> Option<String> {
        self.files.get(path).map(|f| f.clone())
    }

    /// Simulate an outage: every call fails with RemoteAccess.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::remote("simulated remote outage"))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl RemoteRepo for MemoryRemote {
    async fn list_files(&self, dir: &str) -> Result<Vec<RemoteFile>> {
        self.check()?;
        let prefix = format!("{}/", dir.trim_matches('/'));
        let mut files: Vec<RemoteFile> = self
            .files
            .iter()
            .filter(|e| e.key().starts_with(&prefix))
            .map(|e| RemoteFile {
                path: e.key().clone(),
                content: e.value().clone(),
            })
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn commit(
        &self,
        message: &str,
        writes: Vec<RemoteFile>,
        deletes: Vec<String>,
    ) -> Result<()> {
        self.check()?;
        for file in writes {
            self.files.insert(file.path, file.content);
        }
        for path in deletes {
            self.files.remove(&path);
        }
        let seq = self.commits.len() as u64;
        self.commits.insert(seq, message.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// GitHub contents API client
// ---------------------------------------------------------------------------

pub struct GithubRemote {
    client: reqwest::Client,
    owner: String,
    repo: String,
    branch: String,
    token: String,
}

#[derive(Deserialize)]
struct ContentsEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    content: Option<String>,
}

impl GithubRemote {
    /// Build from a project's GitConfig. The repo URL must look like
    /// `https://github.com/{owner}/{repo}`.
    pub fn from_config(config: &GitConfig) -> Result<Self> {
        let trimmed = config
            .repo_url
            .trim_end_matches('/')
            .trim_end_matches(".git");
        let mut segments = trimmed.rsplit('/');
        let repo = segments.next().unwrap_or_default();
        let owner = segments.next().unwrap_or_default();
        if owner.is_empty() || repo.is_empty() {
            return Err(Error::remote(format!(
                "unrecognized repository url: {}",
                config.repo_url
            )));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: config.branch.clone(),
            token: config.token.clone(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "https://api.github.com/repos/{}/{}/contents/{}",
            self.owner, self.repo, path
        )
    }

    async fn get_entry(&self, path: &str) -> Result<Option<ContentsEntry>> {
        let response = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .bearer_auth(&self.token)
            .header("User-Agent", "fnforge-sync")
            .send()
            .await
            .map_err(|e| Error::remote(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Error::remote(format!(
                "GET {} -> {}",
                path,
                response.status()
            )));
        }
        let entry: ContentsEntry = response
            .json()
            .await
            .map_err(|e| Error::remote(e.to_string()))?;
        Ok(Some(entry))
    }

    fn decode_content(entry: &ContentsEntry) -> Result<String> {
        let raw: String = entry
            .content
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let bytes = BASE64
            .decode(raw)
            .map_err(|e| Error::remote(format!("bad blob for {}: {}", entry.path, e)))?;
        String::from_utf8(bytes)
            .map_err(|e| Error::remote(format!("non-utf8 blob for {}: {}", entry.path, e)))
    }
}

#[async_trait::async_trait]
impl RemoteRepo for GithubRemote {
    async fn list_files(&self, dir: &str) -> Result<Vec<RemoteFile>> {
        let response = self
            .client
            .get(self.contents_url(dir.trim_matches('/')))
            .query(&[("ref", self.branch.as_str())])
            .bearer_auth(&self.token)
            .header("User-Agent", "fnforge-sync")
            .send()
            .await
            .map_err(|e| Error::remote(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // Missing directory on the branch means nothing synced yet.
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Error::remote(format!(
                "list {} on {} -> {}",
                dir,
                self.branch,
                response.status()
            )));
        }

        let entries: Vec<ContentsEntry> = response
            .json()
            .await
            .map_err(|e| Error::remote(e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries.into_iter().filter(|e| e.kind == "file") {
            let full = self
                .get_entry(&entry.path)
                .await?
                .ok_or_else(|| Error::remote(format!("{} vanished mid-listing", entry.path)))?;
            files.push(RemoteFile {
                path: full.path.clone(),
                content: Self::decode_content(&full)?,
            });
        }
        debug!(dir, count = files.len(), "listed remote files");
        Ok(files)
    }

    async fn commit(
        &self,
        message: &str,
        writes: Vec<RemoteFile>,
        deletes: Vec<String>,
    ) -> Result<()> {
        for file in writes {
            let existing = self.get_entry(&file.path).await?;
            let mut body = json!({
                "message": message,
                "branch": self.branch,
                "content": BASE64.encode(file.content.as_bytes()),
            });
            if let Some(entry) = existing {
                body["sha"] = json!(entry.sha);
            }
            let response = self
                .client
                .put(self.contents_url(&file.path))
                .bearer_auth(&self.token)
                .header("User-Agent", "fnforge-sync")
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::remote(e.to_string()))?;
            if !response.status().is_success() {
                return Err(Error::remote(format!(
                    "PUT {} -> {}",
                    file.path,
                    response.status()
                )));
            }
        }

        for path in deletes {
            let Some(entry) = self.get_entry(&path).await? else {
                continue;
            };
            let body = json!({
                "message": message,
                "branch": self.branch,
                "sha": entry.sha,
            });
            let response = self
                .client
                .delete(self.contents_url(&path))
                .bearer_auth(&self.token)
                .header("User-Agent", "fnforge-sync")
                .json(&body)
                .send()
                .await
                .map_err(|e| Error::remote(e.to_string()))?;
            if !response.status().is_success() {
                return Err(Error::remote(format!(
                    "DELETE {} -> {}",
                    path,
                    response.status()
                )));
            }
        }
        Ok(())
    }
}
