//! Three-way sync engine

use crate::adapter::{insert_runtime_import, strip_runtime_import};
use crate::remote::{RemoteFile, RemoteRepo};
use chrono::{DateTime, Utc};
use fnforge_core::{Error, FunctionRecord, GitConfig, ProjectStore, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Added,
    Modified,
    Deleted,
    Conflict,
}

/// Caller's decision for a conflicted name in a selective call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Local,
    Remote,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncItem {
    pub name: String,
    pub path: String,
    pub status: SyncStatus,
    pub local_code: Option<String>,
    pub remote_code: Option<String>,
    pub local_updated_at: Option<DateTime<Utc>>,
}

/// Read-only snapshot of pending sync work. Unchanged names are omitted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncPreview {
    pub items: Vec<SyncItem>,
    pub has_conflicts: bool,
}

impl SyncPreview {
    pub fn item(&self, name: &str) -> Option<&SyncItem> {
        self.items.iter().find(|i| i.name == name)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SyncReport {
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Pull,
    Push,
}

pub struct SyncEngine {
    store: Arc<dyn ProjectStore>,
    remote: Arc<dyn RemoteRepo>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn ProjectStore>, remote: Arc<dyn RemoteRepo>) -> Self {
        Self { store, remote }
    }

    pub async fn preview_pull(&self) -> Result<SyncPreview> {
        let (config, locals, remotes) = self.load_state().await?;
        Ok(classify(&config, &locals, &remotes, Direction::Pull))
    }

    pub async fn preview_push(&self) -> Result<SyncPreview> {
        let (config, locals, remotes) = self.load_state().await?;
        Ok(classify(&config, &locals, &remotes, Direction::Push))
    }

    /// Apply the remote version of each chosen name locally. Conflicted
    /// names require an explicit resolution; a missing one fails the whole
    /// call before anything mutates.
    pub async fn selective_pull(
        &self,
        names: &[String],
        resolutions: &HashMap<String, Resolution>,
    ) -> Result<SyncReport> {
        let (mut config, locals, remotes) = self.load_state().await?;
        let preview = classify(&config, &locals, &remotes, Direction::Pull);

        let chosen = select(&preview, names, resolutions)?;
        let mut report = SyncReport::default();

        for name in names {
            let Some(item) = chosen.get(name.as_str()) else {
                report.skipped.push(name.clone());
                continue;
            };
            let resolution = resolutions.get(name.as_str()).copied();
            match effective(item.status, resolution, Direction::Pull) {
                Apply::TakeSource => {
                    let code = item.remote_code.as_deref().unwrap_or_default();
                    self.store.upsert_function(name, code).await;
                    config.baselines.insert(name.clone(), hash_code(code));
                }
                Apply::PropagateDelete => {
                    self.store.delete_function(name).await;
                    config.baselines.remove(name.as_str());
                }
                Apply::KeepTarget => {
                    let code = item.local_code.as_deref().unwrap_or_default();
                    config.baselines.insert(name.clone(), hash_code(code));
                }
            }
            report.applied.push(name.clone());
        }

        config.last_synced_at = Some(Utc::now());
        self.store.set_git_config(config).await;
        info!(applied = report.applied.len(), skipped = report.skipped.len(), "pull complete");
        Ok(report)
    }

    /// Mirror of selective_pull: commit the chosen local versions to the
    /// remote in a single commit, re-inserting the runtime import.
    pub async fn selective_push(
        &self,
        names: &[String],
        resolutions: &HashMap<String, Resolution>,
    ) -> Result<SyncReport> {
        let (mut config, locals, remotes) = self.load_state().await?;
        let preview = classify(&config, &locals, &remotes, Direction::Push);

        let chosen = select(&preview, names, resolutions)?;
        let mut report = SyncReport::default();
        let mut writes: Vec<RemoteFile> = Vec::new();
        let mut deletes: Vec<String> = Vec::new();
        let mut baselines: Vec<(String, Option<String>)> = Vec::new();

        for name in names {
            let Some(item) = chosen.get(name.as_str()) else {
                report.skipped.push(name.clone());
                continue;
            };
            let resolution = resolutions.get(name.as_str()).copied();
            match effective(item.status, resolution, Direction::Push) {
                Apply::TakeSource => {
                    let code = item.local_code.as_deref().unwrap_or_default();
                    writes.push(RemoteFile {
                        path: item.path.clone(),
                        content: insert_runtime_import(code),
                    });
                    baselines.push((name.clone(), Some(hash_code(code))));
                }
                Apply::PropagateDelete => {
                    deletes.push(item.path.clone());
                    baselines.push((name.clone(), None));
                }
                Apply::KeepTarget => {
                    let code = item.remote_code.as_deref().unwrap_or_default();
                    baselines.push((name.clone(), Some(hash_code(code))));
                }
            }
            report.applied.push(name.clone());
        }

        if !writes.is_empty() || !deletes.is_empty() {
            let message = format!(
                "fnforge: sync {} function(s)",
                writes.len() + deletes.len()
            );
            self.remote.commit(&message, writes, deletes).await?;
        }

        for (name, baseline) in baselines {
            match baseline {
                Some(hash) => {
                    config.baselines.insert(name, hash);
                }
                None => {
                    config.baselines.remove(&name);
                }
            }
        }
        config.last_synced_at = Some(Utc::now());
        self.store.set_git_config(config).await;
        info!(applied = report.applied.len(), skipped = report.skipped.len(), "push complete");
        Ok(report)
    }

    async fn load_state(
        &self,
    ) -> Result<(GitConfig, HashMap<String, FunctionRecord>, HashMap<String, (String, String)>)>
    {
        let config = self
            .store
            .git_config()
            .await
            .ok_or_else(|| Error::remote("git synchronization is not configured"))?;

        let locals: HashMap<String, FunctionRecord> = self
            .store
            .list_functions()
            .await
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();

        // Remote failures abort the whole call; nothing is applied.
        let files = self.remote.list_files(&config.functions_dir).await?;
        let mut remotes = HashMap::new();
        for file in files {
            let name = function_name(&config.functions_dir, &file.path);
            remotes.insert(name, (file.path, strip_runtime_import(&file.content)));
        }
        debug!(local = locals.len(), remote = remotes.len(), "sync state loaded");
        Ok((config, locals, remotes))
    }
}

enum Apply {
    /// Take the source side's content (remote on pull, local on push).
    TakeSource,
    /// Propagate a deletion to the target side.
    PropagateDelete,
    /// Keep the target side's content, advancing the baseline only.
    KeepTarget,
}

fn effective(status: SyncStatus, resolution: Option<Resolution>, direction: Direction) -> Apply {
    match status {
        SyncStatus::Added | SyncStatus::Modified => Apply::TakeSource,
        SyncStatus::Deleted => Apply::PropagateDelete,
        SyncStatus::Conflict => {
            // select() guarantees a resolution is present for conflicts.
            let ours = match direction {
                Direction::Pull => Resolution::Local,
                Direction::Push => Resolution::Remote,
            };
            if resolution == Some(ours) {
                Apply::KeepTarget
            } else {
                Apply::TakeSource
            }
        }
    }
}

/// Validate the chosen names against the preview: unknown names are simply
/// skipped later, but a conflict without an explicit resolution rejects the
/// whole call up front.
fn select<'a>(
    preview: &'a SyncPreview,
    names: &[String],
    resolutions: &HashMap<String, Resolution>,
) -> Result<HashMap<&'a str, &'a SyncItem>> {
    let mut chosen = HashMap::new();
    for name in names {
        if let Some(item) = preview.item(name) {
            if item.status == SyncStatus::Conflict && !resolutions.contains_key(name.as_str()) {
                return Err(Error::InvalidArguments(format!(
                    "'{}' is conflicted; choose local or remote",
                    name
                )));
            }
            chosen.insert(item.name.as_str(), item);
        }
    }
    Ok(chosen)
}

fn classify(
    config: &GitConfig,
    locals: &HashMap<String, FunctionRecord>,
    remotes: &HashMap<String, (String, String)>,
    direction: Direction,
) -> SyncPreview {
    let names: BTreeSet<&String> = locals.keys().chain(remotes.keys()).collect();
    let mut preview = SyncPreview::default();

    for name in names {
        let local = locals.get(name.as_str());
        let remote = remotes.get(name.as_str());
        let baseline = config.baselines.get(name.as_str());

        let status = match (local, remote) {
            (None, Some(_)) => match direction {
                Direction::Pull => Some(SyncStatus::Added),
                // Present remotely with a baseline means it was deleted
                // locally since the last sync; push propagates the delete.
                Direction::Push => baseline.map(|_| SyncStatus::Deleted),
            },
            (Some(_), None) => match direction {
                Direction::Pull => baseline.map(|_| SyncStatus::Deleted),
                Direction::Push => Some(SyncStatus::Added),
            },
            (Some(local), Some((_, remote_code))) => {
                if local.code == *remote_code {
                    None
                } else {
                    let local_hash = hash_code(&local.code);
                    let remote_hash = hash_code(remote_code);
                    // With no baseline the source side of the sync counts as
                    // changed; only a recorded baseline can prove both sides
                    // diverged.
                    let (source_changed, target_changed) = match direction {
                        Direction::Pull => (
                            baseline.map_or(true, |b| *b != remote_hash),
                            baseline.is_some_and(|b| *b != local_hash),
                        ),
                        Direction::Push => (
                            baseline.map_or(true, |b| *b != local_hash),
                            baseline.is_some_and(|b| *b != remote_hash),
                        ),
                    };
                    match (source_changed, target_changed) {
                        (true, true) => Some(SyncStatus::Conflict),
                        (true, false) => Some(SyncStatus::Modified),
                        (false, _) => None,
                    }
                }
            }
            (None, None) => None,
        };

        if let Some(status) = status {
            if status == SyncStatus::Conflict {
                preview.has_conflicts = true;
            }
            preview.items.push(SyncItem {
                name: name.clone(),
                path: remote
                    .map(|(path, _)| path.clone())
                    .unwrap_or_else(|| remote_path(config, name)),
                status,
                local_code: local.map(|l| l.code.clone()),
                remote_code: remote.map(|(_, code)| code.clone()),
                local_updated_at: local.map(|l| l.updated_at),
            });
        }
    }
    preview
}

fn hash_code(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}

fn remote_path(config: &GitConfig, name: &str) -> String {
    format!("{}/{}.ts", config.functions_dir.trim_matches('/'), name)
}

fn function_name(dir: &str, path: &str) -> String {
    let prefix = format!("{}/", dir.trim_matches('/'));
    let rest = path.strip_prefix(&prefix).unwrap_or(path);
    match rest.rsplit_once('.') {
        Some((stem, _)) => stem.to_string(),
        None => rest.to_string(),
    }
}
