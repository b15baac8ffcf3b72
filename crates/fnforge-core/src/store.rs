//! Collaborator traits and in-memory implementations
//!
//! The document store, object store, compiler and SQL engine are external
//! systems; the orchestrator only depends on the contracts here. The memory
//! implementations back tests and local development.

use crate::error::{Error, Result};
use crate::types::{Dependency, EnvVar, FunctionRecord, GitConfig, Plan, SiteFile};
use chrono::Utc;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Project-scoped document records: functions, site files, dependencies,
/// environment variables, database schema, plans, git settings.
#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_function(&self, name: &str) -> Option<FunctionRecord>;
    async fn list_functions(&self) -> Vec<FunctionRecord>;
    async fn upsert_function(&self, name: &str, code: &str) -> FunctionRecord;
    async fn delete_function(&self, name: &str) -> bool;

    async fn get_site_file(&self, path: &str) -> Option<SiteFile>;
    async fn list_site_files(&self) -> Vec<SiteFile>;
    async fn upsert_site_file(&self, path: &str, content: &str) -> SiteFile;
    async fn delete_site_file(&self, path: &str) -> bool;

    async fn dependencies(&self) -> Vec<Dependency>;
    async fn add_dependency(&self, name: &str, version: &str);
    async fn remove_dependency(&self, name: &str) -> bool;

    async fn env_vars(&self) -> Vec<EnvVar>;
    async fn set_env_var(&self, name: &str, value: &str);
    async fn unset_env_var(&self, name: &str) -> bool;

    async fn schema(&self) -> Value;
    async fn set_schema(&self, schema: Value);

    async fn get_plan(&self, id: &str) -> Option<Plan>;
    async fn put_plan(&self, plan: Plan);
    async fn delete_plan(&self, id: &str) -> bool;

    async fn git_config(&self) -> Option<GitConfig>;
    async fn set_git_config(&self, config: GitConfig);
}

/// Blob storage used by file-upload and test-input capabilities.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    async fn get(&self, key: &str) -> Option<(Vec<u8>, String)>;
    async fn delete(&self, key: &str) -> bool;
}

/// Source-to-executable compiler for user function code. Compile failures
/// surface as `Error::Compile` so the dispatcher can classify them.
#[async_trait::async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, code: &str) -> Result<()>;
    async fn run(&self, code: &str, input: &Value) -> Result<Value>;
}

/// Query engine for the project database.
#[async_trait::async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<Value>;
}

/// Bundle of collaborators handed to capability handlers.
#[derive(Clone)]
pub struct ProjectContext {
    pub project: Arc<dyn ProjectStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub compiler: Arc<dyn Compiler>,
    pub sql: Arc<dyn SqlExecutor>,
}

impl ProjectContext {
    /// All-in-memory context for tests and local development.
    pub fn in_memory() -> Self {
        Self {
            project: Arc::new(MemoryProject::new()),
            objects: Arc::new(MemoryObjects::new()),
            compiler: Arc::new(MemoryCompiler::new()),
            sql: Arc::new(MemorySql::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

pub struct MemoryProject {
    functions: DashMap<String, FunctionRecord>,
    site_files: DashMap<String, SiteFile>,
    dependencies: DashMap<String, String>,
    env_vars: DashMap<String, String>,
    schema: RwLock<Value>,
    plans: DashMap<String, Plan>,
    git: RwLock<Option<GitConfig>>,
}

impl Default for MemoryProject {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProject {
    pub fn new() -> Self {
        Self {
            functions: DashMap::new(),
            site_files: DashMap::new(),
            dependencies: DashMap::new(),
            env_vars: DashMap::new(),
            schema: RwLock::new(json!({ "tables": [] })),
            plans: DashMap::new(),
            git: RwLock::new(None),
        }
    }
}

#[async_trait::async_trait]
impl ProjectStore for MemoryProject {
    async fn get_function(&self, name: &str) -> Option<FunctionRecord> {
        self.functions.get(name).map(|f| f.clone())
    }

    async fn list_functions(&self) -> Vec<FunctionRecord> {
        let mut functions: Vec<FunctionRecord> =
            self.functions.iter().map(|f| f.clone()).collect();
        functions.sort_by(|a, b| a.name.cmp(&b.name));
        functions
    }

    async fn upsert_function(&self, name: &str, code: &str) -> FunctionRecord {
        let record = FunctionRecord {
            name: name.to_string(),
            code: code.to_string(),
            updated_at: Utc::now(),
        };
        self.functions.insert(name.to_string(), record.clone());
        record
    }

    async fn delete_function(&self, name: &str) -> bool {
        self.functions.remove(name).is_some()
    }

    async fn get_site_file(&self, path: &str) -> Option<SiteFile> {
        self.site_files.get(path).map(|f| f.clone())
    }

    async fn list_site_files(&self) -> Vec<SiteFile> {
        let mut files: Vec<SiteFile> = self.site_files.iter().map(|f| f.clone()).collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    async fn upsert_site_file(&self, path: &str, content: &str) -> SiteFile {
        let file = SiteFile {
            path: path.to_string(),
            content: content.to_string(),
            updated_at: Utc::now(),
        };
        self.site_files.insert(path.to_string(), file.clone());
        file
    }

    async fn delete_site_file(&self, path: &str) -> bool {
        self.site_files.remove(path).is_some()
    }

    async fn dependencies(&self) -> Vec<Dependency> {
        let mut deps: Vec<Dependency> = self
            .dependencies
            .iter()
            .map(|e| Dependency {
                name: e.key().clone(),
                version: e.value().clone(),
            })
            .collect();
        deps.sort_by(|a, b| a.name.cmp(&b.name));
        deps
    }

    async fn add_dependency(&self, name: &str, version: &str) {
        self.dependencies
            .insert(name.to_string(), version.to_string());
    }

    async fn remove_dependency(&self, name: &str) -> bool {
        self.dependencies.remove(name).is_some()
    }

    async fn env_vars(&self) -> Vec<EnvVar> {
        let mut vars: Vec<EnvVar> = self
            .env_vars
            .iter()
            .map(|e| EnvVar {
                name: e.key().clone(),
                value: e.value().clone(),
            })
            .collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        vars
    }

    async fn set_env_var(&self, name: &str, value: &str) {
        self.env_vars.insert(name.to_string(), value.to_string());
    }

    async fn unset_env_var(&self, name: &str) -> bool {
        self.env_vars.remove(name).is_some()
    }

    async fn schema(&self) -> Value {
        self.schema.read().await.clone()
    }

    async fn set_schema(&self, schema: Value) {
        *self.schema.write().await = schema;
    }

    async fn get_plan(&self, id: &str) -> Option<Plan> {
        self.plans.get(id).map(|p| p.clone())
    }

    async fn put_plan(&self, plan: Plan) {
        self.plans.insert(plan.id.clone(), plan);
    }

    async fn delete_plan(&self, id: &str) -> bool {
        self.plans.remove(id).is_some()
    }

    async fn git_config(&self) -> Option<GitConfig> {
        self.git.read().await.clone()
    }

    async fn set_git_config(&self, config: GitConfig) {
        *self.git.write().await = Some(config);
    }
}

pub struct MemoryObjects {
    objects: DashMap<String, (Vec<u8>, String)>,
}

impl Default for MemoryObjects {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjects {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjects {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.objects
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects.get(key).map(|o| o.clone())
    }

    async fn delete(&self, key: &str) -> bool {
        self.objects.remove(key).is_some()
    }
}

/// Compiler stand-in: rejects code containing the failure marker, echoes
/// input on run. Enough to exercise the CompileError path end to end.
pub struct MemoryCompiler {
    fail_marker: String,
}

impl Default for MemoryCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCompiler {
    pub fn new() -> Self {
        Self {
            fail_marker: "%SYNTAX_ERROR%".to_string(),
        }
    }

    pub fn with_fail_marker(marker: impl Into<String>) -> Self {
        Self {
            fail_marker: marker.into(),
        }
    }
}

#[async_trait::async_trait]
impl Compiler for MemoryCompiler {
    async fn compile(&self, code: &str) -> Result<()> {
        if code.contains(&self.fail_marker) {
            return Err(Error::Compile(format!(
                "unexpected token near '{}'",
                self.fail_marker
            )));
        }
        Ok(())
    }

    async fn run(&self, code: &str, input: &Value) -> Result<Value> {
        self.compile(code).await?;
        Ok(json!({ "ok": true, "echo": input }))
    }
}

pub struct MemorySql {
    log: RwLock<Vec<String>>,
}

impl Default for MemorySql {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySql {
    pub fn new() -> Self {
        Self {
            log: RwLock::new(Vec::new()),
        }
    }

    pub async fn executed(&self) -> Vec<String> {
        self.log.read().await.clone()
    }
}

#[async_trait::async_trait]
impl SqlExecutor for MemorySql {
    async fn execute(&self, sql: &str) -> Result<Value> {
        if sql.trim().is_empty() {
            return Err(Error::handler("empty statement"));
        }
        self.log.write().await.push(sql.to_string());
        Ok(json!({ "rows": [], "statement": sql }))
    }
}
