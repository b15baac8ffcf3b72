//! Fnforge Sync - Bidirectional git synchronization with conflict detection
//!
//! Local functions and a remote repository are compared three ways against
//! the baseline recorded at the last sync. Previews never mutate; selective
//! calls apply only the chosen names. Conflicts are never auto-merged — the
//! caller resolves each one explicitly.

pub mod adapter;
pub mod engine;
pub mod remote;

pub use adapter::{insert_runtime_import, strip_runtime_import, RUNTIME_IMPORT};
pub use engine::{Resolution, SyncEngine, SyncItem, SyncPreview, SyncReport, SyncStatus};
pub use remote::{GithubRemote, MemoryRemote, RemoteFile, RemoteRepo};
