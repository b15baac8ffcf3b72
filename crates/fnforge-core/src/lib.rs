//! Fnforge Core - Types, collaborator traits, and error handling

pub mod conversation;
pub mod error;
pub mod locks;
pub mod store;
pub mod types;

pub use conversation::{Conversation, ConversationRegistry, Message, MessageId, Role};
pub use error::{Error, FailureKind, Result};
pub use locks::{TargetGuards, TargetLocks};
pub use store::{
    Compiler, MemoryCompiler, MemoryObjects, MemoryProject, MemorySql, ObjectStore,
    ProjectContext, ProjectStore, SqlExecutor,
};
pub use types::*;
