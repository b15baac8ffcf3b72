//! Built-in capability families, one module per family.

pub mod database;
pub mod deps;
pub mod env;
pub mod files;
pub mod function;
pub mod git;
pub mod plan;
pub mod site;
pub mod testing;
