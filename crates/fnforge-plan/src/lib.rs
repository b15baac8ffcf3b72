//! Fnforge Plan - Propose/confirm workflow for multi-function changes
//!
//! Structural edits that touch several functions at once (decompose one into
//! pieces, merge several into one) are split into two capabilities: a
//! read-only analysis that produces an immutable fingerprinted Plan, and a
//! confirmation that re-checks the fingerprint against live state before
//! applying the plan's operations in order.

pub mod engine;
pub mod fingerprint;

pub use engine::{ApplyReport, PlanEngine, PlanPiece};
pub use fingerprint::state_fingerprint;
