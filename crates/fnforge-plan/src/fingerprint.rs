//! State fingerprints for optimistic concurrency
//!
//! A fingerprint covers the code of every targeted function plus the
//! canonicalized intent, so any edit to a target between analyze and confirm
//! changes the digest. Targets are hashed in sorted order; an absent
//! function contributes a sentinel so create-after-delete is detected too.

use sha2::{Digest, Sha256};

const ABSENT: &str = "<absent>";

/// Digest over (name, code) pairs and the intent string. `code` is None for
/// a target that does not currently exist.
pub fn state_fingerprint(targets: &[(String, Option<String>)], intent: &str) -> String {
    let mut sorted: Vec<&(String, Option<String>)> = targets.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (name, code) in sorted {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(code.as_deref().unwrap_or(ABSENT).as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(intent.as_bytes());

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        hex.push_str(&format!("{:02x}", byte));
    }
    hex
}
