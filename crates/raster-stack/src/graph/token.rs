//! Deterministic layer names.

use std::collections::hash_map::DefaultHasher;
use std::hash::Hasher;

/// Hash whatever `feed` writes into a 16-digit hex token.
///
/// Identical inputs give identical tokens within one build of the crate,
/// which is all graph names need.
pub fn tokenize(feed: impl FnOnce(&mut DefaultHasher)) -> String {
    let mut hasher = DefaultHasher::new();
    feed(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// `"<prefix>-<token>"`.
pub fn layer_name(prefix: &str, token: &str) -> String {
    format!("{}-{}", prefix, token)
}
