use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// KeyHasher maps a key name to a raw u64; the ring manager reduces the
/// output into the identifier space. Injected by the caller: it must be
/// deterministic and reasonably uniform, but correctness does not depend on
/// cryptographic strength.
pub type KeyHasher = Arc<dyn Fn(&str) -> u64 + Send + Sync>;

/// The default hasher, built on the standard SipHash-backed `DefaultHasher`
/// with a fixed initial state so the mapping is stable across processes.
pub fn default_key_hasher() -> KeyHasher {
    Arc::new(|name: &str| {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        hasher.finish()
    })
}
