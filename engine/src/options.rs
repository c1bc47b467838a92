//! Compile options and the environment knobs spec §6 requires the
//! coordinator to expose: cache directory, options-hash salt, and default
//! sandbox limits.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mlpy_sandbox::SandboxLimits;
use sha2::{Digest, Sha256};

/// The compiler's own version string, folded into the artifact cache key
/// alongside the unit hash and the options hash (spec §3, §4.13) so that a
/// compiler upgrade invalidates stale cache entries without needing to
/// touch the source.
pub const COMPILER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Per-compile configuration. Two `CompileOptions` with equal
/// [`CompileOptions::options_hash`] are interchangeable for caching
/// purposes.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub source_name: String,
    pub enable_optimizer: bool,
    pub pattern_rules_salt: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            source_name: "<module>".to_string(),
            enable_optimizer: true,
            pattern_rules_salt: std::env::var("MLPY_OPTIONS_SALT").unwrap_or_default(),
        }
    }
}

impl CompileOptions {
    /// Hex-encoded SHA-256 of every option that affects codegen or
    /// analysis output, used as the third cache-key component.
    #[must_use]
    pub fn options_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_name.as_bytes());
        hasher.update([u8::from(self.enable_optimizer)]);
        hasher.update(self.pattern_rules_salt.as_bytes());
        hasher.update(COMPILER_VERSION.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// Artifact cache directory, resolved from `MLPY_CACHE_DIR` if set,
/// otherwise `dirs::cache_dir()/mlpy` (spec §6 "environment knobs").
#[must_use]
pub fn cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MLPY_CACHE_DIR") {
        return PathBuf::from(dir);
    }
    dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".")).join("mlpy")
}

/// Default sandbox limits, overridable per call; seeded from
/// `MLPY_SANDBOX_*` environment variables when present.
#[must_use]
pub fn default_sandbox_limits() -> SandboxLimits {
    let mut limits = SandboxLimits::default();
    if let Ok(v) = std::env::var("MLPY_SANDBOX_WALLCLOCK_SECONDS") {
        if let Ok(v) = v.parse() {
            limits.wallclock_seconds = v;
        }
    }
    if let Ok(v) = std::env::var("MLPY_SANDBOX_CPU_SECONDS") {
        if let Ok(v) = v.parse() {
            limits.cpu_seconds = Some(v);
        }
    }
    if let Ok(v) = std::env::var("MLPY_SANDBOX_MEMORY_LIMIT_BYTES") {
        if let Ok(v) = v.parse() {
            limits.memory_limit_bytes = Some(v);
        }
    }
    if let Ok(v) = std::env::var("MLPY_SANDBOX_DISABLE_NETWORK") {
        limits.disable_network = v == "1" || v.eq_ignore_ascii_case("true");
    }
    limits
}

/// A cancellation flag honored at stage boundaries (spec §5: "the
/// coordinator exposes a cancellation token honored at stage boundaries").
/// Cloning shares the same underlying flag; cancelling is irreversible.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_options_hash_the_same_way() {
        let a = CompileOptions::default();
        let b = CompileOptions::default();
        assert_eq!(a.options_hash(), b.options_hash());
    }

    #[test]
    fn differing_options_hash_differently() {
        let a = CompileOptions::default();
        let mut b = CompileOptions::default();
        b.enable_optimizer = false;
        assert_ne!(a.options_hash(), b.options_hash());
    }

    #[test]
    fn cancellation_is_visible_through_a_clone() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
