//! Resource limits requested for one sandboxed run (spec §4.11).

use std::path::PathBuf;

/// Filesystem access granted to the worker. `None` blocks every path;
/// enforcement is the worker's own responsibility once started (the host
/// only tells it what was asked for via environment variables).
#[derive(Debug, Clone, Default)]
pub enum FsPolicy {
    #[default]
    None,
    ReadOnly(Vec<PathBuf>),
    ReadWrite(Vec<PathBuf>),
}

#[derive(Debug, Clone)]
pub struct SandboxLimits {
    pub memory_limit_bytes: Option<u64>,
    pub cpu_seconds: Option<u64>,
    pub wallclock_seconds: u64,
    pub disable_network: bool,
    pub fs_policy: FsPolicy,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self { memory_limit_bytes: None, cpu_seconds: None, wallclock_seconds: 5, disable_network: true, fs_policy: FsPolicy::None }
    }
}
