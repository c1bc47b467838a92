//! Compilation coordinator (C13): orchestrates C1-C10 and C6's parallel
//! pattern analyzer into a single `compile`/`compile_and_run` surface, with
//! a content-addressed artifact cache and the environment knobs spec §6
//! names (`MLPY_CACHE_DIR`, `MLPY_OPTIONS_SALT`, `MLPY_SANDBOX_*`).

pub mod cache;
pub mod coordinator;
pub mod options;

pub use cache::ArtifactCache;
pub use coordinator::{exit_code, CompileAndRun, Coordinator, ExitCode};
pub use options::{cache_dir, default_sandbox_limits, CancellationToken, CompileOptions, COMPILER_VERSION};
