//! Out-of-process sandbox executor with resource limits (C11).

pub mod executor;
pub mod limits;
pub mod process;
pub mod protocol;

pub use executor::{SandboxExecutor, WorkerSpec};
pub use limits::{FsPolicy, SandboxLimits};
