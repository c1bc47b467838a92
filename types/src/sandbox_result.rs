//! Sandbox result value object (spec §3, §4.11).

use serde::{Deserialize, Serialize};

/// Why a sandboxed run stopped producing results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Completed,
    Timeout,
    MemoryExceeded,
    CapabilityDenied,
    WorkerCrashed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxResult {
    pub success: bool,
    pub return_value: Option<serde_json::Value>,
    pub stdout: String,
    pub stderr: String,
    pub wallclock_ms: u64,
    pub cpu_ms: u64,
    pub peak_memory_bytes: u64,
    pub exit_reason: ExitReason,
    pub error: Option<String>,
}

impl SandboxResult {
    #[must_use]
    pub fn success(
        return_value: Option<serde_json::Value>,
        stdout: String,
        stderr: String,
        wallclock_ms: u64,
        cpu_ms: u64,
        peak_memory_bytes: u64,
    ) -> Self {
        Self {
            success: true,
            return_value,
            stdout,
            stderr,
            wallclock_ms,
            cpu_ms,
            peak_memory_bytes,
            exit_reason: ExitReason::Completed,
            error: None,
        }
    }

    #[must_use]
    pub fn failure(exit_reason: ExitReason, error: impl Into<String>) -> Self {
        Self {
            success: false,
            return_value: None,
            stdout: String::new(),
            stderr: String::new(),
            wallclock_ms: 0,
            cpu_ms: 0,
            peak_memory_bytes: 0,
            exit_reason,
            error: Some(error.into()),
        }
    }
}
