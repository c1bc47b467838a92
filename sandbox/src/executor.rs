//! C11: sandbox executor.
//!
//! Spawns a worker process seeded with the compiled source, the required
//! capability manifest, and a result channel path, then enforces the one
//! limit a host process can actually guarantee on every platform without
//! root or a container runtime: wallclock time. `cpu_seconds` and
//! `memory_limit_bytes` are handed to the worker as environment variables
//! for it to self-enforce (e.g. via `resource.setrlimit` in a Python
//! worker) -- this crate cannot observe or cap another process's memory
//! or CPU time without OS-specific privileges no portable tool can assume
//! it has.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use mlpy_types::{truncate_to_fit, ExitReason, RequiredCapability, SandboxResult};
use tempfile::NamedTempFile;
use tokio::io::AsyncRead;
use tokio::process::Command;

use crate::limits::SandboxLimits;
use crate::process::ChildGuard;
use crate::protocol::read_frame;

const MAX_CAPTURED_OUTPUT_BYTES: usize = 64 * 1024;
const KILL_GRACE: Duration = Duration::from_secs(2);

/// How to launch a worker. The worker binary/interpreter itself (e.g. a
/// Python process that imports the `mlpy_runtime` shim) lives outside this
/// crate; `SandboxExecutor` only knows how to start it and speak the
/// result-frame protocol to it.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub program: PathBuf,
    pub args_prefix: Vec<String>,
}

pub struct SandboxExecutor {
    worker: WorkerSpec,
}

impl SandboxExecutor {
    #[must_use]
    pub fn new(worker: WorkerSpec) -> Self {
        Self { worker }
    }

    pub async fn execute(&self, target_source: &str, manifest: &[RequiredCapability], limits: &SandboxLimits) -> SandboxResult {
        let Ok(source_file) = write_temp(target_source.as_bytes()) else {
            return SandboxResult::failure(ExitReason::WorkerCrashed, "failed to stage compiled source for the worker");
        };
        let Ok(manifest_json) = serde_json::to_vec(manifest) else {
            return SandboxResult::failure(ExitReason::WorkerCrashed, "failed to serialize the capability manifest");
        };
        let Ok(manifest_file) = write_temp(&manifest_json) else {
            return SandboxResult::failure(ExitReason::WorkerCrashed, "failed to stage the capability manifest for the worker");
        };
        let Ok(result_file) = NamedTempFile::new() else {
            return SandboxResult::failure(ExitReason::WorkerCrashed, "failed to allocate a result channel for the worker");
        };

        let mut command = Command::new(&self.worker.program);
        for arg in &self.worker.args_prefix {
            command.arg(arg);
        }
        command
            .arg(source_file.path())
            .arg(manifest_file.path())
            .arg(result_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("MLPY_SANDBOX_WALLCLOCK_SECONDS", limits.wallclock_seconds.to_string())
            .env("MLPY_SANDBOX_DISABLE_NETWORK", if limits.disable_network { "1" } else { "0" });
        if let Some(cpu) = limits.cpu_seconds {
            command.env("MLPY_SANDBOX_CPU_SECONDS", cpu.to_string());
        }
        if let Some(mem) = limits.memory_limit_bytes {
            command.env("MLPY_SANDBOX_MEMORY_LIMIT_BYTES", mem.to_string());
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return SandboxResult::failure(ExitReason::WorkerCrashed, format!("failed to spawn sandbox worker: {e}")),
        };
        let mut guard = ChildGuard::new(child);
        let started = Instant::now();

        let stdout = guard.child_mut().stdout.take();
        let stderr = guard.child_mut().stderr.take();
        let stdout_task = tokio::spawn(read_captured(stdout));
        let stderr_task = tokio::spawn(read_captured(stderr));

        let wallclock = Duration::from_secs(limits.wallclock_seconds);
        let status = match tokio::time::timeout(wallclock, guard.child_mut().wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                guard.disarm();
                return SandboxResult::failure(ExitReason::WorkerCrashed, format!("failed to wait on sandbox worker: {e}"));
            }
            Err(_) => {
                let _ = guard.child_mut().start_kill();
                let _ = tokio::time::timeout(KILL_GRACE, guard.child_mut().wait()).await;
                guard.disarm();
                return SandboxResult::failure(ExitReason::Timeout, format!("worker exceeded the {}s wallclock limit", limits.wallclock_seconds));
            }
        };
        guard.disarm();

        let wallclock_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let stdout_text = stdout_task.await.unwrap_or_default();
        let stderr_text = stderr_task.await.unwrap_or_default();

        let mut result = match tokio::fs::File::open(result_file.path()).await {
            Ok(mut file) => match read_frame(&mut file).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, "sandbox worker exited without a usable result frame");
                    worker_crashed_result(status.success(), &stdout_text, &stderr_text)
                }
            },
            Err(_) => worker_crashed_result(status.success(), &stdout_text, &stderr_text),
        };

        result.stdout = truncate_to_fit(&stdout_text, MAX_CAPTURED_OUTPUT_BYTES, "...[truncated]");
        result.stderr = truncate_to_fit(&stderr_text, MAX_CAPTURED_OUTPUT_BYTES, "...[truncated]");
        result.wallclock_ms = wallclock_ms;
        result
    }
}

fn worker_crashed_result(exited_successfully: bool, stdout: &str, stderr: &str) -> SandboxResult {
    if exited_successfully {
        // Exited 0 but never wrote a result frame: treat as success with no
        // structured return value rather than manufacturing a crash.
        SandboxResult::success(None, stdout.to_string(), stderr.to_string(), 0, 0, 0)
    } else {
        SandboxResult::failure(ExitReason::WorkerCrashed, "worker exited without producing a result frame")
    }
}

fn write_temp(bytes: &[u8]) -> std::io::Result<NamedTempFile> {
    use std::io::Write;
    let mut file = NamedTempFile::new()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file)
}

async fn read_captured<R: AsyncRead + Unpin + Send + 'static>(reader: Option<R>) -> String {
    let Some(mut reader) = reader else { return String::new() };
    use tokio::io::AsyncReadExt;
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if buf.len() >= MAX_CAPTURED_OUTPUT_BYTES * 2 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
