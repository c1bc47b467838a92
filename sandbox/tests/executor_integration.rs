//! Drives `SandboxExecutor` against a `/bin/sh` stand-in worker rather than
//! a real language runtime -- this crate only owns the process lifecycle
//! and the result-frame protocol, not any particular worker's internals.

use mlpy_sandbox::{SandboxExecutor, SandboxLimits, WorkerSpec};
use mlpy_types::ExitReason;

/// A worker stand-in: `sh -c '<script>' mlpy-worker <source> <manifest> <result>`
/// so the script sees its three file paths as `$1`, `$2`, `$3`. Writes a
/// canned, well-formed result frame to the result path.
fn fake_worker_writing(frame_script: &str) -> WorkerSpec {
    WorkerSpec { program: "/bin/sh".into(), args_prefix: vec!["-c".to_string(), frame_script.to_string(), "mlpy-worker".to_string()] }
}

#[tokio::test]
async fn reads_a_result_frame_the_worker_writes() {
    let frame = r#"printf '\223\000\000\000%s' '{"success":true,"return_value":14,"stdout":"","stderr":"","wallclock_ms":0,"cpu_ms":0,"peak_memory_bytes":0,"exit_reason":"completed","error":null}' > "$3""#;
    let executor = SandboxExecutor::new(fake_worker_writing(frame));
    let limits = SandboxLimits { wallclock_seconds: 5, ..SandboxLimits::default() };

    let result = executor.execute("x = 2 + 3 * 4\n", &[], &limits).await;
    assert!(result.success, "{result:?}");
    assert_eq!(result.return_value, Some(serde_json::json!(14)));
    assert_eq!(result.exit_reason, ExitReason::Completed);
}

#[tokio::test]
async fn worker_that_never_writes_a_frame_but_exits_zero_is_reported_as_empty_success() {
    let executor = SandboxExecutor::new(fake_worker_writing("exit 0"));
    let limits = SandboxLimits::default();

    let result = executor.execute("x = 1\n", &[], &limits).await;
    assert!(result.success);
    assert_eq!(result.return_value, None);
}

#[tokio::test]
async fn worker_that_exits_nonzero_without_a_frame_is_a_crash() {
    let executor = SandboxExecutor::new(fake_worker_writing("exit 1"));
    let limits = SandboxLimits::default();

    let result = executor.execute("x = 1\n", &[], &limits).await;
    assert!(!result.success);
    assert_eq!(result.exit_reason, ExitReason::WorkerCrashed);
}

#[tokio::test]
async fn a_worker_that_outlives_the_wallclock_limit_is_killed_and_reported_as_timeout() {
    let executor = SandboxExecutor::new(fake_worker_writing("sleep 30"));
    let limits = SandboxLimits { wallclock_seconds: 1, ..SandboxLimits::default() };

    let result = executor.execute("while (true) {}\n", &[], &limits).await;
    assert!(!result.success);
    assert_eq!(result.exit_reason, ExitReason::Timeout);
}

#[tokio::test]
async fn captured_stdout_is_attached_to_the_result() {
    let frame = r#"echo hello-from-worker; printf '\223\000\000\000%s' '{"success":true,"return_value":null,"stdout":"","stderr":"","wallclock_ms":0,"cpu_ms":0,"peak_memory_bytes":0,"exit_reason":"completed","error":null}' > "$3""#;
    let executor = SandboxExecutor::new(fake_worker_writing(frame));
    let limits = SandboxLimits::default();

    let result = executor.execute("print(1)\n", &[], &limits).await;
    assert!(result.stdout.contains("hello-from-worker"));
}
