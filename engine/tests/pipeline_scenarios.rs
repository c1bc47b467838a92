//! End-to-end coverage of the coordinator driving the real lexer, analysis,
//! and codegen crates together, plus the sandbox executor against a
//! `/bin/sh` stand-in worker (mirroring `mlpy-sandbox`'s own integration
//! tests, since no real language runtime worker exists in this workspace).

use std::sync::Arc;
use std::time::SystemTime;

use mlpy_capability::CapabilitySystem;
use mlpy_engine::{exit_code, CancellationToken, CompileOptions, Coordinator, ExitCode};
use mlpy_host::{HostFunctionSpec, HostRegistry, RequiredCapabilityRef, ReturnKind};
use mlpy_sandbox::{SandboxExecutor, SandboxLimits, WorkerSpec};
use mlpy_types::ResourcePattern;

fn fake_worker_writing(frame_script: &str) -> WorkerSpec {
    WorkerSpec { program: "/bin/sh".into(), args_prefix: vec!["-c".to_string(), frame_script.to_string(), "mlpy-worker".to_string()] }
}

#[test]
fn arithmetic_compiles_to_exit_code_zero() {
    let coordinator = Coordinator::with_cache_dir(HostRegistry::new(), tempfile::tempdir().unwrap().keep());
    let artifact = coordinator.compile("x = 2 + 3 * 4; return x;", &CompileOptions::default(), &CancellationToken::new());
    assert_eq!(exit_code(&artifact, None), ExitCode::Success);
    assert!(artifact.target_source.unwrap().contains("return"));
}

#[test]
fn dangerous_import_maps_to_exit_code_two() {
    let coordinator = Coordinator::with_cache_dir(HostRegistry::new(), tempfile::tempdir().unwrap().keep());
    let options = CompileOptions::default();
    let artifact = coordinator.compile(r#"import os; os.system("rm -rf /");"#, &options, &CancellationToken::new());
    assert!(artifact.target_source.is_none());
    assert!(artifact.diagnostics.iter().any(|d| d.code == "dangerous_import"));
    assert_eq!(exit_code(&artifact, None), ExitCode::CriticalSecurityBlock);
}

#[tokio::test]
async fn sandbox_timeout_surfaces_through_compile_and_run() {
    let coordinator = Coordinator::with_cache_dir(HostRegistry::new(), tempfile::tempdir().unwrap().keep());
    let executor = SandboxExecutor::new(fake_worker_writing("sleep 5"));
    let limits = SandboxLimits { wallclock_seconds: 1, ..SandboxLimits::default() };

    let outcome = coordinator
        .compile_and_run("while (true) { x = x + 1; }", &CompileOptions::default(), &CancellationToken::new(), &executor, &limits)
        .await;

    let result = outcome.sandbox_result.expect("emission should have succeeded");
    assert!(!result.success);
    assert_eq!(result.exit_reason, mlpy_types::ExitReason::Timeout);
    assert_eq!(exit_code(&outcome.artifact, Some(&result)), ExitCode::SandboxFailure);
}

#[tokio::test]
async fn sandbox_success_runs_after_compilation() {
    let coordinator = Coordinator::with_cache_dir(HostRegistry::new(), tempfile::tempdir().unwrap().keep());
    let frame = r#"printf '\223\000\000\000%s' '{"success":true,"return_value":14,"stdout":"","stderr":"","wallclock_ms":0,"cpu_ms":0,"peak_memory_bytes":0,"exit_reason":"completed","error":null}' > "$3""#;
    let executor = SandboxExecutor::new(fake_worker_writing(frame));
    let limits = SandboxLimits::default();

    let outcome = coordinator
        .compile_and_run("x = 2 + 3 * 4; return x;", &CompileOptions::default(), &CancellationToken::new(), &executor, &limits)
        .await;

    let result = outcome.sandbox_result.expect("emission should have succeeded");
    assert!(result.success);
    assert_eq!(result.return_value, Some(serde_json::json!(14)));
    assert_eq!(exit_code(&outcome.artifact, Some(&result)), ExitCode::Success);
}

#[test]
fn capability_denial_and_grant_through_the_trusted_in_process_path() {
    let mut host = HostRegistry::new();
    let required = vec![RequiredCapabilityRef { capability_type: "file".to_string(), operation: "read".to_string() }];
    host.register_host_module(
        "file",
        "mlpy_stdlib.file",
        vec![HostFunctionSpec {
            ml_name: "read".to_string(),
            required_capabilities: required,
            param_schema: serde_json::json!({"type": "array"}),
            return_kind: ReturnKind::String,
            callable: Arc::new(|_args| Ok(serde_json::json!("contents"))),
        }],
    );
    let coordinator = Coordinator::with_cache_dir(host, tempfile::tempdir().unwrap().keep());

    let empty_caps = CapabilitySystem::new();
    let denied = coordinator.call_host_function("read", &serde_json::json!([]), &empty_caps, "a.txt");
    assert!(denied.is_err());

    let mut caps = CapabilitySystem::new();
    let token = caps.create_token("file", ResourcePattern::compile("*.txt").unwrap(), vec!["read".to_string()], SystemTime::now(), None);
    let ctx = caps.create_context(None);
    caps.grant(ctx, token);
    let scope = caps.acquire_scope(ctx);
    let granted = coordinator.call_host_function("read", &serde_json::json!([]), scope.system(), "a.txt");
    assert_eq!(granted.unwrap(), serde_json::json!("contents"));
}
