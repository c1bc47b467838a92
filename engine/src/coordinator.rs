//! C13: compilation coordinator.
//!
//! Drives the fixed pipeline order `mlpy-analysis`'s own module doc already
//! promises: `validate -> transform -> collect -> (security + pattern
//! analysis concurrently) -> optimize -> emit`, stopping short of emission
//! the moment a critical diagnostic appears (spec §8 "critical-blocking")
//! and honoring a cancellation token at every stage boundary (spec §5).

use std::time::Duration;

use mlpy_analysis::{collect, optimize, transform, validate, PatternAnalyzer};
use mlpy_capability::CapabilitySystem;
use mlpy_codegen::emit;
use mlpy_host::HostRegistry;
use mlpy_lexer::parse;
use mlpy_sandbox::{SandboxExecutor, SandboxLimits};
use mlpy_types::{
    has_critical, normalize_diagnostics, Artifact, ContentHash, Diagnostic, RequiredCapability,
    SandboxResult, UnitId,
};

use crate::cache::ArtifactCache;
use crate::options::{CancellationToken, CompileOptions, COMPILER_VERSION};

/// The result of `compile_and_run`: the compiled artifact plus, when
/// emission succeeded and a sandbox was supplied, the run it produced.
/// `sandbox_result` is `None` whenever the artifact carries no
/// `target_source` -- there is nothing to run.
pub struct CompileAndRun {
    pub artifact: Artifact,
    pub sandbox_result: Option<SandboxResult>,
}

/// Stable exit codes the host embedding layer (CLI or otherwise) maps a
/// coordinator outcome onto (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    DiagnosticsError = 1,
    CriticalSecurityBlock = 2,
    SandboxFailure = 3,
    UsageError = 4,
}

/// Derive the stable exit code for one compiled artifact and its optional
/// run. A critical diagnostic takes precedence over a plain error
/// diagnostic, and a failed sandbox run takes precedence over both, since
/// it is the more specific failure for a `compile_and_run` call.
#[must_use]
pub fn exit_code(artifact: &Artifact, sandbox_result: Option<&SandboxResult>) -> ExitCode {
    if let Some(result) = sandbox_result {
        if !result.success {
            return ExitCode::SandboxFailure;
        }
    }
    if artifact.target_source.is_none() {
        return ExitCode::CriticalSecurityBlock;
    }
    if artifact.diagnostics.iter().any(|d| d.severity.is_error()) {
        return ExitCode::DiagnosticsError;
    }
    ExitCode::Success
}

/// Owns the process-wide pieces a compile needs that a bare pipeline
/// function call cannot: the artifact cache, the registered host surface
/// (C8 compiles import/call sites against it), and a compiled pattern
/// rule table (C6).
pub struct Coordinator {
    cache: ArtifactCache,
    host: HostRegistry,
    patterns: PatternAnalyzer,
}

impl Coordinator {
    /// # Panics
    /// Panics if the built-in pattern rule table fails to compile, which
    /// would indicate a bug in a literal regex constant, not a runtime
    /// condition callers can recover from.
    #[must_use]
    pub fn new(host: HostRegistry) -> Self {
        Self::with_cache_dir(host, crate::options::cache_dir())
    }

    #[must_use]
    pub fn with_cache_dir(host: HostRegistry, cache_dir: std::path::PathBuf) -> Self {
        Self {
            cache: ArtifactCache::new(cache_dir),
            host,
            patterns: PatternAnalyzer::with_defaults().expect("default pattern rules always compile"),
        }
    }

    #[must_use]
    pub fn host(&self) -> &HostRegistry {
        &self.host
    }

    /// `compile(source, options) -> Artifact` (spec §4.13, §6). Checks the
    /// artifact cache first; on a miss, runs the full pipeline and
    /// publishes the result under `(unit_hash, compiler_version,
    /// options_hash)` before returning it.
    pub fn compile(&self, source: &str, options: &CompileOptions, cancellation: &CancellationToken) -> Artifact {
        let unit_hash = ContentHash::of(source.as_bytes());
        let cache_key = Artifact::cache_key(unit_hash, COMPILER_VERSION, &options.options_hash());

        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::debug!(cache_key = %cache_key, "artifact cache hit");
            return cached;
        }

        if !self.cache.claim_writer(&cache_key) {
            if let Some(found) = self.wait_for_concurrent_writer(&cache_key) {
                return found;
            }
        }

        tracing::debug!(cache_key = %cache_key, unit_hash = %unit_hash, "compiling unit");
        let artifact = self.compile_uncached(unit_hash, source, options, cancellation);
        if artifact.target_source.is_none() {
            tracing::warn!(cache_key = %cache_key, "compilation blocked before emission");
        }
        if let Err(e) = self.cache.put(&cache_key, &artifact) {
            tracing::warn!(cache_key = %cache_key, error = %e, "failed to persist artifact to the cache");
        }
        self.cache.release_writer(&cache_key);
        artifact
    }

    fn wait_for_concurrent_writer(&self, cache_key: &str) -> Option<Artifact> {
        for _ in 0..200 {
            if let Some(artifact) = self.cache.get(cache_key) {
                return Some(artifact);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        None
    }

    fn compile_uncached(&self, unit_hash: ContentHash, source: &str, options: &CompileOptions, cancellation: &CancellationToken) -> Artifact {
        let unit = UnitId::new(0);
        let mut diagnostics: Vec<Diagnostic> = Vec::new();
        let mut required_capabilities: Vec<RequiredCapability> = Vec::new();

        let parsed = parse(unit, source);
        diagnostics.extend(parsed.diagnostics);
        let mut ast = parsed.ast;

        if cancellation.is_cancelled() || has_critical(&diagnostics) {
            return blocked(unit_hash, diagnostics, required_capabilities);
        }

        diagnostics.extend(validate(&ast));
        if cancellation.is_cancelled() || has_critical(&diagnostics) {
            return blocked(unit_hash, diagnostics, required_capabilities);
        }

        diagnostics.extend(transform(&mut ast));
        if cancellation.is_cancelled() || has_critical(&diagnostics) {
            return blocked(unit_hash, diagnostics, required_capabilities);
        }

        let collected = collect(&mut ast);
        if cancellation.is_cancelled() {
            return blocked(unit_hash, diagnostics, required_capabilities);
        }

        let (security, pattern_diagnostics) =
            rayon::join(|| mlpy_analysis::analyze_security(&ast), || self.patterns.analyze(unit, source));
        diagnostics.extend(security.diagnostics);
        diagnostics.extend(pattern_diagnostics);
        required_capabilities = security.required_capabilities;
        diagnostics = normalize_diagnostics(diagnostics);

        if cancellation.is_cancelled() || has_critical(&diagnostics) {
            return blocked(unit_hash, diagnostics, required_capabilities);
        }

        if options.enable_optimizer {
            diagnostics.extend(optimize(&mut ast));
            diagnostics = normalize_diagnostics(diagnostics);
        }

        if cancellation.is_cancelled() || has_critical(&diagnostics) {
            return blocked(unit_hash, diagnostics, required_capabilities);
        }

        let emitted = emit(&ast, &collected.symbols, unit, &options.source_name, &self.host.host_surface());
        diagnostics.extend(emitted.diagnostics);
        diagnostics = normalize_diagnostics(diagnostics);

        Artifact {
            unit_hash,
            target_source: Some(emitted.target_source),
            source_map: Some(emitted.source_map),
            required_capabilities,
            diagnostics,
        }
    }

    /// `compile_and_run(source, options, sandbox?) -> Result` (spec §4.13,
    /// §6). Compiles, then -- only if emission actually produced source --
    /// hands the target source and the required-capability manifest to
    /// `executor` under `limits`.
    pub async fn compile_and_run(
        &self,
        source: &str,
        options: &CompileOptions,
        cancellation: &CancellationToken,
        executor: &SandboxExecutor,
        limits: &SandboxLimits,
    ) -> CompileAndRun {
        let artifact = self.compile(source, options, cancellation);
        if artifact.target_source.is_none() {
            return CompileAndRun { artifact, sandbox_result: None };
        }

        let target_source = artifact.target_source.clone().expect("checked above");
        let result = executor.execute(&target_source, &artifact.required_capabilities, limits).await;
        CompileAndRun { artifact, sandbox_result: Some(result) }
    }

    /// The trusted in-process execution alternative spec §4.13 notes
    /// ("either in-process exec (trusted) or C11"): call one already
    /// registered host function directly against `capabilities`, with no
    /// worker process in between. Used for host-initiated calls that never
    /// touch compiled source, not for running compiled artifacts.
    pub fn call_host_function(
        &self,
        ml_name: &str,
        args: &serde_json::Value,
        capabilities: &CapabilitySystem,
        resource: &str,
    ) -> Result<serde_json::Value, mlpy_host::HostCallError> {
        self.host.call(ml_name, args, capabilities, resource)
    }
}

fn blocked(unit_hash: ContentHash, diagnostics: Vec<Diagnostic>, required_capabilities: Vec<RequiredCapability>) -> Artifact {
    Artifact {
        unit_hash,
        target_source: None,
        source_map: None,
        required_capabilities,
        diagnostics: normalize_diagnostics(diagnostics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CompileOptions;

    fn coordinator() -> Coordinator {
        let dir = tempfile::tempdir().unwrap();
        Coordinator::with_cache_dir(HostRegistry::new(), dir.keep())
    }

    #[test]
    fn arithmetic_round_trip_compiles_and_folds_constants() {
        let coordinator = coordinator();
        let options = CompileOptions::default();
        let artifact = coordinator.compile("x = 2 + 3 * 4; return x;", &options, &CancellationToken::new());
        assert!(artifact.target_source.is_some());
        assert!(artifact.diagnostics.iter().any(|d| d.stage == mlpy_types::Stage::Optimizer));
    }

    #[test]
    fn dangerous_import_blocks_emission_with_exit_code_two() {
        let coordinator = coordinator();
        let options = CompileOptions::default();
        let artifact = coordinator.compile("import os; os.system(\"rm -rf /\");", &options, &CancellationToken::new());
        assert!(artifact.target_source.is_none());
        assert_eq!(exit_code(&artifact, None), ExitCode::CriticalSecurityBlock);
    }

    #[test]
    fn compiling_the_same_source_twice_is_idempotent() {
        let coordinator = coordinator();
        let options = CompileOptions::default();
        let token = CancellationToken::new();
        let first = coordinator.compile("x = 1 + 1;", &options, &token);
        let second = coordinator.compile("x = 1 + 1;", &options, &token);
        assert_eq!(first.unit_hash, second.unit_hash);
        assert_eq!(first.target_source, second.target_source);
    }

    #[test]
    fn a_cancelled_token_stops_the_pipeline_before_emission() {
        let coordinator = coordinator();
        let options = CompileOptions::default();
        let token = CancellationToken::new();
        token.cancel();
        let artifact = coordinator.compile("x = 1;", &options, &token);
        assert!(artifact.target_source.is_none());
    }
}
