//! Compilation artifacts and sandbox results (spec §3, §6).

use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::source_map::SourceMap;
use crate::unit::ContentHash;

/// `(type, op)` pair noted as required by some call reachable from the
/// compiled unit (spec §4.5 pass 4, §6 artifact file format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequiredCapability {
    pub capability_type: String,
    pub operation: String,
    /// Resource glob patterns observed at call sites requiring this
    /// capability; informational, used by IDE/approval tooling.
    pub resources: Vec<String>,
}

/// Content-addressed compilation output (spec §3, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub unit_hash: ContentHash,
    pub target_source: Option<String>,
    pub source_map: Option<SourceMap>,
    pub required_capabilities: Vec<RequiredCapability>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Artifact {
    /// Cache key per spec §3: `(unit_hash, compiler_version, options_hash)`.
    #[must_use]
    pub fn cache_key(unit_hash: ContentHash, compiler_version: &str, options_hash: &str) -> String {
        format!("{unit_hash}:{compiler_version}:{options_hash}")
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.target_source.is_some()
    }
}
