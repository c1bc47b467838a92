//! Diagnostics: the uniform unit of compile-time feedback (spec §3, §7).

use serde::{Deserialize, Serialize};

use crate::location::Location;

/// Diagnostic severity. `Critical` is a distinct tier above `Error`: it is
/// the only severity that unconditionally blocks emission regardless of
/// configured suppression (spec §3, §8 "Critical-blocking").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }

    #[must_use]
    pub const fn blocks_emission(self) -> bool {
        matches!(self, Self::Critical)
    }
}

/// Pipeline stage that produced a diagnostic, used for stable ordering and
/// for presenting a report without the presenter needing stage internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lexer,
    Parser,
    Validator,
    Transformer,
    Collector,
    SecurityAnalyzer,
    PatternAnalyzer,
    Optimizer,
    Emitter,
    Coordinator,
}

impl Stage {
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Self::Lexer => 0,
            Self::Parser => 1,
            Self::Validator => 2,
            Self::Transformer => 3,
            Self::Collector => 4,
            Self::SecurityAnalyzer => 5,
            Self::PatternAnalyzer => 6,
            Self::Optimizer => 7,
            Self::Emitter => 8,
            Self::Coordinator => 9,
        }
    }
}

/// A suggested textual fix for a diagnostic, offered but never applied
/// automatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestedFix {
    pub description: String,
    pub replacement: Option<String>,
}

/// `{severity, stage, code, message, location, suggested_fix?}` (spec §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub code: String,
    pub message: String,
    pub primary_location: Location,
    pub related_locations: Vec<Location>,
    pub suggested_fix: Option<SuggestedFix>,
}

impl Diagnostic {
    #[must_use]
    pub fn new(
        severity: Severity,
        stage: Stage,
        code: impl Into<String>,
        message: impl Into<String>,
        primary_location: Location,
    ) -> Self {
        Self {
            severity,
            stage,
            code: code.into(),
            message: message.into(),
            primary_location,
            related_locations: Vec::new(),
            suggested_fix: None,
        }
    }

    #[must_use]
    pub fn with_fix(mut self, fix: SuggestedFix) -> Self {
        self.suggested_fix = Some(fix);
        self
    }

    #[must_use]
    pub fn with_related(mut self, location: Location) -> Self {
        self.related_locations.push(location);
        self
    }

    /// Sort key used by the coordinator to produce a deterministic,
    /// reproducible diagnostic list (spec §4.13, §5): location, then stage,
    /// then code.
    #[must_use]
    pub fn sort_key(&self) -> (u32, u32, u8, &str) {
        (
            self.primary_location.line(),
            self.primary_location.column(),
            self.stage.ordinal(),
            self.code.as_str(),
        )
    }

    /// Dedup key: a diagnostic is a duplicate of another iff it shares
    /// location and code (spec §4.13 "deduplicates by (location, code)").
    #[must_use]
    pub fn dedup_key(&self) -> (Location, &str) {
        (self.primary_location, self.code.as_str())
    }
}

/// Sort and deduplicate a diagnostic list per the coordinator's contract.
#[must_use]
pub fn normalize_diagnostics(mut diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    diagnostics.sort_by(|a, b| a.sort_key().partial_cmp(&b.sort_key()).expect("total order"));
    diagnostics.dedup_by(|a, b| a.dedup_key() == b.dedup_key());
    diagnostics
}

/// True iff no diagnostic has error-or-above severity (spec §3: "A compile
/// succeeds iff no error-severity diagnostics exist").
#[must_use]
pub fn compile_succeeds(diagnostics: &[Diagnostic]) -> bool {
    !diagnostics.iter().any(|d| d.severity.is_error())
}

/// True iff any diagnostic is `Critical`, which unconditionally blocks
/// emission.
#[must_use]
pub fn has_critical(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity.blocks_emission())
}

/// Render diagnostics into a terminal-friendly report without coupling the
/// presenter to any stage's internals (spec §7). Pure function: produces
/// text, performs no I/O.
#[must_use]
pub fn render_report(diagnostics: &[Diagnostic]) -> String {
    use std::fmt::Write as _;

    if diagnostics.is_empty() {
        return "no diagnostics".to_string();
    }

    let mut sorted = diagnostics.to_vec();
    sorted.sort_by(|a, b| {
        // Errors first, consistent with the debug-index diagnostics store's
        // "errors first, then alphabetically" convention.
        b.severity.cmp(&a.severity).then_with(|| a.sort_key().partial_cmp(&b.sort_key()).unwrap())
    });

    let mut out = String::new();
    for diag in &sorted {
        let marker = match diag.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        };
        let _ = writeln!(
            out,
            "{marker}[{code}] {message} (line {line}, col {col})",
            code = diag.code,
            message = diag.message,
            line = diag.primary_location.line(),
            col = diag.primary_location.column(),
        );
        if let Some(fix) = &diag.suggested_fix {
            let _ = writeln!(out, "  help: {}", fix.description);
        }
    }
    out
}
