//! C6: parallel pattern analyzer.
//!
//! A text-level scan of the raw source that runs independently of (and
//! concurrently with, per the coordinator's C5/C6 fan-out) the AST-based
//! security analyzer. It catches what parsing can miss or normalize away:
//! suspicious substrings even inside string literals, and homoglyph or
//! zero-width-character tricks in identifiers. Built as a compiled pattern
//! table with a short-circuiting lookup, returning a location per match
//! rather than a single "is this denied" verdict.
//!
//! Regex rules cover patterns that need structure (a call, an argument
//! list); a parallel `AhoCorasick` automaton covers plain literal substrings
//! with no structure to match against, the same multi-pattern shape used
//! for scanning source text for literal secret values elsewhere in this
//! codebase, built once with `MatchKind::LeftmostLongest` so overlapping
//! prefixes don't produce duplicate findings.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;
use thiserror::Error;

use mlpy_types::{detect_mixed_script, find_zero_width_chars, Diagnostic, Location, Position, Severity, Span, Stage, UnitId};

/// Literal substrings known to precede a sandbox escape attempt, with no
/// regex structure worth compiling -- a straight multi-literal scan.
const KNOWN_EXPLOIT_PREFIXES: &[&str] = &["/etc/passwd", "/etc/shadow", "os.environ", "__builtins__[", "ctypes.cdll"];

#[derive(Debug, Error)]
#[error("failed to compile pattern analyzer rule `{code}`: {source}")]
pub struct PatternCompileError {
    code: String,
    #[source]
    source: regex::Error,
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub code: &'static str,
    pub pattern: &'static str,
    pub message: &'static str,
    pub severity: Severity,
}

/// Text patterns with no legitimate reason to appear in sandboxed source,
/// independent of whether they parse as a reachable AST node (e.g. built
/// via string concatenation, or left inside a string literal as a decoy).
pub const DEFAULT_RULES: &[PatternRule] = &[
    PatternRule {
        code: "text_dynamic_import",
        pattern: r"__import__\s*\(",
        message: "text contains a dynamic `__import__(` call pattern",
        severity: Severity::Warning,
    },
    PatternRule {
        code: "text_subprocess_invocation",
        pattern: r"subprocess\.\w+\s*\(",
        message: "text contains a subprocess invocation pattern",
        severity: Severity::Warning,
    },
    PatternRule {
        code: "text_raw_socket",
        pattern: r"socket\.socket\s*\(",
        message: "text contains a raw socket construction pattern",
        severity: Severity::Warning,
    },
    PatternRule {
        code: "text_base64_decode",
        pattern: r"(?i)base64\.(b64decode|decodebytes)\s*\(",
        message: "base64 decoding often precedes payload reconstruction",
        severity: Severity::Info,
    },
    PatternRule {
        code: "text_hex_escape_run",
        pattern: r"(?:\\x[0-9a-fA-F]{2}){4,}",
        message: "long run of hex escapes resembles an obfuscated payload",
        severity: Severity::Warning,
    },
];

pub struct PatternAnalyzer {
    rules: Vec<(PatternRule, Regex)>,
    exploit_prefixes: AhoCorasick,
}

impl PatternAnalyzer {
    pub fn with_rules(rules: &[PatternRule]) -> Result<Self, PatternCompileError> {
        let compiled = rules
            .iter()
            .map(|rule| {
                Regex::new(rule.pattern)
                    .map(|re| (rule.clone(), re))
                    .map_err(|source| PatternCompileError { code: rule.code.to_string(), source })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let exploit_prefixes = AhoCorasickBuilder::new()
            .match_kind(MatchKind::LeftmostLongest)
            .build(KNOWN_EXPLOIT_PREFIXES)
            .expect("exploit-prefix literals always build");
        Ok(Self { rules: compiled, exploit_prefixes })
    }

    pub fn with_defaults() -> Result<Self, PatternCompileError> {
        Self::with_rules(DEFAULT_RULES)
    }

    /// Scan `source` for every configured rule plus the built-in homoglyph
    /// and zero-width-character checks, emitting one diagnostic per finding.
    #[must_use]
    pub fn analyze(&self, unit: UnitId, source: &str) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let line_starts = line_start_offsets(source);

        for (rule, regex) in &self.rules {
            for m in regex.find_iter(source) {
                let location = Location::new(unit, Span::point(offset_to_position(&line_starts, m.start())));
                diagnostics.push(Diagnostic::new(rule.severity, Stage::PatternAnalyzer, rule.code, rule.message, location));
            }
        }

        for m in self.exploit_prefixes.find_iter(source) {
            let location = Location::new(unit, Span::point(offset_to_position(&line_starts, m.start())));
            diagnostics.push(Diagnostic::new(
                Severity::Warning,
                Stage::PatternAnalyzer,
                "known_exploit_prefix",
                format!("text contains the known exploit-prefix literal `{}`", &source[m.start()..m.end()]),
                location,
            ));
        }

        for (line_idx, line) in source.lines().enumerate() {
            let line_no = u32::try_from(line_idx + 1).unwrap_or(u32::MAX);
            if let Some(warning) = detect_mixed_script(line, "source_line") {
                let location = Location::new(unit, Span::point(Position::new(line_no, 0)));
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    Stage::PatternAnalyzer,
                    "mixed_script_identifier",
                    format!("line mixes scripts {:?}, consistent with a homoglyph attack", warning.scripts),
                    location,
                ));
            }
            for byte_offset in find_zero_width_chars(line) {
                let location = Location::new(unit, Span::point(Position::new(line_no, u32::try_from(byte_offset).unwrap_or(0))));
                diagnostics.push(Diagnostic::new(
                    Severity::Warning,
                    Stage::PatternAnalyzer,
                    "zero_width_character",
                    "zero-width character hidden in source text",
                    location,
                ));
            }
        }

        diagnostics
    }
}

fn line_start_offsets(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn offset_to_position(line_starts: &[usize], offset: usize) -> Position {
    let line_idx = match line_starts.binary_search(&offset) {
        Ok(i) => i,
        Err(i) => i.saturating_sub(1),
    };
    let column = offset - line_starts[line_idx];
    Position::new(u32::try_from(line_idx + 1).unwrap_or(u32::MAX), u32::try_from(column).unwrap_or(0))
}
