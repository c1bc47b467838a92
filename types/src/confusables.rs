//! Homoglyph and zero-width character detection, shared by the deep
//! security analyzer (C5) and the parallel pattern analyzer (C6).
//!
//! `detect_mixed_script` reports the fact that an identifier mixes scripts
//! associated with homoglyph attacks; `strip_zero_width` reports the
//! positions of invisible characters smuggled into otherwise-plain text.
//! Both are mechanisms: the calling analyzer decides the resulting
//! diagnostic severity.

use unicode_script::{Script, UnicodeScript};

/// Proof that script-mixing analysis ran and found suspicious content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomoglyphWarning {
    pub field_name: String,
    pub snippet: String,
    pub scripts: Vec<Script>,
}

impl HomoglyphWarning {
    #[must_use]
    pub fn scripts_display(&self) -> String {
        self.scripts.iter().map(|s| format!("{s:?}")).collect::<Vec<_>>().join(", ")
    }
}

/// Detect Latin mixed with Cyrillic or Greek in `input` (the highest attack
/// surface for an ASCII-keyword language like ML). Pure non-Latin scripts
/// are legitimate and not flagged. ASCII-only input returns `None`
/// immediately without iterating characters.
#[must_use]
pub fn detect_mixed_script(input: &str, field_name: &str) -> Option<HomoglyphWarning> {
    if input.is_ascii() {
        return None;
    }

    let mut has_latin = false;
    let mut has_cyrillic = false;
    let mut has_greek = false;

    for c in input.chars() {
        match c.script() {
            Script::Latin => has_latin = true,
            Script::Cyrillic => has_cyrillic = true,
            Script::Greek => has_greek = true,
            _ => {}
        }
    }

    if !(has_latin && (has_cyrillic || has_greek)) {
        return None;
    }

    let mut scripts = vec![Script::Latin];
    if has_cyrillic {
        scripts.push(Script::Cyrillic);
    }
    if has_greek {
        scripts.push(Script::Greek);
    }

    Some(HomoglyphWarning {
        field_name: field_name.to_string(),
        snippet: crate::text::truncate_with_ellipsis(input, 40),
        scripts,
    })
}

/// Zero-width and bidi-control codepoints that can be smuggled inside an
/// otherwise-innocuous identifier or string literal.
const ZERO_WIDTH_CODEPOINTS: &[char] = &[
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // zero width no-break space / BOM
    '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}', // bidi overrides
];

/// Byte offsets (into `input`) of any zero-width or bidi-control character.
#[must_use]
pub fn find_zero_width_chars(input: &str) -> Vec<usize> {
    if input.is_ascii() {
        return Vec::new();
    }
    input
        .char_indices()
        .filter(|(_, c)| ZERO_WIDTH_CODEPOINTS.contains(c))
        .map(|(idx, _)| idx)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_cyrillic_mixed_with_latin() {
        let warning = detect_mixed_script("pаypal", "identifier");
        assert!(warning.is_some());
    }

    #[test]
    fn pure_latin_is_fine() {
        assert!(detect_mixed_script("paypal", "identifier").is_none());
    }

    #[test]
    fn pure_cyrillic_is_fine() {
        assert!(detect_mixed_script("привет", "identifier").is_none());
    }

    #[test]
    fn finds_zero_width_space_in_identifier() {
        let positions = find_zero_width_chars("ad\u{200B}min");
        assert_eq!(positions.len(), 1);
    }

    #[test]
    fn ascii_identifier_has_no_zero_width() {
        assert!(find_zero_width_chars("admin").is_empty());
    }
}
