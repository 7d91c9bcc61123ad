//! # Text Processing Utilities
//!
//! Redaction of secret-looking values and display-width aware truncation for
//! text that comes back from external actions.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Maximum display width of result text shown in the palette.
pub const RESULT_DISPLAY_WIDTH: usize = 4000;

/// Maximum display width of a subtitle in palette lists.
pub const SUBTITLE_DISPLAY_WIDTH: usize = 60;

const ELLIPSIS: char = '…';

/// Redacts values that look like secrets in a string.
///
/// Key names are preserved so the output stays readable:
///
/// ```rust
/// use skitz_util::text_processing::redact_sensitive;
///
/// assert_eq!(redact_sensitive("AZURE_OPENAI_API_KEY=abc123"), "AZURE_OPENAI_API_KEY=[REDACTED]");
/// assert_eq!(redact_sensitive("Authorization: Bearer abc"), "Authorization: [REDACTED]");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    redact_sensitive_with(input, "[REDACTED]")
}

/// Redacts sensitive-looking values, using a custom replacement token.
pub fn redact_sensitive_with(input: &str, replacement: &str) -> String {
    let mut redacted = input.to_string();

    for pattern in REDACT_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.name("prefix").map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}{replacement}")
            })
            .to_string();
    }

    redacted
}

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Authorization headers
        r"(?i)(?P<prefix>authorization:\s*)(?:bearer\s+|basic\s+)?[\w\-.=:/+]+",
        // KEY=value style assignments
        r"(?i)(?P<prefix>\b[A-Z0-9_]*(?:KEY|TOKEN|SECRET|PASSWORD)=)[^\s'\x22]+",
        // api_key: value / "api_key": "value"
        r#"(?i)(?P<prefix>\x22?(?:api_key|apikey|token|secret|password)\x22?\s*:\s*\x22?)[^\s,\x22}]+"#,
        // Bare provider keys
        r"(?P<prefix>)\bsk-(?:ant-|proj-)?[A-Za-z0-9_\-]{8,}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("redaction pattern"))
    .collect()
});

/// Returns `true` when the text contains something [`redact_sensitive`] would hide.
pub fn contains_secret(input: &str) -> bool {
    REDACT_PATTERNS.iter().any(|pattern| pattern.is_match(input))
}

/// Truncate `text` so that its display width does not exceed `max_width`.
///
/// Truncated text ends with `…`, which counts toward the width. Width is
/// measured in terminal columns, so wide characters are never split.
pub fn truncate_display(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }

    let budget = max_width - 1;
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width > budget {
            break;
        }
        used += width;
        out.push(ch);
    }
    out.push(ELLIPSIS);
    out
}

/// Prepare external output for display: redact, then truncate.
pub fn display_safe(text: &str, max_width: usize) -> String {
    truncate_display(&redact_sensitive(text), max_width)
}

/// First non-blank line of `text`, trimmed.
pub fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_env_assignments_and_headers() {
        let input = "AZURE_OPENAI_API_KEY=abc123 AGENT_PROMPT=hello\nAuthorization: Bearer xyz";
        let out = redact_sensitive(input);
        assert!(out.contains("AZURE_OPENAI_API_KEY=[REDACTED]"));
        assert!(out.contains("AGENT_PROMPT=hello"));
        assert!(out.contains("Authorization: [REDACTED]"));
        assert!(!out.contains("xyz"));
    }

    #[test]
    fn redacts_provider_keys_and_structured_fields() {
        let out = redact_sensitive("key is sk-ant-abcdefghijkl and api_key: hunter2hunter2");
        assert!(!out.contains("abcdefghijkl"));
        assert!(!out.contains("hunter2"));
        assert!(contains_secret("{\"api_key\": \"value\"}"));
        assert!(!contains_secret("nothing to see here"));
    }

    #[test]
    fn truncation_respects_display_width() {
        assert_eq!(truncate_display("short", 10), "short");
        assert_eq!(truncate_display("abcdefghij", 5), "abcd…");
        // Each CJK character is two columns wide.
        let out = truncate_display("日本語テキスト", 6);
        assert_eq!(out, "日本…");
        assert!(UnicodeWidthStr::width(out.as_str()) <= 6);
        assert_eq!(truncate_display("abc", 0), "");
    }

    #[test]
    fn first_line_skips_blank_lines() {
        assert_eq!(first_line("\n  \n  hello \nworld"), "hello");
        assert_eq!(first_line(""), "");
    }
}
