//! UTF-8-safe truncation of tool output.

/// Maximum tool output size in bytes before truncation.
pub const MAX_OUTPUT_CHARS: usize = 30_000;

/// The longest prefix of `s` that fits in `max_bytes` without splitting a
/// `char`.
#[must_use]
pub fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end = end.saturating_sub(1);
    }
    &s[..end]
}

/// Cap `output` at [`MAX_OUTPUT_CHARS`], appending a notice when cut.
#[must_use]
pub fn truncate_output(output: String) -> String {
    if output.len() <= MAX_OUTPUT_CHARS {
        return output;
    }
    let mut truncated = truncate_at_char_boundary(&output, MAX_OUTPUT_CHARS).to_string();
    truncated.push_str("\n\n... (output truncated: exceeded 30000 character limit)");
    truncated
}
