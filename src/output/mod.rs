// Output formatting: terminal display and result files.

pub mod ndjson;
pub mod terminal;

/// Truncate to at most `max_chars` characters, appending "..." if cut.
///
/// Counts characters, not bytes, so multi-byte text never splits mid-char.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}
