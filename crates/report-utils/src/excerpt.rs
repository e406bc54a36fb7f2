//! Character-bounded excerpts for prompt assembly

/// Marker appended to text that was cut short
pub const ELLIPSIS: &str = "...";

/// Keep at most `max_chars` characters of `text`, appending [`ELLIPSIS`] when
/// anything was dropped.
///
/// Counts `char`s rather than bytes so multi-byte text is never split inside
/// a code point.
///
/// `max_chars` bounds the kept text, not the result: the marker goes after
/// the cut, so a truncated excerpt is `max_chars + 3` characters long.
///
/// ```
/// use report_utils::excerpt;
///
/// assert_eq!(excerpt("abcdef", 3), "abc...");
/// assert_eq!(excerpt("abc", 3), "abc");
/// ```
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + ELLIPSIS.len());
            out.push_str(&text[..cut]);
            out.push_str(ELLIPSIS);
            out
        }
        None => text.to_string(),
    }
}
