//! Brace-depth scanner
//!
//! Finds the maximal balanced `{ ... }` spans in a text. Only spans that open
//! at depth zero are reported; nested objects stay inside their parent span.
//!
//! Double quotes are only treated as string delimiters inside a span. Prose
//! outside any span routinely contains unpaired quotes, and letting them open
//! a string would hide every following span.

use std::ops::Range;

/// Byte ranges of every closed top-level span, in source order
///
/// A span still open at end of input is dropped. A stray `}` at depth zero
/// is ignored.
#[must_use]
pub fn scan_spans(raw: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut depth: usize = 0;
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in raw.bytes().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'{' => {
                if depth == 0 {
                    start = offset;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(start..offset + 1);
                }
            }
            b'"' if depth > 0 => in_string = true,
            _ => {}
        }
    }

    spans
}
