//! Fixed-size overlapping line windower.
//!
//! Splits a file's lines into [`Chunk`]s of `window` lines that advance by
//! `stride = window - overlap`. Windows with too little real content are
//! dropped so blank-heavy tails do not pollute the index.
//!
//! # Algorithm
//!
//! 1. Reject configurations where `stride <= 0`.
//! 2. Starting at offset 0, cover `[start, min(start + window, total))`.
//! 3. Emit the window only if it holds at least `min_lines` non-blank lines.
//! 4. Stop as soon as a window reaches the end of input, otherwise advance
//!    by `stride`.
//!
//! # Example
//!
//! ```rust
//! use codepilot_core::window::chunk_lines;
//!
//! let lines: Vec<String> = (0..100).map(|i| format!("line {}\n", i)).collect();
//! let chunks = chunk_lines(&lines, 20, 5, 1).unwrap();
//! assert_eq!(chunks.len(), 7);
//! assert_eq!((chunks[1].start_line, chunks[1].end_line), (16, 35));
//! ```

use crate::error::{CoreError, Result};
use crate::models::Chunk;

/// Validate window parameters and return the stride.
pub fn stride(window: usize, overlap: usize) -> Result<usize> {
    if window <= overlap {
        return Err(CoreError::Config(format!(
            "window ({}) must be greater than overlap ({})",
            window, overlap
        )));
    }
    Ok(window - overlap)
}

/// Split `lines` into overlapping windows.
///
/// Each line is expected to carry its own terminator; a chunk's text is the
/// exact concatenation of its lines. Reported line numbers are 1-based and
/// inclusive.
///
/// # Guarantees
///
/// - Empty input yields no chunks.
/// - Input shorter than `window` yields at most one chunk spanning it.
/// - No empty trailing window is produced, even when the line count is an
///   exact multiple of the stride.
pub fn chunk_lines<S: AsRef<str>>(
    lines: &[S],
    window: usize,
    overlap: usize,
    min_lines: usize,
) -> Result<Vec<Chunk>> {
    let stride = stride(window, overlap)?;
    let total = lines.len();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < total {
        let end = (start + window).min(total);
        let slice = &lines[start..end];

        let non_blank = slice
            .iter()
            .filter(|l| !l.as_ref().trim().is_empty())
            .count();
        if non_blank >= min_lines {
            chunks.push(Chunk {
                text: slice.iter().map(|l| l.as_ref()).collect(),
                start_line: start + 1,
                end_line: end,
            });
        }

        if end == total {
            break;
        }
        start += stride;
    }

    Ok(chunks)
}

/// Split text into lines, keeping each line's terminator.
///
/// A final line without a trailing newline is kept as-is. `"a\nb"` gives
/// `["a\n", "b"]`; the empty string gives no lines.
pub fn split_lines_inclusive(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {}\n", i)).collect()
    }

    #[test]
    fn test_hundred_lines_window_twenty_overlap_five() {
        let lines = numbered(100);
        let chunks = chunk_lines(&lines, 20, 5, 5).unwrap();
        assert_eq!(chunks.len(), 7);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 20);
        assert_eq!(chunks[1].start_line, 16);
        assert_eq!(chunks[1].end_line, 35);
        assert_eq!(chunks[6].start_line, 91);
        assert_eq!(chunks[6].end_line, 100);
        for c in &chunks {
            assert!(!c.text.is_empty());
        }
    }

    #[test]
    fn test_rejects_non_positive_stride() {
        let lines = numbered(10);
        assert!(matches!(
            chunk_lines(&lines, 5, 5, 1),
            Err(CoreError::Config(_))
        ));
        assert!(matches!(
            chunk_lines(&lines, 5, 9, 1),
            Err(CoreError::Config(_))
        ));
        assert!(matches!(
            chunk_lines(&lines, 0, 0, 1),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_empty_input() {
        let lines: Vec<String> = Vec::new();
        assert!(chunk_lines(&lines, 20, 5, 0).unwrap().is_empty());
    }

    #[test]
    fn test_short_input_single_window() {
        let lines = numbered(7);
        let chunks = chunk_lines(&lines, 20, 5, 3).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 7));
        assert_eq!(chunks[0].text, lines.concat());
    }

    #[test]
    fn test_short_input_below_min_lines_dropped() {
        let lines = numbered(3);
        assert!(chunk_lines(&lines, 20, 5, 10).unwrap().is_empty());
    }

    #[test]
    fn test_no_trailing_window_on_exact_multiple() {
        // 30 lines, stride 10: windows [0,20), [10,30) and then stop.
        let lines = numbered(30);
        let chunks = chunk_lines(&lines, 20, 10, 1).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.last().unwrap().end_line, 30);
    }

    #[test]
    fn test_blank_windows_dropped() {
        let mut lines = numbered(10);
        lines.extend((0..10).map(|_| "   \n".to_string()));
        let chunks = chunk_lines(&lines, 10, 0, 5).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end_line, 10);
    }

    #[test]
    fn test_coverage_and_overlap() {
        for (total, window, overlap) in [(100, 20, 5), (57, 10, 3), (9, 4, 0), (41, 8, 7)] {
            let lines = numbered(total);
            let chunks = chunk_lines(&lines, window, overlap, 0).unwrap();
            assert_eq!(chunks.first().unwrap().start_line, 1);
            assert_eq!(chunks.last().unwrap().end_line, total);
            for pair in chunks.windows(2) {
                assert_eq!(pair[1].start_line, pair[0].start_line + window - overlap);
                if pair[1].end_line < total {
                    assert_eq!(pair[0].end_line + 1 - pair[1].start_line, overlap);
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let lines = numbered(64);
        let c1 = chunk_lines(&lines, 16, 4, 2).unwrap();
        let c2 = chunk_lines(&lines, 16, 4, 2).unwrap();
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_split_lines_keeps_terminators() {
        assert_eq!(split_lines_inclusive("a\nb\r\nc"), vec!["a\n", "b\r\n", "c"]);
        assert_eq!(split_lines_inclusive("a\n"), vec!["a\n"]);
        assert!(split_lines_inclusive("").is_empty());
    }
}
