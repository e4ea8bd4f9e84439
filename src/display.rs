//! The watch-display sink boundary (spec §6 "Optional display", §9
//! "Watch").
//!
//! The curses-style terminal watch and the windowed display are both
//! out of scope (spec §1); what remains is the seam between them and
//! the interpreter, so `interpreter.rs` can call `sink.refresh(...)`
//! unconditionally without caring whether a real display is attached.
//! Grounded on `ed`'s trait-boundary style at the ed/command
//! split (`Sink`-shaped single-method traits kept narrow on purpose).

/// A pluggable display backend. `refresh` receives the visible window
/// of text (as computed by the interpreter's `screentext` routine),
/// the cursor row, and the cursor column; it must never block.
pub trait Sink {
    fn enable(&mut self);
    fn disable(&mut self);
    fn refresh(&mut self, lines: &[&str], row: usize, col: usize);
}

/// The only sink this crate ships: the windowed and curses displays
/// are out of scope, so refresh calls are simply dropped.
#[derive(Debug, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn enable(&mut self) {}
    fn disable(&mut self) {}
    fn refresh(&mut self, _lines: &[&str], _row: usize, _col: usize) {}
}

/// Computes the visible window of `text` around `dot`: up to `height`
/// lines centered as closely as possible on the line containing `dot`,
/// plus `dot`'s row/col within that window (spec §9 "Watch").
pub fn screentext(text: &str, dot: usize, height: usize) -> (Vec<&str>, usize, usize) {
    if height == 0 {
        return (Vec::new(), 0, 0);
    }
    let mut line_starts = vec![0usize];
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            line_starts.push(i + 1);
        }
    }
    let dot_line = line_starts.partition_point(|&s| s <= dot).saturating_sub(1);
    let col = dot - line_starts[dot_line];

    let half = height / 2;
    let first = dot_line.saturating_sub(half);
    let last = (first + height).min(line_starts.len());
    let first = last.saturating_sub(height).min(first);

    let mut lines = Vec::with_capacity(last - first);
    for i in first..last {
        let start = line_starts[i];
        let end = line_starts.get(i + 1).map(|&e| e.saturating_sub(1)).unwrap_or(text.len());
        lines.push(&text[start..end.max(start)]);
    }
    (lines, dot_line - first, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_never_panics() {
        let mut sink = NullSink;
        sink.enable();
        sink.refresh(&["a", "b"], 0, 0);
        sink.disable();
    }

    #[test]
    fn screentext_locates_dot_row_and_col() {
        let text = "one\ntwo\nthree\n";
        let (lines, row, col) = screentext(text, 5, 10);
        assert_eq!(lines, vec!["one", "two", "three", ""]);
        assert_eq!(row, 1);
        assert_eq!(col, 1);
    }

    #[test]
    fn screentext_centers_window_when_text_is_long() {
        let text = "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n";
        let (lines, row, _col) = screentext(text, 14, 3); // dot at start of "5"
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[row], "5");
    }

    #[test]
    fn screentext_zero_height_is_empty() {
        let (lines, row, col) = screentext("abc", 1, 0);
        assert!(lines.is_empty());
        assert_eq!((row, col), (0, 0));
    }
}
