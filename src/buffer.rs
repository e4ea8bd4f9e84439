//! Text buffer: a flat character sequence with a cursor (spec §3 "Text
//! buffer", §4.7 "Buffer operations").
//!
//! Grounded on the struct/impl *shape* of `ed`'s `EdBuffer`
//! (GNU-ed style `src/buffer.rs`) — a plain owned struct with small, single-purpose
//! accessor methods — generalized from ed's line array to TECO's flat
//! `dot`-addressed buffer. `dot` is a byte offset, not a codepoint
//! count: TECO text is classically an 8-bit byte stream, and motions
//! like `C`/`R`/`J` count bytes, matching the byte-offset buffer model
//! decided in DESIGN.md's Open Questions.

use crate::error::TecoError;

/// An ordered character sequence with a cursor `dot` (spec §3). Owns
/// its text exclusively; there is exactly one of these per process.
pub struct TextBuffer {
    text: String,
    dot: usize,
    /// `^S`: negative of the length of the most recent insert (or
    /// match, set by the search/replace commands in `interpreter.rs`).
    pub laststringlen: i64,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    pub fn new() -> Self {
        TextBuffer {
            text: String::new(),
            dot: 0,
            laststringlen: 0,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn dot(&self) -> usize {
        self.dot
    }

    pub fn end(&self) -> usize {
        self.text.len()
    }

    /// Sets `dot` directly. Fails `POP` outside `[0, end]`.
    pub fn set_dot(&mut self, pos: usize) -> Result<(), TecoError> {
        if pos > self.end() {
            return Err(TecoError::Pop);
        }
        self.dot = pos;
        Ok(())
    }

    /// `C`/`R`: moves `dot` by `delta` characters (negative for `R`).
    /// Fails `POP` if the result would fall outside `[0, end]`.
    pub fn move_relative(&mut self, delta: i64) -> Result<(), TecoError> {
        let target = self.dot as i64 + delta;
        if target < 0 || target as usize > self.end() {
            return Err(TecoError::Pop);
        }
        self.dot = target as usize;
        Ok(())
    }

    /// `J`: jumps `dot` to an absolute position. Fails `POP` outside
    /// `[0, end]`.
    pub fn jump(&mut self, pos: i64) -> Result<(), TecoError> {
        if pos < 0 || pos as usize > self.end() {
            return Err(TecoError::Pop);
        }
        self.dot = pos as usize;
        Ok(())
    }

    /// Computes the position of the start of the `k`-th following line
    /// (`k > 0`, clamped to `end` if fewer lines remain) or the start
    /// of the `|k|`-th preceding line boundary (`k <= 0`, clamped to
    /// `0`), without moving `dot` (spec §4.7 `line(k)`).
    pub fn line(&self, k: i64) -> usize {
        if k > 0 {
            let mut pos = self.dot;
            for _ in 0..k {
                match self.text[pos..].find('\n') {
                    Some(off) => pos += off + 1,
                    None => return self.end(),
                }
            }
            pos
        } else {
            let mut pos = self.dot;
            for _ in 0..(-k + 1) {
                match self.text[..pos].rfind('\n') {
                    Some(off) => pos = off,
                    None => return 0,
                }
            }
            pos + 1
        }
    }

    /// `L`, `nL`: moves `dot` to [`Self::line`]`(k)`.
    pub fn move_lines(&mut self, k: i64) -> Result<(), TecoError> {
        let pos = self.line(k);
        self.set_dot(pos)
    }

    fn validate_range(&self, m: usize, n: usize) -> Result<(), TecoError> {
        if m > n || n > self.end() {
            Err(TecoError::Pop)
        } else {
            Ok(())
        }
    }

    /// `m,nT` and similar: the text of `[m, n)`. Fails `POP` if out of
    /// range.
    pub fn range(&self, m: usize, n: usize) -> Result<&str, TecoError> {
        self.validate_range(m, n)?;
        Ok(&self.text[m..n])
    }

    /// Inserts `s` at `dot`, advances `dot` past it, and records
    /// `laststringlen` (spec §4.7 "Insert places text at dot...").
    pub fn insert(&mut self, s: &str) {
        self.text.insert_str(self.dot, s);
        self.dot += s.len();
        self.laststringlen = -(s.len() as i64);
    }

    /// Deletes a signed count of characters around `dot`: a positive
    /// count deletes forward from `dot`; a negative count moves `dot`
    /// backward first, then deletes forward from the new position
    /// (spec §4.7 "Delete removes a signed count around dot").
    pub fn delete_count(&mut self, n: i64) -> Result<String, TecoError> {
        let (start, len) = if n >= 0 {
            (self.dot, n as usize)
        } else {
            let back = (-n) as usize;
            if back > self.dot {
                return Err(TecoError::Pop);
            }
            (self.dot - back, back)
        };
        let end = start.checked_add(len).ok_or(TecoError::Pop)?;
        self.validate_range(start, end)?;
        let removed = self.text[start..end].to_string();
        self.text.replace_range(start..end, "");
        self.dot = start;
        Ok(removed)
    }

    /// Deletes the explicit `[m, n)` range (the `m,nK`-style two-argument
    /// form), moving `dot` to `m`.
    pub fn delete_range(&mut self, m: usize, n: usize) -> Result<String, TecoError> {
        self.validate_range(m, n)?;
        let removed = self.text[m..n].to_string();
        self.text.replace_range(m..n, "");
        self.dot = m;
        Ok(removed)
    }

    /// Replaces the entire buffer with `s` and resets `dot` to `0`
    /// (`Y`/`EY`: yank the next page).
    pub fn replace_all(&mut self, s: String) {
        self.text = s;
        self.dot = 0;
    }

    /// Appends `s` to the end of the buffer without moving `dot` (`A`:
    /// append the next page).
    pub fn append_at_end(&mut self, s: &str) {
        self.text.push_str(s);
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn insert_advances_dot_and_records_laststringlen() {
        let mut b = TextBuffer::new();
        b.insert("hello");
        assert_eq!(b.dot(), 5);
        assert_eq!(b.text(), "hello");
        assert_eq!(b.laststringlen, -5);
    }

    #[test]
    fn move_relative_out_of_range_fails_pop() {
        let mut b = TextBuffer::new();
        b.insert("abc");
        b.set_dot(0).unwrap();
        assert!(matches!(b.move_relative(-1), Err(TecoError::Pop)));
        assert!(matches!(b.move_relative(10), Err(TecoError::Pop)));
    }

    #[test]
    fn jump_sets_absolute_position() {
        let mut b = TextBuffer::new();
        b.insert("abcdef");
        b.jump(2).unwrap();
        assert_eq!(b.dot(), 2);
    }

    #[test]
    fn line_forward_finds_next_line_start() {
        let mut b = TextBuffer::new();
        b.insert("one\ntwo\nthree");
        b.set_dot(0).unwrap();
        assert_eq!(b.line(1), 4);
        assert_eq!(b.line(2), 8);
        assert_eq!(b.line(5), b.end());
    }

    #[test]
    fn line_backward_finds_preceding_line_start() {
        let mut b = TextBuffer::new();
        b.insert("one\ntwo\nthree");
        b.set_dot(b.end()).unwrap();
        assert_eq!(b.line(0), 8);
        assert_eq!(b.line(-1), 4);
        assert_eq!(b.line(-5), 0);
    }

    #[test]
    fn delete_count_forward_and_backward() {
        let mut b = TextBuffer::new();
        b.insert("hello world");
        b.set_dot(0).unwrap();
        let removed = b.delete_count(5).unwrap();
        assert_eq!(removed, "hello");
        assert_eq!(b.text(), " world");
        b.set_dot(b.end()).unwrap();
        let removed = b.delete_count(-6).unwrap();
        assert_eq!(removed, " world");
        assert_eq!(b.text(), "");
    }

    #[test]
    fn delete_range_moves_dot_to_start() {
        let mut b = TextBuffer::new();
        b.insert("0123456789");
        b.delete_range(2, 5).unwrap();
        assert_eq!(b.text(), "0156789");
        assert_eq!(b.dot(), 2);
    }

    #[test]
    fn out_of_range_delete_fails_pop() {
        let mut b = TextBuffer::new();
        b.insert("abc");
        assert!(matches!(b.delete_range(1, 10), Err(TecoError::Pop)));
    }

    #[test]
    fn replace_all_resets_dot() {
        let mut b = TextBuffer::new();
        b.insert("old");
        b.replace_all("new page".to_string());
        assert_eq!(b.text(), "new page");
        assert_eq!(b.dot(), 0);
    }

    #[test]
    fn append_at_end_does_not_move_dot() {
        let mut b = TextBuffer::new();
        b.insert("abc");
        b.set_dot(1).unwrap();
        b.append_at_end("def");
        assert_eq!(b.text(), "abcdef");
        assert_eq!(b.dot(), 1);
    }

    proptest! {
        /// Inserting a string at `dot` and immediately deleting the same
        /// count forward restores the original text and `dot` (spec
        /// §4.7: insert places text at `dot` and advances it past the
        /// inserted text; delete removes a signed count around `dot`).
        #[test]
        fn insert_then_delete_same_count_is_identity(
            prefix in "[ -~]{0,16}",
            inserted in "[ -~]{0,16}",
        ) {
            let mut b = TextBuffer::new();
            b.insert(&prefix);
            let dot_before = b.dot();
            b.insert(&inserted);
            let removed = b.delete_count(-(inserted.len() as i64)).unwrap();
            prop_assert_eq!(removed, inserted);
            prop_assert_eq!(b.text(), prefix.as_str());
            prop_assert_eq!(b.dot(), dot_before);
        }

        /// `move_relative` followed by its exact negation returns `dot`
        /// to where it started, for any in-range delta.
        #[test]
        fn move_relative_round_trip(text in "[ -~]{0,32}", delta in -32i64..32) {
            let mut b = TextBuffer::new();
            b.insert(&text);
            let start = b.end() / 2;
            b.set_dot(start).unwrap();
            if b.move_relative(delta).is_ok() {
                b.move_relative(-delta).unwrap();
                prop_assert_eq!(b.dot(), start);
            }
        }
    }
}
