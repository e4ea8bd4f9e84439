//! Search compiler and executor (spec §4.3).
//!
//! Grounded on the *shape* of `ed`'s `src/regex.rs` (delimiter
//! scanning, building a `regex::Regex`, caching the last pattern) — but
//! the escape vocabulary itself is TECO's own, not GNU-ed's BRE/ERE
//! escapes, and is taken from
//! `examples/original_source/teco/teco.py`'s `_searchpat`/
//! `_searchdict2`/`_searchdict5`/`_str2rerep`.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};

use crate::error::TecoError;
use crate::registers::{RegName, RegisterScopes, ScopeId};

const ENQ: char = '\u{05}'; // ^E
const CTRL_N: char = '\u{0E}'; // ^N, inverse-class prefix
const CTRL_S: char = '\u{13}'; // ^S, \W shorthand
const CTRL_X: char = '\u{18}'; // ^X, dot-matches-all shorthand
const SPECIALS: &str = "][\\^$.?+(){}";

fn escape_if_special(c: char) -> String {
    if SPECIALS.contains(c) {
        format!("\\{c}")
    } else {
        c.to_string()
    }
}

/// `^EGq` table-match expansion (spec §4.3 `^EG q`), mirroring the
/// original's charset-dedup-and-escape logic exactly, including its
/// single-character shortcut (no brackets needed for a one-element set).
fn eg_fragment(text: &str, inverse: bool) -> String {
    let mut charset: BTreeSet<char> = text.chars().collect();
    if charset.is_empty() {
        return String::new();
    }
    if !inverse && charset.len() == 1 {
        return escape_if_special(*charset.iter().next().unwrap());
    }
    let mut prefix = String::new();
    let mut suffix = String::new();
    if charset.remove(&']') {
        prefix.push(']');
    }
    if charset.remove(&'\\') {
        prefix.push('\\');
    }
    if charset.remove(&'-') {
        suffix.push('-');
    }
    let body: String = charset.into_iter().collect();
    let inner = format!("{prefix}{body}{suffix}");
    if inverse {
        format!("[^{inner}]")
    } else {
        format!("[{inner}]")
    }
}

fn class_body(letter: char) -> Option<&'static str> {
    match letter {
        'A' => Some("A-Za-z"),
        'B' => Some("\\W"),
        'C' => Some("\\w$_."),
        'D' => Some("\\d"),
        'L' => Some("\n\u{0B}\u{0C}"),
        'R' => Some("\\w"),
        'V' => Some("a-z"),
        'W' => Some("A-Z"),
        _ => None,
    }
}

/// Tries to match a (possibly `^N`-inverted) character class starting
/// at `chars[i]`. Returns `(consumed, fragment)`.
fn match_class(
    chars: &[char],
    i: usize,
    regs: &RegisterScopes,
    scope: ScopeId,
    inverse: bool,
) -> Result<Option<(usize, String)>, TecoError> {
    let Some(&c) = chars.get(i) else {
        return Ok(None);
    };
    if c == ENQ {
        match chars.get(i + 1).map(|d| d.to_ascii_uppercase()) {
            Some('G') => {
                let (name, namelen) = RegName::parse(&chars[i + 2..])?;
                let text = regs.get_text(name, scope);
                return Ok(Some((2 + namelen, eg_fragment(&text, inverse))));
            }
            Some(letter) => {
                if let Some(body) = class_body(letter) {
                    let frag = if inverse {
                        format!("[^{body}]")
                    } else {
                        format!("[{body}]")
                    };
                    return Ok(Some((2, frag)));
                }
            }
            None => {}
        }
        return Ok(None);
    }
    if c == CTRL_S {
        let frag = if inverse { "[^\\W]" } else { "[\\W]" };
        return Ok(Some((1, frag.to_string())));
    }
    Ok(None)
}

fn match_special(
    chars: &[char],
    i: usize,
    regs: &RegisterScopes,
    scope: ScopeId,
) -> Result<Option<(usize, String)>, TecoError> {
    let c = chars[i];
    if SPECIALS.contains(c) {
        return Ok(Some((1, format!("\\{c}"))));
    }
    if c == CTRL_X {
        return Ok(Some((1, ".".to_string())));
    }
    if c == ENQ {
        match chars.get(i + 1).map(|d| d.to_ascii_uppercase()) {
            Some('S') => return Ok(Some((2, "[ \t]+".to_string()))),
            Some('X') => return Ok(Some((2, ".".to_string()))),
            Some('E') => {
                let rest: String = chars[i + 2..].iter().collect();
                return Ok(Some((chars.len() - i, rest)));
            }
            _ => {}
        }
    }
    let (inverse, class_start) = if c == CTRL_N { (true, i + 1) } else { (false, i) };
    if let Some((clen, frag)) = match_class(chars, class_start, regs, scope, inverse)? {
        return Ok(Some((class_start - i + clen, frag)));
    }
    Ok(None)
}

/// Compiles a built search string into a real `Regex` with
/// dot-matches-all always on and case sensitivity controlled by `^x`
/// (`caret_x != 0` means case-sensitive).
pub fn compile_pattern(
    built: &str,
    caret_x: i16,
    regs: &RegisterScopes,
    scope: ScopeId,
) -> Result<Regex, TecoError> {
    let chars: Vec<char> = built.chars().collect();
    let mut pattern = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if let Some((len, frag)) = match_special(&chars, i, regs, scope)? {
            pattern.push_str(&frag);
            i += len;
        } else {
            pattern.push(chars[i]);
            i += 1;
        }
    }
    RegexBuilder::new(&pattern)
        .dot_matches_new_line(true)
        .case_insensitive(caret_x == 0)
        .build()
        .map_err(|_| TecoError::Isa)
}

/// One match's `[start, end)` byte-offset range.
pub type Match = (usize, usize);

fn find_forward(re: &Regex, text: &str, pos: usize, start: usize, end: usize) -> Option<Match> {
    let m = re.find_at(text, pos)?;
    if m.start() >= start && m.start() <= end {
        Some((m.start(), m.end()))
    } else {
        None
    }
}

/// Forward search for the `count`-th occurrence at or after `start`,
/// bounded to `[start, end]`, advancing past each match to find the
/// next (spec §4.3 "advance pos to its end").
pub fn search_forward_repeated(
    re: &Regex,
    text: &str,
    count: u32,
    start: usize,
    end: usize,
) -> Option<Match> {
    let mut pos = start;
    let mut result = None;
    for _ in 0..count.max(1) {
        let m = find_forward(re, text, pos, start, end)?;
        pos = m.1;
        result = Some(m);
    }
    result
}

/// Reverse search by sliding anchored match, one character at a time
/// (spec §4.3, explicitly sanctioned as the simple correctness-
/// preserving implementation). Finds the `count`-th occurrence walking
/// backward from `end_bound`; `nextpage` is never consulted for reverse
/// searches.
pub fn search_reverse_repeated(re: &Regex, text: &str, count: u32, end_bound: usize) -> Option<Match> {
    let mut pos = end_bound;
    let mut laststart: Option<usize> = None;
    let mut found: Option<Match> = None;
    let mut remaining = count.max(1);
    loop {
        if let Some(m) = re.find_at(text, pos) {
            if m.start() == pos && laststart.map_or(true, |ls| m.end() <= ls) {
                found = Some((m.start(), m.end()));
                laststart = Some(m.start());
                remaining -= 1;
                if remaining == 0 {
                    break;
                }
            }
        }
        if pos == 0 {
            break;
        }
        pos -= 1;
    }
    if remaining == 0 {
        found
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regs() -> RegisterScopes {
        RegisterScopes::new()
    }

    #[test]
    fn literal_text_matches_case_insensitively() {
        let r = regs();
        let re = compile_pattern("foo", 0, &r, 0).unwrap();
        assert_eq!(find_forward(&re, "xxFOOxx", 0, 0, 7), Some((2, 5)));
    }

    #[test]
    fn caret_x_forces_case_sensitivity() {
        let r = regs();
        let re = compile_pattern("foo", 1, &r, 0).unwrap();
        assert_eq!(find_forward(&re, "FOO", 0, 0, 3), None);
    }

    #[test]
    fn special_chars_are_escaped() {
        let r = regs();
        let re = compile_pattern("a.b", 0, &r, 0).unwrap();
        assert_eq!(find_forward(&re, "axb a.b", 0, 0, 7), Some((4, 7)));
    }

    #[test]
    fn ctrl_x_is_dot_match_all() {
        let r = regs();
        let re = compile_pattern(format!("a{CTRL_X}b").as_str(), 0, &r, 0).unwrap();
        assert!(find_forward(&re, "aZb", 0, 0, 3).is_some());
    }

    #[test]
    fn enq_s_is_whitespace_run() {
        let r = regs();
        let pat = format!("a{ENQ}Sb");
        let re = compile_pattern(&pat, 0, &r, 0).unwrap();
        assert!(find_forward(&re, "a   b", 0, 0, 5).is_some());
    }

    #[test]
    fn enq_d_is_digit_class() {
        let r = regs();
        let pat = format!("{ENQ}D+");
        let re = compile_pattern(&pat, 0, &r, 0).unwrap();
        assert_eq!(find_forward(&re, "ab123cd", 0, 0, 7), Some((2, 5)));
    }

    #[test]
    fn ctrl_n_inverts_class() {
        let r = regs();
        let pat = format!("{CTRL_N}{ENQ}D+");
        let re = compile_pattern(&pat, 0, &r, 0).unwrap();
        assert_eq!(find_forward(&re, "123abc456", 0, 0, 9), Some((3, 6)));
    }

    #[test]
    fn enq_e_passes_through_raw_regex() {
        let r = regs();
        let pat = format!("{ENQ}Ea+b");
        let re = compile_pattern(&pat, 0, &r, 0).unwrap();
        assert!(find_forward(&re, "xxaaabxx", 0, 0, 8).is_some());
    }

    #[test]
    fn eg_single_char_has_no_brackets() {
        let mut r = regs();
        let scope = r.root_scope();
        r.set_text(RegName::Global('A'), scope, "x".into());
        let pat = format!("{ENQ}Ga");
        let re = compile_pattern(&pat, 0, &r, scope).unwrap();
        assert!(find_forward(&re, "zxz", 0, 0, 3).is_some());
    }

    #[test]
    fn forward_repeated_advances_past_each_match() {
        let r = regs();
        let re = compile_pattern("a", 0, &r, 0).unwrap();
        let m = search_forward_repeated(&re, "aXaXaXa", 3, 0, 7).unwrap();
        assert_eq!(m, (4, 5));
    }

    #[test]
    fn forward_repeated_fails_without_enough_matches() {
        let r = regs();
        let re = compile_pattern("a", 0, &r, 0).unwrap();
        assert!(search_forward_repeated(&re, "aXa", 5, 0, 3).is_none());
    }

    #[test]
    fn reverse_finds_nearest_match_ending_before_bound() {
        let r = regs();
        let re = compile_pattern("ab", 0, &r, 0).unwrap();
        let m = search_reverse_repeated(&re, "ab..ab..", 1, 8).unwrap();
        assert_eq!(m, (4, 6));
    }

    #[test]
    fn reverse_repeated_walks_further_back() {
        let r = regs();
        let re = compile_pattern("ab", 0, &r, 0).unwrap();
        let m = search_reverse_repeated(&re, "ab..ab..", 2, 8).unwrap();
        assert_eq!(m, (0, 2));
    }
}
