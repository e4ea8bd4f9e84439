//! Forward-skipping scanners for iteration, conditional, and tag
//! control flow (spec §4.4).
//!
//! GNU ed has no nested control-flow commands to skip over, so this
//! has no ed-side analogue; grounded on
//! `examples/original_source/teco/teco.py`'s `basepat`/`iterpat`/
//! `condpat`/`tagpat` grammar and the `skip`/`skipiter`/`skipcond`/
//! `findtag` methods. Rather than precompiling the original's three
//! regexes, this is written as a hand-rolled character scanner sharing
//! one "skip one command" step, per the Design Notes' preferred option.

use crate::error::TecoError;
use crate::registers::RegName;

const ESC: char = '\u{1b}';
const CTRL_A: char = '\u{01}';
const CTRL_U: char = '\u{15}';
const CTRL_CARET: char = '\u{1e}'; // ^^x literal-next-char introducer

fn find_delim(chars: &[char], start: usize, delim: char) -> Result<usize, TecoError> {
    let mut i = start;
    while i < chars.len() {
        if chars[i] == delim {
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(TecoError::Utc)
}

/// Scans one `n_fields`-field string argument starting at `i`. Under
/// the `@` modifier the delimiter is the very next character; otherwise
/// it is `fixed_delim` (ESC for most commands, `^A` self-delimited).
fn scan_fields(
    chars: &[char],
    i: usize,
    at_mode: bool,
    fixed_delim: char,
    n_fields: u32,
) -> Result<usize, TecoError> {
    let (delim, mut pos) = if at_mode {
        (*chars.get(i).ok_or(TecoError::Utc)?, i + 1)
    } else {
        (fixed_delim, i)
    };
    for _ in 0..n_fields {
        pos = find_delim(chars, pos, delim)?;
    }
    Ok(pos)
}

/// Scans one complete command starting at `chars[i]` (which the caller
/// has already verified is not a terminator for its scan), returning
/// the index just past it.
fn step_one_command(chars: &[char], i: usize) -> Result<usize, TecoError> {
    let c = *chars.get(i).ok_or(TecoError::Utc)?;
    if c == '@' {
        return step_command_body(chars, i + 1, true);
    }
    step_command_body(chars, i, false)
}

fn step_command_body(chars: &[char], i: usize, at_mode: bool) -> Result<usize, TecoError> {
    let c = *chars.get(i).ok_or(TecoError::Utc)?;
    let cu = c.to_ascii_uppercase();
    match cu {
        'F' => {
            let c2 = chars.get(i + 1).map(|d| d.to_ascii_uppercase());
            match c2 {
                Some('C') | Some('N') | Some('S') | Some('_') => {
                    scan_fields(chars, i + 2, at_mode, ESC, 2)
                }
                Some('B') | Some('R') => scan_fields(chars, i + 2, at_mode, ESC, 1),
                Some(_) => Ok(i + 2),
                None => Err(TecoError::Utc),
            }
        }
        'E' => {
            let c2 = chars.get(i + 1).map(|d| d.to_ascii_uppercase());
            match c2 {
                Some('B') | Some('G') | Some('I') | Some('N') | Some('R') | Some('W') | Some('_') => {
                    scan_fields(chars, i + 2, at_mode, ESC, 1)
                }
                Some(_) => Ok(i + 2),
                None => Err(TecoError::Utc),
            }
        }
        _ if c == CTRL_A => scan_fields(chars, i + 1, at_mode, CTRL_A, 1),
        // ^U's string argument is ESC-terminated, like most string
        // commands (its name register prefix is consumed first).
        _ if c == CTRL_U => {
            let (_, namelen) = RegName::parse(&chars[i + 1..])?;
            scan_fields(chars, i + 1 + namelen, at_mode, ESC, 1)
        }
        _ if c == CTRL_CARET => {
            chars.get(i + 1).ok_or(TecoError::Utc)?;
            Ok(i + 2)
        }
        // Bare '!' is a tag definition, skipped as one atomic unit up to
        // its matching '!' rather than ESC-terminated like other string
        // commands; under '@' it behaves like the others (next-char delim).
        '!' if at_mode => scan_fields(chars, i + 1, true, ESC, 1),
        '!' => find_delim(chars, i + 1, '!'),
        'I' | 'N' | 'O' | 'S' | '_' => scan_fields(chars, i + 1, at_mode, ESC, 1),
        '[' | ']' | '%' | 'G' | 'M' | 'Q' | 'U' | 'X' => {
            let (_, namelen) = RegName::parse(&chars[i + 1..])?;
            Ok(i + 1 + namelen)
        }
        // Literal "^" + letter (source notation, as opposed to a raw
        // control byte): ^A is self-delimited by the raw control byte of
        // the same name, ^U is ESC-delimited; any other "^x" is a plain
        // two-character command.
        _ if c == '^' => {
            let c2 = chars.get(i + 1).map(|d| d.to_ascii_uppercase());
            match c2 {
                Some('A') => scan_fields(chars, i + 2, at_mode, CTRL_A, 1),
                Some('U') => {
                    let (_, namelen) = RegName::parse(&chars[i + 2..])?;
                    scan_fields(chars, i + 2 + namelen, at_mode, ESC, 1)
                }
                Some(_) => Ok(i + 2),
                None => Err(TecoError::Utc),
            }
        }
        _ => Ok(i + 1),
    }
}

/// Advances from `i`, skipping whole commands, until the next character
/// is one of `terms` (returned unconsumed) or the string ends (`None`).
fn skip_until(chars: &[char], mut i: usize, terms: &str) -> Result<(usize, Option<char>), TecoError> {
    loop {
        match chars.get(i) {
            None => return Ok((i, None)),
            Some(&c) if terms.contains(c) => return Ok((i, Some(c))),
            Some(_) => i = step_one_command(chars, i)?,
        }
    }
}

/// Skips a whole `<...>` body, starting just after the opening `<`,
/// tracking nested iterations. Returns the index just past the
/// matching `>`. Fails `MRA` ("missing >") if the string runs out.
pub fn skip_iter(chars: &[char], start: usize) -> Result<usize, TecoError> {
    let mut i = start;
    let mut depth: u32 = 1;
    loop {
        let (at, term) = skip_until(chars, i, "<>")?;
        match term {
            Some('<') => {
                depth += 1;
                i = at + 1;
            }
            Some('>') => {
                depth -= 1;
                i = at + 1;
                if depth == 0 {
                    return Ok(i);
                }
            }
            None => return Err(TecoError::Mra),
            Some(_) => unreachable!(),
        }
    }
}

/// What a conditional skip landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondStop {
    /// `|`: an else-branch starts here.
    Else,
    /// `'`: the conditional ends here.
    End,
}

/// Skips from just after a `"` (or a `|`, to reach the matching `'`) to
/// the matching `|` or `'` at the same nesting depth. Nested `<...>`
/// pairs are skipped as whole units (iterations can overlap
/// conditionals, per the original's comment); nested `"..."` are
/// skipped but tracked so an inner `|`/`'` doesn't terminate the outer
/// scan. Returns the index just past the terminator found, and which
/// one it was. Fails `MAP` if the string runs out, `BNI` on a stray `>`.
pub fn skip_cond(chars: &[char], start: usize) -> Result<(usize, CondStop), TecoError> {
    let mut i = start;
    let mut depth: u32 = 0;
    loop {
        let (at, term) = skip_until(chars, i, "\"'|<>")?;
        match term {
            Some('<') => i = skip_iter(chars, at + 1)?,
            Some('"') => {
                depth += 1;
                i = at + 1;
            }
            Some('\'') => {
                if depth == 0 {
                    return Ok((at + 1, CondStop::End));
                }
                depth -= 1;
                i = at + 1;
            }
            Some('|') => {
                if depth == 0 {
                    return Ok((at + 1, CondStop::Else));
                }
                i = at + 1;
            }
            Some('>') => return Err(TecoError::Bni),
            None => return Err(TecoError::Map),
            Some(_) => unreachable!(),
        }
    }
}

/// Searches the whole command string for a `!name!` tag definition,
/// starting at `start`. Nested iterations are skipped, not searched —
/// a tag inside one is unreachable from outside it. Returns the index
/// just past the closing `!`. Fails `TAG` if never found.
pub fn find_tag(chars: &[char], start: usize, name: &str) -> Result<usize, TecoError> {
    let mut i = start;
    loop {
        let (at, term) = skip_until(chars, i, "!<>")?;
        match term {
            Some('!') => {
                let body_start = at + 1;
                let end = find_delim(chars, body_start, '!')?;
                let body: String = chars[body_start..end - 1].iter().collect();
                if body.eq_ignore_ascii_case(name) {
                    return Ok(end);
                }
                i = end;
            }
            Some('<') => i = skip_iter(chars, at + 1)?,
            Some('>') => return Err(TecoError::Bni),
            None => return Err(TecoError::Tag(name.to_string())),
            Some(_) => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cs(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn skip_iter_finds_matching_close() {
        let c = cs("0A>rest");
        assert_eq!(skip_iter(&c, 0).unwrap(), 3);
    }

    #[test]
    fn skip_iter_handles_nesting() {
        let c = cs("0A<1B>2C>rest");
        // start is just after the outer '<', matching '>' is the second one
        assert_eq!(skip_iter(&c, 0).unwrap(), 9);
    }

    #[test]
    fn skip_iter_missing_close_fails_mra() {
        let c = cs("0Arest");
        assert!(matches!(skip_iter(&c, 0), Err(TecoError::Mra)));
    }

    #[test]
    fn skip_cond_finds_else() {
        let c = cs("0A|1B'rest");
        let (end, stop) = skip_cond(&c, 0).unwrap();
        assert_eq!(stop, CondStop::Else);
        assert_eq!(end, 4);
    }

    #[test]
    fn skip_cond_finds_end_when_no_else() {
        let c = cs("0A'rest");
        let (end, stop) = skip_cond(&c, 0).unwrap();
        assert_eq!(stop, CondStop::End);
        assert_eq!(end, 4);
    }

    #[test]
    fn skip_cond_skips_nested_conditional() {
        let c = cs("0A\"B1C|2D'3E'rest");
        let (_, stop) = skip_cond(&c, 0).unwrap();
        assert_eq!(stop, CondStop::End);
    }

    #[test]
    fn skip_cond_skips_whole_nested_iteration() {
        // a '|' inside a nested <...> must not terminate the outer scan
        let c = cs("0A<1B|2C>'rest");
        let (_, stop) = skip_cond(&c, 0).unwrap();
        assert_eq!(stop, CondStop::End);
    }

    #[test]
    fn skip_cond_missing_terminator_fails_map() {
        let c = cs("0Arest");
        assert!(matches!(skip_cond(&c, 0), Err(TecoError::Map)));
    }

    #[test]
    fn find_tag_locates_definition() {
        let c = cs("0A!foo!1B");
        let end = find_tag(&c, 0, "foo").unwrap();
        assert_eq!(end, 7);
    }

    #[test]
    fn find_tag_is_case_insensitive() {
        let c = cs("!FOO!");
        assert!(find_tag(&c, 0, "foo").is_ok());
    }

    #[test]
    fn find_tag_skips_nested_iteration() {
        let c = cs("<!foo!>rest");
        assert!(matches!(find_tag(&c, 0, "foo"), Err(TecoError::Tag(_))));
    }

    #[test]
    fn find_tag_missing_fails_tag_error() {
        let c = cs("0A1B");
        assert!(matches!(find_tag(&c, 0, "foo"), Err(TecoError::Tag(_))));
    }

    #[test]
    fn string_arg_commands_are_skipped_atomically() {
        // an ESC-delimited insert shouldn't be mistaken for a terminator
        let c = cs("Ihello\u{1b}>rest");
        assert_eq!(skip_iter(&c, 0).unwrap(), 8);
    }

    #[test]
    fn at_modified_search_uses_next_char_as_delimiter() {
        let c = cs("@S/foo/>rest");
        assert_eq!(skip_iter(&c, 0).unwrap(), 8);
    }

    #[test]
    fn register_name_command_consumes_local_prefix() {
        let c = cs("Q.A>rest");
        assert_eq!(skip_iter(&c, 0).unwrap(), 4);
    }

    proptest! {
        /// For any nesting depth, a body built from plain one-character
        /// commands (`X`) wrapped in that many `<...>` pairs plus a
        /// trailing suffix: `skip_iter` (started just inside the
        /// outermost `<`) must land exactly on the character after the
        /// outermost matching `>`, regardless of what follows it.
        #[test]
        fn skip_iter_matches_balanced_nesting_depth(depth in 1usize..8, suffix in "[A-Za-z]{0,4}") {
            let mut s = String::new();
            for _ in 0..depth {
                s.push('<');
            }
            s.push('X');
            for _ in 0..depth {
                s.push('>');
            }
            s.push_str(&suffix);
            let c = cs(&s);
            let end = skip_iter(&c, 1).unwrap();
            prop_assert_eq!(end, 2 * depth + 1);
            prop_assert_eq!(c.get(end).copied(), suffix.chars().next());
        }
    }
}
