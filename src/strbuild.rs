//! String-argument delimiter scanning and the string-build escape pass
//! (spec §4.2).
//!
//! Grounded on `ed`'s `src/regex.rs` `extract_pattern` for the
//! shape of delimiter-bounded scanning; the escape vocabulary and the
//! "bit 0 of `ed` disables bare `^x` conversion" rule come from
//! `examples/original_source/teco/teco.py`'s `_bldpat`/`_bldpatnoup`
//! and `_strbuildrep`.

use crate::error::TecoError;
use crate::registers::{RegName, RegisterScopes, ScopeId};

/// Bit 0 of `ed`: when set, a bare `^x` in a built string is left
/// literal instead of being converted to the control character for `x`.
pub const ED_NO_UPARROW_CONVERSION: i16 = 0x0001;

const DC1: char = '\u{11}'; // raw ^Q
const DC2: char = '\u{12}'; // raw ^R
const ENQ: char = '\u{05}'; // raw ^E
const SYN: char = '\u{16}'; // raw ^V
const ETB: char = '\u{17}'; // raw ^W
const CARET: char = '^';

/// Reads a delimited string argument starting at `chars[start]`, up to
/// (but not including) the first occurrence of `delim`. Returns the
/// argument text and the index just past the delimiter. Fails `UTC` if
/// `delim` never occurs.
pub fn read_string_arg(chars: &[char], start: usize, delim: char) -> Result<(String, usize), TecoError> {
    let mut i = start;
    let mut s = String::new();
    while i < chars.len() {
        if chars[i] == delim {
            return Ok((s, i + 1));
        }
        s.push(chars[i]);
        i += 1;
    }
    Err(TecoError::Utc)
}

/// Reads two consecutive delimited string arguments sharing `delim`
/// (the search-and-replace two-argument form).
pub fn read_two_string_args(
    chars: &[char],
    start: usize,
    delim: char,
) -> Result<(String, String, usize), TecoError> {
    let (first, mid) = read_string_arg(chars, start, delim)?;
    let (second, end) = read_string_arg(chars, mid, delim)?;
    Ok((first, second, end))
}

fn makecontrol(c: char) -> Result<char, TecoError> {
    let n = c as u32;
    if (0x40..=0x5F).contains(&n) || (0x61..=0x7A).contains(&n) {
        Ok(char::from_u32(n & 31).unwrap())
    } else {
        Err(TecoError::Iuc)
    }
}

/// Detects a `^x`/raw-control-byte introducer at `chars[i]`. Returns
/// `(intro_len, letter, original_next_char_or_none)` where `intro_len`
/// is 1 for an already-raw control byte or 2 for a literal `^` + letter
/// pair, and `letter` is the uppercased command letter.
fn match_intro(chars: &[char], i: usize) -> Option<(usize, char)> {
    match chars.get(i)? {
        &CARET => chars.get(i + 1).map(|&d| (2, d.to_ascii_uppercase())),
        &DC1 => Some((1, 'Q')),
        &DC2 => Some((1, 'R')),
        &ENQ => Some((1, 'E')),
        &SYN => Some((1, 'V')),
        &ETB => Some((1, 'W')),
        _ => None,
    }
}

/// Applies the string-build escape pass to `s` (spec §4.2). `ed_flags`
/// supplies bit 0 (no-uparrow-conversion); `regs`/`scope` resolve
/// `^EQq`/`^EUq` register references.
pub fn build(
    s: &str,
    ed_flags: i16,
    regs: &RegisterScopes,
    scope: ScopeId,
) -> Result<String, TecoError> {
    let chars: Vec<char> = s.chars().collect();
    let no_uparrow = ed_flags & ED_NO_UPARROW_CONVERSION != 0;
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let Some((intro_len, letter)) = match_intro(&chars, i) else {
            out.push(chars[i]);
            i += 1;
            continue;
        };
        let is_raw = intro_len == 1;
        match letter {
            'Q' | 'R' => {
                let x = *chars
                    .get(i + intro_len)
                    .ok_or(TecoError::Utc)?;
                out.push(x);
                i += intro_len + 1;
            }
            'E' => {
                let sub = chars.get(i + intro_len).map(|c| c.to_ascii_uppercase());
                match sub {
                    Some('Q') => {
                        let (name, len) = RegName::parse(&chars[i + intro_len + 1..])?;
                        out.push_str(&regs.get_text(name, scope));
                        i += intro_len + 1 + len;
                    }
                    Some('U') => {
                        let (name, len) = RegName::parse(&chars[i + intro_len + 1..])?;
                        let n = regs.get_num(name, scope);
                        let c = char::from_u32(n as u32).ok_or(TecoError::Iuc)?;
                        out.push(c);
                        i += intro_len + 1 + len;
                    }
                    _ => {
                        // Generic ^x fallback with x == 'E'.
                        if is_raw {
                            out.push(ENQ);
                            i += 1;
                        } else if no_uparrow {
                            out.push(CARET);
                            out.push(chars[i + 1]);
                            i += 2;
                        } else {
                            out.push(makecontrol('E')?);
                            i += 2;
                        }
                    }
                }
            }
            'V' => {
                let x = *chars.get(i + intro_len).ok_or(TecoError::Utc)?;
                out.extend(x.to_lowercase());
                i += intro_len + 1;
            }
            'W' => {
                let x = *chars.get(i + intro_len).ok_or(TecoError::Utc)?;
                out.extend(x.to_uppercase());
                i += intro_len + 1;
            }
            other => {
                if is_raw {
                    out.push(chars[i]);
                    i += 1;
                } else if no_uparrow {
                    out.push(CARET);
                    out.push(chars[i + 1]);
                    i += 2;
                } else {
                    out.push(makecontrol(other)?);
                    i += 2;
                }
            }
        }
    }
    Ok(out)
}
