//! Terminal command-line assembly (spec §4.9 "Input reader").
//!
//! The raw character fetch from the terminal — putting the tty in raw
//! mode and pulling one byte at a time off the wire — is the external
//! boundary spec §1 places out of scope; what happens to those bytes
//! before a complete command string reaches the dispatcher is not.
//! This module implements that layer: immediate echo, rubout/line-kill
//! editing, and the double-escape that submits a command, over any
//! `Read` source (a real stdin in production, a byte slice in tests).
//! Grounded on `examples/original_source/teco/teco.py`'s
//! `cmdhandler.teco_getcmd`/`rubout`/`insertchar` methods, reduced to
//! the subset spec §4.9 actually names (no star-command shortcuts).

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::printable;

const BEL: u8 = 0x07;
const BS: u8 = 0x08;
const DEL: u8 = 0x7f;
const CTRL_U: u8 = 0x15;
const CR: u8 = b'\r';
const LF: u8 = b'\n';
const ESC: u8 = 0x1b;

/// `EI`/bootstrap macro lookup: a name with a directory component is
/// used as-is; a bare name is searched for along `TECO_PATH`, then
/// `PATH`, then the conventional system macro directories (spec §6
/// "`EI` search path").
pub fn resolve_ei_path(fname: &str) -> Option<PathBuf> {
    let path = Path::new(fname);
    if fname.contains('/') {
        return if path.exists() { Some(path.to_path_buf()) } else { None };
    }
    let search_lists = [
        std::env::var("TECO_PATH").ok(),
        std::env::var("PATH").ok(),
        Some("/usr/local/lib/teco:/usr/lib/teco".to_string()),
    ];
    for list in search_lists.into_iter().flatten() {
        for dir in list.split(':') {
            if dir.is_empty() {
                continue;
            }
            let candidate = Path::new(dir).join(fname);
            if candidate.exists() {
                tracing::trace!(path = %candidate.display(), "resolved EI search path");
                return Some(candidate);
            }
        }
    }
    if path.exists() {
        return Some(path.to_path_buf());
    }
    tracing::trace!(fname, "EI search path exhausted");
    None
}

/// Reads and echoes one assembled command string from `input`, stage by
/// stage (spec §4.9):
///
/// 1. Ordinary bytes are echoed back printably and appended.
/// 2. `BS`/`DEL` ("rubout") erase the previous character, echoing the
///    erased text so the operator can see what went away; `^U` erases
///    the whole current line (back to the last newline already in the
///    buffer).
/// 3. A single `BEL` arms a pending re-echo: `BEL BEL` abandons the
///    line entirely and reprints the `*` prompt marker; `BEL SPACE`
///    re-echoes the current line; `BEL *` re-echoes the whole
///    accumulated buffer. Two consecutive `ESC` bytes submit the line.
///
/// Returns `Ok(None)` on end-of-file with nothing accumulated.
pub fn read_command_line<R: Read>(mut input: R) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    let mut pending_bell = false;
    let mut byte = [0u8; 1];

    loop {
        match input.read(&mut byte)? {
            0 => {
                return if line.is_empty() { Ok(None) } else { Ok(Some(line)) };
            }
            _ => {}
        }
        let b = byte[0];

        if pending_bell {
            pending_bell = false;
            match b {
                BEL => {
                    line.clear();
                    print!("\r\n*");
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                    continue;
                }
                b' ' => {
                    print!("\r\n*{}", printable::printable(line.as_bytes()));
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                    continue;
                }
                b'*' => {
                    print!("\r\n*{}", printable::printable(line.as_bytes()));
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                    continue;
                }
                _ => {}
            }
        }

        match b {
            BEL => {
                pending_bell = true;
            }
            BS | DEL => {
                if let Some(c) = line.pop() {
                    print!("{}", printable::printable(c.to_string().as_bytes()));
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                }
            }
            CTRL_U => {
                let cut = line.rfind('\n').map(|i| i + 1).unwrap_or(0);
                line.truncate(cut);
                print!("\\\\\r\n*{}", printable::printable(line.as_bytes()));
                let _ = std::io::Write::flush(&mut std::io::stdout());
            }
            CR => {
                line.push('\n');
                print!("\r\n");
                let _ = std::io::Write::flush(&mut std::io::stdout());
            }
            LF => {}
            ESC => {
                line.push('\u{1b}');
                print!("$");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                if line.ends_with("\u{1b}\u{1b}") {
                    return Ok(Some(line));
                }
            }
            _ => {
                if let Some(c) = char::from_u32(b as u32) {
                    line.push(c);
                    print!("{}", printable::printable_char(b));
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_until_double_escape() {
        let input = Cursor::new(b"Ihello\x1b\x1b".to_vec());
        let line = read_command_line(input).unwrap().unwrap();
        assert_eq!(line, "Ihello\u{1b}\u{1b}");
    }

    #[test]
    fn rubout_removes_last_character() {
        let input = Cursor::new(format!("ab{}{}c\x1b\x1b", BS as char, "").into_bytes());
        let line = read_command_line(input).unwrap().unwrap();
        assert_eq!(line, "ac\u{1b}\u{1b}");
    }

    #[test]
    fn ctrl_u_kills_current_line() {
        let mut bytes = b"first\n".to_vec();
        bytes.extend_from_slice(b"second");
        bytes.push(CTRL_U);
        bytes.extend_from_slice(b"third\x1b\x1b");
        let line = read_command_line(Cursor::new(bytes)).unwrap().unwrap();
        assert_eq!(line, "first\nthird\u{1b}\u{1b}");
    }

    #[test]
    fn double_bell_abandons_line() {
        let mut bytes = b"abc".to_vec();
        bytes.push(BEL);
        bytes.push(BEL);
        bytes.extend_from_slice(b"xyz\x1b\x1b");
        let line = read_command_line(Cursor::new(bytes)).unwrap().unwrap();
        assert_eq!(line, "xyz\u{1b}\u{1b}");
    }

    #[test]
    fn eof_with_nothing_typed_returns_none() {
        let input = Cursor::new(Vec::new());
        assert!(read_command_line(input).unwrap().is_none());
    }

    #[test]
    fn resolve_ei_path_missing_bare_name_returns_none() {
        assert!(resolve_ei_path("definitely-not-a-real-teco-macro.tec").is_none());
    }

    #[test]
    fn resolve_ei_path_finds_file_with_directory_component() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.tec");
        std::fs::write(&path, "").unwrap();
        let found = resolve_ei_path(path.to_str().unwrap()).unwrap();
        assert_eq!(found, path);
    }
}
