//! The command dispatcher: reads one command at a time from a
//! [`CommandLevel`]'s character buffer, drives the expression evaluator
//! between arguments, and executes each command against the shared
//! [`Interp`] state (spec §2 item "Dispatcher", §4 throughout).
//!
//! Grounded on `examples/original_source/teco/teco.py`'s `teco.doTECO`
//! main loop and its per-command `do*` methods; the nested-level shape
//! (`M`, `EI`, top-level execution all running the same loop over a
//! fresh character buffer) mirrors `doTECO`'s recursive `execute` calls.

use std::io::Write;

use crate::buffer::TextBuffer;
use crate::control_flow::{self, CondStop};
use crate::display::{NullSink, Sink};
use crate::error::TecoError;
use crate::expr::{ArgDefault, ExprState};
use crate::global::{self, GlobalFlags};
use crate::io::FileState;
use crate::printable;
use crate::registers::{RegName, RegisterScopes, ScopeId};
use crate::search;
use crate::strbuild;

const ESC: char = '\u{1b}';

/// `ed` bit 1 (0x0002): `_`/`EY`/search-page-advance may overwrite the
/// Q-register the next page would otherwise protect.
const ED_ALLOW_YANK_OVERWRITE: i16 = 0x0002;

/// `ed` bit 4 (0x0010): a failed search does not reset dot to 0.
const ED_NO_RESET_ON_FAIL: i16 = 0x0010;

/// What a failed in-place search should try next (spec §4.3).
enum NextPageKind {
    None,
    Page,
    Yank,
    YankUnconditional,
}

/// The outcome of running a command level to exhaustion or to an early
/// exit point (spec §4.6 "Macro execution", §4.9 "Command loop exit").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Ran off the end of the character buffer normally.
    Normal,
    /// A doubled-ESC ended this level only; absorbed by [`run`].
    ExitLevel,
    /// `^C` inside a macro: unwind every enclosing level.
    ExitExecution,
    /// `EX`/interactive `^C`: terminate the whole process.
    Exit(i32),
}

/// One `<...>` iteration's loop-back point and remaining count.
/// `count == 0` means an infinite (countless) loop.
struct IterFrame {
    start: usize,
    count: i64,
}

/// A single macro/top-level invocation's private cursor and expression
/// state, over a shared [`Interp`] (spec §3 "Command level").
struct CommandLevel {
    chars: Vec<char>,
    pos: usize,
    iters: Vec<IterFrame>,
    expr: ExprState,
    scope: ScopeId,
    interactive: bool,
}

impl CommandLevel {
    fn new(chars: Vec<char>, scope: ScopeId, interactive: bool) -> Self {
        CommandLevel {
            chars,
            pos: 0,
            iters: Vec::new(),
            expr: ExprState::new(),
            scope,
            interactive,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Consumes and returns the next raw character, tracing it if `?`
    /// is active. Fails `UTC` at end of buffer.
    fn next_raw(&mut self, interp: &Interp) -> Result<char, TecoError> {
        let c = *self.chars.get(self.pos).ok_or(TecoError::Utc)?;
        self.pos += 1;
        self.trace_one(interp, c);
        Ok(c)
    }

    fn trace_one(&self, interp: &Interp, c: char) {
        if interp.flags.trace {
            print!("{}", printable::printable(c.to_string().as_bytes()));
            let _ = std::io::stdout().flush();
        }
    }

    fn trace_span(&self, interp: &Interp, start: usize, end: usize) {
        if interp.flags.trace && end > start {
            let s: String = self.chars[start..end].iter().collect();
            print!("{}", printable::printable(s.as_bytes()));
            let _ = std::io::stdout().flush();
        }
    }

    /// Reads one command character, expanding a `^x` two-character
    /// control-letter spelling into its control byte (spec §4.1).
    fn take_command_char(&mut self, interp: &Interp) -> Result<char, TecoError> {
        let c = self.next_raw(interp)?;
        if c == '^' {
            let c2 = self.next_raw(interp)?;
            let n = c2 as u32;
            if (0x40..=0x5F).contains(&n) || (0x61..=0x7A).contains(&n) {
                Ok(char::from_u32(n & 31).unwrap())
            } else {
                Err(TecoError::Iuc)
            }
        } else {
            Ok(c)
        }
    }

    fn arg_default(&mut self, default: i64) -> Result<i64, TecoError> {
        let v = self.expr.get_arg(ArgDefault::Value(default))?;
        self.expr.clear_args();
        Ok(v)
    }

    fn arg_required(&mut self, err: TecoError) -> Result<i64, TecoError> {
        let v = self.expr.get_arg(ArgDefault::Fail(err))?;
        self.expr.clear_args();
        Ok(v)
    }

    fn opt_arg(&mut self) -> Result<Option<i64>, TecoError> {
        self.expr.get_opt_arg()
    }

    /// Reads the `m,n` flag-setting argument shape shared by `^X`/`ED`
    /// etc.: `m` from a prior comma (left uncleared by `get_opt_arg`),
    /// `n` from the trailing value.
    fn flag_args(&mut self) -> Result<(Option<i32>, Option<i32>), TecoError> {
        let m = self.expr.take_arg2().map(|v| v as i32);
        let n = self.opt_arg()?.map(|v| v as i32);
        self.expr.clear_args();
        Ok((m, n))
    }

    fn string_delim(&mut self, interp: &Interp) -> Result<char, TecoError> {
        if self.expr.atmod {
            let c = self.next_raw(interp)?;
            self.expr.atmod = false;
            Ok(c)
        } else {
            Ok(ESC)
        }
    }

    fn read_string_arg(&mut self, interp: &Interp) -> Result<String, TecoError> {
        let delim = self.string_delim(interp)?;
        let start = self.pos;
        let (s, newpos) = strbuild::read_string_arg(&self.chars, self.pos, delim)?;
        self.trace_span(interp, start, newpos);
        self.pos = newpos;
        Ok(s)
    }

    fn read_two_string_args(&mut self, interp: &Interp) -> Result<(String, String), TecoError> {
        let delim = self.string_delim(interp)?;
        let start1 = self.pos;
        let (s1, p1) = strbuild::read_string_arg(&self.chars, self.pos, delim)?;
        self.trace_span(interp, start1, p1);
        self.pos = p1;
        let start2 = self.pos;
        let (s2, p2) = strbuild::read_string_arg(&self.chars, self.pos, delim)?;
        self.trace_span(interp, start2, p2);
        self.pos = p2;
        Ok((s1, s2))
    }

    /// `m,nT`-style line/character range, defaulting to `.,.+n` lines
    /// when only a plain count (or nothing) was typed (spec §4.7).
    fn line_range_default(&mut self, interp: &Interp) -> Result<(usize, usize), TecoError> {
        if let Some(m) = self.expr.take_arg2() {
            let n = self.arg_required(TecoError::Nab("range".into()))?;
            return Ok((m as usize, n as usize));
        }
        match self.opt_arg()? {
            Some(n) => {
                self.expr.clear_args();
                if n >= 0 {
                    Ok((interp.buffer.dot(), interp.buffer.line(n)))
                } else {
                    Ok((interp.buffer.line(n), interp.buffer.dot()))
                }
            }
            None => Ok((interp.buffer.line(0), interp.buffer.line(1))),
        }
    }
}

/// Process-wide interpreter state shared across every nested command
/// level (spec §3 "Interpreter state").
pub struct Interp {
    pub buffer: TextBuffer,
    pub regs: RegisterScopes,
    pub files: FileState,
    pub flags: GlobalFlags,
    pub sink: Box<dyn Sink>,
}

impl Interp {
    pub fn new() -> Self {
        Interp {
            buffer: TextBuffer::new(),
            regs: RegisterScopes::new(),
            files: FileState::new(),
            flags: GlobalFlags::new(),
            sink: Box::new(NullSink),
        }
    }
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `text` as a fresh top-level (or `EI`-substituted) command level.
pub fn execute(interp: &mut Interp, text: &str, interactive: bool) -> Result<Flow, TecoError> {
    let chars: Vec<char> = text.chars().collect();
    let scope = interp.regs.root_scope();
    let mut level = CommandLevel::new(chars, scope, interactive);
    run(&mut level, interp)
}

/// Prints a command error the way spec §4.9 "Error reporting" requires:
/// the mnemonic (plus message unless `eh`'s low two bits select terse
/// mode), followed by the offending command text when `eh` bit 2 asks
/// for it.
pub fn report_error(interp: &Interp, err: &TecoError, attempted: &[char], upto: usize) {
    let low2 = interp.flags.eh & 0x3;
    if low2 == 1 {
        println!("?{}", err.mnemonic());
    } else {
        println!("?{}   {}", err.mnemonic(), err.message());
    }
    if interp.flags.eh & 0x4 != 0 {
        let text: String = attempted[..upto.min(attempted.len())].iter().collect();
        println!("{}?", printable::printable(text.as_bytes()));
    }
}

fn run(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    match run_raw(level, interp) {
        Ok(Flow::ExitLevel) => Ok(Flow::Normal),
        other => other,
    }
}

fn run_raw(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    loop {
        if crate::signal::take_interrupt() {
            return Err(TecoError::Xab);
        }
        let Some(c0) = level.peek() else {
            return Ok(Flow::Normal);
        };
        match c0 {
            '@' => {
                level.next_raw(interp)?;
                level.expr.atmod = true;
            }
            ':' => {
                level.next_raw(interp)?;
                level.expr.colons = 1;
                if level.peek() == Some(':') {
                    level.next_raw(interp)?;
                    level.expr.colons = 2;
                }
            }
            '0'..='9' => {
                let c = level.next_raw(interp)?;
                level.expr.digit(c, interp.flags.radix)?;
            }
            '+' | '-' | '*' | '/' | '&' | '#' => {
                let c = level.next_raw(interp)?;
                level.expr.operator(c)?;
            }
            '(' => {
                level.next_raw(interp)?;
                level.expr.left_paren();
            }
            ')' => {
                level.next_raw(interp)?;
                level.expr.right_paren()?;
            }
            ',' => {
                level.next_raw(interp)?;
                level.expr.comma()?;
            }
            _ => {
                let c = level.take_command_char(interp)?;
                let flow = dispatch_one(c, level, interp)?;
                if flow != Flow::Normal {
                    return Ok(flow);
                }
            }
        }
    }
}

fn dispatch_one(c: char, level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let cu = if c.is_ascii_alphabetic() { c.to_ascii_uppercase() } else { c };
    match cu {
        '\0' | '\u{0A}' | '\u{0C}' | '\u{0D}' | ' ' | '\u{0B}' => Ok(Flow::Normal),

        '\u{01}' => do_caret_a(level, interp),
        '\u{02}' => {
            let tm = local_time();
            let v = tm.tm_year as i64 * 512 + (tm.tm_mon as i64 + 1) * 32 + tm.tm_mday as i64;
            level.expr.set_val(v);
            Ok(Flow::Normal)
        }
        '\u{03}' => {
            if level.interactive {
                Ok(Flow::Exit(0))
            } else {
                Ok(Flow::ExitExecution)
            }
        }
        '\u{04}' => {
            interp.flags.set_radix(10)?;
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        '\u{06}' => {
            level.expr.set_val(0);
            Ok(Flow::Normal)
        }
        '\u{08}' => {
            let tm = local_time();
            let v = tm.tm_hour as i64 * 3600 + tm.tm_min as i64 * 60 + tm.tm_sec as i64;
            level.expr.set_val(v);
            Ok(Flow::Normal)
        }
        '\u{09}' => {
            let raw = level.read_string_arg(interp)?;
            let built = strbuild::build(&raw, interp.flags.ed, &interp.regs, level.scope)?;
            interp.buffer.insert(&format!("\t{}", built));
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        '\u{0E}' => {
            level.expr.set_val(!interp.files.has_more_input() as i64);
            Ok(Flow::Normal)
        }
        '\u{0F}' => {
            interp.flags.set_radix(8)?;
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        '\u{11}' => {
            let n = level.arg_default(1)?;
            level.expr.set_val(interp.buffer.line(n) as i64);
            Ok(Flow::Normal)
        }
        '\u{12}' => {
            match level.opt_arg()? {
                None => {
                    level.expr.clear_mods();
                    level.expr.set_val(interp.flags.radix as i64);
                }
                Some(r) => {
                    level.expr.clear_args();
                    interp.flags.set_radix(r as i32)?;
                }
            }
            Ok(Flow::Normal)
        }
        '\u{13}' => {
            level.expr.set_val(interp.buffer.laststringlen);
            Ok(Flow::Normal)
        }
        '\u{14}' => do_caret_t(level, interp),
        '\u{15}' => do_caret_u(level, interp),
        '\u{16}' | '\u{17}' => Ok(Flow::Normal),
        '\u{18}' => {
            let (m, n) = level.flag_args()?;
            interp.flags.set_caret_x(m, n);
            level.expr.set_val(interp.flags.caret_x as i64);
            Ok(Flow::Normal)
        }
        '\u{19}' => {
            level.expr.clear_args();
            let dot = interp.buffer.dot() as i64;
            let m = dot + interp.buffer.laststringlen;
            level.expr.set_pair(m, dot);
            Ok(Flow::Normal)
        }
        '\u{1A}' => {
            level.expr.set_val(interp.regs.total_text_len() as i64);
            Ok(Flow::Normal)
        }
        ESC => {
            if level.peek() == Some(ESC) {
                Ok(Flow::ExitLevel)
            } else {
                level.expr.clear_args();
                Ok(Flow::Normal)
            }
        }
        '\u{1E}' => {
            let x = level.next_raw(interp)?;
            level.expr.set_val(x as i64);
            Ok(Flow::Normal)
        }

        '!' => {
            let delim = level.string_delim(interp)?;
            let start = level.pos;
            let (_, newpos) = strbuild::read_string_arg(&level.chars, level.pos, delim)?;
            level.trace_span(interp, start, newpos);
            level.pos = newpos;
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        '"' => {
            let n = level.arg_required(TecoError::Nab("\"".into()))?;
            let letter = level.next_raw(interp)?;
            if test_letter(letter, n)? {
                Ok(Flow::Normal)
            } else {
                let (end, _) = control_flow::skip_cond(&level.chars, level.pos)?;
                level.pos = end;
                Ok(Flow::Normal)
            }
        }
        '\'' => Ok(Flow::Normal),
        '?' => {
            interp.flags.trace = !interp.flags.trace;
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        '|' => {
            let (end, _) = control_flow::skip_cond(&level.chars, level.pos)?;
            level.pos = end;
            Ok(Flow::Normal)
        }
        '<' => {
            let n = level.opt_arg()?;
            level.expr.clear_args();
            match n {
                None => level.iters.push(IterFrame { start: level.pos, count: 0 }),
                Some(n) if n <= 0 => level.pos = control_flow::skip_iter(&level.chars, level.pos)?,
                Some(n) => level.iters.push(IterFrame { start: level.pos, count: n }),
            }
            Ok(Flow::Normal)
        }
        '>' => {
            let frame = level.iters.last_mut().ok_or(TecoError::Bni)?;
            if frame.count != 0 {
                frame.count -= 1;
                if frame.count == 0 {
                    level.iters.pop();
                } else {
                    let start = frame.start;
                    level.pos = start;
                    level.expr.clear_args();
                }
            } else {
                let start = frame.start;
                level.pos = start;
                level.expr.clear_args();
            }
            Ok(Flow::Normal)
        }
        ';' => {
            let colon = level.expr.colons >= 1;
            let n = level.arg_required(TecoError::Nas)?;
            if level.iters.is_empty() {
                return Err(TecoError::Sni);
            }
            let exit = (!colon && n >= 0) || (colon && n < 0);
            if exit {
                do_semicolon_exit(level)
            } else {
                Ok(Flow::Normal)
            }
        }

        '=' => {
            let colon = level.expr.colons >= 1;
            let n = level.arg_required(TecoError::Nae)?;
            let radix = if level.peek() == Some('=') {
                level.next_raw(interp)?;
                if level.peek() == Some('=') {
                    level.next_raw(interp)?;
                    16
                } else {
                    8
                }
            } else {
                10
            };
            let text = match radix {
                16 => format!("{:x}", n),
                8 => format!("{:o}", n),
                _ => format!("{}", n),
            };
            if colon {
                print!("{}", text);
            } else {
                println!("{}", text);
            }
            let _ = std::io::stdout().flush();
            Ok(Flow::Normal)
        }

        'S' => do_search(level, interp, false, NextPageKind::None),
        'N' => do_search(level, interp, false, NextPageKind::Page),
        '_' => do_search(level, interp, false, NextPageKind::Yank),

        'A' => {
            let ret = interp.files.append(&mut interp.buffer)?;
            level.expr.set_val(ret as i64);
            Ok(Flow::Normal)
        }
        'B' => {
            level.expr.set_val(0);
            Ok(Flow::Normal)
        }
        'Z' => {
            level.expr.set_val(interp.buffer.end() as i64);
            Ok(Flow::Normal)
        }
        '.' => {
            level.expr.set_val(interp.buffer.dot() as i64);
            Ok(Flow::Normal)
        }
        'C' => {
            let n = level.arg_default(1)?;
            interp.buffer.move_relative(n)?;
            Ok(Flow::Normal)
        }
        'R' => {
            let n = level.arg_default(1)?;
            interp.buffer.move_relative(-n)?;
            Ok(Flow::Normal)
        }
        'J' => {
            let n = level.arg_default(0)?;
            interp.buffer.jump(n)?;
            Ok(Flow::Normal)
        }
        'L' => {
            let n = level.arg_default(1)?;
            interp.buffer.move_lines(n)?;
            Ok(Flow::Normal)
        }
        'D' => {
            if let Some(m) = level.expr.take_arg2() {
                let n = level.arg_required(TecoError::Nab("D".into()))?;
                interp.buffer.delete_range(m as usize, n as usize)?;
            } else {
                let n = level.arg_default(1)?;
                interp.buffer.delete_count(n)?;
            }
            Ok(Flow::Normal)
        }
        'K' => {
            if let Some(m) = level.expr.take_arg2() {
                let n = level.arg_required(TecoError::Nab("K".into()))?;
                interp.buffer.delete_range(m as usize, n as usize)?;
            } else {
                let n = level.arg_default(1)?;
                let target = interp.buffer.line(n);
                let dot = interp.buffer.dot();
                let (s, e) = if target >= dot { (dot, target) } else { (target, dot) };
                interp.buffer.delete_range(s, e)?;
            }
            Ok(Flow::Normal)
        }
        'I' => {
            match level.opt_arg()? {
                Some(n) => {
                    level.expr.clear_args();
                    let ch = char::from_u32(n as u32).ok_or(TecoError::Iia)?;
                    interp.buffer.insert(&ch.to_string());
                }
                None => {
                    let raw = level.read_string_arg(interp)?;
                    let built = strbuild::build(&raw, interp.flags.ed, &interp.regs, level.scope)?;
                    interp.buffer.insert(&built);
                }
            }
            Ok(Flow::Normal)
        }
        'H' => {
            level.expr.set_pair(0, interp.buffer.end() as i64);
            Ok(Flow::Normal)
        }
        'O' => do_o(level, interp),
        'G' => do_g(level, interp),
        'X' => {
            let colon = level.expr.colons >= 1;
            let (m, n) = level.line_range_default(interp)?;
            let name = RegName::parse(&level.chars[level.pos..])
                .map(|(n, len)| {
                    level.pos += len;
                    n
                })?;
            let text = interp.buffer.range(m, n)?.to_string();
            if colon {
                interp.regs.append_text(name, level.scope, &text);
            } else {
                interp.regs.set_text(name, level.scope, text);
            }
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        'T' => {
            let (m, n) = level.line_range_default(interp)?;
            let text = interp.buffer.range(m, n)?.to_string();
            print!("{}", printable::printable(text.as_bytes()));
            let _ = std::io::stdout().flush();
            Ok(Flow::Normal)
        }
        'V' => {
            let m = level.expr.take_arg2();
            let n = level.arg_default(1)?;
            let mm = m.unwrap_or(n);
            let start = interp.buffer.line(1 - mm);
            let end = interp.buffer.line(n);
            let (start, end) = if end >= start { (start, end) } else { (end, start) };
            let text = interp.buffer.range(start, end)?.to_string();
            print!("{}", printable::printable(text.as_bytes()));
            let _ = std::io::stdout().flush();
            Ok(Flow::Normal)
        }
        'Y' => {
            if level.opt_arg()?.is_some() {
                return Err(TecoError::Nya);
            }
            level.expr.clear_args();
            let protect = (interp.flags.ed & ED_ALLOW_YANK_OVERWRITE) == 0;
            let ret = interp.files.yank(&mut interp.buffer, protect)?;
            level.expr.set_val(ret as i64);
            Ok(Flow::Normal)
        }
        '\\' => do_backslash(level, interp),
        '[' => {
            let (name, len) = RegName::parse(&level.chars[level.pos..])?;
            level.pos += len;
            interp.regs.push(name, level.scope);
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        ']' => {
            let colon = level.expr.colons >= 1;
            let (name, len) = RegName::parse(&level.chars[level.pos..])?;
            level.pos += len;
            if interp.regs.stack_depth() == 0 {
                if colon {
                    level.expr.clear_args();
                    level.expr.set_val(0);
                    Ok(Flow::Normal)
                } else {
                    Err(TecoError::Pes)
                }
            } else {
                interp.regs.pop(name, level.scope)?;
                if colon {
                    level.expr.clear_args();
                    level.expr.set_val(-1);
                } else {
                    level.expr.clear_args();
                }
                Ok(Flow::Normal)
            }
        }
        'U' => {
            let n = level.arg_required(TecoError::Nau)?;
            let (name, len) = RegName::parse(&level.chars[level.pos..])?;
            level.pos += len;
            interp.regs.set_num(name, level.scope, n);
            Ok(Flow::Normal)
        }
        'Q' => {
            let colon = level.expr.colons >= 1;
            let n_opt = level.opt_arg()?;
            let (name, len) = RegName::parse(&level.chars[level.pos..])?;
            level.pos += len;
            if colon {
                level.expr.clear_mods();
                let len = interp.regs.get_text(name, level.scope).chars().count();
                level.expr.set_val(len as i64);
            } else if let Some(n) = n_opt {
                level.expr.clear_args();
                let text = interp.regs.get_text(name, level.scope);
                let v = text.chars().nth(n as usize).map(|c| c as i64).unwrap_or(-1);
                level.expr.set_val(v);
            } else {
                level.expr.clear_mods();
                level.expr.set_val(interp.regs.get_num(name, level.scope));
            }
            Ok(Flow::Normal)
        }
        '%' => {
            let n = level.opt_arg()?.unwrap_or(1);
            let (name, len) = RegName::parse(&level.chars[level.pos..])?;
            level.pos += len;
            level.expr.clear_args();
            let v = interp.regs.get_num(name, level.scope) + n;
            interp.regs.set_num(name, level.scope, v);
            level.expr.set_val(v);
            Ok(Flow::Normal)
        }
        'M' => {
            let colon = level.expr.colons >= 1;
            let (name, len) = RegName::parse(&level.chars[level.pos..])?;
            level.pos += len;
            level.expr.clear_args();
            let text = interp.regs.get_text(name, level.scope);
            let child_scope = if colon { interp.regs.new_local_scope() } else { level.scope };
            tracing::debug!(colon, "entering macro");
            let chars: Vec<char> = text.chars().collect();
            let mut sub = CommandLevel::new(chars, child_scope, false);
            let flow = run(&mut sub, interp)?;
            tracing::debug!(?flow, "exiting macro");
            if flow != Flow::Normal {
                return Ok(flow);
            }
            Ok(Flow::Normal)
        }
        'P' => do_p(level, interp),
        'W' => do_w(level, interp),

        'E' => do_e_prefix(level, interp),
        'F' => do_f_prefix(level, interp),

        other => Err(TecoError::Ill(other.to_string())),
    }
}

fn do_semicolon_exit(level: &mut CommandLevel) -> Result<Flow, TecoError> {
    level.pos = control_flow::skip_iter(&level.chars, level.pos)?;
    level.iters.pop();
    Ok(Flow::Normal)
}

fn do_caret_a(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    const CTRL_A: char = '\u{01}';
    let start = level.pos;
    let (s, newpos) = strbuild::read_string_arg(&level.chars, level.pos, CTRL_A)?;
    level.trace_span(interp, start, newpos);
    level.pos = newpos;
    print!("{}", s);
    let _ = std::io::stdout().flush();
    level.expr.clear_args();
    Ok(Flow::Normal)
}

fn do_caret_t(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    match level.opt_arg()? {
        None => {
            level.expr.clear_args();
            let byte = if interp.flags.et & global::ET_NONBLOCK_READ != 0 {
                crate::signal::try_read_nonblocking().map_err(|_| TecoError::Inp)?
            } else {
                let mut buf = [0u8; 1];
                match std::io::Read::read(&mut std::io::stdin(), &mut buf) {
                    Ok(1) => Some(buf[0]),
                    _ => None,
                }
            };
            level.expr.set_val(byte.map(|b| b as i64).unwrap_or(-1));
            Ok(Flow::Normal)
        }
        Some(n) => {
            level.expr.clear_args();
            let ch = char::from_u32(n as u32).ok_or(TecoError::Ill("^T".into()))?;
            if colon {
                print!("{}", ch);
            } else {
                print!("{}", printable::printable_char(n as u8));
            }
            let _ = std::io::stdout().flush();
            Ok(Flow::Normal)
        }
    }
}

fn do_caret_u(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    let (name, len) = RegName::parse(&level.chars[level.pos..])?;
    level.pos += len;
    let raw = level.read_string_arg(interp)?;
    let built = strbuild::build(&raw, interp.flags.ed, &interp.regs, level.scope)?;
    if colon {
        interp.regs.append_text(name, level.scope, &built);
    } else {
        interp.regs.set_text(name, level.scope, built);
    }
    level.expr.clear_args();
    Ok(Flow::Normal)
}

fn do_backslash(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    match level.opt_arg()? {
        Some(n) => {
            level.expr.clear_args();
            let s = match interp.flags.radix {
                8 => format!("{:o}", n),
                16 => format!("{:x}", n),
                _ => format!("{}", n),
            };
            let saved = interp.buffer.laststringlen;
            interp.buffer.insert(&s);
            interp.buffer.laststringlen = saved;
            Ok(Flow::Normal)
        }
        None => {
            level.expr.clear_args();
            let text = interp.buffer.text();
            let dot = interp.buffer.dot();
            let bytes: Vec<char> = text.chars().collect();
            let mut i = dot;
            let neg = bytes.get(i) == Some(&'-');
            let plus = bytes.get(i) == Some(&'+');
            if neg || plus {
                i += 1;
            }
            let digit_start = i;
            let mut value: i64 = 0;
            while let Some(&c) = bytes.get(i) {
                match c.to_digit(interp.flags.radix) {
                    Some(d) => {
                        value = value * interp.flags.radix as i64 + d as i64;
                        i += 1;
                    }
                    None => break,
                }
            }
            if i == digit_start {
                level.expr.set_val(0);
            } else {
                if neg {
                    value = -value;
                }
                interp.buffer.set_dot(i)?;
                level.expr.set_val(value);
            }
            Ok(Flow::Normal)
        }
    }
}

fn do_o(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let raw = level.read_string_arg(interp)?;
    let built = strbuild::build(&raw, interp.flags.ed, &interp.regs, level.scope)?;
    let n = level.opt_arg()?;
    level.expr.clear_args();
    if built.is_empty() {
        return Err(TecoError::Ill("O".into()));
    }
    let target = match n {
        None => built,
        Some(idx) => {
            let parts: Vec<&str> = built.split(',').collect();
            let i = idx - 1;
            if i < 0 || i as usize >= parts.len() {
                return Ok(Flow::Normal);
            }
            parts[i as usize].to_string()
        }
    };
    let start = level.iters.last().map(|f| f.start).unwrap_or(0);
    level.pos = control_flow::find_tag(&level.chars, start, &target)?;
    Ok(Flow::Normal)
}

fn do_g(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    let text = match level.peek() {
        Some('*') => {
            level.next_raw(interp)?;
            interp.regs.last_filename.clone()
        }
        Some('_') => {
            level.next_raw(interp)?;
            interp.regs.last_search.clone()
        }
        _ => {
            let (name, len) = RegName::parse(&level.chars[level.pos..])?;
            level.pos += len;
            interp.regs.get_text(name, level.scope)
        }
    };
    level.expr.clear_args();
    if colon {
        print!("{}", printable::printable(text.as_bytes()));
        let _ = std::io::stdout().flush();
    } else {
        interp.buffer.insert(&text);
    }
    Ok(Flow::Normal)
}

fn do_p(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    let m = level.expr.take_arg2();
    let n = level.arg_default(1)?;
    let is_w = matches!(level.peek(), Some('w') | Some('W'));
    if is_w {
        level.next_raw(interp)?;
    }
    let mut last_ret = 0i32;
    if m.is_some() || is_w {
        if n <= 0 {
            return Err(TecoError::Ipa);
        }
        // No ranged-write primitive exists; a whole-page write stands
        // in for the explicit-range `(m,n)PW` form.
        let repeat = if m.is_some() { 1 } else { n };
        for _ in 0..repeat {
            last_ret = interp.files.page(&mut interp.buffer)?;
        }
    } else {
        if n <= 0 {
            return Err(TecoError::Ipa);
        }
        for _ in 0..n {
            last_ret = interp.files.page(&mut interp.buffer)?;
        }
    }
    if colon {
        level.expr.set_val(last_ret as i64);
    }
    Ok(Flow::Normal)
}

/// `:W`: insert-until-terminator, reading raw bytes straight from the
/// terminal rather than from the command string (spec §9 Open Question
/// "the behavior of `:W`"). Plain `W` has no documented meaning here
/// and reports `ILL`.
///
/// `et`'s bits 1/2/5/6 (values 2/4/32/64) select, respectively: `TAB`
/// also terminates the read; each character is uppercased before
/// insertion; the (nonexistent) display's refresh is skipped after
/// each character — a no-op here; other control characters besides
/// `TAB`/`ESC` are inserted verbatim instead of discarded. `ESC` always
/// terminates.
fn do_w(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    if !colon {
        return Err(TecoError::Ill("W".into()));
    }
    level.expr.clear_args();
    let et = interp.flags.et;
    let uppercase = et & 0x0004 != 0;
    let tab_terminates = et & 0x0002 != 0;
    let allow_any = et & 0x0040 != 0;
    let mut buf = [0u8; 1];
    loop {
        match std::io::Read::read(&mut std::io::stdin(), &mut buf) {
            Ok(1) => {}
            _ => break,
        }
        let b = buf[0];
        if b == ESC as u8 || (tab_terminates && b == b'\t') {
            break;
        }
        if !allow_any && b < 0x20 && b != b'\t' {
            continue;
        }
        let mut ch = b as char;
        if uppercase {
            ch = ch.to_ascii_uppercase();
        }
        interp.buffer.insert(&ch.to_string());
    }
    Ok(Flow::Normal)
}

fn file_er(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    let raw = level.read_string_arg(interp)?;
    let fname = strbuild::build(&raw, interp.flags.ed, &interp.regs, level.scope)?;
    level.expr.clear_args();
    let ret = interp.files.er(&fname, colon, &mut interp.regs.last_filename)?;
    if colon {
        level.expr.set_val(ret as i64);
    }
    Ok(Flow::Normal)
}

fn file_ew(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    let raw = level.read_string_arg(interp)?;
    let fname = strbuild::build(&raw, interp.flags.ed, &interp.regs, level.scope)?;
    level.expr.clear_args();
    let ret = interp.files.ew(&fname, colon, &mut interp.regs.last_filename)?;
    if colon {
        level.expr.set_val(ret as i64);
    }
    Ok(Flow::Normal)
}

fn file_eb(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    let raw = level.read_string_arg(interp)?;
    let fname = strbuild::build(&raw, interp.flags.ed, &interp.regs, level.scope)?;
    level.expr.clear_args();
    let ret = interp.files.eb(&fname, colon, &mut interp.regs.last_filename)?;
    if colon {
        level.expr.set_val(ret as i64);
    }
    Ok(Flow::Normal)
}

fn file_en(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    let raw = level.read_string_arg(interp)?;
    let fname = strbuild::build(&raw, interp.flags.ed, &interp.regs, level.scope)?;
    level.expr.clear_args();
    let ret = interp.files.en(&fname, colon, &mut interp.regs.last_filename)?;
    if let Some(v) = ret {
        level.expr.set_val(v as i64);
    }
    Ok(Flow::Normal)
}

fn file_ei(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let colon = level.expr.colons >= 1;
    let raw = level.read_string_arg(interp)?;
    let fname = strbuild::build(&raw, interp.flags.ed, &interp.regs, level.scope)?;
    level.expr.clear_args();
    match crate::input::resolve_ei_path(&fname) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).map_err(|_| TecoError::Fnf(fname.clone()))?;
            let chars: Vec<char> = text.chars().collect();
            let mut sub = CommandLevel::new(chars, level.scope, false);
            let flow = run(&mut sub, interp)?;
            if colon {
                level.expr.set_val(-1);
            }
            if flow != Flow::Normal {
                return Ok(flow);
            }
            Ok(Flow::Normal)
        }
        None => {
            if colon {
                level.expr.set_val(0);
                Ok(Flow::Normal)
            } else {
                Err(TecoError::Fnf(fname))
            }
        }
    }
}

fn do_e_prefix(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let c2 = level.next_raw(interp)?.to_ascii_uppercase();
    match c2 {
        'B' => file_eb(level, interp),
        'W' => file_ew(level, interp),
        'R' => file_er(level, interp),
        'A' => {
            interp.files.ea();
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        'P' => {
            interp.files.ep();
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        'C' => {
            interp.files.ec(&mut interp.buffer)?;
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        'F' => {
            interp.files.ef()?;
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        'K' => {
            interp.files.ek();
            level.expr.clear_args();
            Ok(Flow::Normal)
        }
        'N' => file_en(level, interp),
        'X' => {
            interp.files.ec(&mut interp.buffer)?;
            Ok(Flow::Exit(0))
        }
        'I' => file_ei(level, interp),
        'G' => {
            let _ = level.read_string_arg(interp)?;
            let colon = level.expr.colons >= 1;
            level.expr.clear_args();
            if colon {
                level.expr.set_val(0);
            }
            Ok(Flow::Normal)
        }
        'J' => {
            let n = level.opt_arg()?;
            level.expr.clear_args();
            let v = global::ej(n.map(|v| v as i32))?;
            level.expr.set_val(v as i64);
            Ok(Flow::Normal)
        }
        'O' => {
            level.expr.clear_args();
            level.expr.set_val(global::EO_VERSION as i64);
            Ok(Flow::Normal)
        }
        'D' => {
            let (m, n) = level.flag_args()?;
            interp.flags.set_ed(m, n);
            level.expr.set_val(interp.flags.ed as i64);
            Ok(Flow::Normal)
        }
        'H' => {
            let (m, n) = level.flag_args()?;
            interp.flags.set_eh(m, n);
            level.expr.set_val(interp.flags.eh as i64);
            Ok(Flow::Normal)
        }
        'S' => {
            let (m, n) = level.flag_args()?;
            interp.flags.set_es(m, n);
            level.expr.set_val(interp.flags.es as i64);
            Ok(Flow::Normal)
        }
        'T' => {
            let (m, n) = level.flag_args()?;
            interp.flags.set_et(m, n);
            level.expr.set_val(interp.flags.et as i64);
            Ok(Flow::Normal)
        }
        'U' => {
            let (m, n) = level.flag_args()?;
            interp.flags.set_eu(m, n);
            level.expr.set_val(interp.flags.eu as i64);
            Ok(Flow::Normal)
        }
        'V' => {
            let (m, n) = level.flag_args()?;
            interp.flags.set_ev(m, n);
            level.expr.set_val(interp.flags.ev as i64);
            Ok(Flow::Normal)
        }
        'Y' => {
            level.expr.clear_args();
            let ret = interp.files.yank(&mut interp.buffer, false)?;
            level.expr.set_val(ret as i64);
            Ok(Flow::Normal)
        }
        '_' => do_search(level, interp, true, NextPageKind::YankUnconditional),
        _ => Err(TecoError::Iec),
    }
}

fn do_f_prefix(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let c2 = level.next_raw(interp)?.to_ascii_uppercase();
    match c2 {
        'S' => do_search(level, interp, true, NextPageKind::None),
        'N' => do_search(level, interp, true, NextPageKind::Page),
        '_' => do_search(level, interp, true, NextPageKind::Yank),
        'B' => do_bounded_search(level, interp),
        'C' => do_bounded_replace(level, interp),
        'R' => do_replace_last(level, interp),
        '|' => {
            level.expr.clear_args();
            let (end, _) = control_flow::skip_cond(&level.chars, level.pos)?;
            level.pos = end;
            Ok(Flow::Normal)
        }
        '\'' => {
            level.expr.clear_args();
            level.pos = skip_to_cond_end(&level.chars, level.pos)?;
            Ok(Flow::Normal)
        }
        '<' => {
            if let Some(frame) = level.iters.last() {
                level.pos = frame.start;
                level.expr.clear_args();
                Ok(Flow::Normal)
            } else {
                Err(TecoError::Bni)
            }
        }
        '>' => {
            if level.iters.is_empty() {
                return Ok(Flow::ExitLevel);
            }
            let frame = level.iters.last_mut().unwrap();
            if frame.count != 0 {
                frame.count -= 1;
                if frame.count == 0 {
                    level.pos = control_flow::skip_iter(&level.chars, level.pos)?;
                    level.iters.pop();
                } else {
                    let start = frame.start;
                    level.pos = start;
                    level.expr.clear_args();
                }
            } else {
                let start = frame.start;
                level.pos = start;
                level.expr.clear_args();
            }
            Ok(Flow::Normal)
        }
        _ => Err(TecoError::Ifc),
    }
}

fn skip_to_cond_end(chars: &[char], start: usize) -> Result<usize, TecoError> {
    let mut pos = start;
    loop {
        let (end, stop) = control_flow::skip_cond(chars, pos)?;
        if stop == CondStop::End {
            return Ok(end);
        }
        pos = end;
    }
}

fn do_search(
    level: &mut CommandLevel,
    interp: &mut Interp,
    with_replace: bool,
    nextpage: NextPageKind,
) -> Result<Flow, TecoError> {
    let colons = level.expr.colons;
    let colon = colons >= 1;
    let (pattern_raw, replace) = if with_replace {
        let (p, r) = level.read_two_string_args(interp)?;
        (p, Some(r))
    } else {
        (level.read_string_arg(interp)?, None)
    };
    let mut topiffail = colons < 2;
    let mut m = level.expr.take_arg2();
    let n = level.arg_default(1)?;
    if n == 0 {
        return Err(TecoError::Isa);
    }
    if m == Some(0) {
        m = None;
        topiffail = false;
    }
    let built = if pattern_raw.is_empty() {
        interp.regs.last_search.clone()
    } else {
        let b = strbuild::build(&pattern_raw, interp.flags.ed, &interp.regs, level.scope)?;
        interp.regs.last_search = b.clone();
        b
    };
    loop {
        let dot = interp.buffer.dot();
        let end_buf = interp.buffer.end();
        let (start, end) = if n < 0 {
            let e = dot;
            let s = m.map(|m| e.saturating_sub(m.unsigned_abs() as usize)).unwrap_or(0);
            (s, e)
        } else {
            let s = dot;
            let e = m.map(|m| (s + m.unsigned_abs() as usize).min(end_buf)).unwrap_or(end_buf);
            (s, e)
        };
        let (start, end) = if colons > 1 { (dot, dot) } else { (start, end) };
        let re = search::compile_pattern(&built, interp.flags.caret_x, &interp.regs, level.scope)?;
        let count = n.unsigned_abs() as u32;
        let found = if n < 0 {
            search::search_reverse_repeated(&re, interp.buffer.text(), count, end)
        } else {
            search::search_forward_repeated(&re, interp.buffer.text(), count, start, end)
        };
        match found {
            Some((s, e)) => {
                interp.buffer.set_dot(e)?;
                interp.buffer.laststringlen = -((e - s) as i64);
                if let Some(rep) = &replace {
                    let rep_built = strbuild::build(rep, interp.flags.ed, &interp.regs, level.scope)?;
                    interp.buffer.delete_range(s, e)?;
                    interp.buffer.insert(&rep_built);
                }
                let next_is_semi = level.chars.get(level.pos) == Some(&';');
                if colon || (!level.iters.is_empty() && next_is_semi) {
                    level.expr.set_val(-1);
                } else {
                    level.expr.clear_mods();
                }
                return Ok(Flow::Normal);
            }
            None => {
                let can_continue =
                    n >= 0 && !matches!(nextpage, NextPageKind::None) && interp.files.has_more_input();
                if can_continue {
                    match nextpage {
                        NextPageKind::Page => {
                            interp.files.page(&mut interp.buffer)?;
                        }
                        NextPageKind::Yank => {
                            let protect = (interp.flags.ed & ED_ALLOW_YANK_OVERWRITE) == 0;
                            interp.files.yank(&mut interp.buffer, protect)?;
                        }
                        NextPageKind::YankUnconditional => {
                            interp.files.yank(&mut interp.buffer, false)?;
                        }
                        NextPageKind::None => unreachable!(),
                    }
                    continue;
                }
                if topiffail && (interp.flags.ed & ED_NO_RESET_ON_FAIL) == 0 {
                    interp.buffer.set_dot(0)?;
                }
                if colon {
                    level.expr.set_val(0);
                    return Ok(Flow::Normal);
                }
                if !level.iters.is_empty() {
                    level.expr.set_val(0);
                    let next_is_semi = level.chars.get(level.pos) == Some(&';');
                    if !next_is_semi {
                        println!("%Search fail in iter");
                        return do_semicolon_exit(level);
                    }
                    return Ok(Flow::Normal);
                }
                return Err(TecoError::Srh(built));
            }
        }
    }
}

fn do_bounded_search(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let pattern_raw = level.read_string_arg(interp)?;
    let colon = level.expr.colons >= 1;
    let m_arg = level.expr.take_arg2();
    let n_arg = level.opt_arg()?;
    level.expr.clear_args();
    let dot = interp.buffer.dot() as i64;
    let (mut m, mut n) = match m_arg {
        Some(m) => (m, n_arg.ok_or_else(|| TecoError::Nab("FB".into()))?),
        None => (dot, interp.buffer.line(n_arg.unwrap_or(1)) as i64),
    };
    let mut count = 1i64;
    if m > n {
        std::mem::swap(&mut m, &mut n);
        count = -1;
    }
    let built = if pattern_raw.is_empty() {
        interp.regs.last_search.clone()
    } else {
        let b = strbuild::build(&pattern_raw, interp.flags.ed, &interp.regs, level.scope)?;
        interp.regs.last_search = b.clone();
        b
    };
    let re = search::compile_pattern(&built, interp.flags.caret_x, &interp.regs, level.scope)?;
    let found = if count < 0 {
        search::search_reverse_repeated(&re, interp.buffer.text(), 1, n as usize)
    } else {
        search::search_forward_repeated(&re, interp.buffer.text(), 1, m as usize, n as usize)
    };
    match found {
        Some((s, e)) => {
            interp.buffer.set_dot(e)?;
            interp.buffer.laststringlen = -((e - s) as i64);
            if colon {
                level.expr.set_val(-1);
            } else {
                level.expr.clear_mods();
            }
            Ok(Flow::Normal)
        }
        None => {
            if colon {
                level.expr.set_val(0);
                Ok(Flow::Normal)
            } else {
                Err(TecoError::Srh(built))
            }
        }
    }
}

/// `FC`: bounded replace. The original clears arguments before
/// computing the search window, so any typed `m,n` is discarded and
/// the window always defaults to the current line — preserved here
/// rather than "fixed", since it is the original's actual behavior.
fn do_bounded_replace(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let (pattern_raw, replace_raw) = level.read_two_string_args(interp)?;
    let colon = level.expr.colons >= 1;
    level.expr.clear_args();
    let dot = interp.buffer.dot() as i64;
    let n = interp.buffer.line(1) as i64;
    let (m, n) = if dot <= n { (dot, n) } else { (n, dot) };
    let built = if pattern_raw.is_empty() {
        interp.regs.last_search.clone()
    } else {
        let b = strbuild::build(&pattern_raw, interp.flags.ed, &interp.regs, level.scope)?;
        interp.regs.last_search = b.clone();
        b
    };
    let re = search::compile_pattern(&built, interp.flags.caret_x, &interp.regs, level.scope)?;
    let found = search::search_forward_repeated(&re, interp.buffer.text(), 1, m as usize, n as usize);
    match found {
        Some((s, e)) => {
            interp.buffer.set_dot(e)?;
            interp.buffer.laststringlen = -((e - s) as i64);
            let rep_built = strbuild::build(&replace_raw, interp.flags.ed, &interp.regs, level.scope)?;
            interp.buffer.delete_range(s, e)?;
            interp.buffer.insert(&rep_built);
            if colon {
                level.expr.set_val(-1);
            }
            Ok(Flow::Normal)
        }
        None => {
            if colon {
                level.expr.set_val(0);
                Ok(Flow::Normal)
            } else {
                Err(TecoError::Srh(built))
            }
        }
    }
}

fn do_replace_last(level: &mut CommandLevel, interp: &mut Interp) -> Result<Flow, TecoError> {
    let rep_raw = level.read_string_arg(interp)?;
    level.expr.clear_args();
    let rep_built = strbuild::build(&rep_raw, interp.flags.ed, &interp.regs, level.scope)?;
    let len = (-interp.buffer.laststringlen).max(0) as usize;
    let dot = interp.buffer.dot();
    let start = dot.saturating_sub(len);
    interp.buffer.delete_range(start, dot)?;
    interp.buffer.insert(&rep_built);
    Ok(Flow::Normal)
}

fn test_letter(letter: char, n: i64) -> Result<bool, TecoError> {
    match letter.to_ascii_uppercase() {
        'A' => Ok(char::from_u32(n as u32).map(|c| c.is_alphabetic()).unwrap_or(false)),
        'C' => Ok(char::from_u32(n as u32)
            .map(|c| c.is_alphanumeric() || "$._".contains(c))
            .unwrap_or(false)),
        'D' => Ok(char::from_u32(n as u32).map(|c| c.is_ascii_digit()).unwrap_or(false)),
        'E' | 'F' | 'U' | '=' => Ok(n == 0),
        'G' | '>' => Ok(n > 0),
        'L' | 'S' | 'T' | '<' => Ok(n < 0),
        'N' => Ok(n != 0),
        'R' => Ok(char::from_u32(n as u32).map(|c| c.is_alphanumeric()).unwrap_or(false)),
        'V' => Ok(char::from_u32(n as u32).map(|c| c.is_lowercase()).unwrap_or(false)),
        'W' => Ok(char::from_u32(n as u32).map(|c| c.is_uppercase()).unwrap_or(false)),
        _ => Err(TecoError::Iqc),
    }
}

fn local_time() -> libc::tm {
    unsafe {
        let t: libc::time_t = libc::time(std::ptr::null_mut());
        let mut tmv: libc::tm = std::mem::zeroed();
        libc::localtime_r(&t, &mut tmv);
        tmv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ESC: char = '\u{1b}';

    fn exec(interp: &mut Interp, s: &str) -> Result<Flow, TecoError> {
        execute(interp, s, false)
    }

    #[test]
    fn insert_and_move() {
        let mut interp = Interp::new();
        exec(&mut interp, &format!("Ihello{ESC}{ESC}")).unwrap();
        assert_eq!(interp.buffer.text(), "hello");
        assert_eq!(interp.buffer.dot(), 5);
    }

    #[test]
    fn arithmetic_commits_into_u_register() {
        let mut interp = Interp::new();
        exec(&mut interp, &format!("3+4Ua{ESC}{ESC}")).unwrap();
        assert_eq!(interp.regs.get_num(RegName::Global('A'), 0), 7);
    }

    #[test]
    fn q_register_text_length_with_colon() {
        let mut interp = Interp::new();
        exec(&mut interp, &format!("^Uahello{ESC}:QaUb{ESC}{ESC}")).unwrap();
        assert_eq!(interp.regs.get_num(RegName::Global('B'), 0), 5);
    }

    #[test]
    fn iteration_runs_fixed_count() {
        let mut interp = Interp::new();
        exec(&mut interp, &format!("3<IX{ESC}>{ESC}{ESC}")).unwrap();
        assert_eq!(interp.buffer.text(), "XXX");
    }

    #[test]
    fn conditional_true_branch() {
        let mut interp = Interp::new();
        exec(&mut interp, &format!("1\"E Ia{ESC} | Ib{ESC} '{ESC}{ESC}")).unwrap();
        assert_eq!(interp.buffer.text(), "b");
    }

    #[test]
    fn conditional_false_branch_skips_to_end() {
        let mut interp = Interp::new();
        exec(&mut interp, &format!("0\"E Ia{ESC} | Ib{ESC} '{ESC}{ESC}")).unwrap();
        assert_eq!(interp.buffer.text(), "a");
    }

    #[test]
    fn double_escape_ends_top_level_cleanly() {
        let mut interp = Interp::new();
        let flow = exec(&mut interp, &format!("Ix{ESC}{ESC}")).unwrap();
        assert_eq!(flow, Flow::Normal);
    }

    #[test]
    fn search_moves_dot_to_match_end() {
        let mut interp = Interp::new();
        exec(&mut interp, &format!("Ihello world{ESC}0J Sworld{ESC}{ESC}")).unwrap();
        assert_eq!(interp.buffer.dot(), 11);
    }

    #[test]
    fn colon_search_returns_zero_on_failure_without_error() {
        let mut interp = Interp::new();
        exec(&mut interp, &format!("Ihello{ESC}0J:Sxyz{ESC}Ua{ESC}{ESC}")).unwrap();
        assert_eq!(interp.regs.get_num(RegName::Global('A'), 0), 0);
    }

    #[test]
    fn m_macro_reuses_callers_scope() {
        let mut interp = Interp::new();
        exec(&mut interp, &format!("^Um1U.X{ESC}{ESC}")).unwrap();
        exec(&mut interp, &format!("Mm{ESC}{ESC}")).unwrap();
        assert_eq!(interp.regs.get_num(RegName::Local('X'), interp.regs.root_scope()), 1);
    }

    #[test]
    fn test_letter_digit_and_negative() {
        assert!(test_letter('D', '5' as i64).unwrap());
        assert!(!test_letter('D', 'x' as i64).unwrap());
        assert!(test_letter('L', -1).unwrap());
        assert!(!test_letter('G', -1).unwrap());
    }

    #[test]
    fn unknown_command_is_illegal() {
        let mut interp = Interp::new();
        assert!(matches!(
            exec(&mut interp, &format!("~{ESC}{ESC}")),
            Err(TecoError::Ill(_))
        ));
    }

    #[test]
    fn caret_c_in_macro_unwinds_execution() {
        // `^C` inside a non-interactive macro body yields `ExitExecution`,
        // which `M` and the top-level loop both propagate rather than
        // swallow (only `ExitLevel` gets normalized back to `Normal`).
        let mut interp = Interp::new();
        exec(&mut interp, &format!("^Uq\u{03}{ESC}{ESC}")).unwrap();
        let flow = exec(&mut interp, &format!("Mq{ESC}{ESC}")).unwrap();
        assert_eq!(flow, Flow::ExitExecution);
    }
}
