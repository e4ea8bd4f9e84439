//! Register store: named `(number, text)` pairs with a push/pop stack.
//!
//! Grounded on the struct/impl shape of `ed`'s `EdBuffer`
//! (`src/buffer.rs`) — a plain owned struct with small accessor
//! methods — generalized from ed's fixed `[Option<usize>; 26]` mark
//! array to an open `HashMap<char, Register>` since TECO register
//! names range over all alphanumerics, both globally and per local
//! scope (spec §3 "Register", §4.6).

use std::collections::HashMap;

use crate::error::TecoError;

#[derive(Debug, Clone, Default)]
pub struct Register {
    pub num: i64,
    pub text: String,
}

/// A parsed register name: global (process-wide) or local (owned by
/// one command-level scope, selected by a `.` prefix).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegName {
    Global(char),
    Local(char),
}

impl RegName {
    /// Parses a register name starting at `chars[0]`. A leading `.`
    /// selects local scope and consumes one further character; any
    /// other alphanumeric character names a global register directly.
    /// Returns the name and the number of source characters consumed.
    pub fn parse(chars: &[char]) -> Result<(RegName, usize), TecoError> {
        match chars.first() {
            None => Err(TecoError::Nab("register name".into())),
            Some('.') => {
                let c = *chars
                    .get(1)
                    .ok_or_else(|| TecoError::Nab("register name".into()))?;
                if c.is_ascii_alphanumeric() {
                    Ok((RegName::Local(c.to_ascii_uppercase()), 2))
                } else {
                    Err(TecoError::Iqn(c.to_string()))
                }
            }
            Some(&c) if c.is_ascii_alphanumeric() => {
                Ok((RegName::Global(c.to_ascii_uppercase()), 1))
            }
            Some(&c) => Err(TecoError::Iqn(c.to_string())),
        }
    }

    fn key(self) -> char {
        match self {
            RegName::Global(c) | RegName::Local(c) => c,
        }
    }
}

/// A local-scope identifier, handed out by [`RegisterScopes::new_local_scope`].
/// Command levels store one of these to select which map of local
/// registers they see; `:M` allocates a fresh one, plain `M` reuses the
/// caller's.
pub type ScopeId = usize;

/// All register state for one interpreter process: the global
/// register map, every local scope's map, and the `[`/`]` push-down
/// stack of register snapshots.
pub struct RegisterScopes {
    global: HashMap<char, Register>,
    locals: Vec<HashMap<char, Register>>,
    stack: Vec<Register>,
    /// `*`: read-only, the last filename opened or written.
    pub last_filename: String,
    /// `_`: read-only, the last search string used.
    pub last_search: String,
}

impl RegisterScopes {
    pub fn new() -> Self {
        RegisterScopes {
            global: HashMap::new(),
            locals: vec![HashMap::new()],
            stack: Vec::new(),
            last_filename: String::new(),
            last_search: String::new(),
        }
    }

    /// The root scope every top-level command level starts in.
    pub fn root_scope(&self) -> ScopeId {
        0
    }

    pub fn new_local_scope(&mut self) -> ScopeId {
        self.locals.push(HashMap::new());
        self.locals.len() - 1
    }

    fn map(&self, name: RegName, scope: ScopeId) -> &HashMap<char, Register> {
        match name {
            RegName::Global(_) => &self.global,
            RegName::Local(_) => &self.locals[scope],
        }
    }

    fn map_mut(&mut self, name: RegName, scope: ScopeId) -> &mut HashMap<char, Register> {
        match name {
            RegName::Global(_) => &mut self.global,
            RegName::Local(_) => &mut self.locals[scope],
        }
    }

    pub fn get(&self, name: RegName, scope: ScopeId) -> Register {
        self.map(name, scope).get(&name.key()).cloned().unwrap_or_default()
    }

    pub fn get_num(&self, name: RegName, scope: ScopeId) -> i64 {
        self.get(name, scope).num
    }

    pub fn get_text(&self, name: RegName, scope: ScopeId) -> String {
        self.get(name, scope).text
    }

    pub fn set_num(&mut self, name: RegName, scope: ScopeId, num: i64) {
        let key = name.key();
        self.map_mut(name, scope).entry(key).or_default().num = num;
    }

    pub fn set_text(&mut self, name: RegName, scope: ScopeId, text: String) {
        let key = name.key();
        self.map_mut(name, scope).entry(key).or_default().text = text;
    }

    pub fn append_text(&mut self, name: RegName, scope: ScopeId, text: &str) {
        let key = name.key();
        self.map_mut(name, scope).entry(key).or_default().text.push_str(text);
    }

    /// `[q`: push a copy of `q`'s current value onto the stack.
    pub fn push(&mut self, name: RegName, scope: ScopeId) {
        self.stack.push(self.get(name, scope));
    }

    /// `]q`: pop the stack into `q`. Fails `PES` on an empty stack.
    pub fn pop(&mut self, name: RegName, scope: ScopeId) -> Result<(), TecoError> {
        let reg = self.stack.pop().ok_or(TecoError::Pes)?;
        let key = name.key();
        *self.map_mut(name, scope).entry(key).or_default() = reg;
        Ok(())
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// `^Z`: sum of every register's text length, across every scope.
    /// The original stubs this to a constant; this is a real count, per
    /// the Open Question resolution in DESIGN.md.
    pub fn total_text_len(&self) -> usize {
        let mut total: usize = self.global.values().map(|r| r.text.len()).sum();
        for local in &self.locals {
            total += local.values().map(|r| r.text.len()).sum::<usize>();
        }
        total
    }
}

impl Default for RegisterScopes {
    fn default() -> Self {
        Self::new()
    }
}
