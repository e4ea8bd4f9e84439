//! Integer expression evaluator: precedence-free left-to-right
//! evaluation with parentheses and commit-on-use semantics, driven
//! character-by-character by the command dispatcher (spec §4.1).
//!
//! GNU ed has no expression language, so this has no ed-side analogue;
//! grounded on the TECO reference implementation's `teco` class
//! methods `doop`/`getterm`/`leftparen`/`rightparen`/`operator`/
//! `digit`/`getarg`/`getoptarg`/`clearmods`/`clearargs`.

use crate::error::TecoError;

/// What to do when [`ExprState::get_arg`] finds no committed value.
pub enum ArgDefault {
    Fail(TecoError),
    Value(i64),
}

/// One command level's expression-evaluation state. Cleared at the
/// start/end of each command (spec §3 "Expression state").
#[derive(Debug, Clone, Default)]
pub struct ExprState {
    arg: Option<i64>,
    arg2: Option<i64>,
    num: Option<i64>,
    op: Option<char>,
    opstack: Vec<(Option<i64>, Option<char>)>,
    pub colons: u8,
    pub atmod: bool,
}

fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

fn apply_op(op: char, lhs: i64, rhs: i64) -> Result<i64, TecoError> {
    match op {
        '+' => Ok(lhs + rhs),
        '-' => Ok(lhs - rhs),
        '*' => Ok(lhs * rhs),
        '/' => {
            if rhs == 0 {
                Err(TecoError::Ill("/".into()))
            } else {
                Ok(floor_div(lhs, rhs))
            }
        }
        '&' => Ok(lhs & rhs),
        '#' => Ok(lhs | rhs),
        _ => Err(TecoError::Ill(op.to_string())),
    }
}

impl ExprState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A pending digit or number is present, or a full expression has
    /// already been committed into `arg` — i.e. this command level has
    /// *some* argument material typed so far.
    pub fn has_pending(&self) -> bool {
        self.arg.is_some() || self.num.is_some() || self.op.is_some()
    }

    /// Feeds one digit at the given radix. Fails `ILN` if the digit is
    /// not valid in that radix (e.g. `8`/`9` when `radix == 8`).
    pub fn digit(&mut self, c: char, radix: u32) -> Result<(), TecoError> {
        let d = c.to_digit(16).ok_or(TecoError::Iln)?;
        if d >= radix {
            return Err(TecoError::Iln);
        }
        self.num = Some(self.num.unwrap_or(0) * radix as i64 + d as i64);
        Ok(())
    }

    /// Commits any pending operator/operand pair into `arg` without
    /// starting a new one. Used both by [`Self::operator`] and by
    /// argument retrieval.
    fn commit(&mut self) -> Result<(), TecoError> {
        match self.op {
            None => {
                if self.num.is_some() {
                    self.arg = self.num;
                }
            }
            Some(op) => {
                let lhs = self.arg.unwrap_or(0);
                let rhs = self.num.unwrap_or(0);
                self.arg = Some(apply_op(op, lhs, rhs)?);
            }
        }
        self.num = None;
        Ok(())
    }

    /// Handles an operator character: commits the pending term, then
    /// remembers `c` as the new pending operator.
    pub fn operator(&mut self, c: char) -> Result<(), TecoError> {
        self.commit()?;
        self.op = Some(c);
        Ok(())
    }

    /// `(`: pushes the outer `(arg, op)` pair and starts a fresh term.
    pub fn left_paren(&mut self) {
        self.opstack.push((self.arg.take(), self.op.take()));
        self.num = None;
    }

    /// `)`: requires a complete term (`NAP` otherwise), pops the outer
    /// state, and feeds the parenthesized value in as the outer term's
    /// right-hand side.
    pub fn right_paren(&mut self) -> Result<(), TecoError> {
        self.commit()?;
        let value = self.arg.take().ok_or(TecoError::Nap)?;
        let (outer_arg, outer_op) = self.opstack.pop().ok_or(TecoError::Mlp)?;
        self.arg = outer_arg;
        self.op = outer_op;
        self.num = Some(value);
        Ok(())
    }

    /// `,`: stores the committed value into `arg2`. Requires it be
    /// non-negative (`NCA`) and that `arg2` is not already set (`ARG`).
    pub fn comma(&mut self) -> Result<(), TecoError> {
        self.commit()?;
        let v = self.arg.take().ok_or(TecoError::Nac)?;
        if v < 0 {
            return Err(TecoError::Nca);
        }
        if self.arg2.is_some() {
            return Err(TecoError::Arg);
        }
        self.arg2 = Some(v);
        Ok(())
    }

    /// Retrieves the committed value, applying `default` if none was
    /// typed. Fails `MRP` if a `(` was never closed.
    pub fn get_arg(&mut self, default: ArgDefault) -> Result<i64, TecoError> {
        if !self.opstack.is_empty() {
            return Err(TecoError::Mrp);
        }
        self.commit()?;
        match self.arg.take() {
            Some(v) => Ok(v),
            None => match default {
                ArgDefault::Fail(e) => Err(e),
                ArgDefault::Value(v) => Ok(v),
            },
        }
    }

    /// Retrieves the committed value if present, `None` otherwise,
    /// without applying a default.
    pub fn get_opt_arg(&mut self) -> Result<Option<i64>, TecoError> {
        if !self.opstack.is_empty() {
            return Err(TecoError::Mrp);
        }
        self.commit()?;
        Ok(self.arg.take())
    }

    /// Takes the comma-stored first value of an `m,n` pair, if any.
    pub fn take_arg2(&mut self) -> Option<i64> {
        self.arg2.take()
    }

    /// Feeds a command's return value in as the pending term, so a
    /// following operator can combine it (e.g. `.+5`). Also clears the
    /// colon/at-sign modifiers, matching every command that produces a
    /// value.
    pub fn set_val(&mut self, v: i64) {
        self.num = Some(v);
        self.clear_mods();
    }

    /// Pre-loads a committed `m,n` pair directly, bypassing `comma`'s
    /// validation — used by commands that synthesize a range rather than
    /// reading one from typed digits (`H`'s `0,Z`, `^Y`'s `.,.+^S`).
    pub fn set_pair(&mut self, m: i64, n: i64) {
        self.arg2 = Some(m);
        self.num = Some(n);
        self.clear_mods();
    }

    pub fn clear_mods(&mut self) {
        self.colons = 0;
        self.atmod = false;
    }

    pub fn clear_args(&mut self) {
        self.arg = None;
        self.arg2 = None;
        self.num = None;
        self.op = None;
        self.opstack.clear();
    }

    pub fn is_fully_clear(&self) -> bool {
        self.arg.is_none()
            && self.arg2.is_none()
            && self.num.is_none()
            && self.op.is_none()
            && self.opstack.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn simple_addition() {
        let mut e = ExprState::new();
        e.digit('3', 10).unwrap();
        e.operator('+').unwrap();
        e.digit('4', 10).unwrap();
        assert_eq!(e.get_arg(ArgDefault::Value(0)).unwrap(), 7);
    }

    #[test]
    fn unary_minus_as_first_token() {
        let mut e = ExprState::new();
        e.operator('-').unwrap();
        e.digit('5', 10).unwrap();
        assert_eq!(e.get_arg(ArgDefault::Value(0)).unwrap(), -5);
    }

    #[test]
    fn parens_nest() {
        let mut e = ExprState::new();
        // 2*(3+4) = 14
        e.digit('2', 10).unwrap();
        e.operator('*').unwrap();
        e.left_paren();
        e.digit('3', 10).unwrap();
        e.operator('+').unwrap();
        e.digit('4', 10).unwrap();
        e.right_paren().unwrap();
        assert_eq!(e.get_arg(ArgDefault::Value(0)).unwrap(), 14);
    }

    #[test]
    fn division_is_floor() {
        let mut e = ExprState::new();
        e.operator('-').unwrap();
        e.digit('7', 10).unwrap();
        e.operator('/').unwrap();
        e.digit('2', 10).unwrap();
        // -7 / 2 floors to -4
        assert_eq!(e.get_arg(ArgDefault::Value(0)).unwrap(), -4);
    }

    #[test]
    fn division_by_zero_fails() {
        let mut e = ExprState::new();
        e.digit('1', 10).unwrap();
        e.operator('/').unwrap();
        e.digit('0', 10).unwrap();
        assert!(e.get_arg(ArgDefault::Value(0)).is_err());
    }

    #[test]
    fn unmatched_close_paren_is_mlp() {
        let mut e = ExprState::new();
        e.digit('1', 10).unwrap();
        assert!(matches!(e.right_paren(), Err(TecoError::Mlp)));
    }

    #[test]
    fn unmatched_open_paren_is_mrp() {
        let mut e = ExprState::new();
        e.left_paren();
        e.digit('1', 10).unwrap();
        assert!(matches!(e.get_arg(ArgDefault::Value(0)), Err(TecoError::Mrp)));
    }

    #[test]
    fn comma_then_arg() {
        let mut e = ExprState::new();
        e.digit('3', 10).unwrap();
        e.comma().unwrap();
        e.digit('9', 10).unwrap();
        assert_eq!(e.take_arg2(), Some(3));
        assert_eq!(e.get_arg(ArgDefault::Value(0)).unwrap(), 9);
    }

    #[test]
    fn radix_eight_rejects_digit_eight() {
        let mut e = ExprState::new();
        assert!(e.digit('8', 8).is_err());
    }

    #[test]
    fn default_applied_when_absent() {
        let mut e = ExprState::new();
        assert_eq!(e.get_arg(ArgDefault::Value(42)).unwrap(), 42);
    }

    #[test]
    fn set_val_feeds_into_following_operator() {
        let mut e = ExprState::new();
        e.set_val(10);
        e.operator('+').unwrap();
        e.digit('5', 10).unwrap();
        assert_eq!(e.get_arg(ArgDefault::Value(0)).unwrap(), 15);
    }

    proptest! {
        /// Feeding a number one decimal digit at a time produces the
        /// same committed value as the number's own `i64` parse — the
        /// evaluator has no notion of a number beyond repeated
        /// `digit()` calls, so this is its only arithmetic base case.
        #[test]
        fn digit_sequence_matches_decimal_value(n in 0u32..1_000_000) {
            let mut e = ExprState::new();
            for c in n.to_string().chars() {
                e.digit(c, 10).unwrap();
            }
            prop_assert_eq!(e.get_arg(ArgDefault::Value(-1)).unwrap(), n as i64);
        }

        /// A chain of `+`/`-` terms, left-to-right with no precedence,
        /// matches folding the same operators over plain `i64`s —
        /// `ExprState` is defined to have no precedence at all, so
        /// left-to-right fold is the only correct oracle.
        #[test]
        fn plus_minus_chain_is_left_to_right_fold(
            first in -1000i64..1000,
            rest in proptest::collection::vec((prop_oneof![Just('+'), Just('-')], 0i64..1000), 0..8),
        ) {
            let mut e = ExprState::new();
            if first < 0 {
                e.operator('-').unwrap();
                for c in first.unsigned_abs().to_string().chars() {
                    e.digit(c, 10).unwrap();
                }
            } else {
                for c in first.to_string().chars() {
                    e.digit(c, 10).unwrap();
                }
            }
            let mut expected = first;
            for (op, val) in &rest {
                e.operator(*op).unwrap();
                for c in val.unsigned_abs().to_string().chars() {
                    e.digit(c, 10).unwrap();
                }
                expected = if *op == '+' { expected + val } else { expected - val };
            }
            prop_assert_eq!(e.get_arg(ArgDefault::Value(0)).unwrap(), expected);
        }
    }
}
