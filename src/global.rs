//! Global interpreter state: flag registers, radix, trace toggle, and
//! the watch-display parameter vector.
//!
//! Grounded on `ed`'s `global.rs`, which held ed's mutable
//! cross-command state (the `g`/`v` active-line list) behind a small
//! set of free functions; here the analogous cross-command state is
//! the TECO flag set, held as a plain struct rather than statics since
//! the interpreter owns exactly one of these per process (no need for
//! `Mutex`-guarded globals once state lives in `CommandLevel`/`Interp`).

use crate::error::TecoError;

/// `et` bit: the terminal is capable of supporting TECO's line editing.
/// Always pinned on; this interpreter always talks to a TTY-or-pipe.
pub const ET_TERMINAL_CAPABLE: i16 = 0x0001;

/// `et` bit: a watch display is present. Pinned only when a non-null
/// [`crate::display::Sink`] is installed; this crate ships only the
/// null sink, so it stays clear.
pub const ET_DISPLAY_PRESENT: i16 = 0x0002;

/// `et` bit 5 (0x20): enable non-blocking `^T` reads from the terminal.
pub const ET_NONBLOCK_READ: i16 = 0x0020;

/// `et`'s high bit: trap a pending interrupt inside `:W` instead of
/// raising `XAB` (spec §5 "inside the wait loop of `:W`... unless the
/// high bit of et traps it"). Declared for the flag's documented bit
/// layout; unconsulted at runtime since `do_w`'s read loop has no
/// interrupt of its own to trap (no display backend — see `'W'` in
/// interpreter.rs).
pub const ET_TRAP_INTERRUPT: i16 = -0x8000;

fn sign_extend(n: i32) -> i16 {
    n as i16
}

/// The full set of TECO global flags plus radix and trace state.
#[derive(Debug, Clone)]
pub struct GlobalFlags {
    pub ed: i16,
    pub eh: i16,
    pub es: i16,
    pub et: i16,
    pub eu: i16,
    pub ev: i16,
    /// `^x`: search case sensitivity flag. Non-zero disables
    /// dot-matches-all/case-fold in the search compiler (spec §4.3).
    pub caret_x: i16,
    pub radix: u32,
    /// `?` toggled command trace.
    pub trace: bool,
    /// Watch parameters: tab width, width, height, and reserved slots.
    pub watch: [i32; 8],
}

impl Default for GlobalFlags {
    fn default() -> Self {
        GlobalFlags {
            ed: 0,
            eh: 0,
            es: 0,
            et: ET_TERMINAL_CAPABLE,
            eu: -1,
            ev: 0,
            caret_x: 0,
            radix: 10,
            trace: false,
            watch: [8, 80, 24, 0, 0, 0, 0, 0],
        }
    }
}

impl GlobalFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bit-flag set semantics (spec §4.1): no argument returns `current`
    /// unchanged; one argument `n` ORs in `fixed`; two arguments `m,n`
    /// (m is the comma-stored first value) compute
    /// `(current | n) & !m`, then OR in `fixed`.
    pub fn bit_flag_set(current: i16, m: Option<i32>, n: Option<i32>, fixed: i16) -> i16 {
        match (m, n) {
            (None, None) => current,
            (None, Some(n)) => sign_extend(n) | fixed,
            (Some(m), Some(n)) => ((current | sign_extend(n)) & !sign_extend(m)) | fixed,
            (Some(_), None) => current,
        }
    }

    /// Numeric-flag set semantics (spec §4.1): same argument shapes as
    /// [`Self::bit_flag_set`] but without the AND-mask step — the new
    /// value simply replaces `current`.
    pub fn numeric_flag_set(current: i16, m: Option<i32>, n: Option<i32>) -> i16 {
        match (m, n) {
            (None, None) => current,
            (None, Some(n)) => sign_extend(n),
            (Some(_), Some(n)) => sign_extend(n),
            (Some(_), None) => current,
        }
    }

    pub fn set_ed(&mut self, m: Option<i32>, n: Option<i32>) {
        self.ed = Self::bit_flag_set(self.ed, m, n, 0);
    }

    pub fn set_eh(&mut self, m: Option<i32>, n: Option<i32>) {
        self.eh = Self::numeric_flag_set(self.eh, m, n);
    }

    pub fn set_es(&mut self, m: Option<i32>, n: Option<i32>) {
        self.es = Self::numeric_flag_set(self.es, m, n);
    }

    pub fn set_et(&mut self, m: Option<i32>, n: Option<i32>) {
        self.et = Self::bit_flag_set(self.et, m, n, ET_TERMINAL_CAPABLE);
    }

    pub fn set_eu(&mut self, m: Option<i32>, n: Option<i32>) {
        self.eu = Self::numeric_flag_set(self.eu, m, n);
    }

    pub fn set_ev(&mut self, m: Option<i32>, n: Option<i32>) {
        self.ev = Self::numeric_flag_set(self.ev, m, n);
    }

    pub fn set_caret_x(&mut self, m: Option<i32>, n: Option<i32>) {
        self.caret_x = Self::numeric_flag_set(self.caret_x, m, n);
    }

    /// Sets the input/output radix; fails `IRA` unless 8, 10, or 16.
    pub fn set_radix(&mut self, n: i32) -> Result<(), TecoError> {
        match n {
            8 | 10 | 16 => {
                self.radix = n as u32;
                Ok(())
            }
            _ => Err(TecoError::Ira),
        }
    }
}

/// `EJ` environment queries (spec §6).
///
/// No argument behaves as `0EJ` (parent PID modulo 256); `-1EJ` returns
/// `(cpu<<8)|os` pretending a PDP-11 running RT-11; `1EJ` returns 0;
/// `2EJ` returns the real user id. Any other argument fails `ARG`.
pub fn ej(arg: Option<i32>) -> Result<i32, TecoError> {
    match arg {
        None | Some(0) => Ok((unsafe { libc::getppid() } as i32).rem_euclid(256)),
        Some(-1) => Ok((0i32 << 8) | 7),
        Some(1) => Ok(0),
        Some(2) => Ok(unsafe { libc::getuid() } as i32),
        Some(_) => Err(TecoError::Arg),
    }
}

/// `EO`: fixed interpreter version number.
pub const EO_VERSION: i32 = 40;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_flag_no_args_is_identity() {
        assert_eq!(GlobalFlags::bit_flag_set(5, None, None, 0), 5);
    }

    #[test]
    fn bit_flag_one_arg_ors_fixed() {
        assert_eq!(GlobalFlags::bit_flag_set(0, None, Some(4), 1), 5);
    }

    #[test]
    fn bit_flag_two_args_mask_then_or() {
        // current=0b1111, m=0b0011 cleared, n=0b0100 ORed in, fixed=0
        assert_eq!(GlobalFlags::bit_flag_set(0b1111, Some(0b0011), Some(0b0100), 0), 0b1100);
    }

    #[test]
    fn radix_rejects_bad_values() {
        let mut g = GlobalFlags::new();
        assert!(g.set_radix(10).is_ok());
        assert!(matches!(g.set_radix(7), Err(TecoError::Ira)));
    }

    #[test]
    fn ej_minus_one_is_pdp11_rt11() {
        assert_eq!(ej(Some(-1)).unwrap(), 7);
    }

    #[test]
    fn ej_no_arg_matches_zero_arg() {
        assert_eq!(ej(None).unwrap(), ej(Some(0)).unwrap());
    }

    #[test]
    fn ej_other_args_fail() {
        assert!(matches!(ej(Some(99)), Err(TecoError::Arg)));
    }
}
