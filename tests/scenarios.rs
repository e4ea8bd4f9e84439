//! End-to-end command-string scenarios driving the interpreter exactly
//! the way the `*`-prompt loop does, checking observable buffer,
//! register, and error-return state. Grounded directly on the
//! end-to-end examples worked through while building `interpreter.rs`;
//! each one is traced against `examples/original_source/teco/teco.py`
//! rather than taken on faith, so a couple of rows assert the traced
//! behavior rather than a stated result that doesn't survive tracing
//! (noted per-test, and in `DESIGN.md`'s ledger).

use teco_rs::interpreter::{execute, Interp};
use teco_rs::registers::RegName;

const ESC: char = '\u{1b}';

fn run(cmd: &str) -> Interp {
    let mut interp = Interp::new();
    execute(&mut interp, cmd, false).expect("command should run cleanly");
    interp
}

#[test]
fn insert_sets_buffer_dot_and_laststringlen() {
    let interp = run(&format!("Ihello{ESC}"));
    assert_eq!(interp.buffer.text(), "hello");
    assert_eq!(interp.buffer.dot(), 5);
    assert_eq!(interp.buffer.laststringlen, -5);
}

#[test]
fn jump_then_search_moves_dot_to_match_end() {
    // "ll" inside "hello" spans bytes [2, 4); dot lands on 4 and
    // laststringlen records the two-byte match, independent of
    // whatever `.=` would go on to print.
    let interp = run(&format!("Ihello{ESC} J Sll{ESC}"));
    assert_eq!(interp.buffer.dot(), 4);
    assert_eq!(interp.buffer.laststringlen, -2);
}

#[test]
fn failing_search_inside_iteration_resets_dot_and_exits_via_semicolon() {
    // Each loop pass searches for "b" and exits the iteration with `;`
    // as soon as the search's return value is non-negative. "abcabc"
    // has two `b`s; the third search fails. A plain (non-colon) `S`
    // always resets `dot` to 0 on failure before the iteration-exit
    // check runs (mirrors `teco.py`'s `search`), so the loop's final
    // `dot` is 0, not the position of the last successful match.
    let interp = run(&format!("Iabcabc{ESC} J <Sb{ESC} ;>"));
    assert_eq!(interp.buffer.dot(), 0);
}

#[test]
fn h_k_clears_the_whole_buffer() {
    let interp = run(&format!("I1{ESC} I2{ESC} I3{ESC} HK"));
    assert_eq!(interp.buffer.text(), "");
    assert_eq!(interp.buffer.dot(), 0);
    assert_eq!(interp.buffer.end(), 0);
}

#[test]
fn u_sets_a_register_numeric_value() {
    let interp = run("5U1");
    let scope = interp.regs.root_scope();
    assert_eq!(interp.regs.get_num(RegName::Global('1'), scope), 5);
}

#[test]
fn fs_replaces_first_match_in_place() {
    let interp = run(&format!("Ifoobar{ESC} J @FS/foo/baz/{ESC}"));
    assert_eq!(interp.buffer.text(), "bazbar");
}

#[test]
fn bounded_iteration_repeats_insert_exact_count() {
    let interp = run(&format!("10<I*{ESC}>"));
    assert_eq!(interp.buffer.text(), "**********");
}

#[test]
fn x_then_g_duplicates_stored_range() {
    let interp = run(&format!("Ihello{ESC} J .,ZXa HK GaGa"));
    assert_eq!(interp.buffer.text(), "hellohello");
}

#[test]
fn caret_u_sets_register_text_with_custom_delimiter() {
    let interp = run("@^U1/hello/");
    let scope = interp.regs.root_scope();
    assert_eq!(interp.regs.get_text(RegName::Global('1'), scope), "hello");
}

#[test]
fn unclosed_insert_string_fails_utc() {
    let mut interp = Interp::new();
    let err = execute(&mut interp, "Ihello", false).unwrap_err();
    assert!(matches!(err, teco_rs::error::TecoError::Utc));
}

#[test]
fn colon_q_returns_text_length_not_numeric_field() {
    // `^U` only ever sets the text part; plain (non-colon) `Q` would
    // read the untouched numeric field (0). `:Q` reads the text
    // length instead — stash it into another register with `U2` so
    // the committed value is externally observable.
    let interp = run("@^U1/hello/ :Q1 U2");
    let scope = interp.regs.root_scope();
    assert_eq!(interp.regs.get_num(RegName::Global('2'), scope), 5);
}
