//! Process entry point: installs the `SIGINT` handler, runs the
//! startup macro search (spec §6 "Startup/bootstrap"), then drives the
//! `*`-prompt read-eval loop until `EX` or an interactive `^C`.

use std::io::Write as _;
use std::process;

use teco_rs::error::TecoError;
use teco_rs::input;
use teco_rs::interpreter::{self, Flow, Interp};

fn main() {
    teco_rs::signal::install();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let basename = args
        .first()
        .map(|p| {
            std::path::Path::new(p)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| p.clone())
        })
        .unwrap_or_default();
    let joined = std::iter::once(basename)
        .chain(args.into_iter().skip(1))
        .collect::<Vec<_>>()
        .join(" ");

    let mut interp = Interp::new();
    if let Err(e) = bootstrap(&mut interp, &joined) {
        tracing::error!(error = %e, "startup failed");
        eprintln!("{}", e);
        process::exit(1);
    }

    let exit_code = repl(&mut interp);
    tracing::info!(exit_code, "shutting down");
    process::exit(exit_code);
}

/// Startup: a `teco.tec` found on the macro search path runs first and
/// takes over entirely; otherwise the joined argv (minus argv\[0\]) is
/// treated as a filename to read in, yanking its first page (spec §6
/// "Startup/bootstrap").
fn bootstrap(interp: &mut Interp, argv_rest: &str) -> Result<(), TecoError> {
    if let Some(path) = input::resolve_ei_path("teco.tec") {
        tracing::debug!(path = %path.display(), "running startup macro");
        let text = std::fs::read_to_string(&path).map_err(|_| TecoError::Fnf("teco.tec".into()))?;
        interpreter::execute(interp, &text, false)?;
        return Ok(());
    }
    let fname = argv_rest.splitn(2, ' ').nth(1).unwrap_or("").trim();
    if !fname.is_empty() {
        tracing::debug!(fname, "opening initial file");
        let ret = interp.files.er(fname, true, &mut interp.regs.last_filename)?;
        if ret == -1 {
            interp.files.yank(&mut interp.buffer, false)?;
        }
    }
    Ok(())
}

fn repl(interp: &mut Interp) -> i32 {
    loop {
        print!("*");
        let _ = std::io::stdout().flush();
        let stdin = std::io::stdin();
        match input::read_command_line(stdin.lock()) {
            Ok(None) => return 0,
            Ok(Some(line)) => {
                let chars: Vec<char> = line.chars().collect();
                match interpreter::execute(interp, &line, true) {
                    Ok(Flow::Exit(code)) => return code,
                    Ok(_) => continue,
                    Err(e) => {
                        interpreter::report_error(interp, &e, &chars, chars.len());
                        continue;
                    }
                }
            }
            Err(_) => return 0,
        }
    }
}
