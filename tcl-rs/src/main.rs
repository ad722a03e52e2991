use std::io::{BufRead, Write};
use std::path::Path;

use tcl::cli::{self, ConfigFile};
use tcl::script::parser::is_complete;
use tcl::script::{Interpreter, TclError, Value};

fn main() {
    let args = match cli::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("tcl: {e}");
            eprintln!("Usage: tcl [-d] [-f[<rcfile>]] [-c<cmd>]... [<script> [<arg>...]]");
            std::process::exit(1);
        }
    };
    tcl::init_tracing(args.debug);

    let mut interp = Interpreter::new();

    // ── Globals ───────────────────────────────────────────────────────────────
    let argv0 = match &args.script {
        Some(path) => path.display().to_string(),
        None => std::env::args().next().unwrap_or_else(|| "tcl".to_owned()),
    };
    interp.seed_argv(&argv0, &args.script_args);
    let is_tty = unsafe {
        libc::isatty(libc::STDIN_FILENO) != 0 && libc::isatty(libc::STDOUT_FILENO) != 0
    };
    interp.set_var("tcl_interactive", Value::from(is_tty && args.script.is_none()));

    // ── Startup file ──────────────────────────────────────────────────────────
    let rc = match &args.config {
        ConfigFile::Skip => None,
        ConfigFile::Explicit(path) => Some(path.clone()),
        ConfigFile::Search if args.script.is_none() => cli::find_user_config(),
        ConfigFile::Search => None,
    };
    if let Some(path) = rc {
        if let Err(e) = interp.source_file(&path) {
            exit_on_exit(&e);
            eprintln!("tcl: warning: {}: {e}", path.display());
        }
    }

    // ── Startup commands (-c<cmd>) ────────────────────────────────────────────
    for cmd in &args.commands {
        if let Err(e) = interp.eval(cmd) {
            exit_on_exit(&e);
            eprintln!("tcl: {e}");
        }
    }

    match &args.script {
        Some(path) => run_script(&mut interp, path),
        None => repl(&mut interp, is_tty),
    }
}

/// Terminate the process if `e` is the `exit` command's signal.
fn exit_on_exit(e: &TclError) {
    if let TclError::Exit(code) = e {
        std::process::exit(*code);
    }
}

fn run_script(interp: &mut Interpreter, path: &Path) {
    if let Err(e) = interp.source_file(path) {
        exit_on_exit(&e);
        let info = interp
            .get_var("::errorInfo")
            .map(|v| v.as_text().to_owned())
            .unwrap_or_default();
        if info.is_empty() {
            eprintln!("{e}");
        } else {
            eprintln!("{info}");
        }
        std::process::exit(1);
    }
}

/// Read-eval-print loop.  Lines accumulate until they form a complete
/// command, so braces and brackets may span lines.  Results are echoed
/// only when attached to a terminal.
fn repl(interp: &mut Interpreter, interactive: bool) {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    let mut pending = String::new();
    loop {
        if interactive {
            let prompt = if pending.is_empty() { cli::prompt() } else { "> ".to_owned() };
            print!("{prompt}");
            let _ = std::io::stdout().flush();
        }
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("tcl: {e}");
                break;
            }
            None => break,
        };
        pending.push_str(&line);
        pending.push('\n');
        if !is_complete(&pending) {
            continue;
        }
        let script = std::mem::take(&mut pending);
        match interp.eval(&script) {
            Ok(v) if interactive && !v.is_empty() => println!("{v}"),
            Ok(_) => {}
            Err(TclError::Exit(code)) => std::process::exit(code),
            Err(e) => println!("{e}"),
        }
    }
    if !pending.trim().is_empty() {
        eprintln!("tcl: incomplete command at end of input");
    }
}
