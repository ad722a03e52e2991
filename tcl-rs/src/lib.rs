//! A small Tcl-style scripting language: parser, evaluator, value model
//! and a built-in command set, plus the pieces the `tcl` shell binary
//! needs (argument parsing and rc-file discovery).

pub mod cli;
pub mod pattern;
pub mod script;

pub use script::{Interpreter, TclError, TclResult, Value};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times.  Enable with `RUST_LOG=tcl=debug` or
/// `RUST_LOG=tcl=trace`; `force_debug` turns on `tcl=debug` even when
/// `RUST_LOG` is unset.  Output goes to stderr.
pub fn init_tracing(force_debug: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        let filter = match std::env::var("RUST_LOG") {
            Ok(_) => EnvFilter::from_default_env(),
            Err(_) if force_debug => EnvFilter::new("tcl=debug"),
            Err(_) => return,
        };
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}
