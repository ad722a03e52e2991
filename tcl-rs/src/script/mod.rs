//! The Tcl-style command language.
//!
//! A script is a sequence of statements; each statement is a sequence of
//! words built by brace quoting, double quoting, `$variable` substitution
//! and `[command]` substitution.  The first word names a command from the
//! registry.  Every value is a string that may also carry a cached list,
//! integer, real or boolean reading.
//!
//! - [`parser`]: character-level tokenizer for statements and lists
//! - [`value`]: the shared value type and its conversions
//! - [`frame`]: the call-frame stack (frame 0 is global)
//! - [`command`]: the registry of native commands, ensembles and procedures
//! - [`interp`]: evaluation, dispatch, control signals and error traces
//! - [`expr`]: the expression language behind `expr`, `if`, `while`, `for`
//! - [`builtins`], [`lists`], [`system`]: the built-in command set
//!
//! # Quick start
//!
//! ```rust
//! use tcl::script::Interpreter;
//!
//! let mut interp = Interpreter::with_captured_output();
//! interp.eval("proc sq {x} {expr {$x * $x}}\nputs [sq 7]").unwrap();
//! assert_eq!(interp.take_output(), vec!["49"]);
//! ```

pub mod builtins;
pub mod command;
pub mod error;
pub mod expr;
pub mod frame;
pub mod interp;
pub mod lists;
pub mod parser;
pub mod system;
pub mod value;

// Re-exports for convenience.
pub use command::{Command, Registry};
pub use error::{TclError, TclResult};
pub use expr::EvalContext;
pub use interp::{Interpreter, Signal};
pub use value::Value;
