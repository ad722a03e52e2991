//! Error kinds raised while parsing or evaluating a script.
//!
//! Control-flow dispositions (`return`, `break`, `continue`) are *not*
//! errors; they travel as [`Signal`](super::interp::Signal) state on the
//! interpreter.  Everything here aborts the current statement and unwinds
//! until a `catch` or the top-level driver sees it.

use thiserror::Error;

use super::value::Value;
use crate::pattern::PatternError;

/// Result type used by every command and evaluator entry point.
pub type TclResult<T = Value> = Result<T, TclError>;

/// An evaluation error.
///
/// The `Display` text is the message a script sees through `catch` and the
/// first line of `errorInfo`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TclError {
    #[error("can't read \"{0}\": no such variable")]
    NoSuchVariable(String),

    #[error("invalid command name \"{0}\"")]
    NoSuchCommand(String),

    #[error("unknown or ambiguous subcommand \"{sub}\": must be {choices}")]
    AmbiguousSubcommand { sub: String, choices: String },

    /// Carries the full usage line, command name included.
    #[error("wrong # args: should be \"{0}\"")]
    WrongArity(String),

    #[error("expected {expected} but got \"{got}\"")]
    NotANumber { expected: &'static str, got: String },

    #[error("expected boolean value but got \"{0}\"")]
    NotABoolean(String),

    #[error("bad index \"{0}\": must be integer?[+-]integer? or end?[+-]integer?")]
    BadIndex(String),

    #[error("list index out of range")]
    IndexOutOfBounds,

    /// End of input inside a brace, quote or bracket.
    #[error("missing {0}")]
    UnterminatedConstruct(&'static str),

    #[error("bad level \"{0}\"")]
    BadLevel(String),

    #[error("'args' should be the last argument")]
    MisplacedArgs,

    #[error("invoked \"{0}\" outside of a loop")]
    ControlFlowOutsideLoop(&'static str),

    /// Command-specific failure, including the `error` command.
    #[error("{0}")]
    Message(String),

    /// Raised by `exit`; never converted by `catch`.
    #[error("exit {0}")]
    Exit(i32),
}

impl TclError {
    pub fn msg(text: impl Into<String>) -> Self {
        TclError::Message(text.into())
    }

    pub fn not_integer(got: &str) -> Self {
        TclError::NotANumber { expected: "integer", got: got.to_owned() }
    }

    pub fn not_real(got: &str) -> Self {
        TclError::NotANumber { expected: "floating-point number", got: got.to_owned() }
    }
}

impl From<PatternError> for TclError {
    fn from(e: PatternError) -> Self {
        TclError::Message(e.to_string())
    }
}

/// Check `args.len()` against `min..=max` (`args[0]` is the command name).
///
/// `usage` omits the command name; it is taken from `args[0]` so ensemble
/// leaves report their full `outer inner` path.
pub fn check_arity(args: &[Value], min: usize, max: usize, usage: &str) -> TclResult<()> {
    if args.len() < min || args.len() > max {
        let name = args.first().map(Value::as_text).unwrap_or_default();
        let line = if usage.is_empty() {
            name.to_owned()
        } else {
            format!("{name} {usage}")
        };
        return Err(TclError::WrongArity(line));
    }
    Ok(())
}
