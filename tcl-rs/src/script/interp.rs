//! The interpreter: statement evaluation, command dispatch and the
//! procedure-call machinery.
//!
//! Evaluation walks the token stream from [`Parser`], gluing adjacent
//! fragments into words.  Each statement terminator dispatches the words
//! collected so far.  Once a command leaves a non-`Ok` [`Signal`] behind,
//! the rest of the script is skipped and the signal is left for the
//! enclosing loop or procedure to consume.

use std::ops::{Deref, DerefMut};

use tracing::{debug, trace, warn};

use super::command::{resolve_subcommand, Command, Proc, Registry};
use super::error::{TclError, TclResult};
use super::expr::{self, EvalContext};
use super::frame::Scope;
use super::parser::{Parser, Substitutions, Token};
use super::value::Value;
use super::{builtins, lists, system};

/// Longest statement text quoted in an error trace.
const TRACE_TEXT_MAX: usize = 128;

/// Non-error completion disposition of the last command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Signal {
    #[default]
    Ok,
    Return,
    Break,
    Continue,
}

/// Where `puts` output goes.
#[derive(Debug)]
pub enum Output {
    Stdout,
    /// Lines are collected for [`Interpreter::take_output`]; `partial`
    /// holds text written with `-nonewline` that has not been terminated.
    Capture { lines: Vec<String>, partial: String },
}

pub struct Interpreter {
    pub(crate) scope: Scope,
    pub(crate) registry: Registry,
    signal: Signal,
    /// Enclosing loops in the current procedure body.
    loop_depth: usize,
    /// Nesting of `eval` calls; errors are recorded when it returns to 0.
    eval_depth: usize,
    trace: Vec<String>,
    /// Name of the script file being sourced, for `info script`.
    pub(crate) script: String,
    output: Output,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

// ── Construction ──────────────────────────────────────────────────────────────

impl Interpreter {
    /// An interpreter with every built-in command registered, writing
    /// `puts` output to stdout.
    pub fn new() -> Self {
        let mut interp = Interpreter {
            scope: Scope::new(),
            registry: Registry::default(),
            signal: Signal::Ok,
            loop_depth: 0,
            eval_depth: 0,
            trace: Vec::new(),
            script: String::new(),
            output: Output::Stdout,
        };
        let installers: [fn(&mut Interpreter) -> TclResult<()>; 3] =
            [builtins::register, lists::register, system::register];
        for install in installers {
            if let Err(e) = install(&mut interp) {
                warn!(error = %e, "built-in registration failed");
            }
        }
        interp.scope.set("errorInfo", Value::empty());
        interp
    }

    /// Like [`new`](Self::new), but `puts` to stdout is captured.
    pub fn with_captured_output() -> Self {
        let mut interp = Interpreter::new();
        interp.output = Output::Capture { lines: Vec::new(), partial: String::new() };
        interp
    }

    /// Seed `argv0`, `argv` and `argc` for a script run.
    pub fn seed_argv(&mut self, argv0: &str, args: &[String]) {
        self.scope.set("argv0", Value::from(argv0));
        self.scope.set("argv", Value::list_of(args.iter().map(String::as_str)));
        self.scope.set("argc", Value::from(args.len()));
    }

    /// Register a native command under a top-level name.
    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut Interpreter, &[Value]) -> TclResult + 'static,
    {
        self.registry.register(name, Command::native(f));
    }

    /// Register a native command under an ensemble path (`"string length"`).
    pub fn register_nested<F>(&mut self, path: &str, f: F) -> TclResult<()>
    where
        F: Fn(&mut Interpreter, &[Value]) -> TclResult + 'static,
    {
        self.registry.register_nested(path, Command::native(f))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

// ── Variables and state ───────────────────────────────────────────────────────

impl Interpreter {
    pub fn get_var(&self, name: &str) -> TclResult {
        self.scope.get(name)
    }

    pub fn set_var(&mut self, name: &str, value: Value) -> Value {
        self.scope.set(name, value)
    }

    pub fn unset_var(&mut self, name: &str) -> TclResult<()> {
        self.scope.unset(name)
    }

    /// Remove a variable so its value can be rebuilt without copying.
    pub(crate) fn take_var(&mut self, name: &str) -> Option<Value> {
        self.scope.take(name)
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn set_signal(&mut self, signal: Signal) {
        self.signal = signal;
    }

    pub fn reset_signal(&mut self) {
        self.signal = Signal::Ok;
    }

    pub(crate) fn enter_loop(&mut self) {
        self.loop_depth += 1;
    }

    pub(crate) fn leave_loop(&mut self) {
        self.loop_depth = self.loop_depth.saturating_sub(1);
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

impl Interpreter {
    pub fn write_stdout(&mut self, text: &str, newline: bool) {
        match &mut self.output {
            Output::Stdout => {
                use std::io::Write;
                let mut out = std::io::stdout().lock();
                let written = if newline {
                    writeln!(out, "{text}")
                } else {
                    write!(out, "{text}").and_then(|()| out.flush())
                };
                if let Err(e) = written {
                    debug!(error = %e, "stdout write failed");
                }
            }
            Output::Capture { lines, partial } => {
                partial.push_str(text);
                if newline {
                    lines.push(std::mem::take(partial));
                }
            }
        }
    }

    /// Drain captured output lines (empty when writing to stdout).
    pub fn take_output(&mut self) -> Vec<String> {
        match &mut self.output {
            Output::Stdout => Vec::new(),
            Output::Capture { lines, partial } => {
                let mut out = std::mem::take(lines);
                if !partial.is_empty() {
                    out.push(std::mem::take(partial));
                }
                out
            }
        }
    }
}

// ── Evaluation ────────────────────────────────────────────────────────────────

impl Interpreter {
    /// Evaluate a script and return the result of its last command.
    ///
    /// When this is the outermost evaluation, a failure is annotated into
    /// the `errorInfo` global before being returned, and a top-level
    /// `return` is absorbed.
    pub fn eval(&mut self, script: &str) -> TclResult {
        if self.eval_depth == 0 {
            self.trace.clear();
        }
        self.eval_depth += 1;
        let result = self.eval_script(script);
        self.eval_depth -= 1;
        if self.eval_depth == 0 {
            if self.signal == Signal::Return {
                self.signal = Signal::Ok;
            }
            if let Err(err) = &result {
                self.record_error_info(err);
            }
        }
        result
    }

    fn eval_script(&mut self, script: &str) -> TclResult {
        self.signal = Signal::Ok;
        let mut parser = Parser::new(script);
        let mut words: Vec<Value> = Vec::new();
        let mut joining = false;
        let mut stmt_start = 0;
        let mut result = Value::empty();
        loop {
            let before = parser.pos();
            let token = match parser.next_token() {
                Ok(t) => t,
                Err(e) => return Err(self.annotate(e, &script[stmt_start..])),
            };
            let at_end = token == Token::Eof;
            if words.is_empty() && !joining && !matches!(token, Token::Sep | Token::Eol | Token::Eof) {
                stmt_start = before;
            }
            let fragment = match token {
                Token::Sep => {
                    joining = false;
                    continue;
                }
                Token::Eol | Token::Eof => {
                    if !words.is_empty() {
                        let argv = std::mem::take(&mut words);
                        result = match self.invoke(&argv) {
                            Ok(v) => v,
                            Err(e) => {
                                let text = &script[stmt_start..parser.pos()];
                                return Err(self.annotate(e, text));
                            }
                        };
                        if self.signal != Signal::Ok {
                            return Ok(result);
                        }
                    }
                    joining = false;
                    if at_end {
                        return Ok(result);
                    }
                    continue;
                }
                Token::Str(s) | Token::Esc(s) => Value::from(s),
                Token::Var(name) => match self.get_var(&name) {
                    Ok(v) => v,
                    Err(e) => return Err(self.annotate(e, &script[stmt_start..parser.pos()])),
                },
                Token::Cmd(body) => {
                    let v = match self.eval_script(&body) {
                        Ok(v) => v,
                        Err(e) => return Err(self.annotate(e, &script[stmt_start..parser.pos()])),
                    };
                    if self.signal != Signal::Ok {
                        return Ok(v);
                    }
                    v
                }
            };
            if joining {
                if let Some(last) = words.last_mut() {
                    let mut text = String::with_capacity(last.as_text().len() + fragment.as_text().len());
                    text.push_str(last.as_text());
                    text.push_str(fragment.as_text());
                    *last = Value::from(text);
                }
            } else {
                words.push(fragment);
                joining = true;
            }
        }
    }

    /// Start the error trace with the failing statement, unless an inner
    /// evaluation already did.
    fn annotate(&mut self, err: TclError, stmt: &str) -> TclError {
        if self.trace.is_empty() && !matches!(err, TclError::Exit(_)) {
            let text = stmt.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace());
            self.trace.push(format!("    while executing\n\"{}\"", truncate_chars(text, TRACE_TEXT_MAX)));
        }
        err
    }

    /// Store the message and accumulated trace into `errorInfo`.
    pub(crate) fn record_error_info(&mut self, err: &TclError) {
        if matches!(err, TclError::Exit(_)) {
            return;
        }
        let mut info = err.to_string();
        for line in self.trace.drain(..) {
            info.push('\n');
            info.push_str(&line);
        }
        debug!(error = %err, "error recorded");
        self.scope.set("::errorInfo", Value::from(info));
    }

    /// Evaluate `cond` as an expression and read it as a boolean.
    pub fn eval_condition(&mut self, cond: &str) -> TclResult<bool> {
        expr::evaluate(cond, self)?.as_bool()
    }

    /// Perform `$`, `[...]` and backslash substitution over free text.
    pub fn subst(&mut self, text: &str, subs: Substitutions) -> TclResult {
        let mut parser = Parser::for_subst(text, subs);
        let mut out = String::new();
        loop {
            match parser.next_token()? {
                Token::Eof => break,
                Token::Var(name) => out.push_str(self.get_var(&name)?.as_text()),
                Token::Cmd(body) => {
                    let v = self.eval_script(&body)?;
                    out.push_str(v.as_text());
                }
                Token::Str(s) | Token::Esc(s) => out.push_str(&s),
                Token::Sep | Token::Eol => {}
            }
        }
        Ok(Value::from(out))
    }
}

/// At most `max` characters of `s`, with `...` appended when cut.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_owned(),
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

impl Interpreter {
    /// Invoke one command.  `argv[0]` names it.
    pub fn invoke(&mut self, argv: &[Value]) -> TclResult {
        let Some(first) = argv.first() else {
            return Ok(Value::empty());
        };
        let name = first.as_text();
        let Some(cmd) = self.registry.resolve(name).cloned() else {
            return Err(TclError::NoSuchCommand(name.to_owned()));
        };
        trace!(command = name, argc = argv.len(), "dispatch");
        let result = match cmd {
            Command::Native(f) => f(self, argv)?,
            Command::Proc(p) => self.call_proc(&p, argv)?,
            Command::Ensemble(_) => self.invoke_ensemble(cmd, argv)?,
        };
        if self.loop_depth == 0 {
            let word = match self.signal {
                Signal::Break => "break",
                Signal::Continue => "continue",
                _ => return Ok(result),
            };
            // The error replaces the signal.
            self.signal = Signal::Ok;
            return Err(TclError::ControlFlowOutsideLoop(word));
        }
        Ok(result)
    }

    /// Walk nested ensembles: each level consumes one word, and the leaf
    /// sees `"outer sub"` as its `args[0]`.
    fn invoke_ensemble(&mut self, mut cmd: Command, argv: &[Value]) -> TclResult {
        let mut path = argv[0].as_text().to_owned();
        let mut args: Vec<Value> = argv.to_vec();
        while let Command::Ensemble(subs) = &cmd {
            let Some(sub) = args.get(1) else {
                return Err(TclError::WrongArity(format!("{path} subcommand ?argument ...?")));
            };
            let (key, next) = resolve_subcommand(subs, sub.as_text())?;
            path = format!("{path} {key}");
            let next = next.clone();
            args.splice(0..2, [Value::from(path.as_str())]);
            cmd = next;
        }
        match cmd {
            Command::Native(f) => f(self, &args),
            Command::Proc(p) => self.call_proc(&p, &args),
            Command::Ensemble(_) => Ok(Value::empty()),
        }
    }

    /// Run a procedure body in a fresh frame.
    pub fn call_proc(&mut self, proc: &Proc, argv: &[Value]) -> TclResult {
        let call = invocation_literal(argv);
        debug!(proc = %proc.name, level = self.scope.top() + 1, "enter proc");
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        let result = {
            let mut frame = LevelGuard::push_frame(self, call.clone());
            match proc.bind(&mut frame.scope, argv) {
                Ok(()) => frame.eval(proc.body.as_text()),
                Err(e) => Err(e),
            }
        };
        self.loop_depth = saved_loops;
        match result {
            Ok(v) => {
                self.signal = Signal::Ok;
                Ok(v)
            }
            Err(e) => {
                self.signal = Signal::Ok;
                // Argument binding failures are reported at the call site.
                if !self.trace.is_empty() && !matches!(e, TclError::Exit(_)) {
                    self.trace.push(format!("    invoked from within\n\"{}\"", truncate_chars(&call, TRACE_TEXT_MAX)));
                }
                Err(e)
            }
        }
    }

    /// Evaluate `body` with variable access retargeted `delta` levels up.
    pub fn uplevel(&mut self, delta: usize, body: &str) -> TclResult {
        let current = self.scope.level();
        let target = current
            .checked_sub(delta)
            .ok_or_else(|| TclError::BadLevel(delta.to_string()))?;
        self.eval_at_level(target, body)
    }

    /// Evaluate `body` with variable access pointed at absolute `level`.
    pub fn eval_at_level(&mut self, level: usize, body: &str) -> TclResult {
        if level > self.scope.top() {
            return Err(TclError::BadLevel(format!("#{level}")));
        }
        debug!(from = self.scope.level(), to = level, "uplevel");
        let mut guard = LevelGuard::retarget(self, level);
        guard.eval(body)
    }
}

/// The words of a call joined back into source form; words containing
/// whitespace are brace-quoted.
fn invocation_literal(argv: &[Value]) -> String {
    argv.iter()
        .map(|w| {
            let t = w.as_text();
            if t.chars().any(char::is_whitespace) {
                format!("{{{t}}}")
            } else {
                t.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Level guard ───────────────────────────────────────────────────────────────

/// Restores the current level (and pops a pushed frame) when dropped, so
/// every exit path out of a procedure call or `uplevel` unwinds the same way.
struct LevelGuard<'a> {
    interp: &'a mut Interpreter,
    saved: usize,
    pushed: bool,
}

impl<'a> LevelGuard<'a> {
    fn push_frame(interp: &'a mut Interpreter, call: String) -> Self {
        let saved = interp.scope.push(call);
        LevelGuard { interp, saved, pushed: true }
    }

    fn retarget(interp: &'a mut Interpreter, level: usize) -> Self {
        let saved = interp.scope.set_level(level);
        LevelGuard { interp, saved, pushed: false }
    }
}

impl Deref for LevelGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Interpreter {
        &*self.interp
    }
}

impl DerefMut for LevelGuard<'_> {
    fn deref_mut(&mut self) -> &mut Interpreter {
        &mut *self.interp
    }
}

impl Drop for LevelGuard<'_> {
    fn drop(&mut self) {
        if self.pushed {
            self.interp.scope.pop(self.saved);
        } else {
            self.interp.scope.set_level(self.saved);
        }
    }
}

// ── Expression context ────────────────────────────────────────────────────────

impl EvalContext for Interpreter {
    fn lookup_var(&self, name: &str) -> TclResult {
        self.get_var(name)
    }

    fn eval_command(&mut self, script: &str) -> TclResult {
        self.eval_script(script)
    }

    fn substitute(&mut self, text: &str) -> TclResult {
        self.subst(text, Substitutions::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::value::Kind;

    fn run(src: &str) -> String {
        let mut interp = Interpreter::with_captured_output();
        interp.eval(src).unwrap().as_text().to_owned()
    }

    fn run_err(src: &str) -> TclError {
        let mut interp = Interpreter::with_captured_output();
        interp.eval(src).unwrap_err()
    }

    #[test]
    fn last_result_is_returned() {
        assert_eq!(run("set a 1; set b 2"), "2");
        assert_eq!(run(""), "");
    }

    #[test]
    fn fragments_join_into_one_word() {
        assert_eq!(run("set x 3; set y a${x}b[set x]"), "a3b3");
    }

    #[test]
    fn single_fragment_keeps_value() {
        let mut interp = Interpreter::new();
        interp.eval("set l [list a b]").unwrap();
        let v = interp.eval("set m $l").unwrap();
        assert_eq!(v.kind(), Kind::List);
    }

    #[test]
    fn unknown_command() {
        assert_eq!(run_err("frobnicate 1"), TclError::NoSuchCommand("frobnicate".into()));
    }

    #[test]
    fn error_info_traces_statement() {
        let mut interp = Interpreter::new();
        let _ = interp.eval("set a 1\nset b $nope");
        let info = interp.get_var("errorInfo").unwrap();
        assert_eq!(
            info.as_text(),
            "can't read \"nope\": no such variable\n    while executing\n\"set b $nope\""
        );
    }

    #[test]
    fn error_info_walks_procs() {
        let mut interp = Interpreter::new();
        let _ = interp.eval("proc inner {} {error boom}\nproc outer {x} {inner}\nouter {a b}");
        let info = interp.get_var("errorInfo").unwrap();
        assert_eq!(
            info.as_text(),
            "boom\n    while executing\n\"error boom\"\n    invoked from within\n\"inner\"\n    invoked from within\n\"outer {a b}\""
        );
    }

    #[test]
    fn break_outside_loop_is_error() {
        assert_eq!(run_err("break"), TclError::ControlFlowOutsideLoop("break"));
        assert_eq!(run_err("proc p {} {continue}; while 1 {p}"), TclError::ControlFlowOutsideLoop("continue"));
    }

    #[test]
    fn frames_restored_after_error() {
        let mut interp = Interpreter::new();
        let _ = interp.eval("proc p {} {error x}; p");
        assert_eq!(interp.scope().level(), 0);
        assert_eq!(interp.scope().top(), 0);
    }

    #[test]
    fn uplevel_restores_level() {
        let mut interp = Interpreter::new();
        interp
            .eval("proc setter {} {uplevel 1 {set v 7}}; proc p {} {setter; return $v}")
            .unwrap();
        assert_eq!(interp.eval("p").unwrap().as_text(), "7");
        assert_eq!(interp.scope().level(), 0);
    }

    #[test]
    fn bad_level() {
        assert_eq!(run_err("uplevel 3 {set x 1}"), TclError::BadLevel("3".into()));
    }

    #[test]
    fn ensemble_needs_subcommand() {
        assert_eq!(
            run_err("string"),
            TclError::WrongArity("string subcommand ?argument ...?".into())
        );
    }

    #[test]
    fn ensemble_prefix_dispatch() {
        assert_eq!(run("string len hello"), "5");
    }

    #[test]
    fn captured_output() {
        let mut interp = Interpreter::with_captured_output();
        interp.eval("puts hello; puts -nonewline a; puts b").unwrap();
        assert_eq!(interp.take_output(), vec!["hello".to_owned(), "ab".to_owned()]);
    }

    #[test]
    fn command_substitution_signal_stops_statement() {
        assert_eq!(run("set r {}; foreach i {1 2 3} {append r [if {$i == 2} break else {set i}]}; set r"), "1");
    }

    #[test]
    fn top_level_return_is_absorbed() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.eval("return 5; set x 1").unwrap().as_text(), "5");
        assert_eq!(interp.signal(), Signal::Ok);
        assert!(interp.get_var("x").is_err());
    }

    #[test]
    fn invocation_literal_braces_words_with_spaces() {
        let argv = vec![Value::from("p"), Value::from("a b"), Value::from("c")];
        assert_eq!(invocation_literal(&argv), "p {a b} c");
    }
}
