//! Language-core commands: variables, procedures, control flow, `catch`,
//! `uplevel` and the `info` ensemble.
//!
//! Every command has the native signature `fn(&mut Interpreter, &[Value])`
//! where `args[0]` is the name it was invoked as.  Loop constructs bracket
//! their bodies with `enter_loop`/`leave_loop` so that `break` and
//! `continue` are legal inside them and nowhere else.

use std::rc::Rc;

use tracing::debug;

use super::command::{Command, Proc};
use super::error::{check_arity, TclError, TclResult};
use super::expr;
use super::interp::{Interpreter, Signal};
use super::lists::concat_words;
use super::parser::{self, Substitutions};
use super::value::Value;
use crate::pattern::glob_match;

type Handler = fn(&mut Interpreter, &[Value]) -> TclResult;

const COMMANDS: &[(&str, Handler)] = &[
    ("append", cmd_append),
    ("break", cmd_break),
    ("catch", cmd_catch),
    ("continue", cmd_continue),
    ("error", cmd_error),
    ("eval", cmd_eval),
    ("expr", cmd_expr),
    ("for", cmd_for),
    ("foreach", cmd_foreach),
    ("if", cmd_if),
    ("incr", cmd_incr),
    ("proc", cmd_proc),
    ("rename", cmd_rename),
    ("return", cmd_return),
    ("set", cmd_set),
    ("subst", cmd_subst),
    ("unset", cmd_unset),
    ("uplevel", cmd_uplevel),
    ("while", cmd_while),
];

const INFO: &[(&str, Handler)] = &[
    ("info args", info_args),
    ("info body", info_body),
    ("info commands", info_commands),
    ("info complete", info_complete),
    ("info exists", info_exists),
    ("info globals", info_globals),
    ("info isensemble", info_isensemble),
    ("info level", info_level),
    ("info nameofexecutable", info_nameofexecutable),
    ("info patchlevel", info_patchlevel),
    ("info procs", info_procs),
    ("info script", info_script),
    ("info vars", info_vars),
];

pub fn register(interp: &mut Interpreter) -> TclResult<()> {
    for &(name, f) in COMMANDS {
        interp.register(name, f);
    }
    for &(path, f) in INFO {
        interp.register_nested(path, f)?;
    }
    Ok(())
}

// ── Variables ─────────────────────────────────────────────────────────────────

fn cmd_set(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 3, "varName ?newValue?")?;
    match args.get(2) {
        Some(v) => Ok(interp.set_var(args[1].as_text(), v.clone())),
        None => interp.get_var(args[1].as_text()),
    }
}

fn cmd_unset(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let mut names = &args[1..];
    let mut complain = true;
    while let Some(flag) = names.first() {
        match flag.as_text() {
            "-nocomplain" => complain = false,
            "--" => {
                names = &names[1..];
                break;
            }
            _ => break,
        }
        names = &names[1..];
    }
    for name in names {
        match interp.unset_var(name.as_text()) {
            Err(e) if complain => return Err(e),
            _ => {}
        }
    }
    Ok(Value::empty())
}

fn cmd_append(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "varName ?value ...?")?;
    let name = args[1].as_text();
    let mut text = interp
        .take_var(name)
        .map(|v| v.as_text().to_owned())
        .unwrap_or_default();
    for piece in &args[2..] {
        text.push_str(piece.as_text());
    }
    Ok(interp.set_var(name, Value::from(text)))
}

fn cmd_incr(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 3, "varName ?increment?")?;
    let name = args[1].as_text();
    let step = match args.get(2) {
        Some(v) => v.as_int()?,
        None => 1,
    };
    let current = match interp.get_var(name) {
        Ok(v) => v.as_int()?,
        Err(TclError::NoSuchVariable(_)) => 0,
        Err(e) => return Err(e),
    };
    Ok(interp.set_var(name, Value::from(current.wrapping_add(step))))
}

// ── Procedures ────────────────────────────────────────────────────────────────

fn cmd_proc(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 4, 4, "name args body")?;
    let name = args[1].as_text();
    let proc = Proc::new(name, args[2].clone(), args[3].clone())?;
    debug!(proc = name, params = proc.params.len(), "define proc");
    interp.registry.register(name, Command::Proc(Rc::new(proc)));
    Ok(Value::empty())
}

fn cmd_return(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 2, "?value?")?;
    interp.set_signal(Signal::Return);
    Ok(args.get(1).cloned().unwrap_or_default())
}

fn cmd_rename(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, 3, "oldName newName")?;
    let (old, new) = (args[1].as_text(), args[2].as_text());
    if !new.is_empty() && interp.registry.contains(new) {
        return Err(TclError::msg(format!(
            "can't rename to \"{new}\": command already exists"
        )));
    }
    let Some(cmd) = interp.registry.remove(old) else {
        let verb = if new.is_empty() { "delete" } else { "rename" };
        return Err(TclError::msg(format!(
            "can't {verb} \"{old}\": command doesn't exist"
        )));
    };
    if !new.is_empty() {
        interp.registry.register(new, cmd);
    }
    Ok(Value::empty())
}

// ── Control flow ──────────────────────────────────────────────────────────────

fn cmd_break(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 1, "")?;
    interp.set_signal(Signal::Break);
    Ok(Value::empty())
}

fn cmd_continue(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 1, "")?;
    interp.set_signal(Signal::Continue);
    Ok(Value::empty())
}

fn cmd_if(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(
        args,
        3,
        usize::MAX,
        "expr1 ?then? body1 elseif expr2 ?then? body2 elseif ... ?else? ?bodyN?",
    )?;
    let mut i = 1;
    loop {
        let cond = &args[i];
        i += 1;
        if args.get(i).map(Value::as_text) == Some("then") {
            i += 1;
        }
        let Some(body) = args.get(i) else {
            return Err(TclError::msg(format!(
                "wrong # args: no script following \"{}\" argument",
                args[i - 1]
            )));
        };
        i += 1;
        if interp.eval_condition(cond.as_text())? {
            return interp.eval(body.as_text());
        }
        match args.get(i).map(Value::as_text) {
            None => return Ok(Value::empty()),
            Some("elseif") => {
                i += 1;
                if i >= args.len() {
                    return Err(TclError::msg(
                        "wrong # args: no expression after \"elseif\" argument",
                    ));
                }
            }
            Some("else") => {
                let Some(body) = args.get(i + 1) else {
                    return Err(TclError::msg(
                        "wrong # args: no script following \"else\" argument",
                    ));
                };
                return interp.eval(body.as_text());
            }
            Some(_) => return interp.eval(args[i].as_text()),
        }
    }
}

/// What a loop does after one pass through its body.
enum Pass {
    Next,
    Break,
    Return(Value),
}

fn run_pass(interp: &mut Interpreter, body: &str) -> TclResult<Pass> {
    interp.enter_loop();
    let result = interp.eval(body);
    interp.leave_loop();
    let value = result?;
    Ok(match interp.signal() {
        Signal::Ok => Pass::Next,
        Signal::Continue => {
            interp.reset_signal();
            Pass::Next
        }
        Signal::Break => {
            interp.reset_signal();
            Pass::Break
        }
        Signal::Return => Pass::Return(value),
    })
}

fn cmd_while(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, 3, "test command")?;
    let (test, body) = (args[1].as_text(), args[2].as_text());
    while interp.eval_condition(test)? {
        match run_pass(interp, body)? {
            Pass::Next => {}
            Pass::Break => break,
            Pass::Return(v) => return Ok(v),
        }
    }
    Ok(Value::empty())
}

fn cmd_for(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 5, 5, "start test next command")?;
    let (test, next, body) = (args[2].as_text(), args[3].as_text(), args[4].as_text());
    let started = interp.eval(args[1].as_text())?;
    if interp.signal() == Signal::Return {
        return Ok(started);
    }
    while interp.eval_condition(test)? {
        match run_pass(interp, body)? {
            Pass::Next => {}
            Pass::Break => break,
            Pass::Return(v) => return Ok(v),
        }
        let stepped = interp.eval(next)?;
        if interp.signal() == Signal::Return {
            return Ok(stepped);
        }
    }
    Ok(Value::empty())
}

fn cmd_foreach(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    if args.len() < 4 || args.len() % 2 != 0 {
        return Err(TclError::WrongArity(format!(
            "{} varList list ?varList list ...? command",
            args[0]
        )));
    }
    let body = args[args.len() - 1].as_text();
    let mut groups: Vec<(Vec<String>, Vec<Value>)> = Vec::new();
    for pair in args[1..args.len() - 1].chunks(2) {
        let names: Vec<String> = pair[0]
            .as_list()?
            .iter()
            .map(|v| v.as_text().to_owned())
            .collect();
        if names.is_empty() {
            return Err(TclError::msg("foreach varlist is empty"));
        }
        groups.push((names, pair[1].as_list()?.to_vec()));
    }
    let rounds = groups
        .iter()
        .map(|(names, items)| items.len().div_ceil(names.len()))
        .max()
        .unwrap_or(0);
    for round in 0..rounds {
        for (names, items) in &groups {
            for (j, name) in names.iter().enumerate() {
                let item = items.get(round * names.len() + j).cloned().unwrap_or_default();
                interp.set_var(name, item);
            }
        }
        match run_pass(interp, body)? {
            Pass::Next => {}
            Pass::Break => break,
            Pass::Return(v) => return Ok(v),
        }
    }
    Ok(Value::empty())
}

// ── Errors and evaluation ─────────────────────────────────────────────────────

fn cmd_error(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 4, "message ?errorInfo? ?errorCode?")?;
    Err(TclError::Message(args[1].as_text().to_owned()))
}

/// Completion code reported by `catch` for each disposition.
fn signal_code(signal: Signal) -> i64 {
    match signal {
        Signal::Ok => 0,
        Signal::Return => 2,
        Signal::Break => 3,
        Signal::Continue => 4,
    }
}

fn cmd_catch(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 3, "script ?resultVarName?")?;
    interp.enter_loop();
    let result = interp.eval(args[1].as_text());
    interp.leave_loop();
    let (code, value) = match result {
        Ok(v) => {
            let code = signal_code(interp.signal());
            interp.reset_signal();
            (code, v)
        }
        Err(e @ TclError::Exit(_)) => return Err(e),
        Err(e) => {
            interp.reset_signal();
            interp.record_error_info(&e);
            (1, Value::from(e.to_string()))
        }
    };
    if let Some(var) = args.get(2) {
        interp.set_var(var.as_text(), value);
    }
    Ok(Value::from(code))
}

fn cmd_eval(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "arg ?arg ...?")?;
    let script = match args {
        [_, one] => one.as_text().to_owned(),
        _ => concat_words(&args[1..]),
    };
    interp.eval(&script)
}

fn cmd_expr(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "arg ?arg ...?")?;
    let text = match args {
        [_, one] => one.as_text().to_owned(),
        _ => args[1..]
            .iter()
            .map(Value::as_text)
            .collect::<Vec<_>>()
            .join(" "),
    };
    expr::evaluate(&text, interp)
}

fn cmd_subst(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let usage = "?-nobackslashes? ?-nocommands? ?-novariables? string";
    check_arity(args, 2, 5, usage)?;
    let mut subs = Substitutions::default();
    let text = &args[args.len() - 1];
    for flag in &args[1..args.len() - 1] {
        match flag.as_text() {
            "-nobackslashes" => subs.backslashes = false,
            "-nocommands" => subs.commands = false,
            "-novariables" => subs.variables = false,
            other => {
                return Err(TclError::msg(format!(
                    "bad switch \"{other}\": must be -nobackslashes, -nocommands, or -novariables"
                )))
            }
        }
    }
    interp.subst(text.as_text(), subs)
}

/// `N` (relative) or `#N` (absolute), as accepted by `uplevel`.
enum LevelSpec {
    Relative(usize),
    Absolute(usize),
}

fn parse_level(s: &str) -> Option<LevelSpec> {
    match s.strip_prefix('#') {
        Some(n) => n.parse().ok().map(LevelSpec::Absolute),
        None if s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok().map(LevelSpec::Relative),
        None => None,
    }
}

fn cmd_uplevel(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "?level? command ?arg ...?")?;
    let (level, rest) = match parse_level(args[1].as_text()) {
        Some(level) if args.len() > 2 => (level, &args[2..]),
        _ => (LevelSpec::Relative(1), &args[1..]),
    };
    let script = match rest {
        [one] => one.as_text().to_owned(),
        _ => concat_words(rest),
    };
    match level {
        LevelSpec::Relative(delta) => interp.uplevel(delta, &script),
        LevelSpec::Absolute(n) => interp.eval_at_level(n, &script),
    }
}

// ── info ──────────────────────────────────────────────────────────────────────

fn proc_named(interp: &Interpreter, name: &str) -> TclResult<Rc<Proc>> {
    interp
        .registry
        .proc(name)
        .ok_or_else(|| TclError::msg(format!("\"{name}\" isn't a procedure")))
}

/// Keep the names matching an optional glob pattern in `args[1]`.
fn filtered(names: Vec<String>, args: &[Value]) -> Value {
    match args.get(1) {
        Some(pat) => Value::list_of(
            names
                .into_iter()
                .filter(|n| glob_match(pat.as_text(), n, false)),
        ),
        None => Value::list_of(names),
    }
}

fn info_args(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "procname")?;
    let proc = proc_named(interp, args[1].as_text())?;
    Ok(Value::list_of(proc.params.iter().map(|p| p.name.as_str())))
}

fn info_body(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "procname")?;
    Ok(proc_named(interp, args[1].as_text())?.body.clone())
}

fn info_commands(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 2, "?pattern?")?;
    Ok(filtered(interp.registry.names(false), args))
}

fn info_procs(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 2, "?pattern?")?;
    Ok(filtered(interp.registry.names(true), args))
}

fn info_complete(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "command")?;
    Ok(Value::from(parser::is_complete(args[1].as_text())))
}

fn info_exists(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "varName")?;
    Ok(Value::from(interp.scope.exists(args[1].as_text())))
}

fn info_globals(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 2, "?pattern?")?;
    Ok(filtered(interp.scope.names(true), args))
}

fn info_vars(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 2, "?pattern?")?;
    Ok(filtered(interp.scope.names(false), args))
}

fn info_level(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 2, "?number?")?;
    let current = interp.scope.level();
    let Some(arg) = args.get(1) else {
        return Ok(Value::from(current));
    };
    let n = arg.as_int()?;
    let level = if n > 0 {
        usize::try_from(n).ok()
    } else {
        usize::try_from(-n).ok().and_then(|back| current.checked_sub(back))
    };
    match level.filter(|&l| l > 0 && l <= current).and_then(|l| interp.scope.call_at(l)) {
        Some(call) => Ok(Value::from(call)),
        None => Err(TclError::BadLevel(arg.as_text().to_owned())),
    }
}

fn info_isensemble(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "command")?;
    let found = interp.registry.resolve(args[1].as_text());
    Ok(Value::from(matches!(found, Some(Command::Ensemble(_)))))
}

fn info_nameofexecutable(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 1, "")?;
    let exe = std::env::current_exe()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    Ok(Value::from(exe))
}

fn info_patchlevel(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 1, "")?;
    Ok(Value::from(env!("CARGO_PKG_VERSION")))
}

fn info_script(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 1, "")?;
    Ok(Value::from(interp.script.as_str()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> String {
        let mut interp = Interpreter::with_captured_output();
        match interp.eval(src) {
            Ok(v) => v.as_text().to_owned(),
            Err(e) => panic!("{src}: {e}"),
        }
    }

    fn run_err(src: &str) -> String {
        let mut interp = Interpreter::with_captured_output();
        interp.eval(src).unwrap_err().to_string()
    }

    #[test]
    fn set_and_read() {
        assert_eq!(run("set x 5; set x"), "5");
        assert_eq!(run_err("set y"), "can't read \"y\": no such variable");
        assert_eq!(run_err("set"), "wrong # args: should be \"set varName ?newValue?\"");
    }

    #[test]
    fn unset_nocomplain() {
        assert_eq!(run("unset -nocomplain nope; info exists nope"), "0");
        assert_eq!(run_err("unset nope"), "can't unset \"nope\": no such variable");
        assert_eq!(run("set a 1; unset a; info exists a"), "0");
    }

    #[test]
    fn append_and_incr() {
        assert_eq!(run("append s a b; append s c"), "abc");
        assert_eq!(run("incr n; incr n 5"), "6");
        assert_eq!(run("set n 10; incr n -3"), "7");
        assert_eq!(run_err("set n x; incr n"), "expected integer but got \"x\"");
    }

    #[test]
    fn proc_binding() {
        assert_eq!(run("proc p {a {b 10} args} {list $a $b $args}; p 1"), "1 10 {}");
        assert_eq!(run("proc p {a {b 10} args} {list $a $b $args}; p 1 2 3 4"), "1 2 {3 4}");
        assert_eq!(
            run_err("proc p {a b} {}; p 1"),
            "wrong # args: should be \"p a b\""
        );
        assert_eq!(
            run_err("proc p {args x} {}; p 1"),
            "'args' should be the last argument"
        );
    }

    #[test]
    fn return_from_proc() {
        assert_eq!(run("proc p {} {return 7; error unreachable}; p"), "7");
        assert_eq!(run("proc p {} {foreach i {1 2 3} {if {$i == 2} {return $i}}}; p"), "2");
    }

    #[test]
    fn if_chains() {
        assert_eq!(run("if {1 > 2} {set r a} elseif {2 > 1} then {set r b} else {set r c}"), "b");
        assert_eq!(run("if 0 {set r a} {set r implicit}"), "implicit");
        assert_eq!(run("if 0 {set r a}"), "");
        assert_eq!(
            run_err("if 1"),
            "wrong # args: should be \"if expr1 ?then? body1 elseif expr2 ?then? body2 elseif ... ?else? ?bodyN?\""
        );
    }

    #[test]
    fn while_with_break_and_continue() {
        let src = "set i 0; set s {}
            while 1 {
                incr i
                if {$i > 6} break
                if {$i % 2} continue
                append s $i
            }
            set s";
        assert_eq!(run(src), "246");
    }

    #[test]
    fn for_runs_step_on_continue() {
        assert_eq!(
            run("set s {}; for {set i 0} {$i < 5} {incr i} {if {$i == 2} continue; append s $i}; set s"),
            "0134"
        );
    }

    #[test]
    fn foreach_groups() {
        assert_eq!(run("set s {}; foreach {a b} {1 2 3} {append s $a-$b,}; set s"), "1-2,3-,");
        assert_eq!(run("set s {}; foreach a {1 2} b {x y z} {append s $a$b}; set s"), "1x2yz");
        assert_eq!(run_err("foreach {} {1} {}"), "foreach varlist is empty");
    }

    #[test]
    fn loop_signal_cleared_after_break() {
        let mut interp = Interpreter::new();
        interp.eval("while 1 break").unwrap();
        assert_eq!(interp.signal(), Signal::Ok);
    }

    #[test]
    fn catch_codes() {
        assert_eq!(run("catch {error boom} msg"), "1");
        assert_eq!(run("catch {error boom} msg; set msg"), "boom");
        assert_eq!(run("catch {set x 3} v; set v"), "3");
        assert_eq!(run("catch {return 1}"), "2");
        assert_eq!(run("catch break"), "3");
        assert_eq!(run("catch continue"), "4");
        assert_eq!(run("catch error"), "1");
    }

    #[test]
    fn caught_stray_break_leaves_signal_clear() {
        let mut interp = Interpreter::with_captured_output();
        interp.eval("proc p {} {break}; catch p; puts after").unwrap();
        assert_eq!(interp.signal(), Signal::Ok);
        assert_eq!(interp.take_output(), vec!["after"]);

        assert_eq!(run("proc p {} {break}; set r 0; while {$r < 3} {incr r; catch p}; set r"), "3");
        assert_eq!(run("proc p {} {continue}; set out {}; foreach i {1 2 3} {catch p; lappend out $i}; set out"), "1 2 3");
    }

    #[test]
    fn catch_records_error_info() {
        let mut interp = Interpreter::new();
        interp.eval("catch {set a $nope}").unwrap();
        let info = interp.get_var("errorInfo").unwrap();
        assert!(info.as_text().starts_with("can't read \"nope\""));
        assert!(info.as_text().contains("while executing"));
    }

    #[test]
    fn catch_does_not_swallow_exit() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.eval("catch {exit 3}").unwrap_err(), TclError::Exit(3));
    }

    #[test]
    fn eval_concatenates() {
        assert_eq!(run("eval set x 4"), "4");
        assert_eq!(run("eval {set y 9}"), "9");
    }

    #[test]
    fn expr_joins_words() {
        assert_eq!(run("expr 1 + 2"), "3");
        assert_eq!(run("expr {1+[expr {2+3}]}"), "6");
    }

    #[test]
    fn subst_flags() {
        assert_eq!(run("set a 1; subst {$a [set a] \\t}"), "1 1 \t");
        assert_eq!(run("set a 1; subst -nocommands {$a [set a]}"), "1 [set a]");
        assert_eq!(run("set a 1; subst -novariables {$a}"), "$a");
        assert_eq!(run("subst -nobackslashes {a\\tb}"), "a\\tb");
    }

    #[test]
    fn uplevel_targets_caller() {
        assert_eq!(run("proc p {} {uplevel 1 {set x 5}}; p; set x"), "5");
        assert_eq!(run("proc p {} {uplevel {set x 6}}; p; set x"), "6");
        assert_eq!(run("proc q {} {uplevel #0 {set g 1}}; proc p {} {q}; p; set g"), "1");
    }

    #[test]
    fn uplevel_restores_after_error() {
        let mut interp = Interpreter::new();
        interp.eval("proc p {} {catch {uplevel 1 {error x}}; set here 1}").unwrap();
        interp.eval("p").unwrap();
        assert_eq!(interp.scope().level(), 0);
        assert!(interp.get_var("here").is_err());
    }

    #[test]
    fn rename_and_delete() {
        assert_eq!(run("proc p {} {return hi}; rename p q; q"), "hi");
        assert_eq!(run_err("proc p {} {}; rename p {}; p"), "invalid command name \"p\"");
        assert_eq!(run_err("rename nope x"), "can't rename \"nope\": command doesn't exist");
    }

    #[test]
    fn info_introspection() {
        assert_eq!(run("proc p {a {b 2}} {return $a}; info args p"), "a b");
        assert_eq!(run("proc p {a} {return $a}; info body p"), "return $a");
        assert_eq!(run("proc zz1 {} {}; proc zz2 {} {}; info procs zz*"), "zz1 zz2");
        assert_eq!(run("info commands se?"), "set");
        assert_eq!(run("info complete {set a \\{}"), "1");
        assert_eq!(run("info complete \"set a \\{\""), "0");
        assert_eq!(run("set q 1; info exists q"), "1");
        assert_eq!(run("proc p {x} {info vars}; p 1"), "x");
        assert_eq!(run("info patchlevel"), env!("CARGO_PKG_VERSION"));
        assert_eq!(run("info isensemble string"), "1");
        assert_eq!(run("info isensemble set"), "0");
        assert_eq!(run("info isensemble nosuch"), "0");
    }

    #[test]
    fn info_level_reports_calls() {
        assert_eq!(run("info level"), "0");
        assert_eq!(run("proc p {} {info level}; p"), "1");
        assert_eq!(run("proc p {a} {info level 1}; p {x y}"), "p {x y}");
        assert_eq!(run("proc q {} {info level -1}; proc p {} {q}; p"), "p");
        assert_eq!(run_err("info level 1"), "bad level \"1\"");
        assert_eq!(
            run_err("proc q {} {uplevel 1 {info level 2}}; proc p {} {q}; p"),
            "bad level \"2\""
        );
    }

    #[test]
    fn info_prefix_and_ambiguity() {
        assert_eq!(run("info ex foo"), "0");
        assert!(run_err("info e foo").starts_with("unknown or ambiguous subcommand \"e\""));
    }
}
