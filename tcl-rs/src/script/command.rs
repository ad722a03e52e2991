//! The command registry: native commands, ensembles and procedures.

use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use super::error::{TclError, TclResult};
use super::frame::Scope;
use super::interp::Interpreter;
use super::value::Value;

/// Signature of a native command.  `args[0]` is the name it was invoked as.
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &[Value]) -> TclResult>;

#[derive(Clone)]
pub enum Command {
    Native(NativeFn),
    /// Subcommand table, matched by exact name or unique prefix.
    Ensemble(Rc<BTreeMap<String, Command>>),
    Proc(Rc<Proc>),
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Native(_) => f.write_str("Native(..)"),
            Command::Ensemble(subs) => f.debug_tuple("Ensemble").field(subs).finish(),
            Command::Proc(p) => f.debug_tuple("Proc").field(p).finish(),
        }
    }
}

impl Command {
    pub fn native<F>(f: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> TclResult + 'static,
    {
        Command::Native(Rc::new(f))
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct Registry {
    commands: HashMap<String, Command>,
}

impl Registry {
    pub fn register(&mut self, name: &str, cmd: Command) {
        self.commands.insert(name.to_owned(), cmd);
    }

    /// Register a leaf under a space-separated path such as `"string length"`,
    /// creating intermediate ensembles as needed.
    ///
    /// Fails if an intermediate segment is already taken by a non-ensemble.
    pub fn register_nested(&mut self, path: &str, cmd: Command) -> TclResult<()> {
        let segments: Vec<&str> = path.split_whitespace().collect();
        let Some((first, rest)) = segments.split_first() else {
            return Err(TclError::msg("empty command path"));
        };
        if rest.is_empty() {
            self.register(first, cmd);
            return Ok(());
        }
        let slot = self
            .commands
            .entry((*first).to_owned())
            .or_insert_with(|| Command::Ensemble(Rc::default()));
        insert_path(slot, first, rest, cmd)
    }

    pub fn resolve(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Command> {
        self.commands.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Sorted top-level names.  With `procs_only`, just procedures.
    pub fn names(&self, procs_only: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .filter(|(_, c)| !procs_only || matches!(c, Command::Proc(_)))
            .map(|(n, _)| n.clone())
            .collect();
        names.sort();
        names
    }

    pub fn proc(&self, name: &str) -> Option<Rc<Proc>> {
        match self.commands.get(name) {
            Some(Command::Proc(p)) => Some(Rc::clone(p)),
            _ => None,
        }
    }
}

fn insert_path(slot: &mut Command, walked: &str, rest: &[&str], cmd: Command) -> TclResult<()> {
    let Command::Ensemble(subs) = slot else {
        return Err(TclError::msg(format!(
            "can't add subcommand to \"{walked}\": not an ensemble"
        )));
    };
    let subs = Rc::make_mut(subs);
    match rest {
        [] => Ok(()),
        [leaf] => {
            subs.insert((*leaf).to_owned(), cmd);
            Ok(())
        }
        [next, tail @ ..] => {
            let child = subs
                .entry((*next).to_owned())
                .or_insert_with(|| Command::Ensemble(Rc::default()));
            insert_path(child, &format!("{walked} {next}"), tail, cmd)
        }
    }
}

/// Find `sub` in an ensemble table: exact name first, then a unique prefix.
pub fn resolve_subcommand<'a>(
    subs: &'a BTreeMap<String, Command>,
    sub: &str,
) -> TclResult<(&'a str, &'a Command)> {
    if let Some((name, cmd)) = subs.get_key_value(sub) {
        return Ok((name.as_str(), cmd));
    }
    let mut matches = subs.iter().filter(|(name, _)| name.starts_with(sub));
    match (matches.next(), matches.next()) {
        (Some((name, cmd)), None) if !sub.is_empty() => Ok((name.as_str(), cmd)),
        _ => Err(TclError::AmbiguousSubcommand {
            sub: sub.to_owned(),
            choices: join_choices(subs.keys().map(String::as_str)),
        }),
    }
}

/// `a` / `a or b` / `a, b, or c`.
pub fn join_choices<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let names: Vec<&str> = names.collect();
    match names.as_slice() {
        [] => String::new(),
        [one] => (*one).to_owned(),
        [a, b] => format!("{a} or {b}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}

// ── Procedures ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Value>,
}

/// A script-defined procedure.
#[derive(Debug)]
pub struct Proc {
    pub name: String,
    pub params: Vec<Param>,
    /// Parameter list as written, for `info args`.
    pub arg_spec: Value,
    pub body: Value,
}

impl Proc {
    pub fn new(name: &str, arg_spec: Value, body: Value) -> TclResult<Self> {
        let mut params = Vec::new();
        for spec in arg_spec.as_list()? {
            let fields = spec.as_list()?;
            let param = match fields {
                [n] => Param { name: n.as_text().to_owned(), default: None },
                [n, default] => Param {
                    name: n.as_text().to_owned(),
                    default: Some(default.clone()),
                },
                [] => {
                    return Err(TclError::msg(format!(
                        "argument with no name in procedure \"{name}\""
                    )))
                }
                _ => {
                    return Err(TclError::msg(format!(
                        "too many fields in argument specifier \"{spec}\""
                    )))
                }
            };
            params.push(param);
        }
        Ok(Proc { name: name.to_owned(), params, arg_spec, body })
    }

    /// `name a ?b? ?arg ...?`
    pub fn usage(&self, invoked: &str) -> String {
        let mut out = invoked.to_owned();
        for p in &self.params {
            out.push(' ');
            if p.name == "args" {
                out.push_str("?arg ...?");
            } else if p.default.is_some() {
                out.push_str(&format!("?{}?", p.name));
            } else {
                out.push_str(&p.name);
            }
        }
        out
    }

    /// Bind call arguments (`args[0]` is the invoked name) into the
    /// current frame of `scope`.
    pub fn bind(&self, scope: &mut Scope, args: &[Value]) -> TclResult<()> {
        let invoked = args.first().map(Value::as_text).unwrap_or(&self.name);
        let actual = args.get(1..).unwrap_or_default();
        let mut next = 0;
        for (i, param) in self.params.iter().enumerate() {
            if param.name == "args" {
                if i + 1 != self.params.len() {
                    return Err(TclError::MisplacedArgs);
                }
                let rest = actual.get(next..).unwrap_or_default().to_vec();
                next = actual.len();
                scope.set("args", Value::from_list(rest));
            } else if let Some(v) = actual.get(next) {
                scope.set(&param.name, v.clone());
                next += 1;
            } else if let Some(d) = &param.default {
                scope.set(&param.name, d.clone());
            } else {
                return Err(TclError::WrongArity(self.usage(invoked)));
            }
        }
        if next < actual.len() {
            return Err(TclError::WrongArity(self.usage(invoked)));
        }
        Ok(())
    }
}
