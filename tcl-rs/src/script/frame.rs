//! Variable scopes: the call-frame stack.
//!
//! Frame 0 holds the globals.  Each procedure call pushes a frame; the
//! *current level* is an index into the stack and normally points at the
//! top, but `uplevel` may temporarily point it lower.  Variable reads and
//! writes go to the current level, unless the name carries a `::` prefix,
//! which always addresses frame 0.

use std::collections::HashMap;

use super::error::{TclError, TclResult};
use super::value::Value;

#[derive(Default)]
struct Frame {
    vars: HashMap<String, Value>,
    /// Invocation literal of the procedure call that created the frame.
    call: String,
}

pub struct Scope {
    frames: Vec<Frame>,
    level: usize,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

/// `::name` → (true, "name"); anything else → (false, name).
fn split_global(name: &str) -> (bool, &str) {
    match name.strip_prefix("::") {
        Some(rest) => (true, rest),
        None => (false, name),
    }
}

/// `env(NAME)` → `Some("NAME")`.
fn env_key(name: &str) -> Option<&str> {
    name.strip_prefix("env(")?.strip_suffix(')')
}

impl Scope {
    pub fn new() -> Self {
        Scope { frames: vec![Frame::default()], level: 0 }
    }

    /// Index of the frame variable access currently targets.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Index of the innermost frame.
    pub fn top(&self) -> usize {
        self.frames.len() - 1
    }

    /// Push a frame for a procedure call and make it current.  Returns the
    /// level to restore with [`pop`](Self::pop).
    pub fn push(&mut self, call: String) -> usize {
        let saved = self.level;
        self.frames.push(Frame { vars: HashMap::new(), call });
        self.level = self.top();
        saved
    }

    /// Drop the innermost frame (never the global one) and restore `level`.
    pub fn pop(&mut self, level: usize) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
        self.level = level.min(self.top());
    }

    /// Point variable access at `level`; returns the previous level.
    pub fn set_level(&mut self, level: usize) -> usize {
        let level = level.min(self.top());
        std::mem::replace(&mut self.level, level)
    }

    /// Invocation literal recorded for the frame at `level` (empty for the
    /// global frame).
    pub fn call_at(&self, level: usize) -> Option<&str> {
        self.frames.get(level).map(|f| f.call.as_str())
    }

    fn frame_for(&self, name: &str) -> (usize, String) {
        let (global, bare) = split_global(name);
        let index = if global { 0 } else { self.level };
        (index, bare.to_owned())
    }

    pub fn get(&self, name: &str) -> TclResult<Value> {
        let (global, bare) = split_global(name);
        if let Some(key) = env_key(bare) {
            return std::env::var(key)
                .map(Value::from)
                .map_err(|_| TclError::NoSuchVariable(name.to_owned()));
        }
        let frame = if global { 0 } else { self.level };
        self.frames[frame]
            .vars
            .get(bare)
            .cloned()
            .ok_or_else(|| TclError::NoSuchVariable(name.to_owned()))
    }

    pub fn set(&mut self, name: &str, value: Value) -> Value {
        let (index, bare) = self.frame_for(name);
        if let Some(key) = env_key(&bare) {
            std::env::set_var(key, value.as_text());
            return value;
        }
        self.frames[index].vars.insert(bare, value.clone());
        value
    }

    /// Remove a variable and hand back its value.  Used by commands that
    /// rebuild a variable in place, so the value is not shared while they
    /// work on it.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let (global, bare) = split_global(name);
        if env_key(bare).is_some() {
            return self.get(name).ok();
        }
        let frame = if global { 0 } else { self.level };
        self.frames[frame].vars.remove(bare)
    }

    pub fn unset(&mut self, name: &str) -> TclResult<()> {
        let (global, bare) = split_global(name);
        if let Some(key) = env_key(bare) {
            std::env::remove_var(key);
            return Ok(());
        }
        let frame = if global { 0 } else { self.level };
        match self.frames[frame].vars.remove(bare) {
            Some(_) => Ok(()),
            None => Err(TclError::msg(format!(
                "can't unset \"{name}\": no such variable"
            ))),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Sorted names of the variables at the current level (or the globals).
    pub fn names(&self, global: bool) -> Vec<String> {
        let frame = if global { 0 } else { self.level };
        let mut names: Vec<String> = self.frames[frame].vars.keys().cloned().collect();
        names.sort();
        names
    }
}
