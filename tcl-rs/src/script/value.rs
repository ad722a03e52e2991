//! Runtime value type for the scripting language.
//!
//! Every value is a string at heart.  A [`Value`] remembers the form it was
//! created in (text, list, integer, real or boolean) and lazily caches the
//! other interpretations the first time they are asked for, so
//! `llength $big` does not re-split a list that was built with `list`, and
//! `incr i` does not re-parse an integer that came out of `expr`.
//!
//! Values are immutable and cheaply cloned (`Rc`).  Mutating list commands
//! use [`Value::into_list`], which steals the cached element vector when the
//! caller holds the only reference.

use std::cell::OnceCell;
use std::fmt;
use std::rc::Rc;

use super::error::{TclResult, TclError};
use super::parser;

/// Which interpretation a value was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kind {
    #[default]
    Text,
    List,
    Integer,
    Real,
    Boolean,
}

#[derive(Default)]
struct Inner {
    kind: Kind,
    text: OnceCell<String>,
    list: OnceCell<Vec<Value>>,
    int: OnceCell<i64>,
    real: OnceCell<f64>,
    boolean: OnceCell<bool>,
}

/// A script runtime value.
#[derive(Clone, Default)]
pub struct Value {
    inner: Rc<Inner>,
}

// ── Construction ──────────────────────────────────────────────────────────────

impl Value {
    fn with_kind(kind: Kind) -> Inner {
        Inner { kind, ..Inner::default() }
    }

    pub fn empty() -> Self {
        Value::default()
    }

    pub fn from_list(items: Vec<Value>) -> Self {
        let inner = Value::with_kind(Kind::List);
        let _ = inner.list.set(items);
        Value { inner: Rc::new(inner) }
    }

    /// Convenience for building a list out of anything string-like.
    pub fn list_of<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Value>,
    {
        Value::from_list(items.into_iter().map(Into::into).collect())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        let inner = Inner::default();
        let _ = inner.text.set(s);
        Value { inner: Rc::new(inner) }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::from(s.to_owned())
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::from(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        let inner = Value::with_kind(Kind::Integer);
        let _ = inner.int.set(n);
        Value { inner: Rc::new(inner) }
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::from(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::from(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        let inner = Value::with_kind(Kind::Real);
        let _ = inner.real.set(x);
        Value { inner: Rc::new(inner) }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        let inner = Value::with_kind(Kind::Boolean);
        let _ = inner.boolean.set(b);
        Value { inner: Rc::new(inner) }
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::from_list(items)
    }
}

// ── Interpretations ───────────────────────────────────────────────────────────

impl Value {
    /// The cheapest interpretation currently known.
    ///
    /// A text value whose integer form has been demanded reports `Integer`;
    /// otherwise the creation kind is reported.
    pub fn kind(&self) -> Kind {
        let inner = &self.inner;
        if inner.kind != Kind::Text {
            return inner.kind;
        }
        if inner.int.get().is_some() {
            Kind::Integer
        } else if inner.real.get().is_some() {
            Kind::Real
        } else if inner.list.get().is_some() {
            Kind::List
        } else {
            Kind::Text
        }
    }

    /// The string form.  Non-text values render on first use.
    pub fn as_text(&self) -> &str {
        self.inner.text.get_or_init(|| self.render())
    }

    fn render(&self) -> String {
        let inner = &self.inner;
        match inner.kind {
            Kind::Integer => inner.int.get().map(i64::to_string).unwrap_or_default(),
            Kind::Real => inner.real.get().map(|x| format_real(*x)).unwrap_or_default(),
            Kind::Boolean => {
                let b = inner.boolean.get().copied().unwrap_or(false);
                if b { "1" } else { "0" }.to_owned()
            }
            Kind::List => inner.list.get().map(|l| render_list(l)).unwrap_or_default(),
            Kind::Text => String::new(),
        }
    }

    /// The list form, parsing the text on first use.
    pub fn as_list(&self) -> TclResult<&[Value]> {
        if let Some(items) = self.inner.list.get() {
            return Ok(items);
        }
        let items = match self.inner.kind {
            Kind::Integer | Kind::Real | Kind::Boolean => vec![Value::from(self.as_text())],
            Kind::Text | Kind::List => parser::parse_list(strip_outer_braces(self.as_text()))?,
        };
        Ok(self.inner.list.get_or_init(|| items))
    }

    /// Take the element vector, copying only if the value is shared.
    pub fn into_list(self) -> TclResult<Vec<Value>> {
        self.as_list()?;
        match Rc::try_unwrap(self.inner) {
            Ok(inner) => Ok(inner.list.into_inner().unwrap_or_default()),
            Err(shared) => Ok(Value { inner: shared }.as_list()?.to_vec()),
        }
    }

    pub fn as_int(&self) -> TclResult<i64> {
        if let Some(n) = self.inner.int.get() {
            return Ok(*n);
        }
        let n = match self.inner.kind {
            Kind::Boolean => i64::from(self.inner.boolean.get().copied().unwrap_or(false)),
            _ => parse_int(self.as_text()).ok_or_else(|| TclError::not_integer(self.as_text()))?,
        };
        Ok(*self.inner.int.get_or_init(|| n))
    }

    pub fn as_real(&self) -> TclResult<f64> {
        if let Some(x) = self.inner.real.get() {
            return Ok(*x);
        }
        let x = match self.inner.kind {
            Kind::Integer | Kind::Boolean => self.as_int()? as f64,
            _ => parse_real(self.as_text()).ok_or_else(|| TclError::not_real(self.as_text()))?,
        };
        Ok(*self.inner.real.get_or_init(|| x))
    }

    /// Truthiness: a number is true when non-zero; otherwise one of the
    /// words `yes`/`true`/`on` or `no`/`false`/`off` (any case).
    pub fn as_bool(&self) -> TclResult<bool> {
        if let Some(b) = self.inner.boolean.get() {
            return Ok(*b);
        }
        let b = if self.inner.kind == Kind::Real {
            self.as_real()? != 0.0
        } else if let Ok(n) = self.as_int() {
            n != 0
        } else if let Some(x) = parse_real(self.as_text()) {
            x != 0.0
        } else {
            parse_bool_word(self.as_text())
                .ok_or_else(|| TclError::NotABoolean(self.as_text().to_owned()))?
        };
        Ok(*self.inner.boolean.get_or_init(|| b))
    }

    pub fn is_empty(&self) -> bool {
        self.as_text().is_empty()
    }

    /// True when the value reads as an integer or real number.
    pub fn is_numeric(&self) -> bool {
        matches!(self.inner.kind, Kind::Integer | Kind::Real)
            || self.as_int().is_ok()
            || self.as_real().is_ok()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner) || self.as_text() == other.as_text()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({:?}, {:?})", self.kind(), self.as_text())
    }
}

// ── Scalar parsing ────────────────────────────────────────────────────────────

/// Parse an integer: optional sign, then `0x` hex, leading-zero octal, or
/// decimal.  Surrounding whitespace is ignored.  Overflow is not a number.
pub fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim();
    let (negative, digits) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    if digits.is_empty() {
        return None;
    }
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(hex, 16).ok()?
    } else if digits.starts_with('0') {
        if !digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) {
            return None;
        }
        u64::from_str_radix(digits, 8).ok()?
    } else {
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u64>().ok()?
    };
    if negative {
        if magnitude == i64::MIN.unsigned_abs() {
            Some(i64::MIN)
        } else {
            i64::try_from(magnitude).ok().map(|n| -n)
        }
    } else {
        i64::try_from(magnitude).ok()
    }
}

/// `[+-]? (digits [. digits?] | . digits) ([eE] [+-]? digits)?`
fn is_real_literal(t: &str) -> bool {
    let b = t.as_bytes();
    let mut i = 0;
    if matches!(b.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    let start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - start;
    if i < b.len() && b[i] == b'.' {
        i += 1;
        let frac = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        digits += i - frac;
    }
    if digits == 0 {
        return false;
    }
    if i < b.len() && matches!(b[i], b'e' | b'E') {
        i += 1;
        if i < b.len() && matches!(b[i], b'+' | b'-') {
            i += 1;
        }
        let exp = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp {
            return false;
        }
    }
    i == b.len()
}

/// Parse a real number (decimal point and/or exponent optional).  Integers
/// in hex or octal notation are accepted too.
pub fn parse_real(s: &str) -> Option<f64> {
    let t = s.trim();
    if is_real_literal(t) {
        return t.parse().ok();
    }
    parse_int(t).map(|n| n as f64)
}

fn parse_bool_word(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" => Some(true),
        "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

/// Render a real: whole numbers keep one decimal place; very large or very
/// small magnitudes use an exponent.
pub fn format_real(x: f64) -> String {
    if x.is_nan() {
        return "NaN".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "Inf" } else { "-Inf" }.to_owned();
    }
    let abs = x.abs();
    if x.fract() == 0.0 && abs < 1e15 {
        return format!("{x:.1}");
    }
    if abs >= 1e15 || (abs != 0.0 && abs < 1e-4) {
        return tcl_exponent(&format!("{x:e}"));
    }
    format!("{x}")
}

/// `1.5e20` → `1.5e+20`, `1e-7` → `1e-07`.
pub(crate) fn tcl_exponent(s: &str) -> String {
    match s.split_once(['e', 'E']) {
        Some((mantissa, exp)) => {
            let marker = if s.contains('E') { 'E' } else { 'e' };
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp.trim_start_matches('+')),
            };
            format!("{mantissa}{marker}{sign}{digits:0>2}")
        }
        None => s.to_owned(),
    }
}

// ── List rendering ────────────────────────────────────────────────────────────

/// True when `s` is exactly one brace group: `{` … matching `}` at the end.
pub fn is_brace_wrapped(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'{' || bytes[bytes.len() - 1] != b'}' {
        return false;
    }
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth = match depth.checked_sub(1) {
                    Some(d) => d,
                    None => return false,
                };
                if depth == 0 && i != bytes.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
        i += 1;
    }
    depth == 0
}

/// A whole-string brace group is one list element written with its quoting;
/// drop that single layer before splitting.
fn strip_outer_braces(s: &str) -> &str {
    let t = s.trim_matches(|c: char| c.is_ascii_whitespace());
    if is_brace_wrapped(t) {
        &t[1..t.len() - 1]
    } else {
        s
    }
}

fn needs_quoting(s: &str) -> bool {
    s.starts_with('#')
        || s.chars().any(|c| {
            c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | '"' | '$' | '\\' | ';')
        })
}

fn braces_balanced(s: &str) -> bool {
    let mut depth = 0i64;
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && !escaped
}

/// Quote one element so that it survives re-parsing as a single element.
pub fn quote_element(s: &str) -> String {
    if s.is_empty() {
        return "{}".to_owned();
    }
    if !needs_quoting(s) || is_brace_wrapped(s) {
        return s.to_owned();
    }
    if braces_balanced(s) {
        return format!("{{{s}}}");
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '{' | '}' | '[' | ']' | '"' | '$' | '\\' | ';' | ' ' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Join elements with single spaces, quoting where needed.
pub fn render_list(items: &[Value]) -> String {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&quote_element(item.as_text()));
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(v: &Value) -> Vec<String> {
        v.as_list().unwrap().iter().map(|e| e.as_text().to_owned()).collect()
    }

    #[test]
    fn text_round_trip() {
        let v = Value::from("hello world");
        assert_eq!(v.as_text(), "hello world");
        assert_eq!(v.kind(), Kind::Text);
    }

    #[test]
    fn integer_forms() {
        assert_eq!(Value::from("42").as_int().unwrap(), 42);
        assert_eq!(Value::from(" -7 ").as_int().unwrap(), -7);
        assert_eq!(Value::from("0x1F").as_int().unwrap(), 31);
        assert_eq!(Value::from("017").as_int().unwrap(), 15);
        assert_eq!(Value::from("0").as_int().unwrap(), 0);
        assert!(Value::from("08").as_int().is_err());
        assert!(Value::from("1.5").as_int().is_err());
        assert!(Value::from("abc").as_int().is_err());
        assert!(Value::from("99999999999999999999").as_int().is_err());
    }

    #[test]
    fn integer_cache_changes_kind() {
        let v = Value::from("12");
        assert_eq!(v.kind(), Kind::Text);
        v.as_int().unwrap();
        assert_eq!(v.kind(), Kind::Integer);
    }

    #[test]
    fn real_forms() {
        assert_eq!(Value::from("1.5").as_real().unwrap(), 1.5);
        assert_eq!(Value::from(".5").as_real().unwrap(), 0.5);
        assert_eq!(Value::from("2e3").as_real().unwrap(), 2000.0);
        assert_eq!(Value::from("3").as_real().unwrap(), 3.0);
        assert!(Value::from("1.2.3").as_real().is_err());
    }

    #[test]
    fn real_display() {
        assert_eq!(Value::from(2.0).as_text(), "2.0");
        assert_eq!(Value::from(0.25).as_text(), "0.25");
        assert_eq!(Value::from(1e20).as_text(), "1e+20");
        assert_eq!(Value::from(1.5e-7).as_text(), "1.5e-07");
    }

    #[test]
    fn booleans() {
        assert!(Value::from("yes").as_bool().unwrap());
        assert!(Value::from("TRUE").as_bool().unwrap());
        assert!(!Value::from("off").as_bool().unwrap());
        assert!(Value::from("5").as_bool().unwrap());
        assert!(!Value::from("0").as_bool().unwrap());
        assert!(Value::from(0.5).as_bool().unwrap());
        assert!(matches!(Value::from("maybe").as_bool(), Err(TclError::NotABoolean(_))));
        assert_eq!(Value::from(true).as_text(), "1");
    }

    #[test]
    fn list_parse_simple() {
        let v = Value::from("a b  c");
        assert_eq!(texts(&v), vec!["a", "b", "c"]);
    }

    #[test]
    fn list_parse_nested_braces() {
        let v = Value::from("a {b c} {}");
        assert_eq!(texts(&v), vec!["a", "b c", ""]);
    }

    #[test]
    fn list_outer_brace_group_is_one_layer() {
        let v = Value::from("{a b}");
        assert_eq!(texts(&v), vec!["a", "b"]);
        assert!(Value::from("").as_list().unwrap().is_empty());
    }

    #[test]
    fn list_render_quotes_elements() {
        let v = Value::list_of(["a", "b c", "", "x{y"]);
        assert_eq!(v.as_text(), "a {b c} {} x\\{y");
    }

    #[test]
    fn list_render_keeps_brace_group() {
        assert_eq!(quote_element("{a b}"), "{a b}");
        assert_eq!(quote_element("#x"), "{#x}");
    }

    #[test]
    fn into_list_reuses_unique_storage() {
        let v = Value::list_of(["a", "b"]);
        let mut items = v.into_list().unwrap();
        items.push(Value::from("c"));
        assert_eq!(Value::from_list(items).as_text(), "a b c");
    }

    #[test]
    fn into_list_copies_shared_storage() {
        let v = Value::list_of(["a"]);
        let keep = v.clone();
        let mut items = v.into_list().unwrap();
        items.push(Value::from("b"));
        assert_eq!(keep.as_text(), "a");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn scalar_as_list_is_single_element() {
        assert_eq!(texts(&Value::from(42i64)), vec!["42"]);
    }

    #[test]
    fn brace_wrapped_detection() {
        assert!(is_brace_wrapped("{a}"));
        assert!(is_brace_wrapped("{a {b} c}"));
        assert!(!is_brace_wrapped("{a} {b}"));
        assert!(!is_brace_wrapped("{a"));
    }
}
