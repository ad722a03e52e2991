//! List, dictionary and string commands, plus `format`, `regexp` and
//! `regsub`.
//!
//! Lists are values whose list form is materialized on demand; commands
//! that rebuild a variable (`lappend`) take it out of its frame first so
//! the element vector is reused rather than copied.  Dictionaries are
//! lists of alternating keys and values.

use std::cmp::Ordering;

use regex::Captures;

use super::error::{check_arity, TclError, TclResult};
use super::interp::Interpreter;
use super::value::{parse_int, tcl_exponent, Value};
use crate::pattern::{compile_regex, glob_match, replace_all, MatchMode, Pattern};

type Handler = fn(&mut Interpreter, &[Value]) -> TclResult;

const COMMANDS: &[(&str, Handler)] = &[
    ("concat", cmd_concat),
    ("format", cmd_format),
    ("join", cmd_join),
    ("lappend", cmd_lappend),
    ("lindex", cmd_lindex),
    ("list", cmd_list),
    ("llength", cmd_llength),
    ("lrange", cmd_lrange),
    ("lreverse", cmd_lreverse),
    ("lsearch", cmd_lsearch),
    ("lset", cmd_lset),
    ("lsort", cmd_lsort),
    ("regexp", cmd_regexp),
    ("regsub", cmd_regsub),
    ("split", cmd_split),
];

const NESTED: &[(&str, Handler)] = &[
    ("dict create", dict_create),
    ("dict exists", dict_exists),
    ("dict get", dict_get),
    ("dict keys", dict_keys),
    ("dict set", dict_set),
    ("dict size", dict_size),
    ("dict unset", dict_unset),
    ("dict values", dict_values),
    ("string compare", string_compare),
    ("string equal", string_equal),
    ("string first", string_first),
    ("string index", string_index),
    ("string last", string_last),
    ("string length", string_length),
    ("string map", string_map),
    ("string match", string_match),
    ("string range", string_range),
    ("string repeat", string_repeat),
    ("string reverse", string_reverse),
    ("string tolower", string_tolower),
    ("string toupper", string_toupper),
    ("string trim", string_trim),
    ("string trimleft", string_trimleft),
    ("string trimright", string_trimright),
];

pub fn register(interp: &mut Interpreter) -> TclResult<()> {
    for &(name, f) in COMMANDS {
        interp.register(name, f);
    }
    for &(path, f) in NESTED {
        interp.register_nested(path, f)?;
    }
    Ok(())
}

// ── Shared helpers ────────────────────────────────────────────────────────────

/// Join words the way `concat` does: trim each, drop empty ones, separate
/// with single spaces.
pub(crate) fn concat_words(words: &[Value]) -> String {
    words
        .iter()
        .map(|w| w.as_text().trim())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve an index (`N`, `end`, `end-N`, `end+N`, `N+M`, `N-M`) against a
/// sequence of `len` items.  The result may lie outside `0..len`.
pub(crate) fn resolve_index(text: &str, len: usize) -> TclResult<i64> {
    let bad = || TclError::BadIndex(text.to_owned());
    let t = text.trim();
    let end = len as i64 - 1;
    if let Some(rest) = t.strip_prefix("end") {
        if rest.is_empty() {
            return Ok(end);
        }
        if let Some(n) = rest.strip_prefix('-') {
            return parse_int(n).and_then(|n| end.checked_sub(n)).ok_or_else(bad);
        }
        if let Some(n) = rest.strip_prefix('+') {
            return parse_int(n).and_then(|n| end.checked_add(n)).ok_or_else(bad);
        }
        return Err(bad());
    }
    if let Some(n) = parse_int(t) {
        return Ok(n);
    }
    let op = t
        .char_indices()
        .skip(1)
        .find(|&(_, c)| c == '+' || c == '-')
        .map(|(i, _)| i)
        .ok_or_else(bad)?;
    let (a, b) = (parse_int(&t[..op]), parse_int(&t[op + 1..]));
    let sum = match (a, b, &t[op..op + 1]) {
        (Some(a), Some(b), "+") => a.checked_add(b),
        (Some(a), Some(b), _) => a.checked_sub(b),
        _ => None,
    };
    sum.ok_or_else(bad)
}

/// An index that must land inside `0..len`.
fn index_within(text: &str, len: usize) -> TclResult<Option<usize>> {
    let i = resolve_index(text, len)?;
    Ok(usize::try_from(i).ok().filter(|&i| i < len))
}

/// Clamp a `first`/`last` pair to `0..len`; `None` when the range is empty.
fn clamp_range(first: &str, last: &str, len: usize) -> TclResult<Option<(usize, usize)>> {
    let first = resolve_index(first, len)?.max(0);
    let last = resolve_index(last, len)?.min(len as i64 - 1);
    if first > last {
        return Ok(None);
    }
    Ok(Some((first as usize, last as usize)))
}

// ── Lists ─────────────────────────────────────────────────────────────────────

fn cmd_list(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    Ok(Value::from_list(args[1..].to_vec()))
}

fn cmd_llength(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "list")?;
    Ok(Value::from(args[1].as_list()?.len()))
}

fn cmd_concat(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    Ok(Value::from(concat_words(&args[1..])))
}

fn cmd_lindex(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "list ?index ...?")?;
    let mut indices = Vec::new();
    for arg in &args[2..] {
        indices.extend(arg.as_list()?.iter().cloned());
    }
    let mut current = args[1].clone();
    for index in &indices {
        let items = current.as_list()?;
        let next = match index_within(index.as_text(), items.len())? {
            Some(i) => items[i].clone(),
            None => return Ok(Value::empty()),
        };
        current = next;
    }
    Ok(current)
}

fn cmd_lrange(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 4, 4, "list first last")?;
    let items = args[1].as_list()?;
    match clamp_range(args[2].as_text(), args[3].as_text(), items.len())? {
        Some((first, last)) => Ok(Value::from_list(items[first..=last].to_vec())),
        None => Ok(Value::empty()),
    }
}

fn cmd_lreverse(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "list")?;
    let mut items = args[1].clone().into_list()?;
    items.reverse();
    Ok(Value::from_list(items))
}

fn cmd_lappend(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "varName ?value ...?")?;
    let name = args[1].as_text();
    let current = interp.take_var(name).unwrap_or_default();
    if let Err(e) = current.as_list().map(|_| ()) {
        interp.set_var(name, current);
        return Err(e);
    }
    let mut items = current.into_list()?;
    items.extend(args[2..].iter().cloned());
    Ok(interp.set_var(name, Value::from_list(items)))
}

fn replace_nested(list: Value, indices: &[Value], new: Value) -> TclResult {
    let Some((first, rest)) = indices.split_first() else {
        return Ok(new);
    };
    let mut items = list.into_list()?;
    let slot = index_within(first.as_text(), items.len())?.ok_or(TclError::IndexOutOfBounds)?;
    let inner = std::mem::take(&mut items[slot]);
    items[slot] = replace_nested(inner, rest, new)?;
    Ok(Value::from_list(items))
}

fn cmd_lset(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, usize::MAX, "varName ?index ...? value")?;
    let name = args[1].as_text();
    let new = args[args.len() - 1].clone();
    let mut indices = Vec::new();
    for arg in &args[2..args.len() - 1] {
        indices.extend(arg.as_list()?.iter().cloned());
    }
    let current = interp.get_var(name)?;
    let updated = replace_nested(current, &indices, new)?;
    Ok(interp.set_var(name, updated))
}

fn cmd_lsearch(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let usage = "?-exact|-glob|-regexp? ?-nocase? ?-all? ?-inline? list pattern";
    check_arity(args, 3, usize::MAX, usage)?;
    let (mut mode, mut nocase, mut all, mut inline) = (MatchMode::Glob, false, false, false);
    for opt in &args[1..args.len() - 2] {
        match opt.as_text() {
            "-exact" => mode = MatchMode::Exact,
            "-glob" => mode = MatchMode::Glob,
            "-regexp" => mode = MatchMode::Regexp,
            "-nocase" => nocase = true,
            "-all" => all = true,
            "-inline" => inline = true,
            other => {
                return Err(TclError::msg(format!(
                    "bad option \"{other}\": must be -all, -exact, -glob, -inline, -nocase, or -regexp"
                )))
            }
        }
    }
    let items = args[args.len() - 2].as_list()?;
    let pattern = Pattern::new(args[args.len() - 1].as_text(), mode, nocase)?;
    let mut hits = items
        .iter()
        .enumerate()
        .filter(|(_, item)| pattern.matches(item.as_text()));
    let pick = |(i, item): (usize, &Value)| if inline { item.clone() } else { Value::from(i) };
    if all {
        return Ok(Value::from_list(hits.map(pick).collect()));
    }
    match hits.next() {
        Some(hit) => Ok(pick(hit)),
        None if inline => Ok(Value::empty()),
        None => Ok(Value::from(-1i64)),
    }
}

#[derive(Clone, Copy, PartialEq)]
enum SortKind {
    Ascii,
    Integer,
    Real,
}

fn cmd_lsort(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let usage = "?-ascii|-integer|-real? ?-increasing|-decreasing? ?-nocase? ?-unique? list";
    check_arity(args, 2, usize::MAX, usage)?;
    let (mut kind, mut decreasing, mut nocase, mut unique) = (SortKind::Ascii, false, false, false);
    for opt in &args[1..args.len() - 1] {
        match opt.as_text() {
            "-ascii" => kind = SortKind::Ascii,
            "-integer" => kind = SortKind::Integer,
            "-real" => kind = SortKind::Real,
            "-increasing" => decreasing = false,
            "-decreasing" => decreasing = true,
            "-nocase" => nocase = true,
            "-unique" => unique = true,
            other => {
                return Err(TclError::msg(format!(
                    "bad option \"{other}\": must be -ascii, -decreasing, -increasing, -integer, -nocase, -real, or -unique"
                )))
            }
        }
    }
    let items = args[args.len() - 1].as_list()?;
    // Convert up front so a bad element fails before any reordering.
    for item in items {
        match kind {
            SortKind::Integer => {
                item.as_int()?;
            }
            SortKind::Real => {
                item.as_real()?;
            }
            SortKind::Ascii => {}
        }
    }
    let compare = |a: &Value, b: &Value| -> Ordering {
        match kind {
            SortKind::Integer => a.as_int().unwrap_or(0).cmp(&b.as_int().unwrap_or(0)),
            SortKind::Real => a
                .as_real()
                .unwrap_or(0.0)
                .total_cmp(&b.as_real().unwrap_or(0.0)),
            SortKind::Ascii if nocase => a
                .as_text()
                .to_lowercase()
                .cmp(&b.as_text().to_lowercase()),
            SortKind::Ascii => a.as_text().cmp(b.as_text()),
        }
    };
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| {
        let ord = compare(a, b);
        if decreasing {
            ord.reverse()
        } else {
            ord
        }
    });
    if unique {
        sorted.dedup_by(|a, b| compare(&*a, &*b) == Ordering::Equal);
    }
    Ok(Value::from_list(sorted))
}

fn cmd_join(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 3, "list ?joinString?")?;
    let sep = args.get(2).map(Value::as_text).unwrap_or(" ");
    let items = args[1].as_list()?;
    Ok(Value::from(
        items.iter().map(Value::as_text).collect::<Vec<_>>().join(sep),
    ))
}

fn cmd_split(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 3, "string ?splitChars?")?;
    let text = args[1].as_text();
    let seps = args.get(2).map(Value::as_text).unwrap_or(" \t\n\r");
    if text.is_empty() {
        return Ok(Value::empty());
    }
    if seps.is_empty() {
        return Ok(Value::list_of(text.chars().map(String::from)));
    }
    Ok(Value::list_of(text.split(|c| seps.contains(c))))
}

// ── Dictionaries ──────────────────────────────────────────────────────────────

/// Key/value pairs of a dictionary value; a repeated key keeps its first
/// position and its last value.
fn dict_entries(v: &Value) -> TclResult<Vec<(Value, Value)>> {
    let items = v.as_list()?;
    if items.len() % 2 != 0 {
        return Err(TclError::msg("missing value to go with key"));
    }
    let mut entries: Vec<(Value, Value)> = Vec::with_capacity(items.len() / 2);
    for pair in items.chunks(2) {
        match entries.iter_mut().find(|(k, _)| k == &pair[0]) {
            Some(slot) => slot.1 = pair[1].clone(),
            None => entries.push((pair[0].clone(), pair[1].clone())),
        }
    }
    Ok(entries)
}

fn dict_value(entries: Vec<(Value, Value)>) -> Value {
    Value::from_list(entries.into_iter().flat_map(|(k, v)| [k, v]).collect())
}

fn dict_lookup(dict: &Value, key: &Value) -> TclResult<Option<Value>> {
    Ok(dict_entries(dict)?
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v))
}

fn dict_create(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    if args.len() % 2 == 0 {
        return Err(TclError::WrongArity(format!("{} ?key value ...?", args[0])));
    }
    Ok(dict_value(dict_entries(&Value::from_list(args[1..].to_vec()))?))
}

fn dict_get(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "dictionary ?key ...?")?;
    let mut current = args[1].clone();
    for key in &args[2..] {
        current = dict_lookup(&current, key)?.ok_or_else(|| {
            TclError::msg(format!("key \"{key}\" not known in dictionary"))
        })?;
    }
    Ok(current)
}

fn dict_exists(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, usize::MAX, "dictionary key ?key ...?")?;
    let mut current = args[1].clone();
    for key in &args[2..] {
        match dict_lookup(&current, key) {
            Ok(Some(v)) => current = v,
            _ => return Ok(Value::from(false)),
        }
    }
    Ok(Value::from(true))
}

fn dict_keys(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 3, "dictionary ?pattern?")?;
    let pat = args.get(2).map(Value::as_text);
    Ok(Value::from_list(
        dict_entries(&args[1])?
            .into_iter()
            .map(|(k, _)| k)
            .filter(|k| pat.map_or(true, |p| glob_match(p, k.as_text(), false)))
            .collect(),
    ))
}

fn dict_values(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 3, "dictionary ?pattern?")?;
    let pat = args.get(2).map(Value::as_text);
    Ok(Value::from_list(
        dict_entries(&args[1])?
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| pat.map_or(true, |p| glob_match(p, v.as_text(), false)))
            .collect(),
    ))
}

fn dict_size(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "dictionary")?;
    Ok(Value::from(dict_entries(&args[1])?.len()))
}

fn dict_put(dict: &Value, path: &[Value], new: Value) -> TclResult {
    let Some((key, rest)) = path.split_first() else {
        return Ok(new);
    };
    let mut entries = dict_entries(dict)?;
    match entries.iter_mut().find(|(k, _)| k == key) {
        Some(slot) => slot.1 = dict_put(&slot.1, rest, new)?,
        None => {
            let inner = dict_put(&Value::empty(), rest, new)?;
            entries.push((key.clone(), inner));
        }
    }
    Ok(dict_value(entries))
}

fn dict_remove(dict: &Value, path: &[Value]) -> TclResult {
    let mut entries = dict_entries(dict)?;
    match path {
        [] => {}
        [key] => entries.retain(|(k, _)| k != key),
        [key, rest @ ..] => match entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = dict_remove(&slot.1, rest)?,
            None => return Err(TclError::msg(format!("key \"{key}\" not known in dictionary"))),
        },
    }
    Ok(dict_value(entries))
}

fn dict_set(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 4, usize::MAX, "dictVarName key ?key ...? value")?;
    let name = args[1].as_text();
    let current = interp.get_var(name).unwrap_or_default();
    let updated = dict_put(&current, &args[2..args.len() - 1], args[args.len() - 1].clone())?;
    Ok(interp.set_var(name, updated))
}

fn dict_unset(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, usize::MAX, "dictVarName key ?key ...?")?;
    let name = args[1].as_text();
    let current = interp.get_var(name).unwrap_or_default();
    let updated = dict_remove(&current, &args[2..])?;
    Ok(interp.set_var(name, updated))
}

// ── Strings ───────────────────────────────────────────────────────────────────

/// Leading `-nocase` / `-length N` options of `string compare|equal`.
fn compare_options(args: &[Value], usage: &str) -> TclResult<(String, String)> {
    check_arity(args, 3, 6, usage)?;
    let (mut nocase, mut length) = (false, None);
    let mut i = 1;
    while i < args.len() - 2 {
        match args[i].as_text() {
            "-nocase" => nocase = true,
            "-length" if i + 1 < args.len() - 2 => {
                i += 1;
                length = usize::try_from(args[i].as_int()?).ok();
            }
            other => {
                return Err(TclError::msg(format!(
                    "bad option \"{other}\": must be -nocase or -length"
                )))
            }
        }
        i += 1;
    }
    let prepare = |v: &Value| {
        let s: String = match length {
            Some(n) => v.as_text().chars().take(n).collect(),
            None => v.as_text().to_owned(),
        };
        if nocase {
            s.to_lowercase()
        } else {
            s
        }
    };
    Ok((prepare(&args[args.len() - 2]), prepare(&args[args.len() - 1])))
}

fn string_compare(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let (a, b) = compare_options(args, "?-nocase? ?-length int? string1 string2")?;
    Ok(Value::from(match a.cmp(&b) {
        Ordering::Less => -1i64,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

fn string_equal(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let (a, b) = compare_options(args, "?-nocase? ?-length int? string1 string2")?;
    Ok(Value::from(a == b))
}

fn string_length(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "string")?;
    Ok(Value::from(args[1].as_text().chars().count()))
}

fn string_index(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, 3, "string charIndex")?;
    let chars: Vec<char> = args[1].as_text().chars().collect();
    Ok(match index_within(args[2].as_text(), chars.len())? {
        Some(i) => Value::from(chars[i].to_string()),
        None => Value::empty(),
    })
}

fn string_range(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 4, 4, "string first last")?;
    let chars: Vec<char> = args[1].as_text().chars().collect();
    Ok(match clamp_range(args[2].as_text(), args[3].as_text(), chars.len())? {
        Some((first, last)) => Value::from(chars[first..=last].iter().collect::<String>()),
        None => Value::empty(),
    })
}

/// Character position of `needle` in `hay`, searching forwards from
/// `start` or backwards from `start` when `last` is set.
fn find_chars(hay: &[char], needle: &[char], start: i64, last: bool) -> i64 {
    if needle.is_empty() || needle.len() > hay.len() {
        return -1;
    }
    let max_start = (hay.len() - needle.len()) as i64;
    let at = |i: i64| hay[i as usize..i as usize + needle.len()] == *needle;
    if last {
        let mut i = start.min(max_start);
        while i >= 0 {
            if at(i) {
                return i;
            }
            i -= 1;
        }
    } else {
        let mut i = start.max(0);
        while i <= max_start {
            if at(i) {
                return i;
            }
            i += 1;
        }
    }
    -1
}

fn string_first(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, 4, "needleString haystackString ?startIndex?")?;
    let needle: Vec<char> = args[1].as_text().chars().collect();
    let hay: Vec<char> = args[2].as_text().chars().collect();
    let start = match args.get(3) {
        Some(i) => resolve_index(i.as_text(), hay.len())?,
        None => 0,
    };
    Ok(Value::from(find_chars(&hay, &needle, start, false)))
}

fn string_last(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, 4, "needleString haystackString ?lastIndex?")?;
    let needle: Vec<char> = args[1].as_text().chars().collect();
    let hay: Vec<char> = args[2].as_text().chars().collect();
    let start = match args.get(3) {
        Some(i) => resolve_index(i.as_text(), hay.len())?,
        None => hay.len() as i64,
    };
    Ok(Value::from(find_chars(&hay, &needle, start, true)))
}

fn string_map(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, 4, "?-nocase? charMap string")?;
    let nocase = match args {
        [_, flag, _, _] if flag.as_text() == "-nocase" => true,
        [_, flag, _, _] => {
            return Err(TclError::msg(format!(
                "bad option \"{flag}\": must be -nocase"
            )))
        }
        _ => false,
    };
    let mapping = args[args.len() - 2].as_list()?;
    if mapping.len() % 2 != 0 {
        return Err(TclError::msg("char map list unbalanced"));
    }
    let pairs: Vec<(String, String)> = mapping
        .chunks(2)
        .map(|p| (p[0].as_text().to_owned(), p[1].as_text().to_owned()))
        .collect();
    Ok(Value::from(replace_all(args[args.len() - 1].as_text(), &pairs, nocase)))
}

fn string_match(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, 4, "?-nocase? pattern string")?;
    let nocase = args.len() == 4 && args[1].as_text() == "-nocase";
    if args.len() == 4 && !nocase {
        return Err(TclError::msg(format!(
            "bad option \"{}\": must be -nocase",
            args[1]
        )));
    }
    let (pat, text) = (&args[args.len() - 2], &args[args.len() - 1]);
    Ok(Value::from(glob_match(pat.as_text(), text.as_text(), nocase)))
}

fn string_repeat(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 3, 3, "string count")?;
    let count = usize::try_from(args[2].as_int()?).unwrap_or(0);
    Ok(Value::from(args[1].as_text().repeat(count)))
}

fn string_reverse(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "string")?;
    Ok(Value::from(args[1].as_text().chars().rev().collect::<String>()))
}

fn string_tolower(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "string")?;
    Ok(Value::from(args[1].as_text().to_lowercase()))
}

fn string_toupper(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "string")?;
    Ok(Value::from(args[1].as_text().to_uppercase()))
}

#[derive(Clone, Copy)]
enum Trim {
    Both,
    Left,
    Right,
}

fn trim_with(args: &[Value], side: Trim) -> TclResult {
    check_arity(args, 2, 3, "string ?chars?")?;
    let text = args[1].as_text();
    let set = args.get(2).map(Value::as_text).unwrap_or(" \t\n\r");
    let strip = |c: char| set.contains(c);
    Ok(Value::from(match side {
        Trim::Both => text.trim_matches(strip),
        Trim::Left => text.trim_start_matches(strip),
        Trim::Right => text.trim_end_matches(strip),
    }))
}

fn string_trim(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    trim_with(args, Trim::Both)
}

fn string_trimleft(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    trim_with(args, Trim::Left)
}

fn string_trimright(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    trim_with(args, Trim::Right)
}

// ── format ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Spec {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
    width: usize,
    precision: Option<usize>,
}

impl Spec {
    /// Pad `body` (digits only) after attaching `sign`/`prefix`.
    fn pad(&self, sign: &str, prefix: &str, body: &str) -> String {
        let used = sign.len() + prefix.len() + body.chars().count();
        let fill = self.width.saturating_sub(used);
        if self.left {
            format!("{sign}{prefix}{body}{}", " ".repeat(fill))
        } else if self.zero {
            format!("{sign}{prefix}{}{body}", "0".repeat(fill))
        } else {
            format!("{}{sign}{prefix}{body}", " ".repeat(fill))
        }
    }

    fn sign(&self, negative: bool) -> &'static str {
        if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        }
    }
}

/// C-style `%e`: mantissa with `prec` decimals, exponent with a sign and at
/// least two digits.
fn c_exp(x: f64, prec: usize, upper: bool) -> String {
    let s = tcl_exponent(&format!("{x:.prec$e}"));
    if upper {
        s.to_uppercase()
    } else {
        s
    }
}

/// C-style `%g`.
fn c_general(x: f64, prec: usize, alt: bool, upper: bool) -> String {
    let p = prec.max(1);
    let probe = format!("{:.*e}", p - 1, x);
    let exp: i64 = probe
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    let mut s = if exp < -4 || exp >= p as i64 {
        c_exp(x, p - 1, upper)
    } else {
        format!("{:.*}", (p as i64 - 1 - exp).max(0) as usize, x)
    };
    if !alt {
        let (mantissa, exponent) = match s.find(['e', 'E']) {
            Some(i) => s.split_at(i),
            None => (s.as_str(), ""),
        };
        if mantissa.contains('.') {
            let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
            s = format!("{trimmed}{exponent}");
        }
    }
    s
}

fn format_one(spec: &Spec, conv: char, arg: &Value) -> TclResult<String> {
    Ok(match conv {
        'd' | 'i' => {
            let n = arg.as_int()?;
            let digits = n.unsigned_abs().to_string();
            spec.pad(spec.sign(n < 0), "", &digits)
        }
        'u' => spec.pad("", "", &(arg.as_int()? as u64).to_string()),
        'x' | 'X' | 'o' => {
            let n = arg.as_int()? as u64;
            let (body, prefix) = match conv {
                'x' => (format!("{n:x}"), "0x"),
                'X' => (format!("{n:X}"), "0X"),
                _ => (format!("{n:o}"), "0"),
            };
            let prefix = if spec.alt && n != 0 { prefix } else { "" };
            spec.pad("", prefix, &body)
        }
        'c' => {
            let code = u32::try_from(arg.as_int()?).ok().and_then(char::from_u32);
            let c = code.ok_or_else(|| TclError::msg(format!("bad character code \"{arg}\"")))?;
            Spec { zero: false, ..*spec }.pad("", "", &c.to_string())
        }
        's' => {
            let text = arg.as_text();
            let body: String = match spec.precision {
                Some(p) => text.chars().take(p).collect(),
                None => text.to_owned(),
            };
            Spec { zero: false, ..*spec }.pad("", "", &body)
        }
        'f' | 'e' | 'E' | 'g' | 'G' => {
            let x = arg.as_real()?;
            let prec = spec.precision.unwrap_or(6);
            let body = match conv {
                'f' => format!("{:.prec$}", x.abs()),
                'e' | 'E' => c_exp(x.abs(), prec, conv == 'E'),
                _ => c_general(x.abs(), prec, spec.alt, conv == 'G'),
            };
            let negative = x.is_sign_negative() && x != 0.0;
            spec.pad(spec.sign(negative), "", &body)
        }
        other => {
            return Err(TclError::msg(format!(
                "bad field specifier \"{other}\""
            )))
        }
    })
}

fn cmd_format(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "formatString ?arg ...?")?;
    let fmt: Vec<char> = args[1].as_text().chars().collect();
    let mut values = args[2..].iter();
    let mut next_arg = || {
        values
            .next()
            .ok_or_else(|| TclError::msg("not enough arguments for all format specifiers"))
    };
    let mut out = String::with_capacity(fmt.len());
    let mut i = 0;
    while i < fmt.len() {
        let c = fmt[i];
        i += 1;
        if c != '%' {
            out.push(c);
            continue;
        }
        if fmt.get(i) == Some(&'%') {
            out.push('%');
            i += 1;
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&f) = fmt.get(i) {
            match f {
                '-' => spec.left = true,
                '0' => spec.zero = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '#' => spec.alt = true,
                _ => break,
            }
            i += 1;
        }
        if fmt.get(i) == Some(&'*') {
            spec.width = usize::try_from(next_arg()?.as_int()?).unwrap_or(0);
            i += 1;
        } else {
            while let Some(d) = fmt.get(i).and_then(|c| c.to_digit(10)) {
                spec.width = spec.width * 10 + d as usize;
                i += 1;
            }
        }
        if fmt.get(i) == Some(&'.') {
            i += 1;
            let mut p = 0usize;
            if fmt.get(i) == Some(&'*') {
                p = usize::try_from(next_arg()?.as_int()?).unwrap_or(0);
                i += 1;
            } else {
                while let Some(d) = fmt.get(i).and_then(|c| c.to_digit(10)) {
                    p = p * 10 + d as usize;
                    i += 1;
                }
            }
            spec.precision = Some(p);
        }
        while matches!(fmt.get(i), Some('l' | 'h')) {
            i += 1;
        }
        let Some(&conv) = fmt.get(i) else {
            return Err(TclError::msg("format string ended in middle of field specifier"));
        };
        i += 1;
        out.push_str(&format_one(&spec, conv, next_arg()?)?);
    }
    Ok(Value::from(out))
}

// ── Regular expressions ───────────────────────────────────────────────────────

fn cmd_regexp(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let usage = "?-nocase? ?--? exp string ?matchVar? ?subMatchVar ...?";
    check_arity(args, 3, usize::MAX, usage)?;
    let mut nocase = false;
    let mut i = 1;
    while i < args.len() && args[i].as_text().starts_with('-') {
        match args[i].as_text() {
            "-nocase" => nocase = true,
            "--" => {
                i += 1;
                break;
            }
            other => {
                return Err(TclError::msg(format!(
                    "bad switch \"{other}\": must be -nocase or --"
                )))
            }
        }
        i += 1;
    }
    let rest = &args[i..];
    if rest.len() < 2 {
        return Err(TclError::WrongArity(format!("{} {usage}", args[0])));
    }
    let re = compile_regex(rest[0].as_text(), nocase)?;
    let Some(caps) = re.captures(rest[1].as_text()) else {
        return Ok(Value::from(false));
    };
    for (n, var) in rest[2..].iter().enumerate() {
        let text = caps.get(n).map(|m| m.as_str()).unwrap_or_default();
        interp.set_var(var.as_text(), Value::from(text));
    }
    Ok(Value::from(true))
}

/// Expand a `regsub` substitution spec: `&` and `\0` are the whole match,
/// `\1`..`\9` the groups, `\&` and `\\` literal characters.
fn expand_subspec(spec: &str, caps: &Captures<'_>) -> String {
    let group = |n: usize| caps.get(n).map(|m| m.as_str()).unwrap_or_default();
    let mut out = String::with_capacity(spec.len());
    let mut chars = spec.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str(group(0)),
            '\\' => match chars.peek().copied() {
                Some(d @ '0'..='9') => {
                    chars.next();
                    out.push_str(group(d as usize - '0' as usize));
                }
                Some(e @ ('&' | '\\')) => {
                    chars.next();
                    out.push(e);
                }
                _ => out.push('\\'),
            },
            _ => out.push(c),
        }
    }
    out
}

fn cmd_regsub(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let usage = "?-all? ?-nocase? ?--? exp string subSpec ?varName?";
    check_arity(args, 4, usize::MAX, usage)?;
    let (mut all, mut nocase) = (false, false);
    let mut i = 1;
    while i < args.len() && args[i].as_text().starts_with('-') {
        match args[i].as_text() {
            "-all" => all = true,
            "-nocase" => nocase = true,
            "--" => {
                i += 1;
                break;
            }
            other => {
                return Err(TclError::msg(format!(
                    "bad switch \"{other}\": must be -all, -nocase, or --"
                )))
            }
        }
        i += 1;
    }
    let rest = &args[i..];
    if !(3..=4).contains(&rest.len()) {
        return Err(TclError::WrongArity(format!("{} {usage}", args[0])));
    }
    let re = compile_regex(rest[0].as_text(), nocase)?;
    let (text, spec) = (rest[1].as_text(), rest[2].as_text());
    let limit = if all { 0 } else { 1 };
    let count = match re.find_iter(text).count() {
        n if all => n,
        n => n.min(1),
    };
    let result = re
        .replacen(text, limit, |caps: &Captures<'_>| expand_subspec(spec, caps))
        .into_owned();
    match rest.get(3) {
        Some(var) => {
            interp.set_var(var.as_text(), Value::from(result));
            Ok(Value::from(count))
        }
        None => Ok(Value::from(result)),
    }
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
    fn index_forms() {
        assert_eq!(resolve_index("end", 5).unwrap(), 4);
        assert_eq!(resolve_index("end-1", 5).unwrap(), 3);
        assert_eq!(resolve_index("2", 5).unwrap(), 2);
        assert_eq!(resolve_index("1+2", 5).unwrap(), 3);
        assert_eq!(resolve_index("end+1", 5).unwrap(), 5);
        assert!(matches!(resolve_index("bogus", 5), Err(TclError::BadIndex(_))));
    }

    #[test]
    fn index_arithmetic_overflow_is_bad_index() {
        for text in [
            "9223372036854775807+1",
            "-9223372036854775807-2",
            "end+9223372036854775807",
            "end--9223372036854775808",
        ] {
            assert!(matches!(resolve_index(text, 3), Err(TclError::BadIndex(_))), "{text}");
        }
        assert_eq!(resolve_index("end-9223372036854775807", 0).unwrap(), i64::MIN);
    }

    #[test]
    fn list_construction_quotes_elements() {
        assert_eq!(run("list a {b c} {}"), "a {b c} {}");
        assert_eq!(run("llength [list a {b c} {}]"), "3");
        assert_eq!(run("concat {a b } { c} {}"), "a b c");
    }

    #[test]
    fn lindex_nested_and_out_of_range() {
        assert_eq!(run("lindex {a {b c} d} 1 0"), "b");
        assert_eq!(run("lindex {a {b c} d} {1 1}"), "c");
        assert_eq!(run("lindex {a b c} end"), "c");
        assert_eq!(run("lindex {a b c} 7"), "");
        assert_eq!(run("lindex {a b c}"), "a b c");
    }

    #[test]
    fn lrange_and_reverse() {
        assert_eq!(run("lrange {a b c d} 1 end-1"), "b c");
        assert_eq!(run("lrange {a b c d} 3 1"), "");
        assert_eq!(run("lrange {a b c d} -5 0"), "a");
        assert_eq!(run("lreverse {1 2 3}"), "3 2 1");
    }

    #[test]
    fn lappend_builds_in_place() {
        assert_eq!(run("lappend l a; lappend l {b c} d; set l"), "a {b c} d");
        assert_eq!(run("lappend l a b; llength $l"), "2");
    }

    #[test]
    fn lappend_keeps_variable_on_error() {
        let mut interp = Interpreter::new();
        interp.eval("set l \"a {b\"").unwrap();
        assert!(interp.eval("lappend l x").is_err());
        assert_eq!(interp.get_var("l").unwrap().as_text(), "a {b");
    }

    #[test]
    fn lset_nested() {
        assert_eq!(run("set l {a {b c} d}; lset l 1 0 X; set l"), "a {X c} d");
        assert_eq!(run("set l {a b}; lset l end Z"), "a Z");
        assert_eq!(run_err("set l {a b}; lset l 5 Z"), "list index out of range");
    }

    #[test]
    fn lsearch_modes() {
        assert_eq!(run("lsearch {apple banana cherry} b*"), "1");
        assert_eq!(run("lsearch -exact {a* b} a*"), "0");
        assert_eq!(run("lsearch {x y} z"), "-1");
        assert_eq!(run("lsearch -regexp {abc xbz} {^x}"), "1");
        assert_eq!(run("lsearch -all -inline {a1 b a2} a*"), "a1 a2");
    }

    #[test]
    fn lsort_options() {
        assert_eq!(run("lsort {pear apple fig}"), "apple fig pear");
        assert_eq!(run("lsort -integer {10 9 100}"), "9 10 100");
        assert_eq!(run("lsort -real -decreasing {1.5 3 2.25}"), "3 2.25 1.5");
        assert_eq!(run("lsort -unique {b a b c a}"), "a b c");
        assert_eq!(run_err("lsort -integer {1 x}"), "expected integer but got \"x\"");
    }

    #[test]
    fn join_and_split() {
        assert_eq!(run("join {a b c} ,"), "a,b,c");
        assert_eq!(run("split a,b,,c ,"), "a b {} c");
        assert_eq!(run("split abc {}"), "a b c");
        assert_eq!(run("llength [split {a b  c}]"), "4");
    }

    #[test]
    fn dict_operations() {
        assert_eq!(run("dict get [dict create a 1 b 2] b"), "2");
        assert_eq!(run("dict keys [dict create a 1 b 2 a 3]"), "a b");
        assert_eq!(run("dict values {a 1 b 2}"), "1 2");
        assert_eq!(run("dict size {a 1 b 2}"), "2");
        assert_eq!(run("dict exists {a {x 1}} a x"), "1");
        assert_eq!(run("dict exists {a 1} b"), "0");
        assert_eq!(run("dict set d a x 1; dict set d b 2; set d"), "a {x 1} b 2");
        assert_eq!(run("set d {a 1 b 2}; dict unset d a; set d"), "b 2");
        assert_eq!(run_err("dict get {a 1} z"), "key \"z\" not known in dictionary");
        assert_eq!(run_err("dict size {a}"), "missing value to go with key");
    }

    #[test]
    fn string_basics() {
        assert_eq!(run("string length héllo"), "5");
        assert_eq!(run("string index hello end"), "o");
        assert_eq!(run("string range hello 1 3"), "ell");
        assert_eq!(run("string toupper abc"), "ABC");
        assert_eq!(run("string reverse abc"), "cba");
        assert_eq!(run("string repeat ab 3"), "ababab");
        assert_eq!(run("string trim {  x  }"), "x");
        assert_eq!(run("string trimleft xxaxx x"), "axx");
        assert_eq!(run("string trimright xxaxx x"), "xxa");
    }

    #[test]
    fn string_search_and_compare() {
        assert_eq!(run("string first b abcabc"), "1");
        assert_eq!(run("string first b abcabc 2"), "4");
        assert_eq!(run("string last b abcabc"), "4");
        assert_eq!(run("string first z abc"), "-1");
        assert_eq!(run("string compare a b"), "-1");
        assert_eq!(run("string compare -nocase A a"), "0");
        assert_eq!(run("string equal -length 2 abx aby"), "1");
        assert_eq!(run("string match -nocase A* abc"), "1");
    }

    #[test]
    fn string_map_first_key_wins() {
        assert_eq!(run("string map {ab X a Y} abac"), "XYc");
        assert_eq!(run("string map -nocase {A 1} aA"), "11");
        assert_eq!(run_err("string map {a} x"), "char map list unbalanced");
    }

    #[test]
    fn format_conversions() {
        assert_eq!(run("format %d 42"), "42");
        assert_eq!(run("format %5d 42"), "   42");
        assert_eq!(run("format %-5d| 42"), "42   |");
        assert_eq!(run("format %05d -42"), "-0042");
        assert_eq!(run("format %+d 3"), "+3");
        assert_eq!(run("format %x 255"), "ff");
        assert_eq!(run("format %#X 255"), "0XFF");
        assert_eq!(run("format %o 8"), "10");
        assert_eq!(run("format %c 65"), "A");
        assert_eq!(run("format %.2s abc"), "ab");
        assert_eq!(run("format %.2f 3.14159"), "3.14");
        assert_eq!(run("format %e 1234.5"), "1.234500e+03");
        assert_eq!(run("format %g 0.0001"), "0.0001");
        assert_eq!(run("format %g 1234567"), "1.23457e+06");
        assert_eq!(run("format %g 100"), "100");
        assert_eq!(run("format {%s=%d%%} x 5"), "x=5%");
        assert_eq!(run_err("format %d"), "not enough arguments for all format specifiers");
    }

    #[test]
    fn regexp_with_groups() {
        assert_eq!(run("regexp {(\\d+)-(\\d+)} {a 12-34 b} m x y; list $m $x $y"), "12-34 12 34");
        assert_eq!(run("regexp -nocase {^ABC} abcdef"), "1");
        assert_eq!(run("regexp {z} abc"), "0");
        assert!(run_err("regexp {(} abc").starts_with("couldn't compile regular expression pattern"));
    }

    #[test]
    fn regsub_substitution() {
        assert_eq!(run("regsub {o} foo 0"), "f0o");
        assert_eq!(run("regsub -all {o} foo 0"), "f00");
        assert_eq!(run("regsub -all {(\\w)(\\d)} a1b2 {\\2\\1}"), "1a2b");
        assert_eq!(run("regsub {b+} abbbc {<&>}"), "a<bbb>c");
        assert_eq!(run("regsub -all o foo 0 out; set out"), "f00");
        assert_eq!(run("regsub -all o foo 0 out"), "2");
    }
}
