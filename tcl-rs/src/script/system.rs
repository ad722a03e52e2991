//! Operating-system commands: console I/O, `source`, `exit`, the working
//! directory, `clock`, `file`, `glob` and `time`.

use std::io::BufRead;
use std::path::{Component, Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use directories::BaseDirs;
use tracing::debug;

use super::error::{check_arity, TclError, TclResult};
use super::interp::{Interpreter, Signal};
use super::value::Value;
use crate::pattern::glob_match;

type Handler = fn(&mut Interpreter, &[Value]) -> TclResult;

const COMMANDS: &[(&str, Handler)] = &[
    ("cd", cmd_cd),
    ("exit", cmd_exit),
    ("gets", cmd_gets),
    ("glob", cmd_glob),
    ("pid", cmd_pid),
    ("puts", cmd_puts),
    ("pwd", cmd_pwd),
    ("source", cmd_source),
    ("time", cmd_time),
];

const NESTED: &[(&str, Handler)] = &[
    ("clock format", clock_format),
    ("clock milliseconds", clock_milliseconds),
    ("clock scan", clock_scan),
    ("clock seconds", clock_seconds),
    ("file atime", file_atime),
    ("file dirname", file_dirname),
    ("file exists", file_exists),
    ("file extension", file_extension),
    ("file join", file_join),
    ("file mtime", file_mtime),
    ("file size", file_size),
    ("file split", file_split),
    ("file tail", file_tail),
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

fn io_error(action: &str, path: &str, e: std::io::Error) -> TclError {
    TclError::msg(format!("couldn't {action} \"{path}\": {e}"))
}

// ── Console and scripts ───────────────────────────────────────────────────────

fn cmd_puts(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 4, "?-nonewline? ?channelId? string")?;
    let mut rest = &args[1..];
    let newline = match rest.first().map(Value::as_text) {
        Some("-nonewline") if rest.len() > 1 => {
            rest = &rest[1..];
            false
        }
        _ => true,
    };
    let (channel, text) = match rest {
        [text] => ("stdout", text.as_text()),
        [channel, text] => (channel.as_text(), text.as_text()),
        _ => {
            return Err(TclError::WrongArity(format!(
                "{} ?-nonewline? ?channelId? string",
                args[0]
            )))
        }
    };
    match channel {
        "stdout" => interp.write_stdout(text, newline),
        "stderr" if newline => eprintln!("{text}"),
        "stderr" => eprint!("{text}"),
        other => {
            return Err(TclError::msg(format!(
                "can not find channel named \"{other}\""
            )))
        }
    }
    Ok(Value::empty())
}

fn cmd_gets(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 3, "channelId ?varName?")?;
    if args[1].as_text() != "stdin" {
        return Err(TclError::msg(format!(
            "can not find channel named \"{}\"",
            args[1]
        )));
    }
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| io_error("read", "stdin", e))?;
    let line = line.trim_end_matches(['\n', '\r']).to_owned();
    match args.get(2) {
        Some(var) => {
            let count = if read == 0 { -1 } else { line.chars().count() as i64 };
            interp.set_var(var.as_text(), Value::from(line));
            Ok(Value::from(count))
        }
        None => Ok(Value::from(line)),
    }
}

impl Interpreter {
    /// Evaluate the contents of a file.  `info script` reports `path` while
    /// it runs, and a `return` at the file's top level only ends the file.
    pub fn source_file(&mut self, path: &Path) -> TclResult {
        let shown = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| io_error("read file", &shown, e))?;
        debug!(path = %shown, "source");
        let saved = std::mem::replace(&mut self.script, shown);
        let result = self.eval(&text);
        self.script = saved;
        if self.signal() == Signal::Return {
            self.reset_signal();
        }
        result
    }
}

fn cmd_source(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "fileName")?;
    interp.source_file(Path::new(args[1].as_text()))
}

fn cmd_exit(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 2, "?returnCode?")?;
    let code = match args.get(1) {
        Some(v) => i32::try_from(v.as_int()?).unwrap_or(1),
        None => 0,
    };
    Err(TclError::Exit(code))
}

fn cmd_time(interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 3, "script ?count?")?;
    let count = match args.get(2) {
        Some(v) => v.as_int()?.max(0),
        None => 1,
    };
    let start = Instant::now();
    for _ in 0..count {
        interp.eval(args[1].as_text())?;
    }
    let per = match count {
        0 => 0,
        n => start.elapsed().as_micros() / n as u128,
    };
    Ok(Value::from(format!("{per} microseconds per iteration")))
}

// ── Process and directories ───────────────────────────────────────────────────

fn cmd_pid(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 1, "")?;
    Ok(Value::from(i64::from(std::process::id())))
}

fn cmd_pwd(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 1, "")?;
    let dir = std::env::current_dir()
        .map_err(|e| TclError::msg(format!("error getting working directory name: {e}")))?;
    Ok(Value::from(dir.display().to_string()))
}

fn cmd_cd(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 2, "?dirName?")?;
    let target = match args.get(1) {
        Some(dir) => PathBuf::from(dir.as_text()),
        None => BaseDirs::new()
            .map(|b| b.home_dir().to_path_buf())
            .ok_or_else(|| TclError::msg("couldn't find HOME environment variable to expand path"))?,
    };
    std::env::set_current_dir(&target)
        .map_err(|e| io_error("change working directory to", &target.display().to_string(), e))?;
    Ok(Value::empty())
}

// ── clock ─────────────────────────────────────────────────────────────────────

fn now() -> std::time::Duration {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default()
}

fn clock_seconds(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 1, "")?;
    Ok(Value::from(now().as_secs() as i64))
}

fn clock_milliseconds(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 1, 1, "")?;
    Ok(Value::from(now().as_millis() as i64))
}

fn clock_format(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let usage = "clockval ?-format string?";
    check_arity(args, 2, 4, usage)?;
    let secs = args[1].as_int()?;
    let fmt = match &args[2..] {
        [] => "%a %b %d %H:%M:%S UTC %Y",
        [flag, fmt] if flag.as_text() == "-format" => fmt.as_text(),
        _ => return Err(TclError::WrongArity(format!("{} {usage}", args[0]))),
    };
    Ok(Value::from(format_time(fmt, secs)))
}

fn clock_scan(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "dateString")?;
    let text = args[1].as_text();
    scan_time(text.trim())
        .map(Value::from)
        .ok_or_else(|| TclError::msg(format!("unable to convert date-time string \"{text}\"")))
}

/// Parse a UTC time string into epoch seconds.
///
/// Accepted: `YYYY-MM-DD HH:MM:SS`, `YYYY/MM/DD HH:MM:SS`, `HH:MM:SS`
/// (today's date) and a bare integer.
fn scan_time(s: &str) -> Option<i64> {
    if let Ok(n) = s.parse::<i64>() {
        return Some(n);
    }
    let clock = |t: &str| -> Option<i64> {
        let tp: Vec<&str> = t.splitn(3, ':').collect();
        let [h, m, sec] = tp.as_slice() else {
            return None;
        };
        Some(h.parse::<i64>().ok()? * 3600 + m.parse::<i64>().ok()? * 60 + sec.parse::<i64>().ok()?)
    };
    if let Some((date, time)) = s.split_once(char::is_whitespace) {
        let sep = if date.contains('-') { '-' } else { '/' };
        let dp: Vec<&str> = date.splitn(3, sep).collect();
        let [y, mo, d] = dp.as_slice() else {
            return None;
        };
        let days = days_from_civil(y.parse().ok()?, mo.parse().ok()?, d.parse().ok()?);
        return Some(days * 86400 + clock(time.trim())?);
    }
    let today = (now().as_secs() as i64).div_euclid(86400);
    Some(today * 86400 + clock(s)?)
}

/// Days since the epoch for a civil date (Howard Hinnant's algorithm).
fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = (if y >= 0 { y } else { y - 399 }) / 400;
    let yoe = (y - era * 400) as u32;
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe as i64 - 719_468
}

/// (year, month 1-12, day 1-31) for a day count since the epoch.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = (z - era * 146_097) as u32;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let mo = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = yoe as i64 + era * 400 + i64::from(mo <= 2);
    (y, mo, d)
}

const MONTHS: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];
const WEEKDAYS: [&str; 7] = [
    "Sunday", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
];

/// Format epoch seconds (UTC) with strftime-style codes:
/// `%a %A %b %B %d %e %H %I %j %m %M %n %p %S %t %w %y %Y %%`.
fn format_time(fmt: &str, secs: i64) -> String {
    let day_secs = secs.rem_euclid(86400) as u32;
    let days = secs.div_euclid(86400);
    let (h, m, s) = (day_secs / 3600, (day_secs % 3600) / 60, day_secs % 60);
    let (year, month, day) = civil_from_days(days);
    let yday = days - days_from_civil(year, 1, 1) + 1;
    // 1970-01-01 was a Thursday.
    let wday = (days + 4).rem_euclid(7) as usize;
    let month_name = MONTHS[month as usize - 1];

    let mut out = String::with_capacity(fmt.len() + 16);
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => out.push('%'),
            Some('%') => out.push('%'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('H') => out.push_str(&format!("{h:02}")),
            Some('I') => out.push_str(&format!("{:02}", if h % 12 == 0 { 12 } else { h % 12 })),
            Some('M') => out.push_str(&format!("{m:02}")),
            Some('S') => out.push_str(&format!("{s:02}")),
            Some('p') => out.push_str(if h < 12 { "AM" } else { "PM" }),
            Some('Y') => out.push_str(&year.to_string()),
            Some('y') => out.push_str(&format!("{:02}", year.rem_euclid(100))),
            Some('m') => out.push_str(&format!("{month:02}")),
            Some('d') => out.push_str(&format!("{day:02}")),
            Some('e') => out.push_str(&format!("{day:2}")),
            Some('j') => out.push_str(&format!("{yday:03}")),
            Some('w') => out.push_str(&wday.to_string()),
            Some('A') => out.push_str(WEEKDAYS[wday]),
            Some('a') => out.push_str(&WEEKDAYS[wday][..3]),
            Some('B') => out.push_str(month_name),
            Some('b' | 'h') => out.push_str(&month_name[..3]),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
        }
    }
    out
}

// ── file ──────────────────────────────────────────────────────────────────────

fn metadata(args: &[Value]) -> TclResult<std::fs::Metadata> {
    check_arity(args, 2, 2, "name")?;
    let name = args[1].as_text();
    std::fs::metadata(name).map_err(|e| io_error("stat", name, e))
}

fn epoch_secs(t: std::io::Result<SystemTime>, name: &str) -> TclResult {
    let t = t.map_err(|e| io_error("stat", name, e))?;
    let secs = t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    Ok(Value::from(secs as i64))
}

fn file_atime(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let meta = metadata(args)?;
    epoch_secs(meta.accessed(), args[1].as_text())
}

fn file_mtime(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let meta = metadata(args)?;
    epoch_secs(meta.modified(), args[1].as_text())
}

fn file_size(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    let meta = metadata(args)?;
    Ok(Value::from(meta.len() as i64))
}

fn file_exists(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "name")?;
    Ok(Value::from(Path::new(args[1].as_text()).exists()))
}

fn file_dirname(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "name")?;
    let path = Path::new(args[1].as_text());
    let dir = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => ".".to_owned(),
        Some(p) => p.display().to_string(),
        None if path.has_root() => "/".to_owned(),
        None => ".".to_owned(),
    };
    Ok(Value::from(dir))
}

fn file_tail(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "name")?;
    let tail = Path::new(args[1].as_text())
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Value::from(tail))
}

fn file_extension(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "name")?;
    let ext = Path::new(args[1].as_text())
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    Ok(Value::from(ext))
}

fn file_join(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "name ?name ...?")?;
    let mut path = PathBuf::new();
    for part in &args[1..] {
        path.push(part.as_text());
    }
    Ok(Value::from(path.display().to_string()))
}

fn file_split(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, 2, "name")?;
    let parts = Path::new(args[1].as_text())
        .components()
        .filter_map(|c| match c {
            Component::RootDir => Some("/".to_owned()),
            Component::Normal(n) => Some(n.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_owned()),
            Component::CurDir => Some(".".to_owned()),
            Component::Prefix(p) => Some(p.as_os_str().to_string_lossy().into_owned()),
        })
        .collect::<Vec<_>>();
    Ok(Value::list_of(parts))
}

// ── glob ──────────────────────────────────────────────────────────────────────

/// Paths matching `pattern`, whose final component may hold glob
/// characters.  Hidden entries match only a pattern that starts with `.`.
fn glob_paths(pattern: &str) -> Vec<String> {
    let path = Path::new(pattern);
    let (dir, leaf) = match (path.parent(), path.file_name()) {
        (Some(d), Some(f)) if !d.as_os_str().is_empty() => (Some(d), f.to_string_lossy()),
        (_, Some(f)) => (None, f.to_string_lossy()),
        _ => return Vec::new(),
    };
    let Ok(entries) = std::fs::read_dir(dir.unwrap_or(Path::new("."))) else {
        return Vec::new();
    };
    let mut found: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.') || leaf.starts_with('.'))
        .filter(|name| glob_match(&leaf, name, false))
        .map(|name| match dir {
            Some(d) => d.join(name).display().to_string(),
            None => name,
        })
        .collect();
    found.sort();
    found
}

fn cmd_glob(_interp: &mut Interpreter, args: &[Value]) -> TclResult {
    check_arity(args, 2, usize::MAX, "?-nocomplain? pattern ?pattern ...?")?;
    let (nocomplain, patterns) = match args[1].as_text() {
        "-nocomplain" => (true, &args[2..]),
        _ => (false, &args[1..]),
    };
    let mut found = Vec::new();
    for pattern in patterns {
        found.extend(glob_paths(pattern.as_text()));
    }
    if found.is_empty() && !nocomplain {
        let shown: Vec<&str> = patterns.iter().map(Value::as_text).collect();
        return Err(TclError::msg(format!(
            "no files matched glob pattern{} \"{}\"",
            if shown.len() == 1 { "" } else { "s" },
            shown.join(" ")
        )));
    }
    Ok(Value::list_of(found))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
