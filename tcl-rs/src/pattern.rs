//! Pattern matching: exact, glob and regular-expression modes, plus the
//! multi-key substitution behind `string map`.
//!
//! ## Match modes
//!
//! | Mode | Used by | Description |
//! |------|---------|-------------|
//! | [`MatchMode::Exact`]  | `lsearch -exact` | Whole-string equality |
//! | [`MatchMode::Glob`]   | `string match`, `lsearch`, `glob`, `info` | `*`, `?`, `[…]`, `\x` |
//! | [`MatchMode::Regexp`] | `regexp`, `regsub`, `lsearch -regexp` | [`regex`] crate |

use aho_corasick::{AhoCorasickBuilder, MatchKind};
use regex::{Regex, RegexBuilder};

// ── Public types ─────────────────────────────────────────────────────────────

/// Which matching algorithm a [`Pattern`] uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Exact,
    Glob,
    Regexp,
}

/// Error returned when a pattern cannot be compiled.
#[derive(Debug)]
pub enum PatternError {
    InvalidRegex(regex::Error),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::InvalidRegex(e) => {
                write!(f, "couldn't compile regular expression pattern: {e}")
            }
        }
    }
}

impl std::error::Error for PatternError {}

enum Compiled {
    Exact,
    Glob,
    Regex(Regex),
}

/// A compiled pattern ready for matching.
pub struct Pattern {
    src: String,
    mode: MatchMode,
    nocase: bool,
    compiled: Compiled,
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pattern")
            .field("src", &self.src)
            .field("mode", &self.mode)
            .field("nocase", &self.nocase)
            .finish()
    }
}

impl Pattern {
    /// Compile `src` using `mode`.
    pub fn new(src: &str, mode: MatchMode, nocase: bool) -> Result<Self, PatternError> {
        let compiled = match mode {
            MatchMode::Exact => Compiled::Exact,
            MatchMode::Glob => Compiled::Glob,
            MatchMode::Regexp => Compiled::Regex(compile_regex(src, nocase)?),
        };
        Ok(Self { src: src.to_owned(), mode, nocase, compiled })
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns `true` if this pattern matches `text`.
    pub fn matches(&self, text: &str) -> bool {
        match &self.compiled {
            Compiled::Exact if self.nocase => text.to_lowercase() == self.src.to_lowercase(),
            Compiled::Exact => text == self.src,
            Compiled::Glob => glob_match(&self.src, text, self.nocase),
            Compiled::Regex(re) => re.is_match(text),
        }
    }
}

// ── Regex compilation ─────────────────────────────────────────────────────────

/// Compile a regex.  `.` matches newlines, and `^`/`$` anchor to the whole
/// string.
pub fn compile_regex(pattern: &str, nocase: bool) -> Result<Regex, PatternError> {
    RegexBuilder::new(pattern)
        .case_insensitive(nocase)
        .dot_matches_new_line(true)
        .multi_line(false)
        .build()
        .map_err(PatternError::InvalidRegex)
}

// ── Glob matching ─────────────────────────────────────────────────────────────
//
// Glob syntax:
//   *         any sequence of characters, including none
//   ?         any single character
//   [...]     any character in the set; `a-z` ranges allowed
//   \x        literal x

fn fold(c: char, nocase: bool) -> char {
    if nocase {
        c.to_lowercase().next().unwrap_or(c)
    } else {
        c
    }
}

/// Match `c` against the bracket set starting at `pat[start] == '['`.
///
/// Returns `(matched, index after ']')`, or `None` if the set is unclosed.
fn match_class(pat: &[char], start: usize, c: char, nocase: bool) -> Option<(bool, usize)> {
    let c = fold(c, nocase);
    let mut matched = false;
    let mut i = start + 1;
    loop {
        let mut lo = *pat.get(i)?;
        if lo == ']' {
            return Some((matched, i + 1));
        }
        if lo == '\\' {
            i += 1;
            lo = *pat.get(i)?;
        }
        let lo = fold(lo, nocase);
        if pat.get(i + 1) == Some(&'-') && pat.get(i + 2).is_some_and(|&h| h != ']') {
            let hi = fold(pat[i + 2], nocase);
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= lo == c;
            i += 1;
        }
    }
}

/// Glob match over characters.  Backtracks to the most recent `*` on a
/// mismatch, so the cost stays polynomial for any pattern.
pub fn glob_match(pattern: &str, text: &str, nocase: bool) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if let Some(&pc) = p.get(pi) {
            match pc {
                '*' => {
                    star = Some((pi, ti));
                    pi += 1;
                    continue;
                }
                '?' => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                '[' => match match_class(&p, pi, t[ti], nocase) {
                    Some((true, next)) => {
                        pi = next;
                        ti += 1;
                        continue;
                    }
                    Some((false, _)) => {}
                    None if t[ti] == '[' => {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                    None => {}
                },
                '\\' if pi + 1 < p.len() => {
                    if fold(p[pi + 1], nocase) == fold(t[ti], nocase) {
                        pi += 2;
                        ti += 1;
                        continue;
                    }
                }
                _ => {
                    if fold(pc, nocase) == fold(t[ti], nocase) {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                }
            }
        }
        match star {
            Some((sp, st)) => {
                pi = sp + 1;
                ti = st + 1;
                star = Some((sp, st + 1));
            }
            None => return false,
        }
    }
    while p.get(pi) == Some(&'*') {
        pi += 1;
    }
    pi == p.len()
}

// ── Multi-key replacement ─────────────────────────────────────────────────────

/// Replace every occurrence of each key with its value in one left-to-right
/// pass.  At a given position the earliest-listed key wins; replaced text is
/// never rescanned.  Empty keys are ignored.
pub fn replace_all(text: &str, pairs: &[(String, String)], nocase: bool) -> String {
    let pairs: Vec<&(String, String)> = pairs.iter().filter(|(k, _)| !k.is_empty()).collect();
    if pairs.is_empty() {
        return text.to_owned();
    }
    let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
    let values: Vec<&str> = pairs.iter().map(|(_, v)| v.as_str()).collect();
    let ac = AhoCorasickBuilder::new()
        .match_kind(MatchKind::LeftmostFirst)
        .ascii_case_insensitive(nocase)
        .build(keys);
    ac.replace_all(text, &values)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
