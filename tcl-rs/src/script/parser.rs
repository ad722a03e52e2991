//! Statement tokenizer and list splitter.
//!
//! The tokenizer is a byte-level state machine over the script text.  It
//! yields word fragments (`Str`, `Esc`, `Var`, `Cmd`) interleaved with `Sep`
//! (between words) and `Eol` (between statements); the evaluator glues
//! adjacent fragments into words.
//!
//! All syntax characters are ASCII, so slicing at their positions always
//! lands on UTF-8 boundaries.

use super::error::{TclError, TclResult};
use super::value::Value;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Word separator (spaces, tabs, backslash-newline).
    Sep,
    /// Statement terminator (newlines and `;`, runs collapsed).
    Eol,
    /// Brace-quoted literal, content verbatim.
    Str(String),
    /// Bare or double-quoted literal run with backslash sequences decoded.
    Esc(String),
    /// Command substitution body (between the brackets).
    Cmd(String),
    /// Variable reference name (after the `$`).
    Var(String),
    Eof,
}

/// Which substitutions a [`Parser`] performs in text mode (see
/// [`Parser::for_subst`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitutions {
    pub backslashes: bool,
    pub commands: bool,
    pub variables: bool,
}

impl Default for Substitutions {
    fn default() -> Self {
        Substitutions { backslashes: true, commands: true, variables: true }
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

pub struct Parser<'a> {
    src: &'a str,
    pos: usize,
    word_start: bool,
    stmt_start: bool,
    in_quote: bool,
    /// `Some` when tokenizing free text for `subst`: no words, no statements.
    subst: Option<Substitutions>,
}

impl<'a> Parser<'a> {
    pub fn new(src: &'a str) -> Self {
        Parser {
            src,
            pos: 0,
            word_start: true,
            stmt_start: true,
            in_quote: false,
            subst: None,
        }
    }

    /// Tokenize `src` as if it were the inside of a double-quoted word:
    /// whitespace, quotes, braces and semicolons are all literal.
    pub fn for_subst(src: &'a str, subs: Substitutions) -> Self {
        Parser { subst: Some(subs), ..Parser::new(src) }
    }

    /// Byte offset of the next unread character.
    pub fn pos(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos + 1).copied()
    }

    fn emit(&mut self, token: Token) -> Token {
        match token {
            Token::Sep => {
                self.word_start = true;
                self.stmt_start = false;
            }
            Token::Eol => {
                self.word_start = true;
                self.stmt_start = true;
            }
            _ => {
                self.word_start = false;
                self.stmt_start = false;
            }
        }
        token
    }

    pub fn next_token(&mut self) -> TclResult<Token> {
        if let Some(subs) = self.subst {
            return self.next_subst_token(subs);
        }
        loop {
            let Some(c) = self.peek() else {
                if self.in_quote {
                    return Err(TclError::UnterminatedConstruct("\""));
                }
                return Ok(self.emit(Token::Eof));
            };
            if !self.in_quote {
                match c {
                    b' ' | b'\t' | b'\r' => return Ok(self.parse_sep()),
                    b'\\' if self.peek2() == Some(b'\n') => return Ok(self.parse_sep()),
                    b'\n' | b';' => return Ok(self.parse_eol()),
                    b'#' if self.stmt_start => {
                        self.skip_comment();
                        continue;
                    }
                    _ => {}
                }
            }
            return match c {
                b'[' => self.parse_command().map(|t| self.emit(t)),
                b'$' => Ok(self.parse_var()).map(|t| self.emit(t)),
                _ => self.parse_string().map(|t| self.emit(t)),
            };
        }
    }

    fn next_subst_token(&mut self, subs: Substitutions) -> TclResult<Token> {
        match self.peek() {
            None => Ok(Token::Eof),
            Some(b'[') if subs.commands => self.parse_command(),
            Some(b'$') if subs.variables => Ok(self.parse_var()),
            Some(_) => {
                let mut text = String::new();
                while let Some(c) = self.peek() {
                    match c {
                        b'[' if subs.commands => break,
                        b'$' if subs.variables => break,
                        b'\\' if subs.backslashes => self.pos = decode_escape(self.src, self.pos, &mut text),
                        _ => self.push_char(&mut text),
                    }
                }
                Ok(Token::Esc(text))
            }
        }
    }

    fn push_char(&mut self, out: &mut String) {
        if let Some(ch) = self.src[self.pos..].chars().next() {
            out.push(ch);
            self.pos += ch.len_utf8();
        }
    }

    fn parse_sep(&mut self) -> Token {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r') => self.pos += 1,
                Some(b'\\') if self.peek2() == Some(b'\n') => self.pos += 2,
                _ => break,
            }
        }
        self.emit(Token::Sep)
    }

    fn parse_eol(&mut self) -> Token {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n' | b';')) {
            self.pos += 1;
        }
        self.emit(Token::Eol)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b'\n' => break,
                b'\\' => self.pos += 2,
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.src.len());
    }

    fn parse_command(&mut self) -> TclResult<Token> {
        self.pos += 1;
        let start = self.pos;
        let mut depth = 1usize;
        let mut braces = 0usize;
        loop {
            match self.peek() {
                None => return Err(TclError::UnterminatedConstruct("close-bracket")),
                Some(b'\\') => self.pos += 1,
                Some(b'[') if braces == 0 => depth += 1,
                Some(b']') if braces == 0 => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Some(b'{') => braces += 1,
                Some(b'}') => braces = braces.saturating_sub(1),
                _ => {}
            }
            self.pos += 1;
        }
        let body = self.src[start..self.pos].to_owned();
        self.pos += 1;
        Ok(Token::Cmd(body))
    }

    /// `$name`, `${any text}` or `$name(index)`.  A `$` with no name after
    /// it is literal.
    fn parse_var(&mut self) -> Token {
        self.pos += 1;
        if self.peek() == Some(b'{') {
            if let Some(len) = self.src[self.pos + 1..].find('}') {
                let name = self.src[self.pos + 1..self.pos + 1 + len].to_owned();
                self.pos += len + 2;
                return Token::Var(name);
            }
            return Token::Esc("$".to_owned());
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == b'_' || c == b':') {
            self.pos += 1;
        }
        if self.pos == start {
            return Token::Esc("$".to_owned());
        }
        if self.peek() == Some(b'(') {
            if let Some(len) = self.src[self.pos..].find(')') {
                self.pos += len + 1;
            }
        }
        Token::Var(self.src[start..self.pos].to_owned())
    }

    fn parse_string(&mut self) -> TclResult<Token> {
        if self.word_start && !self.in_quote {
            match self.peek() {
                Some(b'{') => return self.parse_brace(),
                Some(b'"') => {
                    self.in_quote = true;
                    self.pos += 1;
                }
                _ => {}
            }
        }
        let mut text = String::new();
        loop {
            let Some(c) = self.peek() else {
                if self.in_quote {
                    return Err(TclError::UnterminatedConstruct("\""));
                }
                break;
            };
            match c {
                b'$' | b'[' => break,
                b' ' | b'\t' | b'\r' | b'\n' | b';' if !self.in_quote => break,
                b'"' if self.in_quote => {
                    self.pos += 1;
                    self.in_quote = false;
                    break;
                }
                b'\\' if !self.in_quote && self.peek2() == Some(b'\n') => break,
                b'\\' => self.pos = decode_escape(self.src, self.pos, &mut text),
                _ => self.push_char(&mut text),
            }
        }
        Ok(Token::Esc(text))
    }

    fn parse_brace(&mut self) -> TclResult<Token> {
        self.pos += 1;
        let start = self.pos;
        let mut depth = 1usize;
        loop {
            match self.peek() {
                None => return Err(TclError::UnterminatedConstruct("close-brace")),
                Some(b'\\') => {
                    if self.peek2().is_none() {
                        return Err(TclError::UnterminatedConstruct("close-brace"));
                    }
                    self.pos += 1;
                }
                Some(b'{') => depth += 1,
                Some(b'}') => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        let body = self.src[start..self.pos].to_owned();
        self.pos += 1;
        Ok(Token::Str(body))
    }
}

// ── Backslash sequences ───────────────────────────────────────────────────────

/// Decode the backslash sequence at `src[pos]` into `out`; returns the
/// offset just past it.
///
/// Recognized: `\a \b \f \n \r \t \v`, up to three octal digits, `\xHH`,
/// `\uHHHH`, and backslash-newline (plus following blanks) as one space.
/// Any other character stands for itself.
pub fn decode_escape(src: &str, pos: usize, out: &mut String) -> usize {
    let bytes = src.as_bytes();
    let mut i = pos + 1;
    let Some(&c) = bytes.get(i) else {
        out.push('\\');
        return i;
    };
    i += 1;
    match c {
        b'a' => out.push('\x07'),
        b'b' => out.push('\x08'),
        b'f' => out.push('\x0c'),
        b'n' => out.push('\n'),
        b'r' => out.push('\r'),
        b't' => out.push('\t'),
        b'v' => out.push('\x0b'),
        b'\n' => {
            while matches!(bytes.get(i), Some(b' ' | b'\t')) {
                i += 1;
            }
            out.push(' ');
        }
        b'0'..=b'7' => {
            let mut code = u32::from(c - b'0');
            let mut n = 1;
            while n < 3 {
                match bytes.get(i) {
                    Some(&d @ b'0'..=b'7') => {
                        code = code * 8 + u32::from(d - b'0');
                        i += 1;
                        n += 1;
                    }
                    _ => break,
                }
            }
            out.push(char::from_u32(code & 0xff).unwrap_or('\u{fffd}'));
        }
        b'x' | b'u' => {
            let max = if c == b'x' { 2 } else { 4 };
            let start = i;
            while i - start < max && bytes.get(i).is_some_and(u8::is_ascii_hexdigit) {
                i += 1;
            }
            if i == start {
                out.push(c as char);
            } else {
                let code = u32::from_str_radix(&src[start..i], 16).unwrap_or(0xfffd);
                out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
            }
        }
        _ => {
            // Multi-byte characters stand for themselves too.
            let ch = src[pos + 1..].chars().next().unwrap_or('\\');
            out.push(ch);
            i = pos + 1 + ch.len_utf8();
        }
    }
    i
}

/// Apply backslash substitution to a whole string.
pub fn unescape(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_owned();
    }
    let mut out = String::with_capacity(s.len());
    let mut pos = 0;
    while pos < s.len() {
        if s.as_bytes()[pos] == b'\\' {
            pos = decode_escape(s, pos, &mut out);
        } else if let Some(ch) = s[pos..].chars().next() {
            out.push(ch);
            pos += ch.len_utf8();
        }
    }
    out
}

// ── Lists ─────────────────────────────────────────────────────────────────────

fn is_list_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0b' | b'\x0c')
}

/// Split list text into elements.
///
/// Elements are whitespace-separated; an element may be brace-quoted
/// (verbatim, nesting respected) or double-quoted (backslashes decoded).
/// Bare elements have backslash sequences decoded.
pub fn parse_list(text: &str) -> TclResult<Vec<Value>> {
    let bytes = text.as_bytes();
    let mut items = Vec::new();
    let mut i = 0;
    loop {
        while i < bytes.len() && is_list_space(bytes[i]) {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let element = match bytes[i] {
            b'{' => {
                let start = i + 1;
                let mut depth = 1usize;
                i += 1;
                while depth > 0 {
                    match bytes.get(i) {
                        None => return Err(TclError::msg("unmatched open brace in list")),
                        Some(b'\\') => i += 1,
                        Some(b'{') => depth += 1,
                        Some(b'}') => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
                let body = &text[start..i - 1];
                check_element_end(text, i, "braces")?;
                body.to_owned()
            }
            b'"' => {
                let mut out = String::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(TclError::msg("unmatched open quote in list")),
                        Some(b'"') => {
                            i += 1;
                            break;
                        }
                        Some(b'\\') => i = decode_escape(text, i, &mut out),
                        Some(_) => {
                            let ch = text[i..].chars().next().unwrap_or(' ');
                            out.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                check_element_end(text, i, "quotes")?;
                out
            }
            _ => {
                let start = i;
                while i < bytes.len() && !is_list_space(bytes[i]) {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i = i.min(bytes.len());
                unescape(&text[start..i])
            }
        };
        items.push(Value::from(element));
    }
    Ok(items)
}

fn check_element_end(text: &str, i: usize, what: &str) -> TclResult<()> {
    match text.as_bytes().get(i) {
        Some(&b) if !is_list_space(b) => {
            let ch = text[i..].chars().next().unwrap_or(' ');
            Err(TclError::msg(format!(
                "list element in {what} followed by \"{ch}\" instead of space"
            )))
        }
        _ => Ok(()),
    }
}

/// True when `src` has no unterminated brace, quote or bracket.
pub fn is_complete(src: &str) -> bool {
    let mut parser = Parser::new(src);
    loop {
        match parser.next_token() {
            Ok(Token::Eof) => return true,
            Ok(_) => {}
            Err(TclError::UnterminatedConstruct(_)) => return false,
            Err(_) => return true,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut p = Parser::new(src);
        let mut out = Vec::new();
        loop {
            let t = p.next_token().unwrap();
            let done = t == Token::Eof;
            out.push(t);
            if done {
                return out;
            }
        }
    }

    fn esc(s: &str) -> Token {
        Token::Esc(s.to_owned())
    }

    #[test]
    fn simple_statement() {
        assert_eq!(
            tokens("set x 1"),
            vec![esc("set"), Token::Sep, esc("x"), Token::Sep, esc("1"), Token::Eof]
        );
    }

    #[test]
    fn terminators_collapse() {
        assert_eq!(
            tokens("a;\n\n b"),
            vec![esc("a"), Token::Eol, esc("b"), Token::Eof]
        );
    }

    #[test]
    fn braces_are_verbatim() {
        assert_eq!(
            tokens("puts {a $b [c]}"),
            vec![esc("puts"), Token::Sep, Token::Str("a $b [c]".into()), Token::Eof]
        );
    }

    #[test]
    fn nested_braces() {
        assert_eq!(tokens("{a {b} c}")[0], Token::Str("a {b} c".into()));
    }

    #[test]
    fn escaped_brace_does_not_count() {
        assert_eq!(tokens(r"{a \} b}")[0], Token::Str(r"a \} b".into()));
    }

    #[test]
    fn quoted_word_with_substitutions() {
        assert_eq!(
            tokens("\"a $x b\""),
            vec![esc("a "), Token::Var("x".into()), esc(" b"), Token::Eof]
        );
    }

    #[test]
    fn command_substitution_nests() {
        assert_eq!(tokens("[a [b c]]")[0], Token::Cmd("a [b c]".into()));
    }

    #[test]
    fn bracket_inside_braces_is_ignored() {
        assert_eq!(tokens("[a {]}]")[0], Token::Cmd("a {]}".into()));
    }

    #[test]
    fn variable_forms() {
        assert_eq!(tokens("$abc")[0], Token::Var("abc".into()));
        assert_eq!(tokens("${a b}")[0], Token::Var("a b".into()));
        assert_eq!(tokens("$::g")[0], Token::Var("::g".into()));
        assert_eq!(tokens("$env(HOME)")[0], Token::Var("env(HOME)".into()));
        assert_eq!(tokens("$ x")[0], esc("$"));
    }

    #[test]
    fn comment_only_at_statement_start() {
        assert_eq!(tokens("# hi\nx"), vec![Token::Eol, esc("x"), Token::Eof]);
        assert_eq!(tokens("a #b")[2], esc("#b"));
    }

    #[test]
    fn backslash_sequences() {
        assert_eq!(tokens(r"a\tb")[0], esc("a\tb"));
        assert_eq!(tokens(r"\x41\101é")[0], esc("AAé"));
        assert_eq!(tokens(r"\$x")[0], esc("$x"));
    }

    #[test]
    fn backslash_newline_separates() {
        assert_eq!(
            tokens("a \\\n   b"),
            vec![esc("a"), Token::Sep, esc("b"), Token::Eof]
        );
    }

    #[test]
    fn unterminated_constructs() {
        let mut p = Parser::new("puts {abc");
        let err = loop {
            match p.next_token() {
                Err(e) => break e,
                Ok(Token::Eof) => panic!("expected error"),
                Ok(_) => {}
            }
        };
        assert_eq!(err, TclError::UnterminatedConstruct("close-brace"));
        assert!(!is_complete("puts \"abc"));
        assert!(!is_complete("set x [foo"));
        assert!(is_complete("set x {a}"));
    }

    #[test]
    fn subst_mode_keeps_whitespace() {
        let mut p = Parser::for_subst("a {b} $x;", Substitutions::default());
        assert_eq!(p.next_token().unwrap(), esc("a {b} "));
        assert_eq!(p.next_token().unwrap(), Token::Var("x".into()));
        assert_eq!(p.next_token().unwrap(), esc(";"));
        assert_eq!(p.next_token().unwrap(), Token::Eof);
    }

    #[test]
    fn list_splitting() {
        let items = parse_list("a {b c} \"d e\" f\\ g").unwrap();
        let texts: Vec<_> = items.iter().map(|v| v.as_text().to_owned()).collect();
        assert_eq!(texts, vec!["a", "b c", "d e", "f g"]);
    }

    #[test]
    fn list_errors() {
        assert!(parse_list("{a").is_err());
        assert!(parse_list("{a}b").is_err());
        assert!(parse_list("\"a").is_err());
    }
}
