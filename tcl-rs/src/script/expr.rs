//! Expression lexer, AST, parser, and evaluator (`expr`, `if`, `while`,
//! `for` conditions).
//!
//! Operands are integers, reals or strings; `$var`, `[cmd]` and `"..."`
//! operands are substituted lazily, so the untaken side of `&&`, `||` and
//! `?:` never runs.
//!
//! Operator precedence (lowest → highest):
//!   ternary  →  ||  →  &&  →  |  →  ^  →  &  →  in/ni  →  eq/ne  →
//!   ==/!=  →  relational  →  shift  →  additive  →  multiplicative  →
//!   **  →  unary  →  primary

use std::cmp::Ordering;

use super::error::{TclError, TclResult};
use super::parser::{Parser as ScriptParser, Token as ScriptToken};
use super::value::{format_real, parse_int, Kind, Value};

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Access the evaluator needs from its host interpreter.
pub trait EvalContext {
    /// Read a variable (`$name` operand).
    fn lookup_var(&self, name: &str) -> TclResult;

    /// Evaluate a script (`[cmd]` operand).
    fn eval_command(&mut self, script: &str) -> TclResult;

    /// Substitute the inside of a `"..."` operand.
    fn substitute(&mut self, text: &str) -> TclResult;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    // Operands
    Int(i64),
    Real(f64),
    /// Brace-quoted or bare-word literal.
    Str(String),
    /// Double-quoted text, substituted at evaluation time.
    Quoted(String),
    Var(String),
    Cmd(String),
    /// Math function name (only valid before `(`).
    Func(String),

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    Bang,
    Tilde,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrEq,
    StrNe,
    In,
    Ni,
    ShiftLeft,
    ShiftRight,
    Ampersand,
    Caret,
    Pipe,
    And,
    Or,
    Question,
    Colon,
    Comma,
    LParen,
    RParen,

    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer { src, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos + 1).copied()
    }

    fn eat(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn read_number(&mut self) -> Result<Token, String> {
        let start = self.pos;
        if self.peek() == Some(b'0') && matches!(self.peek2(), Some(b'x' | b'X')) {
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let text = &self.src[start..self.pos];
            return parse_int(text)
                .map(Token::Int)
                .ok_or_else(|| format!("invalid hexadecimal number \"{text}\""));
        }
        let mut is_real = false;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            is_real = true;
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E'))
            && (self.peek2().is_some_and(|c| c.is_ascii_digit())
                || (matches!(self.peek2(), Some(b'+' | b'-'))
                    && self.src.as_bytes().get(self.pos + 2).is_some_and(u8::is_ascii_digit)))
        {
            is_real = true;
            self.pos += 2;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let text = &self.src[start..self.pos];
        if is_real {
            return text
                .parse()
                .map(Token::Real)
                .map_err(|_| format!("invalid floating-point number \"{text}\""));
        }
        match parse_int(text) {
            Some(n) => Ok(Token::Int(n)),
            // Too wide for an integer: fall back to a real.
            None if !text.starts_with('0') => text
                .parse()
                .map(Token::Real)
                .map_err(|_| format!("invalid number \"{text}\"")),
            None => Err(format!("invalid octal number \"{text}\"")),
        }
    }

    fn read_quoted(&mut self) -> Result<Token, String> {
        self.pos += 1;
        let start = self.pos;
        loop {
            match self.peek() {
                None => return Err("missing \"".into()),
                Some(b'\\') => self.pos += 2,
                Some(b'"') => break,
                Some(_) => self.pos += 1,
            }
        }
        let text = self.src[start..self.pos].to_owned();
        self.pos += 1;
        Ok(Token::Quoted(text))
    }

    /// `$var`, `[cmd]` and `{text}` share the statement tokenizer's rules.
    fn read_substitution(&mut self) -> Result<Token, String> {
        let mut sub = ScriptParser::new(&self.src[self.pos..]);
        let tok = sub.next_token().map_err(|e| e.to_string())?;
        self.pos += sub.pos();
        match tok {
            ScriptToken::Var(name) => Ok(Token::Var(name)),
            ScriptToken::Cmd(body) => Ok(Token::Cmd(body)),
            ScriptToken::Str(text) | ScriptToken::Esc(text) => Ok(Token::Str(text)),
            other => Err(format!("unexpected {other:?}")),
        }
    }

    fn read_word(&mut self) -> Result<Token, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_') {
            self.pos += 1;
        }
        let word = &self.src[start..self.pos];
        let save = self.pos;
        self.skip_ws();
        let is_call = self.peek() == Some(b'(');
        self.pos = save;
        Ok(match word {
            "eq" => Token::StrEq,
            "ne" => Token::StrNe,
            "in" => Token::In,
            "ni" => Token::Ni,
            _ if is_call => Token::Func(word.to_owned()),
            "true" | "false" | "yes" | "no" | "on" | "off" => Token::Str(word.to_owned()),
            _ => return Err(format!("invalid bareword \"{word}\"")),
        })
    }

    fn next_token(&mut self) -> Result<Token, String> {
        self.skip_ws();
        let Some(ch) = self.peek() else {
            return Ok(Token::Eof);
        };
        match ch {
            b'0'..=b'9' => return self.read_number(),
            b'.' if self.peek2().is_some_and(|c| c.is_ascii_digit()) => return self.read_number(),
            b'"' => return self.read_quoted(),
            b'$' | b'[' | b'{' => return self.read_substitution(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => return self.read_word(),
            _ => {}
        }
        self.pos += 1;
        Ok(match ch {
            b'+' => Token::Plus,
            b'-' => Token::Minus,
            b'*' => {
                if self.eat(b'*') {
                    Token::Pow
                } else {
                    Token::Star
                }
            }
            b'/' => Token::Slash,
            b'%' => Token::Percent,
            b'!' => {
                if self.eat(b'=') {
                    Token::Ne
                } else {
                    Token::Bang
                }
            }
            b'~' => Token::Tilde,
            b'^' => Token::Caret,
            b'&' => {
                if self.eat(b'&') {
                    Token::And
                } else {
                    Token::Ampersand
                }
            }
            b'|' => {
                if self.eat(b'|') {
                    Token::Or
                } else {
                    Token::Pipe
                }
            }
            b'<' => {
                if self.eat(b'<') {
                    Token::ShiftLeft
                } else if self.eat(b'=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            b'>' => {
                if self.eat(b'>') {
                    Token::ShiftRight
                } else if self.eat(b'=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            b'=' if self.eat(b'=') => Token::Eq,
            b'?' => Token::Question,
            b':' => Token::Colon,
            b',' => Token::Comma,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            _ => {
                let c = self.src[self.pos - 1..].chars().next().unwrap_or('?');
                return Err(format!("character not legal in expressions \"{c}\""));
            }
        })
    }

    fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token()?;
            let done = matches!(t, Token::Eof);
            tokens.push(t);
            if done {
                return Ok(tokens);
            }
        }
    }
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrEq,
    StrNe,
    In,
    Ni,
    Shl,
    Shr,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Or,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Pow => "**",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::StrEq => "eq",
            BinOp::StrNe => "ne",
            BinOp::In => "in",
            BinOp::Ni => "ni",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitXor => "^",
            BinOp::BitOr => "|",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Operand),
    Quoted(String),
    Var(String),
    Command(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// One left-associative precedence level.
    fn binary_level(
        &mut self,
        ops: &[(Token, BinOp)],
        next: fn(&mut Parser) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut lhs = next(self)?;
        'outer: loop {
            for (tok, op) in ops {
                if self.eat(tok) {
                    let rhs = next(self)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, String> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, String> {
        let cond = self.parse_or()?;
        if self.eat(&Token::Question) {
            let then = self.parse_ternary()?;
            if !self.eat(&Token::Colon) {
                return Err("missing \":\" in ternary conditional".into());
            }
            let else_ = self.parse_ternary()?;
            Ok(Expr::Ternary(Box::new(cond), Box::new(then), Box::new(else_)))
        } else {
            Ok(cond)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        self.binary_level(&[(Token::Or, BinOp::Or)], Parser::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        self.binary_level(&[(Token::And, BinOp::And)], Parser::parse_bitor)
    }

    fn parse_bitor(&mut self) -> Result<Expr, String> {
        self.binary_level(&[(Token::Pipe, BinOp::BitOr)], Parser::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> Result<Expr, String> {
        self.binary_level(&[(Token::Caret, BinOp::BitXor)], Parser::parse_bitand)
    }

    fn parse_bitand(&mut self) -> Result<Expr, String> {
        self.binary_level(&[(Token::Ampersand, BinOp::BitAnd)], Parser::parse_membership)
    }

    fn parse_membership(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[(Token::In, BinOp::In), (Token::Ni, BinOp::Ni)],
            Parser::parse_string_equality,
        )
    }

    fn parse_string_equality(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[(Token::StrEq, BinOp::StrEq), (Token::StrNe, BinOp::StrNe)],
            Parser::parse_equality,
        )
    }

    fn parse_equality(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[(Token::Eq, BinOp::Eq), (Token::Ne, BinOp::Ne)],
            Parser::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[
                (Token::Lt, BinOp::Lt),
                (Token::Le, BinOp::Le),
                (Token::Gt, BinOp::Gt),
                (Token::Ge, BinOp::Ge),
            ],
            Parser::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[(Token::ShiftLeft, BinOp::Shl), (Token::ShiftRight, BinOp::Shr)],
            Parser::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
            Parser::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        self.binary_level(
            &[
                (Token::Star, BinOp::Mul),
                (Token::Slash, BinOp::Div),
                (Token::Percent, BinOp::Rem),
            ],
            Parser::parse_power,
        )
    }

    /// `**` is right-associative.
    fn parse_power(&mut self) -> Result<Expr, String> {
        let base = self.parse_unary()?;
        if self.eat(&Token::Pow) {
            let exp = self.parse_power()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            Token::Bang => UnaryOp::Not,
            Token::Tilde => UnaryOp::BitNot,
            _ => return self.parse_primary(),
        };
        self.pos += 1;
        Ok(Expr::Unary(op, Box::new(self.parse_unary()?)))
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::Int(n) => Ok(Expr::Literal(Operand::Int(n))),
            Token::Real(x) => Ok(Expr::Literal(Operand::Real(x))),
            Token::Str(s) => Ok(Expr::Literal(Operand::from_value(&Value::from(s)))),
            Token::Quoted(s) => Ok(Expr::Quoted(s)),
            Token::Var(name) => Ok(Expr::Var(name)),
            Token::Cmd(body) => Ok(Expr::Command(body)),
            Token::Func(name) => {
                if !self.eat(&Token::LParen) {
                    return Err(format!("expected \"(\" after {name}"));
                }
                let mut args = Vec::new();
                if self.peek() != &Token::RParen {
                    args.push(self.parse_expr()?);
                    while self.eat(&Token::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                if !self.eat(&Token::RParen) {
                    return Err(format!("missing close parenthesis after arguments to {name}"));
                }
                Ok(Expr::Call(name, args))
            }
            Token::LParen => {
                let inner = self.parse_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err("missing close parenthesis".into());
                }
                Ok(inner)
            }
            Token::Eof => Err("premature end of expression".into()),
            other => Err(format!("unexpected operator {other:?}")),
        }
    }
}

/// Parse an expression string into an AST.
pub fn parse_expr(src: &str) -> TclResult<Expr> {
    let syntax = |detail: String| TclError::msg(format!("syntax error in expression \"{src}\": {detail}"));
    let tokens = Lexer::new(src).tokenize().map_err(syntax)?;
    if tokens.len() == 1 {
        return Err(TclError::msg("empty expression"));
    }
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expr().map_err(syntax)?;
    if parser.peek() != &Token::Eof {
        return Err(syntax("extra tokens at end of expression".into()));
    }
    Ok(expr)
}

// ── Operands ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i64),
    Real(f64),
    Str(String),
}

impl Operand {
    pub fn from_value(v: &Value) -> Operand {
        match v.kind() {
            Kind::Real => v.as_real().map(Operand::Real).unwrap_or_else(|_| Operand::Str(v.as_text().to_owned())),
            _ => {
                if let Ok(n) = v.as_int() {
                    Operand::Int(n)
                } else if let Ok(x) = v.as_real() {
                    Operand::Real(x)
                } else {
                    Operand::Str(v.as_text().to_owned())
                }
            }
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Operand::Int(n) => Value::from(n),
            Operand::Real(x) => Value::from(x),
            Operand::Str(s) => Value::from(s),
        }
    }

    fn text(&self) -> String {
        match self {
            Operand::Int(n) => n.to_string(),
            Operand::Real(x) => format_real(*x),
            Operand::Str(s) => s.clone(),
        }
    }

    fn truth(&self) -> TclResult<bool> {
        match self {
            Operand::Int(n) => Ok(*n != 0),
            Operand::Real(x) => Ok(*x != 0.0),
            Operand::Str(s) => Value::from(s.as_str()).as_bool(),
        }
    }

    fn real(&self, op: &str) -> TclResult<f64> {
        match self {
            Operand::Int(n) => Ok(*n as f64),
            Operand::Real(x) => Ok(*x),
            Operand::Str(s) => Err(non_numeric(s, op)),
        }
    }

    fn int(&self, op: &str) -> TclResult<i64> {
        match self {
            Operand::Int(n) => Ok(*n),
            Operand::Real(_) => Err(TclError::msg(format!(
                "can't use floating-point value as operand of \"{op}\""
            ))),
            Operand::Str(s) => Err(non_numeric(s, op)),
        }
    }
}

fn non_numeric(s: &str, op: &str) -> TclError {
    TclError::msg(format!("can't use non-numeric string \"{s}\" as operand of \"{op}\""))
}

fn flag(b: bool) -> Operand {
    Operand::Int(i64::from(b))
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate an [`Expr`] against `ctx`.
pub fn eval_expr(expr: &Expr, ctx: &mut dyn EvalContext) -> TclResult<Operand> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Quoted(text) => Ok(Operand::from_value(&ctx.substitute(text)?)),
        Expr::Var(name) => Ok(Operand::from_value(&ctx.lookup_var(name)?)),
        Expr::Command(body) => Ok(Operand::from_value(&ctx.eval_command(body)?)),

        Expr::Unary(op, inner) => {
            let v = eval_expr(inner, ctx)?;
            match op {
                UnaryOp::Neg => match v {
                    Operand::Int(n) => Ok(Operand::Int(n.wrapping_neg())),
                    Operand::Real(x) => Ok(Operand::Real(-x)),
                    Operand::Str(s) => Err(non_numeric(&s, "-")),
                },
                UnaryOp::Plus => match v {
                    Operand::Str(s) => Err(non_numeric(&s, "+")),
                    num => Ok(num),
                },
                UnaryOp::Not => Ok(flag(!v.truth()?)),
                UnaryOp::BitNot => Ok(Operand::Int(!v.int("~")?)),
            }
        }

        Expr::Binary(BinOp::And, lhs, rhs) => {
            if !eval_expr(lhs, ctx)?.truth()? {
                return Ok(flag(false));
            }
            Ok(flag(eval_expr(rhs, ctx)?.truth()?))
        }
        Expr::Binary(BinOp::Or, lhs, rhs) => {
            if eval_expr(lhs, ctx)?.truth()? {
                return Ok(flag(true));
            }
            Ok(flag(eval_expr(rhs, ctx)?.truth()?))
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            eval_binop(*op, &l, &r)
        }

        Expr::Ternary(cond, then, else_) => {
            if eval_expr(cond, ctx)?.truth()? {
                eval_expr(then, ctx)
            } else {
                eval_expr(else_, ctx)
            }
        }

        Expr::Call(name, arg_exprs) => {
            let mut args = Vec::with_capacity(arg_exprs.len());
            for ae in arg_exprs {
                args.push(eval_expr(ae, ctx)?);
            }
            call_function(name, &args)
        }
    }
}

fn eval_binop(op: BinOp, l: &Operand, r: &Operand) -> TclResult<Operand> {
    let sym = op.symbol();
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem | BinOp::Pow => {
            match (l, r) {
                (Operand::Int(a), Operand::Int(b)) => int_arith(op, *a, *b).map(Operand::Int),
                _ => real_arith(op, l.real(sym)?, r.real(sym)?).map(Operand::Real),
            }
        }
        BinOp::Lt => Ok(flag(compare(l, r) == Ordering::Less)),
        BinOp::Le => Ok(flag(compare(l, r) != Ordering::Greater)),
        BinOp::Gt => Ok(flag(compare(l, r) == Ordering::Greater)),
        BinOp::Ge => Ok(flag(compare(l, r) != Ordering::Less)),
        BinOp::Eq => Ok(flag(compare(l, r) == Ordering::Equal)),
        BinOp::Ne => Ok(flag(compare(l, r) != Ordering::Equal)),
        BinOp::StrEq => Ok(flag(l.text() == r.text())),
        BinOp::StrNe => Ok(flag(l.text() != r.text())),
        BinOp::In | BinOp::Ni => {
            let needle = l.text();
            let list = Value::from(r.text());
            let found = list.as_list()?.iter().any(|e| e.as_text() == needle);
            Ok(flag(found == (op == BinOp::In)))
        }
        BinOp::Shl | BinOp::Shr => {
            let (a, b) = (l.int(sym)?, r.int(sym)?);
            if b < 0 {
                return Err(TclError::msg("negative shift argument"));
            }
            Ok(Operand::Int(match (op, b >= 64) {
                (BinOp::Shl, true) => 0,
                (BinOp::Shl, false) => a.wrapping_shl(b as u32),
                (_, true) => if a < 0 { -1 } else { 0 },
                (_, false) => a >> b,
            }))
        }
        BinOp::BitAnd => Ok(Operand::Int(l.int(sym)? & r.int(sym)?)),
        BinOp::BitXor => Ok(Operand::Int(l.int(sym)? ^ r.int(sym)?)),
        BinOp::BitOr => Ok(Operand::Int(l.int(sym)? | r.int(sym)?)),
        BinOp::And => Ok(flag(l.truth()? && r.truth()?)),
        BinOp::Or => Ok(flag(l.truth()? || r.truth()?)),
    }
}

/// Numeric comparison when both sides are numbers, else string order.
fn compare(l: &Operand, r: &Operand) -> Ordering {
    match (l, r) {
        (Operand::Int(a), Operand::Int(b)) => a.cmp(b),
        (Operand::Str(_), _) | (_, Operand::Str(_)) => l.text().cmp(&r.text()),
        _ => {
            let (a, b) = (l.real("").unwrap_or(0.0), r.real("").unwrap_or(0.0));
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> TclResult<i64> {
    Ok(match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => {
            if b == 0 {
                return Err(TclError::msg("divide by zero"));
            }
            let q = a.wrapping_div(b);
            if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinOp::Rem => {
            if b == 0 {
                return Err(TclError::msg("divide by zero"));
            }
            let r = a.wrapping_rem(b);
            if r != 0 && ((r < 0) != (b < 0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => int_pow(a, b)?,
        _ => 0,
    })
}

fn int_pow(base: i64, exp: i64) -> TclResult<i64> {
    if exp < 0 {
        return match base {
            0 => Err(TclError::msg("exponentiation of zero by negative power")),
            1 => Ok(1),
            -1 => Ok(if exp % 2 == 0 { 1 } else { -1 }),
            _ => Ok(0),
        };
    }
    let exp = u32::try_from(exp).unwrap_or(u32::MAX);
    Ok(base.wrapping_pow(exp))
}

fn real_arith(op: BinOp, a: f64, b: f64) -> TclResult<f64> {
    Ok(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(TclError::msg("divide by zero"));
            }
            a / b
        }
        BinOp::Rem => {
            return Err(TclError::msg("can't use floating-point value as operand of \"%\""));
        }
        BinOp::Pow => a.powf(b),
        _ => 0.0,
    })
}

// ── Math functions ────────────────────────────────────────────────────────────

fn call_function(name: &str, args: &[Operand]) -> TclResult<Operand> {
    let arity = |n: usize| -> TclResult<()> {
        match args.len().cmp(&n) {
            Ordering::Less => Err(TclError::msg(format!("too few arguments for math function \"{name}\""))),
            Ordering::Greater => Err(TclError::msg(format!("too many arguments for math function \"{name}\""))),
            Ordering::Equal => Ok(()),
        }
    };
    let real1 = |f: fn(f64) -> f64| -> TclResult<Operand> {
        arity(1)?;
        Ok(Operand::Real(f(args[0].real(name)?)))
    };
    match name {
        "abs" => {
            arity(1)?;
            match &args[0] {
                Operand::Int(n) => Ok(Operand::Int(n.wrapping_abs())),
                other => Ok(Operand::Real(other.real(name)?.abs())),
            }
        }
        "int" | "entier" | "wide" => {
            arity(1)?;
            match &args[0] {
                Operand::Int(n) => Ok(Operand::Int(*n)),
                other => Ok(Operand::Int(other.real(name)?.trunc() as i64)),
            }
        }
        "round" => {
            arity(1)?;
            match &args[0] {
                Operand::Int(n) => Ok(Operand::Int(*n)),
                other => Ok(Operand::Int(other.real(name)?.round() as i64)),
            }
        }
        "double" => real1(|x| x),
        "floor" => real1(f64::floor),
        "ceil" => real1(f64::ceil),
        "sqrt" => real1(f64::sqrt),
        "exp" => real1(f64::exp),
        "log" => real1(f64::ln),
        "log10" => real1(f64::log10),
        "sin" => real1(f64::sin),
        "cos" => real1(f64::cos),
        "tan" => real1(f64::tan),
        "asin" => real1(f64::asin),
        "acos" => real1(f64::acos),
        "atan" => real1(f64::atan),
        "sinh" => real1(f64::sinh),
        "cosh" => real1(f64::cosh),
        "tanh" => real1(f64::tanh),
        "bool" => {
            arity(1)?;
            Ok(flag(args[0].truth()?))
        }
        "pow" | "atan2" | "fmod" | "hypot" => {
            arity(2)?;
            let (a, b) = (args[0].real(name)?, args[1].real(name)?);
            Ok(Operand::Real(match name {
                "pow" => a.powf(b),
                "atan2" => a.atan2(b),
                "fmod" => {
                    if b == 0.0 {
                        return Err(TclError::msg("divide by zero"));
                    }
                    a % b
                }
                _ => a.hypot(b),
            }))
        }
        "min" | "max" => {
            let Some(first) = args.first() else {
                return Err(TclError::msg(format!("too few arguments for math function \"{name}\"")));
            };
            let mut best = first.clone();
            for candidate in &args[1..] {
                candidate.real(name)?;
                let ord = compare(candidate, &best);
                if (name == "min" && ord == Ordering::Less) || (name == "max" && ord == Ordering::Greater) {
                    best = candidate.clone();
                }
            }
            best.real(name)?;
            Ok(best)
        }
        _ => Err(TclError::msg(format!("unknown math function \"{name}\""))),
    }
}

/// Parse and evaluate an expression string.
pub fn evaluate(src: &str, ctx: &mut dyn EvalContext) -> TclResult {
    let expr = parse_expr(src)?;
    eval_expr(&expr, ctx).map(Operand::into_value)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // ── Minimal EvalContext for tests ─────────────────────────────────────────

    struct TestCtx {
        vars: HashMap<String, Value>,
        commands_run: usize,
    }

    impl TestCtx {
        fn new() -> Self {
            TestCtx { vars: HashMap::new(), commands_run: 0 }
        }
        fn with(mut self, k: &str, v: &str) -> Self {
            self.vars.insert(k.into(), Value::from(v));
            self
        }
    }

    impl EvalContext for TestCtx {
        fn lookup_var(&self, name: &str) -> TclResult {
            self.vars.get(name).cloned().ok_or_else(|| TclError::NoSuchVariable(name.into()))
        }
        fn eval_command(&mut self, script: &str) -> TclResult {
            self.commands_run += 1;
            Ok(Value::from(script))
        }
        fn substitute(&mut self, text: &str) -> TclResult {
            Ok(Value::from(text))
        }
    }

    fn eval(src: &str) -> String {
        evaluate(src, &mut TestCtx::new()).expect("eval failed").as_text().to_owned()
    }

    fn eval_err(src: &str) -> String {
        evaluate(src, &mut TestCtx::new()).unwrap_err().to_string()
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42"), "42");
        assert_eq!(eval("2.5"), "2.5");
        assert_eq!(eval("0x10"), "16");
        assert_eq!(eval("010"), "8");
        assert_eq!(eval("1e3"), "1000.0");
        assert_eq!(eval("\"hello\""), "hello");
        assert_eq!(eval("{abc}"), "abc");
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("2 + 3"), "5");
        assert_eq!(eval("10 - 4"), "6");
        assert_eq!(eval("3 * 4"), "12");
        assert_eq!(eval("10 / 3"), "3");
        assert_eq!(eval("10 % 3"), "1");
        assert_eq!(eval("1 + 2 * 3"), "7");
        assert_eq!(eval("(1 + 2) * 3"), "9");
    }

    #[test]
    fn floor_division_and_modulo() {
        assert_eq!(eval("-7 / 2"), "-4");
        assert_eq!(eval("-7 % 2"), "1");
        assert_eq!(eval("7 % -2"), "-1");
    }

    #[test]
    fn mixed_arithmetic_is_real() {
        assert_eq!(eval("1 + 0.5"), "1.5");
        assert_eq!(eval("3 / 2.0"), "1.5");
        assert_eq!(eval("2.0 * 2"), "4.0");
    }

    #[test]
    fn power() {
        assert_eq!(eval("2 ** 10"), "1024");
        assert_eq!(eval("2 ** 3 ** 2"), "512");
        assert_eq!(eval("2 ** -1"), "0");
        assert_eq!(eval("2.0 ** 2"), "4.0");
    }

    #[test]
    fn divide_by_zero() {
        assert_eq!(eval_err("1 / 0"), "divide by zero");
        assert_eq!(eval_err("1 % 0"), "divide by zero");
    }

    #[test]
    fn unary() {
        assert_eq!(eval("-5"), "-5");
        assert_eq!(eval("-(3 + 2)"), "-5");
        assert_eq!(eval("!0"), "1");
        assert_eq!(eval("!yes"), "0");
        assert_eq!(eval("~5"), "-6");
    }

    #[test]
    fn comparison() {
        assert_eq!(eval("3 == 3"), "1");
        assert_eq!(eval("3 != 4"), "1");
        assert_eq!(eval("2 < 3"), "1");
        assert_eq!(eval("3 >= 3"), "1");
        assert_eq!(eval("2 == 2.0"), "1");
        assert_eq!(eval("\"abc\" < \"abd\""), "1");
        assert_eq!(eval("{a} eq {a}"), "1");
        assert_eq!(eval("1 eq 1.0"), "0");
    }

    #[test]
    fn membership() {
        assert_eq!(eval("{b} in {a b c}"), "1");
        assert_eq!(eval("{z} ni {a b c}"), "1");
    }

    #[test]
    fn bitwise() {
        assert_eq!(eval("6 & 3"), "2");
        assert_eq!(eval("6 | 3"), "7");
        assert_eq!(eval("6 ^ 3"), "5");
        assert_eq!(eval("1 << 4"), "16");
        assert_eq!(eval("-16 >> 2"), "-4");
    }

    #[test]
    fn ternary() {
        assert_eq!(eval("1 ? 10 : 20"), "10");
        assert_eq!(eval("0 ? 10 : 20"), "20");
        assert_eq!(eval("0 ? 1 : 0 ? 2 : 3"), "3");
    }

    #[test]
    fn logical_short_circuit() {
        let mut ctx = TestCtx::new();
        evaluate("0 && [boom]", &mut ctx).unwrap();
        evaluate("1 || [boom]", &mut ctx).unwrap();
        assert_eq!(ctx.commands_run, 0);
        assert_eq!(eval("1 && 1"), "1");
        assert_eq!(eval("0 || 0"), "0");
    }

    #[test]
    fn variable_lookup() {
        let mut ctx = TestCtx::new().with("x", "7");
        let v = evaluate("$x + 1", &mut ctx).unwrap();
        assert_eq!(v.as_text(), "8");
        assert!(evaluate("$nope", &mut ctx).is_err());
    }

    #[test]
    fn functions() {
        assert_eq!(eval("abs(-3)"), "3");
        assert_eq!(eval("int(3.7)"), "3");
        assert_eq!(eval("round(2.5)"), "3");
        assert_eq!(eval("double(2)"), "2.0");
        assert_eq!(eval("max(1, 5, 3)"), "5");
        assert_eq!(eval("min(4, 2.5)"), "2.5");
        assert_eq!(eval("sqrt(16)"), "4.0");
        assert_eq!(eval("pow(2, 3)"), "8.0");
        assert!(eval_err("nosuch(1)").contains("unknown math function"));
        assert!(eval_err("abs(1, 2)").contains("too many arguments"));
    }

    #[test]
    fn non_numeric_operands() {
        assert_eq!(
            eval_err("{abc} + 1"),
            "can't use non-numeric string \"abc\" as operand of \"+\""
        );
        assert!(eval_err("1.5 % 2").contains("floating-point"));
    }

    #[test]
    fn syntax_errors() {
        assert!(eval_err("1 +").starts_with("syntax error in expression \"1 +\""));
        assert!(eval_err("foo").contains("invalid bareword"));
        assert_eq!(eval_err(""), "empty expression");
        assert!(eval_err("(1").contains("missing close parenthesis"));
    }
}
