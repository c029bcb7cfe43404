//! Reader for Slang source text
//!
//! Syntax:
//! ```text
//! 42  -2.5  1e3          numbers
//! "text\n"               strings (escapes: \" \\ \n \t \r)
//! :name                  symbols
//! [ dup * ]              blocks, nested freely
//! true false nil         literals
//! # to end of line       comment
//! anything-else          words
//! ```
//!
//! The output is the program representation the interpreter consumes: a flat
//! sequence of values, with nested blocks as `Value::Block` literals that have
//! not been instantiated yet.

use crate::error::{SlangError, SlangResult};
use crate::value::Value;

/// A token with source position information
#[derive(Debug, Clone)]
pub struct Token {
    pub text: String,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed)
    pub column: usize,
}

impl Token {
    fn new(text: String, line: usize, column: usize) -> Self {
        Token { text, line, column }
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.text == *other
    }
}

fn parse_error(line: usize, column: usize, message: impl Into<String>) -> SlangError {
    SlangError::Parse {
        line: line + 1,
        column: column + 1,
        message: message.into(),
    }
}

/// Read a whole program
pub fn read(source: &str) -> SlangResult<Vec<Value>> {
    Reader::new(source)?.read_all()
}

pub struct Reader {
    tokens: Vec<Token>,
    pos: usize,
}

impl Reader {
    pub fn new(source: &str) -> SlangResult<Self> {
        Ok(Reader {
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    pub fn read_all(&mut self) -> SlangResult<Vec<Value>> {
        let mut program = Vec::new();
        while let Some(token) = self.advance() {
            if token == "]" {
                return Err(parse_error(token.line, token.column, "unbalanced ']'"));
            }
            program.push(self.read_form(token)?);
        }
        Ok(program)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn read_form(&mut self, token: Token) -> SlangResult<Value> {
        if token == "[" {
            return self.read_block(&token);
        }
        read_atom(&token)
    }

    fn read_block(&mut self, open: &Token) -> SlangResult<Value> {
        let mut code = Vec::new();
        loop {
            match self.advance() {
                Some(token) if token == "]" => return Ok(Value::block(code)),
                Some(token) => code.push(self.read_form(token)?),
                None => {
                    return Err(parse_error(open.line, open.column, "unclosed '['"));
                }
            }
        }
    }
}

fn read_atom(token: &Token) -> SlangResult<Value> {
    let text = token.text.as_str();

    if let Some(body) = text.strip_prefix('"') {
        let inner = body.strip_suffix('"').unwrap_or(body);
        return Ok(Value::string(&unescape(inner)));
    }

    match text {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "nil" => return Ok(Value::Nil),
        _ => {}
    }

    if let Some(name) = text.strip_prefix(':')
        && !name.is_empty()
    {
        return Ok(Value::symbol(name));
    }

    if looks_numeric(text)
        && let Ok(n) = text.parse::<f64>()
    {
        return Ok(Value::Number(n));
    }

    Ok(Value::word(text))
}

/// Guards `f64::from_str`, which also accepts `inf`, `NaN` and friends
fn looks_numeric(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-' | '+' | '.') => match chars.next() {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        },
        _ => false,
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn tokenize(source: &str) -> SlangResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_start_line = 0;
    let mut current_start_col = 0;
    let mut in_string = false;
    let mut in_comment = false;
    let mut prev_was_backslash = false;

    // Track current position (0-indexed)
    let mut line = 0;
    let mut col = 0;

    let flush = |current: &mut String, tokens: &mut Vec<Token>, line: usize, col: usize| {
        if !current.is_empty() {
            tokens.push(Token::new(std::mem::take(current), line, col));
        }
    };

    for ch in source.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
            }
        } else if in_string {
            current.push(ch);
            if ch == '"' && !prev_was_backslash {
                // Unescaped quote ends the string
                in_string = false;
                flush(&mut current, &mut tokens, current_start_line, current_start_col);
                prev_was_backslash = false;
            } else {
                prev_was_backslash = ch == '\\' && !prev_was_backslash;
            }
        } else if ch == '"' {
            flush(&mut current, &mut tokens, current_start_line, current_start_col);
            in_string = true;
            current_start_line = line;
            current_start_col = col;
            current.push(ch);
            prev_was_backslash = false;
        } else if ch == '#' && current.is_empty() {
            in_comment = true;
        } else if ch == '[' || ch == ']' {
            flush(&mut current, &mut tokens, current_start_line, current_start_col);
            tokens.push(Token::new(ch.to_string(), line, col));
        } else if ch.is_whitespace() {
            flush(&mut current, &mut tokens, current_start_line, current_start_col);
        } else {
            if current.is_empty() {
                current_start_line = line;
                current_start_col = col;
            }
            current.push(ch);
        }

        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
    }

    if in_string {
        return Err(parse_error(
            current_start_line,
            current_start_col,
            "unclosed string literal",
        ));
    }
    flush(&mut current, &mut tokens, current_start_line, current_start_col);
    Ok(tokens)
}
