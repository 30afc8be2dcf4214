use crate::error::{Error, Result};
use serde_json::Number;
use std::fmt;

/// What a `{{` opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Expression, // {{name ...}}
    BlockOpen,  // {{#name ...}}
    BlockClose, // {{/name}}
    Inverse,    // {{else}}, {{^}}, {{else name ...}}
    Partial,    // {{> name ...}}
}

/// Literal argument values
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

/// Token types for template syntax
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Outside tags
    Text(String),
    Comment(String), // {{! ... }} or {{!-- ... --}}

    // Tag boundaries
    Open(TagKind),
    Close,

    // Inside tags
    Path(String),
    Literal(Literal),
    HashKey(String), // key= of a hash argument
    OpenParen,
    CloseParen,

    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token's first character
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    offset: usize,
    line: usize,
    column: usize,
}

impl Token {
    fn at(kind: TokenKind, mark: Mark) -> Self {
        Self {
            kind,
            offset: mark.offset,
            line: mark.line,
            column: mark.column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.kind, self.line, self.column)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Text(_) => write!(f, "text"),
            TokenKind::Comment(_) => write!(f, "comment"),
            TokenKind::Open(TagKind::Expression) => write!(f, "'{{{{'"),
            TokenKind::Open(TagKind::BlockOpen) => write!(f, "'{{{{#'"),
            TokenKind::Open(TagKind::BlockClose) => write!(f, "'{{{{/'"),
            TokenKind::Open(TagKind::Inverse) => write!(f, "'{{{{else'"),
            TokenKind::Open(TagKind::Partial) => write!(f, "'{{{{>'"),
            TokenKind::Close => write!(f, "'}}}}'"),
            TokenKind::Path(p) => write!(f, "path '{}'", p),
            TokenKind::Literal(Literal::String(s)) => write!(f, "string \"{}\"", s),
            TokenKind::Literal(Literal::Number(n)) => write!(f, "number {}", n),
            TokenKind::Literal(Literal::Bool(b)) => write!(f, "{}", b),
            TokenKind::Literal(Literal::Null) => write!(f, "null"),
            TokenKind::HashKey(k) => write!(f, "'{}='", k),
            TokenKind::OpenParen => write!(f, "'('"),
            TokenKind::CloseParen => write!(f, "')'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

fn is_path_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '-' | '$' | '.')
}

/// Lexer for mustache-style templates
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    offset: usize,
    line: usize,
    column: usize,
    in_tag: bool,
    expect_partial_name: bool,
    tag_start: Mark,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let start = Mark {
            offset: 0,
            line: 1,
            column: 1,
        };

        Self {
            input: input.chars().collect(),
            position: 0,
            offset: 0,
            line: 1,
            column: 1,
            in_tag: false,
            expect_partial_name: false,
            tag_start: start,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn starts_with(&self, pattern: &str) -> bool {
        let mut i = self.position;
        for expected in pattern.chars() {
            if self.input.get(i) != Some(&expected) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Whether `pattern` occurs anywhere from the cursor onwards
    fn occurs_ahead(&self, pattern: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        self.input[self.position..]
            .windows(pattern.len())
            .any(|window| window == pattern.as_slice())
    }

    fn mark(&self) -> Mark {
        Mark {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    /// Advance to the next character
    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.offset += ch.len_utf8();
            self.position += 1;
        }
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(ch) if ch.is_whitespace()) {
            self.advance();
        }
    }

    fn error_at(&self, mark: Mark, message: impl Into<String>) -> Error {
        Error::syntax(mark.offset, mark.line, mark.column, message)
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        if self.in_tag {
            return self.lex_in_tag();
        }

        let start = self.mark();
        if self.current().is_none() {
            return Ok(Token::at(TokenKind::Eof, start));
        }

        if self.starts_with("{{") {
            return self.lex_open();
        }

        // Plain text runs until the next tag, whitespace included
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if self.starts_with("{{") {
                break;
            }
            text.push(ch);
            self.advance();
        }

        Ok(Token::at(TokenKind::Text(text), start))
    }

    fn lex_open(&mut self) -> Result<Token> {
        let start = self.mark();
        self.tag_start = start;
        self.advance_by(2);

        // `{{!--}}` with no closing `--}}` is a short comment whose body is `--`
        if self.starts_with("!--") && self.occurs_ahead("--}}") {
            self.advance_by(3);
            return self.lex_comment(start, "--}}");
        }
        if self.current() == Some('!') {
            self.advance();
            return self.lex_comment(start, "}}");
        }

        let kind = match self.current() {
            Some('#') => {
                self.advance();
                TagKind::BlockOpen
            }
            Some('/') => {
                self.advance();
                TagKind::BlockClose
            }
            Some('>') => {
                self.advance();
                self.expect_partial_name = true;
                TagKind::Partial
            }
            Some('^') => {
                self.advance();
                TagKind::Inverse
            }
            _ if self.eat_else_keyword() => TagKind::Inverse,
            _ => TagKind::Expression,
        };

        self.in_tag = true;
        Ok(Token::at(TokenKind::Open(kind), start))
    }

    /// Consume `else` when it is the first word of the tag
    fn eat_else_keyword(&mut self) -> bool {
        self.skip_whitespace();
        if !self.starts_with("else") {
            return false;
        }

        let after = self.input.get(self.position + 4).copied();
        let ends_word = match after {
            Some(ch) => ch.is_whitespace() || ch == '}',
            None => true,
        };
        if ends_word {
            self.advance_by(4);
        }
        ends_word
    }

    fn lex_comment(&mut self, start: Mark, terminator: &str) -> Result<Token> {
        let mut text = String::new();

        loop {
            if self.starts_with(terminator) {
                self.advance_by(terminator.chars().count());
                return Ok(Token::at(TokenKind::Comment(text), start));
            }

            match self.current() {
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
                None => return Err(self.error_at(start, "unterminated comment")),
            }
        }
    }

    fn lex_in_tag(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let start = self.mark();

        let Some(ch) = self.current() else {
            return Err(self.error_at(self.tag_start, "unterminated tag"));
        };

        if self.starts_with("}}") {
            self.advance_by(2);
            self.in_tag = false;
            self.expect_partial_name = false;
            return Ok(Token::at(TokenKind::Close, start));
        }

        let partial_name = std::mem::take(&mut self.expect_partial_name);

        match ch {
            '(' => {
                self.advance();
                Ok(Token::at(TokenKind::OpenParen, start))
            }
            ')' => {
                self.advance();
                Ok(Token::at(TokenKind::CloseParen, start))
            }
            '"' | '\'' => self.lex_string(ch, start),
            _ if partial_name => self.lex_partial_name(start),
            '-' if matches!(self.peek(), Some(d) if d.is_ascii_digit()) => self.lex_number(start),
            _ if ch.is_ascii_digit() => self.lex_number(start),
            _ if ch == '@' || is_path_char(ch) => self.lex_word(start),
            _ => Err(self.error_at(start, format!("unexpected character '{}' in tag", ch))),
        }
    }

    /// Partial names may contain `/` and other characters paths cannot
    fn lex_partial_name(&mut self, start: Mark) -> Result<Token> {
        let mut name = String::new();

        while let Some(ch) = self.current() {
            if ch.is_whitespace() || matches!(ch, '}' | '(' | ')') {
                break;
            }
            name.push(ch);
            self.advance();
        }

        if name.is_empty() {
            return Err(self.error_at(start, "expected partial name"));
        }

        Ok(Token::at(TokenKind::Path(name), start))
    }

    fn lex_string(&mut self, quote: char, start: Mark) -> Result<Token> {
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.current() {
                None => return Err(self.error_at(start, "unterminated string literal")),
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some(escaped) => value.push(escaped),
                        None => return Err(self.error_at(start, "unterminated string literal")),
                    }
                    self.advance();
                }
                Some(ch) if ch == quote => {
                    self.advance();
                    break;
                }
                Some(ch) => {
                    value.push(ch);
                    self.advance();
                }
            }
        }

        Ok(Token::at(TokenKind::Literal(Literal::String(value)), start))
    }

    fn lex_number(&mut self, start: Mark) -> Result<Token> {
        let mut text = String::new();

        if self.current() == Some('-') {
            text.push('-');
            self.advance();
        }
        self.read_digits(&mut text);

        let mut is_float = false;
        if self.current() == Some('.') && matches!(self.peek(), Some(d) if d.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.advance();
            self.read_digits(&mut text);
        }

        if matches!(self.current(), Some(ch) if ch == '@' || is_path_char(ch)) {
            return Err(self.error_at(start, "malformed number literal"));
        }

        let number = if is_float {
            text.parse::<f64>().ok().and_then(Number::from_f64)
        } else {
            match text.parse::<i64>() {
                Ok(n) => Some(Number::from(n)),
                Err(_) => text.parse::<f64>().ok().and_then(Number::from_f64),
            }
        };

        match number {
            Some(n) => Ok(Token::at(TokenKind::Literal(Literal::Number(n)), start)),
            None => Err(self.error_at(start, format!("invalid number '{}'", text))),
        }
    }

    fn read_digits(&mut self, text: &mut String) {
        while let Some(ch) = self.current() {
            if !ch.is_ascii_digit() {
                break;
            }
            text.push(ch);
            self.advance();
        }
    }

    /// Identifiers, dotted paths, keywords and hash keys
    fn lex_word(&mut self, start: Mark) -> Result<Token> {
        let mut word = String::new();

        while let Some(ch) = self.current() {
            if is_path_char(ch) || (ch == '@' && word.is_empty()) {
                word.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if self.current() == Some('=') {
            self.advance();
            if word.starts_with('@') || word.contains('.') {
                return Err(self.error_at(start, format!("invalid hash key '{}'", word)));
            }
            return Ok(Token::at(TokenKind::HashKey(word), start));
        }

        let kind = match word.as_str() {
            "true" => TokenKind::Literal(Literal::Bool(true)),
            "false" => TokenKind::Literal(Literal::Bool(false)),
            "null" | "undefined" => TokenKind::Literal(Literal::Null),
            _ => {
                if !is_valid_path(&word) {
                    return Err(self.error_at(start, format!("malformed path '{}'", word)));
                }
                TokenKind::Path(word)
            }
        };

        Ok(Token::at(kind, start))
    }
}

fn is_valid_path(word: &str) -> bool {
    if word == "." {
        return true;
    }

    let body = word.strip_prefix('@').unwrap_or(word);
    !body.is_empty() && body.split('.').all(|segment| !segment.is_empty())
}

/// Tokenize a whole template source
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).tokenize()
}
