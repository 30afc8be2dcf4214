use super::ast::{Block, Call, Expr, Node, PartialCall, PartialName, PathExpr, Program};
use super::lexer::{Lexer, Literal, TagKind, Token, TokenKind};
use crate::error::{Error, Result};
use crate::value::Value;

/// How a run of sibling nodes ended
enum Terminator {
    Eof,
    Inverse { chained: Option<Call>, token: Token },
    Close { name: String, token: Token },
}

/// Recursive-descent parser producing a [`Program`]
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser from input string
    pub fn new(input: &str) -> Result<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Ok(Self::from_tokens(tokens))
    }

    /// Create a parser over an existing token stream
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        let needs_eof = !matches!(tokens.last(), Some(token) if token.kind == TokenKind::Eof);
        if needs_eof {
            let (offset, line, column) = tokens
                .last()
                .map(|t| (t.offset, t.line, t.column))
                .unwrap_or((0, 1, 1));
            tokens.push(Token {
                kind: TokenKind::Eof,
                offset,
                line,
                column,
            });
        }

        Self {
            tokens,
            position: 0,
        }
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.position.min(last)]
    }

    /// Consume the current token; the trailing Eof is never consumed
    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
        token
    }

    fn error(&self, token: &Token, message: impl Into<String>) -> Error {
        Error::syntax(token.offset, token.line, token.column, message)
    }

    fn expect(&mut self, expected: TokenKind) -> Result<()> {
        let token = self.advance();
        if token.kind == expected {
            Ok(())
        } else {
            Err(self.error(
                &token,
                format!("expected {}, found {}", expected, token.kind),
            ))
        }
    }

    fn expect_close(&mut self) -> Result<()> {
        self.expect(TokenKind::Close)
    }

    /// Parse the entire template
    pub fn parse(&mut self) -> Result<Program> {
        let (nodes, terminator) = self.parse_nodes()?;

        match terminator {
            Terminator::Eof => Ok(Program::new(nodes)),
            Terminator::Inverse { token, .. } => {
                Err(self.error(&token, "'else' outside of a block"))
            }
            Terminator::Close { name, token } => Err(self.error(
                &token,
                format!("unexpected close for block \"{}\"", name),
            )),
        }
    }

    /// Parse sibling nodes until end of input, an inverse marker or a close tag
    fn parse_nodes(&mut self) -> Result<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();

        loop {
            let token = self.advance();

            match &token.kind {
                TokenKind::Eof => return Ok((nodes, Terminator::Eof)),

                TokenKind::Text(text) => nodes.push(Node::Text(text.clone())),

                TokenKind::Comment(_) => {}

                TokenKind::Open(TagKind::Expression) => {
                    let call = self.parse_call()?;
                    self.expect_close()?;
                    nodes.push(Node::Expression(call));
                }

                TokenKind::Open(TagKind::BlockOpen) => {
                    let call = self.parse_call()?;
                    self.expect_close()?;
                    let close_name = call.name.original.clone();
                    let block = self.parse_block(call, &close_name, &token)?;
                    nodes.push(Node::Block(block));
                }

                TokenKind::Open(TagKind::Inverse) => {
                    let chained = if self.current().kind == TokenKind::Close {
                        None
                    } else {
                        Some(self.parse_call()?)
                    };
                    self.expect_close()?;
                    return Ok((nodes, Terminator::Inverse { chained, token }));
                }

                TokenKind::Open(TagKind::BlockClose) => {
                    let name_token = self.advance();
                    let name = match name_token.kind {
                        TokenKind::Path(name) => name,
                        ref other => {
                            return Err(self.error(
                                &name_token,
                                format!("expected block name, found {}", other),
                            ))
                        }
                    };
                    self.expect_close()?;
                    return Ok((nodes, Terminator::Close { name, token }));
                }

                TokenKind::Open(TagKind::Partial) => {
                    let partial = self.parse_partial()?;
                    nodes.push(Node::Partial(partial));
                }

                other => {
                    return Err(self.error(&token, format!("unexpected {}", other)));
                }
            }
        }
    }

    /// Parse a block body after its open tag, up to the matching close tag
    ///
    /// `close_name` is the name the close tag must carry; chained
    /// `{{else helper}}` sections share their parent's close tag.
    fn parse_block(&mut self, call: Call, close_name: &str, open: &Token) -> Result<Block> {
        let (program, terminator) = self.parse_nodes()?;

        let inverse = match terminator {
            Terminator::Eof => return Err(self.unclosed(open, close_name)),

            Terminator::Close { name, token } => {
                self.check_close(&name, close_name, &token)?;
                None
            }

            Terminator::Inverse {
                chained: None,
                token: _,
            } => {
                let (inverse, terminator) = self.parse_nodes()?;
                match terminator {
                    Terminator::Close { name, token } => {
                        self.check_close(&name, close_name, &token)?;
                        Some(inverse)
                    }
                    Terminator::Eof => return Err(self.unclosed(open, close_name)),
                    Terminator::Inverse { token, .. } => {
                        return Err(self.error(
                            &token,
                            format!("duplicate 'else' in block \"{}\"", close_name),
                        ))
                    }
                }
            }

            Terminator::Inverse {
                chained: Some(chained),
                token,
            } => {
                let nested = self.parse_block(chained, close_name, &token)?;
                Some(vec![Node::Block(nested)])
            }
        };

        Ok(Block {
            call,
            program,
            inverse,
        })
    }

    fn unclosed(&self, open: &Token, name: &str) -> Error {
        self.error(open, format!("unclosed block \"{}\"", name))
    }

    fn check_close(&self, found: &str, expected: &str, token: &Token) -> Result<()> {
        if found == expected {
            Ok(())
        } else {
            Err(self.error(
                token,
                format!(
                    "unmatched block \"{}\", expected close for \"{}\"",
                    found, expected
                ),
            ))
        }
    }

    /// Parse `name arg... key=value...`
    fn parse_call(&mut self) -> Result<Call> {
        let token = self.advance();
        let name = match &token.kind {
            TokenKind::Path(path) => PathExpr::parse(path),
            other => {
                return Err(self.error(
                    &token,
                    format!("expected helper name or path, found {}", other),
                ))
            }
        };

        let (params, hash) = self.parse_arguments()?;

        Ok(Call {
            name,
            params,
            hash,
            offset: token.offset,
        })
    }

    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut params = Vec::new();
        let mut hash: Vec<(String, Expr)> = Vec::new();

        loop {
            match &self.current().kind {
                TokenKind::Close | TokenKind::CloseParen | TokenKind::Eof => break,

                TokenKind::HashKey(key) => {
                    let key = key.clone();
                    let token = self.advance();
                    if hash.iter().any(|(existing, _)| *existing == key) {
                        return Err(
                            self.error(&token, format!("duplicate hash argument '{}'", key))
                        );
                    }
                    let value = self.parse_argument()?;
                    hash.push((key, value));
                }

                _ => {
                    if !hash.is_empty() {
                        let token = self.current().clone();
                        return Err(
                            self.error(&token, "positional argument after hash arguments")
                        );
                    }
                    params.push(self.parse_argument()?);
                }
            }
        }

        Ok((params, hash))
    }

    fn parse_argument(&mut self) -> Result<Expr> {
        let token = self.advance();

        match token.kind {
            TokenKind::Path(path) => Ok(Expr::Path(PathExpr::parse(&path))),
            TokenKind::Literal(literal) => Ok(Expr::Literal(literal_value(literal))),
            TokenKind::OpenParen => {
                let call = self.parse_call()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(Expr::SubExpr(Box::new(call)))
            }
            ref other => Err(self.error(&token, format!("expected argument, found {}", other))),
        }
    }

    /// Parse `{{> name context key=value}}` after the open marker
    fn parse_partial(&mut self) -> Result<PartialCall> {
        let token = self.advance();

        let name = match &token.kind {
            TokenKind::Path(name) | TokenKind::Literal(Literal::String(name)) => {
                PartialName::Static(name.clone())
            }
            TokenKind::OpenParen => {
                let call = self.parse_call()?;
                self.expect(TokenKind::CloseParen)?;
                PartialName::Dynamic(Box::new(call))
            }
            other => {
                return Err(self.error(&token, format!("expected partial name, found {}", other)))
            }
        };

        let (mut params, hash) = self.parse_arguments()?;
        if params.len() > 1 {
            return Err(self.error(&token, "partial accepts at most one context argument"));
        }
        self.expect_close()?;

        Ok(PartialCall {
            name,
            context: params.pop(),
            hash,
        })
    }
}

fn literal_value(literal: Literal) -> Value {
    match literal {
        Literal::String(s) => Value::String(s),
        Literal::Number(n) => Value::Number(n),
        Literal::Bool(b) => Value::Bool(b),
        Literal::Null => Value::Null,
    }
}

/// Parse a template source into a program
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source)?.parse()
}
