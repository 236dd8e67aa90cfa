use std::{iter::Peekable, str::CharIndices};

use crate::token::{Span, Token, TokenKind, lookup_ident};

/// Something that turns source text into the token stream the parser consumes.
///
/// The stream must end with exactly one `EOF` token. Alternative scanners
/// (for example a generated one reached over FFI) plug in here as long as they
/// produce the same tokens as [`StandardTokenizer`] for the same input.
pub trait Tokenizer {
    fn tokenize(&self, input: &str) -> Vec<Token>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTokenizer;

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, input: &str) -> Vec<Token> {
        tokenize(input)
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    eof_emitted: bool,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            eof_emitted: false,
            line: 1,
            column: 0,
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let start_line = self.line;
        let start_column = self.column;
        let peeked = self.chars.peek().copied();
        let Some((start_idx, ch)) = peeked else {
            self.eof_emitted = true;
            let index = self.input.len();
            return Token::new(
                TokenKind::EOF,
                "",
                Span {
                    start: index,
                    end: index,
                    line: start_line,
                    column: start_column,
                },
            );
        };

        let single = |kind| (kind, 1);
        let (kind, width) = match ch {
            '=' if self.peek_second() == Some('=') => (TokenKind::Eq, 2),
            '!' if self.peek_second() == Some('=') => (TokenKind::NotEq, 2),
            '=' => single(TokenKind::Assign),
            '!' => single(TokenKind::Bang),
            '+' => single(TokenKind::Plus),
            '-' => single(TokenKind::Minus),
            '*' => single(TokenKind::Asterisk),
            '/' => single(TokenKind::Slash),
            '<' => single(TokenKind::Lt),
            '>' => single(TokenKind::Gt),
            ',' => single(TokenKind::Comma),
            ':' => single(TokenKind::Colon),
            ';' => single(TokenKind::Semicolon),
            '(' => single(TokenKind::LParen),
            ')' => single(TokenKind::RParen),
            '{' => single(TokenKind::LBrace),
            '}' => single(TokenKind::RBrace),
            '[' => single(TokenKind::LBracket),
            ']' => single(TokenKind::RBracket),
            '"' => return self.read_string(start_idx, start_line, start_column),
            c if is_letter(c) => {
                return self.read_identifier(start_idx, start_line, start_column);
            }
            c if c.is_ascii_digit() => {
                return self.read_integer(start_idx, start_line, start_column);
            }
            _ => (TokenKind::Illegal, 1),
        };

        let mut end_idx = start_idx;
        for _ in 0..width {
            if let Some((idx, c)) = self.advance_char() {
                end_idx = idx + c.len_utf8();
            }
        }
        Token::new(
            kind,
            &self.input[start_idx..end_idx],
            Span {
                start: start_idx,
                end: end_idx,
                line: start_line,
                column: start_column,
            },
        )
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_whitespace() {
                self.advance_char();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self, start: usize, line: usize, column: usize) -> Token {
        self.advance_char(); // Consume first char
        while let Some(&(_, c)) = self.chars.peek() {
            if is_letter(c) || c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        let ident = &self.input[start..end_idx];
        Token::new(
            lookup_ident(ident),
            ident,
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn read_integer(&mut self, start: usize, line: usize, column: usize) -> Token {
        self.advance_char(); // Consume first digit
        while let Some(&(_, c)) = self.chars.peek() {
            if c.is_ascii_digit() {
                self.advance_char();
            } else {
                break;
            }
        }

        let end_idx = self.current_index();
        // Range checking happens in the parser so overflow is reported as a
        // syntax error instead of a lexing failure.
        Token::new(
            TokenKind::Int,
            &self.input[start..end_idx],
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn read_string(&mut self, start: usize, line: usize, column: usize) -> Token {
        self.advance_char(); // Consume opening quote
        let content_start = start + 1;
        while let Some(&(idx, c)) = self.chars.peek() {
            self.advance_char();
            if c == '"' {
                return Token::new(
                    TokenKind::String,
                    &self.input[content_start..idx],
                    Span {
                        start,
                        end: idx + 1,
                        line,
                        column,
                    },
                );
            }
        }

        // Unterminated: hand the whole tail to the parser as one ILLEGAL token.
        let end_idx = self.input.len();
        Token::new(
            TokenKind::Illegal,
            &self.input[start..end_idx],
            Span {
                start,
                end: end_idx,
                line,
                column,
            },
        )
    }

    fn advance_char(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((_, c)) = next {
            if c == '\n' {
                self.line += 1;
                self.column = 0;
            } else {
                self.column += 1;
            }
        }
        next
    }

    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.peek().map(|&(_, c)| c)
    }

    fn current_index(&mut self) -> usize {
        self.chars
            .peek()
            .map(|(idx, _)| *idx)
            .unwrap_or(self.input.len())
    }
}

fn is_letter(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.eof_emitted {
            return None;
        }
        Some(self.next_token())
    }
}

/// Scans the whole input; the returned stream always ends with `EOF`.
pub fn tokenize(input: &str) -> Vec<Token> {
    Lexer::new(input).collect()
}
