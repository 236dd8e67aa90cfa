use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    #[serde(rename = "ILLEGAL")]
    Illegal,
    #[serde(rename = "EOF")]
    EOF,

    // Identifiers + literals
    #[serde(rename = "IDENT")]
    Ident,
    #[serde(rename = "INT")]
    Int,
    #[serde(rename = "STRING")]
    String,

    // Operators
    #[serde(rename = "ASSIGN")]
    Assign, // =
    #[serde(rename = "PLUS")]
    Plus, // +
    #[serde(rename = "MINUS")]
    Minus, // -
    #[serde(rename = "BANG")]
    Bang, // !
    #[serde(rename = "ASTERISK")]
    Asterisk, // *
    #[serde(rename = "SLASH")]
    Slash, // /
    #[serde(rename = "LT")]
    Lt, // <
    #[serde(rename = "GT")]
    Gt, // >
    #[serde(rename = "EQ")]
    Eq, // ==
    #[serde(rename = "NOT_EQ")]
    NotEq, // !=

    // Delimiters
    #[serde(rename = "COMMA")]
    Comma, // ,
    #[serde(rename = "COLON")]
    Colon, // :
    #[serde(rename = "SEMICOLON")]
    Semicolon, // ;
    #[serde(rename = "LPAREN")]
    LParen, // (
    #[serde(rename = "RPAREN")]
    RParen, // )
    #[serde(rename = "LBRACE")]
    LBrace, // {
    #[serde(rename = "RBRACE")]
    RBrace, // }
    #[serde(rename = "LBRACKET")]
    LBracket, // [
    #[serde(rename = "RBRACKET")]
    RBracket, // ]

    // Keywords
    #[serde(rename = "FUNCTION")]
    Function,
    #[serde(rename = "LET")]
    Let,
    #[serde(rename = "TRUE")]
    True,
    #[serde(rename = "FALSE")]
    False,
    #[serde(rename = "IF")]
    If,
    #[serde(rename = "ELSE")]
    Else,
    #[serde(rename = "RETURN")]
    Return,
}

impl TokenKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Illegal => "ILLEGAL",
            Self::EOF => "EOF",
            Self::Ident => "IDENT",
            Self::Int => "INT",
            Self::String => "STRING",
            Self::Assign => "=",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Bang => "!",
            Self::Asterisk => "*",
            Self::Slash => "/",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Comma => ",",
            Self::Colon => ":",
            Self::Semicolon => ";",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::Function => "FUNCTION",
            Self::Let => "LET",
            Self::True => "TRUE",
            Self::False => "FALSE",
            Self::If => "IF",
            Self::Else => "ELSE",
            Self::Return => "RETURN",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exact-match keyword table; anything else scanned as a word is an identifier.
pub fn lookup_ident(ident: &str) -> TokenKind {
    match ident {
        "fn" => TokenKind::Function,
        "let" => TokenKind::Let,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "return" => TokenKind::Return,
        _ => TokenKind::Ident,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            literal: literal.into(),
            span,
        }
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn span(&self) -> Span {
        self.span
    }
}
