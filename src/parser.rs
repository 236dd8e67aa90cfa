//! Pratt parser.
//!
//! Each token kind that can start an expression has a prefix rule, each token
//! that can continue one has an infix rule plus a binding precedence. Errors
//! are collected rather than returned: a broken statement is skipped up to the
//! next statement boundary and parsing carries on.

use std::rc::Rc;

use serde::Serialize;
use thiserror::Error;

use crate::ast::{
    BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement,
};
use crate::lexer::tokenize;
use crate::token::{Span, Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Deepest nesting of expressions and blocks accepted, counting chained
/// infix, call and index operators as one level each.
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,      // ==
    LessGreater, // > or <
    Sum,         // +
    Product,     // *
    Prefix,      // -X or !X
    Call,        // myFunction(X)
    Index,       // array[index]
}

fn precedence_of(kind: TokenKind) -> Precedence {
    match kind {
        TokenKind::Eq | TokenKind::NotEq => Precedence::Equals,
        TokenKind::Lt | TokenKind::Gt => Precedence::LessGreater,
        TokenKind::Plus | TokenKind::Minus => Precedence::Sum,
        TokenKind::Asterisk | TokenKind::Slash => Precedence::Product,
        TokenKind::LParen => Precedence::Call,
        TokenKind::LBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

type PrefixParseFn = fn(&mut Parser) -> Option<Expression>;
type InfixParseFn = fn(&mut Parser, Expression) -> Option<Expression>;

fn prefix_rule(kind: TokenKind) -> Option<PrefixParseFn> {
    let rule: PrefixParseFn = match kind {
        TokenKind::Ident => Parser::parse_identifier,
        TokenKind::Int => Parser::parse_integer_literal,
        TokenKind::String => Parser::parse_string_literal,
        TokenKind::True | TokenKind::False => Parser::parse_boolean,
        TokenKind::Bang | TokenKind::Minus => Parser::parse_prefix_expression,
        TokenKind::LParen => Parser::parse_grouped_expression,
        TokenKind::If => Parser::parse_if_expression,
        TokenKind::Function => Parser::parse_function_literal,
        TokenKind::LBracket => Parser::parse_array_literal,
        TokenKind::LBrace => Parser::parse_hash_literal,
        _ => return None,
    };
    Some(rule)
}

fn infix_rule(kind: TokenKind) -> Option<InfixParseFn> {
    let rule: InfixParseFn = match kind {
        TokenKind::Plus
        | TokenKind::Minus
        | TokenKind::Asterisk
        | TokenKind::Slash
        | TokenKind::Eq
        | TokenKind::NotEq
        | TokenKind::Lt
        | TokenKind::Gt => Parser::parse_infix_expression,
        TokenKind::LParen => Parser::parse_call_expression,
        TokenKind::LBracket => Parser::parse_index_expression,
        _ => return None,
    };
    Some(rule)
}

fn infix_operator(kind: TokenKind) -> Option<InfixOperator> {
    let operator = match kind {
        TokenKind::Plus => InfixOperator::Add,
        TokenKind::Minus => InfixOperator::Sub,
        TokenKind::Asterisk => InfixOperator::Mul,
        TokenKind::Slash => InfixOperator::Div,
        TokenKind::Lt => InfixOperator::LessThan,
        TokenKind::Gt => InfixOperator::GreaterThan,
        TokenKind::Eq => InfixOperator::Equal,
        TokenKind::NotEq => InfixOperator::NotEqual,
        _ => return None,
    };
    Some(operator)
}

pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        Self::from_tokens(tokenize(input))
    }

    /// Builds a parser over an already scanned stream. A missing trailing
    /// `EOF` is synthesised so the cursor never runs off the end.
    pub fn from_tokens(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(Token::kind) != Some(TokenKind::EOF) {
            let span = tokens.last().map(Token::span).unwrap_or_default();
            tokens.push(Token::new(TokenKind::EOF, "", span));
        }
        Self {
            tokens,
            position: 0,
            depth: 0,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.cur_is(TokenKind::EOF) {
            let start = self.position;
            match self.parse_statement() {
                Some(statement) => {
                    statements.push(statement);
                    self.next_token();
                }
                None => self.synchronize(start, false),
            }
        }
        Program { statements }
    }

    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur().kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let name = self.cur().literal.clone();
        if !self.expect_peek(TokenKind::Assign) {
            return None;
        }
        self.next_token();

        let mut value = self.parse_expression(Precedence::Lowest)?;
        if let Expression::Function { name: fn_name, .. } = &mut value {
            *fn_name = Some(name.clone());
        }

        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
        Some(Statement::Let { name, value })
    }

    fn parse_return_statement(&mut self) -> Option<Statement> {
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
        Some(Statement::Return { value })
    }

    fn parse_expression_statement(&mut self) -> Option<Statement> {
        let expression = self.parse_expression(Precedence::Lowest)?;
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
        }
        Some(Statement::Expression { expression })
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Option<Expression> {
        if !self.enter_nesting() {
            return None;
        }
        let expression = self.parse_operators(precedence);
        self.depth -= 1;
        expression
    }

    fn parse_operators(&mut self, precedence: Precedence) -> Option<Expression> {
        let Some(prefix) = prefix_rule(self.cur().kind) else {
            self.no_prefix_parse_fn_error();
            return None;
        };
        let mut left = prefix(self)?;

        let mut chained = 0;
        while !self.peek_is(TokenKind::Semicolon) && precedence < self.peek_precedence() {
            let Some(infix) = infix_rule(self.peek().kind) else {
                return Some(left);
            };
            chained += 1;
            if self.depth + chained > MAX_NESTING {
                self.nesting_error();
                return None;
            }
            self.next_token();
            left = infix(self, left)?;
        }

        Some(left)
    }

    fn parse_identifier(&mut self) -> Option<Expression> {
        Some(Expression::identifier(self.cur().literal.clone()))
    }

    fn parse_integer_literal(&mut self) -> Option<Expression> {
        let literal = &self.cur().literal;
        match literal.parse::<i64>() {
            Ok(value) => Some(Expression::Integer { value }),
            Err(_) => {
                let message = format!("could not parse {literal:?} as integer");
                self.error(message);
                None
            }
        }
    }

    fn parse_string_literal(&mut self) -> Option<Expression> {
        Some(Expression::String {
            value: self.cur().literal.clone(),
        })
    }

    fn parse_boolean(&mut self) -> Option<Expression> {
        Some(Expression::Boolean {
            value: self.cur_is(TokenKind::True),
        })
    }

    fn parse_prefix_expression(&mut self) -> Option<Expression> {
        let operator = if self.cur_is(TokenKind::Bang) {
            PrefixOperator::Bang
        } else {
            PrefixOperator::Minus
        };
        self.next_token();
        let operand = self.parse_expression(Precedence::Prefix)?;
        Some(Expression::Prefix {
            operator,
            operand: Box::new(operand),
        })
    }

    fn parse_infix_expression(&mut self, left: Expression) -> Option<Expression> {
        let kind = self.cur().kind;
        let operator = infix_operator(kind)?;
        let precedence = precedence_of(kind);
        self.next_token();
        let right = self.parse_expression(precedence)?;
        Some(Expression::Infix {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_grouped_expression(&mut self) -> Option<Expression> {
        self.next_token();
        let expression = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        Some(expression)
    }

    fn parse_if_expression(&mut self) -> Option<Expression> {
        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let consequence = self.parse_block_statement()?;

        let mut alternative = None;
        if self.peek_is(TokenKind::Else) {
            self.next_token();
            if !self.expect_peek(TokenKind::LBrace) {
                return None;
            }
            alternative = Some(self.parse_block_statement()?);
        }

        Some(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    /// Expects the cursor on `{` and leaves it on the matching `}`.
    fn parse_block_statement(&mut self) -> Option<BlockStatement> {
        if !self.enter_nesting() {
            return None;
        }
        let block = self.parse_block_body();
        self.depth -= 1;
        block
    }

    fn parse_block_body(&mut self) -> Option<BlockStatement> {
        self.next_token();
        let mut statements = Vec::new();
        while !self.cur_is(TokenKind::RBrace) && !self.cur_is(TokenKind::EOF) {
            let start = self.position;
            match self.parse_statement() {
                Some(statement) => {
                    statements.push(statement);
                    self.next_token();
                }
                None => self.synchronize(start, true),
            }
        }
        if self.cur_is(TokenKind::EOF) {
            self.error("expected }, got EOF instead");
            return None;
        }
        Some(BlockStatement { statements })
    }

    fn parse_function_literal(&mut self) -> Option<Expression> {
        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }
        let parameters = self.parse_function_parameters()?;
        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let body = self.parse_block_statement()?;
        Some(Expression::Function {
            parameters,
            body: Rc::new(body),
            name: None,
        })
    }

    fn parse_function_parameters(&mut self) -> Option<Vec<String>> {
        let mut parameters = Vec::new();
        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Some(parameters);
        }

        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        parameters.push(self.cur().literal.clone());
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            if !self.expect_peek(TokenKind::Ident) {
                return None;
            }
            parameters.push(self.cur().literal.clone());
        }

        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        Some(parameters)
    }

    fn parse_call_expression(&mut self, callee: Expression) -> Option<Expression> {
        let arguments = self.parse_expression_list(TokenKind::RParen)?;
        Some(Expression::Call {
            callee: Box::new(callee),
            arguments,
        })
    }

    fn parse_index_expression(&mut self, collection: Expression) -> Option<Expression> {
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::RBracket) {
            return None;
        }
        Some(Expression::Index {
            collection: Box::new(collection),
            index: Box::new(index),
        })
    }

    fn parse_array_literal(&mut self) -> Option<Expression> {
        let elements = self.parse_expression_list(TokenKind::RBracket)?;
        Some(Expression::Array { elements })
    }

    fn parse_hash_literal(&mut self) -> Option<Expression> {
        let mut pairs = Vec::new();
        while !self.peek_is(TokenKind::RBrace) {
            self.next_token();
            let key = self.parse_expression(Precedence::Lowest)?;
            if !self.expect_peek(TokenKind::Colon) {
                return None;
            }
            self.next_token();
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.peek_is(TokenKind::RBrace) && !self.expect_peek(TokenKind::Comma) {
                return None;
            }
        }
        if !self.expect_peek(TokenKind::RBrace) {
            return None;
        }
        Some(Expression::Hash { pairs })
    }

    /// Comma separated expressions; the cursor starts on the opening delimiter.
    fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<Expression>> {
        let mut list = Vec::new();
        if self.peek_is(end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);
        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }
        Some(list)
    }

    /// Skips the rest of a statement that failed to parse, `start` being the
    /// position of its first token.
    ///
    /// Stops after a `;` or before a `}` that closes the enclosing block, both
    /// at the brace depth the statement started at. Braces the statement had
    /// already opened are counted, so the `}` of an unfinished literal is not
    /// taken for the end of the block. At top level a stray `}` is consumed
    /// so the caller always makes progress.
    fn synchronize(&mut self, start: usize, in_block: bool) {
        let mut depth = self.tokens[start..self.position]
            .iter()
            .fold(0usize, |depth, token| match token.kind {
                TokenKind::LBrace => depth + 1,
                TokenKind::RBrace => depth.saturating_sub(1),
                _ => depth,
            });
        loop {
            match self.cur().kind {
                TokenKind::EOF => return,
                TokenKind::Semicolon if depth == 0 => {
                    self.next_token();
                    return;
                }
                TokenKind::RBrace if depth == 0 => {
                    if !in_block {
                        self.next_token();
                    }
                    return;
                }
                TokenKind::LBrace => depth += 1,
                TokenKind::RBrace => depth -= 1,
                _ => {}
            }
            self.next_token();
        }
    }

    fn enter_nesting(&mut self) -> bool {
        if self.depth >= MAX_NESTING {
            self.nesting_error();
            return false;
        }
        self.depth += 1;
        true
    }

    fn cur(&self) -> &Token {
        &self.tokens[self.position]
    }

    fn peek(&self) -> &Token {
        let index = (self.position + 1).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn next_token(&mut self) {
        if self.position + 1 < self.tokens.len() {
            self.position += 1;
        }
    }

    fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur().kind == kind
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn peek_precedence(&self) -> Precedence {
        precedence_of(self.peek().kind)
    }

    fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek_is(kind) {
            self.next_token();
            true
        } else {
            self.peek_error(kind);
            false
        }
    }

    fn peek_error(&mut self, expected: TokenKind) {
        let peek = self.peek();
        let error = ParseError::new(
            format!(
                "expected next token to be {expected}, got {} instead",
                describe(peek)
            ),
            peek.span,
        );
        self.errors.push(error);
    }

    fn no_prefix_parse_fn_error(&mut self) {
        let cur = self.cur();
        let error = ParseError::new(
            format!("no prefix parse function for {} found", describe(cur)),
            cur.span,
        );
        self.errors.push(error);
    }

    fn nesting_error(&mut self) {
        self.error("expression nested too deeply");
    }

    fn error(&mut self, message: impl Into<String>) {
        let span = self.cur().span;
        self.errors.push(ParseError::new(message, span));
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Illegal => format!("ILLEGAL {:?}", token.literal),
        kind => kind.to_string(),
    }
}

/// Parses `input`, returning the statements that parsed plus every syntax
/// error in source order.
pub fn parse(input: &str) -> (Program, Vec<ParseError>) {
    parse_tokens(tokenize(input))
}

pub fn parse_tokens(tokens: Vec<Token>) -> (Program, Vec<ParseError>) {
    let mut parser = Parser::from_tokens(tokens);
    let program = parser.parse_program();
    (program, parser.errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse_ok(input: &str) -> Program {
        let (program, errors) = parse(input);
        assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
        program
    }

    fn messages(input: &str) -> Vec<String> {
        parse(input).1.into_iter().map(|error| error.message).collect()
    }

    #[test]
    fn parses_let_and_return_statements() {
        let program = parse_ok("let x = 5; let y = true; return x;");
        assert_eq!(
            program.statements,
            vec![
                Statement::Let {
                    name: "x".to_string(),
                    value: Expression::Integer { value: 5 },
                },
                Statement::Let {
                    name: "y".to_string(),
                    value: Expression::Boolean { value: true },
                },
                Statement::Return {
                    value: Expression::identifier("x"),
                },
            ]
        );
    }

    #[test]
    fn operator_precedence() {
        let cases = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b - c", "((a + b) - c)"),
            ("a * b * c", "((a * b) * c)"),
            ("a + b / c", "(a + (b / c))"),
            ("1 + 2 * 3", "(1 + (2 * 3))"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("3 + 4; -5 * 5", "(3 + 4)((-5) * 5)"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("5 < 4 != 3 > 4", "((5 < 4) != (3 > 4))"),
            ("3 + 4 * 5 == 3 * 1 + 4 * 5", "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))"),
            ("true == !false", "(true == (!false))"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("(5 + 5) * 2", "((5 + 5) * 2)"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            (
                "add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))",
                "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)))",
            ),
            ("a * [1, 2, 3, 4][b * c] * d", "((a * ([1, 2, 3, 4][(b * c)])) * d)"),
            (
                "add(a * b[2], b[1], 2 * [1, 2][1])",
                "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))",
            ),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_ok(input).to_string(), expected, "input: {input}");
        }
    }

    #[test]
    fn parses_if_else_expression() {
        let program = parse_ok("if (x < y) { x } else { y }");
        assert_eq!(program.to_string(), "if(x < y) xelse y");
        let Statement::Expression {
            expression: Expression::If { alternative, .. },
        } = &program.statements[0]
        else {
            panic!("expected if expression");
        };
        assert!(alternative.is_some());
    }

    #[test]
    fn parses_function_literal_and_records_let_name() {
        let program = parse_ok("let add = fn(x, y) { x + y; };");
        let Statement::Let { value, .. } = &program.statements[0] else {
            panic!("expected let statement");
        };
        let Expression::Function {
            parameters,
            body,
            name,
        } = value
        else {
            panic!("expected function literal");
        };
        assert_eq!(parameters, &vec!["x".to_string(), "y".to_string()]);
        assert_eq!(body.to_string(), "(x + y)");
        assert_eq!(name.as_deref(), Some("add"));
        assert_eq!(program.to_string(), "let add = fn(x, y)(x + y);");
    }

    #[test]
    fn parses_function_parameter_lists() {
        for (input, expected) in [
            ("fn() {};", vec![]),
            ("fn(x) {};", vec!["x"]),
            ("fn(x, y, z) {};", vec!["x", "y", "z"]),
        ] {
            let program = parse_ok(input);
            let Statement::Expression {
                expression: Expression::Function { parameters, .. },
            } = &program.statements[0]
            else {
                panic!("expected function literal");
            };
            assert_eq!(parameters, &expected);
        }
    }

    #[test]
    fn parses_hash_literals() {
        assert_eq!(parse_ok("{}").to_string(), "{}");
        assert_eq!(
            parse_ok(r#"{"one": 0 + 1, "two": 10 - 8}"#).to_string(),
            "{one:(0 + 1), two:(10 - 8)}"
        );
        let program = parse_ok(r#"{1: true, "a": 2, false: "x"}"#);
        let Statement::Expression {
            expression: Expression::Hash { pairs },
        } = &program.statements[0]
        else {
            panic!("expected hash literal");
        };
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn reports_missing_expression_without_panicking() {
        let errors = messages("let x = ;");
        assert_eq!(errors, vec!["no prefix parse function for ; found"]);
    }

    #[test]
    fn collects_errors_across_statements() {
        let input = indoc! {"
            let x 5;
            let = 10;
            let 838383;
            let ok = 1;
        "};
        let (program, errors) = parse(input);
        let errors = errors.into_iter().map(|error| error.message).collect::<Vec<_>>();
        assert_eq!(
            errors,
            vec![
                "expected next token to be =, got INT instead",
                "expected next token to be IDENT, got = instead",
                "expected next token to be IDENT, got INT instead",
            ]
        );
        assert_eq!(program.to_string(), "let ok = 1;");
    }

    #[test]
    fn recovers_inside_blocks() {
        let (program, errors) = parse("let f = fn(x) { let = 1; x * 2 }; f(2);");
        assert_eq!(errors.len(), 1);
        assert_eq!(program.to_string(), "let f = fn(x)(x * 2);f(2)");
    }

    #[test]
    fn reports_illegal_tokens_and_integer_overflow() {
        assert_eq!(
            messages("1 + @"),
            vec![r#"no prefix parse function for ILLEGAL "@" found"#]
        );
        assert_eq!(
            messages("99999999999999999999"),
            vec![r#"could not parse "99999999999999999999" as integer"#]
        );
    }

    #[test]
    fn unterminated_block_is_an_error() {
        assert_eq!(messages("if (x) { 1"), vec!["expected }, got EOF instead"]);
    }

    #[test]
    fn parser_over_token_stream_without_eof() {
        let mut tokens = tokenize("1 + 2");
        tokens.pop();
        let mut parser = Parser::from_tokens(tokens);
        let program = parser.parse_program();
        assert!(parser.errors().is_empty());
        assert_eq!(program.to_string(), "(1 + 2)");

        let mut parser = Parser::new("let;");
        parser.parse_program();
        assert_eq!(parser.errors().len(), 1);
    }

    #[test]
    fn failed_hash_literal_does_not_close_the_block() {
        let (program, errors) = parse("let f = fn() { let a = {1: }; 2 }; f();");
        let errors = errors.into_iter().map(|error| error.message).collect::<Vec<_>>();
        assert_eq!(errors, vec!["no prefix parse function for } found"]);
        assert_eq!(program.to_string(), "let f = fn()2;f()");
    }

    #[test]
    fn rejects_input_nested_too_deeply() {
        let parens = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        assert_eq!(messages(&parens), vec!["expression nested too deeply"]);

        let blocks = format!("{}1{}", "if (true) { ".repeat(5_000), " }".repeat(5_000));
        assert_eq!(messages(&blocks), vec!["expression nested too deeply"]);

        let chain = format!("{}1", "1 + ".repeat(1_000));
        assert_eq!(messages(&chain), vec!["expression nested too deeply"]);

        let prefixes = format!("{}1", "-".repeat(10_000));
        assert_eq!(messages(&prefixes), vec!["expression nested too deeply"]);
    }

    #[test]
    fn accepts_nesting_below_the_limit() {
        let source = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(parse_ok(&source).to_string(), "1");

        let sum = format!("{}1", "1 + ".repeat(100));
        assert!(parse(&sum).1.is_empty());
    }

    #[test]
    fn stray_closing_brace_does_not_stall() {
        let (program, errors) = parse("} 1;");
        assert_eq!(errors.len(), 1);
        assert_eq!(program.to_string(), "1");
    }
}
