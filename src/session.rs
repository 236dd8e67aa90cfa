//! One interactive session over the toolchain.
//!
//! Tree-walking bindings live in the session's evaluator; compiled bindings
//! live in the symbol table, constant pool and globals carried from one
//! `run` to the next. The two never see each other's definitions.

use std::rc::Rc;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::ast::Program;
use crate::code::Instructions;
use crate::compiler::{Bytecode, CompileError, Compiler, SymbolTable};
use crate::evaluator::Evaluator;
use crate::lexer::{StandardTokenizer, Tokenizer};
use crate::object::{Builtins, Object};
use crate::parser::{self, ParseError};
use crate::token::Token;
use crate::vm::{GLOBALS_SIZE, Vm, VmError};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    #[error("{}", render_parse_errors(.0))]
    Syntax(Vec<ParseError>),
    #[error("compilation failed: {0}")]
    Compile(#[from] CompileError),
    #[error("executing bytecode failed: {0}")]
    Runtime(#[from] VmError),
}

fn render_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|error| format!("parser error: {error}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseResult {
    pub program: Program,
    pub errors: Vec<ParseError>,
}

/// Outcome of evaluating or running one input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    #[serde(serialize_with = "serialize_inspected")]
    pub value: Option<Object>,
    pub output: Vec<String>,
}

fn serialize_inspected<S: Serializer>(value: &Option<Object>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(value) => serializer.serialize_some(&value.inspect()),
        None => serializer.serialize_none(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstantView {
    pub kind: &'static str,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disassembly: Option<String>,
}

/// Serializable rendering of compiled bytecode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BytecodeView {
    pub instructions: Instructions,
    pub disassembly: String,
    pub constants: Vec<ConstantView>,
}

impl From<&Bytecode> for BytecodeView {
    fn from(bytecode: &Bytecode) -> Self {
        let constants = bytecode
            .constants
            .iter()
            .map(|constant| ConstantView {
                kind: constant.object_type().name(),
                value: constant.inspect(),
                disassembly: match constant {
                    Object::CompiledFunction(function) => Some(function.instructions.to_string()),
                    _ => None,
                },
            })
            .collect();
        Self {
            instructions: bytecode.instructions.clone(),
            disassembly: bytecode.instructions.to_string(),
            constants,
        }
    }
}

pub struct Session {
    tokenizer: Box<dyn Tokenizer>,
    builtins: Rc<Builtins>,
    evaluator: Evaluator,
    symbol_table: SymbolTable,
    constants: Vec<Object>,
    globals: Vec<Object>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_tokenizer(StandardTokenizer)
    }

    /// Uses `tokenizer` in place of the built-in lexer for every stage.
    pub fn with_tokenizer(tokenizer: impl Tokenizer + 'static) -> Self {
        let builtins = Rc::new(Builtins::standard());
        Self {
            tokenizer: Box::new(tokenizer),
            evaluator: Evaluator::new(Rc::clone(&builtins)),
            builtins,
            symbol_table: SymbolTable::new(),
            constants: Vec::new(),
            globals: vec![Object::Null; GLOBALS_SIZE],
        }
    }

    pub fn tokenize(&self, source: &str) -> Vec<Token> {
        self.tokenizer.tokenize(source)
    }

    #[tracing::instrument(level = "debug", skip_all)]
    pub fn parse(&self, source: &str) -> ParseResult {
        let (program, errors) = parser::parse_tokens(self.tokenize(source));
        tracing::debug!(
            statements = program.statements.len(),
            errors = errors.len(),
            "parsed input"
        );
        ParseResult { program, errors }
    }

    fn parse_valid(&self, source: &str) -> Result<Program, SessionError> {
        let ParseResult { program, errors } = self.parse(source);
        if errors.is_empty() {
            Ok(program)
        } else {
            Err(SessionError::Syntax(errors))
        }
    }

    /// Evaluates with the tree-walking evaluator against the session's
    /// bindings. Runtime failures come back as an `Error` value.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn evaluate(&mut self, source: &str) -> Result<Evaluation, SessionError> {
        let program = self.parse_valid(source)?;
        let value = self.evaluator.eval_program(&program);
        Ok(Evaluation {
            value,
            output: self.evaluator.take_output(),
        })
    }

    /// Compiles `source` on its own, without session bindings.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn compile(&self, source: &str) -> Result<Bytecode, SessionError> {
        let program = self.parse_valid(source)?;
        let mut compiler = Compiler::new(Rc::clone(&self.builtins));
        compiler.compile(&program)?;
        Ok(compiler.bytecode())
    }

    /// Compiles and executes on the virtual machine, keeping globals for the
    /// next call.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn run(&mut self, source: &str) -> Result<Evaluation, SessionError> {
        let program = self.parse_valid(source)?;

        // A failed compilation leaves no definitions or constants behind.
        let symbols_before = self.symbol_table.clone();
        let constants_before = self.constants.len();
        let mut compiler = Compiler::new_with_state(
            std::mem::take(&mut self.symbol_table),
            std::mem::take(&mut self.constants),
            Rc::clone(&self.builtins),
        );
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        (self.symbol_table, self.constants) = compiler.into_state();
        if let Err(error) = compiled {
            self.symbol_table = symbols_before;
            self.constants.truncate(constants_before);
            return Err(error.into());
        }

        let mut vm = Vm::new_with_globals(
            bytecode,
            std::mem::take(&mut self.globals),
            Rc::clone(&self.builtins),
        );
        let value = vm.run();
        let output = vm.take_output();
        self.globals = vm.into_globals();
        Ok(Evaluation {
            value: value?,
            output,
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Span, TokenKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn evaluate_keeps_bindings_between_inputs() {
        let mut session = Session::new();
        let first = session.evaluate("let x = 5; puts(x);").expect("evaluates");
        assert_eq!(first.value, Some(Object::Null));
        assert_eq!(first.output, vec!["5".to_string()]);

        let second = session.evaluate("x * 2").expect("evaluates");
        assert_eq!(second.value, Some(Object::Integer(10)));
    }

    #[test]
    fn run_keeps_globals_between_inputs() {
        let mut session = Session::new();
        session.run("let add = fn(a, b) { a + b }; let x = 40;").expect("runs");
        let result = session.run("add(x, 2)").expect("runs");
        assert_eq!(result.value, Some(Object::Integer(42)));
    }

    #[test]
    fn run_recovers_after_a_compile_error() {
        let mut session = Session::new();
        session.run("let a = 1;").expect("runs");
        let error = session.run("missing").expect_err("undefined");
        assert_eq!(error.to_string(), "compilation failed: undefined variable missing");
        let result = session.run("a + 1").expect("runs");
        assert_eq!(result.value, Some(Object::Integer(2)));

        session.run("fn(x) { x + missing }").expect_err("undefined inside a function");
        session.run("let b = a * 3;").expect("runs at top level again");
        let result = session.run("b").expect("runs");
        assert_eq!(result.value, Some(Object::Integer(3)));

        session.run("let y = 1; zz").expect_err("undefined zz");
        let error = session.run("y").expect_err("y was never defined");
        assert_eq!(error.to_string(), "compilation failed: undefined variable y");
    }

    #[test]
    fn closure_capture_differs_between_branches() {
        let source = "fn() { let x = 1; let g = fn() { x }; let x = 2; g() }()";
        let mut session = Session::new();
        let evaluated = session.evaluate(source).expect("evaluates");
        assert_eq!(evaluated.value, Some(Object::Integer(2)));
        let ran = session.run(source).expect("runs");
        assert_eq!(ran.value, Some(Object::Integer(1)));
    }

    #[test]
    fn deeply_nested_input_is_a_syntax_error() {
        let source = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
        let mut session = Session::new();
        let error = session.run(&source).expect_err("too deep");
        assert!(matches!(error, SessionError::Syntax(_)));
        assert!(error.to_string().contains("expression nested too deeply"));
    }

    #[test]
    fn evaluator_keeps_errors_in_band_while_vm_fails() {
        let mut session = Session::new();
        let evaluated = session.evaluate("1 + true").expect("evaluates");
        assert_eq!(
            evaluated.value,
            Some(Object::error("type mismatch: INTEGER + BOOLEAN"))
        );

        let error = session.run("1 + true").expect_err("vm error");
        assert_eq!(
            error.to_string(),
            "executing bytecode failed: type mismatch: INTEGER + BOOLEAN"
        );
    }

    #[test]
    fn syntax_errors_are_reported_together() {
        let session = Session::new();
        let parsed = session.parse("let = 1; let x 2;");
        assert_eq!(parsed.errors.len(), 2);

        let mut session = Session::new();
        let error = session.evaluate("let x = ;").expect_err("syntax error");
        assert!(matches!(error, SessionError::Syntax(ref errors) if !errors.is_empty()));
        assert!(error.to_string().starts_with("parser error: "));
    }

    #[test]
    fn compile_renders_a_bytecode_view() {
        let session = Session::new();
        let bytecode = session.compile("fn(x) { x }(1)").expect("compiles");
        let view = BytecodeView::from(&bytecode);
        assert_eq!(
            view.disassembly,
            "0000 OpClosure 0 0\n0004 OpConstant 1\n0007 OpCall 1\n0009 OpNop\n"
        );
        assert_eq!(view.constants[0].kind, "COMPILED_FUNCTION");
        assert_eq!(
            view.constants[0].disassembly.as_deref(),
            Some("0000 OpGetLocal 0\n0002 OpReturnValue\n")
        );
        assert_eq!(view.constants[1].value, "1");

        let json = serde_json::to_value(&view).expect("serializes");
        assert_eq!(json["instructions"][0], serde_json::json!(view.instructions[0]));
    }

    struct ShoutingTokenizer;

    impl Tokenizer for ShoutingTokenizer {
        fn tokenize(&self, _input: &str) -> Vec<Token> {
            vec![
                Token::new(TokenKind::Int, "7", Span::default()),
                Token::new(TokenKind::EOF, "", Span::default()),
            ]
        }
    }

    #[test]
    fn custom_tokenizers_feed_every_stage() {
        let mut session = Session::with_tokenizer(ShoutingTokenizer);
        assert_eq!(session.tokenize("ignored").len(), 2);
        let result = session.evaluate("ignored").expect("evaluates");
        assert_eq!(result.value, Some(Object::Integer(7)));
        let result = session.run("ignored").expect("runs");
        assert_eq!(result.value, Some(Object::Integer(7)));
    }
}
