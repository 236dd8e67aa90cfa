use std::rc::Rc;

use anyhow::{Result, bail};

use crate::ast::{BlockStatement, Expression, Program, Statement};
use crate::backend::{Backend, Execution, PreparedBackend};
use crate::object::operators;
use crate::object::{Builtins, Environment, Function, Object, RuntimeError, ScopeId};

/// Tree-walking evaluator. Bindings persist across `eval_program` calls, so
/// one instance backs a whole REPL session.
pub struct Evaluator {
    env: Environment,
    builtins: Rc<Builtins>,
    output: Vec<String>,
}

impl Evaluator {
    pub fn new(builtins: Rc<Builtins>) -> Self {
        Self {
            env: Environment::new(),
            builtins,
            output: Vec::new(),
        }
    }

    /// Evaluates every statement in order and returns the value of the last
    /// one. A `let` has no value. Evaluation stops at the first error or
    /// top-level `return`.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = program.statements.len()))]
    pub fn eval_program(&mut self, program: &Program) -> Option<Object> {
        let scope = self.env.global();
        let mut result = None;
        for statement in &program.statements {
            match self.eval_statement(statement, scope) {
                Some(Object::ReturnValue(value)) => return Some(*value),
                Some(error @ Object::Error(_)) => {
                    tracing::debug!(%error, "evaluation stopped");
                    return Some(error);
                }
                value => result = value,
            }
        }
        result
    }

    /// Drains what `puts` has written so far.
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    fn eval_block(&mut self, block: &BlockStatement, scope: ScopeId) -> Object {
        let mut result = None;
        for statement in &block.statements {
            let value = self.eval_statement(statement, scope);
            if let Some(value) = &value
                && is_abrupt(value)
            {
                return value.clone();
            }
            result = value;
        }
        result.unwrap_or(Object::Null)
    }

    fn eval_statement(&mut self, statement: &Statement, scope: ScopeId) -> Option<Object> {
        match statement {
            Statement::Let { name, value } => {
                let value = self.eval_expression(value, scope);
                if is_abrupt(&value) {
                    return Some(value);
                }
                self.env.set(scope, name.as_str(), value);
                None
            }
            Statement::Return { value } => {
                let value = self.eval_expression(value, scope);
                if is_abrupt(&value) {
                    return Some(value);
                }
                Some(Object::ReturnValue(Box::new(value)))
            }
            Statement::Expression { expression } => Some(self.eval_expression(expression, scope)),
        }
    }

    fn eval_expression(&mut self, expression: &Expression, scope: ScopeId) -> Object {
        match expression {
            Expression::Integer { value } => Object::Integer(*value),
            Expression::String { value } => Object::String(value.clone()),
            Expression::Boolean { value } => Object::Boolean(*value),
            Expression::Identifier { name } => self.eval_identifier(name, scope),
            Expression::Array { elements } => match self.eval_expressions(elements, scope) {
                Ok(elements) => Object::Array(elements),
                Err(abrupt) => abrupt,
            },
            Expression::Hash { pairs } => self.eval_hash(pairs, scope),
            Expression::Function {
                parameters, body, ..
            } => Object::Function(Function {
                parameters: parameters.clone(),
                body: Rc::clone(body),
                scope,
            }),
            Expression::Prefix { operator, operand } => {
                let operand = self.eval_expression(operand, scope);
                if is_abrupt(&operand) {
                    return operand;
                }
                in_band(operators::prefix(*operator, &operand))
            }
            Expression::Infix {
                operator,
                left,
                right,
            } => {
                let left = self.eval_expression(left, scope);
                if is_abrupt(&left) {
                    return left;
                }
                let right = self.eval_expression(right, scope);
                if is_abrupt(&right) {
                    return right;
                }
                in_band(operators::infix(*operator, &left, &right))
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                let condition = self.eval_expression(condition, scope);
                if is_abrupt(&condition) {
                    return condition;
                }
                if condition.is_truthy() {
                    self.eval_block(consequence, scope)
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, scope)
                } else {
                    Object::Null
                }
            }
            Expression::Call { callee, arguments } => {
                let callee = self.eval_expression(callee, scope);
                if is_abrupt(&callee) {
                    return callee;
                }
                match self.eval_expressions(arguments, scope) {
                    Ok(arguments) => self.apply(callee, arguments),
                    Err(abrupt) => abrupt,
                }
            }
            Expression::Index { collection, index } => {
                let collection = self.eval_expression(collection, scope);
                if is_abrupt(&collection) {
                    return collection;
                }
                let index = self.eval_expression(index, scope);
                if is_abrupt(&index) {
                    return index;
                }
                in_band(operators::index(&collection, &index))
            }
        }
    }

    fn eval_identifier(&self, name: &str, scope: ScopeId) -> Object {
        if let Some(value) = self.env.get(scope, name) {
            return value.clone();
        }
        match self.builtins.lookup(name) {
            Some(builtin) => Object::Builtin(builtin),
            None => RuntimeError::IdentifierNotFound(name.to_string()).into(),
        }
    }

    /// Evaluates left to right, stopping at the first error or return.
    fn eval_expressions(
        &mut self,
        expressions: &[Expression],
        scope: ScopeId,
    ) -> Result<Vec<Object>, Object> {
        let mut values = Vec::with_capacity(expressions.len());
        for expression in expressions {
            let value = self.eval_expression(expression, scope);
            if is_abrupt(&value) {
                return Err(value);
            }
            values.push(value);
        }
        Ok(values)
    }

    fn eval_hash(&mut self, pairs: &[(Expression, Expression)], scope: ScopeId) -> Object {
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let key = self.eval_expression(key, scope);
            if is_abrupt(&key) {
                return key;
            }
            if let Err(error) = operators::hash_key(&key) {
                return error.into();
            }
            let value = self.eval_expression(value, scope);
            if is_abrupt(&value) {
                return value;
            }
            entries.push((key, value));
        }
        in_band(operators::build_hash(entries))
    }

    fn apply(&mut self, callee: Object, arguments: Vec<Object>) -> Object {
        match callee {
            Object::Function(function) => {
                if function.parameters.len() != arguments.len() {
                    return RuntimeError::WrongArgumentCount {
                        want: function.parameters.len(),
                        got: arguments.len(),
                    }
                    .into();
                }
                let call_scope = self.env.enclosed(function.scope);
                for (parameter, argument) in function.parameters.iter().zip(arguments) {
                    self.env.set(call_scope, parameter.as_str(), argument);
                }
                match self.eval_block(&function.body, call_scope) {
                    Object::ReturnValue(value) => *value,
                    value => value,
                }
            }
            Object::Builtin(builtin) => builtin.call(&arguments, &mut self.output),
            other => RuntimeError::NotCallable(other.object_type()).into(),
        }
    }
}

impl From<RuntimeError> for Object {
    fn from(error: RuntimeError) -> Self {
        Object::Error(error.to_string())
    }
}

fn in_band(result: Result<Object, RuntimeError>) -> Object {
    result.unwrap_or_else(Object::from)
}

/// Values that end evaluation of the enclosing construct early.
fn is_abrupt(value: &Object) -> bool {
    matches!(value, Object::ReturnValue(_) | Object::Error(_))
}

/// Backend running programs through the tree-walking evaluator.
pub struct TreeWalker {
    builtins: Rc<Builtins>,
}

impl TreeWalker {
    pub fn new(builtins: Rc<Builtins>) -> Self {
        Self { builtins }
    }
}

impl Default for TreeWalker {
    fn default() -> Self {
        Self::new(Rc::new(Builtins::standard()))
    }
}

/// A parsed program ready for one-shot evaluation.
pub struct PreparedTreeWalker {
    program: Program,
    builtins: Rc<Builtins>,
}

impl PreparedBackend for PreparedTreeWalker {
    fn run(&self) -> Result<Execution> {
        let mut evaluator = Evaluator::new(Rc::clone(&self.builtins));
        let value = evaluator.eval_program(&self.program);
        if let Some(Object::Error(message)) = &value {
            bail!("{message}");
        }
        Ok(Execution {
            value,
            output: evaluator.take_output(),
        })
    }
}

impl Backend for TreeWalker {
    fn name(&self) -> &'static str {
        "evaluator"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        Ok(Box::new(PreparedTreeWalker {
            program: program.clone(),
            builtins: Rc::clone(&self.builtins),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn eval(source: &str) -> Option<Object> {
        let (program, errors) = parser::parse(source);
        assert!(errors.is_empty(), "parse errors for {source:?}: {errors:?}");
        Evaluator::new(Rc::new(Builtins::standard())).eval_program(&program)
    }

    fn eval_value(source: &str) -> Object {
        eval(source).unwrap_or_else(|| panic!("no value for {source:?}"))
    }

    #[test]
    fn evaluates_integer_expressions() {
        let cases = [
            ("5", 5),
            ("-10", -10),
            ("5 + 5 + 5 + 5 - 10", 10),
            ("2 * 2 * 2 * 2 * 2", 32),
            ("50 / 2 * 2 + 10", 60),
            ("3 * (3 * 3) + 10", 37),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
        ];
        for (source, expected) in cases {
            assert_eq!(eval_value(source), Object::Integer(expected), "{source}");
        }
    }

    #[test]
    fn evaluates_boolean_expressions() {
        let cases = [
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("true == true", true),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("!5", false),
            ("!!5", true),
            ("!0", false),
            ("\"a\" == \"a\"", true),
            ("1 == true", false),
        ];
        for (source, expected) in cases {
            assert_eq!(eval_value(source), Object::Boolean(expected), "{source}");
        }
    }

    #[test]
    fn evaluates_conditionals() {
        assert_eq!(eval_value("if (true) { 10 }"), Object::Integer(10));
        assert_eq!(eval_value("if (false) { 10 }"), Object::Null);
        assert_eq!(eval_value("if (0) { 10 } else { 20 }"), Object::Integer(10));
        assert_eq!(eval_value("if (1 > 2) { 10 } else { 20 }"), Object::Integer(20));
        assert_eq!(eval_value("if (true) { let x = 1; }"), Object::Null);
    }

    #[test]
    fn return_escapes_nested_blocks() {
        let source = indoc! {"
            if (10 > 1) {
              if (10 > 1) {
                return 10;
              }
              return 1;
            }
        "};
        assert_eq!(eval_value(source), Object::Integer(10));
        assert_eq!(eval_value("9; return 2 * 5; 9;"), Object::Integer(10));
    }

    #[test]
    fn errors_propagate_and_stop_evaluation() {
        let cases = [
            ("5 + true;", "type mismatch: INTEGER + BOOLEAN"),
            ("5 + true; 5;", "type mismatch: INTEGER + BOOLEAN"),
            ("-true", "unknown operator: -BOOLEAN"),
            ("true + false;", "unknown operator: BOOLEAN + BOOLEAN"),
            (
                "if (10 > 1) { if (10 > 1) { return true + false; } return 1; }",
                "unknown operator: BOOLEAN + BOOLEAN",
            ),
            ("foobar", "identifier not found: foobar"),
            ("\"Hello\" - \"World\"", "unknown operator: STRING - STRING"),
            (
                "{\"name\": \"Monkey\"}[fn(x) { x }];",
                "unusable as hash key: FUNCTION",
            ),
            ("1 / 0", "division by zero"),
            ("1(2)", "not a function: INTEGER"),
            ("1[0]", "index operator not supported: INTEGER"),
            ("fn(a, b) { a }(1)", "wrong number of arguments: want=2, got=1"),
        ];
        for (source, expected) in cases {
            assert_eq!(eval_value(source), Object::error(expected), "{source}");
        }
    }

    #[test]
    fn let_bindings_have_no_value_but_persist() {
        assert_eq!(eval("let a = 5;"), None);
        assert_eq!(eval_value("let a = 5; let b = a; let c = a + b + 5; c;"), Object::Integer(15));
    }

    #[test]
    fn functions_and_closures() {
        assert_eq!(
            eval_value("let identity = fn(x) { x; }; identity(5);"),
            Object::Integer(5)
        );
        assert_eq!(eval_value("fn(x) { x; }(5)"), Object::Integer(5));

        let source = indoc! {"
            let newAdder = fn(x) {
              fn(y) { x + y };
            };
            let addTwo = newAdder(2);
            addTwo(2);
        "};
        assert_eq!(eval_value(source), Object::Integer(4));
    }

    #[test]
    fn closures_share_their_defining_scope() {
        let source = indoc! {"
            let x = 1;
            let read = fn() { x };
            let x = 2;
            read();
        "};
        assert_eq!(eval_value(source), Object::Integer(2));
    }

    #[test]
    fn recursion_through_let_binding() {
        let source = indoc! {"
            let fib = fn(n) {
              if (n < 2) { return n; }
              fib(n - 1) + fib(n - 2)
            };
            fib(15);
        "};
        assert_eq!(eval_value(source), Object::Integer(610));
    }

    #[test]
    fn strings_arrays_and_hashes() {
        assert_eq!(
            eval_value("\"Hello\" + \" \" + \"World!\""),
            Object::String("Hello World!".into())
        );
        assert_eq!(eval_value("[1, 2 * 2, 3 + 3][1]"), Object::Integer(4));
        assert_eq!(eval_value("[1, 2, 3][3]"), Object::Null);
        assert_eq!(eval_value("[1, 2, 3][-1]"), Object::Null);

        let source = indoc! {r#"
            let two = "two";
            let h = {"one": 10 - 9, two: 1 + 1, "thr" + "ee": 6 / 2, 4: 4, true: 5, false: 6};
            h["one"] + h["two"] + h["three"] + h[4] + h[true] + h[false]
        "#};
        assert_eq!(eval_value(source), Object::Integer(21));
        assert_eq!(eval_value("{}[\"missing\"]"), Object::Null);
    }

    #[test]
    fn builtins_resolve_after_bindings() {
        assert_eq!(eval_value("len(\"four\")"), Object::Integer(4));
        assert_eq!(eval_value("let len = fn(x) { 0 }; len(\"four\")"), Object::Integer(0));
        assert_eq!(eval_value("rest(push([1], 2))"), eval_value("[2]"));
        assert_eq!(
            eval_value("len(1)"),
            Object::error("argument to `len` not supported, got=INTEGER")
        );
    }

    #[test]
    fn puts_collects_output_and_state_persists() {
        let mut evaluator = Evaluator::new(Rc::new(Builtins::standard()));
        let (first, _) = parser::parse("let greeting = \"hi\"; puts(greeting, 1);");
        let (second, _) = parser::parse("greeting");

        assert_eq!(evaluator.eval_program(&first), Some(Object::Null));
        assert_eq!(evaluator.take_output(), vec!["hi".to_string(), "1".to_string()]);
        assert_eq!(evaluator.eval_program(&second), Some(Object::String("hi".into())));
        assert!(evaluator.take_output().is_empty());
    }

    #[test]
    fn backend_reports_errors_as_failures() {
        let backend = TreeWalker::default();
        let (program, _) = parser::parse("puts(1); 5 + true");
        let error = backend.run(&program).expect_err("runtime error");
        assert_eq!(error.to_string(), "type mismatch: INTEGER + BOOLEAN");

        let (program, _) = parser::parse("puts(1); 2");
        let execution = backend.run(&program).expect("runs");
        assert_eq!(execution.value, Some(Object::Integer(2)));
        assert_eq!(execution.output, vec!["1".to_string()]);
    }
}
