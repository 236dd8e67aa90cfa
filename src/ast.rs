//! Syntax tree produced by the parser.
//!
//! Every node renders (via `Display`) to the canonical, fully parenthesised
//! form used by tests: `-a * b` prints as `((-a) * b)`.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

#[derive(Debug, PartialEq, Clone, Default, Serialize)]
pub struct Program {
    pub statements: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Statement {
    Let { name: String, value: Expression },
    Return { value: Expression },
    Expression { expression: Expression },
}

#[derive(Debug, PartialEq, Clone, Default, Serialize)]
pub struct BlockStatement {
    pub statements: Vec<Statement>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum PrefixOperator {
    #[serde(rename = "!")]
    Bang,
    #[serde(rename = "-")]
    Minus,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum InfixOperator {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Expression {
    Identifier {
        name: String,
    },
    Integer {
        value: i64,
    },
    String {
        value: String,
    },
    Boolean {
        value: bool,
    },
    Array {
        elements: Vec<Expression>,
    },
    Hash {
        pairs: Vec<(Expression, Expression)>,
    },
    Function {
        parameters: Vec<String>,
        body: Rc<BlockStatement>,
        /// Binding name when the literal is the value of a `let`; lets the
        /// compiler resolve self references inside the body.
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Prefix {
        operator: PrefixOperator,
        operand: Box<Expression>,
    },
    Infix {
        operator: InfixOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    If {
        condition: Box<Expression>,
        consequence: BlockStatement,
        alternative: Option<BlockStatement>,
    },
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
    },
    Index {
        collection: Box<Expression>,
        index: Box<Expression>,
    },
}

impl Expression {
    pub fn identifier(name: impl Into<String>) -> Self {
        Self::Identifier { name: name.into() }
    }
}

impl PrefixOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bang => "!",
            Self::Minus => "-",
        }
    }
}

impl InfixOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::LessThan => "<",
            Self::GreaterThan => ">",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

impl fmt::Display for PrefixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for InfixOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{statement}")?;
        }
        Ok(())
    }
}

impl fmt::Display for BlockStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            write!(f, "{statement}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Let { name, value } => write!(f, "let {name} = {value};"),
            Statement::Return { value } => write!(f, "return {value};"),
            Statement::Expression { expression } => write!(f, "{expression}"),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier { name } => f.write_str(name),
            Expression::Integer { value } => write!(f, "{value}"),
            Expression::String { value } => f.write_str(value),
            Expression::Boolean { value } => write!(f, "{value}"),
            Expression::Array { elements } => write!(f, "[{}]", join(elements)),
            Expression::Hash { pairs } => {
                let rendered = pairs
                    .iter()
                    .map(|(key, value)| format!("{key}:{value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "{{{rendered}}}")
            }
            Expression::Function {
                parameters, body, ..
            } => write!(f, "fn({}){body}", parameters.join(", ")),
            Expression::Prefix { operator, operand } => write!(f, "({operator}{operand})"),
            Expression::Infix {
                operator,
                left,
                right,
            } => write!(f, "({left} {operator} {right})"),
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if{condition} {consequence}")?;
                if let Some(alternative) = alternative {
                    write!(f, "else {alternative}")?;
                }
                Ok(())
            }
            Expression::Call { callee, arguments } => write!(f, "{callee}({})", join(arguments)),
            Expression::Index { collection, index } => write!(f, "({collection}[{index}])"),
        }
    }
}
