use std::rc::Rc;

use thiserror::Error;

use crate::ast::{BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement};
use crate::code::{Instructions, Opcode, make};
use crate::object::{Builtins, CompiledFunction, Object};

pub mod symbol_table;

pub use symbol_table::{Symbol, SymbolScope, SymbolTable};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("undefined variable {0}")]
    UndefinedVariable(String),
    #[error("operand {operand} of {opcode} exceeds the maximum of {max}")]
    OperandOutOfRange {
        opcode: &'static str,
        operand: usize,
        max: usize,
    },
    #[error("left a compilation scope that was never entered")]
    ScopeUnderflow,
}

/// Compiled program: top-level instructions plus the constant pool they
/// reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Object>,
}

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Opcode,
    position: usize,
}

#[derive(Debug, Default)]
struct CompilationScope {
    instructions: Instructions,
    last: Option<EmittedInstruction>,
}

pub struct Compiler {
    constants: Vec<Object>,
    symbol_table: SymbolTable,
    scope: CompilationScope,
    enclosing: Vec<CompilationScope>,
    builtins: Rc<Builtins>,
}

impl Compiler {
    pub fn new(builtins: Rc<Builtins>) -> Self {
        Self::new_with_state(SymbolTable::new(), Vec::new(), builtins)
    }

    /// Resumes from the globals and constants of an earlier compilation so
    /// successive REPL inputs see each other's bindings.
    pub fn new_with_state(
        symbol_table: SymbolTable,
        constants: Vec<Object>,
        builtins: Rc<Builtins>,
    ) -> Self {
        Self {
            constants,
            symbol_table,
            scope: CompilationScope::default(),
            enclosing: Vec::new(),
            builtins,
        }
    }

    /// Compiles a whole program. The value of a trailing expression
    /// statement stays on the stack instead of being popped.
    #[tracing::instrument(level = "debug", skip_all, fields(statements = program.statements.len()))]
    pub fn compile(&mut self, program: &Program) -> Result<(), CompileError> {
        for statement in &program.statements {
            self.compile_statement(statement)?;
        }
        if let Some(last) = self.scope.last
            && last.opcode == Opcode::Pop
        {
            self.scope
                .instructions
                .replace(last.position, &make(Opcode::Nop, &[]));
            self.scope.last = Some(EmittedInstruction {
                opcode: Opcode::Nop,
                position: last.position,
            });
        }
        tracing::debug!(
            bytes = self.scope.instructions.len(),
            constants = self.constants.len(),
            "compiled program"
        );
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scope.instructions.clone(),
            constants: self.constants.clone(),
        }
    }

    /// Hands back the state `new_with_state` accepts. After a failed
    /// compilation the function scopes still open are unwound first, so the
    /// returned table is always the global one.
    pub fn into_state(mut self) -> (SymbolTable, Vec<Object>) {
        while self.enclosing.pop().is_some() {
            if let Some(outer) = std::mem::take(&mut self.symbol_table).into_outer() {
                self.symbol_table = outer;
            }
        }
        (self.symbol_table, self.constants)
    }

    fn compile_statement(&mut self, statement: &Statement) -> Result<(), CompileError> {
        match statement {
            Statement::Expression { expression } => {
                self.compile_expression(expression)?;
                self.emit(Opcode::Pop, &[])?;
            }
            Statement::Let { name, value } => {
                self.compile_expression(value)?;
                let symbol = self.symbol_table.define(name);
                let opcode = match symbol.scope {
                    SymbolScope::Global => Opcode::SetGlobal,
                    _ => Opcode::SetLocal,
                };
                self.emit(opcode, &[symbol.index])?;
            }
            Statement::Return { value } => {
                self.compile_expression(value)?;
                self.emit(Opcode::ReturnValue, &[])?;
            }
        }
        Ok(())
    }

    fn compile_expression(&mut self, expression: &Expression) -> Result<(), CompileError> {
        match expression {
            Expression::Integer { value } => {
                let index = self.add_constant(Object::Integer(*value));
                self.emit(Opcode::Constant, &[index])?;
            }
            Expression::String { value } => {
                let index = self.add_constant(Object::String(value.clone()));
                self.emit(Opcode::Constant, &[index])?;
            }
            Expression::Boolean { value } => {
                self.emit(if *value { Opcode::True } else { Opcode::False }, &[])?;
            }
            Expression::Identifier { name } => {
                let symbol = self.resolve(name)?;
                self.load_symbol(&symbol)?;
            }
            Expression::Prefix { operator, operand } => {
                self.compile_expression(operand)?;
                let opcode = match operator {
                    PrefixOperator::Bang => Opcode::Bang,
                    PrefixOperator::Minus => Opcode::Minus,
                };
                self.emit(opcode, &[])?;
            }
            Expression::Infix {
                operator: InfixOperator::LessThan,
                left,
                right,
            } => {
                self.compile_expression(right)?;
                self.compile_expression(left)?;
                self.emit(Opcode::GreaterThan, &[])?;
            }
            Expression::Infix {
                operator,
                left,
                right,
            } => {
                self.compile_expression(left)?;
                self.compile_expression(right)?;
                let opcode = match operator {
                    InfixOperator::Add => Opcode::Add,
                    InfixOperator::Sub => Opcode::Sub,
                    InfixOperator::Mul => Opcode::Mul,
                    InfixOperator::Div => Opcode::Div,
                    InfixOperator::GreaterThan | InfixOperator::LessThan => Opcode::GreaterThan,
                    InfixOperator::Equal => Opcode::Equal,
                    InfixOperator::NotEqual => Opcode::NotEqual,
                };
                self.emit(opcode, &[])?;
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                self.compile_expression(condition)?;
                let jump_not_truthy = self.emit(Opcode::JumpNotTruthy, &[PLACEHOLDER])?;
                self.compile_block_value(consequence)?;
                let jump = self.emit(Opcode::Jump, &[PLACEHOLDER])?;

                let after_consequence = self.scope.instructions.len();
                self.patch_jump(jump_not_truthy, Opcode::JumpNotTruthy, after_consequence)?;

                match alternative {
                    Some(alternative) => self.compile_block_value(alternative)?,
                    None => {
                        self.emit(Opcode::Null, &[])?;
                    }
                }
                let after_alternative = self.scope.instructions.len();
                self.patch_jump(jump, Opcode::Jump, after_alternative)?;
            }
            Expression::Array { elements } => {
                for element in elements {
                    self.compile_expression(element)?;
                }
                self.emit(Opcode::Array, &[elements.len()])?;
            }
            Expression::Hash { pairs } => {
                for (key, value) in pairs {
                    self.compile_expression(key)?;
                    self.compile_expression(value)?;
                }
                self.emit(Opcode::Hash, &[pairs.len() * 2])?;
            }
            Expression::Index { collection, index } => {
                self.compile_expression(collection)?;
                self.compile_expression(index)?;
                self.emit(Opcode::Index, &[])?;
            }
            Expression::Function {
                parameters,
                body,
                name,
            } => self.compile_function(parameters, body, name.as_deref())?,
            Expression::Call { callee, arguments } => {
                self.compile_expression(callee)?;
                for argument in arguments {
                    self.compile_expression(argument)?;
                }
                self.emit(Opcode::Call, &[arguments.len()])?;
            }
        }
        Ok(())
    }

    /// Compiles a block whose value is needed: the trailing expression's
    /// value stays on the stack, otherwise `null` is pushed.
    fn compile_block_value(&mut self, block: &BlockStatement) -> Result<(), CompileError> {
        for statement in &block.statements {
            self.compile_statement(statement)?;
        }
        if matches!(block.statements.last(), Some(Statement::Expression { .. })) {
            self.remove_last_pop();
        } else {
            self.emit(Opcode::Null, &[])?;
        }
        Ok(())
    }

    fn compile_function(
        &mut self,
        parameters: &[String],
        body: &BlockStatement,
        name: Option<&str>,
    ) -> Result<(), CompileError> {
        self.enter_scope();
        if let Some(name) = name {
            self.symbol_table.define_function_name(name);
        }
        for parameter in parameters {
            self.symbol_table.define(parameter);
        }
        for statement in &body.statements {
            self.compile_statement(statement)?;
        }
        if matches!(body.statements.last(), Some(Statement::Expression { .. })) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[])?;
        }

        let free_symbols = std::mem::take(&mut self.symbol_table.free_symbols);
        let num_locals = self.symbol_table.num_definitions();
        let instructions = self.leave_scope()?;

        for symbol in &free_symbols {
            self.load_symbol(symbol)?;
        }
        let function = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        };
        let index = self.add_constant(Object::CompiledFunction(Rc::new(function)));
        self.emit(Opcode::Closure, &[index, free_symbols.len()])?;
        Ok(())
    }

    fn resolve(&mut self, name: &str) -> Result<Symbol, CompileError> {
        if let Some(symbol) = self.symbol_table.resolve(name) {
            return Ok(symbol);
        }
        self.builtins
            .index_of(name)
            .map(|index| Symbol::new(name, SymbolScope::Builtin, index))
            .ok_or_else(|| CompileError::UndefinedVariable(name.to_string()))
    }

    fn load_symbol(&mut self, symbol: &Symbol) -> Result<(), CompileError> {
        let opcode = match symbol.scope {
            SymbolScope::Global => Opcode::GetGlobal,
            SymbolScope::Local => Opcode::GetLocal,
            SymbolScope::Builtin => Opcode::GetBuiltin,
            SymbolScope::Free => Opcode::GetFree,
            SymbolScope::Function => {
                self.emit(Opcode::CurrentClosure, &[])?;
                return Ok(());
            }
        };
        self.emit(opcode, &[symbol.index])?;
        Ok(())
    }

    fn add_constant(&mut self, constant: Object) -> usize {
        self.constants.push(constant);
        self.constants.len() - 1
    }

    /// Appends one instruction and returns its position.
    fn emit(&mut self, opcode: Opcode, operands: &[usize]) -> Result<usize, CompileError> {
        let instruction = encode(opcode, operands)?;
        let position = self.scope.instructions.push(&instruction);
        self.scope.last = Some(EmittedInstruction { opcode, position });
        Ok(position)
    }

    fn patch_jump(
        &mut self,
        position: usize,
        opcode: Opcode,
        target: usize,
    ) -> Result<(), CompileError> {
        let instruction = encode(opcode, &[target])?;
        self.scope.instructions.replace(position, &instruction);
        Ok(())
    }

    fn last_instruction_is(&self, opcode: Opcode) -> bool {
        self.scope.last.is_some_and(|last| last.opcode == opcode)
    }

    fn remove_last_pop(&mut self) {
        if let Some(last) = self.scope.last
            && last.opcode == Opcode::Pop
        {
            self.scope.instructions.truncate(last.position);
            self.scope.last = None;
        }
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.scope.last
            && last.opcode == Opcode::Pop
        {
            self.scope
                .instructions
                .replace(last.position, &make(Opcode::ReturnValue, &[]));
            self.scope.last = Some(EmittedInstruction {
                opcode: Opcode::ReturnValue,
                position: last.position,
            });
        }
    }

    fn enter_scope(&mut self) {
        let enclosing = std::mem::take(&mut self.scope);
        self.enclosing.push(enclosing);
        let outer = std::mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    fn leave_scope(&mut self) -> Result<Instructions, CompileError> {
        let enclosing = self.enclosing.pop().ok_or(CompileError::ScopeUnderflow)?;
        let finished = std::mem::replace(&mut self.scope, enclosing);
        let inner = std::mem::take(&mut self.symbol_table);
        self.symbol_table = inner.into_outer().ok_or(CompileError::ScopeUnderflow)?;
        Ok(finished.instructions)
    }
}

const PLACEHOLDER: usize = 9999;

fn encode(opcode: Opcode, operands: &[usize]) -> Result<Vec<u8>, CompileError> {
    let definition = opcode.definition();
    for (operand, width) in operands.iter().zip(definition.operand_widths) {
        let max = (1usize << (8 * width)) - 1;
        if *operand > max {
            return Err(CompileError::OperandOutOfRange {
                opcode: definition.name,
                operand: *operand,
                max,
            });
        }
    }
    Ok(make(opcode, operands))
}
