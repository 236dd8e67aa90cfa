use std::rc::Rc;

use anyhow::Result;
use thiserror::Error;

use crate::ast::{InfixOperator, PrefixOperator, Program};
use crate::backend::{Backend, Execution, PreparedBackend};
use crate::code::{Opcode, OpcodeError, read_u8, read_u16};
use crate::compiler::{Bytecode, Compiler};
use crate::object::operators;
use crate::object::{Builtins, Closure, CompiledFunction, Object, RuntimeError};

pub mod frame;

use frame::Frame;

pub const STACK_SIZE: usize = 2048;
pub const GLOBALS_SIZE: usize = 65536;
pub const MAX_FRAMES: usize = 1024;

type VmResult<T> = std::result::Result<T, VmError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    UndefinedOpcode(#[from] OpcodeError),
    /// Error object returned by a builtin.
    #[error("{0}")]
    Builtin(String),
    #[error("stack overflow")]
    StackOverflow,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow: call depth exceeds {MAX_FRAMES}")]
    FrameOverflow,
    #[error("truncated instruction at offset {0}")]
    TruncatedInstruction(usize),
    #[error("constant {0} undefined")]
    UndefinedConstant(usize),
    #[error("constant {0} is not a compiled function")]
    NotAFunctionConstant(usize),
    #[error("builtin {0} undefined")]
    UndefinedBuiltin(usize),
    #[error("free variable {0} undefined")]
    UndefinedFree(usize),
}

/// Stack machine executing compiled bytecode.
pub struct Vm {
    constants: Vec<Object>,
    stack: Vec<Object>,
    /// Count of live stack values; the top is `stack[sp - 1]`.
    sp: usize,
    globals: Vec<Object>,
    frame: Frame,
    callers: Vec<Frame>,
    builtins: Rc<Builtins>,
    output: Vec<String>,
}

impl Vm {
    pub fn new(bytecode: Bytecode, builtins: Rc<Builtins>) -> Self {
        Self::new_with_globals(bytecode, vec![Object::Null; GLOBALS_SIZE], builtins)
    }

    /// Runs against globals left by an earlier VM, for REPL sessions.
    pub fn new_with_globals(
        bytecode: Bytecode,
        mut globals: Vec<Object>,
        builtins: Rc<Builtins>,
    ) -> Self {
        globals.resize(GLOBALS_SIZE, Object::Null);
        let main = Closure {
            function: Rc::new(CompiledFunction {
                instructions: bytecode.instructions,
                ..CompiledFunction::default()
            }),
            free: Vec::new(),
        };
        Self {
            constants: bytecode.constants,
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals,
            frame: Frame::new(Rc::new(main), 0),
            callers: Vec::new(),
            builtins,
            output: Vec::new(),
        }
    }

    pub fn into_globals(self) -> Vec<Object> {
        self.globals
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    /// Executes until the top-level instructions run out or a top-level
    /// `return` executes. Yields the value left on top of the stack.
    #[tracing::instrument(level = "debug", skip_all, fields(constants = self.constants.len()))]
    pub fn run(&mut self) -> VmResult<Option<Object>> {
        while let Some(opcode) = self.fetch()? {
            match opcode {
                Opcode::Constant => {
                    let index = self.read_u16_operand()?;
                    let constant = self
                        .constants
                        .get(index)
                        .cloned()
                        .ok_or(VmError::UndefinedConstant(index))?;
                    self.push(constant)?;
                }
                Opcode::Pop => {
                    self.pop()?;
                }
                Opcode::Nop => {}
                Opcode::True => self.push(Object::Boolean(true))?,
                Opcode::False => self.push(Object::Boolean(false))?,
                Opcode::Null => self.push(Object::Null)?,
                Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Equal
                | Opcode::NotEqual
                | Opcode::GreaterThan => {
                    let right = self.pop()?;
                    let left = self.pop()?;
                    let result = operators::infix(infix_operator(opcode), &left, &right)?;
                    self.push(result)?;
                }
                Opcode::Minus | Opcode::Bang => {
                    let operator = if opcode == Opcode::Minus {
                        PrefixOperator::Minus
                    } else {
                        PrefixOperator::Bang
                    };
                    let operand = self.pop()?;
                    self.push(operators::prefix(operator, &operand)?)?;
                }
                Opcode::Jump => {
                    let target = self.read_u16_operand()?;
                    self.frame.ip = target as isize - 1;
                }
                Opcode::JumpNotTruthy => {
                    let target = self.read_u16_operand()?;
                    if !self.pop()?.is_truthy() {
                        self.frame.ip = target as isize - 1;
                    }
                }
                Opcode::SetGlobal => {
                    let index = self.read_u16_operand()?;
                    let value = self.pop()?;
                    self.globals[index] = value;
                }
                Opcode::GetGlobal => {
                    let index = self.read_u16_operand()?;
                    let value = self.globals[index].clone();
                    self.push(value)?;
                }
                Opcode::SetLocal => {
                    let slot = self.frame.base_pointer + self.read_u8_operand()?;
                    let value = self.pop()?;
                    *self.stack.get_mut(slot).ok_or(VmError::StackOverflow)? = value;
                }
                Opcode::GetLocal => {
                    let slot = self.frame.base_pointer + self.read_u8_operand()?;
                    let value = self.stack.get(slot).cloned().ok_or(VmError::StackOverflow)?;
                    self.push(value)?;
                }
                Opcode::GetBuiltin => {
                    let index = self.read_u8_operand()?;
                    let builtin = self
                        .builtins
                        .get(index)
                        .ok_or(VmError::UndefinedBuiltin(index))?;
                    self.push(Object::Builtin(builtin))?;
                }
                Opcode::GetFree => {
                    let index = self.read_u8_operand()?;
                    let value = self
                        .frame
                        .closure
                        .free
                        .get(index)
                        .cloned()
                        .ok_or(VmError::UndefinedFree(index))?;
                    self.push(value)?;
                }
                Opcode::CurrentClosure => {
                    let closure = Rc::clone(&self.frame.closure);
                    self.push(Object::Closure(closure))?;
                }
                Opcode::Array => {
                    let count = self.read_u16_operand()?;
                    let elements = self.pop_many(count)?;
                    self.push(Object::Array(elements))?;
                }
                Opcode::Hash => {
                    let count = self.read_u16_operand()?;
                    let mut items = self.pop_many(count)?.into_iter();
                    let mut entries = Vec::with_capacity(count / 2);
                    while let (Some(key), Some(value)) = (items.next(), items.next()) {
                        entries.push((key, value));
                    }
                    self.push(operators::build_hash(entries)?)?;
                }
                Opcode::Index => {
                    let index = self.pop()?;
                    let collection = self.pop()?;
                    self.push(operators::index(&collection, &index)?)?;
                }
                Opcode::Call => {
                    let argument_count = self.read_u8_operand()?;
                    self.call(argument_count)?;
                }
                Opcode::ReturnValue => {
                    let value = self.pop()?;
                    if self.callers.is_empty() {
                        return Ok(Some(value));
                    }
                    self.return_from_frame(value)?;
                }
                Opcode::Return => {
                    if self.callers.is_empty() {
                        return Ok(Some(Object::Null));
                    }
                    self.return_from_frame(Object::Null)?;
                }
                Opcode::Closure => {
                    let index = self.read_u16_operand()?;
                    let free_count = self.read_u8_operand()?;
                    self.push_closure(index, free_count)?;
                }
            }
        }

        Ok(self.sp.checked_sub(1).map(|top| self.stack[top].clone()))
    }

    fn fetch(&mut self) -> VmResult<Option<Opcode>> {
        let offset = self.frame.next_offset();
        let Some(&byte) = self.frame.instructions().get(offset) else {
            return Ok(None);
        };
        self.frame.ip += 1;
        Ok(Some(Opcode::try_from(byte)?))
    }

    fn read_u16_operand(&mut self) -> VmResult<usize> {
        let offset = self.frame.next_offset();
        let value = read_u16(self.frame.instructions(), offset)
            .ok_or(VmError::TruncatedInstruction(offset))?;
        self.frame.ip += 2;
        Ok(usize::from(value))
    }

    fn read_u8_operand(&mut self) -> VmResult<usize> {
        let offset = self.frame.next_offset();
        let value = read_u8(self.frame.instructions(), offset)
            .ok_or(VmError::TruncatedInstruction(offset))?;
        self.frame.ip += 1;
        Ok(usize::from(value))
    }

    fn push(&mut self, value: Object) -> VmResult<()> {
        if self.sp >= STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        self.stack[self.sp] = value;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Object> {
        if self.sp == 0 {
            return Err(VmError::StackUnderflow);
        }
        self.sp -= 1;
        Ok(std::mem::replace(&mut self.stack[self.sp], Object::Null))
    }

    /// Removes the top `count` values, returned bottom first.
    fn pop_many(&mut self, count: usize) -> VmResult<Vec<Object>> {
        let start = self.sp.checked_sub(count).ok_or(VmError::StackUnderflow)?;
        let values = self.stack[start..self.sp]
            .iter_mut()
            .map(|slot| std::mem::replace(slot, Object::Null))
            .collect();
        self.sp = start;
        Ok(values)
    }

    fn call(&mut self, argument_count: usize) -> VmResult<()> {
        let callee_slot = self
            .sp
            .checked_sub(argument_count + 1)
            .ok_or(VmError::StackUnderflow)?;
        match self.stack[callee_slot].clone() {
            Object::Closure(closure) => self.call_closure(closure, argument_count),
            Object::Builtin(builtin) => {
                let result = builtin.call(&self.stack[callee_slot + 1..self.sp], &mut self.output);
                if let Object::Error(message) = result {
                    return Err(VmError::Builtin(message));
                }
                self.sp = callee_slot;
                self.push(result)
            }
            other => Err(RuntimeError::NotCallable(other.object_type()).into()),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argument_count: usize) -> VmResult<()> {
        let function = &closure.function;
        if argument_count != function.num_parameters {
            return Err(RuntimeError::WrongArgumentCount {
                want: function.num_parameters,
                got: argument_count,
            }
            .into());
        }
        if self.callers.len() + 1 >= MAX_FRAMES {
            return Err(VmError::FrameOverflow);
        }

        let base_pointer = self.sp - argument_count;
        let stack_top = base_pointer + function.num_locals;
        if stack_top > STACK_SIZE {
            return Err(VmError::StackOverflow);
        }
        for slot in &mut self.stack[self.sp..stack_top] {
            *slot = Object::Null;
        }

        let caller = std::mem::replace(&mut self.frame, Frame::new(closure, base_pointer));
        self.callers.push(caller);
        self.sp = stack_top;
        tracing::trace!(depth = self.callers.len(), base_pointer, "push frame");
        Ok(())
    }

    fn return_from_frame(&mut self, value: Object) -> VmResult<()> {
        let caller = self.callers.pop().ok_or(VmError::StackUnderflow)?;
        let finished = std::mem::replace(&mut self.frame, caller);
        self.sp = finished
            .base_pointer
            .checked_sub(1)
            .ok_or(VmError::StackUnderflow)?;
        tracing::trace!(depth = self.callers.len(), "pop frame");
        self.push(value)
    }

    fn push_closure(&mut self, index: usize, free_count: usize) -> VmResult<()> {
        let function = match self.constants.get(index) {
            Some(Object::CompiledFunction(function)) => Rc::clone(function),
            Some(_) => return Err(VmError::NotAFunctionConstant(index)),
            None => return Err(VmError::UndefinedConstant(index)),
        };
        let free = self.pop_many(free_count)?;
        self.push(Object::Closure(Rc::new(Closure { function, free })))
    }
}

fn infix_operator(opcode: Opcode) -> InfixOperator {
    match opcode {
        Opcode::Sub => InfixOperator::Sub,
        Opcode::Mul => InfixOperator::Mul,
        Opcode::Div => InfixOperator::Div,
        Opcode::Equal => InfixOperator::Equal,
        Opcode::NotEqual => InfixOperator::NotEqual,
        Opcode::GreaterThan => InfixOperator::GreaterThan,
        _ => InfixOperator::Add,
    }
}

/// Backend compiling programs to bytecode and running them on [`Vm`].
pub struct StackMachine {
    builtins: Rc<Builtins>,
}

impl StackMachine {
    pub fn new(builtins: Rc<Builtins>) -> Self {
        Self { builtins }
    }
}

impl Default for StackMachine {
    fn default() -> Self {
        Self::new(Rc::new(Builtins::standard()))
    }
}

/// Compiled program ready for repeated execution.
pub struct PreparedStackMachine {
    bytecode: Bytecode,
    builtins: Rc<Builtins>,
}

impl PreparedBackend for PreparedStackMachine {
    fn run(&self) -> Result<Execution> {
        let mut vm = Vm::new(self.bytecode.clone(), Rc::clone(&self.builtins));
        let value = vm.run()?;
        Ok(Execution {
            value,
            output: vm.take_output(),
        })
    }
}

impl Backend for StackMachine {
    fn name(&self) -> &'static str {
        "vm"
    }

    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>> {
        let mut compiler = Compiler::new(Rc::clone(&self.builtins));
        compiler.compile(program)?;
        Ok(Box::new(PreparedStackMachine {
            bytecode: compiler.bytecode(),
            builtins: Rc::clone(&self.builtins),
        }))
    }
}
