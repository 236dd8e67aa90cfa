//! Instruction encoding shared by the compiler and the virtual machine.
//!
//! One instruction is an opcode byte followed by its operands, each written
//! big-endian with the fixed width its [`Definition`] declares.

use std::fmt;
use std::ops::Deref;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Constant,
    Add,
    Sub,
    Mul,
    Div,
    Pop,
    Nop,
    True,
    False,
    Null,
    Equal,
    NotEqual,
    GreaterThan,
    Minus,
    Bang,
    JumpNotTruthy,
    Jump,
    GetGlobal,
    SetGlobal,
    GetLocal,
    SetLocal,
    GetBuiltin,
    GetFree,
    CurrentClosure,
    Array,
    Hash,
    Index,
    Call,
    ReturnValue,
    Return,
    Closure,
}

const ALL_OPCODES: [Opcode; 31] = [
    Opcode::Constant,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Pop,
    Opcode::Nop,
    Opcode::True,
    Opcode::False,
    Opcode::Null,
    Opcode::Equal,
    Opcode::NotEqual,
    Opcode::GreaterThan,
    Opcode::Minus,
    Opcode::Bang,
    Opcode::JumpNotTruthy,
    Opcode::Jump,
    Opcode::GetGlobal,
    Opcode::SetGlobal,
    Opcode::GetLocal,
    Opcode::SetLocal,
    Opcode::GetBuiltin,
    Opcode::GetFree,
    Opcode::CurrentClosure,
    Opcode::Array,
    Opcode::Hash,
    Opcode::Index,
    Opcode::Call,
    Opcode::ReturnValue,
    Opcode::Return,
    Opcode::Closure,
];

/// Name and operand layout of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Definition {
    pub name: &'static str,
    pub operand_widths: &'static [usize],
}

impl Definition {
    /// Total encoded size of the instruction, opcode byte included.
    pub fn width(&self) -> usize {
        1 + self.operand_widths.iter().sum::<usize>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("opcode {0} undefined")]
pub struct OpcodeError(pub u8);

impl Opcode {
    pub fn definition(self) -> Definition {
        let (name, operand_widths): (&'static str, &'static [usize]) = match self {
            Opcode::Constant => ("OpConstant", &[2]),
            Opcode::Add => ("OpAdd", &[]),
            Opcode::Sub => ("OpSub", &[]),
            Opcode::Mul => ("OpMul", &[]),
            Opcode::Div => ("OpDiv", &[]),
            Opcode::Pop => ("OpPop", &[]),
            Opcode::Nop => ("OpNop", &[]),
            Opcode::True => ("OpTrue", &[]),
            Opcode::False => ("OpFalse", &[]),
            Opcode::Null => ("OpNull", &[]),
            Opcode::Equal => ("OpEqual", &[]),
            Opcode::NotEqual => ("OpNotEqual", &[]),
            Opcode::GreaterThan => ("OpGreaterThan", &[]),
            Opcode::Minus => ("OpMinus", &[]),
            Opcode::Bang => ("OpBang", &[]),
            Opcode::JumpNotTruthy => ("OpJumpNotTruthy", &[2]),
            Opcode::Jump => ("OpJump", &[2]),
            Opcode::GetGlobal => ("OpGetGlobal", &[2]),
            Opcode::SetGlobal => ("OpSetGlobal", &[2]),
            Opcode::GetLocal => ("OpGetLocal", &[1]),
            Opcode::SetLocal => ("OpSetLocal", &[1]),
            Opcode::GetBuiltin => ("OpGetBuiltin", &[1]),
            Opcode::GetFree => ("OpGetFree", &[1]),
            Opcode::CurrentClosure => ("OpCurrentClosure", &[]),
            Opcode::Array => ("OpArray", &[2]),
            Opcode::Hash => ("OpHash", &[2]),
            Opcode::Index => ("OpIndex", &[]),
            Opcode::Call => ("OpCall", &[1]),
            Opcode::ReturnValue => ("OpReturnValue", &[]),
            Opcode::Return => ("OpReturn", &[]),
            Opcode::Closure => ("OpClosure", &[2, 1]),
        };
        Definition {
            name,
            operand_widths,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = OpcodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        ALL_OPCODES
            .get(usize::from(byte))
            .copied()
            .ok_or(OpcodeError(byte))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.definition().name)
    }
}

/// Encodes one instruction. Operands wider than their slot are truncated to
/// the slot width; callers range-check before emitting.
pub fn make(op: Opcode, operands: &[usize]) -> Vec<u8> {
    let definition = op.definition();
    debug_assert_eq!(
        operands.len(),
        definition.operand_widths.len(),
        "operand count mismatch for {}",
        definition.name
    );

    let mut instruction = Vec::with_capacity(definition.width());
    instruction.push(op as u8);
    for (operand, width) in operands.iter().zip(definition.operand_widths) {
        match width {
            2 => instruction.extend_from_slice(&(*operand as u16).to_be_bytes()),
            1 => instruction.push(*operand as u8),
            _ => unreachable!("operand width {width} is not encodable"),
        }
    }
    instruction
}

/// Decodes the operands following an opcode. Returns the operands and the
/// number of bytes consumed, or `None` when `bytes` ends early.
pub fn read_operands(definition: &Definition, bytes: &[u8]) -> Option<(Vec<usize>, usize)> {
    let mut operands = Vec::with_capacity(definition.operand_widths.len());
    let mut offset = 0;
    for width in definition.operand_widths {
        let operand = match width {
            2 => usize::from(read_u16(bytes, offset)?),
            1 => usize::from(read_u8(bytes, offset)?),
            _ => return None,
        };
        operands.push(operand);
        offset += width;
    }
    Some((operands, offset))
}

pub fn read_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let pair = bytes.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([pair[0], pair[1]]))
}

pub fn read_u8(bytes: &[u8], offset: usize) -> Option<u8> {
    bytes.get(offset).copied()
}

/// A flat instruction stream. `Display` renders the disassembly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Instructions(Vec<u8>);

impl Instructions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an encoded instruction and returns its starting offset.
    pub fn push(&mut self, instruction: &[u8]) -> usize {
        let position = self.0.len();
        self.0.extend_from_slice(instruction);
        position
    }

    /// Overwrites bytes in place starting at `position`, used to backpatch
    /// jump targets and to rewrite a trailing instruction.
    pub fn replace(&mut self, position: usize, instruction: &[u8]) {
        self.0[position..position + instruction.len()].copy_from_slice(instruction);
    }

    pub fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }
}

impl Deref for Instructions {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Instructions {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl FromIterator<Vec<u8>> for Instructions {
    fn from_iter<T: IntoIterator<Item = Vec<u8>>>(iter: T) -> Self {
        Self(iter.into_iter().flatten().collect())
    }
}

impl fmt::Display for Instructions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut offset = 0;
        while offset < self.0.len() {
            let op = match Opcode::try_from(self.0[offset]) {
                Ok(op) => op,
                Err(err) => {
                    writeln!(f, "{offset:04} ERROR: {err}")?;
                    offset += 1;
                    continue;
                }
            };
            let definition = op.definition();
            let Some((operands, read)) = read_operands(&definition, &self.0[offset + 1..]) else {
                writeln!(f, "{offset:04} ERROR: truncated {}", definition.name)?;
                break;
            };
            write!(f, "{offset:04} {}", definition.name)?;
            for operand in operands {
                write!(f, " {operand}")?;
            }
            writeln!(f)?;
            offset += 1 + read;
        }
        Ok(())
    }
}
