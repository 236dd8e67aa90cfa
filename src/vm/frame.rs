use std::rc::Rc;

use crate::code::Instructions;
use crate::object::Closure;

/// Activation record of one closure call.
#[derive(Debug, Clone)]
pub struct Frame {
    pub closure: Rc<Closure>,
    /// Offset of the instruction last fetched; -1 before the first fetch.
    pub ip: isize,
    /// Stack index of the first argument; locals follow the arguments.
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: -1,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &Instructions {
        &self.closure.function.instructions
    }

    /// Offset of the next byte to read.
    pub fn next_offset(&self) -> usize {
        (self.ip + 1) as usize
    }
}
