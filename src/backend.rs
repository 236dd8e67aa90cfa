use std::rc::Rc;

use anyhow::Result;

use crate::ast::Program;
use crate::evaluator::TreeWalker;
use crate::object::{Builtins, Object};
use crate::vm::StackMachine;

/// Observable result of running a program to completion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Execution {
    /// Value of the final expression statement, if the program ends in one.
    pub value: Option<Object>,
    /// Lines written by `puts`.
    pub output: Vec<String>,
}

/// Executable artifact produced by a backend `prepare` step.
///
/// This keeps compilation and execution separated so benchmarks and tests can
/// measure/validate prepare-vs-run phases independently.
pub trait PreparedBackend {
    fn run(&self) -> Result<Execution>;
}

/// Common interface implemented by each execution strategy.
///
/// `prepare` translates the AST into backend-owned executable state, while
/// `run` offers the convenience path for one-shot execution.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn prepare(&self, program: &Program) -> Result<Box<dyn PreparedBackend>>;

    fn run(&self, program: &Program) -> Result<Execution> {
        self.prepare(program)?.run()
    }
}

/// Every backend, sharing one builtin table.
pub fn backends() -> Vec<Box<dyn Backend>> {
    let builtins = Rc::new(Builtins::standard());
    vec![
        Box::new(TreeWalker::new(Rc::clone(&builtins))),
        Box::new(StackMachine::new(builtins)),
    ]
}

pub fn backend_named(name: &str) -> Option<Box<dyn Backend>> {
    backends().into_iter().find(|backend| backend.name() == name)
}
