pub mod ast;
pub mod backend;
pub mod code;
pub mod compiler;
pub mod evaluator;
pub mod fixtures;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod session;
pub mod token;
pub mod vm;
