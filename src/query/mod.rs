pub mod ast;
pub mod lexer;
pub mod parser;
pub mod postfix;
pub mod range;
pub mod resolver;

pub use ast::{FieldRef, Operand, Query, Symbol, Term, TermValue};
pub use parser::parse;
pub use postfix::to_postfix;
pub use resolver::resolve;
