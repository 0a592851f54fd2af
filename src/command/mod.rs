pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{Command, CursorSpec, FieldSpec, SearchSpec, SortSpec, TypeSpec};
pub use parser::{parse, show_create};
