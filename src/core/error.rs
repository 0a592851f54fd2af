use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // Lexical failure, context carries the unconsumed remainder
    Tokenize,
    CommandParse,
    QueryParse,
    IndexNotFound,
    IndexExists,
    FieldNotFound,
    IdExists,
    IdNotFound,
    InvalidValue,
    NotSortable,
    NotForeignKey,
    AmbiguousReference,
    CursorNotFound,
    UnknownCommand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn tokenize(remainder: &str) -> Self {
        Error::new(ErrorKind::Tokenize, format!("unexpected input at '{}'", remainder))
    }

    pub fn command(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::CommandParse, context.into())
    }

    pub fn query(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::QueryParse, context.into())
    }

    pub fn index_not_found(index: &str) -> Self {
        Error::new(ErrorKind::IndexNotFound, format!("index '{}' does not exist", index))
    }

    pub fn field_not_found(index: &str, field: &str) -> Self {
        Error::new(
            ErrorKind::FieldNotFound,
            format!("field '{}' does not exist in index '{}'", field, index),
        )
    }

    pub fn invalid_value(field: &str, value: &str) -> Self {
        Error::new(
            ErrorKind::InvalidValue,
            format!("invalid value '{}' for field '{}'", value, field),
        )
    }

    /// True for semantic failures raised by the engine rather than by a parser.
    pub fn is_engine_error(&self) -> bool {
        !matches!(
            self.kind,
            ErrorKind::Tokenize | ErrorKind::CommandParse | ErrorKind::QueryParse
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::Tokenize,
            context: format!("invalid lexer rule: {}", err),
        }
    }
}

impl From<fst::Error> for Error {
    fn from(err: fst::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidValue,
            context: format!("FST error: {}", err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidValue,
            context: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
