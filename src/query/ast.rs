use std::fmt;

/// Field qualifier of a term.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRef {
    /// `@field`, a field of the searched index
    Local(String),
    /// `@@index`, records of another index pointing at the searched one
    Parent(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TermValue {
    Text(String),
    /// Raw text of a nested query, resolved against another index
    Subquery(String),
}

/// A `{field, value}` pair referenced by position from the expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    /// `None` searches every FULLTEXT field
    pub field: Option<FieldRef>,
    pub value: TermValue,
}

impl Term {
    pub fn text(field: Option<FieldRef>, value: &str) -> Self {
        Term {
            field,
            value: TermValue::Text(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// `*`, every live record
    All,
    Term(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Operand(Operand),
    And,
    Or,
    Not,
    Open,
    Close,
}

impl Symbol {
    /// Binding strength of operators, `None` for anything else.
    pub fn precedence(&self) -> Option<u8> {
        match self {
            Symbol::Not => Some(3),
            Symbol::And => Some(2),
            Symbol::Or => Some(1),
            _ => None,
        }
    }

    /// Whether an operand may directly follow this symbol.
    pub fn ends_operand(&self) -> bool {
        matches!(self, Symbol::Operand(_) | Symbol::Close)
    }

    pub fn starts_operand(&self) -> bool {
        matches!(self, Symbol::Operand(_) | Symbol::Open | Symbol::Not)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Symbol::Operand(Operand::All) => f.write_str("*"),
            Symbol::Operand(Operand::Term(index)) => write!(f, "{}", index),
            Symbol::And => f.write_str("&"),
            Symbol::Or => f.write_str("|"),
            Symbol::Not => f.write_str("-"),
            Symbol::Open => f.write_str("("),
            Symbol::Close => f.write_str(")"),
        }
    }
}

/// Compiled query: the term table and the infix expression over it.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub terms: Vec<Term>,
    pub infix: Vec<Symbol>,
}

impl Query {
    /// Expression rendered with term positions, e.g. `0&(1|2)`.
    pub fn infix_string(&self) -> String {
        self.infix.iter().map(Symbol::to_string).collect()
    }
}
