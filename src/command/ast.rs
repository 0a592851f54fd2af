use crate::core::types::{FieldType, RecordId};

/// Parsed command, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ping,
    List,
    Stat {
        index: Option<String>,
        field: Option<String>,
        limit: Option<usize>,
    },
    Create {
        index: String,
        fields: Vec<FieldSpec>,
    },
    Drop {
        index: String,
    },
    Truncate {
        index: String,
    },
    Rename {
        index: String,
        new_name: String,
    },
    Insert {
        index: String,
        id: RecordId,
        values: Vec<(String, String)>,
    },
    Delete {
        index: String,
        id: RecordId,
        sync: bool,
    },
    DeleteAll {
        index: String,
        query: String,
        sync: bool,
    },
    Reid {
        index: String,
        from: RecordId,
        to: RecordId,
        sync: bool,
    },
    Search(SearchSpec),
    Cursor {
        id: String,
    },
    ShowCreate {
        index: String,
    },
    SlowQueryLog {
        index: Option<String>,
        clear: bool,
    },
}

impl Command {
    /// Command keyword, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::List => "LIST",
            Command::Stat { .. } => "STAT",
            Command::Create { .. } => "CREATE",
            Command::Drop { .. } => "DROP",
            Command::Truncate { .. } => "TRUNCATE",
            Command::Rename { .. } => "RENAME",
            Command::Insert { .. } => "INSERT",
            Command::Delete { .. } => "DELETE",
            Command::DeleteAll { .. } => "DELETEALL",
            Command::Reid { .. } => "REID",
            Command::Search(_) => "SEARCH",
            Command::Cursor { .. } => "CURSOR",
            Command::ShowCreate { .. } => "SHOWCREATE",
            Command::SlowQueryLog { .. } => "SLOWQUERYLOG",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeSpec,
    pub aliases: Vec<String>,
}

/// Declared type with its options. Numeric bounds are already cast into
/// the field's integer domain (DECIMAL scaled by its precision).
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    Integer { min: i64, max: i64 },
    Decimal { min: i64, max: i64, precision: u32 },
    Date { min: i64, max: i64 },
    DateTime { min: i64, max: i64 },
    String,
    Boolean,
    Array { separator: char },
    FullText { stop_words: bool, prefix_search: bool },
    ForeignKey { references: String },
}

impl TypeSpec {
    pub fn field_type(&self) -> FieldType {
        match self {
            TypeSpec::Integer { .. } => FieldType::Integer,
            TypeSpec::Decimal { .. } => FieldType::Decimal,
            TypeSpec::Date { .. } => FieldType::Date,
            TypeSpec::DateTime { .. } => FieldType::DateTime,
            TypeSpec::String => FieldType::String,
            TypeSpec::Boolean => FieldType::Boolean,
            TypeSpec::Array { .. } => FieldType::Array,
            TypeSpec::FullText { .. } => FieldType::FullText,
            TypeSpec::ForeignKey { .. } => FieldType::ForeignKey,
        }
    }

    /// `(min, max)` of numeric types.
    pub fn bounds(&self) -> Option<(i64, i64)> {
        match *self {
            TypeSpec::Integer { min, max }
            | TypeSpec::Decimal { min, max, .. }
            | TypeSpec::Date { min, max }
            | TypeSpec::DateTime { min, max } => Some((min, max)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpec {
    pub index: String,
    pub query: String,
    pub limit: Option<usize>,
    pub sort: Option<SortSpec>,
    pub cursor: Option<CursorSpec>,
    pub foreign_keys: Vec<String>,
}

impl SearchSpec {
    pub fn new(index: &str, query: &str) -> Self {
        SearchSpec {
            index: index.to_string(),
            query: query.to_string(),
            limit: None,
            sort: None,
            cursor: None,
            foreign_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorSpec {
    /// Seconds of inactivity before the cursor expires
    pub timeout: Option<u64>,
}
