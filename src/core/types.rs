use std::collections::BTreeMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use crate::core::stats::Stats;
use crate::search::results::SearchResult;
use crate::search::slow_log::SlowQuery;

/// Record identifier, unique within an index while live.
pub type RecordId = u32;

/// Implicit record id field, never declarable or aliasable.
pub const RESERVED_ID_FIELD: &str = "id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Integer,
    Decimal,
    Date,
    DateTime,
    String,
    Boolean,
    Array,
    FullText,
    ForeignKey,
}

impl FieldType {
    /// Case-insensitive lookup of a type keyword.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let ty = match word.to_ascii_uppercase().as_str() {
            "INTEGER" => FieldType::Integer,
            "DECIMAL" => FieldType::Decimal,
            "DATE" => FieldType::Date,
            "DATETIME" => FieldType::DateTime,
            "STRING" => FieldType::String,
            "BOOLEAN" => FieldType::Boolean,
            "ARRAY" => FieldType::Array,
            "FULLTEXT" => FieldType::FullText,
            "FOREIGNKEY" => FieldType::ForeignKey,
            _ => return None,
        };
        Some(ty)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            FieldType::Integer => "INTEGER",
            FieldType::Decimal => "DECIMAL",
            FieldType::Date => "DATE",
            FieldType::DateTime => "DATETIME",
            FieldType::String => "STRING",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Array => "ARRAY",
            FieldType::FullText => "FULLTEXT",
            FieldType::ForeignKey => "FOREIGNKEY",
        }
    }

    /// Numeric types are backed by a bit-sliced index.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Decimal | FieldType::Date | FieldType::DateTime
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Value cast for one field, ready to be written into its structure.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(i64),
    Flag(bool),
    Term(String),
    Terms(Vec<String>),
    Reference(RecordId),
}

/// Outcome of a single command, handed back to the transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Pong,
    Ok,
    /// Accepted into the write queue, applied on a later tick.
    Queued,
    List(Vec<String>),
    Stat(Stats),
    Search(SearchResult),
    ShowCreate(String),
    SlowQueryLog(BTreeMap<String, Vec<SlowQuery>>),
}

impl Response {
    pub fn to_json(&self) -> String {
        // Every payload is plain data with string keys
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }

    pub fn as_search(&self) -> Option<&SearchResult> {
        match self {
            Response::Search(result) => Some(result),
            _ => None,
        }
    }
}
