use std::collections::BTreeMap;
use serde::Serialize;
use crate::core::types::FieldType;
use crate::index::collection::Index;
use crate::index::field::{Field, FieldKind};
use crate::index::value_map::ValueMap;

/// STAT payload, scoped by how many arguments were given.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Stats {
    Engine(EngineStats),
    Index(IndexStats),
    Field(FieldStats),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    /// Live record count per index
    pub indexes: BTreeMap<String, u64>,
    pub queued_writes: usize,
    pub open_cursors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub name: String,
    pub records: u64,
    pub slow_queries: usize,
    pub fields: Vec<FieldSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    pub name: String,
    pub field_type: FieldType,
    pub aliases: Vec<String>,
    /// Records holding a value
    pub records: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldStats {
    pub index: String,
    #[serde(flatten)]
    pub summary: FieldSummary,
    pub detail: FieldDetail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDetail {
    /// Bit-sliced domain
    Numeric { min: i64, max: i64, width: usize },
    /// Distinct values and the most frequent ones
    Values { distinct: usize, top: Vec<(String, u64)> },
}

impl FieldSummary {
    pub fn of(field: &Field) -> Self {
        FieldSummary {
            name: field.name.clone(),
            field_type: field.field_type(),
            aliases: field.aliases.clone(),
            records: field.present().len(),
        }
    }
}

impl IndexStats {
    pub fn of(index: &Index) -> Self {
        IndexStats {
            name: index.name().to_string(),
            records: index.len(),
            slow_queries: index.slow_log().len(),
            fields: index.fields().iter().map(FieldSummary::of).collect(),
        }
    }
}

impl FieldStats {
    pub fn of(index: &Index, field: &Field, limit: usize) -> Self {
        let detail = match &field.kind {
            FieldKind::Integer(bsi)
            | FieldKind::Decimal { bsi, .. }
            | FieldKind::Date(bsi)
            | FieldKind::DateTime(bsi) => FieldDetail::Numeric {
                min: bsi.min(),
                max: bsi.max(),
                width: bsi.width(),
            },
            FieldKind::String(values)
            | FieldKind::Array { values, .. }
            | FieldKind::FullText { terms: values, .. } => values_detail(values, limit),
            FieldKind::Boolean(values) => values_detail(values, limit),
            FieldKind::ForeignKey { values, .. } => values_detail(values, limit),
        };

        FieldStats {
            index: index.name().to_string(),
            summary: FieldSummary::of(field),
            detail,
        }
    }
}

fn values_detail<K>(values: &ValueMap<K>, limit: usize) -> FieldDetail
where
    K: Ord + Clone + ToString,
{
    FieldDetail::Values {
        distinct: values.len(),
        top: values
            .top(limit)
            .into_iter()
            .map(|(key, count)| (key.to_string(), count))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyzer::TextAnalysis;
    use crate::command::ast::{FieldSpec, TypeSpec};

    fn index() -> Index {
        let specs = vec![
            FieldSpec { name: "color".to_string(), ty: TypeSpec::String, aliases: vec!["c".to_string()] },
            FieldSpec { name: "size".to_string(), ty: TypeSpec::Integer { min: 0, max: 10 }, aliases: vec![] },
        ];
        let mut index = Index::new("items", &specs, 4);
        let analysis = TextAnalysis::new();
        for (id, color) in [(1, "red"), (2, "red"), (3, "blue")] {
            let values = vec![("color".to_string(), color.to_string())];
            index.insert(id, &values, &analysis).unwrap();
        }
        index
    }

    #[test]
    fn index_summary() {
        let stats = IndexStats::of(&index());
        assert_eq!(stats.records, 3);
        assert_eq!(stats.fields[0].aliases, vec!["c"]);
        assert_eq!(stats.fields[0].records, 3);
        assert_eq!(stats.fields[1].records, 0);
    }

    #[test]
    fn field_detail() {
        let index = index();
        let color = FieldStats::of(&index, index.field("c").unwrap(), 1);
        assert_eq!(
            color.detail,
            FieldDetail::Values { distinct: 2, top: vec![("red".to_string(), 2)] }
        );

        let size = FieldStats::of(&index, index.field("size").unwrap(), 1);
        assert_eq!(size.detail, FieldDetail::Numeric { min: 0, max: 10, width: 4 });
    }

    #[test]
    fn serializes_with_scope_tag() {
        let stats = Stats::Engine(EngineStats {
            indexes: BTreeMap::from([("items".to_string(), 3)]),
            queued_writes: 1,
            open_cursors: 0,
        });
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["scope"], "engine");
        assert_eq!(json["indexes"]["items"], 3);
    }
}
