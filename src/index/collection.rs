use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::analysis::analyzer::TextAnalysis;
use crate::command::ast::FieldSpec;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{FieldValue, RecordId};
use crate::index::field::Field;
use crate::search::slow_log::SlowLog;

/// A named collection of records and the fields indexing them.
#[derive(Debug)]
pub struct Index {
    name: String,
    fields: Vec<Field>,
    positions: HashMap<String, usize>,
    aliases: HashMap<String, String>,
    universe: RoaringBitmap,
    slow_log: SlowLog,
}

impl Index {
    pub fn new(name: &str, specs: &[FieldSpec], slow_log_capacity: usize) -> Self {
        let fields: Vec<Field> = specs.iter().map(Field::from_spec).collect();
        let positions = fields
            .iter()
            .enumerate()
            .map(|(position, field)| (field.name.clone(), position))
            .collect();
        let aliases = fields
            .iter()
            .flat_map(|field| {
                field
                    .aliases
                    .iter()
                    .map(move |alias| (alias.clone(), field.name.clone()))
            })
            .collect();

        Index {
            name: name.to_string(),
            fields,
            positions,
            aliases,
            universe: RoaringBitmap::new(),
            slow_log: SlowLog::new(slow_log_capacity),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn schema(&self) -> Vec<FieldSpec> {
        self.fields.iter().map(Field::spec).collect()
    }

    /// Same schema, no records.
    pub fn emptied(&self) -> Index {
        Index::new(&self.name, &self.schema(), self.slow_log.capacity())
    }

    /// Canonical name for a field name or alias.
    pub fn canonical<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.positions.contains_key(name) {
            return Some(name);
        }
        self.aliases.get(name).map(String::as_str)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.canonical(name)
            .and_then(|canonical| self.positions.get(canonical))
            .copied()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.position(name).map(|position| &self.fields[position])
    }

    pub fn require_field(&self, name: &str) -> Result<&Field> {
        self.field(name)
            .ok_or_else(|| Error::field_not_found(&self.name, name))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn fulltext_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.is_fulltext())
    }

    /// FOREIGNKEY fields pointing at `target`.
    pub fn references_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Field> {
        self.fields
            .iter()
            .filter(move |field| field.references() == Some(target))
    }

    /// Follow a RENAME of a referenced index.
    pub fn retarget_references(&mut self, from: &str, to: &str) {
        for field in &mut self.fields {
            if field.references() == Some(from) {
                field.set_references(to);
            }
        }
    }

    pub fn universe(&self) -> &RoaringBitmap {
        &self.universe
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.universe.contains(id)
    }

    pub fn len(&self) -> u64 {
        self.universe.len()
    }

    pub fn is_empty(&self) -> bool {
        self.universe.is_empty()
    }

    pub fn slow_log(&self) -> &SlowLog {
        &self.slow_log
    }

    pub fn slow_log_mut(&mut self) -> &mut SlowLog {
        &mut self.slow_log
    }

    /// Cast every value first, then write them and publish the id. A value
    /// that fails to cast leaves the index untouched.
    pub fn insert(
        &mut self,
        id: RecordId,
        values: &[(String, String)],
        analysis: &TextAnalysis,
    ) -> Result<()> {
        if self.contains(id) {
            return Err(Error::new(
                ErrorKind::IdExists,
                format!("id {} already exists in index '{}'", id, self.name),
            ));
        }

        for (position, value) in self.cast_values(values, analysis)? {
            self.fields[position].insert(id, value);
        }
        self.universe.insert(id);
        Ok(())
    }

    /// Resolve and cast `(field, value)` pairs without writing anything.
    pub fn cast_values(
        &self,
        values: &[(String, String)],
        analysis: &TextAnalysis,
    ) -> Result<Vec<(usize, FieldValue)>> {
        let mut cast = Vec::with_capacity(values.len());
        for (name, raw) in values {
            let position = self
                .position(name)
                .ok_or_else(|| Error::field_not_found(&self.name, name))?;
            cast.push((position, self.fields[position].cast(raw, analysis)?));
        }
        Ok(cast)
    }

    pub fn delete(&mut self, id: RecordId) -> Result<()> {
        if !self.universe.remove(id) {
            return Err(self.id_not_found(id));
        }
        for field in &mut self.fields {
            field.remove(id);
        }
        Ok(())
    }

    /// Move the record `from` to the free id `to`.
    pub fn reid(&mut self, from: RecordId, to: RecordId) -> Result<()> {
        if !self.contains(from) {
            return Err(self.id_not_found(from));
        }
        if from == to {
            return Ok(());
        }
        if self.contains(to) {
            return Err(Error::new(
                ErrorKind::IdExists,
                format!("id {} already exists in index '{}'", to, self.name),
            ));
        }

        for field in &mut self.fields {
            field.swap(from, to);
        }
        self.universe.remove(from);
        self.universe.insert(to);
        Ok(())
    }

    fn id_not_found(&self, id: RecordId) -> Error {
        Error::new(
            ErrorKind::IdNotFound,
            format!("id {} does not exist in index '{}'", id, self.name),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ast::TypeSpec;

    fn spec(name: &str, ty: TypeSpec, aliases: &[&str]) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            ty,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn index() -> Index {
        Index::new(
            "people",
            &[
                spec("name", TypeSpec::String, &["n"]),
                spec("age", TypeSpec::Integer { min: 0, max: 150 }, &[]),
            ],
            8,
        )
    }

    fn values(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(f, v)| (f.to_string(), v.to_string())).collect()
    }

    #[test]
    fn aliases_resolve_to_canonical_fields() {
        let index = index();
        assert_eq!(index.canonical("n"), Some("name"));
        assert_eq!(index.canonical("name"), Some("name"));
        assert!(index.field("missing").is_none());
        assert_eq!(index.require_field("x").unwrap_err().kind, ErrorKind::FieldNotFound);
    }

    #[test]
    fn failed_insert_leaves_no_trace() {
        let analysis = TextAnalysis::new();
        let mut index = index();
        let err = index
            .insert(1, &values(&[("n", "bob"), ("age", "200")]), &analysis)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidValue);
        assert!(index.is_empty());
        assert!(index.field("name").unwrap().present().is_empty());

        index.insert(1, &values(&[("n", "bob"), ("age", "42")]), &analysis).unwrap();
        assert!(index.contains(1));
        let err = index.insert(1, &values(&[]), &analysis).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IdExists);
    }

    #[test]
    fn delete_and_reid() {
        let analysis = TextAnalysis::new();
        let mut index = index();
        index.insert(1, &values(&[("name", "ann"), ("age", "30")]), &analysis).unwrap();
        index.insert(2, &values(&[("name", "bob")]), &analysis).unwrap();

        index.reid(1, 7).unwrap();
        assert!(!index.contains(1));
        assert_eq!(index.field("age").unwrap().bsi().unwrap().value_of(7), Some(30));
        assert_eq!(index.reid(7, 2).unwrap_err().kind, ErrorKind::IdExists);

        index.delete(2).unwrap();
        assert_eq!(index.delete(2).unwrap_err().kind, ErrorKind::IdNotFound);
        assert_eq!(index.universe().iter().collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn emptied_keeps_schema() {
        let analysis = TextAnalysis::new();
        let mut index = index();
        index.insert(1, &values(&[("name", "ann")]), &analysis).unwrap();
        let fresh = index.emptied();
        assert!(fresh.is_empty());
        assert_eq!(fresh.schema(), index.schema());
    }
}
