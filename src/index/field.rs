use std::collections::HashMap;
use roaring::RoaringBitmap;
use crate::analysis::analyzer::TextAnalysis;
use crate::bitmap::algebra::{self, Set};
use crate::command::ast::{FieldSpec, TypeSpec};
use crate::core::cast;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{FieldType, FieldValue, RecordId};
use crate::index::bsi::Bsi;
use crate::index::prefix::PrefixIndex;
use crate::index::value_map::ValueMap;
use crate::query::range::{self, Endpoint};

/// A declared field and the physical structure backing it.
#[derive(Debug)]
pub struct Field {
    pub name: String,
    pub aliases: Vec<String>,
    pub kind: FieldKind,
}

#[derive(Debug)]
pub enum FieldKind {
    Integer(Bsi),
    Decimal {
        bsi: Bsi,
        precision: u32,
    },
    Date(Bsi),
    DateTime(Bsi),
    String(ValueMap<String>),
    Boolean(ValueMap<bool>),
    Array {
        values: ValueMap<String>,
        separator: char,
    },
    FullText {
        terms: ValueMap<String>,
        stop_words: bool,
        prefix_search: bool,
        prefix: PrefixIndex,
    },
    ForeignKey {
        values: ValueMap<RecordId>,
        reverse: HashMap<RecordId, RecordId>,
        references: String,
    },
}

impl Field {
    pub fn from_spec(spec: &FieldSpec) -> Self {
        let kind = match &spec.ty {
            TypeSpec::Integer { min, max } => FieldKind::Integer(Bsi::new(*min, *max)),
            TypeSpec::Decimal { min, max, precision } => FieldKind::Decimal {
                bsi: Bsi::new(*min, *max),
                precision: *precision,
            },
            TypeSpec::Date { min, max } => FieldKind::Date(Bsi::new(*min, *max)),
            TypeSpec::DateTime { min, max } => FieldKind::DateTime(Bsi::new(*min, *max)),
            TypeSpec::String => FieldKind::String(ValueMap::new()),
            TypeSpec::Boolean => FieldKind::Boolean(ValueMap::new()),
            TypeSpec::Array { separator } => FieldKind::Array {
                values: ValueMap::new(),
                separator: *separator,
            },
            TypeSpec::FullText { stop_words, prefix_search } => FieldKind::FullText {
                terms: ValueMap::new(),
                stop_words: *stop_words,
                prefix_search: *prefix_search,
                prefix: PrefixIndex::new(1),
            },
            TypeSpec::ForeignKey { references } => FieldKind::ForeignKey {
                values: ValueMap::new(),
                reverse: HashMap::new(),
                references: references.clone(),
            },
        };

        Field {
            name: spec.name.clone(),
            aliases: spec.aliases.clone(),
            kind,
        }
    }

    /// Schema of this field, enough to rebuild an empty copy.
    pub fn spec(&self) -> FieldSpec {
        let ty = match &self.kind {
            FieldKind::Integer(bsi) => TypeSpec::Integer { min: bsi.min(), max: bsi.max() },
            FieldKind::Decimal { bsi, precision } => TypeSpec::Decimal {
                min: bsi.min(),
                max: bsi.max(),
                precision: *precision,
            },
            FieldKind::Date(bsi) => TypeSpec::Date { min: bsi.min(), max: bsi.max() },
            FieldKind::DateTime(bsi) => TypeSpec::DateTime { min: bsi.min(), max: bsi.max() },
            FieldKind::String(_) => TypeSpec::String,
            FieldKind::Boolean(_) => TypeSpec::Boolean,
            FieldKind::Array { separator, .. } => TypeSpec::Array { separator: *separator },
            FieldKind::FullText { stop_words, prefix_search, .. } => TypeSpec::FullText {
                stop_words: *stop_words,
                prefix_search: *prefix_search,
            },
            FieldKind::ForeignKey { references, .. } => TypeSpec::ForeignKey {
                references: references.clone(),
            },
        };

        FieldSpec {
            name: self.name.clone(),
            ty,
            aliases: self.aliases.clone(),
        }
    }

    pub fn field_type(&self) -> FieldType {
        match &self.kind {
            FieldKind::Integer(_) => FieldType::Integer,
            FieldKind::Decimal { .. } => FieldType::Decimal,
            FieldKind::Date(_) => FieldType::Date,
            FieldKind::DateTime(_) => FieldType::DateTime,
            FieldKind::String(_) => FieldType::String,
            FieldKind::Boolean(_) => FieldType::Boolean,
            FieldKind::Array { .. } => FieldType::Array,
            FieldKind::FullText { .. } => FieldType::FullText,
            FieldKind::ForeignKey { .. } => FieldType::ForeignKey,
        }
    }

    pub fn bsi(&self) -> Option<&Bsi> {
        match &self.kind {
            FieldKind::Integer(bsi)
            | FieldKind::Decimal { bsi, .. }
            | FieldKind::Date(bsi)
            | FieldKind::DateTime(bsi) => Some(bsi),
            _ => None,
        }
    }

    fn bsi_mut(&mut self) -> Option<&mut Bsi> {
        match &mut self.kind {
            FieldKind::Integer(bsi)
            | FieldKind::Decimal { bsi, .. }
            | FieldKind::Date(bsi)
            | FieldKind::DateTime(bsi) => Some(bsi),
            _ => None,
        }
    }

    pub fn is_fulltext(&self) -> bool {
        matches!(self.kind, FieldKind::FullText { .. })
    }

    /// Index name a FOREIGNKEY field points at.
    pub fn references(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::ForeignKey { references, .. } => Some(references),
            _ => None,
        }
    }

    pub fn set_references(&mut self, index: &str) {
        if let FieldKind::ForeignKey { references, .. } = &mut self.kind {
            *references = index.to_string();
        }
    }

    /// Id referenced by record `id` through this FOREIGNKEY field.
    pub fn referenced_id(&self, id: RecordId) -> Option<RecordId> {
        match &self.kind {
            FieldKind::ForeignKey { reverse, .. } => reverse.get(&id).copied(),
            _ => None,
        }
    }

    /// Records whose reference lies in `targets`.
    pub fn referencing(&self, targets: &RoaringBitmap) -> Set<'_> {
        match &self.kind {
            FieldKind::ForeignKey { values, .. } => {
                algebra::or_many(targets.iter().map(|target| values.get(&target)).collect())
            }
            _ => algebra::empty(),
        }
    }

    /// Cast a textual value into the field's integer domain.
    pub fn cast_number(&self, raw: &str) -> Option<i64> {
        match &self.kind {
            FieldKind::Integer(_) => cast::parse_integer(raw),
            FieldKind::Decimal { precision, .. } => cast::parse_decimal(raw, *precision),
            FieldKind::Date(_) => cast::parse_date(raw),
            FieldKind::DateTime(_) => cast::parse_datetime(raw),
            _ => None,
        }
    }

    /// Validate and convert an inserted value. Nothing is written.
    pub fn cast(&self, raw: &str, analysis: &TextAnalysis) -> Result<FieldValue> {
        let value = match &self.kind {
            FieldKind::Integer(bsi)
            | FieldKind::Decimal { bsi, .. }
            | FieldKind::Date(bsi)
            | FieldKind::DateTime(bsi) => {
                let number = self
                    .cast_number(raw)
                    .ok_or_else(|| Error::invalid_value(&self.name, raw))?;
                if !bsi.in_domain(number) {
                    return Err(Error::new(
                        ErrorKind::InvalidValue,
                        format!("value '{}' for field '{}' is out of range", raw, self.name),
                    ));
                }
                FieldValue::Number(number)
            }
            FieldKind::String(_) => FieldValue::Term(raw.to_string()),
            FieldKind::Boolean(_) => FieldValue::Flag(cast::parse_bool(raw)),
            FieldKind::Array { separator, .. } => FieldValue::Terms(cast::split_array(raw, *separator)),
            FieldKind::FullText { stop_words, .. } => {
                FieldValue::Terms(analysis.analyzer(*stop_words).terms(raw))
            }
            FieldKind::ForeignKey { .. } => {
                let target = raw
                    .trim()
                    .parse::<RecordId>()
                    .map_err(|_| Error::invalid_value(&self.name, raw))?;
                FieldValue::Reference(target)
            }
        };
        Ok(value)
    }

    /// Write a value produced by `cast`.
    pub fn insert(&mut self, id: RecordId, value: FieldValue) {
        if let FieldValue::Number(number) = value {
            if let Some(bsi) = self.bsi_mut() {
                bsi.add(id, number);
            }
            return;
        }

        match (&mut self.kind, value) {
            (FieldKind::String(values), FieldValue::Term(term)) => values.add(term, id),
            (FieldKind::Boolean(values), FieldValue::Flag(flag)) => values.add(flag, id),
            (FieldKind::Array { values, .. }, FieldValue::Terms(terms)) => {
                for term in terms {
                    values.add(term, id);
                }
            }
            (FieldKind::FullText { terms, prefix, .. }, FieldValue::Terms(words)) => {
                for word in words {
                    terms.add(word, id);
                }
                prefix.invalidate();
            }
            (FieldKind::ForeignKey { values, reverse, .. }, FieldValue::Reference(target)) => {
                values.add(target, id);
                reverse.insert(id, target);
            }
            _ => {}
        }
    }

    /// Forget every value of `id`.
    pub fn remove(&mut self, id: RecordId) {
        match &mut self.kind {
            FieldKind::Integer(bsi)
            | FieldKind::Decimal { bsi, .. }
            | FieldKind::Date(bsi)
            | FieldKind::DateTime(bsi) => {
                bsi.remove(id);
            }
            FieldKind::String(values) | FieldKind::Array { values, .. } => {
                values.remove_id(id);
            }
            FieldKind::Boolean(values) => {
                values.remove_id(id);
            }
            FieldKind::FullText { terms, prefix, .. } => {
                if terms.remove_id(id) {
                    prefix.invalidate();
                }
            }
            FieldKind::ForeignKey { values, reverse, .. } => {
                if let Some(target) = reverse.remove(&id) {
                    values.remove_from(&target, id);
                }
            }
        }
    }

    /// Exchange the values held by `a` and `b`.
    pub fn swap(&mut self, a: RecordId, b: RecordId) {
        match &mut self.kind {
            FieldKind::Integer(bsi)
            | FieldKind::Decimal { bsi, .. }
            | FieldKind::Date(bsi)
            | FieldKind::DateTime(bsi) => bsi.swap(a, b),
            FieldKind::String(values) | FieldKind::Array { values, .. } => values.swap(a, b),
            FieldKind::Boolean(values) => values.swap(a, b),
            FieldKind::FullText { terms, .. } => terms.swap(a, b),
            FieldKind::ForeignKey { values, reverse, .. } => {
                values.swap(a, b);
                let of_a = reverse.remove(&a);
                let of_b = reverse.remove(&b);
                if let Some(target) = of_a {
                    reverse.insert(b, target);
                }
                if let Some(target) = of_b {
                    reverse.insert(a, target);
                }
            }
        }
    }

    pub fn has_value(&self, id: RecordId) -> bool {
        match &self.kind {
            FieldKind::Integer(bsi)
            | FieldKind::Decimal { bsi, .. }
            | FieldKind::Date(bsi)
            | FieldKind::DateTime(bsi) => bsi.contains(id),
            FieldKind::String(values) | FieldKind::Array { values, .. } => values.contains_id(id),
            FieldKind::Boolean(values) => values.contains_id(id),
            FieldKind::FullText { terms, .. } => terms.contains_id(id),
            FieldKind::ForeignKey { reverse, .. } => reverse.contains_key(&id),
        }
    }

    /// Every record holding a value for this field.
    pub fn present(&self) -> Set<'_> {
        match &self.kind {
            FieldKind::Integer(bsi)
            | FieldKind::Decimal { bsi, .. }
            | FieldKind::Date(bsi)
            | FieldKind::DateTime(bsi) => algebra::persisted(bsi.presence()),
            FieldKind::String(values) | FieldKind::Array { values, .. } => values.union_all(),
            FieldKind::Boolean(values) => values.union_all(),
            FieldKind::FullText { terms, .. } => terms.union_all(),
            FieldKind::ForeignKey { values, .. } => values.union_all(),
        }
    }

    /// Records matching a field-qualified query value.
    pub fn lookup(&self, value: &str, analysis: &TextAnalysis) -> Result<Set<'_>> {
        if value == "*" {
            return Ok(self.present());
        }

        let set = match &self.kind {
            FieldKind::Integer(bsi)
            | FieldKind::Decimal { bsi, .. }
            | FieldKind::Date(bsi)
            | FieldKind::DateTime(bsi) => self.lookup_numeric(bsi, value)?,
            FieldKind::String(values) => values.get(value),
            FieldKind::Boolean(values) => values.get(&cast::parse_bool(value)),
            FieldKind::Array { values, .. } => values.get(value.trim()),
            FieldKind::FullText { terms, stop_words, prefix_search, prefix } => {
                let words = analysis.analyzer(*stop_words).terms(value);
                let Some((last, leading)) = words.split_last() else {
                    return Ok(algebra::empty());
                };

                let mut sets: Vec<Set<'_>> = leading.iter().map(|word| terms.get(word.as_str())).collect();
                if *prefix_search {
                    let expanded = prefix.search_prefix(last, terms.keys())?;
                    sets.push(algebra::or_many(
                        expanded.iter().map(|term| terms.get(term.as_str())).collect(),
                    ));
                } else {
                    sets.push(terms.get(last.as_str()));
                }
                algebra::and_many(sets)
            }
            FieldKind::ForeignKey { values, .. } => {
                let target = value
                    .trim()
                    .parse::<RecordId>()
                    .map_err(|_| Error::invalid_value(&self.name, value))?;
                values.get(&target)
            }
        };
        Ok(set)
    }

    fn lookup_numeric<'a>(&self, bsi: &'a Bsi, value: &str) -> Result<Set<'a>> {
        let number = |raw: &str| {
            self.cast_number(raw)
                .ok_or_else(|| Error::invalid_value(&self.name, raw))
        };

        if !range::is_range(value) {
            let exact = number(value)?;
            return Ok(bsi.get_bitmap(Some(exact), Some(exact)));
        }

        let literal = range::parse_range(value)?;
        let mut from = match &literal.lower {
            Endpoint::Open | Endpoint::Min => bsi.min(),
            Endpoint::Max => bsi.max(),
            Endpoint::Value(raw) => number(raw)?,
        };
        let mut to = match &literal.upper {
            Endpoint::Open | Endpoint::Max => bsi.max(),
            Endpoint::Min => bsi.min(),
            Endpoint::Value(raw) => number(raw)?,
        };
        if literal.lower_exclusive {
            from = from.saturating_add(1);
        }
        if literal.upper_exclusive {
            to = to.saturating_sub(1);
        }
        Ok(bsi.get_bitmap(Some(from), Some(to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: TypeSpec) -> Field {
        Field::from_spec(&FieldSpec {
            name: name.to_string(),
            ty,
            aliases: Vec::new(),
        })
    }

    fn ids(set: &RoaringBitmap) -> Vec<u32> {
        set.iter().collect()
    }

    fn insert(field: &mut Field, analysis: &TextAnalysis, id: RecordId, raw: &str) {
        let value = field.cast(raw, analysis).unwrap();
        field.insert(id, value);
    }

    #[test]
    fn numeric_cast_rejects_out_of_domain() {
        let analysis = TextAnalysis::new();
        let f = field("age", TypeSpec::Integer { min: 1, max: 5 });
        assert_eq!(f.cast("3", &analysis).unwrap(), FieldValue::Number(3));
        assert_eq!(f.cast("9", &analysis).unwrap_err().kind, ErrorKind::InvalidValue);
        assert_eq!(f.cast("x", &analysis).unwrap_err().kind, ErrorKind::InvalidValue);
    }

    #[test]
    fn numeric_ranges() {
        let analysis = TextAnalysis::new();
        let mut f = field("n", TypeSpec::Integer { min: 1, max: 5 });
        for id in 1..=5u32 {
            insert(&mut f, &analysis, id, &id.to_string());
        }
        assert_eq!(ids(&f.lookup("[2,4]", &analysis).unwrap()), vec![2, 3, 4]);
        assert_eq!(ids(&f.lookup("[(2,4]", &analysis).unwrap()), vec![3, 4]);
        assert_eq!(ids(&f.lookup("[2,4)]", &analysis).unwrap()), vec![2, 3]);
        assert_eq!(ids(&f.lookup("[min,max]", &analysis).unwrap()), vec![1, 2, 3, 4, 5]);
        assert_eq!(ids(&f.lookup("[,2]", &analysis).unwrap()), vec![1, 2]);
        assert_eq!(ids(&f.lookup("3", &analysis).unwrap()), vec![3]);
        assert!(f.lookup("[a,2]", &analysis).is_err());
    }

    #[test]
    fn decimal_values_are_scaled() {
        let analysis = TextAnalysis::new();
        let mut f = field("price", TypeSpec::Decimal { min: 0, max: 10_000, precision: 2 });
        insert(&mut f, &analysis, 1, "1.25");
        insert(&mut f, &analysis, 2, "99.99");
        assert_eq!(f.bsi().unwrap().value_of(1), Some(125));
        assert_eq!(ids(&f.lookup("[1.2,1.3]", &analysis).unwrap()), vec![1]);
    }

    #[test]
    fn arrays_and_booleans() {
        let analysis = TextAnalysis::new();
        let mut tags = field("tags", TypeSpec::Array { separator: ',' });
        insert(&mut tags, &analysis, 1, "red,green");
        insert(&mut tags, &analysis, 2, "green,,green");
        assert_eq!(ids(&tags.lookup("green", &analysis).unwrap()), vec![1, 2]);
        assert_eq!(ids(&tags.lookup("red", &analysis).unwrap()), vec![1]);

        let mut flag = field("active", TypeSpec::Boolean);
        insert(&mut flag, &analysis, 1, "yes");
        insert(&mut flag, &analysis, 2, "whatever");
        assert_eq!(ids(&flag.lookup("true", &analysis).unwrap()), vec![1]);
        assert_eq!(ids(&flag.lookup("0", &analysis).unwrap()), vec![2]);
    }

    #[test]
    fn fulltext_prefix_search() {
        let analysis = TextAnalysis::new();
        let mut f = field("body", TypeSpec::FullText { stop_words: true, prefix_search: true });
        insert(&mut f, &analysis, 1, "Quick brown foxes");
        insert(&mut f, &analysis, 2, "a brownish fog");

        assert_eq!(ids(&f.lookup("fox", &analysis).unwrap()), vec![1]);
        assert_eq!(ids(&f.lookup("brown", &analysis).unwrap()), vec![1, 2]);
        assert_eq!(ids(&f.lookup("fo", &analysis).unwrap()), vec![1, 2]);
        assert_eq!(ids(&f.lookup("quick fo", &analysis).unwrap()), vec![1]);

        f.remove(1);
        assert!(!f.has_value(1));
        assert_eq!(ids(&f.lookup("fo", &analysis).unwrap()), vec![2]);
    }

    #[test]
    fn foreign_key_reverse_map_follows_swaps() {
        let analysis = TextAnalysis::new();
        let mut f = field("owner", TypeSpec::ForeignKey { references: "users".to_string() });
        insert(&mut f, &analysis, 1, "10");
        insert(&mut f, &analysis, 2, "20");

        f.swap(1, 3);
        assert_eq!(f.referenced_id(3), Some(10));
        assert!(f.has_value(3));
        assert!(!f.has_value(1));
        assert_eq!(f.referenced_id(1), None);

        let targets: RoaringBitmap = [10, 20].into_iter().collect();
        assert_eq!(ids(&f.referencing(&targets)), vec![2, 3]);

        f.remove(3);
        assert_eq!(ids(&f.lookup("10", &analysis).unwrap()), Vec::<u32>::new());
    }

    #[test]
    fn spec_round_trips() {
        let spec = FieldSpec {
            name: "when".to_string(),
            ty: TypeSpec::Date { min: 0, max: 365 },
            aliases: vec!["at".to_string()],
        };
        assert_eq!(Field::from_spec(&spec).spec(), spec);
    }
}
