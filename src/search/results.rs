use std::collections::BTreeMap;
use serde::Serialize;
use crate::core::types::RecordId;

/// One page of a SEARCH or CURSOR call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Size of the whole resolved set
    pub total: u64,
    /// Hits returned before this page
    pub offset: u64,
    pub hits: Vec<Hit>,
    /// Set while more hits remain
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: RecordId,
    /// WITHFOREIGNKEYS projections, only fields holding a value
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub foreign_keys: BTreeMap<String, RecordId>,
}

impl Hit {
    pub fn new(id: RecordId) -> Self {
        Hit {
            id,
            foreign_keys: BTreeMap::new(),
        }
    }
}

impl SearchResult {
    pub fn ids(&self) -> Vec<RecordId> {
        self.hits.iter().map(|hit| hit.id).collect()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_projections_are_not_serialized() {
        let mut projected = Hit::new(2);
        projected.foreign_keys.insert("owner".to_string(), 7);
        let result = SearchResult {
            total: 2,
            offset: 0,
            hits: vec![Hit::new(1), projected],
            cursor: None,
        };

        assert_eq!(result.ids(), vec![1, 2]);
        assert!(result.is_exhausted());
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            r#"{"total":2,"offset":0,"hits":[{"id":1},{"id":2,"foreign_keys":{"owner":7}}],"cursor":null}"#
        );
    }
}
