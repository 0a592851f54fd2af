use fst::{IntoStreamer, Set, SetBuilder, Streamer};
use parking_lot::RwLock;
use crate::core::error::Result;

/// FST over the terms of a full-text field, used to expand a trailing
/// prefix into the terms it matches. Built on first use after a write.
pub struct PrefixIndex {
    fst: RwLock<Option<Set<Vec<u8>>>>,

    /// Minimum prefix length to prevent abuse
    min_prefix_len: usize,
}

impl PrefixIndex {
    pub fn new(min_prefix_len: usize) -> Self {
        Self {
            fst: RwLock::new(None),
            min_prefix_len,
        }
    }

    /// Forget the built FST, the next search rebuilds it.
    pub fn invalidate(&self) {
        *self.fst.write() = None;
    }

    pub fn is_built(&self) -> bool {
        self.fst.read().is_some()
    }

    /// Terms starting with `prefix`. `terms` must yield the field's terms in
    /// sorted order, it is only consumed when the FST needs rebuilding.
    pub fn search_prefix<'t, I>(&self, prefix: &str, terms: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'t String>,
    {
        if prefix.len() < self.min_prefix_len {
            return Ok(vec![]);
        }

        if !self.is_built() {
            let mut builder = SetBuilder::memory();
            for term in terms {
                builder.insert(term.as_bytes())?;
            }
            *self.fst.write() = Some(builder.into_set());
        }

        let guard = self.fst.read();
        let Some(fst) = guard.as_ref() else {
            return Ok(vec![]);
        };

        let mut results = Vec::new();
        let prefix_bytes = prefix.as_bytes();

        // Range scan from the prefix, stopping at the first non-match
        let mut stream = fst.range().ge(prefix_bytes).into_stream();
        while let Some(term_bytes) = stream.next() {
            if !term_bytes.starts_with(prefix_bytes) {
                break;
            }
            if let Ok(term) = String::from_utf8(term_bytes.to_vec()) {
                results.push(term);
            }
        }

        Ok(results)
    }
}

impl std::fmt::Debug for PrefixIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrefixIndex")
            .field("built", &self.is_built())
            .field("min_prefix_len", &self.min_prefix_len)
            .finish()
    }
}
