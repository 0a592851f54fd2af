use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use roaring::RoaringBitmap;
use tracing::{debug, info, warn};
use crate::analysis::analyzer::TextAnalysis;
use crate::bitmap::algebra::{self, Set};
use crate::command::{self, Command, FieldSpec, SearchSpec};
use crate::core::config::EngineConfig;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{EngineStats, FieldStats, IndexStats, Stats};
use crate::core::types::{RecordId, Response};
use crate::index::collection::Index;
use crate::query::{self, FieldRef, Operand, Term, TermValue};
use crate::search::cursor::{Cursor, CursorStore, IdStream};
use crate::search::results::{Hit, SearchResult};
use crate::writer::queue::{WriteAction, WriteEntry, WriteQueue};

/// Outcome of one scheduler step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick {
    pub applied: usize,
    pub failed: usize,
    pub expired_cursors: usize,
}

/// Owns every index, the write queue and the open cursors.
///
/// Commands run to completion on the caller's thread. Deferred DELETE and
/// REID entries, and INSERTs queued behind them, are applied by `tick`,
/// which also expires idle cursors.
pub struct Engine {
    config: EngineConfig,
    indexes: HashMap<String, Index>,
    queue: WriteQueue,
    cursors: CursorStore,
    analysis: TextAnalysis,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Engine {
            config,
            indexes: HashMap::new(),
            queue: WriteQueue::new(),
            cursors: CursorStore::new(),
            analysis: TextAnalysis::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn index(&self, name: &str) -> Option<&Index> {
        self.indexes.get(name)
    }

    pub fn queued_writes(&self) -> usize {
        self.queue.len()
    }

    pub fn open_cursors(&self) -> usize {
        self.cursors.len()
    }

    /// Parse and run one command.
    pub fn execute(&mut self, input: &str) -> Result<Response> {
        let command = command::parse(input)?;
        self.dispatch(command)
    }

    pub fn dispatch(&mut self, command: Command) -> Result<Response> {
        debug!(command = command.name(), "executing command");

        match command {
            Command::Ping => Ok(Response::Pong),
            Command::List => {
                let mut names: Vec<String> = self.indexes.keys().cloned().collect();
                names.sort();
                Ok(Response::List(names))
            }
            Command::Stat { index, field, limit } => self.stat(index, field, limit),
            Command::Create { index, fields } => self.create(index, fields),
            Command::Drop { index } => self.drop_index(&index),
            Command::Truncate { index } => self.truncate(&index),
            Command::Rename { index, new_name } => self.rename(&index, &new_name),
            Command::Insert { index, id, values } => self.insert(&index, id, values),
            Command::Delete { index, id, sync } => {
                self.mutate(&index, id, WriteAction::Delete, sync)
            }
            Command::DeleteAll { index, query, sync } => self.delete_all(&index, &query, sync),
            Command::Reid { index, from, to, sync } => {
                self.mutate(&index, from, WriteAction::Reid { to }, sync)
            }
            Command::Search(spec) => self.search(spec),
            Command::Cursor { id } => self.cursor(&id),
            Command::ShowCreate { index } => {
                let index = self.require_index(&index)?;
                Ok(Response::ShowCreate(command::show_create(
                    index.name(),
                    &index.schema(),
                )))
            }
            Command::SlowQueryLog { index, clear } => self.slow_query_log(index, clear),
        }
    }

    /// Scheduler step at the current time.
    pub fn tick(&mut self) -> Tick {
        self.tick_at(Instant::now())
    }

    /// Expire idle cursors and, when due, drain the write queue for at most
    /// the configured budget. Leftover entries re-arm an immediate tick.
    pub fn tick_at(&mut self, now: Instant) -> Tick {
        let mut tick = Tick {
            expired_cursors: self.cursors.expire(now),
            ..Tick::default()
        };

        if self.queue.is_due(now) {
            let deadline = Instant::now() + self.config.sync_budget();
            while let Some(entry) = self.queue.pop() {
                self.apply_logged(entry, &mut tick);
                if Instant::now() >= deadline {
                    break;
                }
            }
            self.queue.rearm(now);
            debug!(
                applied = tick.applied,
                failed = tick.failed,
                remaining = self.queue.len(),
                "drained write queue"
            );
        }
        tick
    }

    /// Apply every queued entry regardless of deadline and budget.
    pub fn sync(&mut self) -> Tick {
        let mut tick = Tick::default();
        while let Some(entry) = self.queue.pop() {
            self.apply_logged(entry, &mut tick);
        }
        tick
    }

    fn require_index(&self, name: &str) -> Result<&Index> {
        self.indexes
            .get(name)
            .ok_or_else(|| Error::index_not_found(name))
    }

    fn apply_logged(&mut self, entry: WriteEntry, tick: &mut Tick) {
        match self.apply(&entry) {
            Ok(()) => tick.applied += 1,
            Err(err) => {
                tick.failed += 1;
                warn!(index = %entry.index, id = entry.id, error = %err, "queued write failed");
            }
        }
    }

    fn apply(&mut self, entry: &WriteEntry) -> Result<()> {
        let analysis = &self.analysis;
        let index = self
            .indexes
            .get_mut(&entry.index)
            .ok_or_else(|| Error::index_not_found(&entry.index))?;

        match &entry.action {
            WriteAction::Insert(values) => index.insert(entry.id, values, analysis),
            WriteAction::Delete => index.delete(entry.id),
            WriteAction::Reid { to } => index.reid(entry.id, *to),
        }
    }

    /// Apply, in order, the queued entries touching `(index, id)`.
    fn flush_pending(&mut self, index: &str, id: RecordId) {
        let mut tick = Tick::default();
        for entry in self.queue.take_for(index, id) {
            self.apply_logged(entry, &mut tick);
        }
    }

    fn create(&mut self, name: String, fields: Vec<FieldSpec>) -> Result<Response> {
        if self.indexes.contains_key(&name) {
            return Err(Error::new(
                ErrorKind::IndexExists,
                format!("index '{}' already exists", name),
            ));
        }

        let index = Index::new(&name, &fields, self.config.slow_query_log_capacity);
        info!(index = %name, fields = fields.len(), "created index");
        self.indexes.insert(name, index);
        Ok(Response::Ok)
    }

    fn drop_index(&mut self, name: &str) -> Result<Response> {
        self.indexes
            .remove(name)
            .ok_or_else(|| Error::index_not_found(name))?;
        let discarded = self.queue.discard_index(name);
        let closed = self.cursors.discard_index(name);
        info!(index = %name, discarded, closed, "dropped index");
        Ok(Response::Ok)
    }

    fn truncate(&mut self, name: &str) -> Result<Response> {
        let emptied = self.require_index(name)?.emptied();
        self.indexes.insert(name.to_string(), emptied);
        let discarded = self.queue.discard_index(name);
        let closed = self.cursors.discard_index(name);
        info!(index = %name, discarded, closed, "truncated index");
        Ok(Response::Ok)
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<Response> {
        if self.indexes.contains_key(to) {
            return Err(Error::new(
                ErrorKind::IndexExists,
                format!("index '{}' already exists", to),
            ));
        }
        let mut index = self
            .indexes
            .remove(from)
            .ok_or_else(|| Error::index_not_found(from))?;

        index.set_name(to);
        self.indexes.insert(to.to_string(), index);
        for other in self.indexes.values_mut() {
            other.retarget_references(from, to);
        }
        self.queue.rename_index(from, to);
        self.cursors.rename_index(from, to);
        info!(from, to, "renamed index");
        Ok(Response::Ok)
    }

    /// INSERT applies at once unless the id has queued writes, in which
    /// case it is validated now and queued behind them.
    fn insert(&mut self, name: &str, id: RecordId, values: Vec<(String, String)>) -> Result<Response> {
        let analysis = &self.analysis;
        let index = self
            .indexes
            .get_mut(name)
            .ok_or_else(|| Error::index_not_found(name))?;

        if self.queue.contains(name, id) {
            index.cast_values(&values, analysis)?;
            let entry = WriteEntry::new(name, id, WriteAction::Insert(values));
            self.queue.push(entry, Instant::now(), self.config.sync_delay());
            return Ok(Response::Queued);
        }

        index.insert(id, &values, analysis)?;
        Ok(Response::Ok)
    }

    /// DELETE and REID: queued unless `sync`, in which case writes already
    /// queued for the affected ids are applied first.
    fn mutate(&mut self, name: &str, id: RecordId, action: WriteAction, sync: bool) -> Result<Response> {
        let index = self.require_index(name)?;
        if !index.contains(id) && !self.queue.contains(name, id) {
            return Err(Error::new(
                ErrorKind::IdNotFound,
                format!("id {} does not exist in index '{}'", id, name),
            ));
        }

        let entry = WriteEntry::new(name, id, action);
        if !sync {
            self.queue.push(entry, Instant::now(), self.config.sync_delay());
            return Ok(Response::Queued);
        }

        self.flush_pending(name, id);
        if let WriteAction::Reid { to } = entry.action {
            self.flush_pending(name, to);
        }
        self.apply(&entry)?;
        Ok(Response::Ok)
    }

    fn delete_all(&mut self, name: &str, query: &str, sync: bool) -> Result<Response> {
        let matches = self.resolve_query(name, query)?;
        let now = Instant::now();

        for id in &matches {
            if sync {
                self.flush_pending(name, id);
                if let Some(index) = self.indexes.get_mut(name) {
                    if index.contains(id) {
                        index.delete(id)?;
                    }
                }
            } else {
                let entry = WriteEntry::new(name, id, WriteAction::Delete);
                self.queue.push(entry, now, self.config.sync_delay());
            }
        }

        if sync || matches.is_empty() {
            Ok(Response::Ok)
        } else {
            Ok(Response::Queued)
        }
    }

    /// Resolve query text against an index into the matching live ids.
    fn resolve_query(&self, name: &str, text: &str) -> Result<RoaringBitmap> {
        let index = self.require_index(name)?;
        let query = query::parse(text)?;
        let postfix = query::to_postfix(&query.infix)?;

        let set = query::resolve(&postfix, |operand| match operand {
            Operand::All => Ok(algebra::persisted(index.universe())),
            Operand::Term(position) => self.resolve_term(index, &query.terms[*position]),
        })?;
        Ok(set.into_owned())
    }

    fn resolve_term<'a>(&'a self, index: &'a Index, term: &Term) -> Result<Set<'a>> {
        match (&term.field, &term.value) {
            (None, TermValue::Text(text)) => {
                let sets = index
                    .fulltext_fields()
                    .map(|field| field.lookup(text, &self.analysis))
                    .collect::<Result<Vec<_>>>()?;
                Ok(algebra::or_many(sets))
            }
            (Some(FieldRef::Local(name)), TermValue::Text(value)) => {
                index.require_field(name)?.lookup(value, &self.analysis)
            }
            (Some(FieldRef::Local(name)), TermValue::Subquery(subquery)) => {
                let field = index.require_field(name)?;
                let target = field.references().ok_or_else(|| not_foreign_key(index, name))?;
                let matches = self.resolve_query(target, subquery)?;
                Ok(field.referencing(&matches))
            }
            (Some(FieldRef::Parent(child)), TermValue::Subquery(subquery)) => {
                let child_index = self.require_index(child)?;
                let mut references = child_index.references_to(index.name());
                let field = references.next().ok_or_else(|| {
                    Error::new(
                        ErrorKind::NotForeignKey,
                        format!("no field of '{}' references '{}'", child, index.name()),
                    )
                })?;
                if references.next().is_some() {
                    return Err(Error::new(
                        ErrorKind::AmbiguousReference,
                        format!("several fields of '{}' reference '{}'", child, index.name()),
                    ));
                }

                let matches = self.resolve_query(child, subquery)?;
                let mut parents: RoaringBitmap = matches
                    .iter()
                    .filter_map(|id| field.referenced_id(id))
                    .collect();
                parents &= index.universe();
                Ok(Cow::Owned(parents))
            }
            (_, TermValue::Subquery(subquery)) | (Some(FieldRef::Parent(_)), TermValue::Text(subquery)) => {
                Err(Error::query(format!("sub-query '{}' needs a qualifying field", subquery)))
            }
        }
    }

    fn search(&mut self, spec: SearchSpec) -> Result<Response> {
        let started = Instant::now();
        let index = self.require_index(&spec.index)?;

        let sort = match &spec.sort {
            Some(sort) => {
                let field = index.require_field(&sort.field)?;
                let bsi = field.bsi().ok_or_else(|| {
                    Error::new(
                        ErrorKind::NotSortable,
                        format!("field '{}' of index '{}' is not sortable", sort.field, index.name()),
                    )
                })?;
                Some((bsi, !sort.descending))
            }
            None => None,
        };
        for name in &spec.foreign_keys {
            if index.require_field(name)?.references().is_none() {
                return Err(not_foreign_key(index, name));
            }
        }

        let matches = self.resolve_query(&spec.index, &spec.query)?;
        let total = matches.len();
        let limit = spec.limit.unwrap_or(self.config.default_limit);
        let ids: IdStream = match sort {
            Some((bsi, ascending)) => Box::new(bsi.sort(&matches, ascending)),
            None => Box::new(matches.into_iter()),
        };

        let now = Instant::now();
        let ttl = spec
            .cursor
            .as_ref()
            .and_then(|cursor| cursor.timeout)
            .map(std::time::Duration::from_secs)
            .unwrap_or_else(|| self.config.cursor_ttl());
        let mut cursor = Cursor::new(index.name(), ids, total, limit, ttl, now)
            .with_foreign_keys(spec.foreign_keys.clone());

        let page = cursor.next_page(|_| true);
        let hits = project(index, &page, &cursor.foreign_keys);
        let cursor_id = if spec.cursor.is_some() && cursor.has_more() {
            Some(self.cursors.open(cursor))
        } else {
            None
        };

        let elapsed = started.elapsed();
        if elapsed > self.config.slow_query_threshold() {
            warn!(index = %spec.index, query = %spec.query, elapsed_ms = elapsed.as_millis() as u64, "slow query");
            if let Some(index) = self.indexes.get_mut(&spec.index) {
                index.slow_log_mut().record(&spec.query, elapsed);
            }
        }

        Ok(Response::Search(SearchResult {
            total,
            offset: 0,
            hits,
            cursor: cursor_id,
        }))
    }

    fn cursor(&mut self, id: &str) -> Result<Response> {
        let now = Instant::now();
        let mut cursor = self.cursors.take(id, now).ok_or_else(|| {
            Error::new(ErrorKind::CursorNotFound, format!("cursor '{}' does not exist", id))
        })?;
        let index = self
            .indexes
            .get(&cursor.index)
            .ok_or_else(|| Error::index_not_found(&cursor.index))?;

        let offset = cursor.offset;
        let page = cursor.next_page(|record| index.contains(record));
        let hits = project(index, &page, &cursor.foreign_keys);
        let total = cursor.total;

        let next = if cursor.has_more() {
            self.cursors.restore(id.to_string(), cursor, now);
            Some(id.to_string())
        } else {
            None
        };

        Ok(Response::Search(SearchResult {
            total,
            offset,
            hits,
            cursor: next,
        }))
    }

    fn stat(&self, index: Option<String>, field: Option<String>, limit: Option<usize>) -> Result<Response> {
        let stats = match (index, field) {
            (None, _) => Stats::Engine(EngineStats {
                indexes: self
                    .indexes
                    .iter()
                    .map(|(name, index)| (name.clone(), index.len()))
                    .collect(),
                queued_writes: self.queue.len(),
                open_cursors: self.cursors.len(),
            }),
            (Some(name), None) => Stats::Index(IndexStats::of(self.require_index(&name)?)),
            (Some(name), Some(field)) => {
                let index = self.require_index(&name)?;
                let field = index.require_field(&field)?;
                Stats::Field(FieldStats::of(
                    index,
                    field,
                    limit.unwrap_or(self.config.stat_value_limit),
                ))
            }
        };
        Ok(Response::Stat(stats))
    }

    fn slow_query_log(&mut self, index: Option<String>, clear: bool) -> Result<Response> {
        let names: Vec<String> = match index {
            Some(name) => {
                self.require_index(&name)?;
                vec![name]
            }
            None => self.indexes.keys().cloned().collect(),
        };

        if clear {
            for name in &names {
                if let Some(index) = self.indexes.get_mut(name) {
                    index.slow_log_mut().clear();
                }
            }
            return Ok(Response::Ok);
        }

        let log: BTreeMap<_, _> = names
            .into_iter()
            .filter_map(|name| {
                let entries = self.indexes.get(&name)?.slow_log().entries();
                Some((name, entries))
            })
            .collect();
        Ok(Response::SlowQueryLog(log))
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn not_foreign_key(index: &Index, field: &str) -> Error {
    Error::new(
        ErrorKind::NotForeignKey,
        format!("field '{}' of index '{}' is not a foreign key", field, index.name()),
    )
}

/// Hits for `ids`, with the requested foreign-key projections attached.
fn project(index: &Index, ids: &[RecordId], foreign_keys: &[String]) -> Vec<Hit> {
    ids.iter()
        .map(|&id| {
            let mut hit = Hit::new(id);
            for name in foreign_keys {
                if let Some(target) = index.field(name).and_then(|field| field.referenced_id(id)) {
                    hit.foreign_keys.insert(name.clone(), target);
                }
            }
            hit
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::default();
        engine.execute("CREATE items FIELDS name STRING qty INTEGER MIN 0 MAX 100").unwrap();
        for (id, name, qty) in [(1, "a", 5), (2, "b", 50), (3, "c", 10)] {
            engine
                .execute(&format!("INSERT items {} VALUES name {} qty {}", id, name, qty))
                .unwrap();
        }
        engine
    }

    fn ids(response: Response) -> Vec<RecordId> {
        response.as_search().map(SearchResult::ids).unwrap_or_default()
    }

    #[test]
    fn queued_delete_is_applied_by_tick() {
        let mut engine = engine();
        assert_eq!(engine.execute("DELETE items 2").unwrap(), Response::Queued);
        assert_eq!(engine.queued_writes(), 1);
        assert_eq!(ids(engine.execute("SEARCH items *").unwrap()), vec![1, 2, 3]);

        let tick = engine.tick();
        assert_eq!(tick.applied, 1);
        assert_eq!(ids(engine.execute("SEARCH items *").unwrap()), vec![1, 3]);
    }

    #[test]
    fn insert_waits_behind_queued_writes() {
        let mut engine = engine();
        engine.execute("DELETE items 1").unwrap();
        assert_eq!(
            engine.execute("INSERT items 1 VALUES name z").unwrap(),
            Response::Queued
        );
        // Validated before queueing
        let err = engine.execute("INSERT items 1 VALUES qty 500").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidValue);

        engine.sync();
        assert_eq!(ids(engine.execute("SEARCH items '@name:z'").unwrap()), vec![1]);
        assert!(ids(engine.execute("SEARCH items '@name:a'").unwrap()).is_empty());
    }

    #[test]
    fn sync_reid_flushes_pending_entries_first() {
        let mut engine = engine();
        engine.execute("DELETE items 3").unwrap();
        engine.execute("REID items 1 3 SYNC").unwrap();
        assert_eq!(engine.queued_writes(), 0);
        assert_eq!(ids(engine.execute("SEARCH items '@name:a'").unwrap()), vec![3]);
    }

    #[test]
    fn sort_and_validation() {
        let mut engine = engine();
        let sorted = engine.execute("SEARCH items * SORTBY qty DESC").unwrap();
        assert_eq!(ids(sorted), vec![2, 3, 1]);

        let err = engine.execute("SEARCH items * SORTBY name").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotSortable);
        let err = engine.execute("SEARCH items * WITHFOREIGNKEYS qty").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotForeignKey);
        let err = engine.execute("SEARCH items '@nope:1'").unwrap_err();
        assert_eq!(err.kind, ErrorKind::FieldNotFound);
    }

    #[test]
    fn drop_discards_queued_writes() {
        let mut engine = engine();
        engine.execute("DELETE items 1").unwrap();
        engine.execute("DROP items").unwrap();
        assert_eq!(engine.queued_writes(), 0);
        assert_eq!(engine.tick(), Tick::default());
        assert_eq!(
            engine.execute("SEARCH items *").unwrap_err().kind,
            ErrorKind::IndexNotFound
        );
    }
}
