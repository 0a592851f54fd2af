pub mod core;
pub mod lexer;
pub mod bitmap;
pub mod index;
pub mod analysis;
pub mod command;
pub mod query;
pub mod writer;
pub mod search;

pub use crate::core::config::EngineConfig;
pub use crate::core::engine::{Engine, Tick};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::scheduler::{SharedEngine, spawn_maintenance};
pub use crate::core::types::{RecordId, Response};

/*
┌──────────────────────────────────── BITDEX ARCHITECTURE ─────────────────────────────────────┐
│                                                                                               │
│   execute("SEARCH items '@qty:[1,5]' SORTBY qty LIMIT 10 WITHCURSOR")                         │
│        │                                                                                      │
│        ▼                                                                                      │
│   ┌──────────────────┐    ┌───────────────────────────────────────────────────────────┐      │
│   │ command::parse   │──▶ │ struct Engine                                              │      │
│   │ lexer + grammar  │    │ • indexes: HashMap<String, Index>                          │      │
│   └──────────────────┘    │ • queue: WriteQueue        // deferred DELETE/REID/INSERT  │      │
│                           │ • cursors: CursorStore     // TTL-bound resumable results  │      │
│                           │ • analysis: TextAnalysis   // FULLTEXT pipelines           │      │
│                           └───────────────────────────────────────────────────────────┘      │
│                                     │ SEARCH / DELETEALL                                      │
│                                     ▼                                                         │
│   ┌──────────────────┐    ┌──────────────────┐    ┌──────────────────────────────────┐       │
│   │ query::parse     │──▶ │ query::to_postfix│──▶ │ query::resolve(lookup)           │       │
│   │ terms + infix    │    │ shunting-yard    │    │ stack of Cow<RoaringBitmap>      │       │
│   └──────────────────┘    └──────────────────┘    └──────────────────────────────────┘       │
│                                                              │ per term                       │
│                                                              ▼                                │
│   ┌────────────────────────── struct Index ────────────────────────────────────────────┐     │
│   │ universe: RoaringBitmap        fields: Vec<Field>        slow_log: SlowLog           │     │
│   │                                                                                      │     │
│   │  FieldKind::Integer/Decimal/Date/DateTime ──▶ Bsi { presence, zeros[width] }        │     │
│   │  FieldKind::String/Boolean/Array          ──▶ ValueMap<K> (BTreeMap<K, Roaring>)    │     │
│   │  FieldKind::FullText                      ──▶ ValueMap<String> + PrefixIndex (fst)  │     │
│   │  FieldKind::ForeignKey                    ──▶ ValueMap<RecordId> + reverse map       │     │
│   └──────────────────────────────────────────────────────────────────────────────────────┘     │
│                                                                                               │
│   scheduler::spawn_maintenance ── tokio interval ──▶ Engine::tick (drain queue, expire cursors)│
└───────────────────────────────────────────────────────────────────────────────────────────────┘
*/
