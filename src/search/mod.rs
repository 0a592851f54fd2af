pub mod cursor;
pub mod results;
pub mod slow_log;

pub use cursor::{Cursor, CursorStore};
pub use results::{Hit, SearchResult};
pub use slow_log::{SlowLog, SlowQuery};
