pub mod bsi;
pub mod collection;
pub mod field;
pub mod prefix;
pub mod value_map;

pub use bsi::{Bsi, BsiSort};
pub use collection::Index;
pub use field::{Field, FieldKind};
