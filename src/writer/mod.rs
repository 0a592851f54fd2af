pub mod queue;

pub use queue::{WriteAction, WriteEntry, WriteQueue};
