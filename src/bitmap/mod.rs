pub mod algebra;

pub use algebra::Set;
