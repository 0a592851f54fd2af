pub mod cast;
pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod stats;
pub mod types;
