pub mod lowercase;
pub mod stemmer;
pub mod stopword;
pub mod dedup;
