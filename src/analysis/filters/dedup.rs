use std::collections::HashSet;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Keeps the first occurrence of every term.
pub struct DedupFilter;

impl TokenFilter for DedupFilter {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token> {
        let mut seen = HashSet::new();
        tokens.into_iter()
            .filter(|token| seen.insert(token.text.clone()))
            .collect()
    }

    fn name(&self) -> &str {
        "dedup"
    }
}
