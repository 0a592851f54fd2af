use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::dedup::DedupFilter;
use crate::analysis::filters::lowercase::LowercaseFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{StandardTokenizer, Tokenizer};

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// Analysed term texts in order of first appearance.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.analyze(text).into_iter().map(|token| token.text).collect()
    }

    /// English full-text pipeline: split, lowercase, optional stop words,
    /// stem, dedup.
    pub fn fulltext(stop_words: bool) -> Self {
        let name = if stop_words { "fulltext" } else { "fulltext_all_words" };
        let mut analyzer = Analyzer::new(name.to_string(), Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(LowercaseFilter));
        if stop_words {
            analyzer = analyzer.add_filter(Box::new(StopWordFilter::english()));
        }
        analyzer
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
            .add_filter(Box::new(DedupFilter))
    }
}

/// The two full-text pipelines a schema can ask for.
pub struct TextAnalysis {
    with_stop_words: Analyzer,
    all_words: Analyzer,
}

impl TextAnalysis {
    pub fn new() -> Self {
        TextAnalysis {
            with_stop_words: Analyzer::fulltext(true),
            all_words: Analyzer::fulltext(false),
        }
    }

    pub fn analyzer(&self, stop_words: bool) -> &Analyzer {
        if stop_words {
            &self.with_stop_words
        } else {
            &self.all_words
        }
    }
}

impl Default for TextAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fulltext_pipeline() {
        let analysis = TextAnalysis::new();
        let terms = analysis.analyzer(true).terms("The Runners are running to the Park");
        assert_eq!(terms, vec!["runner", "run", "park"]);
    }

    #[test]
    fn stop_words_can_be_kept() {
        let analysis = TextAnalysis::new();
        let terms = analysis.analyzer(false).terms("the cat and the dog");
        assert_eq!(terms, vec!["the", "cat", "and", "dog"]);
    }
}
