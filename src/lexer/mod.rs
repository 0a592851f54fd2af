//! Regex rule lexer shared by the command and query languages.
//!
//! Rules are grouped by mode. A rule may open a compound token and switch to
//! a sub-mode (quoted strings), whose rules append to that token until a rule
//! closes it again.

use std::collections::HashMap;
use std::ops::Range;
use regex::Regex;
use crate::core::error::{Error, Result};

pub const DEFAULT_MODE: &str = "default";

#[derive(Debug, Clone, PartialEq)]
pub struct Token<K> {
    pub kind: K,
    pub text: String,
    pub span: Range<usize>,
}

pub enum Action<K> {
    Emit(K),
    Skip,
    /// Open a token of the given kind and switch to the named mode
    Enter(K, &'static str),
    /// Append the (transformed) match to the open token
    Append(fn(&str) -> String),
    /// Close the open token and return to the enclosing mode
    Exit,
}

struct Rule<K> {
    regex: Regex,
    action: Action<K>,
}

pub struct Lexer<K> {
    modes: HashMap<&'static str, Vec<Rule<K>>>,
}

impl<K: Copy> Lexer<K> {
    pub fn new() -> Self {
        Lexer {
            modes: HashMap::new(),
        }
    }

    /// Add a rule to `mode`. Rules are tried in insertion order and the first
    /// non-empty match wins.
    pub fn rule(mut self, mode: &'static str, pattern: &str, action: Action<K>) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})", pattern))?;
        self.modes
            .entry(mode)
            .or_insert_with(Vec::new)
            .push(Rule { regex, action });
        Ok(self)
    }

    pub fn tokenize(&self, input: &str) -> Result<Vec<Token<K>>> {
        let mut tokens = Vec::new();
        let mut modes = vec![DEFAULT_MODE];
        let mut open: Vec<Token<K>> = Vec::new();
        let mut pos = 0;

        while pos < input.len() {
            let rest = &input[pos..];
            let mode = modes.last().copied().unwrap_or(DEFAULT_MODE);
            let rules = self.modes.get(mode).map(Vec::as_slice).unwrap_or(&[]);

            let (rule, len) = rules
                .iter()
                .find_map(|rule| {
                    rule.regex
                        .find(rest)
                        .filter(|m| m.end() > 0)
                        .map(|m| (rule, m.end()))
                })
                .ok_or_else(|| Error::tokenize(rest))?;

            let matched = &rest[..len];
            let span = pos..pos + len;

            match &rule.action {
                Action::Emit(kind) => tokens.push(Token {
                    kind: *kind,
                    text: matched.to_string(),
                    span,
                }),
                Action::Skip => {}
                Action::Enter(kind, next) => {
                    open.push(Token {
                        kind: *kind,
                        text: String::new(),
                        span,
                    });
                    modes.push(next);
                }
                Action::Append(transform) => {
                    if let Some(token) = open.last_mut() {
                        token.text.push_str(&transform(matched));
                        token.span.end = span.end;
                    }
                }
                Action::Exit => {
                    if let Some(mut token) = open.pop() {
                        token.span.end = span.end;
                        match open.last_mut() {
                            Some(outer) => {
                                outer.text.push_str(&token.text);
                                outer.span.end = token.span.end;
                            }
                            None => tokens.push(token),
                        }
                    }
                    if modes.len() > 1 {
                        modes.pop();
                    }
                }
            }
            pos += len;
        }

        // Unterminated sub-mode: report from where it was opened
        if let Some(token) = open.first() {
            return Err(Error::tokenize(&input[token.span.start..]));
        }

        Ok(tokens)
    }
}

impl<K: Copy> Default for Lexer<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep the match verbatim.
pub fn verbatim(text: &str) -> String {
    text.to_string()
}

/// Drop the escaping backslash of a two character escape sequence.
pub fn unescape(text: &str) -> String {
    text.chars().skip(1).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Kind {
        Word,
        Quoted,
        Comma,
    }

    fn lexer() -> Lexer<Kind> {
        Lexer::new()
            .rule(DEFAULT_MODE, r"\s+", Action::Skip).unwrap()
            .rule(DEFAULT_MODE, ",", Action::Emit(Kind::Comma)).unwrap()
            .rule(DEFAULT_MODE, "'", Action::Enter(Kind::Quoted, "quoted")).unwrap()
            .rule(DEFAULT_MODE, r"[a-z0-9]+", Action::Emit(Kind::Word)).unwrap()
            .rule("quoted", r"\\.", Action::Append(unescape)).unwrap()
            .rule("quoted", r"[^'\\]+", Action::Append(verbatim)).unwrap()
            .rule("quoted", "'", Action::Exit).unwrap()
    }

    #[test]
    fn emits_and_skips() {
        let tokens = lexer().tokenize("foo, bar").unwrap();
        let kinds: Vec<Kind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![Kind::Word, Kind::Comma, Kind::Word]);
        assert_eq!(tokens[2].text, "bar");
        assert_eq!(tokens[2].span, 5..8);
    }

    #[test]
    fn quoted_mode_collects_one_token() {
        let tokens = lexer().tokenize(r"a 'it\'s a \\ test' b").unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].kind, Kind::Quoted);
        assert_eq!(tokens[1].text, r"it's a \ test");
    }

    #[test]
    fn empty_quotes_yield_empty_token() {
        let tokens = lexer().tokenize("''").unwrap();
        assert_eq!(tokens[0].text, "");
        assert_eq!(tokens[0].span, 0..2);
    }

    #[test]
    fn reports_unconsumed_remainder() {
        let err = lexer().tokenize("foo $bar").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Tokenize);
        assert!(err.context.contains("$bar"));

        let err = lexer().tokenize("foo 'open").unwrap_err();
        assert!(err.context.contains("'open"));
    }
}
