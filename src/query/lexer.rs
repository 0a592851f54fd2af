use std::sync::LazyLock;
use crate::core::error::Result;
use crate::lexer::{Action, DEFAULT_MODE, Lexer, Token, unescape, verbatim};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryToken {
    /// `@name`
    Field,
    /// `@@name`
    Parent,
    Colon,
    And,
    Or,
    Not,
    Open,
    Close,
    Star,
    /// `[lo,hi]` range literal, kept whole
    Range,
    Value,
}

const SINGLE: &str = "single";
const DOUBLE: &str = "double";

static LEXER: LazyLock<Result<Lexer<QueryToken>>> = LazyLock::new(rules);

fn rules() -> Result<Lexer<QueryToken>> {
    Lexer::new()
        .rule(DEFAULT_MODE, r"\s+", Action::Skip)?
        .rule(DEFAULT_MODE, r"@@[^\s:&|()@'\x22\[\]*]+", Action::Emit(QueryToken::Parent))?
        .rule(DEFAULT_MODE, r"@[^\s:&|()@'\x22\[\]*]+", Action::Emit(QueryToken::Field))?
        .rule(DEFAULT_MODE, ":", Action::Emit(QueryToken::Colon))?
        .rule(DEFAULT_MODE, "&", Action::Emit(QueryToken::And))?
        .rule(DEFAULT_MODE, r"\|", Action::Emit(QueryToken::Or))?
        .rule(DEFAULT_MODE, "-", Action::Emit(QueryToken::Not))?
        .rule(DEFAULT_MODE, r"\(", Action::Emit(QueryToken::Open))?
        .rule(DEFAULT_MODE, r"\)", Action::Emit(QueryToken::Close))?
        .rule(DEFAULT_MODE, r"\*", Action::Emit(QueryToken::Star))?
        .rule(DEFAULT_MODE, r"\[[^\]]*\]", Action::Emit(QueryToken::Range))?
        .rule(DEFAULT_MODE, "'", Action::Enter(QueryToken::Value, SINGLE))?
        .rule(DEFAULT_MODE, "\"", Action::Enter(QueryToken::Value, DOUBLE))?
        .rule(DEFAULT_MODE, r"[^\s:&|()@'\x22\[\]*\-][^\s:&|()'\x22]*", Action::Emit(QueryToken::Value))?
        .rule(SINGLE, r"\\.", Action::Append(unescape))?
        .rule(SINGLE, r"[^'\\]+", Action::Append(verbatim))?
        .rule(SINGLE, "'", Action::Exit)?
        .rule(DOUBLE, r"\\.", Action::Append(unescape))?
        .rule(DOUBLE, r#"[^"\\]+"#, Action::Append(verbatim))?
        .rule(DOUBLE, "\"", Action::Exit)
}

pub fn tokenize(input: &str) -> Result<Vec<Token<QueryToken>>> {
    LEXER.as_ref().map_err(Clone::clone)?.tokenize(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_table_builds() {
        assert!(rules().is_ok());
        assert!(LEXER.is_ok());
    }
    use QueryToken::*;

    fn kinds(input: &str) -> Vec<QueryToken> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn structural_tokens() {
        assert_eq!(
            kinds("@f1:bar & -(@f2:[(2,4] | *)"),
            vec![Field, Colon, Value, And, Not, Open, Field, Colon, Range, Or, Star, Close]
        );
        assert_eq!(kinds("@@child:(@parent:2)"), vec![Parent, Colon, Open, Field, Colon, Value, Close]);
    }

    #[test]
    fn values_keep_inner_dashes() {
        let tokens = tokenize("@d:2020-01-01 -x").unwrap();
        assert_eq!(tokens[2].text, "2020-01-01");
        assert_eq!(tokens[3].kind, Not);
    }

    #[test]
    fn quoted_values() {
        let tokens = tokenize(r#"@t:"hello world" 'it\'s'"#).unwrap();
        assert_eq!(tokens[2].kind, Value);
        assert_eq!(tokens[2].text, "hello world");
        assert_eq!(tokens[3].text, "it's");
    }
}
