use std::sync::LazyLock;
use crate::core::error::Result;
use crate::lexer::{Action, DEFAULT_MODE, Lexer, Token, unescape, verbatim};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandToken {
    /// Bare token, a keyword or an unquoted identifier/value
    Word,
    /// Single-quoted string, never a keyword
    Quoted,
}

const QUOTED: &str = "quoted";

static LEXER: LazyLock<Result<Lexer<CommandToken>>> = LazyLock::new(rules);

fn rules() -> Result<Lexer<CommandToken>> {
    Lexer::new()
        .rule(DEFAULT_MODE, r"\s+", Action::Skip)?
        .rule(DEFAULT_MODE, "'", Action::Enter(CommandToken::Quoted, QUOTED))?
        .rule(DEFAULT_MODE, r"[^\s':]+", Action::Emit(CommandToken::Word))?
        .rule(QUOTED, r"\\.", Action::Append(unescape))?
        .rule(QUOTED, r"[^'\\]+", Action::Append(verbatim))?
        .rule(QUOTED, "'", Action::Exit)
}

pub fn tokenize(input: &str) -> Result<Vec<Token<CommandToken>>> {
    LEXER.as_ref().map_err(Clone::clone)?.tokenize(input)
}

/// Render `value` so that `tokenize` reads it back as a single token.
pub fn quote(value: &str) -> String {
    let bare = !value.is_empty()
        && !value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '\'' | ':' | '\\'));
    if bare {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if matches!(c, '\'' | '\\') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}
