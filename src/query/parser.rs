use crate::core::error::{Error, Result};
use crate::lexer::Token;
use crate::query::ast::{FieldRef, Operand, Query, Symbol, Term, TermValue};
use crate::query::lexer::{self, QueryToken};

/// Compile query text into a term table and an infix expression.
///
/// `@field:value` yields one term. `@field:(a | b c)` distributes the field
/// over every value of the group, unless the group itself qualifies a field,
/// in which case it is kept whole as a sub-query. Unqualified values search
/// the FULLTEXT fields. Operands with no operator between them are joined by
/// an implicit AND.
pub fn parse(input: &str) -> Result<Query> {
    let tokens = lexer::tokenize(input)?;
    let mut builder = Builder {
        input,
        tokens: &tokens,
        pos: 0,
        terms: Vec::new(),
        infix: Vec::new(),
    };

    builder.sequence(None, false)?;
    if builder.infix.is_empty() {
        return Err(Error::query("empty query"));
    }

    Ok(Query {
        terms: builder.terms,
        infix: builder.infix,
    })
}

struct Builder<'a> {
    input: &'a str,
    tokens: &'a [Token<QueryToken>],
    pos: usize,
    terms: Vec<Term>,
    infix: Vec<Symbol>,
}

impl<'a> Builder<'a> {
    fn next(&mut self) -> Option<&'a Token<QueryToken>> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn push(&mut self, symbol: Symbol) {
        let implicit_and = symbol.starts_operand()
            && self.infix.last().is_some_and(Symbol::ends_operand);
        if implicit_and {
            self.infix.push(Symbol::And);
        }
        self.infix.push(symbol);
    }

    fn push_term(&mut self, term: Term) {
        let index = self.terms.len();
        self.terms.push(term);
        self.push(Symbol::Operand(Operand::Term(index)));
    }

    /// Consume symbols until the end of input, or the closing parenthesis
    /// when `nested`. `field` qualifies every bare value.
    fn sequence(&mut self, field: Option<&str>, nested: bool) -> Result<()> {
        while let Some(token) = self.next() {
            match token.kind {
                QueryToken::Value | QueryToken::Range => {
                    let qualifier = field.map(|f| FieldRef::Local(f.to_string()));
                    self.push_term(Term::text(qualifier, &token.text));
                }
                QueryToken::Star => match field {
                    Some(f) => self.push_term(Term::text(Some(FieldRef::Local(f.to_string())), "*")),
                    None => self.push(Symbol::Operand(Operand::All)),
                },
                QueryToken::And => self.push(Symbol::And),
                QueryToken::Or => self.push(Symbol::Or),
                QueryToken::Not => self.push(Symbol::Not),
                QueryToken::Open => {
                    self.push(Symbol::Open);
                    self.sequence(field, true)?;
                    self.push(Symbol::Close);
                }
                QueryToken::Close => {
                    if nested {
                        return Ok(());
                    }
                    return Err(Error::query("unbalanced ')'"));
                }
                QueryToken::Field if field.is_none() => {
                    let name = token.text[1..].to_lowercase();
                    self.qualified(FieldRef::Local(name), &token.text)?;
                }
                QueryToken::Parent if field.is_none() => {
                    let name = token.text[2..].to_lowercase();
                    self.qualified(FieldRef::Parent(name), &token.text)?;
                }
                QueryToken::Field | QueryToken::Parent => {
                    return Err(Error::query(format!("unexpected field '{}' inside a field group", token.text)));
                }
                QueryToken::Colon => return Err(Error::query("dangling ':'")),
            }
        }

        if nested {
            return Err(Error::query("unbalanced '('"));
        }
        Ok(())
    }

    /// After `@field` or `@@index`: the colon and the qualified value or group.
    fn qualified(&mut self, field: FieldRef, raw: &str) -> Result<()> {
        let dangling = || Error::query(format!("dangling field '{}'", raw));

        match self.next() {
            Some(token) if token.kind == QueryToken::Colon => {}
            _ => return Err(dangling()),
        }
        let token = self.next().ok_or_else(dangling)?;

        match token.kind {
            QueryToken::Value | QueryToken::Range => {
                let value = match field {
                    FieldRef::Parent(_) => TermValue::Subquery(token.text.clone()),
                    FieldRef::Local(_) => TermValue::Text(token.text.clone()),
                };
                self.push_term(Term { field: Some(field), value });
            }
            QueryToken::Star => {
                let value = match field {
                    FieldRef::Parent(_) => TermValue::Subquery("*".to_string()),
                    FieldRef::Local(_) => TermValue::Text("*".to_string()),
                };
                self.push_term(Term { field: Some(field), value });
            }
            QueryToken::Open => {
                let close = self.matching_close(self.pos)?;
                let nested_field = self.tokens[self.pos..close]
                    .iter()
                    .any(|t| matches!(t.kind, QueryToken::Field | QueryToken::Parent));

                match field {
                    FieldRef::Local(name) if !nested_field => {
                        self.push(Symbol::Open);
                        self.sequence(Some(&name), true)?;
                        self.push(Symbol::Close);
                    }
                    field => {
                        let text = &self.input[token.span.end..self.tokens[close].span.start];
                        self.pos = close + 1;
                        self.push_term(Term {
                            field: Some(field),
                            value: TermValue::Subquery(text.trim().to_string()),
                        });
                    }
                }
            }
            _ => return Err(dangling()),
        }
        Ok(())
    }

    /// Position of the `)` closing the group whose content starts at `from`.
    fn matching_close(&self, from: usize) -> Result<usize> {
        let mut depth = 0usize;
        for (offset, token) in self.tokens[from..].iter().enumerate() {
            match token.kind {
                QueryToken::Open => depth += 1,
                QueryToken::Close if depth == 0 => return Ok(from + offset),
                QueryToken::Close => depth -= 1,
                _ => {}
            }
        }
        Err(Error::query("unbalanced '('"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn local(name: &str) -> Option<FieldRef> {
        Some(FieldRef::Local(name.to_string()))
    }

    #[test]
    fn single_term() {
        let query = parse("@f1:bar").unwrap();
        assert_eq!(query.terms, vec![Term::text(local("f1"), "bar")]);
        assert_eq!(query.infix_string(), "0");
    }

    #[test]
    fn implicit_and_between_operands() {
        let query = parse("@a:x @b:y -@c:z").unwrap();
        assert_eq!(query.infix_string(), "0&1&-2");

        let query = parse("(@a:x | @b:y) *").unwrap();
        assert_eq!(query.infix_string(), "(0|1)&*");
    }

    #[test]
    fn field_distributes_over_group() {
        let query = parse("@tag:(red | blue green)").unwrap();
        assert_eq!(query.infix_string(), "(0|1&2)");
        assert!(query.terms.iter().all(|t| t.field == local("tag")));
        assert_eq!(query.terms[2].value, TermValue::Text("green".to_string()));
    }

    #[test]
    fn unqualified_values_are_fulltext_terms() {
        let query = parse("quick fox | @n:[1,2]").unwrap();
        assert_eq!(query.terms[0].field, None);
        assert_eq!(query.terms[2].value, TermValue::Text("[1,2]".to_string()));
        assert_eq!(query.infix_string(), "0&1|2");
    }

    #[test]
    fn groups_naming_fields_become_subqueries() {
        let query = parse("@@child:(@parent:2)").unwrap();
        assert_eq!(
            query.terms,
            vec![Term {
                field: Some(FieldRef::Parent("child".to_string())),
                value: TermValue::Subquery("@parent:2".to_string()),
            }]
        );

        let query = parse("@owner:( @name:bob | @name:(ann) ) & @x:1").unwrap();
        assert_eq!(
            query.terms[0].value,
            TermValue::Subquery("@name:bob | @name:(ann)".to_string())
        );
        assert_eq!(query.infix_string(), "0&1");
    }

    #[test]
    fn malformed_queries() {
        let kind = |q: &str| parse(q).unwrap_err().kind;
        assert_eq!(kind("@f"), ErrorKind::QueryParse);
        assert_eq!(kind("@f bar"), ErrorKind::QueryParse);
        assert_eq!(kind("@f:"), ErrorKind::QueryParse);
        assert_eq!(kind(":bar"), ErrorKind::QueryParse);
        assert_eq!(kind("(a"), ErrorKind::QueryParse);
        assert_eq!(kind("a)"), ErrorKind::QueryParse);
        assert_eq!(kind(""), ErrorKind::QueryParse);
        assert_eq!(kind("@f:(a"), ErrorKind::QueryParse);
        assert_eq!(kind("a ]"), ErrorKind::Tokenize);
    }
}
