use std::collections::HashSet;
use std::str::FromStr;
use crate::command::ast::{Command, CursorSpec, FieldSpec, SearchSpec, SortSpec, TypeSpec};
use crate::command::lexer::{self, CommandToken};
use crate::core::cast;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{FieldType, RESERVED_ID_FIELD};
use crate::lexer::Token;

/// Words with a grammatical meaning somewhere in the command language.
/// Identifiers spelled like one must be quoted to be read as names.
const KEYWORDS: &[&str] = &[
    "fields", "alias", "min", "max", "precision", "separator", "nostopwords", "prefixsearch",
    "references", "values", "sync", "limit", "sortby", "asc", "desc", "withcursor", "timeout",
    "withforeignkeys", "clear",
];

const DEFAULT_INTEGER_MAX: i64 = u32::MAX as i64;
const DEFAULT_DECIMAL_MAX: i64 = 1_000_000;
const DEFAULT_DATE_MIN: &str = "1970-01-01";
const DEFAULT_DATE_MAX: &str = "2100-12-31";
const DEFAULT_DATETIME_MIN: &str = "1970-01-01 00:00:00";
const DEFAULT_DATETIME_MAX: &str = "2100-12-31 23:59:59";

/// Parse one command line.
pub fn parse(input: &str) -> Result<Command> {
    let tokens = lexer::tokenize(input)?;
    let mut parser = Parser::new(&tokens);

    let verb = match parser.next() {
        Some(token) if token.kind == CommandToken::Word => token.text.to_ascii_uppercase(),
        Some(token) => {
            return Err(Error::new(
                ErrorKind::UnknownCommand,
                format!("unknown command '{}'", token.text),
            ));
        }
        None => return Err(Error::command("empty command")),
    };

    let command = match verb.as_str() {
        "PING" => Command::Ping,
        "LIST" => Command::List,
        "STAT" => parser.stat()?,
        "CREATE" => parser.create()?,
        "DROP" => Command::Drop {
            index: parser.identifier("index name")?,
        },
        "TRUNCATE" => Command::Truncate {
            index: parser.identifier("index name")?,
        },
        "RENAME" => {
            let index = parser.identifier("index name")?;
            let new_name = parser.identifier("new index name")?;
            if index == new_name {
                return Err(Error::command(format!("cannot rename '{}' to itself", index)));
            }
            Command::Rename { index, new_name }
        }
        "INSERT" | "ADD" => parser.insert()?,
        "DELETE" => Command::Delete {
            index: parser.identifier("index name")?,
            id: parser.number("record id")?,
            sync: parser.keyword("SYNC"),
        },
        "DELETEALL" => Command::DeleteAll {
            index: parser.identifier("index name")?,
            query: parser.value("query")?,
            sync: parser.keyword("SYNC"),
        },
        "REID" => Command::Reid {
            index: parser.identifier("index name")?,
            from: parser.number("record id")?,
            to: parser.number("new record id")?,
            sync: parser.keyword("SYNC"),
        },
        "SEARCH" => parser.search()?,
        "CURSOR" => Command::Cursor {
            id: parser.value("cursor id")?,
        },
        "SHOWCREATE" => Command::ShowCreate {
            index: parser.identifier("index name")?,
        },
        "SLOWQUERYLOG" => {
            let index = if parser.at_keyword("CLEAR") || parser.at_end() {
                None
            } else {
                Some(parser.identifier("index name")?)
            };
            Command::SlowQueryLog {
                index,
                clear: parser.keyword("CLEAR"),
            }
        }
        _ => {
            return Err(Error::new(
                ErrorKind::UnknownCommand,
                format!("unknown command '{}'", verb),
            ));
        }
    };

    parser.finish()?;
    Ok(command)
}

struct Parser<'t> {
    tokens: &'t [Token<CommandToken>],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token<CommandToken>]) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'t Token<CommandToken>> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'t Token<CommandToken>> {
        let token = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(token)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|token| {
            token.kind == CommandToken::Word && token.text.eq_ignore_ascii_case(keyword)
        })
    }

    /// Consume `keyword` if it is next.
    fn keyword(&mut self, keyword: &str) -> bool {
        let found = self.at_keyword(keyword);
        if found {
            self.pos += 1;
        }
        found
    }

    /// Whether the next token is an unquoted keyword.
    fn at_any_keyword(&self) -> bool {
        self.peek().is_some_and(|token| {
            token.kind == CommandToken::Word
                && KEYWORDS.iter().any(|k| token.text.eq_ignore_ascii_case(k))
        })
    }

    /// Raw value, case preserved.
    fn value(&mut self, what: &str) -> Result<String> {
        match self.next() {
            Some(token) => Ok(token.text.clone()),
            None => Err(Error::command(format!("expected {}, found end of input", what))),
        }
    }

    /// Index or field name, lowercased.
    fn identifier(&mut self, what: &str) -> Result<String> {
        if self.at_any_keyword() {
            return Err(self.unexpected(what));
        }
        Ok(self.value(what)?.to_lowercase())
    }

    fn number<T: FromStr>(&mut self, what: &str) -> Result<T> {
        let raw = self.value(what)?;
        raw.parse::<T>()
            .map_err(|_| Error::command(format!("expected {}, found '{}'", what, raw)))
    }

    fn unexpected(&self, expected: &str) -> Error {
        match self.peek() {
            Some(token) => Error::command(format!("expected {}, found '{}'", expected, token.text)),
            None => Error::command(format!("expected {}, found end of input", expected)),
        }
    }

    fn finish(&self) -> Result<()> {
        match self.peek() {
            Some(token) => Err(Error::command(format!("unexpected trailing '{}'", token.text))),
            None => Ok(()),
        }
    }

    fn stat(&mut self) -> Result<Command> {
        let mut index = None;
        let mut field = None;
        let mut limit = None;
        if !self.at_end() {
            index = Some(self.identifier("index name")?);
            if !self.at_end() {
                field = Some(self.identifier("field name")?);
                if !self.at_end() {
                    limit = Some(self.number("limit")?);
                }
            }
        }
        Ok(Command::Stat { index, field, limit })
    }

    fn create(&mut self) -> Result<Command> {
        let index = self.identifier("index name")?;
        let mut fields: Vec<FieldSpec> = Vec::new();

        if self.keyword("FIELDS") {
            let mut names = HashSet::new();
            while !self.at_end() {
                let field = self.field_spec()?;
                for name in std::iter::once(&field.name).chain(&field.aliases) {
                    if name == RESERVED_ID_FIELD {
                        return Err(Error::command(format!(
                            "'{}' is reserved for the record id",
                            RESERVED_ID_FIELD
                        )));
                    }
                    if !names.insert(name.clone()) {
                        return Err(Error::command(format!("duplicate field name '{}'", name)));
                    }
                }
                fields.push(field);
            }
        }

        Ok(Command::Create { index, fields })
    }

    fn field_spec(&mut self) -> Result<FieldSpec> {
        let name = self.identifier("field name")?;
        let keyword = self.value("field type")?;
        let ty = FieldType::from_keyword(&keyword)
            .ok_or_else(|| Error::command(format!("unknown field type '{}'", keyword)))?;

        let mut options = TypeOptions::default();
        let mut aliases = Vec::new();
        loop {
            if self.keyword("ALIAS") {
                aliases.push(self.identifier("alias")?);
            } else if !options.accept(self, ty)? {
                break;
            }
        }

        Ok(FieldSpec {
            name,
            ty: options.into_type(ty)?,
            aliases,
        })
    }

    fn insert(&mut self) -> Result<Command> {
        let index = self.identifier("index name")?;
        let id = self.number("record id")?;
        let mut values = Vec::new();
        if self.keyword("VALUES") {
            while !self.at_end() {
                let field = self.identifier("field name")?;
                let value = self.value("field value")?;
                values.push((field, value));
            }
        }
        Ok(Command::Insert { index, id, values })
    }

    fn search(&mut self) -> Result<Command> {
        let index = self.identifier("index name")?;
        let query = self.value("query")?;
        let mut spec = SearchSpec::new(&index, &query);

        while !self.at_end() {
            if self.keyword("LIMIT") {
                let limit: usize = self.number("limit")?;
                if limit == 0 {
                    return Err(Error::command("LIMIT must be at least 1"));
                }
                spec.limit = Some(limit);
            } else if self.keyword("SORTBY") {
                let field = self.identifier("sort field")?;
                let descending = if self.keyword("DESC") {
                    true
                } else {
                    self.keyword("ASC");
                    false
                };
                spec.sort = Some(SortSpec { field, descending });
            } else if self.keyword("WITHCURSOR") {
                let timeout = if self.keyword("TIMEOUT") {
                    Some(self.number("cursor timeout")?)
                } else {
                    None
                };
                spec.cursor = Some(CursorSpec { timeout });
            } else if self.keyword("WITHFOREIGNKEYS") {
                spec.foreign_keys.push(self.identifier("foreign key field")?);
                while !self.at_end() && !self.at_any_keyword() {
                    spec.foreign_keys.push(self.identifier("foreign key field")?);
                }
            } else {
                return Err(self.unexpected("search option"));
            }
        }

        Ok(Command::Search(spec))
    }
}

/// Options collected after a type keyword, validated once complete.
#[derive(Default)]
struct TypeOptions {
    min: Option<String>,
    max: Option<String>,
    precision: Option<u32>,
    separator: Option<String>,
    no_stop_words: bool,
    prefix_search: bool,
    references: Option<String>,
}

impl TypeOptions {
    /// Consume one option valid for `ty`, false when none is next.
    fn accept(&mut self, parser: &mut Parser<'_>, ty: FieldType) -> Result<bool> {
        if ty.is_numeric() {
            if parser.keyword("MIN") {
                self.min = Some(parser.value("MIN value")?);
                return Ok(true);
            }
            if parser.keyword("MAX") {
                self.max = Some(parser.value("MAX value")?);
                return Ok(true);
            }
        }

        match ty {
            FieldType::Decimal if parser.keyword("PRECISION") => {
                self.precision = Some(parser.number("precision")?);
            }
            FieldType::Array if parser.keyword("SEPARATOR") => {
                self.separator = Some(parser.value("separator")?);
            }
            FieldType::FullText if parser.keyword("NOSTOPWORDS") => {
                self.no_stop_words = true;
            }
            FieldType::FullText if parser.keyword("PREFIXSEARCH") => {
                self.prefix_search = true;
            }
            FieldType::ForeignKey if parser.keyword("REFERENCES") => {
                self.references = Some(parser.identifier("referenced index")?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn into_type(self, ty: FieldType) -> Result<TypeSpec> {
        let spec = match ty {
            FieldType::Integer => {
                let (min, max) = self.bounds(cast::parse_integer, 0, DEFAULT_INTEGER_MAX)?;
                TypeSpec::Integer { min, max }
            }
            FieldType::Decimal => {
                let precision = self
                    .precision
                    .unwrap_or(cast::DEFAULT_DECIMAL_PRECISION)
                    .min(cast::MAX_DECIMAL_PRECISION);
                let scale = 10i64.pow(precision);
                let (min, max) = self.bounds(
                    |raw| cast::parse_decimal(raw, precision),
                    0,
                    DEFAULT_DECIMAL_MAX * scale,
                )?;
                TypeSpec::Decimal { min, max, precision }
            }
            FieldType::Date => {
                let (min, max) = self.bounds(
                    cast::parse_date,
                    cast::parse_date(DEFAULT_DATE_MIN).unwrap_or(0),
                    cast::parse_date(DEFAULT_DATE_MAX).unwrap_or(0),
                )?;
                TypeSpec::Date { min, max }
            }
            FieldType::DateTime => {
                let (min, max) = self.bounds(
                    cast::parse_datetime,
                    cast::parse_datetime(DEFAULT_DATETIME_MIN).unwrap_or(0),
                    cast::parse_datetime(DEFAULT_DATETIME_MAX).unwrap_or(0),
                )?;
                TypeSpec::DateTime { min, max }
            }
            FieldType::String => TypeSpec::String,
            FieldType::Boolean => TypeSpec::Boolean,
            FieldType::Array => {
                let separator = match self.separator.as_deref() {
                    None => ',',
                    Some(raw) => {
                        let mut chars = raw.chars();
                        match (chars.next(), chars.next()) {
                            (Some(c), None) => c,
                            _ => {
                                return Err(Error::command(format!(
                                    "separator must be a single character, found '{}'",
                                    raw
                                )));
                            }
                        }
                    }
                };
                TypeSpec::Array { separator }
            }
            FieldType::FullText => TypeSpec::FullText {
                stop_words: !self.no_stop_words,
                prefix_search: self.prefix_search,
            },
            FieldType::ForeignKey => {
                let references = self
                    .references
                    .ok_or_else(|| Error::command("FOREIGNKEY requires REFERENCES"))?;
                TypeSpec::ForeignKey { references }
            }
        };
        Ok(spec)
    }

    fn bounds<F>(&self, parse: F, default_min: i64, default_max: i64) -> Result<(i64, i64)>
    where
        F: Fn(&str) -> Option<i64>,
    {
        let bound = |raw: &Option<String>, default: i64| match raw {
            Some(raw) => parse(raw).ok_or_else(|| Error::command(format!("invalid bound '{}'", raw))),
            None => Ok(default),
        };
        let min = bound(&self.min, default_min)?;
        let max = bound(&self.max, default_max)?;
        if min > max {
            return Err(Error::command(format!("MIN {} is greater than MAX {}", min, max)));
        }
        Ok((min, max))
    }
}

fn quote_identifier(name: &str) -> String {
    if KEYWORDS.iter().any(|k| name.eq_ignore_ascii_case(k)) {
        format!("'{}'", name)
    } else {
        lexer::quote(name)
    }
}

/// Render the CREATE command that rebuilds an index with this schema.
pub fn show_create(index: &str, fields: &[FieldSpec]) -> String {
    let mut out = format!("CREATE {}", quote_identifier(index));
    if fields.is_empty() {
        return out;
    }

    out.push_str(" FIELDS");
    for field in fields {
        out.push(' ');
        out.push_str(&quote_identifier(&field.name));
        out.push(' ');
        out.push_str(field.ty.field_type().keyword());

        match &field.ty {
            TypeSpec::Integer { min, max } => {
                out.push_str(&format!(" MIN {} MAX {}", min, max));
            }
            TypeSpec::Decimal { min, max, precision } => {
                out.push_str(&format!(
                    " PRECISION {} MIN {} MAX {}",
                    precision,
                    cast::format_decimal(*min, *precision),
                    cast::format_decimal(*max, *precision)
                ));
            }
            TypeSpec::Date { min, max } => {
                out.push_str(&format!(
                    " MIN {} MAX {}",
                    cast::format_date(*min),
                    cast::format_date(*max)
                ));
            }
            TypeSpec::DateTime { min, max } => {
                out.push_str(&format!(
                    " MIN {} MAX {}",
                    lexer::quote(&cast::format_datetime(*min)),
                    lexer::quote(&cast::format_datetime(*max))
                ));
            }
            TypeSpec::Array { separator } => {
                out.push_str(&format!(" SEPARATOR {}", lexer::quote(&separator.to_string())));
            }
            TypeSpec::FullText { stop_words, prefix_search } => {
                if !stop_words {
                    out.push_str(" NOSTOPWORDS");
                }
                if *prefix_search {
                    out.push_str(" PREFIXSEARCH");
                }
            }
            TypeSpec::ForeignKey { references } => {
                out.push_str(&format!(" REFERENCES {}", quote_identifier(references)));
            }
            TypeSpec::String | TypeSpec::Boolean => {}
        }

        for alias in &field.aliases {
            out.push_str(" ALIAS ");
            out.push_str(&quote_identifier(alias));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(command: Command) -> Vec<FieldSpec> {
        match command {
            Command::Create { fields, .. } => fields,
            other => panic!("expected CREATE, got {:?}", other),
        }
    }

    #[test]
    fn simple_commands() {
        assert_eq!(parse("ping").unwrap(), Command::Ping);
        assert_eq!(parse("LIST").unwrap(), Command::List);
        assert_eq!(
            parse("DELETE Items 4 sync").unwrap(),
            Command::Delete { index: "items".to_string(), id: 4, sync: true }
        );
        assert_eq!(
            parse("REID items 1 2").unwrap(),
            Command::Reid { index: "items".to_string(), from: 1, to: 2, sync: false }
        );
        assert_eq!(
            parse("STAT items title 5").unwrap(),
            Command::Stat {
                index: Some("items".to_string()),
                field: Some("title".to_string()),
                limit: Some(5),
            }
        );
        assert_eq!(
            parse("SLOWQUERYLOG clear").unwrap(),
            Command::SlowQueryLog { index: None, clear: true }
        );
    }

    #[test]
    fn unknown_and_malformed_commands() {
        assert_eq!(parse("FROB x").unwrap_err().kind, ErrorKind::UnknownCommand);
        assert_eq!(parse("").unwrap_err().kind, ErrorKind::CommandParse);
        assert_eq!(parse("DELETE items x").unwrap_err().kind, ErrorKind::CommandParse);
        assert_eq!(parse("DROP items extra").unwrap_err().kind, ErrorKind::CommandParse);
        assert_eq!(parse("RENAME a A").unwrap_err().kind, ErrorKind::CommandParse);
        assert_eq!(parse("DROP 'unterminated").unwrap_err().kind, ErrorKind::Tokenize);
    }

    #[test]
    fn create_with_options_and_defaults() {
        let specs = fields(
            parse(
                "CREATE items FIELDS title FULLTEXT PREFIXSEARCH NOSTOPWORDS ALIAS t \
                 price DECIMAL PRECISION 1 MAX 10 \
                 qty INTEGER \
                 tags ARRAY SEPARATOR '|' \
                 seen DATETIME MIN '2000-01-01 00:00:00' \
                 owner FOREIGNKEY REFERENCES Users",
            )
            .unwrap(),
        );

        assert_eq!(specs.len(), 6);
        assert_eq!(specs[0].aliases, vec!["t"]);
        assert_eq!(specs[0].ty, TypeSpec::FullText { stop_words: false, prefix_search: true });
        assert_eq!(specs[1].ty, TypeSpec::Decimal { min: 0, max: 100, precision: 1 });
        assert_eq!(specs[2].ty, TypeSpec::Integer { min: 0, max: 4_294_967_295 });
        assert_eq!(specs[3].ty, TypeSpec::Array { separator: '|' });
        assert_eq!(specs[4].ty.bounds().unwrap().0, 946_684_800);
        assert_eq!(specs[5].ty, TypeSpec::ForeignKey { references: "users".to_string() });
    }

    #[test]
    fn decimal_precision_is_clamped() {
        let specs = fields(parse("CREATE a FIELDS p DECIMAL PRECISION 9 MAX 1").unwrap());
        assert_eq!(specs[0].ty, TypeSpec::Decimal { min: 0, max: 100_000, precision: 5 });
    }

    #[test]
    fn schema_validation() {
        let kind = |cmd: &str| parse(cmd).unwrap_err().kind;
        assert_eq!(kind("CREATE a FIELDS x STRING x INTEGER"), ErrorKind::CommandParse);
        assert_eq!(kind("CREATE a FIELDS x STRING y STRING ALIAS x"), ErrorKind::CommandParse);
        assert_eq!(kind("CREATE a FIELDS id INTEGER"), ErrorKind::CommandParse);
        assert_eq!(kind("CREATE a FIELDS x STRING ALIAS ID"), ErrorKind::CommandParse);
        assert_eq!(kind("CREATE a FIELDS x INTEGER MIN 5 MAX 1"), ErrorKind::CommandParse);
        assert_eq!(kind("CREATE a FIELDS x FLOAT"), ErrorKind::CommandParse);
        assert_eq!(kind("CREATE a FIELDS x FOREIGNKEY"), ErrorKind::CommandParse);
        assert_eq!(kind("CREATE a FIELDS x ARRAY SEPARATOR ab"), ErrorKind::CommandParse);
    }

    #[test]
    fn insert_values_keep_case() {
        let command = parse("ADD items 3 VALUES Title 'Hello World' qty 4").unwrap();
        assert_eq!(
            command,
            Command::Insert {
                index: "items".to_string(),
                id: 3,
                values: vec![
                    ("title".to_string(), "Hello World".to_string()),
                    ("qty".to_string(), "4".to_string()),
                ],
            }
        );
    }

    #[test]
    fn search_options_in_any_order() {
        let command = parse(
            "SEARCH items '@qty:[1,5]' WITHFOREIGNKEYS owner maker SORTBY qty DESC LIMIT 2 WITHCURSOR TIMEOUT 30",
        )
        .unwrap();
        let Command::Search(spec) = command else {
            panic!("expected SEARCH");
        };
        assert_eq!(spec.query, "@qty:[1,5]");
        assert_eq!(spec.limit, Some(2));
        assert_eq!(spec.sort, Some(SortSpec { field: "qty".to_string(), descending: true }));
        assert_eq!(spec.cursor, Some(CursorSpec { timeout: Some(30) }));
        assert_eq!(spec.foreign_keys, vec!["owner", "maker"]);

        assert!(parse("SEARCH items * BOGUS").is_err());
        assert_eq!(
            parse("SEARCH items * LIMIT 0 WITHCURSOR").unwrap_err().kind,
            ErrorKind::CommandParse
        );
    }

    #[test]
    fn show_create_round_trips() {
        let source = "CREATE 'limit' FIELDS 'min' INTEGER MIN -5 MAX 5 ALIAS 'max' \
                      d DATE price DECIMAL PRECISION 2 MAX 12.5 \
                      at DATETIME body FULLTEXT NOSTOPWORDS tags ARRAY SEPARATOR ';' \
                      flag BOOLEAN ref FOREIGNKEY REFERENCES other";
        let Command::Create { index, fields } = parse(source).unwrap() else {
            panic!("expected CREATE");
        };
        assert_eq!(index, "limit");

        let rendered = show_create(&index, &fields);
        assert_eq!(
            parse(&rendered).unwrap(),
            Command::Create { index, fields }
        );
    }
}
