use crate::ast::*;
use crate::error::{DbError, DbResult};
use crate::tokenizer::{
    closing_paren, find_keyword, find_top_level, is_ident_char, is_identifier, split_keyword,
    split_top_level,
};
use crate::value::parse_literal;

/// Parses one statement into a [Command].
///
/// # Example
/// ```
/// # use minidb::parser::parse;
/// # use minidb::ast::Command;
/// let command = parse("SHOW TABLES;").unwrap();
/// assert_eq!(command, Command::ShowTables);
/// ```
pub fn parse(text: &str) -> DbResult<Command> {
    Parser::new(text).parse()
}

pub struct Parser<'a> {
    sql: &'a str,
}

impl<'a> Parser<'a> {
    /// Trims the statement and drops one trailing `;`.
    pub fn new(text: &'a str) -> Self {
        let sql = text.trim();
        let sql = sql.strip_suffix(';').unwrap_or(sql).trim();
        Self { sql }
    }

    pub fn parse(&self) -> DbResult<Command> {
        let sql = self.sql;

        // First match wins, so the order here is the dispatch priority.
        if let Some(rest) = strip_keywords(sql, &["SHOW", "TABLES"]) {
            expect_end(rest)?;
            return Ok(Command::ShowTables);
        }
        if let Some(rest) = strip_keywords(sql, &["DESCRIBE"]) {
            let (name, rest) = split_name(rest)?;
            expect_end(rest)?;
            return Ok(Command::Describe { name });
        }
        if let Some(rest) = strip_keywords(sql, &["DROP", "TABLE"]) {
            return self.parse_drop_table(rest);
        }
        if let Some(rest) = strip_keywords(sql, &["CREATE", "TABLE"]) {
            return self.parse_create_table(rest);
        }
        if let Some(rest) = strip_keywords(sql, &["INSERT", "INTO"]) {
            return self.parse_insert(rest);
        }
        if let Some(rest) = strip_keywords(sql, &["SELECT"]) {
            return self.parse_select(rest);
        }
        if let Some(rest) = strip_keywords(sql, &["UPDATE"]) {
            return self.parse_update(rest);
        }
        if let Some(rest) = strip_keywords(sql, &["DELETE", "FROM"]) {
            return self.parse_delete(rest);
        }

        Err(DbError::parse("unsupported statement"))
    }

    fn parse_create_table(&self, rest: &str) -> DbResult<Command> {
        let (name, rest) = split_name(rest)?;
        let (body, rest) = parenthesized(rest, "column list")?;
        expect_end(rest)?;

        let parts = split_top_level(body, ',');
        if parts.is_empty() {
            return Err(DbError::parse("CREATE TABLE requires at least one column"));
        }

        let mut columns = Vec::with_capacity(parts.len());
        let mut primary_key = None;

        for part in parts {
            // table-level constraint: PRIMARY KEY (col)
            if let Some(key) = strip_keywords(part, &["PRIMARY", "KEY"]) {
                let key = key.trim();
                let key = key
                    .strip_prefix('(')
                    .and_then(|k| k.strip_suffix(')'))
                    .unwrap_or(key)
                    .trim();
                set_primary_key(&mut primary_key, identifier(key)?)?;
                continue;
            }

            let words: Vec<&str> = part.split_whitespace().collect();
            let is_key = match words.as_slice() {
                [_, _] => false,
                [_, _, primary, key]
                    if primary.eq_ignore_ascii_case("PRIMARY")
                        && key.eq_ignore_ascii_case("KEY") =>
                {
                    true
                }
                _ => {
                    return Err(DbError::parse(format!(
                        "invalid column definition {part:?}, expected '<name> <type>'"
                    )));
                }
            };

            let column = ColumnSpec {
                name: identifier(words[0])?,
                type_name: words[1].to_string(),
            };
            if is_key {
                set_primary_key(&mut primary_key, column.name.clone())?;
            }
            columns.push(column);
        }

        Ok(Command::CreateTable {
            name,
            columns,
            primary_key,
        })
    }

    fn parse_drop_table(&self, rest: &str) -> DbResult<Command> {
        let (if_exists, rest) = match strip_keywords(rest, &["IF", "EXISTS"]) {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        let (name, rest) = split_name(rest)?;
        expect_end(rest)?;
        Ok(Command::DropTable { name, if_exists })
    }

    fn parse_insert(&self, rest: &str) -> DbResult<Command> {
        let (name, rest) = split_name(rest)?;
        let (column_list, rest) = parenthesized(rest, "column list")?;
        let rest = strip_keywords(rest, &["VALUES"])
            .ok_or_else(|| DbError::parse("expected VALUES after the column list"))?;
        let (value_list, rest) = parenthesized(rest, "value list")?;
        expect_end(rest)?;

        let columns = split_top_level(column_list, ',');
        let values = split_top_level(value_list, ',');
        if columns.len() != values.len() {
            return Err(DbError::parse("column/value count mismatch"));
        }

        let mut pairs: Vec<(String, _)> = Vec::with_capacity(columns.len());
        for (column, token) in columns.into_iter().zip(values) {
            let column = identifier(column)?;
            if pairs.iter().any(|(existing, _)| *existing == column) {
                return Err(DbError::parse(format!("column {column:?} listed twice")));
            }
            if token.is_empty() {
                return Err(DbError::parse(format!("missing value for column {column:?}")));
            }
            pairs.push((column, parse_literal(token)));
        }

        if pairs.is_empty() {
            return Err(DbError::parse("INSERT requires at least one column"));
        }

        Ok(Command::Insert {
            name,
            values: pairs,
        })
    }

    fn parse_select(&self, rest: &str) -> DbResult<Command> {
        let from = find_keyword(rest, "FROM").ok_or_else(|| DbError::parse("expected FROM"))?;

        let projection = rest[..from.start].trim();
        let columns = if projection == "*" {
            Vec::new()
        } else {
            let names = split_top_level(projection, ',');
            if names.is_empty() {
                return Err(DbError::parse("SELECT requires a column list or '*'"));
            }
            names
                .into_iter()
                .map(identifier)
                .collect::<DbResult<Vec<_>>>()?
        };

        let (name, tail) = split_name(&rest[from.end..])?;
        let (tail, limit) = extract_limit(tail)?;
        let predicates = parse_where_tail(&tail)?;

        Ok(Command::Select {
            name,
            columns,
            predicates,
            limit,
        })
    }

    fn parse_update(&self, rest: &str) -> DbResult<Command> {
        let (name, rest) = split_name(rest)?;
        let rest = strip_keywords(rest, &["SET"]).ok_or_else(|| DbError::parse("expected SET"))?;

        let (assignments, predicates) = match find_keyword(rest, "WHERE") {
            Some(range) => (&rest[..range.start], parse_conditions(&rest[range.end..])?),
            None => (rest, Vec::new()),
        };

        let parts = split_top_level(assignments, ',');
        if parts.is_empty() {
            return Err(DbError::parse("SET requires at least one assignment"));
        }

        let mut set = Vec::with_capacity(parts.len());
        for part in parts {
            let eq = find_top_level(part, |c| c == '=')
                .ok_or_else(|| DbError::parse(format!("invalid assignment {part:?}")))?;
            let column = identifier(part[..eq].trim())?;
            let token = part[eq + 1..].trim();
            if token.is_empty() {
                return Err(DbError::parse(format!("invalid assignment {part:?}")));
            }
            set.push((column, parse_literal(token)));
        }

        Ok(Command::Update {
            name,
            set,
            predicates,
        })
    }

    fn parse_delete(&self, rest: &str) -> DbResult<Command> {
        let (name, tail) = split_name(rest)?;
        let predicates = parse_where_tail(tail)?;
        Ok(Command::Delete { name, predicates })
    }
}

// helpers

/// Consumes a sequence of whole-word keywords, case-insensitively, and
/// returns what follows them.
fn strip_keywords<'s>(text: &'s str, keywords: &[&str]) -> Option<&'s str> {
    let mut rest = text;
    for keyword in keywords {
        rest = rest.trim_start();
        let candidate = rest.get(..keyword.len())?;
        if !candidate.eq_ignore_ascii_case(keyword) {
            return None;
        }
        let after = &rest[keyword.len()..];
        if after.chars().next().is_some_and(is_ident_char) {
            return None;
        }
        rest = after;
    }
    Some(rest)
}

/// Splits a leading identifier off `text`.
fn split_name(text: &str) -> DbResult<(String, &str)> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let name = identifier(&text[..end])?;
    Ok((name, &text[end..]))
}

fn identifier(name: &str) -> DbResult<String> {
    if is_identifier(name) {
        Ok(name.to_string())
    } else if name.is_empty() {
        Err(DbError::parse("expected a name"))
    } else {
        Err(DbError::parse(format!("invalid name {name:?}")))
    }
}

/// Returns the content of a leading `( ... )` group and the text after it.
fn parenthesized<'s>(text: &'s str, what: &str) -> DbResult<(&'s str, &'s str)> {
    let text = text.trim_start();
    let close = closing_paren(text, 0)
        .ok_or_else(|| DbError::parse(format!("expected a parenthesized {what}")))?;
    Ok((&text[1..close], &text[close + 1..]))
}

fn expect_end(rest: &str) -> DbResult<()> {
    let rest = rest.trim();
    if rest.is_empty() {
        Ok(())
    } else {
        Err(DbError::parse(format!("unexpected {rest:?} at end of statement")))
    }
}

fn set_primary_key(slot: &mut Option<String>, column: String) -> DbResult<()> {
    if let Some(existing) = slot {
        return Err(DbError::parse(format!(
            "multiple primary keys: {existing:?} and {column:?}"
        )));
    }
    *slot = Some(column);
    Ok(())
}

/// Pulls `LIMIT n` out of anywhere in a SELECT tail.
fn extract_limit(tail: &str) -> DbResult<(String, Option<usize>)> {
    let Some(range) = find_keyword(tail, "LIMIT") else {
        return Ok((tail.to_string(), None));
    };

    let after = tail[range.end..].trim_start();
    let end = after.find(char::is_whitespace).unwrap_or(after.len());
    let limit = after[..end]
        .parse::<usize>()
        .map_err(|_| DbError::parse("LIMIT expects a non-negative integer"))?;

    let remaining = format!("{} {}", &tail[..range.start], &after[end..]);
    Ok((remaining, Some(limit)))
}

/// Parses an optional `WHERE ...` clause that must make up the whole tail.
fn parse_where_tail(tail: &str) -> DbResult<Vec<Predicate>> {
    if tail.trim().is_empty() {
        return Ok(Vec::new());
    }
    match strip_keywords(tail, &["WHERE"]) {
        Some(conditions) => parse_conditions(conditions),
        None => Err(DbError::parse(format!("unexpected {:?}", tail.trim()))),
    }
}

fn parse_conditions(text: &str) -> DbResult<Vec<Predicate>> {
    if text.trim().is_empty() {
        return Err(DbError::parse("WHERE requires a condition"));
    }
    split_keyword(text, "AND")
        .into_iter()
        .map(parse_condition)
        .collect()
}

/// Parses `<column> <op> <value>`.
fn parse_condition(text: &str) -> DbResult<Predicate> {
    let malformed = || DbError::parse(format!("malformed WHERE condition {text:?}"));

    let pos = find_top_level(text, |c| matches!(c, '=' | '!' | '<' | '>')).ok_or_else(malformed)?;
    let op = ComparisonOp::ALL
        .into_iter()
        .find(|op| text[pos..].starts_with(op.symbol()))
        .ok_or_else(malformed)?;

    let column = text[..pos].trim();
    let token = text[pos + op.symbol().len()..].trim();
    if column.is_empty() || token.is_empty() {
        return Err(malformed());
    }

    Ok(Predicate::new(identifier(column)?, op, parse_literal(token)))
}
