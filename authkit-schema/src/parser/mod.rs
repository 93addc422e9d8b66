//! Extraction of table definitions from rendered schema output.
//!
//! Schema templates render to plain DDL. This module recovers every
//! `CREATE TABLE` statement from that output, together with a best-effort
//! column listing, so that tables with no requirement accessor can still be
//! discovered and re-created. Other statements (indexes, inserts, comments)
//! are ignored.

mod grammar;

use pest::Parser;

use crate::error::{SchemaError, SchemaResult};

pub use grammar::{DdlParser, Rule};

/// A column recovered from a `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Column name (unquoted).
    pub name: String,
    /// Declared type as written, e.g. `VARCHAR(255)`. May be empty.
    pub declared_type: String,
    /// Whether the column accepts NULL.
    pub nullable: bool,
    /// Default value expression.
    pub default: Option<String>,
    /// Table referenced by an inline foreign key.
    pub references: Option<String>,
    /// Whether the column is (part of) the primary key.
    pub primary_key: bool,
    /// Everything after the column name, whitespace-normalized.
    pub definition: String,
}

/// A table recovered from a `CREATE TABLE` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    /// Table name (unquoted, schema qualifier dropped).
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnSpec>,
    /// Table-level constraints, whitespace-normalized.
    pub constraints: Vec<String>,
}

impl TableDefinition {
    /// Tables this table references, excluding itself, in declaration order.
    pub fn references(&self) -> Vec<String> {
        let from_columns = self.columns.iter().filter_map(|c| c.references.clone());
        let from_constraints = self
            .constraints
            .iter()
            .filter_map(|c| referenced_table(&tokenize(c)));

        let mut refs: Vec<String> = Vec::new();
        for table in from_columns.chain(from_constraints) {
            if table != self.name && !refs.contains(&table) {
                refs.push(table);
            }
        }
        refs
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Parse every `CREATE TABLE` statement in the given input.
pub fn parse_tables(input: &str) -> SchemaResult<Vec<TableDefinition>> {
    let pairs = DdlParser::parse(Rule::script, input)
        .map_err(|e| SchemaError::syntax(e.to_string()))?;

    let script = pairs
        .into_iter()
        .next()
        .ok_or_else(|| SchemaError::syntax("empty parse result"))?;

    let mut tables = Vec::new();
    for pair in script.into_inner() {
        match pair.as_rule() {
            Rule::create_table => tables.push(parse_create_table(pair)?),
            Rule::other_statement => {
                // A CREATE TABLE that fell through to the catch-all is malformed.
                let text = strip_comments(pair.as_str());
                let words: Vec<String> = text
                    .split_whitespace()
                    .take(2)
                    .map(str::to_ascii_uppercase)
                    .collect();
                if words == ["CREATE", "TABLE"] {
                    return Err(SchemaError::syntax(format!(
                        "malformed CREATE TABLE statement: {}",
                        text.trim()
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(tables)
}

/// Parse only the table names created by the given input, in order.
pub fn created_tables(input: &str) -> SchemaResult<Vec<String>> {
    Ok(parse_tables(input)?.into_iter().map(|t| t.name).collect())
}

fn parse_create_table(pair: pest::iterators::Pair<'_, Rule>) -> SchemaResult<TableDefinition> {
    let mut name = None;
    let mut columns = Vec::new();
    let mut constraints = Vec::new();

    for item in pair.into_inner() {
        match item.as_rule() {
            Rule::table_name => {
                // A qualified name yields two parts; the table is the last one.
                name = item.into_inner().last().map(|p| p.as_str().to_string());
            }
            Rule::table_item => {
                let tokens = tokenize(&strip_comments(item.as_str()));
                if tokens.is_empty() {
                    continue;
                }
                if is_table_constraint(&tokens[0]) {
                    constraints.push(tokens.join(" "));
                } else {
                    columns.push(parse_column(&tokens));
                }
            }
            _ => {}
        }
    }

    let name = name.ok_or_else(|| SchemaError::syntax("CREATE TABLE without a table name"))?;

    Ok(TableDefinition {
        name,
        columns,
        constraints,
    })
}

/// Words that end a column's declared type.
const COLUMN_KEYWORDS: &[&str] = &[
    "CONSTRAINT",
    "NOT",
    "NULL",
    "PRIMARY",
    "REFERENCES",
    "DEFAULT",
    "UNIQUE",
    "CHECK",
    "COLLATE",
    "GENERATED",
    "AUTOINCREMENT",
    "AUTO_INCREMENT",
];

fn is_table_constraint(first: &str) -> bool {
    matches!(
        first.to_ascii_uppercase().as_str(),
        "PRIMARY" | "UNIQUE" | "FOREIGN" | "CONSTRAINT" | "CHECK"
    )
}

fn parse_column(tokens: &[String]) -> ColumnSpec {
    let name = unquote(&tokens[0]);
    let rest = &tokens[1..];
    let upper: Vec<String> = rest.iter().map(|t| t.to_ascii_uppercase()).collect();

    let type_len = upper
        .iter()
        .position(|t| COLUMN_KEYWORDS.contains(&t.as_str()))
        .unwrap_or(rest.len());
    let declared_type = rest[..type_len].join(" ");

    let primary_key = upper
        .windows(2)
        .any(|w| w[0] == "PRIMARY" && w[1] == "KEY");
    let not_null = upper.windows(2).any(|w| w[0] == "NOT" && w[1] == "NULL");

    let default = upper
        .iter()
        .position(|t| t == "DEFAULT")
        .and_then(|i| rest.get(i + 1))
        .cloned();

    ColumnSpec {
        name,
        declared_type,
        nullable: !(not_null || primary_key),
        default,
        references: referenced_table(rest),
        primary_key,
        definition: rest.join(" "),
    }
}

/// Table named after a `REFERENCES` keyword, if any.
fn referenced_table(tokens: &[String]) -> Option<String> {
    let idx = tokens
        .iter()
        .position(|t| t.eq_ignore_ascii_case("REFERENCES"))?;
    let target = tokens.get(idx + 1)?;
    let bare = target.split('(').next().unwrap_or(target);
    let bare = bare.rsplit('.').next().unwrap_or(bare);
    let table = unquote(bare);
    if table.is_empty() { None } else { Some(table) }
}

/// Remove `--` line comments that are not inside a string literal.
fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| {
            let mut in_string = false;
            let bytes = line.as_bytes();
            for i in 0..bytes.len() {
                match bytes[i] {
                    b'\'' => in_string = !in_string,
                    b'-' if !in_string && bytes.get(i + 1) == Some(&b'-') => return &line[..i],
                    _ => {}
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split on whitespace outside parentheses and quotes.
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in text.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '(' => {
                    depth += 1;
                    current.push(ch);
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    current.push(ch);
                }
                c if c.is_whitespace() && depth == 0 => {
                    if !current.is_empty() {
                        tokens.push(std::mem::take(&mut current));
                    }
                }
                c if c.is_whitespace() => {
                    if !current.ends_with(' ') {
                        current.push(' ');
                    }
                }
                c => current.push(c),
            },
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn unquote(ident: &str) -> String {
    let trimmed = ident.trim();
    let stripped = match trimmed.chars().next() {
        Some('"') => trimmed.trim_matches('"'),
        Some('`') => trimmed.trim_matches('`'),
        Some('[') => trimmed.trim_start_matches('[').trim_end_matches(']'),
        _ => trimmed,
    };
    stripped.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const OTP_SCHEMA: &str = r#"
        CREATE TABLE IF NOT EXISTS account_otp_keys (
            id INTEGER PRIMARY KEY REFERENCES accounts(id),
            "key" VARCHAR(255) NOT NULL,
            num_failures INTEGER NOT NULL DEFAULT 0,
            last_use TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS account_otp_keys_last_use ON account_otp_keys (last_use);
    "#;

    #[test]
    fn test_parse_single_table() {
        let tables = parse_tables(OTP_SCHEMA).unwrap();
        assert_eq!(tables.len(), 1);

        let table = &tables[0];
        assert_eq!(table.name, "account_otp_keys");
        assert_eq!(
            table.column_names(),
            vec!["id", "key", "num_failures", "last_use"]
        );
        assert_eq!(table.references(), vec!["accounts"]);
    }

    #[test]
    fn test_column_specs() {
        let tables = parse_tables(OTP_SCHEMA).unwrap();
        let table = &tables[0];

        let id = table.column("id").unwrap();
        assert!(id.primary_key);
        assert!(!id.nullable);
        assert_eq!(id.declared_type, "INTEGER");
        assert_eq!(id.references.as_deref(), Some("accounts"));

        let key = table.column("key").unwrap();
        assert_eq!(key.declared_type, "VARCHAR(255)");
        assert!(!key.nullable);
        assert_eq!(key.default, None);

        let failures = table.column("num_failures").unwrap();
        assert_eq!(failures.default.as_deref(), Some("0"));
        assert_eq!(failures.definition, "INTEGER NOT NULL DEFAULT 0");
    }

    #[test]
    fn test_nullable_column() {
        let tables = parse_tables("CREATE TABLE t (id INTEGER PRIMARY KEY, note TEXT);").unwrap();
        assert!(tables[0].column("note").unwrap().nullable);
    }

    #[test]
    fn test_table_constraints() {
        let input = r#"
            CREATE TABLE account_webauthn_keys (
                account_id INTEGER NOT NULL,
                webauthn_id TEXT NOT NULL,
                PRIMARY KEY (account_id, webauthn_id),
                FOREIGN KEY (account_id) REFERENCES "accounts" (id)
            );
        "#;
        let tables = parse_tables(input).unwrap();
        let table = &tables[0];

        assert_eq!(table.columns.len(), 2);
        assert_eq!(
            table.constraints,
            vec![
                "PRIMARY KEY (account_id, webauthn_id)".to_string(),
                "FOREIGN KEY (account_id) REFERENCES \"accounts\" (id)".to_string(),
            ]
        );
        assert_eq!(table.references(), vec!["accounts"]);
    }

    #[test]
    fn test_multiple_tables_in_order() {
        let input = r#"
            CREATE TABLE accounts (id INTEGER PRIMARY KEY);
            -- a comment; with a semicolon
            INSERT INTO accounts (id) VALUES (1);
            create table account_password_hashes (
                id INTEGER PRIMARY KEY REFERENCES accounts (id), -- inline note
                password_hash TEXT NOT NULL
            );
        "#;
        assert_eq!(
            created_tables(input).unwrap(),
            vec!["accounts".to_string(), "account_password_hashes".to_string()]
        );
    }

    #[test]
    fn test_trailing_comment_with_separators() {
        let input = "CREATE TABLE account_notes (\n\
                     id INTEGER PRIMARY KEY -- id, surrogate (pk)\n\
                     , note TEXT NOT NULL -- free text, see (docs\n\
                     , CHECK (length(note) > 0 -- non-empty, really)\n\
                     )\n\
                     );";
        let tables = parse_tables(input).unwrap();
        let table = &tables[0];

        assert_eq!(table.column_names(), vec!["id", "note"]);
        assert_eq!(table.column("id").unwrap().definition, "INTEGER PRIMARY KEY");
        assert_eq!(table.column("note").unwrap().definition, "TEXT NOT NULL");
        assert_eq!(table.constraints.len(), 1);
        assert!(table.constraints[0].starts_with("CHECK (length(note) > 0"));
        assert!(!table.constraints[0].contains("--"));
    }

    #[test]
    fn test_self_reference_excluded() {
        let input = "CREATE TABLE nodes (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES nodes(id));";
        let tables = parse_tables(input).unwrap();
        assert!(tables[0].references().is_empty());
    }

    #[test]
    fn test_malformed_create_table() {
        let err = parse_tables("CREATE TABLE broken id INTEGER;").unwrap_err();
        assert!(matches!(err, SchemaError::Syntax { .. }));
    }

    #[test]
    fn test_no_tables() {
        assert!(parse_tables("").unwrap().is_empty());
        assert!(parse_tables("CREATE INDEX i ON t (c);").unwrap().is_empty());
    }

    #[test]
    fn test_tokenize_keeps_groups() {
        assert_eq!(
            tokenize("amount NUMERIC(10, 2) DEFAULT 'a b'"),
            vec!["amount", "NUMERIC(10, 2)", "DEFAULT", "'a b'"]
        );
    }
}
