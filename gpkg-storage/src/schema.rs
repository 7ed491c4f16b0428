//! Structured DDL.
//!
//! Every table the catalog layer creates is described by a `TableSchema`.
//! The SQLite engine renders it with `to_create_sql`; the in-memory engine
//! enforces the same keys and references directly.

use gpkg_core::format_timestamp;

use crate::Value;

/// Default applied when an insert omits a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Integer(i64),
    Real(f64),
    Text(String),
    /// Current time in the catalog timestamp format.
    CurrentTimestamp,
    /// Raw SQL literal supplied by a user table definition.
    Literal(String),
}

impl ColumnDefault {
    pub fn to_sql(&self) -> String {
        match self {
            ColumnDefault::Integer(i) => i.to_string(),
            ColumnDefault::Real(f) => f.to_string(),
            ColumnDefault::Text(s) => quote_literal(s),
            ColumnDefault::CurrentTimestamp => {
                "(strftime('%Y-%m-%dT%H:%M:%fZ','now'))".to_string()
            }
            ColumnDefault::Literal(sql) => sql.clone(),
        }
    }

    /// Value the in-memory engine stores for this default.
    pub fn to_value(&self) -> Value {
        match self {
            ColumnDefault::Integer(i) => Value::Integer(*i),
            ColumnDefault::Real(f) => Value::Real(*f),
            ColumnDefault::Text(s) => Value::Text(s.clone()),
            ColumnDefault::CurrentTimestamp => {
                Value::Text(format_timestamp(&chrono::Utc::now()))
            }
            ColumnDefault::Literal(sql) => parse_literal(sql),
        }
    }
}

fn parse_literal(sql: &str) -> Value {
    let trimmed = sql.trim();
    if trimmed.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return Value::Real(f);
    }
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"))
        .unwrap_or_else(|| trimmed.to_string());
    Value::Text(unquoted)
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub autoincrement: bool,
    pub unique: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            autoincrement: false,
            unique: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    /// An `INTEGER PRIMARY KEY` aliases the row id and is assigned on insert.
    pub fn is_rowid_alias(&self) -> bool {
        self.primary_key && self.sql_type.eq_ignore_ascii_case("INTEGER")
    }

    fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.sql_type);
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
            if self.autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql());
        }
        sql
    }
}

/// A foreign key from `columns` to `foreign_table(foreign_columns)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Vec<String>,
    pub foreign_table: String,
    pub foreign_columns: Vec<String>,
}

impl ForeignKey {
    pub fn new(
        name: impl Into<String>,
        column: impl Into<String>,
        foreign_table: impl Into<String>,
        foreign_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: vec![column.into()],
            foreign_table: foreign_table.into(),
            foreign_columns: vec![foreign_column.into()],
        }
    }
}

/// Full description of a table to create.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Table-level composite primary key; empty when a column carries it.
    pub primary_key: Vec<String>,
    pub unique: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKey>,
    /// CHECK expressions, rendered verbatim. Only SQL engines evaluate them.
    pub checks: Vec<String>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique.push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn check(mut self, expression: impl Into<String>) -> Self {
        self.checks.push(expression.into());
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key columns, whether declared per column or per table.
    pub fn key_columns(&self) -> Vec<&str> {
        if !self.primary_key.is_empty() {
            return self.primary_key.iter().map(String::as_str).collect();
        }
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Every column group that must be unique: the key, UNIQUE columns and
    /// UNIQUE constraints.
    pub fn unique_groups(&self) -> Vec<Vec<&str>> {
        let mut groups = Vec::new();
        let key = self.key_columns();
        if !key.is_empty() {
            groups.push(key);
        }
        for column in self.columns.iter().filter(|c| c.unique) {
            groups.push(vec![column.name.as_str()]);
        }
        for group in &self.unique {
            groups.push(group.iter().map(String::as_str).collect());
        }
        groups
    }

    /// The column that aliases the row id, if any.
    pub fn rowid_column(&self) -> Option<&ColumnDef> {
        if !self.primary_key.is_empty() {
            return None;
        }
        self.columns.iter().find(|c| c.is_rowid_alias())
    }

    pub fn to_create_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDef::to_sql).collect();
        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", quote_list(&self.primary_key)));
        }
        for group in &self.unique {
            parts.push(format!("UNIQUE ({})", quote_list(group)));
        }
        for fk in &self.foreign_keys {
            parts.push(format!(
                "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
                quote_ident(&fk.name),
                quote_list(&fk.columns),
                quote_ident(&fk.foreign_table),
                quote_list(&fk.foreign_columns)
            ));
        }
        for check in &self.checks {
            parts.push(format!("CHECK ({})", check));
        }
        format!(
            "CREATE TABLE {} (\n  {}\n)",
            quote_ident(&self.name),
            parts.join(",\n  ")
        )
    }
}

/// Double-quote an identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}
