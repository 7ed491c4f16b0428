//! SQLite storage engine.
//!
//! The container's native on-disk format. One `rusqlite::Connection` per
//! engine, guarded by a mutex so the engine can be shared by reference.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{ffi, params_from_iter, Connection};
use tracing::debug;

use gpkg_core::{
    AlreadyExistsError, GeoPackageConfig, GpkgError, GpkgResult, OpenError, ReferenceError,
    StorageError,
};

use crate::{quote_ident, Row, RowFilter, StorageEngine, TableSchema, Value};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b.as_slice())),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

/// SQLite-backed engine.
#[derive(Debug)]
pub struct SqliteEngine {
    connection: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteEngine {
    /// Open (or create, if configured) a database file.
    pub fn open(path: impl AsRef<Path>, config: &GeoPackageConfig) -> GpkgResult<Self> {
        let path = path.as_ref();
        if !config.create_if_missing && !path.exists() {
            return Err(OpenError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        let connection = Connection::open(path).map_err(|e| OpenError::ConnectionFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "Opened SQLite connection");
        Self::configure(connection, Some(path.to_path_buf()), config)
    }

    /// A private, transient in-memory database.
    pub fn open_in_memory(config: &GeoPackageConfig) -> GpkgResult<Self> {
        let connection =
            Connection::open_in_memory().map_err(|e| OpenError::ConnectionFailed {
                path: PathBuf::from(":memory:"),
                reason: e.to_string(),
            })?;
        Self::configure(connection, None, config)
    }

    fn configure(
        connection: Connection,
        path: Option<PathBuf>,
        config: &GeoPackageConfig,
    ) -> GpkgResult<Self> {
        let failed = |e: rusqlite::Error| OpenError::ConnectionFailed {
            path: path.clone().unwrap_or_else(|| PathBuf::from(":memory:")),
            reason: e.to_string(),
        };
        connection
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(failed)?;
        connection
            .pragma_update(None, "foreign_keys", config.foreign_keys)
            .map_err(failed)?;
        Ok(Self {
            connection: Mutex::new(Some(connection)),
            path,
        })
    }

    /// The file backing this engine; `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> GpkgResult<MutexGuard<'_, Option<Connection>>> {
        Ok(self
            .connection
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?)
    }

    fn with_connection<T>(
        &self,
        work: impl FnOnce(&Connection) -> GpkgResult<T>,
    ) -> GpkgResult<T> {
        let guard = self.lock()?;
        let connection = guard.as_ref().ok_or(StorageError::Closed)?;
        work(connection)
    }

    fn select_rows(
        connection: &Connection,
        sql: &str,
        params: &[&Value],
        table: &str,
    ) -> GpkgResult<Vec<Row>> {
        let mut stmt = connection
            .prepare(sql)
            .map_err(|e| map_error(Some(table), e))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(|e| map_error(Some(table), e))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(|e| map_error(Some(table), e))? {
            let mut stored = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                let value = row.get_ref(idx).map_err(|e| map_error(Some(table), e))?;
                stored.set(name.clone(), Value::from(value));
            }
            out.push(stored);
        }
        Ok(out)
    }
}

/// Translate engine failures into the catalog error taxonomy.
fn map_error(table: Option<&str>, err: rusqlite::Error) -> GpkgError {
    let table_name = table.unwrap_or_default().to_string();
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        let reason = message.clone().unwrap_or_else(|| failure.to_string());
        match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                return AlreadyExistsError::Row {
                    table_name,
                    key: reason,
                }
                .into();
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                return ReferenceError::ForeignKeyViolation { table_name, reason }.into();
            }
            ffi::SQLITE_CONSTRAINT_NOTNULL | ffi::SQLITE_CONSTRAINT_CHECK => {
                return StorageError::InsertFailed { table_name, reason }.into();
            }
            _ if reason.starts_with("no such table") => {
                return StorageError::TableNotFound { table_name }.into();
            }
            _ => {}
        }
    }
    StorageError::Engine {
        reason: err.to_string(),
    }
    .into()
}

fn where_clause(filter: &RowFilter) -> (String, Vec<&Value>) {
    if filter.is_empty() {
        return (String::new(), Vec::new());
    }
    let clause = filter
        .conditions()
        .iter()
        .enumerate()
        .map(|(idx, (column, _))| format!("{} IS ?{}", quote_ident(column), idx + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    let params = filter.conditions().iter().map(|(_, v)| v).collect();
    (format!(" WHERE {}", clause), params)
}

fn table_exists_on(connection: &Connection, name: &str) -> GpkgResult<bool> {
    let count: i64 = connection
        .query_row(
            "SELECT count(*) FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE",
            [name],
            |row| row.get(0),
        )
        .map_err(|e| map_error(Some(name), e))?;
    Ok(count > 0)
}

impl StorageEngine for SqliteEngine {
    fn table_exists(&self, name: &str) -> GpkgResult<bool> {
        self.with_connection(|c| table_exists_on(c, name))
    }

    fn list_tables(&self) -> GpkgResult<Vec<String>> {
        self.with_connection(|c| {
            let mut stmt = c
                .prepare(
                    "SELECT name FROM sqlite_master \
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )
                .map_err(|e| map_error(None, e))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| map_error(None, e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| map_error(None, e))?;
            Ok(names)
        })
    }

    fn create_table(&self, schema: &TableSchema) -> GpkgResult<()> {
        self.with_connection(|c| {
            if table_exists_on(c, &schema.name)? {
                return Err(AlreadyExistsError::Table {
                    table_name: schema.name.clone(),
                }
                .into());
            }
            let sql = schema.to_create_sql();
            debug!(table = %schema.name, sql = %sql, "Executing DDL");
            c.execute_batch(&sql)
                .map_err(|e| map_error(Some(&schema.name), e))
        })
    }

    fn drop_table(&self, name: &str) -> GpkgResult<()> {
        self.with_connection(|c| {
            if !table_exists_on(c, name)? {
                return Err(StorageError::TableNotFound {
                    table_name: name.to_string(),
                }
                .into());
            }
            c.execute_batch(&format!("DROP TABLE {}", quote_ident(name)))
                .map_err(|e| map_error(Some(name), e))
        })
    }

    fn insert_row(&self, table: &str, row: &Row) -> GpkgResult<Row> {
        self.with_connection(|c| {
            let (columns, values): (Vec<&str>, Vec<&Value>) = row.iter().unzip();
            let sql = if columns.is_empty() {
                format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
            } else {
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    quote_ident(table),
                    columns
                        .iter()
                        .map(|c| quote_ident(c))
                        .collect::<Vec<_>>()
                        .join(", "),
                    (1..=values.len())
                        .map(|i| format!("?{}", i))
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };
            c.execute(&sql, params_from_iter(values.iter()))
                .map_err(|e| map_error(Some(table), e))?;

            let rowid = Value::Integer(c.last_insert_rowid());
            let select = format!("SELECT * FROM {} WHERE rowid = ?1", quote_ident(table));
            Self::select_rows(c, &select, &[&rowid], table)?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    StorageError::InsertFailed {
                        table_name: table.to_string(),
                        reason: "inserted row could not be read back".to_string(),
                    }
                    .into()
                })
        })
    }

    fn query_rows(&self, table: &str, filter: &RowFilter) -> GpkgResult<Vec<Row>> {
        self.with_connection(|c| {
            let (clause, params) = where_clause(filter);
            let sql = format!("SELECT * FROM {}{} ORDER BY rowid", quote_ident(table), clause);
            Self::select_rows(c, &sql, &params, table)
        })
    }

    fn delete_rows(&self, table: &str, filter: &RowFilter) -> GpkgResult<usize> {
        self.with_connection(|c| {
            let (clause, params) = where_clause(filter);
            let sql = format!("DELETE FROM {}{}", quote_ident(table), clause);
            c.execute(&sql, params_from_iter(params.iter()))
                .map_err(|e| map_error(Some(table), e))
        })
    }

    fn supports_transactions(&self) -> bool {
        true
    }

    fn begin(&self) -> GpkgResult<()> {
        self.with_connection(|c| {
            c.execute_batch("BEGIN").map_err(|e| {
                StorageError::TransactionFailed {
                    reason: e.to_string(),
                }
                .into()
            })
        })
    }

    fn commit(&self) -> GpkgResult<()> {
        self.with_connection(|c| {
            c.execute_batch("COMMIT").map_err(|e| {
                StorageError::TransactionFailed {
                    reason: e.to_string(),
                }
                .into()
            })
        })
    }

    fn rollback(&self) -> GpkgResult<()> {
        self.with_connection(|c| {
            c.execute_batch("ROLLBACK").map_err(|e| {
                StorageError::TransactionFailed {
                    reason: e.to_string(),
                }
                .into()
            })
        })
    }

    fn close(&self) -> GpkgResult<()> {
        let mut guard = self.lock()?;
        if let Some(connection) = guard.take() {
            connection.close().map_err(|(_, e)| StorageError::Engine {
                reason: e.to_string(),
            })?;
            debug!(path = ?self.path, "Closed SQLite connection");
        }
        Ok(())
    }

    fn application_id(&self) -> GpkgResult<Option<u32>> {
        self.with_connection(|c| {
            let id: i64 = c
                .pragma_query_value(None, "application_id", |row| row.get(0))
                .map_err(|e| map_error(None, e))?;
            Ok(Some(id as u32))
        })
    }

    fn set_application_id(&self, id: u32) -> GpkgResult<()> {
        self.with_connection(|c| {
            c.pragma_update(None, "application_id", id as i32)
                .map_err(|e| map_error(None, e))
        })
    }
}
