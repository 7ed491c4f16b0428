//! In-memory storage engine.
//!
//! Keeps every table behind a single `RwLock` and enforces the constraints a
//! `TableSchema` declares: NOT NULL, primary key and UNIQUE groups, and
//! foreign keys (presence on insert, restrict on delete). Transactions take a
//! snapshot of all tables on `begin` and restore it on `rollback`.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use gpkg_core::{
    AlreadyExistsError, GpkgError, GpkgResult, ReferenceError, StorageError,
};

use crate::{Row, RowFilter, StorageEngine, TableSchema, Value};

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: TableSchema,
    rows: Vec<Row>,
    next_rowid: i64,
}

type Tables = BTreeMap<String, MemoryTable>;

#[derive(Debug, Default)]
struct MemoryState {
    /// Keyed by lowercased name; table names are case-insensitive.
    tables: Tables,
    snapshot: Option<Tables>,
    application_id: u32,
    closed: bool,
}

/// In-memory engine for tests and embedded use.
#[derive(Debug)]
pub struct MemoryEngine {
    state: RwLock<MemoryState>,
    transactional: bool,
    foreign_keys: bool,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Create an empty engine with transaction support and foreign keys on.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            transactional: true,
            foreign_keys: true,
        }
    }

    /// An engine that reports no transaction support. Multi-step writes
    /// against it rely on compensating cleanup instead.
    pub fn without_transactions() -> Self {
        Self {
            transactional: false,
            ..Self::new()
        }
    }

    /// Toggle foreign key enforcement.
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Number of rows currently held in `table`.
    pub fn row_count(&self, table: &str) -> GpkgResult<usize> {
        let state = self.read()?;
        Ok(lookup(&state.tables, table)?.rows.len())
    }

    fn read(&self) -> GpkgResult<RwLockReadGuard<'_, MemoryState>> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        if state.closed {
            return Err(StorageError::Closed.into());
        }
        Ok(state)
    }

    fn write(&self) -> GpkgResult<RwLockWriteGuard<'_, MemoryState>> {
        let state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        if state.closed {
            return Err(StorageError::Closed.into());
        }
        Ok(state)
    }
}

fn table_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn lookup<'a>(tables: &'a Tables, name: &str) -> GpkgResult<&'a MemoryTable> {
    tables.get(&table_key(name)).ok_or_else(|| {
        StorageError::TableNotFound {
            table_name: name.to_string(),
        }
        .into()
    })
}

fn describe_key(columns: &[&str], row: &Row) -> String {
    columns
        .iter()
        .map(|c| format!("{}={:?}", c, row.value(c)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the row as it will be stored, applying defaults and the row id.
fn materialize(table: &MemoryTable, row: &Row) -> GpkgResult<Row> {
    let schema = &table.schema;
    if let Some(unknown) = row.columns().find(|c| schema.find_column(c).is_none()) {
        return Err(StorageError::InsertFailed {
            table_name: schema.name.clone(),
            reason: format!("table {} has no column named {}", schema.name, unknown),
        }
        .into());
    }

    let rowid_column = schema.rowid_column().map(|c| c.name.clone());
    let mut stored = Row::new();
    for column in &schema.columns {
        let mut value = match row.get(&column.name) {
            Some(v) => v.clone(),
            None => column
                .default
                .as_ref()
                .map(|d| d.to_value())
                .unwrap_or(Value::Null),
        };
        if rowid_column.as_deref() == Some(column.name.as_str()) && value.is_null() {
            value = Value::Integer(table.next_rowid);
        }
        if column.not_null && value.is_null() {
            return Err(StorageError::InsertFailed {
                table_name: schema.name.clone(),
                reason: format!("NOT NULL constraint failed: {}.{}", schema.name, column.name),
            }
            .into());
        }
        stored.set(column.name.clone(), value);
    }
    Ok(stored)
}

fn check_unique(table: &MemoryTable, row: &Row) -> GpkgResult<()> {
    for group in table.schema.unique_groups() {
        // NULLs never collide under UNIQUE.
        if group.iter().any(|c| row.value(c).is_null()) {
            continue;
        }
        let collides = table
            .rows
            .iter()
            .any(|existing| group.iter().all(|c| existing.value(c).sql_eq(&row.value(c))));
        if collides {
            return Err(AlreadyExistsError::Row {
                table_name: table.schema.name.clone(),
                key: describe_key(&group, row),
            }
            .into());
        }
    }
    Ok(())
}

fn check_references(tables: &Tables, table: &MemoryTable, row: &Row) -> GpkgResult<()> {
    for fk in &table.schema.foreign_keys {
        if fk.columns.iter().any(|c| row.value(c).is_null()) {
            continue;
        }
        let parent_has_row = tables
            .get(&table_key(&fk.foreign_table))
            .map(|parent| {
                parent.rows.iter().any(|candidate| {
                    fk.columns
                        .iter()
                        .zip(&fk.foreign_columns)
                        .all(|(child, col)| candidate.value(col).sql_eq(&row.value(child)))
                })
            })
            .unwrap_or(false);
        if !parent_has_row {
            return Err(ReferenceError::ForeignKeyViolation {
                table_name: table.schema.name.clone(),
                reason: format!(
                    "{} has no row matching {}",
                    fk.foreign_table,
                    describe_key(
                        &fk.columns.iter().map(String::as_str).collect::<Vec<_>>(),
                        row
                    )
                ),
            }
            .into());
        }
    }
    Ok(())
}

/// Refuse to delete parent rows that other tables still reference.
fn check_restrict(tables: &Tables, parent: &str, doomed: &[&Row]) -> GpkgResult<()> {
    for child in tables.values() {
        for fk in &child.schema.foreign_keys {
            if !fk.foreign_table.eq_ignore_ascii_case(parent) {
                continue;
            }
            let referenced = child.rows.iter().any(|child_row| {
                doomed.iter().any(|parent_row| {
                    fk.columns.iter().zip(&fk.foreign_columns).all(|(c, p)| {
                        let v = child_row.value(c);
                        !v.is_null() && v.sql_eq(&parent_row.value(p))
                    })
                })
            });
            if referenced {
                return Err(ReferenceError::ForeignKeyViolation {
                    table_name: parent.to_string(),
                    reason: format!("rows are still referenced by {}", child.schema.name),
                }
                .into());
            }
        }
    }
    Ok(())
}

impl StorageEngine for MemoryEngine {
    fn table_exists(&self, name: &str) -> GpkgResult<bool> {
        Ok(self.read()?.tables.contains_key(&table_key(name)))
    }

    fn list_tables(&self) -> GpkgResult<Vec<String>> {
        Ok(self
            .read()?
            .tables
            .values()
            .map(|t| t.schema.name.clone())
            .collect())
    }

    fn create_table(&self, schema: &TableSchema) -> GpkgResult<()> {
        let mut state = self.write()?;
        let key = table_key(&schema.name);
        if state.tables.contains_key(&key) {
            return Err(AlreadyExistsError::Table {
                table_name: schema.name.clone(),
            }
            .into());
        }
        state.tables.insert(
            key,
            MemoryTable {
                schema: schema.clone(),
                rows: Vec::new(),
                next_rowid: 1,
            },
        );
        Ok(())
    }

    fn drop_table(&self, name: &str) -> GpkgResult<()> {
        let mut state = self.write()?;
        let key = table_key(name);
        if let Some(table) = state.tables.get(&key) {
            if self.foreign_keys {
                let rows: Vec<&Row> = table.rows.iter().collect();
                check_restrict(&state.tables, name, &rows)?;
            }
        }
        state
            .tables
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| {
                StorageError::TableNotFound {
                    table_name: name.to_string(),
                }
                .into()
            })
    }

    fn insert_row(&self, table: &str, row: &Row) -> GpkgResult<Row> {
        let mut state = self.write()?;
        let target = lookup(&state.tables, table)?;
        let stored = materialize(target, row)?;
        check_unique(target, &stored)?;
        if self.foreign_keys {
            check_references(&state.tables, target, &stored)?;
        }

        let rowid = target
            .schema
            .rowid_column()
            .and_then(|c| stored.value(&c.name).as_i64());
        let entry = state
            .tables
            .get_mut(&table_key(table))
            .ok_or_else(|| GpkgError::from(StorageError::TableNotFound {
                table_name: table.to_string(),
            }))?;
        if let Some(id) = rowid {
            entry.next_rowid = entry.next_rowid.max(id + 1);
        } else {
            entry.next_rowid += 1;
        }
        entry.rows.push(stored.clone());
        Ok(stored)
    }

    fn query_rows(&self, table: &str, filter: &RowFilter) -> GpkgResult<Vec<Row>> {
        let state = self.read()?;
        Ok(lookup(&state.tables, table)?
            .rows
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn delete_rows(&self, table: &str, filter: &RowFilter) -> GpkgResult<usize> {
        let mut state = self.write()?;
        let target = lookup(&state.tables, table)?;
        if self.foreign_keys {
            let doomed: Vec<&Row> = target.rows.iter().filter(|r| filter.matches(r)).collect();
            check_restrict(&state.tables, table, &doomed)?;
        }
        let entry = state
            .tables
            .get_mut(&table_key(table))
            .ok_or_else(|| GpkgError::from(StorageError::TableNotFound {
                table_name: table.to_string(),
            }))?;
        let before = entry.rows.len();
        entry.rows.retain(|r| !filter.matches(r));
        Ok(before - entry.rows.len())
    }

    fn supports_transactions(&self) -> bool {
        self.transactional
    }

    fn begin(&self) -> GpkgResult<()> {
        if !self.transactional {
            return Err(StorageError::TransactionFailed {
                reason: "engine does not support transactions".to_string(),
            }
            .into());
        }
        let mut state = self.write()?;
        if state.snapshot.is_some() {
            return Err(StorageError::TransactionFailed {
                reason: "cannot start a transaction within a transaction".to_string(),
            }
            .into());
        }
        state.snapshot = Some(state.tables.clone());
        Ok(())
    }

    fn commit(&self) -> GpkgResult<()> {
        let mut state = self.write()?;
        state
            .snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| no_transaction("commit"))
    }

    fn rollback(&self) -> GpkgResult<()> {
        let mut state = self.write()?;
        let snapshot = state.snapshot.take().ok_or_else(|| no_transaction("rollback"))?;
        state.tables = snapshot;
        Ok(())
    }

    fn close(&self) -> GpkgResult<()> {
        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;
        state.tables.clear();
        state.snapshot = None;
        state.closed = true;
        Ok(())
    }

    fn application_id(&self) -> GpkgResult<Option<u32>> {
        Ok(Some(self.read()?.application_id))
    }

    fn set_application_id(&self, id: u32) -> GpkgResult<()> {
        self.write()?.application_id = id;
        Ok(())
    }
}

fn no_transaction(action: &str) -> GpkgError {
    StorageError::TransactionFailed {
        reason: format!("cannot {} - no transaction is active", action),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColumnDef, ForeignKey};

    fn parks() -> TableSchema {
        TableSchema::new("parks")
            .column(ColumnDef::new("id", "INTEGER").primary_key().autoincrement())
            .column(ColumnDef::new("name", "TEXT"))
    }

    #[test]
    fn test_rowid_assigned_and_advanced() {
        let engine = MemoryEngine::new();
        engine.create_table(&parks()).unwrap();

        let first = engine.insert_row("parks", &Row::new().with("name", "a")).unwrap();
        assert_eq!(first.value("id"), Value::Integer(1));

        engine
            .insert_row("parks", &Row::new().with("id", 10i64).with("name", "b"))
            .unwrap();
        let next = engine.insert_row("parks", &Row::new().with("name", "c")).unwrap();
        assert_eq!(next.value("id"), Value::Integer(11));
        assert_eq!(engine.row_count("parks").unwrap(), 3);
    }

    #[test]
    fn test_table_names_are_case_insensitive() {
        let engine = MemoryEngine::new();
        engine.create_table(&parks()).unwrap();
        assert!(engine.table_exists("PARKS").unwrap());
        assert!(engine.create_table(&parks()).unwrap_err().is_already_exists());
        assert_eq!(engine.list_tables().unwrap(), vec!["parks"]);
    }

    #[test]
    fn test_unknown_column_rejected() {
        let engine = MemoryEngine::new();
        engine.create_table(&parks()).unwrap();
        let err = engine
            .insert_row("parks", &Row::new().with("colour", "green"))
            .unwrap_err();
        assert!(err.is_storage());
    }

    #[test]
    fn test_not_null_enforced() {
        let engine = MemoryEngine::new();
        engine
            .create_table(
                &TableSchema::new("t").column(ColumnDef::new("name", "TEXT").not_null()),
            )
            .unwrap();
        assert!(engine.insert_row("t", &Row::new()).unwrap_err().is_storage());
    }

    #[test]
    fn test_delete_restricted_by_reference() {
        let engine = MemoryEngine::new();
        engine.create_table(&parks()).unwrap();
        engine
            .create_table(
                &TableSchema::new("visits")
                    .column(ColumnDef::new("park_id", "INTEGER"))
                    .foreign_key(ForeignKey::new("fk_visit_park", "park_id", "parks", "id")),
            )
            .unwrap();
        engine.insert_row("parks", &Row::new().with("name", "a")).unwrap();
        engine
            .insert_row("visits", &Row::new().with("park_id", 1i64))
            .unwrap();

        let err = engine.delete_rows("parks", &RowFilter::all()).unwrap_err();
        assert!(err.is_reference());
        assert!(engine.drop_table("parks").unwrap_err().is_reference());

        engine.delete_rows("visits", &RowFilter::all()).unwrap();
        assert_eq!(engine.delete_rows("parks", &RowFilter::all()).unwrap(), 1);
    }

    #[test]
    fn test_foreign_keys_can_be_disabled() {
        let engine = MemoryEngine::new().with_foreign_keys(false);
        engine
            .create_table(
                &TableSchema::new("visits")
                    .column(ColumnDef::new("park_id", "INTEGER"))
                    .foreign_key(ForeignKey::new("fk_visit_park", "park_id", "parks", "id")),
            )
            .unwrap();
        assert!(engine
            .insert_row("visits", &Row::new().with("park_id", 7i64))
            .is_ok());
    }

    #[test]
    fn test_rollback_restores_tables() {
        let engine = MemoryEngine::new();
        engine.begin().unwrap();
        engine.create_table(&parks()).unwrap();
        engine.insert_row("parks", &Row::new().with("name", "a")).unwrap();
        engine.rollback().unwrap();
        assert!(!engine.table_exists("parks").unwrap());
    }

    #[test]
    fn test_nested_begin_and_stray_commit_fail() {
        let engine = MemoryEngine::new();
        assert!(engine.commit().is_err());
        engine.begin().unwrap();
        assert!(engine.begin().is_err());
        engine.commit().unwrap();
    }

    #[test]
    fn test_without_transactions() {
        let engine = MemoryEngine::without_transactions();
        assert!(!engine.supports_transactions());
        assert!(engine.begin().is_err());

        let created: GpkgResult<()> = engine.transaction(|e| e.create_table(&parks()));
        assert!(created.is_ok());
        assert!(engine.table_exists("parks").unwrap());
    }

    #[test]
    fn test_application_id_round_trip() {
        let engine = MemoryEngine::new();
        assert_eq!(engine.application_id().unwrap(), Some(0));
        engine.set_application_id(0x4750_3130).unwrap();
        assert_eq!(engine.application_id().unwrap(), Some(0x4750_3130));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use crate::ColumnDef;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: a table never holds two rows with the same primary key,
        /// whatever order the inserts arrive in.
        #[test]
        fn prop_primary_key_unique(keys in prop::collection::vec(0i64..20, 1..40)) {
            let engine = MemoryEngine::new();
            engine.create_table(
                &TableSchema::new("gpkg_spatial_ref_sys")
                    .column(ColumnDef::new("srs_id", "INTEGER").primary_key()),
            ).unwrap();

            let mut accepted = std::collections::BTreeSet::new();
            for key in &keys {
                let result = engine.insert_row(
                    "gpkg_spatial_ref_sys",
                    &Row::new().with("srs_id", *key),
                );
                prop_assert_eq!(result.is_ok(), accepted.insert(*key));
            }
            prop_assert_eq!(
                engine.row_count("gpkg_spatial_ref_sys").unwrap(),
                accepted.len()
            );
        }

        /// Property: rollback restores exactly the committed state.
        #[test]
        fn prop_rollback_restores_state(
            committed in prop::collection::vec("[a-z]{1,8}", 0..10),
            discarded in prop::collection::vec("[a-z]{1,8}", 1..10),
        ) {
            let engine = MemoryEngine::new();
            engine.create_table(
                &TableSchema::new("names").column(ColumnDef::new("name", "TEXT")),
            ).unwrap();
            for name in &committed {
                engine.insert_row("names", &Row::new().with("name", name.as_str())).unwrap();
            }
            let before = engine.query_rows("names", &RowFilter::all()).unwrap();

            engine.begin().unwrap();
            for name in &discarded {
                engine.insert_row("names", &Row::new().with("name", name.as_str())).unwrap();
            }
            engine.rollback().unwrap();

            prop_assert_eq!(engine.query_rows("names", &RowFilter::all()).unwrap(), before);
        }
    }
}
