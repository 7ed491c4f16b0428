//! GeoPackage Storage - Storage Engine Trait and Engines
//!
//! Defines the storage abstraction the catalog layer runs on, plus two
//! engines: an in-memory engine for tests and embedded use, and a SQLite
//! engine for the container's native on-disk format.

pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod value;

pub use memory::MemoryEngine;
pub use schema::{quote_ident, ColumnDef, ColumnDefault, ForeignKey, TableSchema};
pub use sqlite::SqliteEngine;
pub use value::{Row, RowFilter, Value};

use gpkg_core::GpkgResult;

// ============================================================================
// STORAGE ENGINE TRAIT
// ============================================================================

/// Storage engine collaborator.
///
/// All methods take `&self`; engines use interior mutability. A handle owns
/// exactly one engine and drives it from a single thread.
pub trait StorageEngine: Send + Sync {
    // === Schema Operations ===

    /// Whether a table (or view) with this name exists.
    fn table_exists(&self, name: &str) -> GpkgResult<bool>;

    /// All tables held by the engine, engine-internal tables excluded.
    fn list_tables(&self) -> GpkgResult<Vec<String>>;

    /// Create a table. Fails if one with the same name exists.
    fn create_table(&self, schema: &TableSchema) -> GpkgResult<()>;

    /// Drop a table. Fails if it does not exist.
    fn drop_table(&self, name: &str) -> GpkgResult<()>;

    // === Row Operations ===

    /// Insert a row, returning it as stored (defaults and assigned keys filled in).
    fn insert_row(&self, table: &str, row: &Row) -> GpkgResult<Row>;

    /// Rows matching the filter, in insertion order.
    fn query_rows(&self, table: &str, filter: &RowFilter) -> GpkgResult<Vec<Row>>;

    /// Delete matching rows, returning how many were removed.
    fn delete_rows(&self, table: &str, filter: &RowFilter) -> GpkgResult<usize>;

    // === Transactions ===

    fn supports_transactions(&self) -> bool;

    fn begin(&self) -> GpkgResult<()>;

    fn commit(&self) -> GpkgResult<()>;

    fn rollback(&self) -> GpkgResult<()>;

    // === Lifecycle ===

    /// Release the underlying connection. Later calls fail with `StorageError::Closed`.
    fn close(&self) -> GpkgResult<()>;

    /// The container's application id, if the engine stores one.
    fn application_id(&self) -> GpkgResult<Option<u32>> {
        Ok(None)
    }

    fn set_application_id(&self, _id: u32) -> GpkgResult<()> {
        Ok(())
    }

    /// Run `work` atomically when the engine supports transactions, otherwise
    /// run it directly. A failed `work` is rolled back and its error returned.
    fn transaction<T, F>(&self, work: F) -> GpkgResult<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> GpkgResult<T>,
    {
        if !self.supports_transactions() {
            return work(self);
        }
        self.begin()?;
        match work(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback() {
                    tracing::warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
