//! Typed catalog table handle.
//!
//! One `CatalogTable` per catalog table kind, parameterized by the row type.
//! It touches only the table it is bound to; the one exception is the
//! contents cascade, which removes dependent rows before the contents row.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use tracing::debug;

use gpkg_core::{
    CatalogTableKind, Contents, ContentsDataType, Extensions, GeometryColumns,
    GeometryColumnsSfSql, GeometryColumnsSqlMm, GpkgResult, MetadataReference, SchemaError,
    DataColumns, TileMatrix, TileMatrixSet,
};
use gpkg_storage::{RowFilter, StorageEngine};

use crate::rows::CatalogRow;

/// Row store bound to the catalog table of `R`.
pub struct CatalogTable<'a, E: StorageEngine, R: CatalogRow> {
    engine: &'a E,
    _row: PhantomData<R>,
}

impl<'a, E: StorageEngine, R: CatalogRow> CatalogTable<'a, E, R> {
    /// Bind without checking that the table exists.
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            _row: PhantomData,
        }
    }

    /// Bind, failing with `SchemaError::MissingCatalogTable` when the table
    /// is absent.
    pub fn strict(engine: &'a E) -> GpkgResult<Self> {
        let table = Self::new(engine);
        if !table.exists_table()? {
            return Err(SchemaError::MissingCatalogTable {
                kind: R::KIND,
                table_name: R::KIND.table_name().to_string(),
            }
            .into());
        }
        Ok(table)
    }

    pub fn kind(&self) -> CatalogTableKind {
        R::KIND
    }

    pub fn table_name(&self) -> &'static str {
        R::KIND.table_name()
    }

    pub fn exists_table(&self) -> GpkgResult<bool> {
        self.engine.table_exists(self.table_name())
    }

    /// Look up a row by key. `None` is an ordinary outcome.
    pub fn get(&self, key: &R::Key) -> GpkgResult<Option<R>> {
        Ok(self.query(&R::key_filter(key))?.into_iter().next())
    }

    /// Insert a row, returning it as stored. A key collision is
    /// `AlreadyExistsError::Row`.
    pub fn insert(&self, row: &R) -> GpkgResult<R> {
        let stored = self.engine.insert_row(self.table_name(), &row.to_row())?;
        debug!(table = self.table_name(), "Inserted catalog row");
        R::from_row(&stored)
    }

    pub fn query(&self, filter: &RowFilter) -> GpkgResult<Vec<R>> {
        self.engine
            .query_rows(self.table_name(), filter)?
            .iter()
            .map(R::from_row)
            .collect()
    }

    pub fn query_all(&self) -> GpkgResult<Vec<R>> {
        self.query(&RowFilter::all())
    }

    pub fn query_for_table_name(&self, table_name: &str) -> GpkgResult<Vec<R>> {
        let column = self.table_name_column()?;
        self.query(&RowFilter::eq(column, table_name))
    }

    /// Distinct user table names referenced by this catalog table, in
    /// insertion order.
    pub fn query_table_names(&self) -> GpkgResult<Vec<String>> {
        let column = self.table_name_column()?;
        let rows = self.engine.query_rows(self.table_name(), &RowFilter::all())?;
        let mut seen = BTreeSet::new();
        Ok(rows
            .iter()
            .filter_map(|row| row.value(column).as_str().map(str::to_string))
            .filter(|name| seen.insert(name.clone()))
            .collect())
    }

    pub fn delete(&self, key: &R::Key) -> GpkgResult<bool> {
        Ok(self
            .engine
            .delete_rows(self.table_name(), &R::key_filter(key))?
            > 0)
    }

    /// Delete every row belonging to `table_name`. An absent catalog table
    /// holds no rows, so this is a no-op returning 0.
    pub fn delete_by_table_name(&self, table_name: &str) -> GpkgResult<usize> {
        let column = self.table_name_column()?;
        if !self.exists_table()? {
            return Ok(0);
        }
        let removed = self
            .engine
            .delete_rows(self.table_name(), &RowFilter::eq(column, table_name))?;
        if removed > 0 {
            debug!(
                table = self.table_name(),
                user_table = %table_name,
                removed,
                "Deleted catalog rows"
            );
        }
        Ok(removed)
    }

    fn table_name_column(&self) -> GpkgResult<&'static str> {
        R::TABLE_NAME_COLUMN.ok_or_else(|| {
            SchemaError::InvalidColumn {
                table_name: self.table_name().to_string(),
                column_name: "table_name".to_string(),
                reason: "rows are not keyed by user table".to_string(),
            }
            .into()
        })
    }
}

impl<'a, E: StorageEngine> CatalogTable<'a, E, Contents> {
    /// Names of user tables registered with the given data type.
    pub fn query_table_names_of_type(
        &self,
        data_type: ContentsDataType,
    ) -> GpkgResult<Vec<String>> {
        Ok(self
            .query(&RowFilter::eq("data_type", data_type.as_db_str()))?
            .into_iter()
            .map(|c| c.table_name)
            .collect())
    }

    /// Delete the contents row for `table_name` together with every catalog
    /// row that depends on it. Returns whether a contents row was removed.
    pub fn delete_cascade(&self, table_name: &str) -> GpkgResult<bool> {
        // Children before parents so foreign keys never dangle.
        CatalogTable::<E, GeometryColumns>::new(self.engine).delete_by_table_name(table_name)?;
        CatalogTable::<E, GeometryColumnsSqlMm>::new(self.engine)
            .delete_by_table_name(table_name)?;
        CatalogTable::<E, GeometryColumnsSfSql>::new(self.engine)
            .delete_by_table_name(table_name)?;
        CatalogTable::<E, TileMatrix>::new(self.engine).delete_by_table_name(table_name)?;
        CatalogTable::<E, TileMatrixSet>::new(self.engine).delete_by_table_name(table_name)?;
        CatalogTable::<E, DataColumns>::new(self.engine).delete_by_table_name(table_name)?;
        CatalogTable::<E, MetadataReference>::new(self.engine)
            .delete_by_table_name(table_name)?;
        CatalogTable::<E, Extensions>::new(self.engine).delete_by_table_name(table_name)?;

        if !self.exists_table()? {
            return Ok(false);
        }
        self.delete(&table_name.to_string())
    }
}
