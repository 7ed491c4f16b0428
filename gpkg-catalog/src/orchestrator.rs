//! Catalog orchestrator.
//!
//! Keeps every user table paired with its contents row and descriptor row.
//! The creation workflows validate references before touching storage, run
//! inside one engine transaction when the engine has them, and fall back to
//! dropping the half-created table when it does not.

use tracing::{debug, info, warn};

use gpkg_core::{
    constants::GEOPACKAGE_EXTENSION_AUTHOR, validate_user_table_name, AlreadyExistsError,
    BoundingBox, CatalogTableKind, Contents, ContentsDataType, DataColumnConstraints,
    DataColumns, Extensions, FeatureTable, GeometryColumns, GeometryColumnsSfSql,
    GeometryColumnsSqlMm, GpkgResult, Metadata, MetadataReference, ReferenceError, SchemaError,
    SpatialReferenceSystem, SpatialReferenceSystemSfSql, SpatialReferenceSystemSqlMm, SrsId,
    TileMatrix, TileMatrixSet, TileTable, UserColumn, UserTable,
};
use gpkg_storage::StorageEngine;

use crate::provisioner::Provisioner;
use crate::row_store::CatalogTable;
use crate::rows::CatalogRow;

const VARIANT_EXTENSION_DEFINITION: &str = "GeoPackage 1.0 Specification Annex C";

/// Runs catalog workflows against a borrowed engine.
pub struct CatalogOrchestrator<'a, E: StorageEngine> {
    engine: &'a E,
}

impl<'a, E: StorageEngine> CatalogOrchestrator<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    fn provisioner(&self) -> Provisioner<'a, E> {
        Provisioner::new(self.engine)
    }

    fn table<R: CatalogRow>(&self) -> CatalogTable<'a, E, R> {
        CatalogTable::new(self.engine)
    }

    // === Provisioning ===

    /// Create a core catalog table if missing. Variant tables are refused;
    /// they are materialized only by `create_variant_table`.
    pub fn ensure_catalog_table(&self, kind: CatalogTableKind) -> GpkgResult<bool> {
        if kind.is_variant() {
            return Err(SchemaError::InvalidValue {
                field: "kind".to_string(),
                reason: format!(
                    "{} is an alternate-schema table; use create_variant_table",
                    kind.table_name()
                ),
            }
            .into());
        }
        self.provisioner().ensure_catalog_table(kind)
    }

    /// Accessor for the catalog table of `R`.
    ///
    /// Variant tables must already exist (`SchemaError` naming the table
    /// otherwise). Core tables are bound as-is; lookups against an absent
    /// core table surface as `StorageError::TableNotFound`.
    pub fn catalog_table<R: CatalogRow>(&self) -> GpkgResult<CatalogTable<'a, E, R>> {
        if R::KIND.is_variant() {
            CatalogTable::strict(self.engine)
        } else {
            Ok(self.table())
        }
    }

    /// Materialize an alternate-schema catalog table, fill it from the core
    /// catalog and register its extension. Returns whether it was created.
    ///
    /// Once it exists, later feature tables and SRS rows are written to it
    /// alongside their core rows, and `delete_table` removes them again.
    pub fn create_variant_table(&self, kind: CatalogTableKind) -> GpkgResult<bool> {
        let extension_name = kind.extension_name().ok_or_else(|| SchemaError::InvalidValue {
            field: "kind".to_string(),
            reason: format!("{} is not an alternate-schema table", kind.table_name()),
        })?;
        if self.engine.table_exists(kind.table_name())? {
            return Ok(false);
        }

        self.engine.transaction(|engine| {
            let orchestrator = CatalogOrchestrator::new(engine);
            orchestrator.provisioner().ensure_catalog_table(kind)?;
            let copied = orchestrator.populate_variant(kind)?;
            orchestrator.register_extension(
                Extensions::container(extension_name, VARIANT_EXTENSION_DEFINITION)
                    .for_table(kind.table_name()),
            )?;
            info!(
                table = kind.table_name(),
                extension = extension_name,
                rows = copied,
                "Created variant catalog table"
            );
            Ok(true)
        })
    }

    fn populate_variant(&self, kind: CatalogTableKind) -> GpkgResult<usize> {
        match kind {
            CatalogTableKind::SpatialReferenceSystemSqlMm => {
                self.copy_rows::<SpatialReferenceSystem, SpatialReferenceSystemSqlMm>()
            }
            CatalogTableKind::SpatialReferenceSystemSfSql => {
                self.copy_rows::<SpatialReferenceSystem, SpatialReferenceSystemSfSql>()
            }
            CatalogTableKind::GeometryColumnsSqlMm => {
                self.copy_rows::<GeometryColumns, GeometryColumnsSqlMm>()
            }
            CatalogTableKind::GeometryColumnsSfSql => {
                self.copy_rows::<GeometryColumns, GeometryColumnsSfSql>()
            }
            _ => Ok(0),
        }
    }

    fn copy_rows<S, T>(&self) -> GpkgResult<usize>
    where
        S: CatalogRow,
        T: CatalogRow + for<'r> From<&'r S>,
    {
        let source = self.table::<S>();
        if !source.exists_table()? {
            return Ok(0);
        }
        let target = self.table::<T>();
        let rows = source.query_all()?;
        for row in &rows {
            target.insert(&T::from(row))?;
        }
        Ok(rows.len())
    }

    /// Write `row` to the variant table of `T` if it was materialized.
    fn mirror_row<S, T>(&self, row: &S) -> GpkgResult<()>
    where
        S: CatalogRow,
        T: CatalogRow + for<'r> From<&'r S>,
    {
        let target = self.table::<T>();
        if target.exists_table()? {
            target.insert(&T::from(row))?;
        }
        Ok(())
    }

    // === Creation workflows ===

    /// Create a feature table with a synthesized `id` key and the geometry
    /// column described by `geometry_columns`, plus its contents and
    /// geometry-columns rows.
    pub fn create_feature_table_with_metadata(
        &self,
        geometry_columns: GeometryColumns,
        bounding_box: BoundingBox,
        srs_id: SrsId,
    ) -> GpkgResult<GeometryColumns> {
        self.create_feature_table_with_columns(geometry_columns, Vec::new(), bounding_box, srs_id)
    }

    /// As `create_feature_table_with_metadata`, with extra attribute columns
    /// placed after the geometry column. Their indexes are reassigned.
    pub fn create_feature_table_with_columns(
        &self,
        mut geometry_columns: GeometryColumns,
        additional_columns: Vec<UserColumn>,
        bounding_box: BoundingBox,
        srs_id: SrsId,
    ) -> GpkgResult<GeometryColumns> {
        bounding_box.validate()?;
        self.resolve_srs(srs_id)?;

        let table_name = geometry_columns.table_name.clone();
        let mut columns = FeatureTable::with_geometry(
            &table_name,
            &geometry_columns.column_name,
            geometry_columns.geometry_type,
        )?
        .columns;
        for mut column in additional_columns {
            column.index = columns.len();
            columns.push(column);
        }
        let table = FeatureTable::new(&table_name, columns)?;
        self.check_unused(&table_name)?;

        self.ensure_catalog_table(CatalogTableKind::GeometryColumns)?;

        let contents = Contents::new(&table_name, ContentsDataType::Features)
            .with_bounds(bounding_box, srs_id);
        geometry_columns.srs_id = srs_id;

        let created = self.run_workflow(&UserTable::from(table), &contents, |orchestrator| {
            let created = orchestrator
                .table::<GeometryColumns>()
                .insert(&geometry_columns)?;
            orchestrator.mirror_row::<_, GeometryColumnsSqlMm>(&created)?;
            orchestrator.mirror_row::<_, GeometryColumnsSfSql>(&created)?;
            Ok(created)
        })?;
        info!(
            table = %table_name,
            column = %created.column_name,
            geometry_type = %created.geometry_type,
            srs_id,
            "Created feature table"
        );
        Ok(created)
    }

    /// Create a tile table with the required tile columns, plus its contents
    /// and tile-matrix-set rows. The two SRS references are independent.
    pub fn create_tile_table_with_metadata(
        &self,
        table_name: &str,
        contents_bounding_box: BoundingBox,
        contents_srs_id: SrsId,
        tile_matrix_set_bounding_box: BoundingBox,
        tile_matrix_set_srs_id: SrsId,
    ) -> GpkgResult<TileMatrixSet> {
        contents_bounding_box.validate()?;
        tile_matrix_set_bounding_box.validate()?;
        self.resolve_srs(contents_srs_id)?;
        self.resolve_srs(tile_matrix_set_srs_id)?;

        let table = TileTable::with_required_columns(table_name)?;
        self.check_unused(table_name)?;

        self.ensure_catalog_table(CatalogTableKind::TileMatrixSet)?;
        self.ensure_catalog_table(CatalogTableKind::TileMatrix)?;

        let contents = Contents::new(table_name, ContentsDataType::Tiles)
            .with_bounds(contents_bounding_box, contents_srs_id);
        let tile_matrix_set = TileMatrixSet {
            table_name: table_name.to_string(),
            srs_id: tile_matrix_set_srs_id,
            bounding_box: tile_matrix_set_bounding_box,
        };

        let created = self.run_workflow(&UserTable::from(table), &contents, |orchestrator| {
            orchestrator.table::<TileMatrixSet>().insert(&tile_matrix_set)
        })?;
        info!(
            table = %table_name,
            contents_srs_id,
            tile_matrix_set_srs_id,
            "Created tile table"
        );
        Ok(created)
    }

    fn resolve_srs(&self, srs_id: SrsId) -> GpkgResult<SpatialReferenceSystem> {
        self.srs(srs_id)?
            .ok_or_else(|| ReferenceError::SrsNotFound { srs_id }.into())
    }

    fn check_unused(&self, table_name: &str) -> GpkgResult<()> {
        validate_user_table_name(table_name)?;
        if self.engine.table_exists(table_name)? {
            return Err(AlreadyExistsError::Table {
                table_name: table_name.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Create the user table, then the contents row, then the descriptor.
    /// A failure after the table exists rolls back and, if the table
    /// survived, deletes it quietly before returning the original error.
    fn run_workflow<T>(
        &self,
        table: &UserTable,
        contents: &Contents,
        descriptor: impl FnOnce(&Self) -> GpkgResult<T>,
    ) -> GpkgResult<T> {
        let table_name = table.table_name();
        let transactional = self.engine.supports_transactions();
        if transactional {
            self.engine.begin()?;
        }

        if let Err(err) = self.provisioner().create_user_table(table) {
            if transactional {
                self.rollback_quietly(table_name);
            }
            return Err(err);
        }

        let written = self
            .table::<Contents>()
            .insert(contents)
            .and_then(|_| descriptor(self))
            .and_then(|value| {
                if transactional {
                    self.engine.commit()?;
                }
                Ok(value)
            });

        match written {
            Ok(value) => Ok(value),
            Err(err) => {
                warn!(table = %table_name, error = %err, "Table creation failed, cleaning up");
                if transactional {
                    self.rollback_quietly(table_name);
                }
                if self.engine.table_exists(table_name).unwrap_or(true) {
                    self.delete_table_quietly(table_name);
                }
                Err(err.in_workflow(table_name))
            }
        }
    }

    fn rollback_quietly(&self, table_name: &str) {
        if let Err(err) = self.engine.rollback() {
            warn!(table = %table_name, error = %err, "Rollback failed");
        }
    }

    // === Listing & deletion ===

    /// Feature tables named in the geometry-columns catalog. Empty when that
    /// catalog table was never provisioned.
    pub fn list_feature_tables(&self) -> GpkgResult<Vec<String>> {
        self.list_descriptor_tables::<GeometryColumns>()
    }

    /// Tile tables named in the tile-matrix-set catalog. Empty when that
    /// catalog table was never provisioned.
    pub fn list_tile_tables(&self) -> GpkgResult<Vec<String>> {
        self.list_descriptor_tables::<TileMatrixSet>()
    }

    fn list_descriptor_tables<R: CatalogRow>(&self) -> GpkgResult<Vec<String>> {
        let store = self.table::<R>();
        if !store.exists_table()? {
            return Ok(Vec::new());
        }
        store.query_table_names()
    }

    /// Every user table registered in contents.
    pub fn list_tables(&self) -> GpkgResult<Vec<String>> {
        let store = self.table::<Contents>();
        if !store.exists_table()? {
            return Ok(Vec::new());
        }
        store.query_table_names()
    }

    /// User tables present in storage with no contents row.
    pub fn orphan_tables(&self) -> GpkgResult<Vec<String>> {
        let registered: Vec<String> = self
            .list_tables()?
            .into_iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();
        Ok(self
            .engine
            .list_tables()?
            .into_iter()
            .filter(|name| validate_user_table_name(name).is_ok())
            .filter(|name| !registered.contains(&name.to_ascii_lowercase()))
            .collect())
    }

    /// Remove the contents row of `table_name`, every catalog row depending
    /// on it, and the user table itself. Catalog tables cannot be deleted.
    ///
    /// The name matches without regard to ASCII case, as storage does; the
    /// catalog rows are removed under the name they were registered with.
    pub fn delete_table(&self, table_name: &str) -> GpkgResult<()> {
        validate_user_table_name(table_name)?;
        self.engine.transaction(|engine| {
            let stored_name = CatalogOrchestrator::new(engine).registered_name(table_name)?;
            let contents_removed =
                CatalogTable::<E, Contents>::new(engine).delete_cascade(&stored_name)?;
            let table_dropped = if engine.table_exists(&stored_name)? {
                Provisioner::new(engine).drop_user_table(&stored_name)?;
                true
            } else {
                false
            };
            info!(
                table = %stored_name,
                contents_removed,
                table_dropped,
                "Deleted table"
            );
            Ok(())
        })
    }

    /// The spelling `table_name` was registered under in contents or a
    /// descriptor table, or `table_name` itself when it is unregistered.
    fn registered_name(&self, table_name: &str) -> GpkgResult<String> {
        let mut registered = self.list_tables()?;
        registered.extend(self.list_feature_tables()?);
        registered.extend(self.list_tile_tables()?);
        Ok(registered
            .into_iter()
            .find(|name| name.eq_ignore_ascii_case(table_name))
            .unwrap_or_else(|| table_name.to_string()))
    }

    /// `delete_table` for cleanup paths: failures are logged and dropped.
    pub fn delete_table_quietly(&self, table_name: &str) {
        if let Err(err) = self.delete_table(table_name) {
            warn!(table = %table_name, error = %err, "Quiet table deletion failed");
        }
    }

    // === Lookups ===

    pub fn contents(&self, table_name: &str) -> GpkgResult<Option<Contents>> {
        self.lookup::<Contents>(&table_name.to_string())
    }

    pub fn srs(&self, srs_id: SrsId) -> GpkgResult<Option<SpatialReferenceSystem>> {
        self.lookup::<SpatialReferenceSystem>(&srs_id)
    }

    pub fn tile_matrix_set(&self, table_name: &str) -> GpkgResult<Option<TileMatrixSet>> {
        self.lookup::<TileMatrixSet>(&table_name.to_string())
    }

    pub fn geometry_columns(&self, table_name: &str) -> GpkgResult<Vec<GeometryColumns>> {
        self.lookup_for_table::<GeometryColumns>(table_name)
    }

    pub fn tile_matrices(&self, table_name: &str) -> GpkgResult<Vec<TileMatrix>> {
        self.lookup_for_table::<TileMatrix>(table_name)
    }

    pub fn data_columns(&self, table_name: &str) -> GpkgResult<Vec<DataColumns>> {
        self.lookup_for_table::<DataColumns>(table_name)
    }

    pub fn extensions(&self) -> GpkgResult<Vec<Extensions>> {
        let store = self.table::<Extensions>();
        if !store.exists_table()? {
            return Ok(Vec::new());
        }
        store.query_all()
    }

    fn lookup<R: CatalogRow>(&self, key: &R::Key) -> GpkgResult<Option<R>> {
        let store = self.table::<R>();
        if !store.exists_table()? {
            return Ok(None);
        }
        store.get(key)
    }

    fn lookup_for_table<R: CatalogRow>(&self, table_name: &str) -> GpkgResult<Vec<R>> {
        let store = self.table::<R>();
        if !store.exists_table()? {
            return Ok(Vec::new());
        }
        store.query_for_table_name(table_name)
    }

    // === Supplementary writes ===

    pub fn create_srs(&self, srs: &SpatialReferenceSystem) -> GpkgResult<SpatialReferenceSystem> {
        self.ensure_catalog_table(CatalogTableKind::SpatialReferenceSystem)?;
        let created = self.table::<SpatialReferenceSystem>().insert(srs)?;
        self.mirror_row::<_, SpatialReferenceSystemSqlMm>(&created)?;
        self.mirror_row::<_, SpatialReferenceSystemSfSql>(&created)?;
        debug!(srs_id = created.srs_id, name = %created.srs_name, "Created spatial reference system");
        Ok(created)
    }

    /// Provision a bare feature table with no catalog rows.
    pub fn create_feature_table(&self, table: &FeatureTable) -> GpkgResult<()> {
        self.provisioner()
            .create_user_table(&UserTable::Feature(table.clone()))
    }

    /// Provision a bare tile table with no catalog rows.
    pub fn create_tile_table(&self, table: &TileTable) -> GpkgResult<()> {
        self.provisioner()
            .create_user_table(&UserTable::Tile(table.clone()))
    }

    /// Add a zoom level to an existing tile matrix set.
    pub fn create_tile_matrix(&self, tile_matrix: &TileMatrix) -> GpkgResult<TileMatrix> {
        if self.tile_matrix_set(&tile_matrix.table_name)?.is_none() {
            return Err(ReferenceError::TileMatrixSetNotFound {
                table_name: tile_matrix.table_name.clone(),
            }
            .into());
        }
        self.ensure_catalog_table(CatalogTableKind::TileMatrix)?;
        self.table::<TileMatrix>().insert(tile_matrix)
    }

    pub fn create_data_columns(&self, data_columns: &DataColumns) -> GpkgResult<DataColumns> {
        if self.contents(&data_columns.table_name)?.is_none() {
            return Err(ReferenceError::ContentsNotFound {
                table_name: data_columns.table_name.clone(),
            }
            .into());
        }
        self.ensure_catalog_table(CatalogTableKind::DataColumns)?;
        self.table::<DataColumns>().insert(data_columns)
    }

    pub fn create_data_column_constraints(
        &self,
        constraints: &DataColumnConstraints,
    ) -> GpkgResult<DataColumnConstraints> {
        self.ensure_catalog_table(CatalogTableKind::DataColumnConstraints)?;
        self.table::<DataColumnConstraints>().insert(constraints)
    }

    /// Store a metadata document, returning it with its assigned id.
    pub fn create_metadata(&self, metadata: &Metadata) -> GpkgResult<Metadata> {
        self.ensure_catalog_table(CatalogTableKind::Metadata)?;
        self.table::<Metadata>().insert(metadata)
    }

    pub fn create_metadata_reference(
        &self,
        reference: &MetadataReference,
    ) -> GpkgResult<MetadataReference> {
        let scope = reference.reference_scope;
        let missing = [
            (scope.requires_table() && reference.table_name.is_none(), "table_name"),
            (scope.requires_column() && reference.column_name.is_none(), "column_name"),
            (scope.requires_row() && reference.row_id_value.is_none(), "row_id_value"),
        ];
        if let Some((_, field)) = missing.iter().find(|(absent, _)| *absent) {
            return Err(SchemaError::InvalidValue {
                field: field.to_string(),
                reason: format!("required for reference scope {}", scope),
            }
            .into());
        }

        let ids = std::iter::once(reference.md_file_id).chain(reference.md_parent_id);
        for id in ids {
            if self.lookup::<Metadata>(&id)?.is_none() {
                return Err(ReferenceError::MetadataNotFound { id }.into());
            }
        }
        self.ensure_catalog_table(CatalogTableKind::MetadataReference)?;
        self.table::<MetadataReference>().insert(reference)
    }

    /// Record an extension. Registering the same key twice returns the
    /// existing row.
    pub fn register_extension(&self, extension: Extensions) -> GpkgResult<Extensions> {
        self.ensure_catalog_table(CatalogTableKind::Extensions)?;
        let store = self.table::<Extensions>();
        if let Some(existing) = store.get(&extension.key())? {
            debug!(extension = %existing.extension_name, "Extension already registered");
            return Ok(existing);
        }
        if extension.author().is_none() {
            warn!(
                extension = %extension.extension_name,
                expected_author = GEOPACKAGE_EXTENSION_AUTHOR,
                "Extension name has no author prefix"
            );
        }
        store.insert(&extension)
    }
}
