//! Container handle.
//!
//! `GeoPackage` owns one storage engine for its lifetime. Opening bootstraps
//! the SRS and contents catalog tables and checks the application id; every
//! other catalog operation delegates to a `CatalogOrchestrator`.

use std::path::Path;

use tracing::{debug, info};

use gpkg_core::{
    constants::{GEOPACKAGE_EXTENDED_EXTENSION, GEOPACKAGE_EXTENSION},
    BoundingBox, CatalogTableKind, Contents, DataColumnConstraints, DataColumns, Extensions,
    FeatureTable, GeoPackageConfig, GeometryColumns, GpkgError, GpkgResult, Metadata,
    MetadataReference, OpenError, SpatialReferenceSystem, SrsId, TileMatrix, TileMatrixSet,
    TileTable, UserColumn,
};
use gpkg_storage::{MemoryEngine, SqliteEngine, StorageEngine};

use crate::orchestrator::CatalogOrchestrator;
use crate::row_store::CatalogTable;
use crate::rows::CatalogRow;

/// An open GeoPackage container.
#[derive(Debug)]
pub struct GeoPackage<E: StorageEngine> {
    engine: E,
    config: GeoPackageConfig,
}

impl GeoPackage<SqliteEngine> {
    /// Open or create a container file with default options.
    pub fn open(path: impl AsRef<Path>) -> GpkgResult<Self> {
        Self::open_with_config(path, GeoPackageConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: GeoPackageConfig) -> GpkgResult<Self> {
        config.validate()?;
        let path = path.as_ref();
        if config.require_extension && !has_container_extension(path) {
            return Err(OpenError::InvalidExtension {
                path: path.to_path_buf(),
            }
            .into());
        }
        let engine = SqliteEngine::open(path, &config)?;
        let package = Self::with_engine(engine, config)?;
        info!(path = %path.display(), "Opened GeoPackage");
        Ok(package)
    }
}

impl GeoPackage<MemoryEngine> {
    /// Transient container backed by the in-memory engine.
    pub fn open_in_memory() -> GpkgResult<Self> {
        let config = GeoPackageConfig::default();
        let engine = MemoryEngine::new().with_foreign_keys(config.foreign_keys);
        Self::with_engine(engine, config)
    }
}

fn has_container_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ext.eq_ignore_ascii_case(GEOPACKAGE_EXTENSION)
                || ext.eq_ignore_ascii_case(GEOPACKAGE_EXTENDED_EXTENSION)
        })
        .unwrap_or(false)
}

impl<E: StorageEngine> GeoPackage<E> {
    /// Wrap an already-open engine and bootstrap the minimal catalog.
    pub fn with_engine(engine: E, config: GeoPackageConfig) -> GpkgResult<Self> {
        config.validate()?;
        let package = Self { engine, config };
        package.bootstrap()?;
        Ok(package)
    }

    fn bootstrap(&self) -> GpkgResult<()> {
        self.check_application_id()?;
        self.engine
            .transaction(|engine| {
                let orchestrator = CatalogOrchestrator::new(engine);
                orchestrator.ensure_catalog_table(CatalogTableKind::SpatialReferenceSystem)?;
                orchestrator.ensure_catalog_table(CatalogTableKind::Contents)?;
                if self.config.seed_default_srs {
                    for srs in SpatialReferenceSystem::defaults() {
                        if orchestrator.srs(srs.srs_id)?.is_none() {
                            orchestrator.create_srs(&srs)?;
                        }
                    }
                }
                Ok(())
            })
            .map_err(|err| match err {
                GpkgError::Open(open) => GpkgError::Open(open),
                other => OpenError::BootstrapFailed {
                    reason: other.to_string(),
                }
                .into(),
            })
    }

    fn check_application_id(&self) -> GpkgResult<()> {
        let expected = self.config.application_id;
        match self.engine.application_id()? {
            Some(0) => {
                self.engine.set_application_id(expected)?;
                debug!(application_id = expected, "Stamped application id");
                Ok(())
            }
            Some(found) if found != expected => {
                Err(OpenError::ApplicationIdMismatch { found }.into())
            }
            _ => Ok(()),
        }
    }

    /// Release the engine connection.
    pub fn close(self) -> GpkgResult<()> {
        self.engine.close()?;
        debug!("Closed GeoPackage");
        Ok(())
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &GeoPackageConfig {
        &self.config
    }

    fn orchestrator(&self) -> CatalogOrchestrator<'_, E> {
        CatalogOrchestrator::new(&self.engine)
    }

    // === Catalog tables ===

    pub fn ensure_catalog_table(&self, kind: CatalogTableKind) -> GpkgResult<bool> {
        self.orchestrator().ensure_catalog_table(kind)
    }

    pub fn catalog_table<R: CatalogRow>(&self) -> GpkgResult<CatalogTable<'_, E, R>> {
        self.orchestrator().catalog_table()
    }

    pub fn create_variant_table(&self, kind: CatalogTableKind) -> GpkgResult<bool> {
        self.orchestrator().create_variant_table(kind)
    }

    pub fn create_geometry_columns_table(&self) -> GpkgResult<bool> {
        self.ensure_catalog_table(CatalogTableKind::GeometryColumns)
    }

    pub fn create_tile_matrix_set_table(&self) -> GpkgResult<bool> {
        self.ensure_catalog_table(CatalogTableKind::TileMatrixSet)
    }

    pub fn create_tile_matrix_table(&self) -> GpkgResult<bool> {
        self.ensure_catalog_table(CatalogTableKind::TileMatrix)
    }

    pub fn create_data_columns_table(&self) -> GpkgResult<bool> {
        self.ensure_catalog_table(CatalogTableKind::DataColumns)
    }

    pub fn create_data_column_constraints_table(&self) -> GpkgResult<bool> {
        self.ensure_catalog_table(CatalogTableKind::DataColumnConstraints)
    }

    pub fn create_metadata_table(&self) -> GpkgResult<bool> {
        self.ensure_catalog_table(CatalogTableKind::Metadata)
    }

    pub fn create_metadata_reference_table(&self) -> GpkgResult<bool> {
        self.ensure_catalog_table(CatalogTableKind::MetadataReference)
    }

    pub fn create_extensions_table(&self) -> GpkgResult<bool> {
        self.ensure_catalog_table(CatalogTableKind::Extensions)
    }

    // === User tables ===

    pub fn create_feature_table_with_metadata(
        &self,
        geometry_columns: GeometryColumns,
        bounding_box: BoundingBox,
        srs_id: SrsId,
    ) -> GpkgResult<GeometryColumns> {
        self.orchestrator()
            .create_feature_table_with_metadata(geometry_columns, bounding_box, srs_id)
    }

    pub fn create_feature_table_with_columns(
        &self,
        geometry_columns: GeometryColumns,
        additional_columns: Vec<UserColumn>,
        bounding_box: BoundingBox,
        srs_id: SrsId,
    ) -> GpkgResult<GeometryColumns> {
        self.orchestrator().create_feature_table_with_columns(
            geometry_columns,
            additional_columns,
            bounding_box,
            srs_id,
        )
    }

    pub fn create_tile_table_with_metadata(
        &self,
        table_name: &str,
        contents_bounding_box: BoundingBox,
        contents_srs_id: SrsId,
        tile_matrix_set_bounding_box: BoundingBox,
        tile_matrix_set_srs_id: SrsId,
    ) -> GpkgResult<TileMatrixSet> {
        self.orchestrator().create_tile_table_with_metadata(
            table_name,
            contents_bounding_box,
            contents_srs_id,
            tile_matrix_set_bounding_box,
            tile_matrix_set_srs_id,
        )
    }

    pub fn create_feature_table(&self, table: &FeatureTable) -> GpkgResult<()> {
        self.orchestrator().create_feature_table(table)
    }

    pub fn create_tile_table(&self, table: &TileTable) -> GpkgResult<()> {
        self.orchestrator().create_tile_table(table)
    }

    pub fn list_feature_tables(&self) -> GpkgResult<Vec<String>> {
        self.orchestrator().list_feature_tables()
    }

    pub fn list_tile_tables(&self) -> GpkgResult<Vec<String>> {
        self.orchestrator().list_tile_tables()
    }

    pub fn list_tables(&self) -> GpkgResult<Vec<String>> {
        self.orchestrator().list_tables()
    }

    pub fn orphan_tables(&self) -> GpkgResult<Vec<String>> {
        self.orchestrator().orphan_tables()
    }

    pub fn delete_table(&self, table_name: &str) -> GpkgResult<()> {
        self.orchestrator().delete_table(table_name)
    }

    /// Best-effort deletion. Never fails; use `delete_table` when the
    /// outcome matters.
    pub fn delete_table_quietly(&self, table_name: &str) {
        self.orchestrator().delete_table_quietly(table_name)
    }

    // === Catalog rows ===

    pub fn contents(&self, table_name: &str) -> GpkgResult<Option<Contents>> {
        self.orchestrator().contents(table_name)
    }

    pub fn geometry_columns(&self, table_name: &str) -> GpkgResult<Vec<GeometryColumns>> {
        self.orchestrator().geometry_columns(table_name)
    }

    pub fn tile_matrix_set(&self, table_name: &str) -> GpkgResult<Option<TileMatrixSet>> {
        self.orchestrator().tile_matrix_set(table_name)
    }

    pub fn tile_matrices(&self, table_name: &str) -> GpkgResult<Vec<TileMatrix>> {
        self.orchestrator().tile_matrices(table_name)
    }

    pub fn data_columns(&self, table_name: &str) -> GpkgResult<Vec<DataColumns>> {
        self.orchestrator().data_columns(table_name)
    }

    pub fn extensions(&self) -> GpkgResult<Vec<Extensions>> {
        self.orchestrator().extensions()
    }

    pub fn srs(&self, srs_id: SrsId) -> GpkgResult<Option<SpatialReferenceSystem>> {
        self.orchestrator().srs(srs_id)
    }

    pub fn create_srs(&self, srs: &SpatialReferenceSystem) -> GpkgResult<SpatialReferenceSystem> {
        self.orchestrator().create_srs(srs)
    }

    pub fn create_tile_matrix(&self, tile_matrix: &TileMatrix) -> GpkgResult<TileMatrix> {
        self.orchestrator().create_tile_matrix(tile_matrix)
    }

    pub fn create_data_columns(&self, data_columns: &DataColumns) -> GpkgResult<DataColumns> {
        self.orchestrator().create_data_columns(data_columns)
    }

    pub fn create_data_column_constraints(
        &self,
        constraints: &DataColumnConstraints,
    ) -> GpkgResult<DataColumnConstraints> {
        self.orchestrator().create_data_column_constraints(constraints)
    }

    pub fn create_metadata(&self, metadata: &Metadata) -> GpkgResult<Metadata> {
        self.orchestrator().create_metadata(metadata)
    }

    pub fn create_metadata_reference(
        &self,
        reference: &MetadataReference,
    ) -> GpkgResult<MetadataReference> {
        self.orchestrator().create_metadata_reference(reference)
    }

    pub fn register_extension(&self, extension: Extensions) -> GpkgResult<Extensions> {
        self.orchestrator().register_extension(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpkg_core::constants::{srs, APPLICATION_ID_VALUE};

    #[test]
    fn test_open_in_memory_seeds_default_srs() {
        let gpkg = GeoPackage::open_in_memory().unwrap();
        for id in [srs::UNDEFINED_CARTESIAN_ID, srs::UNDEFINED_GEOGRAPHIC_ID, srs::WGS84_ID] {
            assert!(gpkg.srs(id).unwrap().is_some(), "missing srs {}", id);
        }
        assert_eq!(
            gpkg.engine().application_id().unwrap(),
            Some(APPLICATION_ID_VALUE)
        );
    }

    #[test]
    fn test_seeding_can_be_disabled() {
        let config = GeoPackageConfig {
            seed_default_srs: false,
            ..GeoPackageConfig::default()
        };
        let gpkg = GeoPackage::with_engine(MemoryEngine::new(), config).unwrap();
        assert!(gpkg.srs(srs::WGS84_ID).unwrap().is_none());
        assert!(gpkg.engine().table_exists("gpkg_contents").unwrap());
    }

    #[test]
    fn test_bootstrap_is_repeatable_on_same_engine() {
        let gpkg = GeoPackage::open_in_memory().unwrap();
        let engine = gpkg.engine;
        let reopened = GeoPackage::with_engine(engine, GeoPackageConfig::default()).unwrap();
        assert_eq!(reopened.engine().row_count("gpkg_spatial_ref_sys").unwrap(), 3);
    }

    #[test]
    fn test_application_id_mismatch() {
        let engine = MemoryEngine::new();
        engine.set_application_id(0x1234).unwrap();
        let err = GeoPackage::with_engine(engine, GeoPackageConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            GpkgError::Open(OpenError::ApplicationIdMismatch { found: 0x1234 })
        ));
    }

    #[test]
    fn test_extension_check() {
        assert!(has_container_extension(Path::new("world.gpkg")));
        assert!(has_container_extension(Path::new("WORLD.GPKX")));
        assert!(!has_container_extension(Path::new("world.sqlite")));
        assert!(!has_container_extension(Path::new("world")));

        let err = GeoPackage::open("world.sqlite").unwrap_err();
        assert!(matches!(err, GpkgError::Open(OpenError::InvalidExtension { .. })));
    }

    #[test]
    fn test_wrappers_provision_catalog_tables() {
        let gpkg = GeoPackage::open_in_memory().unwrap();
        assert!(gpkg.create_extensions_table().unwrap());
        assert!(!gpkg.create_extensions_table().unwrap());
        assert!(gpkg.create_metadata_table().unwrap());
        assert!(gpkg.create_metadata_reference_table().unwrap());
        assert!(gpkg.engine().table_exists("gpkg_metadata_reference").unwrap());
    }
}
