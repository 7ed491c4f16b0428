//! GeoPackage Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - A fault-injecting storage engine wrapper
//! - Proptest generators for catalog types
//! - Fixtures for the common container scenarios
//! - Assertions over the error taxonomy and table state

pub use gpkg_storage::{MemoryEngine, Row, RowFilter, SqliteEngine, StorageEngine, TableSchema};

pub use gpkg_core::{
    AlreadyExistsError, BoundingBox, CatalogTableKind, ContentsDataType, DimensionFlag,
    GeoPackageConfig, GeometryColumns, GeometryType, GpkgError, GpkgResult, OpenError,
    ReferenceError, SchemaError, SpatialReferenceSystem, SrsId, StorageError,
};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Engine wrapper that fails chosen operations and delegates the rest.
///
/// Faults are configured up front with the builder methods or toggled later
/// through `&self`, so a wrapped engine can be bootstrapped cleanly before the
/// faults are armed.
#[derive(Debug)]
pub struct FaultyEngine<E: StorageEngine> {
    inner: E,
    faults: RwLock<Faults>,
    injected: AtomicUsize,
}

#[derive(Debug, Default, Clone)]
struct Faults {
    insert_into: BTreeSet<String>,
    create: BTreeSet<String>,
    fail_drop: bool,
    fail_commit: bool,
    transactions_disabled: bool,
}

impl<E: StorageEngine> FaultyEngine<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            faults: RwLock::new(Faults::default()),
            injected: AtomicUsize::new(0),
        }
    }

    /// Fail every insert into `table`.
    pub fn failing_inserts_into(self, table: &str) -> Self {
        self.fail_inserts_into(table);
        self
    }

    /// Fail every `drop_table`.
    pub fn failing_drops(self) -> Self {
        self.set_fail_drop(true);
        self
    }

    /// Report no transaction support even if the inner engine has it.
    pub fn without_transactions(self) -> Self {
        self.update(|f| f.transactions_disabled = true);
        self
    }

    pub fn fail_inserts_into(&self, table: &str) {
        self.update(|f| {
            f.insert_into.insert(table.to_ascii_lowercase());
        });
    }

    pub fn fail_create_of(&self, table: &str) {
        self.update(|f| {
            f.create.insert(table.to_ascii_lowercase());
        });
    }

    pub fn set_fail_drop(&self, enabled: bool) {
        self.update(|f| f.fail_drop = enabled);
    }

    pub fn set_fail_commit(&self, enabled: bool) {
        self.update(|f| f.fail_commit = enabled);
    }

    /// Disarm every fault.
    pub fn clear_faults(&self) {
        self.update(|f| *f = Faults {
            transactions_disabled: f.transactions_disabled,
            ..Faults::default()
        });
    }

    /// Number of operations failed so far.
    pub fn injected_faults(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn update(&self, change: impl FnOnce(&mut Faults)) {
        if let Ok(mut faults) = self.faults.write() {
            change(&mut faults);
        }
    }

    fn faults(&self) -> Faults {
        self.faults
            .read()
            .map(|faults| faults.clone())
            .unwrap_or_default()
    }

    fn inject(&self, operation: &str, target: &str) -> GpkgError {
        self.injected.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(operation, target, "Injected storage fault");
        StorageError::Engine {
            reason: format!("injected fault: {} {}", operation, target),
        }
        .into()
    }
}

impl<E: StorageEngine> StorageEngine for FaultyEngine<E> {
    fn table_exists(&self, name: &str) -> GpkgResult<bool> {
        self.inner.table_exists(name)
    }

    fn list_tables(&self) -> GpkgResult<Vec<String>> {
        self.inner.list_tables()
    }

    fn create_table(&self, schema: &TableSchema) -> GpkgResult<()> {
        if self.faults().create.contains(&schema.name.to_ascii_lowercase()) {
            return Err(self.inject("create", &schema.name));
        }
        self.inner.create_table(schema)
    }

    fn drop_table(&self, name: &str) -> GpkgResult<()> {
        if self.faults().fail_drop {
            return Err(self.inject("drop", name));
        }
        self.inner.drop_table(name)
    }

    fn insert_row(&self, table: &str, row: &Row) -> GpkgResult<Row> {
        if self.faults().insert_into.contains(&table.to_ascii_lowercase()) {
            return Err(self.inject("insert", table));
        }
        self.inner.insert_row(table, row)
    }

    fn query_rows(&self, table: &str, filter: &RowFilter) -> GpkgResult<Vec<Row>> {
        self.inner.query_rows(table, filter)
    }

    fn delete_rows(&self, table: &str, filter: &RowFilter) -> GpkgResult<usize> {
        self.inner.delete_rows(table, filter)
    }

    fn supports_transactions(&self) -> bool {
        !self.faults().transactions_disabled && self.inner.supports_transactions()
    }

    fn begin(&self) -> GpkgResult<()> {
        self.inner.begin()
    }

    fn commit(&self) -> GpkgResult<()> {
        if self.faults().fail_commit {
            return Err(self.inject("commit", "transaction"));
        }
        self.inner.commit()
    }

    fn rollback(&self) -> GpkgResult<()> {
        self.inner.rollback()
    }

    fn close(&self) -> GpkgResult<()> {
        self.inner.close()
    }

    fn application_id(&self) -> GpkgResult<Option<u32>> {
        self.inner.application_id()
    }

    fn set_application_id(&self, id: u32) -> GpkgResult<()> {
        self.inner.set_application_id(id)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalog types.

    use super::*;
    use proptest::prelude::*;

    /// Table names a caller may legitimately use.
    pub fn arb_user_table_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}".prop_filter("reserved table name", |name| {
            gpkg_core::validate_user_table_name(name).is_ok()
        })
    }

    /// Names the table-name validation must reject.
    pub fn arb_reserved_table_name() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z0-9_]{1,10}".prop_map(|suffix| format!("gpkg_{}", suffix)),
            "[a-z0-9_]{1,10}".prop_map(|suffix| format!("sqlite_{}", suffix)),
            "[a-z0-9_]{1,10}".prop_map(|suffix| format!("GPKG_{}", suffix)),
            Just(String::new()),
            Just("geometry_columns".to_string()),
            Just("spatial_ref_sys".to_string()),
        ]
    }

    pub fn arb_bounding_box() -> impl Strategy<Value = BoundingBox> {
        (
            -180.0f64..180.0,
            -90.0f64..90.0,
            0.0f64..90.0,
            0.0f64..45.0,
        )
            .prop_map(|(min_x, min_y, width, height)| BoundingBox {
                min_x,
                min_y,
                max_x: min_x + width,
                max_y: min_y + height,
            })
    }

    pub fn arb_geometry_type() -> impl Strategy<Value = GeometryType> {
        prop::sample::select(GeometryType::all().to_vec())
    }

    pub fn arb_dimension_flag() -> impl Strategy<Value = DimensionFlag> {
        prop_oneof![
            Just(DimensionFlag::Prohibited),
            Just(DimensionFlag::Mandatory),
            Just(DimensionFlag::Optional),
        ]
    }

    /// SRS ids that never collide with the seeded defaults.
    pub fn arb_srs_id() -> impl Strategy<Value = SrsId> {
        10_000i64..900_000
    }

    pub fn arb_srs() -> impl Strategy<Value = SpatialReferenceSystem> {
        (arb_srs_id(), "[A-Za-z ]{1,24}").prop_map(|(srs_id, name)| SpatialReferenceSystem {
            srs_name: name,
            srs_id,
            organization: "EPSG".to_string(),
            organization_coordsys_id: srs_id,
            definition: "undefined".to_string(),
            description: None,
        })
    }

    pub fn arb_geometry_columns() -> impl Strategy<Value = GeometryColumns> {
        (
            arb_user_table_name(),
            "[a-z][a-z0-9_]{0,10}".prop_filter("reserved column name", |c| c != "id"),
            arb_geometry_type(),
            arb_dimension_flag(),
            arb_dimension_flag(),
        )
            .prop_map(|(table, column, geometry_type, z, m)| {
                GeometryColumns::new(table, column, geometry_type).with_dimensions(z, m)
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built values for the common container scenarios.

    use super::*;

    /// The (-10, -5, 10, 5) extent used by the feature scenarios.
    pub fn parks_bounds() -> BoundingBox {
        BoundingBox {
            min_x: -10.0,
            min_y: -5.0,
            max_x: 10.0,
            max_y: 5.0,
        }
    }

    /// Web Mercator extent.
    pub fn web_mercator_bounds() -> BoundingBox {
        let edge = 20_037_508.342_789_244;
        BoundingBox {
            min_x: -edge,
            min_y: -edge,
            max_x: edge,
            max_y: edge,
        }
    }

    pub fn web_mercator() -> SpatialReferenceSystem {
        SpatialReferenceSystem {
            srs_name: "WGS 84 / Pseudo-Mercator".to_string(),
            srs_id: 3857,
            organization: "EPSG".to_string(),
            organization_coordsys_id: 3857,
            definition: "PROJCS[\"WGS 84 / Pseudo-Mercator\",AUTHORITY[\"EPSG\",\"3857\"]]"
                .to_string(),
            description: None,
        }
    }

    /// `parks.geom` polygon descriptor.
    pub fn parks_geometry_columns() -> GeometryColumns {
        GeometryColumns::new("parks", "geom", GeometryType::Polygon)
    }

    /// Config for containers in temporary directories.
    pub fn test_config() -> GeoPackageConfig {
        GeoPackageConfig {
            busy_timeout_ms: 1_000,
            ..GeoPackageConfig::default()
        }
    }

    /// Memory engine wrapped for fault injection, with no faults armed.
    pub fn faulty_memory_engine() -> FaultyEngine<MemoryEngine> {
        FaultyEngine::new(MemoryEngine::new())
    }

    /// In-memory SQLite engine wrapped for fault injection.
    pub fn faulty_sqlite_engine() -> GpkgResult<FaultyEngine<SqliteEngine>> {
        Ok(FaultyEngine::new(SqliteEngine::open_in_memory(&test_config())?))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over the error taxonomy and table state.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &GpkgResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_reference_error<T: std::fmt::Debug>(result: &GpkgResult<T>) {
        match result {
            Err(err) if err.is_reference() => {}
            other => panic!("Expected Reference error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_srs_not_found<T: std::fmt::Debug>(result: &GpkgResult<T>, srs_id: SrsId) {
        match result.as_ref().map_err(GpkgError::root) {
            Err(GpkgError::Reference(ReferenceError::SrsNotFound { srs_id: found })) => {
                assert_eq!(*found, srs_id, "Wrong SRS id in SrsNotFound error");
            }
            other => panic!("Expected SrsNotFound({}), got: {:?}", srs_id, other),
        }
    }

    #[track_caller]
    pub fn assert_schema_error<T: std::fmt::Debug>(result: &GpkgResult<T>) {
        match result {
            Err(err) if err.is_schema() => {}
            other => panic!("Expected Schema error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &GpkgResult<T>) {
        match result {
            Err(err) if err.is_storage() => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_already_exists<T: std::fmt::Debug>(result: &GpkgResult<T>) {
        match result {
            Err(err) if err.is_already_exists() => {}
            other => panic!("Expected AlreadyExists error, got: {:?}", other),
        }
    }

    /// Assert a workflow failure annotated with `table_name`.
    #[track_caller]
    pub fn assert_workflow_error<T: std::fmt::Debug>(result: &GpkgResult<T>, table_name: &str) {
        match result {
            Err(GpkgError::Workflow { table_name: name, .. }) => {
                assert_eq!(name, table_name, "Wrong table in workflow error");
            }
            other => panic!("Expected Workflow error for {}, got: {:?}", table_name, other),
        }
    }

    #[track_caller]
    pub fn assert_table_exists<E: StorageEngine>(engine: &E, table_name: &str) {
        assert!(
            engine.table_exists(table_name).unwrap_or(false),
            "Expected table {} to exist",
            table_name
        );
    }

    #[track_caller]
    pub fn assert_table_absent<E: StorageEngine>(engine: &E, table_name: &str) {
        assert!(
            !engine.table_exists(table_name).unwrap_or(true),
            "Expected table {} to be absent",
            table_name
        );
    }

    #[track_caller]
    pub fn assert_bbox_eq(actual: &BoundingBox, expected: &BoundingBox) {
        assert_eq!(
            (actual.min_x, actual.min_y, actual.max_x, actual.max_y),
            (expected.min_x, expected.min_y, expected.max_x, expected.max_y),
            "Bounding boxes differ"
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
