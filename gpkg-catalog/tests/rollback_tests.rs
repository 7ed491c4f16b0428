//! Rollback Tests for Table-Creation Workflows
//!
//! Property: if a write fails after the user table exists, the table and its
//! contents row are both gone afterward, and the original error is returned
//! annotated with the table name.
//!
//! Exercised three ways:
//! - engine transactions (memory snapshots, SQLite transactional DDL)
//! - compensating cleanup on an engine without transactions
//! - a cleanup that itself fails, leaving a detectable orphan table

use gpkg_catalog::GeoPackage;
use gpkg_core::{BoundingBox, CatalogTableKind, GeometryColumns, GeometryType};
use gpkg_storage::{MemoryEngine, StorageEngine};
use gpkg_test_utils::{assertions, fixtures, generators, FaultyEngine};
use proptest::prelude::*;


fn check_descriptor_failure_leaves_nothing<E: StorageEngine>(
    gpkg: &GeoPackage<FaultyEngine<E>>,
) {
    gpkg.create_geometry_columns_table().unwrap();
    gpkg.engine().fail_inserts_into("gpkg_geometry_columns");

    let result = gpkg.create_feature_table_with_metadata(
        fixtures::parks_geometry_columns(),
        fixtures::parks_bounds(),
        4326,
    );

    assertions::assert_storage_error(&result);
    assertions::assert_workflow_error(&result, "parks");
    assert_eq!(gpkg.engine().injected_faults(), 1);
    assertions::assert_table_absent(gpkg.engine(), "parks");
    assert!(gpkg.contents("parks").unwrap().is_none());
    assert!(gpkg.list_feature_tables().unwrap().is_empty());
    assert!(gpkg.orphan_tables().unwrap().is_empty());

    // Nothing is left behind that would block a retry.
    gpkg.engine().clear_faults();
    gpkg.create_feature_table_with_metadata(
        fixtures::parks_geometry_columns(),
        fixtures::parks_bounds(),
        4326,
    )
    .unwrap();
    assert_eq!(gpkg.list_feature_tables().unwrap(), vec!["parks"]);
}

fn check_tile_descriptor_failure_leaves_nothing<E: StorageEngine>(
    gpkg: &GeoPackage<FaultyEngine<E>>,
) {
    gpkg.engine().fail_inserts_into("gpkg_tile_matrix_set");

    let result = gpkg.create_tile_table_with_metadata(
        "basemap",
        fixtures::web_mercator_bounds(),
        3857,
        BoundingBox::world(),
        4326,
    );

    assertions::assert_workflow_error(&result, "basemap");
    assertions::assert_table_absent(gpkg.engine(), "basemap");
    assert!(gpkg.contents("basemap").unwrap().is_none());
    assert!(gpkg.list_tile_tables().unwrap().is_empty());
}

#[test]
fn test_descriptor_failure_rolls_back_memory_transaction() {
    let gpkg = test_support::package_on(fixtures::faulty_memory_engine());
    assert!(gpkg.engine().supports_transactions());
    check_descriptor_failure_leaves_nothing(&gpkg);
}

#[test]
fn test_descriptor_failure_rolls_back_sqlite_transaction() {
    let gpkg = test_support::package_on(fixtures::faulty_sqlite_engine().unwrap());
    check_descriptor_failure_leaves_nothing(&gpkg);
}

#[test]
fn test_descriptor_failure_cleans_up_without_transactions() {
    let gpkg = test_support::package_on(FaultyEngine::new(MemoryEngine::without_transactions()));
    assert!(!gpkg.engine().supports_transactions());
    check_descriptor_failure_leaves_nothing(&gpkg);
}

#[test]
fn test_descriptor_failure_cleans_up_sqlite_without_transactions() {
    let gpkg =
        test_support::package_on(fixtures::faulty_sqlite_engine().unwrap().without_transactions());
    check_descriptor_failure_leaves_nothing(&gpkg);
}

#[test]
fn test_tile_descriptor_failure_on_each_engine() {
    check_tile_descriptor_failure_leaves_nothing(&test_support::package_on(
        fixtures::faulty_memory_engine(),
    ));
    check_tile_descriptor_failure_leaves_nothing(&test_support::package_on(
        fixtures::faulty_memory_engine().without_transactions(),
    ));
    check_tile_descriptor_failure_leaves_nothing(&test_support::package_on(
        fixtures::faulty_sqlite_engine().unwrap(),
    ));
}

#[test]
fn test_contents_failure_rolls_back() {
    let gpkg = test_support::package_on(fixtures::faulty_memory_engine().without_transactions());
    gpkg.engine().fail_inserts_into("gpkg_contents");

    let result = gpkg.create_feature_table_with_metadata(
        fixtures::parks_geometry_columns(),
        fixtures::parks_bounds(),
        4326,
    );

    assertions::assert_workflow_error(&result, "parks");
    assertions::assert_table_absent(gpkg.engine(), "parks");
}

#[test]
fn test_variant_write_failure_rolls_back() {
    for engine in [
        fixtures::faulty_memory_engine(),
        fixtures::faulty_memory_engine().without_transactions(),
    ] {
        let gpkg = test_support::package_on(engine);
        gpkg.create_variant_table(CatalogTableKind::GeometryColumnsSfSql)
            .unwrap();
        gpkg.engine().fail_inserts_into("geometry_columns");

        let result = gpkg.create_feature_table_with_metadata(
            fixtures::parks_geometry_columns(),
            fixtures::parks_bounds(),
            4326,
        );

        assertions::assert_workflow_error(&result, "parks");
        assertions::assert_table_absent(gpkg.engine(), "parks");
        assert!(gpkg.contents("parks").unwrap().is_none());
        assert!(gpkg.geometry_columns("parks").unwrap().is_empty());
    }
}

#[test]
fn test_commit_failure_rolls_back() {
    let gpkg = test_support::package_on(fixtures::faulty_memory_engine());
    gpkg.engine().set_fail_commit(true);

    let result = gpkg.create_tile_table_with_metadata(
        "basemap",
        fixtures::web_mercator_bounds(),
        3857,
        BoundingBox::world(),
        4326,
    );

    assertions::assert_workflow_error(&result, "basemap");
    gpkg.engine().clear_faults();
    assertions::assert_table_absent(gpkg.engine(), "basemap");
    assert!(gpkg.contents("basemap").unwrap().is_none());
}

#[test]
fn test_user_table_failure_returns_unannotated_error() {
    let gpkg = test_support::package_on(fixtures::faulty_memory_engine());
    gpkg.engine().fail_create_of("parks");

    let result = gpkg.create_feature_table_with_metadata(
        fixtures::parks_geometry_columns(),
        fixtures::parks_bounds(),
        4326,
    );

    assertions::assert_storage_error(&result);
    assert!(!matches!(result, Err(gpkg_core::GpkgError::Workflow { .. })));
    assert!(gpkg.contents("parks").unwrap().is_none());
}

#[test]
fn test_failed_cleanup_leaves_detectable_orphan() {
    let gpkg = test_support::package_on(
        fixtures::faulty_memory_engine()
            .without_transactions()
            .failing_inserts_into("gpkg_geometry_columns")
            .failing_drops(),
    );

    let result = gpkg.create_feature_table_with_metadata(
        fixtures::parks_geometry_columns(),
        fixtures::parks_bounds(),
        4326,
    );

    // The cleanup failure is swallowed; the caller sees the original cause.
    assertions::assert_workflow_error(&result, "parks");
    assertions::assert_storage_error(&result);
    assert_eq!(gpkg.engine().injected_faults(), 2);

    assertions::assert_table_exists(gpkg.engine(), "parks");
    assert!(gpkg.contents("parks").unwrap().is_none());
    assert_eq!(gpkg.orphan_tables().unwrap(), vec!["parks"]);

    // Once drops work again the orphan can be removed.
    gpkg.engine().clear_faults();
    gpkg.delete_table("parks").unwrap();
    assert!(gpkg.orphan_tables().unwrap().is_empty());
}

#[test]
fn test_delete_table_quietly_swallows_failures() {
    let gpkg = test_support::package_on(fixtures::faulty_memory_engine());
    gpkg.create_feature_table_with_metadata(
        fixtures::parks_geometry_columns(),
        fixtures::parks_bounds(),
        4326,
    )
    .unwrap();

    gpkg.engine().set_fail_drop(true);
    assertions::assert_storage_error(&gpkg.delete_table("parks"));
    gpkg.delete_table_quietly("parks");

    // Deletion is transactional, so the failed drop also restored the rows.
    assertions::assert_table_exists(gpkg.engine(), "parks");
    assert!(gpkg.contents("parks").unwrap().is_some());
    assert_eq!(gpkg.list_feature_tables().unwrap(), vec!["parks"]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: whatever the table, a failed descriptor insert never leaves
    /// the user table or its contents row behind.
    #[test]
    fn prop_failed_workflow_leaves_no_table(
        table_name in generators::arb_user_table_name(),
        geometry_type in generators::arb_geometry_type(),
        bbox in generators::arb_bounding_box(),
        transactional in any::<bool>(),
    ) {
        let engine = fixtures::faulty_memory_engine();
        let engine = if transactional { engine } else { engine.without_transactions() };
        let gpkg = test_support::package_on(engine);
        gpkg.engine().fail_inserts_into("gpkg_geometry_columns");

        let result = gpkg.create_feature_table_with_metadata(
            GeometryColumns::new(table_name.clone(), "geom", geometry_type),
            bbox,
            4326,
        );

        prop_assert!(result.is_err());
        prop_assert!(!gpkg.engine().table_exists(&table_name).unwrap());
        prop_assert!(gpkg.contents(&table_name).unwrap().is_none());
        prop_assert!(gpkg.engine().list_tables().unwrap().iter().all(|t| t != &table_name));
    }
}

#[test]
fn test_geometry_type_survives_retry() {
    let gpkg = test_support::package_on(fixtures::faulty_memory_engine());
    gpkg.engine().fail_inserts_into("gpkg_geometry_columns");
    let gc = GeometryColumns::new("roads", "shape", GeometryType::MultiLineString);
    assert!(gpkg
        .create_feature_table_with_metadata(gc.clone(), fixtures::parks_bounds(), 4326)
        .is_err());

    gpkg.engine().clear_faults();
    let created = gpkg
        .create_feature_table_with_metadata(gc, fixtures::parks_bounds(), 4326)
        .unwrap();
    assert_eq!(created.geometry_type, GeometryType::MultiLineString);
}
