//! Property-Based Tests for Catalog Pairing
//!
//! Property: For any successful table-creation workflow, the user table, its
//! contents row and its descriptor row all exist afterward, and the SRS ids
//! and bounding boxes stored are exactly the ones supplied.
//!
//! Also covers:
//! - Validation failures leave no partial state
//! - Catalog provisioning is idempotent
//! - Listing tolerates catalog tables that were never provisioned
//!
//! Every check runs against both engines.

use gpkg_catalog::GeoPackage;
use gpkg_core::{
    BoundingBox, CatalogTableKind, ContentsDataType, GeometryColumns, GeometryType,
    SpatialReferenceSystem,
};
use gpkg_storage::StorageEngine;
use gpkg_test_utils::{assertions, fixtures, generators};
use proptest::prelude::*;


// ============================================================================
// CHECKS
// ============================================================================

fn check_feature_pairing<E: StorageEngine>(
    gpkg: &GeoPackage<E>,
    geometry_columns: GeometryColumns,
    bbox: BoundingBox,
    srs: &SpatialReferenceSystem,
) {
    gpkg.create_srs(srs).unwrap();
    let table_name = geometry_columns.table_name.clone();
    let created = gpkg
        .create_feature_table_with_metadata(geometry_columns.clone(), bbox, srs.srs_id)
        .unwrap();

    assertions::assert_table_exists(gpkg.engine(), &table_name);

    let contents = gpkg.contents(&table_name).unwrap().unwrap();
    assert_eq!(contents.data_type, ContentsDataType::Features);
    assert_eq!(contents.srs_id, Some(srs.srs_id));
    assertions::assert_bbox_eq(&contents.bounding_box.unwrap(), &bbox);

    let stored = gpkg.geometry_columns(&table_name).unwrap();
    assert_eq!(stored, vec![created.clone()]);
    assert_eq!(created.srs_id, srs.srs_id);
    assert_eq!(created.column_name, geometry_columns.column_name);
    assert_eq!(created.geometry_type, geometry_columns.geometry_type);
    assert_eq!((created.z, created.m), (geometry_columns.z, geometry_columns.m));

    assert_eq!(gpkg.list_feature_tables().unwrap(), vec![table_name]);
    assert!(gpkg.orphan_tables().unwrap().is_empty());
}

fn check_tile_pairing<E: StorageEngine>(
    gpkg: &GeoPackage<E>,
    table_name: &str,
    contents_bbox: BoundingBox,
    matrix_set_bbox: BoundingBox,
) {
    let tile_matrix_set = gpkg
        .create_tile_table_with_metadata(table_name, contents_bbox, 3857, matrix_set_bbox, 4326)
        .unwrap();

    assertions::assert_table_exists(gpkg.engine(), table_name);
    assert_eq!(tile_matrix_set.srs_id, 4326);
    assertions::assert_bbox_eq(&tile_matrix_set.bounding_box, &matrix_set_bbox);
    assert_eq!(
        gpkg.tile_matrix_set(table_name).unwrap(),
        Some(tile_matrix_set)
    );

    let contents = gpkg.contents(table_name).unwrap().unwrap();
    assert_eq!(contents.data_type, ContentsDataType::Tiles);
    assert_eq!(contents.srs_id, Some(3857));
    assertions::assert_bbox_eq(&contents.bounding_box.unwrap(), &contents_bbox);

    assert_eq!(gpkg.list_tile_tables().unwrap(), vec![table_name.to_string()]);
}

fn check_unresolved_srs_has_no_effect<E: StorageEngine>(gpkg: &GeoPackage<E>) {
    let tables_before = gpkg.engine().list_tables().unwrap();

    let result = gpkg.create_feature_table_with_metadata(
        fixtures::parks_geometry_columns(),
        fixtures::parks_bounds(),
        999_999,
    );
    assertions::assert_srs_not_found(&result, 999_999);

    assertions::assert_table_absent(gpkg.engine(), "parks");
    assert!(gpkg.contents("parks").unwrap().is_none());
    assert!(!gpkg.list_feature_tables().unwrap().contains(&"parks".to_string()));
    assert_eq!(gpkg.engine().list_tables().unwrap(), tables_before);

    let result = gpkg.create_tile_table_with_metadata(
        "basemap",
        fixtures::web_mercator_bounds(),
        3857,
        BoundingBox::world(),
        999_999,
    );
    assertions::assert_reference_error(&result);
    assertions::assert_table_absent(gpkg.engine(), "basemap");
    assert!(gpkg.contents("basemap").unwrap().is_none());
}

fn check_ensure_is_idempotent<E: StorageEngine>(gpkg: &GeoPackage<E>) {
    for kind in CatalogTableKind::all()
        .iter()
        .copied()
        .filter(|kind| !kind.is_variant() && !kind.is_bootstrap())
    {
        assert!(gpkg.ensure_catalog_table(kind).unwrap(), "first ensure of {}", kind);
        assert!(!gpkg.ensure_catalog_table(kind).unwrap(), "second ensure of {}", kind);
        assertions::assert_table_exists(gpkg.engine(), kind.table_name());
    }
    assert!(!gpkg.ensure_catalog_table(CatalogTableKind::Contents).unwrap());
}

fn check_listing_on_empty_container<E: StorageEngine>(gpkg: &GeoPackage<E>) {
    assertions::assert_table_absent(gpkg.engine(), "gpkg_geometry_columns");
    assertions::assert_table_absent(gpkg.engine(), "gpkg_tile_matrix_set");
    assert!(gpkg.list_feature_tables().unwrap().is_empty());
    assert!(gpkg.list_tile_tables().unwrap().is_empty());
    assert!(gpkg.list_tables().unwrap().is_empty());
    assert!(gpkg.geometry_columns("parks").unwrap().is_empty());
}

fn check_parks_scenario<E: StorageEngine>(gpkg: &GeoPackage<E>) {
    gpkg.create_feature_table_with_metadata(
        GeometryColumns::new("parks", "geom", GeometryType::Polygon),
        BoundingBox::new(-10.0, -5.0, 10.0, 5.0).unwrap(),
        4326,
    )
    .unwrap();

    assert_eq!(gpkg.list_feature_tables().unwrap(), vec!["parks"]);

    let contents = gpkg.contents("parks").unwrap().unwrap();
    assert_eq!(contents.data_type, ContentsDataType::Features);
    assertions::assert_bbox_eq(&contents.bounding_box.unwrap(), &fixtures::parks_bounds());

    let geometry_columns = gpkg.geometry_columns("parks").unwrap();
    assert_eq!(geometry_columns.len(), 1);
    assert_eq!(geometry_columns[0].column_name, "geom");
    assert_eq!(geometry_columns[0].geometry_type, GeometryType::Polygon);
    assert_eq!(geometry_columns[0].srs_id, 4326);
}

fn check_basemap_scenario<E: StorageEngine>(gpkg: &GeoPackage<E>) {
    gpkg.create_tile_table_with_metadata(
        "basemap",
        fixtures::web_mercator_bounds(),
        3857,
        BoundingBox::world(),
        4326,
    )
    .unwrap();

    assert_eq!(gpkg.tile_matrix_set("basemap").unwrap().unwrap().srs_id, 4326);
    assert_eq!(gpkg.contents("basemap").unwrap().unwrap().srs_id, Some(3857));
    assert_eq!(gpkg.list_tile_tables().unwrap(), vec!["basemap"]);
    assert!(gpkg.list_feature_tables().unwrap().is_empty());
}

fn check_mixed_listing<E: StorageEngine>(gpkg: &GeoPackage<E>) {
    check_parks_scenario(gpkg);
    check_basemap_scenario(gpkg);
    assert_eq!(gpkg.list_tables().unwrap(), vec!["parks", "basemap"]);
}

// ============================================================================
// SCENARIOS
// ============================================================================

macro_rules! scenarios {
    ($name:ident, $open:expr) => {
        mod $name {
            use super::*;

            #[test]
            fn test_parks_feature_table() {
                let (_dir, gpkg) = $open;
                check_parks_scenario(&gpkg);
            }

            #[test]
            fn test_basemap_srs_references_are_independent() {
                let (_dir, gpkg) = $open;
                check_basemap_scenario(&gpkg);
            }

            #[test]
            fn test_unseeded_srs_is_reference_error() {
                let (_dir, gpkg) = $open;
                check_unresolved_srs_has_no_effect(&gpkg);
            }

            #[test]
            fn test_ensure_catalog_table_is_idempotent() {
                let (_dir, gpkg) = $open;
                check_ensure_is_idempotent(&gpkg);
            }

            #[test]
            fn test_listing_on_empty_container() {
                let (_dir, gpkg) = $open;
                check_listing_on_empty_container(&gpkg);
            }

            #[test]
            fn test_mixed_listing() {
                let (_dir, gpkg) = $open;
                check_mixed_listing(&gpkg);
            }
        }
    };
}

scenarios!(memory_engine, ((), test_support::memory_package()));
scenarios!(sqlite_engine, test_support::sqlite_package());

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: successful feature workflows pair table, contents and
    /// geometry-columns rows with the supplied SRS and extent.
    #[test]
    fn prop_feature_pairing_memory(
        geometry_columns in generators::arb_geometry_columns(),
        bbox in generators::arb_bounding_box(),
        srs in generators::arb_srs(),
    ) {
        let gpkg = GeoPackage::open_in_memory().unwrap();
        check_feature_pairing(&gpkg, geometry_columns, bbox, &srs);
    }

    /// Property: the same pairing holds on the SQLite engine, where extents
    /// pass through REAL columns.
    #[test]
    fn prop_feature_pairing_sqlite(
        geometry_columns in generators::arb_geometry_columns(),
        bbox in generators::arb_bounding_box(),
        srs in generators::arb_srs(),
    ) {
        let (_dir, gpkg) = test_support::sqlite_package();
        check_feature_pairing(&gpkg, geometry_columns, bbox, &srs);
    }

    /// Property: tile workflows keep the contents and matrix-set SRS
    /// references independent.
    #[test]
    fn prop_tile_pairing(
        table_name in generators::arb_user_table_name(),
        contents_bbox in generators::arb_bounding_box(),
        matrix_set_bbox in generators::arb_bounding_box(),
    ) {
        let gpkg = test_support::memory_package();
        check_tile_pairing(&gpkg, &table_name, contents_bbox, matrix_set_bbox);
    }

    /// Property: reserved names are rejected before anything is written.
    #[test]
    fn prop_reserved_names_leave_no_trace(name in generators::arb_reserved_table_name()) {
        let gpkg = GeoPackage::open_in_memory().unwrap();
        let tables_before = gpkg.engine().list_tables().unwrap();
        let result = gpkg.create_tile_table_with_metadata(
            &name,
            BoundingBox::world(),
            4326,
            BoundingBox::world(),
            4326,
        );
        assertions::assert_schema_error(&result);
        prop_assert_eq!(gpkg.engine().list_tables().unwrap(), tables_before);
        prop_assert!(gpkg.list_tables().unwrap().is_empty());
    }
}
