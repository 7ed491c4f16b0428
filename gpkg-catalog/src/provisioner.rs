//! Catalog table provisioner.
//!
//! Owns the fixed DDL of every catalog table and turns caller-supplied user
//! table definitions into storage DDL.

use tracing::{debug, info};

use gpkg_core::{
    validate_user_table_name, AlreadyExistsError, CatalogTableKind, GpkgResult, UserTable,
};
use gpkg_storage::{ColumnDef, ColumnDefault, ForeignKey, StorageEngine, TableSchema};

const SRS_TABLE: &str = "gpkg_spatial_ref_sys";
const CONTENTS_TABLE: &str = "gpkg_contents";
const METADATA_TABLE: &str = "gpkg_metadata";

fn bbox_columns(schema: TableSchema, not_null: bool) -> TableSchema {
    ["min_x", "min_y", "max_x", "max_y"]
        .into_iter()
        .fold(schema, |schema, name| {
            let column = ColumnDef::new(name, "DOUBLE");
            schema.column(if not_null { column.not_null() } else { column })
        })
}

fn srs_columns(schema: TableSchema) -> TableSchema {
    schema
        .column(ColumnDef::new("srs_name", "TEXT").not_null())
        .column(ColumnDef::new("srs_id", "INTEGER").primary_key())
        .column(ColumnDef::new("organization", "TEXT").not_null())
        .column(ColumnDef::new("organization_coordsys_id", "INTEGER").not_null())
        .column(ColumnDef::new("definition", "TEXT").not_null())
        .column(ColumnDef::new("description", "TEXT"))
}

/// Fixed DDL of a catalog table.
pub fn catalog_table_schema(kind: CatalogTableKind) -> TableSchema {
    let schema = TableSchema::new(kind.table_name());
    match kind {
        CatalogTableKind::SpatialReferenceSystem
        | CatalogTableKind::SpatialReferenceSystemSqlMm => srs_columns(schema),

        CatalogTableKind::SpatialReferenceSystemSfSql => schema
            .column(ColumnDef::new("srid", "INTEGER").primary_key())
            .column(ColumnDef::new("auth_name", "TEXT").not_null())
            .column(ColumnDef::new("auth_srid", "INTEGER").not_null())
            .column(ColumnDef::new("srtext", "TEXT").not_null()),

        CatalogTableKind::Contents => {
            let schema = schema
                .column(ColumnDef::new("table_name", "TEXT").primary_key())
                .column(ColumnDef::new("data_type", "TEXT").not_null())
                .column(ColumnDef::new("identifier", "TEXT").unique())
                .column(
                    ColumnDef::new("description", "TEXT")
                        .default(ColumnDefault::Text(String::new())),
                )
                .column(
                    ColumnDef::new("last_change", "DATETIME")
                        .not_null()
                        .default(ColumnDefault::CurrentTimestamp),
                );
            bbox_columns(schema, false)
                .column(ColumnDef::new("srs_id", "INTEGER"))
                .foreign_key(ForeignKey::new("fk_gc_r_srs_id", "srs_id", SRS_TABLE, "srs_id"))
        }

        CatalogTableKind::GeometryColumns => schema
            .column(ColumnDef::new("table_name", "TEXT").not_null())
            .column(ColumnDef::new("column_name", "TEXT").not_null())
            .column(ColumnDef::new("geometry_type_name", "TEXT").not_null())
            .column(ColumnDef::new("srs_id", "INTEGER").not_null())
            .column(ColumnDef::new("z", "TINYINT").not_null())
            .column(ColumnDef::new("m", "TINYINT").not_null())
            .primary_key(&["table_name", "column_name"])
            .unique(&["table_name"])
            .foreign_key(ForeignKey::new(
                "fk_gc_tn",
                "table_name",
                CONTENTS_TABLE,
                "table_name",
            ))
            .foreign_key(ForeignKey::new("fk_gc_srs", "srs_id", SRS_TABLE, "srs_id"))
            .check("z IN (0, 1, 2)")
            .check("m IN (0, 1, 2)"),

        CatalogTableKind::GeometryColumnsSqlMm => schema
            .column(ColumnDef::new("table_name", "TEXT").not_null())
            .column(ColumnDef::new("column_name", "TEXT").not_null())
            .column(ColumnDef::new("geometry_type_name", "TEXT").not_null())
            .column(ColumnDef::new("srs_id", "INTEGER").not_null())
            .primary_key(&["table_name", "column_name"]),

        CatalogTableKind::GeometryColumnsSfSql => schema
            .column(ColumnDef::new("f_table_name", "TEXT").not_null())
            .column(ColumnDef::new("f_geometry_column", "TEXT").not_null())
            .column(ColumnDef::new("geometry_type", "INTEGER").not_null())
            .column(ColumnDef::new("coord_dimension", "INTEGER").not_null())
            .column(ColumnDef::new("srid", "INTEGER").not_null())
            .primary_key(&["f_table_name", "f_geometry_column"]),

        CatalogTableKind::TileMatrixSet => {
            let schema = schema
                .column(ColumnDef::new("table_name", "TEXT").primary_key())
                .column(ColumnDef::new("srs_id", "INTEGER").not_null());
            bbox_columns(schema, true)
                .foreign_key(ForeignKey::new(
                    "fk_gtms_table_name",
                    "table_name",
                    CONTENTS_TABLE,
                    "table_name",
                ))
                .foreign_key(ForeignKey::new("fk_gtms_srs", "srs_id", SRS_TABLE, "srs_id"))
        }

        CatalogTableKind::TileMatrix => schema
            .column(ColumnDef::new("table_name", "TEXT").not_null())
            .column(ColumnDef::new("zoom_level", "INTEGER").not_null())
            .column(ColumnDef::new("matrix_width", "INTEGER").not_null())
            .column(ColumnDef::new("matrix_height", "INTEGER").not_null())
            .column(ColumnDef::new("tile_width", "INTEGER").not_null())
            .column(ColumnDef::new("tile_height", "INTEGER").not_null())
            .column(ColumnDef::new("pixel_x_size", "DOUBLE").not_null())
            .column(ColumnDef::new("pixel_y_size", "DOUBLE").not_null())
            .primary_key(&["table_name", "zoom_level"])
            .foreign_key(ForeignKey::new(
                "fk_tmm_table_name",
                "table_name",
                CONTENTS_TABLE,
                "table_name",
            ))
            .check("zoom_level >= 0")
            .check("matrix_width >= 1 AND matrix_height >= 1")
            .check("tile_width >= 1 AND tile_height >= 1")
            .check("pixel_x_size > 0 AND pixel_y_size > 0"),

        CatalogTableKind::DataColumns => schema
            .column(ColumnDef::new("table_name", "TEXT").not_null())
            .column(ColumnDef::new("column_name", "TEXT").not_null())
            .column(ColumnDef::new("name", "TEXT"))
            .column(ColumnDef::new("title", "TEXT"))
            .column(ColumnDef::new("description", "TEXT"))
            .column(ColumnDef::new("mime_type", "TEXT"))
            .column(ColumnDef::new("constraint_name", "TEXT"))
            .primary_key(&["table_name", "column_name"])
            .foreign_key(ForeignKey::new(
                "fk_gdc_tn",
                "table_name",
                CONTENTS_TABLE,
                "table_name",
            )),

        CatalogTableKind::DataColumnConstraints => schema
            .column(ColumnDef::new("constraint_name", "TEXT").not_null())
            .column(ColumnDef::new("constraint_type", "TEXT").not_null())
            .column(ColumnDef::new("value", "TEXT"))
            .column(ColumnDef::new("min", "NUMERIC"))
            .column(ColumnDef::new("minIsInclusive", "BOOLEAN"))
            .column(ColumnDef::new("max", "NUMERIC"))
            .column(ColumnDef::new("maxIsInclusive", "BOOLEAN"))
            .column(ColumnDef::new("description", "TEXT"))
            .unique(&["constraint_name", "constraint_type", "value"]),

        CatalogTableKind::Metadata => schema
            .column(ColumnDef::new("id", "INTEGER").primary_key().autoincrement())
            .column(
                ColumnDef::new("md_scope", "TEXT")
                    .not_null()
                    .default(ColumnDefault::Text("dataset".to_string())),
            )
            .column(ColumnDef::new("md_standard_uri", "TEXT").not_null())
            .column(
                ColumnDef::new("mime_type", "TEXT")
                    .not_null()
                    .default(ColumnDefault::Text("text/xml".to_string())),
            )
            .column(
                ColumnDef::new("metadata", "TEXT")
                    .not_null()
                    .default(ColumnDefault::Text(String::new())),
            ),

        CatalogTableKind::MetadataReference => schema
            .column(ColumnDef::new("reference_scope", "TEXT").not_null())
            .column(ColumnDef::new("table_name", "TEXT"))
            .column(ColumnDef::new("column_name", "TEXT"))
            .column(ColumnDef::new("row_id_value", "INTEGER"))
            .column(
                ColumnDef::new("timestamp", "DATETIME")
                    .not_null()
                    .default(ColumnDefault::CurrentTimestamp),
            )
            .column(ColumnDef::new("md_file_id", "INTEGER").not_null())
            .column(ColumnDef::new("md_parent_id", "INTEGER"))
            .foreign_key(ForeignKey::new("crmr_mfi_fk", "md_file_id", METADATA_TABLE, "id"))
            .foreign_key(ForeignKey::new("crmr_mpi_fk", "md_parent_id", METADATA_TABLE, "id")),

        CatalogTableKind::Extensions => schema
            .column(ColumnDef::new("table_name", "TEXT"))
            .column(ColumnDef::new("column_name", "TEXT"))
            .column(ColumnDef::new("extension_name", "TEXT").not_null())
            .column(ColumnDef::new("definition", "TEXT").not_null())
            .column(ColumnDef::new("scope", "TEXT").not_null())
            .unique(&["table_name", "column_name", "extension_name"]),
    }
}

/// DDL for a caller-defined feature or tile table.
pub fn user_table_schema(table: &UserTable) -> TableSchema {
    let mut columns: Vec<_> = table.columns().iter().collect();
    columns.sort_by_key(|c| c.index);

    let mut schema = TableSchema::new(table.table_name());
    for column in columns {
        let mut def = ColumnDef::new(column.name.as_str(), column.data_type.sql_name());
        if column.primary_key {
            def = def.primary_key().autoincrement();
        } else if column.not_null {
            def = def.not_null();
        }
        if let Some(literal) = &column.default_value {
            def = def.default(ColumnDefault::Literal(literal.clone()));
        }
        schema = schema.column(def);
    }
    schema.unique.extend(table.unique_constraints());
    schema
}

/// Creates catalog tables on demand and user tables on request.
pub struct Provisioner<'a, E: StorageEngine> {
    engine: &'a E,
}

impl<'a, E: StorageEngine> Provisioner<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self { engine }
    }

    /// Create the catalog table for `kind` if it does not exist yet.
    /// Returns whether it was created.
    pub fn ensure_catalog_table(&self, kind: CatalogTableKind) -> GpkgResult<bool> {
        if self.engine.table_exists(kind.table_name())? {
            debug!(table = kind.table_name(), "Catalog table already present");
            return Ok(false);
        }
        self.engine.create_table(&catalog_table_schema(kind))?;
        info!(table = kind.table_name(), "Created catalog table");
        Ok(true)
    }

    /// Issue the DDL for a user table. The name must be valid and unused.
    pub fn create_user_table(&self, table: &UserTable) -> GpkgResult<()> {
        let name = table.table_name();
        validate_user_table_name(name)?;
        if self.engine.table_exists(name)? {
            return Err(AlreadyExistsError::Table {
                table_name: name.to_string(),
            }
            .into());
        }
        self.engine.create_table(&user_table_schema(table))?;
        info!(table = %name, columns = table.columns().len(), "Created user table");
        Ok(())
    }

    pub fn drop_user_table(&self, table_name: &str) -> GpkgResult<()> {
        self.engine.drop_table(table_name)?;
        info!(table = %table_name, "Dropped user table");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpkg_core::{FeatureTable, GeometryType, TileTable};
    use gpkg_storage::{MemoryEngine, Row, SqliteEngine};

    #[test]
    fn test_ensure_is_idempotent() {
        let engine = MemoryEngine::new();
        let provisioner = Provisioner::new(&engine);
        assert!(provisioner
            .ensure_catalog_table(CatalogTableKind::SpatialReferenceSystem)
            .unwrap());
        assert!(!provisioner
            .ensure_catalog_table(CatalogTableKind::SpatialReferenceSystem)
            .unwrap());
        assert_eq!(engine.list_tables().unwrap().len(), 1);
    }

    #[test]
    fn test_every_catalog_schema_is_valid_sqlite() {
        let engine = SqliteEngine::open_in_memory(&Default::default()).unwrap();
        let provisioner = Provisioner::new(&engine);
        for kind in CatalogTableKind::all() {
            assert!(provisioner.ensure_catalog_table(*kind).unwrap(), "{kind}");
        }
        assert_eq!(engine.list_tables().unwrap().len(), CatalogTableKind::all().len());
    }

    #[test]
    fn test_feature_table_schema() {
        let table = FeatureTable::with_geometry("parks", "geom", GeometryType::Polygon).unwrap();
        let schema = user_table_schema(&table.into());
        let sql = schema.to_create_sql();
        assert!(sql.contains("\"id\" INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL"));
        assert!(sql.contains("\"geom\" POLYGON"));
        assert!(!sql.contains("\"geom\" POLYGON NOT NULL"));
    }

    #[test]
    fn test_tile_table_schema_enforces_unique_tiles() {
        let engine = MemoryEngine::new();
        let provisioner = Provisioner::new(&engine);
        let table = TileTable::with_required_columns("basemap").unwrap();
        provisioner.create_user_table(&table.into()).unwrap();

        let tile = Row::new()
            .with("zoom_level", 0i64)
            .with("tile_column", 0i64)
            .with("tile_row", 0i64)
            .with("tile_data", vec![1u8, 2, 3]);
        engine.insert_row("basemap", &tile).unwrap();
        assert!(engine
            .insert_row("basemap", &tile)
            .unwrap_err()
            .is_already_exists());
    }

    #[test]
    fn test_create_user_table_collision() {
        let engine = MemoryEngine::new();
        let provisioner = Provisioner::new(&engine);
        let table: UserTable = FeatureTable::with_geometry("parks", "geom", GeometryType::Point)
            .unwrap()
            .into();
        provisioner.create_user_table(&table).unwrap();
        assert!(provisioner
            .create_user_table(&table)
            .unwrap_err()
            .is_already_exists());
    }

    #[test]
    fn test_drop_user_table() {
        let engine = MemoryEngine::new();
        let provisioner = Provisioner::new(&engine);
        let table: UserTable = TileTable::with_required_columns("basemap").unwrap().into();
        provisioner.create_user_table(&table).unwrap();
        provisioner.drop_user_table("basemap").unwrap();
        assert!(!engine.table_exists("basemap").unwrap());
        assert!(provisioner.drop_user_table("basemap").is_err());
    }
}
