//! Row mappings for every catalog table.
//!
//! `CatalogRow` binds a data-model type to its catalog table: which kind it
//! lives in, how its identity maps to a row filter, and how it converts to
//! and from an engine row. The row store is generic over this trait.

use gpkg_core::{
    format_timestamp, parse_timestamp, BoundingBox, CatalogTableKind, Contents, ContentsDataType,
    DataColumnConstraintType, DataColumnConstraints, DataColumns, DimensionFlag, ExtensionScope,
    Extensions, GeometryColumns, GeometryColumnsSfSql, GeometryColumnsSqlMm, GeometryType,
    GpkgError, GpkgResult, Metadata, MetadataReference, MetadataScope, ReferenceScope,
    SchemaError, SpatialReferenceSystem, SpatialReferenceSystemSfSql,
    SpatialReferenceSystemSqlMm, TileMatrix, TileMatrixSet, Timestamp,
};
use gpkg_storage::{Row, RowFilter, Value};

/// A data-model type stored in one catalog table.
pub trait CatalogRow: Sized + Clone {
    /// Identity used by `CatalogTable::get`.
    type Key;

    const KIND: CatalogTableKind;

    /// Column naming the user table a row belongs to, if the table has one.
    const TABLE_NAME_COLUMN: Option<&'static str>;

    fn key_filter(key: &Self::Key) -> RowFilter;

    fn key(&self) -> Self::Key;

    fn to_row(&self) -> Row;

    fn from_row(row: &Row) -> GpkgResult<Self>;
}

// ============================================================================
// COLUMN READERS
// ============================================================================

/// Typed column access that reports which catalog column was malformed.
struct Reader<'a> {
    table: &'static str,
    row: &'a Row,
}

impl<'a> Reader<'a> {
    fn new(kind: CatalogTableKind, row: &'a Row) -> Self {
        Self {
            table: kind.table_name(),
            row,
        }
    }

    fn malformed(&self, column: &str, reason: impl Into<String>) -> GpkgError {
        SchemaError::MalformedRow {
            table_name: self.table.to_string(),
            column_name: column.to_string(),
            reason: reason.into(),
        }
        .into()
    }

    fn opt_text(&self, column: &str) -> GpkgResult<Option<String>> {
        match self.row.value(column) {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s)),
            other => Err(self.malformed(column, format!("expected text, found {:?}", other))),
        }
    }

    fn text(&self, column: &str) -> GpkgResult<String> {
        self.opt_text(column)?
            .ok_or_else(|| self.malformed(column, "is NULL"))
    }

    fn opt_integer(&self, column: &str) -> GpkgResult<Option<i64>> {
        match self.row.value(column) {
            Value::Null => Ok(None),
            Value::Integer(i) => Ok(Some(i)),
            Value::Real(f) if f.fract() == 0.0 => Ok(Some(f as i64)),
            other => Err(self.malformed(column, format!("expected integer, found {:?}", other))),
        }
    }

    fn integer(&self, column: &str) -> GpkgResult<i64> {
        self.opt_integer(column)?
            .ok_or_else(|| self.malformed(column, "is NULL"))
    }

    fn opt_real(&self, column: &str) -> GpkgResult<Option<f64>> {
        let value = self.row.value(column);
        if value.is_null() {
            return Ok(None);
        }
        value
            .as_f64()
            .map(Some)
            .ok_or_else(|| self.malformed(column, format!("expected real, found {:?}", value)))
    }

    fn real(&self, column: &str) -> GpkgResult<f64> {
        self.opt_real(column)?
            .ok_or_else(|| self.malformed(column, "is NULL"))
    }

    fn opt_bool(&self, column: &str) -> GpkgResult<Option<bool>> {
        Ok(self.opt_integer(column)?.map(|i| i != 0))
    }

    fn timestamp(&self, column: &str) -> GpkgResult<Timestamp> {
        let text = self.text(column)?;
        parse_timestamp(&text)
            .ok_or_else(|| self.malformed(column, format!("unparseable timestamp '{}'", text)))
    }

    fn parsed<T, E: std::fmt::Display>(
        &self,
        column: &str,
        parse: impl FnOnce(&str) -> Result<T, E>,
    ) -> GpkgResult<T> {
        let text = self.text(column)?;
        parse(&text).map_err(|e| self.malformed(column, e.to_string()))
    }

    /// All four bounds, or none. A partial box is malformed.
    fn opt_bbox(&self) -> GpkgResult<Option<BoundingBox>> {
        let bounds = [
            self.opt_real("min_x")?,
            self.opt_real("min_y")?,
            self.opt_real("max_x")?,
            self.opt_real("max_y")?,
        ];
        match bounds {
            [Some(min_x), Some(min_y), Some(max_x), Some(max_y)] => Ok(Some(BoundingBox {
                min_x,
                min_y,
                max_x,
                max_y,
            })),
            [None, None, None, None] => Ok(None),
            _ => Err(self.malformed("min_x", "bounding box is partially NULL")),
        }
    }
}

fn with_bbox(row: Row, bbox: Option<&BoundingBox>) -> Row {
    row.with("min_x", bbox.map(|b| b.min_x))
        .with("min_y", bbox.map(|b| b.min_y))
        .with("max_x", bbox.map(|b| b.max_x))
        .with("max_y", bbox.map(|b| b.max_y))
}

fn table_column_filter(table_name: &str, column_name: &str) -> RowFilter {
    RowFilter::eq("table_name", table_name).and("column_name", column_name)
}

// ============================================================================
// SPATIAL REFERENCE SYSTEMS
// ============================================================================

impl CatalogRow for SpatialReferenceSystem {
    type Key = i64;
    const KIND: CatalogTableKind = CatalogTableKind::SpatialReferenceSystem;
    const TABLE_NAME_COLUMN: Option<&'static str> = None;

    fn key_filter(key: &i64) -> RowFilter {
        RowFilter::eq("srs_id", *key)
    }

    fn key(&self) -> i64 {
        self.srs_id
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("srs_name", self.srs_name.as_str())
            .with("srs_id", self.srs_id)
            .with("organization", self.organization.as_str())
            .with("organization_coordsys_id", self.organization_coordsys_id)
            .with("definition", self.definition.as_str())
            .with("description", self.description.clone())
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            srs_name: r.text("srs_name")?,
            srs_id: r.integer("srs_id")?,
            organization: r.text("organization")?,
            organization_coordsys_id: r.integer("organization_coordsys_id")?,
            definition: r.text("definition")?,
            description: r.opt_text("description")?,
        })
    }
}

impl CatalogRow for SpatialReferenceSystemSqlMm {
    type Key = i64;
    const KIND: CatalogTableKind = CatalogTableKind::SpatialReferenceSystemSqlMm;
    const TABLE_NAME_COLUMN: Option<&'static str> = None;

    fn key_filter(key: &i64) -> RowFilter {
        RowFilter::eq("srs_id", *key)
    }

    fn key(&self) -> i64 {
        self.srs_id
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("srs_name", self.srs_name.as_str())
            .with("srs_id", self.srs_id)
            .with("organization", self.organization.as_str())
            .with("organization_coordsys_id", self.organization_coordsys_id)
            .with("definition", self.definition.as_str())
            .with("description", self.description.clone())
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            srs_name: r.text("srs_name")?,
            srs_id: r.integer("srs_id")?,
            organization: r.text("organization")?,
            organization_coordsys_id: r.integer("organization_coordsys_id")?,
            definition: r.text("definition")?,
            description: r.opt_text("description")?,
        })
    }
}

impl CatalogRow for SpatialReferenceSystemSfSql {
    type Key = i64;
    const KIND: CatalogTableKind = CatalogTableKind::SpatialReferenceSystemSfSql;
    const TABLE_NAME_COLUMN: Option<&'static str> = None;

    fn key_filter(key: &i64) -> RowFilter {
        RowFilter::eq("srid", *key)
    }

    fn key(&self) -> i64 {
        self.srid
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("srid", self.srid)
            .with("auth_name", self.auth_name.as_str())
            .with("auth_srid", self.auth_srid)
            .with("srtext", self.srtext.as_str())
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            srid: r.integer("srid")?,
            auth_name: r.text("auth_name")?,
            auth_srid: r.integer("auth_srid")?,
            srtext: r.text("srtext")?,
        })
    }
}

// ============================================================================
// CONTENTS
// ============================================================================

impl CatalogRow for Contents {
    type Key = String;
    const KIND: CatalogTableKind = CatalogTableKind::Contents;
    const TABLE_NAME_COLUMN: Option<&'static str> = Some("table_name");

    fn key_filter(key: &String) -> RowFilter {
        RowFilter::eq("table_name", key.as_str())
    }

    fn key(&self) -> String {
        self.table_name.clone()
    }

    fn to_row(&self) -> Row {
        let row = Row::new()
            .with("table_name", self.table_name.as_str())
            .with("data_type", self.data_type.as_db_str())
            .with("identifier", self.identifier.clone())
            .with("description", self.description.as_str())
            .with("last_change", format_timestamp(&self.last_change))
            .with("srs_id", self.srs_id);
        with_bbox(row, self.bounding_box.as_ref())
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            table_name: r.text("table_name")?,
            data_type: r.parsed("data_type", ContentsDataType::from_db_str)?,
            identifier: r.opt_text("identifier")?,
            description: r.opt_text("description")?.unwrap_or_default(),
            last_change: r.timestamp("last_change")?,
            bounding_box: r.opt_bbox()?,
            srs_id: r.opt_integer("srs_id")?,
        })
    }
}

// ============================================================================
// GEOMETRY COLUMNS
// ============================================================================

impl CatalogRow for GeometryColumns {
    type Key = (String, String);
    const KIND: CatalogTableKind = CatalogTableKind::GeometryColumns;
    const TABLE_NAME_COLUMN: Option<&'static str> = Some("table_name");

    fn key_filter(key: &(String, String)) -> RowFilter {
        table_column_filter(&key.0, &key.1)
    }

    fn key(&self) -> (String, String) {
        (self.table_name.clone(), self.column_name.clone())
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("table_name", self.table_name.as_str())
            .with("column_name", self.column_name.as_str())
            .with("geometry_type_name", self.geometry_type.as_db_str())
            .with("srs_id", self.srs_id)
            .with("z", self.z.as_i64())
            .with("m", self.m.as_i64())
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        let z = r.integer("z")?;
        let m = r.integer("m")?;
        Ok(Self {
            table_name: r.text("table_name")?,
            column_name: r.text("column_name")?,
            geometry_type: r.parsed("geometry_type_name", GeometryType::from_db_str)?,
            srs_id: r.integer("srs_id")?,
            z: DimensionFlag::from_i64(z).map_err(|e| r.malformed("z", e.to_string()))?,
            m: DimensionFlag::from_i64(m).map_err(|e| r.malformed("m", e.to_string()))?,
        })
    }
}

impl CatalogRow for GeometryColumnsSqlMm {
    type Key = (String, String);
    const KIND: CatalogTableKind = CatalogTableKind::GeometryColumnsSqlMm;
    const TABLE_NAME_COLUMN: Option<&'static str> = Some("table_name");

    fn key_filter(key: &(String, String)) -> RowFilter {
        table_column_filter(&key.0, &key.1)
    }

    fn key(&self) -> (String, String) {
        (self.table_name.clone(), self.column_name.clone())
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("table_name", self.table_name.as_str())
            .with("column_name", self.column_name.as_str())
            .with("geometry_type_name", self.geometry_type_name.as_str())
            .with("srs_id", self.srs_id)
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            table_name: r.text("table_name")?,
            column_name: r.text("column_name")?,
            geometry_type_name: r.text("geometry_type_name")?,
            srs_id: r.integer("srs_id")?,
        })
    }
}

impl CatalogRow for GeometryColumnsSfSql {
    type Key = (String, String);
    const KIND: CatalogTableKind = CatalogTableKind::GeometryColumnsSfSql;
    const TABLE_NAME_COLUMN: Option<&'static str> = Some("f_table_name");

    fn key_filter(key: &(String, String)) -> RowFilter {
        RowFilter::eq("f_table_name", key.0.as_str()).and("f_geometry_column", key.1.as_str())
    }

    fn key(&self) -> (String, String) {
        (self.f_table_name.clone(), self.f_geometry_column.clone())
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("f_table_name", self.f_table_name.as_str())
            .with("f_geometry_column", self.f_geometry_column.as_str())
            .with("geometry_type", self.geometry_type)
            .with("coord_dimension", self.coord_dimension)
            .with("srid", self.srid)
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            f_table_name: r.text("f_table_name")?,
            f_geometry_column: r.text("f_geometry_column")?,
            geometry_type: r.integer("geometry_type")?,
            coord_dimension: r.integer("coord_dimension")?,
            srid: r.integer("srid")?,
        })
    }
}

// ============================================================================
// TILES
// ============================================================================

impl CatalogRow for TileMatrixSet {
    type Key = String;
    const KIND: CatalogTableKind = CatalogTableKind::TileMatrixSet;
    const TABLE_NAME_COLUMN: Option<&'static str> = Some("table_name");

    fn key_filter(key: &String) -> RowFilter {
        RowFilter::eq("table_name", key.as_str())
    }

    fn key(&self) -> String {
        self.table_name.clone()
    }

    fn to_row(&self) -> Row {
        let row = Row::new()
            .with("table_name", self.table_name.as_str())
            .with("srs_id", self.srs_id);
        with_bbox(row, Some(&self.bounding_box))
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            table_name: r.text("table_name")?,
            srs_id: r.integer("srs_id")?,
            bounding_box: r
                .opt_bbox()?
                .ok_or_else(|| r.malformed("min_x", "is NULL"))?,
        })
    }
}

impl CatalogRow for TileMatrix {
    type Key = (String, i64);
    const KIND: CatalogTableKind = CatalogTableKind::TileMatrix;
    const TABLE_NAME_COLUMN: Option<&'static str> = Some("table_name");

    fn key_filter(key: &(String, i64)) -> RowFilter {
        RowFilter::eq("table_name", key.0.as_str()).and("zoom_level", key.1)
    }

    fn key(&self) -> (String, i64) {
        (self.table_name.clone(), self.zoom_level)
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("table_name", self.table_name.as_str())
            .with("zoom_level", self.zoom_level)
            .with("matrix_width", self.matrix_width)
            .with("matrix_height", self.matrix_height)
            .with("tile_width", self.tile_width)
            .with("tile_height", self.tile_height)
            .with("pixel_x_size", self.pixel_x_size)
            .with("pixel_y_size", self.pixel_y_size)
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            table_name: r.text("table_name")?,
            zoom_level: r.integer("zoom_level")?,
            matrix_width: r.integer("matrix_width")?,
            matrix_height: r.integer("matrix_height")?,
            tile_width: r.integer("tile_width")?,
            tile_height: r.integer("tile_height")?,
            pixel_x_size: r.real("pixel_x_size")?,
            pixel_y_size: r.real("pixel_y_size")?,
        })
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

impl CatalogRow for DataColumns {
    type Key = (String, String);
    const KIND: CatalogTableKind = CatalogTableKind::DataColumns;
    const TABLE_NAME_COLUMN: Option<&'static str> = Some("table_name");

    fn key_filter(key: &(String, String)) -> RowFilter {
        table_column_filter(&key.0, &key.1)
    }

    fn key(&self) -> (String, String) {
        (self.table_name.clone(), self.column_name.clone())
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("table_name", self.table_name.as_str())
            .with("column_name", self.column_name.as_str())
            .with("name", self.name.clone())
            .with("title", self.title.clone())
            .with("description", self.description.clone())
            .with("mime_type", self.mime_type.clone())
            .with("constraint_name", self.constraint_name.clone())
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            table_name: r.text("table_name")?,
            column_name: r.text("column_name")?,
            name: r.opt_text("name")?,
            title: r.opt_text("title")?,
            description: r.opt_text("description")?,
            mime_type: r.opt_text("mime_type")?,
            constraint_name: r.opt_text("constraint_name")?,
        })
    }
}

impl CatalogRow for DataColumnConstraints {
    type Key = (String, DataColumnConstraintType, Option<String>);
    const KIND: CatalogTableKind = CatalogTableKind::DataColumnConstraints;
    const TABLE_NAME_COLUMN: Option<&'static str> = None;

    fn key_filter(key: &Self::Key) -> RowFilter {
        RowFilter::eq("constraint_name", key.0.as_str())
            .and("constraint_type", key.1.as_db_str())
            .and("value", key.2.clone())
    }

    fn key(&self) -> Self::Key {
        (
            self.constraint_name.clone(),
            self.constraint_type,
            self.value.clone(),
        )
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("constraint_name", self.constraint_name.as_str())
            .with("constraint_type", self.constraint_type.as_db_str())
            .with("value", self.value.clone())
            .with("min", self.min)
            .with("minIsInclusive", self.min_is_inclusive)
            .with("max", self.max)
            .with("maxIsInclusive", self.max_is_inclusive)
            .with("description", self.description.clone())
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            constraint_name: r.text("constraint_name")?,
            constraint_type: r.parsed("constraint_type", DataColumnConstraintType::from_db_str)?,
            value: r.opt_text("value")?,
            min: r.opt_real("min")?,
            min_is_inclusive: r.opt_bool("minIsInclusive")?,
            max: r.opt_real("max")?,
            max_is_inclusive: r.opt_bool("maxIsInclusive")?,
            description: r.opt_text("description")?,
        })
    }
}

// ============================================================================
// METADATA
// ============================================================================

impl CatalogRow for Metadata {
    type Key = i64;
    const KIND: CatalogTableKind = CatalogTableKind::Metadata;
    const TABLE_NAME_COLUMN: Option<&'static str> = None;

    fn key_filter(key: &i64) -> RowFilter {
        RowFilter::eq("id", *key)
    }

    /// Unsaved documents have no id yet and key as 0, which storage never assigns.
    fn key(&self) -> i64 {
        self.id.unwrap_or_default()
    }

    fn to_row(&self) -> Row {
        let row = Row::new()
            .with("md_scope", self.scope.as_db_str())
            .with("md_standard_uri", self.standard_uri.as_str())
            .with("mime_type", self.mime_type.as_str())
            .with("metadata", self.metadata.as_str());
        match self.id {
            Some(id) => row.with("id", id),
            None => row,
        }
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            id: Some(r.integer("id")?),
            scope: r.parsed("md_scope", MetadataScope::from_db_str)?,
            standard_uri: r.text("md_standard_uri")?,
            mime_type: r.text("mime_type")?,
            metadata: r.text("metadata")?,
        })
    }
}

impl CatalogRow for MetadataReference {
    /// References are looked up by the document they point at.
    type Key = i64;
    const KIND: CatalogTableKind = CatalogTableKind::MetadataReference;
    const TABLE_NAME_COLUMN: Option<&'static str> = Some("table_name");

    fn key_filter(key: &i64) -> RowFilter {
        RowFilter::eq("md_file_id", *key)
    }

    fn key(&self) -> i64 {
        self.md_file_id
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("reference_scope", self.reference_scope.as_db_str())
            .with("table_name", self.table_name.clone())
            .with("column_name", self.column_name.clone())
            .with("row_id_value", self.row_id_value)
            .with("timestamp", format_timestamp(&self.timestamp))
            .with("md_file_id", self.md_file_id)
            .with("md_parent_id", self.md_parent_id)
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            reference_scope: r.parsed("reference_scope", ReferenceScope::from_db_str)?,
            table_name: r.opt_text("table_name")?,
            column_name: r.opt_text("column_name")?,
            row_id_value: r.opt_integer("row_id_value")?,
            timestamp: r.timestamp("timestamp")?,
            md_file_id: r.integer("md_file_id")?,
            md_parent_id: r.opt_integer("md_parent_id")?,
        })
    }
}

// ============================================================================
// EXTENSIONS
// ============================================================================

impl CatalogRow for Extensions {
    type Key = (Option<String>, Option<String>, String);
    const KIND: CatalogTableKind = CatalogTableKind::Extensions;
    const TABLE_NAME_COLUMN: Option<&'static str> = Some("table_name");

    fn key_filter(key: &Self::Key) -> RowFilter {
        RowFilter::eq("table_name", key.0.clone())
            .and("column_name", key.1.clone())
            .and("extension_name", key.2.as_str())
    }

    fn key(&self) -> Self::Key {
        (
            self.table_name.clone(),
            self.column_name.clone(),
            self.extension_name.clone(),
        )
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("table_name", self.table_name.clone())
            .with("column_name", self.column_name.clone())
            .with("extension_name", self.extension_name.as_str())
            .with("definition", self.definition.as_str())
            .with("scope", self.scope.as_db_str())
    }

    fn from_row(row: &Row) -> GpkgResult<Self> {
        let r = Reader::new(Self::KIND, row);
        Ok(Self {
            table_name: r.opt_text("table_name")?,
            column_name: r.opt_text("column_name")?,
            extension_name: r.text("extension_name")?,
            definition: r.text("definition")?,
            scope: r.parsed("scope", ExtensionScope::from_db_str)?,
        })
    }
}
