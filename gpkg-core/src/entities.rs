//! Catalog row types
//!
//! One struct per catalog table. These are plain data; cross-table rules live
//! in the catalog orchestrator.

use crate::constants::srs as default_srs;
use crate::{
    BoundingBox, ContentsDataType, DataColumnConstraintType, DimensionFlag, ExtensionScope,
    GeometryType, MetadataScope, ReferenceScope, SrsId, Timestamp,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL REFERENCE SYSTEMS
// ============================================================================

/// A coordinate reference system definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReferenceSystem {
    pub srs_name: String,
    pub srs_id: SrsId,
    pub organization: String,
    pub organization_coordsys_id: i64,
    pub definition: String,
    pub description: Option<String>,
}

impl SpatialReferenceSystem {
    /// The undefined cartesian SRS (id -1).
    pub fn undefined_cartesian() -> Self {
        Self {
            srs_name: "Undefined cartesian SRS".to_string(),
            srs_id: default_srs::UNDEFINED_CARTESIAN_ID,
            organization: default_srs::UNDEFINED_ORGANIZATION.to_string(),
            organization_coordsys_id: default_srs::UNDEFINED_CARTESIAN_ID,
            definition: default_srs::UNDEFINED_DEFINITION.to_string(),
            description: Some("undefined cartesian coordinate reference system".to_string()),
        }
    }

    /// The undefined geographic SRS (id 0).
    pub fn undefined_geographic() -> Self {
        Self {
            srs_name: "Undefined geographic SRS".to_string(),
            srs_id: default_srs::UNDEFINED_GEOGRAPHIC_ID,
            organization: default_srs::UNDEFINED_ORGANIZATION.to_string(),
            organization_coordsys_id: default_srs::UNDEFINED_GEOGRAPHIC_ID,
            definition: default_srs::UNDEFINED_DEFINITION.to_string(),
            description: Some("undefined geographic coordinate reference system".to_string()),
        }
    }

    /// WGS 84 geodetic (EPSG:4326).
    pub fn wgs84() -> Self {
        Self {
            srs_name: "WGS 84 geodetic".to_string(),
            srs_id: default_srs::WGS84_ID,
            organization: default_srs::EPSG_ORGANIZATION.to_string(),
            organization_coordsys_id: default_srs::WGS84_ID,
            definition: default_srs::WGS84_DEFINITION.to_string(),
            description: Some(
                "longitude/latitude coordinates in decimal degrees on the WGS 84 spheroid"
                    .to_string(),
            ),
        }
    }

    /// Rows every new container is seeded with.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::undefined_cartesian(),
            Self::undefined_geographic(),
            Self::wgs84(),
        ]
    }
}

/// SQL/MM view of a spatial reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReferenceSystemSqlMm {
    pub srs_name: String,
    pub srs_id: SrsId,
    pub organization: String,
    pub organization_coordsys_id: i64,
    pub definition: String,
    pub description: Option<String>,
}

impl From<&SpatialReferenceSystem> for SpatialReferenceSystemSqlMm {
    fn from(srs: &SpatialReferenceSystem) -> Self {
        Self {
            srs_name: srs.srs_name.clone(),
            srs_id: srs.srs_id,
            organization: srs.organization.clone(),
            organization_coordsys_id: srs.organization_coordsys_id,
            definition: srs.definition.clone(),
            description: srs.description.clone(),
        }
    }
}

/// SF/SQL view of a spatial reference system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialReferenceSystemSfSql {
    pub srid: SrsId,
    pub auth_name: String,
    pub auth_srid: i64,
    pub srtext: String,
}

impl From<&SpatialReferenceSystem> for SpatialReferenceSystemSfSql {
    fn from(srs: &SpatialReferenceSystem) -> Self {
        Self {
            srid: srs.srs_id,
            auth_name: srs.organization.clone(),
            auth_srid: srs.organization_coordsys_id,
            srtext: srs.definition.clone(),
        }
    }
}

// ============================================================================
// CONTENTS
// ============================================================================

/// The catalog record every user feature or tile table must have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contents {
    pub table_name: String,
    pub data_type: ContentsDataType,
    pub identifier: Option<String>,
    pub description: String,
    pub last_change: Timestamp,
    pub bounding_box: Option<BoundingBox>,
    pub srs_id: Option<SrsId>,
}

impl Contents {
    /// Contents row for a new table, stamped with the current time.
    pub fn new(table_name: impl Into<String>, data_type: ContentsDataType) -> Self {
        let table_name = table_name.into();
        Self {
            identifier: Some(table_name.clone()),
            table_name,
            data_type,
            description: String::new(),
            last_change: Utc::now(),
            bounding_box: None,
            srs_id: None,
        }
    }

    pub fn with_bounds(mut self, bounding_box: BoundingBox, srs_id: SrsId) -> Self {
        self.bounding_box = Some(bounding_box);
        self.srs_id = Some(srs_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// ============================================================================
// GEOMETRY COLUMNS
// ============================================================================

/// Descriptor of a feature table's geometry column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryColumns {
    pub table_name: String,
    pub column_name: String,
    pub geometry_type: GeometryType,
    pub srs_id: SrsId,
    pub z: DimensionFlag,
    pub m: DimensionFlag,
}

impl GeometryColumns {
    /// Descriptor for a new feature table. The SRS id is assigned by the
    /// orchestrator from the owning contents row.
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        geometry_type: GeometryType,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            geometry_type,
            srs_id: default_srs::UNDEFINED_GEOGRAPHIC_ID,
            z: DimensionFlag::Prohibited,
            m: DimensionFlag::Prohibited,
        }
    }

    pub fn with_dimensions(mut self, z: DimensionFlag, m: DimensionFlag) -> Self {
        self.z = z;
        self.m = m;
        self
    }

    /// Coordinate dimension count: 2 plus one for each non-prohibited z/m.
    pub fn coord_dimension(&self) -> i64 {
        let mut dims = 2;
        if self.z != DimensionFlag::Prohibited {
            dims += 1;
        }
        if self.m != DimensionFlag::Prohibited {
            dims += 1;
        }
        dims
    }
}

/// SQL/MM view of a geometry column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryColumnsSqlMm {
    pub table_name: String,
    pub column_name: String,
    pub geometry_type_name: String,
    pub srs_id: SrsId,
}

impl From<&GeometryColumns> for GeometryColumnsSqlMm {
    fn from(gc: &GeometryColumns) -> Self {
        Self {
            table_name: gc.table_name.clone(),
            column_name: gc.column_name.clone(),
            geometry_type_name: gc.geometry_type.sql_mm_name(),
            srs_id: gc.srs_id,
        }
    }
}

/// SF/SQL view of a geometry column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryColumnsSfSql {
    pub f_table_name: String,
    pub f_geometry_column: String,
    pub geometry_type: i64,
    pub coord_dimension: i64,
    pub srid: SrsId,
}

impl From<&GeometryColumns> for GeometryColumnsSfSql {
    fn from(gc: &GeometryColumns) -> Self {
        Self {
            f_table_name: gc.table_name.clone(),
            f_geometry_column: gc.column_name.clone(),
            geometry_type: gc.geometry_type.sf_sql_code(),
            coord_dimension: gc.coord_dimension(),
            srid: gc.srs_id,
        }
    }
}

// ============================================================================
// TILES
// ============================================================================

/// Descriptor of a tile table's grid. Its SRS may differ from the contents SRS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMatrixSet {
    pub table_name: String,
    pub srs_id: SrsId,
    pub bounding_box: BoundingBox,
}

/// Grid dimensions of one zoom level of a tile table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMatrix {
    pub table_name: String,
    pub zoom_level: i64,
    pub matrix_width: i64,
    pub matrix_height: i64,
    pub tile_width: i64,
    pub tile_height: i64,
    pub pixel_x_size: f64,
    pub pixel_y_size: f64,
}

impl TileMatrix {
    /// Derive a zoom level from the tile matrix set extent: pixel sizes follow
    /// from the extent divided across the matrix.
    pub fn for_extent(
        table_name: impl Into<String>,
        zoom_level: i64,
        extent: &BoundingBox,
        matrix_width: i64,
        matrix_height: i64,
        tile_width: i64,
        tile_height: i64,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            zoom_level,
            matrix_width,
            matrix_height,
            tile_width,
            tile_height,
            pixel_x_size: extent.width() / (matrix_width * tile_width) as f64,
            pixel_y_size: extent.height() / (matrix_height * tile_height) as f64,
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Descriptive metadata for one user-table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataColumns {
    pub table_name: String,
    pub column_name: String,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub mime_type: Option<String>,
    pub constraint_name: Option<String>,
}

impl DataColumns {
    pub fn new(table_name: impl Into<String>, column_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            name: None,
            title: None,
            description: None,
            mime_type: None,
            constraint_name: None,
        }
    }
}

/// A named validation rule for data columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataColumnConstraints {
    pub constraint_name: String,
    pub constraint_type: DataColumnConstraintType,
    pub value: Option<String>,
    pub min: Option<f64>,
    pub min_is_inclusive: Option<bool>,
    pub max: Option<f64>,
    pub max_is_inclusive: Option<bool>,
    pub description: Option<String>,
}

// ============================================================================
// METADATA
// ============================================================================

/// A free-form metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Assigned by storage on insert.
    pub id: Option<i64>,
    pub scope: MetadataScope,
    pub standard_uri: String,
    pub mime_type: String,
    pub metadata: String,
}

impl Metadata {
    pub fn new(
        scope: MetadataScope,
        standard_uri: impl Into<String>,
        mime_type: impl Into<String>,
        metadata: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            scope,
            standard_uri: standard_uri.into(),
            mime_type: mime_type.into(),
            metadata: metadata.into(),
        }
    }
}

/// Links a metadata document to the container, a table, a column or a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataReference {
    pub reference_scope: ReferenceScope,
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    pub row_id_value: Option<i64>,
    pub timestamp: Timestamp,
    pub md_file_id: i64,
    pub md_parent_id: Option<i64>,
}

impl MetadataReference {
    /// Container-wide reference to a metadata document.
    pub fn geopackage(md_file_id: i64) -> Self {
        Self {
            reference_scope: ReferenceScope::GeoPackage,
            table_name: None,
            column_name: None,
            row_id_value: None,
            timestamp: Utc::now(),
            md_file_id,
            md_parent_id: None,
        }
    }

    /// Table-scoped reference to a metadata document.
    pub fn table(table_name: impl Into<String>, md_file_id: i64) -> Self {
        Self {
            reference_scope: ReferenceScope::Table,
            table_name: Some(table_name.into()),
            ..Self::geopackage(md_file_id)
        }
    }
}

// ============================================================================
// EXTENSIONS
// ============================================================================

/// Registration of a format extension, container-wide or per table/column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extensions {
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    pub extension_name: String,
    pub definition: String,
    pub scope: ExtensionScope,
}

impl Extensions {
    /// Container-wide extension.
    pub fn container(extension_name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            table_name: None,
            column_name: None,
            extension_name: extension_name.into(),
            definition: definition.into(),
            scope: ExtensionScope::ReadWrite,
        }
    }

    pub fn for_table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn for_column(
        mut self,
        table_name: impl Into<String>,
        column_name: impl Into<String>,
    ) -> Self {
        self.table_name = Some(table_name.into());
        self.column_name = Some(column_name.into());
        self
    }

    /// Author portion of `<author>_<extension>`.
    pub fn author(&self) -> Option<&str> {
        self.extension_name.split_once('_').map(|(author, _)| author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_srs_rows() {
        let ids: Vec<SrsId> = SpatialReferenceSystem::defaults()
            .iter()
            .map(|s| s.srs_id)
            .collect();
        assert_eq!(ids, vec![-1, 0, 4326]);
    }

    #[test]
    fn test_contents_new_uses_table_name_as_identifier() {
        let contents = Contents::new("parks", ContentsDataType::Features);
        assert_eq!(contents.identifier.as_deref(), Some("parks"));
        assert!(contents.bounding_box.is_none());
        assert!(contents.srs_id.is_none());
    }

    #[test]
    fn test_geometry_columns_variants() {
        let gc = GeometryColumns::new("parks", "geom", GeometryType::Polygon)
            .with_dimensions(DimensionFlag::Mandatory, DimensionFlag::Prohibited);
        assert_eq!(gc.coord_dimension(), 3);

        let sql_mm = GeometryColumnsSqlMm::from(&gc);
        assert_eq!(sql_mm.geometry_type_name, "ST_POLYGON");

        let sf_sql = GeometryColumnsSfSql::from(&gc);
        assert_eq!(sf_sql.geometry_type, 3);
        assert_eq!(sf_sql.coord_dimension, 3);
        assert_eq!(sf_sql.f_table_name, "parks");
    }

    #[test]
    fn test_srs_sf_sql_variant() {
        let sf = SpatialReferenceSystemSfSql::from(&SpatialReferenceSystem::wgs84());
        assert_eq!(sf.srid, 4326);
        assert_eq!(sf.auth_name, "EPSG");
    }

    #[test]
    fn test_tile_matrix_pixel_sizes() {
        let extent = BoundingBox::new(-180.0, -90.0, 180.0, 90.0).unwrap();
        let tm = TileMatrix::for_extent("basemap", 0, &extent, 2, 1, 256, 256);
        assert!((tm.pixel_x_size - 360.0 / 512.0).abs() < 1e-12);
        assert!((tm.pixel_y_size - 180.0 / 256.0).abs() < 1e-12);
    }

    #[test]
    fn test_extension_author() {
        let ext = Extensions::container("gpkg_sql_mm", "http://www.geopackage.org/spec");
        assert_eq!(ext.author(), Some("gpkg"));
        assert!(ext.table_name.is_none());
    }
}
