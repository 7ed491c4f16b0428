//! Enum types for catalog rows

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error when parsing an enum from its stored string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumParseError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for EnumParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {}: {}", self.kind, self.value)
    }
}

impl std::error::Error for EnumParseError {}

/// Implements `as_db_str`, `from_db_str`, `Display` and `FromStr` for an enum
/// whose variants map one-to-one onto stored strings. Parsing ignores ASCII case.
macro_rules! db_str_enum {
    ($type:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $type {
            /// Convert to database string representation.
            pub fn as_db_str(&self) -> &'static str {
                match self {
                    $($type::$variant => $text,)+
                }
            }

            /// Parse from database string representation.
            pub fn from_db_str(s: &str) -> Result<Self, EnumParseError> {
                $(
                    if s.eq_ignore_ascii_case($text) {
                        return Ok($type::$variant);
                    }
                )+
                Err(EnumParseError {
                    kind: $kind,
                    value: s.to_string(),
                })
            }

            /// All variants in declaration order.
            pub fn all() -> &'static [$type] {
                &[$($type::$variant),+]
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_db_str())
            }
        }

        impl FromStr for $type {
            type Err = EnumParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_db_str(s)
            }
        }
    };
}

// ============================================================================
// CATALOG TABLE KINDS
// ============================================================================

/// Every catalog table the container format defines.
///
/// Core kinds are created on demand by `ensure_catalog_table`. Variant kinds are
/// alternate-schema views of the SRS and geometry-column catalogs; they are only
/// materialized by an explicit create and fail strict access when absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogTableKind {
    SpatialReferenceSystem,
    SpatialReferenceSystemSqlMm,
    SpatialReferenceSystemSfSql,
    Contents,
    GeometryColumns,
    GeometryColumnsSqlMm,
    GeometryColumnsSfSql,
    TileMatrixSet,
    TileMatrix,
    DataColumns,
    DataColumnConstraints,
    Metadata,
    MetadataReference,
    Extensions,
}

db_str_enum!(CatalogTableKind, "catalog table", {
    SpatialReferenceSystem => "gpkg_spatial_ref_sys",
    SpatialReferenceSystemSqlMm => "st_spatial_ref_sys",
    SpatialReferenceSystemSfSql => "spatial_ref_sys",
    Contents => "gpkg_contents",
    GeometryColumns => "gpkg_geometry_columns",
    GeometryColumnsSqlMm => "st_geometry_columns",
    GeometryColumnsSfSql => "geometry_columns",
    TileMatrixSet => "gpkg_tile_matrix_set",
    TileMatrix => "gpkg_tile_matrix",
    DataColumns => "gpkg_data_columns",
    DataColumnConstraints => "gpkg_data_column_constraints",
    Metadata => "gpkg_metadata",
    MetadataReference => "gpkg_metadata_reference",
    Extensions => "gpkg_extensions",
});

impl CatalogTableKind {
    /// Name of the table in storage.
    pub fn table_name(&self) -> &'static str {
        self.as_db_str()
    }

    /// Alternate-schema variants are validated, never silently created.
    pub fn is_variant(&self) -> bool {
        matches!(
            self,
            CatalogTableKind::SpatialReferenceSystemSqlMm
                | CatalogTableKind::SpatialReferenceSystemSfSql
                | CatalogTableKind::GeometryColumnsSqlMm
                | CatalogTableKind::GeometryColumnsSfSql
        )
    }

    /// Tables every container is bootstrapped with.
    pub fn is_bootstrap(&self) -> bool {
        matches!(
            self,
            CatalogTableKind::SpatialReferenceSystem | CatalogTableKind::Contents
        )
    }

    /// Extension registered when a variant table is materialized.
    pub fn extension_name(&self) -> Option<&'static str> {
        match self {
            CatalogTableKind::SpatialReferenceSystemSqlMm
            | CatalogTableKind::GeometryColumnsSqlMm => Some("gpkg_sql_mm"),
            CatalogTableKind::SpatialReferenceSystemSfSql
            | CatalogTableKind::GeometryColumnsSfSql => Some("gpkg_sf_sql"),
            _ => None,
        }
    }

    /// Look up the kind that owns a storage table name.
    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.table_name().eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// CONTENTS
// ============================================================================

/// Data type of a user table registered in contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentsDataType {
    Features,
    Tiles,
}

db_str_enum!(ContentsDataType, "contents data type", {
    Features => "features",
    Tiles => "tiles",
});

// ============================================================================
// GEOMETRY
// ============================================================================

/// Geometry type names allowed in geometry-column descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
    CircularString,
    CompoundCurve,
    CurvePolygon,
    MultiCurve,
    MultiSurface,
    Curve,
    Surface,
}

db_str_enum!(GeometryType, "geometry type", {
    Geometry => "GEOMETRY",
    Point => "POINT",
    LineString => "LINESTRING",
    Polygon => "POLYGON",
    MultiPoint => "MULTIPOINT",
    MultiLineString => "MULTILINESTRING",
    MultiPolygon => "MULTIPOLYGON",
    GeometryCollection => "GEOMETRYCOLLECTION",
    CircularString => "CIRCULARSTRING",
    CompoundCurve => "COMPOUNDCURVE",
    CurvePolygon => "CURVEPOLYGON",
    MultiCurve => "MULTICURVE",
    MultiSurface => "MULTISURFACE",
    Curve => "CURVE",
    Surface => "SURFACE",
});

impl GeometryType {
    /// SQL/MM geometry type name, e.g. `ST_POLYGON`.
    pub fn sql_mm_name(&self) -> String {
        format!("ST_{}", self.as_db_str())
    }

    /// SF/SQL integer geometry type code.
    pub fn sf_sql_code(&self) -> i64 {
        match self {
            GeometryType::Geometry => 0,
            GeometryType::Point => 1,
            GeometryType::LineString => 2,
            GeometryType::Polygon => 3,
            GeometryType::MultiPoint => 4,
            GeometryType::MultiLineString => 5,
            GeometryType::MultiPolygon => 6,
            GeometryType::GeometryCollection => 7,
            GeometryType::CircularString => 8,
            GeometryType::CompoundCurve => 9,
            GeometryType::CurvePolygon => 10,
            GeometryType::MultiCurve => 11,
            GeometryType::MultiSurface => 12,
            GeometryType::Curve => 13,
            GeometryType::Surface => 14,
        }
    }
}

/// Whether z or m values are prohibited, mandatory, or optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DimensionFlag {
    #[default]
    Prohibited,
    Mandatory,
    Optional,
}

impl DimensionFlag {
    pub fn as_i64(&self) -> i64 {
        match self {
            DimensionFlag::Prohibited => 0,
            DimensionFlag::Mandatory => 1,
            DimensionFlag::Optional => 2,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self, EnumParseError> {
        match value {
            0 => Ok(DimensionFlag::Prohibited),
            1 => Ok(DimensionFlag::Mandatory),
            2 => Ok(DimensionFlag::Optional),
            other => Err(EnumParseError {
                kind: "dimension flag",
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Kind of a data column constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataColumnConstraintType {
    Range,
    Enum,
    Glob,
}

db_str_enum!(DataColumnConstraintType, "data column constraint type", {
    Range => "range",
    Enum => "enum",
    Glob => "glob",
});

// ============================================================================
// METADATA
// ============================================================================

/// Scope of a metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MetadataScope {
    #[default]
    Undefined,
    FieldSession,
    CollectionSession,
    Series,
    Dataset,
    FeatureType,
    Feature,
    AttributeType,
    Attribute,
    Tile,
    Model,
    Catalog,
    Schema,
    Taxonomy,
    Software,
    Service,
    CollectionHardware,
    NonGeographicDataset,
    DimensionGroup,
}

db_str_enum!(MetadataScope, "metadata scope", {
    Undefined => "undefined",
    FieldSession => "fieldSession",
    CollectionSession => "collectionSession",
    Series => "series",
    Dataset => "dataset",
    FeatureType => "featureType",
    Feature => "feature",
    AttributeType => "attributeType",
    Attribute => "attribute",
    Tile => "tile",
    Model => "model",
    Catalog => "catalog",
    Schema => "schema",
    Taxonomy => "taxonomy",
    Software => "software",
    Service => "service",
    CollectionHardware => "collectionHardware",
    NonGeographicDataset => "nonGeographicDataset",
    DimensionGroup => "dimensionGroup",
});

/// What a metadata reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferenceScope {
    GeoPackage,
    Table,
    Column,
    Row,
    RowCol,
}

db_str_enum!(ReferenceScope, "reference scope", {
    GeoPackage => "geopackage",
    Table => "table",
    Column => "column",
    Row => "row",
    RowCol => "row/col",
});

impl ReferenceScope {
    /// Whether the reference must name a table.
    pub fn requires_table(&self) -> bool {
        !matches!(self, ReferenceScope::GeoPackage)
    }

    /// Whether the reference must name a column.
    pub fn requires_column(&self) -> bool {
        matches!(self, ReferenceScope::Column | ReferenceScope::RowCol)
    }

    /// Whether the reference must name a row id.
    pub fn requires_row(&self) -> bool {
        matches!(self, ReferenceScope::Row | ReferenceScope::RowCol)
    }
}

// ============================================================================
// EXTENSIONS
// ============================================================================

/// Whether an extension affects reads or only writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExtensionScope {
    #[default]
    ReadWrite,
    WriteOnly,
}

db_str_enum!(ExtensionScope, "extension scope", {
    ReadWrite => "read-write",
    WriteOnly => "write-only",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_table_kind_names_round_trip() {
        for kind in CatalogTableKind::all() {
            assert_eq!(CatalogTableKind::from_table_name(kind.table_name()), Some(*kind));
        }
        assert_eq!(CatalogTableKind::from_table_name("parks"), None);
        assert_eq!(
            CatalogTableKind::from_table_name("GPKG_Contents"),
            Some(CatalogTableKind::Contents)
        );
    }

    #[test]
    fn test_variant_kinds_have_extensions() {
        for kind in CatalogTableKind::all() {
            assert_eq!(kind.is_variant(), kind.extension_name().is_some());
        }
        assert!(!CatalogTableKind::Contents.is_variant());
        assert!(CatalogTableKind::Contents.is_bootstrap());
        assert!(!CatalogTableKind::GeometryColumns.is_bootstrap());
    }

    #[test]
    fn test_geometry_type_parse_is_case_insensitive() {
        assert_eq!("polygon".parse::<GeometryType>(), Ok(GeometryType::Polygon));
        assert_eq!(GeometryType::Polygon.to_string(), "POLYGON");
        assert_eq!(GeometryType::Polygon.sql_mm_name(), "ST_POLYGON");
        assert!("hexagon".parse::<GeometryType>().is_err());
    }

    #[test]
    fn test_contents_data_type_db_str() {
        assert_eq!(ContentsDataType::Features.as_db_str(), "features");
        assert_eq!(ContentsDataType::from_db_str("TILES"), Ok(ContentsDataType::Tiles));
    }

    #[test]
    fn test_dimension_flag_codes() {
        for flag in [
            DimensionFlag::Prohibited,
            DimensionFlag::Mandatory,
            DimensionFlag::Optional,
        ] {
            assert_eq!(DimensionFlag::from_i64(flag.as_i64()), Ok(flag));
        }
        let err = DimensionFlag::from_i64(3).unwrap_err();
        assert_eq!(err.to_string(), "Invalid dimension flag: 3");
    }

    #[test]
    fn test_reference_scope_requirements() {
        assert!(!ReferenceScope::GeoPackage.requires_table());
        assert!(ReferenceScope::RowCol.requires_column());
        assert!(ReferenceScope::RowCol.requires_row());
        assert!(!ReferenceScope::Table.requires_row());
        assert_eq!(ReferenceScope::from_db_str("row/col"), Ok(ReferenceScope::RowCol));
    }
}
