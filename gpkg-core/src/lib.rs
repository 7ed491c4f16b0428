//! GeoPackage Core - Catalog Data Types
//!
//! Pure data structures shared by every other crate: catalog rows, enums,
//! user-table definitions, the error taxonomy and configuration.
//! This crate contains no storage access.

pub mod bounding_box;
pub mod config;
pub mod constants;
pub mod entities;
pub mod enums;
pub mod error;
pub mod identity;
pub mod table;

pub use bounding_box::BoundingBox;
pub use config::GeoPackageConfig;
pub use entities::{
    Contents, DataColumnConstraints, DataColumns, Extensions, GeometryColumns,
    GeometryColumnsSfSql, GeometryColumnsSqlMm, Metadata, MetadataReference,
    SpatialReferenceSystem, SpatialReferenceSystemSfSql, SpatialReferenceSystemSqlMm,
    TileMatrix, TileMatrixSet,
};
pub use enums::{
    CatalogTableKind, ContentsDataType, DataColumnConstraintType, DimensionFlag, EnumParseError,
    ExtensionScope, GeometryType, MetadataScope, ReferenceScope,
};
pub use error::{
    AlreadyExistsError, ConfigError, GpkgError, GpkgResult, OpenError, ReferenceError,
    SchemaError, StorageError,
};
pub use identity::{format_timestamp, parse_timestamp, SrsId, Timestamp};
pub use table::{
    validate_user_table_name, ColumnDataType, FeatureTable, TileTable, UserColumn, UserTable,
};
