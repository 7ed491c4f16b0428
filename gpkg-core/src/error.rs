//! Error types for GeoPackage catalog operations

use crate::CatalogTableKind;
use std::path::PathBuf;
use thiserror::Error;

/// Container open/initialization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpenError {
    #[error("Invalid GeoPackage file extension for {path:?}: expected .gpkg or .gpkx")]
    InvalidExtension { path: PathBuf },

    #[error("GeoPackage file does not exist: {path:?}")]
    FileNotFound { path: PathBuf },

    #[error("Failed to open GeoPackage {path:?}: {reason}")]
    ConnectionFailed { path: PathBuf, reason: String },

    #[error("Failed to initialize GeoPackage catalog: {reason}")]
    BootstrapFailed { reason: String },

    #[error("Not a GeoPackage: application id {found:#010x}")]
    ApplicationIdMismatch { found: u32 },
}

/// Missing or invalid schema objects.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Table or view does not exist for: {kind:?} ({table_name})")]
    MissingCatalogTable {
        kind: CatalogTableKind,
        table_name: String,
    },

    #[error("Invalid user table name '{table_name}': {reason}")]
    InvalidTableName { table_name: String, reason: String },

    #[error("Invalid column definition {table_name}.{column_name}: {reason}")]
    InvalidColumn {
        table_name: String,
        column_name: String,
        reason: String,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Malformed row in {table_name}: column {column_name} {reason}")]
    MalformedRow {
        table_name: String,
        column_name: String,
        reason: String,
    },
}

/// Unresolvable references detected before a dependent write.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("Spatial Reference System could not be found. SRS ID: {srs_id}")]
    SrsNotFound { srs_id: i64 },

    #[error("Contents could not be found for table: {table_name}")]
    ContentsNotFound { table_name: String },

    #[error("Tile Matrix Set could not be found for table: {table_name}")]
    TileMatrixSetNotFound { table_name: String },

    #[error("Metadata could not be found. Metadata ID: {id}")]
    MetadataNotFound { id: i64 },

    #[error("Foreign key violation on {table_name}: {reason}")]
    ForeignKeyViolation { table_name: String, reason: String },
}

/// Storage engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Engine error: {reason}")]
    Engine { reason: String },

    #[error("Table not found: {table_name}")]
    TableNotFound { table_name: String },

    #[error("Insert failed for {table_name}: {reason}")]
    InsertFailed { table_name: String, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Connection closed")]
    Closed,
}

/// Creation collides with an existing table or row.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AlreadyExistsError {
    #[error("Table already exists: {table_name}")]
    Table { table_name: String },

    #[error("Row already exists in {table_name}: {key}")]
    Row { table_name: String, key: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all GeoPackage errors.
#[derive(Debug, Clone, Error)]
pub enum GpkgError {
    #[error("Open error: {0}")]
    Open(#[from] OpenError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Already exists: {0}")]
    AlreadyExists(#[from] AlreadyExistsError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A table-creation workflow failed after the user table was created.
    #[error("Failed to create table and metadata: {table_name}: {source}")]
    Workflow {
        table_name: String,
        #[source]
        source: Box<GpkgError>,
    },
}

impl GpkgError {
    /// Annotate an error with the user table whose workflow failed.
    pub fn in_workflow(self, table_name: impl Into<String>) -> Self {
        GpkgError::Workflow {
            table_name: table_name.into(),
            source: Box::new(self),
        }
    }

    /// The underlying cause, unwrapping any workflow annotation.
    pub fn root(&self) -> &GpkgError {
        match self {
            GpkgError::Workflow { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.root(), GpkgError::Reference(_))
    }

    pub fn is_schema(&self) -> bool {
        matches!(self.root(), GpkgError::Schema(_))
    }

    pub fn is_storage(&self) -> bool {
        matches!(self.root(), GpkgError::Storage(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self.root(), GpkgError::AlreadyExists(_))
    }
}

/// Result type alias for GeoPackage operations.
pub type GpkgResult<T> = Result<T, GpkgError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_error_display_srs_not_found() {
        let err = ReferenceError::SrsNotFound { srs_id: 999999 };
        let msg = format!("{}", err);
        assert!(msg.contains("Spatial Reference System could not be found"));
        assert!(msg.contains("999999"));
    }

    #[test]
    fn test_schema_error_display_missing_catalog_table() {
        let err = SchemaError::MissingCatalogTable {
            kind: CatalogTableKind::GeometryColumnsSqlMm,
            table_name: "st_geometry_columns".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Table or view does not exist"));
        assert!(msg.contains("st_geometry_columns"));
    }

    #[test]
    fn test_open_error_display_application_id() {
        let err = OpenError::ApplicationIdMismatch { found: 0x1234 };
        let msg = format!("{}", err);
        assert!(msg.contains("0x00001234"));
    }

    #[test]
    fn test_workflow_annotation_keeps_root_cause() {
        let err = GpkgError::from(StorageError::InsertFailed {
            table_name: "gpkg_geometry_columns".to_string(),
            reason: "disk full".to_string(),
        })
        .in_workflow("parks");

        let msg = format!("{}", err);
        assert!(msg.contains("Failed to create table and metadata: parks"));
        assert!(msg.contains("disk full"));
        assert!(err.is_storage());
        assert!(matches!(err.root(), GpkgError::Storage(StorageError::InsertFailed { .. })));
    }

    #[test]
    fn test_gpkg_error_from_variants() {
        let open = GpkgError::from(OpenError::BootstrapFailed {
            reason: "x".to_string(),
        });
        assert!(matches!(open, GpkgError::Open(_)));

        let schema = GpkgError::from(SchemaError::InvalidValue {
            field: "min_x".to_string(),
            reason: "nan".to_string(),
        });
        assert!(schema.is_schema());

        let reference = GpkgError::from(ReferenceError::SrsNotFound { srs_id: 1 });
        assert!(reference.is_reference());

        let storage = GpkgError::from(StorageError::LockPoisoned);
        assert!(storage.is_storage());

        let exists = GpkgError::from(AlreadyExistsError::Table {
            table_name: "parks".to_string(),
        });
        assert!(exists.is_already_exists());

        let config = GpkgError::from(ConfigError::Parse {
            reason: "eof".to_string(),
        });
        assert!(matches!(config, GpkgError::Config(_)));
    }
}
