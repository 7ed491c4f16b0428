//! User table definitions
//!
//! Caller-facing descriptions of feature and tile tables. The provisioner
//! turns these into storage DDL.

use crate::constants::{tile_columns, CATALOG_TABLE_PREFIX, ENGINE_TABLE_PREFIX, FEATURE_ID_COLUMN};
use crate::{CatalogTableKind, GeometryType, GpkgResult, SchemaError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Column types allowed in user tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnDataType {
    Boolean,
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    Integer,
    Float,
    Double,
    Real,
    Text,
    Blob,
    Date,
    DateTime,
    Geometry(GeometryType),
}

impl ColumnDataType {
    /// Type name used in the table's DDL.
    pub fn sql_name(&self) -> String {
        match self {
            ColumnDataType::Boolean => "BOOLEAN".to_string(),
            ColumnDataType::TinyInt => "TINYINT".to_string(),
            ColumnDataType::SmallInt => "SMALLINT".to_string(),
            ColumnDataType::MediumInt => "MEDIUMINT".to_string(),
            ColumnDataType::Int => "INT".to_string(),
            ColumnDataType::Integer => "INTEGER".to_string(),
            ColumnDataType::Float => "FLOAT".to_string(),
            ColumnDataType::Double => "DOUBLE".to_string(),
            ColumnDataType::Real => "REAL".to_string(),
            ColumnDataType::Text => "TEXT".to_string(),
            ColumnDataType::Blob => "BLOB".to_string(),
            ColumnDataType::Date => "DATE".to_string(),
            ColumnDataType::DateTime => "DATETIME".to_string(),
            ColumnDataType::Geometry(geometry_type) => geometry_type.as_db_str().to_string(),
        }
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self, ColumnDataType::Geometry(_))
    }
}

/// One column of a user table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserColumn {
    pub index: usize,
    pub name: String,
    pub data_type: ColumnDataType,
    pub not_null: bool,
    pub primary_key: bool,
    /// SQL literal used as the column default.
    pub default_value: Option<String>,
}

impl UserColumn {
    pub fn new(
        index: usize,
        name: impl Into<String>,
        data_type: ColumnDataType,
        not_null: bool,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            data_type,
            not_null,
            primary_key: false,
            default_value: None,
        }
    }

    /// Autoincrementing integer primary key.
    pub fn primary_key(index: usize, name: impl Into<String>) -> Self {
        Self {
            primary_key: true,
            not_null: true,
            ..Self::new(index, name, ColumnDataType::Integer, true)
        }
    }

    pub fn geometry(
        index: usize,
        name: impl Into<String>,
        geometry_type: GeometryType,
        not_null: bool,
    ) -> Self {
        Self::new(index, name, ColumnDataType::Geometry(geometry_type), not_null)
    }

    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.default_value = Some(literal.into());
        self
    }
}

/// Reject names that are empty or reserved for catalog or engine tables.
pub fn validate_user_table_name(table_name: &str) -> GpkgResult<()> {
    // Storage resolves names without regard to ASCII case.
    let folded = table_name.to_ascii_lowercase();
    let reason = if table_name.trim().is_empty() {
        Some("must not be empty".to_string())
    } else if folded.starts_with(CATALOG_TABLE_PREFIX) {
        Some(format!("prefix '{}' is reserved", CATALOG_TABLE_PREFIX))
    } else if folded.starts_with(ENGINE_TABLE_PREFIX) {
        Some(format!("prefix '{}' is reserved", ENGINE_TABLE_PREFIX))
    } else if CatalogTableKind::from_table_name(table_name).is_some() {
        Some("names a catalog table".to_string())
    } else if table_name.contains('"') {
        Some("must not contain double quotes".to_string())
    } else {
        None
    };
    match reason {
        Some(reason) => Err(SchemaError::InvalidTableName {
            table_name: table_name.to_string(),
            reason,
        }
        .into()),
        None => Ok(()),
    }
}

fn validate_columns(table_name: &str, columns: &[UserColumn]) -> GpkgResult<()> {
    let invalid = |column: &UserColumn, reason: &str| -> GpkgResult<()> {
        Err(SchemaError::InvalidColumn {
            table_name: table_name.to_string(),
            column_name: column.name.clone(),
            reason: reason.to_string(),
        }
        .into())
    };

    let mut names = HashSet::new();
    for (position, column) in columns.iter().enumerate() {
        if column.name.trim().is_empty() {
            return invalid(column, "name must not be empty");
        }
        if column.name.contains('"') {
            return invalid(column, "name must not contain double quotes");
        }
        if !names.insert(column.name.to_ascii_lowercase()) {
            return invalid(column, "duplicate column name");
        }
        if column.index != position {
            return invalid(column, "column index out of order");
        }
    }

    let primary_keys: Vec<&UserColumn> = columns.iter().filter(|c| c.primary_key).collect();
    if primary_keys.len() != 1 {
        return Err(SchemaError::InvalidValue {
            field: format!("{}.primary_key", table_name),
            reason: format!("expected exactly one primary key, found {}", primary_keys.len()),
        }
        .into());
    }
    if primary_keys[0].data_type != ColumnDataType::Integer {
        return invalid(primary_keys[0], "primary key must be INTEGER");
    }
    Ok(())
}

/// A user feature table: integer primary key plus one geometry column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub table_name: String,
    pub columns: Vec<UserColumn>,
}

impl FeatureTable {
    pub fn new(table_name: impl Into<String>, columns: Vec<UserColumn>) -> GpkgResult<Self> {
        let table_name = table_name.into();
        validate_user_table_name(&table_name)?;
        validate_columns(&table_name, &columns)?;

        let geometry_count = columns.iter().filter(|c| c.data_type.is_geometry()).count();
        if geometry_count != 1 {
            return Err(SchemaError::InvalidValue {
                field: format!("{}.geometry", table_name),
                reason: format!("expected exactly one geometry column, found {}", geometry_count),
            }
            .into());
        }
        Ok(Self {
            table_name,
            columns,
        })
    }

    /// Synthesized `id` primary key plus the named geometry column.
    pub fn with_geometry(
        table_name: impl Into<String>,
        geometry_column: impl Into<String>,
        geometry_type: GeometryType,
    ) -> GpkgResult<Self> {
        Self::new(
            table_name,
            vec![
                UserColumn::primary_key(0, FEATURE_ID_COLUMN),
                UserColumn::geometry(1, geometry_column, geometry_type, false),
            ],
        )
    }

    pub fn geometry_column(&self) -> Option<&UserColumn> {
        self.columns.iter().find(|c| c.data_type.is_geometry())
    }

    pub fn pk_column(&self) -> Option<&UserColumn> {
        self.columns.iter().find(|c| c.primary_key)
    }
}

/// A user tile table with the fixed required column set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileTable {
    pub table_name: String,
    pub columns: Vec<UserColumn>,
}

impl TileTable {
    pub fn new(table_name: impl Into<String>, columns: Vec<UserColumn>) -> GpkgResult<Self> {
        let table_name = table_name.into();
        validate_user_table_name(&table_name)?;
        validate_columns(&table_name, &columns)?;

        for required in Self::required_columns() {
            let present = columns
                .iter()
                .any(|c| c.name == required.name && c.data_type == required.data_type);
            if !present {
                return Err(SchemaError::InvalidColumn {
                    table_name,
                    column_name: required.name,
                    reason: "required tile column missing".to_string(),
                }
                .into());
            }
        }
        Ok(Self {
            table_name,
            columns,
        })
    }

    /// Tile table with exactly the required columns.
    pub fn with_required_columns(table_name: impl Into<String>) -> GpkgResult<Self> {
        Self::new(table_name, Self::required_columns())
    }

    /// `id`, `zoom_level`, `tile_column`, `tile_row`, `tile_data`.
    pub fn required_columns() -> Vec<UserColumn> {
        vec![
            UserColumn::primary_key(0, tile_columns::ID),
            UserColumn::new(1, tile_columns::ZOOM_LEVEL, ColumnDataType::Integer, true),
            UserColumn::new(2, tile_columns::TILE_COLUMN, ColumnDataType::Integer, true),
            UserColumn::new(3, tile_columns::TILE_ROW, ColumnDataType::Integer, true),
            UserColumn::new(4, tile_columns::TILE_DATA, ColumnDataType::Blob, true),
        ]
    }

    /// Each tile position appears at most once.
    pub fn unique_columns() -> Vec<&'static str> {
        vec![
            tile_columns::ZOOM_LEVEL,
            tile_columns::TILE_COLUMN,
            tile_columns::TILE_ROW,
        ]
    }
}

/// Either kind of user table, as handed to the provisioner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UserTable {
    Feature(FeatureTable),
    Tile(TileTable),
}

impl UserTable {
    pub fn table_name(&self) -> &str {
        match self {
            UserTable::Feature(t) => &t.table_name,
            UserTable::Tile(t) => &t.table_name,
        }
    }

    pub fn columns(&self) -> &[UserColumn] {
        match self {
            UserTable::Feature(t) => &t.columns,
            UserTable::Tile(t) => &t.columns,
        }
    }

    /// Column groups that must be unique together.
    pub fn unique_constraints(&self) -> Vec<Vec<String>> {
        match self {
            UserTable::Feature(_) => Vec::new(),
            UserTable::Tile(_) => vec![TileTable::unique_columns()
                .into_iter()
                .map(String::from)
                .collect()],
        }
    }
}

impl From<FeatureTable> for UserTable {
    fn from(table: FeatureTable) -> Self {
        UserTable::Feature(table)
    }
}

impl From<TileTable> for UserTable {
    fn from(table: TileTable) -> Self {
        UserTable::Tile(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_table_names_rejected() {
        assert!(validate_user_table_name("parks").is_ok());
        for name in [
            "",
            "  ",
            "gpkg_parks",
            "GPKG_parks",
            "sqlite_master",
            "SQLITE_x",
            "geometry_columns",
            "Geometry_Columns",
            "a\"b",
        ] {
            let err = validate_user_table_name(name).unwrap_err();
            assert!(err.is_schema(), "{name} should be rejected");
        }
    }

    #[test]
    fn test_feature_table_with_geometry() {
        let table = FeatureTable::with_geometry("parks", "geom", GeometryType::Polygon).unwrap();
        assert_eq!(table.pk_column().unwrap().name, "id");
        let geom = table.geometry_column().unwrap();
        assert_eq!(geom.name, "geom");
        assert_eq!(geom.data_type.sql_name(), "POLYGON");
        assert!(!geom.not_null);
    }

    #[test]
    fn test_feature_table_requires_one_geometry() {
        let err = FeatureTable::new("parks", vec![UserColumn::primary_key(0, "id")]).unwrap_err();
        assert!(err.to_string().contains("exactly one geometry column"));
    }

    #[test]
    fn test_feature_table_rejects_duplicate_columns() {
        let columns = vec![
            UserColumn::primary_key(0, "id"),
            UserColumn::geometry(1, "geom", GeometryType::Point, false),
            UserColumn::new(2, "GEOM", ColumnDataType::Text, false),
        ];
        assert!(FeatureTable::new("parks", columns).is_err());
    }

    #[test]
    fn test_feature_table_rejects_non_integer_pk() {
        let mut pk = UserColumn::primary_key(0, "id");
        pk.data_type = ColumnDataType::Text;
        let columns = vec![pk, UserColumn::geometry(1, "geom", GeometryType::Point, false)];
        assert!(FeatureTable::new("parks", columns).is_err());
    }

    #[test]
    fn test_tile_table_required_columns() {
        let table = TileTable::with_required_columns("basemap").unwrap();
        let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "zoom_level", "tile_column", "tile_row", "tile_data"]);

        let user_table = UserTable::from(table);
        assert_eq!(
            user_table.unique_constraints(),
            vec![vec!["zoom_level".to_string(), "tile_column".to_string(), "tile_row".to_string()]]
        );
    }

    #[test]
    fn test_tile_table_missing_required_column() {
        let mut columns = TileTable::required_columns();
        columns.pop();
        let err = TileTable::new("basemap", columns).unwrap_err();
        assert!(err.to_string().contains("tile_data"));
    }
}
