//! Container format constants

/// File extension of GeoPackage files.
pub const GEOPACKAGE_EXTENSION: &str = "gpkg";

/// File extension of GeoPackage files that use extensions.
pub const GEOPACKAGE_EXTENDED_EXTENSION: &str = "gpkx";

/// Application id written to the SQLite header ("GP10").
pub const APPLICATION_ID: &str = "GP10";

/// `APPLICATION_ID` as the 32-bit big-endian value `PRAGMA application_id` stores.
pub const APPLICATION_ID_VALUE: u32 = u32::from_be_bytes(*b"GP10");

/// Author prefix for extensions defined by the format itself.
pub const GEOPACKAGE_EXTENSION_AUTHOR: &str = GEOPACKAGE_EXTENSION;

/// Prefix reserved for catalog tables.
pub const CATALOG_TABLE_PREFIX: &str = "gpkg_";

/// Prefix reserved for the storage engine's internal tables.
pub const ENGINE_TABLE_PREFIX: &str = "sqlite_";

/// Primary key column synthesized for feature tables.
pub const FEATURE_ID_COLUMN: &str = "id";

/// Required tile table columns.
pub mod tile_columns {
    pub const ID: &str = "id";
    pub const ZOOM_LEVEL: &str = "zoom_level";
    pub const TILE_COLUMN: &str = "tile_column";
    pub const TILE_ROW: &str = "tile_row";
    pub const TILE_DATA: &str = "tile_data";
}

/// Default SRS rows seeded into a new container.
pub mod srs {
    pub const UNDEFINED_CARTESIAN_ID: i64 = -1;
    pub const UNDEFINED_GEOGRAPHIC_ID: i64 = 0;
    pub const WGS84_ID: i64 = 4326;

    pub const UNDEFINED_ORGANIZATION: &str = "NONE";
    pub const EPSG_ORGANIZATION: &str = "EPSG";
    pub const UNDEFINED_DEFINITION: &str = "undefined";

    pub const WGS84_DEFINITION: &str = "GEOGCS[\"WGS 84\",DATUM[\"WGS_1984\",SPHEROID[\"WGS 84\",6378137,298.257223563,AUTHORITY[\"EPSG\",\"7030\"]],AUTHORITY[\"EPSG\",\"6326\"]],PRIMEM[\"Greenwich\",0,AUTHORITY[\"EPSG\",\"8901\"]],UNIT[\"degree\",0.0174532925199433,AUTHORITY[\"EPSG\",\"9122\"]],AUTHORITY[\"EPSG\",\"4326\"]]";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_id_value() {
        assert_eq!(APPLICATION_ID_VALUE, 0x4750_3130);
        assert_eq!(&APPLICATION_ID_VALUE.to_be_bytes(), APPLICATION_ID.as_bytes());
    }
}
