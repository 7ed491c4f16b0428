//! GeoPackage Catalog - Orchestration Layer
//!
//! Keeps user tables and their catalog metadata consistent: typed catalog
//! row stores, DDL provisioning, the multi-step creation workflows with
//! rollback, and the `GeoPackage` container handle tying them together.

pub mod handle;
pub mod orchestrator;
pub mod provisioner;
pub mod row_store;
pub mod rows;

pub use handle::GeoPackage;
pub use orchestrator::CatalogOrchestrator;
pub use provisioner::{catalog_table_schema, user_table_schema, Provisioner};
pub use row_store::CatalogTable;
pub use rows::CatalogRow;
