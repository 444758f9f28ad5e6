//! Persistence layer: orders plus the catalog and address reference data.

pub mod fallback;
pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod reference;
pub mod seed;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory::MemoryOrderStore;
pub use reference::ReferenceData;
pub use traits::{AddressSource, CatalogSource, OrderId, OrderStore, OrderSummary};
