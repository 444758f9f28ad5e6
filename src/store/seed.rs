//! JSON seed import for the catalog and address directory.
//!
//! Field names follow the spreadsheet export the data usually comes from,
//! so both `memo` and `Memo/Description` are accepted:
//!
//! ```json
//! {
//!   "catalog":   [{ "Product/Service": "DELO400", "Memo/Description": "Chevron Delo 400" }],
//!   "addresses": [{ "Customer full name": "ABC Trucking", "Bill address": "123 Main St" }]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{ConfigError, Error};
use crate::matching::{AddressEntry, CatalogItem};
use crate::store::libsql_backend::LibSqlStore;

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub catalog: Vec<CatalogItem>,
    #[serde(default)]
    pub addresses: Vec<AddressEntry>,
}

impl SeedFile {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(format!("seed file: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }
}

/// Replace the store's reference tables with the seed file's contents.
pub async fn import_seed(store: &LibSqlStore, path: &Path) -> Result<(), Error> {
    let seed = SeedFile::from_path(path)?;
    store
        .replace_reference_data(&seed.catalog, &seed.addresses)
        .await?;
    info!(
        path = %path.display(),
        catalog = seed.catalog.len(),
        addresses = seed.addresses.len(),
        "Seed imported"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::traits::{AddressSource, CatalogSource};

    #[test]
    fn accepts_sheet_column_names() {
        let seed = SeedFile::parse(
            r#"{
                "catalog": [{
                    "Product/Service": "DELO400",
                    "Memo/Description": "Chevron Delo 400 LE 15W40 Galon",
                    "otra descripcion": "Aceite Chevron Delo 400",
                    "Product/Service full name": "Chevron Delo 400 LE"
                }],
                "addresses": [{
                    "Customer full name": "ABC Trucking",
                    "Bill address": "123 Main St, Austin, TX"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(seed.catalog[0].code, "DELO400");
        assert_eq!(seed.catalog[0].alt_description, "Aceite Chevron Delo 400");
        assert_eq!(seed.addresses[0].address, "123 Main St, Austin, TX");
    }

    #[test]
    fn accepts_plain_field_names_and_missing_sections() {
        let seed = SeedFile::parse(r#"{"catalog": [{"memo": "Delo"}]}"#).unwrap();
        assert_eq!(seed.catalog[0].memo, "Delo");
        assert_eq!(seed.catalog[0].code, "");
        assert!(seed.addresses.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            SeedFile::parse("[1, 2"),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn import_into_libsql() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("seed.json");
        std::fs::write(
            &path,
            r#"{"catalog": [{"memo": "Delo", "code": "D"}],
                "addresses": [{"name": "ABC", "address": "1 Main"}]}"#,
        )
        .unwrap();

        let store = LibSqlStore::new_memory().await.unwrap();
        import_seed(&store, &path).await.unwrap();
        assert_eq!(store.list_catalog().await.unwrap()[0].code, "D");
        assert_eq!(store.list_addresses().await.unwrap()[0].name, "ABC");
    }
}
