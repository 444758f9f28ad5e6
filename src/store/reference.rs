//! Reference-data snapshot (catalog + address directory) shared by sessions.

use std::sync::Arc;

use tracing::{info, warn};

use crate::matching::{AddressEntry, CatalogItem};
use crate::store::fallback::{fallback_addresses, fallback_catalog};
use crate::store::traits::{AddressSource, CatalogSource};

/// Immutable snapshot; swapped wholesale on reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceData {
    pub catalog: Vec<CatalogItem>,
    pub addresses: Vec<AddressEntry>,
    /// Whether the built-in fallback had to be used.
    pub fallback: bool,
}

impl ReferenceData {
    pub fn new(catalog: Vec<CatalogItem>, addresses: Vec<AddressEntry>) -> Self {
        Self {
            catalog: clean_catalog(catalog),
            addresses: clean_addresses(addresses),
            fallback: false,
        }
    }

    pub fn builtin() -> Self {
        Self {
            catalog: fallback_catalog(),
            addresses: fallback_addresses(),
            fallback: true,
        }
    }

    /// Load both tables. Any failure, or an empty catalog, yields the
    /// built-in data.
    pub async fn load(catalog: &dyn CatalogSource, addresses: &dyn AddressSource) -> Arc<Self> {
        let loaded = match (catalog.list_catalog().await, addresses.list_addresses().await) {
            (Ok(c), Ok(a)) => Self::new(c, a),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Reference data unavailable, using built-in catalog");
                return Arc::new(Self::builtin());
            }
        };

        if loaded.catalog.is_empty() {
            warn!("Catalog is empty, using built-in catalog");
            return Arc::new(Self::builtin());
        }

        info!(
            catalog = loaded.catalog.len(),
            addresses = loaded.addresses.len(),
            "Reference data loaded"
        );
        Arc::new(loaded)
    }
}

/// Rows without a memo cannot be shown to the user.
fn clean_catalog(items: Vec<CatalogItem>) -> Vec<CatalogItem> {
    items.into_iter().filter(|i| !i.memo.trim().is_empty()).collect()
}

fn clean_addresses(entries: Vec<AddressEntry>) -> Vec<AddressEntry> {
    entries
        .into_iter()
        .filter(|e| !e.name.trim().is_empty() && !e.address.trim().is_empty())
        .collect()
}
