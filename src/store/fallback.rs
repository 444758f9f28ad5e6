//! Built-in reference data used when the configured sources are empty or
//! unreachable, so product search keeps working.

use crate::matching::{AddressEntry, CatalogItem};

/// (code, memo, alternate description, full name)
const CATALOG: &[(&str, &str, &str, &str)] = &[
    ("MOIL15W40", "Mobil Delvac MX 15W40 Galon", "Aceite Mobil Delvac 15W40 SAE", "Mobil Delvac MX ESP 15W40"),
    ("MOIL5W30", "Mobil Super 5W30 Galon", "Aceite Mobil Super 5000 5W30 SAE", "Mobil Super 5W30"),
    ("SHELL15W40", "Shell Rotella T4 15W40 Galon", "Aceite Shell Rotella T4 SAE 15W40", "Shell Rotella T4 15W40"),
    ("CBXM", "Caja de Mistyk", "Caja completa Mistyk", "Caja Mistyk 12 unidades"),
    ("DELO400", "Chevron Delo 400 LE 15W40 Galon", "Aceite Chevron Delo 400 SAE 15W40", "Chevron Delo 400 LE 15W40"),
    ("BKBLG", "Black Gold 15W40 Galon", "Aceite Black Gold SAE 15W40", "Black Gold 15W40"),
    ("DELO15W40", "Chevron Delo 600 ADF 15W40 Galon", "Aceite Chevron Delo 600 ADF SAE 15W40", "Chevron Delo 600 ADF 15W40"),
    ("SAE90", "Valvoline SAE 90 Galon", "Aceite Valvoline SAE 90", "Valvoline SAE 90"),
    ("SAE140", "Valvoline SAE 140 Galon", "Aceite Valvoline SAE 140", "Valvoline SAE 140"),
    ("HIDRAULICO", "Aceite Hidraulico AW68", "Aceite Hidraulico AW 68", "Aceite Hidraulico AW68"),
    ("COOLANT", "Coolant/Anticongelante", "Líquido refrigerante", "Coolant Anticongelante"),
    ("MISTYK", "Mistyk", "Producto Mistyk", "Mistyk"),
    ("ACEITE", "Aceite", "Aceite lubricante", "Aceite"),
    ("ROTELLA", "Rotella", "Aceite Rotella", "Rotella"),
    ("DELO", "Delo", "Aceite Delo", "Delo"),
    ("MOBIL", "Mobil", "Aceite Mobil", "Mobil"),
    ("SHELL", "Shell", "Aceite Shell", "Shell"),
    ("VALVOLINE", "Valvoline", "Aceite Valvoline", "Valvoline"),
    ("CHEVRON", "Chevron", "Aceite Chevron", "Chevron"),
    ("BLACKGOLD", "Black Gold", "Aceite Black Gold", "Black Gold"),
];

const ADDRESSES: &[(&str, &str)] = &[
    ("ABC Trucking", "123 Main St, Austin, TX"),
    ("Transportes XYZ", "456 Oak St, Houston, TX"),
    ("Logistica Rapida", "789 Pine Ave, Dallas, TX"),
];

pub fn fallback_catalog() -> Vec<CatalogItem> {
    CATALOG
        .iter()
        .map(|(code, memo, alt, full)| CatalogItem::new(*code, *memo, *alt, *full))
        .collect()
}

pub fn fallback_addresses() -> Vec<AddressEntry> {
    ADDRESSES
        .iter()
        .map(|(name, address)| AddressEntry::new(*name, *address))
        .collect()
}
