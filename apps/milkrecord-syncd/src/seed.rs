//! Starter dairy catalogue, saved through the normal write path so it is
//! queued for sync like any other record.

use milkrecord_core::{Money, Product};
use milkrecord_sync::RecordWriter;
use tracing::info;

use crate::error::{CliError, CliResult};

/// (name, category, unit, rupees, emoji)
const STARTER_CATALOGUE: [(&str, &str, &str, i64, &str); 10] = [
    ("Cow Milk", "milk", "L", 64, "🥛"),
    ("Buffalo Milk", "milk", "L", 72, "🥛"),
    ("Paneer", "paneer", "kg", 400, "🧀"),
    ("Ghee", "ghee", "L", 600, "🧈"),
    ("Curd", "curd", "kg", 80, "🥣"),
    ("Lassi", "curd", "glass", 60, "🥣"),
    ("Barfi", "sweets", "kg", 300, "🍬"),
    ("Jalebi", "sweets", "kg", 200, "🍬"),
    ("Bread", "bakery", "pkt", 40, "🥐"),
    ("Biscuits", "bakery", "pkt", 30, "🥐"),
];

pub fn starter_products() -> Vec<Product> {
    STARTER_CATALOGUE
        .iter()
        .map(|&(name, category, unit, rupees, emoji)| Product {
            name: name.to_string(),
            category: category.to_string(),
            unit: unit.to_string(),
            price_paise: Money::from_rupees_paise(rupees, 0).paise(),
            emoji: Some(emoji.to_string()),
            is_active: true,
        })
        .collect()
}

/// Saves every starter product. Returns how many reached the cloud.
pub async fn seed_catalogue(writer: &RecordWriter) -> CliResult<usize> {
    let mut synced = 0;

    for product in starter_products() {
        let name = product.name.clone();
        let result = writer.save(None, product).await;

        if !result.success {
            return Err(CliError::SeedFailed {
                name,
                message: result.message,
            });
        }

        if result.synced {
            synced += 1;
        }
        info!(product = %name, id = ?result.id(), "{}", result.message);
    }

    Ok(synced)
}
