//! Seed the cosmetic catalog from a YAML file.
//!
//! # File format
//!
//! ```yaml
//! items:
//!   - id: CID_028_Athena_Commando_F
//!     name: Renegade Raider
//!     type: outfit
//!     rarity: rare
//!     price: 1200
//!     introduced: { season: "1", version: "1.00" }
//!     availability: exclusive
//! ```
//!
//! Existing items with the same id are overwritten.

use std::collections::HashSet;
use std::path::Path;

use dub_core::CatalogItem;
use dub_server::db::Store;
use serde::Deserialize;
use tracing::{error, info};

use super::{CliError, store};

/// Top-level YAML document.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub items: Vec<CatalogItem>,
}

/// Problems that make a catalog file unusable. Empty when the file is valid.
#[must_use]
pub fn validate(file: &CatalogFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for item in &file.items {
        if item.name.trim().is_empty() {
            errors.push(format!("{}: name must not be empty", item.id));
        }
        if item.introduced.version.trim().is_empty() {
            errors.push(format!("{}: introduced.version must not be empty", item.id));
        }
        if !seen.insert(item.id.clone()) {
            errors.push(format!("{}: duplicate id", item.id));
        }
    }

    errors
}

/// Insert or update every item in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, fails validation,
/// or storage fails.
pub async fn catalog(file_path: &str) -> Result<(), CliError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog from file");

    // Read and validate before connecting to the database
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let file: CatalogFile = serde_yaml::from_str(&content)?;
    info!(items = file.items.len(), "Parsed catalog");

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(CliError::InvalidCatalog(errors.len()));
    }

    let store = store().await?;
    for item in &file.items {
        store.upsert_cosmetic(item).await?;
    }

    info!(items = file.items.len(), "Catalog seeded");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use dub_core::{Availability, ItemType, Rarity};

    use super::*;

    const CATALOG: &str = r#"
items:
  - id: CID_028_Athena_Commando_F
    name: Renegade Raider
    type: outfit
    rarity: rare
    price: 1200
    introduced: { season: "1", version: "1.00" }
    availability: exclusive
  - id: Pickaxe_ID_011_Medieval
    name: Axecalibur
    type: pickaxe
    rarity: rare
    price: 800
    introduced: { season: "2", version: "2.00", chapter: 1 }
"#;

    #[test]
    fn test_parse_catalog_file() {
        let file: CatalogFile = serde_yaml::from_str(CATALOG).unwrap();
        assert_eq!(file.items.len(), 2);

        let raider = file.items.first().unwrap();
        assert_eq!(raider.item_type, ItemType::Outfit);
        assert_eq!(raider.rarity, Rarity::Rare);
        assert_eq!(raider.availability, Availability::Exclusive);

        let pickaxe = file.items.get(1).unwrap();
        assert_eq!(pickaxe.availability, Availability::Shop);
        assert_eq!(pickaxe.introduced.chapter, Some(1));
        assert!(validate(&file).is_empty());
    }

    #[test]
    fn test_validate_flags_duplicates_and_blank_names() {
        let mut file: CatalogFile = serde_yaml::from_str(CATALOG).unwrap();
        let mut copy = file.items.first().unwrap().clone();
        copy.name = "  ".to_owned();
        file.items.push(copy);

        let errors = validate(&file);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("duplicate id")));
        assert!(errors.iter().any(|e| e.contains("name must not be empty")));
    }

    #[test]
    fn test_unknown_item_type_is_rejected() {
        let yaml = CATALOG.replace("type: pickaxe", "type: spray");
        assert!(serde_yaml::from_str::<CatalogFile>(&yaml).is_err());
    }
}
