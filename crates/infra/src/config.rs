//! Configuration loading and representation.
//!
//! Everything is read from environment variables:
//!
//! | Variable                | Meaning                                             |
//! |-------------------------|-----------------------------------------------------|
//! | `IAPKIT_PRODUCT_IDS`    | comma-separated product IDs to fetch                 |
//! | `IAPKIT_CATALOG_PATH`   | JSON catalog for the simulated platform (optional)   |
//! | `IAPKIT_LISTEN_UPDATES` | `true`/`false`, start the update listener (default on)|

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use iapkit_core::{CoreError, Product, ProductId, ProductKind};
use iapkit_store::InMemoryPlatform;

pub const PRODUCT_IDS_VAR: &str = "IAPKIT_PRODUCT_IDS";
pub const CATALOG_PATH_VAR: &str = "IAPKIT_CATALOG_PATH";
pub const LISTEN_UPDATES_VAR: &str = "IAPKIT_LISTEN_UPDATES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid product id {value:?} in IAPKIT_PRODUCT_IDS: {source}")]
    InvalidProductId {
        value: String,
        #[source]
        source: CoreError,
    },

    #[error("invalid boolean {value:?} for {key}")]
    InvalidBool { key: &'static str, value: String },

    #[error("failed to read catalog {}: {source}", .path.display())]
    ReadCatalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {}: {source}", .path.display())]
    ParseCatalog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk catalog format for the simulated platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<Product>,
}

impl CatalogFile {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadCatalog {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::ParseCatalog {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Catalog used when no file is configured.
    pub fn builtin() -> Self {
        let product = |id: &str, kind, price: &str, name: &str| {
            ProductId::new(id)
                .map(|id| Product::new(id, kind, price).with_display_name(name))
        };
        Self {
            products: [
                product("gems.small", ProductKind::Consumable, "$0.99", "Handful of Gems"),
                product("remove_ads", ProductKind::NonConsumable, "$2.99", "Remove Ads"),
                product(
                    "pro.monthly",
                    ProductKind::AutoRenewableSubscription,
                    "$4.99",
                    "Pro (monthly)",
                ),
            ]
            .into_iter()
            .flatten()
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Product IDs to fetch; empty means "everything in the catalog".
    pub product_ids: Vec<ProductId>,
    pub catalog_path: Option<PathBuf>,
    pub listen_updates: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            product_ids: Vec::new(),
            catalog_path: None,
            listen_updates: true,
        }
    }
}

impl StoreConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup (tests, embedding).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let product_ids = match lookup(PRODUCT_IDS_VAR) {
            Some(raw) => parse_product_ids(&raw)?,
            None => Vec::new(),
        };

        let catalog_path = lookup(CATALOG_PATH_VAR)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let listen_updates = match lookup(LISTEN_UPDATES_VAR) {
            Some(raw) => parse_bool(LISTEN_UPDATES_VAR, &raw)?,
            None => true,
        };

        Ok(Self {
            product_ids,
            catalog_path,
            listen_updates,
        })
    }

    /// The simulated platform's catalog: the configured file or the built-in one.
    pub fn load_catalog(&self) -> Result<CatalogFile, ConfigError> {
        match &self.catalog_path {
            Some(path) => {
                let catalog = CatalogFile::from_path(path)?;
                info!(path = %path.display(), products = catalog.products.len(), "catalog loaded");
                Ok(catalog)
            }
            None => Ok(CatalogFile::builtin()),
        }
    }

    /// Product IDs to request, falling back to every ID in `catalog`.
    pub fn resolve_product_ids(&self, catalog: &CatalogFile) -> Vec<ProductId> {
        if !self.product_ids.is_empty() {
            return self.product_ids.clone();
        }
        warn!("{PRODUCT_IDS_VAR} not set; requesting every catalog product");
        catalog.products.iter().map(|p| p.id.clone()).collect()
    }

    /// Build a simulated platform seeded with the configured catalog.
    pub fn build_platform(&self) -> Result<(InMemoryPlatform, Vec<ProductId>), ConfigError> {
        let catalog = self.load_catalog()?;
        let ids = self.resolve_product_ids(&catalog);
        Ok((InMemoryPlatform::new().with_products(catalog.products), ids))
    }
}

fn parse_product_ids(raw: &str) -> Result<Vec<ProductId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            ProductId::new(s).map_err(|source| ConfigError::InvalidProductId {
                value: s.to_string(),
                source,
            })
        })
        .collect()
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}
