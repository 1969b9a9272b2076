//! Product descriptors returned by a catalog fetch.

use serde::{Deserialize, Serialize};

use crate::id::ProductId;

/// What kind of purchase a product represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Consumable,
    NonConsumable,
    AutoRenewableSubscription,
}

impl ProductKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductKind::Consumable => "consumable",
            ProductKind::NonConsumable => "non_consumable",
            ProductKind::AutoRenewableSubscription => "auto_renewable_subscription",
        }
    }
}

impl core::fmt::Display for ProductKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchasable product as described by the platform.
///
/// Immutable once fetched; the platform formats `display_price` for the
/// user's storefront, so it is kept as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProductRecord")]
pub struct Product {
    pub id: ProductId,
    pub kind: ProductKind,
    pub display_price: String,
    pub display_name: String,
}

/// Wire form of [`Product`]; a missing or blank name falls back to the ID.
#[derive(Deserialize)]
struct ProductRecord {
    id: ProductId,
    kind: ProductKind,
    display_price: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl From<ProductRecord> for Product {
    fn from(record: ProductRecord) -> Self {
        let product = Product::new(record.id, record.kind, record.display_price);
        match record.display_name {
            Some(name) if !name.trim().is_empty() => product.with_display_name(name),
            _ => product,
        }
    }
}

impl Product {
    pub fn new(id: ProductId, kind: ProductKind, display_price: impl Into<String>) -> Self {
        Self {
            display_name: id.to_string(),
            id,
            kind,
            display_price: display_price.into(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn is_subscription(&self) -> bool {
        self.kind == ProductKind::AutoRenewableSubscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_kind_uses_snake_case_on_the_wire() {
        let json = serde_json::to_string(&ProductKind::AutoRenewableSubscription).unwrap();
        assert_eq!(json, "\"auto_renewable_subscription\"");
    }

    #[test]
    fn display_name_defaults_to_id() {
        let p = Product::new(ProductId::new("A").unwrap(), ProductKind::Consumable, "$0.99");
        assert_eq!(p.display_name, "A");
        assert!(!p.is_subscription());
    }

    #[test]
    fn missing_display_name_falls_back_to_id() {
        let p: Product = serde_json::from_str(
            r#"{"id":"pro.monthly","kind":"auto_renewable_subscription","display_price":"$4.99"}"#,
        )
        .unwrap();
        assert!(p.is_subscription());
        assert_eq!(p.display_name, "pro.monthly");

        let blank: Product = serde_json::from_str(
            r#"{"id":"A","kind":"consumable","display_price":"$0.99","display_name":" "}"#,
        )
        .unwrap();
        assert_eq!(blank.display_name, "A");
    }

    #[test]
    fn explicit_display_name_survives_json() {
        let p = Product::new(ProductId::new("A").unwrap(), ProductKind::Consumable, "$0.99")
            .with_display_name("Gems");
        let back: Product = serde_json::from_str(&serde_json::to_string(&p).unwrap()).unwrap();
        assert_eq!(back, p);
    }
}
