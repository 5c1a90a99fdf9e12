//! Storefront, shop and product lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{
    Currency, Money, OrderNumberSequenceId, ProductId, ProductNumber, ShopId, StorefrontId,
    TaxRate, TicketCategoryId,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// A shop's public sales channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storefront {
    pub id: StorefrontId,
    pub shop_id: ShopId,
    pub order_number_sequence_id: OrderNumberSequenceId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shop {
    pub id: ShopId,
    pub title: String,
    pub currency: Currency,
}

/// What kind of good a product is; drives type-based fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Physical,
    Ticket,
    TicketBundle,
    Other,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Physical => "physical",
            ProductType::Ticket => "ticket",
            ProductType::TicketBundle => "ticket_bundle",
            ProductType::Other => "other",
        }
    }
}

impl std::fmt::Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "physical" => Ok(ProductType::Physical),
            "ticket" => Ok(ProductType::Ticket),
            "ticket_bundle" => Ok(ProductType::TicketBundle),
            "other" => Ok(ProductType::Other),
            other => Err(format!("Unknown product type: {other}")),
        }
    }
}

/// Type-specific product configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductTypeParams {
    pub ticket_category_id: Option<TicketCategoryId>,

    /// Tickets per bundle.
    pub ticket_quantity: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub shop_id: ShopId,
    pub item_number: ProductNumber,
    pub product_type: ProductType,
    pub type_params: ProductTypeParams,
    pub name: String,
    pub price: Money,
    pub tax_rate: TaxRate,
    pub processing_required: bool,
}

/// Read access to the shop catalog.
#[async_trait]
pub trait ShopCatalog: Send + Sync {
    async fn find_storefront(&self, storefront_id: &StorefrontId) -> Option<Storefront>;

    async fn find_shop(&self, shop_id: &ShopId) -> Option<Shop>;

    async fn find_product(&self, product_id: ProductId) -> Option<Product>;
}

/// In-memory catalog for testing.
#[derive(Clone, Default)]
pub struct InMemoryShopCatalog {
    storefronts: Arc<RwLock<HashMap<StorefrontId, Storefront>>>,
    shops: Arc<RwLock<HashMap<ShopId, Shop>>>,
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryShopCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_shop(&self, shop: Shop) {
        self.shops.write().await.insert(shop.id.clone(), shop);
    }

    pub async fn add_storefront(&self, storefront: Storefront) {
        self.storefronts
            .write()
            .await
            .insert(storefront.id.clone(), storefront);
    }

    /// Adds or replaces a product.
    pub async fn add_product(&self, product: Product) {
        self.products.write().await.insert(product.id, product);
    }
}

#[async_trait]
impl ShopCatalog for InMemoryShopCatalog {
    async fn find_storefront(&self, storefront_id: &StorefrontId) -> Option<Storefront> {
        self.storefronts.read().await.get(storefront_id).cloned()
    }

    async fn find_shop(&self, shop_id: &ShopId) -> Option<Shop> {
        self.shops.read().await.get(shop_id).cloned()
    }

    async fn find_product(&self, product_id: ProductId) -> Option<Product> {
        self.products.read().await.get(&product_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_type_round_trips_through_str() {
        for product_type in [
            ProductType::Physical,
            ProductType::Ticket,
            ProductType::TicketBundle,
            ProductType::Other,
        ] {
            assert_eq!(product_type.as_str().parse::<ProductType>(), Ok(product_type));
        }
        assert!("voucher".parse::<ProductType>().is_err());
    }

    #[tokio::test]
    async fn catalog_lookups() {
        let catalog = InMemoryShopCatalog::new();
        let shop = Shop {
            id: ShopId::new("shop"),
            title: "Shop".to_string(),
            currency: Currency::EUR,
        };
        catalog.add_shop(shop.clone()).await;

        assert_eq!(catalog.find_shop(&ShopId::new("shop")).await, Some(shop));
        assert!(catalog.find_shop(&ShopId::new("other")).await.is_none());
        assert!(catalog.find_product(ProductId::new()).await.is_none());
    }
}
