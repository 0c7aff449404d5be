//! Cache types for REST API responses.

use std::sync::Arc;

use crate::api::types::{Product, WalletSettings};

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<Product>),
    Products(Arc<Vec<Product>>),
    WalletSettings(WalletSettings),
}

/// Cache key for the full catalogue listing.
pub const PRODUCTS_KEY: &str = "products";

/// Cache key for the wallet policy.
pub const WALLET_SETTINGS_KEY: &str = "wallet:settings";

/// Cache key for a single product.
pub fn product_key(id: tradepost_core::ProductId) -> String {
    format!("product:{id}")
}
