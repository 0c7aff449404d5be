//! Cart state container.
//!
//! A visitor has exactly one active cart source:
//!
//! - **Guest** - anonymous visitors; lines live in the session record
//!   ([`GuestCart`]) and never touch the backend
//! - **Server** - signed-in users; every operation proxies to the REST
//!   cart endpoints through a [`CartBackend`]
//!
//! Both sources are rendered through the same [`CartSnapshot`], so routes
//! and checkout pricing never branch on where a line came from.

mod guest;
mod reconcile;

pub use guest::{GuestCart, load_guest_cart, save_guest_cart};
pub use reconcile::{MergeReport, merge_guest_cart};

use std::future::Future;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use tradepost_core::{CartItemId, CartLineId, CategoryId, ProductId, VariantId};

use crate::api::types::{AddToCartRequest, Product, ServerCart, ServerCartItem, Variant};
use crate::api::{ApiClient, ApiError, ApiSession};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantities must be at least one; use remove to drop a line.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// No line with this id in the active cart.
    #[error("cart line not found: {0}")]
    LineNotFound(CartLineId),

    /// The product cannot currently be bought.
    #[error("{0} is out of stock")]
    OutOfStock(String),

    /// The backend rejected or failed the operation.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CartError {
    /// A message that is safe to show to shoppers.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidQuantity => "Quantity must be at least 1".to_string(),
            Self::LineNotFound(_) => "That item is no longer in your cart".to_string(),
            Self::OutOfStock(name) => format!("{name} is out of stock"),
            Self::Api(e) => e.user_message(),
        }
    }
}

// =============================================================================
// Cart lines & snapshots
// =============================================================================

/// Which source a cart was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartSource {
    Guest,
    Server,
}

/// A cart line with everything needed to price and render it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub category_id: Option<CategoryId>,
    pub image_url: Option<String>,
    pub variant_id: Option<VariantId>,
    pub variant_name: Option<String>,
    pub unit_price: Decimal,
    /// Delivery charge per unit.
    pub delivery_charge: Decimal,
    pub quantity: u32,
}

impl CartLine {
    /// Build a line for a product, snapshotting its price and delivery charge.
    #[must_use]
    pub fn from_product(
        id: CartLineId,
        product: &Product,
        variant: Option<&Variant>,
        quantity: u32,
    ) -> Self {
        Self {
            id,
            product_id: product.id,
            product_name: product.name.clone(),
            category_id: product.category.as_ref().map(|c| c.id),
            image_url: product.image_url.clone(),
            variant_id: variant.map(|v| v.id),
            variant_name: variant.map(|v| v.name.clone()),
            unit_price: product.unit_price(variant),
            delivery_charge: product.delivery_charge,
            quantity,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Delivery charge times quantity.
    #[must_use]
    pub fn line_delivery(&self) -> Decimal {
        self.delivery_charge * Decimal::from(self.quantity)
    }

    /// Whether this line holds the given (product, variant) pair.
    #[must_use]
    pub fn is_item(&self, product_id: ProductId, variant_id: Option<VariantId>) -> bool {
        self.product_id == product_id && self.variant_id == variant_id
    }
}

impl From<&ServerCartItem> for CartLine {
    fn from(item: &ServerCartItem) -> Self {
        Self::from_product(
            CartLineId::Server(item.id),
            &item.product,
            item.variant.as_ref(),
            item.quantity,
        )
    }
}

/// A point-in-time view of the active cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub source: CartSource,
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    /// An empty cart of the given source.
    #[must_use]
    pub const fn empty(source: CartSource) -> Self {
        Self {
            source,
            lines: Vec::new(),
        }
    }

    /// Snapshot of a server cart response.
    #[must_use]
    pub fn from_server(cart: &ServerCart) -> Self {
        Self {
            source: CartSource::Server,
            lines: cart.items.iter().map(CartLine::from).collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |count, l| count.saturating_add(l.quantity))
    }

    /// Σ(unit price × quantity).
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Σ(delivery charge × quantity).
    #[must_use]
    pub fn delivery_total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_delivery).sum()
    }

    /// Find a line by id.
    #[must_use]
    pub fn line(&self, id: &CartLineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.id == id)
    }

    /// Restrict the snapshot to the given lines, preserving cart order.
    ///
    /// An empty selection means "the whole cart".
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` for the first id not in the cart.
    pub fn select(&self, ids: &[CartLineId]) -> Result<Self, CartError> {
        if ids.is_empty() {
            return Ok(self.clone());
        }

        if let Some(missing) = ids.iter().find(|id| self.line(id).is_none()) {
            return Err(CartError::LineNotFound(missing.clone()));
        }

        Ok(Self {
            source: self.source,
            lines: self
                .lines
                .iter()
                .filter(|l| ids.contains(&l.id))
                .cloned()
                .collect(),
        })
    }
}

// =============================================================================
// Backend seam
// =============================================================================

/// Server cart operations used by the cart container and login reconciliation.
pub trait CartBackend: Sync {
    /// Fetch the server cart.
    fn fetch_cart(
        &self,
        session: &ApiSession,
    ) -> impl Future<Output = Result<ServerCart, ApiError>> + Send;

    /// Add an item; the backend merges quantities for a known (product, variant).
    fn add_item(
        &self,
        session: &ApiSession,
        item: &AddToCartRequest,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Set an item's quantity.
    fn update_item(
        &self,
        session: &ApiSession,
        id: CartItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove an item.
    fn remove_item(
        &self,
        session: &ApiSession,
        id: CartItemId,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Remove every item.
    fn clear(&self, session: &ApiSession) -> impl Future<Output = Result<(), ApiError>> + Send;
}

impl CartBackend for ApiClient {
    async fn fetch_cart(&self, session: &ApiSession) -> Result<ServerCart, ApiError> {
        self.cart(session).await
    }

    async fn add_item(&self, session: &ApiSession, item: &AddToCartRequest) -> Result<(), ApiError> {
        self.add_to_cart(session, item).await
    }

    async fn update_item(
        &self,
        session: &ApiSession,
        id: CartItemId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        self.update_cart_item(session, id, quantity).await
    }

    async fn remove_item(&self, session: &ApiSession, id: CartItemId) -> Result<(), ApiError> {
        self.remove_cart_item(session, id).await
    }

    async fn clear(&self, session: &ApiSession) -> Result<(), ApiError> {
        self.clear_cart(session).await
    }
}

// =============================================================================
// CartService
// =============================================================================

/// The cart a request operates on.
pub enum CartOwner<'a> {
    /// Anonymous visitor; mutations apply to the session copy.
    Guest(&'a mut GuestCart),
    /// Signed-in user; mutations proxy to the backend.
    Member(&'a ApiSession),
}

/// Cart operations over either source.
pub struct CartService<'a, B> {
    backend: &'a B,
}

impl<'a, B: CartBackend> CartService<'a, B> {
    #[must_use]
    pub const fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Read the active cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Api` if the server cart cannot be fetched.
    #[instrument(skip_all)]
    pub async fn load(&self, owner: CartOwner<'_>) -> Result<CartSnapshot, CartError> {
        match owner {
            CartOwner::Guest(cart) => Ok(cart.snapshot()),
            CartOwner::Member(session) => {
                let cart = self.backend.fetch_cart(session).await?;
                Ok(CartSnapshot::from_server(&cart))
            }
        }
    }

    /// Add a product (optionally a specific variant) to the active cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for zero, `CartError::OutOfStock`
    /// for unavailable products, or `CartError::Api` on backend failure.
    #[instrument(skip_all, fields(product_id = %product.id, quantity))]
    pub async fn add(
        &self,
        owner: CartOwner<'_>,
        product: &Product,
        variant: Option<&Variant>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !product.in_stock {
            return Err(CartError::OutOfStock(product.name.clone()));
        }

        match owner {
            CartOwner::Guest(cart) => {
                cart.add(product, variant, quantity)?;
                Ok(())
            }
            CartOwner::Member(session) => {
                let item = AddToCartRequest {
                    product_id: product.id,
                    variant_id: variant.map(|v| v.id),
                    quantity,
                };
                self.backend.add_item(session, &item).await?;
                Ok(())
            }
        }
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for zero, `CartError::LineNotFound`
    /// if the id does not belong to the active source.
    #[instrument(skip_all, fields(line = %line, quantity))]
    pub async fn update_quantity(
        &self,
        owner: CartOwner<'_>,
        line: &CartLineId,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        match (owner, line) {
            (CartOwner::Guest(cart), CartLineId::Guest(_)) => cart.update_quantity(line, quantity),
            (CartOwner::Member(session), CartLineId::Server(id)) => {
                self.backend.update_item(session, *id, quantity).await?;
                Ok(())
            }
            _ => Err(CartError::LineNotFound(line.clone())),
        }
    }

    /// Remove one line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` if the id does not belong to the
    /// active source.
    #[instrument(skip_all, fields(line = %line))]
    pub async fn remove(&self, owner: CartOwner<'_>, line: &CartLineId) -> Result<(), CartError> {
        match (owner, line) {
            (CartOwner::Guest(cart), CartLineId::Guest(_)) => cart.remove(line).map(|_| ()),
            (CartOwner::Member(session), CartLineId::Server(id)) => {
                self.backend.remove_item(session, *id).await?;
                Ok(())
            }
            _ => Err(CartError::LineNotFound(line.clone())),
        }
    }

    /// Empty the active cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Api` on backend failure.
    #[instrument(skip_all)]
    pub async fn clear(&self, owner: CartOwner<'_>) -> Result<(), CartError> {
        match owner {
            CartOwner::Guest(cart) => {
                cart.clear();
                Ok(())
            }
            CartOwner::Member(session) => {
                self.backend.clear(session).await?;
                Ok(())
            }
        }
    }
}

// =============================================================================
// Test support
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    //! In-memory server cart that merges quantities like the real backend.

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;
    use crate::api::types::Category;

    pub fn product(id: i32, price: i64, delivery: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            description: None,
            price: Decimal::from(price),
            delivery_charge: Decimal::from(delivery),
            category: Some(Category {
                id: CategoryId::new(1),
                name: "Groceries".to_string(),
            }),
            image_url: None,
            in_stock: true,
            seller_id: None,
            variants: vec![
                Variant {
                    id: VariantId::new(id * 10 + 1),
                    name: "Small".to_string(),
                    price: None,
                },
                Variant {
                    id: VariantId::new(id * 10 + 2),
                    name: "Large".to_string(),
                    price: Some(Decimal::from(price * 2)),
                },
            ],
        }
    }

    #[derive(Default)]
    pub struct MemoryBackend {
        catalogue: HashMap<ProductId, Product>,
        items: Mutex<Vec<ServerCartItem>>,
        failing: HashSet<ProductId>,
        pub added: Mutex<Vec<AddToCartRequest>>,
        next_id: Mutex<i32>,
    }

    impl MemoryBackend {
        pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
            Self {
                catalogue: products.into_iter().map(|p| (p.id, p)).collect(),
                next_id: Mutex::new(100),
                ..Self::default()
            }
        }

        /// Reject every add of this product with a 422.
        pub fn failing_on(mut self, product_id: ProductId) -> Self {
            self.failing.insert(product_id);
            self
        }

        pub fn quantity_of(&self, product_id: ProductId, variant_id: Option<VariantId>) -> u32 {
            self.items
                .lock()
                .unwrap()
                .iter()
                .filter(|i| i.product.id == product_id && i.variant.as_ref().map(|v| v.id) == variant_id)
                .map(|i| i.quantity)
                .sum()
        }

        pub fn line_count(&self) -> usize {
            self.items.lock().unwrap().len()
        }
    }

    impl CartBackend for MemoryBackend {
        async fn fetch_cart(&self, _session: &ApiSession) -> Result<ServerCart, ApiError> {
            Ok(ServerCart {
                items: self.items.lock().unwrap().clone(),
            })
        }

        async fn add_item(
            &self,
            _session: &ApiSession,
            item: &AddToCartRequest,
        ) -> Result<(), ApiError> {
            self.added.lock().unwrap().push(item.clone());

            if self.failing.contains(&item.product_id) {
                return Err(ApiError::Rejected("Out of stock".to_string()));
            }
            let product = self
                .catalogue
                .get(&item.product_id)
                .ok_or_else(|| ApiError::NotFound(format!("product {}", item.product_id)))?;
            let variant = item.variant_id.and_then(|id| product.variant(id)).cloned();

            let mut items = self.items.lock().unwrap();
            if let Some(existing) = items.iter_mut().find(|i| {
                i.product.id == item.product_id && i.variant.as_ref().map(|v| v.id) == item.variant_id
            }) {
                existing.quantity += item.quantity;
                return Ok(());
            }

            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            items.push(ServerCartItem {
                id: CartItemId::new(*next_id),
                product: product.clone(),
                variant,
                quantity: item.quantity,
            });
            Ok(())
        }

        async fn update_item(
            &self,
            _session: &ApiSession,
            id: CartItemId,
            quantity: u32,
        ) -> Result<(), ApiError> {
            let mut items = self.items.lock().unwrap();
            let item = items
                .iter_mut()
                .find(|i| i.id == id)
                .ok_or_else(|| ApiError::NotFound(format!("cart item {id}")))?;
            item.quantity = quantity;
            Ok(())
        }

        async fn remove_item(&self, _session: &ApiSession, id: CartItemId) -> Result<(), ApiError> {
            let mut items = self.items.lock().unwrap();
            let before = items.len();
            items.retain(|i| i.id != id);
            if items.len() == before {
                return Err(ApiError::NotFound(format!("cart item {id}")));
            }
            Ok(())
        }

        async fn clear(&self, _session: &ApiSession) -> Result<(), ApiError> {
            self.items.lock().unwrap().clear();
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::testing::{MemoryBackend, product};
    use super::*;

    fn session() -> ApiSession {
        ApiSession::new("sid=test")
    }

    #[test]
    fn test_snapshot_totals() {
        let mut cart = GuestCart::default();
        let rice = product(1, 60, 5);
        cart.add(&rice, None, 2).unwrap();
        cart.add(&rice, rice.variants.get(1), 1).unwrap();

        let snapshot = cart.snapshot();
        // 2 × 60 + 1 × 120
        assert_eq!(snapshot.subtotal(), Decimal::from(240));
        // 3 units × 5
        assert_eq!(snapshot.delivery_total(), Decimal::from(15));
        assert_eq!(snapshot.item_count(), 3);
    }

    #[test]
    fn test_select_preserves_cart_order() {
        let mut cart = GuestCart::default();
        cart.add(&product(1, 10, 0), None, 1).unwrap();
        cart.add(&product(2, 20, 0), None, 1).unwrap();
        cart.add(&product(3, 30, 0), None, 1).unwrap();
        let snapshot = cart.snapshot();

        let ids = vec![
            CartLineId::guest(ProductId::new(3), None),
            CartLineId::guest(ProductId::new(1), None),
        ];
        let selected = snapshot.select(&ids).unwrap();
        let names: Vec<_> = selected.lines.iter().map(|l| l.product_name.as_str()).collect();
        assert_eq!(names, vec!["Product 1", "Product 3"]);

        let all = snapshot.select(&[]).unwrap();
        assert_eq!(all.lines.len(), 3);

        let missing = snapshot.select(&[CartLineId::guest(ProductId::new(9), None)]);
        assert!(matches!(missing, Err(CartError::LineNotFound(_))));
    }

    #[tokio::test]
    async fn test_member_add_and_update() {
        let backend = MemoryBackend::with_products([product(1, 50, 0)]);
        let service = CartService::new(&backend);
        let session = session();
        let item = product(1, 50, 0);

        service
            .add(CartOwner::Member(&session), &item, None, 2)
            .await
            .unwrap();
        service
            .add(CartOwner::Member(&session), &item, None, 1)
            .await
            .unwrap();

        let snapshot = service.load(CartOwner::Member(&session)).await.unwrap();
        assert_eq!(snapshot.source, CartSource::Server);
        assert_eq!(snapshot.lines.len(), 1);
        assert_eq!(snapshot.item_count(), 3);

        let id = snapshot.lines[0].id.clone();
        service
            .update_quantity(CartOwner::Member(&session), &id, 7)
            .await
            .unwrap();
        assert_eq!(backend.quantity_of(ProductId::new(1), None), 7);
    }

    #[tokio::test]
    async fn test_rejects_zero_quantity() {
        let backend = MemoryBackend::default();
        let service = CartService::new(&backend);
        let mut guest = GuestCart::default();

        let result = service
            .add(CartOwner::Guest(&mut guest), &product(1, 10, 0), None, 0)
            .await;
        assert!(matches!(result, Err(CartError::InvalidQuantity)));
        assert!(guest.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_out_of_stock() {
        let backend = MemoryBackend::default();
        let service = CartService::new(&backend);
        let mut guest = GuestCart::default();
        let mut sold_out = product(4, 10, 0);
        sold_out.in_stock = false;

        let result = service
            .add(CartOwner::Guest(&mut guest), &sold_out, None, 1)
            .await;
        assert!(matches!(result, Err(CartError::OutOfStock(_))));
    }

    #[tokio::test]
    async fn test_wrong_source_line_id() {
        let backend = MemoryBackend::default();
        let service = CartService::new(&backend);
        let session = session();

        let guest_id = CartLineId::guest(ProductId::new(1), None);
        let result = service
            .remove(CartOwner::Member(&session), &guest_id)
            .await;
        assert!(matches!(result, Err(CartError::LineNotFound(_))));

        let mut guest = GuestCart::default();
        let server_id = CartLineId::Server(CartItemId::new(5));
        let result = service
            .update_quantity(CartOwner::Guest(&mut guest), &server_id, 2)
            .await;
        assert!(matches!(result, Err(CartError::LineNotFound(_))));
    }

    #[tokio::test]
    async fn test_member_clear() {
        let backend = MemoryBackend::with_products([product(1, 10, 0), product(2, 10, 0)]);
        let service = CartService::new(&backend);
        let session = session();

        for p in [product(1, 10, 0), product(2, 10, 0)] {
            service
                .add(CartOwner::Member(&session), &p, None, 1)
                .await
                .unwrap();
        }
        assert_eq!(backend.line_count(), 2);

        service.clear(CartOwner::Member(&session)).await.unwrap();
        assert_eq!(backend.line_count(), 0);
    }
}
