//! Guest cart kept in the visitor's session record.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

use tradepost_core::{CartLineId, ProductId, VariantId};

use super::{CartError, CartLine, CartSnapshot, CartSource};
use crate::api::types::{Product, Variant};
use crate::models::session_keys;

/// Cart for anonymous visitors.
///
/// Lines are keyed by a synthesized `g-{product}-{variant}` id, so adding
/// the same (product, variant) twice merges into one line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestCart {
    lines: Vec<CartLine>,
}

impl GuestCart {
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
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

    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            source: CartSource::Guest,
            lines: self.lines.clone(),
        }
    }

    /// Add units of a product, merging into an existing line for the same
    /// (product, variant).
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for zero.
    pub fn add(
        &mut self,
        product: &Product,
        variant: Option<&Variant>,
        quantity: u32,
    ) -> Result<&CartLine, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        let variant_id = variant.map(|v| v.id);
        let index = match self.position(product.id, variant_id) {
            Some(index) => {
                let line = &mut self.lines[index];
                line.quantity = line.quantity.saturating_add(quantity);
                index
            }
            None => {
                let id = CartLineId::guest(product.id, variant_id);
                self.lines
                    .push(CartLine::from_product(id, product, variant, quantity));
                self.lines.len() - 1
            }
        };

        Ok(&self.lines[index])
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for zero or
    /// `CartError::LineNotFound` for an unknown id.
    pub fn update_quantity(&mut self, id: &CartLineId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| CartError::LineNotFound(id.clone()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove exactly the line with this id.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` for an unknown id.
    pub fn remove(&mut self, id: &CartLineId) -> Result<CartLine, CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| CartError::LineNotFound(id.clone()))?;
        Ok(self.lines.remove(index))
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn position(&self, product_id: ProductId, variant_id: Option<VariantId>) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.is_item(product_id, variant_id))
    }
}

// =============================================================================
// Session persistence
// =============================================================================

/// Load the guest cart from the session.
///
/// A missing or unreadable record yields an empty cart.
pub async fn load_guest_cart(session: &Session) -> GuestCart {
    match session.get::<GuestCart>(session_keys::GUEST_CART).await {
        Ok(cart) => cart.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "Discarding unreadable guest cart");
            GuestCart::default()
        }
    }
}

/// Persist the guest cart, removing the record when it is empty.
///
/// # Errors
///
/// Returns an error if the session store write fails.
pub async fn save_guest_cart(
    session: &Session,
    cart: &GuestCart,
) -> Result<(), tower_sessions::session::Error> {
    if cart.is_empty() {
        session
            .remove::<GuestCart>(session_keys::GUEST_CART)
            .await?;
    } else {
        session.insert(session_keys::GUEST_CART, cart).await?;
    }
    Ok(())
}
