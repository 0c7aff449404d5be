//! Folding a guest cart into the server cart after sign-in.

use tracing::{info, instrument, warn};

use tradepost_core::CartLineId;

use super::{CartBackend, CartSnapshot, GuestCart};
use crate::api::ApiSession;
use crate::api::types::AddToCartRequest;

/// Outcome of a guest cart merge.
#[derive(Debug)]
pub struct MergeReport {
    /// Lines the backend accepted.
    pub submitted: usize,
    /// Lines the backend rejected; they are dropped, not retried.
    pub failed: Vec<CartLineId>,
    /// Server cart after the merge, if it could be refetched.
    pub cart: Option<CartSnapshot>,
}

impl MergeReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Submit every guest line to the server cart, then clear the guest cart.
///
/// Lines are sent one at a time in cart order; the backend sums quantities
/// for (product, variant) pairs it already holds. A failed line is logged
/// and skipped. The guest cart is cleared even when some lines fail, so the
/// caller must persist it afterwards.
///
/// Returns `None` when there was nothing to merge.
#[instrument(skip_all, fields(lines = guest.lines().len()))]
pub async fn merge_guest_cart<B: CartBackend>(
    backend: &B,
    session: &ApiSession,
    guest: &mut GuestCart,
) -> Option<MergeReport> {
    if guest.is_empty() {
        return None;
    }

    let mut submitted = 0;
    let mut failed = Vec::new();

    for line in guest.lines() {
        let item = AddToCartRequest {
            product_id: line.product_id,
            variant_id: line.variant_id,
            quantity: line.quantity,
        };

        match backend.add_item(session, &item).await {
            Ok(()) => submitted += 1,
            Err(e) => {
                warn!(line = %line.id, error = %e, "Dropping guest cart line during merge");
                failed.push(line.id.clone());
            }
        }
    }

    guest.clear();

    let cart = match backend.fetch_cart(session).await {
        Ok(cart) => Some(CartSnapshot::from_server(&cart)),
        Err(e) => {
            warn!(error = %e, "Failed to refetch cart after merge");
            None
        }
    };

    info!(submitted, failed = failed.len(), "Merged guest cart");

    Some(MergeReport {
        submitted,
        failed,
        cart,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tradepost_core::ProductId;

    use super::super::testing::{MemoryBackend, product};
    use super::super::{CartOwner, CartService};
    use super::*;

    fn session() -> ApiSession {
        ApiSession::new("sid=member")
    }

    #[tokio::test]
    async fn test_merge_sums_quantities() {
        let rice = product(1, 60, 5);
        let oil = product(2, 150, 10);
        let backend = MemoryBackend::with_products([rice.clone(), oil.clone()]);
        let session = session();

        // Server already holds 2 × rice
        CartService::new(&backend)
            .add(CartOwner::Member(&session), &rice, None, 2)
            .await
            .unwrap();

        let mut guest = GuestCart::default();
        guest.add(&rice, None, 3).unwrap();
        guest.add(&oil, oil.variants.first(), 1).unwrap();
        guest.add(&oil, oil.variants.get(1), 4).unwrap();

        let report = merge_guest_cart(&backend, &session, &mut guest)
            .await
            .unwrap();

        assert_eq!(report.submitted, 3);
        assert!(report.is_complete());
        assert!(guest.is_empty());
        assert_eq!(backend.quantity_of(rice.id, None), 5);
        assert_eq!(backend.quantity_of(oil.id, Some(oil.variants[0].id)), 1);
        assert_eq!(backend.quantity_of(oil.id, Some(oil.variants[1].id)), 4);

        let cart = report.cart.unwrap();
        assert_eq!(cart.lines.len(), 3);
        assert_eq!(cart.item_count(), 10);
    }

    #[tokio::test]
    async fn test_merge_submits_in_cart_order() {
        let products: Vec<_> = (1..=3).map(|id| product(id, 10, 0)).collect();
        let backend = MemoryBackend::with_products(products.clone());
        let mut guest = GuestCart::default();
        for p in products.iter().rev() {
            guest.add(p, None, 1).unwrap();
        }

        merge_guest_cart(&backend, &session(), &mut guest)
            .await
            .unwrap();

        let order: Vec<_> = backend
            .added
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.product_id.as_i32())
            .collect();
        assert_eq!(order, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_merge_continues_past_failures() {
        let products: Vec<_> = (1..=3).map(|id| product(id, 10, 0)).collect();
        let backend =
            MemoryBackend::with_products(products.clone()).failing_on(ProductId::new(2));
        let mut guest = GuestCart::default();
        for p in &products {
            guest.add(p, None, 2).unwrap();
        }

        let report = merge_guest_cart(&backend, &session(), &mut guest)
            .await
            .unwrap();

        assert_eq!(report.submitted, 2);
        assert_eq!(
            report.failed,
            vec![CartLineId::guest(ProductId::new(2), None)]
        );
        assert!(guest.is_empty());
        assert_eq!(backend.quantity_of(ProductId::new(1), None), 2);
        assert_eq!(backend.quantity_of(ProductId::new(2), None), 0);
        assert_eq!(backend.quantity_of(ProductId::new(3), None), 2);
    }

    #[tokio::test]
    async fn test_empty_guest_cart_is_noop() {
        let backend = MemoryBackend::default();
        let mut guest = GuestCart::default();

        let report = merge_guest_cart(&backend, &session(), &mut guest).await;

        assert!(report.is_none());
        assert!(backend.added.lock().unwrap().is_empty());
    }
}
