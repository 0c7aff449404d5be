//! Checkout order assembly.
//!
//! An [`OrderDraft`] is always priced from the current cart; totals posted
//! by the checkout form are never trusted.

use thiserror::Error;

use tradepost_core::{AddressId, CartLineId, PaymentMethod};

use super::address::AddressError;
use super::cart::{CartError, CartSnapshot, CartSource};
use super::pricing::{CheckoutQuote, WalletRequest};
use crate::api::ApiError;
use crate::api::types::{Address, AddressInput, Coupon, CreateOrderRequest, OrderLineRequest};

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing was selected, or the cart is empty.
    #[error("no items selected for checkout")]
    EmptySelection,

    /// A selected line is not in the cart.
    #[error("selected item is no longer in the cart: {0}")]
    UnknownLine(CartLineId),

    /// Guest carts must be merged into an account before checkout.
    #[error("sign in to check out")]
    GuestCart,

    /// Neither a saved nor a new address was provided.
    #[error("shipping address is required")]
    MissingAddress,

    /// The new address failed validation.
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    /// Backend error while pricing or placing the order.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CheckoutError {
    /// A message that is safe to show on the checkout page.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::EmptySelection => "Select at least one item to check out".to_string(),
            Self::UnknownLine(_) => "Your cart changed, please review it and try again".to_string(),
            Self::GuestCart => "Please sign in to place your order".to_string(),
            Self::MissingAddress => "Please choose or enter a shipping address".to_string(),
            Self::InvalidAddress(e) => {
                let message = e.to_string();
                let mut chars = message.chars();
                chars.next().map_or_else(String::new, |first| {
                    first.to_uppercase().chain(chars).collect()
                })
            }
            Self::Api(e) => e.user_message(),
        }
    }
}

impl From<CartError> for CheckoutError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::LineNotFound(id) => Self::UnknownLine(id),
            CartError::Api(e) => Self::Api(e),
            CartError::InvalidQuantity | CartError::OutOfStock(_) => Self::EmptySelection,
        }
    }
}

/// Where the order ships.
#[derive(Debug, Clone)]
pub enum ShippingChoice {
    /// A saved address from the address book.
    Saved(Address),
    /// An address entered on the checkout form.
    New(AddressInput),
}

impl ShippingChoice {
    fn into_parts(self) -> (Option<AddressId>, AddressInput) {
        match self {
            Self::Saved(address) => (Some(address.id), address.fields),
            Self::New(input) => (None, input),
        }
    }
}

/// A priced order ready to post.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    /// The selected lines.
    pub lines: CartSnapshot,
    pub quote: CheckoutQuote,
    pub request: CreateOrderRequest,
}

impl OrderDraft {
    /// Select lines from the cart, price them and assemble the order request.
    ///
    /// An empty `selection` checks out the whole cart.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::GuestCart` for guest carts,
    /// `CheckoutError::UnknownLine` for stale selections,
    /// `CheckoutError::EmptySelection` when nothing is left to buy, or
    /// `CheckoutError::MissingAddress` when no shipping address was chosen.
    pub fn build(
        cart: &CartSnapshot,
        selection: &[CartLineId],
        shipping: Option<ShippingChoice>,
        payment_method: PaymentMethod,
        coupon: Option<&Coupon>,
        wallet: Option<WalletRequest<'_>>,
    ) -> Result<Self, CheckoutError> {
        if cart.source == CartSource::Guest {
            return Err(CheckoutError::GuestCart);
        }

        let lines = cart.select(selection)?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptySelection);
        }

        let (address_id, shipping_address) = shipping
            .ok_or(CheckoutError::MissingAddress)?
            .into_parts();

        let items = lines
            .lines
            .iter()
            .map(|line| match &line.id {
                CartLineId::Server(id) => Ok(OrderLineRequest {
                    cart_item_id: *id,
                    product_id: line.product_id,
                    variant_id: line.variant_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                }),
                CartLineId::Guest(_) => Err(CheckoutError::GuestCart),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let quote = CheckoutQuote::compute(&lines, coupon.map(|c| c.discount), wallet);

        let request = CreateOrderRequest {
            items,
            address_id,
            shipping_address,
            payment_method,
            coupon_code: coupon.map(|c| c.code.clone()),
            subtotal: quote.subtotal,
            delivery_charge: quote.delivery,
            wallet_discount: quote.wallet_discount,
            coupon_discount: quote.coupon_discount,
            total: quote.total,
        };

        Ok(Self {
            lines,
            quote,
            request,
        })
    }
}
