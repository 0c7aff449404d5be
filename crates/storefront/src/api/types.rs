//! Wire types for the Tradepost REST API.
//!
//! These mirror the JSON bodies the backend sends and accepts. Monetary
//! fields are `Decimal` and accept either JSON strings or numbers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tradepost_core::{
    AddressId, CartItemId, CategoryId, Email, OrderId, OrderStatus, PaymentMethod, PaymentStatus,
    Phone, ProductId, UserId, UserRole, VariantId, WalletTransactionKind,
};

// =============================================================================
// Catalogue
// =============================================================================

/// Product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A purchasable variant of a product (size, colour, pack).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub name: String,
    /// Overrides the product price when present.
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// A catalogue product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    /// Delivery charge per unit.
    #[serde(default)]
    pub delivery_charge: Decimal,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    #[serde(default)]
    pub seller_id: Option<UserId>,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

const fn default_true() -> bool {
    true
}

impl Product {
    /// Find a variant by id.
    #[must_use]
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    /// Unit price for the given variant, falling back to the product price.
    #[must_use]
    pub fn unit_price(&self, variant: Option<&Variant>) -> Decimal {
        variant.and_then(|v| v.price).unwrap_or(self.price)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// An item in the authenticated user's server cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCartItem {
    pub id: CartItemId,
    pub product: Product,
    #[serde(default)]
    pub variant: Option<Variant>,
    pub quantity: u32,
}

/// Body of `GET /api/cart`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCart {
    #[serde(default)]
    pub items: Vec<ServerCartItem>,
}

/// Body of `POST /api/cart`.
///
/// The backend merges quantities when the (product, variant) pair is
/// already in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

/// Body of `PATCH /api/cart/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

// =============================================================================
// Users & Auth
// =============================================================================

/// A backend user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<Phone>,
    #[serde(default)]
    pub role: UserRole,
}

/// Body of `POST /api/auth/otp/request`.
#[derive(Debug, Clone, Serialize)]
pub struct OtpRequest<'a> {
    pub email: &'a Email,
}

/// Body of `POST /api/auth/otp/verify`.
#[derive(Debug, Clone, Serialize)]
pub struct OtpVerifyRequest<'a> {
    pub email: &'a Email,
    pub code: &'a str,
}

/// Response of `POST /api/auth/otp/verify`.
#[derive(Debug, Clone, Deserialize)]
pub struct OtpVerifyResponse {
    /// Present for existing accounts.
    #[serde(default)]
    pub user: Option<User>,
    /// Set when the email has no account yet.
    #[serde(default)]
    pub needs_registration: bool,
}

/// Body of `POST /api/auth/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub role: UserRole,
}

/// Body of `PUT /api/user`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateProfileRequest<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<&'a Phone>,
}

// =============================================================================
// Addresses
// =============================================================================

/// Address fields shared by saved addresses and inline checkout addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    pub full_name: String,
    pub phone: Phone,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    #[serde(default)]
    pub is_default: bool,
}

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    #[serde(flatten)]
    pub fields: AddressInput,
}

// =============================================================================
// Wallet & Coupons
// =============================================================================

/// A wallet ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub kind: WalletTransactionKind,
    pub amount: Decimal,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `GET /api/wallet`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub balance: Decimal,
    #[serde(default)]
    pub transactions: Vec<WalletTransaction>,
}

/// Body of `GET /api/wallet/settings`: the store-wide wallet redemption policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSettings {
    /// Master switch for wallet redemption.
    pub active: bool,
    /// Maximum share of the order value redeemable, in percent.
    #[serde(default = "default_percentage_cap")]
    pub percentage_cap: Decimal,
    /// Minimum cart subtotal before the wallet can be used.
    #[serde(default)]
    pub min_cart_value: Decimal,
    /// Minimum redeemable amount; smaller caps are not offered.
    #[serde(default)]
    pub min_discount_value: Decimal,
    /// Categories whose products may be paid with wallet credit. Empty allows all.
    #[serde(default)]
    pub allowed_categories: Vec<CategoryId>,
}

fn default_percentage_cap() -> Decimal {
    Decimal::from(5)
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            active: false,
            percentage_cap: default_percentage_cap(),
            min_cart_value: Decimal::ZERO,
            min_discount_value: Decimal::ZERO,
            allowed_categories: Vec::new(),
        }
    }
}

/// Body of `POST /api/coupons/validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateCouponRequest<'a> {
    pub code: &'a str,
    pub subtotal: Decimal,
}

/// Discount carried by a coupon or voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CouponDiscount {
    /// Percentage of the goods subtotal.
    Percentage(Decimal),
    /// Fixed monetary amount (vouchers).
    Fixed(Decimal),
}

/// A coupon accepted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    pub discount: CouponDiscount,
}

// =============================================================================
// Orders
// =============================================================================

/// One line of an order request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderLineRequest {
    pub cart_item_id: CartItemId,
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_id: Option<AddressId>,
    pub shipping_address: AddressInput,
    pub payment_method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    pub subtotal: Decimal,
    pub delivery_charge: Decimal,
    pub wallet_discount: Decimal,
    pub coupon_discount: Decimal,
    pub total: Decimal,
}

/// A line of a placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    #[serde(default)]
    pub variant_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    #[serde(default)]
    pub delivery_charge: Decimal,
    #[serde(default)]
    pub wallet_discount: Decimal,
    #[serde(default)]
    pub coupon_discount: Decimal,
    pub total: Decimal,
    pub shipping_address: AddressInput,
    pub created_at: DateTime<Utc>,
    /// Hosted payment page for online payments.
    #[serde(default)]
    pub payment_url: Option<String>,
}

// =============================================================================
// Wishlist
// =============================================================================

/// A wishlist entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WishlistItem {
    pub product: Product,
    pub added_at: DateTime<Utc>,
}

/// Body of `POST /api/wishlist`.
#[derive(Debug, Clone, Serialize)]
pub struct AddToWishlistRequest {
    pub product_id: ProductId,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_defaults() {
        let product: Product =
            serde_json::from_str(r#"{"id": 3, "name": "Mango", "price": "120.00"}"#).unwrap();
        assert_eq!(product.delivery_charge, Decimal::ZERO);
        assert!(product.in_stock);
        assert!(product.variants.is_empty());
    }

    #[test]
    fn test_unit_price_prefers_variant() {
        let product: Product = serde_json::from_str(
            r#"{"id": 3, "name": "Rice", "price": "60",
                "variants": [{"id": 1, "name": "1kg"}, {"id": 2, "name": "5kg", "price": "280"}]}"#,
        )
        .unwrap();

        let one_kg = product.variant(VariantId::new(1));
        let five_kg = product.variant(VariantId::new(2));
        assert_eq!(product.unit_price(one_kg), Decimal::from(60));
        assert_eq!(product.unit_price(five_kg), Decimal::from(280));
        assert_eq!(product.unit_price(None), Decimal::from(60));
    }

    #[test]
    fn test_coupon_discount_wire_format() {
        let coupon: Coupon = serde_json::from_str(
            r#"{"code": "SAVE10", "discount": {"type": "percentage", "value": "10"}}"#,
        )
        .unwrap();
        assert_eq!(
            coupon.discount,
            CouponDiscount::Percentage(Decimal::from(10))
        );
    }

    #[test]
    fn test_wallet_settings_default_cap() {
        let settings: WalletSettings = serde_json::from_str(r#"{"active": true}"#).unwrap();
        assert_eq!(settings.percentage_cap, Decimal::from(5));
        assert!(settings.allowed_categories.is_empty());
    }

    #[test]
    fn test_address_flattened() {
        let address: Address = serde_json::from_str(
            r#"{"id": 8, "full_name": "Asha Rao", "phone": "9876543210",
                "line1": "12 MG Road", "city": "Pune", "state": "MH", "postal_code": "411001"}"#,
        )
        .unwrap();
        assert_eq!(address.id, AddressId::new(8));
        assert_eq!(address.fields.city, "Pune");
        assert!(!address.fields.is_default);
    }
}
