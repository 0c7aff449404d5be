//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                           - Product listing
//! GET  /products/{id}              - Product detail
//!
//! # Cart (guest or server, chosen per request)
//! GET  /cart                       - Cart page
//! POST /cart/add                   - Add item
//! POST /cart/update                - Set quantity
//! POST /cart/remove                - Remove one line
//! POST /cart/clear                 - Empty the cart
//!
//! # Checkout (requires auth)
//! GET  /checkout                   - Address, payment and quote
//! POST /checkout                   - Place order
//! POST /checkout/coupon            - Apply coupon
//! POST /checkout/coupon/remove     - Remove coupon
//! GET  /orders/{id}/confirmation   - Order placed
//!
//! # Auth (one-time passcode)
//! GET  /auth/login                 - Email form
//! POST /auth/otp/request           - Send passcode
//! GET  /auth/otp/verify            - Passcode form
//! POST /auth/otp/verify            - Verify passcode
//! GET  /auth/register              - Profile form for new emails
//! POST /auth/register              - Complete registration
//! POST /auth/logout                - Logout
//!
//! # Account (requires auth)
//! GET  /account                    - Profile
//! POST /account/profile            - Update profile
//! GET  /account/orders             - Order history
//! GET  /account/wallet             - Balance, ledger and redemption policy
//! GET  /account/addresses          - Address book
//! POST /account/addresses          - Create address
//! POST /account/addresses/{id}     - Update address
//! POST /account/addresses/{id}/delete - Delete address
//! GET  /account/wishlist           - Wishlist
//! POST /wishlist/add               - Add product
//! POST /wishlist/{id}/remove       - Remove product
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod products;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post},
};
use rust_decimal::Decimal;
use tower_sessions::Session;
use tracing::warn;

use tradepost_core::{CurrencyCode, Price};

use crate::error::AppError;
use crate::middleware::{Flash, Flashes, auth_rate_limiter, cart_rate_limiter, push_flash};
use crate::models::CurrentUser;
use crate::state::AppState;

// =============================================================================
// Shared view data
// =============================================================================

/// Signed-in user summary for the page header.
#[derive(Clone)]
pub struct UserBadge {
    pub name: String,
    pub is_seller: bool,
}

/// Data every page template needs for `base.html`.
#[derive(Clone, Default)]
pub struct Layout {
    pub user: Option<UserBadge>,
    pub flashes: Vec<Flash>,
}

impl Layout {
    #[must_use]
    pub fn new(user: Option<&CurrentUser>, Flashes(flashes): Flashes) -> Self {
        Self {
            user: user.map(|u| UserBadge {
                name: u.display_name().to_string(),
                is_seller: u.role.is_seller(),
            }),
            flashes,
        }
    }
}

/// Format an amount in the store currency.
#[must_use]
pub fn money(amount: Decimal, currency: CurrencyCode) -> String {
    Price::new(amount, currency).display()
}

/// Accept only same-site relative paths as redirect targets.
#[must_use]
pub fn safe_return_to(target: Option<&str>, fallback: &str) -> String {
    target
        .filter(|t| t.starts_with('/') && !t.starts_with("//") && !t.contains('\\'))
        .unwrap_or(fallback)
        .to_string()
}

/// Report a failed form action as a flash message.
///
/// Expired backend sessions are returned so the caller redirects to login.
///
/// # Errors
///
/// Returns `error` itself when the backend session expired.
pub async fn flash_failure(session: &Session, error: AppError) -> Result<(), AppError> {
    if error.is_session_expired() {
        return Err(error);
    }
    if error.status().is_server_error() {
        warn!(error = %error, "Action failed");
    }
    push_flash(session, Flash::error(error.user_message())).await;
    Ok(())
}

// =============================================================================
// Routers
// =============================================================================

/// Cart routes. Mutations are rate limited.
pub fn cart_routes() -> Router<AppState> {
    let mutations = Router::new()
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/clear", post(cart::clear))
        .layer(cart_rate_limiter());

    Router::new().route("/", get(cart::show)).merge(mutations)
}

/// Checkout routes.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(checkout::show).post(checkout::place_order))
        .route("/coupon", post(checkout::apply_coupon))
        .route("/coupon/remove", post(checkout::remove_coupon))
        .layer(cart_rate_limiter())
}

/// Auth routes. Passcode endpoints are rate limited.
pub fn auth_routes() -> Router<AppState> {
    let otp = Router::new()
        .route("/otp/request", post(auth::request_code))
        .route("/otp/verify", get(auth::verify_page).post(auth::verify_code))
        .layer(auth_rate_limiter());

    Router::new()
        .route("/login", get(auth::login_page))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
        .merge(otp)
}

/// Account routes.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/profile", post(account::update_profile))
        .route("/orders", get(account::orders))
        .route("/wallet", get(account::wallet))
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route("/addresses/{id}", post(account::update_address))
        .route("/addresses/{id}/delete", post(account::delete_address))
        .route("/wishlist", get(wishlist::index))
}

/// Create all page routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/products/{id}", get(products::show))
        .nest("/cart", cart_routes())
        .nest("/checkout", checkout_routes())
        .route("/orders/{id}/confirmation", get(checkout::confirmation))
        .nest("/auth", auth_routes())
        .nest("/account", account_routes())
        .route("/wishlist/add", post(wishlist::add))
        .route("/wishlist/{id}/remove", post(wishlist::remove))
}
