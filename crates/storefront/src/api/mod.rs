//! Tradepost REST API client.
//!
//! # Architecture
//!
//! - Plain JSON over HTTP with `reqwest`; the backend is the source of truth
//!   for catalogue, carts, orders, wallets, addresses and wishlists
//! - Session credentials are the backend's session cookie, captured at
//!   passcode verification and replayed as a `Cookie` header
//! - In-memory caching via `moka` for the catalogue and wallet policy (5 minute TTL)
//! - Cart and current-user reads retry a fixed number of times on transport
//!   errors and 5xx responses; nothing else is retried
//!
//! # Example
//!
//! ```rust,ignore
//! use tradepost_storefront::api::ApiClient;
//!
//! let client = ApiClient::new(&config.api)?;
//!
//! client.request_otp(&email).await?;
//! let (outcome, session) = client.verify_otp(&email, "482913").await?;
//! let cart = client.cart(&session).await?;
//! ```

mod cache;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::header::{COOKIE, HeaderMap, RETRY_AFTER, SET_COOKIE};
use reqwest::{Method, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use tradepost_core::{AddressId, CartItemId, Email, OrderId, ProductId};

use crate::config::ApiConfig;
use cache::{CacheValue, PRODUCTS_KEY, WALLET_SETTINGS_KEY, product_key};
use types::{
    AddToCartRequest, AddToWishlistRequest, Address, AddressInput, Coupon, CreateOrderRequest,
    Order, OtpRequest, OtpVerifyRequest, OtpVerifyResponse, Product, RegisterRequest, ServerCart,
    UpdateCartItemRequest, UpdateProfileRequest, User, ValidateCouponRequest, Wallet,
    WalletSettings, WishlistItem,
};

/// Extra attempts made by reads that tolerate a flaky backend.
const READ_RETRIES: u32 = 2;

/// Maximum number of body characters kept in error messages and logs.
const ERROR_BODY_LIMIT: usize = 200;

/// Errors that can occur when calling the REST API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The backend session is missing or expired.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the backend.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The backend refused the request with a user-facing message.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Any other non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// A login response did not carry a session cookie.
    #[error("Login response did not include a session cookie")]
    MissingSession,
}

impl ApiError {
    /// Whether a fixed-count retry may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// A message that is safe to show to shoppers.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected(message) => message.clone(),
            Self::NotFound(_) => "That item could not be found".to_string(),
            Self::Unauthorized | Self::MissingSession => {
                "Your session has expired, please sign in again".to_string()
            }
            Self::RateLimited(_) => "Too many requests, please try again shortly".to_string(),
            _ => "Something went wrong, please try again".to_string(),
        }
    }
}

/// Error body shape used by the backend for 4xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error")]
    message: String,
}

/// The backend's user-facing message, if the body is a JSON error with a
/// non-empty `message` or `error` field.
fn rejection_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.message.trim().chars().take(ERROR_BODY_LIMIT).collect::<String>())
        .filter(|m| !m.is_empty())
}

/// Map a non-success response to an [`ApiError`].
fn error_for_status(status: StatusCode, headers: &HeaderMap, body: &str, what: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound(what.to_string()),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            ApiError::RateLimited(retry_after)
        }
        s if s.is_client_error() => rejection_message(body).map_or_else(
            || ApiError::Status {
                status: s.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            },
            ApiError::Rejected,
        ),
        s => ApiError::Status {
            status: s.as_u16(),
            body: body.chars().take(ERROR_BODY_LIMIT).collect(),
        },
    }
}

/// Run `read`, retrying up to [`READ_RETRIES`] more times on retryable errors.
async fn retry_read<T, F, Fut>(what: &str, mut read: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        match read().await {
            Err(e) if e.is_retryable() && attempt < READ_RETRIES => {
                attempt += 1;
                warn!(error = %e, attempt, what, "Retrying API read");
            }
            other => return other,
        }
    }
}

// =============================================================================
// ApiSession
// =============================================================================

/// Backend session credentials, as a ready-to-send `Cookie` header value.
///
/// Stored in the visitor's session record. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiSession(String);

impl ApiSession {
    /// Wrap an existing cookie header value.
    #[must_use]
    pub fn new(cookie: impl Into<String>) -> Self {
        Self(cookie.into())
    }

    /// Capture the cookies set by a login response.
    ///
    /// Each `Set-Cookie` header contributes its `name=value` pair; attributes
    /// such as `Path` or `HttpOnly` are dropped.
    #[must_use]
    pub fn from_set_cookie(headers: &HeaderMap) -> Option<Self> {
        let pairs: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .map(str::trim)
            .filter(|pair| pair.contains('=') && !pair.starts_with('='))
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(Self(pairs.join("; ")))
        }
    }

    fn header_value(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiSession([REDACTED])")
    }
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Tradepost REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: String,
    cache: Cache<String, CacheValue>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("tradepost-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
                cache,
            }),
        })
    }

    /// Drop every cached catalogue and policy entry.
    pub fn invalidate_cache(&self) {
        self.inner.cache.invalidate_all();
    }

    fn request(&self, method: Method, path: &str, session: Option<&ApiSession>) -> RequestBuilder {
        let url = format!("{}{path}", self.inner.base_url);
        let builder = self
            .inner
            .client
            .request(method, url)
            .header("Accept", "application/json");

        match session {
            Some(session) => builder.header(COOKIE, session.header_value()),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = %status, what, "API returned non-success status");
            return Err(error_for_status(status, &headers, &body, what));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                what,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }

    /// Send a request whose response body is ignored.
    async fn send_empty(&self, request: RequestBuilder, what: &str) -> Result<(), ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(());
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        debug!(status = %status, what, "API returned non-success status");
        Err(error_for_status(status, &headers, &body, what))
    }

    /// GET with the fixed retry count for flaky reads.
    async fn get_with_retries<T: DeserializeOwned>(
        &self,
        path: &str,
        session: &ApiSession,
        what: &str,
    ) -> Result<T, ApiError> {
        retry_read(what, || {
            self.send(self.request(Method::GET, path, Some(session)), what)
        })
        .await
    }

    // =========================================================================
    // Auth
    // =========================================================================

    /// Ask the backend to email a one-time passcode.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the address or is unreachable.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn request_otp(&self, email: &Email) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, "/api/auth/otp/request", None)
            .json(&OtpRequest { email });
        self.send_empty(request, "otp request").await
    }

    /// Verify a passcode and capture the resulting backend session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` for a wrong or expired code and
    /// `ApiError::MissingSession` if the backend set no cookie.
    #[instrument(skip(self, code), fields(email = %email))]
    pub async fn verify_otp(
        &self,
        email: &Email,
        code: &str,
    ) -> Result<(OtpVerifyResponse, ApiSession), ApiError> {
        let response = self
            .request(Method::POST, "/api/auth/otp/verify", None)
            .json(&OtpVerifyRequest { email, code })
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(error_for_status(status, &headers, &body, "otp verify"));
        }

        let session = ApiSession::from_set_cookie(&headers).ok_or(ApiError::MissingSession)?;
        let outcome = serde_json::from_str(&body)?;
        Ok((outcome, session))
    }

    /// Complete registration for a verified email.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the profile.
    #[instrument(skip(self, session))]
    pub async fn register(
        &self,
        session: &ApiSession,
        request: &RegisterRequest<'_>,
    ) -> Result<User, ApiError> {
        let request = self
            .request(Method::POST, "/api/auth/register", Some(session))
            .json(request);
        self.send(request, "register").await
    }

    /// End the backend session.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    #[instrument(skip(self, session))]
    pub async fn logout(&self, session: &ApiSession) -> Result<(), ApiError> {
        let request = self.request(Method::POST, "/api/auth/logout", Some(session));
        self.send_empty(request, "logout").await
    }

    /// Fetch the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if the session has expired.
    #[instrument(skip(self, session))]
    pub async fn current_user(&self, session: &ApiSession) -> Result<User, ApiError> {
        self.get_with_retries("/api/user", session, "user").await
    }

    /// Update the signed-in user's profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the update.
    #[instrument(skip(self, session))]
    pub async fn update_profile(
        &self,
        session: &ApiSession,
        request: &UpdateProfileRequest<'_>,
    ) -> Result<User, ApiError> {
        let request = self
            .request(Method::PUT, "/api/user", Some(session))
            .json(request);
        self.send(request, "user").await
    }

    // =========================================================================
    // Catalogue
    // =========================================================================

    /// List the catalogue.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Arc<Vec<Product>>, ApiError> {
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(PRODUCTS_KEY).await {
            debug!("Cache hit for products");
            return Ok(products);
        }

        let products: Arc<Vec<Product>> = Arc::new(
            self.send(self.request(Method::GET, "/api/products", None), "products")
                .await?,
        );

        self.inner
            .cache
            .insert(
                PRODUCTS_KEY.to_string(),
                CacheValue::Products(Arc::clone(&products)),
            )
            .await;

        Ok(products)
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not found or the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: ProductId) -> Result<Product, ApiError> {
        let cache_key = product_key(id);

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let product: Product = self
            .send(
                self.request(Method::GET, &format!("/api/products/{id}"), None),
                &format!("product {id}"),
            )
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    // =========================================================================
    // Cart
    // =========================================================================

    /// Fetch the server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails after retries.
    #[instrument(skip(self, session))]
    pub async fn cart(&self, session: &ApiSession) -> Result<ServerCart, ApiError> {
        self.get_with_retries("/api/cart", session, "cart").await
    }

    /// Add an item to the server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the item (e.g. out of stock).
    #[instrument(skip(self, session))]
    pub async fn add_to_cart(
        &self,
        session: &ApiSession,
        item: &AddToCartRequest,
    ) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, "/api/cart", Some(session))
            .json(item);
        self.send_empty(request, "cart").await
    }

    /// Set the quantity of a server cart item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item does not exist or the quantity is rejected.
    #[instrument(skip(self, session))]
    pub async fn update_cart_item(
        &self,
        session: &ApiSession,
        id: CartItemId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let request = self
            .request(Method::PATCH, &format!("/api/cart/{id}"), Some(session))
            .json(&UpdateCartItemRequest { quantity });
        self.send_empty(request, &format!("cart item {id}")).await
    }

    /// Remove an item from the server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the item does not exist.
    #[instrument(skip(self, session))]
    pub async fn remove_cart_item(
        &self,
        session: &ApiSession,
        id: CartItemId,
    ) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, &format!("/api/cart/{id}"), Some(session));
        self.send_empty(request, &format!("cart item {id}")).await
    }

    /// Empty the server cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn clear_cart(&self, session: &ApiSession) -> Result<(), ApiError> {
        let request = self.request(Method::DELETE, "/api/cart", Some(session));
        self.send_empty(request, "cart").await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// List the signed-in user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn orders(&self, session: &ApiSession) -> Result<Vec<Order>, ApiError> {
        self.send(self.request(Method::GET, "/api/orders", Some(session)), "orders")
            .await
    }

    /// Get a single order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the order does not belong to the user.
    #[instrument(skip(self, session), fields(order_id = %id))]
    pub async fn order(&self, session: &ApiSession, id: OrderId) -> Result<Order, ApiError> {
        self.send(
            self.request(Method::GET, &format!("/api/orders/{id}"), Some(session)),
            &format!("order {id}"),
        )
        .await
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the order.
    #[instrument(skip(self, session, order), fields(lines = order.items.len()))]
    pub async fn create_order(
        &self,
        session: &ApiSession,
        order: &CreateOrderRequest,
    ) -> Result<Order, ApiError> {
        let request = self
            .request(Method::POST, "/api/orders", Some(session))
            .json(order);
        self.send(request, "order").await
    }

    // =========================================================================
    // Wallet & Coupons
    // =========================================================================

    /// Fetch the wallet balance and ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn wallet(&self, session: &ApiSession) -> Result<Wallet, ApiError> {
        self.send(self.request(Method::GET, "/api/wallet", Some(session)), "wallet")
            .await
    }

    /// Fetch the store-wide wallet redemption policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn wallet_settings(&self, session: &ApiSession) -> Result<WalletSettings, ApiError> {
        if let Some(CacheValue::WalletSettings(settings)) =
            self.inner.cache.get(WALLET_SETTINGS_KEY).await
        {
            debug!("Cache hit for wallet settings");
            return Ok(settings);
        }

        let settings: WalletSettings = self
            .send(
                self.request(Method::GET, "/api/wallet/settings", Some(session)),
                "wallet settings",
            )
            .await?;

        self.inner
            .cache
            .insert(
                WALLET_SETTINGS_KEY.to_string(),
                CacheValue::WalletSettings(settings.clone()),
            )
            .await;

        Ok(settings)
    }

    /// Validate a coupon code against the current subtotal.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Rejected` or `ApiError::NotFound` for unusable codes.
    #[instrument(skip(self, session))]
    pub async fn validate_coupon(
        &self,
        session: &ApiSession,
        code: &str,
        subtotal: Decimal,
    ) -> Result<Coupon, ApiError> {
        let request = self
            .request(Method::POST, "/api/coupons/validate", Some(session))
            .json(&ValidateCouponRequest { code, subtotal });
        self.send(request, &format!("coupon {code}")).await
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// List saved addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn addresses(&self, session: &ApiSession) -> Result<Vec<Address>, ApiError> {
        self.send(
            self.request(Method::GET, "/api/addresses", Some(session)),
            "addresses",
        )
        .await
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the address.
    #[instrument(skip(self, session, address))]
    pub async fn create_address(
        &self,
        session: &ApiSession,
        address: &AddressInput,
    ) -> Result<Address, ApiError> {
        let request = self
            .request(Method::POST, "/api/addresses", Some(session))
            .json(address);
        self.send(request, "address").await
    }

    /// Replace a saved address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not exist or is rejected.
    #[instrument(skip(self, session, address), fields(address_id = %id))]
    pub async fn update_address(
        &self,
        session: &ApiSession,
        id: AddressId,
        address: &AddressInput,
    ) -> Result<Address, ApiError> {
        let request = self
            .request(Method::PUT, &format!("/api/addresses/{id}"), Some(session))
            .json(address);
        self.send(request, &format!("address {id}")).await
    }

    /// Delete a saved address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address does not exist.
    #[instrument(skip(self, session), fields(address_id = %id))]
    pub async fn delete_address(&self, session: &ApiSession, id: AddressId) -> Result<(), ApiError> {
        let request = self.request(
            Method::DELETE,
            &format!("/api/addresses/{id}"),
            Some(session),
        );
        self.send_empty(request, &format!("address {id}")).await
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// List wishlist entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn wishlist(&self, session: &ApiSession) -> Result<Vec<WishlistItem>, ApiError> {
        self.send(
            self.request(Method::GET, "/api/wishlist", Some(session)),
            "wishlist",
        )
        .await
    }

    /// Add a product to the wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn add_to_wishlist(
        &self,
        session: &ApiSession,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, "/api/wishlist", Some(session))
            .json(&AddToWishlistRequest { product_id });
        self.send_empty(request, "wishlist").await
    }

    /// Remove a product from the wishlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, session))]
    pub async fn remove_from_wishlist(
        &self,
        session: &ApiSession,
        product_id: ProductId,
    ) -> Result<(), ApiError> {
        let request = self.request(
            Method::DELETE,
            &format!("/api/wishlist/{product_id}"),
            Some(session),
        );
        self.send_empty(request, "wishlist").await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_session_from_set_cookie() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static("sid=abc123; Path=/; HttpOnly; SameSite=Lax"),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("csrf=xyz; Path=/"));

        let session = ApiSession::from_set_cookie(&headers);
        assert_eq!(session, Some(ApiSession::new("sid=abc123; csrf=xyz")));
    }

    #[test]
    fn test_session_from_set_cookie_missing() {
        let headers = HeaderMap::new();
        assert!(ApiSession::from_set_cookie(&headers).is_none());

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("; Path=/"));
        assert!(ApiSession::from_set_cookie(&headers).is_none());
    }

    #[test]
    fn test_session_debug_redacted() {
        let session = ApiSession::new("sid=very-secret");
        let debug = format!("{session:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_error_for_status_mapping() {
        let headers = HeaderMap::new();

        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, &headers, "", "cart"),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, &headers, "", "order 4"),
            ApiError::NotFound(what) if what == "order 4"
        ));
        assert!(matches!(
            error_for_status(StatusCode::BAD_GATEWAY, &headers, "upstream", "cart"),
            ApiError::Status { status: 502, .. }
        ));
    }

    #[test]
    fn test_error_for_status_rejected_message() {
        let headers = HeaderMap::new();

        let err = error_for_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            &headers,
            r#"{"message": "Only 2 left in stock"}"#,
            "cart",
        );
        assert_eq!(err.user_message(), "Only 2 left in stock");

        let err = error_for_status(
            StatusCode::BAD_REQUEST,
            &headers,
            r#"{"error": "Invalid code"}"#,
            "otp verify",
        );
        assert!(matches!(err, ApiError::Rejected(m) if m == "Invalid code"));

    }

    #[test]
    fn test_error_for_status_without_message_is_generic() {
        let headers = HeaderMap::new();

        let err = error_for_status(StatusCode::CONFLICT, &headers, "", "cart");
        assert!(matches!(err, ApiError::Status { status: 409, .. }));
        assert_eq!(err.user_message(), "Something went wrong, please try again");

        let err = error_for_status(
            StatusCode::FORBIDDEN,
            &headers,
            "<html><body>403 Forbidden</body></html>",
            "orders",
        );
        assert!(matches!(err, ApiError::Status { status: 403, .. }));
        assert!(!err.user_message().contains("html"));

        let err = error_for_status(
            StatusCode::BAD_REQUEST,
            &headers,
            r#"{"message": "  "}"#,
            "coupon",
        );
        assert!(matches!(err, ApiError::Status { status: 400, .. }));
    }

    #[test]
    fn test_error_for_status_rate_limited() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, &headers, "", "otp request"),
            ApiError::RateLimited(30)
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(
            ApiError::Status {
                status: 503,
                body: String::new()
            }
            .is_retryable()
        );
        assert!(!ApiError::Unauthorized.is_retryable());
        assert!(!ApiError::Rejected("no".to_string()).is_retryable());
    }

    fn unavailable() -> ApiError {
        ApiError::Status {
            status: 503,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_retry_read_gives_up_after_fixed_attempts() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), ApiError> = retry_read("cart", || {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Status { status: 503, .. })));
        assert_eq!(attempts.into_inner(), READ_RETRIES + 1);
    }

    #[tokio::test]
    async fn test_retry_read_client_error_single_attempt() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), ApiError> = retry_read("cart", || {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async { Err(ApiError::Unauthorized) }
        })
        .await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert_eq!(attempts.into_inner(), 1);
    }

    #[tokio::test]
    async fn test_retry_read_recovers() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result = retry_read("user", || {
            let n = attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async move { if n < 2 { Err(unavailable()) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::RateLimited(60);
        assert_eq!(err.to_string(), "Rate limited, retry after 60 seconds");
    }
}
