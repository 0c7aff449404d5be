//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request span)
//! 3. Request ID
//! 4. Session layer (tower-sessions with `PostgreSQL` store)
//! 5. Session expiry (drops the user after a backend 401)
//! 6. Security headers on every page and asset
//! 7. Rate limiting on passcode and cart routes (governor)

pub mod auth;
pub mod flash;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAuth, SessionExpired, clear_current_user, session_expiry_middleware,
    set_current_user,
};
pub use flash::{Flash, FlashKind, Flashes, push_flash};
pub use rate_limit::{auth_rate_limiter, cart_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers;
pub use session::create_session_layer;
