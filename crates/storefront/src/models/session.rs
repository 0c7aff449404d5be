//! Session-related types.
//!
//! Types stored in the session for authentication and checkout state.

use serde::{Deserialize, Serialize};

use tradepost_core::{Email, UserId, UserRole};

use crate::api::ApiSession;
use crate::api::types::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user, plus
/// the backend credentials used for every authenticated API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name, if the user has set one.
    pub name: Option<String>,
    /// Buyer or seller.
    pub role: UserRole,
    /// Backend session cookie.
    pub api_session: ApiSession,
}

impl CurrentUser {
    /// Build the session identity from a backend user.
    #[must_use]
    pub fn new(user: User, api_session: ApiSession) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
            api_session,
        }
    }

    /// Name to greet the user with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| self.email.local_part())
    }
}

/// A verified email that still needs a profile before login completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRegistration {
    /// The verified email.
    pub email: Email,
    /// Backend session issued at verification.
    pub api_session: ApiSession,
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the email a passcode was last sent to.
    pub const OTP_EMAIL: &str = "otp_email";

    /// Key for a verified-but-unregistered login.
    pub const PENDING_REGISTRATION: &str = "pending_registration";

    /// Key for the guest cart.
    pub const GUEST_CART: &str = "guest_cart";

    /// Key for the coupon applied on the checkout page.
    pub const APPLIED_COUPON: &str = "applied_coupon";

    /// Key for queued flash messages.
    pub const FLASH: &str = "flash";
}
