//! Authentication service.
//!
//! One-time passcode login against the REST backend:
//!
//! 1. [`AuthService::request_code`] emails a passcode
//! 2. [`AuthService::verify_code`] exchanges it for a backend session
//! 3. new emails finish with [`AuthService::register`]

mod error;

pub use error::AuthError;

use tracing::{info, instrument, warn};

use tradepost_core::{Email, UserRole};

use crate::api::types::RegisterRequest;
use crate::api::{ApiClient, ApiSession};
use crate::models::{CurrentUser, PendingRegistration};

/// Passcode length bounds.
const MIN_CODE_LENGTH: usize = 4;
const MAX_CODE_LENGTH: usize = 8;

/// Maximum display name length.
const MAX_NAME_LENGTH: usize = 100;

/// Outcome of a passcode verification.
#[derive(Debug)]
pub enum Verification {
    /// Existing account; login is complete.
    LoggedIn(CurrentUser),
    /// Email verified but no account yet.
    NeedsRegistration(PendingRegistration),
}

/// Authentication service.
pub struct AuthService<'a> {
    api: &'a ApiClient,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Send a passcode to an email address.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid, or
    /// `AuthError::Api` if the backend refuses.
    #[instrument(skip(self))]
    pub async fn request_code(&self, email: &str) -> Result<Email, AuthError> {
        let email = Email::parse(email)?;
        self.api.request_otp(&email).await?;
        Ok(email)
    }

    /// Verify a passcode.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCode` for malformed codes without calling
    /// the backend, or `AuthError::Api` for wrong or expired codes.
    #[instrument(skip(self, code), fields(email = %email))]
    pub async fn verify_code(&self, email: &Email, code: &str) -> Result<Verification, AuthError> {
        let code = validate_code(code)?;
        let (outcome, api_session) = self.api.verify_otp(email, code).await?;

        match outcome.user {
            Some(user) if !outcome.needs_registration => {
                info!(user_id = %user.id, "User logged in");
                Ok(Verification::LoggedIn(CurrentUser::new(user, api_session)))
            }
            _ => Ok(Verification::NeedsRegistration(PendingRegistration {
                email: email.clone(),
                api_session,
            })),
        }
    }

    /// Complete registration for a verified email.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidName` for empty or overlong names, or
    /// `AuthError::Api` if the backend rejects the profile.
    #[instrument(skip(self, pending), fields(email = %pending.email))]
    pub async fn register(
        &self,
        pending: PendingRegistration,
        name: &str,
        role: UserRole,
    ) -> Result<CurrentUser, AuthError> {
        let name = validate_name(name)?;
        let user = self
            .api
            .register(&pending.api_session, &RegisterRequest { name, role })
            .await?;

        info!(user_id = %user.id, %role, "User registered");
        Ok(CurrentUser::new(user, pending.api_session))
    }

    /// End the backend session. Failures are logged and ignored; the caller
    /// clears the local session either way.
    #[instrument(skip_all)]
    pub async fn logout(&self, api_session: &ApiSession) {
        if let Err(e) = self.api.logout(api_session).await {
            warn!(error = %e, "Backend logout failed");
        }
    }
}

/// Check a passcode is 4-8 ASCII digits, ignoring surrounding whitespace.
///
/// # Errors
///
/// Returns `AuthError::InvalidCode` otherwise.
pub fn validate_code(code: &str) -> Result<&str, AuthError> {
    let code = code.trim();
    if (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len())
        && code.bytes().all(|b| b.is_ascii_digit())
    {
        Ok(code)
    } else {
        Err(AuthError::InvalidCode)
    }
}

/// Check a display name is non-blank and at most 100 characters.
///
/// # Errors
///
/// Returns `AuthError::InvalidName` otherwise.
pub fn validate_name(name: &str) -> Result<&str, AuthError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH {
        return Err(AuthError::InvalidName {
            max: MAX_NAME_LENGTH,
        });
    }
    Ok(name)
}
