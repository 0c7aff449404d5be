//! Authentication error types.

use thiserror::Error;

use crate::api::ApiError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] tradepost_core::EmailError),

    /// Passcode is not 4-8 digits.
    #[error("passcode must be 4 to 8 digits")]
    InvalidCode,

    /// Registration name is empty or too long.
    #[error("name must be 1 to {max} characters")]
    InvalidName { max: usize },

    /// No passcode was requested in this session.
    #[error("no passcode request in progress")]
    NoPendingCode,

    /// Backend rejected the request or was unreachable.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl AuthError {
    /// A message that is safe to show on the login forms.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Please enter a valid email address".to_string(),
            Self::InvalidCode => "Please enter the code from your email".to_string(),
            Self::InvalidName { max } => format!("Please enter a name up to {max} characters"),
            Self::NoPendingCode => "Please request a new code".to_string(),
            Self::Api(e) => e.user_message(),
        }
    }
}
