//! Session-scoped domain models for the storefront.
//!
//! Everything durable lives behind the REST API; these types only describe
//! what the storefront keeps in a visitor's session record.

pub mod session;

pub use session::{CurrentUser, PendingRegistration, keys as session_keys};
