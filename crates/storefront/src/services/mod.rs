//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - One-time passcode login and registration
//! - `cart` - Guest and server carts, merge on login
//! - `pricing` - Wallet policy, coupons and checkout totals
//! - `checkout` - Order assembly
//! - `address` - Shipping address form validation

pub mod address;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod pricing;
