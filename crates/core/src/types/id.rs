//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. All backend entity
//! IDs are positive integers; guest cart lines are the one exception and use
//! a synthesized string key (see [`CartLineId`]).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i32` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i32()`
/// - `From<i32>`, `Into<i32>` and `FromStr` implementations
///
/// # Example
///
/// ```rust
/// # use tradepost_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::new(1);
/// let order_id: OrderId = "42".parse().unwrap();
///
/// // These are different types, so this won't compile:
/// // let _: UserId = order_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Create a new ID from an i32 value.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// Get the underlying i32 value.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i32>().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(ProductId);
define_id!(VariantId);
define_id!(CategoryId);
define_id!(CartItemId);
define_id!(OrderId);
define_id!(AddressId);

/// Prefix used for synthesized guest cart line keys.
pub const GUEST_LINE_PREFIX: &str = "g-";

/// Identifier of a line in either cart source.
///
/// Server cart items carry the backend's numeric id. Guest cart items never
/// reach the backend until login, so they carry a key synthesized from the
/// product and variant they reference: `g-{product}-{variant}` (variant `0`
/// when absent). The untagged representation keeps the wire format exactly
/// "a number or a string".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CartLineId {
    /// Numeric id of a server cart item.
    Server(CartItemId),
    /// Synthesized key of a guest cart item.
    Guest(String),
}

impl CartLineId {
    /// Build the synthesized key for a guest line.
    #[must_use]
    pub fn guest(product_id: ProductId, variant_id: Option<VariantId>) -> Self {
        let variant = variant_id.map_or(0, |v| v.as_i32());
        Self::Guest(format!("{GUEST_LINE_PREFIX}{product_id}-{variant}"))
    }

    /// Parse a line id submitted from a form.
    ///
    /// Keys with the guest prefix become [`CartLineId::Guest`]; anything that
    /// parses as an integer becomes [`CartLineId::Server`].
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.starts_with(GUEST_LINE_PREFIX) {
            return Some(Self::Guest(s.to_owned()));
        }
        s.parse::<CartItemId>().ok().map(Self::Server)
    }

    /// Returns `true` for guest cart lines.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self, Self::Guest(_))
    }
}

impl fmt::Display for CartLineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Guest(key) => f.write_str(key),
        }
    }
}
