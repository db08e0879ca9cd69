//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe numeric ID wrappers that
//! prevent accidentally mixing IDs from different entity types. String-backed
//! identifiers (users, line items) are defined by hand below.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe numeric ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use suitcart_core::define_id;
/// define_id!(ProductId);
/// define_id!(CouponId);
///
/// let product_id = ProductId::new(1);
/// let coupon_id = CouponId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: ProductId = coupon_id;
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
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(OptionId);
define_id!(CouponId);

/// Errors that can occur when parsing a string identifier.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty or only whitespace.
    #[error("{kind} cannot be empty")]
    Empty {
        /// Which identifier was being parsed.
        kind: &'static str,
    },
    /// The input string is too long.
    #[error("{kind} must be at most {max} characters")]
    TooLong {
        /// Which identifier was being parsed.
        kind: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
}

fn check_identifier(kind: &'static str, s: &str) -> Result<(), IdError> {
    if s.trim().is_empty() {
        return Err(IdError::Empty { kind });
    }
    if s.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdError::TooLong {
            kind,
            max: MAX_IDENTIFIER_LENGTH,
        });
    }
    Ok(())
}

const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Authenticated user identifier as issued by the identity provider.
///
/// Opaque to this crate: only compared for equality and used to build
/// storage keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Parse a `UserId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank or longer than 128 characters.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        check_identifier("user id", s)?;
        Ok(Self(s.to_owned()))
    }

    /// Returns the user id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Line-item identifier.
///
/// Product lines use their identity string (see
/// [`identity_of`](crate::types::line_item::identity_of)); reform lines use a
/// random UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItemId(String);

impl LineItemId {
    /// Parse a `LineItemId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is blank or longer than 128 characters.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        check_identifier("line item id", s)?;
        Ok(Self(s.to_owned()))
    }

    /// Generate a fresh random id (used for reform lines).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub(crate) const fn from_identity(identity: String) -> Self {
        Self(identity)
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn validate(&self) -> Result<(), IdError> {
        check_identifier("line item id", &self.0)
    }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LineItemId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
