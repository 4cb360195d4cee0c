//! Newtype IDs for type-safe document references.
//!
//! Document ids on the hosted platform are opaque strings (auth uids,
//! auto-generated document ids, or human-chosen menu slugs). Use the
//! `define_id!` macro to create wrappers that prevent accidentally mixing ids
//! from different entity types.

/// Errors that can occur when parsing an id.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The input string is empty.
    #[error("id cannot be empty")]
    Empty,
    /// The input contains a `/`, which would address a nested document.
    #[error("id cannot contain '/'")]
    ContainsSlash,
}

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `parse()`, `as_str()`, `into_inner()`
/// - `Display`, `FromStr` and `AsRef<str>` implementations
///
/// # Example
///
/// ```rust
/// # use bukka_core::define_id;
/// define_id!(UserId);
/// define_id!(OrderId);
///
/// let user_id = UserId::parse("uid-1").unwrap();
/// let order_id = OrderId::parse("uid-1").unwrap();
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
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse an id, rejecting empty strings and path separators.
            ///
            /// # Errors
            ///
            /// Returns [`IdError`](crate::IdError) if the input is empty or contains `/`.
            pub fn parse(id: &str) -> ::core::result::Result<Self, $crate::IdError> {
                if id.is_empty() {
                    return Err($crate::IdError::Empty);
                }
                if id.contains('/') {
                    return Err($crate::IdError::ContainsSlash);
                }
                Ok(Self(id.to_owned()))
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the id and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::IdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(UserId);
define_id!(ItemId);
define_id!(OrderId);
define_id!(AddressId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_id() {
        let id = UserId::parse("kQ2xv9TfZ1").unwrap();
        assert_eq!(id.as_str(), "kQ2xv9TfZ1");
        assert_eq!(id.to_string(), "kQ2xv9TfZ1");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(ItemId::parse(""), Err(IdError::Empty));
    }

    #[test]
    fn test_parse_rejects_path_separator() {
        assert_eq!(ItemId::parse("cart/jollof"), Err(IdError::ContainsSlash));
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = OrderId::parse("ord-42").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ord-42\"");
    }
}
