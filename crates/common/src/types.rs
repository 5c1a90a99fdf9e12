use serde::{Deserialize, Serialize};

/// Defines a UUID-backed identifier newtype.
///
/// Each identifier wraps a UUID to provide type safety and prevent mixing up
/// e.g. order IDs with user IDs.
#[macro_export]
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $name {
            /// Creates a new random ID.
            pub fn new() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            /// Creates an ID from an existing UUID.
            pub fn from_uuid(uuid: ::uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> ::uuid::Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<::uuid::Uuid> for $name {
            fn from(uuid: ::uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for ::uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

/// Defines a string-backed identifier newtype.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new ID from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a user account.
    UserId
);

uuid_id!(
    /// Unique identifier for an order.
    OrderId
);

uuid_id!(
    /// Unique identifier for an order line item.
    LineItemId
);

uuid_id!(
    /// Unique identifier for a product in a shop's catalog.
    ProductId
);

uuid_id!(
    /// Unique identifier for a payment recorded against an order.
    PaymentId
);

uuid_id!(
    /// Unique identifier for an order log entry.
    LogEntryId
);

uuid_id!(
    /// Unique identifier for an order number sequence.
    OrderNumberSequenceId
);

uuid_id!(
    /// Unique identifier for a ticket category.
    TicketCategoryId
);

uuid_id!(
    /// Unique identifier for a ticket.
    TicketId
);

uuid_id!(
    /// Unique identifier for a ticket bundle.
    TicketBundleId
);

uuid_id!(
    /// Unique identifier for a user badge.
    BadgeId
);

uuid_id!(
    /// Unique identifier for the awarding of a badge to a user.
    BadgeAwardingId
);

string_id!(
    /// Identifier of a shop (e.g. `"cozylan"`).
    ShopId
);

string_id!(
    /// Identifier of a storefront, a shop's public sales channel.
    StorefrontId
);

string_id!(
    /// Human-readable order number (e.g. `"ORDER-00042"`).
    OrderNumber
);

string_id!(
    /// Human-readable product number (e.g. `"LR-08-A00003"`).
    ProductNumber
);
