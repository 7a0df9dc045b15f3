/// Declares a `Copy` UUID-backed identifier with a nil "empty" value.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            /// The nil identifier, meaning "not set"
            pub const EMPTY: Self = Self(uuid::Uuid::nil());

            /// Generate a fresh random identifier
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Whether this is the nil identifier
            pub fn is_empty(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(id: uuid::Uuid) -> Self {
                Self(id)
            }
        }
    };
}

/// Actions, action types and media requirements
pub mod action;

/// Typed action options and the option value tree
pub mod option;

/// Stack map navigation
pub mod stack;

/// Activeflow aggregate
pub mod activeflow;

/// Variable bags and `${name}` substitution
pub mod variable;

/// Domain events
pub mod events;

/// Repository interfaces
pub mod repository;

/// Per-activeflow lease lock
pub mod lock;

/// Facade over the external telephony services
pub mod rpc;
