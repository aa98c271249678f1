//! Opaque identifiers
//!
//! Codes, CSRF values, bearer tokens and backend handles are all strings on the
//! wire. Each gets its own type so one can never be passed where another is
//! expected.

use serde::{Deserialize, Serialize};

/// Characters of a secret shown in logs
const LOG_PREFIX_LEN: usize = 10;

/// First `max_chars` characters of `value`, never splitting a character
pub fn char_prefix(value: &str, max_chars: usize) -> &str {
    let end = value
        .char_indices()
        .nth(max_chars)
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    &value[..end]
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }

            /// Log-safe form: a short prefix only
            pub fn redacted(&self) -> String {
                format!("{}...", char_prefix(&self.0, LOG_PREFIX_LEN))
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.redacted())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

opaque_id!(
    /// One-time code handed to the client's redirect URI
    AuthorizationCode
);
opaque_id!(
    /// One-time value embedded in the authorize form
    CsrfState
);
opaque_id!(
    /// Opaque bearer token issued to an MCP client
    BearerToken
);
opaque_id!(
    /// Backend-issued reference to one pending authorization attempt
    BackendHandle
);
