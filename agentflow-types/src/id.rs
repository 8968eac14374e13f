//! Typed ID wrappers.
//!
//! Plain strings underneath — the runtime doesn't enforce a format on
//! caller-supplied identifiers. `ReferenceId` is the one exception: it is
//! always derived from a content hash, never caller-supplied.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

typed_id!(SessionId, "Caller-supplied identifier for a conversation session.");
typed_id!(AgentId, "Stable identifier for an agent, assigned once and persisted across restarts.");
typed_id!(ErrorId, "Identifier for a structured error stored in the error surface.");

/// Content-addressed handle to a payload stored in the large-object store.
///
/// Unlike the other typed ids, this is never caller-supplied — it is always
/// derived from the stored bytes via [`ReferenceId::for_content`], so two
/// puts of identical content converge on the same id.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ReferenceId(pub String);

impl ReferenceId {
    /// Derive a reference id from the bytes that will be stored under it.
    pub fn for_content(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("ref_{:x}", hasher.finalize()))
    }

    /// Borrow the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
