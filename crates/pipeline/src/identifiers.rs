//! Newtype domain identifiers.
//!
//! Every tracker concept that has an identity is represented as a distinct
//! newtype wrapping a primitive. This prevents accidentally interchanging, for
//! example, an [`IssueKey`] with a [`FieldId`] even though both are strings
//! on the wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is blank.
            ///
            /// Surrounding whitespace is trimmed.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else if trimmed.len() == v.len() {
                    Some(Self(v))
                } else {
                    Some(Self(trimmed.to_string()))
                }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Wraps a compile-time literal known to be non-blank.
            #[allow(dead_code)]
            pub(crate) fn from_literal(value: &'static str) -> Self {
                Self(value.to_string())
            }

            /// Case-insensitive comparison against a raw string.
            pub fn eq_ignore_case(&self, other: &str) -> bool {
                self.0.eq_ignore_ascii_case(other)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers: tracker-assigned or tracker-defined
// ---------------------------------------------------------------------------

string_id! {
    /// Identifies the tracker project issues are created in (e.g. `"PROJ"`).
    ProjectKey
}

string_id! {
    /// The tracker-assigned key of a created issue (e.g. `"PROJ-42"`).
    ///
    /// Unknown until the create call returns, which is why children can only be
    /// created after their parent.
    IssueKey
}

string_id! {
    /// The name of a tracker issue type (e.g. `"Story"`, `"Sub-task"`).
    ///
    /// Issue types are matched case-insensitively during discovery, but the
    /// tracker's own spelling is what gets sent back in create requests.
    IssueTypeName
}

string_id! {
    /// An opaque, instance-specific field identifier (e.g. `"customfield_10011"`).
    ///
    /// Not portable across tracker instances.
    FieldId
}

// ---------------------------------------------------------------------------
// Identifiers: UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies a single materialization run.
///
/// Generated fresh for every run; recorded on the run's tracing span and in
/// the caller-facing report so all tracker activity from one request can be
/// correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generates a new random run identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
