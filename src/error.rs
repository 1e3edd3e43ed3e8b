//! Stable error kinds shared by every component.
//!
//! Each module keeps its own `thiserror` enum; `kind()` on those enums
//! collapses them onto this taxonomy so the UI layer can pick a message
//! without matching on module-specific variants.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// An identity with the same email is already registered.
    DuplicateIdentity,
    /// A required argument was absent or blank.
    MissingField,
    /// Email and password do not match a registered identity.
    InvalidCredentials,
    /// The addressed doctor, appointment, profile or record does not exist.
    NotFound,
    /// A document path without a `collection/id` shape.
    InvalidPath,
    /// A value was present but malformed (date, time, email).
    InvalidField,
    /// An appointment status change that the lifecycle does not allow.
    InvalidTransition,
    /// Durable persistence failed (file, SQLite, serialization).
    Storage,
    /// Internal failure such as a poisoned lock.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DuplicateIdentity => "duplicate_identity",
            Self::MissingField => "missing_field",
            Self::InvalidCredentials => "invalid_credentials",
            Self::NotFound => "not_found",
            Self::InvalidPath => "invalid_path",
            Self::InvalidField => "invalid_field",
            Self::InvalidTransition => "invalid_transition",
            Self::Storage => "storage",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
