//! Mock identity registry and the active-session pointer.
//!
//! Identities live in memory only. The session service watches the
//! document store so that profile edits under `users/{uid}` flow back into
//! the registry and, for the signed-in identity, out to session subscribers.

pub mod credentials;
pub mod service;

pub use service::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::StoreError;
use crate::error::ErrorKind;
use crate::models::{Role, User};

/// The identity currently recognised by the session service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: User,
    pub signed_in_at: DateTime<Utc>,
}

impl Session {
    pub fn uid(&self) -> &str {
        &self.user.uid
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn display_name(&self) -> &str {
        &self.user.display_name
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("An identity already exists for {0}")]
    DuplicateIdentity(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal lock error")]
    LockPoisoned,
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateIdentity(_) => ErrorKind::DuplicateIdentity,
            Self::MissingField(_) => ErrorKind::MissingField,
            Self::InvalidEmail(_) => ErrorKind::InvalidField,
            Self::InvalidCredentials => ErrorKind::InvalidCredentials,
            Self::Store(e) => e.kind(),
            Self::LockPoisoned => ErrorKind::Internal,
        }
    }
}
