//! Repository layer: typed read/merge helpers over the document store.

mod appointment;
mod catalog;
mod doctor;
mod medical_record;
mod profile;

pub use appointment::*;
pub use catalog::*;
pub use doctor::*;
pub use medical_record::*;
pub use profile::*;

use serde_json::Value;
use thiserror::Error;

use super::{Document, StoreError};
use crate::error::ErrorKind;
use crate::models::{AppointmentStatus, Role};
use crate::notification::NotificationError;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("A {actor} cannot set an appointment to {to}")]
    ActorNotAllowed { actor: Role, to: AppointmentStatus },

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

impl RepositoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(e) => e.kind(),
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MissingField(_) => ErrorKind::MissingField,
            Self::InvalidField { .. } => ErrorKind::InvalidField,
            Self::InvalidTransition { .. } | Self::ActorNotAllowed { .. } => {
                ErrorKind::InvalidTransition
            }
            Self::Notification(e) => e.kind(),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(StoreError::Serialization(e))
    }
}

/// Two-tier lookup: per field, a stored non-null value wins and the seed
/// value is the fallback. Fields only the seed has are kept.
pub fn merge_seed_and_stored(seed: Option<&Document>, stored: &Document) -> Document {
    let mut merged = seed.cloned().unwrap_or_default();
    for (key, value) in stored {
        if !value.is_null() || !merged.contains_key(key) {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), RepositoryError> {
    if value.trim().is_empty() {
        return Err(RepositoryError::MissingField(field));
    }
    Ok(())
}

pub(crate) fn str_field<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn stored_value_wins() {
        let seed = doc(json!({"name": "Seed", "bio": "seed bio"}));
        let stored = doc(json!({"name": "Stored"}));
        let merged = merge_seed_and_stored(Some(&seed), &stored);
        assert_eq!(merged["name"], json!("Stored"));
        assert_eq!(merged["bio"], json!("seed bio"));
    }

    #[test]
    fn null_stored_value_falls_back_to_seed() {
        let seed = doc(json!({"photoURL": "/img/seed.png"}));
        let stored = doc(json!({"photoURL": null}));
        let merged = merge_seed_and_stored(Some(&seed), &stored);
        assert_eq!(merged["photoURL"], json!("/img/seed.png"));
    }

    #[test]
    fn null_without_seed_is_kept() {
        let stored = doc(json!({"photoURL": null, "name": "X"}));
        let merged = merge_seed_and_stored(None, &stored);
        assert_eq!(merged, stored);
    }

    #[test]
    fn empty_values_still_override() {
        let seed = doc(json!({"skills": ["a"], "bio": "b"}));
        let stored = doc(json!({"skills": [], "bio": ""}));
        let merged = merge_seed_and_stored(Some(&seed), &stored);
        assert_eq!(merged["skills"], json!([]));
        assert_eq!(merged["bio"], json!(""));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(RepositoryError::MissingField("date").kind(), ErrorKind::MissingField);
        assert_eq!(
            RepositoryError::InvalidTransition {
                from: AppointmentStatus::Completed,
                to: AppointmentStatus::Pending,
            }
            .kind(),
            ErrorKind::InvalidTransition
        );
        assert_eq!(
            RepositoryError::NotFound { entity: "doctor", id: "x".into() }.kind(),
            ErrorKind::NotFound
        );
    }
}
