use std::sync::Arc;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::{require, str_field, RepositoryError};
use crate::db::{to_document, DocPath, Document, DocumentStore, USERS};
use crate::models::{PatientProfile, PatientProfileUpdate, Role, User, UserProfileUpdate};

/// User and patient profile documents under `users/{uid}`.
///
/// Writes go through the document store, so the session service picks up
/// display name and photo changes for the signed-in user.
#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<DocumentStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get_user(&self, uid: &str) -> Result<Option<User>, RepositoryError> {
        Ok(self.load(uid).await?.map(|(_, user)| user))
    }

    /// Change display name and/or photo. Doctors get their card name
    /// updated along with the display name.
    pub async fn update_user_profile(
        &self,
        uid: &str,
        update: &UserProfileUpdate,
    ) -> Result<User, RepositoryError> {
        require("uid", uid)?;
        if let Some(name) = update.display_name.as_deref() {
            require("displayName", name)?;
        }
        let path = DocPath::new(USERS, uid).map_err(|_| not_found("user", uid))?;

        let merged = self
            .store
            .modify(&path, |current| {
                let current = current.ok_or_else(|| not_found("user", uid))?;
                let mut patch = to_document(update)?;
                if let Some(name) = update.display_name.as_deref() {
                    if str_field(current, "role") == Some(Role::Doctor.as_str()) {
                        patch.insert("name".into(), json!(name.trim()));
                    }
                    patch.insert("displayName".into(), json!(name.trim()));
                }
                Ok::<_, RepositoryError>(Some(patch))
            })
            .await?
            .ok_or_else(|| not_found("user", uid))?;

        tracing::info!(uid, "User profile updated");
        parse_profile(uid, merged)
    }

    /// `None` unless the stored profile belongs to a patient.
    pub async fn get_patient(&self, uid: &str) -> Result<Option<PatientProfile>, RepositoryError> {
        let Some((doc, user)) = self.load(uid).await? else {
            return Ok(None);
        };
        if user.role != Role::Patient {
            return Ok(None);
        }
        parse_profile(uid, doc).map(Some)
    }

    pub async fn update_patient_profile(
        &self,
        uid: &str,
        update: &PatientProfileUpdate,
    ) -> Result<PatientProfile, RepositoryError> {
        require("uid", uid)?;
        if let Some(name) = update.display_name.as_deref() {
            require("displayName", name)?;
        }
        let path = DocPath::new(USERS, uid).map_err(|_| not_found("patient", uid))?;

        let merged = self
            .store
            .modify(&path, |current| {
                let is_patient = current
                    .and_then(|doc| str_field(doc, "role"))
                    .is_some_and(|role| role == Role::Patient.as_str());
                if !is_patient {
                    return Err(not_found("patient", uid));
                }
                let mut patch = to_document(update)?;
                patch.insert("updatedAt".into(), json!(Utc::now()));
                Ok(Some(patch))
            })
            .await?
            .ok_or_else(|| not_found("patient", uid))?;

        tracing::info!(uid, "Patient profile updated");
        parse_profile(uid, merged)
    }

    async fn load(&self, uid: &str) -> Result<Option<(Document, User)>, RepositoryError> {
        let Ok(path) = DocPath::new(USERS, uid) else {
            tracing::warn!(uid, "Profile read with malformed uid");
            return Ok(None);
        };
        let Some(doc) = self.store.get(&path).await?.into_data() else {
            return Ok(None);
        };
        let user: User = parse_profile(uid, doc.clone())?;
        Ok(Some((doc, user)))
    }
}

fn not_found(entity: &'static str, uid: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity,
        id: uid.to_string(),
    }
}

/// Profiles written directly through `set_doc` may lack `uid`; the path
/// id fills it in.
fn parse_profile<T: DeserializeOwned>(uid: &str, mut doc: Document) -> Result<T, RepositoryError> {
    doc.entry("uid").or_insert_with(|| Value::String(uid.to_string()));
    Ok(serde_json::from_value(Value::Object(doc))?)
}
