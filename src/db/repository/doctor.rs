use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use super::{merge_seed_and_stored, str_field, RepositoryError};
use crate::db::{to_document, DocPath, Document, DocumentStore, USERS};
use crate::models::{DoctorProfile, DoctorProfileUpdate, Role};
use crate::seed::SeedDirectory;

/// Doctor cards: stored `users/{uid}` profiles layered over seed doctors.
#[derive(Clone)]
pub struct DoctorRepository {
    store: Arc<DocumentStore>,
    seeds: Arc<SeedDirectory>,
}

impl DoctorRepository {
    pub fn new(store: Arc<DocumentStore>, seeds: Arc<SeedDirectory>) -> Self {
        Self { store, seeds }
    }

    /// Storage-derived doctors (by uid) followed by seed doctors that have
    /// no stored document yet (in seed order).
    pub async fn list_doctors(&self) -> Result<Vec<DoctorProfile>, RepositoryError> {
        let stored = self.store.list(USERS).await?;
        let stored_ids: HashSet<&str> = stored.iter().map(|(id, _)| id.as_str()).collect();

        let mut doctors = Vec::new();
        for (id, doc) in &stored {
            let seed = self.seeds.get(id)?;
            let merged = merge_seed_and_stored(seed.as_ref(), doc);
            if !is_doctor(&merged) {
                continue;
            }
            match materialize(id, merged) {
                Ok(doctor) => doctors.push(doctor),
                Err(e) => tracing::warn!(id = %id, error = %e, "Skipping unreadable doctor profile"),
            }
        }

        for seed in self.seeds.doctors()? {
            let Some(id) = str_field(&seed, "id").map(str::to_string) else {
                continue;
            };
            if stored_ids.contains(id.as_str()) {
                continue;
            }
            match materialize(&id, seed) {
                Ok(doctor) => doctors.push(doctor),
                Err(e) => tracing::warn!(id = %id, error = %e, "Skipping unreadable seed doctor"),
            }
        }

        tracing::debug!(count = doctors.len(), "list_doctors");
        Ok(doctors)
    }

    /// `None` when neither storage nor the seeds know `id`, or when the
    /// stored identity is not a doctor.
    pub async fn get_doctor(&self, id: &str) -> Result<Option<DoctorProfile>, RepositoryError> {
        let path = match DocPath::new(USERS, id) {
            Ok(path) => path,
            Err(_) => {
                tracing::warn!(id, "get_doctor with malformed id");
                return Ok(None);
            }
        };

        let stored = self.store.get(&path).await?;
        let seed = self.seeds.get(id)?;
        let merged = match (stored.data(), seed) {
            (Some(doc), seed) => merge_seed_and_stored(seed.as_ref(), doc),
            (None, Some(seed)) => seed,
            (None, None) => return Ok(None),
        };
        if !is_doctor(&merged) {
            return Ok(None);
        }
        materialize(id, merged).map(Some)
    }

    /// Merge `update` onto the stored profile, creating it on first save.
    /// Role is forced to doctor and `updatedAt` is stamped. A matching seed
    /// doctor receives the same patch.
    pub async fn update_doctor_profile(
        &self,
        uid: &str,
        update: &DoctorProfileUpdate,
    ) -> Result<DoctorProfile, RepositoryError> {
        super::require("uid", uid)?;
        let path = DocPath::new(USERS, uid)?;

        let mut patch = to_document(update)?;
        if let Some(name) = update.name.as_deref() {
            if update.display_name.is_none() && !name.trim().is_empty() {
                patch.insert("displayName".into(), json!(name));
            }
        }
        patch.insert("role".into(), json!(Role::Doctor));
        patch.insert("updatedAt".into(), json!(Utc::now()));

        let stored = self.store.set(&path, patch.clone()).await?;
        if self.seeds.merge_update(uid, &patch)? {
            tracing::debug!(uid, "Seed doctor synchronized with profile update");
        }

        let seed = self.seeds.get(uid)?;
        let doctor = materialize(uid, merge_seed_and_stored(seed.as_ref(), &stored))?;
        tracing::info!(uid, "Doctor profile updated");
        Ok(doctor)
    }
}

fn is_doctor(doc: &Document) -> bool {
    str_field(doc, "role") == Some(Role::Doctor.as_str())
}

/// Build a doctor card from a merged document. `id` always follows the
/// owner uid, and `name`/`displayName` fall back to each other.
fn materialize(id: &str, mut doc: Document) -> Result<DoctorProfile, RepositoryError> {
    doc.insert("id".into(), Value::String(id.to_string()));

    let name = non_blank(&doc, "name");
    let display_name = non_blank(&doc, "displayName");
    match (name, display_name) {
        (None, Some(display)) => {
            doc.insert("name".into(), Value::String(display));
        }
        (Some(name), None) => {
            doc.insert("displayName".into(), Value::String(name));
        }
        _ => {}
    }

    Ok(serde_json::from_value(Value::Object(doc))?)
}

fn non_blank(doc: &Document, key: &str) -> Option<String> {
    str_field(doc, key)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::default_doctors;

    fn repo() -> (Arc<DocumentStore>, DoctorRepository) {
        let store = Arc::new(DocumentStore::new());
        let repo = DoctorRepository::new(Arc::clone(&store), Arc::new(SeedDirectory::default()));
        (store, repo)
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn seeds_listed_before_anyone_onboards() {
        let (_, repo) = repo();
        let doctors = repo.list_doctors().await.unwrap();
        assert_eq!(doctors.len(), default_doctors().len());
        assert_eq!(doctors[0].id, "d1");
        assert!(doctors.iter().all(|d| d.role == Role::Doctor));
    }

    #[tokio::test]
    async fn stored_doctors_come_first_and_patients_are_skipped() {
        let (store, repo) = repo();
        store
            .set_doc("users/u-doc", doc(json!({"role": "doctor", "displayName": "Ali"})))
            .await
            .unwrap();
        store
            .set_doc("users/u-pat", doc(json!({"role": "patient", "displayName": "Pat"})))
            .await
            .unwrap();

        let doctors = repo.list_doctors().await.unwrap();
        assert_eq!(doctors[0].id, "u-doc");
        assert_eq!(doctors[0].name, "Ali");
        assert!(doctors.iter().all(|d| d.id != "u-pat"));
        assert_eq!(doctors.len(), default_doctors().len() + 1);
    }

    #[tokio::test]
    async fn onboarded_seed_appears_once_with_stored_values() {
        let (store, repo) = repo();
        store
            .set_doc("users/d2", doc(json!({"role": "doctor", "bio": "محدثة"})))
            .await
            .unwrap();

        let doctors = repo.list_doctors().await.unwrap();
        let d2: Vec<_> = doctors.iter().filter(|d| d.id == "d2").collect();
        assert_eq!(d2.len(), 1);
        assert_eq!(d2[0].bio.as_deref(), Some("محدثة"));
        assert_eq!(d2[0].specialty.as_deref(), Some("طب الأطفال"));
        assert_eq!(doctors[0].id, "d2");
    }

    #[tokio::test]
    async fn listing_is_stable() {
        let (store, repo) = repo();
        store
            .set_doc("users/x", doc(json!({"role": "doctor", "name": "X"})))
            .await
            .unwrap();
        let first: Vec<String> = repo.list_doctors().await.unwrap().into_iter().map(|d| d.id).collect();
        let second: Vec<String> = repo.list_doctors().await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn get_doctor_cases() {
        let (store, repo) = repo();
        store
            .set_doc("users/pat", doc(json!({"role": "patient", "displayName": "P"})))
            .await
            .unwrap();

        assert!(repo.get_doctor("d1").await.unwrap().is_some());
        assert!(repo.get_doctor("pat").await.unwrap().is_none());
        assert!(repo.get_doctor("ghost").await.unwrap().is_none());
        assert!(repo.get_doctor("bad/id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stored_patient_shadows_seed_with_same_id() {
        let (store, repo) = repo();
        store
            .set_doc("users/d3", doc(json!({"role": "patient"})))
            .await
            .unwrap();
        assert!(repo.get_doctor("d3").await.unwrap().is_none());
        let ids: Vec<String> = repo.list_doctors().await.unwrap().into_iter().map(|d| d.id).collect();
        assert!(!ids.contains(&"d3".to_string()));
    }

    #[tokio::test]
    async fn update_round_trips_every_given_field() {
        let (_, repo) = repo();
        let update = DoctorProfileUpdate {
            name: Some("د. نادية".into()),
            specialty: Some("طب العيون".into()),
            wilaya: Some("بجاية".into()),
            experience: Some(12),
            skills: Some(vec!["الليزك".into()]),
            available_slots: Some(vec!["08:00".into()]),
            rating: Some(4.5),
            ..Default::default()
        };
        repo.update_doctor_profile("new-doc", &update).await.unwrap();

        let doctor = repo.get_doctor("new-doc").await.unwrap().unwrap();
        assert_eq!(doctor.name, "د. نادية");
        assert_eq!(doctor.display_name.as_deref(), Some("د. نادية"));
        assert_eq!(doctor.specialty.as_deref(), Some("طب العيون"));
        assert_eq!(doctor.wilaya.as_deref(), Some("بجاية"));
        assert_eq!(doctor.experience, Some(12));
        assert_eq!(doctor.skills, vec!["الليزك".to_string()]);
        assert_eq!(doctor.available_slots, vec!["08:00".to_string()]);
        assert_eq!(doctor.rating, Some(4.5));
        assert_eq!(doctor.role, Role::Doctor);
        assert!(doctor.updated_at.is_some());
    }

    #[tokio::test]
    async fn update_merges_with_existing_fields() {
        let (store, repo) = repo();
        store
            .set_doc("users/u1", doc(json!({"role": "doctor", "name": "A", "bio": "keep"})))
            .await
            .unwrap();
        let update = DoctorProfileUpdate {
            location: Some("حي البدر".into()),
            ..Default::default()
        };
        let doctor = repo.update_doctor_profile("u1", &update).await.unwrap();
        assert_eq!(doctor.bio.as_deref(), Some("keep"));
        assert_eq!(doctor.location.as_deref(), Some("حي البدر"));
        assert_eq!(doctor.name, "A");
    }

    #[tokio::test]
    async fn update_of_seed_doctor_syncs_seed() {
        let store = Arc::new(DocumentStore::new());
        let seeds = Arc::new(SeedDirectory::default());
        let repo = DoctorRepository::new(Arc::clone(&store), Arc::clone(&seeds));

        let update = DoctorProfileUpdate {
            bio: Some("نبذة محدثة".into()),
            ..Default::default()
        };
        repo.update_doctor_profile("d4", &update).await.unwrap();

        assert_eq!(seeds.get("d4").unwrap().unwrap()["bio"], json!("نبذة محدثة"));
        let d4 = repo.get_doctor("d4").await.unwrap().unwrap();
        assert_eq!(d4.bio.as_deref(), Some("نبذة محدثة"));
        assert_eq!(d4.specialty.as_deref(), Some("الأمراض الجلدية"));
    }

    #[tokio::test]
    async fn update_forces_doctor_role() {
        let (store, repo) = repo();
        store
            .set_doc("users/u2", doc(json!({"role": "patient"})))
            .await
            .unwrap();
        let doctor = repo
            .update_doctor_profile("u2", &DoctorProfileUpdate::default())
            .await
            .unwrap();
        assert_eq!(doctor.role, Role::Doctor);
    }

    #[tokio::test]
    async fn update_requires_uid() {
        let (_, repo) = repo();
        let err = repo
            .update_doctor_profile(" ", &DoctorProfileUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::MissingField("uid")));
    }
}
