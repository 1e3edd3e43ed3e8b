use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use super::{require, RepositoryError};
use crate::db::{to_document, DocPath, DocumentStore, MEDICAL_RECORDS};
use crate::models::{MedicalRecord, MedicalRecordUpdate};

#[derive(Clone)]
pub struct MedicalRecordRepository {
    store: Arc<DocumentStore>,
}

impl MedicalRecordRepository {
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self { store }
    }

    /// `None` means the patient has no record yet.
    pub async fn get_medical_record(
        &self,
        patient_id: &str,
    ) -> Result<Option<MedicalRecord>, RepositoryError> {
        let Ok(path) = DocPath::new(MEDICAL_RECORDS, patient_id) else {
            tracing::warn!(patient_id, "get_medical_record with malformed id");
            return Ok(None);
        };
        let result = self.store.get(&path).await?;
        match result.into_data() {
            Some(doc) => Ok(Some(serde_json::from_value(Value::Object(doc))?)),
            None => Ok(None),
        }
    }

    /// Merge `update` into the patient's record, creating it if needed.
    pub async fn save_medical_record(
        &self,
        patient_id: &str,
        update: &MedicalRecordUpdate,
    ) -> Result<MedicalRecord, RepositoryError> {
        require("patientId", patient_id)?;
        let path = DocPath::new(MEDICAL_RECORDS, patient_id)?;

        let mut patch = to_document(update)?;
        patch.insert("patientId".into(), json!(patient_id));
        patch.insert("updatedAt".into(), json!(Utc::now()));

        let merged = self.store.set(&path, patch).await?;
        tracing::info!(patient_id, "Medical record saved");
        Ok(serde_json::from_value(Value::Object(merged))?)
    }
}
