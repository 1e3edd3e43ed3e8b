use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use super::{require, RepositoryError};
use crate::authorization::dashboard_for;
use crate::db::{to_document, DocPath, Document, DocumentStore, APPOINTMENTS};
use crate::models::{
    Appointment, AppointmentStatus, NewAppointment, NewNotification, NotificationType, Role,
};
use crate::notification::NotificationStore;

/// Appointment bookings. Every lifecycle change leaves a notification for
/// the other party.
#[derive(Clone)]
pub struct AppointmentRepository {
    store: Arc<DocumentStore>,
    notifications: Arc<NotificationStore>,
}

impl AppointmentRepository {
    pub fn new(store: Arc<DocumentStore>, notifications: Arc<NotificationStore>) -> Self {
        Self {
            store,
            notifications,
        }
    }

    /// Book a pending appointment and tell the doctor about it.
    pub async fn create_appointment(
        &self,
        request: &NewAppointment,
    ) -> Result<Appointment, RepositoryError> {
        require("doctorId", &request.doctor_id)?;
        require("patientId", &request.patient_id)?;
        require("date", &request.date)?;
        require("time", &request.time)?;
        let date = validate_date(&request.date)?;
        let time = validate_time(&request.time)?;

        let appointment = Appointment {
            id: Uuid::new_v4().to_string(),
            doctor_id: request.doctor_id.trim().to_string(),
            patient_id: request.patient_id.trim().to_string(),
            date,
            time,
            status: AppointmentStatus::Pending,
            notes: request
                .notes
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            created_at: Some(Utc::now()),
        };

        let path = DocPath::new(APPOINTMENTS, &appointment.id)?;
        self.store.set(&path, to_document(&appointment)?).await?;

        let notified = self
            .notify(
                &appointment.doctor_id,
                format!(
                    "لديك طلب موعد جديد يوم {} على الساعة {}",
                    appointment.date, appointment.time
                ),
                NotificationType::Info,
                Role::Doctor,
            )
            .await;
        if let Err(e) = notified {
            // The booking only counts once the doctor has been told.
            self.store.remove(&path).await?;
            tracing::warn!(id = %appointment.id, error = %e, "Booking rolled back, doctor not notified");
            return Err(e);
        }

        tracing::info!(
            id = %appointment.id,
            doctor = %appointment.doctor_id,
            patient = %appointment.patient_id,
            "Appointment created"
        );
        Ok(appointment)
    }

    pub async fn get_appointment(&self, id: &str) -> Result<Option<Appointment>, RepositoryError> {
        let Ok(path) = DocPath::new(APPOINTMENTS, id) else {
            tracing::warn!(id, "get_appointment with malformed id");
            return Ok(None);
        };
        let result = self.store.get(&path).await?;
        result.data().map(parse_appointment).transpose()
    }

    /// Every appointment, ordered by date, then time, then id.
    pub async fn list_appointments(&self) -> Result<Vec<Appointment>, RepositoryError> {
        let mut appointments: Vec<Appointment> = self
            .store
            .list(APPOINTMENTS)
            .await?
            .iter()
            .filter_map(|(id, doc)| match parse_appointment(doc) {
                Ok(appointment) => Some(appointment),
                Err(e) => {
                    tracing::warn!(id = %id, error = %e, "Skipping unreadable appointment");
                    None
                }
            })
            .collect();
        appointments.sort_by(|a, b| {
            (a.date.as_str(), a.time.as_str(), a.id.as_str())
                .cmp(&(b.date.as_str(), b.time.as_str(), b.id.as_str()))
        });
        Ok(appointments)
    }

    /// Appointments where `user_id` is the doctor (`Role::Doctor`) or the
    /// patient (`Role::Patient`).
    pub async fn list_appointments_for_user(
        &self,
        user_id: &str,
        role: Role,
    ) -> Result<Vec<Appointment>, RepositoryError> {
        let appointments = self.list_appointments().await?;
        Ok(appointments
            .into_iter()
            .filter(|a| match role {
                Role::Doctor => a.doctor_id == user_id,
                Role::Patient => a.patient_id == user_id,
            })
            .collect())
    }

    /// Move an appointment along its lifecycle. Doctors confirm, complete
    /// and cancel; patients may only cancel.
    pub async fn update_status(
        &self,
        id: &str,
        status: AppointmentStatus,
        actor: Role,
    ) -> Result<Appointment, RepositoryError> {
        let allowed = match actor {
            Role::Doctor => true,
            Role::Patient => status == AppointmentStatus::Cancelled,
        };
        if !allowed {
            return Err(RepositoryError::ActorNotAllowed { actor, to: status });
        }

        let path = DocPath::new(APPOINTMENTS, id).map_err(|_| not_found(id))?;
        let mut previous = Document::new();
        let merged = self
            .store
            .modify(&path, |current| {
                let Some(doc) = current else {
                    return Err(not_found(id));
                };
                let from = parse_appointment(doc)?.status;
                previous.insert("status".into(), json!(from));
                previous.insert(
                    "updatedAt".into(),
                    doc.get("updatedAt").cloned().unwrap_or(Value::Null),
                );
                if from.is_terminal() || !from.can_transition_to(status) {
                    tracing::debug!(id, %from, to = %status, closed = from.is_terminal(), "Status change rejected");
                    return Err(RepositoryError::InvalidTransition { from, to: status });
                }
                let mut patch = Document::new();
                patch.insert("status".into(), json!(status));
                patch.insert("updatedAt".into(), json!(Utc::now()));
                Ok(Some(patch))
            })
            .await?
            .ok_or_else(|| not_found(id))?;
        let appointment = parse_appointment(&merged)?;

        let recipient = match actor {
            Role::Doctor => &appointment.patient_id,
            Role::Patient => &appointment.doctor_id,
        };
        let (message, kind) = status_message(&appointment, actor);
        if let Err(e) = self.notify(recipient, message, kind, actor.counterpart()).await {
            self.store.set(&path, previous).await?;
            tracing::warn!(id, error = %e, "Status change rolled back, counterpart not notified");
            return Err(e);
        }

        tracing::info!(id, status = %status, actor = %actor, "Appointment status changed");
        Ok(appointment)
    }

    /// Patient cancel-delete: hard removal, then the doctor is notified.
    pub async fn delete_appointment(&self, id: &str) -> Result<Appointment, RepositoryError> {
        let path = DocPath::new(APPOINTMENTS, id).map_err(|_| not_found(id))?;
        let removed = self
            .store
            .remove(&path)
            .await?
            .ok_or_else(|| not_found(id))?;
        let appointment = match parse_appointment(&removed) {
            Ok(appointment) => appointment,
            Err(e) => {
                self.store.set(&path, removed).await?;
                return Err(e);
            }
        };

        let notified = self
            .notify(
                &appointment.doctor_id,
                format!(
                    "قام المريض بإلغاء موعد يوم {} على الساعة {}",
                    appointment.date, appointment.time
                ),
                NotificationType::Warning,
                Role::Doctor,
            )
            .await;
        if let Err(e) = notified {
            // A deletion stands only once the doctor has been told.
            self.store.set(&path, removed).await?;
            tracing::warn!(id, error = %e, "Deletion rolled back, doctor not notified");
            return Err(e);
        }

        tracing::info!(id, doctor = %appointment.doctor_id, "Appointment deleted");
        Ok(appointment)
    }

    async fn notify(
        &self,
        recipient: &str,
        message: String,
        kind: NotificationType,
        recipient_role: Role,
    ) -> Result<(), RepositoryError> {
        let notification =
            NewNotification::new(recipient, message, kind).with_link(dashboard_for(recipient_role));
        self.notifications.add(notification).await?;
        Ok(())
    }
}

fn not_found(id: &str) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "appointment",
        id: id.to_string(),
    }
}

fn parse_appointment(doc: &Document) -> Result<Appointment, RepositoryError> {
    Ok(serde_json::from_value(Value::Object(doc.clone()))?)
}

fn validate_date(raw: &str) -> Result<String, RepositoryError> {
    let raw = raw.trim();
    let valid = raw.len() == 10 && NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok();
    if !valid {
        return Err(RepositoryError::InvalidField {
            field: "date",
            value: raw.to_string(),
        });
    }
    Ok(raw.to_string())
}

fn validate_time(raw: &str) -> Result<String, RepositoryError> {
    let raw = raw.trim();
    let valid = raw.len() == 5 && NaiveTime::parse_from_str(raw, "%H:%M").is_ok();
    if !valid {
        return Err(RepositoryError::InvalidField {
            field: "time",
            value: raw.to_string(),
        });
    }
    Ok(raw.to_string())
}

fn status_message(appointment: &Appointment, actor: Role) -> (String, NotificationType) {
    let (date, time) = (&appointment.date, &appointment.time);
    match (appointment.status, actor) {
        (AppointmentStatus::Confirmed, _) => (
            format!("تم تأكيد موعدك يوم {date} على الساعة {time}"),
            NotificationType::Success,
        ),
        (AppointmentStatus::Completed, _) => (
            format!("تم إكمال موعدك ليوم {date}"),
            NotificationType::Info,
        ),
        (AppointmentStatus::Cancelled, Role::Doctor) => (
            format!("قام الطبيب بإلغاء موعدك يوم {date} على الساعة {time}"),
            NotificationType::Warning,
        ),
        (AppointmentStatus::Cancelled, Role::Patient) => (
            format!("قام المريض بإلغاء موعد يوم {date} على الساعة {time}"),
            NotificationType::Warning,
        ),
        (AppointmentStatus::Pending, _) => (
            format!("موعدك يوم {date} على الساعة {time} قيد الانتظار"),
            NotificationType::Info,
        ),
    }
}
