//! Process-scoped container for the booking core.
//!
//! `CoreState` is built once at startup and owns every shared component.
//! Components receive their collaborators as `Arc`s at construction; no
//! component reaches for ambient state. Dropping the container (or calling
//! [`CoreState::shutdown`]) tears everything down.

use std::sync::Arc;

use crate::auth::{AuthError, AuthSessionService, Session};
use crate::authorization::{AccessDecision, RouteGuard, SessionCookies};
use crate::config::{ConfigError, NotificationBackend, StoreConfig};
use crate::db::repository::{
    AppointmentRepository, DoctorRepository, MedicalRecordRepository, ProfileRepository,
};
use crate::db::DocumentStore;
use crate::error::ErrorKind;
use crate::notification::{
    JsonFilePersistence, MemoryPersistence, NotificationPersistence, NotificationStore,
    PersistenceError, SqlitePersistence, UnreadBadge,
};
use crate::seed::SeedDirectory;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    config: StoreConfig,
    store: Arc<DocumentStore>,
    seeds: Arc<SeedDirectory>,
    auth: Arc<AuthSessionService>,
    notifications: Arc<NotificationStore>,
    badge: UnreadBadge,
    doctors: DoctorRepository,
    appointments: AppointmentRepository,
    medical_records: MedicalRecordRepository,
    profiles: ProfileRepository,
}

impl CoreState {
    /// Build the container with the notification backend named by `config`.
    pub fn open(config: StoreConfig) -> Result<Self, CoreError> {
        let persistence: Arc<dyn NotificationPersistence> = match &config.notification_backend {
            NotificationBackend::Memory => Arc::new(MemoryPersistence::new()),
            NotificationBackend::JsonFile(path) => Arc::new(JsonFilePersistence::new(path)),
            NotificationBackend::Sqlite(path) => Arc::new(SqlitePersistence::open(path)?),
        };
        Ok(Self::with_persistence(config, persistence))
    }

    /// Build the container around an injected notification backend.
    pub fn with_persistence(
        config: StoreConfig,
        persistence: Arc<dyn NotificationPersistence>,
    ) -> Self {
        Self::assemble(config, persistence, SeedDirectory::default())
    }

    /// Same as [`CoreState::with_persistence`] with a custom seed directory.
    pub fn with_seeds(
        config: StoreConfig,
        persistence: Arc<dyn NotificationPersistence>,
        seeds: SeedDirectory,
    ) -> Self {
        Self::assemble(config, persistence, seeds)
    }

    fn assemble(
        config: StoreConfig,
        persistence: Arc<dyn NotificationPersistence>,
        seeds: SeedDirectory,
    ) -> Self {
        let latency = config.simulated_latency;
        let store = Arc::new(DocumentStore::with_latency(latency));
        let seeds = Arc::new(seeds);
        let auth = AuthSessionService::with_latency(
            Arc::clone(&store),
            config.credential_hash_iterations,
            latency,
        );
        let notifications = Arc::new(NotificationStore::with_latency(
            persistence,
            config.notification_capacity,
            latency,
        ));
        let badge = UnreadBadge::new(&auth, &notifications);

        let doctors = DoctorRepository::new(Arc::clone(&store), Arc::clone(&seeds));
        let appointments =
            AppointmentRepository::new(Arc::clone(&store), Arc::clone(&notifications));
        let medical_records = MedicalRecordRepository::new(Arc::clone(&store));
        let profiles = ProfileRepository::new(Arc::clone(&store));

        tracing::info!(
            version = crate::config::APP_VERSION,
            backend = ?config.notification_backend,
            capacity = config.notification_capacity,
            seeds = seeds.len(),
            "Booking core ready"
        );

        Self {
            config,
            store,
            seeds,
            auth,
            notifications,
            badge,
            doctors,
            appointments,
            medical_records,
            profiles,
        }
    }

    // ── Component access ────────────────────────────────────

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    pub fn seeds(&self) -> &Arc<SeedDirectory> {
        &self.seeds
    }

    pub fn auth(&self) -> &Arc<AuthSessionService> {
        &self.auth
    }

    pub fn notifications(&self) -> &Arc<NotificationStore> {
        &self.notifications
    }

    pub fn badge(&self) -> &UnreadBadge {
        &self.badge
    }

    pub fn doctors(&self) -> &DoctorRepository {
        &self.doctors
    }

    pub fn appointments(&self) -> &AppointmentRepository {
        &self.appointments
    }

    pub fn medical_records(&self) -> &MedicalRecordRepository {
        &self.medical_records
    }

    pub fn profiles(&self) -> &ProfileRepository {
        &self.profiles
    }

    // ── Session helpers ─────────────────────────────────────

    pub fn current_session(&self) -> Option<Session> {
        self.auth.current_session()
    }

    /// Cookie pair the UI shell should mirror for the current session.
    pub fn session_cookies(&self) -> SessionCookies {
        SessionCookies::from_session(self.current_session().as_ref())
    }

    pub fn decide_route(&self, path: &str) -> AccessDecision {
        RouteGuard::decide(&self.session_cookies(), path)
    }

    /// End any active session and drop every component.
    pub async fn shutdown(self) -> Result<(), CoreError> {
        self.auth.end_session().await?;
        tracing::info!(
            notifications = self.notifications.len(),
            "Booking core shut down"
        );
        Ok(())
    }
}

impl std::fmt::Debug for CoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreState")
            .field("backend", &self.config.notification_backend)
            .field("authenticated", &self.auth.is_authenticated())
            .field("notifications", &self.notifications.len())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Notification persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("Session error: {0}")]
    Auth(#[from] AuthError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(e) => e.kind(),
            Self::Persistence(e) => e.kind(),
            Self::Auth(e) => e.kind(),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
