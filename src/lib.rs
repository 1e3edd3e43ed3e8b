pub mod auth;
pub mod authorization;
pub mod collation;
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod notification;
pub mod seed;

use tracing_subscriber::EnvFilter;

pub use auth::{AuthError, AuthSessionService, Session};
pub use authorization::{AccessDecision, RouteGuard, SessionCookies};
pub use config::{NotificationBackend, StoreConfig};
pub use core_state::{CoreError, CoreState};
pub use db::repository::RepositoryError;
pub use db::{DocumentStore, StoreError};
pub use error::ErrorKind;
pub use notification::{NotificationError, NotificationStore, UnreadBadge};

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG`, falling back to `tabib=info`. Calling it more than
/// once (or after the host installed its own subscriber) is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Read `TABIB_*` configuration from the environment and build the core.
pub fn open_from_env() -> Result<CoreState, CoreError> {
    let config = StoreConfig::from_env()?;
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    CoreState::open(config)
}
