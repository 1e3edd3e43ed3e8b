use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use super::credentials::{normalize_email, PasswordDigest};
use super::{AuthError, Session};
use crate::db::{simulate_latency, DocPath, Document, DocumentObserver, DocumentStore, USERS};
use crate::events::{Subscribers, Subscription};
use crate::models::{Role, User};

// ═══════════════════════════════════════════════════════════
// Identity registry
// ═══════════════════════════════════════════════════════════

struct Identity {
    user: User,
    digest: PasswordDigest,
}

#[derive(Default)]
struct Registry {
    by_email: HashMap<String, Identity>,
    email_by_uid: HashMap<String, String>,
}

impl Registry {
    fn insert(&mut self, identity: Identity) {
        self.email_by_uid
            .insert(identity.user.uid.clone(), identity.user.email.clone());
        self.by_email.insert(identity.user.email.clone(), identity);
    }

    fn remove_uid(&mut self, uid: &str) {
        if let Some(email) = self.email_by_uid.remove(uid) {
            self.by_email.remove(&email);
        }
    }

    fn get_uid(&self, uid: &str) -> Option<&Identity> {
        self.email_by_uid
            .get(uid)
            .and_then(|email| self.by_email.get(email))
    }

    /// Fold a written profile document into the identity. Returns the
    /// refreshed user when `uid` is a known identity.
    fn refresh(&mut self, uid: &str, doc: &Document) -> Option<User> {
        let email = self.email_by_uid.get(uid)?;
        let identity = self.by_email.get_mut(email)?;
        identity.user = overlay_profile(&identity.user, doc);
        Some(identity.user.clone())
    }
}

/// Profile fields stored under `users/{uid}` win over registered values.
fn overlay_profile(base: &User, doc: &Document) -> User {
    let mut user = base.clone();
    if let Some(role) = doc
        .get("role")
        .and_then(Value::as_str)
        .and_then(|r| r.parse::<Role>().ok())
    {
        user.role = role;
    }
    if let Some(name) = doc
        .get("displayName")
        .and_then(Value::as_str)
        .filter(|n| !n.trim().is_empty())
    {
        user.display_name = name.to_string();
    }
    match doc.get("photoURL") {
        Some(Value::String(url)) => user.photo_url = Some(url.clone()),
        Some(Value::Null) => user.photo_url = None,
        _ => {}
    }
    user
}

fn profile_stub(user: &User) -> Document {
    let stub = json!({
        "uid": user.uid,
        "email": user.email,
        "displayName": user.display_name,
        "name": user.display_name,
        "role": user.role.as_str(),
        "photoURL": user.photo_url,
        "createdAt": Utc::now().to_rfc3339(),
    });
    match stub {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

// ═══════════════════════════════════════════════════════════
// AuthSessionService
// ═══════════════════════════════════════════════════════════

/// Credential registry plus the active-session pointer.
///
/// Subscribers hear about every session change synchronously, before the
/// operation that caused it returns.
pub struct AuthSessionService {
    store: Arc<DocumentStore>,
    registry: RwLock<Registry>,
    session: RwLock<Option<Session>>,
    subscribers: Arc<Subscribers<Option<Session>>>,
    hash_iterations: u32,
    latency: Duration,
}

impl AuthSessionService {
    pub fn new(store: Arc<DocumentStore>, hash_iterations: u32) -> Arc<Self> {
        Self::with_latency(store, hash_iterations, Duration::ZERO)
    }

    /// Build the service and register it as a write observer on `store`.
    pub fn with_latency(
        store: Arc<DocumentStore>,
        hash_iterations: u32,
        latency: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let observer: Weak<dyn DocumentObserver> = weak.clone();
            store.register_observer(observer);
            Self {
                store,
                registry: RwLock::new(Registry::default()),
                session: RwLock::new(None),
                subscribers: Subscribers::new(),
                hash_iterations,
                latency,
            }
        })
    }

    // ── Identity lifecycle ──────────────────────────────────

    /// Register a new identity, write its profile stub and sign it in.
    pub async fn create_identity(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<Session, AuthError> {
        simulate_latency(self.latency).await;

        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(AuthError::MissingField("displayName"));
        }

        let user = User {
            uid: Uuid::new_v4().to_string(),
            email,
            display_name: display_name.to_string(),
            role,
            photo_url: None,
        };

        {
            let mut registry = self.registry.write().map_err(|_| AuthError::LockPoisoned)?;
            if registry.by_email.contains_key(&user.email) {
                return Err(AuthError::DuplicateIdentity(user.email));
            }
            registry.insert(Identity {
                user: user.clone(),
                digest: PasswordDigest::new(password, self.hash_iterations),
            });
        }

        // Stub goes in before the session is activated, so subscribers
        // see a single change carrying the stored profile.
        let path = DocPath::new(USERS, &user.uid)?;
        let stored = match self.store.set(&path, profile_stub(&user)).await {
            Ok(doc) => doc,
            Err(e) => {
                self.forget(&user.uid);
                return Err(e.into());
            }
        };

        let session = Session {
            user: overlay_profile(&user, &stored),
            signed_in_at: Utc::now(),
        };
        self.activate(session.clone())?;

        tracing::info!(uid = %session.uid(), role = %session.role(), "Identity created");
        Ok(session)
    }

    /// Sign in. The stored profile's role and display name win over the
    /// values given at signup.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        simulate_latency(self.latency).await;

        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(AuthError::MissingField("email"));
        }
        if password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }

        let user = {
            let registry = self.registry.read().map_err(|_| AuthError::LockPoisoned)?;
            match registry.by_email.get(&email) {
                Some(identity) if identity.digest.verify(password) => identity.user.clone(),
                _ => {
                    tracing::warn!("Sign-in rejected: invalid credentials");
                    return Err(AuthError::InvalidCredentials);
                }
            }
        };

        let path = DocPath::new(USERS, &user.uid)?;
        let profile = self.store.get(&path).await?;
        let user = match profile.data() {
            Some(doc) => overlay_profile(&user, doc),
            None => user,
        };

        let session = Session {
            user,
            signed_in_at: Utc::now(),
        };
        self.activate(session.clone())?;

        tracing::info!(uid = %session.uid(), role = %session.role(), "Signed in");
        Ok(session)
    }

    /// Clear the active session. Safe to call with no session active.
    pub async fn end_session(&self) -> Result<(), AuthError> {
        simulate_latency(self.latency).await;
        self.clear_session()
    }

    pub(crate) fn clear_session(&self) -> Result<(), AuthError> {
        let _delivery = self.subscribers.delivery();
        let previous = {
            let mut guard = self.session.write().map_err(|_| AuthError::LockPoisoned)?;
            guard.take()
        };
        if let Some(previous) = previous {
            tracing::info!(uid = %previous.uid(), "Session ended");
            self.subscribers.emit(&None);
        }
        Ok(())
    }

    // ── Session access ──────────────────────────────────────

    pub fn current_session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|guard| guard.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Call `callback` now with the current session, then after every change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&Session>) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let forward = Arc::clone(&callback);

        // No change can be emitted between the snapshot and the first
        // delivery while the delivery guard is held.
        let _delivery = self.subscribers.delivery();
        let subscription = self
            .subscribers
            .subscribe(move |session: &Option<Session>| (*forward)(session.as_ref()));
        let current = self.current_session();

        (*callback)(current.as_ref());
        subscription
    }

    /// Registered user for `uid`, as the registry currently sees it.
    pub fn identity(&self, uid: &str) -> Option<User> {
        self.registry
            .read()
            .ok()
            .and_then(|registry| registry.get_uid(uid).map(|i| i.user.clone()))
    }

    pub fn identity_count(&self) -> usize {
        self.registry
            .read()
            .map(|registry| registry.by_email.len())
            .unwrap_or(0)
    }

    fn activate(&self, session: Session) -> Result<(), AuthError> {
        let _delivery = self.subscribers.delivery();
        {
            let mut guard = self.session.write().map_err(|_| AuthError::LockPoisoned)?;
            *guard = Some(session.clone());
        }
        self.subscribers.emit(&Some(session));
        Ok(())
    }

    fn forget(&self, uid: &str) {
        if let Ok(mut registry) = self.registry.write() {
            registry.remove_uid(uid);
        }
    }
}

impl DocumentObserver for AuthSessionService {
    fn document_written(&self, path: &DocPath, data: &Document) {
        if path.collection() != USERS {
            return;
        }
        let uid = path.id();

        let _delivery = self.subscribers.delivery();
        let refreshed = match self.registry.write() {
            Ok(mut registry) => registry.refresh(uid, data),
            Err(_) => {
                tracing::error!(uid, "Identity registry lock poisoned, profile write not propagated");
                return;
            }
        };
        let Some(user) = refreshed else {
            return;
        };

        let changed = match self.session.write() {
            Ok(mut guard) => match guard.as_mut() {
                Some(session) if session.user.uid == uid && session.user != user => {
                    session.user = user;
                    Some(session.clone())
                }
                _ => None,
            },
            Err(_) => None,
        };

        if let Some(session) = changed {
            tracing::debug!(uid, "Active session refreshed from profile write");
            self.subscribers.emit(&Some(session));
        }
    }
}
