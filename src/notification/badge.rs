use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use super::NotificationStore;
use crate::auth::AuthSessionService;
use crate::events::Subscription;
use crate::models::Notification;

/// Unread count for whoever is signed in.
///
/// Derived, never stored: it is recomputed when the session changes and
/// when the notification list changes, and published on a watch channel.
pub struct UnreadBadge {
    sender: Arc<watch::Sender<usize>>,
    _session: Subscription,
    _list: Subscription,
}

impl UnreadBadge {
    pub fn new(auth: &AuthSessionService, notifications: &Arc<NotificationStore>) -> Self {
        let (sender, _) = watch::channel(0usize);
        let sender = Arc::new(sender);
        let active_uid: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        // Subscribed first so the session callback, which fires
        // immediately, sees a list subscription already in place.
        let list = {
            let sender = Arc::clone(&sender);
            let active_uid = Arc::clone(&active_uid);
            notifications.subscribe(move |items: &[Notification]| {
                let uid = active_uid.lock().ok().and_then(|uid| uid.clone());
                publish(&sender, count_unread(items, uid.as_deref()));
            })
        };

        let session = {
            let sender = Arc::clone(&sender);
            let store = Arc::downgrade(notifications);
            auth.subscribe(move |session| {
                let uid = session.map(|s| s.uid().to_string());
                if let Ok(mut active) = active_uid.lock() {
                    *active = uid.clone();
                }
                let count = match (uid, store.upgrade()) {
                    (Some(uid), Some(store)) => store.unread_count(&uid),
                    _ => 0,
                };
                publish(&sender, count);
            })
        };

        Self {
            sender,
            _session: session,
            _list: list,
        }
    }

    pub fn count(&self) -> usize {
        *self.sender.borrow()
    }

    /// Receiver that wakes whenever the count changes.
    pub fn watch(&self) -> watch::Receiver<usize> {
        self.sender.subscribe()
    }
}

fn count_unread(items: &[Notification], uid: Option<&str>) -> usize {
    match uid {
        Some(uid) => items
            .iter()
            .filter(|n| n.recipient_id == uid && !n.read)
            .count(),
        None => 0,
    }
}

fn publish(sender: &watch::Sender<usize>, count: usize) {
    sender.send_if_modified(|current| {
        if *current == count {
            false
        } else {
            *current = count;
            true
        }
    });
}
