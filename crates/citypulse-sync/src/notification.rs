//! Single-slot notification queue with a cancellable auto-hide.
//!
//! At most one notification occupies the slot. `show` replaces whatever is
//! there and reschedules the hide; the previous hide task is aborted, so
//! only the latest call's timer can ever clear the slot. Writing the slot
//! and swapping the timer happen under the same lock, so concurrent `show`
//! calls from different threads cannot leave the slot holding one
//! notification while the timer belongs to another. Hide tasks also check
//! the notification id before clearing, so a late timer is harmless.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use citypulse_types::{Notification, NotificationId, NotificationKind};
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Shared handle to the notification slot.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    slot: watch::Sender<Option<Notification>>,
    pending_hide: Mutex<Option<AbortHandle>>,
    display: Duration,
}

impl NotificationCenter {
    /// An empty slot whose notifications stay visible for `display`.
    pub fn new(display: Duration) -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                slot,
                pending_hide: Mutex::new(None),
                display,
            }),
        }
    }

    /// Show a notification, replacing the current one.
    ///
    /// Must be called from within a tokio runtime for the auto-hide to be
    /// scheduled. Outside a runtime the notification stays until replaced
    /// or dismissed.
    pub fn show(&self, message: impl Into<String>, kind: NotificationKind) -> NotificationId {
        let id = NotificationId::new();
        let expires_at = TimeDelta::from_std(self.inner.display)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta))
            .unwrap_or_else(Utc::now);
        let notification = Notification {
            id,
            message: message.into(),
            kind,
            visible: true,
            expires_at,
        };

        tracing::debug!(
            notification_id = %id,
            kind = ?notification.kind,
            message = %notification.message,
            "showing notification"
        );

        // The slot write and the timer swap happen under one lock, so the
        // pending hide always belongs to the notification in the slot.
        let mut pending = self.inner.lock_pending();
        self.inner.slot.send_replace(Some(notification));
        let next = self.spawn_hide(id);
        if let Some(previous) = std::mem::replace(&mut *pending, next) {
            previous.abort();
        }
        id
    }

    /// Hide the current notification and cancel its auto-hide.
    pub fn dismiss(&self) {
        let mut pending = self.inner.lock_pending();
        abort_pending(&mut pending);
        self.inner.hide(None);
    }

    /// Hide the current notification only if it is still `id`.
    ///
    /// Returns `true` if the notification was hidden. A close action from
    /// an older notification cannot clear a newer one.
    pub fn dismiss_if(&self, id: NotificationId) -> bool {
        let mut pending = self.inner.lock_pending();
        let hidden = self.inner.hide(Some(id));
        if hidden {
            abort_pending(&mut pending);
        }
        hidden
    }

    /// The notification in the slot, visible or not.
    pub fn current(&self) -> Option<Notification> {
        self.inner.slot.borrow().clone()
    }

    /// The notification currently displayed, if any.
    pub fn visible(&self) -> Option<Notification> {
        self.inner
            .slot
            .borrow()
            .as_ref()
            .filter(|n| n.visible)
            .cloned()
    }

    /// Receiver that observes every change of the slot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Notification>> {
        self.inner.slot.subscribe()
    }

    /// Cancel any pending auto-hide without touching the slot.
    pub fn shutdown(&self) {
        abort_pending(&mut self.inner.lock_pending());
    }

    /// Start the hide timer for `id`. Returns `None` outside a runtime.
    fn spawn_hide(&self, id: NotificationId) -> Option<AbortHandle> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(notification_id = %id, "no runtime; notification will not auto-hide");
            return None;
        };

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let display = self.inner.display;
        let task = runtime.spawn(async move {
            tokio::time::sleep(display).await;
            if weak.upgrade().is_some_and(|inner| inner.hide(Some(id))) {
                tracing::debug!(notification_id = %id, "notification expired");
            }
        });
        Some(task.abort_handle())
    }
}

impl Inner {
    fn lock_pending(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.pending_hide
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the slot hidden. With `Some(id)`, only if the slot holds `id`.
    fn hide(&self, only: Option<NotificationId>) -> bool {
        self.slot.send_if_modified(|slot| match slot {
            Some(current) if current.visible && only.is_none_or(|id| id == current.id) => {
                current.visible = false;
                true
            }
            _ => false,
        })
    }
}

fn abort_pending(pending: &mut Option<AbortHandle>) {
    if let Some(handle) = pending.take() {
        handle.abort();
    }
}
