//! Notification Bridge
//!
//! Forwards web notifications to the desktop while the window is in the
//! background, and withdraws them once the user comes back.

use std::collections::BTreeSet;
use tracing::{debug, info};

/// Identifier used when a notification has no title
pub(crate) const FALLBACK_NOTIFICATION_ID: &str = "revolt";

/// A notification raised by the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebNotification {
    pub title: String,
    pub body: String,
}

impl WebNotification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Desktop notification id. The title names the conversation, so
    /// notifications from the same room replace each other.
    pub fn id(&self) -> &str {
        if self.title.is_empty() {
            FALLBACK_NOTIFICATION_ID
        } else {
            &self.title
        }
    }
}

/// Desktop side of the bridge
pub trait NotificationHost {
    /// Show (or replace) the desktop notification `id`
    fn send(&self, id: &str, notification: &WebNotification);
    /// Remove the desktop notification `id`
    fn withdraw(&self, id: &str);
    /// Set or clear the window's urgency hint
    fn set_urgent(&self, urgent: bool);
}

/// Tracks desktop notifications that are still on screen
#[derive(Debug, Default)]
pub struct NotificationBridge {
    outstanding: BTreeSet<String>,
}

impl NotificationBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a notification from the page.
    ///
    /// Always returns `true`: the web engine must not show its own.
    pub fn on_notification(
        &mut self,
        focused: bool,
        notification: &WebNotification,
        host: &dyn NotificationHost,
    ) -> bool {
        if focused {
            debug!("Window focused, dropping notification {:?}", notification.title);
            return true;
        }

        host.set_urgent(true);
        let id = notification.id();
        host.send(id, notification);
        if self.outstanding.insert(id.to_string()) {
            debug!("Tracking notification {:?} ({} outstanding)", id, self.outstanding.len());
        }
        true
    }

    /// Handle a change of the window's toplevel focus
    pub fn on_focus_changed(&mut self, focused: bool, host: &dyn NotificationHost) {
        if !focused {
            return;
        }
        host.set_urgent(false);
        if self.outstanding.is_empty() {
            return;
        }
        info!("Withdrawing {} notifications", self.outstanding.len());
        for id in std::mem::take(&mut self.outstanding) {
            host.withdraw(&id);
        }
    }

    /// Ids of notifications still shown on the desktop
    #[cfg(test)]
    fn outstanding(&self) -> impl Iterator<Item = &str> {
        self.outstanding.iter().map(String::as_str)
    }

    #[cfg(test)]
    fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }
}

/// Kind of a permission request from the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    Notification,
    Other,
}

/// Whether the shell grants a permission request. Notification permission
/// is always granted; everything else is left to the web engine.
pub fn grant_permission(kind: PermissionKind) -> bool {
    matches!(kind, PermissionKind::Notification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeHost {
        sent: RefCell<Vec<String>>,
        withdrawn: RefCell<Vec<String>>,
        urgent: Cell<Option<bool>>,
    }

    impl NotificationHost for FakeHost {
        fn send(&self, id: &str, _notification: &WebNotification) {
            self.sent.borrow_mut().push(id.to_string());
        }

        fn withdraw(&self, id: &str) {
            self.withdrawn.borrow_mut().push(id.to_string());
        }

        fn set_urgent(&self, urgent: bool) {
            self.urgent.set(Some(urgent));
        }
    }

    #[test]
    fn test_focused_sends_nothing() {
        let mut bridge = NotificationBridge::new();
        let host = FakeHost::default();

        let handled = bridge.on_notification(true, &WebNotification::new("Alice", "hi"), &host);

        assert!(handled);
        assert!(host.sent.borrow().is_empty());
        assert_eq!(host.urgent.get(), None);
        assert_eq!(bridge.outstanding_count(), 0);
    }

    #[test]
    fn test_unfocused_sends_keyed_by_title() {
        let mut bridge = NotificationBridge::new();
        let host = FakeHost::default();

        bridge.on_notification(false, &WebNotification::new("Alice", "hi"), &host);

        assert_eq!(*host.sent.borrow(), vec!["Alice".to_string()]);
        assert_eq!(host.urgent.get(), Some(true));
        assert_eq!(bridge.outstanding().collect::<Vec<_>>(), vec!["Alice"]);
    }

    #[test]
    fn test_same_title_coalesces() {
        let mut bridge = NotificationBridge::new();
        let host = FakeHost::default();

        bridge.on_notification(false, &WebNotification::new("#rust", "one"), &host);
        bridge.on_notification(false, &WebNotification::new("#rust", "two"), &host);

        assert_eq!(bridge.outstanding_count(), 1);
        // The desktop notification is replaced, not duplicated
        assert!(host.sent.borrow().iter().all(|id| id == "#rust"));
    }

    #[test]
    fn test_refocus_withdraws_all() {
        let mut bridge = NotificationBridge::new();
        let host = FakeHost::default();

        bridge.on_notification(false, &WebNotification::new("Alice", "hi"), &host);
        bridge.on_notification(false, &WebNotification::new("Bob", "yo"), &host);
        bridge.on_focus_changed(true, &host);

        let mut withdrawn = host.withdrawn.borrow().clone();
        withdrawn.sort();
        assert_eq!(withdrawn, vec!["Alice".to_string(), "Bob".to_string()]);
        assert_eq!(host.urgent.get(), Some(false));
        assert_eq!(bridge.outstanding_count(), 0);
    }

    #[test]
    fn test_focus_lost_keeps_tracking() {
        let mut bridge = NotificationBridge::new();
        let host = FakeHost::default();

        bridge.on_notification(false, &WebNotification::new("Alice", "hi"), &host);
        bridge.on_focus_changed(false, &host);

        assert!(host.withdrawn.borrow().is_empty());
        assert_eq!(bridge.outstanding_count(), 1);
    }

    #[test]
    fn test_empty_title_uses_fallback_id() {
        let notification = WebNotification::new("", "body");
        assert_eq!(notification.id(), FALLBACK_NOTIFICATION_ID);
    }

    #[test]
    fn test_permission_grant() {
        assert!(grant_permission(PermissionKind::Notification));
        assert!(!grant_permission(PermissionKind::Other));
    }
}
