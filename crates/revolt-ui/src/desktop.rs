//! Desktop adapters
//!
//! Connects the toolkit-free policy and notification bridge to GIO and GDK.

use gtk4::prelude::*;
use gtk4::{Application, ApplicationWindow, gio};
use revolt_core::{APP_ID, NotificationHost, UriOpener, WebNotification};
use tracing::{debug, warn};

/// Opens URIs with the user's default handler
pub struct DesktopLauncher;

impl UriOpener for DesktopLauncher {
    fn open(&self, uri: &str) {
        if let Err(e) = gio::AppInfo::launch_default_for_uri(uri, None::<&gio::AppLaunchContext>) {
            warn!("Failed to open {}: {}", uri, e);
        }
    }
}

/// Sends notifications through the application's GIO notification channel
pub struct DesktopNotifier<'a> {
    app: &'a Application,
    window: &'a ApplicationWindow,
}

impl<'a> DesktopNotifier<'a> {
    pub fn new(app: &'a Application, window: &'a ApplicationWindow) -> Self {
        Self { app, window }
    }
}

impl NotificationHost for DesktopNotifier<'_> {
    fn send(&self, id: &str, notification: &WebNotification) {
        let notif = gio::Notification::new(&notification.title);
        notif.set_body(Some(&notification.body));
        notif.set_icon(&gio::ThemedIcon::new(APP_ID));
        notif.set_priority(gio::NotificationPriority::High);
        self.app.send_notification(Some(id), &notif);
    }

    fn withdraw(&self, id: &str) {
        self.app.withdraw_notification(id);
    }

    fn set_urgent(&self, urgent: bool) {
        set_urgency_hint(self.window, urgent);
    }
}

#[cfg(target_os = "linux")]
fn set_urgency_hint(window: &ApplicationWindow, urgent: bool) {
    use gdk4_x11::X11Surface;

    match window.surface().and_then(|s| s.downcast::<X11Surface>().ok()) {
        Some(surface) => surface.set_urgency_hint(urgent),
        None => debug!("Urgency hint unsupported on this display"),
    }
}

#[cfg(not(target_os = "linux"))]
fn set_urgency_hint(_window: &ApplicationWindow, urgent: bool) {
    debug!("Urgency hint ({}) unsupported on this platform", urgent);
}
