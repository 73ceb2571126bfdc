//! Revolt Core
//!
//! Toolkit-free logic behind the desktop shell:
//! - settings: JSON-backed preference and window-state stores
//! - policy: decides which navigations stay in the web view
//! - notifications: bridges web notifications to the desktop

mod notifications;
mod policy;
mod settings;

pub use notifications::{
    NotificationBridge, NotificationHost, PermissionKind, WebNotification, grant_permission,
};
pub use policy::{
    DecisionKind, NavigationKind, NavigationPolicy, NavigationRequest, PolicyError,
    PolicyVerdict, UriOpener, settings_page_url,
};
pub use settings::{AppSettings, SettingsError, SettingsStore, Validate, WindowState, app_data_dir};

/// Application identifier, also used as the window and notification icon.
pub const APP_ID: &str = "org.perezdecastro.Revolt";
