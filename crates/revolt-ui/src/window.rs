//! Main Window
//!
//! A single application window hosting the Riot web view. Settings are
//! applied to the web view on construction and whenever the settings file
//! changes on disk; window geometry is saved as the user resizes.

use crate::desktop::{DesktopLauncher, DesktopNotifier};
use gtk4::prelude::*;
use gtk4::{Application, ApplicationWindow, HeaderBar, MenuButton, Spinner, gio, glib};
use revolt_core::{
    APP_ID, AppSettings, DecisionKind, NavigationKind, NavigationPolicy, NavigationRequest,
    NotificationBridge, PermissionKind, SettingsStore, WebNotification, WindowState,
    app_data_dir, grant_permission, settings_page_url,
};
use std::cell::RefCell;
use std::fs;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};
use webkit6::prelude::*;
use webkit6::{
    CookiePersistentStorage, LoadEvent, NetworkSession, NotificationPermissionRequest,
    PolicyDecisionType, TLSErrorsPolicy, UserContentInjectedFrames, UserContentManager,
    UserScript, UserScriptInjectionTime, WebView,
};

/// Asks for notification permission as soon as the page starts
const REQUEST_NOTIFICATION_PERMISSION: &str = "Notification.requestPermission();";

/// Smallest font size the page may render
const MINIMUM_FONT_SIZE: u32 = 12;

/// Window geometry is written once resizing settles
const STATE_SAVE_DELAY: Duration = Duration::from_millis(500);

struct Inner {
    app: Application,
    window: ApplicationWindow,
    spinner: Spinner,
    webview: RefCell<Option<WebView>>,
    settings: RefCell<SettingsStore<AppSettings>>,
    state: RefCell<SettingsStore<WindowState>>,
    pending_state_save: RefCell<Option<glib::SourceId>>,
    policy: RefCell<NavigationPolicy>,
    notifications: RefCell<NotificationBridge>,
    settings_monitor: RefCell<Option<gio::FileMonitor>>,
}

/// The browser shell window
#[derive(Clone)]
pub struct MainWindow {
    inner: Rc<Inner>,
}

impl MainWindow {
    pub fn new(
        app: &Application,
        settings: SettingsStore<AppSettings>,
        state: SettingsStore<WindowState>,
    ) -> Self {
        let saved = *state.get();
        let fallback = WindowState::default();
        let width = i32::try_from(saved.width).unwrap_or(fallback.width as i32);
        let height = i32::try_from(saved.height).unwrap_or(fallback.height as i32);
        let window = ApplicationWindow::builder()
            .application(app)
            .title("Revolt")
            .default_width(width)
            .default_height(height)
            .icon_name(APP_ID)
            .build();
        if saved.maximized {
            window.maximize();
        }

        let (header, spinner) = make_headerbar();
        window.set_titlebar(Some(&header));

        let webview = create_webview();
        webview.set_vexpand(true);
        webview.set_hexpand(true);
        window.set_child(Some(&webview));

        let policy = NavigationPolicy::new(settings.get().riot_url.clone());
        let inner = Rc::new(Inner {
            app: app.clone(),
            window,
            spinner,
            webview: RefCell::new(Some(webview.clone())),
            settings: RefCell::new(settings),
            state: RefCell::new(state),
            pending_state_save: RefCell::new(None),
            policy: RefCell::new(policy),
            notifications: RefCell::new(NotificationBridge::new()),
            settings_monitor: RefCell::new(None),
        });

        inner.apply_settings();
        connect_webview(&inner, &webview);
        connect_window(&inner);
        watch_settings(&inner);

        info!("Main window ready");
        Self { inner }
    }

    /// Load the configured application URL. The in-app prefix follows the
    /// application actually loaded, not later edits of the preference.
    pub fn load_riot(&self) -> &Self {
        let url = self.inner.settings.borrow().get().riot_url.clone();
        if let Some(webview) = self.inner.webview.borrow().as_ref() {
            info!("Loading {}", url);
            self.inner.policy.borrow_mut().set_app_url(url.clone());
            webview.load_uri(&url);
        }
        self
    }

    /// Navigate to the application's settings page
    pub fn load_settings_page(&self) {
        let Some(webview) = self.inner.webview.borrow().clone() else {
            return;
        };
        let current = webview.uri();
        let app_url = self.inner.policy.borrow().app_url().to_string();
        match settings_page_url(current.as_deref(), &app_url) {
            Ok(url) => webview.load_uri(&url),
            Err(e) => warn!("Cannot open settings page: {}", e),
        }
    }

    /// Tear down the web view and the window. Safe to call more than once.
    pub fn finish(&self) {
        if !self.inner.teardown() {
            return;
        }
        self.inner.window.set_visible(false);
        self.inner.window.destroy();
    }

    pub fn present(&self) {
        self.inner.window.present();
    }
}

impl Inner {
    /// Stop and release the web view. Returns `false` if already done.
    fn teardown(&self) -> bool {
        let Some(webview) = self.webview.borrow_mut().take() else {
            return false;
        };
        debug!("Releasing web view");
        webview.stop_loading();
        if let Some(monitor) = self.settings_monitor.borrow_mut().take() {
            monitor.cancel();
        }
        if let Some(source) = self.pending_state_save.borrow_mut().take() {
            source.remove();
        }
        self.flush_window_state();
        true
    }

    /// Push zoom and developer-tools preferences into the web view
    fn apply_settings(&self) {
        let Some(webview) = self.webview.borrow().clone() else {
            return;
        };
        let settings = self.settings.borrow().get().clone();

        webview.set_zoom_level(settings.zoom_factor);
        if let Some(web_settings) = WebViewExt::settings(&webview) {
            web_settings.set_enable_developer_extras(settings.enable_developer_tools);
            web_settings.set_enable_write_console_messages_to_stdout(settings.enable_developer_tools);
        }
    }

    fn set_network_busy(&self, busy: bool) {
        self.spinner.set_spinning(busy);
    }

    /// Record the current geometry and schedule a write
    fn record_window_state(self: &Rc<Self>) {
        let maximized = self.window.is_maximized();
        let (width, height) = self.window.default_size();
        let size = u32::try_from(width).ok().zip(u32::try_from(height).ok());
        let result = self.state.borrow_mut().set(|state| {
            state.maximized = maximized;
            if let (false, Some((width, height))) = (maximized, size) {
                if width > 0 && height > 0 {
                    state.width = width;
                    state.height = height;
                }
            }
        });
        match result {
            Ok(true) => self.schedule_state_save(),
            Ok(false) => {}
            Err(e) => warn!("Ignoring window geometry: {}", e),
        }
    }

    fn schedule_state_save(self: &Rc<Self>) {
        if self.pending_state_save.borrow().is_some() {
            return;
        }
        let weak = Rc::downgrade(self);
        let source = glib::timeout_add_local_once(STATE_SAVE_DELAY, move || {
            if let Some(inner) = weak.upgrade() {
                // The source is done once it fires
                inner.pending_state_save.borrow_mut().take();
                inner.flush_window_state();
            }
        });
        *self.pending_state_save.borrow_mut() = Some(source);
    }

    fn flush_window_state(&self) {
        if let Err(e) = self.state.borrow_mut().flush() {
            warn!("Failed to save window state: {}", e);
        }
    }
}

fn make_headerbar() -> (HeaderBar, Spinner) {
    let header = HeaderBar::new();
    header.set_show_title_buttons(true);

    let menu = gio::Menu::new();
    menu.append(Some("Settings"), Some("app.preferences"));
    menu.append(Some("Quit"), Some("app.quit"));
    let menu_button = MenuButton::builder()
        .icon_name("open-menu-symbolic")
        .menu_model(&menu)
        .build();
    header.pack_end(&menu_button);

    let spinner = Spinner::new();
    header.pack_end(&spinner);

    (header, spinner)
}

fn create_network_session() -> NetworkSession {
    let data_dir = app_data_dir();
    let cache_dir = data_dir.join("cache");
    if let Err(e) = fs::create_dir_all(&cache_dir) {
        warn!("Cannot create {:?}: {}", cache_dir, e);
    }

    let session = NetworkSession::new(
        Some(&data_dir.to_string_lossy()),
        Some(&cache_dir.to_string_lossy()),
    );
    session.set_tls_errors_policy(TLSErrorsPolicy::Fail);

    // Stay logged in across restarts
    if let Some(cookie_manager) = session.cookie_manager() {
        let cookies_path = data_dir.join("cookies.sqlite");
        cookie_manager.set_persistent_storage(
            &cookies_path.to_string_lossy(),
            CookiePersistentStorage::Sqlite,
        );
        debug!("Cookies persist to {:?}", cookies_path);
    }
    session
}

fn create_content_manager() -> UserContentManager {
    let manager = UserContentManager::new();
    let script = UserScript::new(
        REQUEST_NOTIFICATION_PERMISSION,
        UserContentInjectedFrames::TopFrame,
        UserScriptInjectionTime::Start,
        &[],
        &[],
    );
    manager.add_script(&script);
    manager
}

fn create_webview() -> WebView {
    let webview = WebView::builder()
        .network_session(&create_network_session())
        .user_content_manager(&create_content_manager())
        .build();

    if let Some(settings) = WebViewExt::settings(&webview) {
        settings.set_allow_file_access_from_file_urls(true);
        settings.set_allow_modal_dialogs(false);
        settings.set_enable_fullscreen(false);
        settings.set_enable_media_stream(true);
        // Single-page app, nothing to gain from the page cache
        settings.set_enable_page_cache(false);
        settings.set_enable_smooth_scrolling(true);
        settings.set_enable_webaudio(true);
        settings.set_javascript_can_access_clipboard(true);
        settings.set_minimum_font_size(MINIMUM_FONT_SIZE);
        settings.set_enable_mediasource(true);
    }
    webview
}

fn connect_webview(inner: &Rc<Inner>, webview: &WebView) {
    {
        let weak = Rc::downgrade(inner);
        webview.connect_decide_policy(move |_, decision, decision_type| {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let decision_kind = match decision_type {
                PolicyDecisionType::NavigationAction => DecisionKind::Navigation,
                PolicyDecisionType::NewWindowAction => DecisionKind::NewWindow,
                _ => return false,
            };
            let Some(nav_decision) = decision.downcast_ref::<webkit6::NavigationPolicyDecision>() else {
                return false;
            };
            let Some(mut action) = nav_decision.navigation_action() else {
                return false;
            };
            let navigation = navigation_kind(action.navigation_type());
            let uri = action.request().and_then(|request| request.uri());

            let request = NavigationRequest::new(decision_kind, navigation, uri.as_deref());
            let handled = inner.policy.borrow().handle(&request, &DesktopLauncher);
            if handled {
                decision.ignore();
            }
            handled
        });
    }

    {
        let weak = Rc::downgrade(inner);
        webview.connect_show_notification(move |_, notification| {
            let Some(inner) = weak.upgrade() else {
                return false;
            };
            let web_notification = WebNotification::new(
                notification.title().unwrap_or_default(),
                notification.body().unwrap_or_default(),
            );
            let focused = inner.window.is_active();
            let host = DesktopNotifier::new(&inner.app, &inner.window);
            let handled = inner
                .notifications
                .borrow_mut()
                .on_notification(focused, &web_notification, &host);
            handled
        });
    }

    webview.connect_permission_request(|_, request| {
        let kind = if request.is::<NotificationPermissionRequest>() {
            PermissionKind::Notification
        } else {
            PermissionKind::Other
        };
        let granted = grant_permission(kind);
        if granted {
            debug!("Granting notification permission");
            request.allow();
        }
        granted
    });

    {
        let weak = Rc::downgrade(inner);
        webview.connect_load_changed(move |_, event| {
            if let Some(inner) = weak.upgrade() {
                inner.set_network_busy(event != LoadEvent::Finished);
            }
        });
    }
}

fn navigation_kind(navigation_type: webkit6::NavigationType) -> NavigationKind {
    use webkit6::NavigationType;

    match navigation_type {
        NavigationType::LinkClicked => NavigationKind::LinkClicked,
        NavigationType::FormSubmitted => NavigationKind::FormSubmitted,
        NavigationType::BackForward => NavigationKind::BackForward,
        NavigationType::Reload => NavigationKind::Reload,
        NavigationType::FormResubmitted => NavigationKind::FormResubmitted,
        _ => NavigationKind::Other,
    }
}

fn connect_window(inner: &Rc<Inner>) {
    let window = &inner.window;

    {
        let weak = Rc::downgrade(inner);
        window.connect_is_active_notify(move |window| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let host = DesktopNotifier::new(&inner.app, window);
            inner
                .notifications
                .borrow_mut()
                .on_focus_changed(window.is_active(), &host);
        });
    }

    {
        let weak = Rc::downgrade(inner);
        window.connect_close_request(move |_| {
            if let Some(inner) = weak.upgrade() {
                inner.teardown();
            }
            glib::Propagation::Proceed
        });
    }

    let on_resize = |weak: Weak<Inner>| {
        move |_: &ApplicationWindow| {
            if let Some(inner) = weak.upgrade() {
                inner.record_window_state();
            }
        }
    };
    window.connect_default_width_notify(on_resize(Rc::downgrade(inner)));
    window.connect_default_height_notify(on_resize(Rc::downgrade(inner)));
    window.connect_maximized_notify(on_resize(Rc::downgrade(inner)));
}

/// Re-apply preferences when the settings file is edited by hand
fn watch_settings(inner: &Rc<Inner>) {
    let file = gio::File::for_path(inner.settings.borrow().path());
    let monitor = match file.monitor_file(gio::FileMonitorFlags::NONE, None::<&gio::Cancellable>) {
        Ok(monitor) => monitor,
        Err(e) => {
            warn!("Cannot watch settings file: {}", e);
            return;
        }
    };

    let weak = Rc::downgrade(inner);
    monitor.connect_changed(move |_, _, _, event| {
        if !matches!(
            event,
            gio::FileMonitorEvent::ChangesDoneHint | gio::FileMonitorEvent::Created
        ) {
            return;
        }
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let reloaded = inner.settings.borrow_mut().reload();
        match reloaded {
            Ok(true) => inner.apply_settings(),
            Ok(false) => {}
            Err(e) => warn!("Ignoring settings change: {}", e),
        }
    });
    *inner.settings_monitor.borrow_mut() = Some(monitor);
}
