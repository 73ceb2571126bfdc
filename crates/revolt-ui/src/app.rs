//! Application lifecycle
//!
//! Owns the GTK application, creates the main window on first activation
//! and exposes the `preferences` and `quit` actions.

use crate::window::MainWindow;
use gtk4::prelude::*;
use gtk4::{Application, gio, glib};
use revolt_core::{APP_ID, AppSettings, SettingsStore, WindowState};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

type SharedWindow = Rc<RefCell<Option<MainWindow>>>;

/// Run the application until the last window closes
pub fn run() -> anyhow::Result<()> {
    info!("Starting Revolt");

    let app = Application::builder().application_id(APP_ID).build();
    let main_window: SharedWindow = Rc::new(RefCell::new(None));

    {
        let main_window = main_window.clone();
        app.connect_activate(move |app| activate(app, &main_window));
    }
    {
        let main_window = main_window.clone();
        app.connect_shutdown(move |_| {
            if let Some(window) = main_window.borrow_mut().take() {
                window.finish();
            }
            info!("Revolt shutting down");
        });
    }
    install_actions(&app, &main_window);

    let code = app.run();
    if code != glib::ExitCode::SUCCESS {
        anyhow::bail!("GTK application exited with {:?}", code);
    }
    Ok(())
}

fn activate(app: &Application, main_window: &SharedWindow) {
    if let Some(window) = main_window.borrow().as_ref() {
        window.present();
        return;
    }

    let settings = SettingsStore::<AppSettings>::open(AppSettings::default_path());
    let state = SettingsStore::<WindowState>::open(WindowState::default_path());
    let window = MainWindow::new(app, settings, state);
    window.load_riot().present();
    *main_window.borrow_mut() = Some(window);
}

fn install_actions(app: &Application, main_window: &SharedWindow) {
    let preferences = gio::SimpleAction::new("preferences", None);
    {
        let main_window = main_window.clone();
        preferences.connect_activate(move |_, _| {
            if let Some(window) = main_window.borrow().as_ref() {
                window.load_settings_page();
            }
        });
    }
    app.add_action(&preferences);
    app.set_accels_for_action("app.preferences", &["<Primary>comma"]);

    let quit = gio::SimpleAction::new("quit", None);
    {
        let main_window = main_window.clone();
        let app = app.downgrade();
        quit.connect_activate(move |_, _| {
            if let Some(window) = main_window.borrow_mut().take() {
                window.finish();
            }
            if let Some(app) = app.upgrade() {
                app.quit();
            }
        });
    }
    app.add_action(&quit);
    app.set_accels_for_action("app.quit", &["<Primary>q"]);
}
