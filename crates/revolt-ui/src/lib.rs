//! Revolt UI
//!
//! GTK4 + WebKitGTK shell around the Riot web application:
//! - app: GTK application, actions and lifecycle
//! - window: main window hosting the web view
//! - desktop: launcher and notification adapters for the host desktop

mod app;
mod desktop;
mod window;

pub use app::run;
pub use window::MainWindow;
