//! Settings Persistence
//!
//! User preferences and saved window state, each kept in its own JSON file.
//! Missing or damaged files fall back to defaults so the shell always starts.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Application URL loaded when no preference is stored
pub(crate) const DEFAULT_RIOT_URL: &str = "https://riot.im/app/";

const MIN_ZOOM: f64 = 0.25;
const MAX_ZOOM: f64 = 5.0;

/// Settings errors
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed settings file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid application URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Zoom factor {0} out of range (0.25..=5.0)")]
    InvalidZoom(f64),

    #[error("Invalid window geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },
}

/// Values checked before they are accepted into a store
pub trait Validate {
    fn validate(&self) -> Result<(), SettingsError>;
}

/// Per-user data directory (`<data_dir>/revolt`)
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("revolt")
}

fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("revolt")
}

/// User preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Web application loaded in the shell; also the in-app origin prefix
    pub riot_url: String,
    /// Web view zoom level
    pub zoom_factor: f64,
    /// Web inspector and console output on stdout
    pub enable_developer_tools: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            riot_url: DEFAULT_RIOT_URL.to_string(),
            zoom_factor: 1.0,
            enable_developer_tools: false,
        }
    }
}

impl AppSettings {
    /// `<config_dir>/revolt/settings.json`
    pub fn default_path() -> PathBuf {
        app_config_dir().join("settings.json")
    }
}

impl Validate for AppSettings {
    fn validate(&self) -> Result<(), SettingsError> {
        let url = url::Url::parse(&self.riot_url)?;
        if url.cannot_be_a_base() {
            return Err(SettingsError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase));
        }
        if !self.zoom_factor.is_finite() || !(MIN_ZOOM..=MAX_ZOOM).contains(&self.zoom_factor) {
            return Err(SettingsError::InvalidZoom(self.zoom_factor));
        }
        Ok(())
    }
}

/// Saved window geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowState {
    pub width: u32,
    pub height: u32,
    pub maximized: bool,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            maximized: false,
        }
    }
}

impl WindowState {
    /// `<data_dir>/revolt/window-state.json`
    pub fn default_path() -> PathBuf {
        app_data_dir().join("window-state.json")
    }
}

impl Validate for WindowState {
    fn validate(&self) -> Result<(), SettingsError> {
        let max = i32::MAX as u32;
        if self.width == 0 || self.height == 0 || self.width > max || self.height > max {
            return Err(SettingsError::InvalidGeometry {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// A value persisted as a JSON file
#[derive(Debug)]
pub struct SettingsStore<T> {
    path: PathBuf,
    value: T,
    dirty: bool,
}

impl<T> SettingsStore<T>
where
    T: Serialize + DeserializeOwned + Default + Validate + PartialEq + Clone,
{
    /// Open the store at `path`, falling back to defaults when the file is
    /// missing, unreadable or invalid.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let value = match read_value::<T>(&path) {
            Ok(Some(value)) => {
                debug!("Loaded settings from {:?}", path);
                value
            }
            Ok(None) => T::default(),
            Err(e) => {
                warn!("Ignoring settings in {:?}: {}", path, e);
                T::default()
            }
        };
        Self {
            path,
            value,
            dirty: false,
        }
    }

    /// Current value
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modify the value in memory only; `flush` writes it out later.
    ///
    /// Returns `Ok(false)` when nothing changed. An invalid result is
    /// rejected and the previous value is kept.
    pub fn set<F>(&mut self, f: F) -> Result<bool, SettingsError>
    where
        F: FnOnce(&mut T),
    {
        let mut next = self.value.clone();
        f(&mut next);
        if next == self.value {
            return Ok(false);
        }
        next.validate()?;
        self.value = next;
        self.dirty = true;
        Ok(true)
    }

    /// Modify the value and persist it immediately.
    pub fn update<F>(&mut self, f: F) -> Result<bool, SettingsError>
    where
        F: FnOnce(&mut T),
    {
        let changed = self.set(f)?;
        if changed {
            self.save()?;
        }
        Ok(changed)
    }

    /// Whether `set` left changes that are not on disk yet
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write pending changes, if any.
    pub fn flush(&mut self) -> Result<(), SettingsError> {
        if self.dirty {
            self.save()?;
        }
        Ok(())
    }

    /// Write the current value to disk.
    pub fn save(&mut self) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.value)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        self.dirty = false;
        Ok(())
    }

    /// Re-read the file after an external edit.
    ///
    /// Returns whether the value changed. A missing file keeps the current
    /// value, since editors may delete a file before writing it back; an
    /// invalid file is an error and the current value is kept too.
    pub fn reload(&mut self) -> Result<bool, SettingsError> {
        let Some(next) = read_value::<T>(&self.path)? else {
            debug!("{:?} is gone, keeping current settings", self.path);
            return Ok(false);
        };
        if next == self.value {
            return Ok(false);
        }
        info!("Settings reloaded from {:?}", self.path);
        self.value = next;
        self.dirty = false;
        Ok(true)
    }
}

fn read_value<T>(path: &Path) -> Result<Option<T>, SettingsError>
where
    T: DeserializeOwned + Validate,
{
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value: T = serde_json::from_str(&data)?;
    value.validate()?;
    Ok(Some(value))
}
