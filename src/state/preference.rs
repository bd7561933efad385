/// Light/dark display preference
///
/// The preference is read from local storage on startup, falling back to the
/// operating system's color scheme. Setting it updates the in-memory value
/// first, so the application theme follows immediately, and then persists it.
use iced::Theme;
use tracing::{debug, warn};

use super::storage::LocalStorage;
use crate::error::StorageError;

/// Storage key holding the preference
pub const STORAGE_KEY: &str = "theme-preference";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemePreference {
    Light,
    Dark,
}

impl ThemePreference {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemePreference::Light => "light",
            ThemePreference::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "light" => Some(ThemePreference::Light),
            "dark" => Some(ThemePreference::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            ThemePreference::Light => ThemePreference::Dark,
            ThemePreference::Dark => ThemePreference::Light,
        }
    }

    /// The iced theme every surface is rendered with
    pub fn theme(self) -> Theme {
        match self {
            ThemePreference::Light => Theme::Light,
            ThemePreference::Dark => Theme::Dark,
        }
    }
}

/// Operating system color scheme
pub fn system_preference() -> ThemePreference {
    match dark_light::detect() {
        dark_light::Mode::Dark => ThemePreference::Dark,
        dark_light::Mode::Light | dark_light::Mode::Default => ThemePreference::Light,
    }
}

#[derive(Debug)]
pub struct PreferenceStore {
    storage: LocalStorage,
    current: ThemePreference,
}

impl PreferenceStore {
    /// Read the stored preference, or derive one from `system_default`
    pub fn load(storage: LocalStorage, system_default: impl FnOnce() -> ThemePreference) -> Self {
        let stored = match storage.get_item(STORAGE_KEY) {
            Ok(value) => value.as_deref().and_then(ThemePreference::parse),
            Err(e) => {
                warn!(error = %e, "Could not read theme preference");
                None
            }
        };

        let current = match stored {
            Some(preference) => preference,
            None => {
                let preference = system_default();
                debug!(theme = preference.as_str(), "No stored theme, using system preference");
                preference
            }
        };

        Self { storage, current }
    }

    pub fn get_preference(&self) -> ThemePreference {
        self.current
    }

    /// Apply and persist a preference
    ///
    /// The preference is applied even when persisting fails.
    pub fn set_preference(&mut self, value: ThemePreference) -> Result<(), StorageError> {
        self.current = value;
        self.storage.set_item(STORAGE_KEY, value.as_str())
    }

    /// Switch light <-> dark and return the new value
    pub fn toggle(&mut self) -> Result<ThemePreference, StorageError> {
        let next = self.current.toggled();
        self.set_preference(next)?;
        Ok(next)
    }
}
