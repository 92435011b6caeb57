//! Persistent settings store.
//!
//! Holds the authoritative settings record and mirrors it to a JSON file.
//! Storage failures never take the relay down: a missing or unreadable file
//! yields the defaults, and a failed write keeps the in-memory snapshot.

use std::path::{Path, PathBuf};

use adaptoweb::{ModuleKind, Settings, SettingsPatch};

use crate::types::{RelayError, RelayResult};

/// Owns the current settings record and its backing file.
pub struct SettingsStore {
    settings: Settings,
    file_path: PathBuf,
    dirty: bool,
}

impl SettingsStore {
    /// Open the store at `path`. Missing files are created on first save.
    pub fn open(path: &str) -> Self {
        let file_path = PathBuf::from(path);
        let settings = match load(&file_path) {
            Ok(Some(settings)) => {
                tracing::info!("Loaded settings from {}", file_path.display());
                settings
            }
            Ok(None) => {
                tracing::info!("No settings at {}, using defaults", file_path.display());
                Settings::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read settings, using defaults: {e}");
                Settings::default()
            }
        };

        Self {
            settings,
            file_path,
            dirty: false,
        }
    }

    /// A store that never touches disk.
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            settings: settings.sanitized(),
            file_path: PathBuf::new(),
            dirty: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Whether the last change has not reached disk.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Merge `patch` into the stored record and persist it.
    pub fn update(&mut self, patch: &SettingsPatch) -> Settings {
        self.settings = self.settings.merged(patch);
        self.persist();
        self.settings.clone()
    }

    /// Set one module flag and persist.
    pub fn toggle_module(&mut self, module: ModuleKind, enabled: bool) -> Settings {
        self.update(&SettingsPatch::module(module, enabled))
    }

    /// Flip the master switch and persist.
    pub fn toggle_enabled(&mut self) -> Settings {
        let patch = SettingsPatch {
            enabled: Some(!self.settings.enabled),
            ..SettingsPatch::default()
        };
        self.update(&patch)
    }

    /// Write the record to disk.
    pub fn save(&mut self) -> RelayResult<()> {
        if self.file_path.as_os_str().is_empty() {
            self.dirty = false;
            return Ok(());
        }
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RelayError::Store(format!(
                        "Failed to create directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&self.file_path, json).map_err(|e| {
            RelayError::Store(format!("Failed to write {}: {e}", self.file_path.display()))
        })?;
        self.dirty = false;
        tracing::debug!("Saved settings to {}", self.file_path.display());
        Ok(())
    }

    fn persist(&mut self) {
        self.dirty = true;
        if let Err(e) = self.save() {
            tracing::warn!("Keeping settings in memory only: {e}");
        }
    }
}

fn load(path: &Path) -> RelayResult<Option<Settings>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    Ok(Some(Settings::from_value(value)?))
}
