//! Configuration loading and resolution.

use std::path::PathBuf;

/// Environment variable that points at the settings file.
pub const SETTINGS_ENV: &str = "ADAPTOWEB_SETTINGS";

/// Resolve the settings file path.
pub fn resolve_settings_path(explicit: Option<&str>) -> String {
    if let Some(path) = explicit {
        return path.to_string();
    }

    if let Ok(env_path) = std::env::var(SETTINGS_ENV) {
        return env_path;
    }

    let cwd_settings = PathBuf::from(".adaptoweb/settings.json");
    if cwd_settings.exists() {
        return cwd_settings.display().to_string();
    }

    resolve_default_settings_path()
}

fn resolve_default_settings_path() -> String {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    format!("{home}/.adaptoweb/settings.json")
}
