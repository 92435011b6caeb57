//! The flat settings record shared by every adaptation module.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::module::ModuleKind;

/// Highest supported simplification level.
pub const MAX_SIMPLIFICATION_LEVEL: u8 = 5;
/// Allowed font size range in pixels.
pub const FONT_SIZE_RANGE: (u32, u32) = (12, 32);
/// Allowed line spacing range.
pub const LINE_SPACING_RANGE: (f64, f64) = (1.0, 3.0);

/// User-facing settings. Missing keys fall back to defaults and keys this
/// version does not know about are carried along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub enabled: bool,
    pub layout_simplification: bool,
    pub language_simplification: bool,
    pub interaction_guidance: bool,
    #[serde(deserialize_with = "lenient::level")]
    pub simplification_level: u8,
    #[serde(deserialize_with = "lenient::font_size")]
    pub font_size: u32,
    #[serde(deserialize_with = "lenient::spacing")]
    pub line_spacing: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            layout_simplification: true,
            language_simplification: false,
            interaction_guidance: true,
            simplification_level: 2,
            font_size: 16,
            line_spacing: 1.5,
            extra: Map::new(),
        }
    }
}

/// Numeric settings accept any JSON number. Out-of-range values saturate into
/// the field type here and are clamped by [`Settings::sanitized`]; values that
/// are not numbers fall back to the default (or, in a patch, are ignored).
mod lenient {
    use super::*;

    fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(Value::deserialize(deserializer)?.as_f64())
    }

    pub fn level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        Ok(maybe_level(deserializer)?.unwrap_or(Settings::default().simplification_level))
    }

    pub fn font_size<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        Ok(maybe_font_size(deserializer)?.unwrap_or(Settings::default().font_size))
    }

    pub fn spacing<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(maybe_spacing(deserializer)?.unwrap_or(Settings::default().line_spacing))
    }

    pub fn maybe_level<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
        Ok(number(deserializer)?.map(|n| n.round() as u8))
    }

    pub fn maybe_font_size<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u32>, D::Error> {
        Ok(number(deserializer)?.map(|n| n.round() as u32))
    }

    pub fn maybe_spacing<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f64>, D::Error> {
        number(deserializer)
    }
}

/// A partial settings update. Only the keys present overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_simplification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_simplification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_guidance: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::maybe_level"
    )]
    pub simplification_level: Option<u8>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::maybe_font_size"
    )]
    pub font_size: Option<u32>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::maybe_spacing"
    )]
    pub line_spacing: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SettingsPatch {
    /// A patch that flips a single module flag.
    pub fn module(kind: ModuleKind, enabled: bool) -> Self {
        let mut patch = Self::default();
        match kind {
            ModuleKind::Layout => patch.layout_simplification = Some(enabled),
            ModuleKind::TextRewrite => patch.language_simplification = Some(enabled),
            ModuleKind::FormGuidance => patch.interaction_guidance = Some(enabled),
        }
        patch
    }
}

/// One-line status derived from the settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub enabled: bool,
    pub active_modules: usize,
    pub label: String,
}

impl Settings {
    /// Whether the module's own flag is set, ignoring the master switch.
    pub fn module_flag(&self, kind: ModuleKind) -> bool {
        match kind {
            ModuleKind::Layout => self.layout_simplification,
            ModuleKind::TextRewrite => self.language_simplification,
            ModuleKind::FormGuidance => self.interaction_guidance,
        }
    }

    pub fn set_module_flag(&mut self, kind: ModuleKind, enabled: bool) {
        match kind {
            ModuleKind::Layout => self.layout_simplification = enabled,
            ModuleKind::TextRewrite => self.language_simplification = enabled,
            ModuleKind::FormGuidance => self.interaction_guidance = enabled,
        }
    }

    /// Whether the module should be running right now.
    pub fn is_module_active(&self, kind: ModuleKind) -> bool {
        self.enabled && self.module_flag(kind)
    }

    /// Overlay `patch` on these settings.
    pub fn merged(&self, patch: &SettingsPatch) -> Settings {
        let mut next = self.clone();
        if let Some(v) = patch.enabled {
            next.enabled = v;
        }
        if let Some(v) = patch.layout_simplification {
            next.layout_simplification = v;
        }
        if let Some(v) = patch.language_simplification {
            next.language_simplification = v;
        }
        if let Some(v) = patch.interaction_guidance {
            next.interaction_guidance = v;
        }
        if let Some(v) = patch.simplification_level {
            next.simplification_level = v;
        }
        if let Some(v) = patch.font_size {
            next.font_size = v;
        }
        if let Some(v) = patch.line_spacing {
            next.line_spacing = v;
        }
        for (key, value) in &patch.extra {
            next.extra.insert(key.clone(), value.clone());
        }
        next.sanitized()
    }

    /// Clamp numeric fields into their supported ranges.
    pub fn sanitized(mut self) -> Settings {
        let defaults = Settings::default();
        self.simplification_level = self.simplification_level.clamp(1, MAX_SIMPLIFICATION_LEVEL);
        self.font_size = self.font_size.clamp(FONT_SIZE_RANGE.0, FONT_SIZE_RANGE.1);
        self.line_spacing = if self.line_spacing.is_finite() {
            self.line_spacing.clamp(LINE_SPACING_RANGE.0, LINE_SPACING_RANGE.1)
        } else {
            defaults.line_spacing
        };
        self
    }

    /// Parse a settings record, tolerating partial objects.
    pub fn from_value(value: Value) -> serde_json::Result<Settings> {
        serde_json::from_value::<Settings>(value).map(Settings::sanitized)
    }

    /// Status line in the same shape the toolbar popup shows.
    pub fn status(&self) -> StatusSummary {
        let active_modules = ModuleKind::ALL
            .iter()
            .filter(|&&kind| self.module_flag(kind))
            .count();
        let label = match (self.enabled, active_modules) {
            (false, _) => "Disabled".to_string(),
            (true, 0) => "Enabled (no modules)".to_string(),
            (true, n) => format!("Active ({n} modules)"),
        };
        StatusSummary {
            enabled: self.enabled,
            active_modules,
            label,
        }
    }

    /// CSS `line-height` value for the configured spacing.
    pub fn line_height_css(&self) -> String {
        format!("{}", self.line_spacing)
    }

    /// CSS `font-size` value for the configured size.
    pub fn font_size_css(&self) -> String {
        format!("{}px", self.font_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_match_record() {
        let value = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "enabled": true,
                "layoutSimplification": true,
                "languageSimplification": false,
                "interactionGuidance": true,
                "simplificationLevel": 2,
                "fontSize": 16,
                "lineSpacing": 1.5
            })
        );
    }

    #[test]
    fn test_font_size_patch_keeps_other_fields() {
        let current = Settings {
            language_simplification: true,
            line_spacing: 2.0,
            ..Settings::default()
        };
        let patch: SettingsPatch = serde_json::from_value(json!({ "fontSize": 20 })).unwrap();
        let next = current.merged(&patch);
        assert_eq!(next.font_size, 20);
        assert!(next.language_simplification);
        assert_eq!(next.line_spacing, 2.0);
        assert_eq!(next.simplification_level, 2);
    }

    #[test]
    fn test_partial_record_fills_defaults_and_keeps_unknown_keys() {
        let settings = Settings::from_value(json!({ "enabled": false, "theme": "dark" })).unwrap();
        assert!(!settings.enabled);
        assert!(settings.layout_simplification);
        assert_eq!(settings.extra.get("theme"), Some(&json!("dark")));

        let back = serde_json::to_value(&settings).unwrap();
        assert_eq!(back["theme"], json!("dark"));
    }

    #[test]
    fn test_sanitize_clamps_ranges() {
        let settings = Settings {
            simplification_level: 0,
            font_size: 99,
            line_spacing: f64::NAN,
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(settings.simplification_level, 1);
        assert_eq!(settings.font_size, 32);
        assert_eq!(settings.line_spacing, 1.5);
    }

    #[test]
    fn test_status_label() {
        let mut settings = Settings::default();
        assert_eq!(settings.status().label, "Active (2 modules)");
        settings.layout_simplification = false;
        settings.interaction_guidance = false;
        assert_eq!(settings.status().label, "Enabled (no modules)");
        settings.enabled = false;
        assert_eq!(settings.status().label, "Disabled");
    }

    #[test]
    fn test_master_switch_gates_modules() {
        let mut settings = Settings::default();
        assert!(settings.is_module_active(ModuleKind::Layout));
        assert!(!settings.is_module_active(ModuleKind::TextRewrite));
        settings.enabled = false;
        assert!(!settings.is_module_active(ModuleKind::Layout));
    }

    #[test]
    fn test_odd_numbers_are_clamped_not_rejected() {
        let settings = Settings::from_value(json!({
            "simplificationLevel": 300,
            "fontSize": 16.5,
            "lineSpacing": "wide",
            "theme": "dark"
        }))
        .unwrap();
        assert_eq!(settings.simplification_level, MAX_SIMPLIFICATION_LEVEL);
        assert_eq!(settings.font_size, 17);
        assert_eq!(settings.line_spacing, 1.5);
        assert_eq!(settings.extra.get("theme"), Some(&json!("dark")));

        let negative = Settings::from_value(json!({"fontSize": -4, "simplificationLevel": 2.4})).unwrap();
        assert_eq!(negative.font_size, FONT_SIZE_RANGE.0);
        assert_eq!(negative.simplification_level, 2);
    }

    #[test]
    fn test_patch_numbers_are_lenient() {
        let patch: SettingsPatch =
            serde_json::from_value(json!({"fontSize": 40.2, "lineSpacing": null, "simplificationLevel": "x"}))
                .unwrap();
        assert_eq!(patch.font_size, Some(40));
        assert_eq!(patch.line_spacing, None);
        assert_eq!(patch.simplification_level, None);
        assert_eq!(Settings::default().merged(&patch).font_size, FONT_SIZE_RANGE.1);
    }
}
