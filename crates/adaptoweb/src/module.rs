//! The adaptation module interface and the fixed module registry keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::events::{DomEvent, Listener};
use crate::settings::Settings;
use crate::types::AdaptResult;

/// The three adaptation modules, keyed by their settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleKind {
    #[serde(rename = "layoutSimplification")]
    Layout,
    #[serde(rename = "languageSimplification")]
    TextRewrite,
    #[serde(rename = "interactionGuidance")]
    FormGuidance,
}

impl ModuleKind {
    /// Registry order. Modules are applied and removed in this order.
    pub const ALL: [ModuleKind; 3] = [
        ModuleKind::Layout,
        ModuleKind::TextRewrite,
        ModuleKind::FormGuidance,
    ];

    /// Name of the settings flag that enables the module.
    pub fn settings_key(self) -> &'static str {
        match self {
            ModuleKind::Layout => "layoutSimplification",
            ModuleKind::TextRewrite => "languageSimplification",
            ModuleKind::FormGuidance => "interactionGuidance",
        }
    }

    pub fn from_settings_key(key: &str) -> Option<ModuleKind> {
        Self::ALL.into_iter().find(|k| k.settings_key() == key)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.settings_key())
    }
}

/// A reversible DOM transformation.
///
/// `apply` must tolerate being called while already applied: anything it
/// already adapted carries a marker and is skipped. `remove` undoes exactly
/// what `apply` recorded and leaves the module ready to apply again.
pub trait AdaptationModule: Send {
    fn kind(&self) -> ModuleKind;

    fn apply(&mut self, doc: &mut Document, settings: &Settings) -> AdaptResult<()>;

    fn remove(&mut self, doc: &mut Document) -> AdaptResult<()>;

    /// Whether the module currently holds undo records.
    fn is_applied(&self) -> bool;

    /// React to an event that hit one of this module's listeners.
    fn handle_event(
        &mut self,
        _doc: &mut Document,
        _target: NodeId,
        _listener: &Listener,
        _event: &DomEvent,
    ) -> AdaptResult<()> {
        Ok(())
    }

    /// Carry a changed presentation setting (font size, spacing, rewrite
    /// level) over to what is already adapted, in place. Nothing is removed
    /// or re-detected. Returns whether the page changed.
    fn restyle(&mut self, _doc: &mut Document, _old: &Settings, _new: &Settings) -> AdaptResult<bool> {
        Ok(false)
    }
}
