//! Interaction events and the listeners modules register for them.
//!
//! Listeners are plain tagged values rather than closures: the document only
//! stores which module action a node is wired to, and the controller routes a
//! dispatched event to the module that owns that action.

use serde::{Deserialize, Serialize};

use crate::dom::NodeId;
use crate::module::ModuleKind;

/// Kinds of user interaction the modules listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    PointerEnter,
    PointerLeave,
    Click,
    Input,
}

/// A user interaction delivered to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomEvent {
    PointerEnter,
    PointerLeave,
    Click,
    Input { value: String },
}

impl DomEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomEvent::PointerEnter => EventKind::PointerEnter,
            DomEvent::PointerLeave => EventKind::PointerLeave,
            DomEvent::Click => EventKind::Click,
            DomEvent::Input { .. } => EventKind::Input,
        }
    }
}

/// Module action bound to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listener {
    /// Show the pre-rewrite text in a tooltip.
    ShowOriginal,
    /// Remove the tooltip again.
    HideOriginal,
    /// Attach a wizard overlay to the page.
    OpenWizard { wizard: usize },
    WizardNext { wizard: usize },
    WizardPrevious { wizard: usize },
    /// Close the wizard from its last step.
    WizardFinish { wizard: usize },
    /// Close the wizard from the header button.
    WizardClose { wizard: usize },
    /// Mirror a cloned field's value onto the live form field.
    SyncField { original: NodeId },
}

impl Listener {
    /// The module that handles this listener.
    pub fn owner(&self) -> ModuleKind {
        match self {
            Listener::ShowOriginal | Listener::HideOriginal => ModuleKind::TextRewrite,
            _ => ModuleKind::FormGuidance,
        }
    }
}
