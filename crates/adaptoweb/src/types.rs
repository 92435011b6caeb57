//! Shared error types and DOM marker names.

use crate::dom::NodeId;

/// Attribute names the adaptation modules write onto the page.
///
/// Each module owns a disjoint subset so markers never collide between
/// modules or with host-page attributes.
pub mod markers {
    /// Element hidden by the layout module.
    pub const HIDDEN: &str = "data-adaptoweb-hidden";
    /// Inline `display` value the element had before hiding.
    pub const ORIG_DISPLAY: &str = "data-adaptoweb-orig-display";
    /// Inline `visibility` value the element had before hiding.
    pub const ORIG_VISIBILITY: &str = "data-adaptoweb-orig-visibility";
    /// Main content container restyled by the layout module.
    pub const STYLED: &str = "data-adaptoweb-styled";

    /// Element whose text was rewritten.
    pub const SIMPLIFIED: &str = "data-adaptoweb-simplified";
    /// Verbatim text before rewriting.
    pub const ORIGINAL_TEXT: &str = "data-adaptoweb-original-text";

    /// Form already processed by the guidance module.
    pub const GUIDED: &str = "data-adaptoweb-guided";
    /// Emphasised submit control.
    pub const HIGHLIGHTED: &str = "data-adaptoweb-highlighted";
    /// Button that opens a form wizard.
    pub const TRIGGER: &str = "data-adaptoweb-trigger";

    /// Class of the floating original-text tooltip.
    pub const TOOLTIP_CLASS: &str = "adaptoweb-tooltip";
    /// Class of the wizard backdrop.
    pub const OVERLAY_CLASS: &str = "adaptoweb-form-overlay";
    /// Class of the wizard dialog.
    pub const MODAL_CLASS: &str = "adaptoweb-form-modal";
}

/// Errors that can occur while adapting a document.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AdaptError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node is not an element: {0}")]
    NotAnElement(NodeId),

    #[error("Cannot insert {child} under {parent}")]
    InvalidHierarchy { parent: NodeId, child: NodeId },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Convenience result type.
pub type AdaptResult<T> = Result<T, AdaptError>;
