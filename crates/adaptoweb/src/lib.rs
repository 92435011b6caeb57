//! AdaptoWeb: content-adaptation pipeline: main-content detection, distraction hiding, text rewriting, and form guidance.

pub mod controller;
pub mod debounce;
pub mod dom;
pub mod events;
pub mod form_guidance;
pub mod html;
pub mod layout;
pub mod module;
pub mod settings;
pub mod text_rewrite;
pub mod types;

pub use controller::{AdaptationController, ModuleChange, MUTATION_DEBOUNCE};
pub use debounce::Debouncer;
pub use dom::{parse_selector, Document, MutationRecord, NodeId, Rect, StyleSnapshot};
pub use events::{DomEvent, EventKind, Listener};
pub use form_guidance::{group_into_steps, FormGuidanceModule, FormStep};
pub use html::{inner_html, outer_html, parse_document, parse_fragment, to_html};
pub use layout::{score_element, LayoutModule, ScoredCandidate};
pub use module::{AdaptationModule, ModuleKind};
pub use scraper::Selector;
pub use settings::{Settings, SettingsPatch, StatusSummary};
pub use text_rewrite::{simplify_text, TextRewriteModule};
pub use types::*;
