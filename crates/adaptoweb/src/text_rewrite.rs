//! Language simplification through a fixed vocabulary table.
//!
//! Long text blocks get wordy terms swapped for plain ones and one sentence
//! per line. The original wording stays available in a hover tooltip.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use scraper::Selector;

use crate::dom::{Document, NodeId, StyleSnapshot};
use crate::events::{DomEvent, EventKind, Listener};
use crate::module::{AdaptationModule, ModuleKind};
use crate::settings::Settings;
use crate::types::{markers, AdaptResult};

/// Shorter text is usually a label or button and is left alone.
pub const MIN_TEXT_LENGTH: usize = 50;

const TEXT_SELECTOR: &str = "p, h1, h2, h3, h4, h5, h6, li";

/// Ordered substitution table. No replacement produces a word that a later
/// rule would match.
const SUBSTITUTIONS: &[(&str, &str)] = &[
    ("furthermore|moreover|additionally|consequently", "Also"),
    ("utilize|utilization", "use"),
    ("approximately|roughly", "about"),
    ("demonstrate|illustrate", "show"),
    ("numerous|multiple", "many"),
    ("significant|substantial", "big"),
    ("implement|execute", "do"),
    ("purchase|acquire", "buy"),
];

const TOOLTIP_STYLE: &str = "position: absolute; background: #333; color: white; \
    padding: 8px 12px; border-radius: 4px; font-size: 14px; max-width: 300px; \
    z-index: 10000; pointer-events: none";

fn rules() -> &'static [(Regex, &'static str)] {
    static RULES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RULES.get_or_init(|| {
        SUBSTITUTIONS
            .iter()
            .map(|(words, replacement)| {
                let re = Regex::new(&format!(r"(?i)\b(?:{words})\b"))
                    .expect("substitution pattern is valid");
                (re, *replacement)
            })
            .collect()
    })
}

fn sentence_break() -> &'static Regex {
    static BREAK: OnceLock<Regex> = OnceLock::new();
    BREAK.get_or_init(|| Regex::new(r"([.!?])\s+").expect("sentence pattern is valid"))
}

/// Rewrite `text` with the vocabulary table. From level 2 upwards every
/// sentence also ends up on its own line.
pub fn simplify_text(text: &str, level: u8) -> String {
    let mut simplified = text.to_string();
    for (re, replacement) in rules() {
        simplified = re.replace_all(&simplified, *replacement).into_owned();
    }
    if level >= 2 {
        simplified = sentence_break().replace_all(&simplified, "$1\n").into_owned();
    }
    simplified
}

#[derive(Debug, Clone)]
struct RewriteRecord {
    children: Vec<NodeId>,
    style: StyleSnapshot,
}

/// Rewrites long text blocks and shows the original on hover.
pub struct TextRewriteModule {
    targets: Selector,
    rewritten: BTreeMap<NodeId, RewriteRecord>,
    /// One tooltip per element, reused on every hover.
    tooltips: BTreeMap<NodeId, NodeId>,
}

impl Default for TextRewriteModule {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRewriteModule {
    pub fn new() -> Self {
        Self {
            targets: Selector::parse(TEXT_SELECTOR).expect("text selector is valid"),
            rewritten: BTreeMap::new(),
            tooltips: BTreeMap::new(),
        }
    }

    /// Elements whose text is currently rewritten.
    pub fn rewritten_elements(&self) -> Vec<NodeId> {
        self.rewritten.keys().copied().collect()
    }

    /// The tooltip built for an element, attached or not.
    pub fn tooltip_for(&self, id: NodeId) -> Option<NodeId> {
        self.tooltips.get(&id).copied()
    }

    fn show_original(&mut self, doc: &mut Document, target: NodeId) -> AdaptResult<()> {
        let Some(original) = doc.attr(target, markers::ORIGINAL_TEXT).map(str::to_string) else {
            return Ok(());
        };
        let tooltip = match self.tooltips.get(&target) {
            Some(&tooltip) if doc.is_attached(tooltip) => return Ok(()),
            Some(&tooltip) => tooltip,
            None => {
                let tooltip = doc.create_element("div");
                doc.set_attr(tooltip, "class", markers::TOOLTIP_CLASS)?;
                doc.set_style_text(tooltip, TOOLTIP_STYLE)?;
                self.tooltips.insert(target, tooltip);
                tooltip
            }
        };
        if doc.text_content(tooltip) != original {
            doc.set_text_content(tooltip, &original)?;
        }

        let rect = doc.bounding_rect(target);
        doc.set_style_property(tooltip, "left", &format!("{}px", rect.left()))?;
        doc.set_style_property(tooltip, "top", &format!("{}px", rect.bottom() + 5.0))?;

        let body = doc.body();
        doc.append_child(body, tooltip)
    }

    fn hide_original(&mut self, doc: &mut Document, target: NodeId) -> AdaptResult<()> {
        if let Some(&tooltip) = self.tooltips.get(&target) {
            doc.detach(tooltip)?;
        }
        Ok(())
    }
}

impl AdaptationModule for TextRewriteModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::TextRewrite
    }

    fn apply(&mut self, doc: &mut Document, settings: &Settings) -> AdaptResult<()> {
        let mut count = 0usize;
        for id in doc.select(doc.root(), &self.targets) {
            // An earlier rewrite of an ancestor may have detached this node.
            if !doc.is_attached(id) || doc.has_attr(id, markers::SIMPLIFIED) {
                continue;
            }

            let original = doc.text_content(id).trim().to_string();
            if original.chars().count() < MIN_TEXT_LENGTH {
                continue;
            }

            let simplified = simplify_text(&original, settings.simplification_level);
            if simplified == original {
                continue;
            }

            let style = doc.capture_style(id, &["cursor"]);
            let children = doc.set_text_content(id, &simplified)?;
            doc.set_attr(id, markers::ORIGINAL_TEXT, &original)?;
            doc.set_attr(id, markers::SIMPLIFIED, "true")?;
            doc.set_style_property(id, "cursor", "help")?;
            doc.add_listener(id, EventKind::PointerEnter, Listener::ShowOriginal);
            doc.add_listener(id, EventKind::PointerLeave, Listener::HideOriginal);

            self.rewritten.insert(id, RewriteRecord { children, style });
            count += 1;
        }

        tracing::debug!("Text rewrite: {count} elements simplified");
        Ok(())
    }

    fn remove(&mut self, doc: &mut Document) -> AdaptResult<()> {
        for (&target, &tooltip) in &self.tooltips {
            if doc.is_attached(tooltip) {
                tracing::trace!("Closing tooltip for {target}");
                doc.detach(tooltip)?;
            }
        }

        for (id, record) in std::mem::take(&mut self.rewritten) {
            doc.take_children(id)?;
            for child in record.children {
                doc.append_child(id, child)?;
            }
            doc.remove_attr(id, markers::SIMPLIFIED)?;
            doc.remove_attr(id, markers::ORIGINAL_TEXT)?;
            doc.restore_style(id, &record.style)?;
            doc.remove_listener(id, EventKind::PointerEnter, &Listener::ShowOriginal);
            doc.remove_listener(id, EventKind::PointerLeave, &Listener::HideOriginal);
        }
        Ok(())
    }

    fn is_applied(&self) -> bool {
        !self.rewritten.is_empty()
    }

    fn handle_event(
        &mut self,
        doc: &mut Document,
        target: NodeId,
        listener: &Listener,
        _event: &DomEvent,
    ) -> AdaptResult<()> {
        match listener {
            Listener::ShowOriginal => self.show_original(doc, target),
            Listener::HideOriginal => self.hide_original(doc, target),
            _ => Ok(()),
        }
    }

    fn restyle(&mut self, doc: &mut Document, old: &Settings, new: &Settings) -> AdaptResult<bool> {
        if old.simplification_level == new.simplification_level || self.rewritten.is_empty() {
            return Ok(false);
        }
        for &id in self.rewritten.keys() {
            let Some(original) = doc.attr(id, markers::ORIGINAL_TEXT).map(str::to_string) else {
                continue;
            };
            let simplified = simplify_text(&original, new.simplification_level);
            if doc.text_content(id) != simplified {
                doc.set_text_content(id, &simplified)?;
            }
        }
        tracing::debug!(
            "Text rewrite: {} elements rewritten at level {}",
            self.rewritten.len(),
            new.simplification_level
        );
        Ok(true)
    }
}
