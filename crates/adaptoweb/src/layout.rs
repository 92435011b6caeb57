//! Layout simplification: find the main content, hide distractions around
//! it, and give it a calm reading typography.

use std::collections::{BTreeMap, BTreeSet};

use scraper::Selector;

use crate::dom::{Document, NodeId, StyleSnapshot};
use crate::module::{AdaptationModule, ModuleKind};
use crate::settings::Settings;
use crate::types::{markers, AdaptResult};

/// Selectors that usually wrap a page's primary content.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    ".main-content",
    ".content",
    "#main",
    "#content",
    r#"[role="main"]"#,
];

/// Generic containers scanned when no main-content candidate scores.
const FALLBACK_SELECTORS: &[&str] = &["div", "section", "article"];

/// Navigation, ads, pop-ups and other elements hidden outside main content.
const DISTRACTION_SELECTORS: &[&str] = &[
    "aside",
    ".sidebar",
    ".navigation",
    ".nav",
    ".advertisement",
    ".ads",
    ".social-share",
    ".social-media",
    ".popup",
    ".modal",
    ".overlay",
    r#"[class*="ad-"]"#,
    r#"[id*="ad-"]"#,
    "video[autoplay]",
    ".comments",
];

const AUTOPLAY_SELECTOR: &str = "video[autoplay], audio[autoplay]";
const HEADING_SELECTOR: &str = "h1, h2, h3, h4, h5, h6";

const SEMANTIC_TAGS: &[&str] = &["main", "article", "section"];
const SEMANTIC_BONUS: f64 = 100.0;
const NAME_BONUS: f64 = 50.0;
const CROWDED_PENALTY: f64 = 20.0;
const CROWDED_CHILD_LIMIT: usize = 20;
const TEXT_LENGTH_DIVISOR: f64 = 10.0;

const HIDDEN_PROPERTIES: &[&str] = &["display", "visibility"];
const CONTAINER_PROPERTIES: &[&str] = &[
    "max-width",
    "margin",
    "padding",
    "line-height",
    "font-size",
    "font-family",
    "background-color",
    "color",
];
const PARAGRAPH_PROPERTIES: &[&str] = &["margin-bottom", "line-height"];
const HEADING_PROPERTIES: &[&str] = &["margin-top", "margin-bottom", "line-height"];

/// An element considered during main-content detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredCandidate {
    pub node: NodeId,
    pub score: f64,
}

/// Heuristic main-content score of a single element.
pub fn score_element(doc: &Document, id: NodeId) -> f64 {
    let Some(tag) = doc.tag_name(id) else {
        return 0.0;
    };
    let text = doc.text_content(id);
    if text.is_empty() {
        return 0.0;
    }

    let mut score = text.trim().chars().count() as f64 / TEXT_LENGTH_DIVISOR;

    if SEMANTIC_TAGS.contains(&tag) {
        score += SEMANTIC_BONUS;
    }

    let class = doc.attr(id, "class").unwrap_or("").to_lowercase();
    let id_attr = doc.attr(id, "id").unwrap_or("").to_lowercase();
    if [class.as_str(), id_attr.as_str()]
        .iter()
        .any(|name| name.contains("content") || name.contains("main"))
    {
        score += NAME_BONUS;
    }

    if doc.element_children(id).len() > CROWDED_CHILD_LIMIT {
        score -= CROWDED_PENALTY;
    }

    score
}

/// Hides distractions and restyles the main content.
pub struct LayoutModule {
    main_content: Selector,
    fallback: Selector,
    distractions: Selector,
    autoplay: Selector,
    paragraphs: Selector,
    headings: Selector,
    hidden: BTreeMap<NodeId, StyleSnapshot>,
    styled: BTreeMap<NodeId, StyleSnapshot>,
    /// Videos whose `autoplay` was stripped. Kept across `remove` so they are
    /// still treated as distractions on the next pass.
    silenced: BTreeSet<NodeId>,
    main: Option<NodeId>,
}

impl Default for LayoutModule {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutModule {
    pub fn new() -> Self {
        Self {
            main_content: Selector::parse(&MAIN_CONTENT_SELECTORS.join(", "))
                .expect("main content selectors are valid"),
            fallback: Selector::parse(&FALLBACK_SELECTORS.join(", "))
                .expect("fallback selectors are valid"),
            distractions: Selector::parse(&DISTRACTION_SELECTORS.join(", "))
                .expect("distraction selectors are valid"),
            autoplay: Selector::parse(AUTOPLAY_SELECTOR).expect("autoplay selector is valid"),
            paragraphs: Selector::parse("p").expect("paragraph selector is valid"),
            headings: Selector::parse(HEADING_SELECTOR).expect("heading selector is valid"),
            hidden: BTreeMap::new(),
            styled: BTreeMap::new(),
            silenced: BTreeSet::new(),
            main: None,
        }
    }

    /// The element picked as main content by the last `apply`.
    pub fn main_content(&self) -> Option<NodeId> {
        self.main
    }

    /// Elements currently hidden by this module.
    pub fn hidden_elements(&self) -> Vec<NodeId> {
        self.hidden.keys().copied().collect()
    }

    /// Score every candidate and return the best one.
    ///
    /// Candidates are visited in document order and only a strictly higher
    /// score replaces the current best, so ties go to the earlier element.
    pub fn identify_main_content(&self, doc: &Document) -> Option<ScoredCandidate> {
        best_candidate(doc, &self.main_content)
            .or_else(|| best_candidate(doc, &self.fallback))
    }

    fn is_protected(&self, doc: &Document, id: NodeId) -> bool {
        self.main
            .is_some_and(|main| doc.contains(main, id) || doc.contains(id, main))
    }

    /// Show again anything hidden earlier that is now the main content or
    /// one of its ancestors, e.g. after the page swapped its content.
    fn unhide_protected(&mut self, doc: &mut Document) -> AdaptResult<()> {
        let protected: Vec<NodeId> = self
            .hidden
            .keys()
            .copied()
            .filter(|&id| self.is_protected(doc, id))
            .collect();
        for id in protected {
            if let Some(snapshot) = self.hidden.remove(&id) {
                tracing::debug!("Layout: {id} holds main content, showing it again");
                restore_hidden(doc, id, &snapshot)?;
            }
        }
        Ok(())
    }

    fn hide_distractions(&mut self, doc: &mut Document) -> AdaptResult<()> {
        let targets: Vec<NodeId> = doc
            .descendants(doc.root())
            .into_iter()
            .filter(|&id| {
                self.silenced.contains(&id)
                    || doc.matches(id, &self.distractions)
            })
            .collect();

        for id in targets {
            if self.is_protected(doc, id) || doc.has_attr(id, markers::HIDDEN) {
                continue;
            }
            let snapshot = doc.capture_style(id, HIDDEN_PROPERTIES);
            doc.set_attr(id, markers::ORIG_DISPLAY, snapshot.property("display").unwrap_or(""))?;
            doc.set_attr(
                id,
                markers::ORIG_VISIBILITY,
                snapshot.property("visibility").unwrap_or(""),
            )?;
            doc.set_style_property(id, "display", "none")?;
            doc.set_attr(id, markers::HIDDEN, "true")?;
            self.hidden.insert(id, snapshot);
        }

        // Playback state cannot be restored, so this part is one-way.
        for media in doc.select(doc.root(), &self.autoplay) {
            doc.pause_media(media);
            doc.remove_attr(media, "autoplay")?;
            if doc.tag_name(media) == Some("video") {
                self.silenced.insert(media);
            }
        }

        tracing::debug!("Layout: {} elements hidden", self.hidden.len());
        Ok(())
    }

    fn style(
        &mut self,
        doc: &mut Document,
        id: NodeId,
        properties: &[&str],
        values: &[(&str, String)],
    ) -> AdaptResult<()> {
        if !self.styled.contains_key(&id) {
            self.styled.insert(id, doc.capture_style(id, properties));
        }
        for (property, value) in values {
            doc.set_style_property(id, property, value)?;
        }
        Ok(())
    }

    fn apply_typography(&mut self, doc: &mut Document, settings: &Settings) -> AdaptResult<()> {
        let Some(main) = self.main else {
            return Ok(());
        };
        let line_height = settings.line_height_css();

        self.style(
            doc,
            main,
            CONTAINER_PROPERTIES,
            &[
                ("max-width", "800px".to_string()),
                ("margin", "0 auto".to_string()),
                ("padding", "20px".to_string()),
                ("line-height", line_height.clone()),
                ("font-size", settings.font_size_css()),
                ("font-family", "Arial, sans-serif".to_string()),
                ("background-color", "#ffffff".to_string()),
                ("color", "#333333".to_string()),
            ],
        )?;
        doc.set_attr(main, markers::STYLED, "true")?;

        for p in doc.select(main, &self.paragraphs) {
            self.style(
                doc,
                p,
                PARAGRAPH_PROPERTIES,
                &[
                    ("margin-bottom", "1.5em".to_string()),
                    ("line-height", line_height.clone()),
                ],
            )?;
        }

        for heading in doc.select(main, &self.headings) {
            self.style(
                doc,
                heading,
                HEADING_PROPERTIES,
                &[
                    ("margin-top", "2em".to_string()),
                    ("margin-bottom", "1em".to_string()),
                    ("line-height", "1.2".to_string()),
                ],
            )?;
        }
        Ok(())
    }
}

fn best_candidate(doc: &Document, selector: &Selector) -> Option<ScoredCandidate> {
    let mut best: Option<ScoredCandidate> = None;
    for node in doc.select(doc.root(), selector) {
        let score = score_element(doc, node);
        let current = best.map(|b| b.score).unwrap_or(0.0);
        if score > current {
            best = Some(ScoredCandidate { node, score });
        }
    }
    best
}

impl AdaptationModule for LayoutModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::Layout
    }

    fn apply(&mut self, doc: &mut Document, settings: &Settings) -> AdaptResult<()> {
        let candidate = self.identify_main_content(doc);
        self.main = candidate.map(|c| c.node);
        match candidate {
            Some(c) => tracing::debug!("Layout: main content {} scored {:.1}", c.node, c.score),
            None => tracing::debug!("Layout: no main content found"),
        }

        self.unhide_protected(doc)?;
        self.hide_distractions(doc)?;
        self.apply_typography(doc, settings)
    }

    fn remove(&mut self, doc: &mut Document) -> AdaptResult<()> {
        for (id, snapshot) in std::mem::take(&mut self.hidden) {
            restore_hidden(doc, id, &snapshot)?;
        }

        for (id, snapshot) in std::mem::take(&mut self.styled) {
            doc.remove_attr(id, markers::STYLED)?;
            doc.restore_style(id, &snapshot)?;
        }

        self.main = None;
        Ok(())
    }

    fn is_applied(&self) -> bool {
        !self.hidden.is_empty() || !self.styled.is_empty()
    }

    fn restyle(&mut self, doc: &mut Document, old: &Settings, new: &Settings) -> AdaptResult<bool> {
        let changed = old.font_size != new.font_size || old.line_spacing != new.line_spacing;
        if !changed || self.styled.is_empty() {
            return Ok(false);
        }
        self.apply_typography(doc, new)?;
        Ok(true)
    }
}

fn restore_hidden(doc: &mut Document, id: NodeId, snapshot: &StyleSnapshot) -> AdaptResult<()> {
    doc.remove_attr(id, markers::HIDDEN)?;
    doc.remove_attr(id, markers::ORIG_DISPLAY)?;
    doc.remove_attr(id, markers::ORIG_VISIBILITY)?;
    doc.restore_style(id, snapshot)
}
