//! Open pages, each adapted by its own controller.

use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};

use adaptoweb::{
    parse_document, parse_fragment, parse_selector, to_html, AdaptationController, DomEvent,
    EventKind, ModuleChange, NodeId, Settings,
};

use crate::types::{RelayError, RelayResult};

/// A page held by the relay.
pub struct Page {
    pub controller: AdaptationController,
    pub opened_at: DateTime<Utc>,
}

/// All pages currently open, keyed by page id.
#[derive(Default)]
pub struct PageRegistry {
    pages: HashMap<String, Page>,
}

impl PageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Ids of every open page, sorted.
    pub fn page_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.pages.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Parse `html`, adapt it with `settings` and register it.
    ///
    /// Reopening an existing id replaces the previous page.
    pub fn open(
        &mut self,
        page_id: Option<String>,
        html: &str,
        settings: &Settings,
    ) -> RelayResult<(String, Vec<ModuleChange>)> {
        let page_id = page_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let document = parse_document(html)?;
        let mut controller = AdaptationController::new(document);
        let changes = controller.initialize(settings.clone());

        if self
            .pages
            .insert(
                page_id.clone(),
                Page {
                    controller,
                    opened_at: Utc::now(),
                },
            )
            .is_some()
        {
            tracing::info!("Replaced page {page_id}");
        } else {
            tracing::info!("Opened page {page_id}");
        }
        Ok((page_id, changes))
    }

    pub fn close(&mut self, page_id: &str) -> RelayResult<()> {
        let mut page = self
            .pages
            .remove(page_id)
            .ok_or_else(|| RelayError::PageNotFound(page_id.to_string()))?;
        page.controller.disconnect();
        tracing::info!("Closed page {page_id}");
        Ok(())
    }

    pub fn get(&self, page_id: &str) -> RelayResult<&Page> {
        self.pages
            .get(page_id)
            .ok_or_else(|| RelayError::PageNotFound(page_id.to_string()))
    }

    pub fn get_mut(&mut self, page_id: &str) -> RelayResult<&mut Page> {
        self.pages
            .get_mut(page_id)
            .ok_or_else(|| RelayError::PageNotFound(page_id.to_string()))
    }

    /// Serialized HTML of a page in its current state.
    pub fn render(&self, page_id: &str) -> RelayResult<String> {
        Ok(to_html(self.get(page_id)?.controller.document()))
    }

    /// Insert an HTML fragment into a page as a host-side mutation.
    ///
    /// Returns the number of inserted nodes and whether a re-application is
    /// now scheduled.
    pub fn append_html(
        &mut self,
        page_id: &str,
        html: &str,
        selector: Option<&str>,
        now: Instant,
    ) -> RelayResult<(usize, bool)> {
        let page = self.get_mut(page_id)?;
        let doc = page.controller.document_mut();
        let parent = match selector {
            Some(source) => {
                let selector = parse_selector(source)?;
                doc.select_first(doc.root(), &selector)
                    .ok_or_else(|| RelayError::ElementNotFound(source.to_string()))?
            }
            None => doc.body(),
        };

        let nodes = parse_fragment(doc, html)?;
        for &node in &nodes {
            doc.append_child(parent, node)?;
        }
        let scheduled = page.controller.on_mutations(now);
        Ok((nodes.len(), scheduled))
    }

    /// Deliver an interaction event to the `index`-th match of `selector`.
    pub fn dispatch(
        &mut self,
        page_id: &str,
        selector: &str,
        index: usize,
        event: DomEvent,
    ) -> RelayResult<usize> {
        let page = self.get_mut(page_id)?;
        let target = find_target(page, selector, index)?;
        let handled = page.controller.dispatch_event(target, &event)?;
        tracing::debug!("Dispatched {:?} to {target} on {page_id}: {handled} listeners", event.kind());
        Ok(handled)
    }

    /// Push new settings to every open page.
    pub fn broadcast(&mut self, settings: &Settings) -> HashMap<String, Vec<ModuleChange>> {
        self.pages
            .iter_mut()
            .map(|(id, page)| (id.clone(), page.controller.update_settings(settings.clone())))
            .collect()
    }

    /// Earliest pending re-application across all pages.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pages
            .values()
            .filter_map(|p| p.controller.next_deadline())
            .min()
    }

    /// Fire every re-application that is due. Returns how many ran.
    pub fn tick(&mut self, now: Instant) -> usize {
        self.pages
            .values_mut()
            .map(|p| p.controller.tick(now))
            .filter(|&fired| fired)
            .count()
    }
}

fn find_target(page: &Page, selector: &str, index: usize) -> RelayResult<NodeId> {
    let doc = page.controller.document();
    let parsed = parse_selector(selector)?;
    doc.select(doc.root(), &parsed)
        .get(index)
        .copied()
        .ok_or_else(|| RelayError::ElementNotFound(format!("{selector} [{index}]")))
}

/// Build the event delivered for an `(kind, value)` pair.
pub fn make_event(kind: EventKind, value: Option<String>) -> DomEvent {
    match kind {
        EventKind::PointerEnter => DomEvent::PointerEnter,
        EventKind::PointerLeave => DomEvent::PointerLeave,
        EventKind::Click => DomEvent::Click,
        EventKind::Input => DomEvent::Input {
            value: value.unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const PAGE: &str = "<main><p>Body text that is long enough to count as content.</p></main>\
        <aside>Ads</aside>";

    #[test]
    fn test_open_render_close() {
        let mut pages = PageRegistry::new();
        let (id, changes) = pages
            .open(Some("p1".into()), PAGE, &Settings::default())
            .unwrap();
        assert_eq!(id, "p1");
        assert!(!changes.is_empty());
        assert!(pages.render("p1").unwrap().contains("data-adaptoweb-hidden"));

        pages.close("p1").unwrap();
        assert!(matches!(pages.close("p1"), Err(RelayError::PageNotFound(_))));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let mut pages = PageRegistry::new();
        let (a, _) = pages.open(None, PAGE, &Settings::default()).unwrap();
        let (b, _) = pages.open(None, PAGE, &Settings::default()).unwrap();
        assert_ne!(a, b);
        assert_eq!(pages.len(), 2);
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(pages.page_ids(), expected);
    }

    #[test]
    fn test_append_schedules_and_tick_fires() {
        let mut pages = PageRegistry::new();
        pages.open(Some("p".into()), PAGE, &Settings::default()).unwrap();
        let now = Instant::now();

        let (inserted, scheduled) = pages
            .append_html("p", r#"<div class="sidebar">More</div>"#, None, now)
            .unwrap();
        assert_eq!(inserted, 1);
        assert!(scheduled);
        assert!(pages.next_deadline().is_some());

        assert_eq!(pages.tick(now), 0);
        assert_eq!(pages.tick(now + Duration::from_secs(1)), 1);
        assert!(pages.render("p").unwrap().contains(r#"class="sidebar" data-adaptoweb-orig-display"#));
    }

    #[test]
    fn test_append_to_missing_parent() {
        let mut pages = PageRegistry::new();
        pages.open(Some("p".into()), PAGE, &Settings::default()).unwrap();
        let err = pages
            .append_html("p", "<p>x</p>", Some("#missing"), Instant::now())
            .unwrap_err();
        assert!(matches!(err, RelayError::ElementNotFound(_)));
    }
}
