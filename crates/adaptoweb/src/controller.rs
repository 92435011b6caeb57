//! Lifecycle controller: owns the page, the settings snapshot and the module
//! registry, and decides which module runs when.
//!
//! Time is supplied by the host. Page mutations are fed in through
//! [`AdaptationController::on_mutations`], and [`AdaptationController::tick`]
//! fires the debounced re-application once its deadline has passed.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::debounce::Debouncer;
use crate::dom::{Document, NodeId};
use crate::events::DomEvent;
use crate::form_guidance::FormGuidanceModule;
use crate::layout::LayoutModule;
use crate::module::{AdaptationModule, ModuleKind};
use crate::settings::{Settings, SettingsPatch};
use crate::text_rewrite::TextRewriteModule;
use crate::types::AdaptResult;

/// Quiet period after the last page mutation before modules are re-applied.
pub const MUTATION_DEBOUNCE: Duration = Duration::from_millis(500);

/// What a settings update did to one module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "module", rename_all = "camelCase")]
pub enum ModuleChange {
    Applied(ModuleKind),
    Removed(ModuleKind),
    /// Typography or rewrite level updated in place.
    Restyled(ModuleKind),
}

/// Coordinates the adaptation modules for a single page.
pub struct AdaptationController {
    document: Document,
    settings: Settings,
    modules: Vec<Box<dyn AdaptationModule>>,
    observing: bool,
    debouncer: Debouncer,
    passes: usize,
}

impl AdaptationController {
    /// Wrap a parsed page with the default module registry.
    pub fn new(document: Document) -> Self {
        Self::with_debounce(document, MUTATION_DEBOUNCE)
    }

    pub fn with_debounce(document: Document, delay: Duration) -> Self {
        Self::with_modules(
            document,
            vec![
                Box::new(LayoutModule::new()),
                Box::new(TextRewriteModule::new()),
                Box::new(FormGuidanceModule::new()),
            ],
            delay,
        )
    }

    /// Registry in the given order; one module per kind.
    pub(crate) fn with_modules(
        document: Document,
        modules: Vec<Box<dyn AdaptationModule>>,
        delay: Duration,
    ) -> Self {
        Self {
            document,
            settings: Settings::default(),
            modules,
            observing: false,
            debouncer: Debouncer::new(delay),
            passes: 0,
        }
    }

    /// Adopt the initial settings, adapt the page and start observing
    /// mutations.
    pub fn initialize(&mut self, settings: Settings) -> Vec<ModuleChange> {
        self.settings = settings.sanitized();
        let changes = if self.settings.enabled {
            self.apply_all()
        } else {
            Vec::new()
        };
        self.observe_mutations();
        tracing::info!(
            "Controller initialized: {} ({} modules applied)",
            self.settings.status().label,
            changes.len()
        );
        changes
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access for the host, e.g. to insert new page content.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    /// Whether the module holds any undo records right now.
    pub fn is_module_applied(&self, kind: ModuleKind) -> bool {
        self.modules
            .iter()
            .any(|m| m.kind() == kind && m.is_applied())
    }

    /// Number of debounced re-applications performed so far.
    pub fn reapply_count(&self) -> usize {
        self.passes
    }

    /// Replace the settings snapshot and reconcile modules with it.
    ///
    /// Flipping the master switch applies or removes everything. Otherwise
    /// only modules whose own flag changed are applied or removed, and active
    /// modules restyle in place when a value they render changed.
    pub fn update_settings(&mut self, settings: Settings) -> Vec<ModuleChange> {
        let changes = self.own_pass(|ctl| ctl.reconcile(settings));
        if !changes.is_empty() {
            tracing::info!("Settings updated: {changes:?}");
        }
        changes
    }

    fn reconcile(&mut self, settings: Settings) -> Vec<ModuleChange> {
        let new = settings.sanitized();
        let old = std::mem::replace(&mut self.settings, new.clone());

        let changes = if old.enabled != new.enabled {
            if new.enabled {
                self.apply_all()
            } else {
                self.debouncer.cancel();
                self.remove_all()
            }
        } else if new.enabled {
            let mut changes = Vec::new();
            for module in self.modules.iter_mut() {
                let kind = module.kind();
                let (was, now) = (old.module_flag(kind), new.module_flag(kind));
                let change = if was != now {
                    if now {
                        run_apply(module.as_mut(), &mut self.document, &new)
                            .then_some(ModuleChange::Applied(kind))
                    } else {
                        run_remove(module.as_mut(), &mut self.document)
                            .then_some(ModuleChange::Removed(kind))
                    }
                } else if now {
                    run_restyle(module.as_mut(), &mut self.document, &old, &new)
                        .then_some(ModuleChange::Restyled(kind))
                } else {
                    None
                };
                changes.extend(change);
            }
            changes
        } else {
            Vec::new()
        };
        changes
    }

    /// Merge a partial update over the current snapshot and reconcile.
    pub fn update_settings_patch(&mut self, patch: &SettingsPatch) -> Vec<ModuleChange> {
        let merged = self.settings.merged(patch);
        self.update_settings(merged)
    }

    /// Apply every module that is active under the current settings.
    pub fn apply_all(&mut self) -> Vec<ModuleChange> {
        self.own_pass(|ctl| {
            let mut changes = Vec::new();
            for module in ctl.modules.iter_mut() {
                let kind = module.kind();
                if ctl.settings.is_module_active(kind)
                    && run_apply(module.as_mut(), &mut ctl.document, &ctl.settings)
                {
                    changes.push(ModuleChange::Applied(kind));
                }
            }
            changes
        })
    }

    /// Remove every module, whatever its flag.
    pub fn remove_all(&mut self) -> Vec<ModuleChange> {
        self.own_pass(|ctl| {
            let mut changes = Vec::new();
            for module in ctl.modules.iter_mut() {
                let kind = module.kind();
                let was_applied = module.is_applied();
                if run_remove(module.as_mut(), &mut ctl.document) && was_applied {
                    changes.push(ModuleChange::Removed(kind));
                }
            }
            changes
        })
    }

    /// Start reacting to inserted elements. Mutations that happened before
    /// subscribing are discarded.
    pub fn observe_mutations(&mut self) {
        self.document.take_mutations();
        self.observing = true;
    }

    /// Stop observing and drop any pending re-application.
    pub fn disconnect(&mut self) {
        self.observing = false;
        self.debouncer.cancel();
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Drain the page's mutation log. When elements were inserted the
    /// debounce timer is restarted. Returns whether a pass is now pending.
    pub fn on_mutations(&mut self, now: Instant) -> bool {
        let records = self.document.take_mutations();
        if !self.observing || !self.settings.enabled {
            return false;
        }
        let added_element = records
            .iter()
            .flat_map(|r| r.added.iter())
            .any(|&id| self.document.is_element(id));
        if added_element {
            let restarted = self.debouncer.schedule(now);
            tracing::debug!(
                "Page mutation: {} records, timer {}",
                records.len(),
                if restarted { "restarted" } else { "started" }
            );
        }
        self.debouncer.is_pending()
    }

    /// When the pending re-application is due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debouncer.deadline()
    }

    /// Run the debounced re-application if its deadline has passed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.debouncer.fire(now) || !self.observing || !self.settings.enabled {
            return false;
        }
        self.passes += 1;
        let applied = self.apply_all();
        tracing::debug!("Re-applied {} modules after page mutation", applied.len());
        true
    }

    /// Deliver an interaction event to `node` and route each listener it
    /// triggers to the owning module. Returns the number of listeners run.
    pub fn dispatch_event(&mut self, node: NodeId, event: &DomEvent) -> AdaptResult<usize> {
        self.own_pass(|ctl| {
            let listeners = ctl.document.listeners(node, event.kind());
            for listener in &listeners {
                let owner = listener.owner();
                if let Some(module) = ctl.modules.iter_mut().find(|m| m.kind() == owner) {
                    module.handle_event(&mut ctl.document, node, listener, event)?;
                }
            }
            Ok(listeners.len())
        })
    }

    /// Run the controller's own edits. Mutations they cause are dropped, while
    /// host mutations not yet seen by `on_mutations` stay queued.
    fn own_pass<R>(&mut self, pass: impl FnOnce(&mut Self) -> R) -> R {
        let host = self.document.take_mutations();
        let out = pass(self);
        let own = self.document.take_mutations();
        if !own.is_empty() {
            tracing::trace!("Ignoring {} self-induced mutations", own.len());
        }
        self.document.requeue_mutations(host);
        out
    }
}

fn run_apply(module: &mut dyn AdaptationModule, doc: &mut Document, settings: &Settings) -> bool {
    match module.apply(doc, settings) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to apply {}: {e}", module.kind());
            false
        }
    }
}

fn run_restyle(
    module: &mut dyn AdaptationModule,
    doc: &mut Document,
    old: &Settings,
    new: &Settings,
) -> bool {
    match module.restyle(doc, old, new) {
        Ok(changed) => changed,
        Err(e) => {
            tracing::warn!("Failed to restyle {}: {e}", module.kind());
            false
        }
    }
}

fn run_remove(module: &mut dyn AdaptationModule, doc: &mut Document) -> bool {
    match module.remove(doc) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to remove {}: {e}", module.kind());
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::events::EventKind;
    use crate::html::{parse_document, to_html};
    use crate::types::{markers, AdaptError};

    const PAGE: &str = r#"<html><body>
        <nav class="nav"><a href="/">Home</a></nav>
        <article><h1>Title</h1><p>We utilize numerous tools to demonstrate the idea. Furthermore, the results were significant.</p></article>
        <aside>Related</aside>
        <form><input name="a"><input name="b"><input name="c"><input name="d"><input name="e"><input name="f"><button>Go</button></form>
    </body></html>"#;

    fn controller() -> AdaptationController {
        AdaptationController::new(parse_document(PAGE).unwrap())
    }

    fn first(doc: &Document, tag: &str) -> NodeId {
        doc.descendants(doc.root())
            .into_iter()
            .find(|&id| doc.tag_name(id) == Some(tag))
            .unwrap()
    }

    #[test]
    fn test_initialize_applies_enabled_modules() {
        let mut ctl = controller();
        let changes = ctl.initialize(Settings::default());
        assert_eq!(
            changes,
            vec![
                ModuleChange::Applied(ModuleKind::Layout),
                ModuleChange::Applied(ModuleKind::FormGuidance),
            ]
        );
        let aside = first(ctl.document(), "aside");
        assert_eq!(ctl.document().attr(aside, markers::HIDDEN), Some("true"));
        assert!(!ctl.is_module_applied(ModuleKind::TextRewrite));
    }

    #[test]
    fn test_disabled_initialize_leaves_page_alone() {
        let mut ctl = controller();
        let before = to_html(ctl.document());
        let changes = ctl.initialize(Settings {
            enabled: false,
            ..Settings::default()
        });
        assert!(changes.is_empty());
        assert_eq!(to_html(ctl.document()), before);
    }

    #[test]
    fn test_toggle_touches_only_that_module() {
        let mut ctl = controller();
        ctl.initialize(Settings::default());
        let form = first(ctl.document(), "form");
        let trigger_count = ctl.document().children(form).len();

        let changes = ctl.update_settings_patch(&SettingsPatch::module(ModuleKind::TextRewrite, true));
        assert_eq!(changes, vec![ModuleChange::Applied(ModuleKind::TextRewrite)]);
        assert_eq!(ctl.document().children(form).len(), trigger_count);

        let p = first(ctl.document(), "p");
        assert_eq!(ctl.document().attr(p, markers::SIMPLIFIED), Some("true"));

        let changes = ctl.update_settings_patch(&SettingsPatch::module(ModuleKind::Layout, false));
        assert_eq!(changes, vec![ModuleChange::Removed(ModuleKind::Layout)]);
        assert_eq!(ctl.document().attr(p, markers::SIMPLIFIED), Some("true"));
    }

    #[test]
    fn test_master_switch_round_trip_restores_page() {
        let mut ctl = controller();
        let before = to_html(ctl.document());
        ctl.initialize(Settings::default());

        let off = SettingsPatch {
            enabled: Some(false),
            ..SettingsPatch::default()
        };
        let changes = ctl.update_settings_patch(&off);
        assert_eq!(changes.len(), 2);
        assert_eq!(to_html(ctl.document()), before);

        let on = SettingsPatch {
            enabled: Some(true),
            ..SettingsPatch::default()
        };
        assert_eq!(ctl.update_settings_patch(&on).len(), 2);
    }

    #[test]
    fn test_font_size_patch_restyles_layout_in_place() {
        let mut ctl = controller();
        ctl.initialize(Settings::default());
        let aside = first(ctl.document(), "aside");
        let patch = SettingsPatch {
            font_size: Some(20),
            ..SettingsPatch::default()
        };
        let changes = ctl.update_settings_patch(&patch);
        assert_eq!(changes, vec![ModuleChange::Restyled(ModuleKind::Layout)]);
        assert_eq!(ctl.document().attr(aside, markers::HIDDEN), Some("true"));
        assert_eq!(ctl.settings().font_size, 20);
        assert_eq!(ctl.settings().line_spacing, 1.5);

        let article = first(ctl.document(), "article");
        assert_eq!(
            ctl.document().style_property(article, "font-size").as_deref(),
            Some("20px")
        );
    }

    #[test]
    fn test_mutation_burst_reapplies_once() {
        let mut ctl = controller();
        ctl.initialize(Settings::default());
        let start = Instant::now();

        for i in 0..10u64 {
            let doc = ctl.document_mut();
            let body = doc.body();
            let aside = doc.create_element("aside");
            doc.append_child(body, aside).unwrap();
            assert!(ctl.on_mutations(start + Duration::from_millis(i * 40)));
        }

        let last = start + Duration::from_millis(360);
        assert_eq!(ctl.next_deadline(), Some(last + MUTATION_DEBOUNCE));
        assert!(!ctl.tick(last + Duration::from_millis(100)));
        assert!(ctl.tick(last + MUTATION_DEBOUNCE));
        assert!(!ctl.tick(last + Duration::from_secs(5)));
        assert_eq!(ctl.reapply_count(), 1);

        let body = ctl.document().body();
        let asides: Vec<NodeId> = ctl
            .document()
            .element_children(body)
            .into_iter()
            .filter(|&id| ctl.document().tag_name(id) == Some("aside"))
            .collect();
        assert_eq!(asides.len(), 11);
        assert!(asides
            .iter()
            .all(|&id| ctl.document().has_attr(id, markers::HIDDEN)));
    }

    #[test]
    fn test_own_insertions_do_not_schedule() {
        let mut ctl = controller();
        ctl.initialize(Settings::default());
        assert!(!ctl.on_mutations(Instant::now()));
        assert_eq!(ctl.next_deadline(), None);

        let trigger = ctl
            .document()
            .descendants(ctl.document().root())
            .into_iter()
            .find(|&id| ctl.document().has_attr(id, markers::TRIGGER))
            .unwrap();
        assert_eq!(ctl.dispatch_event(trigger, &DomEvent::Click).unwrap(), 1);
        assert!(!ctl.on_mutations(Instant::now()));
    }

    #[test]
    fn test_mutations_ignored_when_disabled_or_disconnected() {
        let mut ctl = controller();
        ctl.initialize(Settings::default());
        ctl.disconnect();

        let doc = ctl.document_mut();
        let body = doc.body();
        let div = doc.create_element("div");
        doc.append_child(body, div).unwrap();
        assert!(!ctl.on_mutations(Instant::now()));
        assert!(!ctl.is_observing());
    }

    #[test]
    fn test_text_nodes_alone_do_not_schedule() {
        let mut ctl = controller();
        ctl.initialize(Settings::default());
        let doc = ctl.document_mut();
        let body = doc.body();
        let text = doc.create_text("hello");
        doc.append_child(body, text).unwrap();
        assert!(!ctl.on_mutations(Instant::now()));
    }

    #[test]
    fn test_dispatch_routes_to_text_module() {
        let mut ctl = controller();
        ctl.initialize(Settings {
            language_simplification: true,
            ..Settings::default()
        });
        let p = first(ctl.document(), "p");
        assert_eq!(
            ctl.document().listeners(p, EventKind::PointerEnter).len(),
            1
        );
        ctl.dispatch_event(p, &DomEvent::PointerEnter).unwrap();
        let body = ctl.document().body();
        let tooltip = ctl
            .document()
            .element_children(body)
            .into_iter()
            .find(|&id| ctl.document().attr(id, "class") == Some(markers::TOOLTIP_CLASS));
        assert!(tooltip.is_some());

        ctl.dispatch_event(p, &DomEvent::PointerLeave).unwrap();
        assert_eq!(ctl.dispatch_event(body, &DomEvent::Click).unwrap(), 0);
    }

    struct Broken {
        kind: ModuleKind,
        calls: Arc<AtomicUsize>,
    }

    impl AdaptationModule for Broken {
        fn kind(&self) -> ModuleKind {
            self.kind
        }

        fn apply(&mut self, _doc: &mut Document, _settings: &Settings) -> AdaptResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AdaptError::InvalidSelector("broken".into()))
        }

        fn remove(&mut self, _doc: &mut Document) -> AdaptResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AdaptError::InvalidSelector("broken".into()))
        }

        fn is_applied(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_failing_module_does_not_stop_the_others() {
        let calls = Arc::new(AtomicUsize::new(0));
        let modules: Vec<Box<dyn AdaptationModule>> = vec![
            Box::new(Broken {
                kind: ModuleKind::Layout,
                calls: Arc::clone(&calls),
            }),
            Box::new(TextRewriteModule::new()),
            Box::new(FormGuidanceModule::new()),
        ];
        let mut ctl =
            AdaptationController::with_modules(parse_document(PAGE).unwrap(), modules, MUTATION_DEBOUNCE);

        let changes = ctl.initialize(Settings {
            language_simplification: true,
            ..Settings::default()
        });
        assert_eq!(
            changes,
            vec![
                ModuleChange::Applied(ModuleKind::TextRewrite),
                ModuleChange::Applied(ModuleKind::FormGuidance),
            ]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let p = first(ctl.document(), "p");
        assert_eq!(ctl.document().attr(p, markers::SIMPLIFIED), Some("true"));

        let off = SettingsPatch {
            enabled: Some(false),
            ..SettingsPatch::default()
        };
        let changes = ctl.update_settings_patch(&off);
        assert_eq!(
            changes,
            vec![
                ModuleChange::Removed(ModuleKind::TextRewrite),
                ModuleChange::Removed(ModuleKind::FormGuidance),
            ]
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!ctl.document().has_attr(p, markers::SIMPLIFIED));
    }

    #[test]
    fn test_settings_update_keeps_unobserved_host_mutations() {
        let mut ctl = controller();
        ctl.initialize(Settings::default());
        let doc = ctl.document_mut();
        let body = doc.body();
        let aside = doc.create_element("aside");
        doc.append_child(body, aside).unwrap();

        ctl.update_settings_patch(&SettingsPatch::module(ModuleKind::TextRewrite, true));
        assert_eq!(ctl.document().pending_mutations(), 1);
        assert!(ctl.on_mutations(Instant::now()));
    }

    #[test]
    fn test_level_patch_restyles_text_in_place() {
        let mut ctl = controller();
        ctl.initialize(Settings {
            language_simplification: true,
            ..Settings::default()
        });
        let p = first(ctl.document(), "p");
        let patch = SettingsPatch {
            simplification_level: Some(1),
            ..SettingsPatch::default()
        };
        let changes = ctl.update_settings_patch(&patch);
        assert_eq!(changes, vec![ModuleChange::Restyled(ModuleKind::TextRewrite)]);
        assert!(!ctl.document().text_content(p).contains('\n'));
        assert_eq!(ctl.document().attr(p, markers::SIMPLIFIED), Some("true"));
    }
}
