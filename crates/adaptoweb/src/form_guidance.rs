//! Form guidance: long forms get a step-by-step wizard that mirrors their
//! fields, and every form's submit control is emphasised.
//!
//! The wizard works on clones of the live fields. Input typed into a clone is
//! copied back onto the original field, so the real form stays the single
//! source of truth and keeps working without the wizard.

use crate::dom::{Document, NodeId, StyleSnapshot};
use crate::events::{DomEvent, EventKind, Listener};
use crate::module::{AdaptationModule, ModuleKind};
use scraper::Selector;
use crate::settings::Settings;
use crate::types::{markers, AdaptResult};

/// Forms with fewer fields are left without a wizard.
pub const MIN_WIZARD_FIELDS: usize = 5;
/// Upper bound of fields shown on one wizard step.
pub const MAX_FIELDS_PER_STEP: usize = 3;

const FIELD_SELECTOR: &str = "input, select, textarea";
const SUBMIT_SELECTOR: &str =
    r#"input[type="submit"], button[type="submit"], button:not([type])"#;

const TRIGGER_LABEL: &str = "\u{1F4CB} Step-by-step help";
const STEP_HEADING: &str = "Complete these fields:";

const OVERLAY_STYLE: &str = "position: fixed; top: 0; left: 0; width: 100%; height: 100%; \
    background: rgba(0, 0, 0, 0.8); z-index: 10000; display: flex; align-items: center; \
    justify-content: center";
const MODAL_STYLE: &str = "background: white; padding: 24px; border-radius: 8px; \
    max-width: 500px; width: 90%; max-height: 80%; overflow-y: auto";
const TRIGGER_STYLE: &str = "position: absolute; top: -40px; right: 0; padding: 8px 16px; \
    background: #2563eb; color: white; border: none; border-radius: 4px; cursor: pointer; \
    font-size: 14px; z-index: 1000";
const FIELD_STYLE: &str = "width: 100%; padding: 8px 12px; border: 2px solid #d1d5db; \
    border-radius: 4px; font-size: 16px";
const NAV_STYLE: &str = "display: flex; justify-content: space-between; gap: 12px; margin-top: 24px";
const CLOSE_STYLE: &str = "background: none; border: none; font-size: 18px; cursor: pointer";
const TRACK_STYLE: &str = "width: 100%; height: 4px; background: #e5e7eb; border-radius: 2px";

const PREVIOUS_COLOR: &str = "#6b7280";
const NEXT_COLOR: &str = "#2563eb";
const FINISH_COLOR: &str = "#16a34a";

/// Emphasis written onto the primary submit control.
const SUBMIT_EMPHASIS: &[(&str, &str)] = &[
    ("background", "#16a34a !important"),
    ("color", "white !important"),
    ("border", "2px solid #15803d !important"),
    ("padding", "12px 24px !important"),
    ("font-size", "16px !important"),
    ("font-weight", "bold !important"),
    ("border-radius", "4px !important"),
    ("cursor", "pointer !important"),
];

/// One page of a wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormStep {
    pub fields: Vec<NodeId>,
}

/// Split `fields` into wizard steps.
///
/// Fields are taken in order. A step closes as soon as it holds
/// [`MAX_FIELDS_PER_STEP`] fields or the next field sits in a different
/// `fieldset` than the current one, so step sizes can be uneven.
pub fn group_into_steps(doc: &Document, fields: &[NodeId]) -> Vec<FormStep> {
    let mut steps = Vec::new();
    let mut current = Vec::new();

    for (i, &field) in fields.iter().enumerate() {
        current.push(field);
        let next_fieldset = fields
            .get(i + 1)
            .and_then(|&next| doc.closest(next, "fieldset"));
        if current.len() >= MAX_FIELDS_PER_STEP || doc.closest(field, "fieldset") != next_fieldset {
            steps.push(FormStep {
                fields: std::mem::take(&mut current),
            });
        }
    }
    if !current.is_empty() {
        steps.push(FormStep { fields: current });
    }
    steps
}

#[derive(Debug, Clone)]
struct Wizard {
    form: NodeId,
    steps: Vec<FormStep>,
    current: usize,
    overlay: NodeId,
    modal: NodeId,
    trigger: NodeId,
    form_style: StyleSnapshot,
    /// Rendered page per step, built the first time that step is shown.
    pages: Vec<Option<NodeId>>,
}

/// Builds wizards for long forms and emphasises submit controls.
pub struct FormGuidanceModule {
    forms: Selector,
    fields: Selector,
    submit: Selector,
    labels: Selector,
    wizards: Vec<Wizard>,
    guided: Vec<NodeId>,
    highlighted: Vec<(NodeId, StyleSnapshot)>,
}

impl Default for FormGuidanceModule {
    fn default() -> Self {
        Self::new()
    }
}

impl FormGuidanceModule {
    pub fn new() -> Self {
        Self {
            forms: Selector::parse("form").expect("form selector is valid"),
            fields: Selector::parse(FIELD_SELECTOR).expect("field selector is valid"),
            submit: Selector::parse(SUBMIT_SELECTOR).expect("submit selector is valid"),
            labels: Selector::parse("label").expect("label selector is valid"),
            wizards: Vec::new(),
            guided: Vec::new(),
            highlighted: Vec::new(),
        }
    }

    /// Number of wizards built for the current page.
    pub fn wizard_count(&self) -> usize {
        self.wizards.len()
    }

    /// Forms processed since the last removal.
    pub fn guided_forms(&self) -> &[NodeId] {
        &self.guided
    }

    /// Overlay root of a wizard.
    pub fn overlay(&self, wizard: usize) -> Option<NodeId> {
        self.wizards.get(wizard).map(|w| w.overlay)
    }

    /// Trigger button of a wizard.
    pub fn trigger(&self, wizard: usize) -> Option<NodeId> {
        self.wizards.get(wizard).map(|w| w.trigger)
    }

    /// Zero-based step the wizard currently shows.
    pub fn current_step(&self, wizard: usize) -> Option<usize> {
        self.wizards.get(wizard).map(|w| w.current)
    }

    /// The steps a wizard was built from.
    pub fn steps(&self, wizard: usize) -> Option<&[FormStep]> {
        self.wizards.get(wizard).map(|w| w.steps.as_slice())
    }

    /// Page node rendered for one wizard step, once that step has been shown.
    pub fn step_page(&self, wizard: usize, step: usize) -> Option<NodeId> {
        self.wizards
            .get(wizard)
            .and_then(|w| w.pages.get(step).copied().flatten())
    }

    fn build_wizard(&mut self, doc: &mut Document, form: NodeId, steps: Vec<FormStep>) -> AdaptResult<()> {
        let index = self.wizards.len();

        let overlay = doc.create_element("div");
        doc.set_attr(overlay, "class", markers::OVERLAY_CLASS)?;
        doc.set_style_text(overlay, OVERLAY_STYLE)?;
        let modal = doc.create_element("div");
        doc.set_attr(modal, "class", markers::MODAL_CLASS)?;
        doc.set_style_text(modal, MODAL_STYLE)?;
        doc.append_child(overlay, modal)?;

        let trigger = doc.create_element("button");
        doc.set_attr(trigger, "type", "button")?;
        doc.set_attr(trigger, markers::TRIGGER, "true")?;
        doc.set_text_content(trigger, TRIGGER_LABEL)?;
        doc.set_style_text(trigger, TRIGGER_STYLE)?;
        doc.add_listener(trigger, EventKind::Click, Listener::OpenWizard { wizard: index });

        let form_style = doc.capture_style(form, &["position"]);
        doc.set_style_property(form, "position", "relative")?;
        doc.append_child(form, trigger)?;

        tracing::debug!(
            "Form guidance: wizard {index} with {} steps for form {form}",
            steps.len()
        );
        self.wizards.push(Wizard {
            form,
            pages: vec![None; steps.len()],
            steps,
            current: 0,
            overlay,
            modal,
            trigger,
            form_style,
        });
        self.show_step(doc, index)
    }

    /// Put the page of the wizard's current step into the modal, building it
    /// on first use.
    fn show_step(&mut self, doc: &mut Document, index: usize) -> AdaptResult<()> {
        let Some(wizard) = self.wizards.get(index) else {
            return Ok(());
        };
        let (modal, step) = (wizard.modal, wizard.current);
        let page = match wizard.pages.get(step).copied().flatten() {
            Some(page) => page,
            None => {
                let page = self.build_page(doc, wizard, index)?;
                self.wizards[index].pages[step] = Some(page);
                page
            }
        };
        doc.take_children(modal)?;
        doc.append_child(modal, page)
    }

    /// Build the detached page for the wizard's current step.
    fn build_page(&self, doc: &mut Document, wizard: &Wizard, index: usize) -> AdaptResult<NodeId> {
        let total = wizard.steps.len();
        let step = wizard.current;
        let page = doc.create_element("div");

        // Progress header
        let progress = doc.create_element("div");
        doc.set_style_text(progress, "margin-bottom: 20px")?;
        let header = doc.create_element("div");
        doc.set_style_text(
            header,
            "display: flex; justify-content: space-between; margin-bottom: 8px",
        )?;
        let label = doc.create_element("span");
        doc.set_text_content(label, &format!("Step {} of {}", step + 1, total))?;
        let close = doc.create_element("button");
        doc.set_attr(close, "type", "button")?;
        doc.set_text_content(close, "\u{00D7}")?;
        doc.set_style_text(close, CLOSE_STYLE)?;
        doc.add_listener(close, EventKind::Click, Listener::WizardClose { wizard: index });
        doc.append_child(header, label)?;
        doc.append_child(header, close)?;

        let track = doc.create_element("div");
        doc.set_style_text(track, TRACK_STYLE)?;
        let bar = doc.create_element("div");
        let percent = (step + 1) as f64 / total as f64 * 100.0;
        doc.set_style_text(
            bar,
            &format!("width: {percent}%; height: 100%; background: #2563eb; border-radius: 2px"),
        )?;
        doc.append_child(track, bar)?;
        doc.append_child(progress, header)?;
        doc.append_child(progress, track)?;
        doc.append_child(page, progress)?;

        // Fields
        let container = doc.create_element("div");
        let heading = doc.create_element("h3");
        doc.set_style_text(heading, "margin-bottom: 16px")?;
        doc.set_text_content(heading, STEP_HEADING)?;
        doc.append_child(container, heading)?;

        for &field in &wizard.steps[step].fields {
            let row = doc.create_element("div");
            doc.set_style_property(row, "margin-bottom", "16px")?;

            if let Some(label) = self.label_for(doc, wizard.form, field) {
                let label_clone = doc.clone_node(label, true)?;
                doc.set_style_property(label_clone, "display", "block")?;
                doc.set_style_property(label_clone, "margin-bottom", "4px")?;
                doc.append_child(row, label_clone)?;
            }

            let field_clone = doc.clone_node(field, true)?;
            doc.set_style_text(field_clone, FIELD_STYLE)?;
            doc.add_listener(field_clone, EventKind::Input, Listener::SyncField { original: field });
            doc.append_child(row, field_clone)?;
            doc.append_child(container, row)?;
        }
        doc.append_child(page, container)?;

        // Navigation
        let nav = doc.create_element("div");
        doc.set_style_text(nav, NAV_STYLE)?;
        if step > 0 {
            let prev = nav_button(doc, "Previous", PREVIOUS_COLOR)?;
            doc.add_listener(prev, EventKind::Click, Listener::WizardPrevious { wizard: index });
            doc.append_child(nav, prev)?;
        } else {
            let spacer = doc.create_element("div");
            doc.append_child(nav, spacer)?;
        }
        if step + 1 < total {
            let next = nav_button(doc, "Next", NEXT_COLOR)?;
            doc.add_listener(next, EventKind::Click, Listener::WizardNext { wizard: index });
            doc.append_child(nav, next)?;
        } else {
            let finish = nav_button(doc, "Finish", FINISH_COLOR)?;
            doc.add_listener(finish, EventKind::Click, Listener::WizardFinish { wizard: index });
            doc.append_child(nav, finish)?;
        }
        doc.append_child(page, nav)?;
        Ok(page)
    }

    /// `label[for=id]` inside the form, else an enclosing label, else a label
    /// right before the field.
    fn label_for(&self, doc: &Document, form: NodeId, field: NodeId) -> Option<NodeId> {
        if let Some(id) = doc.attr(field, "id").filter(|id| !id.is_empty()) {
            let by_for = doc
                .select(form, &self.labels)
                .into_iter()
                .find(|&label| doc.attr(label, "for") == Some(id));
            if by_for.is_some() {
                return by_for;
            }
        }
        doc.closest(field, "label").or_else(|| {
            doc.previous_element_sibling(field)
                .filter(|&sibling| doc.tag_name(sibling) == Some("label"))
        })
    }

    fn highlight_submit(&mut self, doc: &mut Document, form: NodeId) -> AdaptResult<()> {
        let Some(button) = doc.select_first(form, &self.submit) else {
            return Ok(());
        };
        if doc.has_attr(button, markers::HIGHLIGHTED) {
            return Ok(());
        }
        let properties: Vec<&str> = SUBMIT_EMPHASIS.iter().map(|(p, _)| *p).collect();
        let snapshot = doc.capture_style(button, &properties);
        for (property, value) in SUBMIT_EMPHASIS {
            doc.set_style_property(button, property, value)?;
        }
        doc.set_attr(button, markers::HIGHLIGHTED, "true")?;
        self.highlighted.push((button, snapshot));
        Ok(())
    }

    fn navigate(&mut self, doc: &mut Document, index: usize, forward: bool) -> AdaptResult<()> {
        let Some(wizard) = self.wizards.get_mut(index) else {
            return Ok(());
        };
        let target = if forward {
            wizard.current + 1
        } else {
            wizard.current.wrapping_sub(1)
        };
        if target >= wizard.steps.len() {
            return Ok(());
        }
        wizard.current = target;
        self.show_step(doc, index)
    }
}

fn nav_button(doc: &mut Document, text: &str, color: &str) -> AdaptResult<NodeId> {
    let button = doc.create_element("button");
    doc.set_attr(button, "type", "button")?;
    doc.set_text_content(button, text)?;
    doc.set_style_text(
        button,
        &format!(
            "padding: 12px 24px; background: {color}; color: white; border: none; \
             border-radius: 4px; cursor: pointer"
        ),
    )?;
    Ok(button)
}

impl AdaptationModule for FormGuidanceModule {
    fn kind(&self) -> ModuleKind {
        ModuleKind::FormGuidance
    }

    fn apply(&mut self, doc: &mut Document, _settings: &Settings) -> AdaptResult<()> {
        for form in doc.select(doc.root(), &self.forms) {
            if doc.has_attr(form, markers::GUIDED) {
                continue;
            }

            let fields = doc.select(form, &self.fields);
            if fields.len() >= MIN_WIZARD_FIELDS {
                let steps = group_into_steps(doc, &fields);
                if steps.len() > 1 {
                    self.build_wizard(doc, form, steps)?;
                }
            }

            self.highlight_submit(doc, form)?;
            doc.set_attr(form, markers::GUIDED, "true")?;
            self.guided.push(form);
        }
        Ok(())
    }

    fn remove(&mut self, doc: &mut Document) -> AdaptResult<()> {
        for wizard in std::mem::take(&mut self.wizards) {
            for page in wizard.pages.into_iter().flatten() {
                doc.clear_listeners(page);
            }
            doc.clear_listeners(wizard.overlay);
            doc.detach(wizard.overlay)?;
            doc.clear_listeners(wizard.trigger);
            doc.detach(wizard.trigger)?;
            doc.restore_style(wizard.form, &wizard.form_style)?;
        }
        for (button, snapshot) in std::mem::take(&mut self.highlighted) {
            doc.restore_style(button, &snapshot)?;
            doc.remove_attr(button, markers::HIGHLIGHTED)?;
        }
        for form in std::mem::take(&mut self.guided) {
            doc.remove_attr(form, markers::GUIDED)?;
        }
        Ok(())
    }

    fn is_applied(&self) -> bool {
        !self.guided.is_empty()
    }

    fn handle_event(
        &mut self,
        doc: &mut Document,
        target: NodeId,
        listener: &Listener,
        event: &DomEvent,
    ) -> AdaptResult<()> {
        match *listener {
            Listener::OpenWizard { wizard } => {
                if let Some(w) = self.wizards.get(wizard) {
                    if !doc.is_attached(w.overlay) {
                        let body = doc.body();
                        doc.append_child(body, w.overlay)?;
                    }
                }
                Ok(())
            }
            Listener::WizardNext { wizard } => self.navigate(doc, wizard, true),
            Listener::WizardPrevious { wizard } => self.navigate(doc, wizard, false),
            Listener::WizardFinish { wizard } | Listener::WizardClose { wizard } => {
                if let Some(w) = self.wizards.get(wizard) {
                    doc.detach(w.overlay)?;
                }
                Ok(())
            }
            Listener::SyncField { original } => {
                let DomEvent::Input { value } = event else {
                    return Ok(());
                };
                set_field_value(doc, target, value)?;
                set_field_value(doc, original, value)
            }
            _ => Ok(()),
        }
    }
}

/// Store an input value on a form control the way that control keeps it.
///
/// Selects move `selected` to the matching option, checkboxes and radios
/// take the value as their checked state, textareas hold it as text.
fn set_field_value(doc: &mut Document, field: NodeId, value: &str) -> AdaptResult<()> {
    let tag = doc.tag_name(field).unwrap_or_default().to_string();
    let kind = doc
        .attr(field, "type")
        .unwrap_or_default()
        .to_ascii_lowercase();
    match (tag.as_str(), kind.as_str()) {
        ("textarea", _) => {
            doc.set_text_content(field, value)?;
            Ok(())
        }
        ("select", _) => select_option(doc, field, value),
        ("input", "checkbox") => set_checked(doc, field, is_checked(value)),
        ("input", "radio") => {
            let checked = is_checked(value);
            if checked {
                for other in radio_group(doc, field) {
                    doc.remove_attr(other, "checked")?;
                }
            }
            set_checked(doc, field, checked)
        }
        _ => doc.set_attr(field, "value", value),
    }
}

/// Unchecking values for checkbox and radio input; anything else checks.
fn is_checked(value: &str) -> bool {
    !matches!(value.trim(), "" | "false" | "off" | "0")
}

fn set_checked(doc: &mut Document, field: NodeId, checked: bool) -> AdaptResult<()> {
    if checked {
        doc.set_attr(field, "checked", "")
    } else {
        doc.remove_attr(field, "checked").map(drop)
    }
}

/// Other radios sharing `field`'s name inside the same form.
fn radio_group(doc: &Document, field: NodeId) -> Vec<NodeId> {
    let Some(name) = doc.attr(field, "name") else {
        return Vec::new();
    };
    let scope = doc.closest(field, "form").unwrap_or_else(|| doc.root());
    doc.descendants(scope)
        .into_iter()
        .filter(|&id| {
            id != field
                && doc.tag_name(id) == Some("input")
                && doc
                    .attr(id, "type")
                    .is_some_and(|t| t.eq_ignore_ascii_case("radio"))
                && doc.attr(id, "name") == Some(name)
        })
        .collect()
}

/// Mark the option whose value (or text, when it has no value) equals
/// `value` as the only selected one. Unknown values change nothing.
fn select_option(doc: &mut Document, select: NodeId, value: &str) -> AdaptResult<()> {
    let options: Vec<NodeId> = doc
        .descendants(select)
        .into_iter()
        .filter(|&id| doc.tag_name(id) == Some("option"))
        .collect();
    let option_value = |doc: &Document, option: NodeId| match doc.attr(option, "value") {
        Some(v) => v.to_string(),
        None => doc.text_content(option).trim().to_string(),
    };
    let Some(chosen) = options.iter().copied().find(|&o| option_value(doc, o) == value) else {
        return Ok(());
    };
    for option in options {
        if option == chosen {
            doc.set_attr(option, "selected", "")?;
        } else {
            doc.remove_attr(option, "selected")?;
        }
    }
    Ok(())
}
