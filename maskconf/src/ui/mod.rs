//! Terminal controls built on cursive.
//!
//! [`cursive_factory`] registers a constructor for every [`ControlKind`]. Constructors create
//! the cursive view alongside the adapter and park the view in [`ViewSlots`], from which
//! [`arrange`] lays the mask out by group.

mod widgets;

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use cursive::{
    CbSink, Cursive,
    traits::Resizable,
    view::View,
    views::{Dialog, LinearLayout, Panel, TextView},
};

pub use widgets::{
    EntryWidget, FlagsWidget, ListWidget, RadioWidget, SliderWidget, view_name,
};

use crate::{
    binding::{SharedWidget, shared},
    data::{ControlKind, ParameterSpec, StoreError, ValueStore},
    mask::{Mask, WidgetFactory},
};

/// Views created by the factory, waiting to be placed on screen. Keyed by parameter name.
pub type ViewSlots = Rc<RefCell<HashMap<String, Box<dyn View>>>>;

/// State living in the cursive user data while a mask is on screen.
pub struct EditSession {
    pub store: ValueStore,
    pub mask: Mask,
    pub accepted: bool,
}

impl EditSession {
    pub fn new(store: ValueStore, mask: Mask) -> Self {
        Self {
            store,
            mask,
            accepted: false,
        }
    }

    pub fn commit(&mut self, name: &str) -> Result<(), StoreError> {
        self.mask.commit_edit(name, &mut self.store)
    }

    pub fn commit_all(&mut self) -> Result<(), StoreError> {
        self.mask.commit_all(&mut self.store)
    }
}

/// Commit the edit of `name` from a view callback, reporting a rejection in a popup.
pub(crate) fn commit(siv: &mut Cursive, name: &str) {
    match siv.with_user_data(|session: &mut EditSession| session.commit(name)) {
        Some(Err(err)) => siv.add_layer(Dialog::info(err.to_string()).title("Invalid value")),
        Some(Ok(())) => {}
        None => warn!("no edit session for `{name}`"),
    }
}

fn park(views: &ViewSlots, spec: &ParameterSpec, view: Box<dyn View>) {
    views.borrow_mut().insert(spec.name.clone(), view);
}

/// Factory with a cursive control for every control kind.
pub fn cursive_factory(sink: CbSink, views: ViewSlots) -> WidgetFactory {
    let mut factory = WidgetFactory::new();
    for kind in ControlKind::ALL {
        let sink = sink.clone();
        let views = views.clone();
        factory.register(kind, move |spec| -> SharedWidget {
            let sink = sink.clone();
            match kind {
                ControlKind::Entry | ControlKind::Spinner => {
                    let (widget, view) = EntryWidget::new(spec, sink);
                    park(&views, spec, view);
                    shared(widget)
                }
                ControlKind::ListBox => {
                    let (widget, view) = ListWidget::new(spec, sink);
                    park(&views, spec, view);
                    shared(widget)
                }
                ControlKind::RadioGroup => {
                    let (widget, view) = RadioWidget::new(spec, sink);
                    park(&views, spec, view);
                    shared(widget)
                }
                ControlKind::FlagSet => {
                    let (widget, view) = FlagsWidget::new(spec, sink);
                    park(&views, spec, view);
                    shared(widget)
                }
                ControlKind::Slider => {
                    let (widget, view) = SliderWidget::new(spec, sink);
                    park(&views, spec, view);
                    shared(widget)
                }
            }
        });
    }
    factory
}

/// Lay out the parked views of `mask`: one labelled row per parameter, one panel per group.
pub fn arrange(mask: &Mask, store: &ValueStore, views: &ViewSlots) -> LinearLayout {
    let mut slots = views.borrow_mut();
    let label = |name: &str| match store.spec(name) {
        Ok(spec) if !spec.label.is_empty() => spec.label.clone(),
        _ => name.to_string(),
    };
    let label_width = mask
        .iter()
        .map(|b| label(b.name()).chars().count())
        .max()
        .unwrap_or(0)
        + 2;

    let mut form = LinearLayout::vertical();
    for group in mask.groups() {
        let mut rows = LinearLayout::vertical();
        for binding in mask.in_group(group) {
            let Some(view) = slots.remove(binding.name()) else {
                warn!("no view parked for `{}`", binding.name());
                continue;
            };
            rows.add_child(
                LinearLayout::horizontal()
                    .child(TextView::new(label(binding.name())).fixed_width(label_width))
                    .child(view),
            );
        }
        if group.is_empty() {
            form.add_child(rows);
        } else {
            form.add_child(Panel::new(rows).title(group));
        }
    }
    form
}
