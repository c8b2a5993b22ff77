//! Two-way synchronization between store entries and interactive controls.
//!
//! A control adapter implements [`WidgetBinding`]. The [`MaskBuilder`](crate::mask::MaskBuilder)
//! wraps each adapter in a [`Binding`] and registers it with the
//! [`ValueStore`](crate::data::store::ValueStore), after which:
//!
//! - every committed write to the store is pushed into the control with
//!   [`WidgetBinding::display_value`];
//! - a user edit is committed with [`Binding::commit_edit`], which reads the control with
//!   [`WidgetBinding::read_value`] and writes through [`ValueStore::set`]. A rejected edit
//!   puts the last accepted value back on display, so a control never shows a value the store
//!   did not accept.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use serde_json::{Map, Value};

use crate::data::{
    spec::{ControlKind, ParameterSpec},
    store::{StoreError, ValueStore},
    value::ParamValue,
};

/// Capability an interactive control must provide to take part in synchronization.
pub trait WidgetBinding {
    /// Show a value coming from the store.
    ///
    /// Must not write back to the store.
    fn display_value(&mut self, value: &ParamValue);

    /// Current visible state of the control, as a candidate for the store.
    fn read_value(&self) -> Value;

    /// Allow or forbid user edits.
    fn set_editable(&mut self, editable: bool);

    /// Apply adapter-specific rendering attributes.
    fn set_attributes(&mut self, attributes: &Map<String, Value>);
}

/// Shared handle to a control adapter.
pub type SharedWidget = Rc<RefCell<dyn WidgetBinding>>;

/// Non-owning handle kept by the store.
pub type WeakWidget = Weak<RefCell<dyn WidgetBinding>>;

/// Wrap a control adapter into a shared handle.
pub fn shared<W: WidgetBinding + 'static>(widget: W) -> SharedWidget {
    Rc::new(RefCell::new(widget))
}

/// Pairing of one parameter with one live control.
///
/// The binding owns no value; it only routes edits into the store and store writes into the
/// control.
pub struct Binding {
    name: String,
    group: String,
    control: ControlKind,
    widget: SharedWidget,
}

impl Binding {
    pub(crate) fn new(group: &str, spec: &ParameterSpec, widget: SharedWidget) -> Self {
        Self {
            name: spec.name.clone(),
            group: group.to_string(),
            control: spec.preferred_control,
            widget,
        }
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group the parameter belongs to.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Control kind the widget was created for.
    pub fn control(&self) -> ControlKind {
        self.control
    }

    /// The bound control.
    pub fn widget(&self) -> &SharedWidget {
        &self.widget
    }

    /// Show the store's current value in the control.
    pub fn refresh(&self, store: &ValueStore) -> Result<(), StoreError> {
        let value = store.get(&self.name)?;
        self.widget.borrow_mut().display_value(value);
        Ok(())
    }

    /// Commit the control's current content to the store.
    ///
    /// # Errors
    ///
    /// Returns the store's error when the content is rejected; the control then shows the
    /// last accepted value again.
    pub fn commit_edit(&self, store: &mut ValueStore) -> Result<(), StoreError> {
        let raw = self.widget.borrow().read_value();
        if let Err(err) = store.set(&self.name, raw.clone()) {
            warn!("rejected edit of `{}` ({raw}): {err}", self.name);
            self.refresh(store)?;
            return Err(err);
        }
        Ok(())
    }

    pub(crate) fn detach(&self, store: &mut ValueStore) {
        store.unbind(&self.name, &self.widget);
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("control", &self.control)
            .finish()
    }
}
