//! Building a set of bound controls for a schema.

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    binding::{Binding, SharedWidget},
    data::{
        spec::{ControlKind, ParameterSpec},
        store::{StoreError, ValueStore},
    },
};

/// Failure to build a mask.
///
/// A failed build leaves the store and previously built masks untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MaskError {
    #[error("no adapter for control `{control}` requested by `{name}`")]
    UnsupportedControl { name: String, control: ControlKind },
    #[error("unknown group `{0}`")]
    UnknownGroup(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Constructor of a control adapter for one parameter.
pub type WidgetCtor = Box<dyn Fn(&ParameterSpec) -> SharedWidget>;

/// Platform adapter lookup: control kind → constructor.
#[derive(Default)]
pub struct WidgetFactory {
    ctors: HashMap<ControlKind, WidgetCtor>,
}

impl WidgetFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for a control kind.
    pub fn register(
        &mut self,
        kind: ControlKind,
        ctor: impl Fn(&ParameterSpec) -> SharedWidget + 'static,
    ) -> &mut Self {
        self.ctors.insert(kind, Box::new(ctor));
        self
    }

    /// Builder-style [`WidgetFactory::register`].
    pub fn with(
        mut self,
        kind: ControlKind,
        ctor: impl Fn(&ParameterSpec) -> SharedWidget + 'static,
    ) -> Self {
        self.register(kind, ctor);
        self
    }

    pub fn supports(&self, kind: ControlKind) -> bool {
        self.ctors.contains_key(&kind)
    }

    /// Instantiate the control suggested by `spec`.
    pub fn create(&self, spec: &ParameterSpec) -> Result<SharedWidget, MaskError> {
        let ctor = self
            .ctors
            .get(&spec.preferred_control)
            .ok_or_else(|| MaskError::UnsupportedControl {
                name: spec.name.clone(),
                control: spec.preferred_control,
            })?;
        Ok(ctor(spec))
    }
}

/// Creates masks: one bound control per parameter, in declaration order.
pub struct MaskBuilder {
    factory: WidgetFactory,
}

impl MaskBuilder {
    pub fn new(factory: WidgetFactory) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &WidgetFactory {
        &self.factory
    }

    /// Build bound controls for the store's schema.
    ///
    /// Groups are visited in declaration order, restricted to `groups` when given. Each
    /// control gets the parameter's attributes, its editable flag and the store's current
    /// value. Arranging the controls on screen is up to the caller.
    ///
    /// # Errors
    ///
    /// [`MaskError::UnknownGroup`] for a filter naming a missing group, and
    /// [`MaskError::UnsupportedControl`] when the factory lacks a requested control. Both are
    /// detected before any control is created.
    pub fn create_mask(
        &self,
        store: &mut ValueStore,
        groups: Option<&[&str]>,
    ) -> Result<Mask, MaskError> {
        let schema = store.schema().clone();
        if let Some(filter) = groups
            && let Some(missing) = filter.iter().find(|g| schema.group(g).is_none())
        {
            return Err(MaskError::UnknownGroup(missing.to_string()));
        }

        let selected: Vec<_> = schema
            .groups()
            .iter()
            .filter(|g| groups.is_none_or(|filter| filter.contains(&g.name())))
            .collect();

        if let Some(spec) = selected
            .iter()
            .flat_map(|g| g.iter())
            .find(|spec| !self.factory.supports(spec.preferred_control))
        {
            return Err(MaskError::UnsupportedControl {
                name: spec.name.clone(),
                control: spec.preferred_control,
            });
        }

        let mut bindings = Vec::with_capacity(selected.iter().map(|g| g.len()).sum());
        for group in selected {
            for spec in group.iter() {
                let widget = self.factory.create(spec)?;
                {
                    let mut w = widget.borrow_mut();
                    w.set_attributes(&spec.control_attributes);
                    w.set_editable(!spec.read_only);
                }
                store.bind(&spec.name, &widget)?;
                let binding = Binding::new(group.name(), spec, widget);
                binding.refresh(store)?;
                debug!(
                    "bound `{}` in `{}` to a {} control",
                    spec.name,
                    group.name(),
                    spec.preferred_control
                );
                bindings.push(binding);
            }
        }

        info!("mask built with {} controls", bindings.len());
        Ok(Mask { bindings })
    }
}

/// Ordered set of live bindings.
///
/// Dropping the mask drops its controls, which also ends their registration with the store.
#[derive(Debug)]
pub struct Mask {
    bindings: Vec<Binding>,
}

impl Mask {
    /// Bindings in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Binding of a parameter.
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name() == name)
    }

    /// Names of the groups present, in order.
    pub fn groups(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for b in &self.bindings {
            if out.last() != Some(&b.group()) {
                out.push(b.group());
            }
        }
        out
    }

    /// Bindings of one group.
    pub fn in_group<'a>(&'a self, group: &'a str) -> impl Iterator<Item = &'a Binding> {
        self.bindings.iter().filter(move |b| b.group() == group)
    }

    /// Commit the user's edit of one control.
    pub fn commit_edit(&self, name: &str, store: &mut ValueStore) -> Result<(), StoreError> {
        self.get(name)
            .ok_or_else(|| StoreError::UnknownParameter(name.to_string()))?
            .commit_edit(store)
    }

    /// Commit every control, reverting the rejected ones. Returns the first error.
    pub fn commit_all(&self, store: &mut ValueStore) -> Result<(), StoreError> {
        let mut first = None;
        for binding in &self.bindings {
            if let Err(err) = binding.commit_edit(store) {
                first.get_or_insert(err);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Show the store's current values in every control.
    pub fn refresh(&self, store: &ValueStore) -> Result<(), StoreError> {
        self.bindings.iter().try_for_each(|b| b.refresh(store))
    }

    /// Unregister every control from the store and tear the mask down.
    pub fn detach(self, store: &mut ValueStore) {
        for binding in &self.bindings {
            binding.detach(store);
        }
    }
}
