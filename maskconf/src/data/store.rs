use std::{
    collections::HashMap,
    fmt,
    ops::Index,
    rc::{Rc, Weak},
    sync::Arc,
};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    binding::{SharedWidget, WeakWidget},
    data::{
        schema::ConfigSchema,
        spec::{ParameterSpec, ValueError},
        value::ParamValue,
    },
};

/// Failure of a read or write on a [`ValueStore`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// The name is not a parameter of the schema.
    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),
    /// The value lies outside the declared range or enumeration.
    #[error("invalid value for `{name}`: {reason}")]
    Validation { name: String, reason: String },
    /// The value cannot be interpreted as the declared type.
    #[error("`{name}`: expected {expected}, got {actual}")]
    TypeCoercion {
        name: String,
        expected: String,
        actual: String,
    },
}

impl StoreError {
    fn from_value(name: &str, err: ValueError) -> Self {
        match err {
            ValueError::Validation(reason) => StoreError::Validation {
                name: name.to_string(),
                reason,
            },
            ValueError::TypeCoercion { expected, actual } => StoreError::TypeCoercion {
                name: name.to_string(),
                expected,
                actual,
            },
        }
    }

    /// Name of the parameter the error refers to.
    pub fn name(&self) -> &str {
        match self {
            StoreError::UnknownParameter(name)
            | StoreError::Validation { name, .. }
            | StoreError::TypeCoercion { name, .. } => name,
        }
    }
}

/// Callback run after a value has been committed.
pub type ChangeListener = Box<dyn FnMut(&str, &ParamValue)>;

/// Validated mapping of parameter name to current value.
///
/// The store holds exactly one value per schema parameter, and every value passed
/// [`ParameterSpec::coerce`]. It is the single source of truth: controls only change it through
/// [`ValueStore::set`], and every committed write is pushed to the controls bound to that name.
///
/// The store is single-threaded. Hosts that write from other threads must marshal the call to
/// the thread owning the store.
pub struct ValueStore {
    schema: Arc<ConfigSchema>,
    values: HashMap<String, ParamValue>,
    widgets: HashMap<String, Vec<WeakWidget>>,
    listeners: Vec<ChangeListener>,
}

impl fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStore")
            .field("values", &self.values)
            .field("bound", &self.widgets.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ValueStore {
    /// Create a store holding the schema defaults.
    pub fn new(schema: impl Into<Arc<ConfigSchema>>) -> Self {
        let schema = schema.into();
        let values = defaults(&schema);
        Self {
            schema,
            values,
            widgets: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Replace the schema wholesale, resetting every value to the new defaults.
    ///
    /// Existing bindings are dropped; build a new mask afterwards. Listeners are kept.
    pub fn replace_schema(&mut self, schema: impl Into<Arc<ConfigSchema>>) {
        self.schema = schema.into();
        self.values = defaults(&self.schema);
        self.widgets.clear();
        info!("schema replaced, {} parameters reset", self.values.len());
    }

    /// Schema this store was built from.
    pub fn schema(&self) -> &Arc<ConfigSchema> {
        &self.schema
    }

    /// Description of a parameter.
    pub fn spec(&self, name: &str) -> Result<&ParameterSpec, StoreError> {
        self.schema
            .spec(name)
            .ok_or_else(|| StoreError::UnknownParameter(name.to_string()))
    }

    /// Current value of a parameter.
    pub fn get(&self, name: &str) -> Result<&ParamValue, StoreError> {
        self.values
            .get(name)
            .ok_or_else(|| StoreError::UnknownParameter(name.to_string()))
    }

    /// Validate a candidate without storing it.
    pub fn validate(&self, name: &str, value: &Value) -> Result<ParamValue, StoreError> {
        self.spec(name)?
            .coerce(value)
            .map_err(|e| StoreError::from_value(name, e))
    }

    /// Validate, coerce and commit a value, then refresh bound controls.
    ///
    /// On error nothing is stored and no control is touched.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), StoreError> {
        let value = self.validate(name, &value.into())?;
        self.commit(name, value);
        self.propagate(name);
        Ok(())
    }

    /// Current values of several parameters, in the order asked.
    pub fn get_values(&self, names: &[&str]) -> Result<Vec<ParamValue>, StoreError> {
        names
            .iter()
            .map(|name| self.get(name).cloned())
            .collect()
    }

    /// Set several values at once.
    ///
    /// Every value is validated before any is committed; the first failure is returned and the
    /// store is left unchanged.
    pub fn set_values<I, K, V>(&mut self, pairs: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let staged = pairs
            .into_iter()
            .map(|(name, value)| {
                let name = name.as_ref();
                self.validate(name, &value.into())
                    .map(|v| (name.to_string(), v))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (name, value) in &staged {
            self.commit(name, value.clone());
        }
        for (name, _) in &staged {
            self.propagate(name);
        }
        Ok(())
    }

    /// Restore one parameter, or all of them, to the schema default.
    pub fn reset(&mut self, name: Option<&str>) -> Result<(), StoreError> {
        let names: Vec<String> = match name {
            Some(name) => vec![self.spec(name)?.name.clone()],
            None => self.schema.params().map(|p| p.name.clone()).collect(),
        };
        for name in &names {
            let default = self.spec(name)?.initial_value.clone();
            self.commit(name, default);
        }
        for name in &names {
            self.propagate(name);
        }
        Ok(())
    }

    /// Current values in schema order.
    pub fn values(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.schema
            .params()
            .filter_map(|p| self.values.get_key_value(&p.name))
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Flat JSON object of all values in schema order.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .values()
            .map(|(k, v)| (k.to_string(), v.as_json()))
            .collect();
        Value::Object(map)
    }

    /// Copy of the values without bindings or listeners, for editing in a dialog.
    pub fn detached(&self) -> ValueStore {
        Self {
            schema: self.schema.clone(),
            values: self.values.clone(),
            widgets: HashMap::new(),
            listeners: Vec::new(),
        }
    }

    /// Atomically take over every value of `other`.
    pub fn apply(&mut self, other: &ValueStore) -> Result<(), StoreError> {
        self.set_values(other.values().map(|(name, value)| (name, value.as_json())))
    }

    /// Register a callback run after every committed write.
    pub fn on_change(&mut self, listener: impl FnMut(&str, &ParamValue) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Register a control to be refreshed whenever `name` is written.
    ///
    /// The store keeps a weak reference; dropping the control unregisters it.
    pub fn bind(&mut self, name: &str, widget: &SharedWidget) -> Result<(), StoreError> {
        self.spec(name)?;
        self.widgets
            .entry(name.to_string())
            .or_default()
            .push(Rc::downgrade(widget));
        Ok(())
    }

    /// Remove a control registration.
    pub fn unbind(&mut self, name: &str, widget: &SharedWidget) {
        let target = Rc::downgrade(widget);
        if let Some(list) = self.widgets.get_mut(name) {
            list.retain(|w| !Weak::ptr_eq(w, &target) && w.strong_count() > 0);
        }
    }

    /// Number of live controls bound to `name`.
    pub fn bound_count(&self, name: &str) -> usize {
        self.widgets
            .get(name)
            .map(|list| list.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }

    fn commit(&mut self, name: &str, value: ParamValue) {
        debug!("set `{name}` = {value}");
        self.values.insert(name.to_string(), value);
    }

    fn propagate(&mut self, name: &str) {
        let Some(value) = self.values.get(name) else {
            return;
        };
        if let Some(list) = self.widgets.get_mut(name) {
            list.retain(|w| w.strong_count() > 0);
            for widget in list.iter().filter_map(Weak::upgrade) {
                match widget.try_borrow_mut() {
                    Ok(mut w) => w.display_value(value),
                    Err(_) => warn!("control for `{name}` is busy, display not refreshed"),
                }
            }
        }
        for listener in &mut self.listeners {
            listener(name, value);
        }
    }
}

fn defaults(schema: &ConfigSchema) -> HashMap<String, ParamValue> {
    schema
        .params()
        .map(|p| (p.name.clone(), p.initial_value.clone()))
        .collect()
}

/// Read access by name.
///
/// # Panics
///
/// Panics when `name` is not a parameter, like indexing a `HashMap`. Use
/// [`ValueStore::get`] for a fallible read and [`ValueStore::set`] to write.
impl Index<&str> for ValueStore {
    type Output = ParamValue;

    fn index(&self, name: &str) -> &ParamValue {
        match self.values.get(name) {
            Some(value) => value,
            None => panic!("unknown parameter `{name}`"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::data::value::Complex;
    use serde_json::json;

    fn store() -> ValueStore {
        let schema = ConfigSchema::from_value(&json!({
            "Main": {
                "count": {"inputType": "int", "valueRange": [0, 10], "initialValue": 3},
                "ratio": {"inputType": "float", "valueRange": [0.0, 1.0], "initialValue": 0.5},
                "mode": {"inputType": "string", "valueRange": ["fast", "slow"], "initialValue": "fast"}
            },
            "Extra": {
                "flags": {"inputType": "bitfield", "valueRange": {"A": 1, "B": 2, "C": 4},
                          "initialValue": 0},
                "seed": {"inputType": "complex", "initialValue": [0, 0]},
                "name": {"inputType": "string", "initialValue": ""}
            }
        }))
        .unwrap();
        ValueStore::new(schema)
    }

    #[test]
    fn test_defaults() {
        let s = store();
        assert_eq!(s.get("count"), Ok(&ParamValue::Integer(3)));
        assert_eq!(s["mode"], ParamValue::Text("fast".into()));
        assert_eq!(s.values().count(), 6);
    }

    #[test]
    fn test_set_and_reject() {
        let mut s = store();
        s.set("count", 5).unwrap();
        assert_eq!(s["count"], ParamValue::Integer(5));

        let err = s.set("count", 11).unwrap_err();
        assert!(matches!(err, StoreError::Validation { ref name, .. } if name == "count"));
        assert_eq!(s["count"], ParamValue::Integer(5));

        let err = s.set("count", "eleven").unwrap_err();
        assert!(matches!(err, StoreError::TypeCoercion { .. }));
        assert_eq!(s["count"], ParamValue::Integer(5));

        assert_eq!(
            s.set("missing", 1),
            Err(StoreError::UnknownParameter("missing".into()))
        );
        assert!(s.get("missing").is_err());
    }

    #[test]
    fn test_bitfield_names() {
        let mut s = store();
        s.set("flags", vec!["A", "C"]).unwrap();
        assert_eq!(s["flags"], ParamValue::Flags(5));
        assert!(s.set("flags", vec!["A", "D"]).is_err());
        assert_eq!(s["flags"], ParamValue::Flags(5));
    }

    #[test]
    fn test_set_values_is_atomic() {
        let mut s = store();
        let err = s
            .set_values([("count", json!(7)), ("ratio", json!(2.0))])
            .unwrap_err();
        assert_eq!(err.name(), "ratio");
        assert_eq!(s["count"], ParamValue::Integer(3));
        assert_eq!(s["ratio"], ParamValue::Float(0.5));

        s.set_values([("count", json!(7)), ("ratio", json!("0.25"))])
            .unwrap();
        assert_eq!(
            s.get_values(&["ratio", "count"]).unwrap(),
            [ParamValue::Float(0.25), ParamValue::Integer(7)]
        );
    }

    #[test]
    fn test_reset() {
        let mut s = store();
        s.set("count", 9).unwrap();
        s.set("mode", "slow").unwrap();
        s.reset(Some("count")).unwrap();
        assert_eq!(s["count"], ParamValue::Integer(3));
        assert_eq!(s["mode"], ParamValue::Text("slow".into()));
        s.reset(None).unwrap();
        assert_eq!(s["mode"], ParamValue::Text("fast".into()));
        assert!(s.reset(Some("nope")).is_err());
    }

    #[test]
    fn test_detached_and_apply() {
        let mut s = store();
        let mut draft = s.detached();
        draft.set("seed", "1+2j").unwrap();
        draft.set("name", "probe").unwrap();
        assert_eq!(s["name"], ParamValue::Text(String::new()));

        s.apply(&draft).unwrap();
        assert_eq!(s["seed"], ParamValue::Complex(Complex::new(1.0, 2.0)));
        assert_eq!(s["name"], ParamValue::Text("probe".into()));
    }

    #[test]
    fn test_listeners_see_committed_values() {
        let mut s = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        s.on_change(move |name, value| sink.borrow_mut().push((name.to_string(), value.clone())));

        s.set("count", 4).unwrap();
        let _ = s.set("count", 40);
        assert_eq!(
            seen.borrow().as_slice(),
            [("count".to_string(), ParamValue::Integer(4))]
        );
    }

    #[test]
    fn test_to_json_in_schema_order() {
        let s = store();
        let keys: Vec<_> = s.to_json().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["count", "ratio", "mode", "flags", "seed", "name"]);
    }

    #[test]
    fn test_replace_schema() {
        let mut s = store();
        s.set("count", 1).unwrap();
        let other = ConfigSchema::from_value(&json!({
            "": { "count": {"inputType": "int", "initialValue": 42} }
        }))
        .unwrap();
        s.replace_schema(other);
        assert_eq!(s["count"], ParamValue::Integer(42));
        assert!(s.get("ratio").is_err());
    }

    #[test]
    #[should_panic(expected = "unknown parameter")]
    fn test_index_unknown_panics() {
        let s = store();
        let _ = &s["nope"];
    }
}
