use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::data::{
    definition::Definition,
    spec::{ControlKind, InputType, ParameterSpec, ValueError, ValueRange},
};

/// Structural error in a parameter definition.
///
/// Raised only while parsing; a schema is never partially built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("`{path}`: expected {expected}")]
    Malformed { path: String, expected: String },
    #[error("`{path}`: unknown input type `{found}`")]
    UnknownInputType { path: String, found: String },
    #[error("`{path}`: unknown control `{found}`")]
    UnknownControl { path: String, found: String },
    #[error("`{path}`: missing required attribute `{attribute}`")]
    MissingAttribute { path: String, attribute: String },
    #[error("`{path}`: unknown attribute `{attribute}`")]
    UnknownAttribute { path: String, attribute: String },
    #[error("`{path}`: invalid value range: {reason}")]
    InvalidRange { path: String, reason: String },
    #[error("`{path}`: control `{control}` cannot edit this parameter: {reason}")]
    IncompatibleControl {
        path: String,
        control: ControlKind,
        reason: String,
    },
    #[error("`{path}`: invalid initial value: {source}")]
    InvalidInitialValue { path: String, source: ValueError },
    #[error("parameter `{name}` is defined in group `{first}` and again in group `{second}`")]
    DuplicateParameter {
        name: String,
        first: String,
        second: String,
    },
    #[error("group `{0}` is defined twice")]
    DuplicateGroup(String),
    #[error("cannot decode definition: {0}")]
    Decode(String),
}

/// Parser settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ParseOptions {
    /// Width hint for parameters that do not declare one.
    pub default_width: u16,
    /// Extra attribute names accepted and passed through into `controlAttributes`.
    pub extra_keys: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            default_width: 20,
            extra_keys: Vec::new(),
        }
    }
}

impl ParseOptions {
    /// Accept an additional pass-through attribute.
    pub fn with_extra_key(mut self, key: impl Into<String>) -> Self {
        self.extra_keys.push(key.into());
        self
    }

    /// Width hint for parameters that do not declare one.
    pub fn with_default_width(mut self, width: u16) -> Self {
        self.default_width = width;
        self
    }
}

/// Ordered set of parameters forming one section of a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGroup {
    name: String,
    params: Vec<ParameterSpec>,
}

impl ParameterGroup {
    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter by name.
    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Immutable, validated parameter schema.
///
/// Parameter names are unique across all groups: groups organise the display, they are not
/// namespaces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigSchema {
    groups: Vec<ParameterGroup>,
    index: HashMap<String, (usize, usize)>,
}

impl ConfigSchema {
    /// Parse a raw definition.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] for unknown input types or controls, ranges that do not fit the
    /// input type or control, initial values outside their range, and repeated group or
    /// parameter names.
    pub fn parse(definition: &Definition, options: &ParseOptions) -> Result<Self, SchemaError> {
        let mut groups: Vec<ParameterGroup> = Vec::with_capacity(definition.groups.len());
        let mut index: HashMap<String, (usize, usize)> = HashMap::new();

        for group_def in &definition.groups {
            if groups.iter().any(|g| g.name == group_def.name) {
                return Err(SchemaError::DuplicateGroup(group_def.name.clone()));
            }
            let gi = groups.len();
            let mut params = Vec::with_capacity(group_def.params.len());

            for (name, attributes) in &group_def.params {
                if let Some(&(prev, _)) = index.get(name) {
                    let first = if prev == gi {
                        &group_def.name
                    } else {
                        &groups[prev].name
                    };
                    return Err(SchemaError::DuplicateParameter {
                        name: name.clone(),
                        first: first.clone(),
                        second: group_def.name.clone(),
                    });
                }
                let path = format!("{}.{}", group_def.name, name);
                let spec = parse_param(name, &path, attributes, options)?;
                trace!("parsed `{path}` as {} {}", spec.input_type, spec.value_range);
                index.insert(name.clone(), (gi, params.len()));
                params.push(spec);
            }

            groups.push(ParameterGroup {
                name: group_def.name.clone(),
                params,
            });
        }

        debug!(
            "schema parsed: {} groups, {} parameters",
            groups.len(),
            index.len()
        );
        Ok(Self { groups, index })
    }

    /// Parse a nested JSON value with default options.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        Self::parse(&Definition::try_from(value)?, &ParseOptions::default())
    }

    /// Parse JSON text with default options. Repeated keys are reported.
    pub fn from_json_str(s: &str) -> Result<Self, SchemaError> {
        Self::parse(&Definition::from_json_str(s)?, &ParseOptions::default())
    }

    /// Groups in declaration order.
    pub fn groups(&self) -> &[ParameterGroup] {
        &self.groups
    }

    /// Group by name.
    pub fn group(&self, name: &str) -> Option<&ParameterGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Parameter by name, in any group.
    pub fn spec(&self, name: &str) -> Option<&ParameterSpec> {
        self.index
            .get(name)
            .map(|&(g, p)| &self.groups[g].params[p])
    }

    /// Name of the group owning a parameter.
    pub fn group_of(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&(g, _)| self.groups[g].name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All parameters, group by group, in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.groups.iter().flat_map(|g| g.params.iter())
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl TryFrom<&Value> for ConfigSchema {
    type Error = SchemaError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

const KNOWN_KEYS: &[&str] = &[
    "inputType",
    "valueRange",
    "initialValue",
    "preferredControl",
    "label",
    "width",
    "readOnly",
    "controlAttributes",
];

/// Attribute names of the older definition format.
fn canonical_key(key: &str) -> &str {
    match key {
        "valRange" => "valueRange",
        "initValue" => "initialValue",
        "widget" => "preferredControl",
        "readonly" => "readOnly",
        other => other,
    }
}

fn parse_param(
    name: &str,
    path: &str,
    attributes: &Value,
    options: &ParseOptions,
) -> Result<ParameterSpec, SchemaError> {
    let raw = attributes.as_object().ok_or_else(|| SchemaError::Malformed {
        path: path.to_string(),
        expected: "an attribute mapping".to_string(),
    })?;

    let mut attrs: Map<String, Value> = Map::new();
    let mut control_attributes = Map::new();
    for (key, value) in raw {
        let key = canonical_key(key);
        if KNOWN_KEYS.contains(&key) {
            if attrs.insert(key.to_string(), value.clone()).is_some() {
                return Err(SchemaError::Malformed {
                    path: path.to_string(),
                    expected: format!("`{key}` to be given once"),
                });
            }
        } else if options.extra_keys.iter().any(|k| k == key) {
            control_attributes.insert(key.to_string(), value.clone());
        } else {
            return Err(SchemaError::UnknownAttribute {
                path: path.to_string(),
                attribute: key.to_string(),
            });
        }
    }

    let required = |attribute: &str| {
        attrs
            .get(attribute)
            .ok_or_else(|| SchemaError::MissingAttribute {
                path: path.to_string(),
                attribute: attribute.to_string(),
            })
    };
    let malformed = |expected: &str| SchemaError::Malformed {
        path: path.to_string(),
        expected: expected.to_string(),
    };

    let type_name = required("inputType")?
        .as_str()
        .ok_or_else(|| malformed("`inputType` to be a string"))?;
    let input_type: InputType =
        type_name
            .parse()
            .map_err(|found| SchemaError::UnknownInputType {
                path: path.to_string(),
                found,
            })?;
    let initial = required("initialValue")?;

    let value_range = parse_range(input_type, attrs.get("valueRange"))
        .map_err(|reason| SchemaError::InvalidRange {
            path: path.to_string(),
            reason,
        })?;

    let preferred_control = match attrs.get("preferredControl") {
        None => default_control(input_type, &value_range),
        Some(Value::String(tag)) => {
            tag.parse()
                .map_err(|found| SchemaError::UnknownControl {
                    path: path.to_string(),
                    found,
                })?
        }
        Some(_) => return Err(malformed("`preferredControl` to be a string")),
    };
    check_control(input_type, &value_range, preferred_control).map_err(|reason| {
        SchemaError::IncompatibleControl {
            path: path.to_string(),
            control: preferred_control,
            reason,
        }
    })?;

    let initial_value = crate::data::spec::coerce(input_type, &value_range, initial).map_err(
        |source| SchemaError::InvalidInitialValue {
            path: path.to_string(),
            source,
        },
    )?;

    let label = match attrs.get("label") {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(malformed("`label` to be a string")),
    };
    let width = match attrs.get("width") {
        None => options.default_width,
        Some(v) => v
            .as_u64()
            .and_then(|w| u16::try_from(w).ok())
            .ok_or_else(|| malformed("`width` to be a small non-negative integer"))?,
    };
    let read_only = match attrs.get("readOnly") {
        None => false,
        Some(v) => v
            .as_bool()
            .ok_or_else(|| malformed("`readOnly` to be a boolean"))?,
    };
    match attrs.get("controlAttributes") {
        None => {}
        Some(Value::Object(extra)) => {
            for (k, v) in extra {
                control_attributes.insert(k.clone(), v.clone());
            }
        }
        Some(_) => return Err(malformed("`controlAttributes` to be a mapping")),
    }

    Ok(ParameterSpec {
        name: name.to_string(),
        input_type,
        value_range,
        initial_value,
        preferred_control,
        label,
        width,
        read_only,
        control_attributes,
    })
}

fn default_control(input_type: InputType, range: &ValueRange) -> ControlKind {
    match (input_type, range) {
        (InputType::Bitfield, _) => ControlKind::FlagSet,
        (_, ValueRange::Choices(_)) => ControlKind::ListBox,
        _ => ControlKind::Entry,
    }
}

/// Upper bound on the number of slider stops.
pub const MAX_SLIDER_POSITIONS: f64 = 10_000.0;

fn slider_positions(range: &ValueRange) -> f64 {
    match (range.bounds(), range.step()) {
        (Some((min, max)), Some(step)) => ((max - min) / step).floor() + 1.0,
        _ => 0.0,
    }
}

fn check_control(
    input_type: InputType,
    range: &ValueRange,
    control: ControlKind,
) -> Result<(), String> {
    let numeric = matches!(input_type, InputType::Integer | InputType::Float);
    match control {
        ControlKind::Entry => Ok(()),
        ControlKind::Slider if !numeric => Err(format!("{input_type} is not numeric")),
        ControlKind::Slider if range.step().is_none() => {
            Err("a slider needs a [min, max, step] range".to_string())
        }
        ControlKind::Slider if slider_positions(range) > MAX_SLIDER_POSITIONS => Err(format!(
            "a slider holds at most {MAX_SLIDER_POSITIONS} steps, use a spinner"
        )),
        ControlKind::Spinner
            if range.bounds().is_none() && range.choices().is_none() =>
        {
            Err("a spinner needs a [min, max] range or a list of values".to_string())
        }
        ControlKind::ListBox | ControlKind::RadioGroup if range.choices().is_none() => {
            Err("a list of values is required".to_string())
        }
        ControlKind::FlagSet if input_type != InputType::Bitfield => {
            Err("only bitfields can be edited as a flag set".to_string())
        }
        _ => Ok(()),
    }
}

fn parse_range(input_type: InputType, raw: Option<&Value>) -> Result<ValueRange, String> {
    let raw = match raw {
        None | Some(Value::Null) if input_type == InputType::Bitfield => {
            return Err("a bitfield needs declared flags".to_string());
        }
        None | Some(Value::Null) => return Ok(ValueRange::Unbounded),
        Some(raw) => raw,
    };

    match input_type {
        InputType::Integer => {
            if let Some(choices) = string_list(raw)? {
                return Ok(ValueRange::Choices(choices));
            }
            let bounds = number_list(raw, |v| v.as_i64())
                .ok_or("expected [min, max], [min, max, step] or a list of labels")?;
            let (min, max, step) = bounds_triple(&bounds)?;
            if step.is_some_and(|s| s <= 0) {
                return Err("step must be positive".to_string());
            }
            Ok(ValueRange::Integer { min, max, step })
        }
        InputType::Float => {
            let bounds = number_list(raw, |v| v.as_f64().filter(|f| f.is_finite()))
                .ok_or("expected [min, max] or [min, max, step]")?;
            let (min, max, step) = bounds_triple(&bounds)?;
            if step.is_some_and(|s| s <= 0.0) {
                return Err("step must be positive".to_string());
            }
            Ok(ValueRange::Float { min, max, step })
        }
        InputType::Complex => {
            let finite = |v: &Value| v.as_f64().filter(|f| f.is_finite());
            if let Some(both) = number_list(raw, finite) {
                let (min, max, step) = bounds_triple(&both)?;
                if step.is_some() {
                    return Err("complex ranges take no step".to_string());
                }
                return Ok(ValueRange::Complex {
                    re: (min, max),
                    im: (min, max),
                });
            }
            let parts = raw
                .as_array()
                .filter(|p| p.len() == 2)
                .ok_or("expected [min, max] or [[reMin, reMax], [imMin, imMax]]")?;
            let mut pairs = Vec::with_capacity(2);
            for part in parts {
                let pair = number_list(part, finite).ok_or("expected a [min, max] pair")?;
                let (min, max, step) = bounds_triple(&pair)?;
                if step.is_some() {
                    return Err("complex ranges take no step".to_string());
                }
                pairs.push((min, max));
            }
            Ok(ValueRange::Complex {
                re: pairs[0],
                im: pairs[1],
            })
        }
        InputType::String => string_list(raw)?
            .map(ValueRange::Choices)
            .ok_or_else(|| "expected a list of strings".to_string()),
        InputType::Bitfield => parse_flags(raw),
    }
}

fn string_list(raw: &Value) -> Result<Option<Vec<String>>, String> {
    let Some(items) = raw.as_array() else {
        return Ok(None);
    };
    if !items.iter().all(Value::is_string) {
        return Ok(None);
    }
    if items.is_empty() {
        return Err("the list of values is empty".to_string());
    }
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items.iter().filter_map(Value::as_str) {
        if out.iter().any(|o| o == item) {
            return Err(format!("value {item:?} is listed twice"));
        }
        out.push(item.to_string());
    }
    Ok(Some(out))
}

fn number_list<T>(raw: &Value, f: impl Fn(&Value) -> Option<T>) -> Option<Vec<T>> {
    let items = raw.as_array()?;
    items.iter().map(f).collect()
}

fn bounds_triple<T: PartialOrd + Copy + std::fmt::Display>(
    bounds: &[T],
) -> Result<(T, T, Option<T>), String> {
    let (min, max, step) = match bounds {
        [min, max] => (*min, *max, None),
        [min, max, step] => (*min, *max, Some(*step)),
        _ => return Err(format!("expected 2 or 3 bounds, got {}", bounds.len())),
    };
    if min > max {
        return Err(format!("min {min} is greater than max {max}"));
    }
    Ok((min, max, step))
}

fn parse_flags(raw: &Value) -> Result<ValueRange, String> {
    let flags = match raw {
        Value::Object(map) => {
            let mut flags = Vec::with_capacity(map.len());
            for (name, mask) in map {
                let mask = mask
                    .as_u64()
                    .filter(|m| *m != 0)
                    .ok_or_else(|| format!("flag {name:?} needs a non-zero integer mask"))?;
                flags.push((name.clone(), mask));
            }
            flags
        }
        Value::Array(_) => {
            let names = string_list(raw)?.ok_or("expected a list of flag names")?;
            if names.len() > 64 {
                return Err("at most 64 flags fit a bitfield".to_string());
            }
            names
                .into_iter()
                .enumerate()
                .map(|(bit, name)| (name, 1u64 << bit))
                .collect()
        }
        _ => return Err("expected a mapping of flag names to masks".to_string()),
    };
    if flags.is_empty() {
        return Err("no flags declared".to_string());
    }
    Ok(ValueRange::Flags(flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::value::{Complex, ParamValue};
    use serde_json::json;

    fn fractal() -> Value {
        json!({
            "Calculation settings": {
                "maxIter": {
                    "inputType": "int", "valRange": [100, 4000, 10], "initValue": 250,
                    "widget": "spinner", "label": "Max. iterations", "width": 10
                },
                "bailout": {
                    "inputType": "float", "valueRange": [4.0, 10000.0], "initialValue": 4.0,
                    "label": "Bailout radius"
                }
            },
            "Modes": {
                "drawMode": {
                    "inputType": "integer",
                    "valueRange": ["Line-by-Line", "SQEM recursive", "SQEM iterative"],
                    "initialValue": "Line-by-Line"
                },
                "flags": {
                    "inputType": "bitfield", "valueRange": {"A": 1, "B": 2, "C": 4},
                    "initialValue": ["A", "C"]
                },
                "seed": { "inputType": "complex", "initialValue": "0.25-0.5j" }
            }
        })
    }

    #[test]
    fn test_parse_keeps_order_and_defaults() {
        let schema = ConfigSchema::from_value(&fractal()).unwrap();
        let names: Vec<_> = schema.params().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["maxIter", "bailout", "drawMode", "flags", "seed"]);
        assert_eq!(schema.group_of("flags"), Some("Modes"));

        let max_iter = schema.spec("maxIter").unwrap();
        assert_eq!(max_iter.preferred_control, ControlKind::Spinner);
        assert_eq!(max_iter.width, 10);
        assert_eq!(max_iter.initial_value, ParamValue::Integer(250));

        let bailout = schema.spec("bailout").unwrap();
        assert_eq!(bailout.preferred_control, ControlKind::Entry);
        assert_eq!(bailout.width, 20);

        let draw = schema.spec("drawMode").unwrap();
        assert_eq!(draw.preferred_control, ControlKind::ListBox);
        assert_eq!(draw.initial_value, ParamValue::Integer(0));

        let flags = schema.spec("flags").unwrap();
        assert_eq!(flags.preferred_control, ControlKind::FlagSet);
        assert_eq!(flags.initial_value, ParamValue::Flags(5));
        assert_eq!(flags.flag_names(5), ["A", "C"]);

        assert_eq!(
            schema.spec("seed").unwrap().initial_value,
            ParamValue::Complex(Complex::new(0.25, -0.5))
        );
    }

    #[test]
    fn test_unknown_input_type() {
        let err = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "decimal", "initialValue": 1} }
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownInputType { found, .. } if found == "decimal"));
    }

    #[test]
    fn test_missing_initial_value() {
        let err = ConfigSchema::from_value(&json!({ "g": { "x": {"inputType": "int"} } }))
            .unwrap_err();
        assert!(matches!(err, SchemaError::MissingAttribute { attribute, .. } if attribute == "initialValue"));
    }

    #[test]
    fn test_initial_value_must_validate() {
        let err = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "int", "valueRange": [0, 10], "initialValue": 11} }
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::InvalidInitialValue {
                source: ValueError::Validation(_),
                ..
            }
        ));
    }

    #[test]
    fn test_range_shape_errors() {
        for (input_type, range) in [
            ("int", json!([1])),
            ("int", json!([5, 1])),
            ("int", json!([0, 10, 0])),
            ("float", json!(["a", "b"])),
            ("string", json!([])),
            ("string", json!(["a", "a"])),
            ("bitfield", json!({"A": 0})),
            ("complex", json!([[0, 1]])),
        ] {
            let err = ConfigSchema::from_value(&json!({
                "g": { "x": {"inputType": input_type, "valueRange": range, "initialValue": 0} }
            }))
            .unwrap_err();
            assert!(
                matches!(err, SchemaError::InvalidRange { .. }),
                "{input_type} {range}: {err}"
            );
        }
    }

    #[test]
    fn test_bitfield_requires_flags() {
        let err = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "bitfield", "initialValue": 0} }
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRange { .. }));
    }

    #[test]
    fn test_slider_needs_step() {
        let err = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "int", "valueRange": [0, 10], "initialValue": 1,
                         "preferredControl": "slider"} }
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::IncompatibleControl {
                control: ControlKind::Slider,
                ..
            }
        ));

        let ok = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "int", "valueRange": [0, 10, 2], "initialValue": 4,
                         "preferredControl": "slider"} }
        }));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_slider_step_count_is_bounded() {
        let err = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "float", "valueRange": [0.0, 1e30, 1e-10],
                         "initialValue": 0.0, "preferredControl": "slider"} }
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            SchemaError::IncompatibleControl {
                control: ControlKind::Slider,
                ..
            }
        ));

        let spinner = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "float", "valueRange": [0.0, 1e30, 1e-10],
                         "initialValue": 0.0, "preferredControl": "spinner"} }
        }));
        assert!(spinner.is_ok());
    }

    #[test]
    fn test_listbox_needs_choices() {
        let err = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "string", "initialValue": "a", "preferredControl": "listbox"} }
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::IncompatibleControl { .. }));
    }

    #[test]
    fn test_duplicate_across_groups() {
        let err = ConfigSchema::from_value(&json!({
            "a": { "x": {"inputType": "int", "initialValue": 1} },
            "b": { "x": {"inputType": "int", "initialValue": 2} }
        }))
        .unwrap_err();
        assert_eq!(
            err,
            SchemaError::DuplicateParameter {
                name: "x".into(),
                first: "a".into(),
                second: "b".into()
            }
        );
    }

    #[test]
    fn test_duplicate_within_group_from_text() {
        let err = ConfigSchema::from_json_str(
            r#"{ "a": { "x": {"inputType": "int", "initialValue": 1},
                        "x": {"inputType": "int", "initialValue": 2} } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateParameter { first, second, .. } if first == "a" && second == "a"));
    }

    #[test]
    fn test_duplicate_group_from_text() {
        let err = ConfigSchema::from_json_str(r#"{ "a": {}, "a": {} }"#).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateGroup("a".into()));
    }

    #[test]
    fn test_unknown_attribute_and_extra_keys() {
        let def = json!({
            "g": { "x": {"inputType": "str", "initialValue": "", "tooltip": "hi"} }
        });
        let err = ConfigSchema::from_value(&def).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownAttribute { attribute, .. } if attribute == "tooltip"));

        let options = ParseOptions::default().with_extra_key("tooltip");
        let schema =
            ConfigSchema::parse(&Definition::try_from(&def).unwrap(), &options).unwrap();
        assert_eq!(
            schema.spec("x").unwrap().control_attributes["tooltip"],
            json!("hi")
        );
    }

    #[test]
    fn test_alias_and_canonical_key_together() {
        let err = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "int", "initialValue": 1,
                         "valRange": [0, 5], "valueRange": [0, 10]} }
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Malformed { ref path, .. } if path == "g.x"));
    }

    #[test]
    fn test_parse_options_deserialize_with_defaults() {
        let opts: ParseOptions = serde_json::from_value(json!({"extraKeys": ["tooltip"]})).unwrap();
        assert_eq!(opts, ParseOptions::default().with_extra_key("tooltip"));

        let opts: ParseOptions = toml::from_str("defaultWidth = 8").unwrap();
        assert_eq!(opts.default_width, 8);
        assert!(opts.extra_keys.is_empty());
    }

    #[test]
    fn test_flag_list_assigns_bits() {
        let schema = ConfigSchema::from_value(&json!({
            "g": { "x": {"inputType": "flags", "valueRange": ["r", "w", "x"], "initialValue": ["w"]} }
        }))
        .unwrap();
        let spec = schema.spec("x").unwrap();
        assert_eq!(spec.value_range.declared_mask(), 0b111);
        assert_eq!(spec.initial_value, ParamValue::Flags(2));
    }
}
