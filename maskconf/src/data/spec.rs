use std::{fmt, str::FromStr};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::data::value::{Complex, ParamValue};

/// Rejection of a candidate value by a single parameter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    /// The candidate has the right shape but lies outside the declared range or set.
    #[error("{0}")]
    Validation(String),
    /// The candidate cannot be interpreted as the declared type.
    #[error("expected {expected}, got {actual}")]
    TypeCoercion { expected: String, actual: String },
}

impl ValueError {
    fn coercion(expected: &str, actual: &Value) -> Self {
        ValueError::TypeCoercion {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Value kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    Integer,
    Float,
    Complex,
    String,
    Bitfield,
}

impl InputType {
    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            InputType::Integer => "integer",
            InputType::Float => "float",
            InputType::Complex => "complex",
            InputType::String => "string",
            InputType::Bitfield => "bitfield",
        }
    }
}

impl FromStr for InputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" | "int" => Ok(InputType::Integer),
            "float" => Ok(InputType::Float),
            "complex" => Ok(InputType::Complex),
            "string" | "str" => Ok(InputType::String),
            "bitfield" | "flags" => Ok(InputType::Bitfield),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Suggested kind of interactive control. Advisory only; the store never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKind {
    Entry,
    Spinner,
    ListBox,
    FlagSet,
    RadioGroup,
    Slider,
}

impl ControlKind {
    /// All control kinds in tag order.
    pub const ALL: [ControlKind; 6] = [
        ControlKind::Entry,
        ControlKind::Spinner,
        ControlKind::ListBox,
        ControlKind::FlagSet,
        ControlKind::RadioGroup,
        ControlKind::Slider,
    ];

    /// Tag used in definitions.
    pub fn tag(&self) -> &'static str {
        match self {
            ControlKind::Entry => "entry",
            ControlKind::Spinner => "spinner",
            ControlKind::ListBox => "listbox",
            ControlKind::FlagSet => "flagset",
            ControlKind::RadioGroup => "radio",
            ControlKind::Slider => "slider",
        }
    }
}

impl FromStr for ControlKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlKind::ALL
            .into_iter()
            .find(|k| k.tag() == s)
            .ok_or_else(|| s.to_string())
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Type-specific constraint payload of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRange {
    /// No constraint beyond the type itself.
    Unbounded,
    /// Inclusive integer bounds with optional step anchored at `min`.
    Integer {
        min: i64,
        max: i64,
        step: Option<i64>,
    },
    /// Inclusive float bounds. `step` is a control hint only.
    Float {
        min: f64,
        max: f64,
        step: Option<f64>,
    },
    /// Inclusive per-component bounds.
    Complex { re: (f64, f64), im: (f64, f64) },
    /// Enumerated members: legal strings, or labels of an enumerated integer.
    Choices(Vec<String>),
    /// Declared flag names and their bit masks, in declaration order.
    Flags(Vec<(String, u64)>),
}

impl ValueRange {
    /// Step of a numeric range, widened to `f64`.
    pub fn step(&self) -> Option<f64> {
        match self {
            ValueRange::Integer { step, .. } => step.map(|s| s as f64),
            ValueRange::Float { step, .. } => *step,
            _ => None,
        }
    }

    /// Numeric bounds widened to `f64`.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            ValueRange::Integer { min, max, .. } => Some((*min as f64, *max as f64)),
            ValueRange::Float { min, max, .. } => Some((*min, *max)),
            _ => None,
        }
    }

    /// Enumerated members, if any.
    pub fn choices(&self) -> Option<&[String]> {
        match self {
            ValueRange::Choices(c) => Some(c),
            _ => None,
        }
    }

    /// Declared flags, if any.
    pub fn flags(&self) -> Option<&[(String, u64)]> {
        match self {
            ValueRange::Flags(f) => Some(f),
            _ => None,
        }
    }

    /// Union of all declared flag masks.
    pub fn declared_mask(&self) -> u64 {
        self.flags()
            .map(|f| f.iter().fold(0, |acc, (_, m)| acc | m))
            .unwrap_or(0)
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueRange::Unbounded => f.write_str("unbounded"),
            ValueRange::Integer { min, max, step } => match step {
                Some(step) => write!(f, "[{min}, {max}] step {step}"),
                None => write!(f, "[{min}, {max}]"),
            },
            ValueRange::Float { min, max, .. } => write!(f, "[{min}, {max}]"),
            ValueRange::Complex { re, im } => {
                write!(f, "re [{}, {}], im [{}, {}]", re.0, re.1, im.0, im.1)
            }
            ValueRange::Choices(c) => write!(f, "one of {c:?}"),
            ValueRange::Flags(flags) => {
                let names: Vec<_> = flags.iter().map(|(n, _)| n.as_str()).collect();
                write!(f, "flags {names:?}")
            }
        }
    }
}

/// Immutable description of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    /// Unique parameter name.
    pub name: String,
    /// Value kind.
    pub input_type: InputType,
    /// Constraint payload.
    pub value_range: ValueRange,
    /// Canonical default, always accepted by [`ParameterSpec::coerce`].
    pub initial_value: ParamValue,
    /// Suggested control kind.
    pub preferred_control: ControlKind,
    /// Display label.
    pub label: String,
    /// Display width hint.
    pub width: u16,
    /// Whether bound controls are editable.
    pub read_only: bool,
    /// Adapter-specific attributes, passed through unvalidated.
    pub control_attributes: Map<String, Value>,
}

impl ParameterSpec {
    /// Validate and coerce a candidate into the canonical representation.
    ///
    /// Every write path of the store goes through here, so the store never holds a value this
    /// function would reject.
    pub fn coerce(&self, candidate: &Value) -> Result<ParamValue, ValueError> {
        coerce(self.input_type, &self.value_range, candidate)
    }

    /// Names of the declared flags fully set in `value`, in declaration order.
    pub fn flag_names(&self, value: u64) -> Vec<&str> {
        self.value_range
            .flags()
            .unwrap_or_default()
            .iter()
            .filter(|(_, mask)| value & mask == *mask)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Enumerated label of an integer choice value.
    pub fn choice_label(&self, value: &ParamValue) -> Option<&str> {
        let choices = self.value_range.choices()?;
        match value {
            ParamValue::Integer(idx) => usize::try_from(*idx)
                .ok()
                .and_then(|i| choices.get(i))
                .map(String::as_str),
            ParamValue::Text(s) => choices.iter().find(|c| *c == s).map(String::as_str),
            _ => None,
        }
    }
}

/// Validate `candidate` against an input type and range.
pub fn coerce(
    input_type: InputType,
    range: &ValueRange,
    candidate: &Value,
) -> Result<ParamValue, ValueError> {
    match input_type {
        InputType::Integer => coerce_integer(range, candidate),
        InputType::Float => coerce_float(range, candidate),
        InputType::Complex => coerce_complex(range, candidate),
        InputType::String => coerce_string(range, candidate),
        InputType::Bitfield => coerce_bitfield(range, candidate),
    }
}

fn round_to_i64(v: f64) -> Option<i64> {
    let r = v.round();
    (r.is_finite() && r >= i64::MIN as f64 && r < i64::MAX as f64).then_some(r as i64)
}

fn coerce_integer(range: &ValueRange, candidate: &Value) -> Result<ParamValue, ValueError> {
    let v = match candidate {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(round_to_i64))
            .ok_or_else(|| ValueError::coercion("integer", candidate))?,
        Value::String(s) => {
            let t = s.trim();
            let label = range
                .choices()
                .and_then(|choices| choices.iter().position(|c| c == s || c == t));
            match label {
                Some(idx) => idx as i64,
                None => t
                    .parse::<i64>()
                    .ok()
                    .or_else(|| t.parse::<f64>().ok().and_then(round_to_i64))
                    .ok_or_else(|| ValueError::coercion("integer", candidate))?,
            }
        }
        _ => return Err(ValueError::coercion("integer", candidate)),
    };

    match range {
        ValueRange::Integer { min, max, step } => {
            if v < *min || v > *max {
                return Err(ValueError::Validation(format!("{v} is outside {range}")));
            }
            if let Some(step) = step
                && v.abs_diff(*min) % step.unsigned_abs() != 0
            {
                return Err(ValueError::Validation(format!(
                    "{v} is not on a step of {step} from {min}"
                )));
            }
        }
        ValueRange::Choices(choices) => {
            if v < 0 || v as usize >= choices.len() {
                return Err(ValueError::Validation(format!(
                    "index {v} is outside 0..{}",
                    choices.len()
                )));
            }
        }
        _ => {}
    }
    Ok(ParamValue::Integer(v))
}

fn finite_from(candidate: &Value) -> Option<f64> {
    match candidate {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn coerce_float(range: &ValueRange, candidate: &Value) -> Result<ParamValue, ValueError> {
    let v = finite_from(candidate).ok_or_else(|| ValueError::coercion("float", candidate))?;
    if let ValueRange::Float { min, max, .. } = range
        && (v < *min || v > *max)
    {
        return Err(ValueError::Validation(format!("{v} is outside {range}")));
    }
    Ok(ParamValue::Float(v))
}

fn coerce_complex(range: &ValueRange, candidate: &Value) -> Result<ParamValue, ValueError> {
    let parsed = match candidate {
        Value::Number(_) => finite_from(candidate).map(|re| Complex::new(re, 0.0)),
        Value::String(s) => Complex::parse(s),
        Value::Array(parts) if parts.len() == 2 => finite_from(&parts[0])
            .zip(finite_from(&parts[1]))
            .map(|(re, im)| Complex::new(re, im)),
        Value::Object(obj) => obj
            .get("re")
            .and_then(finite_from)
            .zip(obj.get("im").and_then(finite_from))
            .map(|(re, im)| Complex::new(re, im)),
        _ => None,
    };
    let c = parsed.ok_or_else(|| ValueError::coercion("complex", candidate))?;

    if let ValueRange::Complex { re, im } = range {
        if c.re < re.0 || c.re > re.1 {
            return Err(ValueError::Validation(format!(
                "real part {} is outside [{}, {}]",
                c.re, re.0, re.1
            )));
        }
        if c.im < im.0 || c.im > im.1 {
            return Err(ValueError::Validation(format!(
                "imaginary part {} is outside [{}, {}]",
                c.im, im.0, im.1
            )));
        }
    }
    Ok(ParamValue::Complex(c))
}

fn coerce_string(range: &ValueRange, candidate: &Value) -> Result<ParamValue, ValueError> {
    let Value::String(s) = candidate else {
        return Err(ValueError::coercion("string", candidate));
    };
    if let ValueRange::Choices(choices) = range
        && !choices.contains(s)
    {
        return Err(ValueError::Validation(format!("{s:?} is not {range}")));
    }
    Ok(ParamValue::Text(s.clone()))
}

fn flag_mask(flags: &[(String, u64)], item: &Value) -> Result<u64, ValueError> {
    match item {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ValueError::coercion("non-negative integer or flag name", item)),
        Value::String(s) => {
            if let Some((_, mask)) = flags.iter().find(|(name, _)| name == s) {
                return Ok(*mask);
            }
            match s.trim().parse::<u64>() {
                Ok(v) => Ok(v),
                Err(_) => Err(ValueError::Validation(format!("undeclared flag {s:?}"))),
            }
        }
        _ => Err(ValueError::coercion("non-negative integer or flag name", item)),
    }
}

fn coerce_bitfield(range: &ValueRange, candidate: &Value) -> Result<ParamValue, ValueError> {
    let flags = range.flags().unwrap_or_default();
    let v = match candidate {
        Value::Array(items) => items
            .iter()
            .try_fold(0u64, |acc, item| {
                Ok::<_, ValueError>(acc | flag_mask(flags, item)?)
            })?,
        _ => flag_mask(flags, candidate)?,
    };

    let undeclared = v & !range.declared_mask();
    if undeclared != 0 {
        return Err(ValueError::Validation(format!(
            "bits {undeclared:#x} are not declared flags"
        )));
    }
    Ok(ParamValue::Flags(v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn int_range(min: i64, max: i64, step: Option<i64>) -> ValueRange {
        ValueRange::Integer { min, max, step }
    }

    fn flags() -> ValueRange {
        ValueRange::Flags(vec![("A".into(), 1), ("B".into(), 2), ("C".into(), 4)])
    }

    #[test]
    fn test_integer_accepts_numbers_and_numeric_strings() {
        let r = int_range(0, 10, None);
        assert_eq!(
            coerce(InputType::Integer, &r, &json!(5)),
            Ok(ParamValue::Integer(5))
        );
        assert_eq!(
            coerce(InputType::Integer, &r, &json!(" 7 ")),
            Ok(ParamValue::Integer(7))
        );
        assert_eq!(
            coerce(InputType::Integer, &r, &json!(6.6)),
            Ok(ParamValue::Integer(7))
        );
        assert_eq!(
            coerce(InputType::Integer, &r, &json!("2.4")),
            Ok(ParamValue::Integer(2))
        );
    }

    #[test]
    fn test_integer_range_and_step() {
        let r = int_range(100, 4000, Some(10));
        assert!(coerce(InputType::Integer, &r, &json!(250)).is_ok());
        assert!(matches!(
            coerce(InputType::Integer, &r, &json!(255)),
            Err(ValueError::Validation(_))
        ));
        assert!(matches!(
            coerce(InputType::Integer, &r, &json!(4010)),
            Err(ValueError::Validation(_))
        ));
        assert!(matches!(
            coerce(InputType::Integer, &r, &json!("many")),
            Err(ValueError::TypeCoercion { .. })
        ));
        assert!(matches!(
            coerce(InputType::Integer, &r, &json!(true)),
            Err(ValueError::TypeCoercion { .. })
        ));
    }

    #[test]
    fn test_integer_step_over_full_range() {
        let r = int_range(i64::MIN, i64::MAX, Some(2));
        assert_eq!(
            coerce(InputType::Integer, &r, &json!(0)),
            Ok(ParamValue::Integer(0))
        );
        assert_eq!(
            coerce(InputType::Integer, &r, &json!(i64::MAX - 1)),
            Ok(ParamValue::Integer(i64::MAX - 1))
        );
        assert!(matches!(
            coerce(InputType::Integer, &r, &json!(i64::MAX)),
            Err(ValueError::Validation(_))
        ));
    }

    #[test]
    fn test_integer_choices_take_labels_or_indices() {
        let r = ValueRange::Choices(vec!["Line".into(), "Recursive".into()]);
        assert_eq!(
            coerce(InputType::Integer, &r, &json!("Recursive")),
            Ok(ParamValue::Integer(1))
        );
        assert_eq!(
            coerce(InputType::Integer, &r, &json!(0)),
            Ok(ParamValue::Integer(0))
        );
        assert!(matches!(
            coerce(InputType::Integer, &r, &json!(2)),
            Err(ValueError::Validation(_))
        ));
    }

    #[test]
    fn test_float() {
        let r = ValueRange::Float {
            min: 4.0,
            max: 10000.0,
            step: None,
        };
        assert_eq!(
            coerce(InputType::Float, &r, &json!(4)),
            Ok(ParamValue::Float(4.0))
        );
        assert_eq!(
            coerce(InputType::Float, &r, &json!("12.5")),
            Ok(ParamValue::Float(12.5))
        );
        assert!(matches!(
            coerce(InputType::Float, &r, &json!(3.99)),
            Err(ValueError::Validation(_))
        ));
        assert!(matches!(
            coerce(InputType::Float, &r, &json!("NaN")),
            Err(ValueError::TypeCoercion { .. })
        ));
    }

    #[test]
    fn test_complex_forms_and_bounds() {
        let r = ValueRange::Complex {
            re: (-2.0, 2.0),
            im: (-1.0, 1.0),
        };
        let expected = Ok(ParamValue::Complex(Complex::new(1.0, 0.5)));
        assert_eq!(coerce(InputType::Complex, &r, &json!([1.0, 0.5])), expected);
        assert_eq!(coerce(InputType::Complex, &r, &json!("1+0.5j")), expected);
        assert_eq!(
            coerce(InputType::Complex, &r, &json!({"re": 1, "im": 0.5})),
            expected
        );
        assert!(matches!(
            coerce(InputType::Complex, &r, &json!("0+2j")),
            Err(ValueError::Validation(_))
        ));
        assert!(matches!(
            coerce(InputType::Complex, &r, &json!([1.0])),
            Err(ValueError::TypeCoercion { .. })
        ));
    }

    #[test]
    fn test_string_membership() {
        let r = ValueRange::Choices(vec!["Linear".into(), "Sinus".into()]);
        assert_eq!(
            coerce(InputType::String, &r, &json!("Sinus")),
            Ok(ParamValue::Text("Sinus".into()))
        );
        assert!(matches!(
            coerce(InputType::String, &r, &json!("Cosinus")),
            Err(ValueError::Validation(_))
        ));
        assert!(matches!(
            coerce(InputType::String, &ValueRange::Unbounded, &json!(3)),
            Err(ValueError::TypeCoercion { .. })
        ));
    }

    #[test]
    fn test_bitfield_folds_names() {
        let r = flags();
        assert_eq!(
            coerce(InputType::Bitfield, &r, &json!(["A", "C"])),
            Ok(ParamValue::Flags(5))
        );
        assert_eq!(
            coerce(InputType::Bitfield, &r, &json!("B")),
            Ok(ParamValue::Flags(2))
        );
        assert_eq!(
            coerce(InputType::Bitfield, &r, &json!(7)),
            Ok(ParamValue::Flags(7))
        );
        assert_eq!(
            coerce(InputType::Bitfield, &r, &json!([])),
            Ok(ParamValue::Flags(0))
        );
    }

    #[test]
    fn test_bitfield_rejects_undeclared() {
        let r = flags();
        assert!(matches!(
            coerce(InputType::Bitfield, &r, &json!(["A", "D"])),
            Err(ValueError::Validation(_))
        ));
        assert!(matches!(
            coerce(InputType::Bitfield, &r, &json!(8)),
            Err(ValueError::Validation(_))
        ));
        assert!(matches!(
            coerce(InputType::Bitfield, &r, &json!(-1)),
            Err(ValueError::TypeCoercion { .. })
        ));
    }

    #[test]
    fn test_control_kind_tags() {
        for kind in ControlKind::ALL {
            assert_eq!(kind.tag().parse::<ControlKind>(), Ok(kind));
        }
        assert!("dial".parse::<ControlKind>().is_err());
    }
}
