use std::fmt;

use serde_json::{Number, Value};

/// Complex number with `f64` components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Complex {
    /// Real part.
    pub re: f64,
    /// Imaginary part.
    pub im: f64,
}

impl Complex {
    /// Create a complex number from its components.
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Parse the textual forms `3`, `2j`, `1+2j`, `1-2.5i` and `(1+2j)`.
    ///
    /// Whitespace is ignored. Returns `None` when the text is not a finite complex number.
    pub fn parse(text: &str) -> Option<Self> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let s = compact
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(&compact);
        if s.is_empty() {
            return None;
        }

        let Some(body) = s.strip_suffix(['j', 'i', 'J', 'I']) else {
            let re = parse_finite(s)?;
            return Some(Self::new(re, 0.0));
        };

        // Split at the last sign that does not belong to an exponent.
        let bytes = body.as_bytes();
        let split = (1..bytes.len())
            .rev()
            .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));

        let (re, im) = match split {
            Some(pos) => (parse_finite(&body[..pos])?, parse_imaginary(&body[pos..])?),
            None => (0.0, parse_imaginary(body)?),
        };
        Some(Self::new(re, im))
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_imaginary(s: &str) -> Option<f64> {
    match s {
        "" | "+" => Some(1.0),
        "-" => Some(-1.0),
        _ => parse_finite(s),
    }
}

impl fmt::Display for Complex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:+}j", self.re, self.im)
    }
}

/// Canonical, validated value of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Integer value, or the selected index of an enumerated integer.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// Complex value.
    Complex(Complex),
    /// String value.
    Text(String),
    /// Composite bit mask of declared flags.
    Flags(u64),
}

impl ParamValue {
    /// Integer payload, if any.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric payload widened to `f64` (integers and floats).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Integer(v) => Some(*v as f64),
            ParamValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Complex payload, if any.
    pub fn as_complex(&self) -> Option<Complex> {
        match self {
            ParamValue::Complex(c) => Some(*c),
            _ => None,
        }
    }

    /// String payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Bit mask payload, if any.
    pub fn as_flags(&self) -> Option<u64> {
        match self {
            ParamValue::Flags(v) => Some(*v),
            _ => None,
        }
    }

    /// Serialize into the JSON form accepted back by the store.
    pub fn as_json(&self) -> Value {
        match self {
            ParamValue::Integer(v) => Value::Number(Number::from(*v)),
            ParamValue::Float(v) => float_json(*v),
            ParamValue::Complex(c) => Value::Array(vec![float_json(c.re), float_json(c.im)]),
            ParamValue::Text(s) => Value::String(s.clone()),
            ParamValue::Flags(v) => Value::Number(Number::from(*v)),
        }
    }
}

fn float_json(v: f64) -> Value {
    Number::from_f64(v)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Integer(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Complex(c) => write!(f, "{c}"),
            ParamValue::Text(s) => f.write_str(s),
            ParamValue::Flags(v) => write!(f, "{v}"),
        }
    }
}

impl From<ParamValue> for Value {
    fn from(value: ParamValue) -> Self {
        value.as_json()
    }
}

impl From<&ParamValue> for Value {
    fn from(value: &ParamValue) -> Self {
        value.as_json()
    }
}

impl From<Complex> for Value {
    fn from(value: Complex) -> Self {
        ParamValue::Complex(value).as_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complex_parse_forms() {
        assert_eq!(Complex::parse("3"), Some(Complex::new(3.0, 0.0)));
        assert_eq!(Complex::parse("2j"), Some(Complex::new(0.0, 2.0)));
        assert_eq!(Complex::parse("-j"), Some(Complex::new(0.0, -1.0)));
        assert_eq!(Complex::parse("1+2j"), Some(Complex::new(1.0, 2.0)));
        assert_eq!(Complex::parse(" 1 - 2.5i "), Some(Complex::new(1.0, -2.5)));
        assert_eq!(Complex::parse("(1+2j)"), Some(Complex::new(1.0, 2.0)));
        assert_eq!(Complex::parse("1e-3+1e2j"), Some(Complex::new(0.001, 100.0)));
        assert_eq!(Complex::parse("-1-j"), Some(Complex::new(-1.0, -1.0)));
    }

    #[test]
    fn test_complex_parse_rejects_garbage() {
        assert_eq!(Complex::parse(""), None);
        assert_eq!(Complex::parse("abc"), None);
        assert_eq!(Complex::parse("1+xj"), None);
        assert_eq!(Complex::parse("inf"), None);
    }

    #[test]
    fn test_complex_display_parses_back() {
        for c in [Complex::new(1.0, 2.0), Complex::new(-0.5, -3.25), Complex::new(0.0, 0.0)] {
            assert_eq!(Complex::parse(&c.to_string()), Some(c));
        }
    }

    #[test]
    fn test_as_json() {
        assert_eq!(ParamValue::Integer(5).as_json(), serde_json::json!(5));
        assert_eq!(ParamValue::Flags(5).as_json(), serde_json::json!(5));
        assert_eq!(
            ParamValue::Complex(Complex::new(1.0, -1.0)).as_json(),
            serde_json::json!([1.0, -1.0])
        );
        assert_eq!(ParamValue::Text("x".into()).as_json(), serde_json::json!("x"));
    }
}
