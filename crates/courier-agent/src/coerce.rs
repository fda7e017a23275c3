//! Positional argument coercion.
//!
//! Directive values arrive as bare strings in parameter declaration order.
//! Each one is converted to the JSON type its parameter declares. Coercion
//! never fails: unparsable input becomes a type default (`0`, `0.0`, `[]`),
//! tagged as [`Coercion::Defaulted`] and logged.

use courier_core::types::{ArgumentMap, ParamType, ToolParameter};
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of coercing one value.
#[derive(Debug, Clone, PartialEq)]
pub enum Coercion {
    Coerced(Value),
    Defaulted { value: Value, reason: String },
}

impl Coercion {
    pub fn value(&self) -> &Value {
        match self {
            Coercion::Coerced(value) | Coercion::Defaulted { value, .. } => value,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Coercion::Coerced(value) | Coercion::Defaulted { value, .. } => value,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Coercion::Defaulted { .. })
    }

    fn defaulted(value: Value, reason: impl Into<String>) -> Self {
        Coercion::Defaulted {
            value,
            reason: reason.into(),
        }
    }
}

/// Arguments built from one directive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedArguments {
    pub arguments: ArgumentMap,
    /// `(parameter, reason)` for every value that fell back to a default.
    pub defaulted: Vec<(String, String)>,
}

impl CoercedArguments {
    /// Declared-required parameters with no value.
    pub fn missing_required<'a>(&self, parameters: &'a [ToolParameter]) -> Vec<&'a str> {
        parameters
            .iter()
            .filter(|p| p.required && !self.arguments.contains_key(&p.name))
            .map(|p| p.name.as_str())
            .collect()
    }
}

/// Pair `raw` values with `parameters` by position. Extra values are dropped;
/// parameters without a value are left out of the map.
pub fn coerce_arguments(parameters: &[ToolParameter], raw: &[String]) -> CoercedArguments {
    if raw.len() > parameters.len() {
        debug!(
            declared = parameters.len(),
            supplied = raw.len(),
            "dropping extra directive values"
        );
    }

    let mut out = CoercedArguments::default();
    for (parameter, value) in parameters.iter().zip(raw) {
        let coercion = coerce_value(&parameter.kind, &Value::String(value.clone()));
        if let Coercion::Defaulted { reason, .. } = &coercion {
            warn!(
                parameter = %parameter.name,
                kind = %parameter.kind,
                value = %value,
                reason = %reason,
                "argument replaced by default"
            );
            out.defaulted.push((parameter.name.clone(), reason.clone()));
        }
        out.arguments
            .insert(parameter.name.clone(), coercion.into_value());
    }
    out
}

/// Convert `value` to `kind`. Values already of the right type are returned
/// unchanged.
pub fn coerce_value(kind: &ParamType, value: &Value) -> Coercion {
    match kind {
        ParamType::Integer => coerce_integer(value),
        ParamType::Number => coerce_number(value),
        ParamType::Array => coerce_array(value),
        ParamType::String | ParamType::Other(_) | ParamType::Unspecified => {
            Coercion::Coerced(Value::String(as_text(value)))
        }
    }
}

fn coerce_integer(value: &Value) -> Coercion {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Coercion::Coerced(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Coercion::Coerced(Value::from(f as i64))
            }
            _ => Coercion::defaulted(Value::from(0), format!("{n} is not an integer")),
        },
        other => {
            let text = as_text(other);
            match text.trim().parse::<i64>() {
                Ok(i) => Coercion::Coerced(Value::from(i)),
                Err(e) => Coercion::defaulted(Value::from(0), format!("{text:?}: {e}")),
            }
        }
    }
}

fn coerce_number(value: &Value) -> Coercion {
    let zero = || Value::from(0.0);
    match value {
        Value::Number(_) => Coercion::Coerced(value.clone()),
        other => {
            let text = as_text(other);
            match text.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Coercion::Coerced(Value::from(f)),
                Ok(f) => Coercion::defaulted(zero(), format!("{f} is not a finite number")),
                Err(e) => Coercion::defaulted(zero(), format!("{text:?}: {e}")),
            }
        }
    }
}

fn coerce_array(value: &Value) -> Coercion {
    let items: Vec<Value> = match value {
        Value::Array(items) => items.clone(),
        other => {
            let text = as_text(other);
            let inner = text.trim().trim_matches(|c| c == '[' || c == ']');
            if inner.trim().is_empty() {
                Vec::new()
            } else {
                inner.split(',').map(|t| Value::String(t.to_string())).collect()
            }
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match array_item(item) {
            Ok(v) => out.push(v),
            Err(reason) => return Coercion::defaulted(Value::Array(Vec::new()), reason),
        }
    }
    Coercion::Coerced(Value::Array(out))
}

/// Digit-only tokens become integers, other tokens trimmed strings.
fn array_item(item: Value) -> Result<Value, String> {
    let Value::String(token) = item else {
        return Ok(item);
    };
    let token = token.trim();
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        token
            .parse::<i64>()
            .map(Value::from)
            .map_err(|e| format!("array element {token:?}: {e}"))
    } else {
        Ok(Value::String(token.to_string()))
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
