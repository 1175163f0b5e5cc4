//! Component parameters and their resolution against system parameters.
//!
//! Values are kept as text until initialize. A value is a numeric literal
//! (optionally with a unit suffix), a boolean literal, or the name of a
//! system parameter defined on the owning system or one of its ancestors.

use serde::Serialize;
use std::collections::BTreeMap;
use tl_core::{Real, units};

const MAX_INDIRECTION: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ParameterKind {
    Real,
    Integer,
    Bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParameterValue {
    Real(Real),
    Integer(i64),
    Bool(bool),
}

impl ParameterValue {
    pub fn as_real(self) -> Real {
        match self {
            ParameterValue::Real(v) => v,
            ParameterValue::Integer(i) => i as Real,
            ParameterValue::Bool(b) => Real::from(u8::from(b)),
        }
    }

    pub fn as_integer(self) -> i64 {
        match self {
            ParameterValue::Integer(i) => i,
            ParameterValue::Real(v) => v.round() as i64,
            ParameterValue::Bool(b) => i64::from(b),
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            ParameterValue::Bool(b) => b,
            ParameterValue::Integer(i) => i != 0,
            ParameterValue::Real(v) => v > 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    pub unit: &'static str,
    pub kind: ParameterKind,
    pub default: String,
    pub value: String,
    /// Input-variable port whose unconnected default this parameter sets.
    #[serde(skip)]
    pub(crate) bound_port: Option<usize>,
}

impl Parameter {
    pub(crate) fn new(
        name: &str,
        description: &str,
        unit: &'static str,
        kind: ParameterKind,
        default: String,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            unit,
            kind,
            value: default.clone(),
            default,
            bound_port: None,
        }
    }
}

/// Chain of system-parameter tables, innermost first.
#[derive(Clone, Copy, Debug)]
pub struct ParameterScope<'a> {
    values: &'a BTreeMap<String, String>,
    parent: Option<&'a ParameterScope<'a>>,
}

impl<'a> ParameterScope<'a> {
    pub fn new(values: &'a BTreeMap<String, String>, parent: Option<&'a ParameterScope<'a>>) -> Self {
        Self { values, parent }
    }

    /// Find `name` here or in an ancestor; returns the value and the scope that defines it.
    pub fn lookup(&self, name: &str) -> Option<(&'a str, &Self)> {
        match self.values.get(name) {
            Some(v) => Some((v.as_str(), self)),
            None => self.parent.and_then(|p| p.lookup(name)),
        }
    }
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check a value at `set_parameter` time. Identifiers are accepted and resolved later.
pub fn validate(kind: ParameterKind, unit: &str, text: &str) -> Result<(), String> {
    let t = text.trim();
    if is_identifier(t) && literal(kind, unit, t).is_none() {
        return Ok(());
    }
    match literal(kind, unit, t) {
        Some(r) => r.map(|_| ()),
        None => Err(format!("expected {} value or parameter name", kind_name(kind))),
    }
}

/// Resolve `text` into a value of `kind` expressed in `unit`.
pub fn resolve(
    kind: ParameterKind,
    unit: &str,
    text: &str,
    scope: Option<&ParameterScope<'_>>,
) -> Result<ParameterValue, String> {
    resolve_in(kind, unit, text, scope, 0)
}

fn resolve_in(
    kind: ParameterKind,
    unit: &str,
    text: &str,
    scope: Option<&ParameterScope<'_>>,
    depth: usize,
) -> Result<ParameterValue, String> {
    let t = text.trim();
    if let Some(r) = literal(kind, unit, t) {
        return r;
    }
    if !is_identifier(t) {
        return Err(format!("expected {} value or parameter name", kind_name(kind)));
    }
    if depth >= MAX_INDIRECTION {
        return Err(format!("parameter reference '{t}' is circular"));
    }
    let (value, found) = scope
        .and_then(|s| s.lookup(t))
        .ok_or_else(|| format!("no system parameter named '{t}'"))?;
    resolve_in(kind, unit, value, Some(found), depth + 1)
}

/// `None` when `t` is not a literal of this kind at all.
fn literal(kind: ParameterKind, unit: &str, t: &str) -> Option<Result<ParameterValue, String>> {
    match kind {
        ParameterKind::Bool => match t {
            "true" | "1" => Some(Ok(ParameterValue::Bool(true))),
            "false" | "0" => Some(Ok(ParameterValue::Bool(false))),
            _ => None,
        },
        ParameterKind::Integer => {
            if let Ok(i) = t.parse::<i64>() {
                return Some(Ok(ParameterValue::Integer(i)));
            }
            let v: Real = t.parse().ok()?;
            Some(if v.fract() == 0.0 && v.is_finite() {
                Ok(ParameterValue::Integer(v as i64))
            } else {
                Err(format!("{v} is not an integer"))
            })
        }
        ParameterKind::Real => {
            let _ = units::split_quantity(t)?;
            Some(
                units::parse_si(t, unit)
                    .map_err(|e| e.to_string())
                    .and_then(|v| {
                        if v.is_finite() {
                            Ok(ParameterValue::Real(v))
                        } else {
                            Err(format!("{v} is not finite"))
                        }
                    }),
            )
        }
    }
}

fn kind_name(kind: ParameterKind) -> &'static str {
    match kind {
        ParameterKind::Real => "a real",
        ParameterKind::Integer => "an integer",
        ParameterKind::Bool => "a boolean",
    }
}
