//! Strategy parameter schemas.
//!
//! The source system passed loose dynamic maps into strategies. Here each
//! strategy declares a schema (name, type, default, bounds); the engine
//! validates once at configure time and the run operates on typed fields.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match *self {
            ParamValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            ParamValue::Float(v) => Some(v),
            ParamValue::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParamValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Int,
    Float,
    Bool,
}

/// Declared schema entry for one strategy parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ParamSpec {
    pub fn int(name: &'static str, default: i64, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Int,
            default: ParamValue::Int(default),
            min: Some(min as f64),
            max: Some(max as f64),
        }
    }

    pub fn float(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float,
            default: ParamValue::Float(default),
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn flag(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: ParamKind::Bool,
            default: ParamValue::Bool(default),
            min: None,
            max: None,
        }
    }
}

/// Ordered parameter mapping, as handed to `Strategy::configure`.
pub type Params = BTreeMap<String, ParamValue>;

/// Validate a parameter mapping against a declared schema: unknown keys,
/// type mismatches, and bound violations are errors.
pub fn validate(params: &Params, schema: &[ParamSpec]) -> Result<(), ParamError> {
    for (name, value) in params {
        let spec = schema
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ParamError::Unknown { name: name.clone() })?;
        let numeric = match (spec.kind, value) {
            (ParamKind::Int, ParamValue::Int(v)) => Some(*v as f64),
            (ParamKind::Float, ParamValue::Float(v)) => Some(*v),
            (ParamKind::Float, ParamValue::Int(v)) => Some(*v as f64),
            (ParamKind::Bool, ParamValue::Bool(_)) => None,
            _ => {
                return Err(ParamError::WrongType {
                    name: name.clone(),
                })
            }
        };
        if let Some(v) = numeric {
            if let Some(min) = spec.min {
                if v < min {
                    return Err(ParamError::OutOfBounds {
                        name: name.clone(),
                        value: v,
                        min,
                        max: spec.max.unwrap_or(f64::INFINITY),
                    });
                }
            }
            if let Some(max) = spec.max {
                if v > max {
                    return Err(ParamError::OutOfBounds {
                        name: name.clone(),
                        value: v,
                        min: spec.min.unwrap_or(f64::NEG_INFINITY),
                        max,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Typed accessors with schema defaults.
pub struct ParamReader<'a> {
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a Params) -> Self {
        Self { params }
    }

    pub fn int(&self, name: &str, default: i64) -> i64 {
        self.params
            .get(name)
            .and_then(ParamValue::as_int)
            .unwrap_or(default)
    }

    pub fn usize(&self, name: &str, default: usize) -> usize {
        self.int(name, default as i64).max(0) as usize
    }

    pub fn float(&self, name: &str, default: f64) -> f64 {
        self.params
            .get(name)
            .and_then(ParamValue::as_float)
            .unwrap_or(default)
    }

    pub fn flag(&self, name: &str, default: bool) -> bool {
        self.params
            .get(name)
            .and_then(ParamValue::as_bool)
            .unwrap_or(default)
    }

    pub fn decimal(&self, name: &str, default: Decimal) -> Decimal {
        self.params
            .get(name)
            .and_then(ParamValue::as_float)
            .and_then(Decimal::from_f64)
            .unwrap_or(default)
    }
}

#[derive(Debug, Error)]
pub enum ParamError {
    #[error("unknown parameter: {name}")]
    Unknown { name: String },

    #[error("parameter {name} has the wrong type")]
    WrongType { name: String },

    #[error("parameter {name}={value} outside [{min}, {max}]")]
    OutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },
}
