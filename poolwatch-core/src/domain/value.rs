//! Attribute values
//!
//! A value is one of the scalar types the scheduler's wire format can carry.
//! Values are totally ordered and hashable so they can be used as record keys
//! and summary keys; reals compare by `f64::total_cmp` and hash by bit pattern.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::format::AttrType;

/// A typed attribute value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    /// Attribute present but undefined (`<un/>` on the wire, `null` in JSON)
    Undefined,
}

impl Value {
    /// Check if this value is `Undefined`
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Borrow the string payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer payload, if this is an integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a float (integers widen)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get the boolean payload, if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert this value to the declared attribute type
    ///
    /// Values that cannot be represented in the target type are returned
    /// unchanged. `Undefined` stays `Undefined`.
    pub fn coerce(self, target: AttrType) -> Value {
        match (target, self) {
            (_, Value::Undefined) => Value::Undefined,

            (AttrType::String, Value::String(s)) => Value::String(s),
            (AttrType::String, other) => Value::String(other.to_string()),

            (AttrType::Integer, Value::Integer(i)) => Value::Integer(i),
            (AttrType::Integer, Value::Bool(b)) => Value::Integer(i64::from(b)),
            (AttrType::Integer, Value::Real(r)) if r.is_finite() && r.fract() == 0.0 => {
                Value::Integer(r as i64)
            }
            (AttrType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => Value::String(s),
            },

            (AttrType::Real, Value::Real(r)) => Value::Real(r),
            (AttrType::Real, Value::Integer(i)) => Value::Real(i as f64),
            (AttrType::Real, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(r) => Value::Real(r),
                Err(_) => Value::String(s),
            },

            (AttrType::Bool, Value::Bool(b)) => Value::Bool(b),
            (AttrType::Bool, Value::Integer(i)) => Value::Bool(i != 0),
            (AttrType::Bool, Value::String(s)) => match parse_bool_text(&s) {
                Some(b) => Value::Bool(b),
                None => Value::String(s),
            },

            (_, other) => other,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Undefined => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Real(_) => 3,
            Value::String(_) => 4,
        }
    }
}

/// Interpret scheduler boolean text (`true`, `FALSE`, `1`, `0`, ...)
pub fn parse_bool_text(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" => Some(true),
        "f" | "false" | "0" => Some(false),
        _ => None,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Real(a), Value::Real(b)) => a.total_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Undefined, Value::Undefined) => Ordering::Equal,
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::String(s) => s.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Real(r) => r.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Undefined => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Real(r) => write!(f, "{}", r),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Undefined => write!(f, "undefined"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(r: f64) -> Self {
        Value::Real(r)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
