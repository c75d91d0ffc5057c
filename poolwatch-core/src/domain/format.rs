//! Format specifications
//!
//! A format spec is the ordered projection a caller asks for: which
//! attributes to fetch and which scalar type each should come back as.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declared type of a projected attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttrType {
    String,
    Integer,
    Real,
    Bool,
}

impl AttrType {
    /// Single-letter tag (`s`, `i`, `r`, `b`)
    pub fn tag(&self) -> char {
        match self {
            AttrType::String => 's',
            AttrType::Integer => 'i',
            AttrType::Real => 'r',
            AttrType::Bool => 'b',
        }
    }

    /// printf-style conversion used by the scheduler's `-format` flag
    ///
    /// Booleans are printed as integers.
    pub fn printf_conversion(&self) -> &'static str {
        match self {
            AttrType::String => "%s",
            AttrType::Integer => "%i",
            AttrType::Real => "%f",
            AttrType::Bool => "%i",
        }
    }
}

impl FromStr for AttrType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s" | "str" | "string" => Ok(AttrType::String),
            "i" | "int" | "integer" => Ok(AttrType::Integer),
            "r" | "real" | "float" => Ok(AttrType::Real),
            "b" | "bool" | "boolean" => Ok(AttrType::Bool),
            other => Err(format!("unknown attribute type '{}'", other)),
        }
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Ordered list of `(attribute name, type)` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    entries: Vec<(String, AttrType)>,
}

impl FormatSpec {
    /// Creates an empty format spec
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute (builder style)
    pub fn with(mut self, name: impl Into<String>, attr_type: AttrType) -> Self {
        self.push(name, attr_type);
        self
    }

    /// Appends an attribute
    pub fn push(&mut self, name: impl Into<String>, attr_type: AttrType) {
        self.entries.push((name.into(), attr_type));
    }

    /// Returns a copy with every `required` entry appended when its name is
    /// not already present (exact match)
    pub fn complete(&self, required: &FormatSpec) -> FormatSpec {
        let mut out = self.clone();
        for (name, attr_type) in &required.entries {
            if !self.contains(name) {
                out.entries.push((name.clone(), *attr_type));
            }
        }
        out
    }

    /// Check whether an attribute is listed
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Declared type of an attribute, if listed
    pub fn type_of(&self, name: &str) -> Option<AttrType> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    /// Attribute names in order
    pub fn attribute_names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, AttrType)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, AttrType)> for FormatSpec {
    fn from_iter<I: IntoIterator<Item = (S, AttrType)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(n, t)| (n.into(), t)).collect(),
        }
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (name, attr_type)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "({}, {})", name, attr_type)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_appends_missing_keys() {
        let spec = FormatSpec::new().with("JobStatus", AttrType::Integer);
        let required = FormatSpec::new()
            .with("ClusterId", AttrType::Integer)
            .with("ProcId", AttrType::Integer);

        let completed = spec.complete(&required);
        assert_eq!(
            completed.attribute_names(),
            vec!["JobStatus", "ClusterId", "ProcId"]
        );
    }

    #[test]
    fn test_complete_keeps_caller_type() {
        let spec = FormatSpec::new().with("ClusterId", AttrType::String);
        let required = FormatSpec::new().with("ClusterId", AttrType::Integer);

        let completed = spec.complete(&required);
        assert_eq!(completed.len(), 1);
        assert_eq!(completed.type_of("ClusterId"), Some(AttrType::String));
    }

    #[test]
    fn test_attr_type_from_str() {
        assert_eq!("i".parse::<AttrType>().unwrap(), AttrType::Integer);
        assert_eq!("Real".parse::<AttrType>().unwrap(), AttrType::Real);
        assert!("x".parse::<AttrType>().is_err());
    }

    #[test]
    fn test_display() {
        let spec = FormatSpec::new()
            .with("Name", AttrType::String)
            .with("Cpus", AttrType::Integer);
        assert_eq!(spec.to_string(), "[(Name, s), (Cpus, i)]");
    }
}
