//! Per-invocation scheduler configuration overrides
//!
//! The scheduler tools read configuration knobs from `_CONDOR_<KNOB>`
//! environment variables. Overrides are collected as knob names and only
//! materialized into environment variables on the spawned command (or into
//! parameters for the native binding), so the process environment is never
//! modified.

use std::collections::BTreeMap;

/// Environment prefix the scheduler tools read knobs from
pub const KNOB_ENV_PREFIX: &str = "_CONDOR_";

/// Ordered knob → value map; `None` forces the knob unset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    knobs: BTreeMap<String, Option<String>>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a knob (builder style)
    pub fn with(mut self, knob: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(knob, Some(value.into()));
        self
    }

    /// Set or force-unset a knob
    pub fn set(&mut self, knob: impl Into<String>, value: Option<String>) {
        self.knobs.insert(knob.into(), value);
    }

    /// Value of a knob, if set
    pub fn get(&self, knob: &str) -> Option<&str> {
        self.knobs.get(knob).and_then(|v| v.as_deref())
    }

    /// Merge `other` into `self`; `other` wins on conflicts
    pub fn merge(&mut self, other: &ConfigOverrides) {
        for (knob, value) in &other.knobs {
            self.knobs.insert(knob.clone(), value.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.knobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.knobs.iter()
    }

    /// Environment variables to apply to a spawned tool
    pub fn to_env(&self) -> Vec<(String, Option<String>)> {
        self.knobs
            .iter()
            .map(|(knob, value)| (format!("{}{}", KNOB_ENV_PREFIX, knob), value.clone()))
            .collect()
    }

    /// Knobs already present in an environment (`_CONDOR_*` variables)
    pub fn from_env_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut out = Self::new();
        for (name, value) in vars {
            if let Some(knob) = name.strip_prefix(KNOB_ENV_PREFIX) {
                if !knob.is_empty() {
                    out.set(knob, Some(value));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_env_prefixes_knobs() {
        let overrides = ConfigOverrides::new().with("SPOOL", "/var/lib/condor/spool");
        assert_eq!(
            overrides.to_env(),
            vec![(
                "_CONDOR_SPOOL".to_string(),
                Some("/var/lib/condor/spool".to_string())
            )]
        );
    }

    #[test]
    fn test_merge_last_writer_wins() {
        let mut base = ConfigOverrides::new().with("SPOOL", "/a");
        let mut other = ConfigOverrides::new().with("SPOOL", "/b");
        other.set("SEC_CLIENT_INTEGRITY", None);

        base.merge(&other);
        assert_eq!(base.get("SPOOL"), Some("/b"));
        assert_eq!(base.get("SEC_CLIENT_INTEGRITY"), None);
        assert_eq!(base.iter().count(), 2);
    }

    #[test]
    fn test_from_env_vars_strips_prefix() {
        let vars = vec![
            ("_CONDOR_COLLECTOR_HOST".to_string(), "cm.example.org".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        let knobs = ConfigOverrides::from_env_vars(vars);
        assert_eq!(knobs.get("COLLECTOR_HOST"), Some("cm.example.org"));
        assert_eq!(knobs.iter().count(), 1);
    }
}
