//! Job identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::RecordKey;
use super::value::Value;

/// A job in a schedd queue, `cluster.proc`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId {
    pub cluster: i64,
    pub proc: i64,
}

impl JobId {
    pub fn new(cluster: i64, proc: i64) -> Self {
        Self { cluster, proc }
    }

    /// Recover a job id from a `(ClusterId, ProcId)` record key
    pub fn from_key(key: &RecordKey) -> Option<Self> {
        match key.parts() {
            [Value::Integer(cluster), Value::Integer(proc)] => Some(Self::new(*cluster, *proc)),
            _ => None,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.cluster, self.proc)
    }
}

impl FromStr for JobId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cluster, proc) = s
            .split_once('.')
            .ok_or_else(|| format!("job id '{}' is not of the form cluster.proc", s))?;
        let cluster = cluster
            .parse()
            .map_err(|_| format!("invalid cluster in job id '{}'", s))?;
        let proc = proc
            .parse()
            .map_err(|_| format!("invalid proc in job id '{}'", s))?;
        Ok(Self { cluster, proc })
    }
}

impl From<JobId> for RecordKey {
    fn from(id: JobId) -> Self {
        RecordKey::from((id.cluster, id.proc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let id: JobId = "1234.7".parse().unwrap();
        assert_eq!(id, JobId::new(1234, 7));
        assert_eq!(id.to_string(), "1234.7");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("1234".parse::<JobId>().is_err());
        assert!("a.b".parse::<JobId>().is_err());
    }

    #[test]
    fn test_round_trip_through_key() {
        let id = JobId::new(100, 1);
        assert_eq!(JobId::from_key(&RecordKey::from(id)), Some(id));
        assert_eq!(JobId::from_key(&RecordKey::from("x")), None);
    }
}
