//! Appliance versions and release streams

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::{Error, Result};

/// Version of an appliance build
///
/// Either a dotted numeric release (`5.10.0.3`) or `master`, the upstream
/// build, which sorts above every release.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ApplianceVersion {
    Release(Vec<u32>),
    Upstream,
}

impl ApplianceVersion {
    /// Parse a version string
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("master") || raw.eq_ignore_ascii_case("upstream") {
            return Ok(ApplianceVersion::Upstream);
        }

        let parts = raw
            .split('.')
            .map(|p| p.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidVersion(raw.to_string()))?;

        if parts.is_empty() {
            return Err(Error::InvalidVersion(raw.to_string()));
        }

        Ok(ApplianceVersion::Release(parts))
    }

    /// Release stream this version belongs to
    pub fn stream(&self) -> String {
        match self {
            ApplianceVersion::Upstream => "upstream".to_string(),
            ApplianceVersion::Release(parts) => {
                let major = parts.first().copied().unwrap_or_default();
                let minor = parts.get(1).copied().unwrap_or_default();
                format!("downstream-{}{}z", major, minor)
            }
        }
    }

    pub fn is_upstream(&self) -> bool {
        matches!(self, ApplianceVersion::Upstream)
    }

    /// Compare against a version literal such as `"5.10"`.
    ///
    /// Literals that fail to parse compare as lower than anything.
    pub fn at_least(&self, other: &str) -> bool {
        match ApplianceVersion::parse(other) {
            Ok(other) => *self >= other,
            Err(_) => true,
        }
    }
}

/// Release parts with trailing zeros dropped, so `5.10` and `5.10.0.0` agree
fn significant(parts: &[u32]) -> &[u32] {
    let len = parts.iter().rposition(|p| *p != 0).map_or(0, |i| i + 1);
    &parts[..len]
}

impl PartialEq for ApplianceVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ApplianceVersion {}

impl Hash for ApplianceVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            ApplianceVersion::Upstream => state.write_u8(1),
            ApplianceVersion::Release(parts) => {
                state.write_u8(0);
                significant(parts).hash(state);
            }
        }
    }
}

impl Ord for ApplianceVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ApplianceVersion::Upstream, ApplianceVersion::Upstream) => Ordering::Equal,
            (ApplianceVersion::Upstream, _) => Ordering::Greater,
            (_, ApplianceVersion::Upstream) => Ordering::Less,
            (ApplianceVersion::Release(a), ApplianceVersion::Release(b)) => {
                // Missing trailing components count as zero: 5.10 == 5.10.0
                let len = a.len().max(b.len());
                for i in 0..len {
                    let x = a.get(i).copied().unwrap_or(0);
                    let y = b.get(i).copied().unwrap_or(0);
                    match x.cmp(&y) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                Ordering::Equal
            }
        }
    }
}

impl PartialOrd for ApplianceVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ApplianceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplianceVersion::Upstream => write!(f, "master"),
            ApplianceVersion::Release(parts) => {
                let joined: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
                write!(f, "{}", joined.join("."))
            }
        }
    }
}

impl FromStr for ApplianceVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ApplianceVersion::parse(s)
    }
}

impl TryFrom<String> for ApplianceVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        ApplianceVersion::parse(&value)
    }
}

impl From<ApplianceVersion> for String {
    fn from(v: ApplianceVersion) -> Self {
        v.to_string()
    }
}

/// Choose a value by the highest version key not above `version`.
///
/// Entries are `(minimum version, value)`; `None` as the key is the lowest
/// possible version. Returns `None` when no entry applies.
pub fn pick<'a, T>(version: &ApplianceVersion, entries: &'a [(Option<&str>, T)]) -> Option<&'a T> {
    let mut best: Option<(Option<ApplianceVersion>, &'a T)> = None;

    for (key, value) in entries {
        let key = match key {
            None => None,
            Some(raw) => match ApplianceVersion::parse(raw) {
                Ok(v) => Some(v),
                Err(_) => continue,
            },
        };

        if let Some(k) = &key {
            if k > version {
                continue;
            }
        }

        let better = match &best {
            None => true,
            Some((None, _)) => key.is_some(),
            Some((Some(current), _)) => key.as_ref().map(|k| k > current).unwrap_or(false),
        };
        if better {
            best = Some((key, value));
        }
    }

    best.map(|(_, v)| v)
}
