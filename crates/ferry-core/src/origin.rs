//! Listen-origin allowlist entries.
//!
//! An [`OriginPattern`] is either a literal origin compared byte-for-byte or
//! a regular expression searched anywhere in the origin. Patterns are written
//! by the embedder; anchor them (`^https://app\.example$`) when a partial
//! match would be too broad.
//!
//! Serialized form: a literal is a JSON string, a pattern is
//! `{"pattern": "<regex>"}`.

use std::fmt;

use regex::Regex;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

/// One accepted listen origin.
#[derive(Clone, Debug)]
pub enum OriginPattern {
    /// Origin must equal this string exactly.
    Exact(String),
    /// Origin must contain a match for this regex.
    Pattern(Regex),
}

impl OriginPattern {
    /// Literal origin.
    pub fn exact(origin: impl Into<String>) -> Self {
        Self::Exact(origin.into())
    }

    /// Compile a regex pattern.
    pub fn pattern(re: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern(Regex::new(re)?))
    }

    /// Whether `origin` is accepted by this entry.
    pub fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Exact(expected) => expected == origin,
            Self::Pattern(re) => re.is_match(origin),
        }
    }
}

impl PartialEq for OriginPattern {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Exact(a), Self::Exact(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl Eq for OriginPattern {}

impl fmt::Display for OriginPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(origin) => f.write_str(origin),
            Self::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for OriginPattern {
    fn from(origin: &str) -> Self {
        Self::exact(origin)
    }
}

impl From<String> for OriginPattern {
    fn from(origin: String) -> Self {
        Self::Exact(origin)
    }
}

impl From<Regex> for OriginPattern {
    fn from(re: Regex) -> Self {
        Self::Pattern(re)
    }
}

impl Serialize for OriginPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Exact(origin) => serializer.serialize_str(origin),
            Self::Pattern(re) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("pattern", re.as_str())?;
                map.end()
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOriginPattern {
    Exact(String),
    Pattern { pattern: String },
}

impl<'de> Deserialize<'de> for OriginPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawOriginPattern::deserialize(deserializer)? {
            RawOriginPattern::Exact(origin) => Ok(Self::Exact(origin)),
            RawOriginPattern::Pattern { pattern } => Self::pattern(&pattern)
                .map_err(|e| de::Error::custom(format!("invalid origin pattern: {e}"))),
        }
    }
}

/// Deserialize a single entry or a list of entries into a `Vec`.
///
/// Use with `#[serde(deserialize_with = "one_or_many")]`.
pub fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<OriginPattern>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(OriginPattern),
        Many(Vec<OriginPattern>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(p)) => vec![p],
        Some(OneOrMany::Many(ps)) => ps,
    })
}
