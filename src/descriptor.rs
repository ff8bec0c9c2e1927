//! Name + version-range selectors.
//!
//! A descriptor picks one or more agents out of a family. Grammar: `NAME[:[FROM][..[TO]]]`
//!
//! - `Albert` selects the latest version of `Albert` only.
//! - `Albert:` selects every version of `Albert`.
//! - `Albert:2` selects version 2, `Albert:-1` the latest, `Albert:-2` the one before.
//! - `Albert:1..3`, `Albert:..-2`, `Albert:1..` select ranges (open sides default to the first
//!   and the latest version).
//! - An empty name (`:` or the empty string) selects every agent.
//!
//! Negative bounds count backward from the last version of the family being tested, so they are
//! resolved at match time and never stored in resolved form.
//!
//! Malformed numbers are read as `0`, no error is reported.

use std::fmt::Display;
use std::str::FromStr;

/// A parsed selector. Bounds are kept unresolved (see [`Descriptor::resolve`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    /// Agent name, empty for "any agent".
    pub name: String,
    /// Lower bound, negative values are relative to the last version.
    pub version_from: i64,
    /// Upper bound, negative values are relative to the last version.
    pub version_to: i64,
}

impl Descriptor {
    /// Parses a descriptor string. Never fails.
    pub fn parse(s: &str) -> Descriptor {
        // anything after a second colon is ignored
        let mut segments = s.split(':');
        let name = segments.next().unwrap_or_default();
        let range = segments.next();

        let (version_from, version_to) = match range {
            // no colon: latest version only
            None => (-1, -1),
            Some(range) => match range.split_once("..") {
                None if range.is_empty() => (0, -1),
                None => {
                    let version = parse_version(range);
                    (version, version)
                }
                Some((from, to)) => {
                    let from = if from.is_empty() { 0 } else { parse_version(from) };
                    let to = if to.is_empty() { -1 } else { parse_version(to) };
                    (from, to)
                }
            },
        };

        Descriptor {
            name: name.to_owned(),
            version_from,
            version_to,
        }
    }

    /// Descriptor selecting exactly `name` at `version`.
    pub fn exact(name: &str, version: u32) -> Descriptor {
        Descriptor {
            name: name.to_owned(),
            version_from: version as i64,
            version_to: version as i64,
        }
    }

    /// True for the empty-name descriptor that selects everything.
    pub fn is_wildcard(&self) -> bool {
        self.name.is_empty()
    }

    /// Resolves both bounds against the last version of a family.
    pub fn resolve(&self, last_version: u32) -> (i64, i64) {
        (
            actual_version(self.version_from, last_version),
            actual_version(self.version_to, last_version),
        )
    }

    /// Whether an agent `name`/`version` whose family currently ends at `last_version` is selected.
    pub fn matches(&self, name: &str, version: u32, last_version: u32) -> bool {
        if self.is_wildcard() {
            return true;
        }
        let (from, to) = self.resolve(last_version);
        let version = version as i64;
        self.name == name && from <= version && version <= to
    }
}

fn actual_version(version: i64, last_version: u32) -> i64 {
    if version < 0 {
        last_version as i64 + version + 1
    } else {
        version
    }
}

fn parse_version(token: &str) -> i64 {
    token.trim().parse().unwrap_or(0)
}

impl FromStr for Descriptor {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Descriptor::parse(s))
    }
}

impl Display for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.version_from, self.version_to) {
            (-1, -1) => write!(f, "{}", self.name),
            (0, -1) => write!(f, "{}:", self.name),
            (from, to) if from == to => write!(f, "{}:{from}", self.name),
            (from, to) => write!(f, "{}:{from}..{to}", self.name),
        }
    }
}
