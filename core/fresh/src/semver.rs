//! Semantic version parsing and ordering for registry tags.
//!
//! Registry tags are not strict semver: two component versions (`1.25`) are
//! common and a leading `v` is everywhere. Parsing accepts both, ordering is
//! lexicographic on the `(major, minor, patch)` triple with pre-release
//! versions sorting below their release.
use std::cmp::Ordering;

/// A parsed version: two or three numeric components plus an optional pre-release.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,

    /// Pre-release (or build metadata) segment after the first `-` or `+`.
    pub pre: Option<String>,
}

impl Version {
    /// Parse a version string, tolerating a leading `v`.
    ///
    /// Returns `None` unless the core is two or three dot-separated integers.
    pub fn parse(version: &str) -> Option<Version> {
        let version = version.strip_prefix('v').unwrap_or(version);
        let (core, pre) = match version.find(['-', '+']) {
            Some(index) => (&version[..index], Some(version[index + 1..].to_string())),
            None => (version, None),
        };
        let mut components = core.split('.');
        let major = components.next()?.parse().ok()?;
        let minor = components.next()?.parse().ok()?;
        let patch = match components.next() {
            Some(patch) => patch.parse().ok()?,
            None => 0,
        };
        if components.next().is_some() {
            return None;
        }
        Some(Version {
            major,
            minor,
            patch,
            pre,
        })
    }

    /// Whether this version carries a pre-release segment.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Version) -> Ordering {
        let triple = (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch));
        if triple != Ordering::Equal {
            return triple;
        }
        // A pre-release sorts below the release it precedes.
        match (&self.pre, &other.pre) {
            (None, None) => Ordering::Equal,
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(a), Some(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Version) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
