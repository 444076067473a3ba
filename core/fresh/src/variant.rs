//! Variant aware tag selection for container images.
//!
//! Image tags embed a semantic version inside arbitrary framing, for example
//! `1.20-alpine` or `v2.1.0-ls123`. The framing is the tag's *variant*: only
//! candidate tags with the same `(prefix, suffix)` around their version are
//! comparable upgrades for a deployed tag.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::semver::Version;

/// Sentinel reported when no freshness information is available.
pub const UNKNOWN: &str = "-";

/// Matches the earliest embedded `major.minor[.patch]` substring in a tag.
static EMBEDDED_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)(\d+\.\d+(?:\.\d+)?)(.*)$").expect("EMBEDDED_VERSION regex must compile")
});

/// A tag split around its embedded semantic version.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TagVariant {
    pub prefix: String,
    pub version: Version,
    pub suffix: String,
}

impl TagVariant {
    /// Split a tag around its embedded version, if it has one.
    pub fn parse(tag: &str) -> Option<TagVariant> {
        let captures = EMBEDDED_VERSION.captures(tag)?;
        let version = Version::parse(&captures[2])?;
        Some(TagVariant {
            prefix: captures[1].to_string(),
            version,
            suffix: captures[3].to_string(),
        })
    }

    /// Whether another tag shares this tag's framing.
    fn same_variant(&self, other: &TagVariant) -> bool {
        self.prefix == other.prefix && self.suffix == other.suffix
    }
}

/// Pick the highest candidate tag sharing the deployed tag's variant.
///
/// Candidates with a pre-release segment never compete: the segment lands in
/// their suffix (`1.1.0-rc1` frames as suffix `-rc1`), so the exact variant
/// match already excludes them. When no candidate beats the deployed tag the
/// deployed tag is returned; when the deployed tag embeds no version at all
/// the [`UNKNOWN`] sentinel is.
pub fn highest_matching_tag(deployed: &str, candidates: &[String]) -> String {
    let deployed_variant = match TagVariant::parse(deployed) {
        Some(variant) => variant,
        None => return UNKNOWN.to_string(),
    };

    let mut best_tag = deployed.to_string();
    let mut best_version = deployed_variant.version.clone();
    for candidate in candidates {
        let variant = match TagVariant::parse(candidate) {
            Some(variant) => variant,
            None => continue,
        };
        if !variant.same_variant(&deployed_variant) {
            continue;
        }
        if variant.version > best_version {
            best_version = variant.version;
            best_tag = candidate.clone();
        }
    }
    best_tag
}

#[cfg(test)]
mod tests {
    use super::highest_matching_tag;
    use super::TagVariant;
    use super::UNKNOWN;

    fn tags(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|tag| tag.to_string()).collect()
    }

    #[test]
    fn variant_split() {
        let variant = TagVariant::parse("v1.2.3-alpine").unwrap();
        assert_eq!(variant.prefix, "v");
        assert_eq!(variant.suffix, "-alpine");
        assert_eq!(
            (variant.version.major, variant.version.minor, variant.version.patch),
            (1, 2, 3),
        );
        assert!(TagVariant::parse("latest").is_none());
    }

    #[test]
    fn same_variant_preferred() {
        let result = highest_matching_tag(
            "1.20-alpine",
            &tags(&["1.21-alpine", "1.21", "1.22-slim"]),
        );
        assert_eq!(result, "1.21-alpine");
    }

    // A pre-release segment frames as part of the suffix, so the variant
    // match keeps such candidates away from release tags.
    #[test]
    fn prerelease_candidates_skipped() {
        let result = highest_matching_tag("1.0.0", &tags(&["1.0.1", "1.1.0-rc1"]));
        assert_eq!(result, "1.0.1");
    }

    #[test]
    fn prerelease_deployed_tag_stays_in_its_line() {
        let result = highest_matching_tag("1.0.0-rc1", &tags(&["1.0.0", "1.0.1"]));
        assert_eq!(result, "1.0.0-rc1");
    }

    #[test]
    fn no_upgrade_returns_deployed() {
        let result = highest_matching_tag("2.5.0", &tags(&["2.4.0", "1.0.0"]));
        assert_eq!(result, "2.5.0");
    }

    #[test]
    fn versionless_tag_is_unknown() {
        assert_eq!(highest_matching_tag("latest", &tags(&["1.0.0"])), UNKNOWN);
    }

    #[test]
    fn prefixed_variants_stay_separate() {
        let result = highest_matching_tag("v1.4.0", &tags(&["1.6.0", "v1.5.0"]));
        assert_eq!(result, "v1.5.0");
    }

    #[test]
    fn two_component_versions_compared() {
        let result = highest_matching_tag("1.25", &tags(&["1.26", "1.9"]));
        assert_eq!(result, "1.26");
    }
}
