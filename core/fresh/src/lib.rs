//! Version freshness caches and the upstream registry clients feeding them.
//!
//! Three background checked caches enrich snapshots with "is this the latest
//! version" information:
//!
//! - [`ChartsCache`]: latest chart version per `(repoURL, chart)`, from OCI
//!   registries and Helm HTTP repository indexes.
//! - [`ImagesCache`]: latest image tag per `(image, deployed tag)`, variant
//!   aware so `1.20-alpine` only upgrades to another `-alpine` tag.
//! - [`NodesCache`]: latest OS release per distribution and latest kubelet
//!   patch per minor line, from the GitHub Releases API.
//!
//! All three are single-flight and time gated, write their entries
//! incrementally for concurrent readers, and treat every upstream failure as
//! "no data" (the `-` sentinel) rather than an error: freshness is advisory
//! and must never break a refresh.
mod charts;
mod gate;
mod github;
mod helm;
mod images;
mod nodes;
mod registry;
mod semver;
mod variant;

pub use self::charts::ChartRef;
pub use self::charts::ChartsCache;
pub use self::github::GithubClient;
pub use self::images::ImagesCache;
pub use self::nodes::kubelet_minor;
pub use self::nodes::os_outdated;
pub use self::nodes::os_version;
pub use self::nodes::NodesCache;
pub use self::nodes::NodeVersions;
pub use self::registry::is_rate_limited;
pub use self::registry::parse_bearer_challenge;
pub use self::registry::BearerChallenge;
pub use self::registry::BodyTooLarge;
pub use self::registry::RateLimited;
pub use self::registry::RegistryClient;
pub use self::semver::Version;
pub use self::variant::highest_matching_tag;
pub use self::variant::TagVariant;
pub use self::variant::UNKNOWN;
