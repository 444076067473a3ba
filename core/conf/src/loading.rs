//! Load configuration from files.
use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;

use crate::Conf;

/// Errors handling clustermap configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unable to decode configuration from file at the given path.
    #[error("unable to decode configuration from file at '{0}'")]
    // (path,)
    Decode(String),

    /// Unable to read configuration file at the given path.
    #[error("unable to read configuration file at '{0}'")]
    // (path,)
    Open(String),
}

/// Load process configuration from the specified path.
///
/// A missing file is not an error: the service runs with built-in defaults
/// (in-cluster credentials, port 8080). Unreadable or invalid files are fatal.
pub fn load(path: &str) -> Result<Conf> {
    if !PathBuf::from(path).exists() {
        return Ok(Conf::default());
    }

    let file = File::open(path).with_context(|| Error::Open(path.into()))?;
    let conf = serde_yaml::from_reader(file).with_context(|| Error::Decode(path.into()))?;
    Ok(conf)
}

#[cfg(test)]
mod tests {
    use super::load;

    #[test]
    fn missing_file_uses_defaults() {
        let conf = load("/definitely/not/a/clustermap.yaml").unwrap();
        assert_eq!(conf, crate::Conf::default());
    }
}
