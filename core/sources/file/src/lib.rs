//! Side-channel infrastructure file sources.
//!
//! Terraform states and Docker Compose manifests are mounted into the process
//! and re-read on every refresh. A missing or empty file is not an error: the
//! source simply contributes nothing to the snapshot this cycle.
use anyhow::Context as AnyContext;
use anyhow::Result;

use clustermap_context::Context;
use clustermap_context::ShutdownInterrupt;
use clustermap_models::InfraPayload;
use clustermap_models::InfraSource;

mod compose;
mod terraform;

pub use self::compose::parse_compose;
pub use self::terraform::parse_tfstate;

/// The file formats a mounted source can be read as.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FileKind {
    Tfstate,
    DockerCompose,
}

/// Errors reading infrastructure source files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Unable to parse the file as the declared format.
    #[error("unable to parse infrastructure source file at '{0}'")]
    // (path,)
    Parse(String),

    /// Unable to read the file from disk.
    #[error("unable to read infrastructure source file at '{0}'")]
    // (path,)
    Read(String),
}

/// Read and parse one mounted infrastructure file.
///
/// Returns `Ok(None)` when the file is missing or empty so callers can skip
/// the source without treating it as a failure.
pub async fn read(context: &Context, name: &str, kind: FileKind, path: &str) -> Result<Option<InfraSource>> {
    let raw = tokio::select! {
        biased;
        _ = context.cancel.cancelled() => return Err(ShutdownInterrupt.into()),
        raw = tokio::fs::read_to_string(path) => raw,
    };
    let raw = match raw {
        Ok(raw) => raw,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(error) => {
            return Err(anyhow::Error::from(error).context(Error::Read(path.into())));
        }
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let payload = match kind {
        FileKind::Tfstate => {
            let state = parse_tfstate(&raw).with_context(|| Error::Parse(path.into()))?;
            InfraPayload::Tfstate(state)
        }
        FileKind::DockerCompose => {
            let compose = parse_compose(&raw).with_context(|| Error::Parse(path.into()))?;
            InfraPayload::DockerCompose(compose)
        }
    };
    let source = InfraSource {
        name: name.to_string(),
        payload,
    };
    Ok(Some(source))
}
