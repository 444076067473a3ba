//! Run the clustermap server.
use anyhow::Result;

use clustermap_conf::Conf;

use super::Cli;
use crate::init::Server;

/// Run the clustermap observability server.
pub async fn run(_cli: Cli, conf: Conf) -> Result<()> {
    Server::configure(conf).await?.run().await
}
