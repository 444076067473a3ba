//! clustermap server initialisation as a builder.
use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::DefaultHeaders;
use actix_web::web::Data;
use actix_web::App;
use actix_web::HttpServer;
use anyhow::Context as AnyContext;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

use clustermap_conf::Conf;
use clustermap_conf::DataSourceKind;
use clustermap_context::Context;
use clustermap_fresh::ChartsCache;
use clustermap_fresh::GithubClient;
use clustermap_fresh::ImagesCache;
use clustermap_fresh::NodesCache;
use clustermap_fresh::RegistryClient;
use clustermap_refresh::FileSpec;
use clustermap_refresh::Refresher;
use clustermap_refresh::RefresherSetup;
use clustermap_source_file::FileKind;
use clustermap_source_kube::ClusterSource;
use clustermap_source_kube::KubeApi;
use clustermap_store::SnapshotStore;

use crate::telemetry::Telemetry;

/// Process builder to initialise and run a clustermap server instance.
pub struct Server {
    conf: Conf,
    telemetry: Telemetry,
}

impl Server {
    /// Build a server from the loaded configuration.
    pub async fn configure(conf: Conf) -> Result<Server> {
        let telemetry = crate::telemetry::initialise(&conf.logging)?;
        slog::info!(telemetry.logger, "Process telemetry initialised");
        Ok(Server { conf, telemetry })
    }

    /// Finalise process initialisation and run the clustermap server.
    pub async fn run(self) -> Result<()> {
        let conf = self.conf;
        let cancel = CancellationToken::new();
        let context = Context::root(self.telemetry.logger.clone(), cancel.clone()).build();

        // The primary cluster is required: failing to reach its credentials
        // is a fatal configuration error.
        let primary_api = KubeApi::connect(&conf.kubeconfig)
            .await
            .context("unable to connect to the primary cluster")?;
        let primary = ClusterSource::new(conf.cluster_name.clone(), Arc::new(primary_api));

        // Additional sources: secondary clusters and mounted files.
        let mut secondaries = Vec::new();
        let mut files = Vec::new();
        for source in conf.effective_data_sources() {
            match source.kind {
                DataSourceKind::Kubernetes => match KubeApi::connect(&source.path).await {
                    Ok(api) => {
                        secondaries.push(ClusterSource::new(source.name, Arc::new(api)));
                    }
                    Err(error) => {
                        slog::warn!(
                            context.logger, "Unable to connect secondary cluster, skipping";
                            "cluster" => &source.name,
                            "error" => %error,
                        );
                    }
                },
                DataSourceKind::Tfstate => files.push(FileSpec {
                    name: source.name,
                    kind: FileKind::Tfstate,
                    path: source.path,
                }),
                DataSourceKind::DockerCompose => files.push(FileSpec {
                    name: source.name,
                    kind: FileKind::DockerCompose,
                    path: source.path,
                }),
            }
        }

        let store = SnapshotStore::new();
        let refresher = Refresher::new(RefresherSetup {
            charts: ChartsCache::new(
                RegistryClient::new()?,
                conf.registry_proxy.clone(),
                conf.refresh_interval(),
            ),
            files,
            images: ImagesCache::new(RegistryClient::new()?),
            interval: conf.refresh_interval(),
            nodes: NodesCache::new(GithubClient::new()?),
            primary,
            secondaries,
            store: store.clone(),
        });
        let refresh_loop = {
            let refresher = refresher.clone();
            let context = context.clone();
            tokio::spawn(async move { refresher.run(&context).await })
        };

        // The HTTP shell: read-only API with permissive CORS.
        let store_data = Data::new(store);
        let metrics_data = Data::new(self.telemetry.metrics.clone());
        let grace = Duration::from_secs(conf.runtime.shutdown_grace_sec);
        let server = HttpServer::new(move || {
            App::new()
                .app_data(store_data.clone())
                .app_data(metrics_data.clone())
                .wrap(
                    DefaultHeaders::new()
                        .add(("Access-Control-Allow-Origin", "*"))
                        .add(("Access-Control-Allow-Methods", "GET, OPTIONS")),
                )
                .configure(crate::api::configure)
        })
        .bind(("0.0.0.0", conf.port))
        .with_context(|| format!("unable to bind API server on port {}", conf.port))?
        .shutdown_timeout(grace.as_secs())
        .disable_signals()
        .run();
        let server_handle = server.handle();
        let mut server_task = tokio::spawn(server);
        slog::info!(
            context.logger, "API server listening for connections";
            "port" => conf.port,
        );

        // Wait for a shutdown signal (or an unexpected server exit), then
        // cancel in-flight work and drain the HTTP server.
        tokio::select! {
            _ = shutdown_signal() => {
                slog::info!(context.logger, "Shutdown signal received, draining");
                cancel.cancel();
                server_handle.stop(true).await;
                let _ = (&mut server_task).await;
            }
            result = &mut server_task => {
                cancel.cancel();
                result.context("API server task failed")??;
            }
        }
        let _ = refresh_loop.await;
        slog::info!(context.logger, "clustermap process stopped");
        Ok(())
    }
}

/// Resolve when the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => (),
            _ = terminate.recv() => (),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
