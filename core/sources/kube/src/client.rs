//! Cluster API backend speaking to real clusters through the `kube` client.
use anyhow::Context as AnyContext;
use anyhow::Result;
use kube::api::Api;
use kube::api::ApiResource;
use kube::api::DynamicObject;
use kube::api::ListParams;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::core::GroupVersionKind;
use kube::Client;
use kube::Config;
use serde_json::Value as Json;

use clustermap_context::Context;
use clustermap_context::ShutdownInterrupt;

use crate::api::ClusterApi;
use crate::api::KindNotInstalled;
use crate::api::ResourceKind;

/// [`ClusterApi`] backend for real clusters, using the dynamic object API.
pub struct KubeApi {
    client: Client,
}

impl KubeApi {
    /// Connect to a cluster.
    ///
    /// An empty kubeconfig path uses the ambient configuration: in-cluster
    /// service account credentials or the local default kubeconfig.
    pub async fn connect(kubeconfig: &str) -> Result<KubeApi> {
        let config = match kubeconfig {
            "" => Config::infer()
                .await
                .context("unable to infer cluster credentials")?,
            path => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("unable to read kubeconfig at '{}'", path))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .with_context(|| format!("unable to load kubeconfig at '{}'", path))?
            }
        };
        let client = Client::try_from(config).context("unable to initialise cluster client")?;
        Ok(KubeApi { client })
    }
}

#[async_trait::async_trait]
impl ClusterApi for KubeApi {
    async fn list(&self, context: &Context, kind: &ResourceKind) -> Result<Vec<Json>> {
        let gvk = GroupVersionKind::gvk(kind.group, kind.version, kind.kind);
        let resource = ApiResource::from_gvk_with_plural(&gvk, kind.plural);
        let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &resource);

        let list_params = ListParams::default();
        let response = tokio::select! {
            biased;
            _ = context.cancel.cancelled() => return Err(ShutdownInterrupt.into()),
            response = api.list(&list_params) => response,
        };
        let list = match response {
            Ok(list) => list,
            Err(kube::Error::Api(response)) if response.code == 404 => {
                let kind = kind.kind.to_string();
                return Err(KindNotInstalled { kind }.into());
            }
            Err(error) => return Err(error.into()),
        };

        let mut objects = Vec::with_capacity(list.items.len());
        for item in list.items {
            let object = serde_json::to_value(item)?;
            objects.push(object);
        }
        Ok(objects)
    }
}
