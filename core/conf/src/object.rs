//! Data object storing the clustermap configuration.
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Global configuration for the clustermap process.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    /// Tag attached to records collected from the primary cluster.
    pub cluster_name: String,

    /// Additional sources of infrastructure state (secondary clusters, mounted files).
    pub data_sources: Vec<DataSource>,

    /// Path to the kubeconfig for the primary cluster (empty uses in-cluster credentials).
    pub kubeconfig: String,

    /// Process logging configuration.
    pub logging: LoggingConf,

    /// Port the HTTP API listens on.
    pub port: u16,

    /// Base interval between snapshot refreshes, in seconds.
    pub refresh_interval_sec: u64,

    /// Pull-through registry host (`host:port`) to rewrite OCI chart URLs around.
    pub registry_proxy: String,

    /// Process runtime configuration.
    pub runtime: RuntimeConf,

    /// Deprecated: path to a Terraform state file, replaced by `data_sources`.
    pub tfstate_path: Option<String>,
}

impl Default for Conf {
    fn default() -> Conf {
        Conf {
            cluster_name: String::from("Homelab"),
            data_sources: Vec::new(),
            kubeconfig: String::new(),
            logging: LoggingConf::default(),
            port: 8080,
            refresh_interval_sec: 300,
            registry_proxy: String::new(),
            runtime: RuntimeConf::default(),
            tfstate_path: None,
        }
    }
}

impl Conf {
    /// Configured data sources, with the deprecated `tfstate_path` option folded in.
    ///
    /// The legacy option only applies when no `data_sources` are configured at all.
    pub fn effective_data_sources(&self) -> Vec<DataSource> {
        if !self.data_sources.is_empty() {
            return self.data_sources.clone();
        }
        match &self.tfstate_path {
            Some(path) if !path.is_empty() => vec![DataSource {
                name: String::from("terraform"),
                kind: DataSourceKind::Tfstate,
                path: path.clone(),
            }],
            _ => Vec::new(),
        }
    }

    /// Base interval between snapshot refreshes.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_sec)
    }
}

/// An additional source of infrastructure state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    /// Name the source and its records are reported under.
    pub name: String,

    /// The kind of source to read.
    #[serde(rename = "type")]
    pub kind: DataSourceKind,

    /// Path to the source: a kubeconfig for clusters, the mounted file otherwise.
    pub path: String,
}

/// Supported kinds of additional data sources.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataSourceKind {
    /// A secondary Kubernetes cluster, read through its kubeconfig.
    Kubernetes,

    /// A Terraform state (v4 JSON) file.
    Tfstate,

    /// A Docker Compose manifest.
    DockerCompose,
}

/// Process logging configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConf {
    /// Minimum level for emitted log events.
    pub level: LogLevel,

    /// Format log events for humans or for log aggregators.
    pub mode: LogMode,
}

impl Default for LoggingConf {
    fn default() -> LoggingConf {
        LoggingConf {
            level: LogLevel::Info,
            mode: LogMode::Terminal,
        }
    }
}

/// Minimum level for emitted log events.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<LogLevel> for slog::Level {
    fn from(level: LogLevel) -> slog::Level {
        match level {
            LogLevel::Debug => slog::Level::Debug,
            LogLevel::Info => slog::Level::Info,
            LogLevel::Warning => slog::Level::Warning,
            LogLevel::Error => slog::Level::Error,
        }
    }
}

/// Format log events for humans or for log aggregators.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    /// Human friendly terminal output.
    Terminal,

    /// One JSON encoded event per line.
    Json,
}

/// Process runtime configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConf {
    /// Seconds the HTTP server is given to drain connections on shutdown.
    pub shutdown_grace_sec: u64,
}

impl Default for RuntimeConf {
    fn default() -> RuntimeConf {
        RuntimeConf {
            shutdown_grace_sec: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Conf;
    use super::DataSourceKind;

    #[test]
    fn defaults() {
        let conf = Conf::default();
        assert_eq!(conf.cluster_name, "Homelab");
        assert_eq!(conf.port, 8080);
        assert_eq!(conf.refresh_interval_sec, 300);
        assert!(conf.data_sources.is_empty());
    }

    #[test]
    fn decode_data_sources() {
        let conf: Conf = serde_yaml::from_str(
            r#"
            cluster_name: Lab
            data_sources:
              - name: nas
                type: kubernetes
                path: /secrets/nas.kubeconfig
              - name: proxmox
                type: tfstate
                path: /mnt/terraform.tfstate
              - name: media
                type: docker-compose
                path: /mnt/compose.yaml
            "#,
        )
        .unwrap();
        assert_eq!(conf.data_sources.len(), 3);
        assert_eq!(conf.data_sources[0].kind, DataSourceKind::Kubernetes);
        assert_eq!(conf.data_sources[1].kind, DataSourceKind::Tfstate);
        assert_eq!(conf.data_sources[2].kind, DataSourceKind::DockerCompose);
    }

    #[test]
    fn legacy_tfstate_synthesised() {
        let conf: Conf = serde_yaml::from_str("tfstate_path: /mnt/terraform.tfstate").unwrap();
        let sources = conf.effective_data_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "terraform");
        assert_eq!(sources[0].kind, DataSourceKind::Tfstate);
        assert_eq!(sources[0].path, "/mnt/terraform.tfstate");
    }

    #[test]
    fn legacy_tfstate_ignored_with_sources() {
        let conf: Conf = serde_yaml::from_str(
            r#"
            tfstate_path: /mnt/terraform.tfstate
            data_sources:
              - name: nas
                type: kubernetes
                path: /secrets/nas.kubeconfig
            "#,
        )
        .unwrap();
        let sources = conf.effective_data_sources();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].name, "nas");
    }
}
