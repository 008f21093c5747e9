//! Cluster connection settings for the CLI

use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::PathBuf;
use tracing::debug;

/// Get kubeconfig path
pub fn kubeconfig_path(override_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var("KUBECONFIG") {
        return Ok(PathBuf::from(path));
    }

    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".kube").join("config"))
}

/// Build a client from the kubeconfig, falling back to in-cluster settings
/// when no kubeconfig file exists
pub async fn kube_client(kubeconfig: Option<&str>, context: Option<&str>) -> Result<Client> {
    let path = kubeconfig_path(kubeconfig)?;

    let config = if path.exists() {
        debug!(path = %path.display(), context = ?context, "Loading kubeconfig");
        let kubeconfig = Kubeconfig::read_from(&path)
            .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
        let options = KubeConfigOptions {
            context: context.map(str::to_string),
            ..Default::default()
        };
        kube::Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .context("Failed to load kubeconfig context")?
    } else {
        debug!("No kubeconfig found, inferring cluster configuration");
        kube::Config::infer()
            .await
            .context("Failed to infer cluster configuration")?
    };

    Client::try_from(config).context("Failed to create Kubernetes client")
}
