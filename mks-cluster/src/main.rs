//! mks-cluster: command-line driver for the MKS cluster reconciler.
//!
//! Keeps the local record of one cluster in a JSON state file and applies
//! a JSON desired-state document against the Morpheus API:
//! - `apply` creates the cluster, or updates it against the stored state
//! - `refresh` reads the cluster back into the state file
//! - `import` adopts an existing cluster by id
//! - `destroy` removes the cluster

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mks_cluster::{
    ClusterSpec, ClusterState, HttpClient, MksClusterReconciler, Reconciler, ReconcilerConfig,
};

/// MKS cluster reconciler
#[derive(Parser, Debug)]
#[command(name = "mks-cluster", version, about)]
struct Args {
    /// Morpheus appliance URL (e.g., https://morpheus.example.com)
    #[arg(long, env = "MORPHEUS_URL")]
    url: String,

    /// Morpheus API access token
    #[arg(long, env = "MORPHEUS_TOKEN", hide_env_values = true)]
    token: String,

    /// Force the removal of the cluster on destroy
    #[arg(long, env = "MORPHEUS_FORCE_DELETE")]
    force_delete: bool,

    /// Local state file
    #[arg(long, default_value = "mks-cluster.state.json")]
    state: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or update the cluster to match a desired-state file
    Apply {
        /// Desired state (JSON)
        #[arg(long)]
        config: PathBuf,
    },
    /// Read the cluster back into the state file
    Refresh,
    /// Adopt an existing cluster by id
    Import {
        id: i64,
    },
    /// Remove the cluster
    Destroy,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mks_cluster=info,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let api = HttpClient::new(&args.url, &args.token).context("Failed to build API client")?;
    let config = ReconcilerConfig::default().with_force_delete(args.force_delete);
    let reconciler = MksClusterReconciler::new(Arc::new(api), config);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received SIGINT, cancelling operation");
            on_signal.cancel();
        }
    });

    info!("Morpheus endpoint: {}", args.url);

    match args.command {
        Command::Apply { config } => {
            let spec = load_spec(&config).await?;
            spec.validate()?;
            match load_state(&args.state).await? {
                Some(mut state) if state.id.is_some() => {
                    let res = reconciler.apply_desired(spec, &mut state, &cancel).await;
                    save_state(&args.state, &state).await?;
                    res.context("error updating cluster")?;
                }
                _ => {
                    let mut state = ClusterState::new(spec);
                    let res = reconciler.create(&mut state, &cancel).await;
                    // Keep the id even on failure so destroy can clean up.
                    save_state(&args.state, &state).await?;
                    res.context("error creating cluster")?;
                }
            }
        }
        Command::Refresh => {
            let Some(mut state) = load_state(&args.state).await? else {
                bail!("No state file at {}", args.state.display());
            };
            reconciler.read(&mut state, &cancel).await?;
            if state.id.is_none() {
                warn!("Cluster no longer exists; the next apply will recreate it");
            }
            save_state(&args.state, &state).await?;
        }
        Command::Import { id } => {
            let mut state = ClusterState::import(id);
            reconciler.read(&mut state, &cancel).await?;
            if state.id.is_none() {
                bail!("Cluster {} not found", id);
            }
            save_state(&args.state, &state).await?;
            info!(cluster_id = id, "Cluster imported");
        }
        Command::Destroy => {
            let Some(mut state) = load_state(&args.state).await? else {
                bail!("No state file at {}", args.state.display());
            };
            let res = reconciler.delete(&mut state, &cancel).await;
            save_state(&args.state, &state).await?;
            res.context("error deleting cluster")?;
        }
    }

    Ok(())
}

async fn load_spec(path: &Path) -> Result<ClusterSpec> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid desired state in {}", path.display()))
}

async fn load_state(path: &Path) -> Result<Option<ClusterState>> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw)
            .map(Some)
            .with_context(|| format!("Corrupt state file {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

async fn save_state(path: &Path, state: &ClusterState) -> Result<()> {
    let raw = serde_json::to_string_pretty(state)?;
    tokio::fs::write(path, raw)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
