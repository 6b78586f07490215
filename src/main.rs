use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use clap::Parser;
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;
use tracing::info;

use naiserator::cluster::{ClusterReader, StaticCluster};
use naiserator::config::Config;
use naiserator::resources::{application::Application, naisjob::Naisjob, skatteetaten};
use naiserator::synthesis::{self, Context, Synthesis};
use naiserator::{telemetry, Metrics};

#[derive(Debug, clap::Parser)]
#[command(about = "Render the operations that realize a workload manifest")]
struct Arguments {
    /// Application or Naisjob manifest, `-` for stdin
    manifest: PathBuf,

    /// Read cluster state from this YAML stream instead of the current kube context
    #[arg(long = "cluster-state", env = "NAISERATOR_CLUSTER_STATE", value_name = "FILE")]
    cluster_state: Option<PathBuf>,

    /// Print synthesis metrics to stderr when done
    #[arg(long = "print-metrics")]
    print_metrics: bool,

    #[command(flatten)]
    config: Config,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypeMeta {
    api_version: String,
    kind: String,
}

fn read(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        return Ok(std::io::read_to_string(std::io::stdin())?);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

async fn render<C: ClusterReader>(manifest: &str, ctx: &Context<C>) -> anyhow::Result<Synthesis> {
    let type_meta: TypeMeta = serde_yaml::from_str(manifest)?;
    let synthesis = match (type_meta.api_version.as_str(), type_meta.kind.as_str()) {
        ("nais.io/v1alpha1", "Application") => {
            let app: Application = serde_yaml::from_str(manifest)?;
            synthesis::synthesize_application(&app, ctx).await?
        }
        ("nais.io/v1alpha1", "Naisjob") => {
            let job: Naisjob = serde_yaml::from_str(manifest)?;
            synthesis::synthesize_naisjob(&job, ctx).await?
        }
        ("skatteetaten.no/v1alpha1", "Application") => {
            let app: skatteetaten::Application = serde_yaml::from_str(manifest)?;
            synthesis::synthesize_skatteetaten(&app, ctx).await?
        }
        (api_version, kind) => bail!("unsupported workload {api_version} {kind}"),
    };
    Ok(synthesis)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let args: Arguments = Arguments::parse();
    let config = Arc::new(args.config);
    let manifest = read(&args.manifest)?;

    let registry = Registry::new();
    let metrics = Metrics::default().register(&registry)?;

    let synthesis = match &args.cluster_state {
        Some(path) => {
            let cluster = StaticCluster::from_yaml(&read(path)?)?;
            info!("rendering against {}", path.display());
            render(&manifest, &Context::new(cluster, config, metrics)).await?
        }
        None => {
            let client = kube::Client::try_default().await?;
            render(&manifest, &Context::new(client, config, metrics)).await?
        }
    };
    print!("{}", serde_yaml::to_string(&synthesis)?);

    if args.print_metrics {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        encoder.encode(&registry.gather(), &mut buffer)?;
        eprint!("{}", String::from_utf8(buffer)?);
    }
    Ok(())
}
