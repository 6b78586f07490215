//! Resolving everything generators need to know beyond the workload spec itself.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Namespace;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, instrument, warn};

use crate::cluster::{get_with_timeout, list_with_timeout, ClusterReader};
use crate::config::Config;
use crate::generators::google::sql;
use crate::resources::application::Application;
use crate::resources::cnrm::{SQLInstance, PROJECT_ID_ANNOTATION};
use crate::resources::nais_io_v1::Gcp;
use crate::resources::naisjob::Naisjob;
use crate::resources::skatteetaten;
use crate::source::{AzureSource, IdPortenSource, ReplicaSource, Source, TEAM_LABEL};
use crate::{Error, Result};

pub const MESH_INJECTION_ANNOTATION: &str = "linkerd.io/inject";
/// Set on an Application to accept redirects from other namespaces; a comma separated list or `*`
pub const ALLOW_REDIRECT_ANNOTATION: &str = "nais.io/allow-redirect-from";

const SQL_PASSWORD_LENGTH: usize = 32;

/// Static configuration plus facts about the live cluster, fixed for one synthesis run.
#[derive(Clone, Debug)]
pub struct Options {
    pub config: Arc<Config>,
    /// Replicas to stamp on the rollout
    pub num_replicas: i32,
    pub team: String,
    /// GCP project bound to the namespace
    pub google_team_project_id: Option<String>,
    pub mesh_injected: bool,
    pub wonderwall_enabled: bool,
    /// Disk size in GB of SQL instances already in the namespace, by instance name
    pub existing_sql_disk_sizes: BTreeMap<String, i32>,
    /// (namespace, application) pairs that accept our redirects
    pub allowed_redirect_targets: BTreeSet<(String, String)>,
    /// Passwords for new CloudSQL user secrets, by secret name
    pub sql_user_passwords: BTreeMap<String, String>,
}

impl Options {
    pub fn new(config: Arc<Config>) -> Self {
        Options {
            config,
            num_replicas: 1,
            team: String::new(),
            google_team_project_id: None,
            mesh_injected: false,
            wonderwall_enabled: false,
            existing_sql_disk_sizes: BTreeMap::new(),
            allowed_redirect_targets: BTreeSet::new(),
            sql_user_passwords: BTreeMap::new(),
        }
    }

    fn timeout(&self) -> Duration {
        self.config.cluster_read_timeout
    }
}

/// Replicas for a new rollout.
///
/// Explicit scale to zero always wins. Otherwise a live deployment keeps its
/// count as long as it is above the minimum, so a reconcile never undoes what
/// the autoscaler has done.
pub fn num_replicas(min: i32, max: i32, live: Option<i32>) -> i32 {
    if min == 0 && max == 0 {
        return 0;
    }
    match live {
        Some(live) => min.max(live),
        None => min,
    }
}

fn team(source: &impl Source) -> Result<String> {
    match source.labels().get(TEAM_LABEL) {
        Some(team) if !team.is_empty() => Ok(team.clone()),
        _ => Err(Error::InvalidConfiguration(format!(
            "the '{TEAM_LABEL}' label must be set"
        ))),
    }
}

async fn live_replicas<C: ClusterReader>(
    cluster: &C,
    timeout: Duration,
    source: &impl Source,
) -> Result<Option<i32>> {
    let namespace = source.namespace();
    let deployment: Option<Deployment> =
        get_with_timeout(cluster, timeout, Some(&namespace), &source.name()).await?;
    // the api server defaults replicas to 1
    Ok(deployment.map(|d| d.spec.and_then(|s| s.replicas).unwrap_or(1)))
}

async fn resolve_replicas<C: ClusterReader>(
    options: &mut Options,
    cluster: &C,
    source: &impl ReplicaSource,
) -> Result<()> {
    let replicas = source.replicas();
    let live = live_replicas(cluster, options.timeout(), source).await?;
    options.num_replicas = num_replicas(
        replicas.min.unwrap_or_default(),
        replicas.max.unwrap_or_default(),
        live,
    );
    debug!(live = ?live, replicas = options.num_replicas, "resolved replica count");
    Ok(())
}

async fn resolve_namespace<C: ClusterReader>(
    options: &mut Options,
    cluster: &C,
    namespace: &str,
) -> Result<()> {
    let ns: Option<Namespace> = get_with_timeout(cluster, options.timeout(), None, namespace).await?;
    let annotations = ns
        .and_then(|ns| ns.metadata.annotations)
        .unwrap_or_default();
    options.google_team_project_id = annotations
        .get(PROJECT_ID_ANNOTATION)
        .filter(|p| !p.is_empty())
        .cloned();
    options.mesh_injected = annotations
        .get(MESH_INJECTION_ANNOTATION)
        .is_some_and(|v| v == "enabled");
    Ok(())
}

async fn resolve_sql<C: ClusterReader>(
    options: &mut Options,
    cluster: &C,
    source: &impl Source,
    gcp: Option<&Gcp>,
) -> Result<()> {
    let Some(gcp) = gcp.filter(|g| !g.sql_instances.is_empty()) else {
        return Ok(());
    };

    let instances: Vec<SQLInstance> =
        list_with_timeout(cluster, options.timeout(), &source.namespace()).await?;
    options.existing_sql_disk_sizes = instances
        .into_iter()
        .filter_map(|i| Some((i.metadata.name?, i.spec.settings.disk_size?)))
        .collect();

    let mut rng = rand::thread_rng();
    for secret_name in sql::user_secret_names(&source.name(), gcp)? {
        let password: String = (&mut rng)
            .sample_iter(&Alphanumeric)
            .take(SQL_PASSWORD_LENGTH)
            .map(char::from)
            .collect();
        options.sql_user_passwords.insert(secret_name, password);
    }
    Ok(())
}

fn allows_redirects_from(target: &Application, namespace: &str) -> bool {
    target
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ALLOW_REDIRECT_ANNOTATION))
        .is_some_and(|allowed| {
            allowed
                .split(',')
                .map(str::trim)
                .any(|ns| ns == "*" || ns == namespace)
        })
}

async fn resolve_redirect_targets<C: ClusterReader>(
    options: &mut Options,
    cluster: &C,
    app: &Application,
) -> Result<()> {
    let own_namespace = app.namespace();
    for redirect in &app.spec.redirects {
        let Some(target) = &redirect.target else {
            continue;
        };
        let target_namespace = target.namespace.as_deref().unwrap_or(&own_namespace);
        if target_namespace == own_namespace {
            continue;
        }
        let found: Option<Application> = get_with_timeout(
            cluster,
            options.timeout(),
            Some(target_namespace),
            &target.application,
        )
        .await?;
        match found {
            Some(target_app) if allows_redirects_from(&target_app, &own_namespace) => {
                options
                    .allowed_redirect_targets
                    .insert((target_namespace.to_owned(), target.application.clone()));
            }
            Some(_) => debug!(
                "{target_namespace}/{} does not accept redirects from {own_namespace}",
                target.application
            ),
            None => debug!(
                "redirect target {target_namespace}/{} does not exist",
                target.application
            ),
        }
    }
    Ok(())
}

fn resolve_sidecars(options: &mut Options, source: &(impl AzureSource + IdPortenSource)) -> Result<()> {
    let azure = source.azure().is_some_and(|a| a.sidecar_enabled());
    let idporten = source.idporten().is_some_and(|i| i.sidecar_enabled());
    if azure && idporten {
        return Err(Error::InvalidConfiguration(
            "only one of the azure and idporten sidecars can be enabled".into(),
        ));
    }
    let requested = azure || idporten;
    options.wonderwall_enabled = requested && options.config.features.wonderwall;
    if requested && !options.wonderwall_enabled {
        warn!("login sidecar requested, but wonderwall is not enabled in this cluster");
    }
    Ok(())
}

#[instrument(skip_all)]
pub async fn prepare_application<C: ClusterReader>(
    app: &Application,
    cluster: &C,
    config: Arc<Config>,
) -> Result<Options> {
    let mut options = Options::new(config);
    options.team = team(app)?;
    resolve_sidecars(&mut options, app)?;
    resolve_replicas(&mut options, cluster, app).await?;
    resolve_namespace(&mut options, cluster, &app.namespace()).await?;
    resolve_sql(&mut options, cluster, app, app.spec.gcp.as_ref()).await?;
    resolve_redirect_targets(&mut options, cluster, app).await?;
    Ok(options)
}

#[instrument(skip_all)]
pub async fn prepare_naisjob<C: ClusterReader>(
    job: &Naisjob,
    cluster: &C,
    config: Arc<Config>,
) -> Result<Options> {
    let mut options = Options::new(config);
    options.team = team(job)?;
    resolve_namespace(&mut options, cluster, &job.namespace()).await?;
    resolve_sql(&mut options, cluster, job, job.spec.gcp.as_ref()).await?;
    Ok(options)
}

#[instrument(skip_all)]
pub async fn prepare_skatteetaten<C: ClusterReader>(
    app: &skatteetaten::Application,
    cluster: &C,
    config: Arc<Config>,
) -> Result<Options> {
    let mut options = Options::new(config);
    // these workloads are not always labelled with a team; the namespace owns them
    options.team = team(app).unwrap_or_else(|_| app.namespace());
    resolve_replicas(&mut options, cluster, app).await?;
    resolve_namespace(&mut options, cluster, &app.namespace()).await?;
    Ok(options)
}
