//! Turning a workload into the ordered list of operations that realizes it.
//!
//! `generate_*` runs the generators in a fixed order against resolved
//! [`Options`]. `synthesize_*` resolves the options from the cluster first and
//! is what callers normally use.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::ast::{Ast, Operation};
use crate::cluster::ClusterReader;
use crate::config::Config;
use crate::generators::{
    aiven, azure, batch, certificateauthority, deployment, env, filesfrom, fqdnpolicy, google,
    horizontalpodautoscaler, idporten, ingress, leaderelection, maskinporten, mesh, networkpolicy,
    observability, pod, poddisruptionbudget, podmonitor, securelogs, service, serviceaccount,
    skatteetaten as istio, tokenx, vault, webproxy, wonderwall,
};
use crate::options::{self, Options};
use crate::resources::application::Application;
use crate::resources::naisjob::Naisjob;
use crate::resources::skatteetaten;
use crate::source::Source;
use crate::{Error, Metrics, Result};

/// Everything needed to apply a workload
#[derive(Clone, Debug, Serialize)]
pub struct Synthesis {
    /// Content hash of the workload as submitted; an unchanged hash means nothing to apply
    pub hash: String,
    pub operations: Vec<Operation>,
}

/// Shared by every synthesis run
pub struct Context<C> {
    pub cluster: C,
    pub config: Arc<Config>,
    pub metrics: Metrics,
}

impl<C: ClusterReader> Context<C> {
    pub fn new(cluster: C, config: Arc<Config>, metrics: Metrics) -> Self {
        Context {
            cluster,
            config,
            metrics,
        }
    }
}

/// Expects `app` to have its defaults applied
pub fn generate_application(app: &Application, options: &Options) -> Result<Vec<Operation>> {
    let mut ast = Ast::new();
    let ast = &mut ast;
    serviceaccount::create(app, ast, options)?;
    service::create(app, ast, options)?;
    horizontalpodautoscaler::create(app, ast, options)?;
    poddisruptionbudget::create(app, ast, options)?;
    pod::create(app, ast, options)?;
    env::create(app, ast, options)?;
    filesfrom::create(app, ast, options)?;
    certificateauthority::create(app, ast, options)?;
    observability::create(app, ast, options)?;
    podmonitor::create(app, ast, options)?;
    webproxy::create(app, ast, options)?;
    mesh::create(app, ast, options)?;
    networkpolicy::create(app, ast, options)?;
    fqdnpolicy::create(app, ast, options)?;
    ingress::create(app, ast, options)?;
    leaderelection::create(app, ast, options)?;
    securelogs::create(app, ast, options)?;
    vault::create(app, ast, options)?;
    google::create(app, ast, options)?;
    tokenx::create(app, ast, options)?;
    azure::create(app, ast, options)?;
    idporten::create(app, ast, options)?;
    maskinporten::create(app, ast, options)?;
    wonderwall::create(app, ast, options)?;
    aiven::create(app, ast, options)?;
    deployment::create(app, ast, options)?;
    Ok(std::mem::take(&mut ast.operations))
}

/// Expects `job` to have its defaults applied
pub fn generate_naisjob(job: &Naisjob, options: &Options) -> Result<Vec<Operation>> {
    let mut ast = Ast::new();
    let ast = &mut ast;
    serviceaccount::create(job, ast, options)?;
    pod::create(job, ast, options)?;
    env::create(job, ast, options)?;
    filesfrom::create(job, ast, options)?;
    certificateauthority::create(job, ast, options)?;
    observability::create(job, ast, options)?;
    webproxy::create(job, ast, options)?;
    mesh::create(job, ast, options)?;
    networkpolicy::create(job, ast, options)?;
    fqdnpolicy::create(job, ast, options)?;
    securelogs::create(job, ast, options)?;
    vault::create(job, ast, options)?;
    google::create(job, ast, options)?;
    azure::create(job, ast, options)?;
    maskinporten::create(job, ast, options)?;
    aiven::create(job, ast, options)?;
    batch::create(job, ast, options)?;
    Ok(std::mem::take(&mut ast.operations))
}

/// Expects `app` to have its defaults applied
pub fn generate_skatteetaten(
    app: &skatteetaten::Application,
    options: &Options,
) -> Result<Vec<Operation>> {
    let mut ast = Ast::new();
    let ast = &mut ast;
    serviceaccount::create(app, ast, options)?;
    service::create(app, ast, options)?;
    horizontalpodautoscaler::create(app, ast, options)?;
    pod::create(app, ast, options)?;
    env::create(app, ast, options)?;
    networkpolicy::create(app, ast, options)?;
    istio::authorizationpolicy::create(app, ast, options)?;
    istio::serviceentry::create(app, ast, options)?;
    istio::virtualservice::create(app, ast, options)?;
    deployment::create(app, ast, options)?;
    Ok(std::mem::take(&mut ast.operations))
}

fn finish(
    kind: &str,
    source: &impl Source,
    metrics: &Metrics,
    result: Result<Synthesis>,
) -> Result<Synthesis> {
    match result {
        Ok(synthesis) => {
            debug!(
                operations = synthesis.operations.len(),
                hash = %synthesis.hash,
                "synthesized {kind}"
            );
            Ok(synthesis)
        }
        Err(err) => {
            let err = err.for_workload(format!("{}/{}", source.namespace(), source.name()));
            warn!(user_error = err.is_user_error(), "synthesis failed: {err}");
            metrics.synthesis_failure(kind, source, &err);
            Err(err)
        }
    }
}

#[instrument(skip_all, fields(namespace = %app.namespace(), name = %app.name()))]
pub async fn synthesize_application<C: ClusterReader>(
    app: &Application,
    ctx: &Context<C>,
) -> Result<Synthesis> {
    let _timer = ctx.metrics.count_and_measure("Application");
    let result = async {
        let hash = app.hash()?;
        let mut app = app.clone();
        app.apply_defaults();
        let options = options::prepare_application(&app, &ctx.cluster, ctx.config.clone()).await?;
        let operations = generate_application(&app, &options)?;
        Ok::<_, Error>(Synthesis { hash, operations })
    }
    .await;
    finish("Application", app, &ctx.metrics, result)
}

#[instrument(skip_all, fields(namespace = %job.namespace(), name = %job.name()))]
pub async fn synthesize_naisjob<C: ClusterReader>(
    job: &Naisjob,
    ctx: &Context<C>,
) -> Result<Synthesis> {
    let _timer = ctx.metrics.count_and_measure("Naisjob");
    let result = async {
        let hash = job.hash()?;
        let mut job = job.clone();
        job.apply_defaults();
        let options = options::prepare_naisjob(&job, &ctx.cluster, ctx.config.clone()).await?;
        let operations = generate_naisjob(&job, &options)?;
        Ok::<_, Error>(Synthesis { hash, operations })
    }
    .await;
    finish("Naisjob", job, &ctx.metrics, result)
}

#[instrument(skip_all, fields(namespace = %app.namespace(), name = %app.name()))]
pub async fn synthesize_skatteetaten<C: ClusterReader>(
    app: &skatteetaten::Application,
    ctx: &Context<C>,
) -> Result<Synthesis> {
    let _timer = ctx.metrics.count_and_measure("SkatteetatenApplication");
    let result = async {
        let hash = app.hash()?;
        let mut app = app.clone();
        app.apply_defaults();
        let options = options::prepare_skatteetaten(&app, &ctx.cluster, ctx.config.clone()).await?;
        let operations = generate_skatteetaten(&app, &options)?;
        Ok::<_, Error>(Synthesis { hash, operations })
    }
    .await;
    finish("SkatteetatenApplication", app, &ctx.metrics, result)
}
