use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::ast::{Ast, OperationType};
use crate::generators::{label_selector, pod};
use crate::options::Options;
use crate::source::{object_meta, ReplicaSource, Workload};
use crate::Result;

fn strategy(source: &impl ReplicaSource) -> DeploymentStrategy {
    match source.strategy() {
        "Recreate" => DeploymentStrategy {
            type_: Some("Recreate".into()),
            rolling_update: None,
        },
        _ => DeploymentStrategy {
            type_: Some("RollingUpdate".into()),
            rolling_update: Some(RollingUpdateDeployment {
                max_surge: Some(IntOrString::String("25%".into())),
                max_unavailable: Some(IntOrString::Int(0)),
            }),
        },
    }
}

/// Assemble the pod and emit the Deployment. Runs last.
pub fn create(
    source: &(impl Workload + ReplicaSource),
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    let template = pod::template(source, ast, options, "Always")?;
    let deployment = Deployment {
        metadata: object_meta(source),
        spec: Some(DeploymentSpec {
            replicas: Some(options.num_replicas),
            selector: label_selector(source),
            strategy: Some(strategy(source)),
            progress_deadline_seconds: Some(300),
            revision_history_limit: Some(3),
            template,
            ..Default::default()
        }),
        ..Default::default()
    };
    ast.append_operation(OperationType::CreateOrUpdate, &deployment)
}
