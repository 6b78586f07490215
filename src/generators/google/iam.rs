//! Workload identity: a Google service account per workload, impersonable by
//! the workload's Kubernetes service account.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::ast::{Ast, OperationType};
use crate::namegen::app_namespace_hash;
use crate::options::Options;
use crate::resources::cnrm::{
    IAMPolicy, IAMPolicyBinding, IAMPolicySpec, IAMServiceAccount, IAMServiceAccountSpec,
    ResourceRef, PROJECT_ID_ANNOTATION,
};
use crate::source::{Source, APP_LABEL, TEAM_LABEL};
use crate::Result;

const WORKLOAD_IDENTITY_USER: &str = "roles/iam.workloadIdentityUser";

fn project(options: &Options) -> Option<&str> {
    let config = &options.config;
    (config.features.cnrm && !config.google.project_id.is_empty())
        .then_some(config.google.project_id.as_str())
}

/// The Google service account the workload runs as, when the cluster is on GCP
pub fn service_account_email(source: &impl Source, options: &Options) -> Option<String> {
    project(options).map(|project| {
        format!(
            "{}@{project}.iam.gserviceaccount.com",
            app_namespace_hash(&source.name(), &source.namespace())
        )
    })
}

/// Member string for granting roles to the workload's service account
pub fn service_account_member(source: &impl Source, options: &Options) -> Option<String> {
    service_account_email(source, options).map(|email| format!("serviceAccount:{email}"))
}

/// Objects in the shared service account namespace, so they cannot be owned by the workload
fn shared_meta(source: &impl Source, options: &Options, project: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(app_namespace_hash(&source.name(), &source.namespace())),
        namespace: Some(options.config.google.service_account_namespace.clone()),
        labels: Some(BTreeMap::from([
            (APP_LABEL.to_owned(), source.name()),
            (TEAM_LABEL.to_owned(), options.team.clone()),
        ])),
        annotations: Some(BTreeMap::from([(
            PROJECT_ID_ANNOTATION.to_owned(),
            project.to_owned(),
        )])),
        ..Default::default()
    }
}

pub fn create(source: &impl Source, ast: &mut Ast, options: &Options) -> Result<()> {
    let Some(project) = project(options) else {
        return Ok(());
    };
    let metadata = shared_meta(source, options, project);
    let name = metadata.name.clone();

    let account = IAMServiceAccount {
        metadata: metadata.clone(),
        spec: IAMServiceAccountSpec {
            display_name: source.name(),
        },
    };
    ast.append_operation(OperationType::CreateIfNotExists, &account)?;

    let policy = IAMPolicy {
        metadata,
        spec: IAMPolicySpec {
            resource_ref: ResourceRef {
                api_version: Some("iam.cnrm.cloud.google.com/v1beta1".into()),
                kind: Some("IAMServiceAccount".into()),
                name,
                external: None,
            },
            bindings: vec![IAMPolicyBinding {
                role: WORKLOAD_IDENTITY_USER.into(),
                members: vec![format!(
                    "serviceAccount:{project}.svc.id.goog[{}/{}]",
                    source.namespace(),
                    source.name()
                )],
            }],
        },
    };
    ast.append_operation(OperationType::CreateOrUpdate, &policy)
}
