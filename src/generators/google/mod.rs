//! Google Cloud resources, created through Config Connector in the team's project.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::ast::Ast;
use crate::options::Options;
use crate::resources::cnrm::{DELETION_POLICY_ABANDON, DELETION_POLICY_ANNOTATION, PROJECT_ID_ANNOTATION};
use crate::source::{named_object_meta, GcpSource, Source};
use crate::{Error, Result};

pub mod bigquery;
pub mod buckets;
pub mod iam;
pub mod permissions;
pub mod sql;

pub fn create(source: &impl GcpSource, ast: &mut Ast, options: &Options) -> Result<()> {
    iam::create(source, ast, options)?;

    let Some(gcp) = source.gcp().filter(|g| !g.is_empty()) else {
        return Ok(());
    };
    if !options.config.features.cnrm {
        return Err(Error::InvalidConfiguration(
            "spec.gcp: Google Cloud resources are not available in this cluster".into(),
        ));
    }
    let project = options.google_team_project_id.as_deref().ok_or_else(|| {
        Error::InvalidConfiguration(format!(
            "spec.gcp: namespace {} is not bound to a Google project",
            source.namespace()
        ))
    })?;

    sql::create(source, gcp, project, ast, options)?;
    buckets::create(source, gcp, project, ast, options)?;
    bigquery::create(source, gcp, project, ast, options)?;
    permissions::create(source, gcp, project, ast, options)
}

/// Metadata for a Config Connector object in the team project.
///
/// With `abandon`, deleting the object leaves the cloud resource in place.
fn cnrm_meta(source: &impl Source, name: &str, project: &str, abandon: bool) -> ObjectMeta {
    let mut meta = named_object_meta(source, name);
    let annotations = meta.annotations.get_or_insert_with(BTreeMap::new);
    annotations.insert(PROJECT_ID_ANNOTATION.into(), project.into());
    if abandon {
        annotations.insert(DELETION_POLICY_ANNOTATION.into(), DELETION_POLICY_ABANDON.into());
    }
    meta
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::OperationType;
    use crate::resources::nais_io_v1::{CloudStorageBucket, Gcp};
    use crate::testing;

    fn app_with_bucket() -> crate::resources::application::Application {
        let mut app = testing::minimal_application();
        app.spec.gcp = Some(Gcp {
            buckets: vec![CloudStorageBucket {
                name: "myapplication-data".into(),
                ..Default::default()
            }],
            ..Default::default()
        });
        app
    }

    #[test]
    fn requires_a_project_binding() {
        let err = create(&app_with_bucket(), &mut Ast::new(), &testing::options()).unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("not bound to a Google project"));
    }

    #[test]
    fn only_identity_without_resources() {
        let app = testing::minimal_application();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();
        assert_eq!(
            testing::kinds(&ast.operations),
            vec![
                ("IAMServiceAccount", OperationType::CreateIfNotExists),
                ("IAMPolicy", OperationType::CreateOrUpdate),
            ]
        );
    }

    #[test]
    fn resources_in_the_team_project() {
        let mut options = testing::options();
        options.google_team_project_id = Some("team-project".into());
        let mut ast = Ast::new();
        create(&app_with_bucket(), &mut ast, &options).unwrap();
        let kinds: Vec<_> = ast.operations.iter().map(|o| o.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "IAMServiceAccount",
                "IAMPolicy",
                "StorageBucket",
                "StorageBucketAccessControl"
            ]
        );
    }
}
