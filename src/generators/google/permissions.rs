use super::{cnrm_meta, iam};
use crate::ast::{Ast, OperationType};
use crate::namegen::{hash_suffix, suffixed_short_name, DNS_LABEL_MAX};
use crate::options::Options;
use crate::resources::cnrm::{IAMPolicyMember, IAMPolicyMemberSpec, ResourceRef};
use crate::resources::nais_io_v1::Gcp;
use crate::source::Source;
use crate::{Error, Result};

/// One IAMPolicyMember per requested role binding. Without a resource name the
/// role is granted on the team project.
pub fn create(
    source: &impl Source,
    gcp: &Gcp,
    project: &str,
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    if gcp.permissions.is_empty() {
        return Ok(());
    }
    let member = iam::service_account_member(source, options).ok_or_else(|| {
        Error::InvalidConfiguration("spec.gcp.permissions: the cluster has no Google project".into())
    })?;

    for (i, permission) in gcp.permissions.iter().enumerate() {
        if permission.role.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "spec.gcp.permissions[{i}]: role must be set"
            )));
        }
        let role = if permission.role.starts_with("roles/") {
            permission.role.clone()
        } else {
            format!("roles/{}", permission.role)
        };
        let resource = &permission.resource;
        let resource_ref = ResourceRef {
            api_version: Some(resource.api_version.clone()),
            kind: Some(resource.kind.clone()),
            name: resource.name.clone(),
            external: resource
                .name
                .is_none()
                .then(|| format!("projects/{project}")),
        };

        let identity = format!(
            "{role}/{}/{}",
            resource.kind,
            resource.name.as_deref().unwrap_or_default()
        );
        let name = suffixed_short_name(&source.name(), &hash_suffix(&identity), DNS_LABEL_MAX)?;
        let binding = IAMPolicyMember {
            metadata: cnrm_meta(source, &name, project, false),
            spec: IAMPolicyMemberSpec {
                member: member.clone(),
                role,
                resource_ref,
            },
        };
        ast.append_operation(OperationType::CreateOrUpdate, &binding)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::{CloudIamPermission, CloudIamResource};
    use crate::testing;

    #[test]
    fn project_level_and_named_bindings() {
        let app = testing::minimal_application();
        let gcp = Gcp {
            permissions: vec![
                CloudIamPermission {
                    role: "cloudtrace.agent".into(),
                    resource: CloudIamResource {
                        api_version: "resourcemanager.cnrm.cloud.google.com/v1beta1".into(),
                        kind: "Project".into(),
                        name: None,
                    },
                },
                CloudIamPermission {
                    role: "roles/pubsub.subscriber".into(),
                    resource: CloudIamResource {
                        api_version: "pubsub.cnrm.cloud.google.com/v1beta1".into(),
                        kind: "PubSubSubscription".into(),
                        name: Some("events".into()),
                    },
                },
            ],
            ..Default::default()
        };
        let mut ast = Ast::new();
        create(&app, &gcp, "team-project", &mut ast, &testing::options()).unwrap();

        let project: IAMPolicyMember = ast.operations[0].parse().unwrap();
        assert_eq!(project.spec.role, "roles/cloudtrace.agent");
        assert_eq!(
            project.spec.resource_ref.external.as_deref(),
            Some("projects/team-project")
        );
        let named: IAMPolicyMember = ast.operations[1].parse().unwrap();
        assert_eq!(named.spec.resource_ref.name.as_deref(), Some("events"));
        assert!(named.spec.resource_ref.external.is_none());
        assert_ne!(project.metadata.name, named.metadata.name);
    }
}
