//! Leader election through the elector sidecar.
//!
//! The elector competes for a Lease named after the application and tells the
//! main container over localhost which pod currently leads.

use k8s_openapi::api::core::v1::{Container, ContainerPort, EnvVar, EnvVarSource, ObjectFieldSelector};
use k8s_openapi::api::networking::v1::{
    IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyPeer, NetworkPolicyPort,
    NetworkPolicySpec,
};
use k8s_openapi::api::rbac::v1::{PolicyRule, Role, RoleBinding, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::ast::{Ast, OperationType};
use crate::generators::{label_selector, restricted_security_context};
use crate::namegen::{short_name, DNS_LABEL_MAX};
use crate::options::Options;
use crate::source::{named_object_meta, object_meta, LeaderElectionSource};
use crate::Result;

pub const ELECTOR_CONTAINER: &str = "elector";
const ELECTOR_PORT: i32 = 4040;

pub fn create(source: &impl LeaderElectionSource, ast: &mut Ast, options: &Options) -> Result<()> {
    if !source.leader_election() {
        return Ok(());
    }
    let app = source.name();

    let role = Role {
        metadata: object_meta(source),
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec!["coordination.k8s.io".into()]),
            resources: Some(vec!["leases".into()]),
            resource_names: Some(vec![app.clone()]),
            verbs: vec!["get".into(), "update".into()],
            ..Default::default()
        }, PolicyRule {
            api_groups: Some(vec!["coordination.k8s.io".into()]),
            resources: Some(vec!["leases".into()]),
            verbs: vec!["create".into()],
            ..Default::default()
        }]),
    };
    ast.append_operation(OperationType::CreateOrUpdate, &role)?;

    let binding = RoleBinding {
        metadata: object_meta(source),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".into(),
            kind: "Role".into(),
            name: app.clone(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".into(),
            name: app.clone(),
            namespace: Some(source.namespace()),
            ..Default::default()
        }]),
    };
    ast.append_operation(OperationType::CreateOrUpdate, &binding)?;

    ast.init_containers.push(elector(source, options));

    let url = format!("http://localhost:{ELECTOR_PORT}");
    ast.add_env("ELECTOR_PATH", format!("localhost:{ELECTOR_PORT}"));
    ast.add_env("ELECTOR_GET_URL", format!("{url}/"));
    ast.add_env("ELECTOR_SSE_URL", format!("{url}/sse"));

    api_server_policy(source, ast, options)
}

/// Runs as a native sidecar: started before, and stopped after, the main container
fn elector(source: &impl LeaderElectionSource, options: &Options) -> Container {
    Container {
        name: ELECTOR_CONTAINER.into(),
        image: Some(options.config.images.elector.clone()),
        args: Some(vec![
            format!("--election={}", source.name()),
            format!("--http=localhost:{ELECTOR_PORT}"),
            "--election-namespace=$(ELECTOR_NAMESPACE)".into(),
            "--id=$(ELECTOR_POD_NAME)".into(),
        ]),
        env: Some(vec![
            field_env("ELECTOR_NAMESPACE", "metadata.namespace"),
            field_env("ELECTOR_POD_NAME", "metadata.name"),
        ]),
        ports: Some(vec![ContainerPort {
            container_port: ELECTOR_PORT,
            protocol: Some("TCP".into()),
            ..Default::default()
        }]),
        restart_policy: Some("Always".into()),
        security_context: Some(restricted_security_context()),
        image_pull_policy: Some("IfNotPresent".into()),
        ..Default::default()
    }
}

fn field_env(name: &str, path: &str) -> EnvVar {
    EnvVar {
        name: name.into(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: path.into(),
                api_version: None,
            }),
            ..Default::default()
        }),
    }
}

/// The elector talks to the API server, which the workload policy does not allow
fn api_server_policy(source: &impl LeaderElectionSource, ast: &mut Ast, options: &Options) -> Result<()> {
    let Some(cidr) = options.config.network_policy.api_server_cidr else {
        return Ok(());
    };
    if !options.config.features.network_policy {
        return Ok(());
    }
    let name = short_name(&format!("{}-elector", source.name()), DNS_LABEL_MAX)?;
    let policy = NetworkPolicy {
        metadata: named_object_meta(source, name),
        spec: Some(NetworkPolicySpec {
            pod_selector: label_selector(source),
            policy_types: Some(vec!["Egress".into()]),
            egress: Some(vec![NetworkPolicyEgressRule {
                to: Some(vec![NetworkPolicyPeer {
                    ip_block: Some(IPBlock {
                        cidr: cidr.to_string(),
                        except: None,
                    }),
                    ..Default::default()
                }]),
                ports: Some(vec![NetworkPolicyPort {
                    port: Some(IntOrString::Int(443)),
                    protocol: Some("TCP".into()),
                    end_port: None,
                }]),
            }]),
            ..Default::default()
        }),
    };
    ast.append_operation(OperationType::CreateOrUpdate, &policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn elector_sidecar_and_permissions() {
        let mut app = testing::minimal_application();
        app.spec.leader_election = true;
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();

        assert_eq!(
            testing::kinds(&ast.operations),
            vec![
                ("Role", OperationType::CreateOrUpdate),
                ("RoleBinding", OperationType::CreateOrUpdate),
                ("NetworkPolicy", OperationType::CreateOrUpdate),
            ]
        );
        let elector = &ast.init_containers[0];
        assert_eq!(elector.name, "elector");
        assert_eq!(elector.restart_policy.as_deref(), Some("Always"));
        assert!(ast
            .env
            .iter()
            .any(|e| e.name == "ELECTOR_GET_URL" && e.value.as_deref() == Some("http://localhost:4040/")));

        let policy: NetworkPolicy = ast.operations[2].parse().unwrap();
        assert_eq!(policy.metadata.name.as_deref(), Some("myapplication-elector"));
        let egress = &policy.spec.unwrap().egress.unwrap()[0];
        assert_eq!(
            egress.to.as_ref().unwrap()[0].ip_block.as_ref().unwrap().cidr,
            "172.16.0.2/32"
        );
    }

    #[test]
    fn nothing_without_leader_election() {
        let app = testing::minimal_application();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();
        assert!(ast.operations.is_empty());
        assert!(ast.init_containers.is_empty());
    }
}
