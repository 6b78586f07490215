//! Generator modules.
//!
//! Each module exposes `create(source, ast, options)`, reads the part of the
//! workload spec it is responsible for and appends to the [`Ast`](crate::ast::Ast).
//! A module that has nothing to do returns `Ok(())`. Modules never remove what
//! an earlier module added.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Capabilities, EnvFromSource, SeccompProfile, SecretEnvSource, SecretVolumeSource,
    SecurityContext, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde::Serialize;

use crate::ast::Ast;
use crate::hash;
use crate::namegen::{suffixed_short_name, DNS_LABEL_MAX};
use crate::source::{Source, APP_LABEL};
use crate::Result;

pub mod aiven;
pub mod azure;
pub mod batch;
pub mod certificateauthority;
pub mod deployment;
pub mod env;
pub mod filesfrom;
pub mod fqdnpolicy;
pub mod google;
pub mod horizontalpodautoscaler;
pub mod idporten;
pub mod ingress;
pub mod leaderelection;
pub mod maskinporten;
pub mod mesh;
pub mod networkpolicy;
pub mod observability;
pub mod pod;
pub mod poddisruptionbudget;
pub mod podmonitor;
pub mod securelogs;
pub mod service;
pub mod serviceaccount;
pub mod skatteetaten;
pub mod tokenx;
pub mod vault;
pub mod webproxy;
pub mod wonderwall;

/// Uid and gid every container runs as
pub const RUN_AS_USER: i64 = 1069;

/// Selects the pods of a workload
pub fn label_selector(source: &impl Source) -> LabelSelector {
    LabelSelector {
        match_labels: Some(app_labels(&source.name())),
        ..Default::default()
    }
}

pub fn app_labels(app: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.to_owned(), app.to_owned())])
}

/// Name of a secret provisioned by a credential operator.
///
/// The suffix is a hash of the client spec, so the name only changes when the
/// client changes and the operator knows when to rotate.
pub fn credential_secret_name(prefix: &str, app: &str, client_spec: &impl Serialize) -> Result<String> {
    let hash = hash::hash(client_spec)?;
    suffixed_short_name(&format!("{prefix}-{app}"), &hash[..8], DNS_LABEL_MAX)
}

/// Mount a credential secret as files and expose its keys as env vars
pub fn mount_credential_secret(
    ast: &mut Ast,
    secret_name: &str,
    mount_path: &str,
    files_only: bool,
) -> Result<()> {
    ast.add_volume(
        Volume {
            name: secret_name.to_owned(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret_name.to_owned()),
                ..Default::default()
            }),
            ..Default::default()
        },
        VolumeMount {
            name: secret_name.to_owned(),
            mount_path: mount_path.to_owned(),
            read_only: Some(true),
            ..Default::default()
        },
    )?;
    if !files_only {
        ast.env_from.push(EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: secret_name.to_owned(),
                optional: None,
            }),
            ..Default::default()
        });
    }
    Ok(())
}

/// Security context shared by the main container and every sidecar
pub fn restricted_security_context() -> SecurityContext {
    SecurityContext {
        run_as_user: Some(RUN_AS_USER),
        run_as_group: Some(RUN_AS_USER),
        run_as_non_root: Some(true),
        privileged: Some(false),
        allow_privilege_escalation: Some(false),
        read_only_root_filesystem: Some(true),
        capabilities: Some(Capabilities {
            drop: Some(vec!["ALL".into()]),
            add: None,
        }),
        seccomp_profile: Some(SeccompProfile {
            type_: "RuntimeDefault".into(),
            localhost_profile: None,
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Client<'a> {
        scopes: Vec<&'a str>,
    }

    #[test]
    fn credential_secret_names_follow_the_client_spec() {
        let a = credential_secret_name("tokenx", "myapp", &Client { scopes: vec!["a"] }).unwrap();
        let again = credential_secret_name("tokenx", "myapp", &Client { scopes: vec!["a"] }).unwrap();
        let b = credential_secret_name("tokenx", "myapp", &Client { scopes: vec!["b"] }).unwrap();
        assert_eq!(a, again);
        assert_ne!(a, b);
        assert!(a.starts_with("tokenx-myapp-"));
        assert_eq!(a.len(), "tokenx-myapp-".len() + 8);
    }

    #[test]
    fn long_credential_secret_names_are_shortened() {
        let app = "a".repeat(80);
        let name = credential_secret_name("azure", &app, &Client { scopes: vec![] }).unwrap();
        assert!(name.len() <= DNS_LABEL_MAX);
        assert!(name.starts_with("azure-aaa"));
    }
}
