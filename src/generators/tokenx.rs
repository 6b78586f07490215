use crate::ast::{Ast, OperationType};
use crate::generators::{credential_secret_name, mount_credential_secret};
use crate::options::Options;
use crate::resources::nais_io_v1::AccessPolicyRule;
use crate::resources::nais_io_v1_clients::{Jwker, JwkerAccessPolicy, JwkerRules, JwkerSpec};
use crate::source::{object_meta, AccessPolicySource, TokenXSource};
use crate::{Error, Result};

pub const MOUNT_PATH: &str = "/var/run/secrets/nais.io/jwker";

pub fn create(
    source: &(impl TokenXSource + AccessPolicySource),
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    if !source.tokenx().is_some_and(|t| t.enabled) {
        return Ok(());
    }
    if !options.config.features.jwker {
        return Err(Error::InvalidConfiguration(
            "spec.tokenx: TokenX is not available in this cluster".into(),
        ));
    }
    let files_only = source
        .tokenx()
        .is_some_and(|t| t.mount_secrets_as_files_only);

    let namespace = source.namespace();
    let cluster = &options.config.cluster_name;
    let defaulted = |rules: Vec<AccessPolicyRule>| JwkerRules {
        rules: rules
            .iter()
            .map(|r| r.with_defaults(&namespace, cluster))
            .collect(),
    };
    let policy = source.access_policy();
    let access_policy = JwkerAccessPolicy {
        inbound: defaulted(policy.inbound.map(|i| i.rules).unwrap_or_default()),
        outbound: defaulted(policy.outbound.map(|o| o.rules).unwrap_or_default()),
    };

    let secret_name = credential_secret_name("tokenx", &source.name(), &access_policy)?;
    let jwker = Jwker {
        metadata: object_meta(source),
        spec: JwkerSpec {
            access_policy,
            secret_name: secret_name.clone(),
        },
    };
    ast.append_operation(OperationType::CreateOrUpdate, &jwker)?;
    mount_credential_secret(ast, &secret_name, MOUNT_PATH, files_only)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::{AccessPolicy, AccessPolicyInbound, TokenX};
    use crate::testing;

    fn app() -> crate::resources::application::Application {
        let mut app = testing::minimal_application();
        app.spec.token_x = Some(TokenX {
            enabled: true,
            mount_secrets_as_files_only: false,
        });
        app.spec.access_policy = Some(AccessPolicy {
            inbound: Some(AccessPolicyInbound {
                rules: vec![AccessPolicyRule {
                    application: "frontend".into(),
                    ..Default::default()
                }],
            }),
            outbound: None,
        });
        app
    }

    #[test]
    fn client_with_defaulted_rules() {
        let mut ast = Ast::new();
        create(&app(), &mut ast, &testing::options()).unwrap();
        let jwker: Jwker = ast.operations[0].parse().unwrap();
        let rule = &jwker.spec.access_policy.inbound.rules[0];
        assert_eq!(rule.namespace, "mynamespace");
        assert_eq!(rule.cluster, "mycluster");
        assert!(jwker.spec.secret_name.starts_with("tokenx-myapplication-"));
        assert_eq!(ast.volume_mounts[0].mount_path, MOUNT_PATH);
        assert_eq!(ast.env_from.len(), 1);
    }

    #[test]
    fn secret_name_follows_the_access_policy() {
        let mut first = Ast::new();
        create(&app(), &mut first, &testing::options()).unwrap();
        let mut changed = app();
        changed.spec.access_policy = None;
        let mut second = Ast::new();
        create(&changed, &mut second, &testing::options()).unwrap();
        let a: Jwker = first.operations[0].parse().unwrap();
        let b: Jwker = second.operations[0].parse().unwrap();
        assert_ne!(a.spec.secret_name, b.spec.secret_name);
    }
}
