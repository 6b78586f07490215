use std::collections::BTreeSet;

use crate::ast::{Ast, OperationType};
use crate::generators::app_labels;
use crate::options::Options;
use crate::resources::istio::{
    AuthorizationPolicy, AuthorizationPolicySpec, AuthorizationRule, AuthorizationRuleFrom,
    AuthorizationRuleOperation, AuthorizationRuleSource, AuthorizationRuleTo, WorkloadSelector,
};
use crate::resources::skatteetaten::Application;
use crate::source::{object_meta, Source};
use crate::Result;

use super::{gateway, principal};

/// Allow-list of mesh identities that may call the application.
///
/// Internal ingresses admit the named applications, on their listed ports when
/// any are given. Public ingresses admit the gateways serving them. With
/// nothing to admit the policy is removed, since an empty allow-list denies
/// every caller.
pub fn create(app: &Application, ast: &mut Ast, options: &Options) -> Result<()> {
    let namespace = app.namespace();
    let mut rules = Vec::new();

    for config in app
        .spec
        .ingress
        .iter()
        .flat_map(|i| i.internal.values())
        .filter(|i| i.enabled)
    {
        let caller_namespace = config.namespace.as_deref().unwrap_or(&namespace);
        rules.push(AuthorizationRule {
            from: vec![AuthorizationRuleFrom {
                source: AuthorizationRuleSource {
                    principals: vec![principal(caller_namespace, &config.application)],
                },
            }],
            to: if config.ports.is_empty() {
                vec![]
            } else {
                vec![AuthorizationRuleTo {
                    operation: AuthorizationRuleOperation {
                        ports: config.ports.iter().map(|p| p.port.to_string()).collect(),
                    },
                }]
            },
        });
    }

    let mut gateway_namespaces = BTreeSet::new();
    for (key, public) in app
        .spec
        .ingress
        .iter()
        .flat_map(|i| i.public.iter())
        .filter(|(_, p)| p.enabled)
    {
        let field = format!("spec.ingress.public.{key}");
        let gateway = gateway(&field, &public.host, public.gateway.as_deref(), options)?;
        if let Some((gateway_namespace, _)) = gateway.split_once('/') {
            gateway_namespaces.insert(gateway_namespace.to_owned());
        }
    }
    if !gateway_namespaces.is_empty() {
        rules.push(AuthorizationRule {
            from: vec![AuthorizationRuleFrom {
                source: AuthorizationRuleSource {
                    principals: gateway_namespaces
                        .iter()
                        .map(|ns| principal(ns, "*"))
                        .collect(),
                },
            }],
            to: vec![],
        });
    }

    let metadata = object_meta(app);
    if rules.is_empty() {
        return ast.append_operation(
            OperationType::DeleteIfExists,
            &AuthorizationPolicy {
                metadata,
                spec: Default::default(),
            },
        );
    }
    let policy = AuthorizationPolicy {
        metadata,
        spec: AuthorizationPolicySpec {
            selector: WorkloadSelector {
                match_labels: app_labels(&app.name()),
            },
            rules,
        },
    };
    ast.append_operation(OperationType::CreateOrUpdate, &policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn principals_from_internal_and_public_ingress() {
        let app = testing::skatteetaten_application();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();

        let policy: AuthorizationPolicy = ast.operations[0].parse().unwrap();
        assert_eq!(policy.spec.selector.match_labels["app"], "myapp");
        let rules = &policy.spec.rules;
        assert_eq!(rules.len(), 2);
        assert_eq!(
            rules[0].from[0].source.principals,
            vec!["cluster.local/ns/aura/sa/frontend"]
        );
        assert_eq!(rules[0].to[0].operation.ports, vec!["8080"]);
        assert_eq!(
            rules[1].from[0].source.principals,
            vec!["cluster.local/ns/istio-system/sa/*"]
        );
    }

    #[test]
    fn removed_when_nobody_may_call() {
        let mut app = testing::skatteetaten_application();
        app.spec.ingress = None;
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();
        assert_eq!(
            testing::kinds(&ast.operations),
            vec![("AuthorizationPolicy", OperationType::DeleteIfExists)]
        );
    }
}
