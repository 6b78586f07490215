use crate::ast::{Ast, OperationType};
use crate::generators::label_selector;
use crate::namegen::{short_name, DNS_LABEL_MAX};
use crate::options::Options;
use crate::resources::networkpolicies::{
    FQDNNetworkPolicy, FQDNNetworkPolicyEgressRule, FQDNNetworkPolicyPeer, FQDNNetworkPolicyPort,
    FQDNNetworkPolicySpec,
};
use crate::source::{named_object_meta, AccessPolicySource};
use crate::Result;

/// Egress to external host names. Cilium clusters express this in their own policy.
pub fn create(source: &impl AccessPolicySource, ast: &mut Ast, options: &Options) -> Result<()> {
    let features = &options.config.features;
    if !features.fqdn_policy || features.cilium {
        return Ok(());
    }

    let metadata = named_object_meta(
        source,
        short_name(&format!("{}-fqdn", source.name()), DNS_LABEL_MAX)?,
    );
    let egress: Vec<_> = source
        .access_policy()
        .outbound
        .unwrap_or_default()
        .external
        .into_iter()
        .filter_map(|rule| {
            let host = rule.host?;
            let ports = if rule.ports.is_empty() {
                vec![FQDNNetworkPolicyPort {
                    port: 443,
                    protocol: "TCP".into(),
                }]
            } else {
                rule.ports
                    .iter()
                    .map(|p| FQDNNetworkPolicyPort {
                        port: p.port,
                        protocol: p.protocol.clone().unwrap_or_else(|| "TCP".into()),
                    })
                    .collect()
            };
            Some(FQDNNetworkPolicyEgressRule {
                ports,
                to: vec![FQDNNetworkPolicyPeer { fqdns: vec![host] }],
            })
        })
        .collect();

    if egress.is_empty() {
        return ast.append_operation(
            OperationType::DeleteIfExists,
            &FQDNNetworkPolicy {
                metadata,
                spec: Default::default(),
            },
        );
    }

    let policy = FQDNNetworkPolicy {
        metadata,
        spec: FQDNNetworkPolicySpec {
            pod_selector: label_selector(source),
            policy_types: vec!["Egress".into()],
            egress,
        },
    };
    ast.append_operation(OperationType::CreateOrUpdate, &policy)
}
