//! Per-workload network policy, derived from the access policy.
//!
//! Clusters running Cilium get a CiliumNetworkPolicy instead of the standard
//! NetworkPolicy, which lets external hosts be matched by name.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use k8s_openapi::api::networking::v1::{
    IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyIngressRule, NetworkPolicyPeer,
    NetworkPolicyPort, NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::ast::{Ast, OperationType};
use crate::generators::{app_labels, label_selector, observability};
use crate::options::Options;
use crate::resources::nais_io_v1::{
    AccessPolicy, AccessPolicyExternalRule, AccessPolicyPort, AccessPolicyRule,
};
use crate::resources::networkpolicies::{
    CiliumDnsRule, CiliumEgressRule, CiliumFqdnSelector, CiliumIngressRule, CiliumL7Rules,
    CiliumNetworkPolicy, CiliumNetworkPolicySpec, CiliumPort, CiliumPortRule,
};
use crate::source::{object_meta, AccessPolicySource, IngressSource, APP_LABEL};
use crate::{Error, Result};

const NAMESPACE_LABEL: &str = "kubernetes.io/metadata.name";
const CILIUM_NAMESPACE_LABEL: &str = "k8s:io.kubernetes.pod.namespace";

pub fn create(
    source: &(impl AccessPolicySource + IngressSource),
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    let features = &options.config.features;
    if !features.network_policy {
        return Ok(());
    }
    let policy = Rules::resolve(source, ast, options)?;
    if features.cilium {
        let cnp = CiliumNetworkPolicy {
            metadata: object_meta(source),
            spec: cilium_spec(source, &policy, options),
        };
        ast.append_operation(OperationType::CreateOrUpdate, &cnp)
    } else {
        let np = NetworkPolicy {
            metadata: object_meta(source),
            spec: Some(network_policy_spec(source, &policy, options)),
        };
        ast.append_operation(OperationType::CreateOrUpdate, &np)
    }
}

/// Access rules with defaults applied and everything outside this cluster dropped
struct Rules {
    inbound: Vec<AccessPolicyRule>,
    outbound: Vec<AccessPolicyRule>,
    external_hosts: Vec<AccessPolicyExternalRule>,
    external_ips: Vec<(Ipv4Addr, AccessPolicyExternalRule)>,
    has_ingresses: bool,
    otel: bool,
}

impl Rules {
    fn resolve(
        source: &(impl AccessPolicySource + IngressSource),
        ast: &Ast,
        options: &Options,
    ) -> Result<Self> {
        let namespace = source.namespace();
        let cluster = &options.config.cluster_name;
        let AccessPolicy { inbound, outbound } = source.access_policy();
        let local = |rules: Vec<AccessPolicyRule>| -> Vec<AccessPolicyRule> {
            rules
                .iter()
                .map(|r| r.with_defaults(&namespace, cluster))
                .filter(|r| r.matches_cluster(cluster))
                .collect()
        };
        let outbound = outbound.unwrap_or_default();

        let mut external_hosts = Vec::new();
        let mut external_ips = Vec::new();
        for (i, rule) in outbound.external.into_iter().enumerate() {
            match (rule.host.is_some(), rule.ipv4.clone()) {
                (true, None) => external_hosts.push(rule),
                (false, Some(ip)) => {
                    let addr: Ipv4Addr = ip.parse().map_err(|_| {
                        Error::InvalidConfiguration(format!(
                            "spec.accessPolicy.outbound.external[{i}]: {ip:?} is not an IPv4 address"
                        ))
                    })?;
                    if let Some(cidr) = options
                        .config
                        .network_policy
                        .disallowed_egress_cidrs
                        .iter()
                        .find(|c| c.contains(addr))
                    {
                        return Err(Error::InvalidConfiguration(format!(
                            "spec.accessPolicy.outbound.external[{i}]: {addr} is inside the disallowed network {cidr}"
                        )));
                    }
                    external_ips.push((addr, rule));
                }
                _ => {
                    return Err(Error::InvalidConfiguration(format!(
                        "spec.accessPolicy.outbound.external[{i}]: exactly one of host and ipv4 must be set"
                    )))
                }
            }
        }

        Ok(Rules {
            inbound: local(inbound.unwrap_or_default().rules),
            outbound: local(outbound.rules),
            external_hosts,
            external_ips,
            has_ingresses: !source.ingresses().is_empty(),
            otel: ast.labels.get(observability::OTEL_LABEL).is_some_and(|v| v == "enabled"),
        })
    }
}

fn namespace_selector(namespace: &str) -> LabelSelector {
    LabelSelector {
        match_labels: Some(BTreeMap::from([(
            NAMESPACE_LABEL.to_owned(),
            namespace.to_owned(),
        )])),
        ..Default::default()
    }
}

fn peer(rule: &AccessPolicyRule) -> NetworkPolicyPeer {
    NetworkPolicyPeer {
        pod_selector: Some(if rule.application == "*" {
            LabelSelector::default()
        } else {
            LabelSelector {
                match_labels: Some(app_labels(&rule.application)),
                ..Default::default()
            }
        }),
        namespace_selector: Some(namespace_selector(&rule.namespace)),
        ..Default::default()
    }
}

fn ports(ports: &[AccessPolicyPort]) -> Option<Vec<NetworkPolicyPort>> {
    (!ports.is_empty()).then(|| {
        ports
            .iter()
            .map(|p| NetworkPolicyPort {
                port: Some(IntOrString::Int(p.port)),
                protocol: Some(
                    match p.protocol.as_deref() {
                        Some("UDP") => "UDP",
                        _ => "TCP",
                    }
                    .into(),
                ),
                end_port: None,
            })
            .collect()
    })
}

fn dns_ports() -> Vec<NetworkPolicyPort> {
    ["UDP", "TCP"]
        .into_iter()
        .map(|protocol| NetworkPolicyPort {
            protocol: Some(protocol.into()),
            port: Some(IntOrString::Int(53)),
            end_port: None,
        })
        .collect()
}

fn network_policy_spec(
    source: &(impl AccessPolicySource + IngressSource),
    rules: &Rules,
    options: &Options,
) -> NetworkPolicySpec {
    let config = &options.config.network_policy;

    let mut from = vec![NetworkPolicyPeer {
        namespace_selector: Some(namespace_selector(&config.prometheus_namespace)),
        ..Default::default()
    }];
    if rules.has_ingresses {
        from.push(NetworkPolicyPeer {
            namespace_selector: Some(namespace_selector(&config.ingress_controller_namespace)),
            ..Default::default()
        });
    }
    from.extend(rules.inbound.iter().map(peer));

    let mut dns_peers: Vec<NetworkPolicyPeer> = config
        .allowed_kubedns_cidrs
        .iter()
        .map(|cidr| NetworkPolicyPeer {
            ip_block: Some(IPBlock {
                cidr: cidr.to_string(),
                except: None,
            }),
            ..Default::default()
        })
        .collect();
    dns_peers.push(NetworkPolicyPeer {
        pod_selector: Some(LabelSelector {
            match_labels: Some(BTreeMap::from([("k8s-app".to_owned(), "kube-dns".to_owned())])),
            ..Default::default()
        }),
        namespace_selector: Some(namespace_selector("kube-system")),
        ..Default::default()
    });

    let mut egress = vec![NetworkPolicyEgressRule {
        to: Some(dns_peers),
        ports: Some(dns_ports()),
    }];
    if !rules.outbound.is_empty() {
        egress.push(NetworkPolicyEgressRule {
            to: Some(rules.outbound.iter().map(peer).collect()),
            ports: None,
        });
    }
    for (addr, rule) in &rules.external_ips {
        egress.push(NetworkPolicyEgressRule {
            to: Some(vec![NetworkPolicyPeer {
                ip_block: Some(IPBlock {
                    cidr: format!("{addr}/32"),
                    except: None,
                }),
                ..Default::default()
            }]),
            ports: ports(&rule.ports),
        });
    }
    if rules.otel {
        let observability = &options.config.observability;
        egress.push(NetworkPolicyEgressRule {
            to: Some(vec![NetworkPolicyPeer {
                pod_selector: Some(LabelSelector {
                    match_labels: Some(BTreeMap::from([(
                        "app.kubernetes.io/name".to_owned(),
                        observability.otel_collector_app.clone(),
                    )])),
                    ..Default::default()
                }),
                namespace_selector: Some(namespace_selector(
                    &observability.otel_collector_namespace,
                )),
                ..Default::default()
            }]),
            ports: None,
        });
    }

    NetworkPolicySpec {
        pod_selector: label_selector(source),
        policy_types: Some(vec!["Ingress".into(), "Egress".into()]),
        ingress: Some(vec![NetworkPolicyIngressRule {
            from: Some(from),
            ports: None,
        }]),
        egress: Some(egress),
    }
}

fn cilium_endpoint(application: Option<&str>, namespace: &str) -> LabelSelector {
    let mut labels = BTreeMap::from([(CILIUM_NAMESPACE_LABEL.to_owned(), namespace.to_owned())]);
    if let Some(app) = application.filter(|a| *a != "*") {
        labels.insert(APP_LABEL.to_owned(), app.to_owned());
    }
    LabelSelector {
        match_labels: Some(labels),
        ..Default::default()
    }
}

fn cilium_ports(ports: &[AccessPolicyPort]) -> Vec<CiliumPortRule> {
    if ports.is_empty() {
        return Vec::new();
    }
    vec![CiliumPortRule {
        ports: ports
            .iter()
            .map(|p| CiliumPort {
                port: p.port.to_string(),
                protocol: match p.protocol.as_deref() {
                    Some("UDP") => "UDP",
                    _ => "TCP",
                }
                .into(),
            })
            .collect(),
        rules: None,
    }]
}

fn cilium_spec(
    source: &(impl AccessPolicySource + IngressSource),
    rules: &Rules,
    options: &Options,
) -> CiliumNetworkPolicySpec {
    let config = &options.config.network_policy;

    let mut from_endpoints = vec![cilium_endpoint(None, &config.prometheus_namespace)];
    if rules.has_ingresses {
        from_endpoints.push(cilium_endpoint(None, &config.ingress_controller_namespace));
    }
    from_endpoints.extend(
        rules
            .inbound
            .iter()
            .map(|r| cilium_endpoint(Some(&r.application), &r.namespace)),
    );

    let mut kube_dns = cilium_endpoint(None, "kube-system");
    kube_dns
        .match_labels
        .get_or_insert_with(BTreeMap::new)
        .insert("k8s:k8s-app".into(), "kube-dns".into());

    let mut egress = vec![CiliumEgressRule {
        to_endpoints: vec![kube_dns],
        to_ports: vec![CiliumPortRule {
            ports: ["UDP", "TCP"]
                .into_iter()
                .map(|protocol| CiliumPort {
                    port: "53".into(),
                    protocol: protocol.into(),
                })
                .collect(),
            // lets the agent learn the addresses behind toFQDNs
            rules: Some(CiliumL7Rules {
                dns: vec![CiliumDnsRule {
                    match_pattern: "*".into(),
                }],
            }),
        }],
        ..Default::default()
    }];
    if !rules.outbound.is_empty() {
        egress.push(CiliumEgressRule {
            to_endpoints: rules
                .outbound
                .iter()
                .map(|r| cilium_endpoint(Some(&r.application), &r.namespace))
                .collect(),
            ..Default::default()
        });
    }
    for rule in &rules.external_hosts {
        egress.push(CiliumEgressRule {
            to_fqdns: vec![CiliumFqdnSelector {
                match_name: rule.host.clone().unwrap_or_default(),
            }],
            to_ports: cilium_ports(&rule.ports),
            ..Default::default()
        });
    }
    for (addr, rule) in &rules.external_ips {
        egress.push(CiliumEgressRule {
            to_cidr: vec![format!("{addr}/32")],
            to_ports: cilium_ports(&rule.ports),
            ..Default::default()
        });
    }
    if rules.otel {
        let observability = &options.config.observability;
        let mut collector = cilium_endpoint(None, &observability.otel_collector_namespace);
        collector
            .match_labels
            .get_or_insert_with(BTreeMap::new)
            .insert(
                "app.kubernetes.io/name".into(),
                observability.otel_collector_app.clone(),
            );
        egress.push(CiliumEgressRule {
            to_endpoints: vec![collector],
            ..Default::default()
        });
    }

    CiliumNetworkPolicySpec {
        endpoint_selector: label_selector(source),
        ingress: vec![CiliumIngressRule {
            from_endpoints,
            to_ports: Vec::new(),
        }],
        egress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::{AccessPolicyInbound, AccessPolicyOutbound};
    use crate::testing;
    use std::sync::Arc;

    fn app_with_policy() -> crate::resources::application::Application {
        let mut app = testing::minimal_application();
        app.spec.ingresses = vec!["https://myapplication.nav.no".into()];
        app.spec.access_policy = Some(AccessPolicy {
            inbound: Some(AccessPolicyInbound {
                rules: vec![
                    AccessPolicyRule {
                        application: "frontend".into(),
                        ..Default::default()
                    },
                    AccessPolicyRule {
                        application: "remote".into(),
                        namespace: "other".into(),
                        cluster: "another-cluster".into(),
                    },
                ],
            }),
            outbound: Some(AccessPolicyOutbound {
                rules: vec![AccessPolicyRule {
                    application: "*".into(),
                    namespace: "backends".into(),
                    cluster: String::new(),
                }],
                external: vec![
                    AccessPolicyExternalRule {
                        host: Some("api.example.com".into()),
                        ipv4: None,
                        ports: vec![],
                    },
                    AccessPolicyExternalRule {
                        host: None,
                        ipv4: Some("192.0.2.10".into()),
                        ports: vec![AccessPolicyPort {
                            port: 5432,
                            protocol: None,
                        }],
                    },
                ],
            }),
        });
        app.apply_defaults();
        app
    }

    #[test]
    fn network_policy_from_access_policy() {
        let app = app_with_policy();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();

        let np: NetworkPolicy = testing::find(&ast.operations, "NetworkPolicy").parse().unwrap();
        let spec = np.spec.unwrap();
        let from = spec.ingress.unwrap().remove(0).from.unwrap();
        // prometheus, ingress controller and the local frontend; the remote rule is dropped
        assert_eq!(from.len(), 3);
        let frontend = from[2].pod_selector.as_ref().unwrap();
        assert_eq!(frontend.match_labels.as_ref().unwrap()["app"], "frontend");
        assert_eq!(
            from[2].namespace_selector.as_ref().unwrap().match_labels.as_ref().unwrap()
                [NAMESPACE_LABEL],
            "mynamespace"
        );

        let egress = spec.egress.unwrap();
        // dns, backends namespace and the external ip
        assert_eq!(egress.len(), 3);
        let wildcard = &egress[1].to.as_ref().unwrap()[0];
        assert_eq!(wildcard.pod_selector, Some(LabelSelector::default()));
        let ip = egress[2].to.as_ref().unwrap()[0].ip_block.as_ref().unwrap();
        assert_eq!(ip.cidr, "192.0.2.10/32");
    }

    #[test]
    fn disallowed_egress_fails() {
        let mut app = app_with_policy();
        app.spec
            .access_policy
            .as_mut()
            .unwrap()
            .outbound
            .as_mut()
            .unwrap()
            .external
            .push(AccessPolicyExternalRule {
                host: None,
                ipv4: Some("10.1.2.3".into()),
                ports: vec![],
            });
        let err = create(&app, &mut Ast::new(), &testing::options()).unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("10.0.0.0/8"));
    }

    #[test]
    fn cilium_variant_names_external_hosts() {
        let app = app_with_policy();
        let mut config = (*testing::config()).clone();
        config.features.cilium = true;
        let mut options = testing::options();
        options.config = Arc::new(config);

        let mut ast = Ast::new();
        create(&app, &mut ast, &options).unwrap();
        assert_eq!(
            testing::kinds(&ast.operations),
            vec![("CiliumNetworkPolicy", OperationType::CreateOrUpdate)]
        );
        let cnp: CiliumNetworkPolicy = ast.operations[0].parse().unwrap();
        let fqdn = cnp
            .spec
            .egress
            .iter()
            .find(|e| !e.to_fqdns.is_empty())
            .unwrap();
        assert_eq!(fqdn.to_fqdns[0].match_name, "api.example.com");
        let backends = &cnp.spec.egress[1].to_endpoints[0];
        assert!(!backends.match_labels.as_ref().unwrap().contains_key("app"));
    }

    #[test]
    fn otel_collector_is_reachable_when_instrumented() {
        let app = app_with_policy();
        let mut ast = Ast::new();
        ast.labels
            .insert(observability::OTEL_LABEL.into(), "enabled".into());
        create(&app, &mut ast, &testing::options()).unwrap();
        let np: NetworkPolicy = ast.operations[0].parse().unwrap();
        assert_eq!(np.spec.unwrap().egress.unwrap().len(), 4);
    }

    #[test]
    fn nothing_without_the_feature() {
        let app = app_with_policy();
        let mut config = (*testing::config()).clone();
        config.features.network_policy = false;
        let mut options = testing::options();
        options.config = Arc::new(config);
        let mut ast = Ast::new();
        create(&app, &mut ast, &options).unwrap();
        assert!(ast.operations.is_empty());
    }
}
