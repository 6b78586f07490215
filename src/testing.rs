//! Fixtures shared by the unit tests

use std::collections::BTreeMap;
use std::sync::Arc;

use clap::Parser;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::ast::{Operation, OperationType};
use crate::config::Config;
use crate::options::Options;
use crate::resources::application::{Application, ApplicationSpec};
use crate::resources::naisjob::{Naisjob, NaisjobSpec};
use crate::resources::skatteetaten::{self, *};

fn meta(name: &str, namespace: &str, team: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        namespace: Some(namespace.into()),
        uid: Some("0e7d3b1a-1c2f-4f6e-9b59-5d1a2c3e4f50".into()),
        labels: team.map(|t| BTreeMap::from([("team".to_owned(), t.to_owned())])),
        ..Default::default()
    }
}

pub fn minimal_application() -> Application {
    Application {
        metadata: meta("myapplication", "mynamespace", Some("myteam")),
        spec: ApplicationSpec {
            image: "navikt/myapplication:1.2.3".into(),
            ..Default::default()
        },
    }
}

pub fn minimal_naisjob() -> Naisjob {
    Naisjob {
        metadata: meta("mynaisjob", "mynamespace", Some("myteam")),
        spec: NaisjobSpec {
            image: "navikt/mynaisjob:1.2.3".into(),
            ..Default::default()
        },
    }
}

pub fn skatteetaten_application() -> skatteetaten::Application {
    let port = |name: &str, port: i32, protocol: &str| PortConfig {
        name: name.into(),
        port,
        protocol: protocol.into(),
    };
    skatteetaten::Application {
        metadata: meta("myapp", "aura", Some("aurora")),
        spec: skatteetaten::ApplicationSpec {
            pod: PodConfig {
                image: "ghcr.io/skatteetaten/myapp:2.0.0".into(),
                ..Default::default()
            },
            replicas: None,
            ingress: Some(IngressConfig {
                public: BTreeMap::from([(
                    "web".to_owned(),
                    PublicIngressConfig {
                        enabled: true,
                        host: "myapp.skatteetaten.no".into(),
                        gateway: None,
                        port: None,
                    },
                )]),
                internal: BTreeMap::from([(
                    "frontend".to_owned(),
                    InternalIngressConfig {
                        enabled: true,
                        application: "frontend".into(),
                        namespace: None,
                        ports: vec![port("http", 8080, "HTTP")],
                    },
                )]),
            }),
            egress: Some(EgressConfig {
                internal: BTreeMap::from([(
                    "backend".to_owned(),
                    InternalEgressConfig {
                        enabled: true,
                        application: "backend".into(),
                        namespace: Some("other".into()),
                        ports: vec![],
                    },
                )]),
                external: BTreeMap::from([(
                    "api".to_owned(),
                    ExternalEgressConfig {
                        enabled: true,
                        host: "api.example.com".into(),
                        ports: vec![port("https", 443, "HTTPS")],
                    },
                )]),
            }),
        },
    }
}

/// A cluster with every feature turned on
pub fn config() -> Arc<Config> {
    Arc::new(Config::parse_from([
        "naiserator",
        "--cluster-name=mycluster",
        "--gateway-mapping=.nav.no=nais-ingress-external,.intern.nav.no=nais-ingress,.skatteetaten.no=istio-system/public",
        "--image-pull-secret=gpr-credentials",
        "--features.vault",
        "--features.azurerator",
        "--features.idporten",
        "--features.maskinporten",
        "--features.jwker",
        "--features.aiven",
        "--features.wonderwall",
        "--features.network-policy",
        "--features.fqdn-policy",
        "--features.prometheus-operator",
        "--features.cnrm",
        "--features.secure-logs",
        "--features.webproxy",
        "--proxy.address=http://webproxy.nais:8088",
        "--proxy.exclude=localhost,127.0.0.1,.local",
        "--vault.address=https://vault.adeo.no",
        "--google.project-id=nais-project-1234",
        "--network-policy.allowed-kubedns-cidrs=10.96.0.10/32",
        "--network-policy.disallowed-egress-cidrs=10.0.0.0/8,169.254.169.254",
        "--network-policy.api-server-cidr=172.16.0.2/32",
        "--aiven.project=nav-dev",
    ]))
}

/// Options as Prepare would resolve them against an empty cluster
pub fn options() -> Options {
    let mut options = Options::new(config());
    options.team = "myteam".into();
    options.num_replicas = 2;
    options
}

pub fn namespace(name: &str, annotations: &[(&str, &str)]) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.into()),
            annotations: Some(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn deployment(namespace: &str, name: &str, replicas: i32) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(replicas),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// The single operation of the given kind
pub fn find<'a>(operations: &'a [Operation], kind: &str) -> &'a Operation {
    let found: Vec<_> = operations.iter().filter(|o| o.kind() == kind).collect();
    assert_eq!(found.len(), 1, "expected exactly one {kind}, got {}", found.len());
    found[0]
}

pub fn kinds(operations: &[Operation]) -> Vec<(&str, OperationType)> {
    operations
        .iter()
        .map(|o| (o.kind(), o.operation))
        .collect()
}
