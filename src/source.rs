//! Read-only views over a workload spec.
//!
//! Generators are bound on the narrowest capability they need, so a generator
//! shared between workload kinds only sees what every kind can answer.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;

use crate::hash;
use crate::resources::application::Application;
use crate::resources::nais_io_v1::*;
use crate::resources::naisjob::Naisjob;
use crate::resources::skatteetaten;
use crate::Result;

pub const CORRELATION_ID_ANNOTATION: &str = "nais.io/deploymentCorrelationID";
pub const TEAM_LABEL: &str = "team";
pub const APP_LABEL: &str = "app";

/// Identity of a workload
pub trait Source {
    fn name(&self) -> String;
    fn namespace(&self) -> String;
    fn labels(&self) -> BTreeMap<String, String>;
    fn annotations(&self) -> BTreeMap<String, String>;
    fn owner_reference(&self) -> OwnerReference;
    /// Content hash of the spec and labels
    fn hash(&self) -> Result<String>;

    fn correlation_id(&self) -> Option<String> {
        self.annotations().get(CORRELATION_ID_ANNOTATION).cloned()
    }
}

/// The main container
pub trait Workload: Source {
    fn image(&self) -> &str;
    fn command(&self) -> &[String];
    fn env(&self) -> &[EnvVar];
    fn env_from(&self) -> &[EnvFrom] {
        &[]
    }
    fn files_from(&self) -> &[FilesFrom] {
        &[]
    }
    fn resources(&self) -> Option<&ResourceRequirements>;
    fn liveness(&self) -> Option<&Probe>;
    fn readiness(&self) -> Option<&Probe>;
    fn startup(&self) -> Option<&Probe> {
        None
    }
    /// The port traffic is served on; jobs have none
    fn port(&self) -> Option<i32>;
    fn termination_grace_period(&self) -> Option<i64> {
        None
    }
    fn pre_stop_hook(&self) -> Option<&PreStopHook> {
        None
    }
    fn skip_ca_bundle(&self) -> bool {
        false
    }
}

pub trait ReplicaSource: Source {
    fn replicas(&self) -> Replicas;
    fn strategy(&self) -> &str;
}

pub trait ServiceSource: Source {
    fn service_port(&self) -> i32;
    fn service_protocol(&self) -> &str;
}

pub trait PrometheusSource: Source {
    fn prometheus(&self) -> Option<&Prometheus>;
}

pub trait AccessPolicySource: Source {
    fn access_policy(&self) -> AccessPolicy;
}

pub trait IngressSource: Source {
    fn ingresses(&self) -> Vec<String>;
    fn redirects(&self) -> &[Redirect];
}

pub trait LeaderElectionSource: Source {
    fn leader_election(&self) -> bool;
}

pub trait SecureLogsSource: Source {
    fn secure_logs(&self) -> bool;
}

pub trait VaultSource: Source {
    fn vault(&self) -> Option<&Vault>;
}

pub trait WebProxySource: Source {
    fn webproxy(&self) -> bool;
}

pub trait ObservabilitySource: Source {
    fn observability(&self) -> Option<&Observability>;
}

pub trait GcpSource: Source {
    fn gcp(&self) -> Option<&Gcp>;
}

pub trait TokenXSource: Source {
    fn tokenx(&self) -> Option<&TokenX>;
}

pub trait AzureSource: Source {
    fn azure(&self) -> Option<&Azure>;
}

pub trait IdPortenSource: Source {
    fn idporten(&self) -> Option<&IdPorten>;
}

pub trait MaskinportenSource: Source {
    fn maskinporten(&self) -> Option<&Maskinporten>;
}

pub trait AivenSource: Source {
    fn kafka(&self) -> Option<&Kafka>;
    fn open_search(&self) -> Option<&OpenSearch>;
}

/// Metadata every generated object in the workload namespace starts from
pub fn object_meta(source: &impl Source) -> ObjectMeta {
    let name = source.name();
    let mut labels = source.labels();
    labels.insert(APP_LABEL.into(), name.clone());

    let annotations = source
        .correlation_id()
        .map(|id| BTreeMap::from([(CORRELATION_ID_ANNOTATION.to_owned(), id)]));

    ObjectMeta {
        name: Some(name),
        namespace: Some(source.namespace()),
        labels: Some(labels),
        annotations,
        owner_references: Some(vec![source.owner_reference()]),
        ..Default::default()
    }
}

pub fn named_object_meta(source: &impl Source, name: impl Into<String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.into()),
        ..object_meta(source)
    }
}

fn owner_reference_of<K: Resource<DynamicType = ()>>(obj: &K) -> OwnerReference {
    let meta = obj.meta();
    OwnerReference {
        api_version: K::api_version(&()).into_owned(),
        kind: K::kind(&()).into_owned(),
        name: meta.name.clone().unwrap_or_default(),
        uid: meta.uid.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn identity<K: Resource<DynamicType = ()>>(obj: &K) -> (String, String) {
    let meta = obj.meta();
    (
        meta.name.clone().unwrap_or_default(),
        meta.namespace.clone().unwrap_or_default(),
    )
}

impl Source for Application {
    fn name(&self) -> String {
        identity(self).0
    }
    fn namespace(&self) -> String {
        identity(self).1
    }
    fn labels(&self) -> BTreeMap<String, String> {
        self.metadata.labels.clone().unwrap_or_default()
    }
    fn annotations(&self) -> BTreeMap<String, String> {
        self.metadata.annotations.clone().unwrap_or_default()
    }
    fn owner_reference(&self) -> OwnerReference {
        owner_reference_of(self)
    }
    fn hash(&self) -> Result<String> {
        hash::spec_hash(&self.spec, &self.labels())
    }
}

impl Workload for Application {
    fn image(&self) -> &str {
        &self.spec.image
    }
    fn command(&self) -> &[String] {
        &self.spec.command
    }
    fn env(&self) -> &[EnvVar] {
        &self.spec.env
    }
    fn env_from(&self) -> &[EnvFrom] {
        &self.spec.env_from
    }
    fn files_from(&self) -> &[FilesFrom] {
        &self.spec.files_from
    }
    fn resources(&self) -> Option<&ResourceRequirements> {
        self.spec.resources.as_ref()
    }
    fn liveness(&self) -> Option<&Probe> {
        self.spec.liveness.as_ref()
    }
    fn readiness(&self) -> Option<&Probe> {
        self.spec.readiness.as_ref()
    }
    fn startup(&self) -> Option<&Probe> {
        self.spec.startup.as_ref()
    }
    fn port(&self) -> Option<i32> {
        Some(self.spec.port.unwrap_or(DEFAULT_PORT))
    }
    fn termination_grace_period(&self) -> Option<i64> {
        self.spec.termination_grace_period
    }
    fn pre_stop_hook(&self) -> Option<&PreStopHook> {
        self.spec.pre_stop_hook.as_ref()
    }
    fn skip_ca_bundle(&self) -> bool {
        self.spec.skip_ca_bundle
    }
}

impl ReplicaSource for Application {
    fn replicas(&self) -> Replicas {
        self.spec.replicas.clone().unwrap_or_default()
    }
    fn strategy(&self) -> &str {
        self.spec
            .strategy
            .as_ref()
            .and_then(|s| s.type_.as_deref())
            .unwrap_or("RollingUpdate")
    }
}

impl ServiceSource for Application {
    fn service_port(&self) -> i32 {
        self.spec
            .service
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVICE_PORT)
    }
    fn service_protocol(&self) -> &str {
        self.spec
            .service
            .as_ref()
            .and_then(|s| s.protocol.as_deref())
            .unwrap_or("http")
    }
}

impl PrometheusSource for Application {
    fn prometheus(&self) -> Option<&Prometheus> {
        self.spec.prometheus.as_ref()
    }
}

impl AccessPolicySource for Application {
    fn access_policy(&self) -> AccessPolicy {
        self.spec.access_policy.clone().unwrap_or_default()
    }
}

impl IngressSource for Application {
    fn ingresses(&self) -> Vec<String> {
        self.spec.ingresses.clone()
    }
    fn redirects(&self) -> &[Redirect] {
        &self.spec.redirects
    }
}

impl LeaderElectionSource for Application {
    fn leader_election(&self) -> bool {
        self.spec.leader_election
    }
}

impl SecureLogsSource for Application {
    fn secure_logs(&self) -> bool {
        self.spec.secure_logs.as_ref().is_some_and(|s| s.enabled)
    }
}

impl VaultSource for Application {
    fn vault(&self) -> Option<&Vault> {
        self.spec.vault.as_ref()
    }
}

impl WebProxySource for Application {
    fn webproxy(&self) -> bool {
        self.spec.webproxy
    }
}

impl ObservabilitySource for Application {
    fn observability(&self) -> Option<&Observability> {
        self.spec.observability.as_ref()
    }
}

impl GcpSource for Application {
    fn gcp(&self) -> Option<&Gcp> {
        self.spec.gcp.as_ref()
    }
}

impl TokenXSource for Application {
    fn tokenx(&self) -> Option<&TokenX> {
        self.spec.token_x.as_ref()
    }
}

impl AzureSource for Application {
    fn azure(&self) -> Option<&Azure> {
        self.spec.azure.as_ref()
    }
}

impl IdPortenSource for Application {
    fn idporten(&self) -> Option<&IdPorten> {
        self.spec.idporten.as_ref()
    }
}

impl MaskinportenSource for Application {
    fn maskinporten(&self) -> Option<&Maskinporten> {
        self.spec.maskinporten.as_ref()
    }
}

impl AivenSource for Application {
    fn kafka(&self) -> Option<&Kafka> {
        self.spec.kafka.as_ref()
    }
    fn open_search(&self) -> Option<&OpenSearch> {
        self.spec.open_search.as_ref()
    }
}

impl Source for Naisjob {
    fn name(&self) -> String {
        identity(self).0
    }
    fn namespace(&self) -> String {
        identity(self).1
    }
    fn labels(&self) -> BTreeMap<String, String> {
        self.metadata.labels.clone().unwrap_or_default()
    }
    fn annotations(&self) -> BTreeMap<String, String> {
        self.metadata.annotations.clone().unwrap_or_default()
    }
    fn owner_reference(&self) -> OwnerReference {
        owner_reference_of(self)
    }
    fn hash(&self) -> Result<String> {
        hash::spec_hash(&self.spec, &self.labels())
    }
}

impl Workload for Naisjob {
    fn image(&self) -> &str {
        &self.spec.image
    }
    fn command(&self) -> &[String] {
        &self.spec.command
    }
    fn env(&self) -> &[EnvVar] {
        &self.spec.env
    }
    fn env_from(&self) -> &[EnvFrom] {
        &self.spec.env_from
    }
    fn files_from(&self) -> &[FilesFrom] {
        &self.spec.files_from
    }
    fn resources(&self) -> Option<&ResourceRequirements> {
        self.spec.resources.as_ref()
    }
    fn liveness(&self) -> Option<&Probe> {
        self.spec.liveness.as_ref()
    }
    fn readiness(&self) -> Option<&Probe> {
        self.spec.readiness.as_ref()
    }
    fn port(&self) -> Option<i32> {
        None
    }
    fn termination_grace_period(&self) -> Option<i64> {
        self.spec.termination_grace_period
    }
    fn pre_stop_hook(&self) -> Option<&PreStopHook> {
        self.spec.pre_stop_hook.as_ref()
    }
    fn skip_ca_bundle(&self) -> bool {
        self.spec.skip_ca_bundle
    }
}

impl AccessPolicySource for Naisjob {
    fn access_policy(&self) -> AccessPolicy {
        self.spec.access_policy.clone().unwrap_or_default()
    }
}

impl IngressSource for Naisjob {
    fn ingresses(&self) -> Vec<String> {
        Vec::new()
    }
    fn redirects(&self) -> &[Redirect] {
        &[]
    }
}

impl SecureLogsSource for Naisjob {
    fn secure_logs(&self) -> bool {
        self.spec.secure_logs.as_ref().is_some_and(|s| s.enabled)
    }
}

impl VaultSource for Naisjob {
    fn vault(&self) -> Option<&Vault> {
        self.spec.vault.as_ref()
    }
}

impl WebProxySource for Naisjob {
    fn webproxy(&self) -> bool {
        self.spec.webproxy
    }
}

impl ObservabilitySource for Naisjob {
    fn observability(&self) -> Option<&Observability> {
        self.spec.observability.as_ref()
    }
}

impl GcpSource for Naisjob {
    fn gcp(&self) -> Option<&Gcp> {
        self.spec.gcp.as_ref()
    }
}

impl AzureSource for Naisjob {
    fn azure(&self) -> Option<&Azure> {
        self.spec.azure.as_ref()
    }
}

impl MaskinportenSource for Naisjob {
    fn maskinporten(&self) -> Option<&Maskinporten> {
        self.spec.maskinporten.as_ref()
    }
}

impl AivenSource for Naisjob {
    fn kafka(&self) -> Option<&Kafka> {
        self.spec.kafka.as_ref()
    }
    fn open_search(&self) -> Option<&OpenSearch> {
        self.spec.open_search.as_ref()
    }
}

impl Source for skatteetaten::Application {
    fn name(&self) -> String {
        identity(self).0
    }
    fn namespace(&self) -> String {
        identity(self).1
    }
    fn labels(&self) -> BTreeMap<String, String> {
        self.metadata.labels.clone().unwrap_or_default()
    }
    fn annotations(&self) -> BTreeMap<String, String> {
        self.metadata.annotations.clone().unwrap_or_default()
    }
    fn owner_reference(&self) -> OwnerReference {
        owner_reference_of(self)
    }
    fn hash(&self) -> Result<String> {
        hash::spec_hash(&self.spec, &self.labels())
    }
}

impl Workload for skatteetaten::Application {
    fn image(&self) -> &str {
        &self.spec.pod.image
    }
    fn command(&self) -> &[String] {
        &self.spec.pod.command
    }
    fn env(&self) -> &[EnvVar] {
        &self.spec.pod.env
    }
    fn resources(&self) -> Option<&ResourceRequirements> {
        self.spec.pod.resources.as_ref()
    }
    fn liveness(&self) -> Option<&Probe> {
        self.spec.pod.liveness.as_ref()
    }
    fn readiness(&self) -> Option<&Probe> {
        self.spec.pod.readiness.as_ref()
    }
    fn port(&self) -> Option<i32> {
        Some(self.spec.pod.port.unwrap_or(DEFAULT_PORT))
    }
}

impl ReplicaSource for skatteetaten::Application {
    fn replicas(&self) -> Replicas {
        self.spec.replicas.clone().unwrap_or_default()
    }
    fn strategy(&self) -> &str {
        "RollingUpdate"
    }
}

impl ServiceSource for skatteetaten::Application {
    fn service_port(&self) -> i32 {
        DEFAULT_SERVICE_PORT
    }
    fn service_protocol(&self) -> &str {
        "http"
    }
}

/// Public hosts are served through the mesh gateway, so they count as ingresses
/// when deciding who may reach the pods.
impl IngressSource for skatteetaten::Application {
    fn ingresses(&self) -> Vec<String> {
        self.spec
            .ingress
            .iter()
            .flat_map(|i| i.public.values())
            .filter(|p| p.enabled)
            .map(|p| format!("https://{}", p.host))
            .collect()
    }
    fn redirects(&self) -> &[Redirect] {
        &[]
    }
}

impl AccessPolicySource for skatteetaten::Application {
    fn access_policy(&self) -> AccessPolicy {
        let rule = |application: &str, namespace: &Option<String>| AccessPolicyRule {
            application: application.to_owned(),
            namespace: namespace.clone().unwrap_or_default(),
            cluster: String::new(),
        };

        let inbound = self
            .spec
            .ingress
            .iter()
            .flat_map(|i| i.internal.values())
            .filter(|i| i.enabled)
            .map(|i| rule(&i.application, &i.namespace))
            .collect();

        let egress = self.spec.egress.as_ref();
        let outbound = egress
            .iter()
            .flat_map(|e| e.internal.values())
            .filter(|e| e.enabled)
            .map(|e| rule(&e.application, &e.namespace))
            .collect();
        let external = egress
            .iter()
            .flat_map(|e| e.external.values())
            .filter(|e| e.enabled)
            .map(|e| AccessPolicyExternalRule {
                host: Some(e.host.clone()),
                ipv4: None,
                ports: e
                    .ports
                    .iter()
                    .map(|p| AccessPolicyPort {
                        port: p.port,
                        protocol: Some(p.protocol.clone()),
                    })
                    .collect(),
            })
            .collect();

        AccessPolicy {
            inbound: Some(AccessPolicyInbound { rules: inbound }),
            outbound: Some(AccessPolicyOutbound {
                rules: outbound,
                external,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn object_meta_forces_the_app_label() {
        let mut app = testing::minimal_application();
        app.metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert("app".into(), "something-else".into());
        app.metadata.annotations = Some(BTreeMap::from([(
            CORRELATION_ID_ANNOTATION.to_owned(),
            "corr-1".to_owned(),
        )]));

        let meta = object_meta(&app);
        let labels = meta.labels.unwrap();
        assert_eq!(labels["app"], "myapplication");
        assert_eq!(labels["team"], "myteam");
        assert_eq!(
            meta.annotations.unwrap()[CORRELATION_ID_ANNOTATION],
            "corr-1"
        );
        let owner = &meta.owner_references.unwrap()[0];
        assert_eq!(owner.kind, "Application");
        assert_eq!(owner.api_version, "nais.io/v1alpha1");
        assert_eq!(owner.name, "myapplication");
    }

    #[test]
    fn hash_ignores_annotations() {
        let app = testing::minimal_application();
        let mut annotated = app.clone();
        annotated.metadata.annotations = Some(BTreeMap::from([
            ("kubernetes.io/change-cause".to_owned(), "deploy 42".to_owned()),
            (CORRELATION_ID_ANNOTATION.to_owned(), "abc".to_owned()),
        ]));
        assert_eq!(app.hash().unwrap(), annotated.hash().unwrap());

        let mut changed = app.clone();
        changed.spec.image = "other:1".into();
        assert_ne!(app.hash().unwrap(), changed.hash().unwrap());

        let mut relabeled = app.clone();
        relabeled
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert("extra".into(), "x".into());
        assert_ne!(app.hash().unwrap(), relabeled.hash().unwrap());
    }

    #[test]
    fn skatteetaten_rules_become_an_access_policy() {
        let app = testing::skatteetaten_application();
        let policy = app.access_policy();
        let inbound = policy.inbound.unwrap().rules;
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].application, "frontend");
        let outbound = policy.outbound.unwrap();
        assert_eq!(outbound.rules[0].application, "backend");
        assert_eq!(outbound.rules[0].namespace, "other");
        assert_eq!(outbound.external[0].host.as_deref(), Some("api.example.com"));
        assert_eq!(outbound.external[0].ports[0].port, 443);
    }
}
