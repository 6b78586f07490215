//! The skatteetaten.no Application, an alternate workload shape served by the same engine.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::application::default_resources;
use super::nais_io_v1::{Probe, Replicas, DEFAULT_PORT};

#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[kube(
    group = "skatteetaten.no",
    version = "v1alpha1",
    kind = "Application",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    pub pod: PodConfig,
    pub replicas: Option<Replicas>,
    pub ingress: Option<IngressConfig>,
    pub egress: Option<EgressConfig>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PodConfig {
    pub image: String,
    pub port: Option<i32>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    pub resources: Option<ResourceRequirements>,
    pub liveness: Option<Probe>,
    pub readiness: Option<Probe>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IngressConfig {
    #[serde(default)]
    pub public: BTreeMap<String, PublicIngressConfig>,
    #[serde(default)]
    pub internal: BTreeMap<String, InternalIngressConfig>,
}

fn enabled() -> bool {
    true
}

/// Traffic from outside the mesh through an Istio gateway
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicIngressConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub host: String,
    /// Gateway in `namespace/name` form; looked up from the host when empty
    pub gateway: Option<String>,
    /// Service port to route to. Defaults to 80.
    pub port: Option<i32>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalIngressConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub application: String,
    pub namespace: Option<String>,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EgressConfig {
    #[serde(default)]
    pub internal: BTreeMap<String, InternalEgressConfig>,
    #[serde(default)]
    pub external: BTreeMap<String, ExternalEgressConfig>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalEgressConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub application: String,
    pub namespace: Option<String>,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalEgressConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    pub host: String,
    #[serde(default)]
    pub ports: Vec<PortConfig>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortConfig {
    pub name: String,
    pub port: i32,
    /// `HTTP`, `HTTPS`, `TCP` or `GRPC`
    pub protocol: String,
}

impl Application {
    pub fn apply_defaults(&mut self) {
        let spec = &mut self.spec;
        let port = *spec.pod.port.get_or_insert(DEFAULT_PORT);
        for probe in [&mut spec.pod.liveness, &mut spec.pod.readiness]
            .into_iter()
            .flatten()
        {
            probe.apply_defaults(port);
        }
        default_resources(spec.pod.resources.get_or_insert_with(Default::default));

        let replicas = spec.replicas.get_or_insert_with(Default::default);
        let min = *replicas.min.get_or_insert(2);
        let max = replicas.max.get_or_insert(4);
        if *max < min {
            *max = min;
        }
        replicas.cpu_threshold_percentage.get_or_insert(80);
        replicas.disable_autoscaling.get_or_insert(false);

        if let Some(ingress) = spec.ingress.as_mut() {
            for public in ingress.public.values_mut() {
                public.port.get_or_insert(80);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing;

    #[test]
    fn defaults() {
        let mut app = testing::skatteetaten_application();
        app.apply_defaults();
        assert_eq!(app.spec.pod.port, Some(8080));
        let replicas = app.spec.replicas.as_ref().unwrap();
        assert_eq!(replicas.cpu_threshold_percentage, Some(80));
        let public = &app.spec.ingress.as_ref().unwrap().public["web"];
        assert_eq!(public.port, Some(80));
    }
}
