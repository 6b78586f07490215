use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::nais_io_v1::*;

pub const DEFAULT_REPLICAS_MIN: i32 = 2;
pub const DEFAULT_REPLICAS_MAX: i32 = 4;

/// A long-running workload owned by a team
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[kube(
    group = "nais.io",
    version = "v1alpha1",
    kind = "Application",
    namespaced,
    shortname = "app",
    printcolumn = r#"{"name":"Team", "type":"string", "jsonPath":".metadata.labels.team"}"#,
    printcolumn = r#"{"name":"Image", "priority": 1, "type":"string", "jsonPath":".spec.image"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    /// Container image, including tag or digest
    pub image: String,
    /// Port the application listens on. Defaults to 8080.
    pub port: Option<i32>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub env_from: Vec<EnvFrom>,
    #[serde(default)]
    pub files_from: Vec<FilesFrom>,
    pub liveness: Option<Probe>,
    pub readiness: Option<Probe>,
    pub startup: Option<Probe>,
    pub resources: Option<ResourceRequirements>,
    pub replicas: Option<Replicas>,
    pub service: Option<Service>,
    pub strategy: Option<Strategy>,
    pub prometheus: Option<Prometheus>,
    /// Full URLs, e.g. `https://myapp.nav.no/path`
    #[serde(default)]
    pub ingresses: Vec<String>,
    #[serde(default)]
    pub redirects: Vec<Redirect>,
    pub access_policy: Option<AccessPolicy>,
    #[serde(default)]
    pub leader_election: bool,
    pub secure_logs: Option<SecureLogs>,
    pub vault: Option<Vault>,
    pub gcp: Option<Gcp>,
    #[serde(rename = "tokenx")]
    pub token_x: Option<TokenX>,
    pub azure: Option<Azure>,
    pub idporten: Option<IdPorten>,
    pub maskinporten: Option<Maskinporten>,
    pub kafka: Option<Kafka>,
    pub open_search: Option<OpenSearch>,
    #[serde(default)]
    pub webproxy: bool,
    pub observability: Option<Observability>,
    pub pre_stop_hook: Option<PreStopHook>,
    pub termination_grace_period: Option<i64>,
    /// Do not mount the platform certificate authority bundle
    #[serde(default)]
    pub skip_ca_bundle: bool,
}

impl Application {
    /// Fill in every value the generators rely on being present.
    pub fn apply_defaults(&mut self) {
        let spec = &mut self.spec;
        let port = *spec.port.get_or_insert(DEFAULT_PORT);

        for probe in [&mut spec.liveness, &mut spec.readiness, &mut spec.startup]
            .into_iter()
            .flatten()
        {
            probe.apply_defaults(port);
        }

        let replicas = spec.replicas.get_or_insert_with(Default::default);
        let min = *replicas.min.get_or_insert(DEFAULT_REPLICAS_MIN);
        let max = replicas.max.get_or_insert(DEFAULT_REPLICAS_MAX);
        if *max < min {
            *max = min;
        }
        replicas.cpu_threshold_percentage.get_or_insert(50);
        replicas.disable_autoscaling.get_or_insert(false);

        let service = spec.service.get_or_insert_with(Default::default);
        service.port.get_or_insert(DEFAULT_SERVICE_PORT);
        service.protocol.get_or_insert_with(|| "http".into());

        spec.strategy
            .get_or_insert_with(Default::default)
            .type_
            .get_or_insert_with(|| "RollingUpdate".into());

        let prometheus = spec.prometheus.get_or_insert_with(Default::default);
        prometheus.path.get_or_insert_with(|| "/metrics".into());
        prometheus.port.get_or_insert_with(|| port.to_string());

        default_resources(spec.resources.get_or_insert_with(Default::default));

        // the login sidecar needs a registered client
        if let Some(azure) = spec.azure.as_mut() {
            if azure.sidecar_enabled() {
                azure
                    .application
                    .get_or_insert_with(Default::default)
                    .enabled = true;
            }
        }

        spec.termination_grace_period.get_or_insert(30);
    }
}

/// Requests of 200m CPU and 256Mi memory, with a 512Mi memory limit
pub(crate) fn default_resources(resources: &mut ResourceRequirements) {
    let requests = resources.requests.get_or_insert_with(BTreeMap::new);
    requests
        .entry("cpu".into())
        .or_insert_with(|| Quantity("200m".into()));
    requests
        .entry("memory".into())
        .or_insert_with(|| Quantity("256Mi".into()));
    resources
        .limits
        .get_or_insert_with(BTreeMap::new)
        .entry("memory".into())
        .or_insert_with(|| Quantity("512Mi".into()));
}
