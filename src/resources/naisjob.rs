use k8s_openapi::api::core::v1::{EnvVar, ResourceRequirements};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::application::default_resources;
use super::nais_io_v1::*;

/// A run-to-completion workload, either once or on a schedule
#[derive(CustomResource, Deserialize, Serialize, Clone, Default, Debug, JsonSchema)]
#[kube(
    group = "nais.io",
    version = "v1alpha1",
    kind = "Naisjob",
    namespaced,
    shortname = "nj",
    printcolumn = r#"{"name":"Team", "type":"string", "jsonPath":".metadata.labels.team"}"#,
    printcolumn = r#"{"name":"Schedule", "type":"string", "jsonPath":".spec.schedule"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NaisjobSpec {
    pub image: String,
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
    pub resources: Option<ResourceRequirements>,
    /// Cron expression. Without it the job runs once.
    pub schedule: Option<String>,
    pub time_zone: Option<String>,
    pub backoff_limit: Option<i32>,
    pub active_deadline_seconds: Option<i64>,
    pub ttl_seconds_after_finished: Option<i32>,
    /// `Allow`, `Forbid` or `Replace`
    pub concurrency_policy: Option<String>,
    pub successful_jobs_history_limit: Option<i32>,
    pub failed_jobs_history_limit: Option<i32>,
    /// `Never` or `OnFailure`
    pub restart_policy: Option<String>,
    pub access_policy: Option<AccessPolicy>,
    pub secure_logs: Option<SecureLogs>,
    pub vault: Option<Vault>,
    pub gcp: Option<Gcp>,
    pub azure: Option<Azure>,
    pub maskinporten: Option<Maskinporten>,
    pub kafka: Option<Kafka>,
    pub open_search: Option<OpenSearch>,
    #[serde(default)]
    pub webproxy: bool,
    pub observability: Option<Observability>,
    pub pre_stop_hook: Option<PreStopHook>,
    pub termination_grace_period: Option<i64>,
    #[serde(default)]
    pub skip_ca_bundle: bool,
}

impl Naisjob {
    pub fn apply_defaults(&mut self) {
        let spec = &mut self.spec;
        for probe in [&mut spec.liveness, &mut spec.readiness]
            .into_iter()
            .flatten()
        {
            probe.apply_defaults(DEFAULT_PORT);
        }
        spec.backoff_limit.get_or_insert(6);
        spec.concurrency_policy
            .get_or_insert_with(|| "Allow".into());
        spec.successful_jobs_history_limit.get_or_insert(3);
        spec.failed_jobs_history_limit.get_or_insert(1);
        spec.restart_policy.get_or_insert_with(|| "Never".into());
        spec.termination_grace_period.get_or_insert(30);
        default_resources(spec.resources.get_or_insert_with(Default::default));
    }
}

#[cfg(test)]
mod tests {
    use crate::testing;

    #[test]
    fn defaults() {
        let mut job = testing::minimal_naisjob();
        job.apply_defaults();
        assert_eq!(job.spec.backoff_limit, Some(6));
        assert_eq!(job.spec.restart_policy.as_deref(), Some("Never"));
        assert_eq!(job.spec.concurrency_policy.as_deref(), Some("Allow"));
        assert!(job.spec.schedule.is_none());
    }
}
