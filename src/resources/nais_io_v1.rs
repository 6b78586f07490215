//! Types shared by the nais.io workload kinds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: i32 = 8080;
pub const DEFAULT_SERVICE_PORT: i32 = 80;

/// Inbound and outbound traffic rules
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    pub inbound: Option<AccessPolicyInbound>,
    pub outbound: Option<AccessPolicyOutbound>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicyInbound {
    #[serde(default)]
    pub rules: Vec<AccessPolicyRule>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicyOutbound {
    #[serde(default)]
    pub rules: Vec<AccessPolicyRule>,
    #[serde(default)]
    pub external: Vec<AccessPolicyExternalRule>,
}

/// Another workload. Empty namespace and cluster mean "same as mine".
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicyRule {
    /// Name of the application, or `*` for every application in the namespace
    pub application: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub cluster: String,
}

impl AccessPolicyRule {
    pub fn with_defaults(&self, namespace: &str, cluster: &str) -> AccessPolicyRule {
        AccessPolicyRule {
            application: self.application.clone(),
            namespace: if self.namespace.is_empty() {
                namespace.to_owned()
            } else {
                self.namespace.clone()
            },
            cluster: if self.cluster.is_empty() {
                cluster.to_owned()
            } else {
                self.cluster.clone()
            },
        }
    }

    pub fn matches_cluster(&self, cluster: &str) -> bool {
        self.cluster.is_empty() || self.cluster == cluster
    }
}

/// Outbound traffic to something outside the cluster, by host name or IPv4 address
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicyExternalRule {
    pub host: Option<String>,
    pub ipv4: Option<String>,
    #[serde(default)]
    pub ports: Vec<AccessPolicyPort>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicyPort {
    pub port: i32,
    pub protocol: Option<String>,
}

/// HTTP probe against the application
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Probe {
    pub path: String,
    pub port: Option<i32>,
    pub initial_delay: Option<i32>,
    pub period: Option<i32>,
    pub failure_threshold: Option<i32>,
    pub timeout: Option<i32>,
}

impl Probe {
    pub fn apply_defaults(&mut self, port: i32) {
        self.port.get_or_insert(port);
        self.initial_delay.get_or_insert(20);
        self.period.get_or_insert(10);
        self.failure_threshold.get_or_insert(3);
        self.timeout.get_or_insert(1);
    }
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Replicas {
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub cpu_threshold_percentage: Option<i32>,
    pub disable_autoscaling: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub port: Option<i32>,
    pub protocol: Option<String>,
}

/// Deployment strategy, `RollingUpdate` or `Recreate`
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Prometheus {
    #[serde(default)]
    pub enabled: bool,
    pub path: Option<String>,
    pub port: Option<String>,
}

/// Redirect requests for the `from` ingress to the `to` URL
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Redirect {
    pub from: String,
    pub to: String,
    /// The application serving `to`; defaults to this application
    pub target: Option<RedirectTarget>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RedirectTarget {
    pub application: String,
    pub namespace: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvFrom {
    pub config_map: Option<String>,
    pub secret: Option<String>,
}

/// Mount a ConfigMap, Secret, emptyDir or PVC into the container
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilesFrom {
    pub config_map: Option<String>,
    pub secret: Option<String>,
    pub empty_dir: Option<FilesFromEmptyDir>,
    pub persistent_volume_claim: Option<String>,
    pub mount_path: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilesFromEmptyDir {
    /// `Memory` or `Disk`
    pub medium: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreStopHook {
    pub exec: Option<ExecAction>,
    pub http: Option<HttpGetAction>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecAction {
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HttpGetAction {
    pub path: String,
    pub port: Option<i32>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenX {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mount_secrets_as_files_only: bool,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Azure {
    pub application: Option<AzureApplication>,
    pub sidecar: Option<AzureSidecar>,
}

impl Azure {
    pub fn application_enabled(&self) -> bool {
        self.application.as_ref().is_some_and(|a| a.enabled)
    }

    pub fn sidecar_enabled(&self) -> bool {
        self.sidecar.as_ref().is_some_and(|s| s.enabled)
    }
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureApplication {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub reply_urls: Vec<String>,
    pub tenant: Option<String>,
    pub allow_all_users: Option<bool>,
    pub claims: Option<AzureClaims>,
    pub single_page_application: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureClaims {
    #[serde(default)]
    pub groups: Vec<AzureGroup>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureGroup {
    pub id: String,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureSidecar {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub auto_login: bool,
    #[serde(default)]
    pub auto_login_ignore_paths: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdPorten {
    #[serde(default)]
    pub enabled: bool,
    pub sidecar: Option<IdPortenSidecar>,
}

impl IdPorten {
    pub fn sidecar_enabled(&self) -> bool {
        self.enabled && self.sidecar.as_ref().is_some_and(|s| s.enabled)
    }
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IdPortenSidecar {
    #[serde(default)]
    pub enabled: bool,
    /// Required authentication level, e.g. `idporten-loa-high`
    pub level: Option<String>,
    pub locale: Option<String>,
    #[serde(default)]
    pub auto_login: bool,
    #[serde(default)]
    pub auto_login_ignore_paths: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Maskinporten {
    #[serde(default)]
    pub enabled: bool,
    pub scopes: Option<MaskinportenScopes>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaskinportenScopes {
    #[serde(default)]
    pub consumes: Vec<ConsumedScope>,
    #[serde(default)]
    pub exposes: Vec<ExposedScope>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConsumedScope {
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExposedScope {
    pub name: String,
    pub product: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub consumers: Vec<ExposedScopeConsumer>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExposedScopeConsumer {
    pub orgno: String,
    pub name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Vault {
    #[serde(default)]
    pub enabled: bool,
    /// Keep a sidecar running that renews the token
    #[serde(default)]
    pub sidecar: bool,
    #[serde(default)]
    pub paths: Vec<VaultPath>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultPath {
    pub kv_path: String,
    pub mount_path: String,
    /// `env`, `properties`, `yaml`, `json` or `flatten`
    pub format: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecureLogs {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Observability {
    pub auto_instrumentation: Option<AutoInstrumentation>,
    pub logging: Option<Logging>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoInstrumentation {
    #[serde(default)]
    pub enabled: bool,
    /// `java`, `nodejs`, `python`, `dotnet` or `sdk`
    pub runtime: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Logging {
    pub enabled: Option<bool>,
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: String,
}

/// Google Cloud resources owned by the workload
#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Gcp {
    #[serde(default)]
    pub buckets: Vec<CloudStorageBucket>,
    #[serde(default)]
    pub sql_instances: Vec<CloudSqlInstance>,
    #[serde(default)]
    pub permissions: Vec<CloudIamPermission>,
    #[serde(default)]
    pub big_query_datasets: Vec<CloudBigQueryDataset>,
}

impl Gcp {
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
            && self.sql_instances.is_empty()
            && self.permissions.is_empty()
            && self.big_query_datasets.is_empty()
    }
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudStorageBucket {
    pub name: String,
    #[serde(default)]
    pub cascading_delete: bool,
    pub retention_period_days: Option<i32>,
    #[serde(default)]
    pub uniform_bucket_level_access: bool,
    pub public_access_prevention: Option<bool>,
    pub lifecycle_condition: Option<LifecycleCondition>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleCondition {
    pub age: Option<i32>,
    pub created_before: Option<String>,
    pub num_newer_versions: Option<i32>,
    pub with_state: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlInstance {
    /// Database version, e.g. `POSTGRES_16`
    #[serde(rename = "type")]
    pub type_: String,
    /// Defaults to the application name
    pub name: Option<String>,
    pub tier: Option<String>,
    pub disk_size: Option<i32>,
    pub disk_type: Option<String>,
    #[serde(default)]
    pub disk_autoresize: bool,
    #[serde(default)]
    pub high_availability: bool,
    #[serde(default)]
    pub cascading_delete: bool,
    pub point_in_time_recovery: Option<bool>,
    #[serde(default)]
    pub flags: Vec<CloudSqlFlag>,
    #[serde(default)]
    pub databases: Vec<CloudSqlDatabase>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlFlag {
    pub name: String,
    pub value: String,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlDatabase {
    pub name: String,
    /// Prefix of the connection env vars; defaults to `NAIS_DATABASE_<APP>_<DB>`
    pub env_var_prefix: Option<String>,
    /// Extra users besides the default one named after the application
    #[serde(default)]
    pub users: Vec<CloudSqlDatabaseUser>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudSqlDatabaseUser {
    pub name: String,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudIamPermission {
    pub role: String,
    pub resource: CloudIamResource,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudIamResource {
    pub api_version: String,
    pub kind: String,
    pub name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudBigQueryDataset {
    pub name: String,
    /// `READ` or `READWRITE`
    pub permission: String,
    pub description: Option<String>,
    #[serde(default)]
    pub cascading_delete: bool,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Kafka {
    pub pool: String,
    #[serde(default)]
    pub streams: bool,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenSearch {
    pub instance: String,
    /// `read`, `write`, `readwrite` or `admin`
    pub access: Option<String>,
}
