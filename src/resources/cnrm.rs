//! Google Config Connector resources.
//! Only the fields this engine sets are modelled.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const PROJECT_ID_ANNOTATION: &str = "cnrm.cloud.google.com/project-id";
pub const DELETION_POLICY_ANNOTATION: &str = "cnrm.cloud.google.com/deletion-policy";
pub const DELETION_POLICY_ABANDON: &str = "abandon";

/// Reference to another Config Connector object, or an external GCP resource
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<String>,
}

/// API: iam.cnrm.cloud.google.com/v1beta1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "iam.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "IAMServiceAccount",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IAMServiceAccountSpec {
    pub display_name: String,
}

/// API: iam.cnrm.cloud.google.com/v1beta1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "iam.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "IAMPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IAMPolicySpec {
    pub resource_ref: ResourceRef,
    pub bindings: Vec<IAMPolicyBinding>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IAMPolicyBinding {
    pub role: String,
    pub members: Vec<String>,
}

/// API: iam.cnrm.cloud.google.com/v1beta1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "iam.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "IAMPolicyMember",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct IAMPolicyMemberSpec {
    pub member: String,
    pub role: String,
    pub resource_ref: ResourceRef,
}

/// API: sql.cnrm.cloud.google.com/v1beta1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "sql.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "SQLInstance",
    namespaced
)]
#[serde(rename_all = "camelCase", default)]
pub struct SQLInstanceSpec {
    pub database_version: String,
    pub region: String,
    pub settings: SQLInstanceSettings,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SQLInstanceSettings {
    pub tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i32>,
    pub disk_type: String,
    pub disk_autoresize: bool,
    /// `REGIONAL` or `ZONAL`
    pub availability_type: String,
    pub backup_configuration: SQLInstanceBackupConfiguration,
    #[serde(default)]
    pub database_flags: Vec<SQLInstanceFlag>,
    pub ip_configuration: SQLInstanceIpConfiguration,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SQLInstanceBackupConfiguration {
    pub enabled: bool,
    pub start_time: String,
    pub point_in_time_recovery_enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SQLInstanceFlag {
    pub name: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SQLInstanceIpConfiguration {
    pub require_ssl: bool,
}

/// API: sql.cnrm.cloud.google.com/v1beta1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "sql.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "SQLDatabase",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SQLDatabaseSpec {
    pub instance_ref: ResourceRef,
}

/// API: sql.cnrm.cloud.google.com/v1beta1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "sql.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "SQLUser",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SQLUserSpec {
    /// The database user name, when it differs from the object name
    #[serde(rename = "resourceID")]
    pub resource_id: String,
    pub instance_ref: ResourceRef,
    pub password: SQLUserPassword,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SQLUserPassword {
    pub value_from: SQLUserPasswordSource,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SQLUserPasswordSource {
    pub secret_key_ref: SecretKeyRef,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

/// API: storage.cnrm.cloud.google.com/v1beta1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "storage.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "StorageBucket",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucketSpec {
    pub location: String,
    pub uniform_bucket_level_access: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_access_prevention: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_policy: Option<StorageBucketRetentionPolicy>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub lifecycle_rule: Vec<StorageBucketLifecycleRule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucketRetentionPolicy {
    pub retention_period: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucketLifecycleRule {
    pub action: StorageBucketLifecycleAction,
    pub condition: StorageBucketLifecycleCondition,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucketLifecycleAction {
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucketLifecycleCondition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_before: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_newer_versions: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_state: Option<String>,
}

/// API: storage.cnrm.cloud.google.com/v1beta1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "storage.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "StorageBucketAccessControl",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct StorageBucketAccessControlSpec {
    pub bucket_ref: ResourceRef,
    pub entity: String,
    pub role: String,
}

/// API: bigquery.cnrm.cloud.google.com/v1beta1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "bigquery.cnrm.cloud.google.com",
    version = "v1beta1",
    kind = "BigQueryDataset",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct BigQueryDatasetSpec {
    #[serde(rename = "resourceID")]
    pub resource_id: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub access: Vec<BigQueryDatasetAccess>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BigQueryDatasetAccess {
    pub role: String,
    pub user_by_email: String,
}
