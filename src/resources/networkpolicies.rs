//! Network policy flavours beyond the core NetworkPolicy

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Egress to host names, resolved by the GKE FQDN network policy controller
/// API: networking.gke.io/v1alpha3
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "networking.gke.io",
    version = "v1alpha3",
    kind = "FQDNNetworkPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct FQDNNetworkPolicySpec {
    pub pod_selector: LabelSelector,
    pub policy_types: Vec<String>,
    pub egress: Vec<FQDNNetworkPolicyEgressRule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FQDNNetworkPolicyEgressRule {
    pub ports: Vec<FQDNNetworkPolicyPort>,
    pub to: Vec<FQDNNetworkPolicyPeer>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FQDNNetworkPolicyPort {
    pub port: i32,
    pub protocol: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FQDNNetworkPolicyPeer {
    pub fqdns: Vec<String>,
}

/// API: cilium.io/v2
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(
    group = "cilium.io",
    version = "v2",
    kind = "CiliumNetworkPolicy",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct CiliumNetworkPolicySpec {
    pub endpoint_selector: LabelSelector,
    pub ingress: Vec<CiliumIngressRule>,
    pub egress: Vec<CiliumEgressRule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CiliumIngressRule {
    pub from_endpoints: Vec<LabelSelector>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub to_ports: Vec<CiliumPortRule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CiliumEgressRule {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub to_endpoints: Vec<LabelSelector>,
    #[serde(rename = "toFQDNs", skip_serializing_if = "Vec::is_empty", default)]
    pub to_fqdns: Vec<CiliumFqdnSelector>,
    #[serde(rename = "toCIDR", skip_serializing_if = "Vec::is_empty", default)]
    pub to_cidr: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub to_ports: Vec<CiliumPortRule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CiliumFqdnSelector {
    pub match_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CiliumPortRule {
    pub ports: Vec<CiliumPort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<CiliumL7Rules>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CiliumPort {
    pub port: String,
    pub protocol: String,
}

/// DNS visibility, needed for toFQDNs to resolve
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CiliumL7Rules {
    pub dns: Vec<CiliumDnsRule>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CiliumDnsRule {
    pub match_pattern: String,
}
