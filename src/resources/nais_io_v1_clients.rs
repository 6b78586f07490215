//! Identity and credential clients handled by the nais operators
//! (jwker, azurerator, digdirator, aivenator).
//! Only the fields this engine sets are modelled.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::nais_io_v1::{AccessPolicyRule, MaskinportenScopes};

/// TokenX client, API: nais.io/v1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "nais.io", version = "v1", kind = "Jwker", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct JwkerSpec {
    pub access_policy: JwkerAccessPolicy,
    pub secret_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JwkerAccessPolicy {
    pub inbound: JwkerRules,
    pub outbound: JwkerRules,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JwkerRules {
    pub rules: Vec<AccessPolicyRule>,
}

/// Azure AD app registration, API: nais.io/v1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "nais.io", version = "v1", kind = "AzureAdApplication", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct AzureAdApplicationSpec {
    pub reply_urls: Vec<AzureAdReplyUrl>,
    pub pre_authorized_applications: Vec<AccessPolicyRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<AzureAdClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_all_users: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single_page_application: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logout_url: Option<String>,
    pub secret_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureAdReplyUrl {
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureAdClaims {
    pub groups: Vec<AzureAdGroup>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureAdGroup {
    pub id: String,
}

/// ID-porten login client, API: nais.io/v1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "nais.io", version = "v1", kind = "IDPortenClient", namespaced)]
pub struct IDPortenClientSpec {
    #[serde(rename = "clientURI")]
    pub client_uri: String,
    #[serde(rename = "redirectURIs")]
    pub redirect_uris: Vec<String>,
    #[serde(rename = "frontchannelLogoutURI")]
    pub frontchannel_logout_uri: String,
    #[serde(rename = "postLogoutRedirectURIs")]
    pub post_logout_redirect_uris: Vec<String>,
    #[serde(rename = "secretName")]
    pub secret_name: String,
}

/// Maskinporten client, API: nais.io/v1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "nais.io", version = "v1", kind = "MaskinportenClient", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct MaskinportenClientSpec {
    pub scopes: MaskinportenScopes,
    pub secret_name: String,
}

/// Aiven credentials, API: aiven.nais.io/v1
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[kube(group = "aiven.nais.io", version = "v1", kind = "AivenApplication", namespaced)]
#[serde(rename_all = "camelCase")]
pub struct AivenApplicationSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kafka: Option<AivenKafka>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_search: Option<AivenOpenSearch>,
    pub secret_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AivenKafka {
    pub pool: String,
    /// Kafka Streams needs extra ACLs for its internal topics
    #[serde(default)]
    pub streams: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AivenOpenSearch {
    pub instance: String,
    pub access: String,
}
