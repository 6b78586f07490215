//! Azure AD app registration, provisioned by azurerator.

use crate::ast::{Ast, OperationType};
use crate::generators::{credential_secret_name, mount_credential_secret};
use crate::options::Options;
use crate::resources::nais_io_v1_clients::{
    AzureAdApplication, AzureAdApplicationSpec, AzureAdClaims, AzureAdGroup, AzureAdReplyUrl,
};
use crate::source::{object_meta, AccessPolicySource, AzureSource, IngressSource};
use crate::{Error, Result};

pub const MOUNT_PATH: &str = "/var/run/secrets/nais.io/azure";
pub const CALLBACK_PATH: &str = "/oauth2/callback";
pub const FRONTCHANNEL_LOGOUT_PATH: &str = "/oauth2/logout/frontchannel";

/// The registration, without the secret name derived from it
fn client_spec(
    source: &(impl AzureSource + AccessPolicySource + IngressSource),
    options: &Options,
) -> AzureAdApplicationSpec {
    let azure = source.azure().cloned().unwrap_or_default();
    let application = azure.application.clone().unwrap_or_default();
    let ingresses: Vec<String> = source
        .ingresses()
        .iter()
        .map(|i| i.trim_end_matches('/').to_owned())
        .collect();

    let mut reply_urls: Vec<String> = application.reply_urls.clone();
    if azure.sidecar_enabled() {
        reply_urls.extend(ingresses.iter().map(|i| format!("{i}{CALLBACK_PATH}")));
    }

    let namespace = source.namespace();
    let cluster = &options.config.cluster_name;
    let pre_authorized_applications = source
        .access_policy()
        .inbound
        .map(|i| i.rules)
        .unwrap_or_default()
        .iter()
        .map(|r| r.with_defaults(&namespace, cluster))
        .collect();

    AzureAdApplicationSpec {
        reply_urls: reply_urls
            .into_iter()
            .map(|url| AzureAdReplyUrl { url })
            .collect(),
        pre_authorized_applications,
        tenant: application.tenant.clone(),
        claims: application.claims.as_ref().map(|c| AzureAdClaims {
            groups: c
                .groups
                .iter()
                .map(|g| AzureAdGroup { id: g.id.clone() })
                .collect(),
        }),
        allow_all_users: application.allow_all_users,
        single_page_application: application.single_page_application,
        logout_url: azure
            .sidecar_enabled()
            .then(|| ingresses.first().map(|i| format!("{i}{FRONTCHANNEL_LOGOUT_PATH}")))
            .flatten(),
        secret_name: String::new(),
    }
}

/// Name of the credential secret, shared with the login sidecar
pub fn secret_name(
    source: &(impl AzureSource + AccessPolicySource + IngressSource),
    options: &Options,
) -> Result<String> {
    credential_secret_name("azure", &source.name(), &client_spec(source, options))
}

pub fn create(
    source: &(impl AzureSource + AccessPolicySource + IngressSource),
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    if !source.azure().is_some_and(|a| a.application_enabled()) {
        return Ok(());
    }
    if !options.config.features.azurerator {
        return Err(Error::InvalidConfiguration(
            "spec.azure: Azure AD is not available in this cluster".into(),
        ));
    }

    let mut spec = client_spec(source, options);
    let secret_name = credential_secret_name("azure", &source.name(), &spec)?;
    spec.secret_name = secret_name.clone();
    let application = AzureAdApplication {
        metadata: object_meta(source),
        spec,
    };
    ast.append_operation(OperationType::CreateOrUpdate, &application)?;
    mount_credential_secret(ast, &secret_name, MOUNT_PATH, false)
}
