//! ID-porten login client. Only the login sidecar uses its credentials.

use crate::ast::{Ast, OperationType};
use crate::generators::azure::{CALLBACK_PATH, FRONTCHANNEL_LOGOUT_PATH};
use crate::generators::credential_secret_name;
use crate::options::Options;
use crate::resources::nais_io_v1_clients::{IDPortenClient, IDPortenClientSpec};
use crate::source::{object_meta, IdPortenSource, IngressSource};
use crate::{Error, Result};

fn client_spec(source: &(impl IdPortenSource + IngressSource)) -> Result<IDPortenClientSpec> {
    let ingresses = source.ingresses();
    let base = ingresses
        .first()
        .map(|i| i.trim_end_matches('/').to_owned())
        .ok_or_else(|| {
            Error::InvalidConfiguration("spec.idporten: the application must have an ingress".into())
        })?;
    Ok(IDPortenClientSpec {
        client_uri: base.clone(),
        redirect_uris: ingresses
            .iter()
            .map(|i| format!("{}{CALLBACK_PATH}", i.trim_end_matches('/')))
            .collect(),
        frontchannel_logout_uri: format!("{base}{FRONTCHANNEL_LOGOUT_PATH}"),
        post_logout_redirect_uris: vec![base],
        secret_name: String::new(),
    })
}

pub fn secret_name(source: &(impl IdPortenSource + IngressSource)) -> Result<String> {
    credential_secret_name("idporten", &source.name(), &client_spec(source)?)
}

pub fn create(
    source: &(impl IdPortenSource + IngressSource),
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    let Some(idporten) = source.idporten().filter(|i| i.enabled) else {
        return Ok(());
    };
    if !options.config.features.idporten {
        return Err(Error::InvalidConfiguration(
            "spec.idporten: ID-porten is not available in this cluster".into(),
        ));
    }
    if !idporten.sidecar_enabled() || !options.wonderwall_enabled {
        return Err(Error::InvalidConfiguration(
            "spec.idporten: ID-porten requires the login sidecar".into(),
        ));
    }

    let mut spec = client_spec(source)?;
    spec.secret_name = credential_secret_name("idporten", &source.name(), &spec)?;
    let client = IDPortenClient {
        metadata: object_meta(source),
        spec,
    };
    ast.append_operation(OperationType::CreateOrUpdate, &client)
}
