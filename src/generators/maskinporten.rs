use crate::ast::{Ast, OperationType};
use crate::generators::{credential_secret_name, mount_credential_secret};
use crate::options::Options;
use crate::resources::nais_io_v1_clients::{MaskinportenClient, MaskinportenClientSpec};
use crate::source::{object_meta, MaskinportenSource};
use crate::{Error, Result};

pub const MOUNT_PATH: &str = "/var/run/secrets/nais.io/maskinporten";

/// Norwegian organization numbers are nine digits
fn valid_orgno(orgno: &str) -> bool {
    orgno.len() == 9 && orgno.bytes().all(|b| b.is_ascii_digit())
}

pub fn create(source: &impl MaskinportenSource, ast: &mut Ast, options: &Options) -> Result<()> {
    let Some(maskinporten) = source.maskinporten().filter(|m| m.enabled) else {
        return Ok(());
    };
    if !options.config.features.maskinporten {
        return Err(Error::InvalidConfiguration(
            "spec.maskinporten: Maskinporten is not available in this cluster".into(),
        ));
    }

    let scopes = maskinporten.scopes.clone().unwrap_or_default();
    for (i, scope) in scopes.exposes.iter().enumerate() {
        for (j, consumer) in scope.consumers.iter().enumerate() {
            if !valid_orgno(&consumer.orgno) {
                return Err(Error::InvalidConfiguration(format!(
                    "spec.maskinporten.scopes.exposes[{i}].consumers[{j}]: {:?} is not an organization number",
                    consumer.orgno
                )));
            }
        }
    }

    let secret_name = credential_secret_name("maskinporten", &source.name(), &scopes)?;
    let client = MaskinportenClient {
        metadata: object_meta(source),
        spec: MaskinportenClientSpec {
            scopes,
            secret_name: secret_name.clone(),
        },
    };
    ast.append_operation(OperationType::CreateOrUpdate, &client)?;
    mount_credential_secret(ast, &secret_name, MOUNT_PATH, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::{
        ConsumedScope, ExposedScope, ExposedScopeConsumer, Maskinporten, MaskinportenScopes,
    };
    use crate::testing;

    fn job(orgno: &str) -> crate::resources::naisjob::Naisjob {
        let mut job = testing::minimal_naisjob();
        job.spec.maskinporten = Some(Maskinporten {
            enabled: true,
            scopes: Some(MaskinportenScopes {
                consumes: vec![ConsumedScope {
                    name: "nav:some/scope".into(),
                }],
                exposes: vec![ExposedScope {
                    name: "api".into(),
                    product: "arbeid".into(),
                    enabled: true,
                    consumers: vec![ExposedScopeConsumer {
                        orgno: orgno.into(),
                        name: None,
                    }],
                }],
            }),
        });
        job
    }

    #[test]
    fn client_and_secret() {
        let mut ast = Ast::new();
        create(&job("889640782"), &mut ast, &testing::options()).unwrap();
        let client: MaskinportenClient = ast.operations[0].parse().unwrap();
        assert_eq!(client.spec.scopes.consumes[0].name, "nav:some/scope");
        assert!(client.spec.secret_name.starts_with("maskinporten-mynaisjob-"));
        assert_eq!(ast.volume_mounts[0].mount_path, MOUNT_PATH);
    }

    #[test]
    fn rejects_bad_organization_numbers() {
        let err = create(&job("12345"), &mut Ast::new(), &testing::options()).unwrap_err();
        assert!(err.to_string().contains("consumers[0]"));
    }
}
