//! Kafka and OpenSearch credentials, provisioned by aivenator into one secret.

use k8s_openapi::api::core::v1::{EnvFromSource, SecretEnvSource};

use crate::ast::{Ast, OperationType};
use crate::generators::{credential_secret_name, mount_credential_secret};
use crate::options::Options;
use crate::resources::nais_io_v1_clients::{AivenApplication, AivenApplicationSpec};
use crate::source::{object_meta, AivenSource};
use crate::{Error, Result};

pub mod kafka;
pub mod opensearch;

pub fn create(source: &impl AivenSource, ast: &mut Ast, options: &Options) -> Result<()> {
    let kafka = kafka::spec(source)?;
    let open_search = opensearch::spec(source)?;
    if kafka.is_none() && open_search.is_none() {
        return Ok(());
    }
    if !options.config.features.aiven {
        return Err(Error::InvalidConfiguration(
            "Aiven services are not available in this cluster".into(),
        ));
    }

    let mut spec = AivenApplicationSpec {
        kafka,
        open_search,
        secret_name: String::new(),
    };
    let secret_name = credential_secret_name("aiven", &source.name(), &spec)?;
    spec.secret_name = secret_name.clone();
    let has_kafka = spec.kafka.is_some();

    let application = AivenApplication {
        metadata: object_meta(source),
        spec,
    };
    ast.append_operation(OperationType::CreateOrUpdate, &application)?;

    if has_kafka {
        // clients read the keystores from files
        mount_credential_secret(ast, &secret_name, kafka::MOUNT_PATH, false)?;
        ast.add_env(
            "KAFKA_CREDSTORE_PASSWORD_PATH",
            format!("{}/KAFKA_CREDSTORE_PASSWORD", kafka::MOUNT_PATH),
        );
    } else {
        ast.env_from.push(EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: secret_name,
                optional: None,
            }),
            ..Default::default()
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::{Kafka, OpenSearch};
    use crate::testing;

    #[test]
    fn one_secret_for_both_services() {
        let mut app = testing::minimal_application();
        app.spec.kafka = Some(Kafka {
            pool: "nav-dev".into(),
            streams: true,
        });
        app.spec.open_search = Some(OpenSearch {
            instance: "logs".into(),
            access: Some("readwrite".into()),
        });
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();

        let application: AivenApplication = ast.operations[0].parse().unwrap();
        assert!(application.spec.secret_name.starts_with("aiven-myapplication-"));
        assert!(application.spec.kafka.unwrap().streams);
        assert_eq!(
            application.spec.open_search.unwrap().instance,
            "opensearch-mynamespace-logs"
        );
        assert_eq!(ast.volume_mounts[0].mount_path, kafka::MOUNT_PATH);
        assert_eq!(ast.env_from.len(), 1);
    }

    #[test]
    fn opensearch_access_is_validated() {
        let mut job = testing::minimal_naisjob();
        job.spec.open_search = Some(OpenSearch {
            instance: "logs".into(),
            access: Some("superuser".into()),
        });
        let err = create(&job, &mut Ast::new(), &testing::options()).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn opensearch_only_is_env_only() {
        let mut job = testing::minimal_naisjob();
        job.spec.open_search = Some(OpenSearch {
            instance: "logs".into(),
            access: None,
        });
        let mut ast = Ast::new();
        create(&job, &mut ast, &testing::options()).unwrap();
        assert!(ast.volume_mounts.is_empty());
        assert_eq!(ast.env_from.len(), 1);
    }
}
