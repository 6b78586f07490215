use k8s_openapi::api::core::v1::{
    ConfigMapEnvSource, EnvFromSource, EnvVar, EnvVarSource, ObjectFieldSelector, SecretEnvSource,
};

use crate::ast::Ast;
use crate::options::Options;
use crate::source::Workload;
use crate::{Error, Result};

/// Platform variables first, then the workload's own, which win on name clashes.
pub fn create(source: &impl Workload, ast: &mut Ast, options: &Options) -> Result<()> {
    let name = source.name();
    let namespace = source.namespace();
    let cluster = &options.config.cluster_name;

    ast.add_env("NAIS_APP_NAME", &name);
    ast.add_env("NAIS_NAMESPACE", &namespace);
    ast.add_env("NAIS_APP_IMAGE", source.image());
    ast.add_env("NAIS_CLUSTER_NAME", cluster);
    ast.add_env("NAIS_CLIENT_ID", format!("{cluster}:{namespace}:{name}"));
    ast.add_env("LOG4J_FORMAT_MSG_NO_LOOKUPS", "true");
    ast.set_env(EnvVar {
        name: "NAIS_POD_NAME".into(),
        value: None,
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: "metadata.name".into(),
                api_version: None,
            }),
            ..Default::default()
        }),
    });
    if let Some(port) = source.port() {
        ast.add_env("PORT", port.to_string());
        ast.add_env("BIND_ADDRESS", format!("0.0.0.0:{port}"));
    }

    for var in source.env() {
        ast.set_env(var.clone());
    }

    for (i, env_from) in source.env_from().iter().enumerate() {
        let env_from = match (&env_from.config_map, &env_from.secret) {
            (Some(config_map), None) => EnvFromSource {
                config_map_ref: Some(ConfigMapEnvSource {
                    name: config_map.clone(),
                    optional: None,
                }),
                ..Default::default()
            },
            (None, Some(secret)) => EnvFromSource {
                secret_ref: Some(SecretEnvSource {
                    name: secret.clone(),
                    optional: None,
                }),
                ..Default::default()
            },
            _ => {
                return Err(Error::InvalidConfiguration(format!(
                    "spec.envFrom[{i}]: exactly one of configMap and secret must be set"
                )))
            }
        };
        ast.env_from.push(env_from);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::EnvFrom;
    use crate::testing;

    fn value<'a>(ast: &'a Ast, name: &str) -> Option<&'a str> {
        ast.env
            .iter()
            .find(|e| e.name == name)
            .and_then(|e| e.value.as_deref())
    }

    #[test]
    fn platform_variables() {
        let mut app = testing::minimal_application();
        app.apply_defaults();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();

        assert_eq!(value(&ast, "NAIS_APP_NAME"), Some("myapplication"));
        assert_eq!(
            value(&ast, "NAIS_CLIENT_ID"),
            Some("mycluster:mynamespace:myapplication")
        );
        assert_eq!(value(&ast, "PORT"), Some("8080"));
        assert_eq!(value(&ast, "BIND_ADDRESS"), Some("0.0.0.0:8080"));
        let pod_name = ast.env.iter().find(|e| e.name == "NAIS_POD_NAME").unwrap();
        assert!(pod_name.value_from.is_some());
    }

    #[test]
    fn workload_env_overrides_platform_env() {
        let mut app = testing::minimal_application();
        app.spec.env = vec![
            EnvVar {
                name: "NAIS_CLUSTER_NAME".into(),
                value: Some("elsewhere".into()),
                value_from: None,
            },
            EnvVar {
                name: "FOO".into(),
                value: Some("bar".into()),
                value_from: None,
            },
        ];
        app.apply_defaults();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();
        assert_eq!(value(&ast, "NAIS_CLUSTER_NAME"), Some("elsewhere"));
        assert_eq!(value(&ast, "FOO"), Some("bar"));
        assert_eq!(
            ast.env
                .iter()
                .filter(|e| e.name == "NAIS_CLUSTER_NAME")
                .count(),
            1
        );
    }

    #[test]
    fn jobs_have_no_port() {
        let mut job = testing::minimal_naisjob();
        job.apply_defaults();
        let mut ast = Ast::new();
        create(&job, &mut ast, &testing::options()).unwrap();
        assert_eq!(value(&ast, "PORT"), None);
    }

    #[test]
    fn env_from_needs_exactly_one_source() {
        let mut app = testing::minimal_application();
        app.spec.env_from = vec![
            EnvFrom {
                config_map: Some("cm".into()),
                secret: None,
            },
            EnvFrom::default(),
        ];
        let mut ast = Ast::new();
        let err = create(&app, &mut ast, &testing::options()).unwrap_err();
        assert!(err.to_string().contains("spec.envFrom[1]"));
    }
}
