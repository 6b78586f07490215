//! The login sidecar.
//!
//! Wonderwall sits in front of the application: the Service targets its port
//! and it forwards authenticated requests to the application on localhost.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvFromSource, EnvVar, HTTPGetAction, Probe, ResourceRequirements,
    SecretEnvSource,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::ast::Ast;
use crate::generators::{azure, idporten, restricted_security_context};
use crate::options::Options;
use crate::source::{AccessPolicySource, AzureSource, IdPortenSource, IngressSource, Workload};
use crate::{Error, Result};

pub const PORT_NAME: &str = "wonderwall";
pub const PORT: i32 = 7564;
pub const METRICS_PORT: i32 = 7565;
const CONTAINER_NAME: &str = "wonderwall";

struct Provider {
    name: &'static str,
    secret_name: String,
    auto_login: bool,
    auto_login_ignore_paths: Vec<String>,
    extra_env: Vec<(&'static str, String)>,
}

fn provider(
    source: &(impl AzureSource + IdPortenSource + IngressSource + AccessPolicySource),
    options: &Options,
) -> Result<Option<Provider>> {
    if let Some(sidecar) = source
        .azure()
        .and_then(|a| a.sidecar.as_ref())
        .filter(|s| s.enabled)
    {
        return Ok(Some(Provider {
            name: "azure",
            secret_name: azure::secret_name(source, options)?,
            auto_login: sidecar.auto_login,
            auto_login_ignore_paths: sidecar.auto_login_ignore_paths.clone(),
            extra_env: Vec::new(),
        }));
    }
    if let Some(sidecar) = source
        .idporten()
        .filter(|i| i.sidecar_enabled())
        .and_then(|i| i.sidecar.as_ref())
    {
        let mut extra_env = Vec::new();
        if let Some(level) = &sidecar.level {
            extra_env.push(("WONDERWALL_OPENID_ACR_VALUES", level.clone()));
        }
        if let Some(locale) = &sidecar.locale {
            extra_env.push(("WONDERWALL_OPENID_UI_LOCALES", locale.clone()));
        }
        return Ok(Some(Provider {
            name: "idporten",
            secret_name: idporten::secret_name(source)?,
            auto_login: sidecar.auto_login,
            auto_login_ignore_paths: sidecar.auto_login_ignore_paths.clone(),
            extra_env,
        }));
    }
    Ok(None)
}

pub fn create(
    source: &(impl Workload + AzureSource + IdPortenSource + IngressSource + AccessPolicySource),
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    if !options.wonderwall_enabled {
        return Ok(());
    }
    let Some(provider) = provider(source, options)? else {
        return Ok(());
    };
    let ingresses = source.ingresses();
    if ingresses.is_empty() {
        return Err(Error::InvalidConfiguration(
            "the login sidecar requires at least one ingress".into(),
        ));
    }
    let upstream_port = source
        .port()
        .ok_or_else(|| Error::Internal("the login sidecar needs an application port".into()))?;

    let mut env = vec![
        ("WONDERWALL_OPENID_PROVIDER", provider.name.to_owned()),
        ("WONDERWALL_INGRESS", ingresses.join(",")),
        ("WONDERWALL_UPSTREAM_HOST", format!("127.0.0.1:{upstream_port}")),
        ("WONDERWALL_BIND_ADDRESS", format!("0.0.0.0:{PORT}")),
        ("WONDERWALL_METRICS_BIND_ADDRESS", format!("0.0.0.0:{METRICS_PORT}")),
        ("WONDERWALL_AUTO_LOGIN", provider.auto_login.to_string()),
    ];
    if !provider.auto_login_ignore_paths.is_empty() {
        env.push((
            "WONDERWALL_AUTO_LOGIN_IGNORE_PATHS",
            provider.auto_login_ignore_paths.join(","),
        ));
    }
    env.extend(provider.extra_env);

    ast.containers.push(Container {
        name: CONTAINER_NAME.into(),
        image: Some(options.config.images.wonderwall.clone()),
        env: Some(
            env.into_iter()
                .map(|(name, value)| EnvVar {
                    name: name.into(),
                    value: Some(value),
                    value_from: None,
                })
                .collect(),
        ),
        env_from: Some(vec![EnvFromSource {
            secret_ref: Some(SecretEnvSource {
                name: provider.secret_name,
                optional: None,
            }),
            ..Default::default()
        }]),
        ports: Some(vec![
            ContainerPort {
                name: Some(PORT_NAME.into()),
                container_port: PORT,
                protocol: Some("TCP".into()),
                ..Default::default()
            },
            ContainerPort {
                name: Some("ww-metrics".into()),
                container_port: METRICS_PORT,
                protocol: Some("TCP".into()),
                ..Default::default()
            },
        ]),
        readiness_probe: Some(Probe {
            http_get: Some(HTTPGetAction {
                path: Some("/oauth2/ping".into()),
                port: IntOrString::String(PORT_NAME.into()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        resources: Some(ResourceRequirements {
            requests: Some(BTreeMap::from([
                ("cpu".to_owned(), Quantity("20m".into())),
                ("memory".to_owned(), Quantity("32Mi".into())),
            ])),
            limits: Some(BTreeMap::from([(
                "memory".to_owned(),
                Quantity("256Mi".into()),
            )])),
            ..Default::default()
        }),
        security_context: Some(restricted_security_context()),
        image_pull_policy: Some("IfNotPresent".into()),
        ..Default::default()
    });
    Ok(())
}
