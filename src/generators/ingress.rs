//! Ingresses for the workload's public URLs, and redirect ingresses.
//!
//! Hosts are grouped by the ingress class their domain maps to, giving one
//! Ingress per class.

use std::collections::BTreeMap;

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ServiceBackendPort,
};
use tracing::debug;
use url::Url;

use crate::ast::{Ast, OperationType};
use crate::namegen::{short_name, DNS_LABEL_MAX};
use crate::options::Options;
use crate::source::{named_object_meta, IngressSource, ServiceSource};
use crate::{Error, Result};

pub const USE_REGEX_ANNOTATION: &str = "nginx.ingress.kubernetes.io/use-regex";
pub const PERMANENT_REDIRECT_ANNOTATION: &str = "nginx.ingress.kubernetes.io/permanent-redirect";

/// A validated ingress URL
struct Route {
    class: String,
    host: String,
    path: String,
}

impl Route {
    fn parse(field: &str, raw: &str, options: &Options) -> Result<Self> {
        let url = Url::parse(raw).map_err(|source| Error::InvalidUrl {
            field: field.to_owned(),
            url: raw.to_owned(),
            source,
        })?;
        if url.scheme() != "https" {
            return Err(Error::InvalidConfiguration(format!(
                "{field}: {raw:?} must use https"
            )));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::InvalidConfiguration(format!("{field}: {raw:?} has no host")))?;
        let class = options.config.ingress_class_for_host(host).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "{field}: the domain of {host:?} is not served by any ingress class in this cluster"
            ))
        })?;

        Ok(Route {
            class: class.to_owned(),
            host: host.to_owned(),
            path: url.path().trim_end_matches('/').to_owned(),
        })
    }

    /// Matches the path itself and everything below it
    fn rule(&self, service: &str, port: i32) -> IngressRule {
        let path = match self.path.as_str() {
            "" => "/.*".to_owned(),
            path => format!("{path}(/.*)?"),
        };
        IngressRule {
            host: Some(self.host.clone()),
            http: Some(HTTPIngressRuleValue {
                paths: vec![HTTPIngressPath {
                    path: Some(path),
                    path_type: "ImplementationSpecific".into(),
                    backend: IngressBackend {
                        service: Some(IngressServiceBackend {
                            name: service.to_owned(),
                            port: Some(ServiceBackendPort {
                                number: Some(port),
                                name: None,
                            }),
                        }),
                        resource: None,
                    },
                }],
            }),
        }
    }
}

fn ingress(
    source: &impl IngressSource,
    name: String,
    class: &str,
    rules: Vec<IngressRule>,
    extra_annotations: &[(&str, &str)],
) -> Ingress {
    let mut metadata = named_object_meta(source, name);
    let annotations = metadata.annotations.get_or_insert_with(BTreeMap::new);
    annotations.insert(USE_REGEX_ANNOTATION.into(), "true".into());
    for (k, v) in extra_annotations {
        annotations.insert((*k).to_owned(), (*v).to_owned());
    }
    Ingress {
        metadata,
        spec: Some(IngressSpec {
            ingress_class_name: Some(class.to_owned()),
            rules: Some(rules),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn create(
    source: &(impl IngressSource + ServiceSource),
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    let app = source.name();
    let port = source.service_port();

    let mut by_class: BTreeMap<String, Vec<IngressRule>> = BTreeMap::new();
    for (i, raw) in source.ingresses().iter().enumerate() {
        let route = Route::parse(&format!("spec.ingresses[{i}]"), raw, options)?;
        by_class
            .entry(route.class.clone())
            .or_default()
            .push(route.rule(&app, port));
    }
    for (class, rules) in by_class {
        let name = short_name(&format!("{app}-{class}"), DNS_LABEL_MAX)?;
        debug!(%name, hosts = rules.len(), "ingress");
        let ingress = ingress(source, name, &class, rules, &[]);
        ast.append_operation(OperationType::CreateOrUpdate, &ingress)?;
    }

    redirects(source, ast, options)
}

fn redirects(
    source: &(impl IngressSource + ServiceSource),
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    let app = source.name();
    let namespace = source.namespace();

    for (i, redirect) in source.redirects().iter().enumerate() {
        let field = format!("spec.redirects[{i}]");
        let from = Route::parse(&format!("{field}.from"), &redirect.from, options)?;
        Url::parse(&redirect.to).map_err(|e| Error::InvalidUrl {
            field: format!("{field}.to"),
            url: redirect.to.clone(),
            source: e,
        })?;

        if let Some(target) = &redirect.target {
            let target_namespace = target.namespace.clone().unwrap_or_else(|| namespace.clone());
            let allowed = target_namespace == namespace
                || options
                    .allowed_redirect_targets
                    .contains(&(target_namespace.clone(), target.application.clone()));
            if !allowed {
                return Err(Error::InvalidConfiguration(format!(
                    "{field}: {target_namespace}/{} does not accept redirects from namespace {namespace}",
                    target.application
                )));
            }
        }

        let name = short_name(&format!("{app}-{}-redirect", from.host), DNS_LABEL_MAX)?;
        let ingress = ingress(
            source,
            name,
            &from.class,
            vec![from.rule(&app, source.service_port())],
            &[(PERMANENT_REDIRECT_ANNOTATION, redirect.to.as_str())],
        );
        ast.append_operation(OperationType::CreateOrUpdate, &ingress)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::{Redirect, RedirectTarget};
    use crate::testing;

    fn run(ingresses: &[&str]) -> Result<Ast> {
        let mut app = testing::minimal_application();
        app.spec.ingresses = ingresses.iter().map(|s| s.to_string()).collect();
        app.apply_defaults();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options())?;
        Ok(ast)
    }

    #[test]
    fn one_ingress_per_class() {
        let ast = run(&[
            "https://myapplication.nav.no/api/",
            "https://www.nav.no/myapplication",
            "https://myapplication.intern.nav.no",
        ])
        .unwrap();
        assert_eq!(ast.operations.len(), 2);

        let internal: Ingress = ast.operations[0].parse().unwrap();
        assert_eq!(internal.metadata.name.as_deref(), Some("myapplication-nais-ingress"));
        let external: Ingress = ast.operations[1].parse().unwrap();
        assert_eq!(
            external.metadata.name.as_deref(),
            Some("myapplication-nais-ingress-external")
        );
        let spec = external.spec.unwrap();
        assert_eq!(spec.ingress_class_name.as_deref(), Some("nais-ingress-external"));
        let rules = spec.rules.unwrap();
        assert_eq!(rules.len(), 2);
        let path = &rules[0].http.as_ref().unwrap().paths[0];
        assert_eq!(path.path.as_deref(), Some("/api(/.*)?"));
        let backend = path.backend.service.as_ref().unwrap();
        assert_eq!(backend.name, "myapplication");
        assert_eq!(backend.port.as_ref().unwrap().number, Some(80));
        assert_eq!(
            external.metadata.annotations.unwrap()[USE_REGEX_ANNOTATION],
            "true"
        );
    }

    #[test]
    fn root_path_matches_everything() {
        let ast = run(&["https://myapplication.intern.nav.no"]).unwrap();
        let ingress: Ingress = ast.operations[0].parse().unwrap();
        let rules = ingress.spec.unwrap().rules.unwrap();
        assert_eq!(
            rules[0].http.as_ref().unwrap().paths[0].path.as_deref(),
            Some("/.*")
        );

        let ast = run(&["https://myapplication.intern.nav.no/"]).unwrap();
        let ingress: Ingress = ast.operations[0].parse().unwrap();
        let rules = ingress.spec.unwrap().rules.unwrap();
        assert_eq!(
            rules[0].http.as_ref().unwrap().paths[0].path.as_deref(),
            Some("/.*")
        );
    }

    #[test]
    fn invalid_ingresses() {
        let err = run(&["https://myapplication.example.com"]).unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("spec.ingresses[0]"));

        let err = run(&["http://myapplication.nav.no"]).unwrap_err();
        assert!(err.to_string().contains("https"));

        let err = run(&["not a url"]).unwrap_err();
        assert_eq!(err.metric_label(), "InvalidUrl");
    }

    #[test]
    fn redirects_need_an_accepting_target() {
        let mut app = testing::minimal_application();
        app.spec.redirects = vec![Redirect {
            from: "https://old.nav.no".into(),
            to: "https://new.nav.no".into(),
            target: Some(RedirectTarget {
                application: "newapp".into(),
                namespace: Some("other".into()),
            }),
        }];
        app.apply_defaults();

        let mut options = testing::options();
        let err = create(&app, &mut Ast::new(), &options).unwrap_err();
        assert!(err.is_user_error());

        options
            .allowed_redirect_targets
            .insert(("other".into(), "newapp".into()));
        let mut ast = Ast::new();
        create(&app, &mut ast, &options).unwrap();
        let redirect: Ingress = testing::find(&ast.operations, "Ingress").parse().unwrap();
        assert_eq!(
            redirect.metadata.annotations.unwrap()[PERMANENT_REDIRECT_ANNOTATION],
            "https://new.nav.no"
        );
    }
}
