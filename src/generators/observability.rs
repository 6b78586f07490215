use crate::ast::Ast;
use crate::namegen::is_dns_label;
use crate::options::Options;
use crate::resources::nais_io_v1::{AutoInstrumentation, Logging};
use crate::source::{ObservabilitySource, Source};
use crate::{Error, Result};

const RUNTIMES: [&str; 5] = ["java", "nodejs", "python", "dotnet", "sdk"];

pub const OTEL_LABEL: &str = "otel";
const LOG_FLOW_LABEL_PREFIX: &str = "logs.nais.io/flow-";

pub fn create(source: &impl ObservabilitySource, ast: &mut Ast, options: &Options) -> Result<()> {
    let Some(observability) = source.observability() else {
        return Ok(());
    };
    if let Some(auto) = observability.auto_instrumentation.as_ref().filter(|a| a.enabled) {
        auto_instrumentation(source, auto, ast, options)?;
    }
    if let Some(logging) = &observability.logging {
        log_flows(logging, ast)?;
    }
    Ok(())
}

fn auto_instrumentation(
    source: &impl Source,
    auto: &AutoInstrumentation,
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    let runtime = auto.runtime.as_deref().unwrap_or_default();
    if !RUNTIMES.contains(&runtime) {
        return Err(Error::InvalidConfiguration(format!(
            "spec.observability.autoInstrumentation.runtime: {runtime:?} is not one of {}",
            RUNTIMES.join(", ")
        )));
    }

    // sdk means the application instruments itself and only needs the endpoint
    if runtime != "sdk" {
        ast.annotations.insert(
            format!("instrumentation.opentelemetry.io/inject-{runtime}"),
            options.config.observability.auto_instrumentation.clone(),
        );
        ast.annotations.insert(
            "instrumentation.opentelemetry.io/container-names".into(),
            source.name(),
        );
    }
    ast.labels.insert(OTEL_LABEL.into(), "enabled".into());

    let name = source.name();
    let namespace = source.namespace();
    ast.add_env("OTEL_SERVICE_NAME", &name);
    ast.add_env(
        "OTEL_RESOURCE_ATTRIBUTES",
        format!(
            "service.name={name},service.namespace={namespace},k8s.namespace.name={namespace},nais.io/team={}",
            options.team
        ),
    );
    ast.add_env(
        "OTEL_EXPORTER_OTLP_ENDPOINT",
        &options.config.observability.otel_collector_endpoint,
    );
    ast.add_env("OTEL_EXPORTER_OTLP_PROTOCOL", "grpc");
    Ok(())
}

fn log_flows(logging: &Logging, ast: &mut Ast) -> Result<()> {
    if logging.enabled == Some(false) {
        ast.labels
            .insert(format!("{LOG_FLOW_LABEL_PREFIX}default"), "false".into());
        return Ok(());
    }
    for destination in &logging.destinations {
        if !is_dns_label(&destination.id) {
            return Err(Error::InvalidConfiguration(format!(
                "spec.observability.logging.destinations: invalid id {:?}",
                destination.id
            )));
        }
        ast.labels.insert(
            format!("{LOG_FLOW_LABEL_PREFIX}{}", destination.id),
            "true".into(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::{Destination, Observability};
    use crate::testing;

    fn run(observability: Observability) -> Result<Ast> {
        let mut app = testing::minimal_application();
        app.spec.observability = Some(observability);
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options())?;
        Ok(ast)
    }

    fn auto(runtime: &str) -> Observability {
        Observability {
            auto_instrumentation: Some(AutoInstrumentation {
                enabled: true,
                runtime: Some(runtime.into()),
            }),
            logging: None,
        }
    }

    #[test]
    fn java_is_injected() {
        let ast = run(auto("java")).unwrap();
        assert_eq!(
            ast.annotations["instrumentation.opentelemetry.io/inject-java"],
            "nais-system/nais"
        );
        assert_eq!(ast.labels[OTEL_LABEL], "enabled");
        assert!(ast.env.iter().any(|e| e.name == "OTEL_EXPORTER_OTLP_ENDPOINT"));
    }

    #[test]
    fn sdk_only_gets_the_environment() {
        let ast = run(auto("sdk")).unwrap();
        assert!(ast.annotations.is_empty());
        assert!(ast.env.iter().any(|e| e.name == "OTEL_SERVICE_NAME"));
    }

    #[test]
    fn unknown_runtime_fails() {
        let err = run(auto("cobol")).unwrap_err();
        assert!(err.is_user_error());
    }

    #[test]
    fn log_destinations_become_labels() {
        let ast = run(Observability {
            auto_instrumentation: None,
            logging: Some(Logging {
                enabled: None,
                destinations: vec![Destination { id: "loki".into() }],
            }),
        })
        .unwrap();
        assert_eq!(ast.labels["logs.nais.io/flow-loki"], "true");

        let ast = run(Observability {
            auto_instrumentation: None,
            logging: Some(Logging {
                enabled: Some(false),
                destinations: vec![],
            }),
        })
        .unwrap();
        assert_eq!(ast.labels["logs.nais.io/flow-default"], "false");
    }
}
