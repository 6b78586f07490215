use k8s_openapi::api::core::v1::ContainerPort;

use crate::ast::{Ast, OperationType};
use crate::generators::{label_selector, pod};
use crate::options::Options;
use crate::resources::podmonitors::{PodMetricsEndpoint, PodMonitor, PodMonitorSpec};
use crate::source::{object_meta, PrometheusSource, Workload, APP_LABEL, TEAM_LABEL};
use crate::{Error, Result};

pub const METRICS_PORT_NAME: &str = "metrics";

pub fn create(
    source: &(impl PrometheusSource + Workload),
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    if !options.config.features.prometheus_operator {
        return Ok(());
    }
    let metadata = object_meta(source);
    let Some(prometheus) = source.prometheus().filter(|p| p.enabled) else {
        return ast.append_operation(
            OperationType::DeleteIfExists,
            &PodMonitor {
                metadata,
                spec: Default::default(),
            },
        );
    };

    let port = match prometheus.port.as_deref() {
        None => source.port(),
        Some(port) => Some(port.parse::<i32>().map_err(|_| {
            Error::InvalidConfiguration(format!("spec.prometheus.port: {port:?} is not a port number"))
        })?),
    };
    let port_name = if port.is_none() || port == source.port() {
        pod::PORT_NAME
    } else {
        // scraped on a separate port, which the main container has to expose
        let name = source.name();
        let main = ast
            .containers
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::Internal(format!("no main container named {name}")))?;
        main.ports.get_or_insert_with(Vec::new).push(ContainerPort {
            name: Some(METRICS_PORT_NAME.into()),
            container_port: port.unwrap_or_default(),
            protocol: Some("TCP".into()),
            ..Default::default()
        });
        METRICS_PORT_NAME
    };

    let monitor = PodMonitor {
        metadata,
        spec: PodMonitorSpec {
            job_label: APP_LABEL.into(),
            pod_target_labels: vec![TEAM_LABEL.into(), APP_LABEL.into()],
            pod_metrics_endpoints: vec![PodMetricsEndpoint {
                port: port_name.into(),
                path: prometheus.path.clone().unwrap_or_else(|| "/metrics".into()),
                honor_labels: false,
            }],
            selector: label_selector(source),
        },
    };
    ast.append_operation(OperationType::CreateOrUpdate, &monitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::Prometheus;
    use crate::testing;

    fn run(prometheus: Option<Prometheus>) -> Ast {
        let mut app = testing::minimal_application();
        app.spec.prometheus = prometheus;
        app.apply_defaults();
        let options = testing::options();
        let mut ast = Ast::new();
        pod::create(&app, &mut ast, &options).unwrap();
        create(&app, &mut ast, &options).unwrap();
        ast
    }

    #[test]
    fn scrapes_the_application_port() {
        let ast = run(Some(Prometheus {
            enabled: true,
            ..Default::default()
        }));
        let monitor: PodMonitor = testing::find(&ast.operations, "PodMonitor").parse().unwrap();
        assert_eq!(monitor.spec.pod_metrics_endpoints[0].port, "http");
        assert_eq!(monitor.spec.pod_metrics_endpoints[0].path, "/metrics");
        assert_eq!(ast.containers[0].ports.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn separate_metrics_port_is_exposed() {
        let ast = run(Some(Prometheus {
            enabled: true,
            path: Some("/internal/metrics".into()),
            port: Some("9090".into()),
        }));
        let monitor: PodMonitor = testing::find(&ast.operations, "PodMonitor").parse().unwrap();
        assert_eq!(monitor.spec.pod_metrics_endpoints[0].port, "metrics");
        let ports = ast.containers[0].ports.as_ref().unwrap();
        assert_eq!(ports[1].container_port, 9090);
    }

    #[test]
    fn removed_when_disabled() {
        let ast = run(None);
        assert_eq!(
            testing::kinds(&ast.operations),
            vec![("PodMonitor", OperationType::DeleteIfExists)]
        );
    }
}
