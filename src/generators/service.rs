use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::ast::{Ast, OperationType};
use crate::generators::{app_labels, pod, wonderwall};
use crate::options::Options;
use crate::source::{object_meta, ServiceSource};
use crate::Result;

pub fn create(source: &impl ServiceSource, ast: &mut Ast, options: &Options) -> Result<()> {
    // the login proxy sits in front of the application when enabled
    let target_port = if options.wonderwall_enabled {
        wonderwall::PORT_NAME
    } else {
        pod::PORT_NAME
    };

    let service = Service {
        metadata: object_meta(source),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".into()),
            selector: Some(app_labels(&source.name())),
            ports: Some(vec![ServicePort {
                name: Some(source.service_protocol().to_owned()),
                protocol: Some("TCP".into()),
                port: source.service_port(),
                target_port: Some(IntOrString::String(target_port.into())),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };
    ast.append_operation(OperationType::CreateOrUpdate, &service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn port(options: &Options) -> ServicePort {
        let mut app = testing::minimal_application();
        app.apply_defaults();
        let mut ast = Ast::new();
        create(&app, &mut ast, options).unwrap();
        let service: Service = ast.operations[0].parse().unwrap();
        service.spec.unwrap().ports.unwrap().remove(0)
    }

    #[test]
    fn targets_the_application() {
        let port = port(&testing::options());
        assert_eq!(port.port, 80);
        assert_eq!(port.name.as_deref(), Some("http"));
        assert_eq!(port.target_port, Some(IntOrString::String("http".into())));
    }

    #[test]
    fn targets_wonderwall_when_enabled() {
        let mut options = testing::options();
        options.wonderwall_enabled = true;
        assert_eq!(
            port(&options).target_port,
            Some(IntOrString::String("wonderwall".into()))
        );
    }
}
