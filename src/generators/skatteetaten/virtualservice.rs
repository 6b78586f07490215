use crate::ast::{Ast, OperationType};
use crate::namegen::{short_name, DNS_LABEL_MAX};
use crate::options::Options;
use crate::resources::istio::{
    Destination, HttpRoute, HttpRouteDestination, PortSelector, VirtualService, VirtualServiceSpec,
};
use crate::resources::nais_io_v1::DEFAULT_SERVICE_PORT;
use crate::resources::skatteetaten::Application;
use crate::source::{named_object_meta, Source};
use crate::Result;

use super::gateway;

/// One VirtualService per enabled public ingress, routing the host to the Service.
pub fn create(app: &Application, ast: &mut Ast, options: &Options) -> Result<()> {
    let name = app.name();
    let service_host = format!("{name}.{}.svc.cluster.local", app.namespace());
    let Some(ingress) = app.spec.ingress.as_ref() else {
        return Ok(());
    };

    for (key, public) in ingress.public.iter().filter(|(_, p)| p.enabled) {
        let field = format!("spec.ingress.public.{key}");
        let gateway = gateway(&field, &public.host, public.gateway.as_deref(), options)?;
        let virtual_service = VirtualService {
            metadata: named_object_meta(app, short_name(&format!("{name}-{key}"), DNS_LABEL_MAX)?),
            spec: VirtualServiceSpec {
                hosts: vec![public.host.clone()],
                gateways: vec![gateway],
                http: vec![HttpRoute {
                    route: vec![HttpRouteDestination {
                        destination: Destination {
                            host: service_host.clone(),
                            port: PortSelector {
                                number: public.port.unwrap_or(DEFAULT_SERVICE_PORT),
                            },
                        },
                        weight: 100,
                    }],
                }],
            },
        };
        ast.append_operation(OperationType::CreateOrUpdate, &virtual_service)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn routes_public_hosts_through_the_gateway() {
        let mut app = testing::skatteetaten_application();
        app.apply_defaults();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();

        assert_eq!(ast.operations.len(), 1);
        let vs: VirtualService = ast.operations[0].parse().unwrap();
        assert_eq!(vs.metadata.name.as_deref(), Some("myapp-web"));
        assert_eq!(vs.spec.hosts, vec!["myapp.skatteetaten.no"]);
        assert_eq!(vs.spec.gateways, vec!["istio-system/public"]);
        let destination = &vs.spec.http[0].route[0].destination;
        assert_eq!(destination.host, "myapp.aura.svc.cluster.local");
        assert_eq!(destination.port.number, 80);
    }

    #[test]
    fn unmapped_host_is_rejected() {
        let mut app = testing::skatteetaten_application();
        if let Some(ingress) = app.spec.ingress.as_mut() {
            ingress.public.get_mut("web").unwrap().host = "myapp.example.org".into();
        }
        let err = create(&app, &mut Ast::new(), &testing::options()).unwrap_err();
        assert!(err.to_string().contains("spec.ingress.public.web"));
    }
}
