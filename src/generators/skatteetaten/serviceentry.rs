use crate::ast::{Ast, OperationType};
use crate::namegen::{short_name, DNS_LABEL_MAX};
use crate::options::Options;
use crate::resources::istio::{ServiceEntry, ServiceEntryPort, ServiceEntrySpec};
use crate::resources::skatteetaten::{Application, PortConfig};
use crate::source::{named_object_meta, Source};
use crate::Result;

fn default_ports() -> Vec<ServiceEntryPort> {
    vec![ServiceEntryPort {
        number: 443,
        name: "https".into(),
        protocol: "HTTPS".into(),
    }]
}

fn port(port: &PortConfig) -> ServiceEntryPort {
    ServiceEntryPort {
        number: port.port,
        name: port.name.clone(),
        protocol: port.protocol.clone(),
    }
}

/// Registers every enabled external egress host with the mesh
pub fn create(app: &Application, ast: &mut Ast, _options: &Options) -> Result<()> {
    let name = app.name();
    let Some(egress) = app.spec.egress.as_ref() else {
        return Ok(());
    };
    for (key, external) in egress.external.iter().filter(|(_, e)| e.enabled) {
        let ports = if external.ports.is_empty() {
            default_ports()
        } else {
            external.ports.iter().map(port).collect()
        };
        let entry = ServiceEntry {
            metadata: named_object_meta(app, short_name(&format!("{name}-{key}"), DNS_LABEL_MAX)?),
            spec: ServiceEntrySpec {
                hosts: vec![external.host.clone()],
                // visible to this namespace only
                export_to: vec![".".into()],
                location: "MESH_EXTERNAL".into(),
                resolution: "DNS".into(),
                ports,
            },
        };
        ast.append_operation(OperationType::CreateOrUpdate, &entry)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::skatteetaten::ExternalEgressConfig;
    use crate::testing;

    #[test]
    fn one_entry_per_external_host() {
        let mut app = testing::skatteetaten_application();
        if let Some(egress) = app.spec.egress.as_mut() {
            egress.external.insert(
                "disabled".into(),
                ExternalEgressConfig {
                    enabled: false,
                    host: "old.example.com".into(),
                    ports: vec![],
                },
            );
            egress.external.insert(
                "ftp".into(),
                ExternalEgressConfig {
                    enabled: true,
                    host: "ftp.example.com".into(),
                    ports: vec![],
                },
            );
        }
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();

        let names: Vec<_> = ast.operations.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["myapp-api", "myapp-ftp"]);

        let api: ServiceEntry = ast.operations[0].parse().unwrap();
        assert_eq!(api.spec.hosts, vec!["api.example.com"]);
        assert_eq!(api.spec.location, "MESH_EXTERNAL");
        let ftp: ServiceEntry = ast.operations[1].parse().unwrap();
        assert_eq!(ftp.spec.ports, default_ports());
    }
}
