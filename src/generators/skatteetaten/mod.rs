//! Istio resources for skatteetaten.no Applications, which run inside the mesh
//! and are reached through Istio gateways rather than ingress controllers.

use crate::options::Options;
use crate::{Error, Result};

pub mod authorizationpolicy;
pub mod serviceentry;
pub mod virtualservice;

/// SPIFFE identity of the workloads running as `service_account` in `namespace`
pub(crate) fn principal(namespace: &str, service_account: &str) -> String {
    format!("cluster.local/ns/{namespace}/sa/{service_account}")
}

/// The gateway serving `host`, as `namespace/name`.
///
/// An explicit gateway is used as given. Otherwise the host is looked up in the
/// gateway mappings, which must point at a gateway rather than an ingress class.
pub(crate) fn gateway(field: &str, host: &str, explicit: Option<&str>, options: &Options) -> Result<String> {
    if let Some(gateway) = explicit.filter(|g| !g.is_empty()) {
        return Ok(gateway.to_owned());
    }
    match options.config.ingress_class_for_host(host) {
        Some(gateway) if gateway.contains('/') => Ok(gateway.to_owned()),
        Some(class) => Err(Error::InvalidConfiguration(format!(
            "{field}: host {host:?} is served by ingress class {class:?}, which is not an Istio gateway"
        ))),
        None => Err(Error::InvalidConfiguration(format!(
            "{field}: no gateway serves host {host:?}"
        ))),
    }
}
