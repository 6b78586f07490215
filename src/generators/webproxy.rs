use url::Url;

use crate::ast::Ast;
use crate::options::Options;
use crate::source::WebProxySource;
use crate::{Error, Result};

pub fn create(source: &impl WebProxySource, ast: &mut Ast, options: &Options) -> Result<()> {
    if !source.webproxy() {
        return Ok(());
    }
    let proxy = &options.config.proxy;
    let address = match &proxy.address {
        Some(address) if options.config.features.webproxy => address,
        _ => {
            return Err(Error::InvalidConfiguration(
                "spec.webproxy: no web proxy is available in this cluster".into(),
            ))
        }
    };
    let url = Url::parse(address).map_err(|source| Error::InvalidUrl {
        field: "proxy.address".into(),
        url: address.clone(),
        source,
    })?;
    let host = url.host_str().unwrap_or_default();
    let port = url.port_or_known_default().unwrap_or(80);
    let no_proxy = proxy.exclude.join(",");

    for name in ["HTTP_PROXY", "http_proxy", "HTTPS_PROXY", "https_proxy"] {
        ast.add_env(name, address);
    }
    ast.add_env("NO_PROXY", &no_proxy);
    ast.add_env("no_proxy", &no_proxy);

    // java wants wildcards instead of leading dots
    let non_proxy_hosts = proxy
        .exclude
        .iter()
        .map(|h| match h.strip_prefix('.') {
            Some(domain) => format!("*.{domain}"),
            None => h.clone(),
        })
        .collect::<Vec<_>>()
        .join("|");
    ast.add_env(
        "JAVA_PROXY_OPTIONS",
        format!(
            "-Dhttp.proxyHost={host} -Dhttps.proxyHost={host} -Dhttp.proxyPort={port} -Dhttps.proxyPort={port} -Dhttp.nonProxyHosts={non_proxy_hosts}"
        ),
    );
    Ok(())
}
