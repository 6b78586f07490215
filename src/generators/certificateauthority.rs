use k8s_openapi::api::core::v1::{ConfigMapVolumeSource, Volume, VolumeMount};

use crate::ast::Ast;
use crate::options::Options;
use crate::source::Workload;
use crate::Result;

pub const PEM_CONFIGMAP: &str = "ca-bundle-pem";
pub const JKS_CONFIGMAP: &str = "ca-bundle-jks";

const JAVA_TRUSTSTORE: &str = "/etc/ssl/certs/java/cacerts";

/// Mount the platform CA bundle over the usual distribution paths
pub fn create(source: &impl Workload, ast: &mut Ast, _options: &Options) -> Result<()> {
    if source.skip_ca_bundle() {
        return Ok(());
    }

    let mounts = [
        (PEM_CONFIGMAP, "ca-bundle.pem", "/etc/ssl/certs/ca-certificates.crt"),
        (PEM_CONFIGMAP, "ca-bundle.pem", "/etc/pki/tls/certs/ca-bundle.crt"),
        (PEM_CONFIGMAP, "ca-bundle.pem", "/etc/ssl/ca-bundle.pem"),
        (JKS_CONFIGMAP, "ca-bundle.jks", JAVA_TRUSTSTORE),
    ];
    for (configmap, key, path) in mounts {
        ast.add_volume(
            Volume {
                name: configmap.into(),
                config_map: Some(ConfigMapVolumeSource {
                    name: configmap.into(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            VolumeMount {
                name: configmap.into(),
                mount_path: path.into(),
                sub_path: Some(key.into()),
                read_only: Some(true),
                ..Default::default()
            },
        )?;
    }

    ast.add_env("NAV_TRUSTSTORE_PATH", JAVA_TRUSTSTORE);
    ast.add_env("NAV_TRUSTSTORE_PASSWORD", "changeme");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn mounted_by_default() {
        let app = testing::minimal_application();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();
        assert_eq!(ast.volumes.len(), 2);
        assert_eq!(ast.volume_mounts.len(), 4);
        assert!(ast.env.iter().any(|e| e.name == "NAV_TRUSTSTORE_PATH"));
    }

    #[test]
    fn can_be_skipped() {
        let mut app = testing::minimal_application();
        app.spec.skip_ca_bundle = true;
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();
        assert!(ast.volumes.is_empty());
        assert!(ast.env.is_empty());
    }
}
