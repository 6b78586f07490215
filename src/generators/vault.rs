//! Vault secrets, fetched by init containers into a shared in-memory volume.

use k8s_openapi::api::core::v1::{Container, EmptyDirVolumeSource, EnvVar, Volume, VolumeMount};

use crate::ast::Ast;
use crate::generators::restricted_security_context;
use crate::options::Options;
use crate::resources::nais_io_v1::VaultPath;
use crate::source::VaultSource;
use crate::{Error, Result};

pub const VOLUME_NAME: &str = "vault-volume";
pub const DEFAULT_MOUNT_PATH: &str = "/var/run/secrets/nais.io/vault";
const FORMATS: [&str; 5] = ["env", "properties", "yaml", "json", "flatten"];

pub fn create(source: &impl VaultSource, ast: &mut Ast, options: &Options) -> Result<()> {
    let Some(vault) = source.vault().filter(|v| v.enabled) else {
        return Ok(());
    };
    let config = &options.config;
    if !config.features.vault {
        return Err(Error::InvalidConfiguration(
            "spec.vault: vault is not available in this cluster".into(),
        ));
    }

    let app = source.name();
    let default_path = VaultPath {
        kv_path: format!(
            "{}/{}/{}",
            config.vault.kv_path.trim_end_matches('/'),
            app,
            source.namespace()
        ),
        mount_path: DEFAULT_MOUNT_PATH.into(),
        format: None,
    };
    let mut paths = vec![default_path];
    paths.extend(vault.paths.iter().cloned());

    ast.add_pod_volume(Volume {
        name: VOLUME_NAME.into(),
        empty_dir: Some(EmptyDirVolumeSource {
            medium: Some("Memory".into()),
            ..Default::default()
        }),
        ..Default::default()
    });

    for (i, path) in paths.iter().enumerate() {
        let field = format!("spec.vault.paths[{}]", i.saturating_sub(1));
        let format = path.format.as_deref().unwrap_or("flatten");
        if !FORMATS.contains(&format) {
            return Err(Error::InvalidConfiguration(format!(
                "{field}: unknown format {format:?}"
            )));
        }
        if paths[..i].iter().any(|p| p.mount_path == path.mount_path) {
            return Err(Error::InvalidConfiguration(format!(
                "{field}: mount path {:?} is already in use by another vault path",
                path.mount_path
            )));
        }
        let sub_path = sub_path(&path.mount_path);
        ast.add_volume_mount(VolumeMount {
            name: VOLUME_NAME.into(),
            mount_path: path.mount_path.clone(),
            sub_path: Some(sub_path.clone()),
            ..Default::default()
        })?;
        ast.init_containers.push(sidekick(
            &format!("vks-init-{i}"),
            &app,
            path,
            format,
            &sub_path,
            options,
            true,
        ));
    }

    if vault.sidecar {
        // keeps the token renewed while the pod runs
        ast.containers.push(sidekick(
            "vks-sidecar",
            &app,
            &paths[0],
            "flatten",
            &sub_path(&paths[0].mount_path),
            options,
            false,
        ));
    }

    ast.add_env("VAULT_TOKEN_PATH", format!("{DEFAULT_MOUNT_PATH}/vault_token"));
    Ok(())
}

/// Name of the directory inside the shared volume backing `mount_path`
fn sub_path(mount_path: &str) -> String {
    mount_path.trim_matches('/').replace('/', "-")
}

fn sidekick(
    name: &str,
    app: &str,
    path: &VaultPath,
    format: &str,
    sub_path: &str,
    options: &Options,
    one_shot: bool,
) -> Container {
    let vault = &options.config.vault;
    let mut args = vec![
        format!("-v={}", vault.address),
        format!("-auth={}", vault.auth_path),
        format!("-role={app}"),
        format!("-secret={}", path.kv_path),
        format!("-format={format}"),
        format!("-output=/vault/{sub_path}"),
    ];
    if one_shot {
        args.push("-one-shot".into());
    } else {
        args.push("-renew-token".into());
    }
    Container {
        name: name.into(),
        image: Some(options.config.images.vault_sidekick.clone()),
        args: Some(args),
        env: Some(vec![EnvVar {
            name: "VAULT_ADDR".into(),
            value: Some(vault.address.clone()),
            value_from: None,
        }]),
        volume_mounts: Some(vec![VolumeMount {
            name: VOLUME_NAME.into(),
            mount_path: format!("/vault/{sub_path}"),
            sub_path: Some(sub_path.to_owned()),
            ..Default::default()
        }]),
        security_context: Some(restricted_security_context()),
        image_pull_policy: Some("IfNotPresent".into()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::Vault;
    use crate::testing;

    fn app(vault: Vault) -> crate::resources::application::Application {
        let mut app = testing::minimal_application();
        app.spec.vault = Some(vault);
        app
    }

    #[test]
    fn default_and_extra_paths() {
        let app = app(Vault {
            enabled: true,
            sidecar: true,
            paths: vec![VaultPath {
                kv_path: "/serviceuser/data/dev/srvmyapp".into(),
                mount_path: "/secrets/serviceuser".into(),
                format: None,
            }],
        });
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();

        assert_eq!(ast.init_containers.len(), 2);
        assert_eq!(ast.init_containers[1].name, "vks-init-1");
        let args = ast.init_containers[0].args.as_ref().unwrap();
        assert!(args.contains(&"-secret=/kv/preprod/fss/myapplication/mynamespace".to_owned()));
        assert_eq!(ast.volume_mounts.len(), 2);
        assert_eq!(ast.volume_mounts[0].mount_path, DEFAULT_MOUNT_PATH);
        assert_eq!(
            ast.volume_mounts[1].sub_path.as_deref(),
            Some("secrets-serviceuser")
        );
        assert_eq!(ast.volumes.len(), 1);
        assert_eq!(ast.containers[0].name, "vks-sidecar");
    }

    #[test]
    fn unknown_format() {
        let app = app(Vault {
            enabled: true,
            sidecar: false,
            paths: vec![VaultPath {
                kv_path: "/a".into(),
                mount_path: "/b".into(),
                format: Some("xml".into()),
            }],
        });
        let err = create(&app, &mut Ast::new(), &testing::options()).unwrap_err();
        assert!(err.to_string().contains("spec.vault.paths[0]"));
    }

    #[test]
    fn secrets_may_not_share_a_mount_path() {
        let path = |kv: &str, mount: &str| VaultPath {
            kv_path: kv.into(),
            mount_path: mount.into(),
            format: None,
        };

        let shadows_default = app(Vault {
            enabled: true,
            sidecar: false,
            paths: vec![path("/serviceuser/data/dev/srvmyapp", DEFAULT_MOUNT_PATH)],
        });
        let err = create(&shadows_default, &mut Ast::new(), &testing::options()).unwrap_err();
        assert!(err.is_user_error());
        assert!(err.to_string().contains("spec.vault.paths[0]"));

        let same_mount = app(Vault {
            enabled: true,
            sidecar: false,
            paths: vec![
                path("/serviceuser/data/dev/srvmyapp", "/secrets/shared"),
                path("/certificate/data/dev/myapp", "/secrets/shared"),
            ],
        });
        let err = create(&same_mount, &mut Ast::new(), &testing::options()).unwrap_err();
        assert!(err.to_string().contains("spec.vault.paths[1]"));
    }
}
