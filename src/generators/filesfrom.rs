use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, EmptyDirVolumeSource, PersistentVolumeClaimVolumeSource,
    SecretVolumeSource, Volume, VolumeMount,
};

use crate::ast::Ast;
use crate::namegen::{short_name, DNS_LABEL_MAX};
use crate::options::Options;
use crate::resources::nais_io_v1::FilesFrom;
use crate::source::Workload;
use crate::{Error, Result};

pub fn create(source: &impl Workload, ast: &mut Ast, _options: &Options) -> Result<()> {
    for (i, files) in source.files_from().iter().enumerate() {
        let (volume, default_path) = volume(files)
            .map_err(|e| Error::InvalidConfiguration(format!("spec.filesFrom[{i}]: {e}")))?;
        let mount_path = files
            .mount_path
            .clone()
            .or(default_path)
            .ok_or_else(|| {
                Error::InvalidConfiguration(format!("spec.filesFrom[{i}]: mountPath is required"))
            })?;
        let mount = VolumeMount {
            name: volume.name.clone(),
            mount_path,
            read_only: Some(files.empty_dir.is_none() && files.persistent_volume_claim.is_none()),
            ..Default::default()
        };
        ast.add_volume(volume, mount)?;
    }
    Ok(())
}

/// The volume for one entry, and where it is mounted when no path is given
fn volume(files: &FilesFrom) -> std::result::Result<(Volume, Option<String>), String> {
    let FilesFrom {
        config_map,
        secret,
        empty_dir,
        persistent_volume_claim,
        mount_path,
    } = files;
    let sources = [
        config_map.is_some(),
        secret.is_some(),
        empty_dir.is_some(),
        persistent_volume_claim.is_some(),
    ];
    if sources.iter().filter(|s| **s).count() != 1 {
        return Err(
            "exactly one of configMap, secret, emptyDir and persistentVolumeClaim must be set".into(),
        );
    }

    let named = |name: &str| -> std::result::Result<String, String> {
        short_name(name, DNS_LABEL_MAX).map_err(|e| e.to_string())
    };

    if let Some(name) = config_map {
        return Ok((
            Volume {
                name: named(name)?,
                config_map: Some(ConfigMapVolumeSource {
                    name: name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            Some(format!("/var/run/configmaps/{name}")),
        ));
    }
    if let Some(name) = secret {
        return Ok((
            Volume {
                name: named(name)?,
                secret: Some(SecretVolumeSource {
                    secret_name: Some(name.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            Some(format!("/var/run/secrets/{name}")),
        ));
    }
    if let Some(claim) = persistent_volume_claim {
        return Ok((
            Volume {
                name: named(claim)?,
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: claim.clone(),
                    read_only: None,
                }),
                ..Default::default()
            },
            Some(format!("/var/run/pvc/{claim}")),
        ));
    }

    // emptyDir has nothing to name it after but its path
    let path = mount_path
        .as_deref()
        .ok_or("mountPath is required for emptyDir")?;
    let medium = empty_dir.as_ref().and_then(|e| e.medium.clone());
    Ok((
        Volume {
            name: named(&format!("empty-dir{}", path.replace('/', "-")))?,
            empty_dir: Some(EmptyDirVolumeSource {
                medium: medium.filter(|m| m == "Memory"),
                size_limit: None,
            }),
            ..Default::default()
        },
        None,
    ))
}
