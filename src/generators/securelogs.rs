//! Secure logs: the workload writes to `/secure-logs`, a fluent-bit sidecar ships the files.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, EmptyDirVolumeSource, ResourceRequirements, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::ast::Ast;
use crate::generators::restricted_security_context;
use crate::options::Options;
use crate::source::SecureLogsSource;
use crate::{Error, Result};

pub const LOG_VOLUME: &str = "secure-logs";
pub const LOG_PATH: &str = "/secure-logs";
const CONFIG_VOLUME: &str = "secure-logs-config";
const CONFIG_MAP: &str = "secure-logs-fluentbit";
const CONFIG_PATH: &str = "/fluent-bit/etc-operator";
const BUFFER_VOLUME: &str = "secure-logs-buffer";
const BUFFER_PATH: &str = "/buffers";

pub fn create(source: &impl SecureLogsSource, ast: &mut Ast, options: &Options) -> Result<()> {
    if !source.secure_logs() {
        return Ok(());
    }
    if !options.config.features.secure_logs {
        return Err(Error::InvalidConfiguration(
            "spec.secureLogs: secure logs are not available in this cluster".into(),
        ));
    }

    ast.add_volume(
        empty_dir(LOG_VOLUME, Some("128M")),
        mount(LOG_VOLUME, LOG_PATH, false),
    )?;
    ast.add_pod_volume(Volume {
        name: CONFIG_VOLUME.into(),
        config_map: Some(ConfigMapVolumeSource {
            name: CONFIG_MAP.into(),
            default_mode: Some(0o420),
            ..Default::default()
        }),
        ..Default::default()
    });
    ast.add_pod_volume(empty_dir(BUFFER_VOLUME, None));

    let images = &options.config.images;
    ast.containers.push(Container {
        name: "secure-logs-fluentbit".into(),
        image: Some(images.secure_logs_fluentbit.clone()),
        command: Some(vec![
            "/fluent-bit/bin/fluent-bit".into(),
            "-c".into(),
            format!("{CONFIG_PATH}/fluent-bit.conf"),
        ]),
        volume_mounts: Some(vec![
            mount(LOG_VOLUME, LOG_PATH, false),
            mount(CONFIG_VOLUME, CONFIG_PATH, true),
            mount(BUFFER_VOLUME, BUFFER_PATH, false),
        ]),
        resources: Some(small_resources("50m", "32Mi", "100Mi")),
        security_context: Some(restricted_security_context()),
        image_pull_policy: Some("IfNotPresent".into()),
        ..Default::default()
    });
    ast.containers.push(Container {
        name: "secure-logs-configmap-reload".into(),
        image: Some(images.secure_logs_configmap_reload.clone()),
        args: Some(vec![
            format!("--volume-dir={CONFIG_PATH}"),
            "--webhook-url=http://localhost:2020/api/v2/reload".into(),
            "--webhook-method=POST".into(),
        ]),
        volume_mounts: Some(vec![mount(CONFIG_VOLUME, CONFIG_PATH, true)]),
        resources: Some(small_resources("5m", "10Mi", "20Mi")),
        security_context: Some(restricted_security_context()),
        image_pull_policy: Some("IfNotPresent".into()),
        ..Default::default()
    });
    Ok(())
}

fn empty_dir(name: &str, size_limit: Option<&str>) -> Volume {
    Volume {
        name: name.into(),
        empty_dir: Some(EmptyDirVolumeSource {
            size_limit: size_limit.map(|s| Quantity(s.into())),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str, read_only: bool) -> VolumeMount {
    VolumeMount {
        name: name.into(),
        mount_path: path.into(),
        read_only: read_only.then_some(true),
        ..Default::default()
    }
}

fn small_resources(cpu: &str, memory: &str, memory_limit: &str) -> ResourceRequirements {
    ResourceRequirements {
        requests: Some(BTreeMap::from([
            ("cpu".to_owned(), Quantity(cpu.into())),
            ("memory".to_owned(), Quantity(memory.into())),
        ])),
        limits: Some(BTreeMap::from([(
            "memory".to_owned(),
            Quantity(memory_limit.into()),
        )])),
        ..Default::default()
    }
}
