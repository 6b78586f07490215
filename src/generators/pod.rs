//! The main container, and the pod template every workload kind is built from.

use k8s_openapi::api::core::v1::{
    Affinity, Container, ContainerPort, EmptyDirVolumeSource, ExecAction, HTTPGetAction,
    Lifecycle, LifecycleHandler, LocalObjectReference, PodAffinityTerm, PodAntiAffinity,
    PodSecurityContext, PodSpec, PodTemplateSpec, Probe, SeccompProfile, SleepAction, Volume,
    VolumeMount, WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::ast::Ast;
use crate::generators::{app_labels, restricted_security_context, RUN_AS_USER};
use crate::options::Options;
use crate::resources::nais_io_v1::{self, PreStopHook};
use crate::source::{object_meta, Workload, TEAM_LABEL};
use crate::{Error, Result};

pub const DEFAULT_CONTAINER_ANNOTATION: &str = "kubectl.kubernetes.io/default-container";
pub const PORT_NAME: &str = "http";

const WRITABLE_TMP: &str = "writable-tmp";

pub fn create(source: &impl Workload, ast: &mut Ast, options: &Options) -> Result<()> {
    ast.add_volume(
        Volume {
            name: WRITABLE_TMP.into(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
        VolumeMount {
            name: WRITABLE_TMP.into(),
            mount_path: "/tmp".into(),
            ..Default::default()
        },
    )?;
    ast.labels.insert(TEAM_LABEL.into(), options.team.clone());
    ast.containers.push(main_container(source));
    Ok(())
}

fn main_container(source: &impl Workload) -> Container {
    let port = source.port();
    let command = source.command();

    Container {
        name: source.name(),
        image: Some(source.image().to_owned()),
        command: (!command.is_empty()).then(|| command.to_vec()),
        ports: port.map(|port| {
            vec![ContainerPort {
                name: Some(PORT_NAME.into()),
                container_port: port,
                protocol: Some("TCP".into()),
                ..Default::default()
            }]
        }),
        resources: source.resources().cloned(),
        liveness_probe: source.liveness().map(|p| probe(p, port)),
        readiness_probe: source.readiness().map(|p| probe(p, port)),
        startup_probe: source.startup().map(|p| probe(p, port)),
        lifecycle: Some(Lifecycle {
            pre_stop: Some(pre_stop(source.pre_stop_hook(), port)),
            ..Default::default()
        }),
        security_context: Some(restricted_security_context()),
        image_pull_policy: Some("IfNotPresent".into()),
        termination_message_policy: Some("FallbackToLogsOnError".into()),
        ..Default::default()
    }
}

fn probe(probe: &nais_io_v1::Probe, port: Option<i32>) -> Probe {
    let port = probe
        .port
        .or(port)
        .unwrap_or(nais_io_v1::DEFAULT_PORT);
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(probe.path.clone()),
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        initial_delay_seconds: probe.initial_delay,
        period_seconds: probe.period,
        failure_threshold: probe.failure_threshold,
        timeout_seconds: probe.timeout,
        ..Default::default()
    }
}

/// Without a hook, wait a few seconds so the endpoints are updated before shutdown
fn pre_stop(hook: Option<&PreStopHook>, port: Option<i32>) -> LifecycleHandler {
    match hook {
        Some(PreStopHook {
            http: Some(http), ..
        }) => LifecycleHandler {
            http_get: Some(HTTPGetAction {
                path: Some(http.path.clone()),
                port: IntOrString::Int(
                    http.port
                        .or(port)
                        .unwrap_or(nais_io_v1::DEFAULT_PORT),
                ),
                ..Default::default()
            }),
            ..Default::default()
        },
        Some(PreStopHook {
            exec: Some(exec), ..
        }) => LifecycleHandler {
            exec: Some(ExecAction {
                command: Some(exec.command.clone()),
            }),
            ..Default::default()
        },
        _ => LifecycleHandler {
            sleep: Some(SleepAction { seconds: 5 }),
            ..Default::default()
        },
    }
}

fn anti_affinity(app: &str) -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![
                WeightedPodAffinityTerm {
                    weight: 10,
                    pod_affinity_term: PodAffinityTerm {
                        label_selector: Some(LabelSelector {
                            match_labels: Some(app_labels(app)),
                            ..Default::default()
                        }),
                        topology_key: "kubernetes.io/hostname".into(),
                        ..Default::default()
                    },
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Assemble the pod template from everything the generators contributed.
///
/// Env, env sources and volume mounts collected in the Ast belong to the main
/// container, which is moved to the front of the container list.
pub fn template(
    source: &impl Workload,
    ast: &Ast,
    options: &Options,
    restart_policy: &str,
) -> Result<PodTemplateSpec> {
    let name = source.name();
    let mut containers = ast.containers.clone();
    let index = containers
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| Error::Internal(format!("no main container named {name}")))?;
    let mut main = containers.remove(index);
    main.env = (!ast.env.is_empty()).then(|| ast.env.clone());
    main.env_from = (!ast.env_from.is_empty()).then(|| ast.env_from.clone());
    main.volume_mounts = (!ast.volume_mounts.is_empty()).then(|| ast.volume_mounts.clone());
    containers.insert(0, main);

    let mut labels = object_meta(source).labels.unwrap_or_default();
    labels.extend(ast.labels.clone());
    let mut annotations = ast.annotations.clone();
    annotations.insert(DEFAULT_CONTAINER_ANNOTATION.into(), name.clone());

    let image_pull_secrets = &options.config.image_pull_secrets;

    Ok(PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(labels),
            annotations: Some(annotations),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers,
            init_containers: (!ast.init_containers.is_empty()).then(|| ast.init_containers.clone()),
            volumes: (!ast.volumes.is_empty()).then(|| ast.volumes.clone()),
            service_account_name: Some(name.clone()),
            security_context: Some(PodSecurityContext {
                fs_group: Some(RUN_AS_USER),
                fs_group_change_policy: Some("OnRootMismatch".into()),
                seccomp_profile: Some(SeccompProfile {
                    type_: "RuntimeDefault".into(),
                    localhost_profile: None,
                }),
                ..Default::default()
            }),
            image_pull_secrets: (!image_pull_secrets.is_empty()).then(|| {
                image_pull_secrets
                    .iter()
                    .map(|name| LocalObjectReference { name: name.clone() })
                    .collect()
            }),
            affinity: Some(anti_affinity(&name)),
            termination_grace_period_seconds: source.termination_grace_period(),
            restart_policy: Some(restart_policy.into()),
            dns_policy: Some("ClusterFirst".into()),
            enable_service_links: Some(false),
            ..Default::default()
        }),
    })
}
