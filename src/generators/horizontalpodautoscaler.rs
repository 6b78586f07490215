use k8s_openapi::api::autoscaling::v2::{
    CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
    MetricSpec, MetricTarget, ResourceMetricSource,
};

use crate::ast::{Ast, OperationType};
use crate::options::Options;
use crate::source::{object_meta, ReplicaSource};
use crate::Result;

pub fn create(source: &impl ReplicaSource, ast: &mut Ast, _options: &Options) -> Result<()> {
    let replicas = source.replicas();
    let min = replicas.min.unwrap_or_default();
    let max = replicas.max.unwrap_or_default();
    let metadata = object_meta(source);

    if replicas.disable_autoscaling.unwrap_or_default() || max == 0 {
        return ast.append_operation(
            OperationType::DeleteIfExists,
            &HorizontalPodAutoscaler {
                metadata,
                ..Default::default()
            },
        );
    }

    let hpa = HorizontalPodAutoscaler {
        metadata,
        spec: Some(HorizontalPodAutoscalerSpec {
            scale_target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".into()),
                kind: "Deployment".into(),
                name: source.name(),
            },
            min_replicas: Some(min),
            max_replicas: max,
            metrics: Some(vec![MetricSpec {
                type_: "Resource".into(),
                resource: Some(ResourceMetricSource {
                    name: "cpu".into(),
                    target: MetricTarget {
                        type_: "Utilization".into(),
                        average_utilization: replicas.cpu_threshold_percentage,
                        ..Default::default()
                    },
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    };
    ast.append_operation(OperationType::CreateOrUpdate, &hpa)
}
