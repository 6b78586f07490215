use k8s_openapi::api::policy::v1::{PodDisruptionBudget, PodDisruptionBudgetSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::ast::{Ast, OperationType};
use crate::generators::label_selector;
use crate::options::Options;
use crate::source::{object_meta, ReplicaSource};
use crate::Result;

/// A budget only makes sense when there is a replica to spare
pub fn create(source: &impl ReplicaSource, ast: &mut Ast, _options: &Options) -> Result<()> {
    let metadata = object_meta(source);
    if source.replicas().min.unwrap_or_default() <= 1 {
        return ast.append_operation(
            OperationType::DeleteIfExists,
            &PodDisruptionBudget {
                metadata,
                ..Default::default()
            },
        );
    }

    let pdb = PodDisruptionBudget {
        metadata,
        spec: Some(PodDisruptionBudgetSpec {
            max_unavailable: Some(IntOrString::Int(1)),
            selector: Some(label_selector(source)),
            ..Default::default()
        }),
        ..Default::default()
    };
    ast.append_operation(OperationType::CreateOrUpdate, &pdb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::nais_io_v1::Replicas;
    use crate::testing;

    #[test]
    fn created_for_multiple_replicas() {
        let mut app = testing::minimal_application();
        app.apply_defaults();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();
        assert_eq!(ast.operations[0].operation, OperationType::CreateOrUpdate);
        let pdb: PodDisruptionBudget = ast.operations[0].parse().unwrap();
        assert_eq!(
            pdb.spec.unwrap().max_unavailable,
            Some(IntOrString::Int(1))
        );
    }

    #[test]
    fn removed_for_a_single_replica() {
        let mut app = testing::minimal_application();
        app.spec.replicas = Some(Replicas {
            min: Some(1),
            max: Some(1),
            ..Default::default()
        });
        app.apply_defaults();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();
        assert_eq!(
            testing::kinds(&ast.operations),
            vec![("PodDisruptionBudget", OperationType::DeleteIfExists)]
        );
    }
}
