use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ServiceAccount;

use crate::ast::{Ast, OperationType};
use crate::generators::google::iam;
use crate::options::Options;
use crate::source::{object_meta, Source};
use crate::Result;

pub const WORKLOAD_IDENTITY_ANNOTATION: &str = "iam.gke.io/gcp-service-account";

pub fn create(source: &impl Source, ast: &mut Ast, options: &Options) -> Result<()> {
    let mut metadata = object_meta(source);
    if let Some(email) = iam::service_account_email(source, options) {
        metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(WORKLOAD_IDENTITY_ANNOTATION.into(), email);
    }
    ast.append_operation(
        OperationType::CreateOrUpdate,
        &ServiceAccount {
            metadata,
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn bound_to_the_google_service_account() {
        let app = testing::minimal_application();
        let mut ast = Ast::new();
        create(&app, &mut ast, &testing::options()).unwrap();

        let sa: ServiceAccount = testing::find(&ast.operations, "ServiceAccount")
            .parse()
            .unwrap();
        assert_eq!(sa.metadata.name.as_deref(), Some("myapplication"));
        let email = &sa.metadata.annotations.unwrap()[WORKLOAD_IDENTITY_ANNOTATION];
        assert!(email.ends_with("@nais-project-1234.iam.gserviceaccount.com"));
    }

    #[test]
    fn no_annotation_outside_gcp() {
        let app = testing::minimal_application();
        let mut config = (*testing::config()).clone();
        config.features.cnrm = false;
        let mut options = testing::options();
        options.config = std::sync::Arc::new(config);

        let mut ast = Ast::new();
        create(&app, &mut ast, &options).unwrap();
        let sa: ServiceAccount = ast.operations[0].parse().unwrap();
        assert!(!sa
            .metadata
            .annotations
            .unwrap_or_default()
            .contains_key(WORKLOAD_IDENTITY_ANNOTATION));
    }
}
