use std::sync::OnceLock;

use regex::Regex;

use super::{cnrm_meta, iam};
use crate::ast::{Ast, OperationType};
use crate::namegen::{short_name, DNS_LABEL_MAX};
use crate::options::Options;
use crate::resources::cnrm::{BigQueryDataset, BigQueryDatasetAccess, BigQueryDatasetSpec};
use crate::resources::nais_io_v1::Gcp;
use crate::source::Source;
use crate::{Error, Result};

fn valid_dataset_name(name: &str) -> bool {
    static DATASET_NAME: OnceLock<Regex> = OnceLock::new();
    let re = DATASET_NAME
        .get_or_init(|| Regex::new("^[a-zA-Z0-9_]{1,1024}$").expect("static regex to compile"));
    re.is_match(name)
}

pub fn create(
    source: &impl Source,
    gcp: &Gcp,
    project: &str,
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    if gcp.big_query_datasets.is_empty() {
        return Ok(());
    }
    let email = iam::service_account_email(source, options).ok_or_else(|| {
        Error::InvalidConfiguration("spec.gcp.bigQueryDatasets: the cluster has no Google project".into())
    })?;

    for (i, dataset) in gcp.big_query_datasets.iter().enumerate() {
        let field = format!("spec.gcp.bigQueryDatasets[{i}]");
        if !valid_dataset_name(&dataset.name) {
            return Err(Error::InvalidConfiguration(format!(
                "{field}: {:?} may only contain letters, digits and underscores",
                dataset.name
            )));
        }
        let role = match dataset.permission.as_str() {
            "READ" => "READER",
            "READWRITE" => "WRITER",
            other => {
                return Err(Error::InvalidConfiguration(format!(
                    "{field}: unknown permission {other:?}"
                )))
            }
        };

        // dataset names allow underscores, object names do not
        let name = short_name(&dataset.name.replace('_', "-"), DNS_LABEL_MAX)?;
        let resource = BigQueryDataset {
            metadata: cnrm_meta(source, &name, project, !dataset.cascading_delete),
            spec: BigQueryDatasetSpec {
                resource_id: dataset.name.clone(),
                location: options.config.google.region.clone(),
                description: dataset.description.clone(),
                access: vec![BigQueryDatasetAccess {
                    role: role.into(),
                    user_by_email: email.clone(),
                }],
            },
        };
        ast.append_operation(OperationType::CreateOrUpdate, &resource)?;
    }
    Ok(())
}
