use std::sync::OnceLock;

use regex::Regex;

use super::{cnrm_meta, iam};
use crate::ast::{Ast, OperationType};
use crate::namegen::{short_name, DNS_LABEL_MAX};
use crate::options::Options;
use crate::resources::cnrm::*;
use crate::resources::nais_io_v1::{CloudStorageBucket, Gcp};
use crate::source::Source;
use crate::{Error, Result};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

fn valid_bucket_name(name: &str) -> bool {
    static BUCKET_NAME: OnceLock<Regex> = OnceLock::new();
    let re = BUCKET_NAME.get_or_init(|| {
        Regex::new("^[a-z0-9][a-z0-9_.-]{1,61}[a-z0-9]$").expect("static regex to compile")
    });
    re.is_match(name) && !name.starts_with("goog") && !name.contains("google")
}

pub fn create(
    source: &impl Source,
    gcp: &Gcp,
    project: &str,
    ast: &mut Ast,
    options: &Options,
) -> Result<()> {
    if gcp.buckets.is_empty() {
        return Ok(());
    }
    let email = iam::service_account_email(source, options).ok_or_else(|| {
        Error::InvalidConfiguration("spec.gcp.buckets: the cluster has no Google project".into())
    })?;

    for (i, spec) in gcp.buckets.iter().enumerate() {
        if !valid_bucket_name(&spec.name) {
            return Err(Error::InvalidConfiguration(format!(
                "spec.gcp.buckets[{i}]: {:?} is not a valid bucket name",
                spec.name
            )));
        }

        let bucket = StorageBucket {
            metadata: cnrm_meta(source, &spec.name, project, !spec.cascading_delete),
            spec: bucket_spec(spec, options),
        };
        ast.append_operation(OperationType::CreateOrUpdate, &bucket)?;

        let access = StorageBucketAccessControl {
            metadata: cnrm_meta(
                source,
                &short_name(&format!("{}-{}", spec.name, source.name()), DNS_LABEL_MAX)?,
                project,
                false,
            ),
            spec: StorageBucketAccessControlSpec {
                bucket_ref: ResourceRef {
                    name: Some(spec.name.clone()),
                    ..Default::default()
                },
                entity: format!("user-{email}"),
                role: "OWNER".into(),
            },
        };
        ast.append_operation(OperationType::CreateOrUpdate, &access)?;
    }
    Ok(())
}

fn bucket_spec(spec: &CloudStorageBucket, options: &Options) -> StorageBucketSpec {
    let lifecycle_rule = spec
        .lifecycle_condition
        .as_ref()
        .map(|c| StorageBucketLifecycleRule {
            action: StorageBucketLifecycleAction {
                type_: "Delete".into(),
            },
            condition: StorageBucketLifecycleCondition {
                age: c.age,
                created_before: c.created_before.clone(),
                num_newer_versions: c.num_newer_versions,
                with_state: c.with_state.clone(),
            },
        })
        .into_iter()
        .collect();

    StorageBucketSpec {
        location: options.config.google.region.clone(),
        uniform_bucket_level_access: spec.uniform_bucket_level_access,
        public_access_prevention: spec
            .public_access_prevention
            .map(|enforced| if enforced { "enforced" } else { "inherited" }.to_owned()),
        retention_policy: spec
            .retention_period_days
            .map(|days| StorageBucketRetentionPolicy {
                retention_period: i64::from(days) * SECONDS_PER_DAY,
            }),
        lifecycle_rule,
    }
}
