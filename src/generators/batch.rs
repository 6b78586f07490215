//! Job or CronJob for a Naisjob.
//!
//! A job switches between the two when its schedule is added or removed, so
//! whichever kind is not rendered is deleted.

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, Job, JobSpec, JobTemplateSpec};

use crate::ast::{Ast, OperationType};
use crate::generators::pod;
use crate::options::Options;
use crate::resources::naisjob::Naisjob;
use crate::source::object_meta;
use crate::Result;

fn job_spec(job: &Naisjob, ast: &Ast, options: &Options) -> Result<JobSpec> {
    let spec = &job.spec;
    let restart_policy = spec.restart_policy.as_deref().unwrap_or("Never");
    Ok(JobSpec {
        backoff_limit: spec.backoff_limit,
        active_deadline_seconds: spec.active_deadline_seconds,
        ttl_seconds_after_finished: spec.ttl_seconds_after_finished,
        template: pod::template(job, ast, options, restart_policy)?,
        ..Default::default()
    })
}

pub fn create(job: &Naisjob, ast: &mut Ast, options: &Options) -> Result<()> {
    let metadata = object_meta(job);
    let template = job_spec(job, ast, options)?;

    let Some(schedule) = job.spec.schedule.clone() else {
        ast.append_operation(
            OperationType::DeleteIfExists,
            &CronJob {
                metadata: metadata.clone(),
                ..Default::default()
            },
        )?;
        return ast.append_operation(
            OperationType::CreateOrRecreate,
            &Job {
                metadata,
                spec: Some(template),
                ..Default::default()
            },
        );
    };

    ast.append_operation(
        OperationType::DeleteIfExists,
        &Job {
            metadata: metadata.clone(),
            ..Default::default()
        },
    )?;
    let spec = &job.spec;
    let cron_job = CronJob {
        metadata: metadata.clone(),
        spec: Some(CronJobSpec {
            schedule,
            time_zone: spec.time_zone.clone(),
            concurrency_policy: spec.concurrency_policy.clone(),
            successful_jobs_history_limit: spec.successful_jobs_history_limit,
            failed_jobs_history_limit: spec.failed_jobs_history_limit,
            job_template: JobTemplateSpec {
                metadata: Some(metadata),
                spec: Some(template),
            },
            ..Default::default()
        }),
        ..Default::default()
    };
    ast.append_operation(OperationType::CreateOrUpdate, &cron_job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn render(job: &mut Naisjob) -> Ast {
        job.apply_defaults();
        let job: &Naisjob = job;
        let options = testing::options();
        let mut ast = Ast::new();
        pod::create(job, &mut ast, &options).unwrap();
        create(job, &mut ast, &options).unwrap();
        ast
    }

    #[test]
    fn one_off_job() {
        let mut job = testing::minimal_naisjob();
        job.spec.ttl_seconds_after_finished = Some(60);
        let ast = render(&mut job);
        assert_eq!(
            testing::kinds(&ast.operations),
            vec![
                ("CronJob", OperationType::DeleteIfExists),
                ("Job", OperationType::CreateOrRecreate),
            ]
        );
        let rendered: Job = ast.operations[1].parse().unwrap();
        let spec = rendered.spec.unwrap();
        assert_eq!(spec.backoff_limit, Some(6));
        assert_eq!(spec.ttl_seconds_after_finished, Some(60));
        assert_eq!(
            spec.template.spec.unwrap().restart_policy.as_deref(),
            Some("Never")
        );
    }

    #[test]
    fn scheduled_job() {
        let mut job = testing::minimal_naisjob();
        job.spec.schedule = Some("*/5 * * * *".into());
        job.spec.time_zone = Some("Europe/Oslo".into());
        job.spec.restart_policy = Some("OnFailure".into());
        let ast = render(&mut job);
        assert_eq!(
            testing::kinds(&ast.operations),
            vec![
                ("Job", OperationType::DeleteIfExists),
                ("CronJob", OperationType::CreateOrUpdate),
            ]
        );
        let cron_job: CronJob = ast.operations[1].parse().unwrap();
        let spec = cron_job.spec.unwrap();
        assert_eq!(spec.schedule, "*/5 * * * *");
        assert_eq!(spec.time_zone.as_deref(), Some("Europe/Oslo"));
        assert_eq!(spec.concurrency_policy.as_deref(), Some("Allow"));
        assert_eq!(spec.successful_jobs_history_limit, Some(3));
        let pod = spec.job_template.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod.restart_policy.as_deref(), Some("OnFailure"));
    }
}
