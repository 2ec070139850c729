//! Completion stage: deliver a finished result and make it durable.
//!
//! Push is best-effort — a missing or stale connection never blocks the two
//! guarantees this stage owns: the result is archived, and the job reaches
//! its terminal status exactly once. The whole operation is safe to repeat
//! under orchestrator retry.

use std::sync::Arc;

use crate::channel::{ConnectionRegistry, PushChannel};
use crate::error::PipelineError;
use crate::models::{ClassificationResult, CompletionAck};
use crate::store::{JobStore, ObjectStore, StoreError};

/// Archive key for a job's result. Deterministic so a repeated completion
/// overwrites the same object with the same bytes.
pub fn archive_key(job_id: &str) -> String {
    format!("completed_jobs/{job_id}.json")
}

pub struct CompletionNotifier {
    jobs: Box<dyn JobStore>,
    objects: Box<dyn ObjectStore>,
    registry: Arc<ConnectionRegistry>,
    channel: Box<dyn PushChannel>,
    /// Object store holding archived results.
    archive_store_ref: String,
}

impl CompletionNotifier {
    pub fn new(
        jobs: Box<dyn JobStore>,
        objects: Box<dyn ObjectStore>,
        registry: Arc<ConnectionRegistry>,
        channel: Box<dyn PushChannel>,
        archive_store_ref: &str,
    ) -> Self {
        Self {
            jobs,
            objects,
            registry,
            channel,
            archive_store_ref: archive_store_ref.to_string(),
        }
    }

    pub fn complete(
        &self,
        job_id: &str,
        execution_ref: &str,
        result: &ClassificationResult,
    ) -> Result<CompletionAck, PipelineError> {
        let _span = tracing::info_span!("complete", job_id).entered();

        // Step 1: record the execution reference, guarded on the job
        // existing. Completing a job nobody created is a contract breach,
        // not something to retry.
        if !self.jobs.record_execution_ref(job_id, execution_ref)? {
            return Err(PipelineError::IntegrityViolation(format!(
                "execution reference recorded for nonexistent job {job_id}"
            )));
        }

        // Steps 2-3: best-effort live delivery
        match self.registry.lookup(job_id) {
            None => {
                tracing::debug!(job_id, "no live connection, skipping push");
            }
            Some(descriptor) => {
                let payload = serde_json::json!({ "jobId": job_id, "result": result });
                match self.channel.send(&descriptor, &payload) {
                    Ok(()) => tracing::info!(
                        job_id,
                        connection_id = %descriptor.connection_id,
                        "result pushed to live connection"
                    ),
                    Err(e) => tracing::warn!(
                        job_id,
                        connection_id = %descriptor.connection_id,
                        error = %e,
                        "push failed, continuing to archival"
                    ),
                }
            }
        }

        // Step 4: durable archival, unconditional on the push outcome
        let key = archive_key(job_id);
        let bytes = serde_json::to_vec_pretty(result)
            .map_err(|e| PipelineError::Store(StoreError::Serialization(e.to_string())))?;
        self.objects.put(&self.archive_store_ref, &key, &bytes)?;

        // Step 5: finalize, monotone-guarded. A repeat with the same
        // terminal status is an orchestrator retry and succeeds quietly;
        // a conflicting terminal status means two executions disagreed.
        let target = result.terminal_status();
        if !self.jobs.finalize(job_id, target, &key)? {
            match self.jobs.get(job_id)? {
                Some(job) if job.status == target => {
                    tracing::debug!(job_id, status = %target, "job already finalized, idempotent repeat");
                }
                Some(job) => {
                    return Err(PipelineError::IntegrityViolation(format!(
                        "job {job_id} is already terminal with status {}",
                        job.status
                    )));
                }
                None => {
                    return Err(PipelineError::IntegrityViolation(format!(
                        "job {job_id} disappeared during completion"
                    )));
                }
            }
        }

        tracing::info!(job_id, status = %target, "completion recorded");
        Ok(CompletionAck {
            status_code: 200,
            message: format!("completion recorded for job {job_id}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ConnectionDescriptor, FailingPushChannel, RecordingPushChannel};
    use crate::models::{InputLocation, Job, JobStatus};
    use crate::store::{open_memory_database, FsObjectStore, SqliteJobStore};
    use serde_json::json;

    struct Fixture {
        jobs: Arc<SqliteJobStore>,
        registry: Arc<ConnectionRegistry>,
        dir: tempfile::TempDir,
        job_id: String,
    }

    fn fixture() -> Fixture {
        let jobs = Arc::new(SqliteJobStore::new(open_memory_database().unwrap()));
        let job = Job::new(
            "april-screening",
            "cfg-audio",
            "st-marys",
            InputLocation {
                store_ref: "input-reports".into(),
                key: "input_reports/j-1.csv".into(),
            },
        );
        jobs.put(&job).unwrap();
        jobs.mark_started(&job.id, "exec-1").unwrap();
        jobs.mark_processing(&job.id).unwrap();

        Fixture {
            jobs,
            registry: Arc::new(ConnectionRegistry::new()),
            dir: tempfile::tempdir().unwrap(),
            job_id: job.id,
        }
    }

    struct SharedJobStore(Arc<SqliteJobStore>);

    impl JobStore for SharedJobStore {
        fn get(&self, job_id: &str) -> Result<Option<Job>, StoreError> {
            self.0.get(job_id)
        }
        fn put(&self, job: &Job) -> Result<(), StoreError> {
            self.0.put(job)
        }
        fn mark_started(&self, job_id: &str, execution_ref: &str) -> Result<bool, StoreError> {
            self.0.mark_started(job_id, execution_ref)
        }
        fn mark_processing(&self, job_id: &str) -> Result<bool, StoreError> {
            self.0.mark_processing(job_id)
        }
        fn record_execution_ref(
            &self,
            job_id: &str,
            execution_ref: &str,
        ) -> Result<bool, StoreError> {
            self.0.record_execution_ref(job_id, execution_ref)
        }
        fn finalize(
            &self,
            job_id: &str,
            status: JobStatus,
            result_ref: &str,
        ) -> Result<bool, StoreError> {
            self.0.finalize(job_id, status, result_ref)
        }
    }

    fn notifier_with(fixture: &Fixture, channel: Box<dyn PushChannel>) -> CompletionNotifier {
        CompletionNotifier::new(
            Box::new(SharedJobStore(fixture.jobs.clone())),
            Box::new(FsObjectStore::new(fixture.dir.path())),
            fixture.registry.clone(),
            channel,
            "completed-reports",
        )
    }

    fn output_result() -> ClassificationResult {
        ClassificationResult::Output(json!({"hearing_loss_severity": "moderate"}))
    }

    #[test]
    fn completes_without_any_connection() {
        let fixture = fixture();
        let notifier = notifier_with(&fixture, Box::new(RecordingPushChannel::new()));

        let ack = notifier
            .complete(&fixture.job_id, "exec-1", &output_result())
            .unwrap();
        assert_eq!(ack.status_code, 200);

        let job = fixture.jobs.get(&fixture.job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(
            job.result_ref.as_deref(),
            Some(archive_key(&fixture.job_id).as_str())
        );
    }

    #[test]
    fn pushes_to_live_connection_and_archives() {
        let fixture = fixture();
        let channel = Arc::new(RecordingPushChannel::new());

        struct SharedChannel(Arc<RecordingPushChannel>);
        impl PushChannel for SharedChannel {
            fn send(
                &self,
                descriptor: &ConnectionDescriptor,
                payload: &serde_json::Value,
            ) -> Result<(), crate::channel::ChannelError> {
                self.0.send(descriptor, payload)
            }
        }

        fixture
            .registry
            .attach(
                fixture.jobs.as_ref(),
                &fixture.job_id,
                ConnectionDescriptor {
                    connection_id: "c-1".into(),
                    channel_address: "https://channel.example/prod".into(),
                },
            )
            .unwrap();

        let notifier = notifier_with(&fixture, Box::new(SharedChannel(channel.clone())));
        notifier
            .complete(&fixture.job_id, "exec-1", &output_result())
            .unwrap();

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1["jobId"], fixture.job_id.as_str());
        assert_eq!(
            sent[0].1["result"]["output"]["hearing_loss_severity"],
            "moderate"
        );

        // Archived bytes deserialize back to the same result
        let store = FsObjectStore::new(fixture.dir.path());
        let bytes = store
            .get("completed-reports", &archive_key(&fixture.job_id))
            .unwrap();
        let archived: ClassificationResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(archived, output_result());
    }

    #[test]
    fn stale_connection_still_archives_and_finalizes() {
        let fixture = fixture();
        fixture
            .registry
            .attach(
                fixture.jobs.as_ref(),
                &fixture.job_id,
                ConnectionDescriptor {
                    connection_id: "c-stale".into(),
                    channel_address: "https://channel.example/prod".into(),
                },
            )
            .unwrap();

        let notifier = notifier_with(&fixture, Box::new(FailingPushChannel));
        let ack = notifier
            .complete(&fixture.job_id, "exec-1", &output_result())
            .unwrap();
        assert_eq!(ack.status_code, 200);

        let store = FsObjectStore::new(fixture.dir.path());
        assert!(store
            .get("completed-reports", &archive_key(&fixture.job_id))
            .is_ok());
        assert_eq!(
            fixture.jobs.get(&fixture.job_id).unwrap().unwrap().status,
            JobStatus::Completed
        );
    }

    #[test]
    fn completion_is_idempotent() {
        let fixture = fixture();
        let notifier = notifier_with(&fixture, Box::new(RecordingPushChannel::new()));

        notifier
            .complete(&fixture.job_id, "exec-1", &output_result())
            .unwrap();
        let store = FsObjectStore::new(fixture.dir.path());
        let first_bytes = store
            .get("completed-reports", &archive_key(&fixture.job_id))
            .unwrap();

        // Orchestrator retries the whole completion step
        let ack = notifier
            .complete(&fixture.job_id, "exec-1", &output_result())
            .unwrap();
        assert_eq!(ack.status_code, 200);

        let second_bytes = store
            .get("completed-reports", &archive_key(&fixture.job_id))
            .unwrap();
        assert_eq!(first_bytes, second_bytes);
        assert_eq!(
            fixture.jobs.get(&fixture.job_id).unwrap().unwrap().status,
            JobStatus::Completed
        );
    }

    #[test]
    fn error_result_finalizes_to_failed() {
        let fixture = fixture();
        let notifier = notifier_with(&fixture, Box::new(RecordingPushChannel::new()));

        let result = ClassificationResult::Error("did not recover from parsing error".into());
        notifier
            .complete(&fixture.job_id, "exec-1", &result)
            .unwrap();

        let job = fixture.jobs.get(&fixture.job_id).unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);

        // The explanatory message is what got archived for the client
        let store = FsObjectStore::new(fixture.dir.path());
        let bytes = store
            .get("completed-reports", &archive_key(&fixture.job_id))
            .unwrap();
        let archived: ClassificationResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(archived, result);
    }

    #[test]
    fn nonexistent_job_is_integrity_violation() {
        let fixture = fixture();
        let notifier = notifier_with(&fixture, Box::new(RecordingPushChannel::new()));

        let err = notifier
            .complete("ghost-job", "exec-1", &output_result())
            .unwrap_err();
        assert!(matches!(err, PipelineError::IntegrityViolation(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflicting_terminal_status_is_integrity_violation() {
        let fixture = fixture();
        let notifier = notifier_with(&fixture, Box::new(RecordingPushChannel::new()));

        notifier
            .complete(&fixture.job_id, "exec-1", &output_result())
            .unwrap();

        let err = notifier
            .complete(
                &fixture.job_id,
                "exec-1",
                &ClassificationResult::Error("late failure".into()),
            )
            .unwrap_err();
        assert!(matches!(err, PipelineError::IntegrityViolation(_)));
    }
}
