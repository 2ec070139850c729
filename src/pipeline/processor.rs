//! Record-processing stage: turn a raw report into a classification result.

use crate::error::PipelineError;
use crate::inference::{DecodingParams, InferenceClient};
use crate::models::{ClassificationResult, Job, StageOutput, StageTrigger};
use crate::store::{ConfigStore, JobStore, ObjectStore};

use super::correction::SelfCorrector;
use super::parser::parse_model_output;
use super::prompt::build_classification_prompt;

/// Business outcome when the job's institution has no usable template.
pub const NO_TEMPLATE_MESSAGE: &str = "no template for institution";

/// Reads Job + Config, builds the prompt, invokes the inference endpoint,
/// and repairs malformed output. Holds no state between invocations beyond
/// its store handles; every call re-reads the job fresh.
pub struct RecordProcessor {
    jobs: Box<dyn JobStore>,
    configs: Box<dyn ConfigStore>,
    objects: Box<dyn ObjectStore>,
    client: Box<dyn InferenceClient>,
    params: DecodingParams,
}

impl RecordProcessor {
    pub fn new(
        jobs: Box<dyn JobStore>,
        configs: Box<dyn ConfigStore>,
        objects: Box<dyn ObjectStore>,
        client: Box<dyn InferenceClient>,
    ) -> Self {
        Self {
            jobs,
            configs,
            objects,
            client,
            params: DecodingParams::deterministic(),
        }
    }

    /// Run the stage for one trigger and wrap the outcome in the stage
    /// payload handed to the completion stage.
    pub fn process(&self, trigger: &StageTrigger) -> Result<StageOutput, PipelineError> {
        let _span = tracing::info_span!(
            "process",
            job_id = %trigger.job_id,
            execution_id = %trigger.execution_id
        )
        .entered();

        let result = self.classify(trigger)?;
        Ok(StageOutput {
            status_code: 200,
            result,
            job_id: trigger.job_id.clone(),
        })
    }

    fn classify(&self, trigger: &StageTrigger) -> Result<ClassificationResult, PipelineError> {
        // Step 1: fetch the job
        let job = self
            .jobs
            .get(&trigger.job_id)?
            .ok_or_else(|| PipelineError::JobNotFound(trigger.job_id.clone()))?;

        // Step 2: required-field validation — absence is an intake contract
        // violation, not something a retry can fix
        let institution_id = require_field(&job, job.institution_id.as_deref(), "institution_id")?;
        let config_id = require_field(&job, job.config_id.as_deref(), "config_id")?;
        let input = job
            .input
            .as_ref()
            .ok_or_else(|| PipelineError::InvalidJobState {
                job_id: job.id.clone(),
                field: "input",
            })?;

        // Step 3: claim the job for this execution. The guard makes the
        // started-transition conditional, so a duplicate trigger carrying a
        // different execution id cannot start the pipeline twice.
        if !self.jobs.mark_started(&job.id, &trigger.execution_id)? {
            return Err(PipelineError::IntegrityViolation(format!(
                "job {} already claimed by another execution",
                job.id
            )));
        }

        // Step 4: fetch configuration
        let config = self
            .configs
            .get(config_id)?
            .ok_or_else(|| PipelineError::ConfigNotFound(config_id.to_string()))?;

        // Step 5: resolve the institution's template. An unknown institution
        // is a business outcome the client can understand, not a fault.
        let profile = match config.institution(institution_id) {
            Some(profile) if profile.has_template() => profile,
            _ => {
                tracing::warn!(
                    job_id = %job.id,
                    institution_id,
                    config_id,
                    "institution has no usable template"
                );
                return Ok(ClassificationResult::Error(NO_TEMPLATE_MESSAGE.into()));
            }
        };

        // Step 6: fetch the raw report
        let report_bytes = self.objects.get(&input.store_ref, &input.key)?;
        let report_text = String::from_utf8_lossy(&report_bytes);

        // Step 7: the expensive part starts — record that inference is running
        if !self.jobs.mark_processing(&job.id)? {
            return Err(PipelineError::IntegrityViolation(format!(
                "job {} left the processing path mid-stage",
                job.id
            )));
        }

        // Steps 8-9: prompt, invoke, parse (with bounded repair)
        let prompt = build_classification_prompt(&report_text, profile);
        let output_text = self.client.invoke(&prompt, &self.params)?;

        match parse_model_output(&output_text) {
            Ok(value) => {
                tracing::info!(job_id = %job.id, "classification parsed on first attempt");
                Ok(ClassificationResult::Output(value))
            }
            Err(failure) => {
                tracing::warn!(
                    job_id = %job.id,
                    error = %failure,
                    "model output failed to parse, entering self-correction"
                );
                let corrector = SelfCorrector::new(self.client.as_ref(), &self.params);
                Ok(corrector.correct(&output_text, &failure)?)
            }
        }
    }
}

fn require_field<'a>(
    job: &Job,
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, PipelineError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PipelineError::InvalidJobState {
            job_id: job.id.clone(),
            field,
        })
}
