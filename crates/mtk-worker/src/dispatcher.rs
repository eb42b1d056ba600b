//! Routing of typed job requests to their handlers.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use mtk_models::{AssemblyRequest, ComposeRequest, JobId, JobRequest, ValidationError};
use serde_json::Value;
use thiserror::Error;
use tracing::Instrument;

use crate::assembly::{AssemblyError, AssemblyPipeline};
use crate::logging::JobLogger;

const UNRECOGNIZED_COMPOSE: &str =
    "Payload structure not recognized for implemented ffmpeg/compose operations.";

/// What a handler produced, successfully or not.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    /// Handler output for code 200, otherwise the error text
    pub result: Value,
    pub endpoint: String,
    pub status_code: u16,
}

impl HandlerOutcome {
    pub fn success(endpoint: &str, result: Value) -> Self {
        Self {
            result,
            endpoint: endpoint.to_string(),
            status_code: 200,
        }
    }

    pub fn error(endpoint: &str, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            result: Value::String(message.into()),
            endpoint: endpoint.to_string(),
            status_code,
        }
    }

    /// `"success"` for code 200, otherwise the error text.
    pub fn message(&self) -> String {
        match (self.status_code, &self.result) {
            (200, _) => "success".to_string(),
            (_, Value::String(s)) => s.clone(),
            (_, other) => other.to_string(),
        }
    }

    /// Handler output, present only for code 200.
    pub fn response(&self) -> Option<Value> {
        (self.status_code == 200).then(|| self.result.clone())
    }
}

/// A handler failure that produced no outcome at all.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    #[error("{0}")]
    Internal(String),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Executes a job request and reports its outcome.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job_id: &JobId, request: &JobRequest) -> Result<HandlerOutcome, JobError>;
}

/// Dispatcher for every request kind the toolkit serves.
#[derive(Clone)]
pub struct ToolkitDispatcher {
    pipeline: AssemblyPipeline,
    default_bucket: Option<String>,
}

impl ToolkitDispatcher {
    pub fn new(pipeline: AssemblyPipeline, default_bucket: Option<String>) -> Self {
        Self {
            pipeline,
            default_bucket,
        }
    }

    async fn compose(&self, job_id: &JobId, request: &ComposeRequest) -> Result<Value, AssemblyError> {
        let payload = &request.payload;
        if payload.outputs.is_empty() {
            return Err(ValidationError::MissingInputsOrOutputs.into());
        }
        if !payload.inputs.is_assembly() {
            return Err(AssemblyError::Unsupported(UNRECOGNIZED_COMPOSE.to_string()));
        }

        let assembly = AssemblyRequest::from_payload(payload, job_id, self.default_bucket.as_deref())?;
        let output = self.pipeline.assemble(&assembly, job_id).await?;
        serde_json::to_value(output)
            .map_err(|e| AssemblyError::internal(format!("Failed to encode result: {}", e)))
    }
}

#[async_trait]
impl JobDispatcher for ToolkitDispatcher {
    async fn dispatch(&self, job_id: &JobId, request: &JobRequest) -> Result<HandlerOutcome, JobError> {
        let endpoint = request.endpoint();
        match request {
            JobRequest::Compose(compose) => match self.compose(job_id, compose).await {
                Ok(result) => Ok(HandlerOutcome::success(endpoint, result)),
                Err(e) if e.is_internal() => Err(JobError::Internal(e.to_string())),
                Err(e) => Ok(HandlerOutcome::error(endpoint, e.status_code(), e.to_string())),
            },
        }
    }
}

/// Run `request` on its own task so a panicking handler surfaces as
/// [`JobError::Panicked`] instead of unwinding into the caller.
pub async fn execute_guarded(
    dispatcher: Arc<dyn JobDispatcher>,
    job_id: JobId,
    request: JobRequest,
) -> Result<HandlerOutcome, JobError> {
    let span = JobLogger::new(&job_id, request.endpoint()).span();
    let handle = tokio::spawn(
        async move { dispatcher.dispatch(&job_id, &request).await }.instrument(span),
    );

    match handle.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(JobError::Panicked(panic_message(e.into_panic()))),
        Err(e) => Err(JobError::Internal(format!("handler task aborted: {}", e))),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mtk_media::{Compositor, CompositorCommand, MediaResult};
    use mtk_models::{AssetInput, ComposeInputs, ComposePayload, ImageInput, OutputTargetInput};
    use mtk_storage::StorageAdapters;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCompositor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Compositor for CountingCompositor {
        async fn run(&self, _cmd: &CompositorCommand) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn dispatcher(root: &std::path::Path) -> (ToolkitDispatcher, Arc<CountingCompositor>) {
        let compositor = Arc::new(CountingCompositor::default());
        let pipeline = AssemblyPipeline::new(StorageAdapters::default(), compositor.clone(), root);
        (ToolkitDispatcher::new(pipeline, Some("default-bucket".into())), compositor)
    }

    fn s3_asset(key: &str) -> AssetInput {
        AssetInput {
            source_type: Some("s3_object_key".into()),
            object_key: Some(key.into()),
            ..AssetInput::default()
        }
    }

    fn compose(payload: ComposePayload) -> JobRequest {
        JobRequest::Compose(ComposeRequest::new(payload))
    }

    fn s3_output() -> Vec<OutputTargetInput> {
        vec![OutputTargetInput {
            kind: Some("s3".into()),
            ..OutputTargetInput::default()
        }]
    }

    #[tokio::test]
    async fn test_unrecognized_payload_is_501() {
        let root = tempfile::tempdir().unwrap();
        let (dispatcher, _) = dispatcher(root.path());
        let payload = ComposePayload {
            outputs: s3_output(),
            ..ComposePayload::default()
        };

        let outcome = dispatcher
            .dispatch(&JobId::from_string("j"), &compose(payload))
            .await
            .unwrap();
        assert_eq!(outcome.status_code, 501);
        assert_eq!(outcome.message(), UNRECOGNIZED_COMPOSE);
        assert_eq!(outcome.endpoint, "/v1/ffmpeg/compose");
        assert!(outcome.response().is_none());
    }

    #[tokio::test]
    async fn test_missing_outputs_is_400() {
        let root = tempfile::tempdir().unwrap();
        let (dispatcher, _) = dispatcher(root.path());

        let outcome = dispatcher
            .dispatch(&JobId::from_string("j"), &compose(ComposePayload::default()))
            .await
            .unwrap();
        assert_eq!(outcome.status_code, 400);
        assert_eq!(outcome.message(), "Missing 'inputs' or 'outputs'.");
    }

    #[tokio::test]
    async fn test_validation_runs_before_any_work() {
        let root = tempfile::tempdir().unwrap();
        let (dispatcher, compositor) = dispatcher(root.path());
        let payload = ComposePayload {
            inputs: ComposeInputs {
                audio_input: Some(s3_asset("a.mp3")),
                image_sequence: Some(vec![ImageInput {
                    source: s3_asset("b.png"),
                    duration: None,
                }]),
                ..ComposeInputs::default()
            },
            outputs: s3_output(),
            ..ComposePayload::default()
        };

        let outcome = dispatcher
            .dispatch(&JobId::from_string("j"), &compose(payload))
            .await
            .unwrap();
        assert_eq!(outcome.status_code, 400);
        assert_eq!(outcome.message(), "Missing duration for image 0.");
        assert_eq!(compositor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_outcome_accessors() {
        let ok = HandlerOutcome::success("/x", json!({"url": "u"}));
        assert_eq!(ok.message(), "success");
        assert_eq!(ok.response(), Some(json!({"url": "u"})));

        let err = HandlerOutcome::error("/x", 502, "reset");
        assert_eq!(err.message(), "reset");
        assert!(err.response().is_none());
    }

    struct PanickingDispatcher;

    #[async_trait]
    impl JobDispatcher for PanickingDispatcher {
        async fn dispatch(&self, _job_id: &JobId, _request: &JobRequest) -> Result<HandlerOutcome, JobError> {
            panic!("handler exploded");
        }
    }

    #[tokio::test]
    async fn test_execute_guarded_contains_panics() {
        let result = execute_guarded(
            Arc::new(PanickingDispatcher),
            JobId::new(),
            compose(ComposePayload::default()),
        )
        .await;

        match result {
            Err(JobError::Panicked(msg)) => assert_eq!(msg, "handler exploded"),
            other => panic!("expected panic error, got {:?}", other),
        }
    }
}
