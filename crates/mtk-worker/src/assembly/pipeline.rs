//! Assembly pipeline execution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use mtk_media::{Compositor, WorkDir};
use mtk_models::{AssemblyRequest, AssetLocator, JobId, OutputTarget, COMPOSE_ENDPOINT};
use mtk_storage::StorageAdapters;
use serde::{Deserialize, Serialize};

use super::plan::{ensure_distinct_output, plan_downloads, synthesize_command, DownloadTask};
use super::AssemblyError;
use crate::logging::{JobLogger, Stage};
use crate::metrics;

const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Where the rendered video ended up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "storage_type")]
pub enum AssemblyOutput {
    #[serde(rename = "gdrive")]
    Drive {
        gdrive_id: String,
        filename: String,
        url: Option<String>,
    },
    #[serde(rename = "s3")]
    Object {
        s3_bucket: String,
        s3_key: String,
        url: String,
    },
}

/// Runs one assembly job end to end inside a private work directory.
///
/// The work directory is removed on every exit path, including when the
/// surrounding task panics.
#[derive(Clone)]
pub struct AssemblyPipeline {
    storage: StorageAdapters,
    compositor: Arc<dyn Compositor>,
    work_root: PathBuf,
}

impl AssemblyPipeline {
    pub fn new(storage: StorageAdapters, compositor: Arc<dyn Compositor>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            compositor,
            work_root: work_root.into(),
        }
    }

    pub async fn assemble(&self, request: &AssemblyRequest, job_id: &JobId) -> Result<AssemblyOutput, AssemblyError> {
        let logger = JobLogger::new(job_id, COMPOSE_ENDPOINT);
        ensure_distinct_output(request)?;

        let work = WorkDir::create(&self.work_root, job_id.as_str())
            .await
            .map_err(|e| AssemblyError::processing(format!("Failed to create work directory: {}", e)))?;
        let work_path = work.path().to_path_buf();

        let result = self.run_in(&work, request, &logger).await;

        if let Err(e) = work.cleanup() {
            logger.cleanup_failed(&work_path, e);
        }
        result
    }

    async fn run_in(
        &self,
        work: &WorkDir,
        request: &AssemblyRequest,
        logger: &JobLogger,
    ) -> Result<AssemblyOutput, AssemblyError> {
        let plan = plan_downloads(request, work.path());
        for task in &plan.tasks {
            self.download(task, logger).await?;
        }

        let output_path = work.join(&request.output_filename);
        let cmd = synthesize_command(request, &plan, &output_path);
        logger.stage(Stage::Render, cmd.to_command_line());

        let started = Instant::now();
        let rendered = self.compositor.run(&cmd).await;
        metrics::record_ffmpeg_duration(rendered.is_ok(), started.elapsed().as_secs_f64());
        rendered?;

        if !tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            return Err(AssemblyError::processing(
                "FFmpeg finished but produced no output file.",
            ));
        }

        self.upload(&output_path, request, logger).await
    }

    async fn download(&self, task: &DownloadTask, logger: &JobLogger) -> Result<(), AssemblyError> {
        logger.stage(
            Stage::Download,
            format_args!(
                "{} {} -> {}",
                task.locator.kind(),
                task.locator.source_ref(),
                task.dest.display()
            ),
        );

        let started = Instant::now();
        match &task.locator {
            AssetLocator::Drive { file_id, .. } => {
                self.storage.drive()?.download(file_id, &task.dest).await?;
            }
            AssetLocator::Object { bucket, key, .. } => {
                self.storage.object()?.download(bucket, key, &task.dest).await?;
            }
        }
        metrics::record_download(task.locator.kind(), started.elapsed().as_secs_f64());
        Ok(())
    }

    async fn upload(
        &self,
        src: &Path,
        request: &AssemblyRequest,
        logger: &JobLogger,
    ) -> Result<AssemblyOutput, AssemblyError> {
        let started = Instant::now();
        let output = match &request.output {
            OutputTarget::Drive { folder_id } => {
                logger.stage(Stage::Upload, format_args!("gdrive folder {}", folder_id));
                let file = self
                    .storage
                    .drive()?
                    .upload(src, folder_id, &request.output_filename)
                    .await?;
                metrics::record_upload("gdrive", started.elapsed().as_secs_f64());
                AssemblyOutput::Drive {
                    gdrive_id: file.id,
                    filename: file.name.unwrap_or_else(|| request.output_filename.clone()),
                    url: file.web_view_link,
                }
            }
            OutputTarget::Object { bucket, key } => {
                logger.stage(Stage::Upload, format_args!("s3://{}/{}", bucket, key));
                let object = self
                    .storage
                    .object()?
                    .upload(src, bucket, key, VIDEO_CONTENT_TYPE)
                    .await?;
                metrics::record_upload("s3", started.elapsed().as_secs_f64());
                AssemblyOutput::Object {
                    s3_bucket: object.bucket,
                    s3_key: object.key,
                    url: object.url,
                }
            }
        };
        Ok(output)
    }
}
