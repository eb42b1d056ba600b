//! Worker metrics, exported by whichever recorder the host process installs.

use metrics::{counter, gauge, histogram};

pub mod names {
    // Queue metrics
    pub const QUEUE_LENGTH: &str = "mtk_queue_length";
    pub const JOBS_ENQUEUED_TOTAL: &str = "mtk_jobs_enqueued_total";
    pub const JOBS_REJECTED_TOTAL: &str = "mtk_jobs_rejected_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "mtk_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "mtk_jobs_failed_total";
    pub const JOB_QUEUE_WAIT_SECONDS: &str = "mtk_job_queue_wait_seconds";
    pub const JOB_RUN_DURATION_SECONDS: &str = "mtk_job_run_duration_seconds";

    // Processing metrics
    pub const FFMPEG_DURATION_SECONDS: &str = "mtk_ffmpeg_duration_seconds";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "mtk_download_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "mtk_upload_duration_seconds";
}

pub fn set_queue_length(len: usize) {
    gauge!(names::QUEUE_LENGTH).set(len as f64);
}

pub fn record_job_enqueued(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::JOBS_ENQUEUED_TOTAL, &labels).increment(1);
}

pub fn record_job_rejected(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::JOBS_REJECTED_TOTAL, &labels).increment(1);
}

/// Record a job that reached `done`, labelled by its outcome code.
pub fn record_job_completed(endpoint: &str, code: u16, run_secs: f64) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("code", code.to_string()),
    ];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_RUN_DURATION_SECONDS, &labels).record(run_secs);
}

pub fn record_job_failed(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_queue_wait(secs: f64) {
    histogram!(names::JOB_QUEUE_WAIT_SECONDS).record(secs);
}

pub fn record_ffmpeg_duration(success: bool, secs: f64) {
    let labels = [("success", success.to_string())];
    histogram!(names::FFMPEG_DURATION_SECONDS, &labels).record(secs);
}

pub fn record_download(source: &'static str, secs: f64) {
    let labels = [("source", source.to_string())];
    histogram!(names::DOWNLOAD_DURATION_SECONDS, &labels).record(secs);
}

pub fn record_upload(target: &'static str, secs: f64) {
    let labels = [("target", target.to_string())];
    histogram!(names::UPLOAD_DURATION_SECONDS, &labels).record(secs);
}
