use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::{NoteGenerationError, PollConfig, TranscriptJob, TranscriptStatus};

/// Speech-to-text with speaker diarization.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Uploads raw audio and returns the provider's URL for it.
    async fn upload(&self, audio: Bytes) -> Result<String, NoteGenerationError>;

    /// Starts a two-speaker transcription job.
    async fn submit(&self, audio_url: &str) -> Result<TranscriptJob, NoteGenerationError>;

    async fn fetch(&self, job_id: &str) -> Result<TranscriptJob, NoteGenerationError>;
}

#[derive(Debug)]
pub enum TranscriptWait {
    Completed(TranscriptJob),
    Failed(String),
    TimedOut,
}

/// Uploads, submits and polls until the job settles or `poll.ceiling` passes.
pub async fn transcribe(
    provider: &dyn TranscriptionProvider,
    audio: Bytes,
    poll: PollConfig,
) -> Result<TranscriptWait, NoteGenerationError> {
    let upload_url = provider.upload(audio).await?;
    let mut job = provider.submit(&upload_url).await?;
    info!("Transcription job {} submitted ({:?})", job.id, job.status);

    let started = Instant::now();
    loop {
        match job.status {
            TranscriptStatus::Completed => return Ok(TranscriptWait::Completed(job)),
            TranscriptStatus::Error => {
                let reason = job
                    .error
                    .unwrap_or_else(|| "Transcription failed".to_string());
                return Ok(TranscriptWait::Failed(reason));
            }
            TranscriptStatus::Unknown => {
                return Ok(TranscriptWait::Failed(format!(
                    "Unexpected transcription status for job {}",
                    job.id
                )))
            }
            TranscriptStatus::Queued | TranscriptStatus::Processing => {}
        }

        if started.elapsed() >= poll.ceiling {
            error!(
                "Transcription job {} still {:?} after {:?}",
                job.id, job.status, poll.ceiling
            );
            return Ok(TranscriptWait::TimedOut);
        }

        tokio::time::sleep(poll.interval).await;
        job = provider.fetch(&job.id).await?;
        debug!("Transcription job {} is {:?}", job.id, job.status);
    }
}

// ==============================================================================
// ASSEMBLYAI
// ==============================================================================

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

/// AssemblyAI v2 REST client.
pub struct AssemblyAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl AssemblyAiClient {
    pub fn new(config: &AppConfig) -> Result<Self, NoteGenerationError> {
        if !config.is_transcription_configured() {
            return Err(NoteGenerationError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.assemblyai_api_key.clone(),
            base_url: config.assemblyai_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<T, NoteGenerationError> {
        let response = request
            .header("authorization", &self.api_key)
            .send()
            .await
            .map_err(|e| NoteGenerationError::TranscriptionError(format!("{}: {}", action, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NoteGenerationError::TranscriptionError(format!("{}: {}", action, e)))?;

        if !status.is_success() {
            error!("AssemblyAI {} failed: {} - {}", action, status, body);
            return Err(NoteGenerationError::TranscriptionError(format!(
                "{} failed with HTTP {}: {}",
                action, status, body
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            NoteGenerationError::TranscriptionError(format!(
                "Failed to parse {} response: {}",
                action, e
            ))
        })
    }
}

#[async_trait]
impl TranscriptionProvider for AssemblyAiClient {
    async fn upload(&self, audio: Bytes) -> Result<String, NoteGenerationError> {
        info!("Uploading {} bytes of audio to AssemblyAI", audio.len());

        let request = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("Content-Type", "application/octet-stream")
            .body(audio);

        let uploaded: UploadResponse = self.send(request, "upload").await?;
        Ok(uploaded.upload_url)
    }

    async fn submit(&self, audio_url: &str) -> Result<TranscriptJob, NoteGenerationError> {
        let request = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .json(&json!({
                "audio_url": audio_url,
                "speaker_labels": true,
                "speakers_expected": 2,
                "language_code": "en",
            }));

        self.send(request, "transcript submission").await
    }

    async fn fetch(&self, job_id: &str) -> Result<TranscriptJob, NoteGenerationError> {
        let request = self
            .client
            .get(format!("{}/v2/transcript/{}", self.base_url, job_id));

        self.send(request, "transcript poll").await
    }
}
