//! Speech-to-text vendor client.
//!
//! Submit-then-poll against an AssemblyAI-style HTTP API: one transcription
//! job per call, polled until the vendor reports completed or error. The
//! vendor runs diarization and auto-chapter detection; words, utterances,
//! and chapters are mapped into the run's [`Transcript`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;

use recast_core::models::{Chapter, Segment, Transcript, Utterance, Word};
use recast_core::step_error::StepError;

/// Poll ceiling: 120 attempts at up to 5s intervals, ~10 minutes of audio
/// processing before the attempt is treated as a transient failure.
const MAX_POLL_ATTEMPTS: u32 = 120;

/// Transcription collaborator interface. One opaque call per attempt; the
/// step executor owns retries, so implementations must be safely
/// re-invokable.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    async fn transcribe(&self, input_ref: &str) -> Result<Transcript, StepError>;
}

pub struct SpeechApiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SpeechApiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300)) // 5 minute timeout for long audio files
            .build()
            .context("Failed to create HTTP client for speech API")?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Start a transcription job for a vendor-fetchable audio URL.
    async fn start_job(&self, input_ref: &str) -> Result<String> {
        let url = format!("{}/v2/transcript", self.base_url);

        let request_body = json!({
            "audio_url": input_ref,
            "speaker_labels": true,
            "auto_chapters": true,
        });

        let response = self
            .http_client
            .post(&url)
            .header("authorization", &self.api_key)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .context("Failed to start transcription")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "Transcription start failed: {} - {}",
                status,
                error_text
            ));
        }

        let job: JobResponse = response
            .json()
            .await
            .context("Failed to parse transcription job response")?;

        Ok(job.id)
    }

    /// Poll for job completion with a bounded attempt budget.
    async fn poll_job(&self, job_id: &str) -> Result<JobResult> {
        let url = format!("{}/v2/transcript/{}", self.base_url, job_id);

        let mut attempts = 0;
        loop {
            let response = self
                .http_client
                .get(&url)
                .header("authorization", &self.api_key)
                .send()
                .await
                .context("Failed to poll transcription status")?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(anyhow::anyhow!(
                    "Transcription status check failed: {} - {}",
                    status,
                    error_text
                ));
            }

            let job: JobResult = response
                .json()
                .await
                .context("Failed to parse transcription status")?;

            match job.status.as_str() {
                "completed" => {
                    tracing::info!(
                        job_id = %job_id,
                        text_length = job.text.as_ref().map(|t| t.len()).unwrap_or(0),
                        chapters = job.chapters.as_ref().map(|c| c.len()).unwrap_or(0),
                        "Transcription completed"
                    );
                    return Ok(job);
                }
                "error" => {
                    return Err(anyhow::anyhow!(
                        "Transcription failed: {}",
                        job.error.unwrap_or_else(|| "Unknown error".to_string())
                    ));
                }
                _ => {
                    // Status is "queued" or "processing", continue polling
                    attempts += 1;
                    if attempts >= MAX_POLL_ATTEMPTS {
                        return Err(anyhow::anyhow!(
                            "Transcription timed out after {} attempts",
                            attempts
                        ));
                    }

                    // Start with 1 second, max 5 seconds between polls
                    let delay_secs = attempts.min(5) as u64;
                    sleep(Duration::from_secs(delay_secs)).await;
                }
            }
        }
    }
}

#[async_trait]
impl TranscriptionProvider for SpeechApiClient {
    async fn transcribe(&self, input_ref: &str) -> Result<Transcript, StepError> {
        let job_id = self
            .start_job(input_ref)
            .await
            .map_err(StepError::recoverable)?;

        tracing::info!(job_id = %job_id, "Transcription job started, polling for completion");

        let result = self.poll_job(&job_id).await.map_err(StepError::recoverable)?;

        let transcript = map_transcript(result);
        if transcript.is_empty() {
            // Retrying won't conjure speech out of silent audio.
            return Err(StepError::unrecoverable(anyhow::anyhow!(
                "Vendor returned an empty transcript for {}",
                input_ref
            )));
        }
        Ok(transcript)
    }
}

fn map_transcript(job: JobResult) -> Transcript {
    let words: Vec<Word> = job
        .words
        .unwrap_or_default()
        .into_iter()
        .map(|w| Word {
            text: w.text,
            start_ms: w.start,
            end_ms: w.end,
        })
        .collect();

    let utterances: Option<Vec<Utterance>> = job.utterances.map(|us| {
        us.into_iter()
            .map(|u| Utterance {
                speaker: u.speaker,
                text: u.text,
                start_ms: u.start,
                end_ms: u.end,
            })
            .collect()
    });

    let chapters: Option<Vec<Chapter>> = job.chapters.map(|cs| {
        cs.into_iter()
            .map(|c| Chapter {
                start_ms: c.start,
                end_ms: c.end,
                headline: c.headline,
                summary: c.summary,
            })
            .collect()
    });

    // Segments come from diarized utterances when the vendor produced them;
    // otherwise the word stream becomes one segment.
    let segments: Vec<Segment> = match &utterances {
        Some(us) if !us.is_empty() => us
            .iter()
            .map(|u| Segment {
                start_ms: u.start_ms,
                end_ms: u.end_ms,
                text: u.text.clone(),
                words: words
                    .iter()
                    .filter(|w| w.start_ms >= u.start_ms && w.end_ms <= u.end_ms)
                    .cloned()
                    .collect(),
            })
            .collect(),
        _ => {
            let text = job.text.clone().unwrap_or_default();
            match (words.first(), words.last()) {
                (Some(first), Some(last)) => vec![Segment {
                    start_ms: first.start_ms,
                    end_ms: last.end_ms,
                    text,
                    words,
                }],
                _ => Vec::new(),
            }
        }
    };

    Transcript {
        text: job.text.unwrap_or_default(),
        segments,
        utterances,
        chapters,
    }
}

// Vendor API response types
#[derive(Debug, Deserialize)]
struct JobResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JobResult {
    status: String,
    text: Option<String>,
    words: Option<Vec<VendorWord>>,
    utterances: Option<Vec<VendorUtterance>>,
    chapters: Option<Vec<VendorChapter>>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VendorWord {
    text: String,
    start: u64,
    end: u64,
}

#[derive(Debug, Deserialize)]
struct VendorUtterance {
    speaker: String,
    text: String,
    start: u64,
    end: u64,
}

#[derive(Debug, Deserialize)]
struct VendorChapter {
    start: u64,
    end: u64,
    headline: String,
    summary: String,
}
