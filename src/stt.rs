//! Real child-process [`SttEngine`] implementation (§6 STT contract).
//!
//! The engine is invoked once per WAV file and is expected to emit a
//! sibling `.txt` (plain text) and `.json` (time-aligned segments) file
//! next to its input. The core trusts `.txt` for word-count checks and
//! `.json` for time-aligned parsing.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;

use crate::collaborators::{SegmentsSource, SttEngine, SttOutput, SttSegment};
use crate::error::{PipelineError, Result};

pub struct ExternalSttEngine {
    bin: String,
    model: Option<PathBuf>,
    language: String,
    threads: Option<u32>,
    call_timeout: Duration,
}

impl ExternalSttEngine {
    /// Resolves `bin` on `PATH` before returning (§7 `InvalidInput`: "missing
    /// required external binary") so a misconfigured run fails immediately
    /// instead of partway through the first chapter.
    pub fn new(
        bin: impl Into<String>,
        model: Option<PathBuf>,
        language: impl Into<String>,
        threads: Option<u32>,
        call_timeout: Duration,
    ) -> Result<Self> {
        let bin = bin.into();
        which::which(&bin).map_err(|e| PipelineError::InvalidInput(format!("STT binary {bin:?} not found on PATH: {e}")))?;
        Ok(Self {
            bin,
            model,
            language: language.into(),
            threads,
            call_timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SttJson {
    #[serde(default)]
    segments: Vec<SttJsonSegment>,
    #[serde(rename = "segmentsSource", default)]
    segments_source: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SttJsonSegment {
    start: f64,
    end: f64,
    text: String,
}

#[async_trait]
impl SttEngine for ExternalSttEngine {
    async fn transcribe(&self, wav_path: &Path) -> Result<SttOutput> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg(wav_path).arg("--language").arg(&self.language);
        if let Some(model) = &self.model {
            cmd.arg("--model").arg(model);
        }
        if let Some(threads) = self.threads {
            cmd.arg("--threads").arg(threads.to_string());
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| PipelineError::SttError(format!("spawn failed: {e}")))?;
        let output = timeout(self.call_timeout, child.wait_with_output())
            .await
            .map_err(|_| PipelineError::SttError("timed out".to_string()))?
            .map_err(|e| PipelineError::SttError(format!("wait failed: {e}")))?;
        if !output.status.success() {
            return Err(PipelineError::SttError(format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let txt_path = wav_path.with_extension("txt");
        let json_path = wav_path.with_extension("json");

        let text = tokio::fs::read_to_string(&txt_path)
            .await
            .map_err(|e| PipelineError::SttError(format!("reading {}: {e}", txt_path.display())))?;
        let word_count = text.split_whitespace().count();

        let json_text = tokio::fs::read_to_string(&json_path)
            .await
            .map_err(|e| PipelineError::SttError(format!("reading {}: {e}", json_path.display())))?;
        let parsed: SttJson = serde_json::from_str(&json_text)?;

        let segments_source = match parsed.segments_source.as_deref() {
            Some("tokens") => SegmentsSource::Tokens,
            _ => SegmentsSource::Segments,
        };

        Ok(SttOutput {
            word_count,
            segments: parsed
                .segments
                .into_iter()
                .map(|s| SttSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text,
                })
                .collect(),
            segments_source,
        })
    }
}
