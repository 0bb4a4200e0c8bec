//! Trait boundaries to the external collaborators named in §6: the
//! metadata probe, the media transcoder, and the speech-to-text engine.
//!
//! Production code drives the real child-process implementations in
//! [`crate::transcoder`], [`crate::probe`], and [`crate::stt`]. Tests drive
//! in-memory fakes against these same traits instead of spawning real
//! `ffmpeg`/`ffprobe`/STT processes.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// One chapter entry as reported by the metadata probe (§6 probe contract).
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterMeta {
    pub start_time: f64,
    pub end_time: f64,
    pub title: Option<String>,
}

/// Queries a container's embedded chapter markers.
#[async_trait]
pub trait ChapterProbe: Send + Sync {
    async fn probe(&self, input: &Path) -> Result<Vec<ChapterMeta>>;
}

/// The five measured values from the loudnorm analysis pass (§4.5), passed
/// verbatim to the render pass.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoudnormAnalysis {
    pub input_i: String,
    pub input_tp: String,
    pub input_lra: String,
    pub input_thresh: String,
    pub target_offset: String,
}

/// The underlying media transcoder, invoked as a child process (§6).
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Produces seekable mono PCM at `sample_rate`, little-endian f32 raw
    /// samples, for `[start, start + duration)` of `input`.
    async fn extract_pcm(&self, input: &Path, start: f64, duration: f64, sample_rate: u32) -> Result<Vec<u8>>;

    /// Re-encodes `[start, start + duration)` of `input` into `output`
    /// (accurate trim: full re-encode, frame-accurate boundaries).
    async fn accurate_trim(&self, input: &Path, start: f64, duration: f64, output: &Path) -> Result<()>;

    /// Stream-copies `[0, duration)` of `input` into `output` without
    /// re-encoding (used for the splicer's tail-only-cut case).
    async fn stream_copy_trim(&self, input: &Path, duration: f64, output: &Path) -> Result<()>;

    /// Concatenates `inputs` (already accurately re-encoded) into `output`
    /// via a filter-graph that concatenates video and resamples audio with
    /// async resampling to eliminate PTS drift.
    async fn concat(&self, inputs: &[std::path::PathBuf], output: &Path) -> Result<()>;

    /// First pass of two-pass loudness normalization: applies the prefilter
    /// then measures integrated loudness, returning the parsed JSON object
    /// of measured values.
    async fn loudnorm_analyze(&self, input: &Path) -> Result<LoudnormAnalysis>;

    /// Second pass: re-applies the prefilter, then renders with loudness
    /// normalization using the measured values from the analysis pass.
    async fn loudnorm_render(
        &self,
        input: &Path,
        analysis: &LoudnormAnalysis,
        output: &Path,
        reencode_video: bool,
    ) -> Result<()>;
}

/// How the STT engine reported segment timing (§6 STT contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentsSource {
    /// Per-token times are exposed directly; no rescaling applied.
    Tokens,
    /// Segment-level times only; §3's rescaling applies.
    Segments,
}

/// One transcript segment as returned by the STT engine.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SttSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Result of transcribing one audio file: word count from the plain-text
/// output, and time-aligned segments from the JSON output.
#[derive(Debug, Clone)]
pub struct SttOutput {
    pub word_count: usize,
    pub segments: Vec<SttSegment>,
    pub segments_source: SegmentsSource,
}

/// The speech-to-text engine, invoked as a child process with a cached
/// model (§6).
#[async_trait]
pub trait SttEngine: Send + Sync {
    async fn transcribe(&self, wav_path: &Path) -> Result<SttOutput>;
}
