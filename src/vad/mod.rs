//! Streaming voice-activity detection (C4).
//!
//! Wraps a Silero-style ONNX VAD model: fixed-length PCM frames plus a
//! sample-rate scalar plus two recurrent state tensors in, a speech
//! probability plus updated state out. Hysteresis and padding convert the
//! per-frame probability stream into a list of speech intervals.

use std::path::Path;
use std::sync::OnceLock;

use ndarray::{Array1, Array2, Array3};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tokio::sync::Mutex;

use crate::collaborators::Transcoder;
use crate::config::{RmsConfig, VadConfig};
use crate::error::{PipelineError, Result};
use crate::rms;
use crate::time_range::{merge, TimeRange};

/// Number of samples of inter-frame context the model expects prepended to
/// each window (window_samples / 8, per the v6 architecture).
const CONTEXT_SAMPLES: usize = 64;
/// RNN state shape: [num_layers, batch, hidden_size].
const STATE_SHAPE: (usize, usize, usize) = (2, 1, 64);

/// Loaded ONNX VAD model, held behind the process-wide singleton.
pub struct VadModel {
    session: Session,
}

impl VadModel {
    fn load(model_path: &Path) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| PipelineError::VadUnavailable(format!("session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| PipelineError::VadUnavailable(format!("optimization level: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                PipelineError::VadUnavailable(format!(
                    "failed to load VAD model from {}: {e}",
                    model_path.display()
                ))
            })?;
        Ok(Self { session })
    }
}

/// Process-wide lazily-initialized VAD session (§5, §9). The model is
/// costly to load; once-cell semantics ensure it loads exactly once and is
/// held for the lifetime of the process.
static SHARED_MODEL: OnceLock<Mutex<Option<VadModel>>> = OnceLock::new();

async fn shared_model(model_path: &Path) -> Result<&'static Mutex<Option<VadModel>>> {
    let cell = SHARED_MODEL.get_or_init(|| Mutex::new(None));
    {
        let mut guard = cell.lock().await;
        if guard.is_none() {
            *guard = Some(VadModel::load(model_path)?);
        }
    }
    Ok(cell)
}

/// Per-stream VAD runner: holds the recurrent state and context buffer for
/// one clip's worth of chunked inference. Per-call state tensors are
/// per-invocation, not shared, so a `VadStream` may be used freely alongside
/// others against the same shared session (§5, §9).
pub struct VadStream {
    state: Array3<f32>,
    context: Vec<f32>,
    sample_rate: u32,
}

impl VadStream {
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate != 8_000 && sample_rate != 16_000 {
            return Err(PipelineError::VadUnavailable(format!(
                "VAD only supports 8kHz or 16kHz, got {sample_rate}Hz"
            )));
        }
        Ok(Self {
            state: Array3::<f32>::zeros(STATE_SHAPE),
            context: vec![0.0f32; CONTEXT_SAMPLES],
            sample_rate,
        })
    }

    /// Runs one frame of exactly `window_samples` through the model,
    /// returning the speech probability and updating internal state.
    async fn process_chunk(&mut self, model_path: &Path, chunk: &[f32]) -> Result<f32> {
        let cell = shared_model(model_path).await?;
        let mut guard = cell.lock().await;
        let model = guard.as_mut().expect("initialized above");

        let window_len = chunk.len();
        let mut input_with_context = Vec::with_capacity(CONTEXT_SAMPLES + window_len);
        input_with_context.extend_from_slice(&self.context);
        input_with_context.extend_from_slice(chunk);

        let audio_input = Array2::from_shape_vec((1, CONTEXT_SAMPLES + window_len), input_with_context)
            .map_err(|e| PipelineError::VadUnavailable(format!("audio tensor shape: {e}")))?;
        let sr_input = Array1::from_vec(vec![i64::from(self.sample_rate)]);

        let input_value = Value::from_array(audio_input)
            .map_err(|e| PipelineError::VadUnavailable(format!("audio value: {e}")))?;
        let state_value = Value::from_array(self.state.clone())
            .map_err(|e| PipelineError::VadUnavailable(format!("state value: {e}")))?;
        let sr_value = Value::from_array(sr_input)
            .map_err(|e| PipelineError::VadUnavailable(format!("sample-rate value: {e}")))?;

        let outputs = model
            .session
            .run(ort::inputs![input_value, state_value, sr_value])
            .map_err(|e| PipelineError::VadUnavailable(format!("inference failed: {e}")))?;

        let prob_view = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::VadUnavailable(format!("probability extraction: {e}")))?;
        let probability = prob_view.1[0];

        let state_view = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::VadUnavailable(format!("state extraction: {e}")))?;
        self.state = Array3::from_shape_vec(
            (STATE_SHAPE.0, STATE_SHAPE.1, STATE_SHAPE.2),
            state_view.1.to_vec(),
        )
        .map_err(|e| PipelineError::VadUnavailable(format!("state reshape: {e}")))?;

        if window_len >= CONTEXT_SAMPLES {
            self.context.copy_from_slice(&chunk[window_len - CONTEXT_SAMPLES..]);
        }

        Ok(probability)
    }
}

/// Candidate-tracking hysteresis state while scanning the probability
/// stream.
struct Candidate {
    start: f64,
    silence_since: Option<f64>,
}

/// Runs the VAD model over an entire clip's PCM, in strides of
/// `config.window_samples` (zero-padded tail), and converts the resulting
/// probability stream into padded speech intervals (§4.4).
pub async fn detect_speech_intervals(
    samples: &[f32],
    config: &VadConfig,
    touching_epsilon: f64,
) -> Result<Vec<TimeRange>> {
    let model_path = config
        .model_path
        .as_ref()
        .ok_or_else(|| PipelineError::VadUnavailable("no VAD model path configured".to_string()))?;

    let mut stream = VadStream::new(config.sample_rate)?;
    let window = config.window_samples.max(1);
    let frame_seconds = window as f64 / f64::from(config.sample_rate);

    let mut raw: Vec<TimeRange> = Vec::new();
    let mut candidate: Option<Candidate> = None;
    let mut frame_index: usize = 0;
    let mut offset = 0usize;

    while offset < samples.len() {
        let end = (offset + window).min(samples.len());
        let mut frame = samples[offset..end].to_vec();
        frame.resize(window, 0.0);

        let probability = stream.process_chunk(model_path, &frame).await?;
        let t = frame_index as f64 * frame_seconds;

        match candidate.as_mut() {
            None => {
                if probability >= config.speech_threshold {
                    candidate = Some(Candidate {
                        start: t,
                        silence_since: None,
                    });
                }
            }
            Some(c) => {
                if probability < config.neg_threshold {
                    let silence_start = *c.silence_since.get_or_insert(t);
                    let sustained_ms = (t + frame_seconds - silence_start) * 1000.0;
                    if sustained_ms >= f64::from(config.min_silence_ms) {
                        if let Ok(Some(range)) = TimeRange::new(c.start, silence_start) {
                            raw.push(range);
                        }
                        candidate = None;
                    }
                } else {
                    c.silence_since = None;
                }
            }
        }

        offset += window;
        frame_index += 1;
    }

    // Clip ends while triggered: close at buffer end.
    if let Some(c) = candidate.take() {
        let clip_end = samples.len() as f64 / f64::from(config.sample_rate);
        if let Ok(Some(range)) = TimeRange::new(c.start, clip_end) {
            raw.push(range);
        }
    }

    let min_speech_seconds = f64::from(config.min_speech_ms) / 1000.0;
    let accepted: Vec<TimeRange> = raw.into_iter().filter(|r| r.duration() >= min_speech_seconds).collect();

    Ok(pad_intervals(&accepted, config.speech_pad_ms, touching_epsilon))
}

/// Grows each interval by `pad_ms` on each side; when two adjacent
/// intervals' combined padding would overlap, each side receives half of
/// the available gap (§4.4).
fn pad_intervals(intervals: &[TimeRange], pad_ms: u32, touching_epsilon: f64) -> Vec<TimeRange> {
    if intervals.is_empty() {
        return Vec::new();
    }
    let pad = f64::from(pad_ms) / 1000.0;
    let mut sorted = intervals.to_vec();
    sorted.sort_by(|a, b| a.start.partial_cmp(&b.start).expect("finite"));

    let mut padded = Vec::with_capacity(sorted.len());
    for (i, r) in sorted.iter().enumerate() {
        let mut start = r.start - pad;
        let mut end = r.end + pad;

        if i > 0 {
            let prev_end = sorted[i - 1].end;
            let gap = r.start - prev_end;
            if gap < 2.0 * pad {
                start = r.start - (gap / 2.0).max(0.0);
            }
        }
        if i + 1 < sorted.len() {
            let next_start = sorted[i + 1].start;
            let gap = next_start - r.end;
            if gap < 2.0 * pad {
                end = r.end + (gap / 2.0).max(0.0);
            }
        }
        padded.push(TimeRange { start, end });
    }
    merge(&padded, touching_epsilon)
}

/// The start of the first and the end of the last detected speech interval
/// in a clip (§3). `note` is set whenever the detector failed and a
/// weaker fallback was substituted — the orchestrator surfaces it as a
/// `fallback_note` on the chapter's record rather than silently trusting a
/// guess.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechBounds {
    pub start: f64,
    pub end: f64,
    pub note: Option<String>,
}

/// Computes speech bounds on `input` (full clip, `[0, duration)`), trying
/// the VAD runner first and falling back to tiled RMS boundary search
/// (C3's `find_speech_start_rms`/`find_speech_end_rms`) when the VAD is
/// unavailable or detects nothing. Falls back to the full clip, with a
/// note, when neither detector finds speech — this function does not
/// propagate `MediaIoError`/`VadUnavailable` to the caller; both become a
/// fallback with an explanatory note instead, per §4.9's fallback
/// semantics ("the Orchestrator proceeds with whatever is available").
pub async fn detect_speech_bounds(
    transcoder: &dyn Transcoder,
    input: &Path,
    duration: f64,
    vad_config: &VadConfig,
    rms_config: &RmsConfig,
    touching_epsilon: f64,
) -> Result<SpeechBounds> {
    let samples = match crate::audio::reader::read_pcm(transcoder, input, 0.0, duration, vad_config.sample_rate).await {
        Ok(samples) => samples,
        Err(e) => {
            return Ok(SpeechBounds {
                start: 0.0,
                end: duration,
                note: Some(format!("audio read failed ({e}); used full-clip fallback")),
            });
        }
    };

    if let Ok(intervals) = detect_speech_intervals(&samples, vad_config, touching_epsilon).await {
        if let (Some(first), Some(last)) = (intervals.first(), intervals.last()) {
            return Ok(SpeechBounds {
                start: first.start,
                end: last.end,
                note: None,
            });
        }
    }

    let start = rms::find_speech_start_rms(&samples, vad_config.sample_rate, rms_config.win_ms, rms_config.silence_threshold);
    let end = rms::find_speech_end_rms(&samples, vad_config.sample_rate, rms_config.win_ms, rms_config.silence_threshold);
    match (start, end) {
        (Some(s), Some(e)) if e > s => Ok(SpeechBounds {
            start: s,
            end: e,
            note: Some("VAD unavailable; used RMS fallback".to_string()),
        }),
        _ => Ok(SpeechBounds {
            start: 0.0,
            end: duration,
            note: Some("no speech detected; used full-clip fallback".to_string()),
        }),
    }
}
