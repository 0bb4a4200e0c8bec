//! Configuration types for the chapter processing pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Time-range algebra epsilons.
    pub timeline: TimelineConfig,
    /// Voice activity detection settings.
    pub vad: VadConfig,
    /// RMS analysis settings.
    pub rms: RmsConfig,
    /// Loudness normalization settings.
    pub loudness: LoudnessConfig,
    /// Transcript command parsing/refinement settings.
    pub command: CommandConfig,
    /// Per-chapter orchestration settings.
    pub chapter: ChapterConfig,
    /// Input/output/binary paths for this run.
    pub paths: PathsConfig,
}

/// Time-range algebra tolerances (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Tolerance below which two instants are considered equal.
    pub equal_epsilon: f64,
    /// Maximum gap between two ranges for them to be merged as "touching".
    pub touching_epsilon: f64,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            equal_epsilon: 0.001,
            touching_epsilon: 0.01,
        }
    }
}

/// Voice activity detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Path to the ONNX VAD model file (consumed as an opaque path).
    pub model_path: Option<PathBuf>,
    /// Frame size in samples fed to the model on each inference call.
    pub window_samples: usize,
    /// Probability at or above which a candidate speech interval opens.
    pub speech_threshold: f32,
    /// Probability below which a tentative end-of-speech is marked.
    pub neg_threshold: f32,
    /// Sustained silence required to confirm an end-of-speech, in ms.
    pub min_silence_ms: u32,
    /// Minimum accepted speech interval length, in ms.
    pub min_speech_ms: u32,
    /// Padding added to each side of an accepted interval, in ms.
    pub speech_pad_ms: u32,
    /// Sample rate the model is invoked at. Must be 8000 or 16000.
    pub sample_rate: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            window_samples: 512,
            speech_threshold: 0.5,
            neg_threshold: 0.35,
            min_silence_ms: 300,
            min_speech_ms: 250,
            speech_pad_ms: 30,
            sample_rate: 16_000,
        }
    }
}

/// RMS analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RmsConfig {
    /// Tile width used for boundary search, in ms.
    pub win_ms: u32,
    /// RMS threshold below which a tile is classified as silent.
    pub silence_threshold: f32,
    /// Consecutive silent time required to confirm a boundary, in ms.
    pub min_silence_ms: u32,
}

impl Default for RmsConfig {
    fn default() -> Self {
        Self {
            win_ms: 20,
            silence_threshold: 0.01,
            min_silence_ms: 200,
        }
    }
}

/// Loudness normalization configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoudnessConfig {
    /// Target integrated loudness, in LU.
    pub target_integrated_lufs: f64,
    /// Target loudness range, in LU.
    pub target_lra: f64,
    /// Target true peak, in dBTP.
    pub target_true_peak: f64,
    /// Audio codec applied on render (fixed: AAC-LC).
    pub audio_codec: String,
    /// Audio bitrate in kb/s (fixed: 192).
    pub audio_bitrate_kbps: u32,
    /// High-pass prefilter cutoff, in Hz.
    pub prefilter_highpass_hz: u32,
    /// Whether the adaptive denoise prefilter stage is applied.
    pub prefilter_denoise: bool,
    /// CRF used when an accurate (re-encoded) trim is requested.
    pub accurate_trim_crf: u32,
    /// x264 preset used for accurate trims and concat renders.
    pub accurate_trim_preset: String,
}

impl Default for LoudnessConfig {
    fn default() -> Self {
        Self {
            target_integrated_lufs: -16.0,
            target_lra: 11.0,
            target_true_peak: -1.5,
            audio_codec: "aac".to_string(),
            audio_bitrate_kbps: 192,
            prefilter_highpass_hz: 80,
            prefilter_denoise: true,
            accurate_trim_crf: 18,
            accurate_trim_preset: "medium".to_string(),
        }
    }
}

/// Transcript command parsing and window refinement configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Wake word that opens a command window.
    pub wake_word: String,
    /// Close word that ends a command window.
    pub close_word: String,
    /// Words that may start a command body after the wake word.
    pub command_starters: Vec<String>,
    /// If no close word is found within this many seconds of tail, the
    /// wake-word occurrence is skipped rather than treated as unterminated.
    pub command_tail_max_seconds: f64,
    /// Padding applied to each side of a parsed command window before
    /// merging and silence-boundary refinement.
    pub command_trim_padding_seconds: f64,
    /// RMS threshold used by the refiner's keep-in-silence check.
    pub command_silence_rms_threshold: f32,
    /// How far the refiner is allowed to search for a silence boundary.
    pub command_silence_search_seconds: f64,
    /// Maximum allowed backward movement of a `before`-direction boundary.
    pub command_silence_max_backward_seconds: f64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            wake_word: "jarvis".to_string(),
            close_word: "thanks".to_string(),
            command_starters: vec![
                "bad".to_string(),
                "filename".to_string(),
                "file".to_string(),
                "edit".to_string(),
                "note".to_string(),
                "split".to_string(),
                "new".to_string(),
                "combine".to_string(),
            ],
            command_tail_max_seconds: 12.0,
            command_trim_padding_seconds: 0.3,
            command_silence_rms_threshold: 0.01,
            command_silence_search_seconds: 5.0,
            command_silence_max_backward_seconds: 2.0,
        }
    }
}

/// Per-chapter orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterConfig {
    /// Minimum chapter length, checked both before and after trimming.
    pub min_chapter_seconds: f64,
    /// Minimum padded trim window length; shorter windows abort with
    /// `TrimWindowError`.
    pub min_trim_window_seconds: f64,
    /// Padding added before the detected speech start on final trim.
    pub pre_speech_padding: f64,
    /// Padding added after the detected speech end on final trim.
    pub post_speech_padding: f64,
    /// Whether transcript-driven command parsing runs at all.
    pub enable_transcription: bool,
    /// Keep intermediate files instead of deleting them on completion.
    pub retain_intermediates: bool,
}

impl Default for ChapterConfig {
    fn default() -> Self {
        Self {
            min_chapter_seconds: 3.0,
            min_trim_window_seconds: 1.0,
            pre_speech_padding: 0.25,
            post_speech_padding: 0.5,
            enable_transcription: true,
            retain_intermediates: false,
        }
    }
}

/// Input/output/binary path configuration for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Input container path.
    pub input: PathBuf,
    /// Output directory (also the parent of the `.tmp` intermediate dir).
    pub output_dir: PathBuf,
    /// Transcoder binary (ffmpeg-compatible).
    pub transcoder_bin: String,
    /// Probe binary (ffprobe-compatible).
    pub probe_bin: String,
    /// STT engine binary.
    pub stt_bin: Option<String>,
    /// STT model file.
    pub stt_model: Option<PathBuf>,
    /// STT language tag.
    pub stt_language: String,
    /// STT thread count override.
    pub stt_threads: Option<u32>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output_dir: PathBuf::new(),
            transcoder_bin: "ffmpeg".to_string(),
            probe_bin: "ffprobe".to_string(),
            stt_bin: None,
            stt_model: None,
            stt_language: "en".to_string(),
            stt_threads: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let cfg = Config::default();
        let text = toml::to_string(&cfg).expect("serialize");
        let back: Config = toml::from_str(&text).expect("deserialize");
        assert_eq!(back.command.wake_word, cfg.command.wake_word);
        assert_eq!(back.vad.window_samples, cfg.vad.window_samples);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str("[chapter]\nmin_chapter_seconds = 5.0\n").unwrap();
        assert_eq!(cfg.chapter.min_chapter_seconds, 5.0);
        assert_eq!(cfg.vad.sample_rate, 16_000);
    }
}
