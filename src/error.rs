//! Error types for the chapter processing pipeline.

/// Top-level error type for the chapter processing pipeline.
///
/// `ChapterTooShort` and `BadTake` are deliberately not variants here: the
/// orchestrator treats them as structured skip outcomes recorded on a
/// `PipelineRecord`, not as error paths. `CombinePreviousUnavailable` is
/// recoverable — callers log it as a warning and fall through to normal
/// per-chapter processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed chapter metadata, out-of-range time, NaN/∞ input, or a
    /// missing required external binary. Fatal to the whole run when it
    /// concerns shared run metadata.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Transcoder spawn/exit/parse failure. Scoped to a chapter as a
    /// fallback when it concerns speech bounds, fatal when it concerns
    /// extraction of the final output.
    #[error("media I/O error: {0}")]
    MediaIoError(String),

    /// Transcription engine failure.
    #[error("STT error: {0}")]
    SttError(String),

    /// VAD model load or inference failure. Callers fall back to RMS.
    #[error("VAD unavailable: {0}")]
    VadUnavailable(String),

    /// The splice plan would produce an empty output.
    #[error("splice error: {0}")]
    SpliceError(String),

    /// The post-pad trim window would be at or below the configured
    /// minimum.
    #[error("trim window error: {0}")]
    TrimWindowError(String),

    /// Combine-previous could not proceed (no prior output, or its
    /// intermediate state was already cleaned up). Recoverable.
    #[error("combine-previous unavailable: {0}")]
    CombinePreviousUnavailable(String),

    /// Cooperative cancellation fired mid-chapter. Not a failure: the
    /// orchestrator maps this to the chapter's `Aborted` status rather than
    /// `Failed`.
    #[error("cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse failure (probe output, loudnorm analysis, STT segments).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
