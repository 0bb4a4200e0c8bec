//! Writes mono PCM sample buffers to disk as WAV files for the STT engine
//! (§6 STT contract: "a mono 16 kHz PCM file").

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::{PipelineError, Result};

/// Writes `samples` to `path` as a 32-bit float mono WAV at `sample_rate`.
pub fn write_wav_mono_f32(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| PipelineError::MediaIoError(format!("wav create {}: {e}", path.display())))?;
    for &s in samples {
        writer
            .write_sample(s)
            .map_err(|e| PipelineError::MediaIoError(format!("wav write {}: {e}", path.display())))?;
    }
    writer
        .finalize()
        .map_err(|e| PipelineError::MediaIoError(format!("wav finalize {}: {e}", path.display())))?;
    Ok(())
}
