//! Splicer (C8): cuts the "keep" intervals, discards silent fragments, and
//! concatenates the survivors into one stream.

use std::path::{Path, PathBuf};

use crate::collaborators::Transcoder;
use crate::config::VadConfig;
use crate::error::{PipelineError, Result};
use crate::time_range::{subtract, TimeRange};
use crate::vad;

/// Where the splicer's intermediate segment files live and how they're
/// named — owned by the caller (the Orchestrator), passed in so this module
/// stays free of temp-directory policy.
pub struct SpliceWorkspace<'a> {
    pub temp_dir: &'a Path,
    pub basename: &'a str,
}

impl SpliceWorkspace<'_> {
    fn segment_path(&self, index: usize, ext: &str) -> PathBuf {
        self.temp_dir.join(format!("{}-splice-{index}.{ext}", self.basename))
    }

    fn spliced_path(&self, ext: &str) -> PathBuf {
        self.temp_dir.join(format!("{}-spliced.{ext}", self.basename))
    }
}

/// Result of splicing: the path to the final spliced media (which may just
/// be `input` unchanged for the full-keep case) and its duration.
pub struct SpliceResult {
    pub output: PathBuf,
    pub duration: f64,
}

/// Runs the splice plan for `input` of duration `clip_duration`, removing
/// `cut_windows` (§4.8).
pub async fn splice(
    transcoder: &dyn Transcoder,
    input: &Path,
    clip_duration: f64,
    cut_windows: &[TimeRange],
    vad_config: &VadConfig,
    touching_epsilon: f64,
    ext: &str,
    workspace: &SpliceWorkspace<'_>,
) -> Result<SpliceResult> {
    let domain = TimeRange::new(0.0, clip_duration)?
        .ok_or_else(|| PipelineError::SpliceError("clip has non-positive duration".to_string()))?;

    let keep_ranges = subtract(domain, cut_windows, touching_epsilon);
    if keep_ranges.is_empty() {
        return Err(PipelineError::SpliceError("entire clip removed".to_string()));
    }

    // Full keep: a single range covering [0, D).
    if keep_ranges.len() == 1 && keep_ranges[0].start <= f64::EPSILON && (keep_ranges[0].end - clip_duration).abs() < 1e-6 {
        return Ok(SpliceResult {
            output: input.to_path_buf(),
            duration: clip_duration,
        });
    }

    // Tail-only cut: a single keep range starting at 0 and ending strictly
    // before D (the Open Question fix: requiring `keep[0].end < D - ε`
    // rather than relying solely on `keep_ranges.len() == 1`, which would
    // otherwise misclassify a full-keep clip whose single range happens to
    // start after 0 as a tail cut).
    if keep_ranges.len() == 1 && keep_ranges[0].start <= f64::EPSILON && keep_ranges[0].end < clip_duration - 1e-6 {
        let output = workspace.spliced_path(ext);
        transcoder.stream_copy_trim(input, keep_ranges[0].end, &output).await?;
        return Ok(SpliceResult {
            output,
            duration: keep_ranges[0].end,
        });
    }

    // General: extract each keep range, drop silent ones, concat survivors.
    let mut segment_paths = Vec::with_capacity(keep_ranges.len());
    for (i, range) in keep_ranges.iter().enumerate() {
        let path = workspace.segment_path(i, ext);
        transcoder.accurate_trim(input, range.start, range.duration(), &path).await?;
        segment_paths.push((path, range.duration()));
    }

    let mut survivors = Vec::with_capacity(segment_paths.len());
    for (path, duration) in segment_paths {
        if segment_has_speech(transcoder, &path, duration, vad_config, touching_epsilon).await? {
            survivors.push(path);
        }
    }

    if survivors.is_empty() {
        return Err(PipelineError::SpliceError("no speech in any segment".to_string()));
    }

    if survivors.len() == 1 {
        let duration = keep_ranges
            .iter()
            .map(TimeRange::duration)
            .next()
            .unwrap_or(0.0);
        return Ok(SpliceResult {
            output: survivors.into_iter().next().expect("len == 1"),
            duration,
        });
    }

    let output = workspace.spliced_path(ext);
    transcoder.concat(&survivors, &output).await?;
    let duration: f64 = keep_ranges.iter().map(TimeRange::duration).sum();
    Ok(SpliceResult { output, duration })
}

async fn segment_has_speech(
    transcoder: &dyn Transcoder,
    path: &Path,
    duration: f64,
    vad_config: &VadConfig,
    touching_epsilon: f64,
) -> Result<bool> {
    let bytes = transcoder.extract_pcm(path, 0.0, duration, vad_config.sample_rate).await?;
    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    if samples.is_empty() {
        return Ok(false);
    }
    match vad::detect_speech_intervals(&samples, vad_config, touching_epsilon).await {
        Ok(intervals) => Ok(!intervals.is_empty()),
        // VAD failure during the splicer's per-segment check is treated as
        // "keep the segment" — dropping audio outright on a VAD outage
        // would be a worse outcome than an occasional silent survivor.
        Err(_) => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tr(start: f64, end: f64) -> TimeRange {
        TimeRange::new(start, end).unwrap().unwrap()
    }

    #[test]
    fn keep_ranges_classification_full_keep() {
        let keep = subtract(tr(0.0, 30.0), &[], 0.01);
        assert_eq!(keep, vec![tr(0.0, 30.0)]);
    }

    #[test]
    fn keep_ranges_classification_tail_only_cut() {
        // Cut window at the very end: [28, 30) of a 30s clip.
        let keep = subtract(tr(0.0, 30.0), &[tr(28.0, 30.0)], 0.01);
        assert_eq!(keep, vec![tr(0.0, 28.0)]);
        assert!(keep[0].start <= f64::EPSILON);
        assert!(keep[0].end < 30.0 - 1e-6);
    }

    #[test]
    fn keep_ranges_classification_general_multi_segment() {
        let keep = subtract(tr(0.0, 30.0), &[tr(10.0, 15.0)], 0.01);
        assert_eq!(keep, vec![tr(0.0, 10.0), tr(15.0, 30.0)]);
    }
}
