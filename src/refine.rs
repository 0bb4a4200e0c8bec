//! Command Window Refiner (C7): snaps parser-produced windows to the
//! nearest silence boundary so splicing produces click-free output.

use std::path::Path;

use crate::collaborators::Transcoder;
use crate::config::{CommandConfig, RmsConfig, TimelineConfig};
use crate::error::Result;
use crate::rms::{self, Direction};
use crate::time_range::{merge, TimeRange};

/// Refines a set of command windows against `input`'s audio.
///
/// `vad_speech` is the already-computed VAD speech intervals for the whole
/// clip, if the VAD runner succeeded; when `None`, every boundary search
/// falls back directly to tiled RMS.
pub async fn refine_windows(
    transcoder: &dyn Transcoder,
    input: &Path,
    clip_duration: f64,
    raw_windows: &[TimeRange],
    vad_speech: Option<&[TimeRange]>,
    command: &CommandConfig,
    rms_config: &RmsConfig,
    timeline: &TimelineConfig,
    sample_rate: u32,
) -> Result<Vec<TimeRange>> {
    // 1. Pad and clamp.
    let padded: Vec<TimeRange> = raw_windows
        .iter()
        .filter_map(|w| {
            let start = (w.start - command.command_trim_padding_seconds).max(0.0);
            let end = (w.end + command.command_trim_padding_seconds).min(clip_duration);
            TimeRange::new(start, end).ok().flatten()
        })
        .collect();

    // 2. Merge.
    let merged = merge(&padded, timeline.touching_epsilon);

    let silence_gaps = vad_speech.map(|speech| rms::build_silence_gaps_from_speech(speech, clip_duration, timeline.equal_epsilon));

    // 3. Refine each boundary.
    let mut refined = Vec::with_capacity(merged.len());
    for window in &merged {
        let start = refine_boundary(
            transcoder,
            input,
            clip_duration,
            window.start,
            Direction::Before,
            silence_gaps.as_deref(),
            command,
            rms_config,
            sample_rate,
        )
        .await?;
        let end = refine_boundary(
            transcoder,
            input,
            clip_duration,
            window.end,
            Direction::After,
            silence_gaps.as_deref(),
            command,
            rms_config,
            sample_rate,
        )
        .await?;
        if let Some(range) = TimeRange::new(start, end).ok().flatten() {
            refined.push(range);
        }
    }

    // 4. Re-merge.
    Ok(merge(&refined, timeline.touching_epsilon))
}

#[allow(clippy::too_many_arguments)]
async fn refine_boundary(
    transcoder: &dyn Transcoder,
    input: &Path,
    clip_duration: f64,
    target: f64,
    direction: Direction,
    silence_gaps: Option<&[TimeRange]>,
    command: &CommandConfig,
    rms_config: &RmsConfig,
    sample_rate: u32,
) -> Result<f64> {
    if keep_in_silence(transcoder, input, clip_duration, target, rms_config, sample_rate).await? {
        return Ok(target);
    }

    let mut candidate = silence_gaps.and_then(|gaps| nearest_gap_boundary(gaps, target, direction, command.command_silence_search_seconds));

    if candidate.is_none() {
        candidate = rms_fallback_boundary(transcoder, input, clip_duration, target, direction, command, rms_config, sample_rate).await?;
    }

    match (direction, candidate) {
        (Direction::Before, Some(c)) => {
            if target - c > command.command_silence_max_backward_seconds {
                Ok(target)
            } else {
                Ok(c)
            }
        }
        (Direction::After, Some(c)) => Ok(c),
        (_, None) => Ok(target),
    }
}

/// Reads a tiny PCM window centered on `target` (half-window = 1.5× the RMS
/// window) and checks whether the minimum windowed RMS within it is below
/// the configured threshold — i.e. the target already falls on silence.
async fn keep_in_silence(
    transcoder: &dyn Transcoder,
    input: &Path,
    clip_duration: f64,
    target: f64,
    rms_config: &RmsConfig,
    sample_rate: u32,
) -> Result<bool> {
    let half_window = 1.5 * (f64::from(rms_config.win_ms) / 1000.0);
    let start = (target - half_window).max(0.0);
    let end = (target + half_window).min(clip_duration);
    let duration = end - start;
    if duration <= 0.0 {
        return Ok(true);
    }

    let samples = crate::audio::reader::read_pcm(transcoder, input, start, duration, sample_rate).await?;
    if samples.is_empty() {
        return Ok(true);
    }
    let tile_len = ((u64::from(sample_rate) * u64::from(rms_config.win_ms)) / 1000).max(1) as usize;
    Ok(rms::min_window_rms(&samples, tile_len) < rms_config.silence_threshold)
}

fn nearest_gap_boundary(gaps: &[TimeRange], target: f64, direction: Direction, search_seconds: f64) -> Option<f64> {
    match direction {
        Direction::Before => gaps
            .iter()
            .filter(|g| g.end <= target && g.end >= target - search_seconds)
            .map(|g| g.end)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v)))),
        Direction::After => gaps
            .iter()
            .filter(|g| g.start >= target && g.start <= target + search_seconds)
            .map(|g| g.start)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v)))),
    }
}

#[allow(clippy::too_many_arguments)]
async fn rms_fallback_boundary(
    transcoder: &dyn Transcoder,
    input: &Path,
    clip_duration: f64,
    target: f64,
    direction: Direction,
    command: &CommandConfig,
    rms_config: &RmsConfig,
    sample_rate: u32,
) -> Result<Option<f64>> {
    let search_seconds = command.command_silence_search_seconds;
    let (slice_start, slice_end) = match direction {
        Direction::Before => ((target - search_seconds).max(0.0), target),
        Direction::After => (target, (target + search_seconds).min(clip_duration)),
    };
    let duration = slice_end - slice_start;
    if duration <= 0.0 {
        return Ok(None);
    }

    let samples = crate::audio::reader::read_pcm(transcoder, input, slice_start, duration, sample_rate).await?;
    if samples.is_empty() {
        return Ok(None);
    }

    Ok(rms::find_silence_boundary_rms(
        &samples,
        sample_rate,
        direction,
        rms_config.win_ms,
        rms_config.silence_threshold,
        rms_config.min_silence_ms,
    )
    .map(|offset| slice_start + offset))
}
