//! Windowed RMS analysis and silence-boundary search (C3).
//!
//! Pure numeric, no I/O. Used both standalone (keep-in-silence checks,
//! fallback boundary search) and as the fallback path when the VAD runner
//! (C4) is unavailable.

/// Direction to search for a silence boundary from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Search backward from the end of the buffer toward the start.
    Before,
    /// Search forward from the start of the buffer toward the end.
    After,
}

/// Root-mean-square energy of a sample buffer. Zero for empty input.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    ((sum_sq / samples.len() as f64).sqrt()) as f32
}

/// Minimum RMS over all contiguous windows of `win` samples, stepping by 1.
///
/// Returns 0 for empty input or a non-positive window; returns the full-clip
/// RMS when `win >= samples.len()`.
pub fn min_window_rms(samples: &[f32], win: usize) -> f32 {
    if samples.is_empty() || win == 0 {
        return 0.0;
    }
    if win >= samples.len() {
        return rms(samples);
    }

    // Running sum-of-squares over a sliding window avoids O(n*win) rescans.
    let mut sum_sq: f64 = samples[..win].iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let mut min_sum_sq = sum_sq;
    for i in win..samples.len() {
        let enter = f64::from(samples[i]) * f64::from(samples[i]);
        let leave = f64::from(samples[i - win]) * f64::from(samples[i - win]);
        sum_sq += enter - leave;
        if sum_sq < min_sum_sq {
            min_sum_sq = sum_sq;
        }
    }
    ((min_sum_sq.max(0.0) / win as f64).sqrt()) as f32
}

/// Splits `samples` into contiguous tiles of `win_ms` at `sample_rate`,
/// returning the RMS of each tile. The final tile may be shorter than
/// `win_ms` if the buffer length isn't an exact multiple.
fn tile_rms(samples: &[f32], sample_rate: u32, win_ms: u32) -> Vec<f32> {
    let tile_len = ((sample_rate as u64 * win_ms as u64) / 1000).max(1) as usize;
    samples.chunks(tile_len).map(rms).collect()
}

/// Finds the first run of `min_silence_ms` (rounded up to whole tiles) of
/// consecutive silent tiles, starting from the appropriate end, and returns
/// the offset in seconds of the boundary between speech and silence.
///
/// For `Direction::Before`, returns the timestamp of the end of the run
/// (closest to the end of the buffer); for `Direction::After`, returns the
/// start of the run (closest to the start of the buffer).
pub fn find_silence_boundary_rms(
    samples: &[f32],
    sample_rate: u32,
    direction: Direction,
    win_ms: u32,
    threshold: f32,
    min_silence_ms: u32,
) -> Option<f64> {
    if samples.is_empty() || sample_rate == 0 || win_ms == 0 {
        return None;
    }
    let tiles = tile_rms(samples, sample_rate, win_ms);
    let tiles_needed = (min_silence_ms as f64 / win_ms as f64).ceil() as usize;
    let tiles_needed = tiles_needed.max(1);
    let tile_seconds = win_ms as f64 / 1000.0;
    let silent: Vec<bool> = tiles.iter().map(|&r| r < threshold).collect();

    match direction {
        Direction::Before => {
            // Scan from the end; find the first (rightmost) run.
            let mut run_len = 0usize;
            for (i, &is_silent) in silent.iter().enumerate().rev() {
                if is_silent {
                    run_len += 1;
                    if run_len >= tiles_needed {
                        // Run spans tiles [i, i + run_len). Boundary is the
                        // end of the run (closest to end-of-buffer).
                        let run_end_tile = i + run_len;
                        return Some(run_end_tile as f64 * tile_seconds);
                    }
                } else {
                    run_len = 0;
                }
            }
            None
        }
        Direction::After => {
            let mut run_len = 0usize;
            let mut run_start = 0usize;
            for (i, &is_silent) in silent.iter().enumerate() {
                if is_silent {
                    if run_len == 0 {
                        run_start = i;
                    }
                    run_len += 1;
                    if run_len >= tiles_needed {
                        return Some(run_start as f64 * tile_seconds);
                    }
                } else {
                    run_len = 0;
                }
            }
            None
        }
    }
}

/// Tiled variant: first tile-boundary offset, scanning forward, whose RMS is
/// at or above `threshold` — i.e. the start of speech.
pub fn find_speech_start_rms(samples: &[f32], sample_rate: u32, win_ms: u32, threshold: f32) -> Option<f64> {
    let tiles = tile_rms(samples, sample_rate, win_ms);
    let tile_seconds = win_ms as f64 / 1000.0;
    tiles
        .iter()
        .position(|&r| r >= threshold)
        .map(|i| i as f64 * tile_seconds)
}

/// Tiled variant: last tile-boundary offset, scanning backward, whose RMS is
/// at or above `threshold` — i.e. the end of speech.
pub fn find_speech_end_rms(samples: &[f32], sample_rate: u32, win_ms: u32, threshold: f32) -> Option<f64> {
    let tiles = tile_rms(samples, sample_rate, win_ms);
    let tile_seconds = win_ms as f64 / 1000.0;
    tiles
        .iter()
        .rposition(|&r| r >= threshold)
        .map(|i| (i + 1) as f64 * tile_seconds)
}

/// Offset, in seconds, of the tile with the lowest RMS in the buffer.
pub fn find_lowest_amplitude_offset(samples: &[f32], sample_rate: u32, win_ms: u32) -> Option<f64> {
    let tiles = tile_rms(samples, sample_rate, win_ms);
    if tiles.is_empty() {
        return None;
    }
    let tile_seconds = win_ms as f64 / 1000.0;
    let (idx, _) = tiles
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).expect("rms is always finite"))
        .expect("non-empty tiles");
    Some(idx as f64 * tile_seconds)
}

/// Complement of `speech` intervals within `[0, duration]`, as an ordered
/// list of silence gaps shorter than `crate::time_range`'s equal epsilon are
/// filtered out.
pub fn build_silence_gaps_from_speech(
    speech: &[crate::time_range::TimeRange],
    duration: f64,
    equal_epsilon: f64,
) -> Vec<crate::time_range::TimeRange> {
    use crate::time_range::{subtract, TimeRange};
    let domain = match TimeRange::new(0.0, duration) {
        Ok(Some(d)) => d,
        _ => return Vec::new(),
    };
    subtract(domain, speech, 0.01)
        .into_iter()
        .filter(|g| g.duration() >= equal_epsilon)
        .collect()
}
