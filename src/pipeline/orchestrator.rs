//! Chapter Orchestrator (C9): the per-chapter state machine that wires
//! C1–C8 together, produces final outputs, and accumulates the per-run
//! [`OutputLog`] (§4.9).
//!
//! Chapters are processed strictly in index order on a single task —
//! `combine-previous` can fold a chapter into the output of whichever
//! chapter produced the most recent file, so later chapters depend on
//! earlier ones having already run (§5).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::collaborators::{ChapterProbe, SegmentsSource, SttEngine, Transcoder};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::refine::refine_windows;
use crate::rms::{self, Direction};
use crate::splice::{splice, SpliceWorkspace};
use crate::time_range::TimeRange;
use crate::transcript::{self, TranscriptCommand, TranscriptSegment};
use crate::vad::{self, SpeechBounds};

use super::chapter::{format_chapter_filename, Chapter};
use super::record::{ChapterPaths, ChapterStatus, JarvisOccurrence, OutputLog, PipelineRecord};

/// The STT contract (§6) is fixed at mono 16 kHz PCM, independent of
/// whatever sample rate the VAD runner is configured for.
const STT_SAMPLE_RATE_HZ: u32 = 16_000;

/// Everything the orchestrator learns about a chapter's parsed commands,
/// separated out so the three top-level branch checks (§4.9's state
/// diagram) read as simple boolean/option tests.
struct ParsedCommands {
    word_count: usize,
    commands: Vec<TranscriptCommand>,
}

impl ParsedCommands {
    fn empty() -> Self {
        Self {
            word_count: 0,
            commands: Vec::new(),
        }
    }

    fn filename_override(&self) -> Option<&str> {
        self.commands.iter().find_map(|c| match c {
            TranscriptCommand::Filename { value, .. } => Some(value.as_str()),
            _ => None,
        })
    }

    fn has_bad_take(&self) -> bool {
        self.commands.iter().any(|c| matches!(c, TranscriptCommand::BadTake { .. }))
    }

    fn has_combine_previous(&self) -> bool {
        self.commands.iter().any(|c| matches!(c, TranscriptCommand::CombinePrevious { .. }))
    }

    fn has_edit(&self) -> bool {
        self.commands.iter().any(|c| matches!(c, TranscriptCommand::Edit { .. }))
    }

    fn has_split(&self) -> bool {
        self.commands.iter().any(|c| matches!(c, TranscriptCommand::Split { .. }))
    }

    fn notes(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                TranscriptCommand::Note { value, window } => Some(format!("{:.2}: {value}", window.start)),
                _ => None,
            })
            .collect()
    }

    fn windows(&self) -> Vec<TimeRange> {
        self.commands.iter().map(TranscriptCommand::window).collect()
    }

    /// Skip-transcript condition (§4.9): a near-silent chapter with no
    /// recognized commands. Checked before the bad-take / combine-previous
    /// branches, so any parsed command (even a malformed one that still
    /// produced a `TranscriptCommand`) takes this chapter past it.
    fn is_effectively_empty(&self) -> bool {
        self.word_count <= 10 && self.commands.is_empty()
    }
}

/// Tracks the most recently produced final output, so a later
/// `combine-previous` chapter has something to fold into (§4.9).
struct PreviousOutput {
    path: PathBuf,
    duration: f64,
}

/// Per-chapter state machine driver. Configuration and collaborators are
/// fixed for the run; the only mutable state threaded between chapters is
/// [`PreviousOutput`] (§9: "no process-wide mutable state other than the
/// lazily-initialized VAD session").
pub struct Orchestrator {
    config: Config,
    probe: Arc<dyn ChapterProbe>,
    transcoder: Arc<dyn Transcoder>,
    stt: Option<Arc<dyn SttEngine>>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: Config, probe: Arc<dyn ChapterProbe>, transcoder: Arc<dyn Transcoder>, stt: Option<Arc<dyn SttEngine>>) -> Self {
        Self {
            config,
            probe,
            transcoder,
            stt,
            cancel: CancellationToken::new(),
        }
    }

    /// A clone of the cooperative cancellation token (§5). Cancelling it
    /// aborts the in-flight chapter and skips everything after it.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Checked "before each external invocation and after each state
    /// transition" (§5). Called at every collaborator call site inside the
    /// per-chapter state machine, not just once per chapter — a chapter
    /// that's mid-transcode when `cancel()` fires is the one that gets
    /// aborted, not the next one that never started.
    fn check_cancel(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(PipelineError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Runs the whole pipeline: probes chapters, processes each in order,
    /// and writes the permanent logs. Only errors that prevent a valid run
    /// from starting at all — an unprobeable input, or an uncreatable
    /// output/temp directory — escape this function (§7's "non-zero exit
    /// status" conditions (a) and (b)). Everything else is caught and
    /// recorded per chapter.
    pub async fn run(&self) -> Result<OutputLog> {
        let input = self.config.paths.input.clone();
        let output_dir = self.config.paths.output_dir.clone();
        let temp_dir = output_dir.join(".tmp");

        tokio::fs::create_dir_all(&output_dir).await?;
        tokio::fs::create_dir_all(&temp_dir).await?;

        let ext = input
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4")
            .to_string();

        let metas = self.probe.probe(&input).await?;
        let mut chapters = Vec::with_capacity(metas.len());
        for (index, meta) in metas.into_iter().enumerate() {
            let title = meta.title.unwrap_or_else(|| format!("Chapter {}", index + 1));
            chapters.push(Chapter::new(index, title, meta.start_time, meta.end_time)?);
        }

        let mut log = OutputLog::default();
        let mut previous: Option<PreviousOutput> = None;

        for chapter in &chapters {
            if self.cancel.is_cancelled() {
                log.push(PipelineRecord::new(chapter.index, ChapterStatus::Aborted));
                continue;
            }

            let paths = ChapterPaths::new(temp_dir.clone(), chapter, &ext);
            let span = info_span!("chapter", index = chapter.index, title = %chapter.title);
            let outcome = self
                .process_chapter(chapter, &input, &paths, &mut previous)
                .instrument(span)
                .await;

            let record = match outcome {
                Ok(record) => record,
                Err(PipelineError::Cancelled) => {
                    debug!(chapter = chapter.index, "chapter aborted by cancellation");
                    PipelineRecord::new(chapter.index, ChapterStatus::Aborted)
                }
                Err(e) => {
                    warn!(chapter = chapter.index, error = %e, "chapter failed; recording and continuing");
                    let mut record = PipelineRecord::new(chapter.index, ChapterStatus::Failed);
                    record.fallback_note = Some(e.to_string());
                    record
                }
            };

            if !self.config.chapter.retain_intermediates {
                self.cleanup_chapter_intermediates(&temp_dir, &paths.basename).await;
            }

            log.push(record);
        }

        log.write_all(&input, &output_dir, &temp_dir).await?;

        if !self.config.chapter.retain_intermediates {
            let _ = tokio::fs::remove_dir_all(&temp_dir).await;
        }

        Ok(log)
    }

    /// Removes every intermediate file this chapter may have created under
    /// the temp directory, matching by basename prefix rather than an
    /// exhaustive fixed list — the splicer's `-splice-<k>` segments are
    /// unbounded in count (§6, §9: "guarantees their deletion on any exit
    /// path unless a debug-retention flag is set").
    async fn cleanup_chapter_intermediates(&self, temp_dir: &Path, basename: &str) {
        let mut entries = match tokio::fs::read_dir(temp_dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(basename))
            {
                let _ = tokio::fs::remove_file(entry.path()).await;
            }
        }
    }

    /// Drives one chapter through DISCOVERED → ... → RECORD_OUTCOME.
    async fn process_chapter(
        &self,
        chapter: &Chapter,
        input: &Path,
        paths: &ChapterPaths,
        previous: &mut Option<PreviousOutput>,
    ) -> Result<PipelineRecord> {
        if chapter.duration() < self.config.chapter.min_chapter_seconds {
            debug!("chapter shorter than minimum before extraction");
            return Ok(PipelineRecord::new(chapter.index, ChapterStatus::SkippedInitialShort));
        }

        self.check_cancel()?;
        // RAW_EXTRACT: an accurate (re-encoded) trim so the chapter
        // boundary is frame-accurate rather than snapped to a keyframe.
        self.transcoder
            .accurate_trim(input, chapter.start, chapter.duration(), &paths.raw())
            .await?;

        self.check_cancel()?;
        // NORMALIZE: two-pass loudness render. Video is stream-copied —
        // RAW_EXTRACT already re-encoded it, so no second video pass is
        // needed for a plain normalize.
        crate::loudness::normalize(self.transcoder.as_ref(), &paths.raw(), &paths.normalized(), false).await?;

        self.check_cancel()?;
        let (parsed, transcribe_note) = if self.config.chapter.enable_transcription {
            self.transcribe_commands(chapter, paths).await?
        } else {
            (ParsedCommands::empty(), None)
        };

        if self.config.chapter.enable_transcription && parsed.is_effectively_empty() {
            let mut record = PipelineRecord::new(chapter.index, ChapterStatus::SkippedTranscript);
            record.fallback_note = transcribe_note;
            return Ok(record);
        }
        if parsed.has_bad_take() {
            let mut record = PipelineRecord::new(chapter.index, ChapterStatus::SkippedBadTake);
            record.fallback_note = transcribe_note;
            return Ok(record);
        }

        let mut record = PipelineRecord::new(chapter.index, ChapterStatus::Processed);
        record.fallback_note = transcribe_note;
        record.edit_flag = parsed.has_edit();
        record.note_entries = parsed.notes();
        record.split_marker = parsed.has_split();

        let filename_override = parsed.filename_override().map(str::to_string);
        self.check_cancel()?;
        let splice_result = self
            .refine_and_splice(&paths.normalized(), chapter.duration(), &parsed, paths)
            .await?;

        if parsed.has_combine_previous() {
            match previous.take() {
                Some(prev) => {
                    self.check_cancel()?;
                    self.combine_with_previous(chapter, paths, &splice_result, prev, previous, &mut record)
                        .await?;
                    return Ok(record);
                }
                None => {
                    let err = PipelineError::CombinePreviousUnavailable("no prior output".to_string());
                    record.fallback_note = Some(err.to_string());
                    // Recoverable (§7 CombinePreviousUnavailable): fall
                    // through to normal processing below using the
                    // splice plan already computed above.
                }
            }
        }

        self.check_cancel()?;
        self.finish_normal_chapter(chapter, paths, &splice_result, filename_override.as_deref(), &mut record, previous)
            .await?;
        Ok(record)
    }

    /// TRANSCRIBE_COMMANDS: writes a transcription WAV from the normalized
    /// audio, runs the STT engine, and parses commands from its segments.
    /// An unavailable engine or an `SttError` is folded into an empty
    /// [`ParsedCommands`] (§7: "treated per-chapter as 'no commands, full
    /// transcript empty' ... logged as a fallback note"), which naturally
    /// routes into the skip-transcript branch above; the returned note is
    /// what makes that fallback visible in the per-chapter record rather
    /// than indistinguishable from a legitimately near-silent chapter.
    async fn transcribe_commands(&self, chapter: &Chapter, paths: &ChapterPaths) -> Result<(ParsedCommands, Option<String>)> {
        let Some(stt) = self.stt.as_ref() else {
            return Ok((ParsedCommands::empty(), None));
        };

        let sample_rate = STT_SAMPLE_RATE_HZ;
        self.check_cancel()?;
        let samples = match crate::audio::reader::read_pcm(
            self.transcoder.as_ref(),
            &paths.normalized(),
            0.0,
            chapter.duration(),
            sample_rate,
        )
        .await
        {
            Ok(samples) => samples,
            Err(e) => return Ok((ParsedCommands::empty(), Some(format!("transcription PCM read failed: {e}")))),
        };
        if let Err(e) = crate::audio::writer::write_wav_mono_f32(&paths.transcribe_wav(), &samples, sample_rate) {
            return Ok((ParsedCommands::empty(), Some(format!("transcription WAV write failed: {e}"))));
        }

        self.check_cancel()?;
        let output = match stt.transcribe(&paths.transcribe_wav()).await {
            Ok(output) => output,
            Err(e) => return Ok((ParsedCommands::empty(), Some(format!("transcription failed: {e}")))),
        };

        let segments: Vec<TranscriptSegment> = output
            .segments
            .iter()
            .map(|s| TranscriptSegment {
                start: s.start,
                end: s.end,
                text: s.text.clone(),
            })
            .collect();
        let has_token_times = output.segments_source == SegmentsSource::Tokens;
        let rescaled = transcript::rescale_segments(&segments, chapter.duration(), has_token_times);
        let words = transcript::flatten_to_words(&rescaled);
        let commands = transcript::parse_commands(&words, &self.config.command);

        Ok((
            ParsedCommands {
                word_count: output.word_count,
                commands,
            },
            None,
        ))
    }

    /// REFINE_WINDOWS → SPLICE: computes full-clip VAD speech (best
    /// effort, feeding the refiner's silence gaps), refines the parsed
    /// command windows onto nearby silence, and splices them out.
    async fn refine_and_splice(
        &self,
        input: &Path,
        duration: f64,
        parsed: &ParsedCommands,
        paths: &ChapterPaths,
    ) -> Result<crate::splice::SpliceResult> {
        let raw_windows = parsed.windows();

        self.check_cancel()?;
        let vad_speech = match crate::audio::reader::read_pcm(self.transcoder.as_ref(), input, 0.0, duration, self.config.vad.sample_rate).await {
            Ok(samples) => vad::detect_speech_intervals(&samples, &self.config.vad, self.config.timeline.touching_epsilon)
                .await
                .ok(),
            Err(_) => None,
        };

        let refined = if raw_windows.is_empty() {
            Vec::new()
        } else {
            refine_windows(
                self.transcoder.as_ref(),
                input,
                duration,
                &raw_windows,
                vad_speech.as_deref(),
                &self.config.command,
                &self.config.rms,
                &self.config.timeline,
                self.config.vad.sample_rate,
            )
            .await
            .unwrap_or(raw_windows)
        };

        let ext = paths.ext.clone();
        let workspace = SpliceWorkspace {
            temp_dir: paths.temp_dir.as_path(),
            basename: paths.basename.as_str(),
        };
        self.check_cancel()?;
        splice(
            self.transcoder.as_ref(),
            input,
            duration,
            &refined,
            &self.config.vad,
            self.config.timeline.touching_epsilon,
            &ext,
            &workspace,
        )
        .await
    }

    /// DETECT_SPEECH_BOUNDS → PAD_TRIM → FINAL_EXTRACT → POST_CHECK_JARVIS
    /// → RECORD_OUTCOME for a chapter that isn't being folded into its
    /// predecessor.
    #[allow(clippy::too_many_arguments)]
    async fn finish_normal_chapter(
        &self,
        chapter: &Chapter,
        paths: &ChapterPaths,
        splice_result: &crate::splice::SpliceResult,
        filename_override: Option<&str>,
        record: &mut PipelineRecord,
        previous: &mut Option<PreviousOutput>,
    ) -> Result<()> {
        self.check_cancel()?;
        let bounds = vad::detect_speech_bounds(
            self.transcoder.as_ref(),
            &splice_result.output,
            splice_result.duration,
            &self.config.vad,
            &self.config.rms,
            self.config.timeline.touching_epsilon,
        )
        .await?;
        if let Some(note) = &bounds.note {
            record.fallback_note = Some(note.clone());
        }

        let padded_start = (bounds.start - self.config.chapter.pre_speech_padding).max(0.0);
        let padded_end = (bounds.end + self.config.chapter.post_speech_padding).min(splice_result.duration);
        if padded_end <= padded_start + self.config.chapter.min_trim_window_seconds {
            return Err(PipelineError::TrimWindowError(format!(
                "padded trim window [{padded_start}, {padded_end}) is at or below the minimum {} s",
                self.config.chapter.min_trim_window_seconds
            )));
        }
        let trimmed_duration = padded_end - padded_start;

        if trimmed_duration < self.config.chapter.min_chapter_seconds {
            record.status = ChapterStatus::SkippedTrimmedShort;
            return Ok(());
        }

        self.final_extract_and_check(chapter, paths, splice_result, padded_start, trimmed_duration, record, previous, filename_override)
            .await
    }

    /// FINAL_EXTRACT + POST_CHECK_JARVIS + bookkeeping shared by the normal
    /// and combine-previous branches.
    #[allow(clippy::too_many_arguments)]
    async fn final_extract_and_check(
        &self,
        chapter: &Chapter,
        paths: &ChapterPaths,
        splice_result: &crate::splice::SpliceResult,
        start: f64,
        duration: f64,
        record: &mut PipelineRecord,
        previous: &mut Option<PreviousOutput>,
        filename_override: Option<&str>,
    ) -> Result<()> {
        let filename = format_chapter_filename(chapter, filename_override);
        let output_dir = self.config.paths.output_dir.clone();
        let final_path = output_dir.join(format!("{filename}.{}", paths.ext));

        self.check_cancel()?;
        self.transcoder
            .accurate_trim(&splice_result.output, start, duration, &final_path)
            .await?;

        self.check_cancel()?;
        self.post_check_jarvis(&final_path, duration, record).await;

        record.final_output_path = Some(final_path.clone());
        *previous = Some(PreviousOutput {
            path: final_path,
            duration,
        });
        Ok(())
    }

    /// POST_CHECK_JARVIS: re-transcribes the final output and, if the
    /// wake word survived into it, records every occurrence as a warning
    /// (§4.9). STT failures here are logged as a fallback note — the
    /// output is already valid, so this never fails the chapter.
    async fn post_check_jarvis(&self, final_path: &Path, duration: f64, record: &mut PipelineRecord) {
        let Some(stt) = self.stt.as_ref() else { return };
        if !self.config.chapter.enable_transcription {
            return;
        }

        let sample_rate = STT_SAMPLE_RATE_HZ;
        let jarvis_wav = final_path.with_file_name(format!(
            "{}-jarvis.wav",
            final_path.file_stem().and_then(|s| s.to_str()).unwrap_or("chapter")
        ));

        let samples = match crate::audio::reader::read_pcm(self.transcoder.as_ref(), final_path, 0.0, duration, sample_rate).await {
            Ok(samples) => samples,
            Err(e) => {
                record.fallback_note = Some(format!("post-check transcription read failed: {e}"));
                return;
            }
        };
        if crate::audio::writer::write_wav_mono_f32(&jarvis_wav, &samples, sample_rate).is_err() {
            return;
        }

        let output = match stt.transcribe(&jarvis_wav).await {
            Ok(output) => output,
            Err(e) => {
                record.fallback_note = Some(format!("post-check transcription failed: {e}"));
                let _ = tokio::fs::remove_file(&jarvis_wav).await;
                return;
            }
        };
        let _ = tokio::fs::remove_file(&jarvis_wav).await;

        let segments: Vec<TranscriptSegment> = output
            .segments
            .iter()
            .map(|s| TranscriptSegment {
                start: s.start,
                end: s.end,
                text: s.text.clone(),
            })
            .collect();
        let has_token_times = output.segments_source == SegmentsSource::Tokens;
        let rescaled = transcript::rescale_segments(&segments, duration, has_token_times);
        let words = transcript::flatten_to_words(&rescaled);

        let occurrences: Vec<JarvisOccurrence> = words
            .iter()
            .filter(|w| w.text == self.config.command.wake_word)
            .map(|w| JarvisOccurrence { start: w.start, end: w.end })
            .collect();
        if !occurrences.is_empty() {
            record.jarvis_warning = occurrences;
        }
    }

    /// COMBINE_WITH_PREVIOUS → SPLICE_AND_MERGE_WITH_PREV →
    /// DETECT_SPEECH_BOUNDS → PAD_TRIM → OVERWRITE_PREVIOUS_FINAL →
    /// POST_CHECK_JARVIS → RECORD_OUTCOME (§4.9).
    async fn combine_with_previous(
        &self,
        chapter: &Chapter,
        paths: &ChapterPaths,
        splice_result: &crate::splice::SpliceResult,
        prev: PreviousOutput,
        previous_slot: &mut Option<PreviousOutput>,
        record: &mut PipelineRecord,
    ) -> Result<()> {
        let search_seconds = self.config.command.command_silence_search_seconds;
        let rms_config = &self.config.rms;
        let vad_config = &self.config.vad;

        self.check_cancel()?;
        let prev_bounds = vad::detect_speech_bounds(
            self.transcoder.as_ref(),
            &prev.path,
            prev.duration,
            vad_config,
            rms_config,
            self.config.timeline.touching_epsilon,
        )
        .await?;
        self.check_cancel()?;
        let prev_boundary = self
            .silence_boundary_near(&prev.path, prev.duration, prev_bounds.end, Direction::Before, search_seconds)
            .await
            .unwrap_or(prev_bounds.end);

        self.check_cancel()?;
        let cur_bounds = vad::detect_speech_bounds(
            self.transcoder.as_ref(),
            &splice_result.output,
            splice_result.duration,
            vad_config,
            rms_config,
            self.config.timeline.touching_epsilon,
        )
        .await?;
        self.check_cancel()?;
        let cur_boundary = self
            .silence_boundary_near(&splice_result.output, splice_result.duration, cur_bounds.start, Direction::After, search_seconds)
            .await
            .unwrap_or(cur_bounds.start);

        let prev_available = (prev.duration - prev_boundary).max(0.0);
        let cur_available = cur_boundary.max(0.0);
        let (prev_pad, cur_pad) = allocate_padding(
            prev_available,
            cur_available,
            self.config.chapter.post_speech_padding,
            self.config.chapter.pre_speech_padding,
        );

        let prev_trim_end = (prev_boundary + prev_pad).min(prev.duration);
        let cur_trim_start = (cur_boundary - cur_pad).max(0.0);
        let cur_trim_duration = splice_result.duration - cur_trim_start;

        self.check_cancel()?;
        self.transcoder.accurate_trim(&prev.path, 0.0, prev_trim_end, &paths.previous_trimmed()).await?;
        self.check_cancel()?;
        self.transcoder
            .accurate_trim(&splice_result.output, cur_trim_start, cur_trim_duration, &paths.current_trimmed())
            .await?;
        self.check_cancel()?;
        self.transcoder
            .concat(&[paths.previous_trimmed(), paths.current_trimmed()], &paths.combined())
            .await?;
        tokio::fs::rename(&paths.combined(), &prev.path).await?;

        self.check_cancel()?;
        let combined_duration = prev_trim_end + cur_trim_duration;
        self.post_check_jarvis(&prev.path, combined_duration, record).await;

        record.status = ChapterStatus::CombinedWithPrevious;
        *previous_slot = Some(PreviousOutput {
            path: prev.path,
            duration: combined_duration,
        });
        Ok(())
    }

    /// Searches for a silence boundary near `target` within `path`'s audio,
    /// in `direction`, over a window of `search_seconds` (used by
    /// combine-previous's join points — a simpler sibling of C7's
    /// boundary refinement that only needs tiled-RMS, since both sides'
    /// speech bounds are already resolved by [`vad::detect_speech_bounds`]).
    async fn silence_boundary_near(&self, path: &Path, duration: f64, target: f64, direction: Direction, search_seconds: f64) -> Option<f64> {
        let (slice_start, slice_end) = match direction {
            Direction::Before => ((target - search_seconds).max(0.0), target),
            Direction::After => (target, (target + search_seconds).min(duration)),
        };
        let slice_duration = slice_end - slice_start;
        if slice_duration <= 0.0 {
            return None;
        }
        let samples = crate::audio::reader::read_pcm(self.transcoder.as_ref(), path, slice_start, slice_duration, self.config.vad.sample_rate)
            .await
            .ok()?;
        if samples.is_empty() {
            return None;
        }
        rms::find_silence_boundary_rms(
            &samples,
            self.config.vad.sample_rate,
            direction,
            self.config.rms.win_ms,
            self.config.rms.silence_threshold,
            self.config.rms.min_silence_ms,
        )
        .map(|offset| slice_start + offset)
    }
}

/// Splits `desired_prev` + `desired_cur` padding between two sides with
/// limited room, giving each side what it can hold and handing any
/// shortfall to the other side's spare capacity (§4.9: "allocate remaining
/// padding from the other side up to the desired total").
fn allocate_padding(prev_available: f64, cur_available: f64, desired_prev: f64, desired_cur: f64) -> (f64, f64) {
    let prev_base = desired_prev.min(prev_available);
    let cur_base = desired_cur.min(cur_available);
    let prev_deficit = desired_prev - prev_base;
    let cur_deficit = desired_cur - cur_base;
    let prev_surplus = prev_available - prev_base;
    let cur_surplus = cur_available - cur_base;

    let prev_pad = prev_base + cur_deficit.min(prev_surplus);
    let cur_pad = cur_base + prev_deficit.min(cur_surplus);
    (prev_pad, cur_pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_padding_gives_each_side_the_full_desired_amount_when_room_allows() {
        let (prev, cur) = allocate_padding(5.0, 5.0, 0.5, 0.25);
        assert_eq!((prev, cur), (0.5, 0.25));
    }

    #[test]
    fn allocate_padding_borrows_from_the_other_side_when_one_side_is_tight() {
        // Previous side only has 0.1s of trailing silence (wants 0.5s);
        // current side has plenty of room (5s, wants 0.25s) and lends the
        // 0.4s shortfall.
        let (prev, cur) = allocate_padding(0.1, 5.0, 0.5, 0.25);
        assert_eq!(prev, 0.1);
        assert_eq!(cur, 0.25 + 0.4);
    }

    #[test]
    fn allocate_padding_never_exceeds_available_room_on_either_side() {
        let (prev, cur) = allocate_padding(0.1, 0.05, 0.5, 0.5);
        assert!(prev <= 0.1 + 0.05);
        assert!(cur <= 0.05 + 0.1);
    }
}
