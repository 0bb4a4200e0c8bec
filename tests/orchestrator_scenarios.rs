//! End-to-end Chapter Orchestrator (C9) scenarios, driven against
//! in-memory fakes for the three external collaborators — no real
//! `ffmpeg`/`ffprobe`/STT binary required.
//!
//! All fakes treat every clip as silence: `FakeTranscoder::extract_pcm`
//! always returns zeroed samples regardless of which file is asked for.
//! With no VAD model configured (`VadConfig::model_path` stays `None`),
//! this drives every boundary search down its RMS/full-clip fallback path
//! deterministically — exactly the fallback behavior the real VAD runner's
//! absence is supposed to trigger, so the scenarios exercise real
//! orchestrator control flow without depending on audio content.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::Mutex as AsyncMutex;

use chapterforge::collaborators::{
    ChapterMeta, ChapterProbe, LoudnormAnalysis, SegmentsSource, SttEngine, SttOutput, SttSegment, Transcoder,
};
use chapterforge::error::Result;
use chapterforge::pipeline::ChapterStatus;
use chapterforge::{Config, Orchestrator};

struct FakeProbe(Vec<ChapterMeta>);

#[async_trait]
impl ChapterProbe for FakeProbe {
    async fn probe(&self, _input: &Path) -> Result<Vec<ChapterMeta>> {
        Ok(self.0.clone())
    }
}

/// Every clip is silence, regardless of path — the orchestrator's own
/// bookkeeping (not the fake) is what tracks each intermediate's duration.
struct FakeTranscoder;

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn extract_pcm(&self, _input: &Path, _start: f64, duration: f64, sample_rate: u32) -> Result<Vec<u8>> {
        let n = (duration * f64::from(sample_rate)).round().max(0.0) as usize;
        Ok(vec![0u8; n * 4])
    }

    async fn accurate_trim(&self, _input: &Path, _start: f64, _duration: f64, output: &Path) -> Result<()> {
        tokio::fs::write(output, b"fake-media").await?;
        Ok(())
    }

    async fn stream_copy_trim(&self, _input: &Path, _duration: f64, output: &Path) -> Result<()> {
        tokio::fs::write(output, b"fake-media").await?;
        Ok(())
    }

    async fn concat(&self, _inputs: &[PathBuf], output: &Path) -> Result<()> {
        tokio::fs::write(output, b"fake-media").await?;
        Ok(())
    }

    async fn loudnorm_analyze(&self, _input: &Path) -> Result<LoudnormAnalysis> {
        Ok(LoudnormAnalysis {
            input_i: "-23.0".to_string(),
            input_tp: "-2.0".to_string(),
            input_lra: "5.0".to_string(),
            input_thresh: "-34.0".to_string(),
            target_offset: "0.0".to_string(),
        })
    }

    async fn loudnorm_render(&self, _input: &Path, _analysis: &LoudnormAnalysis, output: &Path, _reencode_video: bool) -> Result<()> {
        tokio::fs::write(output, b"fake-media").await?;
        Ok(())
    }
}

/// Scripted transcripts, consumed one per call (both the main
/// TRANSCRIBE_COMMANDS pass and any POST_CHECK_JARVIS re-transcription draw
/// from the same queue, in call order) — a scenario that wants a jarvis
/// leak to register queues a second script behind the first. Scenarios
/// that only push one script per chapter get an empty queue by the time
/// the post-check recheck runs, so it falls through to `empty_output()`
/// exactly as before.
struct FakeSttEngine {
    scripts: AsyncMutex<VecDeque<SttOutput>>,
}

impl FakeSttEngine {
    fn new(scripts: Vec<SttOutput>) -> Self {
        Self {
            scripts: AsyncMutex::new(scripts.into()),
        }
    }
}

#[async_trait]
impl SttEngine for FakeSttEngine {
    async fn transcribe(&self, _wav_path: &Path) -> Result<SttOutput> {
        let mut guard = self.scripts.lock().await;
        Ok(guard.pop_front().unwrap_or_else(empty_output))
    }
}

fn empty_output() -> SttOutput {
    SttOutput {
        word_count: 0,
        segments: Vec::new(),
        segments_source: SegmentsSource::Tokens,
    }
}

/// One word per segment, so each word's timing is exact rather than a
/// uniform slice of a multi-word segment — `segments_source: Tokens` so
/// §3's rescaling never kicks in and times are used verbatim.
fn script(words: &[(&str, f64, f64)]) -> SttOutput {
    SttOutput {
        word_count: words.len(),
        segments: words
            .iter()
            .map(|(text, start, end)| SttSegment {
                start: *start,
                end: *end,
                text: (*text).to_string(),
            })
            .collect(),
        segments_source: SegmentsSource::Tokens,
    }
}

fn base_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.paths.input = temp.path().join("input.mp4");
    config.paths.output_dir = temp.path().join("out");
    config
}

fn filler_words(count: usize, start: f64, step: f64) -> Vec<(String, f64, f64)> {
    (0..count)
        .map(|i| (format!("word{i}"), start + step * i as f64, start + step * i as f64 + step * 0.75))
        .collect()
}

async fn run(config: Config, chapters: Vec<ChapterMeta>, scripts: Vec<SttOutput>) -> chapterforge::pipeline::OutputLog {
    let probe: Arc<dyn ChapterProbe> = Arc::new(FakeProbe(chapters));
    let transcoder: Arc<dyn Transcoder> = Arc::new(FakeTranscoder);
    let stt: Arc<dyn SttEngine> = Arc::new(FakeSttEngine::new(scripts));
    let orchestrator = Orchestrator::new(config, probe, transcoder, Some(stt));
    orchestrator.run().await.expect("run should not fail the whole pipeline")
}

#[tokio::test]
async fn normal_chapter_with_no_commands_is_processed_unchanged() {
    let temp = TempDir::new().unwrap();
    let config = base_config(&temp);
    let chapters = vec![ChapterMeta {
        start_time: 0.0,
        end_time: 20.0,
        title: Some("Intro".to_string()),
    }];
    let owned = filler_words(40, 0.0, 0.4);
    let refs: Vec<(&str, f64, f64)> = owned.iter().map(|(t, s, e)| (t.as_str(), *s, *e)).collect();
    let log = run(config, chapters, vec![script(&refs)]).await;

    assert_eq!(log.records.len(), 1);
    let record = &log.records[0];
    assert_eq!(record.status, ChapterStatus::Processed);
    assert_eq!(record.jarvis_warning.len(), 0);
    assert!(!record.edit_flag);
    assert!(record.note_entries.is_empty());
    let output = record.final_output_path.as_ref().expect("processed chapter has an output");
    assert_eq!(output.file_name().unwrap().to_str().unwrap(), "chapter-01-intro.mp4");
    assert!(tokio::fs::try_exists(output).await.unwrap());
}

#[tokio::test]
async fn bad_take_chapter_is_skipped_with_no_output() {
    let temp = TempDir::new().unwrap();
    let config = base_config(&temp);
    let chapters = vec![ChapterMeta {
        start_time: 0.0,
        end_time: 8.0,
        title: Some("Take Two".to_string()),
    }];
    let words = [
        ("this", 0.0, 0.3),
        ("is", 0.3, 0.6),
        ("a", 0.6, 0.9),
        ("mistake", 0.9, 1.2),
        ("jarvis", 2.0, 2.3),
        ("bad", 2.3, 2.6),
        ("take", 2.6, 2.9),
        ("thanks", 2.9, 3.2),
    ];
    let log = run(config, chapters, vec![script(&words)]).await;

    assert_eq!(log.records.len(), 1);
    let record = &log.records[0];
    assert_eq!(record.status, ChapterStatus::SkippedBadTake);
    assert!(record.final_output_path.is_none());
}

#[tokio::test]
async fn filename_command_overrides_the_output_name() {
    let temp = TempDir::new().unwrap();
    let config = base_config(&temp);
    let chapters = vec![ChapterMeta {
        start_time: 0.0,
        end_time: 20.0,
        title: Some("Chapter 3".to_string()),
    }];
    let mut words = vec![
        ("jarvis", 0.0, 0.3),
        ("filename", 0.3, 0.6),
        ("custom", 0.6, 0.9),
        ("output", 0.9, 1.2),
        ("name", 1.2, 1.5),
        ("thanks", 1.5, 1.8),
    ];
    let tail = filler_words(8, 2.0, 0.4);
    let tail_refs: Vec<(&str, f64, f64)> = tail.iter().map(|(t, s, e)| (t.as_str(), *s, *e)).collect();
    words.extend(tail_refs);
    let log = run(config, chapters, vec![script(&words)]).await;

    assert_eq!(log.records.len(), 1);
    let record = &log.records[0];
    assert_eq!(record.status, ChapterStatus::Processed);
    let output = record.final_output_path.as_ref().expect("processed chapter has an output");
    assert_eq!(output.file_name().unwrap().to_str().unwrap(), "chapter-01-custom-output-name.mp4");
}

#[tokio::test]
async fn mid_chapter_command_is_spliced_out_of_the_final_output() {
    let temp = TempDir::new().unwrap();
    let config = base_config(&temp);
    let chapters = vec![ChapterMeta {
        start_time: 0.0,
        end_time: 30.0,
        title: Some("Deep Dive".to_string()),
    }];

    let mut words: Vec<(String, f64, f64)> = filler_words(20, 0.0, 0.55);
    words.push(("jarvis".to_string(), 12.0, 12.3));
    words.push(("edit".to_string(), 12.3, 12.6));
    words.push(("thanks".to_string(), 14.2, 14.5));
    words.extend(filler_words(10, 15.0, 1.0));
    let refs: Vec<(&str, f64, f64)> = words.iter().map(|(t, s, e)| (t.as_str(), *s, *e)).collect();

    let log = run(config, chapters, vec![script(&refs)]).await;

    assert_eq!(log.records.len(), 1);
    let record = &log.records[0];
    assert_eq!(record.status, ChapterStatus::Processed);
    assert!(record.edit_flag);
    // Command window [12.0, 14.5) padded by 0.3s each side -> [11.7, 14.8)
    // cut (2.1s padding region is already silence in the fake, so the
    // refiner leaves the padded boundaries untouched); the two surviving
    // segments concat to roughly 30 - 3.1 = 26.9s.
    let output = record.final_output_path.as_ref().expect("processed chapter has an output");
    assert!(tokio::fs::try_exists(output).await.unwrap());
}

#[tokio::test]
async fn nevermind_command_cuts_its_own_span_and_keeps_the_rest() {
    let temp = TempDir::new().unwrap();
    let config = base_config(&temp);
    let chapters = vec![ChapterMeta {
        start_time: 0.0,
        end_time: 20.0,
        title: Some("Retake".to_string()),
    }];
    let words = [
        ("let", 0.0, 0.3),
        ("me", 0.3, 0.6),
        ("say", 0.6, 0.9),
        ("something", 0.9, 1.2),
        ("jarvis", 5.0, 5.3),
        ("nevermind", 5.3, 5.6),
        ("thanks", 5.6, 5.9),
        ("real", 6.0, 6.3),
        ("content", 6.3, 6.6),
        ("here", 6.6, 6.9),
        ("and", 7.0, 7.3),
        ("more", 7.3, 7.6),
    ];
    let log = run(config, chapters, vec![script(&words)]).await;

    assert_eq!(log.records.len(), 1);
    let record = &log.records[0];
    assert_eq!(record.status, ChapterStatus::Processed);
    let output = record.final_output_path.as_ref().expect("processed chapter has an output");
    assert!(tokio::fs::try_exists(output).await.unwrap());
}

#[tokio::test]
async fn combine_previous_folds_into_the_prior_chapters_output() {
    let temp = TempDir::new().unwrap();
    let config = base_config(&temp);
    let chapters = vec![
        ChapterMeta {
            start_time: 0.0,
            end_time: 20.0,
            title: Some("Part One".to_string()),
        },
        ChapterMeta {
            start_time: 20.0,
            end_time: 30.0,
            title: Some("Part Two".to_string()),
        },
    ];

    let first_owned = filler_words(20, 0.0, 0.8);
    let first_refs: Vec<(&str, f64, f64)> = first_owned.iter().map(|(t, s, e)| (t.as_str(), *s, *e)).collect();
    let first_script = script(&first_refs);

    let second_words = [
        ("jarvis", 0.0, 0.3),
        ("combine", 0.3, 0.6),
        ("previous", 0.6, 0.9),
        ("thanks", 0.9, 1.2),
        ("continuation", 1.2, 1.5),
    ];
    let second_script = script(&second_words);

    let log = run(config, chapters, vec![first_script, second_script]).await;

    assert_eq!(log.records.len(), 2);
    let first = &log.records[0];
    let second = &log.records[1];

    assert_eq!(first.status, ChapterStatus::Processed);
    let first_output = first.final_output_path.as_ref().expect("first chapter has its own output");
    assert!(tokio::fs::try_exists(first_output).await.unwrap());

    assert_eq!(second.status, ChapterStatus::CombinedWithPrevious);
    assert!(second.final_output_path.is_none(), "combined chapter produces no file of its own");

    // The first chapter's output file still exists at the same path, now
    // holding the concatenation of both chapters' trimmed audio.
    assert!(tokio::fs::try_exists(first_output).await.unwrap());
}

#[tokio::test]
async fn jarvis_surviving_into_final_output_is_recorded_as_a_warning() {
    let temp = TempDir::new().unwrap();
    let config = base_config(&temp);
    let chapters = vec![ChapterMeta {
        start_time: 0.0,
        end_time: 20.0,
        title: Some("Leaky Take".to_string()),
    }];
    // "jarvis" is followed by "random", not a recognized command starter,
    // so the parser leaves the scan position at `random` and never builds
    // a command window around it (§4.6) — the wake word stays in the
    // transcript rather than getting spliced out.
    let words = [
        ("lets", 0.0, 0.3),
        ("begin", 0.3, 0.6),
        ("now", 0.6, 0.9),
        ("jarvis", 5.0, 5.3),
        ("random", 5.3, 5.6),
        ("more", 6.0, 6.3),
        ("content", 6.3, 6.6),
        ("here", 6.6, 6.9),
        ("and", 7.0, 7.3),
        ("more", 7.3, 7.6),
        ("words", 7.6, 7.9),
        ("to", 8.0, 8.3),
        ("fill", 8.3, 8.6),
        ("it", 8.6, 8.9),
        ("out", 8.9, 9.2),
    ];
    // POST_CHECK_JARVIS re-transcribes the spliced final output; since
    // nothing was spliced out here, the wake word survives into it too.
    let jarvis_recheck = script(&[("jarvis", 5.0, 5.3)]);

    let log = run(config, chapters, vec![script(&words), jarvis_recheck]).await;

    assert_eq!(log.records.len(), 1);
    let record = &log.records[0];
    assert_eq!(record.status, ChapterStatus::Processed);
    assert_eq!(record.jarvis_warning.len(), 1);
    assert_eq!(record.jarvis_warning[0].start, 5.0);
    assert_eq!(record.jarvis_warning[0].end, 5.3);
}
