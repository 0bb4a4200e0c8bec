//! Per-run output accumulation: `PipelineRecord`, `OutputLog`, and the three
//! permanent log files plus the temp-directory summary log (§3, §6).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::chapter::Chapter;

/// Why a chapter did not produce a normal `processed` output, or that it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterStatus {
    Processed,
    SkippedInitialShort,
    SkippedTrimmedShort,
    SkippedTranscript,
    SkippedBadTake,
    /// Folded into the previous chapter's output; produces no file of its
    /// own. Not named in §3's status set directly — it is the outcome of
    /// the `combine-previous` branch, recorded so the summary log can
    /// account for every chapter index exactly once.
    CombinedWithPrevious,
    /// Cooperative cancellation landed mid-chapter.
    Aborted,
    /// A chapter-scoped error (`SpliceError`, `TrimWindowError`, or a
    /// `MediaIoError` concerning the final extraction) prevented a valid
    /// output from being written. Also not named in §3's status set: §7
    /// draws a line between structured skips (`ChapterTooShort`, `BadTake`)
    /// and real errors, but both end a chapter without output, so both
    /// need a place in the per-run record.
    Failed,
}

impl ChapterStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::SkippedInitialShort => "skipped-initial-short",
            Self::SkippedTrimmedShort => "skipped-trimmed-short",
            Self::SkippedTranscript => "skipped-transcript",
            Self::SkippedBadTake => "skipped-bad-take",
            Self::CombinedWithPrevious => "combined-with-previous",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }
}

/// One `jarvis` occurrence surviving into the final output, as timestamps
/// on the final file's own timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JarvisOccurrence {
    pub start: f64,
    pub end: f64,
}

/// Outcome of processing a single chapter (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRecord {
    pub chapter_index: usize,
    pub status: ChapterStatus,
    pub final_output_path: Option<PathBuf>,
    pub fallback_note: Option<String>,
    pub jarvis_warning: Vec<JarvisOccurrence>,
    pub edit_flag: bool,
    pub note_entries: Vec<String>,
    pub split_marker: bool,
}

impl PipelineRecord {
    pub fn new(chapter_index: usize, status: ChapterStatus) -> Self {
        Self {
            chapter_index,
            status,
            final_output_path: None,
            fallback_note: None,
            jarvis_warning: Vec::new(),
            edit_flag: false,
            note_entries: Vec::new(),
            split_marker: false,
        }
    }
}

/// Aggregate of every chapter's [`PipelineRecord`] plus run-level counters,
/// with methods to render the four log files described in §6.
#[derive(Debug, Clone, Default)]
pub struct OutputLog {
    pub records: Vec<PipelineRecord>,
}

impl OutputLog {
    pub fn push(&mut self, record: PipelineRecord) {
        self.records.push(record);
    }

    fn warning_count(&self) -> usize {
        self.records.iter().filter(|r| !r.jarvis_warning.is_empty()).count()
    }

    fn edit_count(&self) -> usize {
        self.records.iter().filter(|r| r.edit_flag).count()
    }

    fn note_count(&self) -> usize {
        self.records.iter().map(|r| r.note_entries.len()).sum()
    }

    fn preamble(&self, input: &Path, output_dir: &Path, category: &str, count: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Input: {}", input.display());
        let _ = writeln!(out, "Output dir: {}", output_dir.display());
        let _ = writeln!(out, "{category}: {count}");
        out
    }

    pub fn warnings_log(&self, input: &Path, output_dir: &Path) -> String {
        let count = self.warning_count();
        let mut out = self.preamble(input, output_dir, "Jarvis warnings", count);
        if count > 0 {
            let _ = writeln!(out, "Detected in:");
            for record in &self.records {
                if record.jarvis_warning.is_empty() {
                    continue;
                }
                let _ = writeln!(out, "  chapter {}", record.chapter_index + 1);
                let timestamps: Vec<String> = record
                    .jarvis_warning
                    .iter()
                    .map(|o| format!("{:.2}-{:.2}", o.start, o.end))
                    .collect();
                let _ = writeln!(out, "    Jarvis timestamps: {}", timestamps.join(", "));
            }
        }
        out
    }

    pub fn edits_log(&self, input: &Path, output_dir: &Path) -> String {
        let count = self.edit_count();
        let mut out = self.preamble(input, output_dir, "Edit commands", count);
        if count > 0 {
            let _ = writeln!(out, "Detected in:");
            for record in &self.records {
                if record.edit_flag {
                    let _ = writeln!(out, "  chapter {}", record.chapter_index + 1);
                }
            }
        }
        out
    }

    pub fn notes_log(&self, input: &Path, output_dir: &Path) -> String {
        let count = self.note_count();
        let mut out = self.preamble(input, output_dir, "Note commands", count);
        if count > 0 {
            let _ = writeln!(out, "Detected in:");
            for record in &self.records {
                for note in &record.note_entries {
                    let _ = writeln!(out, "  chapter {}: {}", record.chapter_index + 1, note);
                }
            }
        }
        out
    }

    pub fn summary_log(&self, input: &Path, output_dir: &Path) -> String {
        let mut out = self.preamble(input, output_dir, "Chapters", self.records.len());
        let _ = writeln!(out, "Jarvis warnings: {}", self.warning_count());
        let _ = writeln!(out, "Edit commands: {}", self.edit_count());
        let _ = writeln!(out, "Note commands: {}", self.note_count());
        let _ = writeln!(out, "Detected in:");
        for record in &self.records {
            let path = record
                .final_output_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(out, "  chapter {}: {} -> {}", record.chapter_index + 1, record.status.label(), path);
            if let Some(note) = &record.fallback_note {
                let _ = writeln!(out, "    fallback: {note}");
            }
        }
        out
    }

    /// Writes the three permanent logs under `output_dir` and the summary
    /// log under `temp_dir`.
    pub async fn write_all(&self, input: &Path, output_dir: &Path, temp_dir: &Path) -> Result<()> {
        tokio::fs::write(output_dir.join("jarvis-warnings.log"), self.warnings_log(input, output_dir)).await?;
        tokio::fs::write(output_dir.join("jarvis-edits.log"), self.edits_log(input, output_dir)).await?;
        tokio::fs::write(output_dir.join("jarvis-notes.log"), self.notes_log(input, output_dir)).await?;
        tokio::fs::write(temp_dir.join("summary.log"), self.summary_log(input, output_dir)).await?;
        Ok(())
    }
}

/// Describes the intermediate file naming scheme for one chapter under
/// `<output>/.tmp/` (§6).
pub struct ChapterPaths {
    pub temp_dir: PathBuf,
    pub basename: String,
    pub ext: String,
}

impl ChapterPaths {
    pub fn new(temp_dir: PathBuf, chapter: &Chapter, ext: &str) -> Self {
        Self {
            temp_dir,
            basename: super::chapter::format_chapter_filename(chapter, None),
            ext: ext.to_string(),
        }
    }

    pub fn raw(&self) -> PathBuf {
        self.temp_dir.join(format!("{}-raw.{}", self.basename, self.ext))
    }

    pub fn normalized(&self) -> PathBuf {
        self.temp_dir.join(format!("{}-normalized.{}", self.basename, self.ext))
    }

    pub fn transcribe_wav(&self) -> PathBuf {
        self.temp_dir.join(format!("{}-transcribe.wav", self.basename))
    }

    pub fn jarvis_wav(&self) -> PathBuf {
        self.temp_dir.join(format!("{}-jarvis.wav", self.basename))
    }

    pub fn previous_trimmed(&self) -> PathBuf {
        self.temp_dir.join(format!("{}-previous-trimmed.{}", self.basename, self.ext))
    }

    pub fn current_trimmed(&self) -> PathBuf {
        self.temp_dir.join(format!("{}-current-trimmed.{}", self.basename, self.ext))
    }

    /// Staging path for a `combine-previous` join before it's renamed over
    /// the previous chapter's final output.
    pub fn combined(&self) -> PathBuf {
        self.temp_dir.join(format!("{}-combined.{}", self.basename, self.ext))
    }

    pub fn splice_segment(&self, index: usize) -> PathBuf {
        self.temp_dir.join(format!("{}-splice-{index}.{}", self.basename, self.ext))
    }

    pub fn spliced(&self) -> PathBuf {
        self.temp_dir.join(format!("{}-spliced.{}", self.basename, self.ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter() -> Chapter {
        Chapter::new(0, "Intro".to_string(), 0.0, 20.0).unwrap()
    }

    #[test]
    fn summary_log_has_deterministic_preamble() {
        let mut log = OutputLog::default();
        log.push(PipelineRecord::new(0, ChapterStatus::Processed));
        let text = log.summary_log(Path::new("/in.mkv"), Path::new("/out"));
        assert!(text.starts_with("Input: /in.mkv\nOutput dir: /out\nChapters: 1\n"));
    }

    #[test]
    fn warnings_log_reports_zero_when_no_jarvis_leaks() {
        let mut log = OutputLog::default();
        log.push(PipelineRecord::new(0, ChapterStatus::Processed));
        let text = log.warnings_log(Path::new("/in.mkv"), Path::new("/out"));
        assert!(text.contains("Jarvis warnings: 0"));
        assert!(!text.contains("Detected in:"));
    }

    #[test]
    fn warnings_log_lists_timestamps_when_present() {
        let mut log = OutputLog::default();
        let mut record = PipelineRecord::new(3, ChapterStatus::Processed);
        record.jarvis_warning.push(JarvisOccurrence { start: 1.0, end: 1.3 });
        log.push(record);
        let text = log.warnings_log(Path::new("/in.mkv"), Path::new("/out"));
        assert!(text.contains("Jarvis warnings: 1"));
        assert!(text.contains("Jarvis timestamps: 1.00-1.30"));
    }

    #[test]
    fn chapter_paths_follow_documented_naming_scheme() {
        let paths = ChapterPaths::new(PathBuf::from("/out/.tmp"), &chapter(), "mp4");
        assert_eq!(paths.raw(), PathBuf::from("/out/.tmp/chapter-01-intro-raw.mp4"));
        assert_eq!(paths.normalized(), PathBuf::from("/out/.tmp/chapter-01-intro-normalized.mp4"));
        assert_eq!(paths.transcribe_wav(), PathBuf::from("/out/.tmp/chapter-01-intro-transcribe.wav"));
    }
}
