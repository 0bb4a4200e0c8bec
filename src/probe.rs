//! Real `ffprobe`-backed [`ChapterProbe`] implementation (§6 probe
//! contract).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use crate::collaborators::{ChapterMeta, ChapterProbe};
use crate::error::{PipelineError, Result};

pub struct FfprobeChapterProbe {
    bin: PathBuf,
}

impl FfprobeChapterProbe {
    /// Resolves `bin` on `PATH` before returning (§7 `InvalidInput`: "missing
    /// required external binary") so a misconfigured run fails immediately
    /// instead of partway through the first chapter.
    pub fn new(bin: impl Into<PathBuf>) -> Result<Self> {
        let bin = bin.into();
        which::which(&bin).map_err(|e| PipelineError::InvalidInput(format!("probe binary {bin:?} not found on PATH: {e}")))?;
        Ok(Self { bin })
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    chapters: Vec<ProbeChapter>,
}

#[derive(Debug, Deserialize)]
struct ProbeChapter {
    start_time: String,
    end_time: String,
    #[serde(default)]
    tags: Option<ProbeTags>,
}

#[derive(Debug, Deserialize)]
struct ProbeTags {
    title: Option<String>,
}

#[async_trait]
impl ChapterProbe for FfprobeChapterProbe {
    async fn probe(&self, input: &Path) -> Result<Vec<ChapterMeta>> {
        let output = Command::new(&self.bin)
            .arg("-v")
            .arg("quiet")
            .arg("-print_format")
            .arg("json")
            .arg("-show_chapters")
            .arg(input)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::InvalidInput(format!("probe spawn failed: {e}")))?;

        if !output.status.success() {
            return Err(PipelineError::InvalidInput(format!(
                "probe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        parse_probe_json(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_probe_json(text: &str) -> Result<Vec<ChapterMeta>> {
    let parsed: ProbeOutput = serde_json::from_str(text)?;
    parsed
        .chapters
        .into_iter()
        .map(|c| {
            let start_time: f64 = c
                .start_time
                .trim()
                .parse()
                .map_err(|_| PipelineError::InvalidInput(format!("invalid start_time: {}", c.start_time)))?;
            let end_time: f64 = c
                .end_time
                .trim()
                .parse()
                .map_err(|_| PipelineError::InvalidInput(format!("invalid end_time: {}", c.end_time)))?;
            if !start_time.is_finite() || !end_time.is_finite() || end_time <= start_time {
                return Err(PipelineError::InvalidInput(format!(
                    "invalid chapter range [{start_time}, {end_time})"
                )));
            }
            Ok(ChapterMeta {
                start_time,
                end_time,
                title: c.tags.and_then(|t| t.title),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_chapters() {
        let json = r#"{"chapters":[
            {"start_time":"0.000000","end_time":"20.500000","tags":{"title":"Intro"}},
            {"start_time":"20.500000","end_time":"40.000000"}
        ]}"#;
        let chapters = parse_probe_json(json).unwrap();
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title.as_deref(), Some("Intro"));
        assert_eq!(chapters[1].title, None);
        assert_eq!(chapters[1].start_time, 20.5);
    }

    #[test]
    fn rejects_non_finite_or_collapsed_chapter() {
        let json = r#"{"chapters":[{"start_time":"10.0","end_time":"5.0"}]}"#;
        assert!(parse_probe_json(json).is_err());
    }

    #[test]
    fn rejects_unparseable_time() {
        let json = r#"{"chapters":[{"start_time":"nope","end_time":"5.0"}]}"#;
        assert!(parse_probe_json(json).is_err());
    }

    #[test]
    fn empty_chapters_array_is_not_an_error() {
        assert!(parse_probe_json(r#"{"chapters":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn new_rejects_a_binary_not_on_path() {
        let err = FfprobeChapterProbe::new("chapterforge-nonexistent-probe-binary").expect_err("should not resolve");
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
