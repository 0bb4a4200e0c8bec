//! Real `ffmpeg`-backed [`Transcoder`] implementation.
//!
//! Every operation spawns the configured transcoder binary as a child
//! process with piped/null stdio and `kill_on_drop(true)`, the way
//! `skills/python_runner.rs` spawns `uv run`. Failures surface as
//! `MediaIoError`; this module never retries.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use crate::collaborators::{LoudnormAnalysis, Transcoder};
use crate::config::LoudnessConfig;
use crate::error::{PipelineError, Result};

/// Invokes a real `ffmpeg`/`ffprobe`-compatible transcoder binary.
pub struct FfmpegTranscoder {
    bin: String,
    loudness: LoudnessConfig,
    call_timeout: Duration,
}

impl FfmpegTranscoder {
    /// Resolves `bin` on `PATH` before returning (§7 `InvalidInput`: "missing
    /// required external binary") so a misconfigured run fails immediately
    /// instead of partway through the first chapter.
    pub fn new(bin: impl Into<String>, loudness: LoudnessConfig, call_timeout: Duration) -> Result<Self> {
        let bin = bin.into();
        which::which(&bin).map_err(|e| PipelineError::InvalidInput(format!("transcoder binary {bin:?} not found on PATH: {e}")))?;
        Ok(Self {
            bin,
            loudness,
            call_timeout,
        })
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.stdin(Stdio::null()).stderr(Stdio::piped()).kill_on_drop(true);
        cmd
    }

    fn prefilter_chain(&self) -> String {
        let mut stages = vec![format!("highpass=f={}", self.loudness.prefilter_highpass_hz)];
        if self.loudness.prefilter_denoise {
            stages.push("afftdn".to_string());
        }
        stages.join(",")
    }

    async fn run_to_completion(&self, mut cmd: Command, context: &str) -> Result<Vec<u8>> {
        let child = cmd
            .spawn()
            .map_err(|e| PipelineError::MediaIoError(format!("{context}: spawn failed: {e}")))?;
        let output = timeout(self.call_timeout, child.wait_with_output())
            .await
            .map_err(|_| PipelineError::MediaIoError(format!("{context}: timed out")))?
            .map_err(|e| PipelineError::MediaIoError(format!("{context}: wait failed: {e}")))?;
        if !output.status.success() {
            return Err(PipelineError::MediaIoError(format!(
                "{context}: exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn extract_pcm(&self, input: &Path, start: f64, duration: f64, sample_rate: u32) -> Result<Vec<u8>> {
        let mut cmd = self.command();
        cmd.stdout(Stdio::piped())
            .arg("-ss")
            .arg(format!("{start}"))
            .arg("-t")
            .arg(format!("{duration}"))
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg("-ar")
            .arg(sample_rate.to_string())
            .arg("-ac")
            .arg("1")
            .arg("-f")
            .arg("f32le")
            .arg("-");
        self.run_to_completion(cmd, "extract_pcm").await
    }

    async fn accurate_trim(&self, input: &Path, start: f64, duration: f64, output: &Path) -> Result<()> {
        let mut cmd = self.command();
        cmd.stdout(Stdio::null())
            .arg("-y")
            .arg("-ss")
            .arg(format!("{start}"))
            .arg("-t")
            .arg(format!("{duration}"))
            .arg("-i")
            .arg(input)
            .arg("-c:v")
            .arg("libx264")
            .arg("-crf")
            .arg(self.loudness.accurate_trim_crf.to_string())
            .arg("-preset")
            .arg(&self.loudness.accurate_trim_preset)
            .arg("-c:a")
            .arg(&self.loudness.audio_codec)
            .arg("-b:a")
            .arg(format!("{}k", self.loudness.audio_bitrate_kbps))
            .arg(output);
        self.run_to_completion(cmd, "accurate_trim").await?;
        Ok(())
    }

    async fn stream_copy_trim(&self, input: &Path, duration: f64, output: &Path) -> Result<()> {
        let mut cmd = self.command();
        cmd.stdout(Stdio::null())
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-t")
            .arg(format!("{duration}"))
            .arg("-c")
            .arg("copy")
            .arg(output);
        self.run_to_completion(cmd, "stream_copy_trim").await?;
        Ok(())
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> Result<()> {
        if inputs.is_empty() {
            return Err(PipelineError::MediaIoError("concat: no inputs".to_string()));
        }
        let mut cmd = self.command();
        cmd.stdout(Stdio::null()).arg("-y");
        for input in inputs {
            cmd.arg("-i").arg(input);
        }
        let filter = format!(
            "concat=n={}:v=1:a=1:unsafe=1[v][a];[a]aresample=async=1[aout]",
            inputs.len()
        );
        cmd.arg("-filter_complex")
            .arg(filter)
            .arg("-map")
            .arg("[v]")
            .arg("-map")
            .arg("[aout]")
            .arg("-c:v")
            .arg("libx264")
            .arg("-crf")
            .arg(self.loudness.accurate_trim_crf.to_string())
            .arg("-preset")
            .arg(&self.loudness.accurate_trim_preset)
            .arg("-c:a")
            .arg(&self.loudness.audio_codec)
            .arg("-b:a")
            .arg(format!("{}k", self.loudness.audio_bitrate_kbps))
            .arg(output);
        self.run_to_completion(cmd, "concat").await?;
        Ok(())
    }

    async fn loudnorm_analyze(&self, input: &Path) -> Result<LoudnormAnalysis> {
        let filter = format!(
            "{},loudnorm=I={}:LRA={}:TP={}:print_format=json",
            self.prefilter_chain(),
            self.loudness.target_integrated_lufs,
            self.loudness.target_lra,
            self.loudness.target_true_peak
        );
        let mut cmd = self.command();
        cmd.stdout(Stdio::null())
            .arg("-i")
            .arg(input)
            .arg("-af")
            .arg(filter)
            .arg("-f")
            .arg("null")
            .arg("-");

        let child = cmd
            .spawn()
            .map_err(|e| PipelineError::MediaIoError(format!("loudnorm_analyze: spawn failed: {e}")))?;
        let output = timeout(self.call_timeout, child.wait_with_output())
            .await
            .map_err(|_| PipelineError::MediaIoError("loudnorm_analyze: timed out".to_string()))?
            .map_err(|e| PipelineError::MediaIoError(format!("loudnorm_analyze: wait failed: {e}")))?;
        if !output.status.success() {
            return Err(PipelineError::MediaIoError(format!(
                "loudnorm_analyze: exited with {}",
                output.status
            )));
        }
        parse_loudnorm_json(&String::from_utf8_lossy(&output.stderr))
    }

    async fn loudnorm_render(
        &self,
        input: &Path,
        analysis: &LoudnormAnalysis,
        output: &Path,
        reencode_video: bool,
    ) -> Result<()> {
        let filter = format!(
            "{},loudnorm=I={}:LRA={}:TP={}:measured_I={}:measured_TP={}:measured_LRA={}:measured_thresh={}:offset={}:linear=true:print_format=summary",
            self.prefilter_chain(),
            self.loudness.target_integrated_lufs,
            self.loudness.target_lra,
            self.loudness.target_true_peak,
            analysis.input_i,
            analysis.input_tp,
            analysis.input_lra,
            analysis.input_thresh,
            analysis.target_offset,
        );
        let mut cmd = self.command();
        cmd.stdout(Stdio::null()).arg("-y").arg("-i").arg(input).arg("-af").arg(filter);
        if reencode_video {
            cmd.arg("-c:v")
                .arg("libx264")
                .arg("-crf")
                .arg(self.loudness.accurate_trim_crf.to_string())
                .arg("-preset")
                .arg(&self.loudness.accurate_trim_preset);
        } else {
            cmd.arg("-c:v").arg("copy");
        }
        cmd.arg("-c:a")
            .arg(&self.loudness.audio_codec)
            .arg("-b:a")
            .arg(format!("{}k", self.loudness.audio_bitrate_kbps))
            .arg("-map_chapters")
            .arg("-1")
            .arg(output);
        self.run_to_completion(cmd, "loudnorm_render").await?;
        Ok(())
    }
}

/// Extracts the trailing `{...}` JSON object ffmpeg's `loudnorm` filter
/// writes to stderr in `print_format=json` mode.
fn parse_loudnorm_json(stderr: &str) -> Result<LoudnormAnalysis> {
    let start = stderr
        .rfind('{')
        .ok_or_else(|| PipelineError::MediaIoError("loudnorm_analyze: no JSON object in output".to_string()))?;
    let end = stderr
        .rfind('}')
        .ok_or_else(|| PipelineError::MediaIoError("loudnorm_analyze: unterminated JSON object".to_string()))?;
    let raw = &stderr[start..=end];

    #[derive(serde::Deserialize)]
    struct Raw {
        input_i: String,
        input_tp: String,
        input_lra: String,
        input_thresh: String,
        target_offset: String,
    }
    let parsed: Raw = serde_json::from_str(raw)?;
    Ok(LoudnormAnalysis {
        input_i: parsed.input_i,
        input_tp: parsed.input_tp,
        input_lra: parsed.input_lra,
        input_thresh: parsed.input_thresh,
        target_offset: parsed.target_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_loudnorm_json_from_stderr_noise() {
        let stderr = "some ffmpeg banner line\n[Parsed_loudnorm_0]\n{\n\t\"input_i\" : \"-23.5\",\n\t\"input_tp\" : \"-4.2\",\n\t\"input_lra\" : \"6.1\",\n\t\"input_thresh\" : \"-33.0\",\n\t\"target_offset\" : \"0.5\"\n}\n";
        let parsed = parse_loudnorm_json(stderr).unwrap();
        assert_eq!(parsed.input_i, "-23.5");
        assert_eq!(parsed.target_offset, "0.5");
    }

    #[test]
    fn rejects_output_without_json_object() {
        assert!(parse_loudnorm_json("no json here").is_err());
    }

    #[test]
    fn new_rejects_a_binary_not_on_path() {
        let err = FfmpegTranscoder::new(
            "chapterforge-nonexistent-transcoder-binary",
            LoudnessConfig::default(),
            Duration::from_secs(5),
        )
        .expect_err("should not resolve");
        assert!(matches!(err, PipelineError::InvalidInput(_)));
    }
}
